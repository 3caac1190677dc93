//! Store contract and row types for the remote backend.
//!
//! `TransactionStore` is the seam between settlement and whatever holds the
//! data: the hosted Supabase backend in production
//! ([`crate::supabase::SupabaseStore`]), an in-process map in tests and
//! demos ([`crate::memory::MemoryStore`]). Both implement the same guarded
//! counter update so the settlement retry loop behaves identically against
//! either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::ServiceDetails;
use crate::error::PosError;
use crate::services::{PaymentMode, ServiceCategory};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row of the `customers` table. The phone number is both primary key
/// and loyalty-account key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub phone_number: String,
    pub customer_name: String,
    pub total_transactions: i64,
    pub total_spent: f64,
    pub cashback_balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The counter fields written back during settlement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CustomerCounters {
    pub total_transactions: i64,
    pub total_spent: f64,
    pub cashback_balance: f64,
}

/// Optimistic guard for the counter update: the snapshot the caller's
/// arithmetic was based on. A write only lands if the row still carries
/// these values; otherwise the store reports a conflict and the caller
/// refetches and recomputes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterGuard {
    pub total_transactions: i64,
    pub cashback_balance: f64,
}

impl CounterGuard {
    pub fn of(customer: &Customer) -> Self {
        Self {
            total_transactions: customer.total_transactions,
            cashback_balance: customer.cashback_balance,
        }
    }
}

/// A row of the `transactions` table: one settled sale, immutable once
/// created. `customer_name` is a snapshot of the name submitted with the
/// sale, not a live reference to the customer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub receipt_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub service_category: ServiceCategory,
    pub service_details: ServiceDetails,
    /// The amount actually collected (0 for a cashback redemption).
    pub total_amount: f64,
    pub payment_mode: PaymentMode,
    pub cashback_used: f64,
    pub cashback_earned: f64,
    #[serde(default)]
    pub additional_notes: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// A row of the `admin` table, used only to verify login credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAccount {
    pub id: String,
    pub username: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Listing filters
// ---------------------------------------------------------------------------

/// Filter for transaction listings. All fields are optional and conjunctive.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category: Option<ServiceCategory>,
    /// Case-insensitive needle matched against customer name, phone, and
    /// receipt number.
    pub needle: Option<String>,
}

impl TransactionFilter {
    /// Whether `record` passes this filter. The remote store pushes the
    /// same conditions into its query; this is the reference semantics.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(from) = self.from {
            if record.transaction_date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.transaction_date > to {
                return false;
            }
        }
        if let Some(category) = self.category {
            if record.service_category != category {
                return false;
            }
        }
        if let Some(ref needle) = self.needle {
            let needle = needle.to_lowercase();
            if !needle.is_empty()
                && !record.customer_name.to_lowercase().contains(&needle)
                && !record.customer_phone.to_lowercase().contains(&needle)
                && !record.receipt_number.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// The store contract
// ---------------------------------------------------------------------------

#[allow(async_fn_in_trait)]
pub trait TransactionStore {
    /// Look up a customer by phone number.
    async fn fetch_customer(&self, phone: &str) -> Result<Option<Customer>, PosError>;

    /// Insert a brand-new customer row. Returns [`PosError::Conflict`] if a
    /// row for the phone number already exists (someone else won the race).
    async fn create_customer(&self, customer: &Customer) -> Result<(), PosError>;

    /// Guarded counter update: writes `counters` only if the row still
    /// matches `guard`. Returns [`PosError::Conflict`] on a stale guard or
    /// a missing row. The customer name is never touched; it is sticky
    /// from the row's creation.
    async fn update_customer_counters(
        &self,
        phone: &str,
        guard: CounterGuard,
        counters: CustomerCounters,
    ) -> Result<(), PosError>;

    /// Insert a settled transaction record.
    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), PosError>;

    /// Obtain the next receipt number: `CFT` + `YYYYMMDD` + 3-digit daily
    /// sequence. Must succeed before settlement writes anything.
    async fn generate_receipt_number(&self) -> Result<String, PosError>;

    /// List transactions matching `filter`, most recent first.
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, PosError>;

    /// Look up an admin account by username.
    async fn fetch_admin(&self, username: &str) -> Result<Option<AdminAccount>, PosError>;

    /// Delete one customer row. Transactions referencing the phone number
    /// are left in place (soft foreign key, no cascade).
    async fn delete_customer(&self, phone: &str) -> Result<(), PosError>;

    /// Irreversibly delete ALL transactions and zero every customer's
    /// counters and cashback balance. Callers gate this behind an explicit
    /// confirmation; the store just does what it is told.
    async fn wipe_history(&self) -> Result<(), PosError>;
}

// ===========================================================================
// Tests
// ===========================================================================
