//! In-process implementation of the store contract.
//!
//! Used by tests and demos. Semantics match the remote store: the guarded
//! counter update is a compare-and-swap, receipt numbers carry a per-day
//! sequence, and the history wipe zeroes every customer's counters.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::PosError;
use crate::store::{
    AdminAccount, CounterGuard, Customer, CustomerCounters, TransactionFilter, TransactionRecord,
    TransactionStore,
};

#[derive(Default)]
struct Inner {
    customers: HashMap<String, Customer>,
    transactions: Vec<TransactionRecord>,
    admins: HashMap<String, AdminAccount>,
    /// Per-`YYYYMMDD` receipt sequence counters.
    receipt_seq: HashMap<String, u32>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an admin account for login tests/demos.
    pub fn add_admin(&self, account: AdminAccount) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.admins.insert(account.username.clone(), account);
    }

    /// Number of stored transactions.
    pub fn transaction_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.transactions.len()
    }
}

impl TransactionStore for MemoryStore {
    async fn fetch_customer(&self, phone: &str) -> Result<Option<Customer>, PosError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.customers.get(phone).cloned())
    }

    async fn create_customer(&self, customer: &Customer) -> Result<(), PosError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.customers.contains_key(&customer.phone_number) {
            return Err(PosError::Conflict {
                phone: customer.phone_number.clone(),
            });
        }
        let now = Utc::now();
        let mut row = customer.clone();
        row.created_at = Some(now);
        row.updated_at = Some(now);
        inner.customers.insert(row.phone_number.clone(), row);
        Ok(())
    }

    async fn update_customer_counters(
        &self,
        phone: &str,
        guard: CounterGuard,
        counters: CustomerCounters,
    ) -> Result<(), PosError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let row = inner.customers.get_mut(phone).ok_or(PosError::Conflict {
            phone: phone.to_string(),
        })?;
        if row.total_transactions != guard.total_transactions
            || row.cashback_balance != guard.cashback_balance
        {
            return Err(PosError::Conflict {
                phone: phone.to_string(),
            });
        }
        row.total_transactions = counters.total_transactions;
        row.total_spent = counters.total_spent;
        row.cashback_balance = counters.cashback_balance;
        row.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), PosError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        let mut row = record.clone();
        row.id = Some(format!("tx-{}", inner.next_id));
        inner.transactions.push(row);
        Ok(())
    }

    async fn generate_receipt_number(&self) -> Result<String, PosError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let date = Utc::now().format("%Y%m%d").to_string();
        let seq = inner.receipt_seq.entry(date.clone()).or_insert(0);
        *seq += 1;
        Ok(format!("CFT{date}{:03}", *seq))
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, PosError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<TransactionRecord> = inner
            .transactions
            .iter()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        Ok(matching)
    }

    async fn fetch_admin(&self, username: &str) -> Result<Option<AdminAccount>, PosError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.admins.get(username).cloned())
    }

    async fn delete_customer(&self, phone: &str) -> Result<(), PosError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.customers.remove(phone);
        Ok(())
    }

    async fn wipe_history(&self) -> Result<(), PosError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.transactions.clear();
        let now = Utc::now();
        for row in inner.customers.values_mut() {
            row.total_transactions = 0;
            row.total_spent = 0.0;
            row.cashback_balance = 0.0;
            row.updated_at = Some(now);
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::ServiceDetails;
    use crate::services::{PaymentMode, ServiceCategory};

    fn customer(phone: &str, balance: f64) -> Customer {
        Customer {
            phone_number: phone.to_string(),
            customer_name: "Ada".to_string(),
            total_transactions: 1,
            total_spent: 1000.0,
            cashback_balance: balance,
            created_at: None,
            updated_at: None,
        }
    }

    fn record(phone: &str, receipt: &str) -> TransactionRecord {
        TransactionRecord {
            id: None,
            receipt_number: receipt.to_string(),
            customer_name: "Ada".to_string(),
            customer_phone: phone.to_string(),
            service_category: ServiceCategory::Barbing,
            service_details: ServiceDetails::Barbing {
                service_type: "Adult Male Cut".to_string(),
                price: 1000.0,
            },
            total_amount: 1000.0,
            payment_mode: PaymentMode::Cash,
            cashback_used: 0.0,
            cashback_earned: 50.0,
            additional_notes: None,
            transaction_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let store = MemoryStore::new();
        store.create_customer(&customer("0801", 50.0)).await.unwrap();
        let fetched = store.fetch_customer("0801").await.unwrap().unwrap();
        assert_eq!(fetched.cashback_balance, 50.0);
        assert!(fetched.created_at.is_some());
        assert!(store.fetch_customer("0999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let store = MemoryStore::new();
        store.create_customer(&customer("0801", 0.0)).await.unwrap();
        let err = store.create_customer(&customer("0801", 0.0)).await;
        assert!(matches!(err, Err(PosError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_guarded_update_applies_with_fresh_guard() {
        let store = MemoryStore::new();
        store.create_customer(&customer("0801", 50.0)).await.unwrap();
        store
            .update_customer_counters(
                "0801",
                CounterGuard {
                    total_transactions: 1,
                    cashback_balance: 50.0,
                },
                CustomerCounters {
                    total_transactions: 2,
                    total_spent: 1900.0,
                    cashback_balance: 95.0,
                },
            )
            .await
            .unwrap();
        let row = store.fetch_customer("0801").await.unwrap().unwrap();
        assert_eq!(row.total_transactions, 2);
        assert_eq!(row.cashback_balance, 95.0);
    }

    #[tokio::test]
    async fn test_guarded_update_rejects_stale_guard() {
        let store = MemoryStore::new();
        store.create_customer(&customer("0801", 50.0)).await.unwrap();
        let stale = store
            .update_customer_counters(
                "0801",
                CounterGuard {
                    total_transactions: 1,
                    cashback_balance: 999.0,
                },
                CustomerCounters {
                    total_transactions: 2,
                    total_spent: 1900.0,
                    cashback_balance: 95.0,
                },
            )
            .await;
        assert!(matches!(stale, Err(PosError::Conflict { .. })));
        // Nothing changed.
        let row = store.fetch_customer("0801").await.unwrap().unwrap();
        assert_eq!(row.cashback_balance, 50.0);
    }

    #[tokio::test]
    async fn test_receipt_sequence_increments_within_day() {
        let store = MemoryStore::new();
        let first = store.generate_receipt_number().await.unwrap();
        let second = store.generate_receipt_number().await.unwrap();
        assert!(crate::validation::validate_receipt_number(&first));
        assert!(first.ends_with("001"));
        assert!(second.ends_with("002"));
        assert_eq!(&first[..11], &second[..11]);
    }

    #[tokio::test]
    async fn test_wipe_history_resets_customers() {
        let store = MemoryStore::new();
        store.create_customer(&customer("0801", 50.0)).await.unwrap();
        store.insert_transaction(&record("0801", "CFT20260310001")).await.unwrap();
        assert_eq!(store.transaction_count(), 1);

        store.wipe_history().await.unwrap();
        assert_eq!(store.transaction_count(), 0);
        let row = store.fetch_customer("0801").await.unwrap().unwrap();
        assert_eq!(row.total_transactions, 0);
        assert_eq!(row.total_spent, 0.0);
        assert_eq!(row.cashback_balance, 0.0);
    }

    #[tokio::test]
    async fn test_list_transactions_newest_first() {
        let store = MemoryStore::new();
        let mut older = record("0801", "CFT20260309001");
        older.transaction_date = "2026-03-09T10:00:00Z".parse().unwrap();
        let mut newer = record("0801", "CFT20260310001");
        newer.transaction_date = "2026-03-10T10:00:00Z".parse().unwrap();
        store.insert_transaction(&older).await.unwrap();
        store.insert_transaction(&newer).await.unwrap();

        let all = store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].receipt_number, "CFT20260310001");
        assert!(all[0].id.is_some());
    }

    #[tokio::test]
    async fn test_delete_customer_leaves_transactions() {
        let store = MemoryStore::new();
        store.create_customer(&customer("0801", 0.0)).await.unwrap();
        store.insert_transaction(&record("0801", "CFT20260310001")).await.unwrap();
        store.delete_customer("0801").await.unwrap();
        assert!(store.fetch_customer("0801").await.unwrap().is_none());
        assert_eq!(store.transaction_count(), 1);
    }
}
