//! Transaction settlement.
//!
//! Orchestrates one sale from validated input to a printable receipt:
//!
//! 1. validate fields and the cart (fail fast, nothing written),
//! 2. acquire the receipt number from the store,
//! 3. write the customer counters (guarded, retried on conflict),
//! 4. insert the immutable transaction record,
//! 5. assemble the receipt view model.
//!
//! The customer write is a compare-and-swap on the previously observed
//! counters, so two terminals settling against the same phone number
//! cannot silently overwrite each other: the loser refetches and
//! recomputes. If the transaction insert fails after the customer write
//! landed, a compensating write restores the prior counters (or removes a
//! just-created customer row) so the ledger never carries counters with no
//! matching transaction.

use chrono::Utc;
use tracing::{info, warn};

use crate::cart::ServiceOrder;
use crate::error::PosError;
use crate::loyalty::{can_redeem, LedgerEntry};
use crate::receipt_renderer::ReceiptData;
use crate::services::PaymentMode;
use crate::store::{CounterGuard, Customer, CustomerCounters, TransactionRecord, TransactionStore};
use crate::validation::{
    transaction_limiter, validate_customer_name, validate_notes, validate_phone_number,
};

/// Bounded retries for the guarded customer write.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// One settlement submission, as collected by a service form.
#[derive(Debug, Clone)]
pub struct SettlementRequest<'a> {
    pub customer_phone: &'a str,
    pub customer_name: &'a str,
    pub payment_mode: PaymentMode,
    pub additional_notes: Option<&'a str>,
}

/// Settle one sale against the store and return the receipt.
pub async fn settle<S: TransactionStore>(
    store: &S,
    order: &impl ServiceOrder,
    request: &SettlementRequest<'_>,
) -> Result<ReceiptData, PosError> {
    // -- Step 1: validation, no partial effects ----------------------------
    let phone = request.customer_phone.trim();
    let name = request.customer_name.trim();
    if phone.is_empty() || name.is_empty() {
        return Err(PosError::Validation(
            "Please fill in all required fields".to_string(),
        ));
    }
    if !validate_phone_number(phone) {
        return Err(PosError::Validation(
            "Enter a valid Nigerian phone number".to_string(),
        ));
    }
    if !validate_customer_name(name) {
        return Err(PosError::Validation(
            "Enter a valid customer name".to_string(),
        ));
    }
    let notes = request
        .additional_notes
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if let Some(notes) = notes {
        if !validate_notes(notes) {
            return Err(PosError::Validation(
                "Notes are limited to 500 characters with no markup".to_string(),
            ));
        }
    }

    order.validate()?;
    let items = order.line_items();
    let total = order.total();
    if items.is_empty() || total <= 0.0 {
        return Err(PosError::Validation(
            "Please select at least one service".to_string(),
        ));
    }

    if !transaction_limiter().is_allowed(phone) {
        return Err(PosError::RateLimited);
    }

    // Redemption precondition against the current snapshot, before anything
    // remote is touched (even the receipt sequence). Re-checked on every
    // write attempt below against the balance the write is guarded on.
    if request.payment_mode == PaymentMode::Cashback {
        let snapshot = store.fetch_customer(phone).await?;
        if !can_redeem(snapshot.map(|c| c.cashback_balance), total) {
            return Err(PosError::Validation(
                "Insufficient cashback balance".to_string(),
            ));
        }
    }

    // -- Step 2: receipt number, before any state is written ---------------
    let receipt_number = store.generate_receipt_number().await?;

    // -- Step 3: guarded customer upsert -----------------------------------
    // On conflict the snapshot is refetched and the amounts recomputed, so
    // the redemption precondition is always checked against the balance the
    // write is actually guarded on.
    let mut attempt = 0;
    let (entry, prior) = loop {
        attempt += 1;
        if attempt > MAX_WRITE_ATTEMPTS {
            return Err(PosError::Conflict {
                phone: phone.to_string(),
            });
        }

        let customer = store.fetch_customer(phone).await?;

        if request.payment_mode == PaymentMode::Cashback {
            let balance = customer.as_ref().map(|c| c.cashback_balance);
            if !can_redeem(balance, total) {
                return Err(PosError::Validation(
                    "Insufficient cashback balance".to_string(),
                ));
            }
        }

        let prior_balance = customer.as_ref().map_or(0.0, |c| c.cashback_balance);
        let entry = LedgerEntry::compute(total, request.payment_mode, prior_balance);

        match customer {
            Some(existing) => {
                // Name stays sticky: counters only.
                let counters = CustomerCounters {
                    total_transactions: existing.total_transactions + 1,
                    total_spent: existing.total_spent + total,
                    cashback_balance: entry.new_balance,
                };
                match store
                    .update_customer_counters(phone, CounterGuard::of(&existing), counters)
                    .await
                {
                    Ok(()) => break (entry, Some((existing, counters))),
                    Err(PosError::Conflict { .. }) => {
                        warn!(phone, attempt, "customer counters changed underneath settlement, retrying");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                let new_customer = Customer {
                    phone_number: phone.to_string(),
                    customer_name: name.to_string(),
                    total_transactions: 1,
                    total_spent: total,
                    cashback_balance: entry.new_balance,
                    created_at: None,
                    updated_at: None,
                };
                match store.create_customer(&new_customer).await {
                    Ok(()) => break (entry, None),
                    Err(PosError::Conflict { .. }) => {
                        warn!(phone, attempt, "customer appeared concurrently, retrying as existing");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    };

    // -- Step 4: transaction insert, compensating on failure ---------------
    let now = Utc::now();
    let record = TransactionRecord {
        id: None,
        receipt_number: receipt_number.clone(),
        customer_name: name.to_string(),
        customer_phone: phone.to_string(),
        service_category: order.category(),
        service_details: order.details(),
        total_amount: entry.amount_charged,
        payment_mode: request.payment_mode,
        cashback_used: entry.cashback_used,
        cashback_earned: entry.cashback_earned,
        additional_notes: notes.map(str::to_string),
        transaction_date: now,
    };

    if let Err(insert_err) = store.insert_transaction(&record).await {
        warn!(
            phone,
            receipt_number = %receipt_number,
            error = %insert_err,
            "transaction insert failed after customer update, compensating"
        );
        let compensation = match &prior {
            Some((existing, written)) => {
                store
                    .update_customer_counters(
                        phone,
                        CounterGuard {
                            total_transactions: written.total_transactions,
                            cashback_balance: written.cashback_balance,
                        },
                        CustomerCounters {
                            total_transactions: existing.total_transactions,
                            total_spent: existing.total_spent,
                            cashback_balance: existing.cashback_balance,
                        },
                    )
                    .await
            }
            None => store.delete_customer(phone).await,
        };
        return Err(match compensation {
            Ok(()) => {
                info!(phone, "customer counters restored after failed insert");
                PosError::Remote(format!("Transaction failed: {insert_err}"))
            }
            Err(restore) => PosError::PartialWrite {
                cause: insert_err.to_string(),
                restore: restore.to_string(),
            },
        });
    }

    info!(
        phone,
        receipt_number = %receipt_number,
        total,
        amount_charged = entry.amount_charged,
        "transaction settled"
    );

    // -- Step 5: receipt assembly ------------------------------------------
    Ok(ReceiptData {
        receipt_number,
        customer_name: name.to_string(),
        customer_phone: phone.to_string(),
        service_category: order.category(),
        service_details: order.details(),
        total_amount: entry.amount_charged,
        payment_mode: request.payment_mode,
        cashback_used: entry.cashback_used,
        cashback_earned: entry.cashback_earned,
        transaction_date: now,
        additional_notes: notes.map(str::to_string),
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{BarbingOrder, ChargingOrder, ComputerOrder, Selection};
    use crate::memory::MemoryStore;
    use crate::services::{BarbingCut, DeviceType, ServiceCategory};
    use crate::store::{AdminAccount, TransactionFilter};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request<'a>(phone: &'a str, name: &'a str, mode: PaymentMode) -> SettlementRequest<'a> {
        SettlementRequest {
            customer_phone: phone,
            customer_name: name,
            payment_mode: mode,
            additional_notes: None,
        }
    }

    async fn seed_customer(store: &MemoryStore, phone: &str, balance: f64) {
        store
            .create_customer(&Customer {
                phone_number: phone.to_string(),
                customer_name: "Ngozi".to_string(),
                total_transactions: 2,
                total_spent: 3000.0,
                cashback_balance: balance,
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_new_customer_barbing_cash() {
        let store = MemoryStore::new();
        let order = BarbingOrder {
            cut: BarbingCut::AdultMaleCut,
        };
        let receipt = settle(
            &store,
            &order,
            &request("08012345678", "Ada", PaymentMode::Cash),
        )
        .await
        .unwrap();

        assert_eq!(receipt.total_amount, 1000.0);
        assert_eq!(receipt.cashback_used, 0.0);
        assert_eq!(receipt.cashback_earned, 50.0);
        assert!(receipt.receipt_number.starts_with("CFT"));

        let customer = store.fetch_customer("08012345678").await.unwrap().unwrap();
        assert_eq!(customer.customer_name, "Ada");
        assert_eq!(customer.total_transactions, 1);
        assert_eq!(customer.total_spent, 1000.0);
        assert_eq!(customer.cashback_balance, 50.0);

        let transactions = store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].total_amount, 1000.0);
        assert_eq!(transactions[0].cashback_earned, 50.0);
        assert_eq!(transactions[0].service_category, ServiceCategory::Barbing);
    }

    #[tokio::test]
    async fn test_redemption_spends_balance() {
        let store = MemoryStore::new();
        seed_customer(&store, "08112345678", 200.0).await;
        let order = ChargingOrder {
            devices: vec![DeviceType::Android],
            port: "P1".to_string(),
        };
        let receipt = settle(
            &store,
            &order,
            &request("08112345678", "Ngozi", PaymentMode::Cashback),
        )
        .await
        .unwrap();

        assert_eq!(receipt.total_amount, 0.0);
        assert_eq!(receipt.cashback_used, 150.0);
        assert_eq!(receipt.cashback_earned, 0.0);

        let customer = store.fetch_customer("08112345678").await.unwrap().unwrap();
        assert_eq!(customer.cashback_balance, 50.0);
        assert_eq!(customer.total_transactions, 3);
    }

    #[tokio::test]
    async fn test_redemption_rejected_when_balance_short() {
        let store = MemoryStore::new();
        seed_customer(&store, "07012345678", 100.0).await;
        let order = ChargingOrder {
            devices: vec![DeviceType::Android],
            port: "P2".to_string(),
        };
        let result = settle(
            &store,
            &order,
            &request("07012345678", "Ngozi", PaymentMode::Cashback),
        )
        .await;
        assert!(matches!(result, Err(PosError::Validation(_))));

        // Nothing was mutated.
        let customer = store.fetch_customer("07012345678").await.unwrap().unwrap();
        assert_eq!(customer.cashback_balance, 100.0);
        assert_eq!(customer.total_transactions, 2);
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_computer_cart_scenario() {
        let store = MemoryStore::new();
        let order = ComputerOrder {
            print_bw: Selection::on(10),
            lamination_a4: Selection::on(2),
            ..Default::default()
        };
        let receipt = settle(
            &store,
            &order,
            &request("07112345678", "Bola", PaymentMode::Transfer),
        )
        .await
        .unwrap();
        assert_eq!(receipt.total_amount, 900.0);
        assert_eq!(receipt.cashback_earned, 45.0);
    }

    #[tokio::test]
    async fn test_empty_cart_blocked() {
        let store = MemoryStore::new();
        let order = ChargingOrder {
            devices: vec![],
            port: "P1".to_string(),
        };
        let result = settle(
            &store,
            &order,
            &request("09012345678", "Emeka", PaymentMode::Cash),
        )
        .await;
        assert!(matches!(result, Err(PosError::Validation(_))));
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_phone_blocked() {
        let store = MemoryStore::new();
        let order = BarbingOrder {
            cut: BarbingCut::ChildrenCut,
        };
        let result = settle(&store, &order, &request("12345", "Ada", PaymentMode::Cash)).await;
        assert!(matches!(result, Err(PosError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sticky_name_for_returning_customer() {
        let store = MemoryStore::new();
        seed_customer(&store, "09112345678", 0.0).await;
        let order = BarbingOrder {
            cut: BarbingCut::ToddlerCut,
        };
        let receipt = settle(
            &store,
            &order,
            &request("09112345678", "Grace", PaymentMode::Cash),
        )
        .await
        .unwrap();

        // The customer row keeps its original name; the transaction and the
        // receipt snapshot the submitted one.
        let customer = store.fetch_customer("09112345678").await.unwrap().unwrap();
        assert_eq!(customer.customer_name, "Ngozi");
        assert_eq!(receipt.customer_name, "Grace");
        let transactions = store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(transactions[0].customer_name, "Grace");
    }

    #[tokio::test]
    async fn test_receipt_round_trip_matches_stored_record() {
        let store = MemoryStore::new();
        let order = BarbingOrder {
            cut: BarbingCut::AdultFemaleCut,
        };
        let receipt = settle(
            &store,
            &order,
            &request("08012340011", "Amina", PaymentMode::Pos),
        )
        .await
        .unwrap();
        let stored = store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .remove(0);
        let reprint = crate::receipt_renderer::ReceiptData::from_record(&stored);
        assert_eq!(
            crate::receipt_renderer::render(&receipt),
            crate::receipt_renderer::render(&reprint)
        );
    }

    // -- Fault-injection wrappers ------------------------------------------

    /// Forces the first guarded update into a conflict, then delegates.
    struct ConflictOnce {
        inner: MemoryStore,
        conflicts_left: AtomicU32,
    }

    impl TransactionStore for ConflictOnce {
        async fn fetch_customer(&self, phone: &str) -> Result<Option<Customer>, PosError> {
            self.inner.fetch_customer(phone).await
        }
        async fn create_customer(&self, customer: &Customer) -> Result<(), PosError> {
            self.inner.create_customer(customer).await
        }
        async fn update_customer_counters(
            &self,
            phone: &str,
            guard: CounterGuard,
            counters: CustomerCounters,
        ) -> Result<(), PosError> {
            if self.conflicts_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                // Simulate another terminal landing a write in between:
                // bump the real row so the retry sees fresh counters.
                let row = self.inner.fetch_customer(phone).await?.unwrap();
                self.inner
                    .update_customer_counters(
                        phone,
                        CounterGuard::of(&row),
                        CustomerCounters {
                            total_transactions: row.total_transactions + 1,
                            total_spent: row.total_spent + 100.0,
                            cashback_balance: row.cashback_balance + 5.0,
                        },
                    )
                    .await?;
                return Err(PosError::Conflict {
                    phone: phone.to_string(),
                });
            }
            self.inner
                .update_customer_counters(phone, guard, counters)
                .await
        }
        async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), PosError> {
            self.inner.insert_transaction(record).await
        }
        async fn generate_receipt_number(&self) -> Result<String, PosError> {
            self.inner.generate_receipt_number().await
        }
        async fn list_transactions(
            &self,
            filter: &TransactionFilter,
        ) -> Result<Vec<TransactionRecord>, PosError> {
            self.inner.list_transactions(filter).await
        }
        async fn fetch_admin(&self, username: &str) -> Result<Option<AdminAccount>, PosError> {
            self.inner.fetch_admin(username).await
        }
        async fn delete_customer(&self, phone: &str) -> Result<(), PosError> {
            self.inner.delete_customer(phone).await
        }
        async fn wipe_history(&self) -> Result<(), PosError> {
            self.inner.wipe_history().await
        }
    }

    #[tokio::test]
    async fn test_conflict_retries_with_fresh_snapshot() {
        let store = ConflictOnce {
            inner: MemoryStore::new(),
            conflicts_left: AtomicU32::new(1),
        };
        seed_customer(&store.inner, "08012340022", 0.0).await;

        let order = BarbingOrder {
            cut: BarbingCut::AdultMaleCut,
        };
        let receipt = settle(
            &store,
            &order,
            &request("08012340022", "Ngozi", PaymentMode::Cash),
        )
        .await
        .unwrap();
        assert_eq!(receipt.total_amount, 1000.0);

        // Both the interleaved write (+1 tx, +5 balance) and ours landed.
        let customer = store
            .inner
            .fetch_customer("08012340022")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.total_transactions, 4); // 2 seeded + racer + ours
        assert_eq!(customer.cashback_balance, 55.0); // 5 from racer + 50 earned
    }

    #[tokio::test]
    async fn test_conflict_exhaustion_aborts() {
        let store = ConflictOnce {
            inner: MemoryStore::new(),
            conflicts_left: AtomicU32::new(u32::MAX),
        };
        seed_customer(&store.inner, "08012340033", 0.0).await;

        let order = BarbingOrder {
            cut: BarbingCut::AdultMaleCut,
        };
        let result = settle(
            &store,
            &order,
            &request("08012340033", "Ngozi", PaymentMode::Cash),
        )
        .await;
        assert!(matches!(result, Err(PosError::Conflict { .. })));
        assert_eq!(store.inner.transaction_count(), 0);
    }

    /// Fails every transaction insert; optionally fails the compensating
    /// update too.
    struct InsertFails {
        inner: MemoryStore,
        fail_compensation: bool,
        updates_seen: AtomicU32,
    }

    impl TransactionStore for InsertFails {
        async fn fetch_customer(&self, phone: &str) -> Result<Option<Customer>, PosError> {
            self.inner.fetch_customer(phone).await
        }
        async fn create_customer(&self, customer: &Customer) -> Result<(), PosError> {
            self.inner.create_customer(customer).await
        }
        async fn update_customer_counters(
            &self,
            phone: &str,
            guard: CounterGuard,
            counters: CustomerCounters,
        ) -> Result<(), PosError> {
            let seen = self.updates_seen.fetch_add(1, Ordering::SeqCst);
            if self.fail_compensation && seen > 0 {
                return Err(PosError::Remote("store went away".to_string()));
            }
            self.inner
                .update_customer_counters(phone, guard, counters)
                .await
        }
        async fn insert_transaction(&self, _record: &TransactionRecord) -> Result<(), PosError> {
            Err(PosError::Remote("insert rejected".to_string()))
        }
        async fn generate_receipt_number(&self) -> Result<String, PosError> {
            self.inner.generate_receipt_number().await
        }
        async fn list_transactions(
            &self,
            filter: &TransactionFilter,
        ) -> Result<Vec<TransactionRecord>, PosError> {
            self.inner.list_transactions(filter).await
        }
        async fn fetch_admin(&self, username: &str) -> Result<Option<AdminAccount>, PosError> {
            self.inner.fetch_admin(username).await
        }
        async fn delete_customer(&self, phone: &str) -> Result<(), PosError> {
            self.inner.delete_customer(phone).await
        }
        async fn wipe_history(&self) -> Result<(), PosError> {
            self.inner.wipe_history().await
        }
    }

    #[tokio::test]
    async fn test_failed_insert_restores_existing_customer() {
        let store = InsertFails {
            inner: MemoryStore::new(),
            fail_compensation: false,
            updates_seen: AtomicU32::new(0),
        };
        seed_customer(&store.inner, "08012340044", 75.0).await;

        let order = BarbingOrder {
            cut: BarbingCut::AdultMaleCut,
        };
        let result = settle(
            &store,
            &order,
            &request("08012340044", "Ngozi", PaymentMode::Cash),
        )
        .await;
        assert!(matches!(result, Err(PosError::Remote(_))));

        let customer = store
            .inner
            .fetch_customer("08012340044")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.total_transactions, 2);
        assert_eq!(customer.total_spent, 3000.0);
        assert_eq!(customer.cashback_balance, 75.0);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_new_customer() {
        let store = InsertFails {
            inner: MemoryStore::new(),
            fail_compensation: false,
            updates_seen: AtomicU32::new(0),
        };
        let order = BarbingOrder {
            cut: BarbingCut::AdultMaleCut,
        };
        let result = settle(
            &store,
            &order,
            &request("08012340055", "Ada", PaymentMode::Cash),
        )
        .await;
        assert!(matches!(result, Err(PosError::Remote(_))));
        assert!(store
            .inner
            .fetch_customer("08012340055")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_double_failure_reports_partial_write() {
        let store = InsertFails {
            inner: MemoryStore::new(),
            fail_compensation: true,
            updates_seen: AtomicU32::new(0),
        };
        seed_customer(&store.inner, "08012340066", 0.0).await;

        let order = BarbingOrder {
            cut: BarbingCut::AdultMaleCut,
        };
        let result = settle(
            &store,
            &order,
            &request("08012340066", "Ngozi", PaymentMode::Cash),
        )
        .await;
        assert!(matches!(result, Err(PosError::PartialWrite { .. })));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_rate_limiter_blocks_rapid_submissions() {
        let store = MemoryStore::new();
        let order = BarbingOrder {
            cut: BarbingCut::ChildrenCut,
        };
        let phone = "09112223344";
        let mut outcomes = Vec::new();
        for _ in 0..11 {
            outcomes.push(
                settle(&store, &order, &request(phone, "Ada", PaymentMode::Cash))
                    .await
                    .is_ok(),
            );
        }
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 10);
        assert!(!outcomes[10]);
        crate::validation::transaction_limiter().reset(phone);
    }
}
