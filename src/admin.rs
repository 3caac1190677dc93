//! Gated administrative operations.
//!
//! Both operations here are irreversible and deliberately kept out of the
//! normal sale flow. Deleting a customer removes only the customer row;
//! historical transactions keep the phone number as a dangling soft
//! reference. Clearing history deletes every transaction AND zeroes every
//! customer's counters and cashback balance, outstanding credit included;
//! it requires the operator to retype their own username as confirmation.

use tracing::{info, warn};

use crate::auth::{current_session, AuthState};
use crate::error::PosError;
use crate::store::TransactionStore;

/// Delete a single customer row. Requires a signed-in operator.
pub async fn delete_customer<S: TransactionStore>(
    auth: &AuthState,
    store: &S,
    phone: &str,
) -> Result<(), PosError> {
    let session = current_session(auth).ok_or(PosError::NotAuthenticated)?;
    store.delete_customer(phone).await?;
    info!(phone, operator = %session.username, "customer deleted");
    Ok(())
}

/// Wipe all transaction history and reset every customer's counters and
/// cashback balance to zero. `confirmation` must match the signed-in
/// operator's username exactly (case-insensitive) or nothing happens.
pub async fn clear_all_history<S: TransactionStore>(
    auth: &AuthState,
    store: &S,
    confirmation: &str,
) -> Result<(), PosError> {
    let session = current_session(auth).ok_or(PosError::NotAuthenticated)?;

    if !confirmation
        .trim()
        .eq_ignore_ascii_case(&session.username)
    {
        return Err(PosError::Validation(
            "Confirmation does not match the signed-in account".to_string(),
        ));
    }

    store.wipe_history().await?;
    warn!(operator = %session.username, "ALL transaction history cleared and balances reset");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{login, AuthState};
    use crate::memory::MemoryStore;
    use crate::store::{AdminAccount, Customer, TransactionStore};

    async fn signed_in_fixture() -> (AuthState, MemoryStore) {
        let store = MemoryStore::new();
        store.add_admin(AdminAccount {
            id: "admin-1".to_string(),
            username: "cft-admin".to_string(),
            password_hash: bcrypt::hash("pw", 4).unwrap(),
        });
        store
            .create_customer(&Customer {
                phone_number: "08012345678".to_string(),
                customer_name: "Ada".to_string(),
                total_transactions: 3,
                total_spent: 4500.0,
                cashback_balance: 225.0,
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();

        let auth = AuthState::new();
        login(&auth, &store, "cft-admin", "pw").await.unwrap();
        (auth, store)
    }

    #[tokio::test]
    async fn test_delete_customer_requires_session() {
        let store = MemoryStore::new();
        let auth = AuthState::new();
        let result = delete_customer(&auth, &store, "08012345678").await;
        assert!(matches!(result, Err(PosError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_delete_customer() {
        let (auth, store) = signed_in_fixture().await;
        delete_customer(&auth, &store, "08012345678").await.unwrap();
        assert!(store.fetch_customer("08012345678").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_history_rejects_bad_confirmation() {
        let (auth, store) = signed_in_fixture().await;
        let result = clear_all_history(&auth, &store, "yes please").await;
        assert!(matches!(result, Err(PosError::Validation(_))));
        // Untouched.
        let customer = store.fetch_customer("08012345678").await.unwrap().unwrap();
        assert_eq!(customer.cashback_balance, 225.0);
    }

    #[tokio::test]
    async fn test_clear_history_resets_everything() {
        let (auth, store) = signed_in_fixture().await;
        clear_all_history(&auth, &store, "CFT-Admin").await.unwrap();
        let customer = store.fetch_customer("08012345678").await.unwrap().unwrap();
        assert_eq!(customer.total_transactions, 0);
        assert_eq!(customer.total_spent, 0.0);
        assert_eq!(customer.cashback_balance, 0.0);
        assert_eq!(store.transaction_count(), 0);
    }
}
