//! Cashback loyalty ledger rule.
//!
//! Pure arithmetic shared by every service flow: given a cart total, the
//! payment mode, and the customer's prior balance, derive what is actually
//! charged, how much cashback is consumed or earned, and the resulting
//! balance. Redemption covers the whole total or nothing; there is no
//! partial redemption. The `prior_balance >= total` precondition for
//! redemption is the settlement layer's job; this rule does not clamp.

use serde::Serialize;

use crate::services::{calculate_cashback, PaymentMode};

/// The derived settlement amounts for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerEntry {
    /// What the customer actually pays (0 for a cashback redemption).
    pub amount_charged: f64,
    /// Cashback consumed from the balance (the full total on redemption).
    pub cashback_used: f64,
    /// Cashback earned: 5% of the total, zero on redemption.
    pub cashback_earned: f64,
    /// `prior_balance - cashback_used + cashback_earned`.
    pub new_balance: f64,
}

impl LedgerEntry {
    /// Derive the settlement amounts. `prior_balance` is 0.0 when the
    /// customer has no record yet.
    pub fn compute(total: f64, payment_mode: PaymentMode, prior_balance: f64) -> Self {
        let (amount_charged, cashback_used, cashback_earned) =
            if payment_mode == PaymentMode::Cashback {
                (0.0, total, 0.0)
            } else {
                (total, 0.0, calculate_cashback(total))
            };

        Self {
            amount_charged,
            cashback_used,
            cashback_earned,
            new_balance: prior_balance - cashback_used + cashback_earned,
        }
    }
}

/// Whether a redemption of `total` is allowed: a customer record must
/// exist (`balance` is `None` otherwise) with at least `total` available,
/// and the cart must be non-empty.
///
/// Advisory: it gates what the form offers. Settlement re-checks it
/// against a fresh snapshot immediately before writing.
pub fn can_redeem(balance: Option<f64>, total: f64) -> bool {
    match balance {
        Some(balance) => total > 0.0 && balance >= total,
        None => false,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
