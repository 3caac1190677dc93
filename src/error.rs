//! Error taxonomy for the POS backend.
//!
//! Three broad classes surface to the operator: validation problems (nothing
//! was written), remote-store failures (reported with the underlying cause
//! for diagnostics), and write conflicts from the guarded customer update.
//! `PartialWrite` covers the one genuinely ugly case: the transaction insert
//! failed after the customer counters were written AND the compensating
//! restore also failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PosError {
    /// Input rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    /// Submission throttled by the per-customer rate limiter.
    #[error("Too many submissions, please wait a moment and try again")]
    RateLimited,

    /// A remote call failed: receipt-number RPC, customer write, transaction
    /// insert, or a read. Carries a user-presentable message with the cause.
    #[error("{0}")]
    Remote(String),

    /// A guarded customer update observed stale counters. Settlement retries
    /// these; the error only escapes when the retries run out.
    #[error("customer record for {phone} changed concurrently, settlement aborted")]
    Conflict { phone: String },

    /// The transaction insert failed after the customer counters were
    /// written, and the compensating restore failed too. The customer row
    /// now carries counters with no matching transaction record.
    #[error("transaction insert failed after customer update ({cause}); restoring counters also failed: {restore}")]
    PartialWrite { cause: String, restore: String },

    /// Login rejected: unknown username or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login disabled after repeated failures.
    #[error("Too many failed attempts, try again in {minutes} minutes")]
    Locked { minutes: i64 },

    /// An operation that requires a signed-in operator was called without one.
    #[error("Not authenticated")]
    NotAuthenticated,
}
