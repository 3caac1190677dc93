//! C.F.T. Hub & Co. point-of-sale backend.
//!
//! Records sales for the shop's three service flows (barbing, device
//! charging, computer services), applies the cashback loyalty program, and
//! persists customers and transactions to the hosted Supabase backend.
//! A UI shell drives this crate; everything here is headless.
//!
//! The pieces, roughly in dependency order:
//! - [`services`]: the static pricing catalog and payment modes
//! - [`cart`]: per-flow cart builders behind one [`cart::ServiceOrder`] trait
//! - [`loyalty`]: the cashback ledger arithmetic
//! - [`store`]: the backend contract; [`supabase`] implements it remotely,
//!   [`memory`] in-process for tests and demos
//! - [`settlement`]: validate → receipt number → guarded customer write →
//!   transaction insert → receipt
//! - [`receipt_renderer`]: 82mm plain-text receipts
//! - [`auth`], [`admin`], [`reports`], [`validation`], [`config`]

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod admin;
pub mod auth;
pub mod cart;
pub mod config;
pub mod error;
pub mod loyalty;
pub mod memory;
pub mod receipt_renderer;
pub mod reports;
pub mod services;
pub mod settlement;
pub mod store;
pub mod supabase;
pub mod validation;

pub use error::PosError;

/// Initialize structured logging (console, plus a daily-rolling file when
/// `log_dir` is given). Call once at startup.
pub fn init_logging(log_dir: Option<&std::path::Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cft_pos=debug"));

    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "pos");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            registry.with(file_layer).init();
            // Keep the guard alive for the lifetime of the process;
            // dropping it flushes and closes the file writer.
            std::mem::forget(guard);
        }
        None => registry.init(),
    }

    info!("cft-pos v{} logging initialized", env!("CARGO_PKG_VERSION"));
}
