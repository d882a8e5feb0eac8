//! Corner POS - point-of-sale core for a single restaurant location.
//!
//! The crate owns the business logic of the terminal: the cart model,
//! the stock availability gate, the settlement calculator, the loyalty
//! accrual policy, and the SQLite persistence layer that writes each
//! checkout atomically. The UI is an external collaborator; it calls
//! these operations and does all display formatting itself.

use std::path::Path;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod cart;
pub mod catalog;
pub mod customers;
pub mod db;
pub mod errors;
pub mod loyalty;
pub mod models;
pub mod orders;
pub mod reports;
pub mod settlement;
pub mod stock;

pub use cart::{Cart, CartLine, Session};
pub use errors::{PosError, Result};
pub use models::{Category, Customer, Order, OrderItem, PaymentMethod, Product};
pub use settlement::{settle, Settlement, TAX_RATE};

/// Initialize structured logging: console layer always, plus a daily
/// rolling file layer when `log_dir` is given.
///
/// Call once at startup from the embedding application; never called by
/// library operations themselves.
pub fn init_logging(log_dir: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,corner_pos=debug"));

    let console_layer = fmt::layer().with_target(true);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "pos");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .init();
            // Dropping the guard flushes logs; the process runs until
            // exit, so leak it.
            std::mem::forget(guard);
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();
        }
    }

    info!("Corner POS core v{} logging ready", env!("CARGO_PKG_VERSION"));
}
