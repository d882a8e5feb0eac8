//! Error taxonomy for the Corner POS core.
//!
//! Every condition a terminal operator can correct (empty cart, stock
//! limit, bad redemption) is a distinct variant carrying enough context
//! for the presentation layer to explain the rejection. `IncompleteOrder`
//! is the one operational-alert condition: it means the checkout write
//! could not be rolled back cleanly and manual reconciliation is needed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PosError>;

#[derive(Debug, Error)]
pub enum PosError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("stock limit exceeded for product {product_id}: requested {requested}, available {available}")]
    StockLimitExceeded {
        product_id: String,
        requested: i64,
        available: i64,
    },

    #[error("invalid points redemption: requested {requested}, max {max}")]
    InvalidRedemption { requested: i64, max: i64 },

    #[error("stale loyalty balance for customer {customer_id}: balance {balance}, redeeming {redeeming}")]
    StaleLoyaltyBalance {
        customer_id: String,
        balance: i64,
        redeeming: i64,
    },

    #[error("incomplete order {order_id}: {reason}")]
    IncompleteOrder { order_id: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl PosError {
    /// True for conditions the operator can correct at the terminal
    /// without losing the in-progress cart.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PosError::EmptyCart
                | PosError::StockLimitExceeded { .. }
                | PosError::InvalidRedemption { .. }
                | PosError::StaleLoyaltyBalance { .. }
                | PosError::InvalidInput(_)
                | PosError::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_errors_are_recoverable() {
        assert!(PosError::EmptyCart.is_recoverable());
        assert!(PosError::StockLimitExceeded {
            product_id: "p1".into(),
            requested: 4,
            available: 3,
        }
        .is_recoverable());
        assert!(PosError::InvalidRedemption {
            requested: 41,
            max: 40
        }
        .is_recoverable());
    }

    #[test]
    fn test_incomplete_order_is_not_recoverable() {
        let err = PosError::IncompleteOrder {
            order_id: "o1".into(),
            reason: "rollback failed".into(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = PosError::StockLimitExceeded {
            product_id: "espresso".into(),
            requested: 4,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("espresso"));
        assert!(msg.contains("requested 4"));
        assert!(msg.contains("available 3"));
    }
}
