//! Stock availability gate.
//!
//! A pure predicate guarding cart quantity changes against the last-known
//! stock snapshot. The gate never mutates stock; decrements happen in the
//! checkout transaction (see `orders`). The snapshot can be stale relative
//! to edits from another terminal, which is why `orders::place_order`
//! re-checks stock inside the write transaction.

use crate::errors::{PosError, Result};
use crate::models::Product;

/// True iff `desired_qty` units of `product` can be carried in a cart.
pub fn can_set_quantity(product: &Product, desired_qty: i64) -> bool {
    desired_qty <= product.stock_quantity
}

/// Gate check as a `Result`, with the product's available quantity as
/// context for the operator message.
pub fn check_quantity(product: &Product, desired_qty: i64) -> Result<()> {
    if can_set_quantity(product, desired_qty) {
        Ok(())
    } else {
        Err(PosError::StockLimitExceeded {
            product_id: product.id.clone(),
            requested: desired_qty,
            available: product.stock_quantity,
        })
    }
}

/// Whether the product should be flagged for restocking attention.
/// Flags only; low stock never blocks a sale.
pub fn is_low_stock(product: &Product) -> bool {
    product.stock_quantity <= product.effective_low_stock_threshold()
}
