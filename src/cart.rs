//! Cart model for the POS terminal.
//!
//! A cart is an ordered collection of lines, at most one per product.
//! Every quantity change goes through the stock gate; a rejected change
//! leaves the cart exactly as it was. The cart is ephemeral and belongs
//! to a single in-progress session.

use serde::{Deserialize, Serialize};

use crate::errors::{PosError, Result};
use crate::models::{Customer, Product};
use crate::stock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i64,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.product.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Cart {
        Cart::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Add `requested_qty` units of `product`, merging into an existing
    /// line if one exists. The quantity must be positive and the
    /// combined quantity is gate-checked; on rejection the cart is
    /// unchanged.
    pub fn add_item(&mut self, product: &Product, requested_qty: i64) -> Result<()> {
        if requested_qty <= 0 {
            return Err(PosError::InvalidInput(
                "quantity to add must be positive".into(),
            ));
        }
        let existing_qty = self
            .lines
            .iter()
            .find(|l| l.product.id == product.id)
            .map(|l| l.quantity)
            .unwrap_or(0);
        let desired = existing_qty + requested_qty;
        stock::check_quantity(product, desired)?;

        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => line.quantity = desired,
            None => self.lines.push(CartLine {
                product: product.clone(),
                quantity: desired,
            }),
        }
        Ok(())
    }

    /// Replace a line's quantity. `qty <= 0` removes the line. A gate
    /// rejection preserves the prior quantity. Unknown product ids are a
    /// no-op.
    pub fn set_quantity(&mut self, product_id: &str, qty: i64) -> Result<()> {
        if qty <= 0 {
            self.remove_item(product_id);
            return Ok(());
        }
        let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product_id) else {
            return Ok(());
        };
        stock::check_quantity(&line.product, qty)?;
        line.quantity = qty;
        Ok(())
    }

    /// Delete the line for `product_id` if present; no-op otherwise.
    pub fn remove_item(&mut self, product_id: &str) {
        self.lines.retain(|l| l.product.id != product_id);
    }

    /// Empty the cart. Does NOT touch any associated customer selection;
    /// see `Session::start_new_order` for the composed reset.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of `unit_price * quantity` over all lines. Pure.
    pub fn subtotal(&self) -> f64 {
        self.lines.iter().map(|l| l.line_total()).sum()
    }
}

/// One terminal's in-progress order: a cart plus an optional customer
/// selection. Clearing the cart and deselecting the customer are
/// independent operations; callers compose them when they want the
/// old "new order forgets the customer" behavior.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub cart: Cart,
    pub customer: Option<Customer>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    pub fn select_customer(&mut self, customer: Customer) {
        self.customer = Some(customer);
    }

    pub fn clear_customer(&mut self) {
        self.customer = None;
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    /// Reset for the next sale: empty cart AND drop the customer.
    pub fn start_new_order(&mut self) {
        self.clear_cart();
        self.clear_customer();
    }
}
