//! Settlement calculator: the single source of truth for checkout
//! pricing.
//!
//! Every surface that shows a price breakdown calls `settle` rather than
//! recomputing subtotal/tax/discount on its own. The calculation is pure
//! and deterministic: identical inputs always yield a bit-identical
//! `Settlement`. Currency values stay at full f64 precision; rounding to
//! two decimals happens only in the presentation layer.

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::errors::{PosError, Result};
use crate::models::{Customer, PaymentMethod};

/// Fixed sales tax rate. Not configurable per jurisdiction.
pub const TAX_RATE: f64 = 0.10;

/// Finalized pricing breakdown for one checkout. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub subtotal: f64,
    pub tax: f64,
    /// Manual discount plus point-derived discount, combined.
    pub discount: f64,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub points_earned: i64,
    pub points_redeemed: i64,
}

/// Compute the settlement for a cart.
///
/// * `discount_amount` — manual discount in currency units; negative
///   values are clamped to 0 so a bad input can never inflate the total.
/// * `points_to_redeem` — loyalty points to apply, each worth $0.01.
///   Must not exceed the attached customer's balance (0 with no
///   customer).
/// * `customer` — when attached, earns one point per whole currency unit
///   of the final total.
///
/// A discount larger than `subtotal + tax` floors the total at zero; the
/// excess is absorbed, never refunded.
pub fn settle(
    cart: &Cart,
    discount_amount: f64,
    points_to_redeem: i64,
    payment_method: PaymentMethod,
    customer: Option<&Customer>,
) -> Result<Settlement> {
    if cart.is_empty() {
        return Err(PosError::EmptyCart);
    }

    let max_points = customer.map(|c| c.loyalty_points).unwrap_or(0);
    if points_to_redeem < 0 || points_to_redeem > max_points {
        return Err(PosError::InvalidRedemption {
            requested: points_to_redeem,
            max: max_points,
        });
    }

    let discount_amount = discount_amount.max(0.0);

    let subtotal = cart.subtotal();
    let tax = subtotal * TAX_RATE;
    let points_discount = points_to_redeem as f64 * crate::loyalty::POINT_VALUE;
    let total = (subtotal + tax - discount_amount - points_discount).max(0.0);

    let points_earned = if customer.is_some() {
        total.floor() as i64
    } else {
        0
    };

    Ok(Settlement {
        subtotal,
        tax,
        discount: discount_amount + points_discount,
        total,
        payment_method,
        points_earned,
        points_redeemed: points_to_redeem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.into(),
            category_id: None,
            name: format!("Product {id}"),
            price,
            stock_quantity: 100,
            low_stock_threshold: None,
            image_url: None,
            is_available: true,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn customer(points: i64) -> Customer {
        Customer {
            id: "c1".into(),
            name: "Ada".into(),
            phone: None,
            email: None,
            loyalty_points: points,
            total_spent: 0.0,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn cart(items: &[(&str, f64, i64)]) -> Cart {
        let mut cart = Cart::new();
        for (id, price, qty) in items {
            cart.add_item(&product(id, *price), *qty).unwrap();
        }
        cart
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let err = settle(&Cart::new(), 0.0, 0, PaymentMethod::Cash, None).unwrap_err();
        assert!(matches!(err, PosError::EmptyCart));
    }

    #[test]
    fn test_receipt_scenario() {
        // 2x 9.99 + 1x 3.50 -> subtotal 23.48, tax 2.348, total 25.828
        let cart = cart(&[("p1", 9.99, 2), ("p2", 3.50, 1)]);
        let cust = customer(0);
        let s = settle(&cart, 0.0, 0, PaymentMethod::Card, Some(&cust)).unwrap();
        assert!((s.subtotal - 23.48).abs() < 1e-9);
        assert!((s.tax - 2.348).abs() < 1e-9);
        assert!((s.total - 25.828).abs() < 1e-9);
        assert_eq!(s.points_earned, 25);
        assert_eq!(s.discount, 0.0);
    }

    #[test]
    fn test_tax_is_ten_percent_of_subtotal() {
        let cart = cart(&[("p1", 12.34, 3)]);
        let s = settle(&cart, 0.0, 0, PaymentMethod::Cash, None).unwrap();
        assert_eq!(s.tax, s.subtotal * TAX_RATE);
    }

    #[test]
    fn test_oversized_discount_floors_total_at_zero() {
        // subtotal 10.00, tax 1.00, discount 50.00 -> total 0
        let cart = cart(&[("p1", 10.0, 1)]);
        let cust = customer(0);
        let s = settle(&cart, 50.0, 0, PaymentMethod::Cash, Some(&cust)).unwrap();
        assert_eq!(s.total, 0.0);
        assert_eq!(s.points_earned, 0);
    }

    #[test]
    fn test_redemption_bounds() {
        let cart = cart(&[("p1", 10.0, 1)]);
        let cust = customer(40);

        // Exactly the balance succeeds, one point worth $0.01 each.
        let s = settle(&cart, 0.0, 40, PaymentMethod::Cash, Some(&cust)).unwrap();
        assert!((s.discount - 0.40).abs() < 1e-9);
        assert_eq!(s.points_redeemed, 40);

        // One over the balance is rejected with context.
        match settle(&cart, 0.0, 41, PaymentMethod::Cash, Some(&cust)) {
            Err(PosError::InvalidRedemption { requested, max }) => {
                assert_eq!(requested, 41);
                assert_eq!(max, 40);
            }
            other => panic!("expected InvalidRedemption, got {other:?}"),
        }
    }

    #[test]
    fn test_redemption_without_customer_is_rejected() {
        let cart = cart(&[("p1", 10.0, 1)]);
        let err = settle(&cart, 0.0, 1, PaymentMethod::Cash, None).unwrap_err();
        assert!(matches!(err, PosError::InvalidRedemption { max: 0, .. }));
    }

    #[test]
    fn test_negative_redemption_is_rejected() {
        let cart = cart(&[("p1", 10.0, 1)]);
        let cust = customer(40);
        assert!(settle(&cart, 0.0, -1, PaymentMethod::Cash, Some(&cust)).is_err());
    }

    #[test]
    fn test_no_points_without_customer() {
        let cart = cart(&[("p1", 10.0, 1)]);
        let s = settle(&cart, 0.0, 0, PaymentMethod::Cash, None).unwrap();
        assert_eq!(s.points_earned, 0);
    }

    #[test]
    fn test_points_earned_floor_of_final_total() {
        // subtotal 20.00, tax 2.00, discount 2.50 -> total 19.50 -> 19 pts
        let cart = cart(&[("p1", 20.0, 1)]);
        let cust = customer(0);
        let s = settle(&cart, 2.50, 0, PaymentMethod::Cash, Some(&cust)).unwrap();
        assert!((s.total - 19.50).abs() < 1e-9);
        assert_eq!(s.points_earned, 19);
    }

    #[test]
    fn test_negative_discount_is_clamped() {
        let cart = cart(&[("p1", 10.0, 1)]);
        let s = settle(&cart, -5.0, 0, PaymentMethod::Cash, None).unwrap();
        assert!((s.total - 11.0).abs() < 1e-9);
        assert_eq!(s.discount, 0.0);
    }

    #[test]
    fn test_settle_is_deterministic() {
        let cart = cart(&[("p1", 9.99, 2), ("p2", 3.50, 1)]);
        let cust = customer(25);
        let a = settle(&cart, 1.25, 10, PaymentMethod::Card, Some(&cust)).unwrap();
        let b = settle(&cart, 1.25, 10, PaymentMethod::Card, Some(&cust)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_discount_combines_manual_and_points() {
        let cart = cart(&[("p1", 10.0, 1)]);
        let cust = customer(100);
        let s = settle(&cart, 2.0, 100, PaymentMethod::Cash, Some(&cust)).unwrap();
        assert!((s.discount - 3.0).abs() < 1e-9);
        assert!((s.total - 8.0).abs() < 1e-9);
    }
}
