//! Loyalty accrual policy.
//!
//! One point is earned per whole currency unit of final order total, and
//! each point redeems for $0.01. `apply_to_customer` turns a settlement
//! into the customer-record deltas; it rejects rather than clamps when a
//! redemption was validated against a balance that has since shrunk
//! (a concurrent order by the same customer).

use tracing::debug;

use crate::errors::{PosError, Result};
use crate::models::Customer;
use crate::settlement::Settlement;

/// Redemption value of one loyalty point, in currency units.
pub const POINT_VALUE: f64 = 0.01;

/// Currency value of a point balance.
pub fn points_value(points: i64) -> f64 {
    points as f64 * POINT_VALUE
}

/// Apply a settlement's loyalty deltas to a customer record.
///
/// Returns the updated record; the caller persists it. Fails with
/// `StaleLoyaltyBalance` if redeeming would drive the balance negative.
pub fn apply_to_customer(customer: &Customer, settlement: &Settlement) -> Result<Customer> {
    if settlement.points_redeemed > customer.loyalty_points {
        return Err(PosError::StaleLoyaltyBalance {
            customer_id: customer.id.clone(),
            balance: customer.loyalty_points,
            redeeming: settlement.points_redeemed,
        });
    }

    let mut updated = customer.clone();
    updated.loyalty_points =
        customer.loyalty_points - settlement.points_redeemed + settlement.points_earned;
    updated.total_spent = customer.total_spent + settlement.total;

    debug!(
        customer_id = %customer.id,
        points_redeemed = settlement.points_redeemed,
        points_earned = settlement.points_earned,
        new_balance = updated.loyalty_points,
        "Loyalty applied"
    );

    Ok(updated)
}
