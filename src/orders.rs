//! Order checkout and history.
//!
//! `place_order` is the one critical section in the system: the order
//! header, its line items, the customer's loyalty deltas, and (when
//! enabled) the stock decrements are written in a single `BEGIN
//! IMMEDIATE` transaction, so no reader ever observes a half-written
//! order. The customer balance and product stock are re-checked inside
//! the transaction, which closes the stale-snapshot races the terminal's
//! cached reads are subject to.

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::cart::Cart;
use crate::db::{self, DbState};
use crate::errors::{PosError, Result};
use crate::loyalty;
use crate::models::{Customer, Order, OrderItem, PaymentMethod};
use crate::settlement;

/// Checkout behavior flags, stored under `local_settings`
/// (`checkout.settings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Decrement product stock as part of the checkout transaction.
    /// On by default; turn off when stock is tracked externally.
    pub decrement_stock_on_sale: bool,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            decrement_stock_on_sale: true,
        }
    }
}

pub fn checkout_settings(conn: &Connection) -> CheckoutSettings {
    db::get_setting_json(conn, "checkout", "settings").unwrap_or_default()
}

pub fn set_checkout_settings(db: &DbState, settings: &CheckoutSettings) -> Result<()> {
    let conn = db.lock();
    db::set_setting_json(&conn, "checkout", "settings", settings)
}

fn order_from_row(row: &Row) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        subtotal: row.get(2)?,
        discount: row.get(3)?,
        tax: row.get(4)?,
        total: row.get(5)?,
        payment_method: row.get(6)?,
        points_earned: row.get(7)?,
        points_redeemed: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const ORDER_COLUMNS: &str = "id, customer_id, subtotal, discount, tax, total, \
     payment_method, points_earned, points_redeemed, status, created_at";

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// Settle the cart and persist the result.
///
/// Reads the customer row inside the write transaction, settles against
/// that fresh balance, then writes the order header, every line item,
/// the customer's loyalty deltas, and the stock decrements atomically.
/// On failure everything is rolled back and the cart is untouched; a
/// rollback failure surfaces as `IncompleteOrder`, the one condition
/// that needs manual reconciliation.
pub fn place_order(
    db: &DbState,
    cart: &Cart,
    customer_id: Option<&str>,
    discount: f64,
    points_to_redeem: i64,
    payment_method: PaymentMethod,
) -> Result<Order> {
    if cart.is_empty() {
        return Err(PosError::EmptyCart);
    }

    let conn = db.lock();
    let settings = checkout_settings(&conn);
    let order_id = Uuid::new_v4().to_string();

    conn.execute_batch("BEGIN IMMEDIATE")?;

    let result = (|| -> Result<Order> {
        // Fresh customer read inside the transaction; the terminal's
        // cached copy may be stale.
        let customer = match customer_id {
            Some(id) => Some(read_customer(&conn, id)?),
            None => None,
        };

        let settlement = settlement::settle(
            cart,
            discount,
            points_to_redeem,
            payment_method,
            customer.as_ref(),
        )?;

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO orders (
                id, customer_id, subtotal, discount, tax, total,
                payment_method, points_earned, points_redeemed, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'completed', ?10)",
            params![
                order_id,
                customer_id,
                settlement.subtotal,
                settlement.discount,
                settlement.tax,
                settlement.total,
                settlement.payment_method.as_str(),
                settlement.points_earned,
                settlement.points_redeemed,
                now,
            ],
        )?;

        for line in cart.lines() {
            conn.execute(
                "INSERT INTO order_items (
                    id, order_id, product_id, product_name,
                    quantity, unit_price, total_price
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    order_id,
                    line.product.id,
                    line.product.name,
                    line.quantity,
                    line.product.price,
                    line.line_total(),
                ],
            )?;
        }

        if let Some(customer) = &customer {
            let updated = loyalty::apply_to_customer(customer, &settlement)?;
            conn.execute(
                "UPDATE customers SET loyalty_points = ?1, total_spent = ?2 WHERE id = ?3",
                params![updated.loyalty_points, updated.total_spent, customer.id],
            )?;
        }

        if settings.decrement_stock_on_sale {
            for line in cart.lines() {
                // Check-and-decrement: the guard catches stock sold out
                // from under the cart since it was built.
                let changed = conn.execute(
                    "UPDATE products
                     SET stock_quantity = stock_quantity - ?1, updated_at = ?2
                     WHERE id = ?3 AND stock_quantity >= ?1",
                    params![line.quantity, now, line.product.id],
                )?;
                if changed == 0 {
                    let available: i64 = conn
                        .query_row(
                            "SELECT stock_quantity FROM products WHERE id = ?1",
                            params![line.product.id],
                            |row| row.get(0),
                        )
                        .unwrap_or(0);
                    return Err(PosError::StockLimitExceeded {
                        product_id: line.product.id.clone(),
                        requested: line.quantity,
                        available,
                    });
                }
            }
        }

        Ok(Order {
            id: order_id.clone(),
            customer_id: customer_id.map(|s| s.to_string()),
            subtotal: settlement.subtotal,
            discount: settlement.discount,
            tax: settlement.tax,
            total: settlement.total,
            payment_method: settlement.payment_method.as_str().to_string(),
            points_earned: settlement.points_earned,
            points_redeemed: settlement.points_redeemed,
            status: "completed".to_string(),
            created_at: now,
        })
    })();

    match result {
        Ok(order) => {
            commit_or_rollback(&conn, &order_id)?;
            info!(
                order_id = %order.id,
                total = order.total,
                items = cart.len(),
                payment_method = order.payment_method,
                "Order placed"
            );
            Ok(order)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                // Data-integrity gap: a partially written order may
                // remain. Surface distinctly for manual reconciliation.
                error!(
                    order_id = %order_id,
                    original_error = %e,
                    rollback_error = %rollback_err,
                    "Checkout rollback failed, order may be incomplete"
                );
                return Err(PosError::IncompleteOrder {
                    order_id,
                    reason: format!("rollback failed after {e}: {rollback_err}"),
                });
            }
            Err(e)
        }
    }
}

/// Commit the checkout transaction, falling back to a rollback on
/// failure. A failed commit whose rollback also fails is the
/// data-integrity gap `IncompleteOrder` exists for.
fn commit_or_rollback(conn: &Connection, order_id: &str) -> Result<()> {
    if let Err(commit_err) = conn.execute_batch("COMMIT") {
        if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
            error!(
                order_id = order_id,
                commit_error = %commit_err,
                rollback_error = %rollback_err,
                "Checkout commit and rollback both failed, order may be incomplete"
            );
            return Err(PosError::IncompleteOrder {
                order_id: order_id.to_string(),
                reason: format!("rollback failed after commit failure ({commit_err}): {rollback_err}"),
            });
        }
        return Err(commit_err.into());
    }
    Ok(())
}

fn read_customer(conn: &Connection, customer_id: &str) -> Result<Customer> {
    conn.query_row(
        "SELECT id, name, phone, email, loyalty_points, total_spent, created_at
         FROM customers WHERE id = ?1",
        params![customer_id],
        |row| {
            Ok(Customer {
                id: row.get(0)?,
                name: row.get(1)?,
                phone: row.get(2)?,
                email: row.get(3)?,
                loyalty_points: row.get(4)?,
                total_spent: row.get(5)?,
                created_at: row.get(6)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => PosError::NotFound(format!("customer {customer_id}")),
        other => other.into(),
    })
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Orders newest first, optionally restricted to an inclusive RFC 3339
/// timestamp range.
pub fn list_orders(db: &DbState, range: Option<(&str, &str)>) -> Result<Vec<Order>> {
    let conn = db.lock();
    let (start, end) = match range {
        Some((s, e)) => (Some(s), Some(e)),
        None => (None, None),
    };
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE (?1 IS NULL OR created_at >= ?1)
           AND (?2 IS NULL OR created_at <= ?2)
         ORDER BY created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![start, end], order_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub fn get_order_with_items(db: &DbState, order_id: &str) -> Result<OrderWithItems> {
    let conn = db.lock();
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let order = conn
        .query_row(&sql, params![order_id], order_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                PosError::NotFound(format!("order {order_id}"))
            }
            other => other.into(),
        })?;

    let mut stmt = conn.prepare(
        "SELECT id, order_id, product_id, product_name, quantity, unit_price, total_price
         FROM order_items WHERE order_id = ?1",
    )?;
    let items = stmt
        .query_map(params![order_id], |row| {
            Ok(OrderItem {
                id: row.get(0)?,
                order_id: row.get(1)?,
                product_id: row.get(2)?,
                product_name: row.get(3)?,
                quantity: row.get(4)?,
                unit_price: row.get(5)?,
                total_price: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(OrderWithItems { order, items })
}
