//! Read-only aggregates for the admin dashboards.
//!
//! Sales totals, the daily revenue series, and the loyalty overview are
//! computed here with plain SQL; rendering (charts, currency formatting)
//! belongs to the presentation layer.

use chrono::{Duration, Utc};
use rusqlite::params;
use serde::Serialize;

use crate::db::DbState;
use crate::errors::Result;
use crate::models::Customer;

#[derive(Debug, Clone, Serialize)]
pub struct SalesSummary {
    pub total_revenue: f64,
    pub total_orders: i64,
    pub avg_order_value: f64,
    pub total_tax: f64,
}

/// Revenue/order/tax totals, optionally restricted to an inclusive
/// RFC 3339 timestamp range.
pub fn sales_summary(db: &DbState, range: Option<(&str, &str)>) -> Result<SalesSummary> {
    let conn = db.lock();
    let (start, end) = match range {
        Some((s, e)) => (Some(s), Some(e)),
        None => (None, None),
    };
    let (total_revenue, total_orders, total_tax): (f64, i64, f64) = conn.query_row(
        "SELECT COALESCE(SUM(total), 0), COUNT(*), COALESCE(SUM(tax), 0)
         FROM orders
         WHERE (?1 IS NULL OR created_at >= ?1)
           AND (?2 IS NULL OR created_at <= ?2)",
        params![start, end],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let avg_order_value = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };

    Ok(SalesSummary {
        total_revenue,
        total_orders,
        avg_order_value,
        total_tax,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRevenue {
    /// Calendar date, `YYYY-MM-DD` (UTC).
    pub date: String,
    pub orders: i64,
    pub revenue: f64,
}

/// Per-day order count and revenue for the last `days` days including
/// today, oldest first. Days without orders appear with zeros so the
/// chart axis stays continuous.
pub fn daily_revenue(db: &DbState, days: i64) -> Result<Vec<DailyRevenue>> {
    let conn = db.lock();
    let today = Utc::now().date_naive();

    let mut out = Vec::with_capacity(days.max(0) as usize);
    let mut stmt = conn.prepare(
        "SELECT COUNT(*), COALESCE(SUM(total), 0)
         FROM orders WHERE date(created_at) = ?1",
    )?;

    for offset in (0..days).rev() {
        let date = today - Duration::days(offset);
        let key = date.format("%Y-%m-%d").to_string();
        let (orders, revenue): (i64, f64) =
            stmt.query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))?;
        out.push(DailyRevenue {
            date: key,
            orders,
            revenue,
        });
    }

    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyOverview {
    pub member_count: i64,
    pub total_outstanding_points: i64,
    /// Top customers by lifetime spend, highest first.
    pub top_customers: Vec<Customer>,
}

pub fn loyalty_overview(db: &DbState, top_n: i64) -> Result<LoyaltyOverview> {
    let conn = db.lock();
    let (member_count, total_outstanding_points): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(loyalty_points), 0) FROM customers",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, name, phone, email, loyalty_points, total_spent, created_at
         FROM customers ORDER BY total_spent DESC, name LIMIT ?1",
    )?;
    let top_customers = stmt
        .query_map(params![top_n], |row| {
            Ok(Customer {
                id: row.get(0)?,
                name: row.get(1)?,
                phone: row.get(2)?,
                email: row.get(3)?,
                loyalty_points: row.get(4)?,
                total_spent: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(LoyaltyOverview {
        member_count,
        total_outstanding_points,
        top_customers,
    })
}
