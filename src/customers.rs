//! Customer directory and lookup.
//!
//! Customers are optional at checkout; attaching one enables loyalty
//! accrual and redemption. Phone numbers are stored normalized (digits
//! only) so lookup works regardless of how the operator typed them.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;
use crate::errors::{PosError, Result};
use crate::models::Customer;

pub(crate) fn normalize_phone(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
}

fn customer_from_row(row: &Row) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        loyalty_points: row.get(4)?,
        total_spent: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const CUSTOMER_COLUMNS: &str = "id, name, phone, email, loyalty_points, total_spent, created_at";

pub fn list_customers(db: &DbState) -> Result<Vec<Customer>> {
    let conn = db.lock();
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], customer_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_customer(db: &DbState, customer_id: &str) -> Result<Customer> {
    let conn = db.lock();
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
    conn.query_row(&sql, params![customer_id], customer_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                PosError::NotFound(format!("customer {customer_id}"))
            }
            other => other.into(),
        })
}

/// Exact lookup by normalized phone number. `None` when no match.
pub fn find_by_phone(db: &DbState, phone: &str) -> Result<Option<Customer>> {
    let normalized = normalize_phone(phone);
    if normalized.is_empty() {
        return Ok(None);
    }
    let conn = db.lock();
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE phone = ?1 LIMIT 1");
    Ok(conn
        .query_row(&sql, params![normalized], customer_from_row)
        .optional()?)
}

/// Substring search over name and phone, for the customer dialog.
pub fn search_customers(db: &DbState, term: &str) -> Result<Vec<Customer>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = format!("%{term}%");
    let phone_pattern = format!("%{}%", normalize_phone(term));
    let conn = db.lock();
    let sql = format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers
         WHERE name LIKE ?1 COLLATE NOCASE
            OR (?2 != '%%' AND phone LIKE ?2)
         ORDER BY name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern, phone_pattern], customer_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Register a new customer. New members start with zero points and zero
/// lifetime spend.
pub fn create_customer(
    db: &DbState,
    name: &str,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<Customer> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PosError::InvalidInput("customer name required".into()));
    }

    let phone = phone
        .map(normalize_phone)
        .filter(|p| !p.is_empty());
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let conn = db.lock();
    conn.execute(
        "INSERT INTO customers (id, name, phone, email, loyalty_points, total_spent, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)",
        params![id, name, phone, email, now],
    )?;

    info!(customer_id = %id, name = name, "Customer created");

    Ok(Customer {
        id,
        name: name.to_string(),
        phone,
        email: email.map(|s| s.to_string()),
        loyalty_points: 0,
        total_spent: 0.0,
        created_at: now,
    })
}
