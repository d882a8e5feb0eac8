//! Product and category catalog.
//!
//! Read paths feed the terminal (available products by category) and the
//! stock-management screen (all products, low-stock list). Write paths
//! are the manual stock-management operations; sale-time decrements live
//! in `orders` so they share the checkout transaction.

use chrono::Utc;
use rusqlite::{params, Row};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;
use crate::errors::{PosError, Result};
use crate::models::{Category, Product};

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn product_from_row(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        stock_quantity: row.get(4)?,
        low_stock_threshold: row.get(5)?,
        image_url: row.get(6)?,
        is_available: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const PRODUCT_COLUMNS: &str = "id, category_id, name, price, stock_quantity, \
     low_stock_threshold, image_url, is_available, created_at, updated_at";

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub fn list_categories(db: &DbState) -> Result<Vec<Category>> {
    let conn = db.lock();
    let mut stmt =
        conn.prepare("SELECT id, name, icon, created_at FROM categories ORDER BY name")?;
    let rows = stmt.query_map([], category_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn create_category(db: &DbState, name: &str, icon: Option<&str>) -> Result<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PosError::InvalidInput("category name required".into()));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let conn = db.lock();
    conn.execute(
        "INSERT INTO categories (id, name, icon, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, name, icon, now],
    )?;

    info!(category_id = %id, name = name, "Category created");

    Ok(Category {
        id,
        name: name.to_string(),
        icon: icon.map(|s| s.to_string()),
        created_at: now,
    })
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Available products for the terminal, optionally filtered by category,
/// ordered by name.
pub fn list_products(db: &DbState, category_id: Option<&str>) -> Result<Vec<Product>> {
    let conn = db.lock();
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE is_available = 1 AND (?1 IS NULL OR category_id = ?1)
         ORDER BY name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![category_id], product_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every product regardless of availability, for stock management.
pub fn list_all_products(db: &DbState) -> Result<Vec<Product>> {
    let conn = db.lock();
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], product_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_product(db: &DbState, product_id: &str) -> Result<Product> {
    let conn = db.lock();
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    conn.query_row(&sql, params![product_id], product_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                PosError::NotFound(format!("product {product_id}"))
            }
            other => other.into(),
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

pub fn create_product(db: &DbState, new: &NewProduct) -> Result<Product> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(PosError::InvalidInput("product name required".into()));
    }
    if new.price < 0.0 {
        return Err(PosError::InvalidInput("price must be non-negative".into()));
    }
    if new.stock_quantity < 0 {
        return Err(PosError::InvalidInput(
            "stock quantity must be non-negative".into(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let conn = db.lock();
    conn.execute(
        "INSERT INTO products (
            id, category_id, name, price, stock_quantity,
            low_stock_threshold, image_url, is_available, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
        params![
            id,
            new.category_id,
            name,
            new.price,
            new.stock_quantity,
            new.low_stock_threshold,
            new.image_url,
            now,
        ],
    )?;

    info!(product_id = %id, name = name, "Product created");

    Ok(Product {
        id,
        category_id: new.category_id.clone(),
        name: name.to_string(),
        price: new.price,
        stock_quantity: new.stock_quantity,
        low_stock_threshold: new.low_stock_threshold,
        image_url: new.image_url.clone(),
        is_available: true,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Distinguishes "field absent" (leave unchanged) from "field null"
/// (clear the column) when deserializing patch payloads.
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// Partial product update; absent fields are left unchanged. The
/// nullable columns (`category_id`, `low_stock_threshold`) use a nested
/// `Option`: `Some(None)` clears the value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub low_stock_threshold: Option<Option<i64>>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

pub fn update_product(db: &DbState, product_id: &str, update: &ProductUpdate) -> Result<Product> {
    if let Some(price) = update.price {
        if price < 0.0 {
            return Err(PosError::InvalidInput("price must be non-negative".into()));
        }
    }
    if let Some(qty) = update.stock_quantity {
        if qty < 0 {
            return Err(PosError::InvalidInput(
                "stock quantity must be non-negative".into(),
            ));
        }
    }

    let now = Utc::now().to_rfc3339();
    {
        let conn = db.lock();
        let changed = conn.execute(
            "UPDATE products SET
                name = COALESCE(?1, name),
                price = COALESCE(?2, price),
                stock_quantity = COALESCE(?3, stock_quantity),
                is_available = COALESCE(?4, is_available),
                updated_at = ?5
             WHERE id = ?6",
            params![
                update.name,
                update.price,
                update.stock_quantity,
                update.is_available.map(|b| b as i64),
                now,
                product_id,
            ],
        )?;
        if changed == 0 {
            return Err(PosError::NotFound(format!("product {product_id}")));
        }

        // Nullable columns are written unconditionally when the outer
        // Option is present; the inner None binds SQL NULL.
        if let Some(category_id) = &update.category_id {
            conn.execute(
                "UPDATE products SET category_id = ?1 WHERE id = ?2",
                params![category_id, product_id],
            )?;
        }
        if let Some(threshold) = update.low_stock_threshold {
            conn.execute(
                "UPDATE products SET low_stock_threshold = ?1 WHERE id = ?2",
                params![threshold, product_id],
            )?;
        }
    }

    get_product(db, product_id)
}

/// Manual stock adjustment from the stock-management screen.
pub fn update_product_stock(db: &DbState, product_id: &str, new_qty: i64) -> Result<Product> {
    if new_qty < 0 {
        return Err(PosError::InvalidInput(
            "stock quantity must be non-negative".into(),
        ));
    }

    {
        let conn = db.lock();
        let changed = conn.execute(
            "UPDATE products SET stock_quantity = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_qty, Utc::now().to_rfc3339(), product_id],
        )?;
        if changed == 0 {
            return Err(PosError::NotFound(format!("product {product_id}")));
        }
    }

    info!(product_id = product_id, new_qty = new_qty, "Stock updated");
    get_product(db, product_id)
}

/// Products at or below their low-stock threshold (default 10), flagged
/// for restocking attention.
pub fn low_stock_products(db: &DbState) -> Result<Vec<Product>> {
    let conn = db.lock();
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE stock_quantity <= COALESCE(low_stock_threshold, ?1)
         ORDER BY stock_quantity, name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![crate::models::DEFAULT_LOW_STOCK_THRESHOLD],
        product_from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seed_product(db: &DbState, name: &str, price: f64, stock: i64) -> Product {
        create_product(
            db,
            &NewProduct {
                name: name.into(),
                price,
                stock_quantity: stock,
                ..Default::default()
            },
        )
        .expect("create product")
    }

    #[test]
    fn test_create_and_list_products() {
        let db = db::init_in_memory().unwrap();
        seed_product(&db, "Espresso", 2.50, 20);
        seed_product(&db, "Americano", 3.00, 15);

        let products = list_products(&db, None).unwrap();
        assert_eq!(products.len(), 2);
        // Ordered by name
        assert_eq!(products[0].name, "Americano");
    }

    #[test]
    fn test_category_filter() {
        let db = db::init_in_memory().unwrap();
        let drinks = create_category(&db, "Drinks", Some("☕")).unwrap();
        create_product(
            &db,
            &NewProduct {
                name: "Espresso".into(),
                price: 2.50,
                stock_quantity: 20,
                category_id: Some(drinks.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        seed_product(&db, "Croissant", 3.50, 10);

        let filtered = list_products(&db, Some(&drinks.id)).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Espresso");
    }

    #[test]
    fn test_unavailable_products_hidden_from_terminal() {
        let db = db::init_in_memory().unwrap();
        let p = seed_product(&db, "Seasonal Special", 5.0, 10);
        update_product(
            &db,
            &p.id,
            &ProductUpdate {
                is_available: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(list_products(&db, None).unwrap().is_empty());
        assert_eq!(list_all_products(&db).unwrap().len(), 1);
    }

    #[test]
    fn test_update_stock_validates_quantity() {
        let db = db::init_in_memory().unwrap();
        let p = seed_product(&db, "Espresso", 2.50, 20);

        let updated = update_product_stock(&db, &p.id, 7).unwrap();
        assert_eq!(updated.stock_quantity, 7);

        assert!(matches!(
            update_product_stock(&db, &p.id, -1),
            Err(PosError::InvalidInput(_))
        ));
        assert!(matches!(
            update_product_stock(&db, "missing", 5),
            Err(PosError::NotFound(_))
        ));
    }

    #[test]
    fn test_low_stock_respects_thresholds() {
        let db = db::init_in_memory().unwrap();
        seed_product(&db, "Plenty", 1.0, 50);
        seed_product(&db, "Default Threshold", 1.0, 10);
        let custom = create_product(
            &db,
            &NewProduct {
                name: "Custom Threshold".into(),
                price: 1.0,
                stock_quantity: 4,
                low_stock_threshold: Some(3),
                ..Default::default()
            },
        )
        .unwrap();

        let low = low_stock_products(&db).unwrap();
        let names: Vec<_> = low.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"Default Threshold"));
        assert!(!names.contains(&"Plenty"));
        // 4 > custom threshold 3
        assert!(!low.iter().any(|p| p.id == custom.id));
    }

    #[test]
    fn test_update_can_clear_nullable_fields() {
        let db = db::init_in_memory().unwrap();
        let drinks = create_category(&db, "Drinks", None).unwrap();
        let p = create_product(
            &db,
            &NewProduct {
                name: "Espresso".into(),
                price: 2.50,
                stock_quantity: 10,
                category_id: Some(drinks.id.clone()),
                low_stock_threshold: Some(5),
                ..Default::default()
            },
        )
        .unwrap();

        // Absent patch fields leave the values alone.
        let same = update_product(
            &db,
            &p.id,
            &ProductUpdate {
                price: Some(3.00),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(same.category_id.as_deref(), Some(drinks.id.as_str()));
        assert_eq!(same.low_stock_threshold, Some(5));

        // An explicit inner None clears them back to NULL.
        let cleared = update_product(
            &db,
            &p.id,
            &ProductUpdate {
                category_id: Some(None),
                low_stock_threshold: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cleared.category_id, None);
        assert_eq!(cleared.low_stock_threshold, None);
    }

    #[test]
    fn test_product_patch_distinguishes_null_from_absent() {
        let patch: ProductUpdate = serde_json::from_str(r#"{"categoryId": null}"#).unwrap();
        assert_eq!(patch.category_id, Some(None));
        assert!(patch.low_stock_threshold.is_none());
    }

    #[test]
    fn test_create_product_validation() {
        let db = db::init_in_memory().unwrap();
        assert!(matches!(
            create_product(
                &db,
                &NewProduct {
                    name: "  ".into(),
                    price: 1.0,
                    ..Default::default()
                }
            ),
            Err(PosError::InvalidInput(_))
        ));
        assert!(matches!(
            create_product(
                &db,
                &NewProduct {
                    name: "X".into(),
                    price: -1.0,
                    ..Default::default()
                }
            ),
            Err(PosError::InvalidInput(_))
        ));
    }
}
