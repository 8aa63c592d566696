//! # Reseller Repository
//!
//! Resellers and their per-product inventory overrides.
//!
//! The override table records an agreed price and a consigned quantity per
//! (reseller, product) pair. It is bookkeeping for the humans involved:
//! the sale, checkout and ledger paths never read it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbResult, StoreResult};
use crate::repository::product;
use lumbung_core::types::{Reseller, ResellerInventory};
use lumbung_core::validation::{validate_price_cents, validate_reseller_name, validate_sku};
use lumbung_core::{CoreError, Money, ValidationError};

const RESELLER_COLUMNS: &str = "id, name, phone, created_at";
const INVENTORY_COLUMNS: &str = "id, reseller_id, product_id, qty, price_cents, updated_at";

/// Repository for reseller database operations.
#[derive(Debug, Clone)]
pub struct ResellerRepository {
    pool: SqlitePool,
}

impl ResellerRepository {
    /// Creates a new ResellerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ResellerRepository { pool }
    }

    /// Creates a reseller. Names are unique; a duplicate is a conflict.
    pub async fn create(&self, name: &str, phone: &str) -> StoreResult<Reseller> {
        validate_reseller_name(name)?;
        let name = name.trim();

        debug!(name = %name, "Creating reseller");

        if self.get_by_name(name).await?.is_some() {
            return Err(ValidationError::Duplicate {
                field: "reseller".to_string(),
                value: name.to_string(),
            }
            .into());
        }

        let reseller = Reseller {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.trim().to_string(),
            created_at: Utc::now(),
        };

        // The unique index on name is the backstop if two requests race
        // past the pre-check.
        sqlx::query(
            "INSERT INTO resellers (id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&reseller.id)
        .bind(&reseller.name)
        .bind(&reseller.phone)
        .bind(reseller.created_at)
        .execute(&self.pool)
        .await?;

        Ok(reseller)
    }

    /// Gets a reseller by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Reseller>> {
        let reseller = sqlx::query_as::<_, Reseller>(&format!(
            "SELECT {RESELLER_COLUMNS} FROM resellers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reseller)
    }

    /// Gets a reseller by its unique name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Reseller>> {
        let reseller = sqlx::query_as::<_, Reseller>(&format!(
            "SELECT {RESELLER_COLUMNS} FROM resellers WHERE name = ?1"
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(reseller)
    }

    /// Lists resellers sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Reseller>> {
        let resellers = sqlx::query_as::<_, Reseller>(&format!(
            "SELECT {RESELLER_COLUMNS} FROM resellers ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(resellers)
    }

    /// Creates or overwrites the inventory row for one (reseller, product)
    /// pair.
    pub async fn upsert_inventory(
        &self,
        reseller_id: &str,
        sku: &str,
        qty: i64,
        price: Money,
    ) -> StoreResult<ResellerInventory> {
        validate_sku(sku)?;
        validate_price_cents(price.cents())?;

        let mut tx = self.pool.begin().await?;

        let reseller = sqlx::query_as::<_, Reseller>(&format!(
            "SELECT {RESELLER_COLUMNS} FROM resellers WHERE id = ?1"
        ))
        .bind(reseller_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::ResellerNotFound(reseller_id.to_string()))?;

        let product = product::fetch_by_sku(&mut tx, sku)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(sku.trim().to_string()))?;

        let now = Utc::now();

        let existing = sqlx::query_as::<_, ResellerInventory>(&format!(
            r#"
            SELECT {INVENTORY_COLUMNS} FROM reseller_inventory
            WHERE reseller_id = ?1 AND product_id = ?2
            "#
        ))
        .bind(&reseller.id)
        .bind(&product.id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match existing {
            Some(mut row) => {
                sqlx::query(
                    r#"
                    UPDATE reseller_inventory
                    SET qty = ?2, price_cents = ?3, updated_at = ?4
                    WHERE id = ?1
                    "#,
                )
                .bind(&row.id)
                .bind(qty)
                .bind(price.cents())
                .bind(now)
                .execute(&mut *tx)
                .await?;

                row.qty = qty;
                row.price_cents = price.cents();
                row.updated_at = now;
                row
            }
            None => {
                let row = ResellerInventory {
                    id: Uuid::new_v4().to_string(),
                    reseller_id: reseller.id.clone(),
                    product_id: product.id.clone(),
                    qty,
                    price_cents: price.cents(),
                    updated_at: now,
                };

                sqlx::query(
                    r#"
                    INSERT INTO reseller_inventory (
                        id, reseller_id, product_id, qty, price_cents, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.reseller_id)
                .bind(&row.product_id)
                .bind(row.qty)
                .bind(row.price_cents)
                .bind(row.updated_at)
                .execute(&mut *tx)
                .await?;

                row
            }
        };

        tx.commit().await?;

        Ok(row)
    }

    /// Lists a reseller's inventory rows, ordered by product name.
    pub async fn inventory_for(&self, reseller_id: &str) -> DbResult<Vec<ResellerInventory>> {
        let rows = sqlx::query_as::<_, ResellerInventory>(&format!(
            r#"
            SELECT ri.id, ri.reseller_id, ri.product_id, ri.qty, ri.price_cents, ri.updated_at
            FROM reseller_inventory ri
            JOIN products p ON p.id = ri.product_id
            WHERE ri.reseller_id = ?1
            ORDER BY p.name
            "#
        ))
        .bind(reseller_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::testutil::{product_input, test_db};

    #[tokio::test]
    async fn test_create_and_list() {
        let db = test_db().await;
        let repo = db.resellers();

        repo.create("Toko Berkah", "0812000111").await.unwrap();
        repo.create("Agen Maju", "").await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Agen Maju", "Toko Berkah"]);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict() {
        let db = test_db().await;
        let repo = db.resellers();

        repo.create("Toko Berkah", "").await.unwrap();
        let err = repo.create("Toko Berkah", "").await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Core(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inventory_upsert_overwrites_pair() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi 250g", 1000))
            .await
            .unwrap();
        let reseller = db.resellers().create("Toko Berkah", "").await.unwrap();

        let first = db
            .resellers()
            .upsert_inventory(&reseller.id, "KOPI-250", 10, Money::from_cents(900))
            .await
            .unwrap();

        let second = db
            .resellers()
            .upsert_inventory(&reseller.id, "KOPI-250", 4, Money::from_cents(850))
            .await
            .unwrap();

        // Same row, overwritten - the pair is unique.
        assert_eq!(second.id, first.id);
        assert_eq!(second.qty, 4);
        assert_eq!(second.price_cents, 850);

        let rows = db.resellers().inventory_for(&reseller.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].qty, 4);
    }

    #[tokio::test]
    async fn test_inventory_requires_known_reseller_and_sku() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi 250g", 1000))
            .await
            .unwrap();
        let reseller = db.resellers().create("Toko Berkah", "").await.unwrap();

        let err = db
            .resellers()
            .upsert_inventory("missing-id", "KOPI-250", 1, Money::from_cents(900))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::ResellerNotFound(_))
        ));

        let err = db
            .resellers()
            .upsert_inventory(&reseller.id, "GHOST", 1, Money::from_cents(900))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::ProductNotFound(_))
        ));
    }
}
