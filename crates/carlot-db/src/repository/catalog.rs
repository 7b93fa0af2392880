//! # Catalog Repository
//!
//! Read access to the category → subcategory → product hierarchy.
//!
//! Catalog maintenance belongs to the warehouse screens; the sale engine only
//! looks products up. The insert methods exist for the seed binary and tests.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use carlot_core::validation::{validate_id, validate_min_stock, validate_name, validate_sku};
use carlot_core::{new_id, Category, CoreError, NewProduct, Product, Subcategory};

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, subcategory_id, sku, name, min_stock, created_at, updated_at";

/// Repository for catalog lookups.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Gets a product by ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        find_product(&mut conn, id).await
    }

    /// Gets a product by SKU (exact match).
    pub async fn get_product_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE sku = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products ordered by name, optionally within one subcategory.
    pub async fn list_products(&self, subcategory_id: Option<&str>) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE (?1 IS NULL OR subcategory_id = ?1) ORDER BY name, sku",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(subcategory_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Counts all products.
    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Adds a product.
    pub async fn insert_product(&self, new: &NewProduct) -> DbResult<Product> {
        validate_id("subcategory_id", &new.subcategory_id)?;
        validate_sku(&new.sku)?;
        validate_name("name", &new.name)?;
        validate_min_stock(new.min_stock)?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            subcategory_id: new.subcategory_id.clone(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            min_stock: new.min_stock,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, subcategory_id, sku, name, min_stock, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.subcategory_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.min_stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.sku),
            other => other,
        })?;

        Ok(product)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Lists all categories by name.
    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(categories)
    }

    /// Lists subcategories by name, optionally within one category.
    pub async fn list_subcategories(
        &self,
        category_id: Option<&str>,
    ) -> DbResult<Vec<Subcategory>> {
        let subcategories = sqlx::query_as::<_, Subcategory>(
            r#"
            SELECT id, category_id, name
            FROM subcategories
            WHERE (?1 IS NULL OR category_id = ?1)
            ORDER BY name
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subcategories)
    }

    /// Adds a category.
    pub async fn insert_category(&self, name: &str) -> DbResult<Category> {
        validate_name("category name", name)?;

        let category = Category {
            id: new_id(),
            name: name.trim().to_string(),
        };

        sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
            .bind(&category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await?;

        Ok(category)
    }

    /// Adds a subcategory under an existing category.
    pub async fn insert_subcategory(&self, category_id: &str, name: &str) -> DbResult<Subcategory> {
        validate_name("subcategory name", name)?;

        let subcategory = Subcategory {
            id: new_id(),
            category_id: category_id.to_string(),
            name: name.trim().to_string(),
        };

        sqlx::query("INSERT INTO subcategories (id, category_id, name) VALUES (?1, ?2, ?3)")
            .bind(&subcategory.id)
            .bind(&subcategory.category_id)
            .bind(&subcategory.name)
            .execute(&self.pool)
            .await?;

        Ok(subcategory)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Looks a product up on an existing connection or transaction.
pub(crate) async fn find_product(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

/// Like [`find_product`], failing with `ProductNotFound`.
pub(crate) async fn require_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    find_product(conn, id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}

// =============================================================================
// Unit Tests
// =============================================================================
