//! Catalog repository: products and categories.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use solenne_core::{CategoryId, CurrencyCode, ProductId};

use super::{PER_PAGE, Page, RepositoryError, like_pattern, page_offset};
use crate::models::{Category, LowStockProduct, Product};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, p.price, p.compare_at_price, \
     p.currency, p.sku, p.stock, p.category_id, c.name AS category_name, p.image_url, p.featured, \
     p.active, p.membership_days, p.created_at, p.updated_at";

const PRODUCT_FILTER: &str = "($1::int IS NULL OR p.category_id = $1) \
     AND ($2::bool IS NULL OR p.active = $2) \
     AND ($3::text IS NULL OR p.name ILIKE $3 OR p.sku ILIKE $3)";

/// Filters of the product list.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub active: Option<bool>,
    pub query: Option<String>,
}

/// Validated product fields for create and update.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub currency: CurrencyCode,
    pub sku: Option<String>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub image_url: Option<String>,
    pub featured: bool,
    pub active: bool,
    pub membership_days: Option<i32>,
}

/// Validated category fields.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub position: i32,
}

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: u32,
    ) -> Result<Page<Product>, RepositoryError> {
        let pattern = filter
            .query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .map(like_pattern);

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p \
             LEFT JOIN shop.categories c ON c.id = p.category_id \
             WHERE {PRODUCT_FILTER} \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(filter.category_id)
            .bind(filter.active)
            .bind(pattern.as_deref())
            .bind(i64::from(PER_PAGE))
            .bind(page_offset(page, PER_PAGE))
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM shop.products p WHERE {PRODUCT_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.category_id)
            .bind(filter.active)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        Ok(Page::new(rows, total, page))
    }

    /// A product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p \
             LEFT JOIN shop.categories c ON c.id = p.category_id WHERE p.id = $1"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<ProductId, RepositoryError> {
        sqlx::query_scalar(
            r"
            INSERT INTO shop.products (
                name, slug, description, price, compare_at_price, currency, sku, stock,
                category_id, image_url, featured, active, membership_days
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.currency)
        .bind(input.sku.as_deref())
        .bind(input.stock)
        .bind(input.category_id)
        .bind(input.image_url.as_deref())
        .bind(input.featured)
        .bind(input.active)
        .bind(input.membership_days)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product slug or SKU"))
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the slug or SKU is taken.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.products SET
                name = $2, slug = $3, description = $4, price = $5, compare_at_price = $6,
                currency = $7, sku = $8, stock = $9, category_id = $10, image_url = $11,
                featured = $12, active = $13, membership_days = $14, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.currency)
        .bind(input.sku.as_deref())
        .bind(input.stock)
        .bind(input.category_id)
        .bind(input.image_url.as_deref())
        .bind(input.featured)
        .bind(input.active)
        .bind(input.membership_days)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product slug or SKU"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Flip a product between active and inactive; returns the new state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn toggle_active(&self, id: ProductId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar(
            "UPDATE shop.products SET active = NOT active, updated_at = now() WHERE id = $1 RETURNING active",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product that no order references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order references it.
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.order_items WHERE product_id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        if referenced {
            return Err(RepositoryError::Conflict(
                "product has orders; deactivate it instead".to_owned(),
            ));
        }

        let result = sqlx::query("DELETE FROM shop.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "product"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Active products at or below `threshold`, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: i32,
        limit: i64,
    ) -> Result<Vec<LowStockProduct>, RepositoryError> {
        Ok(sqlx::query_as::<_, LowStockProduct>(
            r"
            SELECT id, name, sku, stock
            FROM shop.products
            WHERE active AND stock <= $1
            ORDER BY stock, name
            LIMIT $2
            ",
        )
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?)
    }

    /// All categories with their product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(sqlx::query_as::<_, Category>(
            r"
            SELECT c.id, c.name, c.slug, c.description, c.position,
                   COUNT(p.id) AS product_count
            FROM shop.categories c
            LEFT JOIN shop.products p ON p.category_id = c.id
            GROUP BY c.id
            ORDER BY c.position, c.name
            ",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_category(
        &self,
        input: &CategoryInput,
    ) -> Result<CategoryId, RepositoryError> {
        sqlx::query_scalar(
            r"
            INSERT INTO shop.categories (name, slug, description, position)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.position)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category slug"))
    }

    /// Delete a category no product is filed under.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if products reference it.
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.products WHERE category_id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        if in_use {
            return Err(RepositoryError::Conflict(
                "category still has products".to_owned(),
            ));
        }

        let result = sqlx::query("DELETE FROM shop.categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
