//! Catalog queries: products and categories.

use sqlx::PgPool;
use tracing::instrument;

use solenne_core::{CategoryId, ProductId};

use super::{RepositoryError, like_pattern, page_offset};
use crate::models::{Category, Product};

/// Products per listing page.
pub const PRODUCTS_PER_PAGE: u32 = 24;

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, p.price, p.compare_at_price, \
     p.currency, p.sku, p.stock, p.category_id, p.image_url, p.featured, p.active, \
     p.membership_days, p.created_at";

const LIST_WHERE: &str = "WHERE p.active \
     AND ($1::text IS NULL OR c.slug = $1) \
     AND ($2::text IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2)";

/// Filters for the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub query: Option<String>,
    pub page: u32,
}

/// A page of products and the total number of matches.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
}

impl ProductPage {
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let per_page = i64::from(PRODUCTS_PER_PAGE);
        u32::try_from((self.total + per_page - 1) / per_page).unwrap_or(u32::MAX)
    }
}

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active featured products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p \
             WHERE p.active AND p.featured \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $1"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?)
    }

    /// Active products matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &ProductFilter) -> Result<ProductPage, RepositoryError> {
        let category = filter.category.as_deref().filter(|c| !c.is_empty());
        let pattern = filter
            .query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .map(like_pattern);

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p \
             LEFT JOIN shop.categories c ON c.id = p.category_id \
             {LIST_WHERE} \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $3 OFFSET $4"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(category)
            .bind(pattern.as_deref())
            .bind(i64::from(PRODUCTS_PER_PAGE))
            .bind(page_offset(filter.page, PRODUCTS_PER_PAGE))
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM shop.products p \
             LEFT JOIN shop.categories c ON c.id = p.category_id {LIST_WHERE}"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(category)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        Ok(ProductPage { products, total })
    }

    /// An active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p WHERE p.slug = $1 AND p.active"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?)
    }

    /// A product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.products p WHERE p.id = $1");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Several products by id in one round-trip.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.products p WHERE p.id = ANY($1)");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(raw)
            .fetch_all(self.pool)
            .await?)
    }

    /// Other active products from the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product: &Product,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let Some(category_id) = product.category_id else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p \
             WHERE p.active AND p.category_id = $1 AND p.id <> $2 \
             ORDER BY p.featured DESC, p.created_at DESC LIMIT $3"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(category_id)
            .bind(product.id)
            .bind(limit)
            .fetch_all(self.pool)
            .await?)
    }

    /// The active product that sells membership access, shortest plan first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn membership_product(&self) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p \
             WHERE p.active AND p.membership_days > 0 \
             ORDER BY p.membership_days, p.id LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Categories that have at least one active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(sqlx::query_as::<_, Category>(
            r"
            SELECT c.id, c.name, c.slug, c.description
            FROM shop.categories c
            WHERE EXISTS (
                SELECT 1 FROM shop.products p WHERE p.category_id = c.id AND p.active
            )
            ORDER BY c.position, c.name
            ",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// A category by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description FROM shop.categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let page = |total| ProductPage {
            products: Vec::new(),
            total,
        };
        assert_eq!(page(0).total_pages(), 0);
        assert_eq!(page(24).total_pages(), 1);
        assert_eq!(page(25).total_pages(), 2);
    }
}
