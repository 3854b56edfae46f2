//! Load catalog and membership content from a YAML file.
//!
//! Rows are matched on slug and upserted inside one transaction, so a seed
//! file can be applied repeatedly and either lands completely or not at all.
//!
//! ```yaml
//! currency: BRL
//! categories:
//!   - name: Skincare
//! products:
//!   - name: Sérum Vitamina C
//!     price: "89.90"
//!     category: skincare
//! modules:
//!   - title: Rotina básica
//!     lessons:
//!       - title: Limpeza
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{Postgres, Transaction};
use tracing::{error, info};

use solenne_core::membership::MAX_GRANT_DAYS;
use solenne_core::{CurrencyCode, Money, Slug};

use super::connect;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub modules: Vec<SeedModule>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Decimal string; a comma separator is accepted.
    pub price: String,
    pub compare_at_price: Option<String>,
    pub sku: Option<String>,
    #[serde(default)]
    pub stock: i32,
    /// Slug of a category in the same file or already in the database.
    pub category: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    pub membership_days: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SeedModule {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_true")]
    pub published: bool,
    #[serde(default)]
    pub lessons: Vec<SeedLesson>,
}

#[derive(Debug, Deserialize)]
pub struct SeedLesson {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body_markdown: String,
    pub video_url: Option<String>,
    #[serde(default)]
    pub preview: bool,
    #[serde(default = "default_true")]
    pub published: bool,
}

const fn default_true() -> bool {
    true
}

fn resolve_slug(explicit: Option<&str>, title: &str) -> Result<Slug, String> {
    match explicit {
        Some(s) => Slug::parse(s).map_err(|e| format!("slug '{s}': {e}")),
        None => Slug::from_title(title).map_err(|e| format!("'{title}': {e}")),
    }
}

/// Check a seed file without touching the database.
///
/// Returns every problem found rather than stopping at the first.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut category_slugs = HashSet::new();
    for (i, category) in seed.categories.iter().enumerate() {
        if category.name.trim().is_empty() {
            errors.push(format!("categories[{i}]: name is required"));
        }
        match resolve_slug(category.slug.as_deref(), &category.name) {
            Ok(slug) => {
                if !category_slugs.insert(slug.as_str().to_owned()) {
                    errors.push(format!("categories[{i}]: duplicate slug '{slug}'"));
                }
            }
            Err(e) => errors.push(format!("categories[{i}]: {e}")),
        }
    }

    let mut product_slugs = HashSet::new();
    let mut skus = HashSet::new();
    for (i, product) in seed.products.iter().enumerate() {
        let at = format!("products[{i}]");
        if product.name.trim().is_empty() {
            errors.push(format!("{at}: name is required"));
        }
        match resolve_slug(product.slug.as_deref(), &product.name) {
            Ok(slug) => {
                if !product_slugs.insert(slug.as_str().to_owned()) {
                    errors.push(format!("{at}: duplicate slug '{slug}'"));
                }
            }
            Err(e) => errors.push(format!("{at}: {e}")),
        }
        if let Err(e) = parse_prices(product, seed.currency) {
            errors.push(format!("{at}: {e}"));
        }
        if product.stock < 0 {
            errors.push(format!("{at}: stock cannot be negative"));
        }
        if product
            .membership_days
            .is_some_and(|d| !u32::try_from(d).is_ok_and(|d| (1..=MAX_GRANT_DAYS).contains(&d)))
        {
            errors.push(format!(
                "{at}: membership_days must be between 1 and {MAX_GRANT_DAYS}"
            ));
        }
        if let Some(sku) = &product.sku
            && !skus.insert(sku.clone())
        {
            errors.push(format!("{at}: duplicate sku '{sku}'"));
        }
    }

    let mut module_slugs = HashSet::new();
    for (i, module) in seed.modules.iter().enumerate() {
        match resolve_slug(module.slug.as_deref(), &module.title) {
            Ok(slug) => {
                if !module_slugs.insert(slug.as_str().to_owned()) {
                    errors.push(format!("modules[{i}]: duplicate slug '{slug}'"));
                }
            }
            Err(e) => errors.push(format!("modules[{i}]: {e}")),
        }

        let mut lesson_slugs = HashSet::new();
        for (j, lesson) in module.lessons.iter().enumerate() {
            let at = format!("modules[{i}].lessons[{j}]");
            match resolve_slug(lesson.slug.as_deref(), &lesson.title) {
                Ok(slug) => {
                    if !lesson_slugs.insert(slug.as_str().to_owned()) {
                        errors.push(format!("{at}: duplicate slug '{slug}'"));
                    }
                }
                Err(e) => errors.push(format!("{at}: {e}")),
            }
            if let Some(url) = &lesson.video_url
                && !url.starts_with("https://")
            {
                errors.push(format!("{at}: video_url must use https"));
            }
        }
    }

    errors
}

fn parse_prices(
    product: &SeedProduct,
    currency: CurrencyCode,
) -> Result<(Decimal, Option<Decimal>), String> {
    let price = Money::parse(&product.price, currency)
        .map_err(|e| format!("price: {e}"))?
        .amount;
    if price.is_zero() {
        return Err("price must be greater than zero".into());
    }
    let compare_at = product
        .compare_at_price
        .as_deref()
        .map(|raw| Money::parse(raw, currency).map(|m| m.amount))
        .transpose()
        .map_err(|e| format!("compare_at_price: {e}"))?;
    if compare_at.is_some_and(|c| c <= price) {
        return Err("compare_at_price must be greater than price".into());
    }
    Ok((price, compare_at))
}

/// Counts of rows written by a seed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub modules: usize,
    pub lessons: usize,
}

/// Seed the database from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or any write fails (in which case nothing is committed).
pub async fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "Loading seed file");

    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        return Err(format!("seed file has {} error(s)", errors.len()).into());
    }

    let pool = connect().await?;
    let mut tx = pool.begin().await?;
    let summary = apply(&mut tx, &seed).await?;
    tx.commit().await?;

    info!(
        categories = summary.categories,
        products = summary.products,
        modules = summary.modules,
        lessons = summary.lessons,
        "Seed complete"
    );
    Ok(())
}

async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    seed: &SeedFile,
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let mut summary = SeedSummary::default();

    for (position, category) in (0_i32..).zip(&seed.categories) {
        let slug = resolve_slug(category.slug.as_deref(), &category.name)?;
        sqlx::query(
            r"
            INSERT INTO shop.categories (name, slug, description, position)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                position = EXCLUDED.position
            ",
        )
        .bind(category.name.trim())
        .bind(slug.as_str())
        .bind(&category.description)
        .bind(position)
        .execute(&mut **tx)
        .await?;
        summary.categories += 1;
    }

    for product in &seed.products {
        let slug = resolve_slug(product.slug.as_deref(), &product.name)?;
        let (price, compare_at) = parse_prices(product, seed.currency)?;

        let category_id: Option<i32> = match &product.category {
            Some(category) => Some(
                sqlx::query_scalar("SELECT id FROM shop.categories WHERE slug = $1")
                    .bind(category)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or_else(|| {
                        format!("product '{}': unknown category '{category}'", product.name)
                    })?,
            ),
            None => None,
        };

        sqlx::query(
            r"
            INSERT INTO shop.products
                (name, slug, description, price, compare_at_price, currency, sku,
                 stock, category_id, image_url, featured, active, membership_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (slug) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                currency = EXCLUDED.currency,
                sku = EXCLUDED.sku,
                stock = EXCLUDED.stock,
                category_id = EXCLUDED.category_id,
                image_url = EXCLUDED.image_url,
                featured = EXCLUDED.featured,
                active = EXCLUDED.active,
                membership_days = EXCLUDED.membership_days,
                updated_at = now()
            ",
        )
        .bind(product.name.trim())
        .bind(slug.as_str())
        .bind(&product.description)
        .bind(price)
        .bind(compare_at)
        .bind(seed.currency.code())
        .bind(product.sku.as_deref())
        .bind(product.stock)
        .bind(category_id)
        .bind(product.image_url.as_deref())
        .bind(product.featured)
        .bind(product.active)
        .bind(product.membership_days)
        .execute(&mut **tx)
        .await?;
        summary.products += 1;
    }

    for (position, module) in (0_i32..).zip(&seed.modules) {
        let slug = resolve_slug(module.slug.as_deref(), &module.title)?;
        let module_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.membership_modules (title, slug, summary, position, published)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (slug) DO UPDATE
            SET title = EXCLUDED.title,
                summary = EXCLUDED.summary,
                position = EXCLUDED.position,
                published = EXCLUDED.published,
                updated_at = now()
            RETURNING id
            ",
        )
        .bind(module.title.trim())
        .bind(slug.as_str())
        .bind(&module.summary)
        .bind(position)
        .bind(module.published)
        .fetch_one(&mut **tx)
        .await?;
        summary.modules += 1;

        for (lesson_position, lesson) in (0_i32..).zip(&module.lessons) {
            let lesson_slug = resolve_slug(lesson.slug.as_deref(), &lesson.title)?;
            sqlx::query(
                r"
                INSERT INTO shop.lessons
                    (module_id, title, slug, summary, body_markdown, video_url,
                     position, is_preview, published)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (module_id, slug) DO UPDATE
                SET title = EXCLUDED.title,
                    summary = EXCLUDED.summary,
                    body_markdown = EXCLUDED.body_markdown,
                    video_url = EXCLUDED.video_url,
                    position = EXCLUDED.position,
                    is_preview = EXCLUDED.is_preview,
                    published = EXCLUDED.published,
                    updated_at = now()
                ",
            )
            .bind(module_id)
            .bind(lesson.title.trim())
            .bind(lesson_slug.as_str())
            .bind(&lesson.summary)
            .bind(&lesson.body_markdown)
            .bind(lesson.video_url.as_deref())
            .bind(lesson_position)
            .bind(lesson.preview)
            .bind(lesson.published)
            .execute(&mut **tx)
            .await?;
            summary.lessons += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> SeedFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_bundled_catalog_is_valid() {
        let seed = parse(include_str!("../../../../seeds/catalog.yaml"));
        assert!(validate(&seed).is_empty(), "{:?}", validate(&seed));
        assert!(!seed.products.is_empty());
        assert!(!seed.modules.is_empty());
    }

    #[test]
    fn test_defaults_apply() {
        let seed = parse(
            r#"
products:
  - name: Óleo de Rosa Mosqueta
    price: "49,90"
modules:
  - title: Primeiros passos
    lessons:
      - title: Boas-vindas
"#,
        );
        assert_eq!(seed.currency, CurrencyCode::BRL);
        let product = &seed.products[0];
        assert!(product.active);
        assert!(!product.featured);
        assert_eq!(product.stock, 0);
        assert!(seed.modules[0].published);
        assert!(!seed.modules[0].lessons[0].preview);

        let (price, compare_at) = parse_prices(product, seed.currency).unwrap();
        assert_eq!(price, Decimal::new(4990, 2));
        assert!(compare_at.is_none());
        assert_eq!(
            resolve_slug(None, &product.name).unwrap().as_str(),
            "oleo-de-rosa-mosqueta"
        );
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let seed = parse(
            r#"
categories:
  - name: Skincare
  - name: Skincare
products:
  - name: Free Sample
    price: "0"
  - name: Cheap Serum
    price: "30.00"
    compare_at_price: "25.00"
    stock: -1
modules:
  - title: Basics
    lessons:
      - title: Intro
        video_url: http://video.example.com/1
      - title: Intro
"#,
        );
        let errors = validate(&seed);
        assert_eq!(errors.len(), 6, "{errors:?}");
        assert!(errors[0].contains("duplicate slug 'skincare'"));
        assert!(errors.iter().any(|e| e.contains("greater than zero")));
        assert!(errors.iter().any(|e| e.contains("compare_at_price")));
        assert!(errors.iter().any(|e| e.contains("stock cannot be negative")));
        assert!(errors.iter().any(|e| e.contains("video_url must use https")));
        assert!(errors.iter().any(|e| e.contains("lessons[1]: duplicate slug")));
    }

    #[test]
    fn test_membership_days_capped() {
        let seed = parse(
            r#"
products:
  - name: Lifetime Club
    price: "999"
    membership_days: 100000000
"#,
        );
        assert_eq!(
            validate(&seed),
            vec!["products[0]: membership_days must be between 1 and 3650".to_string()]
        );
    }

    #[test]
    fn test_duplicate_sku_rejected() {
        let seed = parse(
            r#"
products:
  - name: A
    price: "10"
    sku: SKU-1
  - name: B
    price: "10"
    sku: SKU-1
"#,
        );
        let errors = validate(&seed);
        assert_eq!(errors, vec!["products[1]: duplicate sku 'SKU-1'".to_string()]);
    }
}
