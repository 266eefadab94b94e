use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use tracing::instrument;
use uuid::Uuid;

use tribal_catalog::{Product, ProductQuery, ProductSort};
use tribal_core::{Money, Page, PageRequest, ProductId, UserId};

use super::{like_pattern, to_i64, to_u32, to_u64, PostgresStore};
use crate::repository::{Mutation, ProductRepository};
use crate::{RepoResult, RepositoryError};

const PRODUCT_COLUMNS: &str = "id, seller_id, name, description, category, price_paise, stock, \
     images, tribe, region, material, is_active, created_at, updated_at";

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    seller_id: Uuid,
    name: String,
    description: String,
    category: String,
    price_paise: i64,
    stock: i64,
    images: Vec<String>,
    tribe: Option<String>,
    region: Option<String>,
    material: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            seller_id: row.try_get("seller_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            price_paise: row.try_get("price_paise")?,
            stock: row.try_get("stock")?,
            images: row.try_get("images")?,
            tribe: row.try_get("tribe")?,
            region: row.try_get("region")?,
            material: row.try_get("material")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            seller_id: UserId::from_uuid(row.seller_id),
            name: row.name,
            description: row.description,
            category: row.category,
            price: Money::from_paise(to_u64(row.price_paise, "price")?),
            stock: to_u32(row.stock, "stock")?,
            images: row.images,
            tribe: row.tribe,
            region: row.region,
            material: row.material,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode(row: &PgRow) -> RepoResult<Product> {
    ProductRow::from_row(row)?.try_into()
}

/// Append `WHERE` conditions equivalent to [`ProductQuery::matches`].
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if !query.include_inactive {
        qb.push(" AND is_active");
    }
    if query.in_stock {
        qb.push(" AND stock > 0");
    }
    if let Some(seller) = query.seller_id {
        qb.push(" AND seller_id = ").push_bind(*seller.as_uuid());
    }
    if let Some(category) = &query.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min) = query.min_price {
        qb.push(" AND price_paise >= ").push_bind(i64::try_from(min.paise()).unwrap_or(i64::MAX));
    }
    if let Some(max) = query.max_price {
        qb.push(" AND price_paise <= ").push_bind(i64::try_from(max.paise()).unwrap_or(i64::MAX));
    }
    if let Some(q) = &query.q {
        let pattern = like_pattern(q);
        qb.push(" AND (LOWER(name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(description) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR category LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(COALESCE(tribe, '')) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn order_by(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => " ORDER BY created_at DESC, id DESC",
        ProductSort::PriceAsc => " ORDER BY price_paise ASC, id DESC",
        ProductSort::PriceDesc => " ORDER BY price_paise DESC, id DESC",
        ProductSort::Name => " ORDER BY LOWER(name) ASC, id DESC",
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, seller_id, name, description, category, price_paise, stock,
                images, tribe, region, material, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.seller_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(to_i64(product.price.paise(), "price")?)
        .bind(i64::from(product.stock))
        .bind(&product.images)
        .bind(&product.tribe)
        .bind(&product.region)
        .bind(&product.material)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_products(&self, ids: &[ProductId]) -> RepoResult<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode).collect()
    }

    /// The row stays locked from read to write, so a concurrent checkout's
    /// stock decrement is either seen by `change` or applied after it.
    #[instrument(skip(self, change), err)]
    async fn modify_product(&self, id: ProductId, change: Mutation<'_, Product>) -> RepoResult<Product> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let mut product = row
            .as_ref()
            .map(decode)
            .transpose()?
            .ok_or(RepositoryError::NotFound("product"))?;
        change(&mut product)?;

        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, category = $4, price_paise = $5, stock = $6,
                images = $7, tribe = $8, region = $9, material = $10, is_active = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(to_i64(product.price.paise(), "price")?)
        .bind(i64::from(product.stock))
        .bind(&product.images)
        .bind(&product.tribe)
        .bind(&product.region)
        .bind(&product.material)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    #[instrument(skip(self), err)]
    async fn search_products(&self, query: &ProductQuery, page: PageRequest) -> RepoResult<Page<Product>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_filters(&mut select, query);
        select.push(order_by(query.sort));
        select
            .push(" LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        let rows = select.build().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows.iter().map(decode).collect::<RepoResult<Vec<_>>>()?,
            total: to_u64(total, "product count")?,
            page: page.page(),
            limit: page.limit(),
        })
    }

    #[instrument(skip(self), err)]
    async fn categories(&self) -> RepoResult<Vec<String>> {
        let categories = sqlx::query_scalar("SELECT DISTINCT category FROM products WHERE is_active ORDER BY category")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    #[instrument(skip(self), err)]
    async fn products_by_seller(&self, seller_id: UserId) -> RepoResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE seller_id = $1 ORDER BY created_at DESC"
        ))
        .bind(seller_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), err)]
    async fn all_products(&self) -> RepoResult<Vec<Product>> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode).collect()
    }
}
