use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use tracing::instrument;
use uuid::Uuid;

use tribal_catalog::Review;
use tribal_core::{ProductId, ReviewId, UserId};

use super::{conflict_on_unique, PostgresStore};
use crate::repository::ReviewRepository;
use crate::{RepoResult, RepositoryError};

const REVIEW_COLUMNS: &str = "id, product_id, user_id, author_name, rating, comment, verified_purchase, created_at";

#[derive(Debug)]
struct ReviewRow {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    author_name: String,
    rating: i16,
    comment: String,
    verified_purchase: bool,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ReviewRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReviewRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            user_id: row.try_get("user_id")?,
            author_name: row.try_get("author_name")?,
            rating: row.try_get("rating")?,
            comment: row.try_get("comment")?,
            verified_purchase: row.try_get("verified_purchase")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = u8::try_from(row.rating)
            .map_err(|_| RepositoryError::DataCorruption(format!("rating out of range: {}", row.rating)))?;
        Ok(Review {
            id: ReviewId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            user_id: UserId::from_uuid(row.user_id),
            author_name: row.author_name,
            rating,
            comment: row.comment,
            verified_purchase: row.verified_purchase,
            created_at: row.created_at,
        })
    }
}

fn decode(row: &PgRow) -> RepoResult<Review> {
    ReviewRow::from_row(row)?.try_into()
}

#[async_trait]
impl ReviewRepository for PostgresStore {
    #[instrument(skip(self, review), fields(review_id = %review.id, product_id = %review.product_id), err)]
    async fn insert_review(&self, review: &Review) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, product_id, user_id, author_name, rating, comment, verified_purchase, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(review.id.as_uuid())
        .bind(review.product_id.as_uuid())
        .bind(review.user_id.as_uuid())
        .bind(&review.author_name)
        .bind(i16::from(review.rating))
        .bind(&review.comment)
        .bind(review.verified_purchase)
        .bind(review.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "you have already reviewed this product"))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_review(&self, id: ReviewId) -> RepoResult<Option<Review>> {
        let row = sqlx::query(&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete_review(&self, id: ReviewId) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("review"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn reviews_for_product(&self, product_id: ProductId) -> RepoResult<Vec<Review>> {
        let rows = sqlx::query(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode).collect()
    }
}
