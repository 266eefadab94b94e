use async_trait::async_trait;
use sqlx::{PgExecutor, Row};
use tracing::instrument;
use uuid::Uuid;

use tribal_catalog::{Wishlist, WishlistEntry};
use tribal_core::{ProductId, UserId};

use super::PostgresStore;
use crate::repository::{Mutation, WishlistRepository};
use crate::{RepoResult, RepositoryError};

async fn load<'e, E>(executor: E, user_id: UserId) -> RepoResult<Wishlist>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT product_id, added_at FROM wishlist_items WHERE user_id = $1 ORDER BY added_at ASC, product_id ASC",
    )
    .bind(user_id.as_uuid())
    .fetch_all(executor)
    .await?;

    let mut wishlist = Wishlist::new(user_id);
    for row in rows {
        let product_id: Uuid = row.try_get("product_id")?;
        wishlist.entries.push(WishlistEntry {
            product_id: ProductId::from_uuid(product_id),
            added_at: row.try_get("added_at")?,
        });
    }
    Ok(wishlist)
}

#[async_trait]
impl WishlistRepository for PostgresStore {
    #[instrument(skip(self), err)]
    async fn get_wishlist(&self, user_id: UserId) -> RepoResult<Wishlist> {
        load(&self.pool, user_id).await
    }

    /// Serialised per user through the owning `users` row lock.
    #[instrument(skip(self, change), err)]
    async fn modify_wishlist(&self, user_id: UserId, change: Mutation<'_, Wishlist>) -> RepoResult<Wishlist> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if owner.is_none() {
            return Err(RepositoryError::NotFound("user"));
        }

        let mut wishlist = load(&mut *tx, user_id).await?;
        change(&mut wishlist)?;

        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        for entry in &wishlist.entries {
            sqlx::query("INSERT INTO wishlist_items (user_id, product_id, added_at) VALUES ($1, $2, $3)")
                .bind(user_id.as_uuid())
                .bind(entry.product_id.as_uuid())
                .bind(entry.added_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(wishlist)
    }
}
