use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use tribal_core::{ProductId, UserId};
use tribal_orders::{Cart, CartLine};

use super::{to_u32, PostgresStore};
use crate::repository::{CartRepository, Mutation};
use crate::RepoResult;

async fn load_lines<'e, E>(executor: E, buyer_id: UserId) -> RepoResult<Vec<CartLine>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT product_id, quantity, added_at FROM cart_items WHERE buyer_id = $1 ORDER BY added_at ASC",
    )
    .bind(buyer_id.as_uuid())
    .fetch_all(executor)
    .await?;

    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let product_id: Uuid = row.try_get("product_id")?;
        let quantity: i32 = row.try_get("quantity")?;
        lines.push(CartLine {
            product_id: ProductId::from_uuid(product_id),
            quantity: to_u32(i64::from(quantity), "cart quantity")?,
            added_at: row.try_get("added_at")?,
        });
    }
    Ok(lines)
}

/// Replace the stored lines with `cart`'s. The cart row must exist.
async fn store_lines(tx: &mut Transaction<'_, Postgres>, cart: &Cart) -> RepoResult<()> {
    sqlx::query("UPDATE carts SET updated_at = $2 WHERE buyer_id = $1")
        .bind(cart.buyer_id.as_uuid())
        .bind(cart.updated_at)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM cart_items WHERE buyer_id = $1")
        .bind(cart.buyer_id.as_uuid())
        .execute(&mut **tx)
        .await?;

    for line in &cart.lines {
        sqlx::query("INSERT INTO cart_items (buyer_id, product_id, quantity, added_at) VALUES ($1, $2, $3, $4)")
            .bind(cart.buyer_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX))
            .bind(line.added_at)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl CartRepository for PostgresStore {
    #[instrument(skip(self), err)]
    async fn get_cart(&self, buyer_id: UserId) -> RepoResult<Option<Cart>> {
        let updated_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT updated_at FROM carts WHERE buyer_id = $1")
                .bind(buyer_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        let Some(updated_at) = updated_at else {
            return Ok(None);
        };

        Ok(Some(Cart {
            buyer_id,
            lines: load_lines(&self.pool, buyer_id).await?,
            updated_at,
        }))
    }

    /// Edits under the cart row lock, which checkout also takes.
    #[instrument(skip(self, change), err)]
    async fn modify_cart(&self, buyer_id: UserId, change: Mutation<'_, Cart>) -> RepoResult<Cart> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO carts (buyer_id, updated_at) VALUES ($1, $2) ON CONFLICT (buyer_id) DO NOTHING")
            .bind(buyer_id.as_uuid())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        let updated_at: DateTime<Utc> =
            sqlx::query_scalar("SELECT updated_at FROM carts WHERE buyer_id = $1 FOR UPDATE")
                .bind(buyer_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;

        let mut cart = Cart {
            buyer_id,
            lines: load_lines(&mut *tx, buyer_id).await?,
            updated_at,
        };
        change(&mut cart)?;
        store_lines(&mut tx, &cart).await?;

        tx.commit().await?;
        Ok(cart)
    }
}
