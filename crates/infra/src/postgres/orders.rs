use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use tracing::instrument;
use uuid::Uuid;

use tribal_core::{Money, OrderId, Page, PageRequest, ProductId, UserId};
use tribal_orders::{Order, OrderLine, OrderScope, OrderStatus, PaymentMethod, ShippingAddress};

use super::{parse_column, to_i64, to_u32, to_u64, PostgresStore};
use crate::repository::OrderRepository;
use crate::{RepoResult, RepositoryError};

const ORDER_COLUMNS: &str = "o.id, o.buyer_id, o.shipping_address, o.payment_method, o.status, o.is_paid, \
     o.paid_at, o.subtotal_paise, o.shipping_fee_paise, o.total_paise, o.created_at, o.updated_at";

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    buyer_id: Uuid,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    status: String,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    subtotal_paise: i64,
    shipping_fee_paise: i64,
    total_paise: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            buyer_id: row.try_get("buyer_id")?,
            shipping_address: row.try_get("shipping_address")?,
            payment_method: row.try_get("payment_method")?,
            status: row.try_get("status")?,
            is_paid: row.try_get("is_paid")?,
            paid_at: row.try_get("paid_at")?,
            subtotal_paise: row.try_get("subtotal_paise")?,
            shipping_fee_paise: row.try_get("shipping_fee_paise")?,
            total_paise: row.try_get("total_paise")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> RepoResult<Order> {
        Ok(Order {
            id: OrderId::from_uuid(self.id),
            buyer_id: UserId::from_uuid(self.buyer_id),
            lines,
            shipping_address: self.shipping_address.0,
            payment_method: parse_column::<PaymentMethod>(&self.payment_method, "payment method")?,
            status: parse_column::<OrderStatus>(&self.status, "order status")?,
            is_paid: self.is_paid,
            paid_at: self.paid_at,
            subtotal: Money::from_paise(to_u64(self.subtotal_paise, "subtotal")?),
            shipping_fee: Money::from_paise(to_u64(self.shipping_fee_paise, "shipping fee")?),
            total: Money::from_paise(to_u64(self.total_paise, "total")?),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode_line(row: &PgRow) -> RepoResult<(Uuid, OrderLine)> {
    let order_id: Uuid = row.try_get("order_id")?;
    let product_id: Uuid = row.try_get("product_id")?;
    let seller_id: Uuid = row.try_get("seller_id")?;
    let unit_price: i64 = row.try_get("unit_price_paise")?;
    let quantity: i32 = row.try_get("quantity")?;
    Ok((
        order_id,
        OrderLine {
            product_id: ProductId::from_uuid(product_id),
            seller_id: UserId::from_uuid(seller_id),
            name: row.try_get("name")?,
            unit_price: Money::from_paise(to_u64(unit_price, "unit price")?),
            quantity: to_u32(i64::from(quantity), "line quantity")?,
        },
    ))
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: OrderScope, status: Option<OrderStatus>) {
    qb.push(" WHERE TRUE");
    match scope {
        OrderScope::Buyer(id) => {
            qb.push(" AND o.buyer_id = ").push_bind(*id.as_uuid());
        }
        OrderScope::Seller(id) => {
            qb.push(" AND EXISTS (SELECT 1 FROM order_lines l WHERE l.order_id = o.id AND l.seller_id = ")
                .push_bind(*id.as_uuid())
                .push(")");
        }
        OrderScope::All => {}
    }
    if let Some(status) = status {
        qb.push(" AND o.status = ").push_bind(status.as_str());
    }
}

impl PostgresStore {
    /// Attach lines to already-fetched order rows, preserving row order.
    async fn hydrate(&self, rows: Vec<PgRow>) -> RepoResult<Vec<Order>> {
        let headers = rows
            .iter()
            .map(OrderRow::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, seller_id, name, unit_price_paise, quantity
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let (order_id, line) = decode_line(row)?;
            lines.entry(order_id).or_default().push(line);
        }

        headers
            .into_iter()
            .map(|h| {
                let own = lines.remove(&h.id).unwrap_or_default();
                h.into_order(own)
            })
            .collect()
    }

    async fn restock(tx: &mut sqlx::Transaction<'_, Postgres>, order: &Order) -> RepoResult<()> {
        for line in &order.lines {
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = $3 WHERE id = $1")
                .bind(line.product_id.as_uuid())
                .bind(i64::from(line.quantity))
                .bind(order.updated_at)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    #[instrument(skip(self, order), fields(order_id = %order.id, buyer_id = %order.buyer_id, lines = order.lines.len()), err)]
    async fn place_order(&self, order: &Order) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        for line in &order.lines {
            let reserved = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $2, updated_at = $3
                WHERE id = $1 AND is_active AND stock >= $2
                "#,
            )
            .bind(line.product_id.as_uuid())
            .bind(i64::from(line.quantity))
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;
            if reserved.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(RepositoryError::Conflict(format!("insufficient stock for '{}'", line.name)));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, buyer_id, shipping_address, payment_method, status, is_paid, paid_at,
                subtotal_paise, shipping_fee_paise, total_paise, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(Json(&order.shipping_address))
        .bind(order.payment_method.as_str())
        .bind(order.status.as_str())
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(to_i64(order.subtotal.paise(), "subtotal")?)
        .bind(to_i64(order.shipping_fee.paise(), "shipping fee")?)
        .bind(to_i64(order.total.paise(), "total")?)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in (1i32..).zip(&order.lines) {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_id, seller_id, name, unit_price_paise, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line_no)
            .bind(line.product_id.as_uuid())
            .bind(line.seller_id.as_uuid())
            .bind(&line.name)
            .bind(to_i64(line.unit_price.paise(), "unit price")?)
            .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        // Takes the cart row lock first so a concurrent cart edit is either
        // fully before or fully after this delete.
        sqlx::query("UPDATE carts SET updated_at = $2 WHERE buyer_id = $1")
            .bind(order.buyer_id.as_uuid())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;
        let ordered: Vec<Uuid> = order.lines.iter().map(|l| *l.product_id.as_uuid()).collect();
        sqlx::query("DELETE FROM cart_items WHERE buyer_id = $1 AND product_id = ANY($2)")
            .bind(order.buyer_id.as_uuid())
            .bind(ordered)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(self.hydrate(rows).await?.pop())
    }

    #[instrument(skip(self), err)]
    async fn list_orders(
        &self,
        scope: OrderScope,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Order>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
        push_scope(&mut count, scope, status);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders o"));
        push_scope(&mut select, scope, status);
        select
            .push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        let rows = select.build().fetch_all(&self.pool).await?;

        Ok(Page {
            items: self.hydrate(rows).await?,
            total: to_u64(total, "order count")?,
            page: page.page(),
            limit: page.limit(),
        })
    }

    #[instrument(skip(self), err)]
    async fn orders_for(&self, scope: OrderScope) -> RepoResult<Vec<Order>> {
        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders o"));
        push_scope(&mut select, scope, None);
        select.push(" ORDER BY o.created_at DESC, o.id DESC");
        let rows = select.build().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, status = %order.status), err)]
    async fn update_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, is_paid = $3, paid_at = $4, updated_at = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(order.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict("order was modified concurrently".into()));
        }
        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    async fn cancel_order(&self, order: &Order, expected: OrderStatus) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4")
            .bind(order.id.as_uuid())
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .bind(expected.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::Conflict("order was modified concurrently".into()));
        }

        Self::restock(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn has_delivered_purchase(&self, buyer_id: UserId, product_id: ProductId) -> RepoResult<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM orders o
                JOIN order_lines l ON l.order_id = o.id
                WHERE o.buyer_id = $1 AND l.product_id = $2 AND o.status = 'delivered'
            )
            "#,
        )
        .bind(buyer_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}
