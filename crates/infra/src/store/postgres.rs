//! Postgres-backed order store.
//!
//! Every session is a real transaction on a pooled connection. Search
//! conditions are rendered with `QueryBuilder::push_bind`, so user input only
//! ever reaches the server as bound parameters.
//!
//! Expected schema: `crates/infra/schema/orders.sql`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use orderdesk_core::{ItemId, OrderId};
use orderdesk_sales::{Item, OrderHeader};

use super::error::map_sqlx_error;
use super::{ConnectionProvider, OrderSession, StoreError};
use crate::query::{like_pattern, Condition, OrderFilter, Pagination};
use crate::row_mapper::JoinedRow;

const HEADER_COLUMNS: &str = "o.id, o.number, o.date, o.customer, o.address";

const JOINED_COLUMNS: &str = "o.id AS order_id, o.number, o.date, o.customer, o.address, \
     i.id AS item_id, i.name AS item_name, i.quantity, i.price, i.total";

/// Postgres-backed connection provider.
///
/// Uses the SQLx pool, which is `Send + Sync`; each [`PgSession`] owns one
/// pooled connection until it is committed or dropped.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for PostgresOrderStore {
    type Session = PgSession;

    async fn begin(&self) -> Result<Self::Session, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgSession { tx })
    }
}

/// Open transaction on a pooled connection. Dropping it rolls back.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderSession for PgSession {
    async fn insert_order(&mut self, header: &OrderHeader) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sales_orders (id, number, date, customer, address)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(header.id.as_uuid())
        .bind(&header.number)
        .bind(header.date)
        .bind(&header.customer)
        .bind(&header.address)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        Ok(result.rows_affected())
    }

    async fn insert_item(&mut self, item: &Item, position: usize) -> Result<u64, StoreError> {
        let position = i32::try_from(position)
            .map_err(|_| StoreError::query("insert_item", "item position out of range"))?;

        let result = sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, position, name, quantity, price, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(position)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.total)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        Ok(result.rows_affected())
    }

    async fn update_order(&mut self, header: &OrderHeader) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sales_orders
            SET number = $2, date = $3, customer = $4, address = $5
            WHERE id = $1
            "#,
        )
        .bind(header.id.as_uuid())
        .bind(&header.number)
        .bind(header.date)
        .bind(&header.customer)
        .bind(&header.address)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        Ok(result.rows_affected())
    }

    async fn delete_items(&mut self, order_id: OrderId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;

        Ok(result.rows_affected())
    }

    async fn delete_order(&mut self, order_id: OrderId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sales_orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;

        Ok(result.rows_affected())
    }

    async fn fetch_order_rows(&mut self, order_id: OrderId) -> Result<Vec<JoinedRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                o.id AS order_id, o.number, o.date, o.customer, o.address,
                i.id AS item_id, i.name AS item_name, i.quantity, i.price, i.total
            FROM sales_orders o
            LEFT JOIN order_items i ON i.order_id = o.id
            WHERE o.id = $1
            ORDER BY i.position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("fetch_order_rows", e))?;

        decode_all(&rows, decode_joined)
    }

    async fn fetch_headers(
        &mut self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<OrderHeader>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(HEADER_COLUMNS).push(" FROM sales_orders o");
        push_conditions(&mut qb, &filter.conditions());
        push_page(&mut qb, pagination);

        let rows = qb
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_headers", e))?;

        decode_all(&rows, decode_header)
    }

    async fn fetch_page_rows(
        &mut self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<JoinedRow>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("WITH page AS (SELECT ");
        qb.push(HEADER_COLUMNS).push(" FROM sales_orders o");
        push_conditions(&mut qb, &filter.conditions());
        push_page(&mut qb, pagination);
        qb.push(") SELECT ")
            .push(JOINED_COLUMNS)
            .push(" FROM page o LEFT JOIN order_items i ON i.order_id = o.id")
            .push(" ORDER BY o.date DESC, o.id ASC, i.position ASC");

        let rows = qb
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_page_rows", e))?;

        decode_all(&rows, decode_joined)
    }

    async fn count(&mut self, filter: &OrderFilter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM sales_orders o");
        push_conditions(&mut qb, &filter.conditions());

        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_orders", e))?;

        Ok(total.max(0) as u64)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Append ` WHERE c1 AND c2 ...`, binding every user-supplied value.
fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, conditions: &[Condition]) {
    for (idx, condition) in conditions.iter().enumerate() {
        qb.push(if idx == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::NumberOrCustomerContains(keyword) => {
                let pattern = like_pattern(keyword);
                qb.push("(o.number ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR o.customer ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            Condition::OnDay(day) => {
                qb.push("o.date::date = ").push_bind(*day);
            }
        }
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, pagination: Pagination) {
    let offset = i64::try_from(pagination.offset()).unwrap_or(i64::MAX);
    qb.push(" ORDER BY o.date DESC, o.id ASC LIMIT ")
        .push_bind(i64::from(pagination.limit()))
        .push(" OFFSET ")
        .push_bind(offset);
}

fn decode_all<T>(
    rows: &[PgRow],
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, StoreError> {
    rows.iter()
        .map(|row| decode(row).map_err(|e| StoreError::Decode(e.to_string())))
        .collect()
}

fn decode_header(row: &PgRow) -> Result<OrderHeader, sqlx::Error> {
    Ok(OrderHeader {
        id: OrderId::from_uuid(row.try_get("id")?),
        number: row.try_get("number")?,
        date: row.try_get("date")?,
        customer: row.try_get("customer")?,
        address: row.try_get("address")?,
    })
}

fn decode_joined(row: &PgRow) -> Result<JoinedRow, sqlx::Error> {
    let item_id: Option<uuid::Uuid> = row.try_get("item_id")?;
    Ok(JoinedRow {
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        number: row.try_get("number")?,
        date: row.try_get("date")?,
        customer: row.try_get("customer")?,
        address: row.try_get("address")?,
        item_id: item_id.map(ItemId::from_uuid),
        item_name: row.try_get("item_name")?,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        total: row.try_get("total")?,
    })
}
