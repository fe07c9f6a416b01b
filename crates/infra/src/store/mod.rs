//! Store sessions: the statement-level boundary the repository composes.
//!
//! A [`ConnectionProvider`] hands out one [`OrderSession`] per repository
//! operation. A session is a transaction: `commit` makes its writes visible,
//! dropping it without committing discards them and releases the connection.

pub mod error;
pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use orderdesk_core::OrderId;
use orderdesk_sales::{Item, OrderHeader};

use crate::query::{OrderFilter, Pagination};
use crate::row_mapper::JoinedRow;

pub use error::StoreError;
pub use in_memory::{InMemoryOrderStore, InMemorySession};
pub use postgres::{PgSession, PostgresOrderStore};

/// Source of scoped store sessions.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Session: OrderSession;

    /// Acquire a connection and open a transaction on it.
    async fn begin(&self) -> Result<Self::Session, StoreError>;
}

/// One transaction against the order and item tables.
///
/// Write methods return the number of rows affected. Listing methods order by
/// date descending, then id ascending.
#[async_trait]
pub trait OrderSession: Send {
    async fn insert_order(&mut self, header: &OrderHeader) -> Result<u64, StoreError>;

    /// Insert one item row. `position` is the item's index within its order.
    async fn insert_item(&mut self, item: &Item, position: usize) -> Result<u64, StoreError>;

    /// Overwrite the header columns of `header.id`.
    async fn update_order(&mut self, header: &OrderHeader) -> Result<u64, StoreError>;

    async fn delete_items(&mut self, order_id: OrderId) -> Result<u64, StoreError>;

    async fn delete_order(&mut self, order_id: OrderId) -> Result<u64, StoreError>;

    /// Left-join rows of a single order, items in position order.
    async fn fetch_order_rows(&mut self, order_id: OrderId) -> Result<Vec<JoinedRow>, StoreError>;

    /// One page of headers matching `filter`.
    async fn fetch_headers(
        &mut self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<OrderHeader>, StoreError>;

    /// Left-join rows for one page of orders matching `filter`.
    async fn fetch_page_rows(
        &mut self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<JoinedRow>, StoreError>;

    async fn count(&mut self, filter: &OrderFilter) -> Result<u64, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}

#[async_trait]
impl<P> ConnectionProvider for Arc<P>
where
    P: ConnectionProvider + ?Sized,
{
    type Session = P::Session;

    async fn begin(&self) -> Result<Self::Session, StoreError> {
        (**self).begin().await
    }
}
