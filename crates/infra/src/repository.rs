//! Order repository: CRUD, listing and search over the order aggregate.
//!
//! Every operation runs in exactly one store session. Multi-statement writes
//! (create, update, delete) commit only after their last statement succeeds,
//! so a failure part-way through never leaves a partial aggregate behind.

use thiserror::Error;
use tracing::{debug, instrument, warn, Span};

use orderdesk_core::{DomainError, OrderId};
use orderdesk_sales::{Item, Order, OrderDraft, OrderHeader};

use crate::query::{OrderFilter, Page, Pagination};
use crate::row_mapper::MappedOrders;
use crate::store::{ConnectionProvider, OrderSession, StoreError};

/// Repository operation error.
///
/// The `Persistence` message is deliberately generic; the store detail is
/// only reachable through `source()` and the operation's tracing span.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order not found")]
    NotFound,

    #[error("persistence failure")]
    Persistence(#[source] StoreError),
}

/// Stable discriminant for boundary layers mapping errors to responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence_error",
        }
    }
}

impl RepositoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::Validation(_) => ErrorKind::Validation,
            RepositoryError::NotFound => ErrorKind::NotFound,
            RepositoryError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<DomainError> for RepositoryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                RepositoryError::Validation(msg)
            }
        }
    }
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        RepositoryError::Persistence(err)
    }
}

/// Repository over any [`ConnectionProvider`].
#[derive(Debug, Clone)]
pub struct OrderRepository<P> {
    provider: P,
}

impl<P> OrderRepository<P>
where
    P: ConnectionProvider,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Validate and persist a new order with fresh ids for it and its items.
    ///
    /// Returns `None` if the header insert wrote no row.
    #[instrument(
        skip(self, draft),
        fields(
            number = %draft.number,
            item_count = draft.items.len(),
            order_id = tracing::field::Empty
        ),
        err(Debug)
    )]
    pub async fn create(&self, draft: OrderDraft) -> Result<Option<Order>, RepositoryError> {
        let order = draft.into_order(OrderId::new())?;
        Span::current().record("order_id", tracing::field::display(order.id()));

        let mut session = self.provider.begin().await?;
        if session.insert_order(&order.header).await? == 0 {
            warn!("order insert wrote no row");
            return Ok(None);
        }
        insert_items(&mut session, &order.items).await?;
        session.commit().await?;

        debug!("order created");
        Ok(Some(order))
    }

    /// Point lookup of a full aggregate.
    #[instrument(skip(self), fields(order_id = %id), err(Debug))]
    pub async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut session = self.provider.begin().await?;
        let rows = session.fetch_order_rows(id).await?;
        drop(session);

        let order = MappedOrders::from_rows(rows)
            .map_err(StoreError::from)?
            .into_single();
        Ok(order)
    }

    /// Like [`find_by_id`](Self::find_by_id), but a missing order is
    /// [`RepositoryError::NotFound`].
    pub async fn get_by_id(&self, id: OrderId) -> Result<Order, RepositoryError> {
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// One page of order headers, newest first.
    #[instrument(skip(self), fields(page = pagination.page(), limit = pagination.limit()), err(Debug))]
    pub async fn list(&self, pagination: Pagination) -> Result<Vec<OrderHeader>, RepositoryError> {
        self.search(&OrderFilter::default(), pagination).await
    }

    /// Total number of orders.
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        self.search_count(&OrderFilter::default()).await
    }

    /// [`list`](Self::list) plus totals, read in one session.
    pub async fn list_page(&self, pagination: Pagination) -> Result<Page<OrderHeader>, RepositoryError> {
        self.search_page(&OrderFilter::default(), pagination).await
    }

    /// Replace an order's header and its entire item set.
    ///
    /// Returns `false` (and touches nothing) if the order does not exist.
    #[instrument(
        skip(self, draft),
        fields(order_id = %id, item_count = draft.items.len(), items_removed = tracing::field::Empty),
        err(Debug)
    )]
    pub async fn update(&self, id: OrderId, draft: OrderDraft) -> Result<bool, RepositoryError> {
        let order = draft.into_order(id)?;

        let mut session = self.provider.begin().await?;
        if session.update_order(&order.header).await? == 0 {
            warn!("update targeted a missing order");
            return Ok(false);
        }
        let removed = session.delete_items(id).await?;
        insert_items(&mut session, &order.items).await?;
        session.commit().await?;

        Span::current().record("items_removed", removed);
        debug!("order updated");
        Ok(true)
    }

    /// Delete an order and all of its items.
    ///
    /// Returns `false` if no order row existed.
    #[instrument(skip(self), fields(order_id = %id, items_removed = tracing::field::Empty), err(Debug))]
    pub async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut session = self.provider.begin().await?;
        let removed = session.delete_items(id).await?;
        if session.delete_order(id).await? == 0 {
            warn!("delete targeted a missing order");
            return Ok(false);
        }
        session.commit().await?;

        Span::current().record("items_removed", removed);
        debug!("order deleted");
        Ok(true)
    }

    /// One page of headers matching `filter`, newest first.
    #[instrument(skip(self), fields(page = pagination.page(), limit = pagination.limit()), err(Debug))]
    pub async fn search(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<OrderHeader>, RepositoryError> {
        let mut session = self.provider.begin().await?;
        let headers = session.fetch_headers(filter, pagination).await?;
        Ok(headers)
    }

    /// Number of orders matching `filter`.
    #[instrument(skip(self), err(Debug))]
    pub async fn search_count(&self, filter: &OrderFilter) -> Result<u64, RepositoryError> {
        let mut session = self.provider.begin().await?;
        let total = session.count(filter).await?;
        Ok(total)
    }

    /// [`search`](Self::search) plus totals, read in one session.
    #[instrument(skip(self), fields(page = pagination.page(), limit = pagination.limit(), total = tracing::field::Empty), err(Debug))]
    pub async fn search_page(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<OrderHeader>, RepositoryError> {
        let mut session = self.provider.begin().await?;
        let headers = session.fetch_headers(filter, pagination).await?;
        let total = session.count(filter).await?;

        Span::current().record("total", total);
        Ok(Page::new(headers, pagination, total))
    }

    /// One page of full aggregates matching `filter`, newest first.
    #[instrument(skip(self), fields(page = pagination.page(), limit = pagination.limit()), err(Debug))]
    pub async fn search_with_items(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut session = self.provider.begin().await?;
        let rows = session.fetch_page_rows(filter, pagination).await?;
        drop(session);

        let orders = MappedOrders::from_rows(rows)
            .map_err(StoreError::from)?
            .into_orders();
        Ok(orders)
    }
}

async fn insert_items<S>(session: &mut S, items: &[Item]) -> Result<(), StoreError>
where
    S: OrderSession,
{
    for (position, item) in items.iter().enumerate() {
        if session.insert_item(item, position).await? == 0 {
            return Err(StoreError::query("insert_item", "item insert wrote no row"));
        }
    }
    Ok(())
}
