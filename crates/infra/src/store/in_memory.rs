use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use orderdesk_core::OrderId;
use orderdesk_sales::{Item, OrderHeader};

use super::{ConnectionProvider, OrderSession, StoreError};
use crate::query::{OrderFilter, Pagination};
use crate::row_mapper::JoinedRow;

#[derive(Debug, Clone)]
struct ItemRow {
    item: Item,
    position: usize,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    orders: Vec<OrderHeader>,
    items: Vec<ItemRow>,
}

impl Tables {
    fn has_order(&self, id: OrderId) -> bool {
        self.orders.iter().any(|o| o.id == id)
    }

    fn matching(&self, filter: &OrderFilter) -> Vec<&OrderHeader> {
        let conditions = filter.conditions();
        let mut headers: Vec<&OrderHeader> = self
            .orders
            .iter()
            .filter(|h| conditions.iter().all(|c| c.matches(h)))
            .collect();
        headers.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        headers
    }

    fn page(&self, filter: &OrderFilter, pagination: Pagination) -> Vec<&OrderHeader> {
        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        self.matching(filter)
            .into_iter()
            .skip(offset)
            .take(pagination.limit() as usize)
            .collect()
    }

    fn joined_rows(&self, header: &OrderHeader) -> Vec<JoinedRow> {
        let mut items: Vec<&ItemRow> = self
            .items
            .iter()
            .filter(|row| row.item.order_id == header.id)
            .collect();
        items.sort_by_key(|row| row.position);

        if items.is_empty() {
            return vec![JoinedRow::header_only(header)];
        }
        items
            .into_iter()
            .map(|row| JoinedRow::with_item(header, &row.item))
            .collect()
    }
}

/// Fault injection for exercising rollback paths.
#[derive(Debug, Default)]
struct Faults {
    armed: AtomicBool,
    item_inserts_left: AtomicUsize,
}

impl Faults {
    fn check_item_insert(&self) -> Result<(), StoreError> {
        if !self.armed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let left = self.item_inserts_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreError::query("insert_item", "injected fault"));
        }
        self.item_inserts_left.store(left - 1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory order store with transactional sessions.
///
/// Intended for tests/dev. A session holds the store lock for its whole
/// lifetime and works on a private copy of the tables, which `commit` swaps
/// in. Sessions are therefore fully serialized. Item inserts enforce the
/// parent-order reference and the positive-quantity check like the Postgres
/// schema does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the next `successful` item inserts through, then fail every item
    /// insert until [`clear_faults`](Self::clear_faults) is called.
    pub fn fail_item_inserts_after(&self, successful: usize) {
        self.faults
            .item_inserts_left
            .store(successful, Ordering::SeqCst);
        self.faults.armed.store(true, Ordering::SeqCst);
    }

    pub fn clear_faults(&self) {
        self.faults.armed.store(false, Ordering::SeqCst);
    }

    /// Committed `(order rows, item rows)`.
    pub async fn row_counts(&self) -> (usize, usize) {
        let tables = self.tables.lock().await;
        (tables.orders.len(), tables.items.len())
    }
}

#[async_trait]
impl ConnectionProvider for InMemoryOrderStore {
    type Session = InMemorySession;

    async fn begin(&self) -> Result<Self::Session, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemorySession {
            guard,
            working,
            faults: self.faults.clone(),
        })
    }
}

/// Transaction over an [`InMemoryOrderStore`].
#[derive(Debug)]
pub struct InMemorySession {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Arc<Faults>,
}

#[async_trait]
impl OrderSession for InMemorySession {
    async fn insert_order(&mut self, header: &OrderHeader) -> Result<u64, StoreError> {
        if self.working.has_order(header.id) {
            return Err(StoreError::constraint(
                "insert_order",
                format!("duplicate order id {}", header.id),
            ));
        }
        self.working.orders.push(header.clone());
        Ok(1)
    }

    async fn insert_item(&mut self, item: &Item, position: usize) -> Result<u64, StoreError> {
        self.faults.check_item_insert()?;

        if !self.working.has_order(item.order_id) {
            return Err(StoreError::constraint(
                "insert_item",
                format!("order {} does not exist", item.order_id),
            ));
        }
        if item.quantity <= 0 {
            return Err(StoreError::constraint(
                "insert_item",
                "quantity must be positive",
            ));
        }
        if self.working.items.iter().any(|row| row.item.id == item.id) {
            return Err(StoreError::constraint(
                "insert_item",
                format!("duplicate item id {}", item.id),
            ));
        }

        self.working.items.push(ItemRow {
            item: item.clone(),
            position,
        });
        Ok(1)
    }

    async fn update_order(&mut self, header: &OrderHeader) -> Result<u64, StoreError> {
        match self.working.orders.iter_mut().find(|o| o.id == header.id) {
            Some(existing) => {
                *existing = header.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_items(&mut self, order_id: OrderId) -> Result<u64, StoreError> {
        let before = self.working.items.len();
        self.working.items.retain(|row| row.item.order_id != order_id);
        Ok((before - self.working.items.len()) as u64)
    }

    async fn delete_order(&mut self, order_id: OrderId) -> Result<u64, StoreError> {
        if self.working.items.iter().any(|row| row.item.order_id == order_id) {
            return Err(StoreError::constraint(
                "delete_order",
                format!("order {order_id} still has items"),
            ));
        }
        let before = self.working.orders.len();
        self.working.orders.retain(|o| o.id != order_id);
        Ok((before - self.working.orders.len()) as u64)
    }

    async fn fetch_order_rows(&mut self, order_id: OrderId) -> Result<Vec<JoinedRow>, StoreError> {
        Ok(self
            .working
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .map(|header| self.working.joined_rows(header))
            .unwrap_or_default())
    }

    async fn fetch_headers(
        &mut self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<OrderHeader>, StoreError> {
        Ok(self
            .working
            .page(filter, pagination)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn fetch_page_rows(
        &mut self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Vec<JoinedRow>, StoreError> {
        Ok(self
            .working
            .page(filter, pagination)
            .into_iter()
            .flat_map(|header| self.working.joined_rows(header))
            .collect())
    }

    async fn count(&mut self, filter: &OrderFilter) -> Result<u64, StoreError> {
        Ok(self.working.matching(filter).len() as u64)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemorySession {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}
