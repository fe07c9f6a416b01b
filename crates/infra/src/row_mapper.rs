//! Folds flat `orders LEFT JOIN items` rows back into nested aggregates.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

use orderdesk_core::{ItemId, OrderId};
use orderdesk_sales::{Item, Order, OrderHeader};

/// One row of the order/item left join.
///
/// Header columns are always present. Item columns are all `None` when the
/// order has no items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub order_id: OrderId,
    pub number: String,
    pub date: NaiveDateTime,
    pub customer: String,
    pub address: Option<String>,

    pub item_id: Option<ItemId>,
    pub item_name: Option<String>,
    pub quantity: Option<i32>,
    pub price: Option<Decimal>,
    pub total: Option<Decimal>,
}

impl JoinedRow {
    /// Row for an order that has no items.
    pub fn header_only(header: &OrderHeader) -> Self {
        Self {
            order_id: header.id,
            number: header.number.clone(),
            date: header.date,
            customer: header.customer.clone(),
            address: header.address.clone(),
            item_id: None,
            item_name: None,
            quantity: None,
            price: None,
            total: None,
        }
    }

    /// Row for one item of an order.
    pub fn with_item(header: &OrderHeader, item: &Item) -> Self {
        Self {
            item_id: Some(item.id),
            item_name: Some(item.name.clone()),
            quantity: Some(item.quantity),
            price: Some(item.price),
            total: Some(item.total),
            ..Self::header_only(header)
        }
    }

    fn header(&self) -> OrderHeader {
        OrderHeader {
            id: self.order_id,
            number: self.number.clone(),
            date: self.date,
            customer: self.customer.clone(),
            address: self.address.clone(),
        }
    }

    fn has_item_columns(&self) -> bool {
        self.item_id.is_some()
            || self.item_name.is_some()
            || self.quantity.is_some()
            || self.price.is_some()
            || self.total.is_some()
    }

    fn item(&self) -> Result<Option<Item>, RowMapError> {
        if !self.has_item_columns() {
            return Ok(None);
        }

        let missing = |column: &'static str| RowMapError::IncompleteItem {
            order_id: self.order_id,
            column,
        };

        Ok(Some(Item {
            id: self.item_id.ok_or_else(|| missing("item_id"))?,
            order_id: self.order_id,
            name: self.item_name.clone().ok_or_else(|| missing("item_name"))?,
            quantity: self.quantity.ok_or_else(|| missing("quantity"))?,
            price: self.price.ok_or_else(|| missing("price"))?,
            total: self.total.ok_or_else(|| missing("total"))?,
        }))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowMapError {
    #[error("item row for order {order_id} is missing column {column}")]
    IncompleteItem {
        order_id: OrderId,
        column: &'static str,
    },
}

/// Orders keyed by id, kept in the order their ids first appeared.
#[derive(Debug, Clone, Default)]
pub struct MappedOrders {
    index: HashMap<OrderId, usize>,
    orders: Vec<Order>,
}

impl MappedOrders {
    /// Fold joined rows into aggregates.
    ///
    /// The first row seen for an order fixes its header; later rows only
    /// contribute items, appended in row order.
    pub fn from_rows<I>(rows: I) -> Result<Self, RowMapError>
    where
        I: IntoIterator<Item = JoinedRow>,
    {
        let mut mapped = Self::default();
        for row in rows {
            mapped.push(row)?;
        }
        Ok(mapped)
    }

    fn push(&mut self, row: JoinedRow) -> Result<(), RowMapError> {
        let item = row.item()?;

        let slot = match self.index.get(&row.order_id) {
            Some(&slot) => slot,
            None => {
                let slot = self.orders.len();
                self.orders.push(Order::from_header(row.header()));
                self.index.insert(row.order_id, slot);
                slot
            }
        };

        if let Some(item) = item {
            self.orders[slot].items.push(item);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.index.get(id).map(|&slot| &self.orders[slot])
    }

    /// All orders, in first-appearance order.
    pub fn into_orders(self) -> Vec<Order> {
        self.orders
    }

    /// The single order of a point lookup, or `None` if no row came back.
    pub fn into_single(self) -> Option<Order> {
        self.orders.into_iter().next()
    }
}
