use chrono::{NaiveDateTime, SubsecRound};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainError, DomainResult, ItemId, OrderId};

use crate::validate::validate_draft;

/// Fractional-second digits an order date keeps. Matches Postgres
/// `TIMESTAMP`, so a stored date reads back unchanged.
const DATE_PRECISION_DIGITS: u16 = 6;

/// Header columns of a sales order (everything except its items).
///
/// Listing and search return headers only; the point lookup returns the full
/// [`Order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub id: OrderId,
    /// User-supplied order number. Not guaranteed unique.
    pub number: String,
    pub date: NaiveDateTime,
    pub customer: String,
    pub address: Option<String>,
}

/// Line item owned exclusively by one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub order_id: OrderId,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    /// Stored as supplied; never recomputed from `quantity * price`.
    pub total: Decimal,
}

/// Aggregate root: a sales order and its items, in line order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(flatten)]
    pub header: OrderHeader,
    pub items: Vec<Item>,
}

impl Order {
    /// An order with no items yet.
    pub fn from_header(header: OrderHeader) -> Self {
        Self {
            header,
            items: Vec::new(),
        }
    }

    pub fn id(&self) -> OrderId {
        self.header.id
    }
}

/// Caller input for a line item. Carries no identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total: Decimal,
}

impl ItemDraft {
    /// Attach the draft to `order_id` under a freshly minted item id.
    pub fn into_item(self, order_id: OrderId) -> Item {
        Item {
            id: ItemId::new(),
            order_id,
            name: self.name,
            quantity: self.quantity,
            price: self.price,
            total: self.total,
        }
    }
}

/// Caller input for create and update: the full order without identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub number: String,
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
    pub customer: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemDraft>,
}

impl OrderDraft {
    /// Validate the draft and materialize it as order `id`.
    ///
    /// The date is truncated to microseconds.
    /// Every item gets a new id, so calling this for an update yields a
    /// completely fresh item set.
    pub fn into_order(self, id: OrderId) -> DomainResult<Order> {
        validate_draft(&self)?;

        let date = self
            .date
            .ok_or_else(|| DomainError::validation("order date is required"))?
            .trunc_subsecs(DATE_PRECISION_DIGITS);

        let items = self
            .items
            .into_iter()
            .map(|item| item.into_item(id))
            .collect();

        Ok(Order {
            header: OrderHeader {
                id,
                number: self.number,
                date,
                customer: self.customer,
                address: self.address,
            },
            items,
        })
    }
}
