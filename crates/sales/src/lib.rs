//! Sales order domain module.
//!
//! The order aggregate (header plus owned line items), the caller-facing
//! drafts used for create/update, and the write-path validator. No IO.

pub mod order;
pub mod validate;

pub use order::{Item, ItemDraft, Order, OrderDraft, OrderHeader};
pub use validate::validate_draft;
