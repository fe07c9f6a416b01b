//! Write-path validation for order drafts.
//!
//! Runs before every create and update. Reads and deletes never validate.

use chrono::{NaiveDate, NaiveDateTime};

use orderdesk_core::{DomainError, DomainResult};

use crate::order::OrderDraft;

/// Default-valued dates clients send in place of "no date": the epoch
/// (`NaiveDateTime::default()`), `0001-01-01T00:00:00`, and
/// `NaiveDateTime::MIN`.
fn is_set(date: NaiveDateTime) -> bool {
    let year_one = NaiveDate::from_ymd_opt(1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    date != NaiveDateTime::default() && date != NaiveDateTime::MIN && Some(date) != year_one
}

/// Check the fields an order cannot be persisted without.
///
/// Rejects a blank order number, an unset date (`None` or a default-valued
/// sentinel), a blank customer, and any item whose quantity is not positive.
pub fn validate_draft(draft: &OrderDraft) -> DomainResult<()> {
    if draft.number.trim().is_empty() {
        return Err(DomainError::validation("order number is required"));
    }

    if !draft.date.is_some_and(is_set) {
        return Err(DomainError::validation("order date is required"));
    }

    if draft.customer.trim().is_empty() {
        return Err(DomainError::validation("customer is required"));
    }

    for (idx, item) in draft.items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "item {} quantity must be positive",
                idx + 1
            )));
        }
    }

    Ok(())
}
