//! Order records and the status state machine.
//!
//! An order is created Pending, moves forward only
//! (Pending → Prepared → Served), and once Served it is immutable and lives
//! in the history collection. Tokens are assigned by the ledger; they are
//! unique and strictly increasing but may have gaps when a write fails
//! mid-submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    menu::{Bill, Selection},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Prepared,
    Served,
}

impl OrderStatus {
    /// Forward-only transition table. Returns the resulting status, or
    /// `None` when the move would go backwards or out of `Served`.
    /// Re-applying the current status yields the current status unchanged,
    /// so staff actions are idempotent.
    pub fn transition(self, next: OrderStatus) -> Option<OrderStatus> {
        use OrderStatus::*;

        match (self, next) {
            (Pending, Prepared) | (Pending, Served) | (Prepared, Served) => Some(next),
            (Pending, Pending) | (Prepared, Prepared) | (Served, Served) => Some(self),
            _ => None,
        }
    }
}

/// One bill line. `amount` is always `qty * price`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub qty: u32,
    pub price: u64,
    pub amount: u64,
}

/// A confirmed order as persisted in the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub token: u64,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub register_no: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub arrears: String,
    #[serde(default)]
    pub year_sem: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pickup_time: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub diet: String,
    #[serde(default)]
    pub comments: String,
    pub items: Vec<OrderItem>,
    pub total: u64,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

/// Submission payload for `POST /order`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub register_no: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub arrears: String,
    #[serde(default)]
    pub year_sem: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pickup_time: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub diet: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub items: Vec<Selection>,
}

impl OrderRequest {
    /// Checks the required fields and computes the bill. Runs before
    /// anything is enqueued, so a rejected submission never touches the
    /// counter or the ledger files.
    pub fn validate(&self) -> Result<Bill, AppError> {
        if self.name.trim().is_empty() || self.phone.trim().is_empty() || self.items.is_empty() {
            return Err(AppError::Validation(
                "name, phone and at least one item required".into(),
            ));
        }

        // A zero total also covers the no-positive-quantity case: amounts
        // are non-negative, so total 0 means nothing chargeable was picked.
        let bill = Bill::compute(&self.items);
        if bill.total == 0 {
            return Err(AppError::Validation(
                "order total must be greater than zero".into(),
            ));
        }

        Ok(bill)
    }
}

fn clean(s: &str) -> String {
    s.trim().to_string()
}

impl Order {
    pub fn create(token: u64, request: &OrderRequest, bill: &Bill) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            token,
            name: clean(&request.name),
            phone: clean(&request.phone),
            email: clean(&request.email),
            register_no: clean(&request.register_no),
            branch: clean(&request.branch),
            class: clean(&request.class),
            arrears: clean(&request.arrears),
            year_sem: clean(&request.year_sem),
            address: clean(&request.address),
            pickup_time: clean(&request.pickup_time),
            payment_method: clean(&request.payment_method),
            diet: clean(&request.diet),
            comments: clean(&request.comments),
            items: bill.lines.clone(),
            total: bill.total,
            created_at: Utc::now(),
            status: OrderStatus::Pending,
        }
    }
}
