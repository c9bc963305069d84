//! Order aggregate and its write inputs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::products::Product;
use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, awaiting payment
    #[default]
    Waiting,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(Self::Waiting),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!(
                "unknown order status {other:?}, expected one of waiting, paid, shipped, completed, cancelled"
            )),
        }
    }
}

/// Proof-of-payment file attached to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSlip {
    pub filename: String,
    pub url: String,
}

/// One line of an order
///
/// `product` is the product as it was when the order was placed, not a live
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub qty: i64,
    pub product: Product,
}

/// An order with its line items and computed total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub address: String,
    pub contact: String,
    #[serde(default)]
    pub transfer_slip: Option<TransferSlip>,
    pub status: OrderStatus,
    #[serde(rename = "products", default)]
    pub items: Vec<LineItem>,
    /// Σ snapshot price × qty, computed by the store
    pub total_paid: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Line item input: a product snapshot and a quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub qty: i64,
    pub product: Product,
}

/// Input for inserting an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: String,
    pub address: String,
    pub contact: String,
    #[serde(default)]
    pub transfer_slip: Option<TransferSlip>,
    #[serde(default)]
    pub status: OrderStatus,
    pub items: Vec<NewLineItem>,
}

impl NewOrder {
    /// Σ price × qty over the snapshots
    pub fn total_paid(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.product.price * item.qty as f64)
            .sum()
    }

    pub(crate) fn validate(&self) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Insert;
        if self.user_id.trim().is_empty() {
            return Err(RepositoryError::validation_failed(operation, "user id is required"));
        }
        validate_items(operation, self.items.iter().map(|item| item.qty))
    }
}

/// Partial order update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub transfer_slip: Option<TransferSlip>,
}

/// Order placement request resolved by [`OrderService`](super::OrderService)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub user_id: String,
    pub address: String,
    pub contact: String,
    #[serde(default)]
    pub transfer_slip: Option<TransferSlip>,
    pub items: Vec<OrderItem>,
}

impl PlaceOrder {
    pub(crate) fn validate(&self) -> RepositoryResult<()> {
        validate_items(
            RepositoryOperation::Insert,
            self.items.iter().map(|item| item.qty),
        )
    }
}

/// Product reference and quantity requested by a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub qty: i64,
}

fn validate_items(
    operation: RepositoryOperation,
    quantities: impl ExactSizeIterator<Item = i64>,
) -> RepositoryResult<()> {
    if quantities.len() == 0 {
        return Err(RepositoryError::validation_failed(
            operation,
            "order must contain at least one line item",
        ));
    }
    for (i, qty) in quantities.enumerate() {
        if qty <= 0 {
            return Err(RepositoryError::validation_failed(
                operation,
                format!("line item {i} has non-positive quantity {qty}"),
            ));
        }
    }
    Ok(())
}
