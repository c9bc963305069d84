//! Orders: an order row with its line items
//!
//! Each line item stores a JSON snapshot of the product at placement time, so
//! later product edits never change an existing order or its `total_paid`.
//!
//! [`OrderRepository`] is the persistence facade. [`OrderService`] resolves
//! product references into snapshots and pages listings.

mod model;
mod repository;
mod service;

pub use model::{
    LineItem, NewLineItem, NewOrder, Order, OrderItem, OrderStatus, OrderUpdate, PlaceOrder,
    TransferSlip,
};
pub use repository::{OrderRepository, ORDER_SHAPE};
pub use service::OrderService;
