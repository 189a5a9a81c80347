//! Order and order line entities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::crud::{Columns, Model, Value};

/// Smallest quantity a single order line may carry.
pub const MIN_QUANTITY: i32 = 1;
/// Largest quantity a single order line may carry.
pub const MAX_QUANTITY: i32 = 100;

/// Lifecycle state of an order.
///
/// Orders start as `Pending`. Both `Processed` and `Cancelled` are terminal and
/// can only be reached from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Processed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processed => "processed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if an order in this state may move to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processed" => Ok(OrderStatus::Processed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub owner_id: i64,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_id: i64,
    pub status: OrderStatus,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub owner_id: Option<i64>,
    pub status: Option<OrderStatus>,
}

/// Join row linking an order to an item with a quantity.
///
/// `unit_price` is the item price at the time the order was placed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub item_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_id: i64,
    pub item_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct OrderItemPatch {
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderItemFilter {
    pub order_id: Option<i64>,
}

/// A requested order line before prices are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item_id: i64,
    pub quantity: i32,
}

/// A priced order line ready to be persisted with its order.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub item_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// An order together with its lines.
#[derive(Debug, Clone)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Number of orders in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderCounts {
    pub pending: i64,
    pub processed: i64,
    pub cancelled: i64,
}

impl OrderCounts {
    pub fn set(&mut self, status: OrderStatus, count: i64) {
        match status {
            OrderStatus::Pending => self.pending = count,
            OrderStatus::Processed => self.processed = count,
            OrderStatus::Cancelled => self.cancelled = count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.processed + self.cancelled
    }
}

impl Columns for NewOrder {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("owner_id", self.owner_id.into()),
            ("status", self.status.as_str().into()),
            ("total_amount", self.total_amount.into()),
        ]
    }
}

impl Columns for OrderPatch {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        self.status
            .map(|status| vec![("status", status.as_str().into())])
            .unwrap_or_default()
    }
}

impl Columns for OrderFilter {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(owner_id) = self.owner_id {
            columns.push(("owner_id", owner_id.into()));
        }
        if let Some(status) = self.status {
            columns.push(("status", status.as_str().into()));
        }
        columns
    }
}

impl Columns for NewOrderItem {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("order_id", self.order_id.into()),
            ("item_id", self.item_id.into()),
            ("quantity", self.quantity.into()),
            ("unit_price", self.unit_price.into()),
        ]
    }
}

impl Columns for OrderItemPatch {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        self.quantity
            .map(|quantity| vec![("quantity", quantity.into())])
            .unwrap_or_default()
    }
}

impl Columns for OrderItemFilter {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        self.order_id
            .map(|order_id| vec![("order_id", order_id.into())])
            .unwrap_or_default()
    }
}

impl Model for Order {
    const TABLE: &'static str = "orders";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "owner_id",
        "status",
        "total_amount",
        "created_at",
        "updated_at",
    ];

    type Create = NewOrder;
    type Update = OrderPatch;
    type Filter = OrderFilter;

    fn id(&self) -> i64 {
        self.id
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "id" => self.id.into(),
            "owner_id" => self.owner_id.into(),
            "status" => self.status.as_str().into(),
            "total_amount" => self.total_amount.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => Value::Null,
        }
    }

    fn build(id: i64, now: DateTime<Utc>, data: NewOrder) -> Self {
        Self {
            id,
            owner_id: data.owner_id,
            status: data.status,
            total_amount: data.total_amount,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, data: OrderPatch, now: DateTime<Utc>) {
        if let Some(status) = data.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

impl Model for OrderItem {
    const TABLE: &'static str = "order_items";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "order_id",
        "item_id",
        "quantity",
        "unit_price",
        "created_at",
        "updated_at",
    ];

    type Create = NewOrderItem;
    type Update = OrderItemPatch;
    type Filter = OrderItemFilter;

    fn id(&self) -> i64 {
        self.id
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "id" => self.id.into(),
            "order_id" => self.order_id.into(),
            "item_id" => self.item_id.into(),
            "quantity" => self.quantity.into(),
            "unit_price" => self.unit_price.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => Value::Null,
        }
    }

    fn build(id: i64, now: DateTime<Utc>, data: NewOrderItem) -> Self {
        Self {
            id,
            order_id: data.order_id,
            item_id: data.item_id,
            quantity: data.quantity,
            unit_price: data.unit_price,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, data: OrderItemPatch, now: DateTime<Utc>) {
        if let Some(quantity) = data.quantity {
            self.quantity = quantity;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_orders_transition() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processed));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Processed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processed));
    }

    #[test]
    fn test_status_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_line_total() {
        let now = Utc::now();
        let line = OrderItem::build(
            1,
            now,
            NewOrderItem {
                order_id: 1,
                item_id: 2,
                quantity: 3,
                unit_price: Decimal::new(250, 2),
            },
        );
        assert_eq!(line.line_total(), Decimal::new(750, 2));
    }

    #[test]
    fn test_order_counts_total() {
        let mut counts = OrderCounts::default();
        counts.set(OrderStatus::Pending, 2);
        counts.set(OrderStatus::Cancelled, 1);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.processed, 0);
    }
}
