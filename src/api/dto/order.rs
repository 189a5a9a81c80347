//! DTOs for order endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use crate::api::dto::pagination::PaginationParams;
use crate::domain::entities::{
    MAX_QUANTITY, MIN_QUANTITY, Order, OrderFilter, OrderItem, OrderLine, OrderStatus,
    OrderWithItems,
};
use crate::domain::tasks::TaskEnvelope;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderLineRequest {
    pub item_id: i64,

    #[validate(range(min = MIN_QUANTITY, max = MAX_QUANTITY))]
    pub quantity: i32,
}

impl From<OrderLineRequest> for OrderLine {
    fn from(request: OrderLineRequest) -> Self {
        Self {
            item_id: request.item_id,
            quantity: request.quantity,
        }
    }
}

/// Request body for `POST /orders`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "An order needs at least one item"), nested)]
    pub items: Vec<OrderLineRequest>,
}

impl CreateOrderRequest {
    pub fn into_lines(self) -> Vec<OrderLine> {
        self.items.into_iter().map(OrderLine::from).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub item_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(line: OrderItem) -> Self {
        Self {
            line_total: line.line_total(),
            item_id: line.item_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

/// An order. `items` is only present on single-order responses.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub owner_id: i64,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            owner_id: order.owner_id,
            status: order.status,
            total_amount: order.total_amount,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: None,
        }
    }
}

impl From<OrderWithItems> for OrderResponse {
    fn from(value: OrderWithItems) -> Self {
        let mut response = OrderResponse::from(value.order);
        response.items = Some(value.items.into_iter().map(OrderItemResponse::from).collect());
        response
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub status: Option<OrderStatus>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl OrderListQuery {
    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            owner_id: self.owner_id,
            status: self.status,
        }
    }
}

/// Response for `POST /orders/{id}/process` (202 Accepted).
#[derive(Debug, Serialize)]
pub struct ProcessOrderResponse {
    pub task_id: String,
    pub task: &'static str,
    pub status: &'static str,
}

impl From<TaskEnvelope> for ProcessOrderResponse {
    fn from(envelope: TaskEnvelope) -> Self {
        Self {
            task: envelope.task.name(),
            task_id: envelope.id,
            status: "queued",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tasks::Task;
    use serde_json::json;

    #[test]
    fn test_empty_order_rejected() {
        let request: CreateOrderRequest = serde_json::from_value(json!({ "items": [] })).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        for (quantity, valid) in [(0, false), (1, true), (100, true), (101, false)] {
            let request: CreateOrderRequest = serde_json::from_value(json!({
                "items": [{ "item_id": 1, "quantity": quantity }]
            }))
            .unwrap();
            assert_eq!(request.validate().is_ok(), valid, "quantity {}", quantity);
        }
    }

    #[test]
    fn test_line_total() {
        let now = Utc::now();
        let line = OrderItem {
            id: 1,
            order_id: 1,
            item_id: 2,
            quantity: 3,
            unit_price: Decimal::new(250, 2),
            created_at: now,
            updated_at: now,
        };
        let response = OrderItemResponse::from(line);
        assert_eq!(response.line_total, Decimal::new(750, 2));
    }

    #[test]
    fn test_process_response() {
        let envelope = TaskEnvelope::new(Task::ProcessOrder { order_id: 1 });
        let id = envelope.id.clone();
        let response = ProcessOrderResponse::from(envelope);
        assert_eq!(response.task_id, id);
        assert_eq!(response.task, "process_order");
        assert_eq!(response.status, "queued");
    }
}
