use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{LineItem, Order, PostalAddress, StatusHistoryEntry};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<LineItem>,
    pub shipping_address: PostalAddress,
    /// Defaults to the shipping address when absent.
    #[serde(default)]
    pub billing_address: Option<PostalAddress>,
    pub payment_method: String,
    #[serde(default)]
    pub discount: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderTracking {
    pub order_number: String,
    pub status: String,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub status_history: Vec<StatusHistoryEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStats {
    pub total_orders: i64,
    pub total_revenue: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub recent_orders: Vec<Order>,
}
