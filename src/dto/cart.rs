use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::LineItem;

/// Add-to-cart carries a snapshot of the product's display fields; the cart
/// never reads live product state afterwards. Missing display fields are
/// tolerated, not rejected.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_image: Option<String>,
    pub price: i64,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Guest-cart merge on login. Callers must invoke this at most once per
/// guest cart; repeating it double-adds quantities.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeCartRequest {
    pub items: Vec<LineItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveCartItemQuery {
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummary {
    pub item_count: i64,
    pub total_price: i64,
    pub items: Vec<LineItem>,
}
