use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    audit::log_audit_or_warn,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartSummary, MergeCartRequest, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, LineItem},
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartRow {
    user_id: Uuid,
    items: Json<Vec<LineItem>>,
    status: String,
    last_modified: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Cart {
            user_id: row.user_id,
            items: row.items.0,
            status: row.status,
            last_modified: row.last_modified,
        }
    }
}

// ---- consolidation over the items vector -----------------------------------
//
// Line identity is (product_id, size). Color is intentionally not part of the
// key: an incoming item that differs only by color is folded into the existing
// line. This mirrors the shipped behavior and must not be "fixed" without a
// product decision.

pub fn add_line(items: &mut Vec<LineItem>, incoming: LineItem) {
    if let Some(existing) = items
        .iter_mut()
        .find(|line| line.matches_key(incoming.product_id, incoming.size.as_deref()))
    {
        existing.quantity += incoming.quantity;
    } else {
        items.push(incoming);
    }
}

/// Applies `add_line` per incoming item, in order. Not idempotent: invoking
/// twice with the same batch double-adds quantities, so callers (guest-cart
/// merge on login) must guarantee at-most-once invocation.
pub fn merge_lines(items: &mut Vec<LineItem>, incoming: Vec<LineItem>) {
    for mut line in incoming {
        if line.quantity <= 0 {
            line.quantity = 1;
        }
        add_line(items, line);
    }
}

/// Sets (not increments) the quantity of the matching line; a quantity of
/// zero or less removes the line entirely.
pub fn set_line_quantity(
    items: &mut Vec<LineItem>,
    product_id: Uuid,
    size: Option<&str>,
    quantity: i32,
) -> AppResult<()> {
    let position = items
        .iter()
        .position(|line| line.matches_key(product_id, size))
        .ok_or_else(|| AppError::NotFound("Item not found in cart".into()))?;

    if quantity <= 0 {
        items.remove(position);
    } else if let Some(line) = items.get_mut(position) {
        line.quantity = quantity;
    }
    Ok(())
}

pub fn remove_line(items: &mut Vec<LineItem>, product_id: Uuid, size: Option<&str>) {
    items.retain(|line| !line.matches_key(product_id, size));
}

// ---- persistence -----------------------------------------------------------
//
// One JSONB document per cart; every mutation overwrites the whole items
// column. Two concurrent writers can therefore lose one of the updates; this
// is a documented limitation of the storage model, not defended against.

async fn load_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Option<Cart>> {
    let row: Option<CartRow> = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Cart::from))
}

/// Carts are created lazily on first access.
async fn load_or_create_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Cart> {
    if let Some(cart) = load_cart(pool, user_id).await? {
        return Ok(cart);
    }
    let row: CartRow = sqlx::query_as(
        "INSERT INTO carts (user_id, items) VALUES ($1, '[]'::jsonb) RETURNING *",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

async fn persist_cart(pool: &DbPool, cart: &mut Cart) -> AppResult<()> {
    cart.last_modified = Utc::now();
    sqlx::query(
        "UPDATE carts SET items = $2, status = $3, last_modified = $4 WHERE user_id = $1",
    )
    .bind(cart.user_id)
    .bind(Json(&cart.items))
    .bind(&cart.status)
    .bind(cart.last_modified)
    .execute(pool)
    .await?;
    Ok(())
}

// ---- operations ------------------------------------------------------------

pub async fn get_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = load_or_create_cart(pool, user.user_id).await?;
    Ok(ApiResponse::success("OK", cart, Some(Meta::empty())))
}

pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    let quantity = payload.quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }
    if payload.price < 0 {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }

    let mut cart = load_or_create_cart(pool, user.user_id).await?;
    add_line(
        &mut cart.items,
        LineItem {
            product_id: payload.product_id,
            product_name: payload.product_name.unwrap_or_default(),
            product_image: payload.product_image.unwrap_or_default(),
            price: payload.price,
            quantity,
            size: payload.size,
            color: payload.color,
        },
    );
    persist_cart(pool, &mut cart).await?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "cart_add",
        Some("carts"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": quantity })),
    )
    .await;

    Ok(ApiResponse::success("OK", cart, None))
}

pub async fn merge_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: MergeCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    let incoming_count = payload.items.len();
    let mut cart = load_or_create_cart(pool, user.user_id).await?;
    merge_lines(&mut cart.items, payload.items);
    persist_cart(pool, &mut cart).await?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "cart_merge",
        Some("carts"),
        Some(serde_json::json!({ "incoming_items": incoming_count })),
    )
    .await;

    Ok(ApiResponse::success("Cart merged", cart, None))
}

pub async fn update_cart_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    let mut cart = load_cart(pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".into()))?;

    set_line_quantity(
        &mut cart.items,
        payload.product_id,
        payload.size.as_deref(),
        payload.quantity,
    )?;
    persist_cart(pool, &mut cart).await?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "cart_update",
        Some("carts"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await;

    Ok(ApiResponse::success("OK", cart, None))
}

pub async fn remove_from_cart(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
    size: Option<String>,
) -> AppResult<ApiResponse<Cart>> {
    let mut cart = load_cart(pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".into()))?;

    remove_line(&mut cart.items, product_id, size.as_deref());
    persist_cart(pool, &mut cart).await?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "cart_remove",
        Some("carts"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::success("Removed from cart", cart, None))
}

/// Empties the cart; the cart document itself is never deleted.
pub async fn clear_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let mut cart = load_cart(pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".into()))?;

    cart.items.clear();
    persist_cart(pool, &mut cart).await?;

    log_audit_or_warn(pool, Some(user.user_id), "cart_clear", Some("carts"), None).await;

    Ok(ApiResponse::success("Cart cleared", cart, None))
}

pub async fn cart_summary(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartSummary>> {
    let cart = load_cart(pool, user.user_id).await?;
    let items = cart.map(|c| c.items).unwrap_or_default();

    let item_count = items.iter().map(|line| i64::from(line.quantity)).sum();
    let total_price = items
        .iter()
        .map(|line| line.price * i64::from(line.quantity))
        .sum();

    let summary = CartSummary {
        item_count,
        total_price,
        items,
    };
    Ok(ApiResponse::success("OK", summary, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, size: Option<&str>, color: Option<&str>, quantity: i32) -> LineItem {
        LineItem {
            product_id,
            product_name: "Widget".into(),
            product_image: String::new(),
            price: 10_000,
            quantity,
            size: size.map(str::to_string),
            color: color.map(str::to_string),
        }
    }

    #[test]
    fn adding_same_product_and_size_twice_sums_quantities() {
        let id = Uuid::new_v4();
        let mut items = Vec::new();
        add_line(&mut items, line(id, Some("M"), None, 1));
        add_line(&mut items, line(id, Some("M"), None, 1));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn color_is_not_part_of_the_line_identity() {
        let id = Uuid::new_v4();
        let mut items = Vec::new();
        add_line(&mut items, line(id, Some("M"), Some("red"), 1));
        add_line(&mut items, line(id, Some("M"), Some("blue"), 2));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        // The first-seen color wins for the consolidated line.
        assert_eq!(items[0].color.as_deref(), Some("red"));
    }

    #[test]
    fn different_sizes_stay_separate_lines() {
        let id = Uuid::new_v4();
        let mut items = Vec::new();
        add_line(&mut items, line(id, Some("M"), None, 1));
        add_line(&mut items, line(id, Some("L"), None, 1));
        add_line(&mut items, line(id, None, None, 1));
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn merge_preserves_incoming_order_and_is_not_idempotent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let batch = vec![line(a, None, None, 1), line(b, None, None, 2)];

        let mut items = Vec::new();
        merge_lines(&mut items, batch.clone());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_id, a);
        assert_eq!(items[1].product_id, b);

        // Second invocation with the same guest batch double-adds; the
        // at-most-once guarantee belongs to the caller.
        merge_lines(&mut items, batch);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].quantity, 4);
    }

    #[test]
    fn merge_defaults_non_positive_quantities_to_one() {
        let mut items = Vec::new();
        merge_lines(&mut items, vec![line(Uuid::new_v4(), None, None, 0)]);
        assert_eq!(items[0].quantity, 1);
    }

    #[test]
    fn set_quantity_overwrites_instead_of_incrementing() {
        let id = Uuid::new_v4();
        let mut items = vec![line(id, Some("M"), None, 5)];
        set_line_quantity(&mut items, id, Some("M"), 2).unwrap();
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn set_quantity_zero_or_less_removes_the_line() {
        let id = Uuid::new_v4();
        let mut items = vec![line(id, None, None, 5)];
        set_line_quantity(&mut items, id, None, 0).unwrap();
        assert!(items.is_empty());

        let mut items = vec![line(id, None, None, 5)];
        set_line_quantity(&mut items, id, None, -3).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn set_quantity_on_missing_line_is_not_found() {
        let mut items = vec![line(Uuid::new_v4(), Some("M"), None, 1)];
        let err = set_line_quantity(&mut items, Uuid::new_v4(), None, 2).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn remove_line_matches_size_exactly_and_is_silent_when_absent() {
        let id = Uuid::new_v4();
        let mut items = vec![line(id, Some("M"), None, 1), line(id, Some("L"), None, 1)];
        remove_line(&mut items, id, Some("M"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].size.as_deref(), Some("L"));

        remove_line(&mut items, id, Some("XL"));
        assert_eq!(items.len(), 1);
    }
}
