use uuid::Uuid;

use crate::{
    audit::log_audit_or_warn,
    db::DbPool,
    dto::wishlist::{AddWishlistRequest, WishlistList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::WishlistItem,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

pub async fn list_wishlist(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistList>> {
    let (page, limit, offset) = pagination.normalize();
    let items: Vec<WishlistItem> = sqlx::query_as(
        r#"
        SELECT * FROM wishlist_items
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", WishlistList { items }, Some(meta)))
}

pub async fn add_to_wishlist(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddWishlistRequest,
) -> AppResult<ApiResponse<WishlistItem>> {
    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Product already in wishlist".to_string()));
    }

    let item: WishlistItem = sqlx::query_as(
        r#"
        INSERT INTO wishlist_items (id, user_id, product_id, product_name, product_image, price)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.product_name.unwrap_or_default())
    .bind(payload.product_image.unwrap_or_default())
    .bind(payload.price.unwrap_or(0))
    .fetch_one(pool)
    .await?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "wishlist_add",
        Some("wishlist_items"),
        Some(serde_json::json!({ "product_id": payload.product_id })),
    )
    .await;

    Ok(ApiResponse::success("Added to wishlist", item, None))
}

pub async fn remove_from_wishlist(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Wishlist item not found".into()));
    }

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "wishlist_remove",
        Some("wishlist_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
