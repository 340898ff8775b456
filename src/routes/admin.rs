use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, OrderStats, UpdateOrderStatusRequest},
    dto::reviews::PendingReviewList,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, Review},
    response::ApiResponse,
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, order_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/stats", get(order_stats))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/reviews/pending", get(list_pending_reviews))
        .route("/reviews/{id}/approve", patch(approve_review))
        .route("/reviews/{id}/reject", patch(reject_review))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "All orders across users", body = ApiResponse<OrderList>),
        (status = 403, description = "Not an admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/admin/orders/stats", security(("bearer_auth" = [])), tag = "Admin")]
pub async fn order_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderStats>>> {
    let resp = admin_service::order_stats(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/admin/orders/{id}", security(("bearer_auth" = [])), tag = "Admin")]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Apply a status and append a history entry", body = ApiResponse<Order>),
        (status = 400, description = "Unknown status"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/reviews/pending",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_pending_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PendingReviewList>>> {
    let resp = review_service::list_pending_reviews(&state.pool, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(patch, path = "/api/admin/reviews/{id}/approve", security(("bearer_auth" = [])), tag = "Admin")]
pub async fn approve_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::approve_review(&state.pool, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(patch, path = "/api/admin/reviews/{id}/reject", security(("bearer_auth" = [])), tag = "Admin")]
pub async fn reject_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::reject_review(&state.pool, &user, id).await?;
    Ok(Json(resp))
}
