use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    routes::params::Pagination,
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/product/{product_id}",
            get(list_product_reviews).post(create_review),
        )
        .route(
            "/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/{id}/helpful", post(mark_helpful))
        .route("/{id}/unhelpful", post(mark_unhelpful))
}

#[utoipa::path(
    get,
    path = "/api/reviews/product/{product_id}",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Approved reviews with aggregate stats", body = ApiResponse<ReviewList>)
    ),
    tag = "Reviews"
)]
pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_product_reviews(&state.pool, product_id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/reviews/product/{product_id}",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Submit a review, queued for moderation", body = ApiResponse<Review>),
        (status = 409, description = "Already reviewed by this user"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::create_review(&state.pool, &user, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/reviews/{id}", tag = "Reviews")]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::get_review(&state.pool, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    request_body = UpdateReviewRequest,
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::update_review(&state.pool, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(delete, path = "/api/reviews/{id}", security(("bearer_auth" = [])), tag = "Reviews")]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = review_service::delete_review(&state.pool, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(post, path = "/api/reviews/{id}/helpful", tag = "Reviews")]
pub async fn mark_helpful(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::mark_helpful(&state.pool, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(post, path = "/api/reviews/{id}/unhelpful", tag = "Reviews")]
pub async fn mark_unhelpful(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::mark_unhelpful(&state.pool, id).await?;
    Ok(Json(resp))
}
