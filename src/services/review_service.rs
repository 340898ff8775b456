use uuid::Uuid;

use crate::{
    audit::log_audit_or_warn,
    db::DbPool,
    dto::reviews::{CreateReviewRequest, PendingReviewList, ReviewList, ReviewStats,
        UpdateReviewRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Review, ReviewStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

pub async fn create_review(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    // One review per (user, product); the unique index backs this up
    // against racing inserts.
    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM reviews WHERE product_id = $1 AND user_id = $2")
            .bind(product_id)
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;
    if exist.is_some() {
        return Err(AppError::Conflict(
            "You have already reviewed this product".to_string(),
        ));
    }

    let review: Review = sqlx::query_as(
        r#"
        INSERT INTO reviews (id, product_id, user_id, rating, title, comment, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(user.user_id)
    .bind(payload.rating)
    .bind(payload.title.unwrap_or_default())
    .bind(payload.comment.unwrap_or_default())
    .fetch_one(pool)
    .await?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::success("Review submitted", review, None))
}

/// Public listing: only approved reviews are returned and aggregated.
pub async fn list_product_reviews(
    pool: &DbPool,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();
    let items: Vec<Review> = sqlx::query_as(
        r#"
        SELECT * FROM reviews
        WHERE product_id = $1 AND status = 'approved'
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total, avg_rating): (i64, f64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(AVG(rating), 0)::FLOAT8
        FROM reviews
        WHERE product_id = $1 AND status = 'approved'
        "#,
    )
    .bind(product_id)
    .fetch_one(pool)
    .await?;

    let stats = ReviewStats {
        avg_rating,
        total_reviews: total,
    };
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", ReviewList { items, stats }, Some(meta)))
}

pub async fn get_review(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Review>> {
    let review: Option<Review> = sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let review = review.ok_or_else(|| AppError::NotFound("Review not found".into()))?;
    Ok(ApiResponse::success("OK", review, Some(Meta::empty())))
}

pub async fn update_review(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if let Some(rating) = payload.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
    }

    let review: Option<Review> =
        sqlx::query_as("SELECT * FROM reviews WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;
    let review = review.ok_or_else(|| AppError::NotFound("Review not found".into()))?;

    let updated: Review = sqlx::query_as(
        r#"
        UPDATE reviews
        SET rating = $3, title = $4, comment = $5
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(payload.rating.unwrap_or(review.rating))
    .bind(payload.title.unwrap_or(review.title))
    .bind(payload.comment.unwrap_or(review.comment))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Review updated", updated, None))
}

pub async fn delete_review(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Review not found".into()));
    }
    Ok(ApiResponse::message_only("Review deleted successfully"))
}

pub async fn mark_helpful(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Review>> {
    bump_counter(pool, id, "helpful").await
}

pub async fn mark_unhelpful(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Review>> {
    bump_counter(pool, id, "unhelpful").await
}

async fn bump_counter(pool: &DbPool, id: Uuid, column: &str) -> AppResult<ApiResponse<Review>> {
    // column is one of two fixed names, never user input
    let query = format!("UPDATE reviews SET {column} = {column} + 1 WHERE id = $1 RETURNING *");
    let review: Option<Review> = sqlx::query_as(&query).bind(id).fetch_optional(pool).await?;
    let review = review.ok_or_else(|| AppError::NotFound("Review not found".into()))?;
    Ok(ApiResponse::success("OK", review, None))
}

pub async fn list_pending_reviews(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PendingReviewList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let items: Vec<Review> = sqlx::query_as(
        r#"
        SELECT * FROM reviews
        WHERE status = 'pending'
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE status = 'pending'")
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", PendingReviewList { items }, Some(meta)))
}

pub async fn approve_review(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Review>> {
    moderate_review(pool, user, id, ReviewStatus::Approved).await
}

pub async fn reject_review(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Review>> {
    moderate_review(pool, user, id, ReviewStatus::Rejected).await
}

async fn moderate_review(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    status: ReviewStatus,
) -> AppResult<ApiResponse<Review>> {
    ensure_admin(user)?;
    let review: Option<Review> =
        sqlx::query_as("UPDATE reviews SET status = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(pool)
            .await?;
    let review = review.ok_or_else(|| AppError::NotFound("Review not found".into()))?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "review_moderate",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": id, "status": status.as_str() })),
    )
    .await;

    Ok(ApiResponse::success("Review updated", review, None))
}
