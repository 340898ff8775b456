use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Review;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReviewRequest {
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Aggregated over approved reviews only.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewStats {
    pub avg_rating: f64,
    pub total_reviews: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<Review>,
    pub stats: ReviewStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PendingReviewList {
    pub items: Vec<Review>,
}
