use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, OrderStats, StatusCount},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::order_from_entity,
    state::AppState,
};

/// Admin read paths bypass the per-user ownership scoping; they are
/// reporting-only and never mutate on behalf of another user.
pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<crate::models::Order>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    Ok(ApiResponse::success(
        "Order found",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

#[derive(Debug, FromQueryResult)]
struct RevenueRow {
    revenue: i64,
}

#[derive(Debug, FromQueryResult)]
struct StatusCountRow {
    status: String,
    count: i64,
}

pub async fn order_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderStats>> {
    ensure_admin(user)?;

    let total_orders = Orders::find().count(&state.orm).await? as i64;

    let revenue = Orders::find()
        .select_only()
        .column_as(Expr::cust("COALESCE(SUM(total), 0)::BIGINT"), "revenue")
        .into_model::<RevenueRow>()
        .one(&state.orm)
        .await?
        .map(|row| row.revenue)
        .unwrap_or(0);

    let orders_by_status = Orders::find()
        .select_only()
        .column(OrderCol::Status)
        .column_as(Expr::cust("COUNT(*)::BIGINT"), "count")
        .group_by(OrderCol::Status)
        .into_model::<StatusCountRow>()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|row| StatusCount {
            status: row.status,
            count: row.count,
        })
        .collect();

    let recent_orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(10)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let stats = OrderStats {
        total_orders,
        total_revenue: revenue,
        orders_by_status,
        recent_orders,
    };
    Ok(ApiResponse::success("OK", stats, Some(Meta::empty())))
}
