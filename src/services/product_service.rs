use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::{
    audit::log_audit_or_warn,
    db::DbPool,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
};

pub async fn list_products(
    pool: &DbPool,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
    push_filters(&mut builder, &query);
    builder
        .push(" ORDER BY ")
        .push(sort_by.as_sql())
        .push(" ")
        .push(sort_order.as_sql())
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let items: Vec<Product> = builder.build_query_as().fetch_all(pool).await?;

    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE TRUE");
    push_filters(&mut count_builder, &query);
    let total: i64 = count_builder.build_query_scalar().fetch_one(pool).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", ProductList { items }, Some(meta)))
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, sqlx::Postgres>, query: &'a ProductQuery) {
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min_price) = query.min_price {
        builder.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        builder.push(" AND price <= ").push_bind(max_price);
    }
}

pub async fn get_product(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let product = product.ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    Ok(ApiResponse::success("OK", product, Some(Meta::empty())))
}

pub async fn create_product(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.price < 0 {
        return Err(AppError::Validation("price must not be negative".into()));
    }

    let product: Product = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, description, image, category, price, stock)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.image)
    .bind(&payload.category)
    .bind(payload.price)
    .bind(payload.stock.unwrap_or(0))
    .fetch_one(pool)
    .await?;

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success("Product created", product, None))
}

pub async fn update_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = existing.ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    let price = payload.price.unwrap_or(existing.price);
    if price < 0 {
        return Err(AppError::Validation("price must not be negative".into()));
    }

    let product: Product = sqlx::query_as(
        r#"
        UPDATE products
        SET name = $2, description = $3, image = $4, category = $5, price = $6, stock = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name.unwrap_or(existing.name))
    .bind(payload.description.or(existing.description))
    .bind(payload.image.or(existing.image))
    .bind(payload.category.or(existing.category))
    .bind(price)
    .bind(payload.stock.unwrap_or(existing.stock))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Product updated", product, None))
}

pub async fn delete_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Product not found".into()));
    }

    log_audit_or_warn(
        pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::message_only("Product deleted successfully"))
}
