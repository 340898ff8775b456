use axum_storefront_api::{
    db::{create_orm_conn, create_pool},
    dto::{
        addresses::CreateAddressRequest,
        cart::{AddToCartRequest, MergeCartRequest, UpdateCartItemRequest},
        orders::{CancelOrderRequest, CreateOrderRequest, UpdateOrderStatusRequest},
        reviews::CreateReviewRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{LineItem, PostalAddress},
    pricing::PricingPolicy,
    services::{address_service, cart_service, order_service, review_service},
    state::AppState,
};
use uuid::Uuid;

// Integration flow: cart consolidation -> order creation with pricing ->
// lifecycle updates and the cancel guard -> address defaults -> review
// moderation conflicts.
#[tokio::test]
async fn cart_order_address_and_review_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let user_id = create_user(&state, "user", "user@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let product_id = create_product(&state, "Test Widget", 30_000).await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    // Adding the same (product, size) twice consolidates into one line.
    cart_service::add_to_cart(&state.pool, &auth_user, add_request(product_id, 30_000, 1))
        .await?;
    let cart = cart_service::add_to_cart(&state.pool, &auth_user, add_request(product_id, 30_000, 1))
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);

    // A guest-cart merge folds matching lines in and keeps new ones.
    let other_product = Uuid::new_v4();
    let cart = cart_service::merge_cart(
        &state.pool,
        &auth_user,
        MergeCartRequest {
            items: vec![
                line(product_id, 30_000, 1),
                line(other_product, 8_000, 1),
            ],
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.items[0].quantity, 3);

    // Update sets the quantity, it does not add to it.
    let cart = cart_service::update_cart_item(
        &state.pool,
        &auth_user,
        UpdateCartItemRequest {
            product_id,
            quantity: 2,
            size: Some("M".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(
        cart.items
            .iter()
            .find(|l| l.product_id == product_id)
            .unwrap()
            .quantity,
        2
    );

    // Order at the free-shipping threshold: 2 x 30_000 = 60_000 subtotal,
    // 10% tax, no shipping fee.
    let order_resp = order_service::create_order(
        &state,
        &auth_user,
        CreateOrderRequest {
            items: vec![line(product_id, 30_000, 2)],
            shipping_address: postal_address(),
            billing_address: None,
            payment_method: "upi".into(),
            discount: None,
        },
    )
    .await?;
    let order = order_resp.data.unwrap();
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.subtotal, 60_000);
    assert_eq!(order.tax, 6_000);
    assert_eq!(order.shipping_cost, 0);
    assert_eq!(order.total, 66_000);
    assert_eq!(order.status, "pending");
    assert_eq!(order.status_history.len(), 1);
    assert_eq!(order.status_history[0].notes, "Order created");
    // Billing falls back to the shipping address when omitted.
    assert_eq!(order.billing_address.city, order.shipping_address.city);

    // The originating cart is emptied, not deleted.
    let cart = cart_service::get_cart(&state.pool, &auth_user)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());

    // Below the threshold the flat fee applies.
    let small = order_service::create_order(
        &state,
        &auth_user,
        CreateOrderRequest {
            items: vec![line(product_id, 10_000, 1)],
            shipping_address: postal_address(),
            billing_address: None,
            payment_method: "wallet".into(),
            discount: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(small.shipping_cost, 5_000);
    assert_eq!(small.total, 16_000);

    // Admin moves the first order along; each update appends to history.
    let updated = order_service::update_order_status(
        &state,
        &auth_admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
            notes: Some("left warehouse".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.status, "shipped");
    assert_eq!(updated.status_history.len(), 2);

    // A non-admin cannot drive the lifecycle.
    let err = order_service::update_order_status(
        &state,
        &auth_user,
        order.id,
        UpdateOrderStatusRequest {
            status: "delivered".into(),
            notes: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Shipped orders cannot be cancelled; pending ones can.
    let err = order_service::cancel_order(
        &state,
        &auth_user,
        order.id,
        CancelOrderRequest { reason: None },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let cancelled = order_service::cancel_order(
        &state,
        &auth_user,
        small.id,
        CancelOrderRequest {
            reason: Some("Changed my mind".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Changed my mind"));

    // Address defaults: the last one set wins, per type.
    let a = address_service::create_address(&state.pool, &auth_user, address_request("First"))
        .await?
        .data
        .unwrap();
    let b = address_service::create_address(&state.pool, &auth_user, address_request("Second"))
        .await?
        .data
        .unwrap();

    address_service::set_default_address(&state.pool, &auth_user, a.id).await?;
    address_service::set_default_address(&state.pool, &auth_user, b.id).await?;

    let default = address_service::default_by_type(&state.pool, &auth_user, "shipping")
        .await?
        .data
        .unwrap();
    assert_eq!(default.id, b.id);

    // One review per (product, user); the second attempt conflicts.
    review_service::create_review(
        &state.pool,
        &auth_user,
        product_id,
        CreateReviewRequest {
            rating: 5,
            title: Some("Great".into()),
            comment: Some("Would buy again".into()),
        },
    )
    .await?;
    let err = review_service::create_review(
        &state.pool,
        &auth_user,
        product_id,
        CreateReviewRequest {
            rating: 1,
            title: None,
            comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE wishlist_items, reviews, addresses, orders, carts, audit_logs, products, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState {
        pool,
        orm,
        pricing: PricingPolicy::default(),
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash, name, role) VALUES ($1, $2, 'dummy', $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(role)
    .bind(role)
    .fetch_one(&state.pool)
    .await?;
    Ok(row.0)
}

async fn create_product(state: &AppState, name: &str, price: i64) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO products (id, name, price, stock) VALUES ($1, $2, $3, 10) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(price)
    .fetch_one(&state.pool)
    .await?;
    Ok(row.0)
}

fn line(product_id: Uuid, price: i64, quantity: i32) -> LineItem {
    LineItem {
        product_id,
        product_name: "Test Widget".into(),
        product_image: String::new(),
        price,
        quantity,
        size: Some("M".into()),
        color: None,
    }
}

fn add_request(product_id: Uuid, price: i64, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        product_name: Some("Test Widget".into()),
        product_image: None,
        price,
        quantity: Some(quantity),
        size: Some("M".into()),
        color: None,
    }
}

fn postal_address() -> PostalAddress {
    PostalAddress {
        name: "Test User".into(),
        phone: "9999999999".into(),
        street: "1 Main St".into(),
        city: "Pune".into(),
        state: "MH".into(),
        postal_code: "411001".into(),
        country: "India".into(),
    }
}

fn address_request(name: &str) -> CreateAddressRequest {
    CreateAddressRequest {
        kind: "shipping".into(),
        name: name.into(),
        phone: "9999999999".into(),
        street: "1 Main St".into(),
        city: "Pune".into(),
        state: "MH".into(),
        postal_code: "411001".into(),
        country: None,
        is_default: None,
        instructions: None,
    }
}
