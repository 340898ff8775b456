use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartSummary, MergeCartRequest, UpdateCartItemRequest},
        orders::{
            CancelOrderRequest, CreateOrderRequest, OrderList, OrderStats, OrderTracking,
            StatusCount, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, PendingReviewList, ReviewList, ReviewStats,
            UpdateReviewRequest},
        wishlist::{AddWishlistRequest, WishlistList},
    },
    models::{
        Address, Cart, LineItem, Order, PostalAddress, Product, Review, StatusHistoryEntry,
        User, WishlistItem,
    },
    response::{ApiResponse, Meta},
    routes::{addresses, admin, auth, cart, health, orders, params, products, reviews, wishlist},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::get_cart,
        cart::add_to_cart,
        cart::merge_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::cart_summary,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::track_order,
        orders::cancel_order,
        addresses::list_addresses,
        addresses::create_address,
        addresses::get_address,
        addresses::update_address,
        addresses::delete_address,
        addresses::set_default_address,
        addresses::default_by_type,
        reviews::list_product_reviews,
        reviews::create_review,
        reviews::get_review,
        reviews::update_review,
        reviews::delete_review,
        reviews::mark_helpful,
        reviews::mark_unhelpful,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        admin::list_all_orders,
        admin::order_stats,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_pending_reviews,
        admin::approve_review,
        admin::reject_review
    ),
    components(
        schemas(
            User,
            Product,
            LineItem,
            Cart,
            PostalAddress,
            StatusHistoryEntry,
            Order,
            Address,
            Review,
            WishlistItem,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            MergeCartRequest,
            UpdateCartItemRequest,
            CartSummary,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            CancelOrderRequest,
            OrderList,
            OrderTracking,
            OrderStats,
            StatusCount,
            CreateAddressRequest,
            UpdateAddressRequest,
            AddressList,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            ReviewStats,
            PendingReviewList,
            AddWishlistRequest,
            WishlistList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<Address>,
            ApiResponse<ReviewList>,
            ApiResponse<ProductList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Cart", description = "Cart consolidation endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Addresses", description = "Address book endpoints"),
        (name = "Reviews", description = "Review and moderation endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Admin", description = "Admin reporting endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
