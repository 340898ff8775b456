use sea_orm::entity::prelude::*;

/// One row per order document; items, addresses and the status history are
/// JSONB columns, snapshotted at creation and never re-read from live state.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Json,
    pub shipping_address: Json,
    pub billing_address: Json,
    pub subtotal: i64,
    pub tax: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub total: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub status: String,
    pub status_history: Json,
    pub tracking_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub estimated_delivery: Option<DateTimeWithTimeZone>,
    pub actual_delivery: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
