use crate::{
    db::{DbPool, OrmConn},
    pricing::PricingPolicy,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub pricing: PricingPolicy,
}
