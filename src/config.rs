use std::env;

use crate::pricing::PricingPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pricing: PricingPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            tax_rate_bp: env_i64("TAX_RATE_BP", defaults.tax_rate_bp),
            free_shipping_threshold: env_i64(
                "FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            ),
            shipping_flat_fee: env_i64("SHIPPING_FLAT_FEE", defaults.shipping_flat_fee),
        };

        Ok(Self {
            port,
            database_url,
            host,
            pricing,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
