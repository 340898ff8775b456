use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::LineItem,
};

/// Pricing knobs, injected rather than hardcoded so tests and deployments
/// can override them. All amounts are minor currency units; the tax rate is
/// expressed in basis points (1000 = 10%).
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    pub tax_rate_bp: i64,
    pub free_shipping_threshold: i64,
    pub shipping_flat_fee: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bp: 1000,
            free_shipping_threshold: 50_000,
            shipping_flat_fee: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PriceBreakdown {
    pub subtotal: i64,
    pub tax: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub total: i64,
}

/// Compute subtotal, tax, shipping and total for a set of line items.
///
/// Pure function: the only inputs are the items, an optional discount and
/// the policy. An empty item collection is rejected because an order can
/// never be created without items.
pub fn price_items(
    items: &[LineItem],
    discount: i64,
    policy: &PricingPolicy,
) -> AppResult<PriceBreakdown> {
    if items.is_empty() {
        return Err(AppError::Validation("Order must contain items".into()));
    }

    let mut subtotal: i64 = 0;
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "Invalid quantity for product {}",
                item.product_id
            )));
        }
        if item.price < 0 {
            return Err(AppError::Validation(format!(
                "Invalid price for product {}",
                item.product_id
            )));
        }
        subtotal += item.price * i64::from(item.quantity);
    }

    let tax = round_half_up_bp(subtotal, policy.tax_rate_bp);
    let shipping_cost = if subtotal >= policy.free_shipping_threshold {
        0
    } else {
        policy.shipping_flat_fee
    };
    let total = subtotal + tax + shipping_cost - discount;

    Ok(PriceBreakdown {
        subtotal,
        tax,
        shipping_cost,
        discount,
        total,
    })
}

/// `amount * rate_bp / 10_000`, rounded half-up to the nearest minor unit.
fn round_half_up_bp(amount: i64, rate_bp: i64) -> i64 {
    (amount * rate_bp + 5_000) / 10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(price: i64, quantity: i32) -> LineItem {
        LineItem {
            product_id: Uuid::new_v4(),
            product_name: String::new(),
            product_image: String::new(),
            price,
            quantity,
            size: None,
            color: None,
        }
    }

    #[test]
    fn rejects_empty_items() {
        let err = price_items(&[], 0, &PricingPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let err = price_items(&[item(100, 0)], 0, &PricingPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn computes_documented_example() {
        // 2 x 100.00 + 1 x 50.00 => subtotal 250.00, tax 25.00,
        // shipping 50.00 (below threshold), total 325.00.
        let items = [item(10_000, 2), item(5_000, 1)];
        let breakdown = price_items(&items, 0, &PricingPolicy::default()).unwrap();
        assert_eq!(breakdown.subtotal, 25_000);
        assert_eq!(breakdown.tax, 2_500);
        assert_eq!(breakdown.shipping_cost, 5_000);
        assert_eq!(breakdown.total, 32_500);
    }

    #[test]
    fn shipping_is_free_exactly_at_threshold() {
        let policy = PricingPolicy::default();
        let breakdown = price_items(&[item(policy.free_shipping_threshold, 1)], 0, &policy).unwrap();
        assert_eq!(breakdown.shipping_cost, 0);
    }

    #[test]
    fn shipping_charges_flat_fee_one_unit_below_threshold() {
        let policy = PricingPolicy::default();
        let breakdown =
            price_items(&[item(policy.free_shipping_threshold - 1, 1)], 0, &policy).unwrap();
        assert_eq!(breakdown.shipping_cost, policy.shipping_flat_fee);
    }

    #[test]
    fn tax_rounds_half_up() {
        // 10% of 5 minor units is 0.5, which rounds up to 1.
        let breakdown = price_items(&[item(5, 1)], 0, &PricingPolicy::default()).unwrap();
        assert_eq!(breakdown.tax, 1);
        // 10% of 4 minor units is 0.4, which rounds down to 0.
        let breakdown = price_items(&[item(4, 1)], 0, &PricingPolicy::default()).unwrap();
        assert_eq!(breakdown.tax, 0);
    }

    #[test]
    fn discount_is_subtracted_from_total() {
        let breakdown = price_items(&[item(10_000, 1)], 1_000, &PricingPolicy::default()).unwrap();
        assert_eq!(breakdown.discount, 1_000);
        assert_eq!(breakdown.total, 10_000 + 1_000 + 5_000 - 1_000);
    }

    #[test]
    fn policy_overrides_are_respected() {
        let policy = PricingPolicy {
            tax_rate_bp: 0,
            free_shipping_threshold: 1,
            shipping_flat_fee: 999,
        };
        let breakdown = price_items(&[item(1, 1)], 0, &policy).unwrap();
        assert_eq!(breakdown.tax, 0);
        assert_eq!(breakdown.shipping_cost, 0);
        assert_eq!(breakdown.total, 1);
    }
}
