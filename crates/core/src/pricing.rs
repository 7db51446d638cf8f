use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::availability::MINUTES_PER_DAY;

/// Money is kept at two decimal places, the minor unit of every supported
/// currency in the marketplace.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Revenue-share ratios snapshotted onto a rental at creation time. Sourced
/// from the latest active fee-settings row, falling back to configuration;
/// never from literals in the calculator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub platform_fee_ratio: Decimal,
    pub insurance_commission_ratio: Decimal,
}

impl FeePolicy {
    pub fn new(platform_fee_ratio: Decimal, insurance_commission_ratio: Decimal) -> Self {
        Self { platform_fee_ratio, insurance_commission_ratio }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInputs {
    pub price_per_day: Decimal,
    pub duration_minutes: i64,
    pub delivery_fee: Decimal,
    pub insurance_fee: Decimal,
    pub discount_amount: Decimal,
    pub deposit_amount: Decimal,
}

/// Full financial breakdown of one rental. Every derived amount is already
/// rounded to the minor unit, so the conservation identities hold exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub duration_minutes: i64,
    pub duration_days: i64,
    pub base_rental: Decimal,
    pub delivery_fee: Decimal,
    pub insurance_fee: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
    pub deposit_price: Decimal,
    pub platform_fee_ratio: Decimal,
    pub platform_fee: Decimal,
    pub owner_earning: Decimal,
    pub insurance_commission_ratio: Decimal,
    pub insurance_commission_amount: Decimal,
    pub insurance_payable_to_partner: Decimal,
    pub platform_earning: Decimal,
}

/// Prices a rental. Pure and deterministic: the same inputs and policy
/// always produce the same breakdown.
pub fn quote(inputs: &PricingInputs, policy: &FeePolicy) -> PriceBreakdown {
    // A partial day bills as a full day, and every rental bills at least one.
    let duration_days =
        (inputs.duration_minutes + MINUTES_PER_DAY - 1).div_euclid(MINUTES_PER_DAY).max(1);

    let base_rental = to_minor_unit(inputs.price_per_day * Decimal::from(duration_days));
    let delivery_fee = to_minor_unit(inputs.delivery_fee);
    let insurance_fee = to_minor_unit(inputs.insurance_fee);
    let discount_amount = to_minor_unit(inputs.discount_amount);

    let total_price = base_rental + delivery_fee + insurance_fee - discount_amount;
    let platform_fee = to_minor_unit(base_rental * policy.platform_fee_ratio);
    let owner_earning = base_rental - platform_fee + delivery_fee;
    let insurance_commission_amount =
        to_minor_unit(insurance_fee * policy.insurance_commission_ratio);
    let insurance_payable_to_partner = insurance_fee - insurance_commission_amount;
    let platform_earning = platform_fee - discount_amount + insurance_commission_amount;

    PriceBreakdown {
        duration_minutes: inputs.duration_minutes,
        duration_days,
        base_rental,
        delivery_fee,
        insurance_fee,
        discount_amount,
        total_price,
        deposit_price: to_minor_unit(inputs.deposit_amount),
        platform_fee_ratio: policy.platform_fee_ratio,
        platform_fee,
        owner_earning,
        insurance_commission_ratio: policy.insurance_commission_ratio,
        insurance_commission_amount,
        insurance_payable_to_partner,
        platform_earning,
    }
}

/// Round half up at the minor unit. Rounding happens here, at calculation
/// time, never at display time.
fn to_minor_unit(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
