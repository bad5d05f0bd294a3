// src/utils/precision.rs
use rust_decimal::Decimal;
use std::str::FromStr;

/// Infers quantity precision from an exchange step-size string: the number of
/// digits after the decimal point once trailing zeros are stripped.
/// `"0.001"` and `"0.0010"` both give 3; an integral step gives 0.
/// Returns `None` for malformed or zero steps so callers can fall back.
pub fn precision_from_step(step: &str) -> Option<u32> {
    let step = step.trim();
    let parsed = Decimal::from_str(step).ok()?;
    if parsed.is_zero() {
        return None;
    }
    match step.split_once('.') {
        Some((_, frac)) => Some(frac.trim_end_matches('0').len() as u32),
        None => Some(0),
    }
}

/// Truncates a quantity to the given number of fractional digits.
/// Always rounds toward zero so a sell can never exceed the held balance.
pub fn truncate_quantity(amount: Decimal, precision: u32) -> Decimal {
    amount.trunc_with_scale(precision).normalize()
}
