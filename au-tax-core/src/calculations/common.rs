//! Rounding and formatting helpers shared by every calculator.
//!
//! Money is rounded to cents half-up (away from zero). Withholding is
//! rounded to whole dollars. Rates are stored as fractions and shown as
//! percentages to two decimal places.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// This follows standard financial rounding conventions where values at exactly
/// 0.005 are rounded up to 0.01 (away from zero).
///
/// # Arguments
///
/// * `value` - The decimal value to round
///
/// # Returns
///
/// The value rounded to two decimal places.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(123.456)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to whole dollars, half-up.
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::calculations::common::round_to_dollar;
///
/// assert_eq!(round_to_dollar(dec!(438.50)), dec!(439));
/// assert_eq!(round_to_dollar(dec!(438.49)), dec!(438));
/// ```
pub fn round_to_dollar(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a fractional rate to a percentage rounded to two places.
pub fn to_percentage(rate: Decimal) -> Decimal {
    round_half_up(rate * Decimal::ONE_HUNDRED)
}

/// Returns the smaller of two decimal values.
pub fn min(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a < b { a } else { b }
}

/// Returns the maximum of two decimal values.
///
/// # Arguments
///
/// * `a` - First decimal value
/// * `b` - Second decimal value
///
/// # Returns
///
/// The larger of the two values.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::calculations::common::max;
///
/// assert_eq!(max(dec!(100.00), dec!(200.00)), dec!(200.00));
/// assert_eq!(max(dec!(200.00), dec!(100.00)), dec!(200.00));
/// assert_eq!(max(dec!(-100.00), dec!(-200.00)), dec!(-100.00));
/// ```
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// Formats an amount as Australian dollars with thousands separators.
///
/// Cents are shown only when the rounded amount has a fractional part.
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::calculations::common::format_currency;
///
/// assert_eq!(format_currency(dec!(45001)), "$45,001");
/// assert_eq!(format_currency(dec!(1923.077)), "$1,923.08");
/// assert_eq!(format_currency(dec!(-250.5)), "-$250.50");
/// ```
pub fn format_currency(value: Decimal) -> String {
    let rounded = round_half_up(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let magnitude = rounded.abs();
    let whole = magnitude.trunc().normalize().to_string();
    let cents = ((magnitude - magnitude.trunc()) * Decimal::ONE_HUNDRED)
        .trunc()
        .normalize();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if cents.is_zero() {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{:0>2}", cents.to_string())
    }
}

/// Formats a fractional rate as a percentage, e.g. `0.115` as `11.5%`.
pub fn format_percentage(rate: Decimal) -> String {
    format!("{}%", to_percentage(rate).normalize())
}
