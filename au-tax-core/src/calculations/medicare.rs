//! Medicare levy and Medicare levy surcharge.
//!
//! The levy has three zones around the low-income threshold:
//!
//! | Taxable income                          | Levy                                 |
//! |-----------------------------------------|--------------------------------------|
//! | at or below threshold                   | nil                                  |
//! | above threshold, below shade-out bound  | `(income − threshold) × 10%`         |
//! | at or above shade-out bound             | `income × 2%`                        |
//!
//! The shade-out bound is `threshold × 1.25`, where the two formulas meet.
//! Families add a fixed amount to the threshold for each dependent child.
//!
//! The surcharge applies only without private hospital cover, at the rate
//! of the tier the income falls in. Family tiers rise for each dependent
//! child after the first.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::{format_currency, format_percentage, round_half_up};
use crate::models::{CalculationStep, Operation, SurchargeTier, TaxYearConfig};

/// Whether the levy uses single or family thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FamilyStatus {
    #[default]
    Single,
    Family,
}

/// Inputs to the Medicare calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicareInput {
    pub taxable_income: Decimal,
    pub family_status: FamilyStatus,
    pub dependent_children: u32,
    pub has_private_health_insurance: bool,
    /// Full exemption (for example a Medicare entitlement statement).
    pub is_exempt: bool,
}

impl MedicareInput {
    /// Single person with private hospital cover and no exemption.
    pub fn single(taxable_income: Decimal) -> Self {
        Self {
            taxable_income,
            family_status: FamilyStatus::Single,
            dependent_children: 0,
            has_private_health_insurance: true,
            is_exempt: false,
        }
    }
}

/// Levy, surcharge and the thresholds that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicareResult {
    pub medicare_levy: Decimal,
    pub medicare_surcharge: Decimal,
    pub total: Decimal,
    pub threshold: Decimal,
    pub shade_out_threshold: Decimal,
    pub is_shade_in: bool,
    pub is_exempt: bool,
    pub surcharge_rate: Decimal,
    pub steps: Vec<CalculationStep>,
}

impl MedicareResult {
    fn nil(
        is_exempt: bool,
        explanation: &str,
    ) -> Self {
        Self {
            medicare_levy: Decimal::ZERO,
            medicare_surcharge: Decimal::ZERO,
            total: Decimal::ZERO,
            threshold: Decimal::ZERO,
            shade_out_threshold: Decimal::ZERO,
            is_shade_in: false,
            is_exempt,
            surcharge_rate: Decimal::ZERO,
            steps: vec![CalculationStep::new("Medicare levy", Decimal::ZERO)
                .with_explanation(explanation)],
        }
    }
}

/// Calculates the Medicare levy and surcharge for one person.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{MedicareInput, TaxYearRegistry, calculate_medicare_levy};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// // Inside the shade-in zone: (30,000 − 27,222) × 10%
/// let result = calculate_medicare_levy(&MedicareInput::single(dec!(30000)), config);
///
/// assert!(result.is_shade_in);
/// assert_eq!(result.medicare_levy, dec!(277.80));
/// ```
pub fn calculate_medicare_levy(
    input: &MedicareInput,
    config: &TaxYearConfig,
) -> MedicareResult {
    if input.is_exempt {
        return MedicareResult::nil(true, "Exempt from the Medicare levy");
    }
    if input.taxable_income <= Decimal::ZERO {
        return MedicareResult::nil(false, "No levy on nil or negative taxable income");
    }

    let m = &config.medicare;
    let income = input.taxable_income;
    let mut steps = vec![CalculationStep::new("Taxable income", income)];

    let threshold = levy_threshold(input, config);
    let shade_out_threshold = round_half_up(threshold * m.shade_out_multiplier);
    steps.push(
        CalculationStep::new("Low-income threshold", threshold).with_explanation(
            match input.family_status {
                FamilyStatus::Single => "Single threshold".to_string(),
                FamilyStatus::Family => format!(
                    "Family threshold plus {} per dependent child × {}",
                    format_currency(m.dependent_child_increase),
                    input.dependent_children
                ),
            },
        ),
    );
    steps.push(
        CalculationStep::new("Shade-out threshold", shade_out_threshold)
            .with_operation(Operation::Multiply)
            .with_explanation(format!(
                "{} × {}",
                format_currency(threshold),
                m.shade_out_multiplier.normalize()
            )),
    );

    let (medicare_levy, is_shade_in) = if income <= threshold {
        steps.push(
            CalculationStep::new("Medicare levy", Decimal::ZERO)
                .with_explanation("Income at or below the low-income threshold"),
        );
        (Decimal::ZERO, false)
    } else if income < shade_out_threshold {
        let levy = round_half_up((income - threshold) * m.shade_in_rate);
        steps.push(
            CalculationStep::new("Medicare levy (shade-in)", levy)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "({} − {}) × {}",
                    format_currency(income),
                    format_currency(threshold),
                    format_percentage(m.shade_in_rate)
                )),
        );
        (levy, true)
    } else {
        let levy = round_half_up(income * m.levy_rate);
        steps.push(
            CalculationStep::new("Medicare levy", levy)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "{} × {}",
                    format_currency(income),
                    format_percentage(m.levy_rate)
                )),
        );
        (levy, false)
    };

    let (medicare_surcharge, surcharge_rate) = if input.has_private_health_insurance {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        let rate = surcharge_rate(input, config);
        let surcharge = round_half_up(income * rate);
        if surcharge > Decimal::ZERO {
            warn!(
                income = %income,
                rate = %rate,
                surcharge = %surcharge,
                "Medicare levy surcharge applies without private hospital cover"
            );
        }
        steps.push(
            CalculationStep::new("Medicare levy surcharge", surcharge)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "{} × {} (no private hospital cover)",
                    format_currency(income),
                    format_percentage(rate)
                )),
        );
        (surcharge, rate)
    };

    let total = round_half_up(medicare_levy + medicare_surcharge);
    steps.push(CalculationStep::new("Total Medicare", total).with_operation(Operation::Equals));

    debug!(
        income = %income,
        levy = %medicare_levy,
        surcharge = %medicare_surcharge,
        "medicare calculated"
    );

    MedicareResult {
        medicare_levy,
        medicare_surcharge,
        total,
        threshold,
        shade_out_threshold,
        is_shade_in,
        is_exempt: false,
        surcharge_rate,
        steps,
    }
}

fn levy_threshold(
    input: &MedicareInput,
    config: &TaxYearConfig,
) -> Decimal {
    let m = &config.medicare;
    match input.family_status {
        FamilyStatus::Single => m.single_threshold,
        FamilyStatus::Family => {
            m.family_threshold + m.dependent_child_increase * Decimal::from(input.dependent_children)
        }
    }
}

/// Rate of the surcharge tier covering the income.
fn surcharge_rate(
    input: &MedicareInput,
    config: &TaxYearConfig,
) -> Decimal {
    let m = &config.medicare;
    let (tiers, shift): (&[SurchargeTier], Decimal) = match input.family_status {
        FamilyStatus::Single => (&m.surcharge_single, Decimal::ZERO),
        FamilyStatus::Family => (
            &m.surcharge_family,
            m.surcharge_family_child_increment
                * Decimal::from(input.dependent_children.saturating_sub(1)),
        ),
    };

    let income = input.taxable_income - shift;
    tiers
        .iter()
        .find(|tier| tier.max_income.is_none_or(|max| income <= max))
        .map(|tier| tier.rate)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::TaxYearRegistry;

    fn registry() -> TaxYearRegistry {
        TaxYearRegistry::builtin().unwrap()
    }

    fn family(
        income: Decimal,
        children: u32,
    ) -> MedicareInput {
        MedicareInput {
            taxable_income: income,
            family_status: FamilyStatus::Family,
            dependent_children: children,
            has_private_health_insurance: true,
            is_exempt: false,
        }
    }

    // =========================================================================
    // levy tests
    // =========================================================================

    #[test]
    fn exempt_pays_nothing() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = MedicareInput {
            is_exempt: true,
            ..MedicareInput::single(dec!(150000))
        };

        let result = calculate_medicare_levy(&input, config);

        assert!(result.is_exempt);
        assert_eq!(result.total, dec!(0));
    }

    #[test]
    fn nil_income_pays_nothing() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_medicare_levy(&MedicareInput::single(dec!(0)), config);

        assert_eq!(result.total, dec!(0));
        assert!(!result.is_exempt);
    }

    #[test]
    fn income_at_threshold_pays_nothing() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_medicare_levy(&MedicareInput::single(dec!(27222)), config);

        assert_eq!(result.medicare_levy, dec!(0));
        assert!(!result.is_shade_in);
    }

    #[test]
    fn shade_in_zone_charges_ten_percent_of_excess() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_medicare_levy(&MedicareInput::single(dec!(30000)), config);

        assert_eq!(result.medicare_levy, dec!(277.80));
        assert_eq!(result.shade_out_threshold, dec!(34027.50));
        assert!(result.is_shade_in);
    }

    #[test]
    fn full_levy_above_shade_out() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_medicare_levy(&MedicareInput::single(dec!(100000)), config);

        assert_eq!(result.medicare_levy, dec!(2000));
        assert_eq!(result.total, dec!(2000));
        assert!(!result.is_shade_in);
    }

    #[test]
    fn levy_is_continuous_at_shade_out() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let below = calculate_medicare_levy(&MedicareInput::single(dec!(34027.49)), config);
        let at = calculate_medicare_levy(&MedicareInput::single(dec!(34027.50)), config);

        assert!((at.medicare_levy - below.medicare_levy).abs() <= dec!(0.01));
    }

    #[test]
    fn family_threshold_rises_per_child() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_medicare_levy(&family(dec!(60000), 2), config);

        // 45907 + 2 × 4216 = 54339
        assert_eq!(result.threshold, dec!(54339));
        assert_eq!(result.medicare_levy, dec!(566.10));
        assert!(result.is_shade_in);
    }

    // =========================================================================
    // surcharge tests
    // =========================================================================

    #[test]
    fn no_surcharge_with_private_cover() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_medicare_levy(&MedicareInput::single(dec!(200000)), config);

        assert_eq!(result.medicare_surcharge, dec!(0));
    }

    #[test]
    fn surcharge_uses_tier_rate_without_cover() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = MedicareInput {
            has_private_health_insurance: false,
            ..MedicareInput::single(dec!(100000))
        };

        let result = calculate_medicare_levy(&input, config);

        assert_eq!(result.surcharge_rate, dec!(0.01));
        assert_eq!(result.medicare_surcharge, dec!(1000));
        assert_eq!(result.total, dec!(3000));
    }

    #[test]
    fn surcharge_base_tier_is_nil() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = MedicareInput {
            has_private_health_insurance: false,
            ..MedicareInput::single(dec!(97000))
        };

        let result = calculate_medicare_levy(&input, config);

        assert_eq!(result.medicare_surcharge, dec!(0));
    }

    #[test]
    fn top_surcharge_tier() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = MedicareInput {
            has_private_health_insurance: false,
            ..MedicareInput::single(dec!(200000))
        };

        let result = calculate_medicare_levy(&input, config);

        assert_eq!(result.medicare_surcharge, dec!(3000));
    }

    #[test]
    fn family_surcharge_tiers_shift_for_second_child() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let mut input = family(dec!(195000), 2);
        input.has_private_health_insurance = false;
        let sheltered = calculate_medicare_levy(&input, config);

        input.taxable_income = dec!(196000);
        let charged = calculate_medicare_levy(&input, config);

        assert_eq!(sheltered.medicare_surcharge, dec!(0));
        assert_eq!(charged.medicare_surcharge, dec!(1960));
    }
}
