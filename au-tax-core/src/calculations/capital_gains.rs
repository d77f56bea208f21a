//! Capital gains for a single asset disposal.
//!
//! Capital losses (this year's, then those carried forward) are applied to
//! the gross gain first. The CGT discount then applies to what is left when
//! the asset was held for longer than the minimum holding period.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::{format_currency, format_percentage, round_half_up};
use crate::models::{CalculationStep, FinancialYear, Operation, TaxYearConfig};

/// One CGT event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalGainInput {
    pub capital_proceeds: Decimal,
    pub cost_base: Decimal,
    pub acquired: NaiveDate,
    pub disposed: NaiveDate,
    #[serde(default)]
    pub current_year_losses: Decimal,
    #[serde(default)]
    pub carried_forward_losses: Decimal,
}

/// Net capital gain, or the loss carried forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalGainResult {
    /// Proceeds less cost base; negative for a capital loss.
    pub gross_gain: Decimal,
    pub losses_applied: Decimal,
    pub discount_eligible: bool,
    pub discount: Decimal,
    /// Amount included in assessable income.
    pub net_capital_gain: Decimal,
    pub loss_carried_forward: Decimal,
    pub warnings: Vec<String>,
    pub steps: Vec<CalculationStep>,
}

/// True when the asset was held for more than `months`, not counting the
/// days it was acquired and disposed of.
pub fn held_for_discount(
    acquired: NaiveDate,
    disposed: NaiveDate,
    months: u32,
) -> bool {
    acquired
        .checked_add_months(Months::new(months))
        .is_some_and(|anniversary| anniversary < disposed)
}

/// Works out the net capital gain for one disposal.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
/// use au_tax_core::{CapitalGainInput, TaxYearRegistry, calculate_capital_gain};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// let input = CapitalGainInput {
///     capital_proceeds: dec!(50000),
///     cost_base: dec!(30000),
///     acquired: NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(),
///     disposed: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
///     current_year_losses: dec!(4000),
///     carried_forward_losses: dec!(0),
/// };
/// let result = calculate_capital_gain(&input, config);
///
/// // (20,000 − 4,000) × 50%
/// assert_eq!(result.net_capital_gain, dec!(8000));
/// ```
pub fn calculate_capital_gain(
    input: &CapitalGainInput,
    config: &TaxYearConfig,
) -> CapitalGainResult {
    let cgt = &config.cgt;
    let mut warnings = Vec::new();

    if input.disposed < input.acquired {
        warn!(acquired = %input.acquired, disposed = %input.disposed, "disposal precedes acquisition");
        warnings.push("Disposal date is before the acquisition date".to_string());
    }
    if FinancialYear::from_date(input.disposed) != config.financial_year {
        warnings.push(format!(
            "Disposed of in {}, not {}",
            FinancialYear::from_date(input.disposed),
            config.financial_year
        ));
    }

    let gross_gain = round_half_up(input.capital_proceeds - input.cost_base);
    let losses = input.current_year_losses.max(Decimal::ZERO)
        + input.carried_forward_losses.max(Decimal::ZERO);
    let discount_eligible = held_for_discount(input.acquired, input.disposed, cgt.min_holding_months);

    let mut steps = vec![
        CalculationStep::new("Capital proceeds", input.capital_proceeds),
        CalculationStep::new("Cost base", input.cost_base).with_operation(Operation::Subtract),
        CalculationStep::new(
            if gross_gain < Decimal::ZERO {
                "Capital loss"
            } else {
                "Capital gain"
            },
            gross_gain,
        )
        .with_operation(Operation::Equals),
    ];

    if gross_gain <= Decimal::ZERO {
        let loss_carried_forward = losses - gross_gain;
        steps.push(
            CalculationStep::new("Loss carried forward", loss_carried_forward)
                .with_operation(Operation::Add)
                .with_explanation(format!(
                    "No gain to absorb {} of existing losses",
                    format_currency(losses)
                )),
        );
        return CapitalGainResult {
            gross_gain,
            losses_applied: Decimal::ZERO,
            discount_eligible,
            discount: Decimal::ZERO,
            net_capital_gain: Decimal::ZERO,
            loss_carried_forward,
            warnings,
            steps,
        };
    }

    let losses_applied = losses.min(gross_gain);
    let after_losses = gross_gain - losses_applied;
    steps.push(
        CalculationStep::new("Capital losses applied", losses_applied)
            .with_operation(Operation::Subtract)
            .with_explanation("Current year losses, then losses carried forward"),
    );

    let discount = if discount_eligible {
        round_half_up(after_losses * cgt.discount_rate)
    } else {
        Decimal::ZERO
    };
    steps.push(
        CalculationStep::new("CGT discount", discount)
            .with_operation(Operation::Subtract)
            .with_explanation(if discount_eligible {
                format!(
                    "{} × {}",
                    format_currency(after_losses),
                    format_percentage(cgt.discount_rate)
                )
            } else {
                format!("Held for {} months or less", cgt.min_holding_months)
            }),
    );

    let net_capital_gain = after_losses - discount;
    let loss_carried_forward = losses - losses_applied;
    steps.push(CalculationStep::new("Net capital gain", net_capital_gain).with_operation(Operation::Equals));

    debug!(
        gross_gain = %gross_gain,
        net = %net_capital_gain,
        discounted = discount_eligible,
        "capital gain calculated"
    );

    CapitalGainResult {
        gross_gain,
        losses_applied,
        discount_eligible,
        discount,
        net_capital_gain,
        loss_carried_forward,
        warnings,
        steps,
    }
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

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(
        proceeds: Decimal,
        cost_base: Decimal,
        acquired: NaiveDate,
    ) -> CapitalGainInput {
        CapitalGainInput {
            capital_proceeds: proceeds,
            cost_base,
            acquired,
            disposed: date(2024, 10, 1),
            current_year_losses: Decimal::ZERO,
            carried_forward_losses: Decimal::ZERO,
        }
    }

    // =========================================================================
    // held_for_discount tests
    // =========================================================================

    #[test]
    fn exactly_twelve_months_is_not_enough() {
        assert!(!held_for_discount(date(2023, 10, 1), date(2024, 10, 1), 12));
    }

    #[test]
    fn one_day_past_twelve_months_qualifies() {
        assert!(held_for_discount(date(2023, 10, 1), date(2024, 10, 2), 12));
    }

    #[test]
    fn month_end_acquisition_clamps_to_month_end() {
        // 31 January + 12 months is 31 January the next year
        assert!(!held_for_discount(date(2023, 1, 31), date(2024, 1, 31), 12));
        assert!(held_for_discount(date(2023, 1, 31), date(2024, 2, 1), 12));
    }

    // =========================================================================
    // calculate_capital_gain tests
    // =========================================================================

    #[test]
    fn long_held_gain_is_discounted() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_capital_gain(&input(dec!(50000), dec!(30000), date(2020, 1, 1)), config);

        assert_eq!(result.gross_gain, dec!(20000));
        assert!(result.discount_eligible);
        assert_eq!(result.discount, dec!(10000));
        assert_eq!(result.net_capital_gain, dec!(10000));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn short_held_gain_is_not_discounted() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_capital_gain(&input(dec!(50000), dec!(30000), date(2024, 3, 1)), config);

        assert!(!result.discount_eligible);
        assert_eq!(result.net_capital_gain, dec!(20000));
    }

    #[test]
    fn losses_applied_before_discount() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let with_losses = CapitalGainInput {
            current_year_losses: dec!(2000),
            carried_forward_losses: dec!(6000),
            ..input(dec!(50000), dec!(30000), date(2020, 1, 1))
        };

        let result = calculate_capital_gain(&with_losses, config);

        // (20,000 − 8,000) × 50%
        assert_eq!(result.losses_applied, dec!(8000));
        assert_eq!(result.net_capital_gain, dec!(6000));
        assert_eq!(result.loss_carried_forward, dec!(0));
    }

    #[test]
    fn losses_larger_than_gain_carry_forward() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let with_losses = CapitalGainInput {
            carried_forward_losses: dec!(25000),
            ..input(dec!(50000), dec!(30000), date(2020, 1, 1))
        };

        let result = calculate_capital_gain(&with_losses, config);

        assert_eq!(result.net_capital_gain, dec!(0));
        assert_eq!(result.loss_carried_forward, dec!(5000));
    }

    #[test]
    fn capital_loss_adds_to_carried_forward_losses() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let loss = CapitalGainInput {
            carried_forward_losses: dec!(1000),
            ..input(dec!(10000), dec!(13000), date(2020, 1, 1))
        };

        let result = calculate_capital_gain(&loss, config);

        assert_eq!(result.gross_gain, dec!(-3000));
        assert_eq!(result.net_capital_gain, dec!(0));
        assert_eq!(result.loss_carried_forward, dec!(4000));
    }

    #[test]
    fn disposal_outside_the_year_is_flagged() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let later = CapitalGainInput {
            disposed: date(2025, 7, 1),
            ..input(dec!(50000), dec!(30000), date(2020, 1, 1))
        };

        let result = calculate_capital_gain(&later, config);

        assert_eq!(result.warnings, vec!["Disposed of in 2025-26, not 2024-25".to_string()]);
    }
}
