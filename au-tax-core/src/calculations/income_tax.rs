//! Progressive income tax on taxable income.
//!
//! Tax for an income in bracket *n* is the bracket's base amount plus the
//! marginal rate on each dollar from the bracket's first dollar:
//!
//! ```text
//! tax = base_tax + (income − min_income + 1) × rate
//! ```
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use au_tax_core::{TaxYearRegistry, calculate_income_tax};
//!
//! let registry = TaxYearRegistry::builtin().unwrap();
//! let config = registry.get_config("2024-25").config;
//!
//! let result = calculate_income_tax(dec!(100000), config);
//!
//! assert_eq!(result.tax_payable, dec!(20788));
//! assert_eq!(result.marginal_rate, dec!(30));
//! assert_eq!(result.effective_rate, dec!(20.79));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::common::{format_currency, format_percentage, round_half_up, to_percentage};
use crate::models::{CalculationStep, Operation, TaxYearConfig};

/// Income tax on a taxable income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeTaxResult {
    pub taxable_income: Decimal,

    /// Tax before offsets and Medicare, in cents.
    pub tax_payable: Decimal,

    /// Tax as a percentage of taxable income, two decimal places.
    pub effective_rate: Decimal,

    /// Rate on the next dollar, as a percentage.
    pub marginal_rate: Decimal,

    /// Index of the bracket the income falls in; `None` for nil income.
    pub bracket_index: Option<usize>,

    pub steps: Vec<CalculationStep>,
}

impl IncomeTaxResult {
    fn nil(taxable_income: Decimal) -> Self {
        Self {
            taxable_income,
            tax_payable: Decimal::ZERO,
            effective_rate: Decimal::ZERO,
            marginal_rate: Decimal::ZERO,
            bracket_index: None,
            steps: vec![
                CalculationStep::new("Taxable income", taxable_income)
                    .with_explanation("No tax is payable on nil or negative taxable income"),
            ],
        }
    }
}

/// Calculates income tax on `taxable_income` using the year's brackets.
pub fn calculate_income_tax(
    taxable_income: Decimal,
    config: &TaxYearConfig,
) -> IncomeTaxResult {
    if taxable_income <= Decimal::ZERO {
        return IncomeTaxResult::nil(taxable_income);
    }

    let Some(info) = config.bracket_info(taxable_income) else {
        // validated tables always end unbounded
        return IncomeTaxResult::nil(taxable_income);
    };
    let bracket = &info.bracket;

    let tax_on_excess = info.income_within_bracket * bracket.tax_rate;
    let tax_payable = round_half_up(bracket.base_tax + tax_on_excess);
    let effective_rate = round_half_up(tax_payable / taxable_income * Decimal::ONE_HUNDRED);
    let marginal_rate = to_percentage(bracket.tax_rate);

    debug!(
        income = %taxable_income,
        bracket = info.index,
        tax = %tax_payable,
        "income tax calculated"
    );

    let threshold = (bracket.min_income - Decimal::ONE).max(Decimal::ZERO);
    let steps = vec![
        CalculationStep::new("Taxable income", taxable_income),
        CalculationStep::new("Base tax for bracket", bracket.base_tax).with_explanation(format!(
            "Tax on income up to {}",
            format_currency(threshold)
        )),
        CalculationStep::new("Income within bracket", info.income_within_bracket)
            .with_operation(Operation::Subtract)
            .with_explanation(format!(
                "{} above {}",
                format_currency(taxable_income),
                format_currency(threshold)
            )),
        CalculationStep::new("Tax on income within bracket", round_half_up(tax_on_excess))
            .with_operation(Operation::Multiply)
            .with_explanation(format!(
                "{} × {}",
                format_currency(info.income_within_bracket),
                format_percentage(bracket.tax_rate)
            )),
        CalculationStep::new("Tax payable", tax_payable).with_operation(Operation::Equals),
    ];

    IncomeTaxResult {
        taxable_income,
        tax_payable,
        effective_rate,
        marginal_rate,
        bracket_index: Some(info.index),
        steps,
    }
}

/// Extra tax payable on `additional` income stacked on top of `base_income`.
///
/// Never negative for a non-negative `additional`.
pub fn tax_on_additional_income(
    base_income: Decimal,
    additional: Decimal,
    config: &TaxYearConfig,
) -> Decimal {
    let with = calculate_income_tax(base_income + additional, config).tax_payable;
    let without = calculate_income_tax(base_income, config).tax_payable;
    with - without
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

    // =========================================================================
    // calculate_income_tax tests
    // =========================================================================

    #[test]
    fn nil_income_pays_no_tax() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_income_tax(dec!(0), config);

        assert_eq!(result.tax_payable, dec!(0));
        assert_eq!(result.effective_rate, dec!(0));
        assert_eq!(result.marginal_rate, dec!(0));
        assert_eq!(result.bracket_index, None);
        assert_eq!(result.steps.len(), 1);
    }

    #[test]
    fn negative_income_pays_no_tax() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_income_tax(dec!(-5000), config);

        assert_eq!(result.tax_payable, dec!(0));
    }

    #[test]
    fn income_at_tax_free_threshold_pays_nothing() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_income_tax(dec!(18200), config);

        assert_eq!(result.tax_payable, dec!(0));
        assert_eq!(result.bracket_index, Some(0));
    }

    #[test]
    fn first_dollar_above_threshold_is_taxed() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_income_tax(dec!(18201), config);

        assert_eq!(result.tax_payable, dec!(0.16));
        assert_eq!(result.marginal_rate, dec!(16));
    }

    #[test]
    fn one_hundred_thousand_in_2024_25() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_income_tax(dec!(100000), config);

        // 4288 + (100000 − 45000) × 0.30
        assert_eq!(result.tax_payable, dec!(20788));
        assert_eq!(result.bracket_index, Some(2));
        assert_eq!(result.steps.last().unwrap().value, dec!(20788));
    }

    #[test]
    fn one_hundred_thousand_in_2023_24_uses_old_rates() {
        let registry = registry();
        let config = registry.get_config("2023-24").config;

        let result = calculate_income_tax(dec!(100000), config);

        // 5092 + 55000 × 0.325
        assert_eq!(result.tax_payable, dec!(22967));
        assert_eq!(result.marginal_rate, dec!(32.5));
    }

    #[test]
    fn top_bracket() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_income_tax(dec!(250000), config);

        // 51638 + 60000 × 0.45
        assert_eq!(result.tax_payable, dec!(78638));
        assert_eq!(result.marginal_rate, dec!(45));
    }

    #[test]
    fn tax_is_continuous_at_bracket_boundaries() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        for bracket in config.brackets.iter().skip(1) {
            let below = calculate_income_tax(bracket.min_income - dec!(1), config);
            let at = calculate_income_tax(bracket.min_income, config);

            assert_eq!(
                at.tax_payable - below.tax_payable,
                round_half_up(bracket.tax_rate)
            );
        }
    }

    // =========================================================================
    // tax_on_additional_income tests
    // =========================================================================

    #[test]
    fn additional_income_within_one_bracket() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let extra = tax_on_additional_income(dec!(60000), dec!(10000), config);

        assert_eq!(extra, dec!(3000));
    }

    #[test]
    fn additional_income_spanning_brackets() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        // 5000 at 16% then 5000 at 30%
        let extra = tax_on_additional_income(dec!(40000), dec!(10000), config);

        assert_eq!(extra, dec!(2300));
    }
}
