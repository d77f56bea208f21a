//! Superannuation contributions: guarantee, caps categories, contributions
//! tax, Division 293, government co-contribution and the spouse offset.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::{format_currency, format_percentage, round_half_up};
use crate::models::{CalculationStep, Operation, TaxYearConfig};

/// Super guarantee on a year's ordinary time earnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperGuaranteeResult {
    pub earnings: Decimal,
    /// Annual maximum contribution base (four quarters).
    pub maximum_contribution_base: Decimal,
    /// Earnings the guarantee is actually paid on.
    pub assessable_earnings: Decimal,
    pub amount: Decimal,
    /// True when earnings exceeded the maximum contribution base.
    pub capped: bool,
    pub steps: Vec<CalculationStep>,
}

/// Employer super guarantee, limited by the maximum contribution base.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{TaxYearRegistry, calculate_super_guarantee};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// assert_eq!(calculate_super_guarantee(dec!(100000), config).amount, dec!(11500));
/// ```
pub fn calculate_super_guarantee(
    annual_earnings: Decimal,
    config: &TaxYearConfig,
) -> SuperGuaranteeResult {
    let earnings = annual_earnings.max(Decimal::ZERO);
    let maximum_contribution_base = config.max_contribution_base_annual();
    let capped = earnings > maximum_contribution_base;
    let assessable_earnings = earnings.min(maximum_contribution_base);
    let rate = config.superannuation.guarantee_rate;
    let amount = round_half_up(assessable_earnings * rate);

    let mut steps = vec![CalculationStep::new("Ordinary time earnings", earnings)];
    if capped {
        steps.push(
            CalculationStep::new("Maximum contribution base", maximum_contribution_base)
                .with_operation(Operation::Min)
                .with_explanation(format!(
                    "{} per quarter × 4",
                    format_currency(config.superannuation.max_contribution_base_quarterly)
                )),
        );
    }
    steps.push(
        CalculationStep::new("Super guarantee", amount)
            .with_operation(Operation::Multiply)
            .with_explanation(format!(
                "{} × {}",
                format_currency(assessable_earnings),
                format_percentage(rate)
            )),
    );

    SuperGuaranteeResult {
        earnings,
        maximum_contribution_base,
        assessable_earnings,
        amount,
        capped,
        steps,
    }
}

/// One year's contributions for a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperContributionInput {
    pub gross_salary: Decimal,
    #[serde(default)]
    pub salary_sacrifice: Option<Decimal>,
    #[serde(default)]
    pub personal_deductible: Option<Decimal>,
    #[serde(default)]
    pub personal_non_deductible: Option<Decimal>,
    #[serde(default)]
    pub spouse_contribution: Option<Decimal>,
    /// Taxable income for Division 293. Defaults to gross salary less
    /// salary sacrifice and deductible contributions.
    #[serde(default)]
    pub taxable_income: Option<Decimal>,
}

/// Contribution totals and the tax on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperContributionResult {
    pub super_guarantee: Decimal,
    pub salary_sacrifice: Decimal,
    pub personal_deductible: Decimal,
    pub concessional_total: Decimal,
    pub non_concessional_total: Decimal,
    pub contributions_tax: Decimal,
    pub division_293_tax: Decimal,
    pub net_contributions: Decimal,
    pub warnings: Vec<String>,
    pub steps: Vec<CalculationStep>,
}

/// Totals a year's contributions and the tax on them.
pub fn calculate_super_contributions(
    input: &SuperContributionInput,
    config: &TaxYearConfig,
) -> SuperContributionResult {
    let s = &config.superannuation;
    let mut warnings = Vec::new();

    let amount = |value: Option<Decimal>, name: &str, warnings: &mut Vec<String>| {
        let value = value.unwrap_or(Decimal::ZERO);
        if value < Decimal::ZERO {
            warn!(field = name, value = %value, "negative contribution treated as nil");
            warnings.push(format!("Negative {name} ignored"));
            Decimal::ZERO
        } else {
            value
        }
    };
    let salary_sacrifice = amount(input.salary_sacrifice, "salary sacrifice", &mut warnings);
    let personal_deductible =
        amount(input.personal_deductible, "personal deductible contribution", &mut warnings);
    let personal_non_deductible = amount(
        input.personal_non_deductible,
        "personal non-deductible contribution",
        &mut warnings,
    );
    let spouse = amount(input.spouse_contribution, "spouse contribution", &mut warnings);

    let sg = calculate_super_guarantee(input.gross_salary, config);
    let mut steps = sg.steps.clone();

    let concessional_total = sg.amount + salary_sacrifice + personal_deductible;
    steps.push(
        CalculationStep::new("Concessional contributions", concessional_total)
            .with_operation(Operation::Add)
            .with_explanation("Super guarantee + salary sacrifice + personal deductible"),
    );
    let non_concessional_total = personal_non_deductible + spouse;
    steps.push(
        CalculationStep::new("Non-concessional contributions", non_concessional_total)
            .with_operation(Operation::Add)
            .with_explanation("Personal non-deductible + spouse contributions"),
    );

    let contributions_tax = round_half_up(concessional_total * s.contributions_tax_rate);
    steps.push(
        CalculationStep::new("Contributions tax", contributions_tax)
            .with_operation(Operation::Multiply)
            .with_explanation(format!(
                "{} × {}",
                format_currency(concessional_total),
                format_percentage(s.contributions_tax_rate)
            )),
    );

    let taxable_income = input.taxable_income.unwrap_or_else(|| {
        (input.gross_salary - salary_sacrifice - personal_deductible).max(Decimal::ZERO)
    });
    let division_293 = calculate_division_293_tax(taxable_income, concessional_total, config);
    if division_293.tax > Decimal::ZERO {
        warnings.push(format!(
            "Division 293 tax of {} applies; income plus concessional contributions exceed {}",
            format_currency(division_293.tax),
            format_currency(s.division_293_threshold)
        ));
    }
    steps.extend(division_293.steps);

    if concessional_total > s.concessional_cap {
        warnings.push(format!(
            "Concessional contributions of {} exceed the {} cap",
            format_currency(concessional_total),
            format_currency(s.concessional_cap)
        ));
    }
    if non_concessional_total > s.non_concessional_cap {
        warnings.push(format!(
            "Non-concessional contributions of {} exceed the {} cap",
            format_currency(non_concessional_total),
            format_currency(s.non_concessional_cap)
        ));
    }

    let net_contributions = concessional_total - contributions_tax + non_concessional_total;
    steps.push(
        CalculationStep::new("Net contributions to fund", net_contributions)
            .with_operation(Operation::Equals),
    );

    debug!(
        concessional = %concessional_total,
        non_concessional = %non_concessional_total,
        division_293 = %division_293.tax,
        "super contributions calculated"
    );

    SuperContributionResult {
        super_guarantee: sg.amount,
        salary_sacrifice,
        personal_deductible,
        concessional_total,
        non_concessional_total,
        contributions_tax,
        division_293_tax: division_293.tax,
        net_contributions,
        warnings,
        steps,
    }
}

/// Division 293 tax on high earners' concessional contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division293Result {
    pub applies: bool,
    pub combined_income: Decimal,
    /// Concessional contributions taxed under Division 293.
    pub taxable_contributions: Decimal,
    pub tax: Decimal,
    pub steps: Vec<CalculationStep>,
}

/// Extra 15% tax on concessional contributions once income plus
/// contributions exceeds the threshold.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{TaxYearRegistry, calculate_division_293_tax};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// // 230,000 + 30,000 is 10,000 over the 250,000 threshold
/// let result = calculate_division_293_tax(dec!(230000), dec!(30000), config);
///
/// assert_eq!(result.taxable_contributions, dec!(10000));
/// assert_eq!(result.tax, dec!(1500));
/// ```
pub fn calculate_division_293_tax(
    taxable_income: Decimal,
    concessional_contributions: Decimal,
    config: &TaxYearConfig,
) -> Division293Result {
    let s = &config.superannuation;
    let concessional = concessional_contributions.max(Decimal::ZERO);
    let combined_income = taxable_income.max(Decimal::ZERO) + concessional;

    if combined_income <= s.division_293_threshold {
        return Division293Result {
            applies: false,
            combined_income,
            taxable_contributions: Decimal::ZERO,
            tax: Decimal::ZERO,
            steps: vec![
                CalculationStep::new("Division 293 tax", Decimal::ZERO).with_explanation(format!(
                    "Income plus concessional contributions of {} do not exceed {}",
                    format_currency(combined_income),
                    format_currency(s.division_293_threshold)
                )),
            ],
        };
    }

    let excess = combined_income - s.division_293_threshold;
    let taxable_contributions = concessional.min(excess);
    let tax = round_half_up(taxable_contributions * s.division_293_rate);

    Division293Result {
        applies: true,
        combined_income,
        taxable_contributions,
        tax,
        steps: vec![
            CalculationStep::new("Division 293 income", combined_income)
                .with_operation(Operation::Add),
            CalculationStep::new("Excess over threshold", excess)
                .with_operation(Operation::Subtract),
            CalculationStep::new("Contributions subject to Division 293", taxable_contributions)
                .with_operation(Operation::Min),
            CalculationStep::new("Division 293 tax", tax)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "{} × {}",
                    format_currency(taxable_contributions),
                    format_percentage(s.division_293_rate)
                )),
        ],
    }
}

/// Government co-contribution entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoContributionResult {
    pub eligible: bool,
    /// Income-tested maximum before matching.
    pub maximum_entitlement: Decimal,
    pub amount: Decimal,
    pub steps: Vec<CalculationStep>,
}

/// Co-contribution of 50 cents per dollar of non-concessional
/// contributions, with the maximum phased out between the income
/// thresholds.
pub fn calculate_co_contribution(
    total_income: Decimal,
    non_concessional_contributions: Decimal,
    config: &TaxYearConfig,
) -> CoContributionResult {
    let co = &config.superannuation.co_contribution;
    let contributions = non_concessional_contributions.max(Decimal::ZERO);

    let maximum_entitlement = phase_down(
        co.max_entitlement,
        total_income,
        co.lower_income_threshold,
        co.upper_income_threshold,
    );
    let amount = round_half_up((contributions * co.match_rate).min(maximum_entitlement));
    let eligible = amount > Decimal::ZERO;

    CoContributionResult {
        eligible,
        maximum_entitlement,
        amount,
        steps: vec![
            CalculationStep::new("Maximum co-contribution", maximum_entitlement).with_explanation(
                format!(
                    "{} reduced linearly between {} and {}",
                    format_currency(co.max_entitlement),
                    format_currency(co.lower_income_threshold),
                    format_currency(co.upper_income_threshold)
                ),
            ),
            CalculationStep::new("Co-contribution", amount)
                .with_operation(Operation::Min)
                .with_explanation(format!(
                    "{} × {}",
                    format_currency(contributions),
                    format_percentage(co.match_rate)
                )),
        ],
    }
}

/// Spouse contribution tax offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpouseOffsetResult {
    /// Contributions the offset is calculated on.
    pub eligible_contributions: Decimal,
    pub offset: Decimal,
    pub steps: Vec<CalculationStep>,
}

/// 18% of contributions up to $3,000, with the $3,000 reduced dollar for
/// dollar as the spouse's income rises above the lower threshold.
pub fn calculate_spouse_contribution_offset(
    spouse_income: Decimal,
    contribution: Decimal,
    config: &TaxYearConfig,
) -> SpouseOffsetResult {
    let so = &config.superannuation.spouse_offset;
    let base = phase_down(
        so.max_contribution,
        spouse_income,
        so.lower_income_threshold,
        so.upper_income_threshold,
    );
    let eligible_contributions = contribution.max(Decimal::ZERO).min(base);
    let offset = round_half_up(eligible_contributions * so.rate);

    SpouseOffsetResult {
        eligible_contributions,
        offset,
        steps: vec![
            CalculationStep::new("Maximum eligible contributions", base).with_explanation(format!(
                "{} reduced as spouse income rises from {} to {}",
                format_currency(so.max_contribution),
                format_currency(so.lower_income_threshold),
                format_currency(so.upper_income_threshold)
            )),
            CalculationStep::new("Spouse contribution offset", offset)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "{} × {}",
                    format_currency(eligible_contributions),
                    format_percentage(so.rate)
                )),
        ],
    }
}

/// `full` at or below `lower`, nil at or above `upper`, linear between.
fn phase_down(
    full: Decimal,
    income: Decimal,
    lower: Decimal,
    upper: Decimal,
) -> Decimal {
    if income <= lower {
        full
    } else if income >= upper || upper <= lower {
        Decimal::ZERO
    } else {
        round_half_up(full * (upper - income) / (upper - lower))
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

    // =========================================================================
    // calculate_super_guarantee tests
    // =========================================================================

    #[test]
    fn guarantee_below_contribution_base() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_super_guarantee(dec!(100000), config);

        assert_eq!(result.amount, dec!(11500));
        assert!(!result.capped);
    }

    #[test]
    fn guarantee_capped_at_maximum_contribution_base() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_super_guarantee(dec!(300000), config);

        // 65,070 × 4 × 11.5%
        assert!(result.capped);
        assert_eq!(result.assessable_earnings, dec!(260280));
        assert_eq!(result.amount, dec!(29932.20));
    }

    #[test]
    fn guarantee_rate_changes_by_year() {
        let registry = registry();

        let older = calculate_super_guarantee(dec!(100000), registry.get_config("2023-24").config);
        let newer = calculate_super_guarantee(dec!(100000), registry.get_config("2025-26").config);

        assert_eq!(older.amount, dec!(11000));
        assert_eq!(newer.amount, dec!(12000));
    }

    // =========================================================================
    // calculate_super_contributions tests
    // =========================================================================

    #[test]
    fn contributions_split_into_caps_categories() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = SuperContributionInput {
            gross_salary: dec!(100000),
            salary_sacrifice: Some(dec!(5000)),
            personal_deductible: Some(dec!(2000)),
            personal_non_deductible: Some(dec!(10000)),
            spouse_contribution: Some(dec!(3000)),
            taxable_income: None,
        };

        let result = calculate_super_contributions(&input, config);

        assert_eq!(result.concessional_total, dec!(18500));
        assert_eq!(result.non_concessional_total, dec!(13000));
        assert_eq!(result.contributions_tax, dec!(2775));
        assert_eq!(result.division_293_tax, dec!(0));
        assert_eq!(result.net_contributions, dec!(28725));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn contributions_over_cap_warn() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = SuperContributionInput {
            gross_salary: dec!(150000),
            salary_sacrifice: Some(dec!(20000)),
            ..SuperContributionInput::default()
        };

        let result = calculate_super_contributions(&input, config);

        // 17,250 SG + 20,000 sacrifice
        assert_eq!(result.concessional_total, dec!(37250));
        assert!(result.warnings.iter().any(|w| w.contains("exceed the $30,000 cap")));
    }

    #[test]
    fn negative_contributions_are_ignored_with_warning() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = SuperContributionInput {
            gross_salary: dec!(50000),
            salary_sacrifice: Some(dec!(-100)),
            ..SuperContributionInput::default()
        };

        let result = calculate_super_contributions(&input, config);

        assert_eq!(result.salary_sacrifice, dec!(0));
        assert_eq!(result.warnings, vec!["Negative salary sacrifice ignored".to_string()]);
    }

    #[test]
    fn high_earner_pays_division_293_through_contributions() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = SuperContributionInput {
            gross_salary: dec!(240000),
            taxable_income: Some(dec!(240000)),
            ..SuperContributionInput::default()
        };

        let result = calculate_super_contributions(&input, config);

        // SG 27,600; 267,600 is 17,600 over the threshold
        assert_eq!(result.super_guarantee, dec!(27600));
        assert_eq!(result.division_293_tax, dec!(2640));
        assert!(result.warnings.iter().any(|w| w.starts_with("Division 293 tax of $2,640")));
    }

    // =========================================================================
    // calculate_division_293_tax tests
    // =========================================================================

    #[test]
    fn division_293_not_applied_at_threshold() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_division_293_tax(dec!(220000), dec!(30000), config);

        assert!(!result.applies);
        assert_eq!(result.tax, dec!(0));
    }

    #[test]
    fn division_293_on_excess_only() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_division_293_tax(dec!(230000), dec!(30000), config);

        assert_eq!(result.tax, dec!(1500));
    }

    #[test]
    fn division_293_limited_to_contributions() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_division_293_tax(dec!(400000), dec!(30000), config);

        assert_eq!(result.taxable_contributions, dec!(30000));
        assert_eq!(result.tax, dec!(4500));
    }

    // =========================================================================
    // calculate_co_contribution tests
    // =========================================================================

    #[test]
    fn co_contribution_full_below_lower_threshold() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_co_contribution(dec!(40000), dec!(1000), config);

        assert_eq!(result.amount, dec!(500));
    }

    #[test]
    fn co_contribution_matches_fifty_cents_per_dollar() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_co_contribution(dec!(40000), dec!(400), config);

        assert_eq!(result.amount, dec!(200));
    }

    #[test]
    fn co_contribution_phased_out() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        // halfway between 45,400 and 60,400
        let result = calculate_co_contribution(dec!(52900), dec!(1000), config);

        assert_eq!(result.maximum_entitlement, dec!(250));
        assert_eq!(result.amount, dec!(250));
    }

    #[test]
    fn co_contribution_nil_at_upper_threshold() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_co_contribution(dec!(60400), dec!(1000), config);

        assert!(!result.eligible);
        assert_eq!(result.amount, dec!(0));
    }

    // =========================================================================
    // calculate_spouse_contribution_offset tests
    // =========================================================================

    #[test]
    fn spouse_offset_full() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_spouse_contribution_offset(dec!(30000), dec!(3000), config);

        assert_eq!(result.offset, dec!(540));
    }

    #[test]
    fn spouse_offset_phased() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        // base reduced to 1,500 at 38,500
        let result = calculate_spouse_contribution_offset(dec!(38500), dec!(3000), config);

        assert_eq!(result.eligible_contributions, dec!(1500));
        assert_eq!(result.offset, dec!(270));
    }

    #[test]
    fn spouse_offset_nil_above_upper_threshold() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_spouse_contribution_offset(dec!(45000), dec!(3000), config);

        assert_eq!(result.offset, dec!(0));
    }
}
