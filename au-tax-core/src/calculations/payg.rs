//! PAYG withholding using the weekly formula coefficients.
//!
//! Earnings for any pay period are converted to a weekly figure, the band
//! covering it gives coefficients `a` and `b`, and weekly withholding is
//! `a × earnings − b` rounded to the nearest dollar (never negative). The
//! weekly amount is then projected onto the other pay frequencies.
//!
//! Scale 2 applies when the tax-free threshold is claimed, scale 1 when it
//! is not.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::{format_currency, round_half_up, round_to_dollar};
use crate::calculations::solver::{BisectionOptions, bisect};
use crate::models::{CalculationStep, Operation, PayFrequency, PaygBand, TaxYearConfig, WEEKS_PER_YEAR};

/// Withholding scale selected by the tax-free threshold claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithholdingScale {
    /// Tax-free threshold not claimed.
    NoTaxFreeThreshold,
    /// Tax-free threshold claimed.
    TaxFreeThreshold,
}

impl WithholdingScale {
    pub fn for_claim(has_tax_free_threshold: bool) -> Self {
        if has_tax_free_threshold {
            Self::TaxFreeThreshold
        } else {
            Self::NoTaxFreeThreshold
        }
    }

    fn bands<'a>(
        &self,
        config: &'a TaxYearConfig,
    ) -> &'a [PaygBand] {
        match self {
            Self::TaxFreeThreshold => &config.payg.with_tax_free_threshold,
            Self::NoTaxFreeThreshold => &config.payg.no_tax_free_threshold,
        }
    }
}

/// Earnings for one pay period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaygInput {
    /// Gross earnings for one period of `frequency`.
    pub gross_income: Decimal,
    pub frequency: PayFrequency,
    pub has_tax_free_threshold: bool,
    /// Study and training loan (HELP) debt. Extra withholding for it is not
    /// yet calculated.
    #[serde(default)]
    pub has_study_loan: bool,
}

/// Withholding for one pay period and its projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaygResult {
    pub weekly_earnings: Decimal,
    pub scale: WithholdingScale,
    pub coefficient_a: Decimal,
    pub coefficient_b: Decimal,
    pub weekly: Decimal,
    pub fortnightly: Decimal,
    pub monthly: Decimal,
    pub quarterly: Decimal,
    pub annual_withholding: Decimal,
    /// Withholding for one period of the input frequency.
    pub per_period: Decimal,
    pub steps: Vec<CalculationStep>,
}

/// Calculates PAYG withholding for one pay period.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{PayFrequency, PaygInput, TaxYearRegistry, calculate_payg};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// let input = PaygInput {
///     gross_income: dec!(2000),
///     frequency: PayFrequency::Weekly,
///     has_tax_free_threshold: true,
///     has_study_loan: false,
/// };
/// let result = calculate_payg(&input, config);
///
/// // 0.32 × 2,000 − 176.5769, rounded to the dollar
/// assert_eq!(result.weekly, dec!(463));
/// assert_eq!(result.fortnightly, dec!(926));
/// ```
pub fn calculate_payg(
    input: &PaygInput,
    config: &TaxYearConfig,
) -> PaygResult {
    let gross = input.gross_income.max(Decimal::ZERO);
    if input.gross_income < Decimal::ZERO {
        warn!(gross = %input.gross_income, "negative earnings treated as nil for withholding");
    }

    let scale = WithholdingScale::for_claim(input.has_tax_free_threshold);
    let weekly_earnings = input.frequency.to_weekly(gross);
    let (a, b) = coefficients(weekly_earnings, scale, config);
    let weekly = weekly_withholding(weekly_earnings, a, b);

    let mut steps = vec![
        CalculationStep::new("Gross earnings", gross)
            .with_explanation(format!("Per {} period", input.frequency.as_str().to_lowercase())),
        CalculationStep::new("Weekly earnings", weekly_earnings)
            .with_operation(Operation::Divide)
            .with_explanation(format!(
                "{} × {} ÷ {}",
                format_currency(gross),
                input.frequency.periods_per_year(),
                WEEKS_PER_YEAR
            )),
        CalculationStep::new("Weekly withholding", weekly)
            .with_operation(Operation::Multiply)
            .with_explanation(format!(
                "{} × {} − {}, rounded to the dollar ({})",
                a.normalize(),
                format_currency(weekly_earnings),
                b.normalize(),
                match scale {
                    WithholdingScale::TaxFreeThreshold => "tax-free threshold claimed",
                    WithholdingScale::NoTaxFreeThreshold => "no tax-free threshold",
                }
            )),
    ];

    if input.has_study_loan {
        steps.push(
            CalculationStep::new("Study loan withholding", Decimal::ZERO)
                .with_explanation("Not yet implemented; not included in the totals"),
        );
    }

    let annual_withholding = weekly * WEEKS_PER_YEAR;
    let per_period = input.frequency.from_weekly(weekly);
    steps.push(
        CalculationStep::new("Withholding per period", per_period)
            .with_operation(Operation::Equals),
    );

    debug!(
        weekly_earnings = %weekly_earnings,
        weekly = %weekly,
        frequency = %input.frequency,
        "payg withholding calculated"
    );

    PaygResult {
        weekly_earnings,
        scale,
        coefficient_a: a,
        coefficient_b: b,
        weekly,
        fortnightly: PayFrequency::Fortnightly.from_weekly(weekly),
        monthly: PayFrequency::Monthly.from_weekly(weekly),
        quarterly: PayFrequency::Quarterly.from_weekly(weekly),
        annual_withholding,
        per_period,
        steps,
    }
}

/// Withholding for one period without building the step trail.
pub fn withholding_for_period(
    gross: Decimal,
    frequency: PayFrequency,
    has_tax_free_threshold: bool,
    config: &TaxYearConfig,
) -> Decimal {
    let scale = WithholdingScale::for_claim(has_tax_free_threshold);
    let weekly_earnings = frequency.to_weekly(gross.max(Decimal::ZERO));
    let (a, b) = coefficients(weekly_earnings, scale, config);
    frequency.from_weekly(weekly_withholding(weekly_earnings, a, b))
}

fn coefficients(
    weekly_earnings: Decimal,
    scale: WithholdingScale,
    config: &TaxYearConfig,
) -> (Decimal, Decimal) {
    scale
        .bands(config)
        .iter()
        .find(|band| band.covers(weekly_earnings))
        .map(|band| (band.a, band.b))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO))
}

fn weekly_withholding(
    weekly_earnings: Decimal,
    a: Decimal,
    b: Decimal,
) -> Decimal {
    round_to_dollar((a * weekly_earnings - b).max(Decimal::ZERO))
}

/// Gross pay for one period that leaves the requested net after withholding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossFromNet {
    pub gross: Decimal,
    pub tax: Decimal,
    /// Net actually achieved by `gross`.
    pub net: Decimal,
    pub iterations: u32,
    pub converged: bool,
}

/// Solves for the gross pay whose withholding leaves `net_income`.
///
/// Searches `[net, 2 × net]` by bisection to a one-cent tolerance. A nil or
/// negative net returns zeros without searching.
pub fn calculate_gross_from_net(
    net_income: Decimal,
    frequency: PayFrequency,
    has_tax_free_threshold: bool,
    config: &TaxYearConfig,
) -> GrossFromNet {
    if net_income <= Decimal::ZERO {
        return GrossFromNet {
            gross: Decimal::ZERO,
            tax: Decimal::ZERO,
            net: Decimal::ZERO,
            iterations: 0,
            converged: true,
        };
    }

    let net_of = |gross: Decimal| {
        gross - withholding_for_period(gross, frequency, has_tax_free_threshold, config)
    };
    let outcome = bisect(
        net_income,
        net_income,
        net_income * Decimal::TWO,
        BisectionOptions::default(),
        net_of,
    );

    let gross = nearest_cent(outcome.value, net_income, net_of);
    let tax = withholding_for_period(gross, frequency, has_tax_free_threshold, config);

    GrossFromNet {
        gross,
        tax,
        net: gross - tax,
        iterations: outcome.iterations,
        converged: outcome.converged,
    }
}

/// Rounds a solver result to cents, picking whichever neighbouring cent
/// lands closer to the target.
pub(crate) fn nearest_cent<F>(
    value: Decimal,
    target: Decimal,
    f: F,
) -> Decimal
where
    F: Fn(Decimal) -> Decimal,
{
    let floor = value.round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let ceil = floor + dec!(0.01);
    if (f(floor) - target).abs() <= (f(ceil) - target).abs() {
        round_half_up(floor)
    } else {
        round_half_up(ceil)
    }
}
