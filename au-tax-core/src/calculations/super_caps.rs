//! Contribution cap tracking.
//!
//! The concessional cap can be topped up with unused cap from up to five
//! earlier years, provided the member's total super balance is below the
//! carry-forward threshold. Unused amounts are consumed oldest first.
//!
//! The non-concessional cap can be brought forward by up to three years,
//! the number of years depending on the total super balance. At or above
//! the general transfer balance cap the non-concessional cap is nil.
//!
//! Tax on excess contributions is only approximated here. The ATO works out
//! the actual amount.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::{format_currency, format_percentage, max, min, round_half_up};
use crate::models::{CalculationStep, FinancialYear, Operation, TaxYearConfig};

/// Label attached to every excess contribution tax figure.
pub const EXCESS_ESTIMATE_NOTE: &str = "estimate, not an ATO assessment";

/// Percentage of a cap at which a contribution is reported as close to it.
const NEAR_CAP_PERCENTAGE: Decimal = dec!(90);

/// Concessional cap left unused in an earlier financial year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryForwardRecord {
    pub financial_year: FinancialYear,
    pub unused_amount: Decimal,
}

/// Unused concessional cap available this year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryForwardResult {
    pub eligible: bool,
    pub available: Decimal,
    /// Records that count, oldest first.
    pub records: Vec<CarryForwardRecord>,
    pub steps: Vec<CalculationStep>,
}

/// Unused concessional cap the member can draw on in `config`'s year.
///
/// Only records from one to `max_years` years back, no earlier than the
/// first carry-forward year, are counted.
pub fn calculate_carry_forward(
    total_super_balance: Decimal,
    records: &[CarryForwardRecord],
    config: &TaxYearConfig,
) -> CarryForwardResult {
    let rules = &config.superannuation.carry_forward;
    let current = config.financial_year;

    if total_super_balance >= rules.total_super_balance_threshold {
        return CarryForwardResult {
            eligible: false,
            available: Decimal::ZERO,
            records: Vec::new(),
            steps: vec![
                CalculationStep::new("Carry-forward available", Decimal::ZERO).with_explanation(
                    format!(
                        "Total super balance of {} is not below {}",
                        format_currency(total_super_balance),
                        format_currency(rules.total_super_balance_threshold)
                    ),
                ),
            ],
        };
    }

    let max_years = i32::try_from(rules.max_years).unwrap_or(i32::MAX);
    let mut eligible: Vec<CarryForwardRecord> = records
        .iter()
        .filter(|r| {
            let years_back = current.years_since(r.financial_year);
            (1..=max_years).contains(&years_back)
                && r.financial_year >= rules.first_year
                && r.unused_amount > Decimal::ZERO
        })
        .cloned()
        .collect();
    eligible.sort_by_key(|r| r.financial_year);

    let available = eligible.iter().map(|r| r.unused_amount).sum::<Decimal>();
    let mut steps: Vec<CalculationStep> = eligible
        .iter()
        .map(|r| {
            CalculationStep::new(format!("Unused cap {}", r.financial_year), r.unused_amount)
                .with_operation(Operation::Add)
        })
        .collect();
    steps.push(
        CalculationStep::new("Carry-forward available", available)
            .with_operation(Operation::Equals),
    );

    CarryForwardResult {
        eligible: true,
        available,
        records: eligible,
        steps,
    }
}

/// How much of one year's unused cap was drawn on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryForwardUsage {
    pub financial_year: FinancialYear,
    pub applied: Decimal,
    pub remaining_unused: Decimal,
}

/// Draws `amount` from `records` oldest first.
///
/// Records are expected in the order [`calculate_carry_forward`] returns
/// them. Any amount beyond the total available is left uncovered.
pub fn consume_carry_forward(
    records: &[CarryForwardRecord],
    amount: Decimal,
) -> Vec<CarryForwardUsage> {
    let mut outstanding = amount.max(Decimal::ZERO);
    records
        .iter()
        .map(|r| {
            let applied = min(outstanding, r.unused_amount);
            outstanding -= applied;
            CarryForwardUsage {
                financial_year: r.financial_year,
                applied,
                remaining_unused: r.unused_amount - applied,
            }
        })
        .collect()
}

/// Record of the concessional cap `contributed` left unused in the year
/// described by `config`.
pub fn unused_concessional_cap(
    financial_year: FinancialYear,
    contributed: Decimal,
    config: &TaxYearConfig,
) -> CarryForwardRecord {
    CarryForwardRecord {
        financial_year,
        unused_amount: (config.superannuation.concessional_cap - contributed.max(Decimal::ZERO))
            .max(Decimal::ZERO),
    }
}

/// Non-concessional cap available under the bring-forward rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BringForwardResult {
    pub years: u32,
    pub available_cap: Decimal,
    /// True when more than one year can be brought forward.
    pub eligible: bool,
    /// True when the balance is at or above the transfer balance cap. The
    /// configured bands still decide `years` and `available_cap`.
    pub nil_cap: bool,
    pub steps: Vec<CalculationStep>,
}

/// Works out how many years of non-concessional cap are available.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{TaxYearRegistry, calculate_bring_forward};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// let result = calculate_bring_forward(dec!(500000), config);
///
/// assert_eq!(result.years, 3);
/// assert_eq!(result.available_cap, dec!(360000));
/// ```
pub fn calculate_bring_forward(
    total_super_balance: Decimal,
    config: &TaxYearConfig,
) -> BringForwardResult {
    let s = &config.superannuation;
    let nil_cap = total_super_balance >= s.general_transfer_balance_cap;

    let years = s
        .bring_forward
        .iter()
        .find(|band| {
            band.total_super_balance_below
                .is_none_or(|below| total_super_balance < below)
        })
        .map(|band| band.years)
        .unwrap_or(1);
    let available_cap = s.non_concessional_cap * Decimal::from(years);

    let mut steps = vec![
        CalculationStep::new("Non-concessional cap available", available_cap)
            .with_operation(Operation::Multiply)
            .with_explanation(format!(
                "{} × {} year(s) for a total super balance of {}",
                format_currency(s.non_concessional_cap),
                years,
                format_currency(total_super_balance)
            )),
    ];
    if nil_cap {
        steps.push(
            CalculationStep::new("Transfer balance cap", s.general_transfer_balance_cap)
                .with_explanation(format!(
                    "Total super balance of {} is at or above the cap; non-concessional \
                     contributions may be treated as excess",
                    format_currency(total_super_balance)
                )),
        );
    }

    BringForwardResult {
        years,
        available_cap,
        eligible: years > 1,
        nil_cap,
        steps,
    }
}

/// Contributions made so far this year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapTrackingInput {
    pub concessional_ytd: Decimal,
    pub non_concessional_ytd: Decimal,
    /// Total super balance at 30 June of the previous year.
    pub total_super_balance: Decimal,
    #[serde(default)]
    pub carry_forward_records: Vec<CarryForwardRecord>,
}

/// Position against one cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapStatus {
    pub standard_cap: Decimal,
    /// Standard cap plus carry-forward or bring-forward amounts.
    pub total_available: Decimal,
    pub used: Decimal,
    pub remaining: Decimal,
    /// Share of the available cap used, at most 100.
    pub percentage_used: Decimal,
    pub exceeded: bool,
    pub excess_amount: Decimal,
    /// Approximate tax on the excess.
    pub excess_tax_estimate: Decimal,
}

impl CapStatus {
    fn new(
        standard_cap: Decimal,
        total_available: Decimal,
        used: Decimal,
        estimate_rate: Decimal,
    ) -> Self {
        let used = max(used, Decimal::ZERO);
        let excess_amount = max(used - total_available, Decimal::ZERO);
        let percentage_used = if total_available > Decimal::ZERO {
            round_half_up(used / total_available * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED)
        } else if used > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Self {
            standard_cap,
            total_available,
            used,
            remaining: max(total_available - used, Decimal::ZERO),
            percentage_used,
            exceeded: excess_amount > Decimal::ZERO,
            excess_amount,
            excess_tax_estimate: round_half_up(excess_amount * estimate_rate),
        }
    }
}

/// Cap position for both contribution types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapTrackingResult {
    pub financial_year: FinancialYear,
    pub concessional: CapStatus,
    pub non_concessional: CapStatus,
    pub carry_forward: CarryForwardResult,
    /// Carry-forward drawn on to cover concessional contributions above the
    /// standard cap. Empty when within the standard cap.
    pub carry_forward_usage: Vec<CarryForwardUsage>,
    pub bring_forward: BringForwardResult,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub steps: Vec<CalculationStep>,
}

/// Tracks year-to-date contributions against both caps.
pub fn track_contribution_caps(
    input: &CapTrackingInput,
    config: &TaxYearConfig,
) -> CapTrackingResult {
    let s = &config.superannuation;
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    let carry_forward = calculate_carry_forward(
        input.total_super_balance,
        &input.carry_forward_records,
        config,
    );
    let concessional = CapStatus::new(
        s.concessional_cap,
        s.concessional_cap + carry_forward.available,
        input.concessional_ytd,
        s.excess_concessional_estimate_rate,
    );
    let carry_forward_usage = if concessional.used > s.concessional_cap {
        consume_carry_forward(&carry_forward.records, concessional.used - s.concessional_cap)
    } else {
        Vec::new()
    };

    let bring_forward = calculate_bring_forward(input.total_super_balance, config);
    let non_concessional = CapStatus::new(
        s.non_concessional_cap,
        bring_forward.available_cap,
        input.non_concessional_ytd,
        s.excess_non_concessional_estimate_rate,
    );

    let mut steps = vec![CalculationStep::new("Concessional cap", s.concessional_cap)];
    steps.extend(carry_forward.steps.iter().cloned());
    steps.push(
        CalculationStep::new("Concessional contributions", concessional.used)
            .with_explanation(format!("{}% of available cap used", concessional.percentage_used)),
    );
    steps.extend(bring_forward.steps.iter().cloned());
    steps.push(
        CalculationStep::new("Non-concessional contributions", non_concessional.used)
            .with_explanation(format!(
                "{}% of available cap used",
                non_concessional.percentage_used
            )),
    );

    if concessional.exceeded {
        warn!(
            used = %concessional.used,
            available = %concessional.total_available,
            "concessional cap exceeded"
        );
        warnings.push(format!(
            "Concessional contributions exceed the available cap by {}",
            format_currency(concessional.excess_amount)
        ));
        steps.push(
            CalculationStep::new("Excess concessional tax", concessional.excess_tax_estimate)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "{} × {} ({EXCESS_ESTIMATE_NOTE})",
                    format_currency(concessional.excess_amount),
                    format_percentage(s.excess_concessional_estimate_rate)
                )),
        );
    } else if concessional.percentage_used >= NEAR_CAP_PERCENTAGE {
        warnings.push(format!(
            "Concessional contributions are at {}% of the available cap",
            concessional.percentage_used
        ));
    } else if concessional.remaining > Decimal::ZERO {
        recommendations.push(format!(
            "Up to {} more can be contributed as concessional contributions this year",
            format_currency(concessional.remaining)
        ));
    }

    if !carry_forward.eligible && !input.carry_forward_records.is_empty() {
        warnings.push(format!(
            "Carry-forward is unavailable with a total super balance of {} or more",
            format_currency(s.carry_forward.total_super_balance_threshold)
        ));
    }

    if bring_forward.nil_cap {
        warn!(balance = %input.total_super_balance, "non-concessional cap is nil");
        warnings.push(format!(
            "Total super balance is at or above the {} transfer balance cap; non-concessional \
             contributions may be treated as excess",
            format_currency(s.general_transfer_balance_cap)
        ));
    }
    if non_concessional.exceeded {
        warn!(
            used = %non_concessional.used,
            available = %non_concessional.total_available,
            "non-concessional cap exceeded"
        );
        warnings.push(format!(
            "Non-concessional contributions exceed the available cap by {}",
            format_currency(non_concessional.excess_amount)
        ));
        steps.push(
            CalculationStep::new("Excess non-concessional tax", non_concessional.excess_tax_estimate)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "{} × {} ({EXCESS_ESTIMATE_NOTE})",
                    format_currency(non_concessional.excess_amount),
                    format_percentage(s.excess_non_concessional_estimate_rate)
                )),
        );
        recommendations.push(
            "Consider asking the fund to release the excess non-concessional contributions"
                .to_string(),
        );
    } else if bring_forward.eligible && non_concessional.used > s.non_concessional_cap {
        recommendations.push(format!(
            "Contributions above {} trigger a {}-year bring-forward period",
            format_currency(s.non_concessional_cap),
            bring_forward.years
        ));
    }

    debug!(
        concessional = %concessional.used,
        non_concessional = %non_concessional.used,
        warnings = warnings.len(),
        "contribution caps tracked"
    );

    CapTrackingResult {
        financial_year: config.financial_year,
        concessional,
        non_concessional,
        carry_forward,
        carry_forward_usage,
        bring_forward,
        warnings,
        recommendations,
        steps,
    }
}
