//! Tax offsets and the order they are applied in.
//!
//! Non-refundable offsets (LITO, SAPTO, foreign tax, other) can only reduce
//! tax to zero; each is limited by the tax still remaining after the ones
//! before it. Franking credits are refundable and may take net tax below
//! zero, the shortfall being refunded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::common::{format_currency, format_percentage, round_half_up};
use crate::calculations::income_tax::tax_on_additional_income;
use crate::models::{CalculationStep, Operation, SaptoRates, TaxYearConfig};

/// Eligibility category for SAPTO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaptoStatus {
    Single,
    /// Member of a couple, amounts are per person.
    Couple,
    /// Member of a couple living apart due to illness, per person.
    IllnessSeparated,
}

/// An offset amount with its working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetAmount {
    pub amount: Decimal,
    pub steps: Vec<CalculationStep>,
}

/// Low Income Tax Offset.
///
/// Full offset at or below the full threshold, withdrawn linearly to nil at
/// the cutoff.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{TaxYearRegistry, calculate_lito};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// // 700 − (40,000 − 37,500) × 5%
/// assert_eq!(calculate_lito(dec!(40000), config).amount, dec!(575));
/// ```
pub fn calculate_lito(
    taxable_income: Decimal,
    config: &TaxYearConfig,
) -> OffsetAmount {
    let lito = &config.lito;

    let (amount, explanation) = if taxable_income <= lito.full_threshold {
        (
            lito.max_offset,
            format!(
                "Full offset at or below {}",
                format_currency(lito.full_threshold)
            ),
        )
    } else if taxable_income >= lito.cutoff_threshold {
        (
            Decimal::ZERO,
            format!("No offset at or above {}", format_currency(lito.cutoff_threshold)),
        )
    } else {
        let reduction = (taxable_income - lito.full_threshold) * lito.withdrawal_rate;
        (
            (lito.max_offset - reduction).max(Decimal::ZERO),
            format!(
                "{} − ({} − {}) × {}",
                format_currency(lito.max_offset),
                format_currency(taxable_income),
                format_currency(lito.full_threshold),
                format_percentage(lito.withdrawal_rate)
            ),
        )
    };

    let amount = round_half_up(amount);
    OffsetAmount {
        amount,
        steps: vec![CalculationStep::new("Low income tax offset", amount).with_explanation(explanation)],
    }
}

/// Seniors and Pensioners Tax Offset.
///
/// Whether the person qualifies (age, pension eligibility) is for the
/// caller to decide; this only works out the amount.
pub fn calculate_sapto(
    rebate_income: Decimal,
    status: SaptoStatus,
    config: &TaxYearConfig,
) -> OffsetAmount {
    let rates = sapto_rates(status, config);
    let withdrawal_rate = config.sapto.withdrawal_rate;

    let amount = if rebate_income <= rates.shade_out_threshold {
        rates.max_offset
    } else if rebate_income >= rates.cutoff_threshold {
        Decimal::ZERO
    } else {
        (rates.max_offset - (rebate_income - rates.shade_out_threshold) * withdrawal_rate)
            .max(Decimal::ZERO)
    };

    let amount = round_half_up(amount);
    OffsetAmount {
        amount,
        steps: vec![
            CalculationStep::new("Seniors and pensioners tax offset", amount).with_explanation(
                format!(
                    "Maximum {} withdrawn at {} above {}; eligibility assumed, not checked",
                    format_currency(rates.max_offset),
                    format_percentage(withdrawal_rate),
                    format_currency(rates.shade_out_threshold)
                ),
            ),
        ],
    }
}

fn sapto_rates(
    status: SaptoStatus,
    config: &TaxYearConfig,
) -> &SaptoRates {
    match status {
        SaptoStatus::Single => &config.sapto.single,
        SaptoStatus::Couple => &config.sapto.couple_each,
        SaptoStatus::IllnessSeparated => &config.sapto.illness_separated_each,
    }
}

/// A franked dividend grossed up for its franking credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossedUpDividend {
    pub dividend: Decimal,
    pub franking_credit: Decimal,
    pub grossed_up: Decimal,
}

/// Works out the franking credit attached to a cash dividend.
///
/// `franked_percentage` is a fraction (1 for fully franked) and
/// `company_tax_rate` is the paying company's rate.
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::gross_up_franked_dividend;
///
/// let d = gross_up_franked_dividend(dec!(700), dec!(1), dec!(0.30));
///
/// assert_eq!(d.franking_credit, dec!(300));
/// assert_eq!(d.grossed_up, dec!(1000));
/// ```
pub fn gross_up_franked_dividend(
    dividend: Decimal,
    franked_percentage: Decimal,
    company_tax_rate: Decimal,
) -> GrossedUpDividend {
    let dividend = dividend.max(Decimal::ZERO);
    let franked_percentage = franked_percentage.clamp(Decimal::ZERO, Decimal::ONE);

    let franking_credit = if company_tax_rate <= Decimal::ZERO || company_tax_rate >= Decimal::ONE {
        Decimal::ZERO
    } else {
        round_half_up(
            dividend * franked_percentage * company_tax_rate / (Decimal::ONE - company_tax_rate),
        )
    };

    GrossedUpDividend {
        dividend,
        franking_credit,
        grossed_up: dividend + franking_credit,
    }
}

/// Franking credit offset. Equal to the credits received.
pub fn calculate_franking_credit_offset(franking_credits: Decimal) -> OffsetAmount {
    let amount = round_half_up(franking_credits.max(Decimal::ZERO));
    OffsetAmount {
        amount,
        steps: vec![
            CalculationStep::new("Franking credit offset", amount)
                .with_explanation("Refundable; equal to franking credits received"),
        ],
    }
}

/// Foreign income tax offset.
///
/// Foreign tax up to the de minimis amount is claimable outright. Above it
/// the claim is limited to the greater of the de minimis amount and the
/// Australian tax on the foreign income.
pub fn calculate_foreign_tax_offset(
    foreign_tax_paid: Decimal,
    foreign_income: Decimal,
    taxable_income: Decimal,
    config: &TaxYearConfig,
) -> OffsetAmount {
    let paid = foreign_tax_paid.max(Decimal::ZERO);
    let de_minimis = config.foreign_tax.de_minimis;

    if paid <= de_minimis {
        let amount = round_half_up(paid);
        return OffsetAmount {
            amount,
            steps: vec![
                CalculationStep::new("Foreign income tax offset", amount).with_explanation(
                    format!(
                        "Foreign tax paid at or below {} is claimed in full",
                        format_currency(de_minimis)
                    ),
                ),
            ],
        };
    }

    let foreign_income = foreign_income.clamp(Decimal::ZERO, taxable_income.max(Decimal::ZERO));
    let domestic_income = taxable_income - foreign_income;
    let australian_tax = tax_on_additional_income(domestic_income, foreign_income, config);
    let limit = australian_tax.max(de_minimis);
    let amount = round_half_up(paid.min(limit));

    OffsetAmount {
        amount,
        steps: vec![
            CalculationStep::new("Foreign tax paid", paid),
            CalculationStep::new("Australian tax on foreign income", australian_tax)
                .with_explanation(format!(
                    "Tax on {} less tax on {}",
                    format_currency(taxable_income),
                    format_currency(domestic_income)
                )),
            CalculationStep::new("Offset limit", limit)
                .with_operation(Operation::Max)
                .with_explanation(format!(
                    "Greater of {} and Australian tax on foreign income",
                    format_currency(de_minimis)
                )),
            CalculationStep::new("Foreign income tax offset", amount).with_operation(Operation::Min),
        ],
    }
}

/// What the offsets are calculated from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetInput {
    pub taxable_income: Decimal,
    #[serde(default)]
    pub sapto_status: Option<SaptoStatus>,
    #[serde(default)]
    pub franking_credits: Decimal,
    #[serde(default)]
    pub foreign_tax_paid: Decimal,
    #[serde(default)]
    pub foreign_income: Decimal,
    /// Any other non-refundable offsets, already worked out.
    #[serde(default)]
    pub other_offsets: Decimal,
}

/// Offset entitlements before application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxOffsets {
    pub lito: Decimal,
    pub sapto: Decimal,
    pub franking_credits: Decimal,
    pub foreign_tax: Decimal,
    pub other: Decimal,
    pub total: Decimal,
    pub steps: Vec<CalculationStep>,
}

impl TaxOffsets {
    pub fn amount(
        &self,
        kind: OffsetKind,
    ) -> Decimal {
        match kind {
            OffsetKind::Lito => self.lito,
            OffsetKind::Sapto => self.sapto,
            OffsetKind::ForeignTax => self.foreign_tax,
            OffsetKind::Other => self.other,
            OffsetKind::FrankingCredits => self.franking_credits,
        }
    }
}

/// Works out every offset entitlement.
pub fn calculate_all_offsets(
    input: &OffsetInput,
    config: &TaxYearConfig,
) -> TaxOffsets {
    let lito = calculate_lito(input.taxable_income, config);
    let sapto = input
        .sapto_status
        .map(|status| calculate_sapto(input.taxable_income, status, config));
    let franking = calculate_franking_credit_offset(input.franking_credits);
    let foreign = calculate_foreign_tax_offset(
        input.foreign_tax_paid,
        input.foreign_income,
        input.taxable_income,
        config,
    );
    let other = round_half_up(input.other_offsets.max(Decimal::ZERO));

    let mut steps = lito.steps;
    let sapto_amount = match sapto {
        Some(s) => {
            steps.extend(s.steps);
            s.amount
        }
        None => Decimal::ZERO,
    };
    if franking.amount > Decimal::ZERO {
        steps.extend(franking.steps);
    }
    if foreign.amount > Decimal::ZERO {
        steps.extend(foreign.steps);
    }
    if other > Decimal::ZERO {
        steps.push(CalculationStep::new("Other offsets", other));
    }

    let total = lito.amount + sapto_amount + franking.amount + foreign.amount + other;
    steps.push(CalculationStep::new("Total offsets", total).with_operation(Operation::Equals));

    TaxOffsets {
        lito: lito.amount,
        sapto: sapto_amount,
        franking_credits: franking.amount,
        foreign_tax: foreign.amount,
        other,
        total,
        steps,
    }
}

/// Named offset buckets, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OffsetKind {
    Lito,
    Sapto,
    ForeignTax,
    Other,
    FrankingCredits,
}

impl OffsetKind {
    /// Non-refundable offsets first, refundable last.
    pub const APPLICATION_ORDER: [OffsetKind; 5] = [
        Self::Lito,
        Self::Sapto,
        Self::ForeignTax,
        Self::Other,
        Self::FrankingCredits,
    ];

    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::FrankingCredits)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Lito => "Low income tax offset",
            Self::Sapto => "Seniors and pensioners tax offset",
            Self::ForeignTax => "Foreign income tax offset",
            Self::Other => "Other offsets",
            Self::FrankingCredits => "Franking credits",
        }
    }
}

/// How much of one offset was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOffset {
    pub kind: OffsetKind,
    pub entitled: Decimal,
    pub used: Decimal,
    /// Non-refundable amount lost because tax had already reached zero.
    pub unused: Decimal,
}

/// Gross tax reduced by offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetApplication {
    pub gross_tax: Decimal,
    /// Negative when refundable offsets exceed the tax.
    pub net_tax: Decimal,
    pub refundable_amount: Decimal,
    pub used_offsets: Vec<AppliedOffset>,
    pub steps: Vec<CalculationStep>,
}

/// Applies offsets to `gross_tax` in [`OffsetKind::APPLICATION_ORDER`].
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{TaxOffsets, apply_offsets};
///
/// let offsets = TaxOffsets {
///     lito: dec!(700),
///     franking_credits: dec!(300),
///     total: dec!(1000),
///     ..TaxOffsets::default()
/// };
///
/// let applied = apply_offsets(dec!(500), &offsets);
///
/// // LITO wipes out the tax, franking is refunded in full
/// assert_eq!(applied.net_tax, dec!(-300));
/// assert_eq!(applied.refundable_amount, dec!(300));
/// ```
pub fn apply_offsets(
    gross_tax: Decimal,
    offsets: &TaxOffsets,
) -> OffsetApplication {
    let gross_tax = gross_tax.max(Decimal::ZERO);
    let mut steps = vec![CalculationStep::new("Gross tax", gross_tax)];

    let (remaining, used_offsets) = OffsetKind::APPLICATION_ORDER.iter().fold(
        (gross_tax, Vec::new()),
        |(remaining, mut used_offsets), &kind| {
            let entitled = offsets.amount(kind).max(Decimal::ZERO);
            if entitled.is_zero() {
                return (remaining, used_offsets);
            }

            let used = if kind.is_refundable() {
                entitled
            } else {
                entitled.min(remaining.max(Decimal::ZERO))
            };
            let unused = entitled - used;
            steps.push(
                CalculationStep::new(kind.label(), used)
                    .with_operation(Operation::Subtract)
                    .with_explanation(if unused > Decimal::ZERO {
                        format!(
                            "{} of {} used; remainder is non-refundable",
                            format_currency(used),
                            format_currency(entitled)
                        )
                    } else {
                        format!("{} used in full", format_currency(entitled))
                    }),
            );
            used_offsets.push(AppliedOffset {
                kind,
                entitled,
                used,
                unused,
            });
            (remaining - used, used_offsets)
        },
    );

    let net_tax = round_half_up(remaining);
    let refundable_amount = if net_tax < Decimal::ZERO {
        -net_tax
    } else {
        Decimal::ZERO
    };
    steps.push(CalculationStep::new("Net tax", net_tax).with_operation(Operation::Equals));

    debug!(gross = %gross_tax, net = %net_tax, refund = %refundable_amount, "offsets applied");

    OffsetApplication {
        gross_tax,
        net_tax,
        refundable_amount,
        used_offsets,
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

    // =========================================================================
    // calculate_lito tests
    // =========================================================================

    #[test]
    fn lito_full_at_threshold() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        assert_eq!(calculate_lito(dec!(37500), config).amount, dec!(700));
        assert_eq!(calculate_lito(dec!(10000), config).amount, dec!(700));
    }

    #[test]
    fn lito_nil_at_cutoff() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        assert_eq!(calculate_lito(dec!(51500), config).amount, dec!(0));
        assert_eq!(calculate_lito(dec!(90000), config).amount, dec!(0));
    }

    #[test]
    fn lito_withdrawn_linearly() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        // 700 − 7,000 × 5%
        assert_eq!(calculate_lito(dec!(44500), config).amount, dec!(350));
    }

    #[test]
    fn lito_never_increases_with_income() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let mut previous = calculate_lito(dec!(0), config).amount;
        let mut income = dec!(0);
        while income <= dec!(60000) {
            let current = calculate_lito(income, config).amount;
            assert!(current <= previous, "LITO rose at {income}");
            previous = current;
            income += dec!(250);
        }
    }

    // =========================================================================
    // calculate_sapto tests
    // =========================================================================

    #[test]
    fn sapto_single_full_below_shade_out() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_sapto(dec!(30000), SaptoStatus::Single, config);

        assert_eq!(result.amount, dec!(2230));
    }

    #[test]
    fn sapto_single_withdrawn_at_twelve_and_a_half_cents() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        // 2230 − (40279 − 32279) × 0.125
        let result = calculate_sapto(dec!(40279), SaptoStatus::Single, config);

        assert_eq!(result.amount, dec!(1230));
    }

    #[test]
    fn sapto_couple_uses_per_person_amounts() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        assert_eq!(
            calculate_sapto(dec!(20000), SaptoStatus::Couple, config).amount,
            dec!(1602)
        );
        assert_eq!(
            calculate_sapto(dec!(41790), SaptoStatus::Couple, config).amount,
            dec!(0)
        );
    }

    #[test]
    fn sapto_step_flags_eligibility_assumption() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_sapto(dec!(20000), SaptoStatus::IllnessSeparated, config);

        assert_eq!(result.amount, dec!(2040));
        assert!(
            result.steps[0]
                .explanation
                .as_deref()
                .unwrap()
                .contains("eligibility assumed")
        );
    }

    // =========================================================================
    // franking tests
    // =========================================================================

    #[test]
    fn partially_franked_dividend() {
        let result = gross_up_franked_dividend(dec!(1000), dec!(0.5), dec!(0.25));

        // 1000 × 0.5 × 0.25 / 0.75
        assert_eq!(result.franking_credit, dec!(166.67));
        assert_eq!(result.grossed_up, dec!(1166.67));
    }

    #[test]
    fn unfranked_dividend_has_no_credit() {
        let result = gross_up_franked_dividend(dec!(1000), dec!(0), dec!(0.30));

        assert_eq!(result.franking_credit, dec!(0));
    }

    #[test]
    fn franking_offset_ignores_negative_credits() {
        assert_eq!(calculate_franking_credit_offset(dec!(-50)).amount, dec!(0));
        assert_eq!(calculate_franking_credit_offset(dec!(300)).amount, dec!(300));
    }

    // =========================================================================
    // calculate_foreign_tax_offset tests
    // =========================================================================

    #[test]
    fn foreign_tax_below_de_minimis_claimed_in_full() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        let result = calculate_foreign_tax_offset(dec!(800), dec!(5000), dec!(90000), config);

        assert_eq!(result.amount, dec!(800));
    }

    #[test]
    fn foreign_tax_limited_to_australian_tax_on_foreign_income() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        // 10,000 of foreign income taxed at 30% in Australia
        let result = calculate_foreign_tax_offset(dec!(4500), dec!(10000), dec!(90000), config);

        assert_eq!(result.amount, dec!(3000));
    }

    #[test]
    fn foreign_tax_limit_never_below_de_minimis() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;

        // Income under the tax-free threshold, so no Australian tax
        let result = calculate_foreign_tax_offset(dec!(1500), dec!(5000), dec!(15000), config);

        assert_eq!(result.amount, dec!(1000));
    }

    // =========================================================================
    // apply_offsets tests
    // =========================================================================

    #[test]
    fn non_refundable_offsets_stop_at_zero() {
        let offsets = TaxOffsets {
            lito: dec!(700),
            sapto: dec!(2230),
            total: dec!(2930),
            ..TaxOffsets::default()
        };

        let result = apply_offsets(dec!(1500), &offsets);

        assert_eq!(result.net_tax, dec!(0));
        assert_eq!(result.refundable_amount, dec!(0));
        assert_eq!(
            result.used_offsets,
            vec![
                AppliedOffset {
                    kind: OffsetKind::Lito,
                    entitled: dec!(700),
                    used: dec!(700),
                    unused: dec!(0),
                },
                AppliedOffset {
                    kind: OffsetKind::Sapto,
                    entitled: dec!(2230),
                    used: dec!(800),
                    unused: dec!(1430),
                },
            ]
        );
    }

    #[test]
    fn franking_credits_applied_last_and_refunded() {
        let offsets = TaxOffsets {
            lito: dec!(500),
            franking_credits: dec!(1200),
            total: dec!(1700),
            ..TaxOffsets::default()
        };

        let result = apply_offsets(dec!(1000), &offsets);

        assert_eq!(result.net_tax, dec!(-700));
        assert_eq!(result.refundable_amount, dec!(700));
        assert_eq!(result.used_offsets.last().unwrap().kind, OffsetKind::FrankingCredits);
    }

    #[test]
    fn offsets_smaller_than_tax() {
        let offsets = TaxOffsets {
            lito: dec!(350),
            foreign_tax: dec!(200),
            total: dec!(550),
            ..TaxOffsets::default()
        };

        let result = apply_offsets(dec!(10000), &offsets);

        assert_eq!(result.net_tax, dec!(9450));
        assert!(result.used_offsets.iter().all(|o| o.unused.is_zero()));
    }

    #[test]
    fn calculate_all_offsets_totals_entitlements() {
        let registry = registry();
        let config = registry.get_config("2024-25").config;
        let input = OffsetInput {
            taxable_income: dec!(44500),
            franking_credits: dec!(300),
            other_offsets: dec!(50),
            ..OffsetInput::default()
        };

        let offsets = calculate_all_offsets(&input, config);

        assert_eq!(offsets.lito, dec!(350));
        assert_eq!(offsets.sapto, dec!(0));
        assert_eq!(offsets.total, dec!(700));
    }
}
