//! Per-financial-year tax and superannuation parameters.
//!
//! A [`TaxYearConfig`] is plain data: brackets, thresholds, rates and caps
//! for one financial year. The built-in years live as TOML tables under
//! the crate's `data/` directory; a new year is a new table, never a code
//! change.
//!
//! Every table is checked by [`TaxYearConfig::validate`] before it is
//! registered. Banded tables (brackets, surcharge tiers, PAYG bands) must be
//! ascending, gap-free and end in a single unbounded band.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::round_half_up;
use crate::models::{Band, FinancialYear, PaygBand, SurchargeTier, TaxBracket};

/// Errors raised when a tax year table fails validation or parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML source could not be parsed into a table.
    #[error("invalid tax year table: {0}")]
    Parse(String),

    /// A banded table has no rows.
    #[error("{0} table is empty")]
    EmptyTable(&'static str),

    /// A band does not start where the previous band ended.
    #[error("{table} band {index} starts at {found}, expected {expected}")]
    BandGap {
        table: &'static str,
        index: usize,
        expected: Decimal,
        found: Decimal,
    },

    /// A band ends below where it starts.
    #[error("{table} band {index} has an upper bound below its lower bound")]
    InvertedBand { table: &'static str, index: usize },

    /// The last band is bounded, or an earlier band is unbounded.
    #[error("{table} table must end with exactly one unbounded band")]
    UnboundedBand { table: &'static str },

    /// A bracket's base tax disagrees with the tax accumulated below it.
    #[error("bracket {index} base tax is {found}, expected {expected}")]
    BracketBaseMismatch {
        index: usize,
        expected: Decimal,
        found: Decimal,
    },

    /// Surcharge rates must not fall as income rises.
    #[error("{table} tier {index} has a lower rate than the tier below it")]
    DecreasingSurchargeRate { table: &'static str, index: usize },

    /// A rate or proportion is outside `[0, 1]`.
    #[error("{field} must be between 0 and 1, got {value}")]
    InvalidRate { field: &'static str, value: Decimal },

    /// A threshold or cap is negative.
    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    /// A lower/upper threshold pair is inverted.
    #[error("{field} lower threshold {lower} is above upper threshold {upper}")]
    InvertedThresholds {
        field: &'static str,
        lower: Decimal,
        upper: Decimal,
    },

    /// The shade-out multiplier must exceed one.
    #[error("medicare shade-out multiplier must exceed 1, got {0}")]
    InvalidShadeOutMultiplier(Decimal),

    /// An offset's cutoff is not `threshold + max_offset / withdrawal_rate`.
    #[error("{offset} cutoff is {found}, expected {expected}")]
    CutoffMismatch {
        offset: &'static str,
        expected: Decimal,
        found: Decimal,
    },

    /// The bring-forward table is not three descending bands ending unbounded.
    #[error("bring-forward table is invalid: {0}")]
    BringForwardTable(String),

    /// A registry needs at least one year.
    #[error("no tax year tables were supplied")]
    NoTables,
}

/// Medicare levy thresholds, shade-in parameters and surcharge tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicareConfig {
    /// Flat levy rate once income reaches the shade-out bound (2%).
    pub levy_rate: Decimal,

    /// Marginal rate inside the shade-in zone (10%).
    pub shade_in_rate: Decimal,

    pub single_threshold: Decimal,
    pub family_threshold: Decimal,

    /// Added to the family threshold for each dependent child.
    pub dependent_child_increase: Decimal,

    /// Shade-out bound is `threshold × shade_out_multiplier`.
    pub shade_out_multiplier: Decimal,

    pub surcharge_single: Vec<SurchargeTier>,
    pub surcharge_family: Vec<SurchargeTier>,

    /// Family surcharge thresholds rise by this for each child after the first.
    pub surcharge_family_child_increment: Decimal,
}

/// Low Income Tax Offset parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LitoConfig {
    pub max_offset: Decimal,
    pub full_threshold: Decimal,
    pub withdrawal_rate: Decimal,
    pub cutoff_threshold: Decimal,
}

/// SAPTO amounts for one eligibility status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaptoRates {
    pub max_offset: Decimal,
    pub shade_out_threshold: Decimal,
    pub cutoff_threshold: Decimal,
}

/// Seniors and Pensioners Tax Offset parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaptoConfig {
    pub withdrawal_rate: Decimal,
    pub single: SaptoRates,
    pub couple_each: SaptoRates,
    pub illness_separated_each: SaptoRates,
}

/// Foreign income tax offset parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignTaxConfig {
    /// Foreign tax paid up to this amount is claimable without working
    /// out the offset limit.
    pub de_minimis: Decimal,
}

/// PAYG withholding coefficient scales (weekly formula method).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaygConfig {
    /// Scale 2: tax-free threshold claimed.
    pub with_tax_free_threshold: Vec<PaygBand>,

    /// Scale 1: tax-free threshold not claimed.
    pub no_tax_free_threshold: Vec<PaygBand>,
}

/// Concessional cap carry-forward rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryForwardConfig {
    /// Carry-forward is available only below this total super balance.
    pub total_super_balance_threshold: Decimal,

    /// How many prior years of unused cap may be carried forward.
    pub max_years: u32,

    /// First financial year whose unused cap can be carried forward.
    pub first_year: FinancialYear,
}

/// One band of the non-concessional bring-forward table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BringForwardBand {
    /// Upper bound (exclusive) on total super balance; `None` for the top band.
    #[serde(default)]
    pub total_super_balance_below: Option<Decimal>,

    /// Years of non-concessional cap available in this band.
    pub years: u32,
}

/// Government co-contribution parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoContributionConfig {
    pub max_entitlement: Decimal,
    pub match_rate: Decimal,
    pub lower_income_threshold: Decimal,
    pub upper_income_threshold: Decimal,
}

/// Spouse contribution tax offset parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpouseOffsetConfig {
    pub rate: Decimal,
    pub max_contribution: Decimal,
    pub lower_income_threshold: Decimal,
    pub upper_income_threshold: Decimal,
}

/// Superannuation rates, caps and thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperConfig {
    pub guarantee_rate: Decimal,

    /// Maximum super contribution base per quarter.
    pub max_contribution_base_quarterly: Decimal,

    pub concessional_cap: Decimal,
    pub non_concessional_cap: Decimal,

    /// Fund-level tax on concessional contributions (15%).
    pub contributions_tax_rate: Decimal,

    pub division_293_threshold: Decimal,
    pub division_293_rate: Decimal,

    /// At or above this total super balance the non-concessional cap is nil.
    pub general_transfer_balance_cap: Decimal,

    /// Approximate extra tax on excess concessional contributions.
    pub excess_concessional_estimate_rate: Decimal,

    /// Approximate tax on excess non-concessional contributions.
    pub excess_non_concessional_estimate_rate: Decimal,

    pub carry_forward: CarryForwardConfig,
    pub bring_forward: Vec<BringForwardBand>,
    pub co_contribution: CoContributionConfig,
    pub spouse_offset: SpouseOffsetConfig,
}

/// Capital gains tax rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgtConfig {
    pub discount_rate: Decimal,

    /// Assets must be held for more than this many months for the discount.
    pub min_holding_months: u32,
}

/// Every parameter the engine needs for one financial year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxYearConfig {
    pub financial_year: FinancialYear,
    pub brackets: Vec<TaxBracket>,
    pub medicare: MedicareConfig,
    pub lito: LitoConfig,
    pub sapto: SaptoConfig,
    pub foreign_tax: ForeignTaxConfig,
    pub payg: PaygConfig,
    pub superannuation: SuperConfig,
    pub cgt: CgtConfig,
}

/// Where an income falls in the bracket table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketInfo {
    pub index: usize,
    pub bracket: TaxBracket,
    pub income_within_bracket: Decimal,
}

impl TaxYearConfig {
    /// Parses and validates a TOML year table.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: TaxYearConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// First bracket whose maximum is at or above `taxable_income`.
    ///
    /// Returns the index and bracket. Incomes at or below zero resolve to
    /// the first bracket.
    pub fn bracket_for(
        &self,
        taxable_income: Decimal,
    ) -> Option<(usize, &TaxBracket)> {
        self.brackets
            .iter()
            .enumerate()
            .find(|(_, b)| b.covers(taxable_income))
    }

    /// Marginal rate (as a fraction) applying to the next dollar earned.
    pub fn marginal_rate(
        &self,
        taxable_income: Decimal,
    ) -> Decimal {
        self.bracket_for(taxable_income)
            .map(|(_, b)| b.tax_rate)
            .unwrap_or(Decimal::ZERO)
    }

    /// Bracket index, the bracket, and the income taxed at its rate.
    pub fn bracket_info(
        &self,
        taxable_income: Decimal,
    ) -> Option<BracketInfo> {
        self.bracket_for(taxable_income)
            .map(|(index, bracket)| BracketInfo {
                index,
                bracket: bracket.clone(),
                income_within_bracket: bracket.taxed_portion(taxable_income),
            })
    }

    /// Annual maximum super contribution base.
    pub fn max_contribution_base_annual(&self) -> Decimal {
        self.superannuation.max_contribution_base_quarterly * Decimal::from(4)
    }

    /// Validates every table and parameter.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_brackets()?;
        self.validate_medicare()?;
        self.validate_offsets()?;
        validate_bands("PAYG scale 2", &self.payg.with_tax_free_threshold, Decimal::ZERO)?;
        validate_bands("PAYG scale 1", &self.payg.no_tax_free_threshold, Decimal::ZERO)?;
        for band in self
            .payg
            .with_tax_free_threshold
            .iter()
            .chain(&self.payg.no_tax_free_threshold)
        {
            validate_rate("PAYG coefficient a", band.a)?;
        }
        self.validate_super()?;
        validate_rate("cgt.discount_rate", self.cgt.discount_rate)?;
        Ok(())
    }

    fn validate_brackets(&self) -> Result<(), ConfigError> {
        validate_bands("tax bracket", &self.brackets, Decimal::ONE)?;

        let mut expected_base = Decimal::ZERO;
        for (index, bracket) in self.brackets.iter().enumerate() {
            validate_rate("tax bracket rate", bracket.tax_rate)?;
            if round_half_up(bracket.base_tax) != round_half_up(expected_base) {
                return Err(ConfigError::BracketBaseMismatch {
                    index,
                    expected: round_half_up(expected_base),
                    found: bracket.base_tax,
                });
            }
            if let Some(tax) = bracket.tax_at_max() {
                expected_base = tax;
            }
        }
        Ok(())
    }

    fn validate_medicare(&self) -> Result<(), ConfigError> {
        let m = &self.medicare;
        validate_rate("medicare.levy_rate", m.levy_rate)?;
        validate_rate("medicare.shade_in_rate", m.shade_in_rate)?;
        validate_amount("medicare.single_threshold", m.single_threshold)?;
        validate_amount("medicare.family_threshold", m.family_threshold)?;
        validate_amount("medicare.dependent_child_increase", m.dependent_child_increase)?;
        validate_amount(
            "medicare.surcharge_family_child_increment",
            m.surcharge_family_child_increment,
        )?;
        if m.shade_out_multiplier <= Decimal::ONE {
            return Err(ConfigError::InvalidShadeOutMultiplier(
                m.shade_out_multiplier,
            ));
        }
        validate_surcharge_tiers("surcharge (single)", &m.surcharge_single)?;
        validate_surcharge_tiers("surcharge (family)", &m.surcharge_family)?;
        Ok(())
    }

    fn validate_offsets(&self) -> Result<(), ConfigError> {
        let lito = &self.lito;
        validate_rate("lito.withdrawal_rate", lito.withdrawal_rate)?;
        validate_cutoff(
            "LITO",
            lito.full_threshold,
            lito.max_offset,
            lito.withdrawal_rate,
            lito.cutoff_threshold,
        )?;

        let sapto = &self.sapto;
        validate_rate("sapto.withdrawal_rate", sapto.withdrawal_rate)?;
        for (name, rates) in [
            ("SAPTO (single)", &sapto.single),
            ("SAPTO (couple)", &sapto.couple_each),
            ("SAPTO (illness separated)", &sapto.illness_separated_each),
        ] {
            validate_cutoff(
                name,
                rates.shade_out_threshold,
                rates.max_offset,
                sapto.withdrawal_rate,
                rates.cutoff_threshold,
            )?;
        }

        validate_amount("foreign_tax.de_minimis", self.foreign_tax.de_minimis)?;
        Ok(())
    }

    fn validate_super(&self) -> Result<(), ConfigError> {
        let s = &self.superannuation;
        validate_rate("superannuation.guarantee_rate", s.guarantee_rate)?;
        validate_rate(
            "superannuation.contributions_tax_rate",
            s.contributions_tax_rate,
        )?;
        validate_rate("superannuation.division_293_rate", s.division_293_rate)?;
        validate_rate(
            "superannuation.excess_concessional_estimate_rate",
            s.excess_concessional_estimate_rate,
        )?;
        validate_rate(
            "superannuation.excess_non_concessional_estimate_rate",
            s.excess_non_concessional_estimate_rate,
        )?;
        validate_amount(
            "superannuation.max_contribution_base_quarterly",
            s.max_contribution_base_quarterly,
        )?;
        validate_amount("superannuation.concessional_cap", s.concessional_cap)?;
        validate_amount("superannuation.non_concessional_cap", s.non_concessional_cap)?;
        validate_amount(
            "superannuation.division_293_threshold",
            s.division_293_threshold,
        )?;

        let co = &s.co_contribution;
        validate_rate("co_contribution.match_rate", co.match_rate)?;
        validate_thresholds(
            "co_contribution",
            co.lower_income_threshold,
            co.upper_income_threshold,
        )?;

        let spouse = &s.spouse_offset;
        validate_rate("spouse_offset.rate", spouse.rate)?;
        validate_thresholds(
            "spouse_offset",
            spouse.lower_income_threshold,
            spouse.upper_income_threshold,
        )?;

        validate_bring_forward(&s.bring_forward, s.general_transfer_balance_cap)
    }
}

/// Checks a banded table is non-empty, ascending, gap-free and terminated
/// by a single unbounded band.
///
/// `boundary_step` is the distance between one band's upper bound and the
/// next band's lower bound: `1` for inclusive whole-dollar tables such as
/// tax brackets, `0` for half-open tables such as PAYG bands.
pub fn validate_bands<B: Band>(
    table: &'static str,
    bands: &[B],
    boundary_step: Decimal,
) -> Result<(), ConfigError> {
    let Some(last) = bands.last() else {
        return Err(ConfigError::EmptyTable(table));
    };
    if last.upper().is_some() {
        return Err(ConfigError::UnboundedBand { table });
    }

    let mut previous_upper: Option<Decimal> = None;
    for (index, band) in bands.iter().enumerate() {
        if let Some(upper) = previous_upper {
            let expected = upper + boundary_step;
            if band.lower() != expected {
                return Err(ConfigError::BandGap {
                    table,
                    index,
                    expected,
                    found: band.lower(),
                });
            }
        }

        match band.upper() {
            Some(upper) if upper < band.lower() => {
                return Err(ConfigError::InvertedBand { table, index });
            }
            Some(upper) => previous_upper = Some(upper),
            None if index + 1 != bands.len() => {
                return Err(ConfigError::UnboundedBand { table });
            }
            None => {}
        }
    }
    Ok(())
}

fn validate_surcharge_tiers(
    table: &'static str,
    tiers: &[SurchargeTier],
) -> Result<(), ConfigError> {
    validate_bands(table, tiers, Decimal::ONE)?;
    for tier in tiers {
        validate_rate("surcharge rate", tier.rate)?;
    }
    for (index, pair) in tiers.windows(2).enumerate() {
        if pair[1].rate < pair[0].rate {
            return Err(ConfigError::DecreasingSurchargeRate {
                table,
                index: index + 1,
            });
        }
    }
    Ok(())
}

fn validate_bring_forward(
    bands: &[BringForwardBand],
    transfer_balance_cap: Decimal,
) -> Result<(), ConfigError> {
    if bands.len() != 3 {
        return Err(ConfigError::BringForwardTable(format!(
            "expected 3 bands, found {}",
            bands.len()
        )));
    }
    let years: Vec<u32> = bands.iter().map(|b| b.years).collect();
    if years != [3, 2, 1] {
        return Err(ConfigError::BringForwardTable(format!(
            "bands must grant 3, 2 and 1 years, found {years:?}"
        )));
    }
    match (
        bands[0].total_super_balance_below,
        bands[1].total_super_balance_below,
        bands[2].total_super_balance_below,
    ) {
        (Some(low), Some(high), None) if low < high && high <= transfer_balance_cap => Ok(()),
        _ => Err(ConfigError::BringForwardTable(
            "thresholds must ascend, stay within the transfer balance cap and end unbounded"
                .to_string(),
        )),
    }
}

fn validate_cutoff(
    offset: &'static str,
    threshold: Decimal,
    max_offset: Decimal,
    withdrawal_rate: Decimal,
    cutoff: Decimal,
) -> Result<(), ConfigError> {
    validate_amount("offset threshold", threshold)?;
    validate_amount("maximum offset", max_offset)?;
    if withdrawal_rate.is_zero() {
        return Err(ConfigError::InvalidRate {
            field: "withdrawal rate",
            value: withdrawal_rate,
        });
    }
    let expected = round_half_up(threshold + max_offset / withdrawal_rate);
    if round_half_up(cutoff) != expected {
        return Err(ConfigError::CutoffMismatch {
            offset,
            expected,
            found: cutoff,
        });
    }
    Ok(())
}

fn validate_rate(
    field: &'static str,
    value: Decimal,
) -> Result<(), ConfigError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ConfigError::InvalidRate { field, value });
    }
    Ok(())
}

fn validate_amount(
    field: &'static str,
    value: Decimal,
) -> Result<(), ConfigError> {
    if value < Decimal::ZERO {
        return Err(ConfigError::NegativeAmount { field, value });
    }
    Ok(())
}

fn validate_thresholds(
    field: &'static str,
    lower: Decimal,
    upper: Decimal,
) -> Result<(), ConfigError> {
    validate_amount(field, lower)?;
    if lower > upper {
        return Err(ConfigError::InvertedThresholds {
            field,
            lower,
            upper,
        });
    }
    Ok(())
}
