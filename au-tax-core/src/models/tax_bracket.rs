use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row of a banded table: brackets, surcharge tiers or PAYG bands.
///
/// Tables are validated through this trait so every kind of band obeys the
/// same ordering rules (see [`crate::models::validate_bands`]).
pub trait Band {
    fn lower(&self) -> Decimal;
    fn upper(&self) -> Option<Decimal>;
}

/// Progressive income tax bracket.
///
/// Bounds are whole dollars and inclusive: a bracket with `min_income`
/// 45,001 taxes the 45,001st dollar at `tax_rate`. `base_tax` is the tax
/// payable on income up to the previous bracket's maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub min_income: Decimal,
    #[serde(default)]
    pub max_income: Option<Decimal>,
    pub base_tax: Decimal,
    pub tax_rate: Decimal,
}

impl TaxBracket {
    /// True when `income` does not exceed this bracket's maximum.
    pub fn covers(
        &self,
        income: Decimal,
    ) -> bool {
        self.max_income.is_none_or(|max| income <= max)
    }

    /// Income taxed at this bracket's rate.
    ///
    /// `min_income` is the first dollar taxed at the rate, hence the `+ 1`
    /// for brackets that do not start at zero.
    pub fn taxed_portion(
        &self,
        income: Decimal,
    ) -> Decimal {
        let portion = if self.min_income.is_zero() {
            income
        } else {
            income - self.min_income + Decimal::ONE
        };
        portion.max(Decimal::ZERO)
    }

    /// Tax on the whole bracket, used to check the next bracket's base.
    pub fn tax_at_max(&self) -> Option<Decimal> {
        self.max_income
            .map(|max| self.base_tax + self.taxed_portion(max) * self.tax_rate)
    }
}

impl Band for TaxBracket {
    fn lower(&self) -> Decimal {
        self.min_income
    }

    fn upper(&self) -> Option<Decimal> {
        self.max_income
    }
}

/// Medicare levy surcharge tier. Inclusive whole-dollar bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurchargeTier {
    pub min_income: Decimal,
    #[serde(default)]
    pub max_income: Option<Decimal>,
    pub rate: Decimal,
}

impl Band for SurchargeTier {
    fn lower(&self) -> Decimal {
        self.min_income
    }

    fn upper(&self) -> Option<Decimal> {
        self.max_income
    }
}

/// PAYG weekly earnings band with formula coefficients.
///
/// Applies to weekly earnings from `min_weekly` up to but excluding
/// `max_weekly`. Withholding is `a × earnings − b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaygBand {
    pub min_weekly: Decimal,
    #[serde(default)]
    pub max_weekly: Option<Decimal>,
    pub a: Decimal,
    pub b: Decimal,
}

impl PaygBand {
    pub fn covers(
        &self,
        weekly_earnings: Decimal,
    ) -> bool {
        self.max_weekly.is_none_or(|max| weekly_earnings < max)
    }
}

impl Band for PaygBand {
    fn lower(&self) -> Decimal {
        self.min_weekly
    }

    fn upper(&self) -> Option<Decimal> {
        self.max_weekly
    }
}
