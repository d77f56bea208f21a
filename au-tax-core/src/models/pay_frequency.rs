use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calculations::common::round_half_up;

/// Weeks in a year for PAYG purposes.
pub const WEEKS_PER_YEAR: Decimal = dec!(52);

/// How often an amount is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayFrequency {
    Weekly,
    Fortnightly,
    Monthly,
    Quarterly,
    Annually,
}

impl PayFrequency {
    pub const ALL: [PayFrequency; 5] = [
        Self::Weekly,
        Self::Fortnightly,
        Self::Monthly,
        Self::Quarterly,
        Self::Annually,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Fortnightly => "FORTNIGHTLY",
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Annually => "ANNUALLY",
        }
    }

    /// Case-insensitive parse of the upper-case names used on the wire.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WEEKLY" => Some(Self::Weekly),
            "FORTNIGHTLY" => Some(Self::Fortnightly),
            "MONTHLY" => Some(Self::Monthly),
            "QUARTERLY" => Some(Self::Quarterly),
            "ANNUALLY" | "ANNUAL" | "YEARLY" => Some(Self::Annually),
            _ => None,
        }
    }

    pub fn periods_per_year(&self) -> Decimal {
        match self {
            Self::Weekly => Decimal::from(52),
            Self::Fortnightly => Decimal::from(26),
            Self::Monthly => Decimal::from(12),
            Self::Quarterly => Decimal::from(4),
            Self::Annually => Decimal::ONE,
        }
    }

    /// Annualises a per-period amount. Exact, no rounding.
    pub fn to_annual(
        &self,
        amount: Decimal,
    ) -> Decimal {
        amount * self.periods_per_year()
    }

    /// Splits an annual amount into one period, rounded to cents.
    pub fn from_annual(
        &self,
        annual: Decimal,
    ) -> Decimal {
        round_half_up(annual / self.periods_per_year())
    }

    /// Converts a per-period amount to its weekly equivalent, rounded to cents.
    pub fn to_weekly(
        &self,
        amount: Decimal,
    ) -> Decimal {
        round_half_up(self.to_annual(amount) / WEEKS_PER_YEAR)
    }

    /// Projects a weekly amount onto this frequency, rounded to cents.
    pub fn from_weekly(
        &self,
        weekly: Decimal,
    ) -> Decimal {
        round_half_up(weekly * WEEKS_PER_YEAR / self.periods_per_year())
    }
}

impl std::fmt::Display for PayFrequency {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_accepts_any_case() {
        assert_eq!(PayFrequency::parse("monthly"), Some(PayFrequency::Monthly));
        assert_eq!(
            PayFrequency::parse("FORTNIGHTLY"),
            Some(PayFrequency::Fortnightly)
        );
        assert_eq!(PayFrequency::parse("daily"), None);
    }

    #[test]
    fn parse_round_trips_as_str() {
        for frequency in PayFrequency::ALL {
            assert_eq!(PayFrequency::parse(frequency.as_str()), Some(frequency));
        }
    }

    #[test]
    fn to_annual_multiplies_by_periods() {
        assert_eq!(PayFrequency::Monthly.to_annual(dec!(5000)), dec!(60000));
        assert_eq!(PayFrequency::Fortnightly.to_annual(dec!(2000)), dec!(52000));
    }

    #[test]
    fn from_annual_rounds_to_cents() {
        assert_eq!(PayFrequency::Weekly.from_annual(dec!(100000)), dec!(1923.08));
        assert_eq!(PayFrequency::Monthly.from_annual(dec!(100000)), dec!(8333.33));
    }

    #[test]
    fn monthly_to_weekly_uses_annual_base() {
        // 5000 × 12 / 52
        assert_eq!(PayFrequency::Monthly.to_weekly(dec!(5000)), dec!(1153.85));
    }

    #[test]
    fn from_weekly_projects_without_rounding_drift() {
        assert_eq!(PayFrequency::Fortnightly.from_weekly(dec!(439)), dec!(878));
        assert_eq!(PayFrequency::Monthly.from_weekly(dec!(439)), dec!(1902.33));
        assert_eq!(PayFrequency::Quarterly.from_weekly(dec!(439)), dec!(5707));
        assert_eq!(PayFrequency::Annually.from_weekly(dec!(439)), dec!(22828));
    }
}
