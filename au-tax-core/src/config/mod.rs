//! Registry of financial year tables.
//!
//! The built-in years are TOML files compiled into the crate. Further years
//! can be registered at runtime; each table is validated before it is
//! accepted, so a registered year is always safe to calculate with.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{ConfigError, FinancialYear, TaxYearConfig};

/// Built-in year tables, oldest first.
const BUILTIN_TABLES: [&str; 4] = [
    include_str!("../../data/2022-23.toml"),
    include_str!("../../data/2023-24.toml"),
    include_str!("../../data/2024-25.toml"),
    include_str!("../../data/2025-26.toml"),
];

/// The requested year is not registered; the latest year was used instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no tables for financial year '{requested}'; using {fallback}")]
pub struct ConfigNotFoundWarning {
    pub requested: String,
    pub fallback: FinancialYear,
}

/// A year table chosen by [`TaxYearRegistry::get_config`].
#[derive(Debug, Clone)]
pub struct ConfigSelection<'a> {
    pub config: &'a TaxYearConfig,
    /// Set when the requested year was missing and the latest year stood in.
    pub warning: Option<ConfigNotFoundWarning>,
}

/// Validated tax tables keyed by financial year.
///
/// Typical use:
/// 1. Build with [`TaxYearRegistry::builtin`].
/// 2. Optionally [`register`](TaxYearRegistry::register) extra years.
/// 3. Look years up with [`get_config`](TaxYearRegistry::get_config).
#[derive(Debug, Clone)]
pub struct TaxYearRegistry {
    configs: BTreeMap<FinancialYear, TaxYearConfig>,
    /// Copy of the newest table so fallback lookups cannot miss.
    latest: TaxYearConfig,
}

impl TaxYearRegistry {
    /// Registry holding the tables shipped with the crate.
    ///
    /// # Errors
    ///
    /// Fails only if an embedded table is malformed.
    pub fn builtin() -> Result<Self, ConfigError> {
        let configs = BUILTIN_TABLES
            .iter()
            .map(|source| TaxYearConfig::from_toml_str(source))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_configs(configs)
    }

    /// Registry over `configs`, each validated. Later entries replace
    /// earlier ones for the same year.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoTables`] when `configs` is empty, or the first
    /// validation failure.
    pub fn from_configs<I>(configs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = TaxYearConfig>,
    {
        let mut configs = configs.into_iter();
        let first = configs.next().ok_or(ConfigError::NoTables)?;
        first.validate()?;

        let mut registry = Self {
            configs: BTreeMap::from([(first.financial_year, first.clone())]),
            latest: first,
        };
        for config in configs {
            registry.register(config)?;
        }
        Ok(registry)
    }

    /// Validates and adds a year, replacing any table already held for it.
    pub fn register(
        &mut self,
        config: TaxYearConfig,
    ) -> Result<(), ConfigError> {
        config.validate()?;

        let year = config.financial_year;
        if year >= self.latest.financial_year {
            self.latest = config.clone();
        }
        if self.configs.insert(year, config).is_some() {
            debug!(financial_year = %year, "replaced tax tables");
        } else {
            debug!(financial_year = %year, "registered tax tables");
        }
        Ok(())
    }

    /// Parses, validates and adds a TOML year table.
    pub fn register_toml(
        &mut self,
        source: &str,
    ) -> Result<FinancialYear, ConfigError> {
        let config = TaxYearConfig::from_toml_str(source)?;
        let year = config.financial_year;
        self.register(config)?;
        Ok(year)
    }

    /// Every registered year, oldest first.
    pub fn financial_years(&self) -> Vec<FinancialYear> {
        self.configs.keys().copied().collect()
    }

    pub fn get(
        &self,
        year: FinancialYear,
    ) -> Option<&TaxYearConfig> {
        self.configs.get(&year)
    }

    /// The newest registered year.
    pub fn latest(&self) -> &TaxYearConfig {
        &self.latest
    }

    /// Looks up a year by its `YYYY-YY` key.
    ///
    /// An unknown or malformed key never fails: the latest year is returned
    /// together with a [`ConfigNotFoundWarning`].
    ///
    /// # Example
    ///
    /// ```
    /// use au_tax_core::TaxYearRegistry;
    ///
    /// let registry = TaxYearRegistry::builtin().unwrap();
    ///
    /// let known = registry.get_config("2023-24");
    /// assert!(known.warning.is_none());
    ///
    /// let unknown = registry.get_config("2031-32");
    /// assert_eq!(unknown.config.financial_year.to_string(), "2025-26");
    /// assert!(unknown.warning.is_some());
    /// ```
    pub fn get_config(
        &self,
        financial_year: &str,
    ) -> ConfigSelection<'_> {
        let found = financial_year
            .parse::<FinancialYear>()
            .ok()
            .and_then(|year| self.configs.get(&year));

        match found {
            Some(config) => ConfigSelection {
                config,
                warning: None,
            },
            None => self.fallback(financial_year),
        }
    }

    /// Looks up the year containing `as_of`, falling back like
    /// [`get_config`](TaxYearRegistry::get_config).
    pub fn get_current_config(
        &self,
        as_of: NaiveDate,
    ) -> ConfigSelection<'_> {
        let year = FinancialYear::from_date(as_of);
        match self.configs.get(&year) {
            Some(config) => ConfigSelection {
                config,
                warning: None,
            },
            None => self.fallback(&year.to_string()),
        }
    }

    fn fallback(
        &self,
        requested: &str,
    ) -> ConfigSelection<'_> {
        let fallback = self.latest.financial_year;
        warn!(
            requested = requested,
            fallback = %fallback,
            "no tax tables for financial year; using latest"
        );
        ConfigSelection {
            config: &self.latest,
            warning: Some(ConfigNotFoundWarning {
                requested: requested.to_string(),
                fallback,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn registry() -> TaxYearRegistry {
        TaxYearRegistry::builtin().unwrap()
    }

    fn year(key: &str) -> FinancialYear {
        key.parse().unwrap()
    }

    // =========================================================================
    // builtin tests
    // =========================================================================

    #[test]
    fn builtin_years_load_and_validate() {
        let registry = registry();

        assert_eq!(
            registry.financial_years(),
            vec![year("2022-23"), year("2023-24"), year("2024-25"), year("2025-26")]
        );
        assert_eq!(registry.latest().financial_year, year("2025-26"));
    }

    #[test]
    fn stage_three_brackets_start_in_2024_25() {
        let registry = registry();

        let before = registry.get_config("2023-24").config;
        let after = registry.get_config("2024-25").config;

        assert_eq!(before.brackets[1].tax_rate, dec!(0.19));
        assert_eq!(after.brackets[1].tax_rate, dec!(0.16));
        assert_eq!(after.brackets[2].max_income, Some(dec!(135000)));
    }

    // =========================================================================
    // get_config tests
    // =========================================================================

    #[test]
    fn known_year_has_no_warning() {
        let registry = registry();

        let selection = registry.get_config("2024-25");

        assert_eq!(selection.config.financial_year, year("2024-25"));
        assert_eq!(selection.warning, None);
    }

    #[test]
    fn unknown_year_falls_back_to_latest() {
        let registry = registry();

        let selection = registry.get_config("2019-20");

        assert_eq!(selection.config.financial_year, year("2025-26"));
        assert_eq!(
            selection.warning,
            Some(ConfigNotFoundWarning {
                requested: "2019-20".to_string(),
                fallback: year("2025-26"),
            })
        );
    }

    #[test]
    fn malformed_key_falls_back_with_warning() {
        let registry = registry();

        let selection = registry.get_config("next year");

        assert_eq!(selection.config.financial_year, year("2025-26"));
        assert_eq!(
            selection.warning.map(|w| w.to_string()),
            Some("no tables for financial year 'next year'; using 2025-26".to_string())
        );
    }

    // =========================================================================
    // get_current_config tests
    // =========================================================================

    #[test]
    fn july_first_starts_the_new_year() {
        let registry = registry();

        let june = registry.get_current_config(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        let july = registry.get_current_config(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());

        assert_eq!(june.config.financial_year, year("2023-24"));
        assert_eq!(july.config.financial_year, year("2024-25"));
    }

    #[test]
    fn future_date_falls_back() {
        let registry = registry();

        let selection = registry.get_current_config(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());

        assert_eq!(selection.config.financial_year, year("2025-26"));
        assert_eq!(selection.warning.map(|w| w.requested), Some("2029-30".to_string()));
    }

    // =========================================================================
    // register tests
    // =========================================================================

    #[test]
    fn register_adds_a_new_latest_year() {
        let mut registry = registry();
        let mut next = registry.get_config("2025-26").config.clone();
        next.financial_year = year("2026-27");
        next.superannuation.guarantee_rate = dec!(0.12);

        registry.register(next).unwrap();

        assert_eq!(registry.latest().financial_year, year("2026-27"));
        assert_eq!(registry.get_config("2026-27").warning, None);
    }

    #[test]
    fn register_replaces_an_existing_year() {
        let mut registry = registry();
        let mut revised = registry.get_config("2023-24").config.clone();
        revised.superannuation.concessional_cap = dec!(28000);

        registry.register(revised).unwrap();

        let config = registry.get_config("2023-24").config;
        assert_eq!(config.superannuation.concessional_cap, dec!(28000));
        assert_eq!(registry.financial_years().len(), 4);
        assert_eq!(registry.latest().financial_year, year("2025-26"));
    }

    #[test]
    fn register_rejects_invalid_tables() {
        let mut registry = registry();
        let mut broken = registry.get_config("2024-25").config.clone();
        broken.brackets[2].min_income = dec!(45500);

        let err = registry.register(broken).unwrap_err();

        assert_eq!(
            err,
            ConfigError::BandGap {
                table: "tax bracket",
                index: 2,
                expected: dec!(45001),
                found: dec!(45500),
            }
        );
    }

    #[test]
    fn register_toml_returns_the_year() {
        let mut registry = registry();

        let registered = registry.register_toml(BUILTIN_TABLES[0]).unwrap();

        assert_eq!(registered, year("2022-23"));
    }

    #[test]
    fn empty_registry_is_an_error() {
        let err = TaxYearRegistry::from_configs(Vec::new()).unwrap_err();

        assert_eq!(err, ConfigError::NoTables);
    }
}
