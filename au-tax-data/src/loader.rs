use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use au_tax_core::{ConfigError, FinancialYear, TaxBracket, TaxYearConfig, TaxYearRegistry};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading tax tables.
#[derive(Debug, Error)]
pub enum TaxTableLoaderError {
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },

    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid tax table: {0}")]
    Config(#[from] ConfigError),

    #[error("No tax tables registered for {0}; load its TOML table first")]
    UnknownYear(FinancialYear),

    #[error("No .toml tax tables found in {0}")]
    EmptyDirectory(String),
}

impl From<csv::Error> for TaxTableLoaderError {
    fn from(err: csv::Error) -> Self {
        TaxTableLoaderError::CsvParse(err.to_string())
    }
}

fn io_error(
    path: &Path,
    err: std::io::Error,
) -> TaxTableLoaderError {
    TaxTableLoaderError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Loader for whole-year TOML tax tables.
///
/// A table has the same layout as the ones embedded in `au-tax-core`, so a
/// new financial year can be added without rebuilding.
pub struct TaxTableLoader;

impl TaxTableLoader {
    /// Parse and validate one TOML table from a reader.
    pub fn parse<R: Read>(mut reader: R) -> Result<TaxYearConfig, TaxTableLoaderError> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| io_error(Path::new("<reader>"), e))?;
        Ok(TaxYearConfig::from_toml_str(&source)?)
    }

    /// Parse and validate one TOML table file.
    pub fn load_file(path: &Path) -> Result<TaxYearConfig, TaxTableLoaderError> {
        let source = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let config = TaxYearConfig::from_toml_str(&source)?;
        debug!(path = %path.display(), financial_year = %config.financial_year, "loaded tax table");
        Ok(config)
    }

    /// Every `*.toml` table in `dir`, in file name order.
    pub fn load_dir(dir: &Path) -> Result<Vec<TaxYearConfig>, TaxTableLoaderError> {
        let mut paths = fs::read_dir(dir)
            .map_err(|e| io_error(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect::<Vec<_>>();
        paths.sort();

        if paths.is_empty() {
            return Err(TaxTableLoaderError::EmptyDirectory(dir.display().to_string()));
        }
        paths.iter().map(|path| Self::load_file(path)).collect()
    }

    /// Register every table in `dir`, replacing built-in years of the same
    /// name. Returns the years registered.
    pub fn load_into(
        registry: &mut TaxYearRegistry,
        dir: &Path,
    ) -> Result<Vec<FinancialYear>, TaxTableLoaderError> {
        let configs = Self::load_dir(dir)?;
        let mut years = Vec::with_capacity(configs.len());
        for config in configs {
            years.push(config.financial_year);
            registry.register(config)?;
        }
        info!(count = years.len(), dir = %dir.display(), "registered tax tables");
        Ok(years)
    }
}

/// A single record from a bracket override CSV file.
///
/// - `financial_year`: the year key (e.g., 2024-25)
/// - `min_income`: first dollar of the bracket
/// - `max_income`: last dollar of the bracket (empty for unlimited)
/// - `base_tax`: tax on income up to `min_income`
/// - `rate`: the marginal tax rate as a decimal (e.g., 0.30 for 30%)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BracketRecord {
    pub financial_year: FinancialYear,
    pub min_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_income: Option<Decimal>,
    pub base_tax: Decimal,
    pub rate: Decimal,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Loader for income tax bracket overrides from CSV files.
///
/// Each year in the file has its whole bracket table replaced; the rest of
/// that year's parameters are left as registered.
pub struct BracketCsvLoader;

impl BracketCsvLoader {
    /// Parse bracket records from a CSV reader, in file order.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BracketRecord>, TaxTableLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BracketRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Replace the bracket tables of every year in `records`.
    ///
    /// Records are grouped by year and kept in file order within a year.
    /// Each updated year is re-validated when it is registered, so a
    /// malformed table leaves the registry unchanged for that year.
    /// Returns the number of brackets loaded.
    pub fn apply(
        registry: &mut TaxYearRegistry,
        records: &[BracketRecord],
    ) -> Result<usize, TaxTableLoaderError> {
        let mut groups: BTreeMap<FinancialYear, Vec<&BracketRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.financial_year).or_default().push(record);
        }

        let mut loaded = 0;
        for (year, group) in groups {
            let mut config = registry
                .get(year)
                .cloned()
                .ok_or(TaxTableLoaderError::UnknownYear(year))?;

            config.brackets = group
                .iter()
                .map(|record| TaxBracket {
                    min_income: record.min_income,
                    max_income: record.max_income,
                    base_tax: record.base_tax,
                    tax_rate: record.rate,
                })
                .collect();
            loaded += config.brackets.len();

            registry.register(config)?;
            info!(financial_year = %year, brackets = group.len(), "replaced income tax brackets");
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    const STAGE_THREE_CSV: &str = "financial_year,min_income,max_income,base_tax,rate
2023-24,0,18200,0,0
2023-24,18201,45000,0,0.16
2023-24,45001,135000,4288,0.30
2023-24,135001,190000,31288,0.37
2023-24,190001,,51638,0.45
";

    fn year(key: &str) -> FinancialYear {
        key.parse().unwrap()
    }

    // =========================================================================
    // BracketCsvLoader::parse tests
    // =========================================================================

    #[test]
    fn test_parse_csv_single_bracket() {
        let csv = "financial_year,min_income,max_income,base_tax,rate\n2024-25,18201,45000,0,0.16";

        let records = BracketCsvLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(
            records,
            vec![BracketRecord {
                financial_year: year("2024-25"),
                min_income: dec!(18201),
                max_income: Some(dec!(45000)),
                base_tax: dec!(0),
                rate: dec!(0.16),
            }]
        );
    }

    #[test]
    fn test_parse_csv_unlimited_max_income() {
        let records = BracketCsvLoader::parse(STAGE_THREE_CSV.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records.len(), 5);
        assert_eq!(records[4].max_income, None);
        assert_eq!(records[4].base_tax, dec!(51638));
    }

    #[test]
    fn test_parse_invalid_csv_missing_column() {
        let csv = "financial_year,min_income\n2024-25,0";

        let err = BracketCsvLoader::parse(csv.as_bytes()).expect_err("Should fail for missing column");

        let TaxTableLoaderError::CsvParse(msg) = err else {
            panic!("Expected CsvParse error, got: {:?}", err);
        };
        assert!(msg.contains("missing field"), "got: {msg}");
    }

    #[test]
    fn test_parse_invalid_financial_year() {
        let csv = "financial_year,min_income,max_income,base_tax,rate\n2024,0,18200,0,0";

        let err = BracketCsvLoader::parse(csv.as_bytes()).expect_err("Should fail for bad year");

        assert!(matches!(err, TaxTableLoaderError::CsvParse(_)));
    }

    // =========================================================================
    // BracketCsvLoader::apply tests
    // =========================================================================

    #[test]
    fn test_apply_replaces_brackets_for_year() {
        let mut registry = TaxYearRegistry::builtin().unwrap();
        let records = BracketCsvLoader::parse(STAGE_THREE_CSV.as_bytes()).unwrap();

        let loaded = BracketCsvLoader::apply(&mut registry, &records).unwrap();

        assert_eq!(loaded, 5);
        let config = registry.get(year("2023-24")).unwrap();
        assert_eq!(config.brackets[1].tax_rate, dec!(0.16));
        // other parameters untouched
        assert_eq!(config.superannuation.guarantee_rate, dec!(0.11));
    }

    #[test]
    fn test_apply_unknown_year_fails() {
        let mut registry = TaxYearRegistry::builtin().unwrap();
        let csv = "financial_year,min_income,max_income,base_tax,rate\n2010-11,0,,0,0";
        let records = BracketCsvLoader::parse(csv.as_bytes()).unwrap();

        let err = BracketCsvLoader::apply(&mut registry, &records).unwrap_err();

        assert!(matches!(err, TaxTableLoaderError::UnknownYear(y) if y == year("2010-11")));
    }

    #[test]
    fn test_apply_rejects_gapped_table() {
        let mut registry = TaxYearRegistry::builtin().unwrap();
        let csv = "financial_year,min_income,max_income,base_tax,rate
2024-25,0,18200,0,0
2024-25,20000,,0,0.16
";
        let records = BracketCsvLoader::parse(csv.as_bytes()).unwrap();

        let err = BracketCsvLoader::apply(&mut registry, &records).unwrap_err();

        assert!(matches!(err, TaxTableLoaderError::Config(ConfigError::BandGap { .. })));
        // registry still holds the original table
        let config = registry.get(year("2024-25")).unwrap();
        assert_eq!(config.brackets.len(), 5);
    }

    // =========================================================================
    // TaxTableLoader tests
    // =========================================================================

    #[test]
    fn test_parse_toml_table_from_reader() {
        let registry = TaxYearRegistry::builtin().unwrap();
        let source = include_str!("../../au-tax-core/data/2024-25.toml");

        let config = TaxTableLoader::parse(source.as_bytes()).unwrap();

        assert_eq!(&config, registry.get_config("2024-25").config);
    }

    #[test]
    fn test_parse_malformed_toml() {
        let err = TaxTableLoader::parse("financial_year = 2024".as_bytes()).unwrap_err();

        assert!(matches!(err, TaxTableLoaderError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_dir_missing_directory() {
        let err = TaxTableLoader::load_dir(Path::new("/nonexistent/tax-tables")).unwrap_err();

        assert!(matches!(err, TaxTableLoaderError::Io { .. }));
    }
}
