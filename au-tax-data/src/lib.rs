//! Data tooling around `au-tax-core`: year tables from TOML, bracket
//! overrides and batch salaries from CSV, and logging setup for the CLI.

mod loader;
pub mod logging;
mod salary_csv;

pub use loader::{BracketCsvLoader, BracketRecord, TaxTableLoader, TaxTableLoaderError};
pub use salary_csv::{CsvLoadError, SalaryCsvLoader, SalaryRow};
