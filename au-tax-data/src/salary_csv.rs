//! CSV loader for batch salary inputs.
//!
//! ## CSV Format
//!
//! Headers are matched by name, so column order does not matter.
//!
//! | Column                    | Required | Type    | Notes                                      |
//! |---------------------------|----------|---------|--------------------------------------------|
//! | `label`                   | no       | string  | Carried through to the output              |
//! | `amount`                  | yes      | decimal | Per pay period, e.g. `3269.23`             |
//! | `salary_type`             | yes      | string  | `GROSS` or `NET` (any case)                |
//! | `pay_frequency`           | yes      | string  | `WEEKLY`, `FORTNIGHTLY`, `MONTHLY`, ...    |
//! | `salary_sacrifice`        | no       | decimal | Per pay period; leave empty for none       |
//! | `tax_free_threshold`      | no       | bool    | Defaults to `true`                         |
//! | `private_health`          | no       | bool    | Defaults to `true`                         |
//!
//! ### Minimal example
//!
//! ```csv
//! amount,salary_type,pay_frequency
//! 8000,GROSS,MONTHLY
//! ```
use au_tax_core::{PayFrequency, SalaryInput, SalaryType};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CsvRow {
    label: Option<String>,
    amount: Decimal,
    salary_type: String,
    pay_frequency: String,
    salary_sacrifice: Option<Decimal>,
    tax_free_threshold: Option<bool>,
    private_health: Option<bool>,
}

/// Errors that can occur while loading salary rows.
#[derive(Debug, thiserror::Error)]
pub enum CsvLoadError {
    /// Bad structure, missing required column or type mismatch.
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    /// `salary_type` was neither `GROSS` nor `NET`. `row` is 1-based.
    #[error("unrecognised salary type '{value}' on row {row}")]
    InvalidSalaryType { value: String, row: usize },

    /// `pay_frequency` was not a known frequency. `row` is 1-based.
    #[error("unrecognised pay frequency '{value}' on row {row}")]
    InvalidPayFrequency { value: String, row: usize },
}

/// One salary to process, with its optional label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalaryRow {
    pub label: Option<String>,
    pub input: SalaryInput,
}

fn convert_row(
    row: CsvRow,
    row_number: usize,
) -> Result<SalaryRow, CsvLoadError> {
    let salary_type =
        SalaryType::parse(&row.salary_type).ok_or_else(|| CsvLoadError::InvalidSalaryType {
            value: row.salary_type.clone(),
            row: row_number,
        })?;
    let pay_frequency = PayFrequency::parse(&row.pay_frequency).ok_or_else(|| {
        CsvLoadError::InvalidPayFrequency {
            value: row.pay_frequency.clone(),
            row: row_number,
        }
    })?;

    Ok(SalaryRow {
        label: row.label.filter(|l| !l.is_empty()),
        input: SalaryInput {
            amount: row.amount,
            salary_type,
            pay_frequency,
            salary_sacrifice: row.salary_sacrifice,
            has_tax_free_threshold: row.tax_free_threshold.unwrap_or(true),
            has_private_health_insurance: row.private_health.unwrap_or(true),
        },
    })
}

/// Loader for batch salary CSV files.
pub struct SalaryCsvLoader;

impl SalaryCsvLoader {
    /// Parse CSV text into salary rows, in file order.
    ///
    /// # Errors
    ///
    /// * [`CsvLoadError::Parse`] for structural or type errors.
    /// * [`CsvLoadError::InvalidSalaryType`] / [`CsvLoadError::InvalidPayFrequency`]
    ///   for unrecognised codes.
    pub fn load_from_str(input: &str) -> Result<Vec<SalaryRow>, CsvLoadError> {
        Self::load(input.as_bytes())
    }

    /// As [`SalaryCsvLoader::load_from_str`], from any reader.
    pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<SalaryRow>, CsvLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(false)
            .from_reader(reader);

        reader
            .deserialize::<CsvRow>()
            .enumerate()
            .map(|(idx, result)| convert_row(result?, idx + 1))
            .collect()
    }
}
