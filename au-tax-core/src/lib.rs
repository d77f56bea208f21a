//! Australian income tax and superannuation calculation engine.
//!
//! Every calculator is a pure function over a [`TaxYearConfig`] selected
//! from a [`TaxYearRegistry`]. Results carry a trail of
//! [`CalculationStep`]s so a caller can show how each figure was reached.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use au_tax_core::{PayFrequency, SalaryInput, TaxYearRegistry, process_salary};
//!
//! let registry = TaxYearRegistry::builtin().unwrap();
//! let config = registry.get_config("2024-25").config;
//!
//! let input = SalaryInput::gross(dec!(100000), PayFrequency::Annually);
//! let breakdown = process_salary(&input, config);
//!
//! assert_eq!(breakdown.annual.income_tax, dec!(20788));
//! assert_eq!(breakdown.annual.medicare_levy, dec!(2000));
//! assert_eq!(breakdown.annual.super_guarantee, dec!(11500));
//! ```

pub mod calculations;
pub mod config;
pub mod models;

pub use calculations::*;
pub use config::{ConfigNotFoundWarning, ConfigSelection, TaxYearRegistry};
pub use models::*;
