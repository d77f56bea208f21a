mod calculation_step;
mod financial_year;
mod pay_frequency;
mod tax_bracket;
mod tax_year_config;

pub use calculation_step::{CalculationStep, Operation};
pub use financial_year::{FinancialYear, FinancialYearError};
pub use pay_frequency::{PayFrequency, WEEKS_PER_YEAR};
pub use tax_bracket::{Band, PaygBand, SurchargeTier, TaxBracket};
pub use tax_year_config::{
    BracketInfo, BringForwardBand, CarryForwardConfig, CgtConfig, CoContributionConfig,
    ConfigError, ForeignTaxConfig, LitoConfig, MedicareConfig, PaygConfig, SaptoConfig,
    SaptoRates, SpouseOffsetConfig, SuperConfig, TaxYearConfig, validate_bands,
};
