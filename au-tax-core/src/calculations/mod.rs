//! Tax and superannuation calculators.
//!
//! Each calculator takes its inputs plus a [`TaxYearConfig`](crate::TaxYearConfig)
//! and returns a result record with a step trail. None of them hold state.

pub mod capital_gains;
pub mod common;
pub mod income_tax;
pub mod medicare;
pub mod offsets;
pub mod payg;
pub mod salary;
pub mod solver;
pub mod super_caps;
pub mod super_contributions;
pub mod tax_position;

pub use capital_gains::{CapitalGainInput, CapitalGainResult, calculate_capital_gain, held_for_discount};
pub use income_tax::{IncomeTaxResult, calculate_income_tax, tax_on_additional_income};
pub use medicare::{FamilyStatus, MedicareInput, MedicareResult, calculate_medicare_levy};
pub use offsets::{
    AppliedOffset, GrossedUpDividend, OffsetAmount, OffsetApplication, OffsetInput, OffsetKind,
    SaptoStatus, TaxOffsets, apply_offsets, calculate_all_offsets, calculate_foreign_tax_offset,
    calculate_franking_credit_offset, calculate_lito, calculate_sapto, gross_up_franked_dividend,
};
pub use payg::{
    GrossFromNet, PaygInput, PaygResult, WithholdingScale, calculate_gross_from_net,
    calculate_payg, withholding_for_period,
};
pub use salary::{
    SacrificeRecommendation, SalaryBreakdown, SalaryDelta, SalaryFigures, SalaryInput,
    SalaryProcessor, SalaryType, ScenarioComparison, process_salary,
};
pub use solver::{BisectionOptions, BisectionOutcome, bisect};
pub use super_caps::{
    BringForwardResult, CapStatus, CapTrackingInput, CapTrackingResult, CarryForwardRecord,
    CarryForwardResult, CarryForwardUsage, EXCESS_ESTIMATE_NOTE, calculate_bring_forward,
    calculate_carry_forward, consume_carry_forward, track_contribution_caps,
    unused_concessional_cap,
};
pub use super_contributions::{
    CoContributionResult, Division293Result, SpouseOffsetResult, SuperContributionInput,
    SuperContributionResult, SuperGuaranteeResult, calculate_co_contribution,
    calculate_division_293_tax, calculate_spouse_contribution_offset,
    calculate_super_contributions, calculate_super_guarantee,
};
pub use tax_position::{TaxPosition, TaxPositionInput, calculate_tax_position};
