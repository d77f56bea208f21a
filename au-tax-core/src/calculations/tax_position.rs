//! End-of-year tax position: income tax, Medicare and offsets against the
//! PAYG already withheld.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::format_currency;
use crate::calculations::income_tax::calculate_income_tax;
use crate::calculations::medicare::{FamilyStatus, MedicareInput, MedicareResult, calculate_medicare_levy};
use crate::calculations::offsets::{
    OffsetApplication, OffsetInput, SaptoStatus, TaxOffsets, apply_offsets, calculate_all_offsets,
};
use crate::models::{CalculationStep, FinancialYear, Operation, TaxYearConfig};

/// A year's income, deductions and credits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxPositionInput {
    pub assessable_income: Decimal,
    pub deductions: Decimal,
    pub payg_withheld: Decimal,
    pub family_status: FamilyStatus,
    pub dependent_children: u32,
    pub has_private_health_insurance: bool,
    pub medicare_exempt: bool,
    pub sapto_status: Option<SaptoStatus>,
    pub franking_credits: Decimal,
    pub foreign_tax_paid: Decimal,
    pub foreign_income: Decimal,
    pub other_offsets: Decimal,
}

impl TaxPositionInput {
    /// Single person with private hospital cover and no other credits.
    pub fn new(
        assessable_income: Decimal,
        deductions: Decimal,
        payg_withheld: Decimal,
    ) -> Self {
        Self {
            assessable_income,
            deductions,
            payg_withheld,
            has_private_health_insurance: true,
            ..Self::default()
        }
    }
}

/// Where the year ends up once everything is netted off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPosition {
    pub financial_year: FinancialYear,
    pub taxable_income: Decimal,
    /// Income tax before offsets.
    pub income_tax: Decimal,
    pub medicare: MedicareResult,
    pub offsets: TaxOffsets,
    pub applied_offsets: OffsetApplication,
    /// Income tax after offsets plus Medicare. Negative when refundable
    /// offsets exceed the liability.
    pub net_tax: Decimal,
    pub payg_withheld: Decimal,
    pub refund: Decimal,
    pub amount_payable: Decimal,
    pub steps: Vec<CalculationStep>,
}

/// Works out the year's tax position.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::{TaxPositionInput, TaxYearRegistry, calculate_tax_position};
///
/// let registry = TaxYearRegistry::builtin().unwrap();
/// let config = registry.get_config("2024-25").config;
///
/// let position = calculate_tax_position(
///     &TaxPositionInput::new(dec!(60000), dec!(2000), dec!(10000)),
///     config,
/// );
///
/// // 8,188 income tax + 1,160 Medicare against 10,000 withheld
/// assert_eq!(position.net_tax, dec!(9348));
/// assert_eq!(position.refund, dec!(652));
/// ```
pub fn calculate_tax_position(
    input: &TaxPositionInput,
    config: &TaxYearConfig,
) -> TaxPosition {
    let deductions = input.deductions.max(Decimal::ZERO);
    let taxable_income = (input.assessable_income - deductions).max(Decimal::ZERO);
    if input.assessable_income < deductions {
        warn!(
            assessable = %input.assessable_income,
            deductions = %deductions,
            "deductions exceed assessable income; taxable income is nil"
        );
    }

    let income_tax = calculate_income_tax(taxable_income, config);
    let offsets = calculate_all_offsets(
        &OffsetInput {
            taxable_income,
            sapto_status: input.sapto_status,
            franking_credits: input.franking_credits,
            foreign_tax_paid: input.foreign_tax_paid,
            foreign_income: input.foreign_income,
            other_offsets: input.other_offsets,
        },
        config,
    );
    let applied_offsets = apply_offsets(income_tax.tax_payable, &offsets);
    let medicare = calculate_medicare_levy(
        &MedicareInput {
            taxable_income,
            family_status: input.family_status,
            dependent_children: input.dependent_children,
            has_private_health_insurance: input.has_private_health_insurance,
            is_exempt: input.medicare_exempt,
        },
        config,
    );

    let net_tax = applied_offsets.net_tax + medicare.total;
    let payg_withheld = input.payg_withheld.max(Decimal::ZERO);
    let balance = payg_withheld - net_tax;
    let refund = balance.max(Decimal::ZERO);
    let amount_payable = (-balance).max(Decimal::ZERO);

    let mut steps = vec![
        CalculationStep::new("Assessable income", input.assessable_income),
        CalculationStep::new("Deductions", deductions).with_operation(Operation::Subtract),
        CalculationStep::new("Taxable income", taxable_income).with_operation(Operation::Equals),
    ];
    steps.extend(income_tax.steps);
    steps.extend(applied_offsets.steps.iter().cloned());
    steps.extend(medicare.steps.iter().cloned());
    steps.push(
        CalculationStep::new("Net tax", net_tax)
            .with_operation(Operation::Add)
            .with_explanation("Tax after offsets + Medicare"),
    );
    steps.push(CalculationStep::new("PAYG withheld", payg_withheld).with_operation(Operation::Subtract));
    steps.push(if refund > Decimal::ZERO {
        CalculationStep::new("Refund", refund)
            .with_operation(Operation::Equals)
            .with_explanation(format!("{} withheld exceeds net tax", format_currency(payg_withheld)))
    } else {
        CalculationStep::new("Amount payable", amount_payable).with_operation(Operation::Equals)
    });

    debug!(
        taxable_income = %taxable_income,
        net_tax = %net_tax,
        refund = %refund,
        payable = %amount_payable,
        "tax position calculated"
    );

    TaxPosition {
        financial_year: config.financial_year,
        taxable_income,
        income_tax: income_tax.tax_payable,
        medicare,
        offsets,
        applied_offsets,
        net_tax,
        payg_withheld,
        refund,
        amount_payable,
        steps,
    }
}
