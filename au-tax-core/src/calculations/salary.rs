//! Salary processing: gross or net salary to a full pay breakdown.
//!
//! The pipeline is linear:
//!
//! 1. Annualise the per-period salary, solving for gross when it is a net.
//! 2. Taxable income is gross less annual salary sacrifice.
//! 3. PAYG withholding and Medicare on taxable income; total tax is the sum.
//! 4. Net is gross less total tax and salary sacrifice.
//! 5. Super is the guarantee on gross plus salary sacrifice.
//! 6. Every annual figure is projected onto the pay frequency.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use au_tax_core::{PayFrequency, SalaryInput, SalaryProcessor, TaxYearRegistry};
//!
//! let registry = TaxYearRegistry::builtin().unwrap();
//! let processor = SalaryProcessor::new(registry.get_config("2024-25").config);
//!
//! let breakdown = processor.process(&SalaryInput::gross(dec!(8000), PayFrequency::Monthly));
//!
//! assert_eq!(breakdown.annual.gross, dec!(96000));
//! assert_eq!(breakdown.annual.income_tax, dec!(19588));
//! assert_eq!(breakdown.per_period.gross, dec!(8000));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::{format_currency, format_percentage, round_half_up};
use crate::calculations::income_tax::calculate_income_tax;
use crate::calculations::medicare::{FamilyStatus, MedicareInput, calculate_medicare_levy};
use crate::calculations::payg::{PaygInput, calculate_payg, nearest_cent};
use crate::calculations::solver::{BisectionOptions, bisect};
use crate::calculations::super_contributions::calculate_super_guarantee;
use crate::models::{CalculationStep, FinancialYear, Operation, PayFrequency, TaxYearConfig};

/// Share of gross salary the sacrifice advisor will recommend at most.
const MAX_SACRIFICE_SHARE: Decimal = rust_decimal_macros::dec!(0.30);

/// Whether the salary amount is before or after tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalaryType {
    Gross,
    Net,
}

impl SalaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gross => "GROSS",
            Self::Net => "NET",
        }
    }

    /// Case-insensitive parse of `GROSS` or `NET`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GROSS" => Some(Self::Gross),
            "NET" => Some(Self::Net),
            _ => None,
        }
    }
}

/// A salary to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryInput {
    /// Salary for one pay period, before or after tax depending on
    /// `salary_type`.
    pub amount: Decimal,
    pub salary_type: SalaryType,
    /// Pay cycle of `amount` and `salary_sacrifice`. The breakdown is
    /// projected back onto it.
    pub pay_frequency: PayFrequency,
    /// Salary sacrificed each pay period.
    #[serde(default)]
    pub salary_sacrifice: Option<Decimal>,
    pub has_tax_free_threshold: bool,
    /// Without private hospital cover the Medicare levy surcharge applies.
    pub has_private_health_insurance: bool,
}

impl SalaryInput {
    /// Gross salary per pay period with the tax-free threshold claimed and
    /// private hospital cover held.
    pub fn gross(
        amount: Decimal,
        pay_frequency: PayFrequency,
    ) -> Self {
        Self {
            amount,
            salary_type: SalaryType::Gross,
            pay_frequency,
            salary_sacrifice: None,
            has_tax_free_threshold: true,
            has_private_health_insurance: true,
        }
    }

    /// Net salary per pay period, otherwise as [`SalaryInput::gross`].
    pub fn net(
        amount: Decimal,
        pay_frequency: PayFrequency,
    ) -> Self {
        Self {
            salary_type: SalaryType::Net,
            ..Self::gross(amount, pay_frequency)
        }
    }

    pub fn with_salary_sacrifice(
        mut self,
        per_period: Decimal,
    ) -> Self {
        self.salary_sacrifice = Some(per_period);
        self
    }
}

/// One set of salary figures, either annual or for one pay period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryFigures {
    pub gross: Decimal,
    pub salary_sacrifice: Decimal,
    pub taxable_income: Decimal,
    /// Income tax on taxable income before offsets. Shown for reference;
    /// `total_tax` is what is withheld.
    pub income_tax: Decimal,
    pub payg_withholding: Decimal,
    pub medicare_levy: Decimal,
    pub medicare_surcharge: Decimal,
    /// PAYG withholding plus Medicare.
    pub total_tax: Decimal,
    pub net: Decimal,
    pub super_guarantee: Decimal,
    /// Super guarantee plus salary sacrifice.
    pub total_super: Decimal,
}

impl SalaryFigures {
    fn per_period(
        &self,
        frequency: PayFrequency,
    ) -> Self {
        let f = |annual: Decimal| frequency.from_annual(annual);
        Self {
            gross: f(self.gross),
            salary_sacrifice: f(self.salary_sacrifice),
            taxable_income: f(self.taxable_income),
            income_tax: f(self.income_tax),
            payg_withholding: f(self.payg_withholding),
            medicare_levy: f(self.medicare_levy),
            medicare_surcharge: f(self.medicare_surcharge),
            total_tax: f(self.total_tax),
            net: f(self.net),
            super_guarantee: f(self.super_guarantee),
            total_super: f(self.total_super),
        }
    }
}

/// Annual and per-period salary figures with their working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryBreakdown {
    pub financial_year: FinancialYear,
    pub pay_frequency: PayFrequency,
    pub salary_type: SalaryType,
    pub annual: SalaryFigures,
    pub per_period: SalaryFigures,
    /// Solver iterations when the gross was solved from a net salary.
    pub solver_iterations: Option<u32>,
    pub solver_converged: bool,
    pub warnings: Vec<String>,
    pub steps: Vec<CalculationStep>,
}

/// Salary sacrifice suggested by the advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SacrificeRecommendation {
    pub recommended_annual: Decimal,
    pub recommended_per_period: Decimal,
    /// Concessional cap left after the super guarantee.
    pub cap_headroom: Decimal,
    pub marginal_rate: Decimal,
    /// Income tax saved less contributions tax paid.
    pub estimated_tax_saving: Decimal,
    /// Why nothing is recommended, when that is the case.
    pub reason: Option<String>,
    pub steps: Vec<CalculationStep>,
}

/// Difference between two salary scenarios (second less first), annual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryDelta {
    pub gross: Decimal,
    pub net: Decimal,
    pub total_tax: Decimal,
    pub total_super: Decimal,
}

/// Two salary scenarios side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub first: SalaryBreakdown,
    pub second: SalaryBreakdown,
    pub difference: SalaryDelta,
}

/// Salary calculations for one financial year.
#[derive(Debug, Clone, Copy)]
pub struct SalaryProcessor<'a> {
    config: &'a TaxYearConfig,
}

impl<'a> SalaryProcessor<'a> {
    pub fn new(config: &'a TaxYearConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline for `input`.
    pub fn process(
        &self,
        input: &SalaryInput,
    ) -> SalaryBreakdown {
        let mut warnings = Vec::new();

        let amount = if input.amount < Decimal::ZERO {
            warn!(amount = %input.amount, "negative salary treated as nil");
            warnings.push("Negative salary treated as nil".to_string());
            Decimal::ZERO
        } else {
            round_half_up(input.pay_frequency.to_annual(input.amount))
        };

        let per_period_sacrifice = input.salary_sacrifice.unwrap_or(Decimal::ZERO);
        let mut sacrifice = if per_period_sacrifice < Decimal::ZERO {
            warn!(sacrifice = %per_period_sacrifice, "negative salary sacrifice ignored");
            warnings.push("Negative salary sacrifice ignored".to_string());
            Decimal::ZERO
        } else {
            round_half_up(input.pay_frequency.to_annual(per_period_sacrifice))
        };

        let (gross, solver_iterations, solver_converged) = match input.salary_type {
            SalaryType::Gross => (amount, None, true),
            SalaryType::Net => {
                let (gross, iterations, converged) = self.solve_gross(amount, sacrifice, input);
                if !converged {
                    warnings.push(format!(
                        "Gross salary for a net of {} is a best estimate",
                        format_currency(amount)
                    ));
                }
                (gross, Some(iterations), converged)
            }
        };

        if sacrifice > gross {
            warn!(sacrifice = %sacrifice, gross = %gross, "salary sacrifice limited to gross salary");
            warnings.push(format!(
                "Salary sacrifice limited to gross salary of {}",
                format_currency(gross)
            ));
            sacrifice = gross;
        }

        let (annual, steps) = self.annual_figures(gross, sacrifice, input);

        if annual.total_super > self.config.superannuation.concessional_cap {
            warnings.push(format!(
                "Super guarantee plus salary sacrifice of {} exceeds the {} concessional cap",
                format_currency(annual.total_super),
                format_currency(self.config.superannuation.concessional_cap)
            ));
        }

        debug!(
            gross = %annual.gross,
            net = %annual.net,
            frequency = %input.pay_frequency,
            "salary processed"
        );

        SalaryBreakdown {
            financial_year: self.config.financial_year,
            pay_frequency: input.pay_frequency,
            salary_type: input.salary_type,
            per_period: annual.per_period(input.pay_frequency),
            annual,
            solver_iterations,
            solver_converged,
            warnings,
            steps,
        }
    }

    /// Suggests a salary sacrifice that stays within the concessional cap.
    ///
    /// The suggestion is the smaller of the cap left after the super
    /// guarantee and 30% of gross salary. It is only worthwhile while the
    /// marginal rate is above the 15% contributions tax.
    pub fn recommend_salary_sacrifice(
        &self,
        input: &SalaryInput,
    ) -> SacrificeRecommendation {
        let s = &self.config.superannuation;
        let current = self.process(&SalaryInput {
            salary_sacrifice: None,
            ..input.clone()
        });
        let gross = current.annual.gross;
        let sg = current.annual.super_guarantee;

        let cap_headroom = (s.concessional_cap - sg).max(Decimal::ZERO);
        let marginal_rate = self.config.marginal_rate(gross);
        let mut steps = vec![
            CalculationStep::new("Concessional cap", s.concessional_cap),
            CalculationStep::new("Super guarantee", sg).with_operation(Operation::Subtract),
            CalculationStep::new("Cap headroom", cap_headroom).with_operation(Operation::Equals),
        ];

        let reason = if marginal_rate <= s.contributions_tax_rate {
            Some(format!(
                "Marginal tax rate of {} does not exceed the {} contributions tax",
                format_percentage(marginal_rate),
                format_percentage(s.contributions_tax_rate)
            ))
        } else if cap_headroom.is_zero() {
            Some("No concessional cap left after the super guarantee".to_string())
        } else {
            None
        };

        if let Some(reason) = reason {
            steps.push(
                CalculationStep::new("Recommended salary sacrifice", Decimal::ZERO)
                    .with_explanation(reason.clone()),
            );
            return SacrificeRecommendation {
                recommended_annual: Decimal::ZERO,
                recommended_per_period: Decimal::ZERO,
                cap_headroom,
                marginal_rate,
                estimated_tax_saving: Decimal::ZERO,
                reason: Some(reason),
                steps,
            };
        }

        let recommended_annual = round_half_up(cap_headroom.min(gross * MAX_SACRIFICE_SHARE));
        let estimated_tax_saving =
            round_half_up(recommended_annual * (marginal_rate - s.contributions_tax_rate));
        steps.push(
            CalculationStep::new("Recommended salary sacrifice", recommended_annual)
                .with_operation(Operation::Min)
                .with_explanation(format!(
                    "Smaller of cap headroom and {} of {}",
                    format_percentage(MAX_SACRIFICE_SHARE),
                    format_currency(gross)
                )),
        );
        steps.push(
            CalculationStep::new("Estimated tax saving", estimated_tax_saving)
                .with_operation(Operation::Multiply)
                .with_explanation(format!(
                    "{} × ({} − {})",
                    format_currency(recommended_annual),
                    format_percentage(marginal_rate),
                    format_percentage(s.contributions_tax_rate)
                )),
        );

        SacrificeRecommendation {
            recommended_annual,
            recommended_per_period: input.pay_frequency.from_annual(recommended_annual),
            cap_headroom,
            marginal_rate,
            estimated_tax_saving,
            reason: None,
            steps,
        }
    }

    /// Processes two scenarios and reports the annual differences.
    pub fn compare(
        &self,
        first: &SalaryInput,
        second: &SalaryInput,
    ) -> ScenarioComparison {
        let first = self.process(first);
        let second = self.process(second);
        let difference = SalaryDelta {
            gross: second.annual.gross - first.annual.gross,
            net: second.annual.net - first.annual.net,
            total_tax: second.annual.total_tax - first.annual.total_tax,
            total_super: second.annual.total_super - first.annual.total_super,
        };
        ScenarioComparison {
            first,
            second,
            difference,
        }
    }

    fn solve_gross(
        &self,
        target_net: Decimal,
        sacrifice: Decimal,
        input: &SalaryInput,
    ) -> (Decimal, u32, bool) {
        if target_net <= Decimal::ZERO {
            return (sacrifice, 0, true);
        }

        let net_of = |gross: Decimal| self.annual_figures(gross, sacrifice, input).0.net;
        let lower = target_net + sacrifice;
        let outcome = bisect(
            target_net,
            lower,
            lower * Decimal::TWO,
            BisectionOptions {
                tolerance: rust_decimal_macros::dec!(0.005),
                ..BisectionOptions::default()
            },
            net_of,
        );

        (
            nearest_cent(outcome.value, target_net, net_of),
            outcome.iterations,
            outcome.converged,
        )
    }

    fn annual_figures(
        &self,
        gross: Decimal,
        sacrifice: Decimal,
        input: &SalaryInput,
    ) -> (SalaryFigures, Vec<CalculationStep>) {
        let config = self.config;
        let taxable_income = (gross - sacrifice).max(Decimal::ZERO);

        let income_tax = calculate_income_tax(taxable_income, config).tax_payable;
        let payg = calculate_payg(
            &PaygInput {
                gross_income: taxable_income,
                frequency: PayFrequency::Annually,
                has_tax_free_threshold: input.has_tax_free_threshold,
                has_study_loan: false,
            },
            config,
        );
        let medicare = calculate_medicare_levy(
            &MedicareInput {
                taxable_income,
                family_status: FamilyStatus::Single,
                dependent_children: 0,
                has_private_health_insurance: input.has_private_health_insurance,
                is_exempt: false,
            },
            config,
        );
        let sg = calculate_super_guarantee(gross, config);

        let total_tax = payg.annual_withholding + medicare.total;
        let net = gross - total_tax - sacrifice;
        let total_super = sg.amount + sacrifice;

        let mut steps = vec![
            CalculationStep::new("Annual gross salary", gross),
            CalculationStep::new("Salary sacrifice", sacrifice).with_operation(Operation::Subtract),
            CalculationStep::new("Taxable income", taxable_income).with_operation(Operation::Equals),
            CalculationStep::new("Income tax (before offsets)", income_tax),
        ];
        steps.extend(payg.steps);
        steps.extend(medicare.steps);
        steps.push(
            CalculationStep::new("Total tax", total_tax)
                .with_operation(Operation::Add)
                .with_explanation("PAYG withholding + Medicare"),
        );
        steps.push(
            CalculationStep::new("Net salary", net)
                .with_operation(Operation::Equals)
                .with_explanation("Gross − total tax − salary sacrifice"),
        );
        steps.extend(sg.steps);
        steps.push(
            CalculationStep::new("Total super", total_super)
                .with_operation(Operation::Add)
                .with_explanation("Super guarantee + salary sacrifice"),
        );

        let figures = SalaryFigures {
            gross,
            salary_sacrifice: sacrifice,
            taxable_income,
            income_tax,
            payg_withholding: payg.annual_withholding,
            medicare_levy: medicare.medicare_levy,
            medicare_surcharge: medicare.medicare_surcharge,
            total_tax,
            net,
            super_guarantee: sg.amount,
            total_super,
        };
        (figures, steps)
    }
}

/// Processes `input` against `config`.
pub fn process_salary(
    input: &SalaryInput,
    config: &TaxYearConfig,
) -> SalaryBreakdown {
    SalaryProcessor::new(config).process(input)
}
