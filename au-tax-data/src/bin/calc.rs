use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use au_tax_core::calculations::common::{format_currency, format_percentage};
use au_tax_core::{
    CapStatus, CapTrackingInput, CarryForwardRecord, FinancialYear, PayFrequency, SalaryBreakdown,
    SalaryInput, SalaryProcessor, SalaryType, TaxYearConfig, TaxYearRegistry,
    track_contribution_caps,
};
use au_tax_data::logging::init_logging;
use au_tax_data::{BracketCsvLoader, SalaryCsvLoader, TaxTableLoader};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

/// Australian income tax and superannuation calculator.
///
/// Built-in tables cover 2022-23 to 2025-26. Extra years can be loaded from
/// a directory of TOML tables, and bracket tables overridden from a CSV
/// file with the columns financial_year, min_income, max_income, base_tax
/// and rate.
#[derive(Parser, Debug)]
#[command(name = "au-tax-calc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Directory of extra TOML year tables
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    /// CSV file of bracket overrides
    #[arg(long, global = true)]
    brackets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Break down one salary
    Salary(SalaryArgs),

    /// Process a CSV of salaries and write the results as CSV to stdout
    Batch {
        /// CSV file of salaries
        #[arg(short, long)]
        file: PathBuf,

        /// Financial year, e.g. 2024-25 (defaults to the current year)
        #[arg(short, long)]
        year: Option<String>,
    },

    /// Check year-to-date super contributions against the caps
    Caps(CapsArgs),

    /// List the financial years available
    Years,
}

#[derive(Args, Debug)]
struct SalaryArgs {
    /// Salary for one pay period at --frequency
    amount: Decimal,

    /// Pay frequency: weekly, fortnightly, monthly, quarterly or annually
    #[arg(short, long, default_value = "monthly", value_parser = parse_frequency)]
    frequency: PayFrequency,

    /// Financial year, e.g. 2024-25 (defaults to the current year)
    #[arg(short, long)]
    year: Option<String>,

    /// Treat the amount as take-home pay and solve for the gross
    #[arg(long, default_value_t = false)]
    net: bool,

    /// Salary sacrificed each pay period
    #[arg(long)]
    sacrifice: Option<Decimal>,

    /// Tax-free threshold not claimed with this employer
    #[arg(long, default_value_t = false)]
    no_tax_free_threshold: bool,

    /// No private hospital cover (Medicare levy surcharge applies)
    #[arg(long, default_value_t = false)]
    no_private_health: bool,

    /// Also suggest a salary sacrifice amount
    #[arg(long, default_value_t = false)]
    advise: bool,
}

#[derive(Args, Debug)]
struct CapsArgs {
    /// Concessional contributions so far this year
    #[arg(long, default_value = "0")]
    concessional: Decimal,

    /// Non-concessional contributions so far this year
    #[arg(long, default_value = "0")]
    non_concessional: Decimal,

    /// Total super balance at the previous 30 June
    #[arg(long, default_value = "0")]
    balance: Decimal,

    /// Unused concessional cap from an earlier year, as YEAR=AMOUNT
    /// (e.g. 2022-23=5000). Repeatable.
    #[arg(long = "carry-forward", value_parser = parse_carry_forward)]
    carry_forward: Vec<CarryForwardRecord>,

    /// Financial year, e.g. 2024-25 (defaults to the current year)
    #[arg(short, long)]
    year: Option<String>,
}

fn parse_frequency(s: &str) -> Result<PayFrequency, String> {
    PayFrequency::parse(s).ok_or_else(|| format!("unknown pay frequency '{s}'"))
}

fn parse_carry_forward(s: &str) -> Result<CarryForwardRecord, String> {
    let (year, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected YEAR=AMOUNT, got '{s}'"))?;
    Ok(CarryForwardRecord {
        financial_year: year.parse::<FinancialYear>().map_err(|e| e.to_string())?,
        unused_amount: amount.trim().parse::<Decimal>().map_err(|e| e.to_string())?,
    })
}

/// One output line of `batch`.
#[derive(Debug, Serialize)]
struct BatchRow<'a> {
    label: &'a str,
    salary_type: &'static str,
    pay_frequency: &'static str,
    gross: Decimal,
    salary_sacrifice: Decimal,
    taxable_income: Decimal,
    payg_withholding: Decimal,
    medicare: Decimal,
    total_tax: Decimal,
    net: Decimal,
    super_guarantee: Decimal,
    total_super: Decimal,
    net_per_period: Decimal,
    converged: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let registry = build_registry(&cli)?;

    match &cli.command {
        Command::Salary(args) => run_salary(&registry, args),
        Command::Batch { file, year } => run_batch(&registry, file, year.as_deref()),
        Command::Caps(args) => run_caps(&registry, args),
        Command::Years => {
            let latest = registry.latest().financial_year;
            for year in registry.financial_years() {
                let marker = if year == latest { " (latest)" } else { "" };
                println!("{year}  {} to {}{marker}", year.start_date(), year.end_date());
            }
            Ok(())
        }
    }
}

fn build_registry(cli: &Cli) -> Result<TaxYearRegistry> {
    let mut registry = TaxYearRegistry::builtin().context("Built-in tax tables are invalid")?;

    if let Some(dir) = &cli.tables {
        let years = TaxTableLoader::load_into(&mut registry, dir)
            .with_context(|| format!("Failed to load tax tables from: {}", dir.display()))?;
        debug!(?years, "extra tax tables loaded");
    }

    if let Some(path) = &cli.brackets {
        let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
        let records = BracketCsvLoader::parse(file)
            .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
        let loaded = BracketCsvLoader::apply(&mut registry, &records)
            .context("Failed to apply bracket overrides")?;
        info!(brackets = loaded, "bracket overrides applied");
    }

    Ok(registry)
}

fn select_config<'a>(
    registry: &'a TaxYearRegistry,
    year: Option<&str>,
) -> &'a TaxYearConfig {
    let selection = match year {
        Some(key) => registry.get_config(key),
        None => registry.get_current_config(Local::now().date_naive()),
    };
    if let Some(warning) = &selection.warning {
        eprintln!("warning: {warning}");
    }
    selection.config
}

fn run_salary(
    registry: &TaxYearRegistry,
    args: &SalaryArgs,
) -> Result<()> {
    let config = select_config(registry, args.year.as_deref());
    let processor = SalaryProcessor::new(config);
    let input = SalaryInput {
        amount: args.amount,
        salary_type: if args.net {
            SalaryType::Net
        } else {
            SalaryType::Gross
        },
        pay_frequency: args.frequency,
        salary_sacrifice: args.sacrifice,
        has_tax_free_threshold: !args.no_tax_free_threshold,
        has_private_health_insurance: !args.no_private_health,
    };

    let breakdown = processor.process(&input);
    print_breakdown(&breakdown);

    if args.advise {
        let advice = processor.recommend_salary_sacrifice(&input);
        println!();
        match advice.reason {
            Some(reason) => println!("Salary sacrifice: none recommended ({reason})"),
            None => println!(
                "Salary sacrifice: {} a year ({} per {} period), saving about {}",
                format_currency(advice.recommended_annual),
                format_currency(advice.recommended_per_period),
                args.frequency.as_str().to_lowercase(),
                format_currency(advice.estimated_tax_saving)
            ),
        }
    }
    Ok(())
}

fn print_breakdown(breakdown: &SalaryBreakdown) {
    let annual = &breakdown.annual;
    let period = &breakdown.per_period;
    println!(
        "{} salary, {} ({})",
        breakdown.salary_type.as_str().to_lowercase(),
        breakdown.financial_year,
        breakdown.pay_frequency.as_str().to_lowercase()
    );
    println!("{:<22}{:>16}{:>16}", "", "Annual", "Per period");
    for (label, a, p) in [
        ("Gross", annual.gross, period.gross),
        ("Salary sacrifice", annual.salary_sacrifice, period.salary_sacrifice),
        ("Taxable income", annual.taxable_income, period.taxable_income),
        ("PAYG withholding", annual.payg_withholding, period.payg_withholding),
        ("Medicare levy", annual.medicare_levy, period.medicare_levy),
        ("Medicare surcharge", annual.medicare_surcharge, period.medicare_surcharge),
        ("Total tax", annual.total_tax, period.total_tax),
        ("Net", annual.net, period.net),
        ("Super guarantee", annual.super_guarantee, period.super_guarantee),
        ("Total super", annual.total_super, period.total_super),
    ] {
        println!("{label:<22}{:>16}{:>16}", format_currency(a), format_currency(p));
    }
    if let Some(iterations) = breakdown.solver_iterations {
        println!("(gross solved in {iterations} iterations)");
    }
    for warning in &breakdown.warnings {
        println!("warning: {warning}");
    }
}

fn run_batch(
    registry: &TaxYearRegistry,
    path: &Path,
    year: Option<&str>,
) -> Result<()> {
    let config = select_config(registry, year);
    let processor = SalaryProcessor::new(config);

    let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let rows = SalaryCsvLoader::load(file)
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
    info!(rows = rows.len(), financial_year = %config.financial_year, "processing salaries");

    let mut writer = csv::Writer::from_writer(io::stdout());
    for row in &rows {
        let breakdown = processor.process(&row.input);
        let annual = &breakdown.annual;
        writer
            .serialize(BatchRow {
                label: row.label.as_deref().unwrap_or(""),
                salary_type: breakdown.salary_type.as_str(),
                pay_frequency: breakdown.pay_frequency.as_str(),
                gross: annual.gross,
                salary_sacrifice: annual.salary_sacrifice,
                taxable_income: annual.taxable_income,
                payg_withholding: annual.payg_withholding,
                medicare: annual.medicare_levy + annual.medicare_surcharge,
                total_tax: annual.total_tax,
                net: annual.net,
                super_guarantee: annual.super_guarantee,
                total_super: annual.total_super,
                net_per_period: breakdown.per_period.net,
                converged: breakdown.solver_converged,
            })
            .context("Failed to write output row")?;
    }
    writer.flush().context("Failed to flush output")?;
    Ok(())
}

fn run_caps(
    registry: &TaxYearRegistry,
    args: &CapsArgs,
) -> Result<()> {
    let config = select_config(registry, args.year.as_deref());
    if args.concessional < Decimal::ZERO || args.non_concessional < Decimal::ZERO {
        return Err(anyhow!("contribution amounts cannot be negative"));
    }

    let result = track_contribution_caps(
        &CapTrackingInput {
            concessional_ytd: args.concessional,
            non_concessional_ytd: args.non_concessional,
            total_super_balance: args.balance,
            carry_forward_records: args.carry_forward.clone(),
        },
        config,
    );

    println!("Contribution caps, {}", result.financial_year);
    print_cap("Concessional", &result.concessional);
    print_cap("Non-concessional", &result.non_concessional);
    if result.carry_forward.eligible && result.carry_forward.available > Decimal::ZERO {
        println!("Carry-forward available: {}", format_currency(result.carry_forward.available));
    }
    for usage in &result.carry_forward_usage {
        println!(
            "  drawn from {}: {}",
            usage.financial_year,
            format_currency(usage.applied)
        );
    }
    println!(
        "Bring-forward: {} year(s), {} available",
        result.bring_forward.years,
        format_currency(result.bring_forward.available_cap)
    );
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    for recommendation in &result.recommendations {
        println!("note: {recommendation}");
    }
    Ok(())
}

fn print_cap(
    name: &str,
    status: &CapStatus,
) {
    println!(
        "{name:<18} used {} of {} ({}), {} remaining",
        format_currency(status.used),
        format_currency(status.total_available),
        format_percentage(status.percentage_used / Decimal::ONE_HUNDRED),
        format_currency(status.remaining)
    );
    if status.exceeded {
        println!(
            "{:<18} excess {} (tax about {})",
            "",
            format_currency(status.excess_amount),
            format_currency(status.excess_tax_estimate)
        );
    }
}
