mod analysis;
mod balance;
mod domain;
mod error;
mod excel;
mod formulas;
mod stats;
mod tdee;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::analysis::{AnalysisSettings, PatientAnalysis, analyze_patients};
use crate::balance::{LinearConfig, LinearResult, WindowMode};
use crate::domain::{ActivityLevel, PatientProfile, PatientWorkbook, Sex};
use crate::excel::load_workbook;
use crate::tdee::{EstimationMethod, RegressionConfig};

/// Energy expenditure and reporting-adherence estimates from patient food and weight logs.
#[derive(Parser, Debug)]
#[command(name = "energymodel")]
#[command(about = "Estimate TDEE, reporting bias and adherence from food and weight logs")]
#[command(version)]
struct Args {
    /// Path to the Excel file with one worksheet per patient.
    /// Can also be set via ENERGYMODEL_FILE environment variable.
    #[arg(value_name = "FILE", env = "ENERGYMODEL_FILE")]
    file: PathBuf,

    /// Only analyze this patient (worksheet name, case-insensitive).
    #[arg(long)]
    patient: Option<String>,

    /// Sex for patients missing from the profiles sheet (male/female).
    #[arg(long, env = "ENERGYMODEL_SEX")]
    sex: Option<Sex>,

    /// Age in years for patients missing from the profiles sheet.
    #[arg(long, env = "ENERGYMODEL_AGE")]
    age: Option<f64>,

    /// Height in cm for patients missing from the profiles sheet.
    #[arg(long, env = "ENERGYMODEL_HEIGHT")]
    height: Option<f64>,

    /// Activity level (sedentary, light, moderate, active, extra) or a PAL multiplier.
    #[arg(long, default_value = "sedentary")]
    activity: ActivityLevel,

    /// Baseline weight in kg; defaults to the earliest weigh-in.
    #[arg(long)]
    baseline_weight: Option<f64>,

    /// Minimum valid days for a regression estimate.
    #[arg(long, default_value_t = tdee::DEFAULT_MIN_DAYS)]
    min_days: usize,

    /// Balance model window length in days.
    #[arg(long, default_value_t = balance::DEFAULT_WINDOW_DAYS)]
    window_days: usize,

    /// Use overlapping rolling windows instead of consecutive ones.
    #[arg(long)]
    rolling: bool,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    let workbook = load_workbook(&args.file)
        .with_context(|| format!("Failed to load patient logs from {}", args.file.display()))?;
    let workbook = select_patient(workbook, args.patient.as_deref())?;

    log::info!(
        "Loaded {} patients ({} records, {} profiles)",
        workbook.logs.len(),
        workbook.total_count(),
        workbook.profiles.len()
    );

    let settings = build_settings(&args);
    let analyses = analyze_patients(&workbook, &settings);

    if args.json {
        let json = serde_json::to_string_pretty(&analyses).context("Failed to serialize results")?;
        println!("{}", json);
        return Ok(());
    }

    for analysis in &analyses {
        print_analysis(analysis);
    }

    Ok(())
}

/// Builds estimator settings from command line arguments.
fn build_settings(args: &Args) -> AnalysisSettings {
    let default_profile = match (args.sex, args.age, args.height) {
        (Some(sex), Some(age), Some(height)) => {
            Some(PatientProfile::new(sex, age, height, args.activity))
        }
        (None, None, None) => None,
        _ => {
            log::warn!("Ignoring incomplete default profile: --sex, --age and --height are all required");
            None
        }
    };

    AnalysisSettings {
        regression: RegressionConfig {
            min_days: args.min_days,
            ..Default::default()
        },
        linear: LinearConfig {
            baseline_weight_kg: args.baseline_weight,
            window_days: args.window_days,
            window_mode: if args.rolling {
                WindowMode::Rolling
            } else {
                WindowMode::Tumbling
            },
            ..Default::default()
        },
        default_profile,
    }
}

/// Narrows the workbook to a single patient if one was requested.
fn select_patient(mut workbook: PatientWorkbook, patient: Option<&str>) -> Result<PatientWorkbook> {
    let Some(patient) = patient else {
        return Ok(workbook);
    };

    workbook
        .logs
        .retain(|log| log.patient.eq_ignore_ascii_case(patient));

    if workbook.logs.is_empty() {
        bail!("No worksheet found for patient '{}'", patient);
    }
    Ok(workbook)
}

/// Prints the text report for one patient.
fn print_analysis(analysis: &PatientAnalysis) {
    println!();
    println!("=== {} ===", analysis.patient);
    println!();

    print!(
        "Days logged: {} ({} food logs, {} weigh-ins)",
        analysis.days_logged, analysis.food_logs, analysis.weigh_ins
    );
    if let (Some(first), Some(last)) = (analysis.first_date, analysis.last_date) {
        print!("  {} to {}", first, last);
    }
    println!();

    let regression = &analysis.regression;
    println!();
    println!("Regression estimate");
    if regression.method == EstimationMethod::Regression {
        println!(
            "  TDEE:          {:.0} kcal/day (confidence {:.2}, {})",
            regression.tdee_kcal,
            regression.confidence, regression.confidence_tier
        );
        println!("  Avg intake:    {:.0} kcal/day", regression.avg_intake_kcal);
        println!(
            "  Weight trend:  {:+.3} kg/day ({:+.2} kg/week), {:+.2} kg over {} days",
            regression.weight_change_rate_kg_per_day,
            regression.projected_weekly_change_kg,
            regression.total_weight_change_kg,
            regression.period_days
        );
    }
    println!("  {}", regression.interpretation);

    match (&analysis.balance, &analysis.profile) {
        (Some(balance), Some(profile)) => print_balance(balance, profile),
        _ => {
            println!();
            println!("Balance model: no profile (add a 'profiles' sheet or pass --sex/--age/--height)");
        }
    }
}

/// Prints the balance model baseline and window table.
fn print_balance(balance: &LinearResult, profile: &PatientProfile) {
    println!();
    let Some(baseline) = &balance.overall else {
        println!("Balance model: no weigh-ins, cannot establish a baseline");
        return;
    };

    println!(
        "Balance model ({}, {:.0} y, {:.0} cm)",
        profile.sex, profile.age_years, profile.height_cm
    );
    println!(
        "  Baseline:      {:.1} kg, BMR {:.0} kcal, PAL {:.2}, EE {:.0} kcal/day",
        baseline.weight_kg, baseline.bmr_kcal, baseline.pal, baseline.expenditure_kcal
    );

    if !balance.has_sufficient_data() {
        println!("  Insufficient data: results below are not reliable yet");
    }

    println!();
    println!(
        "  {:10}  {:>4}  {:>9}  {:>9}  {:>7}  {:>10}  Flags",
        "Start", "Days", "Bias", "Adherence", "EE", "Confidence"
    );
    for window in &balance.windows {
        println!(
            "  {:10}  {:>4}  {:>9}  {:>9}  {:>7}  {:>10.2}  {}",
            window.start_date,
            window.days,
            format_optional(window.median_bias_kcal, 0),
            format_optional(window.median_adherence, 2),
            format_optional(window.mean_modeled_expenditure_kcal, 0),
            window.confidence,
            if window.flags.any() {
                window.flags.labels().join(", ")
            } else {
                "-".to_string()
            }
        );
    }
}

fn format_optional(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_else(|| "-".to_string())
}
