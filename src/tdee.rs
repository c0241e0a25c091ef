//! TDEE (Total Daily Energy Expenditure) estimation by weight-trend regression.
//!
//! Smooths the weight series with a centered moving average, fits a linear
//! trend to it and converts the trend into an energy surplus or deficit using
//! a fixed energy density. TDEE is the average reported intake minus that
//! surplus.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{DailyRecord, sorted_by_date};
use crate::stats::{
    coefficient_of_variation, linear_regression_slope, mean, moving_average_smooth, round_to,
};

// === Constants ===

/// Energy density of body mass change (kcal per kg).
pub const DEFAULT_ENERGY_DENSITY_KCAL_PER_KG: f64 = 7000.0;

/// Fewer valid days than this yields an `insufficient_data` result.
pub const DEFAULT_MIN_DAYS: usize = 7;

/// Number of valid days at which the coverage part of confidence saturates.
pub const DEFAULT_IDEAL_DAYS: usize = 14;

/// Lowest plausible daily intake (kcal).
pub const DEFAULT_MIN_VALID_KCAL: f64 = 500.0;

/// Highest plausible daily intake (kcal).
pub const DEFAULT_MAX_VALID_KCAL: f64 = 5000.0;

/// Centered moving average window for weight smoothing (days).
pub const DEFAULT_WEIGHT_SMOOTHING_WINDOW: usize = 3;

/// Share of confidence driven by series length.
const COVERAGE_WEIGHT: f64 = 0.6;

/// Share of confidence driven by intake and weight variability.
const VARIABILITY_WEIGHT: f64 = 0.4;

/// Deficits within this band are described as maintenance (kcal/day).
const MAINTENANCE_BAND_KCAL: f64 = 50.0;

// === Data Structures ===

/// Tuning parameters for the regression estimator.
///
/// Override individual fields with struct update syntax:
/// `RegressionConfig { min_days: 10, ..Default::default() }`.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionConfig {
    pub energy_density_kcal_per_kg: f64,
    pub min_days: usize,
    pub ideal_days: usize,
    pub min_valid_kcal: f64,
    pub max_valid_kcal: f64,
    pub weight_smoothing_window: usize,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            energy_density_kcal_per_kg: DEFAULT_ENERGY_DENSITY_KCAL_PER_KG,
            min_days: DEFAULT_MIN_DAYS,
            ideal_days: DEFAULT_IDEAL_DAYS,
            min_valid_kcal: DEFAULT_MIN_VALID_KCAL,
            max_valid_kcal: DEFAULT_MAX_VALID_KCAL,
            weight_smoothing_window: DEFAULT_WEIGHT_SMOOTHING_WINDOW,
        }
    }
}

/// How a regression result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Weight-trend regression over enough valid days.
    Regression,
    /// Too few valid days; numeric fields are neutral.
    InsufficientData,
}

/// Qualitative confidence bucket used for interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Moderate,
    High,
}

impl ConfidenceTier {
    /// Buckets a 0–1 confidence score: below 0.5 is low, below 0.75 moderate.
    pub fn from_score(confidence: f64) -> Self {
        if confidence < 0.5 {
            ConfidenceTier::Low
        } else if confidence < 0.75 {
            ConfidenceTier::Moderate
        } else {
            ConfidenceTier::High
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "low"),
            ConfidenceTier::Moderate => write!(f, "moderate"),
            ConfidenceTier::High => write!(f, "high"),
        }
    }
}

/// Regression TDEE estimate.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionResult {
    /// Estimated TDEE in kcal, rounded. 0 when data is insufficient.
    pub tdee_kcal: f64,
    /// Confidence in [0, 1], rounded to 2 decimals.
    pub confidence: f64,
    /// Bucketed from the unrounded confidence.
    pub confidence_tier: ConfidenceTier,
    pub method: EstimationMethod,
    /// Average reported intake over valid days, rounded.
    pub avg_intake_kcal: f64,
    /// Smoothed weight change from first to last valid day (kg).
    pub total_weight_change_kg: f64,
    /// Trend slope of the smoothed weight (kg/day).
    pub weight_change_rate_kg_per_day: f64,
    /// Calendar days spanned by the valid days, inclusive.
    pub period_days: i64,
    /// Number of days that passed the validity filter.
    pub valid_days: usize,
    /// Reported intake minus TDEE. Negative means a caloric deficit.
    pub deficit_kcal: f64,
    /// Weight change per week if the current trend holds (kg).
    pub projected_weekly_change_kg: f64,
    pub interpretation: String,
}

/// A day that passed the validity filter.
#[derive(Debug, Clone, Copy)]
struct ValidDay {
    date: NaiveDate,
    intake_kcal: f64,
    weight_kg: f64,
}

// === Main Calculation Functions ===

/// Estimates TDEE from reported intake and the trend in body weight.
///
/// Records may be unsorted. Days with intake outside
/// `[min_valid_kcal, max_valid_kcal]` or without a positive weight are dropped.
///
/// # Arguments
/// * `records` - Daily intake/weight records
/// * `config` - Estimator parameters
///
/// # Returns
/// A `RegressionResult`. With fewer than `min_days` valid days the result has
/// `method == InsufficientData`, `tdee_kcal == 0` and `confidence == 0`.
pub fn estimate_regression_tdee(
    records: &[DailyRecord],
    config: &RegressionConfig,
) -> RegressionResult {
    let valid = collect_valid_days(records, config);

    let intakes: Vec<f64> = valid.iter().map(|d| d.intake_kcal).collect();
    let weights: Vec<f64> = valid.iter().map(|d| d.weight_kg).collect();
    let avg_intake = mean(&intakes);
    let period_days = period_days(&valid);

    if valid.len() < config.min_days || valid.is_empty() {
        let mut result = RegressionResult {
            tdee_kcal: 0.0,
            confidence: 0.0,
            confidence_tier: ConfidenceTier::Low,
            method: EstimationMethod::InsufficientData,
            avg_intake_kcal: avg_intake.round(),
            total_weight_change_kg: 0.0,
            weight_change_rate_kg_per_day: 0.0,
            period_days,
            valid_days: valid.len(),
            deficit_kcal: 0.0,
            projected_weekly_change_kg: 0.0,
            interpretation: String::new(),
        };
        result.interpretation = interpret(&result, config.min_days);
        return result;
    }

    let smoothed = moving_average_smooth(&weights, config.weight_smoothing_window);
    let rate = linear_regression_slope(&smoothed);

    // Losing weight (negative rate) means expenditure exceeds intake
    let tdee = avg_intake - rate * config.energy_density_kcal_per_kg;
    let deficit = avg_intake - tdee;

    let total_change = match (smoothed.first(), smoothed.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };

    let confidence = confidence_score(valid.len(), config.ideal_days, &intakes, &weights);

    let mut result = RegressionResult {
        tdee_kcal: tdee.round(),
        confidence: round_to(confidence, 2),
        confidence_tier: ConfidenceTier::from_score(confidence),
        method: EstimationMethod::Regression,
        avg_intake_kcal: avg_intake.round(),
        total_weight_change_kg: round_to(total_change, 2),
        weight_change_rate_kg_per_day: round_to(rate, 3),
        period_days,
        valid_days: valid.len(),
        deficit_kcal: deficit.round(),
        projected_weekly_change_kg: round_to(rate * 7.0, 2),
        interpretation: String::new(),
    };
    result.interpretation = interpret(&result, config.min_days);
    result
}

/// Renders a one-paragraph reading of a regression result.
///
/// Keyed off the deficit sign and the confidence tier; the insufficient-data
/// case names how many valid days exist and how many are needed.
pub fn interpret(result: &RegressionResult, min_days: usize) -> String {
    if result.method == EstimationMethod::InsufficientData {
        return format!(
            "Not enough data yet: {} of {} required days have both a plausible food log and a weigh-in. Keep logging to get an estimate.",
            result.valid_days, min_days
        );
    }

    let balance = if result.deficit_kcal < -MAINTENANCE_BAND_KCAL {
        format!(
            "Average reported intake of {:.0} kcal/day is a deficit of {:.0} kcal/day, projecting {:+.2} kg per week.",
            result.avg_intake_kcal,
            result.deficit_kcal.abs(),
            result.projected_weekly_change_kg
        )
    } else if result.deficit_kcal > MAINTENANCE_BAND_KCAL {
        format!(
            "Average reported intake of {:.0} kcal/day is a surplus of {:.0} kcal/day, projecting {:+.2} kg per week.",
            result.avg_intake_kcal, result.deficit_kcal, result.projected_weekly_change_kg
        )
    } else {
        format!(
            "Average reported intake of {:.0} kcal/day is close to maintenance.",
            result.avg_intake_kcal
        )
    };

    let caveat = match result.confidence_tier {
        ConfidenceTier::High => "Confidence is high.",
        ConfidenceTier::Moderate => {
            "Confidence is moderate; more consistent logging will sharpen the estimate."
        }
        ConfidenceTier::Low => "Confidence is low; treat this estimate as provisional.",
    };

    format!(
        "Estimated TDEE is {:.0} kcal/day. {} {}",
        result.tdee_kcal, balance, caveat
    )
}

// === Helper Functions ===

/// Sorts the records and keeps days with plausible intake and a positive weight.
fn collect_valid_days(records: &[DailyRecord], config: &RegressionConfig) -> Vec<ValidDay> {
    sorted_by_date(records)
        .into_iter()
        .filter_map(|record| {
            let intake_kcal = record.intake_within(config.min_valid_kcal, config.max_valid_kcal)?;
            let weight_kg = record.valid_weight()?;
            Some(ValidDay {
                date: record.date,
                intake_kcal,
                weight_kg,
            })
        })
        .collect()
}

/// Calendar span of the valid days, inclusive. 0 when there are none.
fn period_days(valid: &[ValidDay]) -> i64 {
    match (valid.first(), valid.last()) {
        (Some(first), Some(last)) => (last.date - first.date).num_days() + 1,
        _ => 0,
    }
}

/// Blends series length against intake and weight variability.
///
/// `0.6 × min(1, n / ideal) + 0.4 × max(0, 1 − mean(cv_intake, cv_weight))`
fn confidence_score(valid_days: usize, ideal_days: usize, intakes: &[f64], weights: &[f64]) -> f64 {
    let coverage = if ideal_days == 0 {
        1.0
    } else {
        (valid_days as f64 / ideal_days as f64).min(1.0)
    };

    let variability = (coefficient_of_variation(intakes) + coefficient_of_variation(weights)) / 2.0;
    let consistency = (1.0 - variability).max(0.0);

    (COVERAGE_WEIGHT * coverage + VARIABILITY_WEIGHT * consistency).clamp(0.0, 1.0)
}

// === Unit Tests ===
