//! Linearized energy-balance model for reporting bias and adherence.
//!
//! Baseline expenditure comes from Mifflin-St Jeor × PAL at the starting
//! weight, assuming the patient starts at energy balance. For each day the
//! model predicts the intake that would explain the observed weight:
//!
//! ```text
//! EE_model(t) = EE₀ + ε × (BW_s(t) − BW₀)
//! EI_model(t) = EE_model(t) + ρ × dBW_s/dt
//! ```
//!
//! where `BW_s` is an exponential moving average of the scale weight. Reported
//! intake is compared against `EI_model` per day and rolled up over windows
//! with a confidence score and data-quality flags.

use std::ops::Range;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::domain::{DailyRecord, PatientProfile, fill_calendar_gaps, sorted_by_date};
use crate::formulas::{calculate_expenditure, profile_bmr};
use crate::stats::{exponential_moving_average, mean, median, round_to, slope_of_points, stddev};
use crate::tdee::{
    DEFAULT_ENERGY_DENSITY_KCAL_PER_KG, DEFAULT_MAX_VALID_KCAL, DEFAULT_MIN_VALID_KCAL,
};

// === Constants ===

/// EMA smoothing factor for scale weight (0.25 = 25% weight on new values).
pub const DEFAULT_EMA_ALPHA: f64 = 0.25;

/// Trailing window of smoothed weights used for the local slope (days).
pub const DEFAULT_SLOPE_WINDOW_DAYS: usize = 7;

/// Expenditure change per kg of weight change (kcal/kg/day).
pub const DEFAULT_ADAPTATION_KCAL_PER_KG: f64 = 22.0;

/// Rollup window length (days).
pub const DEFAULT_WINDOW_DAYS: usize = 7;

/// Median bias below this flags probable under-reporting (kcal/day).
pub const DEFAULT_UNDER_REPORTING_THRESHOLD_KCAL: f64 = -300.0;

/// Median bias above this flags probable over-reporting (kcal/day).
pub const DEFAULT_OVER_REPORTING_THRESHOLD_KCAL: f64 = 300.0;

/// Minimum scale-vs-trend scatter that counts as fluid noise (kg).
pub const DEFAULT_FLUID_NOISE_KG: f64 = 0.5;

/// Fewer food logs than this in a window raises `too_few_food_logs`.
pub const DEFAULT_MIN_FOOD_LOGS: usize = 4;

/// Fewer weigh-ins than this in a window raises `too_few_weigh_ins`.
pub const DEFAULT_MIN_WEIGH_INS: usize = 3;

/// Confidence ceiling for windows with a "too few" flag.
const LOW_DATA_CONFIDENCE_CAP: f64 = 0.3;

/// Below these counts the whole result should be treated as unusable.
const MIN_DISTINCT_WEIGHED_DAYS: usize = 2;
const MIN_SERIES_DAYS: usize = 7;

// === Data Structures ===

/// How the day series is cut into rollup windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Consecutive non-overlapping windows; the last one may be shorter.
    #[default]
    Tumbling,
    /// One window per start day, each of full length.
    Rolling,
}

/// Tuning parameters for the linearized balance estimator.
#[derive(Debug, Clone, Serialize)]
pub struct LinearConfig {
    pub ema_alpha: f64,
    pub slope_window_days: usize,
    /// ε: expenditure adaptation per kg away from baseline (kcal/kg/day).
    pub adaptation_kcal_per_kg: f64,
    /// ρ: energy density of weight change (kcal/kg).
    pub energy_density_kcal_per_kg: f64,
    /// Overrides the earliest measured weight as BW₀.
    pub baseline_weight_kg: Option<f64>,
    pub window_days: usize,
    pub window_mode: WindowMode,
    pub min_valid_kcal: f64,
    pub max_valid_kcal: f64,
    pub under_reporting_threshold_kcal: f64,
    pub over_reporting_threshold_kcal: f64,
    pub fluid_noise_kg: f64,
    pub min_food_logs: usize,
    pub min_weigh_ins: usize,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            ema_alpha: DEFAULT_EMA_ALPHA,
            slope_window_days: DEFAULT_SLOPE_WINDOW_DAYS,
            adaptation_kcal_per_kg: DEFAULT_ADAPTATION_KCAL_PER_KG,
            energy_density_kcal_per_kg: DEFAULT_ENERGY_DENSITY_KCAL_PER_KG,
            baseline_weight_kg: None,
            window_days: DEFAULT_WINDOW_DAYS,
            window_mode: WindowMode::default(),
            min_valid_kcal: DEFAULT_MIN_VALID_KCAL,
            max_valid_kcal: DEFAULT_MAX_VALID_KCAL,
            under_reporting_threshold_kcal: DEFAULT_UNDER_REPORTING_THRESHOLD_KCAL,
            over_reporting_threshold_kcal: DEFAULT_OVER_REPORTING_THRESHOLD_KCAL,
            fluid_noise_kg: DEFAULT_FLUID_NOISE_KG,
            min_food_logs: DEFAULT_MIN_FOOD_LOGS,
            min_weigh_ins: DEFAULT_MIN_WEIGH_INS,
        }
    }
}

/// Baseline values and fixed model parameters.
#[derive(Debug, Clone, Serialize)]
pub struct Baseline {
    /// BW₀ in kg.
    pub weight_kg: f64,
    /// BMR₀ in kcal/day.
    pub bmr_kcal: f64,
    /// PAL₀.
    pub pal: f64,
    /// EE₀ = BMR₀ × PAL₀, also used as EI₀.
    pub expenditure_kcal: f64,
    /// ε in kcal/kg/day.
    pub adaptation_kcal_per_kg: f64,
    /// ρ in kcal/kg.
    pub energy_density_kcal_per_kg: f64,
}

/// Model output for a single day. Derived fields are `None` until the
/// smoother has enough history.
#[derive(Debug, Clone, Serialize)]
pub struct DayEstimate {
    pub date: NaiveDate,
    /// Scale weight, if a valid weigh-in was logged.
    pub weight_kg: Option<f64>,
    /// Reported intake, if it was logged and plausible.
    pub reported_intake_kcal: Option<f64>,
    pub smoothed_weight_kg: Option<f64>,
    pub weight_slope_kg_per_day: Option<f64>,
    pub modeled_intake_kcal: Option<f64>,
    pub modeled_expenditure_kcal: Option<f64>,
    /// Reported minus modeled intake. Negative suggests under-reporting.
    pub bias_kcal: Option<f64>,
    /// Reported divided by modeled intake.
    pub adherence: Option<f64>,
}

/// Data-quality flags for a window. Independent of each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowFlags {
    pub probable_under_reporting: bool,
    pub probable_over_reporting: bool,
    pub probable_fluid_retention: bool,
    pub too_few_food_logs: bool,
    pub too_few_weigh_ins: bool,
}

impl WindowFlags {
    /// Returns true if any flag is raised.
    pub fn any(&self) -> bool {
        !self.labels().is_empty()
    }

    /// Human-readable labels of the raised flags.
    pub fn labels(&self) -> Vec<&'static str> {
        [
            (self.probable_under_reporting, "probable under-reporting"),
            (self.probable_over_reporting, "probable over-reporting"),
            (self.probable_fluid_retention, "probable fluid-retention noise"),
            (self.too_few_food_logs, "too few food logs"),
            (self.too_few_weigh_ins, "too few weigh-ins"),
        ]
        .into_iter()
        .filter_map(|(raised, label)| raised.then_some(label))
        .collect()
    }
}

/// Rollup of day estimates over a window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Calendar days in the window.
    pub days: usize,
    pub food_logs: usize,
    pub weigh_ins: usize,
    /// Calendar days with both a weigh-in and a food log.
    pub complete_days: usize,
    pub mean_bias_kcal: Option<f64>,
    pub median_bias_kcal: Option<f64>,
    pub mean_adherence: Option<f64>,
    pub median_adherence: Option<f64>,
    pub mean_modeled_expenditure_kcal: Option<f64>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub flags: WindowFlags,
}

/// Linearized balance estimate.
#[derive(Debug, Clone, Serialize)]
pub struct LinearResult {
    pub days: Vec<DayEstimate>,
    pub windows: Vec<WindowSummary>,
    /// `None` when no baseline weight is known.
    pub overall: Option<Baseline>,
}

impl LinearResult {
    /// True when the series spans at least 7 calendar days with weigh-ins on
    /// at least 2 distinct dates.
    ///
    /// The estimator computes what it can regardless; callers decide whether
    /// to present the result.
    pub fn has_sufficient_data(&self) -> bool {
        let weighed = count_dates(self.days.iter().filter(|d| d.weight_kg.is_some()));
        weighed >= MIN_DISTINCT_WEIGHED_DAYS && count_dates(self.days.iter()) >= MIN_SERIES_DAYS
    }
}

// === Main Calculation Functions ===

/// Models daily intake and expenditure and compares them to reported intake.
///
/// # Arguments
/// * `profile` - Patient's sex, age, height and PAL₀
/// * `series` - Daily records, in any order and possibly with date gaps
/// * `config` - Model parameters and flag thresholds
///
/// # Returns
/// One estimate per calendar day from the first to the last logged date
/// (plus any same-day duplicates), windowed rollups and the baseline. Never
/// fails; sparse input yields `None` derived fields and low-confidence windows.
pub fn estimate_linearized_energy(
    profile: &PatientProfile,
    series: &[DailyRecord],
    config: &LinearConfig,
) -> LinearResult {
    let sorted = fill_calendar_gaps(&sorted_by_date(series));
    let dates: Vec<NaiveDate> = sorted.iter().map(|r| r.date).collect();

    let weights: Vec<Option<f64>> = sorted.iter().map(|r| r.valid_weight()).collect();
    let intakes: Vec<Option<f64>> = sorted
        .iter()
        .map(|r| r.intake_within(config.min_valid_kcal, config.max_valid_kcal))
        .collect();

    let smoothed = exponential_moving_average(&weights, config.ema_alpha);
    let slopes = trailing_slopes(&dates, &smoothed, config.slope_window_days);
    let overall = baseline(profile, &weights, config);

    let days: Vec<DayEstimate> = sorted
        .iter()
        .enumerate()
        .map(|(i, record)| {
            model_day(
                record.date,
                weights[i],
                intakes[i],
                smoothed[i],
                slopes[i],
                overall.as_ref(),
            )
        })
        .collect();

    let windows = window_ranges(&dates, config.window_days, config.window_mode)
        .into_iter()
        .map(|range| summarize_window(&days[range], config))
        .collect();

    LinearResult {
        days,
        windows,
        overall,
    }
}

// === Helper Functions ===

/// Computes BW₀, BMR₀ and EE₀. `None` if no baseline weight is available.
fn baseline(
    profile: &PatientProfile,
    weights: &[Option<f64>],
    config: &LinearConfig,
) -> Option<Baseline> {
    let weight_kg = config
        .baseline_weight_kg
        .filter(|w| w.is_finite() && *w > 0.0)
        .or_else(|| weights.iter().flatten().next().copied())?;

    Some(Baseline {
        weight_kg,
        bmr_kcal: profile_bmr(profile, weight_kg),
        pal: profile.pal(),
        expenditure_kcal: calculate_expenditure(profile, weight_kg),
        adaptation_kcal_per_kg: config.adaptation_kcal_per_kg,
        energy_density_kcal_per_kg: config.energy_density_kcal_per_kg,
    })
}

/// OLS slope (kg/day) of smoothed weight against date over the trailing
/// `window_days` calendar days ending at each entry.
///
/// `None` until smoothed values on at least two distinct dates fall inside
/// the window.
fn trailing_slopes(
    dates: &[NaiveDate],
    smoothed: &[Option<f64>],
    window_days: usize,
) -> Vec<Option<f64>> {
    let span = window_days.max(2) as i64;
    let Some(&origin) = dates.first() else {
        return Vec::new();
    };

    (0..dates.len())
        .map(|i| {
            let end = dates[i];
            let points: Vec<(f64, f64)> = (0..=i)
                .rev()
                .take_while(|&j| (end - dates[j]).num_days() < span)
                .filter_map(|j| {
                    smoothed[j].map(|kg| ((dates[j] - origin).num_days() as f64, kg))
                })
                .collect();

            // Points run newest to oldest
            let newest = points.first().map(|(x, _)| *x);
            let oldest = points.last().map(|(x, _)| *x);
            if newest == oldest {
                None
            } else {
                Some(slope_of_points(&points))
            }
        })
        .collect()
}

/// Applies the linearized model to a single day.
fn model_day(
    date: NaiveDate,
    weight_kg: Option<f64>,
    reported_intake_kcal: Option<f64>,
    smoothed_weight_kg: Option<f64>,
    weight_slope_kg_per_day: Option<f64>,
    baseline: Option<&Baseline>,
) -> DayEstimate {
    let modeled_expenditure_kcal = baseline.zip(smoothed_weight_kg).map(|(b, bw)| {
        b.expenditure_kcal + b.adaptation_kcal_per_kg * (bw - b.weight_kg)
    });

    // EI₀ = EE₀, so modeled intake is modeled expenditure plus the storage term
    let modeled_intake_kcal = baseline
        .zip(modeled_expenditure_kcal)
        .zip(weight_slope_kg_per_day)
        .map(|((b, ee), slope)| ee + b.energy_density_kcal_per_kg * slope);

    let bias_kcal = reported_intake_kcal
        .zip(modeled_intake_kcal)
        .map(|(reported, modeled)| reported - modeled);

    let adherence = reported_intake_kcal
        .zip(modeled_intake_kcal.filter(|modeled| *modeled > 0.0))
        .map(|(reported, modeled)| reported / modeled);

    DayEstimate {
        date,
        weight_kg,
        reported_intake_kcal,
        smoothed_weight_kg,
        weight_slope_kg_per_day,
        modeled_intake_kcal,
        modeled_expenditure_kcal,
        bias_kcal,
        adherence,
    }
}

/// Index ranges of the rollup windows over date-sorted entries.
///
/// Windows are cut by calendar span: each covers `window_days` dates starting
/// at an offset from the first date.
fn window_ranges(dates: &[NaiveDate], window_days: usize, mode: WindowMode) -> Vec<Range<usize>> {
    let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
        return Vec::new();
    };
    let window = window_days.max(1) as i64;
    let span = (last - first).num_days() + 1;

    let offsets: Vec<i64> = match mode {
        WindowMode::Tumbling => (0..span).step_by(window as usize).collect(),
        WindowMode::Rolling if span <= window => vec![0],
        WindowMode::Rolling => (0..=span - window).collect(),
    };

    offsets
        .into_iter()
        .map(|offset| {
            let start_date = first + Duration::days(offset);
            let end_date = start_date + Duration::days(window - 1);
            let start = dates.partition_point(|d| *d < start_date);
            let end = dates.partition_point(|d| *d <= end_date);
            start..end
        })
        .filter(|range| !range.is_empty())
        .collect()
}

/// Number of distinct dates among date-sorted entries.
fn count_dates<'a>(days: impl Iterator<Item = &'a DayEstimate>) -> usize {
    let mut dates: Vec<NaiveDate> = days.map(|d| d.date).collect();
    dates.dedup();
    dates.len()
}

/// Rolls up a non-empty slice of day estimates.
fn summarize_window(days: &[DayEstimate], config: &LinearConfig) -> WindowSummary {
    let food_logs = days.iter().filter(|d| d.reported_intake_kcal.is_some()).count();
    let weigh_ins = days.iter().filter(|d| d.weight_kg.is_some()).count();
    let complete = days
        .iter()
        .filter(|d| d.reported_intake_kcal.is_some() && d.weight_kg.is_some());
    let complete_days = count_dates(complete);
    let calendar_days = count_dates(days.iter());

    let biases: Vec<f64> = days.iter().filter_map(|d| d.bias_kcal).collect();
    let adherences: Vec<f64> = days.iter().filter_map(|d| d.adherence).collect();
    let expenditures: Vec<f64> = days.iter().filter_map(|d| d.modeled_expenditure_kcal).collect();

    let median_bias_kcal = median(&biases);

    let flags = WindowFlags {
        probable_under_reporting: median_bias_kcal
            .is_some_and(|b| b < config.under_reporting_threshold_kcal),
        probable_over_reporting: median_bias_kcal
            .is_some_and(|b| b > config.over_reporting_threshold_kcal),
        probable_fluid_retention: has_fluid_noise(days, config.fluid_noise_kg),
        too_few_food_logs: food_logs < config.min_food_logs,
        too_few_weigh_ins: weigh_ins < config.min_weigh_ins,
    };

    let confidence = window_confidence(calendar_days, complete_days, &flags, config);

    WindowSummary {
        start_date: days.first().map(|d| d.date).unwrap_or_default(),
        end_date: days.last().map(|d| d.date).unwrap_or_default(),
        days: calendar_days,
        food_logs,
        weigh_ins,
        complete_days,
        mean_bias_kcal: optional_mean(&biases),
        median_bias_kcal,
        mean_adherence: optional_mean(&adherences),
        median_adherence: median(&adherences),
        mean_modeled_expenditure_kcal: optional_mean(&expenditures),
        confidence,
        flags,
    }
}

/// Coverage of complete days times log volume, capped when data is thin.
fn window_confidence(
    days: usize,
    complete_days: usize,
    flags: &WindowFlags,
    config: &LinearConfig,
) -> f64 {
    if days == 0 {
        return 0.0;
    }

    let coverage = complete_days as f64 / days as f64;
    let required = config.min_food_logs.max(config.min_weigh_ins).max(1);
    let volume = (complete_days as f64 / required as f64).min(1.0);

    let mut confidence = coverage * volume;
    if flags.too_few_food_logs || flags.too_few_weigh_ins {
        confidence = confidence.min(LOW_DATA_CONFIDENCE_CAP);
    }
    round_to(confidence.clamp(0.0, 1.0), 2)
}

/// True when scale readings scatter around the smoothed trend by more than
/// both the noise floor and the trend's own movement across the window.
fn has_fluid_noise(days: &[DayEstimate], fluid_noise_kg: f64) -> bool {
    let residuals: Vec<f64> = days
        .iter()
        .filter_map(|d| d.weight_kg.zip(d.smoothed_weight_kg))
        .map(|(raw, smooth)| raw - smooth)
        .collect();
    if residuals.len() < 2 {
        return false;
    }

    let mut trend = days.iter().filter_map(|d| d.smoothed_weight_kg);
    let first = trend.next();
    let trend_change = match (first, trend.last()) {
        (Some(first), Some(last)) => (last - first).abs(),
        _ => 0.0,
    };

    stddev(&residuals) > fluid_noise_kg.max(trend_change)
}

fn optional_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(mean(values))
    }
}

// === Unit Tests ===
