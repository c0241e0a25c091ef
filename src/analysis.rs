//! Analysis orchestration for patient logs.
//!
//! Runs both estimators for every patient in a workbook and collects the
//! results for reporting.

use chrono::NaiveDate;
use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::balance::{LinearConfig, LinearResult, estimate_linearized_energy};
use crate::domain::{PatientLog, PatientProfile, PatientWorkbook};
use crate::tdee::{RegressionConfig, RegressionResult, estimate_regression_tdee};

/// Analysis results for a single patient.
#[derive(Debug, Clone, Serialize)]
pub struct PatientAnalysis {
    pub patient: String,
    pub days_logged: usize,
    pub food_logs: usize,
    pub weigh_ins: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub profile: Option<PatientProfile>,
    pub regression: RegressionResult,
    /// Only computed when a profile is known.
    pub balance: Option<LinearResult>,
}

/// Estimator settings shared by every patient in a run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSettings {
    pub regression: RegressionConfig,
    pub linear: LinearConfig,
    /// Used for patients without an entry in the profiles sheet.
    pub default_profile: Option<PatientProfile>,
}

/// Runs both estimators for a single patient.
pub fn analyze_patient(
    log: &PatientLog,
    profile: Option<&PatientProfile>,
    settings: &AnalysisSettings,
) -> PatientAnalysis {
    let regression = estimate_regression_tdee(&log.records, &settings.regression);

    let balance = profile.map(|p| estimate_linearized_energy(p, &log.records, &settings.linear));
    if balance.is_none() {
        info!("{}: no profile available, skipping balance model", log.patient);
    }

    let (first_date, last_date) = log.date_range().unzip();

    PatientAnalysis {
        patient: log.patient.clone(),
        days_logged: log.records.len(),
        food_logs: log.food_log_count(),
        weigh_ins: log.weigh_in_count(),
        first_date,
        last_date,
        profile: profile.cloned(),
        regression,
        balance,
    }
}

/// Analyzes every patient in the workbook.
///
/// Patients are processed in parallel via rayon; results are sorted by
/// patient id. A patient's profile comes from the workbook's profiles sheet,
/// falling back to `settings.default_profile`.
pub fn analyze_patients(
    workbook: &PatientWorkbook,
    settings: &AnalysisSettings,
) -> Vec<PatientAnalysis> {
    let mut analyses: Vec<PatientAnalysis> = workbook
        .logs
        .par_iter()
        .map(|log| {
            let profile = workbook
                .profile_for(&log.patient)
                .or(settings.default_profile.as_ref());
            analyze_patient(log, profile, settings)
        })
        .collect();

    analyses.sort_by(|a, b| a.patient.cmp(&b.patient));
    analyses
}
