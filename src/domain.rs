//! Domain types for patient log representation.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ParseError;

/// One calendar day of logged data.
///
/// Missing values are `None`, never zero: a day without a food log contributes
/// nothing to intake averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub reported_intake_kcal: Option<f64>,
    pub weight_kg: Option<f64>,
}

impl DailyRecord {
    /// Creates a new daily record.
    pub fn new(date: NaiveDate, reported_intake_kcal: Option<f64>, weight_kg: Option<f64>) -> Self {
        Self {
            date,
            reported_intake_kcal,
            weight_kg,
        }
    }

    /// Returns the weight if it is a usable (positive, finite) measurement.
    pub fn valid_weight(&self) -> Option<f64> {
        self.weight_kg.filter(|w| w.is_finite() && *w > 0.0)
    }

    /// Returns the reported intake if it lies within `[min_kcal, max_kcal]`.
    pub fn intake_within(&self, min_kcal: f64, max_kcal: f64) -> Option<f64> {
        self.reported_intake_kcal
            .filter(|kcal| kcal.is_finite() && *kcal >= min_kcal && *kcal <= max_kcal)
    }
}

/// Returns a copy of the records sorted ascending by date.
///
/// The sort is stable, so duplicate dates keep their input order.
pub fn sorted_by_date(records: &[DailyRecord]) -> Vec<DailyRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.date);
    sorted
}

/// Expands date-sorted records onto a daily grid from the first to the last date.
///
/// Calendar days without a row become empty records. Rows sharing a date are
/// kept as they are.
pub fn fill_calendar_gaps(sorted: &[DailyRecord]) -> Vec<DailyRecord> {
    let mut filled = Vec::with_capacity(sorted.len());
    let mut next_date: Option<NaiveDate> = None;

    for record in sorted {
        if let Some(mut current) = next_date {
            while current < record.date {
                filled.push(DailyRecord::new(current, None, None));
                current = current + Duration::days(1);
            }
        }
        filled.push(record.clone());
        next_date = Some(record.date + Duration::days(1));
    }
    filled
}

/// Biological sex, as used by the Mifflin-St Jeor equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            _ => Err(ParseError::UnknownSex {
                row: 0,
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sex::Male => write!(f, "male"),
            Sex::Female => write!(f, "female"),
        }
    }
}

/// Named physical activity level presets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtraActive,
    /// An explicit PAL multiplier.
    Custom(f64),
}

impl ActivityLevel {
    /// Returns the PAL multiplier for this level.
    pub fn pal(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::LightlyActive => 1.375,
            ActivityLevel::ModeratelyActive => 1.55,
            ActivityLevel::VeryActive => 1.725,
            ActivityLevel::ExtraActive => 1.9,
            ActivityLevel::Custom(pal) => *pal,
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" | "lightly_active" => Ok(ActivityLevel::LightlyActive),
            "moderate" | "moderately_active" => Ok(ActivityLevel::ModeratelyActive),
            "active" | "very_active" => Ok(ActivityLevel::VeryActive),
            "extra" | "extra_active" | "extremely_active" => Ok(ActivityLevel::ExtraActive),
            other => match other.parse::<f64>() {
                Ok(pal) if pal.is_finite() && pal > 0.0 => Ok(ActivityLevel::Custom(pal)),
                _ => Err(ParseError::UnknownActivityLevel {
                    row: 0,
                    value: s.to_string(),
                }),
            },
        }
    }
}

/// Anthropometric profile of a patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientProfile {
    pub sex: Sex,
    pub age_years: f64,
    pub height_cm: f64,
    /// Baseline physical activity level (PAL₀), a multiplier on BMR.
    pub baseline_activity_factor: f64,
}

impl PatientProfile {
    /// Creates a new profile.
    pub fn new(sex: Sex, age_years: f64, height_cm: f64, activity: ActivityLevel) -> Self {
        Self {
            sex,
            age_years,
            height_cm,
            baseline_activity_factor: activity.pal(),
        }
    }

    /// PAL₀ floored at 1.0; nobody burns less than their BMR.
    pub fn pal(&self) -> f64 {
        if self.baseline_activity_factor.is_finite() {
            self.baseline_activity_factor.max(1.0)
        } else {
            1.0
        }
    }
}

/// Daily records for a single patient.
#[derive(Debug, Clone)]
pub struct PatientLog {
    pub patient: String,
    pub records: Vec<DailyRecord>,
}

impl PatientLog {
    /// Creates a log, sorting the records by date.
    pub fn new(patient: impl Into<String>, records: Vec<DailyRecord>) -> Self {
        Self {
            patient: patient.into(),
            records: sorted_by_date(&records),
        }
    }

    /// Returns the number of days with a food log.
    pub fn food_log_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.reported_intake_kcal.is_some())
            .count()
    }

    /// Returns the number of days with a weigh-in.
    pub fn weigh_in_count(&self) -> usize {
        self.records.iter().filter(|r| r.valid_weight().is_some()).count()
    }

    /// Returns the first and last logged dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }
}

/// Everything loaded from a workbook: per-patient logs and known profiles.
#[derive(Debug, Clone, Default)]
pub struct PatientWorkbook {
    pub logs: Vec<PatientLog>,
    pub profiles: HashMap<String, PatientProfile>,
}

impl PatientWorkbook {
    /// Returns the profile registered for a patient (case-insensitive).
    pub fn profile_for(&self, patient: &str) -> Option<&PatientProfile> {
        self.profiles
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(patient))
            .map(|(_, profile)| profile)
    }

    /// Returns the total number of records across all patients.
    pub fn total_count(&self) -> usize {
        self.logs.iter().map(|log| log.records.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_sex_from_str() {
        assert_eq!(Sex::from_str("male").unwrap(), Sex::Male);
        assert_eq!(Sex::from_str("F").unwrap(), Sex::Female);
        assert_eq!(Sex::from_str("  Female ").unwrap(), Sex::Female);
        assert!(Sex::from_str("other").is_err());
        assert!(Sex::from_str("").is_err());
    }

    #[test]
    fn test_activity_level_names() {
        assert_eq!(
            ActivityLevel::from_str("sedentary").unwrap(),
            ActivityLevel::Sedentary
        );
        assert_eq!(
            ActivityLevel::from_str("Moderately Active").unwrap(),
            ActivityLevel::ModeratelyActive
        );
        assert_eq!(
            ActivityLevel::from_str("very-active").unwrap(),
            ActivityLevel::VeryActive
        );
        assert_eq!(ActivityLevel::from_str("1.55").unwrap().pal(), 1.55);
    }

    #[test]
    fn test_activity_level_invalid() {
        assert!(ActivityLevel::from_str("couch").is_err());
        assert!(ActivityLevel::from_str("-1.2").is_err());
    }

    #[test]
    fn test_profile_pal_floor() {
        let profile = PatientProfile::new(Sex::Male, 40.0, 180.0, ActivityLevel::Custom(0.8));
        assert_eq!(profile.pal(), 1.0);

        let profile = PatientProfile::new(Sex::Male, 40.0, 180.0, ActivityLevel::ExtraActive);
        assert_eq!(profile.pal(), 1.9);
    }

    #[test]
    fn test_record_validity() {
        let record = DailyRecord::new(date(2024, 1, 1), Some(4000.0), Some(-1.0));
        assert!(record.valid_weight().is_none());
        assert!(record.intake_within(500.0, 5000.0).is_some());
        assert!(record.intake_within(500.0, 3000.0).is_none());

        let record = DailyRecord::new(date(2024, 1, 1), None, Some(80.0));
        assert_eq!(record.valid_weight(), Some(80.0));
        assert!(record.intake_within(500.0, 5000.0).is_none());
    }

    #[test]
    fn test_patient_log_sorts_records() {
        let log = PatientLog::new(
            "alice",
            vec![
                DailyRecord::new(date(2024, 1, 3), Some(2000.0), None),
                DailyRecord::new(date(2024, 1, 1), None, Some(70.0)),
                DailyRecord::new(date(2024, 1, 2), Some(1900.0), Some(69.8)),
            ],
        );

        assert_eq!(log.records[0].date, date(2024, 1, 1));
        assert_eq!(log.records[2].date, date(2024, 1, 3));
        assert_eq!(log.food_log_count(), 2);
        assert_eq!(log.weigh_in_count(), 2);
        assert_eq!(log.date_range(), Some((date(2024, 1, 1), date(2024, 1, 3))));
    }

    #[test]
    fn test_fill_calendar_gaps() {
        let records = vec![
            DailyRecord::new(date(2024, 1, 1), Some(2000.0), Some(70.0)),
            DailyRecord::new(date(2024, 1, 4), Some(2100.0), None),
        ];
        let filled = fill_calendar_gaps(&records);

        assert_eq!(filled.len(), 4);
        assert_eq!(filled[1], DailyRecord::new(date(2024, 1, 2), None, None));
        assert_eq!(filled[2], DailyRecord::new(date(2024, 1, 3), None, None));
        assert_eq!(filled[3], records[1]);
    }

    #[test]
    fn test_fill_calendar_gaps_keeps_same_day_rows() {
        let records = vec![
            DailyRecord::new(date(2024, 1, 1), None, Some(70.2)),
            DailyRecord::new(date(2024, 1, 1), Some(1800.0), Some(70.0)),
            DailyRecord::new(date(2024, 1, 2), Some(1900.0), None),
        ];

        assert_eq!(fill_calendar_gaps(&records), records);
        assert!(fill_calendar_gaps(&[]).is_empty());
    }

    #[test]
    fn test_workbook_profile_lookup_case_insensitive() {
        let mut workbook = PatientWorkbook::default();
        workbook.profiles.insert(
            "Alice".to_string(),
            PatientProfile::new(Sex::Female, 35.0, 165.0, ActivityLevel::Sedentary),
        );

        assert!(workbook.profile_for("alice").is_some());
        assert!(workbook.profile_for("bob").is_none());
    }
}
