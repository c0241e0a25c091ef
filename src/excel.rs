//! Excel file parsing for patient food and weight logs.
//!
//! Every worksheet is one patient's log, named after the patient, except an
//! optional `profiles` worksheet holding one anthropometric profile per row.

use calamine::{Data, DataType, Reader, Xlsx, open_workbook};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::domain::{ActivityLevel, DailyRecord, PatientLog, PatientProfile, PatientWorkbook, Sex};
use crate::error::ParseError;

/// Name of the worksheet holding patient profiles (case-insensitive).
const PROFILES_SHEET: &str = "profiles";

/// Accepted column names (case-insensitive), first match wins.
const COL_DATE: &[&str] = &["date", "day"];
const COL_CALORIES: &[&str] = &["calories", "intake", "kcal", "reported_intake_kcal"];
const COL_WEIGHT: &[&str] = &["weight", "weight_kg"];
const COL_PATIENT: &[&str] = &["patient", "name"];
const COL_SEX: &[&str] = &["sex"];
const COL_AGE: &[&str] = &["age", "age_years"];
const COL_HEIGHT: &[&str] = &["height", "height_cm"];
const COL_ACTIVITY: &[&str] = &["activity", "activity_level", "pal"];

static EMPTY_CELL: Data = Data::Empty;

/// Finds a column index by any of its accepted names.
fn find_column(header: &[Data], names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        header.iter().position(|cell| {
            cell.get_string()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(name))
        })
    })
}

fn require_column(header: &[Data], sheet: &str, names: &[&str]) -> Result<usize, ParseError> {
    find_column(header, names).ok_or_else(|| ParseError::MissingColumn {
        sheet: sheet.to_string(),
        column: names[0].to_string(),
    })
}

/// Returns the cell at `idx`, treating short rows as empty.
fn cell(row: &[Data], idx: usize) -> &Data {
    row.get(idx).unwrap_or(&EMPTY_CELL)
}

/// Column indices of a patient log worksheet.
struct LogColumns {
    date: usize,
    calories: usize,
    weight: usize,
}

impl LogColumns {
    fn from_header(header: &[Data], sheet: &str) -> Result<Self, ParseError> {
        Ok(Self {
            date: require_column(header, sheet, COL_DATE)?,
            calories: require_column(header, sheet, COL_CALORIES)?,
            weight: require_column(header, sheet, COL_WEIGHT)?,
        })
    }
}

/// Column indices of the profiles worksheet.
struct ProfileColumns {
    patient: usize,
    sex: usize,
    age: usize,
    height: usize,
    activity: Option<usize>,
}

impl ProfileColumns {
    fn from_header(header: &[Data], sheet: &str) -> Result<Self, ParseError> {
        Ok(Self {
            patient: require_column(header, sheet, COL_PATIENT)?,
            sex: require_column(header, sheet, COL_SEX)?,
            age: require_column(header, sheet, COL_AGE)?,
            height: require_column(header, sheet, COL_HEIGHT)?,
            activity: find_column(header, COL_ACTIVITY),
        })
    }
}

/// Loads all patient logs and profiles from an Excel file.
///
/// # Arguments
/// * `path` - Path to the Excel file (.xlsx)
///
/// # Returns
/// A `PatientWorkbook` with one log per patient worksheet, records sorted by date.
///
/// # Errors
/// Returns ParseError if the file cannot be read, has no sheets, or a sheet is
/// missing a required column.
pub fn load_workbook<P: AsRef<Path>>(path: P) -> Result<PatientWorkbook, ParseError> {
    let path = path.as_ref();

    // Check if file exists
    if !path.exists() {
        return Err(ParseError::FileNotFound(path.display().to_string()));
    }

    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| ParseError::CannotRead(format!("{}: {}", path.display(), e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(ParseError::InvalidFormat("workbook has no sheets".to_string()));
    }

    let mut result = PatientWorkbook::default();

    for sheet_name in &sheet_names {
        let range = workbook.worksheet_range(sheet_name).map_err(|e| {
            ParseError::CannotRead(format!("cannot read sheet '{}': {}", sheet_name, e))
        })?;

        if sheet_name.trim().eq_ignore_ascii_case(PROFILES_SHEET) {
            result.profiles = parse_profile_sheet(sheet_name, range.rows())?;
            continue;
        }

        match parse_log_sheet(sheet_name, range.rows()) {
            Ok(log) => {
                debug!(
                    "Sheet '{}': {} records ({} food logs, {} weigh-ins)",
                    sheet_name,
                    log.records.len(),
                    log.food_log_count(),
                    log.weigh_in_count()
                );
                result.logs.push(log);
            }
            // An empty sheet is not a patient; anything else is a real error
            Err(ParseError::InvalidFormat(reason)) => {
                warn!("Skipping sheet '{}': {}", sheet_name, reason);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}

/// Parses a patient log worksheet, header row first.
///
/// Rows with an empty date are skipped silently, rows with an unparsable date
/// are skipped with a warning. Unparsable numeric cells become `None`.
fn parse_log_sheet<'a, I>(sheet: &str, rows: I) -> Result<PatientLog, ParseError>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter();

    let header = rows
        .next()
        .ok_or_else(|| ParseError::InvalidFormat("empty worksheet".to_string()))?;
    let columns = LogColumns::from_header(header, sheet)?;

    let mut records = Vec::new();

    for (row_idx, row) in rows.enumerate() {
        let row_num = row_idx + 2; // +1 for 0-index, +1 for header row

        // Skip empty rows silently (common at end of spreadsheets)
        if *cell(row, columns.date) == Data::Empty {
            continue;
        }

        let date = match parse_date(cell(row, columns.date), row_num) {
            Ok(d) => d,
            Err(e) => {
                warn!("{}: {}", sheet, e);
                continue;
            }
        };

        let calories = parse_optional_number(cell(row, columns.calories), row_num, "calories")
            .unwrap_or_else(|e| {
                warn!("{}: {}", sheet, e);
                None
            });

        let weight = parse_optional_number(cell(row, columns.weight), row_num, "weight")
            .unwrap_or_else(|e| {
                warn!("{}: {}", sheet, e);
                None
            });

        records.push(DailyRecord::new(date, calories, weight));
    }

    Ok(PatientLog::new(sheet.trim(), records))
}

/// Parses the profiles worksheet into a map of patient id to profile.
///
/// Malformed rows are skipped with a warning.
fn parse_profile_sheet<'a, I>(
    sheet: &str,
    rows: I,
) -> Result<HashMap<String, PatientProfile>, ParseError>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter();

    let Some(header) = rows.next() else {
        warn!("Profiles sheet '{}' is empty", sheet);
        return Ok(HashMap::new());
    };
    let columns = ProfileColumns::from_header(header, sheet)?;

    let mut profiles = HashMap::new();

    for (row_idx, row) in rows.enumerate() {
        let row_num = row_idx + 2;

        let Some(patient) = cell_text(cell(row, columns.patient)) else {
            continue;
        };

        match parse_profile_row(row, &columns, row_num) {
            Ok(profile) => {
                profiles.insert(patient, profile);
            }
            Err(e) => warn!("{}: {}", sheet, e),
        }
    }

    Ok(profiles)
}

/// Parses sex, age, height and activity level from a profile row.
fn parse_profile_row(
    row: &[Data],
    columns: &ProfileColumns,
    row_num: usize,
) -> Result<PatientProfile, ParseError> {
    let sex_text = cell_text(cell(row, columns.sex)).unwrap_or_default();
    let sex = Sex::from_str(&sex_text).map_err(|_| ParseError::UnknownSex {
        row: row_num,
        value: sex_text.clone(),
    })?;

    let age = require_number(cell(row, columns.age), row_num, "age")?;
    let height = require_number(cell(row, columns.height), row_num, "height")?;

    let activity = match columns.activity.and_then(|idx| cell_text(cell(row, idx))) {
        Some(text) => ActivityLevel::from_str(&text).map_err(|_| {
            ParseError::UnknownActivityLevel {
                row: row_num,
                value: text.clone(),
            }
        })?,
        None => ActivityLevel::Sedentary,
    };

    Ok(PatientProfile::new(sex, age, height, activity))
}

/// Parses a date from a cell.
fn parse_date(cell: &Data, row: usize) -> Result<NaiveDate, ParseError> {
    match cell {
        Data::DateTime(dt) => {
            // calamine DateTime to NaiveDate via chrono
            dt.as_datetime()
                .map(|ndt| ndt.date())
                .ok_or_else(|| ParseError::InvalidDate {
                    row,
                    value: format!("{:?}", dt),
                })
        }
        Data::DateTimeIso(s) => {
            NaiveDate::parse_from_str(s.get(..10).unwrap_or(s.as_str()), "%Y-%m-%d").map_err(|_| {
                ParseError::InvalidDate {
                    row,
                    value: s.clone(),
                }
            })
        }
        Data::String(s) => {
            // Try common date formats
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
                .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
                .map_err(|_| ParseError::InvalidDate {
                    row,
                    value: s.to_string(),
                })
        }
        Data::Empty => Err(ParseError::InvalidDate {
            row,
            value: "(empty)".to_string(),
        }),
        other => Err(ParseError::InvalidDate {
            row,
            value: format!("{:?}", other),
        }),
    }
}

/// Parses an optional positive number from a cell.
///
/// Empty cells are `Ok(None)`; zero, negative or non-numeric values are errors.
fn parse_optional_number(
    cell: &Data,
    row: usize,
    column: &'static str,
) -> Result<Option<f64>, ParseError> {
    let invalid = |value: String| ParseError::InvalidNumber { row, column, value };

    let value = match cell {
        Data::Empty => return Ok(None),
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) if s.trim().is_empty() => return Ok(None),
        Data::String(s) => s.trim().parse::<f64>().map_err(|_| invalid(s.clone()))?,
        other => return Err(invalid(format!("{:?}", other))),
    };

    if value.is_finite() && value > 0.0 {
        Ok(Some(value))
    } else {
        Err(invalid(value.to_string()))
    }
}

/// Parses a required positive number from a cell.
fn require_number(cell: &Data, row: usize, column: &'static str) -> Result<f64, ParseError> {
    parse_optional_number(cell, row, column)?.ok_or(ParseError::InvalidNumber {
        row,
        column,
        value: "(empty)".to_string(),
    })
}

/// Returns the trimmed text of a string or numeric cell.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn log_header() -> Vec<Data> {
        vec![text("Date"), text("Calories"), text("Weight")]
    }

    fn as_rows(rows: &[Vec<Data>]) -> impl Iterator<Item = &[Data]> {
        rows.iter().map(|r| r.as_slice())
    }

    #[test]
    fn test_log_columns_from_header() {
        let columns = LogColumns::from_header(&log_header(), "alice").unwrap();
        assert_eq!(columns.date, 0);
        assert_eq!(columns.calories, 1);
        assert_eq!(columns.weight, 2);
    }

    #[test]
    fn test_log_columns_aliases_and_case() {
        let header = vec![text("WEIGHT_KG"), text("day"), text("Intake")];
        let columns = LogColumns::from_header(&header, "alice").unwrap();
        assert_eq!(columns.date, 1);
        assert_eq!(columns.calories, 2);
        assert_eq!(columns.weight, 0);
    }

    #[test]
    fn test_log_columns_missing_column() {
        let header = vec![text("Date"), text("Weight")];
        let err = LogColumns::from_header(&header, "alice").err().unwrap();
        assert!(matches!(
            err,
            ParseError::MissingColumn { ref column, .. } if column == "calories"
        ));
    }

    #[test]
    fn test_parse_optional_number() {
        assert_eq!(parse_optional_number(&Data::Float(1850.5), 2, "calories").unwrap(), Some(1850.5));
        assert_eq!(parse_optional_number(&Data::Int(82), 2, "weight").unwrap(), Some(82.0));
        assert_eq!(parse_optional_number(&text(" 81.4 "), 2, "weight").unwrap(), Some(81.4));
        assert_eq!(parse_optional_number(&Data::Empty, 2, "weight").unwrap(), None);
        assert_eq!(parse_optional_number(&text("  "), 2, "weight").unwrap(), None);
    }

    #[test]
    fn test_parse_optional_number_invalid() {
        assert!(parse_optional_number(&Data::Float(0.0), 2, "weight").is_err());
        assert!(parse_optional_number(&Data::Int(-5), 2, "weight").is_err());
        assert!(parse_optional_number(&text("lots"), 2, "calories").is_err());
        assert!(parse_optional_number(&Data::Bool(true), 2, "calories").is_err());
    }

    #[test]
    fn test_parse_date_string_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date(&text("2024-03-15"), 2).unwrap(), expected);
        assert_eq!(parse_date(&text("15/03/2024"), 2).unwrap(), expected);
        assert_eq!(
            parse_date(&Data::DateTimeIso("2024-03-15T00:00:00".to_string()), 2).unwrap(),
            expected
        );
        assert!(parse_date(&text("yesterday"), 2).is_err());
        assert!(parse_date(&Data::Empty, 2).is_err());
    }

    #[test]
    fn test_parse_log_sheet() {
        let rows = vec![
            log_header(),
            vec![text("2024-03-02"), Data::Float(2100.0), Data::Float(80.2)],
            vec![text("2024-03-01"), Data::Float(1900.0), Data::Empty],
            vec![text("not a date"), Data::Float(2000.0), Data::Float(80.0)],
            vec![text("2024-03-03"), text("n/a"), Data::Float(-1.0)],
            vec![Data::Empty, Data::Empty, Data::Empty],
            vec![text("2024-03-04")],
        ];

        let log = parse_log_sheet("alice", as_rows(&rows)).unwrap();

        assert_eq!(log.patient, "alice");
        assert_eq!(log.records.len(), 4);

        // Sorted by date
        assert_eq!(log.records[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(log.records[0].reported_intake_kcal, Some(1900.0));
        assert_eq!(log.records[0].weight_kg, None);
        assert_eq!(log.records[1].weight_kg, Some(80.2));

        // Bad cells become missing values instead of dropping the day
        assert_eq!(log.records[2].reported_intake_kcal, None);
        assert_eq!(log.records[2].weight_kg, None);

        // Short row
        assert_eq!(log.records[3].reported_intake_kcal, None);
    }

    #[test]
    fn test_parse_log_sheet_empty() {
        let rows: Vec<Vec<Data>> = Vec::new();
        let err = parse_log_sheet("empty", as_rows(&rows)).err().unwrap();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_parse_profile_sheet() {
        let rows = vec![
            vec![text("Patient"), text("Sex"), text("Age"), text("Height"), text("Activity")],
            vec![text("alice"), text("F"), Data::Int(34), Data::Float(165.0), text("moderate")],
            vec![text("bob"), text("male"), Data::Float(51.0), Data::Int(178), Data::Float(1.4)],
            vec![text("carol"), text("unknown"), Data::Int(40), Data::Int(170), Data::Empty],
            vec![text("dave"), text("m"), Data::Empty, Data::Int(170), Data::Empty],
            vec![text("erin"), text("f"), Data::Int(29), Data::Int(160), Data::Empty],
            vec![Data::Empty, text("m"), Data::Int(29), Data::Int(160), Data::Empty],
        ];

        let profiles = parse_profile_sheet("profiles", as_rows(&rows)).unwrap();

        assert_eq!(profiles.len(), 3);

        let alice = &profiles["alice"];
        assert_eq!(alice.sex, Sex::Female);
        assert_eq!(alice.age_years, 34.0);
        assert_eq!(alice.baseline_activity_factor, 1.55);

        assert_eq!(profiles["bob"].baseline_activity_factor, 1.4);

        // Missing activity defaults to sedentary
        assert_eq!(profiles["erin"].baseline_activity_factor, 1.2);
    }

    #[test]
    fn test_parse_profile_sheet_missing_column() {
        let rows = vec![vec![text("Patient"), text("Sex"), text("Age")]];
        let err = parse_profile_sheet("profiles", as_rows(&rows)).err().unwrap();
        assert!(matches!(err, ParseError::MissingColumn { .. }));
    }

    #[test]
    fn test_load_workbook_missing_file() {
        let err = load_workbook("/nonexistent/patients.xlsx").err().unwrap();
        assert!(matches!(err, ParseError::FileNotFound(_)));
    }
}
