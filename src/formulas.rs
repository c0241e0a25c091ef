//! Energy formulas for basal metabolic rate and baseline expenditure.

use crate::domain::{PatientProfile, Sex};

/// Mifflin-St Jeor coefficients.
mod mifflin {
    pub const WEIGHT: f64 = 10.0;
    pub const HEIGHT: f64 = 6.25;
    pub const AGE: f64 = 5.0;
    pub const MALE_OFFSET: f64 = 5.0;
    pub const FEMALE_OFFSET: f64 = -161.0;
}

/// Calculates basal metabolic rate using the Mifflin-St Jeor equation.
///
/// Formula:
/// ```text
/// BMR = 10 × weight + 6.25 × height − 5 × age + s
/// ```
/// where `s` is +5 for men and −161 for women.
///
/// # Arguments
/// * `sex` - Patient's sex
/// * `weight_kg` - Body weight in kilograms
/// * `height_cm` - Height in centimetres
/// * `age_years` - Age in years
///
/// # Returns
/// BMR in kcal/day
pub fn calculate_bmr(sex: Sex, weight_kg: f64, height_cm: f64, age_years: f64) -> f64 {
    let offset = match sex {
        Sex::Male => mifflin::MALE_OFFSET,
        Sex::Female => mifflin::FEMALE_OFFSET,
    };

    mifflin::WEIGHT * weight_kg + mifflin::HEIGHT * height_cm - mifflin::AGE * age_years + offset
}

/// Calculates BMR for a profile at a given body weight.
pub fn profile_bmr(profile: &PatientProfile, weight_kg: f64) -> f64 {
    calculate_bmr(profile.sex, weight_kg, profile.height_cm, profile.age_years)
}

/// Calculates total expenditure at a given body weight: BMR × PAL.
pub fn calculate_expenditure(profile: &PatientProfile, weight_kg: f64) -> f64 {
    profile_bmr(profile, weight_kg) * profile.pal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActivityLevel;

    /// Helper to check floating point equality with tolerance
    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_bmr_male() {
        // 10 × 80 + 6.25 × 180 − 5 × 30 + 5 = 800 + 1125 − 150 + 5 = 1780
        assert!(approx_eq(calculate_bmr(Sex::Male, 80.0, 180.0, 30.0), 1780.0, 1e-9));
    }

    #[test]
    fn test_bmr_female() {
        // 10 × 60 + 6.25 × 165 − 5 × 40 − 161 = 600 + 1031.25 − 200 − 161 = 1270.25
        assert!(approx_eq(
            calculate_bmr(Sex::Female, 60.0, 165.0, 40.0),
            1270.25,
            1e-9
        ));
    }

    #[test]
    fn test_bmr_sex_difference() {
        let male = calculate_bmr(Sex::Male, 70.0, 170.0, 35.0);
        let female = calculate_bmr(Sex::Female, 70.0, 170.0, 35.0);
        assert!(approx_eq(male - female, 166.0, 1e-9));
    }

    #[test]
    fn test_expenditure_applies_pal() {
        let profile = PatientProfile::new(Sex::Male, 30.0, 180.0, ActivityLevel::ModeratelyActive);
        let ee = calculate_expenditure(&profile, 80.0);
        assert!(approx_eq(ee, 1780.0 * 1.55, 1e-9));
    }
}
