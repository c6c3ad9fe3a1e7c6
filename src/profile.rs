use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::catalog::Contraindication;

/// Extra rest granted to the 45+ bracket, per set
const SENIOR_REST_BONUS_S: u32 = 15;

#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("at least 2 distinct training days are required, got {0}")]
    TooFewDays(usize),
    #[error("weekday index {0} is out of range (0=Monday..6=Sunday)")]
    InvalidWeekday(u8),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum_macros::Display)]
pub enum AgeBracket {
    #[serde(rename = "under_35")]
    #[strum(serialize = "under_35")]
    Under35,
    #[serde(rename = "35_44")]
    #[strum(serialize = "35_44")]
    Age35To44,
    #[serde(rename = "45_plus")]
    #[strum(serialize = "45_plus")]
    Age45Plus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FitnessLevel {
    Beginner,
    Intermediate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub sex: Sex,
    pub age_bracket: AgeBracket,
    pub fitness_level: FitnessLevel,
    /// Training weekdays, 0=Monday..6=Sunday. Takes precedence over `sessions_per_week`.
    #[serde(default)]
    pub workout_days: BTreeSet<u8>,
    /// Legacy frequency field kept for profiles created before weekday selection
    #[serde(default)]
    pub sessions_per_week: Option<u8>,
    pub minutes_per_session: u8,
    #[serde(default)]
    pub is_postpartum: bool,
    #[serde(default)]
    pub has_equipment_anchor: bool,
    #[serde(default)]
    pub injury_notes: Vec<Contraindication>,
    #[serde(default)]
    pub mastered_exercises: BTreeSet<String>,
    #[serde(default)]
    pub program_start: Option<NaiveDate>,
    #[serde(default)]
    pub disclaimer_accepted_at: Option<String>,
}

impl Profile {
    /// Highest catalog difficulty this profile may be served
    pub fn max_difficulty(&self) -> u8 {
        match self.fitness_level {
            FitnessLevel::Beginner => 2,
            FitnessLevel::Intermediate => 3,
        }
    }

    /// Injury tags plus the postpartum restrictions when applicable
    pub fn all_contraindications(&self) -> Vec<Contraindication> {
        let mut contra = self.injury_notes.clone();
        if self.is_postpartum {
            contra.push(Contraindication::Postpartum);
            contra.push(Contraindication::DiastasisRecti);
        }
        contra
    }

    pub fn target_rpe_range(&self) -> (u8, u8) {
        match self.fitness_level {
            FitnessLevel::Beginner => (5, 7),
            FitnessLevel::Intermediate => (6, 8),
        }
    }

    pub fn rest_bonus_s(&self) -> u32 {
        match self.age_bracket {
            AgeBracket::Age45Plus => SENIOR_REST_BONUS_S,
            _ => 0,
        }
    }

    pub fn disclaimer_accepted(&self) -> bool {
        self.disclaimer_accepted_at.is_some()
    }

    /// Replace the training weekdays. Duplicates collapse; fewer than two
    /// distinct days or an index past Sunday is rejected.
    pub fn set_workout_days<I: IntoIterator<Item = u8>>(&mut self, days: I) -> Result<(), ProfileError> {
        let days: BTreeSet<u8> = days.into_iter().collect();
        if let Some(&bad) = days.iter().find(|&&d| d > 6) {
            return Err(ProfileError::InvalidWeekday(bad));
        }
        if days.len() < 2 {
            return Err(ProfileError::TooFewDays(days.len()));
        }
        self.workout_days = days;
        Ok(())
    }

    /// Structural check used before accepting an imported profile
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.workout_days.is_empty() {
            return Ok(());
        }
        if let Some(&bad) = self.workout_days.iter().find(|&&d| d > 6) {
            return Err(ProfileError::InvalidWeekday(bad));
        }
        if self.workout_days.len() < 2 {
            return Err(ProfileError::TooFewDays(self.workout_days.len()));
        }
        Ok(())
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            sex: Sex::Other,
            age_bracket: AgeBracket::Under35,
            fitness_level: FitnessLevel::Beginner,
            workout_days: BTreeSet::from([0, 2, 4]),
            sessions_per_week: None,
            minutes_per_session: 30,
            is_postpartum: false,
            has_equipment_anchor: false,
            injury_notes: vec![],
            mastered_exercises: BTreeSet::new(),
            program_start: None,
            disclaimer_accepted_at: None,
        }
    }
}
