use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds credited per repetition when a rep-based set is run against the clock
pub const SECS_PER_REP: u32 = 3;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("exercise entry has an empty id")]
    EmptyId,
    #[error("{0}: an entry needs at least one set")]
    NoSets(String),
    #[error("{0}: reps and duration are mutually exclusive")]
    BothLoads(String),
    #[error("{0}: either reps or duration is required")]
    MissingLoad(String),
    #[error("{0}: reps and duration must be positive")]
    ZeroLoad(String),
}

/// Work prescribed for each set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    Reps(u8),
    Timed(u32),
}

/// One exercise of a session plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPlanExercise", into = "RawPlanExercise")]
pub struct PlanExercise {
    pub exercise_id: String,
    pub sets: u8,
    pub load: Load,
    /// Rest between sets in seconds
    pub rest_s: u32,
}

/// Wire shape: flat optional `reps` / `duration_s`, exactly one present.
#[derive(Serialize, Deserialize)]
struct RawPlanExercise {
    exercise_id: String,
    sets: u8,
    #[serde(default)]
    reps: Option<u8>,
    #[serde(default)]
    duration_s: Option<u32>,
    rest_s: u32,
}

impl TryFrom<RawPlanExercise> for PlanExercise {
    type Error = PlanError;

    fn try_from(raw: RawPlanExercise) -> Result<Self, Self::Error> {
        let load = match (raw.reps, raw.duration_s) {
            (Some(reps), None) => Load::Reps(reps),
            (None, Some(secs)) => Load::Timed(secs),
            (Some(_), Some(_)) => return Err(PlanError::BothLoads(raw.exercise_id)),
            (None, None) => return Err(PlanError::MissingLoad(raw.exercise_id)),
        };
        Ok(Self {
            exercise_id: raw.exercise_id,
            sets: raw.sets,
            load,
            rest_s: raw.rest_s,
        })
    }
}

impl From<PlanExercise> for RawPlanExercise {
    fn from(ex: PlanExercise) -> Self {
        let (reps, duration_s) = match ex.load {
            Load::Reps(r) => (Some(r), None),
            Load::Timed(s) => (None, Some(s)),
        };
        Self {
            exercise_id: ex.exercise_id,
            sets: ex.sets,
            reps,
            duration_s,
            rest_s: ex.rest_s,
        }
    }
}

impl PlanExercise {
    pub fn reps(id: &str, sets: u8, reps: u8, rest_s: u32) -> Self {
        Self {
            exercise_id: id.to_string(),
            sets,
            load: Load::Reps(reps),
            rest_s,
        }
    }

    pub fn timed(id: &str, sets: u8, duration_s: u32, rest_s: u32) -> Self {
        Self {
            exercise_id: id.to_string(),
            sets,
            load: Load::Timed(duration_s),
            rest_s,
        }
    }

    /// Countdown length of one set
    pub fn set_duration_s(&self) -> u32 {
        match self.load {
            Load::Timed(secs) => secs,
            Load::Reps(reps) => reps as u32 * SECS_PER_REP,
        }
    }

    /// All sets plus the rests between them
    pub fn estimated_duration_s(&self) -> u32 {
        let total_work = self.set_duration_s() * self.sets as u32;
        let total_rest = self.rest_s * self.sets.saturating_sub(1) as u32;
        total_work + total_rest
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.exercise_id.trim().is_empty() {
            return Err(PlanError::EmptyId);
        }
        if self.sets == 0 {
            return Err(PlanError::NoSets(self.exercise_id.clone()));
        }
        match self.load {
            Load::Reps(0) | Load::Timed(0) => Err(PlanError::ZeroLoad(self.exercise_id.clone())),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub exercises: Vec<PlanExercise>,
}

impl SessionPlan {
    pub fn new(exercises: Vec<PlanExercise>) -> Self {
        Self { exercises }
    }

    pub fn total_duration_s(&self) -> u32 {
        self.exercises.iter().map(|e| e.estimated_duration_s()).sum()
    }

    pub fn exercise_count(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        self.exercises.iter().try_for_each(PlanExercise::validate)
    }
}

/// A finished session. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSessionRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub plan: SessionPlan,
    pub completed_exercise_ids: Vec<String>,
    /// Overall effort for the session, 1-10
    pub rpe: Option<u8>,
    pub duration_actual_s: u32,
}

impl CompletedSessionRecord {
    /// Share of planned exercises that were completed (0.0 - 1.0)
    pub fn completion_rate(&self) -> f32 {
        if self.plan.exercise_count() == 0 {
            return 0.0;
        }
        self.completed_exercise_ids.len() as f32 / self.plan.exercise_count() as f32
    }

    pub fn is_complete(&self) -> bool {
        self.completed_exercise_ids.len() >= self.plan.exercise_count()
    }
}

/// Per-exercise effort rating, feeds the mastery statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEffortLog {
    pub session_id: i64,
    pub exercise_id: String,
    pub rpe: u8,
}

pub fn is_valid_rpe(rpe: u8) -> bool {
    (1..=10).contains(&rpe)
}
