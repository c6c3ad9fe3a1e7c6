//! Application context: ties the profile, catalog, plan generator and store
//! together and answers "what do I do today / this week".

use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::adjust::adjust;
use crate::catalog::{CatalogError, ExerciseCatalog};
use crate::generator::{PlanGenerator, ProgramBuilder};
use crate::mastery::{mastered_set, promote_easy_session, rpe_stats};
use crate::plan::{CompletedSessionRecord, ExerciseEffortLog, SessionPlan};
use crate::profile::{Profile, ProfileError};
use crate::schedule::{day_seed, is_training_day};
use crate::session::{SessionCompletion, SessionEngine, SessionTiming};
use crate::store::{Store, StoreError};

pub const PREVIEW_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("no profile yet, run `repcoach init` first")]
    NoProfile,
}

/// One day of the rolling preview
#[derive(Debug, Clone, PartialEq)]
pub struct DayPreview {
    pub date: NaiveDate,
    pub is_workout: bool,
    pub plan: Option<SessionPlan>,
}

/// What the home screen shows for a given day
#[derive(Debug, Clone, PartialEq)]
pub enum DailyPlan {
    /// Already trained
    Done(CompletedSessionRecord),
    Training(SessionPlan),
    Rest,
}

pub struct CoachContext<S: Store, G: PlanGenerator = ProgramBuilder> {
    profile: Profile,
    catalog: ExerciseCatalog,
    generator: G,
    store: S,
}

impl<S: Store, G: PlanGenerator> CoachContext<S, G> {
    pub fn new(store: S, catalog: ExerciseCatalog, generator: G, profile: Profile) -> Self {
        Self {
            profile,
            catalog,
            generator,
            store,
        }
    }

    /// Build the context around the profile already in the store
    pub fn load(store: S, catalog: ExerciseCatalog, generator: G) -> Result<Self, CoachError> {
        let profile = store.get_profile()?.ok_or(CoachError::NoProfile)?;
        Ok(Self::new(store, catalog, generator, profile))
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn catalog(&self) -> &ExerciseCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save_profile(&mut self, profile: Profile) -> Result<(), CoachError> {
        profile.validate()?;
        self.store.save_profile(&profile)?;
        self.profile = profile;
        Ok(())
    }

    /// Exercises currently treated as mastered
    pub fn mastered(&self) -> Result<BTreeSet<String>, CoachError> {
        let stats = rpe_stats(&self.store.effort_logs()?);
        Ok(mastered_set(&self.profile, &stats))
    }

    /// Adjusted plan for `date`, or None on a rest day or when the
    /// generator fails for that day
    fn plan_for(&self, date: NaiveDate, mastered: &BTreeSet<String>) -> Option<SessionPlan> {
        if !is_training_day(date, &self.profile) {
            return None;
        }
        match self
            .generator
            .generate(&self.profile, &self.catalog, day_seed(date))
        {
            Ok(plan) => Some(adjust(&plan, &self.profile, &self.catalog, mastered, date)),
            Err(err) => {
                tracing::warn!(%date, %err, "plan generation failed, showing a rest day");
                None
            }
        }
    }

    /// Seven days starting at `start`
    pub fn week_preview(&self, start: NaiveDate) -> Result<Vec<DayPreview>, CoachError> {
        let mastered = self.mastered()?;
        Ok((0..PREVIEW_DAYS)
            .map(|offset| {
                let date = start + Duration::days(offset);
                let plan = self.plan_for(date, &mastered);
                DayPreview {
                    date,
                    is_workout: plan.is_some(),
                    plan,
                }
            })
            .collect())
    }

    pub fn resolve_day(&self, date: NaiveDate) -> Result<DailyPlan, CoachError> {
        if let Some(record) = self.store.session_on(date)? {
            return Ok(DailyPlan::Done(record));
        }
        let mastered = self.mastered()?;
        Ok(match self.plan_for(date, &mastered) {
            Some(plan) => DailyPlan::Training(plan),
            None => DailyPlan::Rest,
        })
    }

    /// Session over `plan`. Swaps only offer exercises this profile may be served.
    pub fn start_session(&self, plan: SessionPlan, timing: SessionTiming) -> SessionEngine {
        let catalog = self
            .catalog
            .restricted_to(&self.profile, plan.exercises.iter().map(|e| e.exercise_id.as_str()));
        SessionEngine::with_entropy(plan, catalog, timing)
    }

    /// Persist a finished session. A rating is also logged against every
    /// completed exercise, and an easy session promotes them to mastered.
    /// Nothing is stored, and the profile is unchanged, when this fails.
    pub fn record_completion(
        &mut self,
        date: NaiveDate,
        completion: &SessionCompletion,
    ) -> Result<CompletedSessionRecord, CoachError> {
        let mut record = CompletedSessionRecord {
            id: None,
            date,
            plan: completion.performed.clone(),
            completed_exercise_ids: completion.completed_exercise_ids.clone(),
            rpe: completion.rpe,
            duration_actual_s: completion.duration_actual_s,
        };
        let logs: Vec<ExerciseEffortLog> = match completion.rpe {
            Some(rpe) => completion
                .completed_exercise_ids
                .iter()
                .map(|exercise_id| ExerciseEffortLog {
                    session_id: 0,
                    exercise_id: exercise_id.clone(),
                    rpe,
                })
                .collect(),
            None => Vec::new(),
        };

        let mut profile = self.profile.clone();
        let promoted = promote_easy_session(&mut profile, &completion.completed_exercise_ids, completion.rpe);

        let session_id = self
            .store
            .record_session(&record, &logs, promoted.then_some(&profile))?;
        record.id = Some(session_id);

        if promoted {
            tracing::info!(mastered = profile.mastered_exercises.len(), "easy session, exercises promoted");
            self.profile = profile;
        }
        Ok(record)
    }

    pub fn streak(&self, today: NaiveDate) -> Result<u32, CoachError> {
        Ok(crate::streak::current_streak(&self.store.all_sessions()?, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::make_exercise;
    use crate::catalog::{Category, MovementPattern};
    use crate::generator::GenerateError;
    use crate::plan::PlanExercise;
    use crate::store::SqliteStore;
    use assert_matches::assert_matches;

    // 2026-01-05 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    /// Fixed two-exercise plan, failing for one chosen seed
    struct ScriptedGenerator {
        fail_seed: Option<u32>,
    }

    impl PlanGenerator for ScriptedGenerator {
        fn generate(
            &self,
            _profile: &Profile,
            _catalog: &ExerciseCatalog,
            day_seed: u32,
        ) -> Result<SessionPlan, GenerateError> {
            if self.fail_seed == Some(day_seed) {
                return Err(GenerateError::Failed("scripted".into()));
            }
            Ok(SessionPlan::new(vec![
                PlanExercise::reps("push_a", 3, 8, 60),
                PlanExercise::timed("plank", 2, 30, 60),
            ]))
        }
    }

    fn catalog() -> ExerciseCatalog {
        let mut push_a = make_exercise("push_a", Category::Push, MovementPattern::HorizontalPush);
        push_a.progression_to = Some("push_b".into());
        ExerciseCatalog::new(vec![
            push_a,
            make_exercise("push_b", Category::Push, MovementPattern::HorizontalPush),
            make_exercise("plank", Category::Core, MovementPattern::CoreAntiExtension),
        ])
        .unwrap()
    }

    fn context(fail_seed: Option<u32>) -> CoachContext<SqliteStore, ScriptedGenerator> {
        CoachContext::new(
            SqliteStore::open_in_memory().unwrap(),
            catalog(),
            ScriptedGenerator { fail_seed },
            Profile::default(),
        )
    }

    fn completion(rpe: Option<u8>) -> SessionCompletion {
        SessionCompletion {
            performed: SessionPlan::new(vec![PlanExercise::reps("push_a", 3, 8, 60)]),
            completed_exercise_ids: vec!["push_a".into()],
            rpe,
            duration_actual_s: 600,
        }
    }

    #[test]
    fn week_preview_marks_schedule() {
        let ctx = context(None);
        let week = ctx.week_preview(monday()).unwrap();
        assert_eq!(week.len(), 7);
        let flags: Vec<bool> = week.iter().map(|d| d.is_workout).collect();
        assert_eq!(flags, vec![true, false, true, false, true, false, false]);
        assert_eq!(week[6].date, monday() + Duration::days(6));
    }

    #[test]
    fn failed_day_degrades_to_rest_without_affecting_others() {
        let wednesday = monday() + Duration::days(2);
        let ctx = context(Some(day_seed(wednesday)));
        let week = ctx.week_preview(monday()).unwrap();
        assert!(!week[2].is_workout);
        assert!(week[2].plan.is_none());
        assert!(week[0].is_workout);
        assert!(week[4].is_workout);
    }

    #[test]
    fn resolve_day_training_then_done() {
        let mut ctx = context(None);
        assert_matches!(ctx.resolve_day(monday() + Duration::days(1)).unwrap(), DailyPlan::Rest);
        assert_matches!(ctx.resolve_day(monday()).unwrap(), DailyPlan::Training(_));

        ctx.record_completion(monday(), &completion(Some(7))).unwrap();
        assert_matches!(ctx.resolve_day(monday()).unwrap(), DailyPlan::Done(r) if r.rpe == Some(7));
    }

    #[test]
    fn rated_completion_logs_each_exercise() {
        let mut ctx = context(None);
        let record = ctx.record_completion(monday(), &completion(Some(7))).unwrap();
        let logs = ctx.store().effort_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].session_id, record.id.unwrap());
        assert!(ctx.profile().mastered_exercises.is_empty());

        ctx.record_completion(monday(), &completion(None)).unwrap();
        assert_eq!(ctx.store().effort_logs().unwrap().len(), 1);
    }

    #[test]
    fn easy_session_promotes_and_next_plan_progresses() {
        let mut ctx = context(None);
        ctx.record_completion(monday(), &completion(Some(4))).unwrap();

        assert!(ctx.profile().mastered_exercises.contains("push_a"));
        let stored = ctx.store().get_profile().unwrap().unwrap();
        assert!(stored.mastered_exercises.contains("push_a"));

        let wednesday = monday() + Duration::days(2);
        match ctx.resolve_day(wednesday).unwrap() {
            DailyPlan::Training(plan) => assert_eq!(plan.exercises[0].exercise_id, "push_b"),
            other => panic!("expected training day, got {other:?}"),
        }
    }

    #[test]
    fn failed_recording_leaves_no_trace_and_retry_records_once() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("coach.db");
        let mut ctx = CoachContext::new(
            SqliteStore::open(&db_path).unwrap(),
            catalog(),
            ScriptedGenerator { fail_seed: None },
            Profile::default(),
        );
        let admin = rusqlite::Connection::open(&db_path).unwrap();
        admin
            .execute_batch(
                "CREATE TRIGGER block_logs BEFORE INSERT ON exercise_logs
                 BEGIN SELECT RAISE(ABORT, 'log writes disabled'); END;",
            )
            .unwrap();

        assert!(ctx.record_completion(monday(), &completion(Some(4))).is_err());
        assert!(ctx.store().all_sessions().unwrap().is_empty());
        assert!(ctx.store().effort_logs().unwrap().is_empty());
        assert!(!ctx.profile().mastered_exercises.contains("push_a"));
        assert_matches!(ctx.resolve_day(monday()).unwrap(), DailyPlan::Training(_));

        admin.execute_batch("DROP TRIGGER block_logs;").unwrap();
        ctx.record_completion(monday(), &completion(Some(4))).unwrap();
        assert_eq!(ctx.store().all_sessions().unwrap().len(), 1);
        assert_eq!(ctx.store().effort_logs().unwrap().len(), 1);
        assert!(ctx.profile().mastered_exercises.contains("push_a"));
    }

    #[test]
    fn swaps_stay_within_what_the_profile_allows() {
        let profile = Profile {
            is_postpartum: true,
            has_equipment_anchor: false,
            ..Profile::default()
        };
        let ctx = CoachContext::new(
            SqliteStore::open_in_memory().unwrap(),
            ExerciseCatalog::builtin().unwrap(),
            ProgramBuilder,
            profile,
        );
        let forbidden = ["door_row", "towel_row", "plank", "bear_hold"];

        for start_id in ["prone_cobra", "heel_slide"] {
            for _ in 0..64 {
                let plan = SessionPlan::new(vec![PlanExercise::reps(start_id, 1, 5, 30)]);
                let mut session = ctx.start_session(plan, SessionTiming::default());
                session.start();
                let swapped = session.swap_exercise().unwrap();
                assert!(!forbidden.contains(&swapped.as_str()), "{start_id} swapped to {swapped}");
                let exercise = ctx.catalog().get(&swapped).unwrap();
                assert!(ctx.catalog().eligible_for(ctx.profile()).contains(&exercise));
            }
        }
    }

    #[test]
    fn streak_counts_recorded_days() {
        let mut ctx = context(None);
        let today = monday() + Duration::days(2);
        assert_eq!(ctx.streak(today).unwrap(), 0);
        ctx.record_completion(today - Duration::days(1), &completion(None)).unwrap();
        ctx.record_completion(today, &completion(None)).unwrap();
        assert_eq!(ctx.streak(today).unwrap(), 2);
    }

    #[test]
    fn load_requires_stored_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = CoachContext::load(store, catalog(), ProgramBuilder);
        assert!(matches!(result, Err(CoachError::NoProfile)));
    }
}
