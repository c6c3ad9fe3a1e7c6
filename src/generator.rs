use thiserror::Error;

use crate::catalog::{Category, Exercise, ExerciseCatalog};
use crate::plan::{PlanError, PlanExercise, SessionPlan};
use crate::profile::{FitnessLevel, Profile};

/// Transition allowance between two exercises when budgeting a session
const TRANSITION_S: u32 = 15;
const BEGINNER_REST_S: u32 = 60;
const INTERMEDIATE_REST_S: u32 = 45;

const DEFAULT_PRIORITY: [Category; 6] = [
    Category::Push,
    Category::Pull,
    Category::Squat,
    Category::Hinge,
    Category::Core,
    Category::Mobility,
];

/// Pelvic floor and core work come first after childbirth
const POSTPARTUM_PRIORITY: [Category; 6] = [
    Category::Core,
    Category::Mobility,
    Category::Hinge,
    Category::Squat,
    Category::Push,
    Category::Pull,
];

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generated plan is malformed: {0}")]
    Malformed(#[from] PlanError),
    #[error("plan generation failed: {0}")]
    Failed(String),
}

/// Turns a profile and the catalog into one day's plan. Implementations must
/// be deterministic for a fixed (profile, catalog, day_seed) triple.
pub trait PlanGenerator {
    fn generate(
        &self,
        profile: &Profile,
        catalog: &ExerciseCatalog,
        day_seed: u32,
    ) -> Result<SessionPlan, GenerateError>;
}

/// Default generator: one exercise per category, in priority order, within
/// the profile's time budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramBuilder;

impl PlanGenerator for ProgramBuilder {
    fn generate(
        &self,
        profile: &Profile,
        catalog: &ExerciseCatalog,
        day_seed: u32,
    ) -> Result<SessionPlan, GenerateError> {
        let plan = build_session(profile, catalog, day_seed);
        plan.validate()?;
        Ok(plan)
    }
}

fn build_session(profile: &Profile, catalog: &ExerciseCatalog, day_seed: u32) -> SessionPlan {
    let budget_s = profile.minutes_per_session as u32 * 60;
    let eligible = catalog.eligible_for(profile);

    let (sets, rest_s) = sets_and_rest(profile);
    let priority: &[Category] = if profile.is_postpartum {
        &POSTPARTUM_PRIORITY
    } else {
        &DEFAULT_PRIORITY
    };

    let mut selected = Vec::new();
    let mut used_time_s = 0;

    for category in priority {
        if used_time_s >= budget_s {
            break;
        }

        let Some(exercise) = pick_from_category(&eligible, *category, day_seed as usize) else {
            continue;
        };

        let candidate = if exercise.is_timed() {
            PlanExercise::timed(&exercise.id, sets, exercise.duration_s, rest_s)
        } else {
            PlanExercise::reps(&exercise.id, sets, reps_per_set(profile), rest_s)
        };

        let needed = candidate.estimated_duration_s() + TRANSITION_S;
        if used_time_s + needed <= budget_s {
            used_time_s += needed;
            selected.push(candidate);
        }
    }

    SessionPlan::new(selected)
}

fn sets_and_rest(profile: &Profile) -> (u8, u32) {
    let (sets, base_rest) = match profile.fitness_level {
        FitnessLevel::Beginner => (2, BEGINNER_REST_S),
        FitnessLevel::Intermediate => (3, INTERMEDIATE_REST_S),
    };
    (sets, base_rest + profile.rest_bonus_s())
}

fn reps_per_set(profile: &Profile) -> u8 {
    match profile.fitness_level {
        FitnessLevel::Beginner => 8,
        FitnessLevel::Intermediate => 12,
    }
}

fn pick_from_category<'a>(
    eligible: &[&'a Exercise],
    category: Category,
    seed: usize,
) -> Option<&'a Exercise> {
    let matching: Vec<&Exercise> = eligible
        .iter()
        .filter(|e| e.category == category)
        .copied()
        .collect();

    if matching.is_empty() {
        return None;
    }
    Some(matching[seed % matching.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::make_exercise;
    use crate::catalog::{Contraindication, MovementPattern};
    use crate::plan::Load;
    use crate::profile::AgeBracket;

    fn profile(level: FitnessLevel, minutes: u8, postpartum: bool) -> Profile {
        Profile {
            fitness_level: level,
            minutes_per_session: minutes,
            is_postpartum: postpartum,
            ..Profile::default()
        }
    }

    fn full_catalog() -> ExerciseCatalog {
        let mut crunch = make_exercise("core_crunch", Category::Core, MovementPattern::CoreFlexion);
        crunch.contraindications = vec![Contraindication::DiastasisRecti];
        let mut kegel = make_exercise("kegel", Category::Core, MovementPattern::PelvicFloor);
        kegel.postpartum_only = true;
        let mut door_row = make_exercise("door_row", Category::Pull, MovementPattern::HorizontalPull);
        door_row.equipment_required = true;

        ExerciseCatalog::new(vec![
            make_exercise("push_1", Category::Push, MovementPattern::HorizontalPush),
            door_row,
            make_exercise("squat_1", Category::Squat, MovementPattern::Squat),
            make_exercise("hinge_1", Category::Hinge, MovementPattern::HipHinge),
            crunch,
            make_exercise("core_plank", Category::Core, MovementPattern::CoreAntiExtension),
            make_exercise("mobility_1", Category::Mobility, MovementPattern::Mobility),
            kegel,
        ])
        .unwrap()
    }

    fn ids(plan: &SessionPlan) -> Vec<&str> {
        plan.exercises.iter().map(|e| e.exercise_id.as_str()).collect()
    }

    #[test]
    fn session_fits_time_budget() {
        let plan = ProgramBuilder
            .generate(&profile(FitnessLevel::Beginner, 20, false), &full_catalog(), 0)
            .unwrap();
        assert!(!plan.is_empty());
        assert!(plan.total_duration_s() <= 20 * 60);
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let p = profile(FitnessLevel::Beginner, 30, false);
        let catalog = full_catalog();
        let a = ProgramBuilder.generate(&p, &catalog, 12).unwrap();
        let b = ProgramBuilder.generate(&p, &catalog, 12).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn equipment_requires_anchor() {
        let mut p = profile(FitnessLevel::Beginner, 60, false);
        let catalog = full_catalog();
        assert!(!ids(&ProgramBuilder.generate(&p, &catalog, 0).unwrap()).contains(&"door_row"));
        p.has_equipment_anchor = true;
        assert!(ids(&ProgramBuilder.generate(&p, &catalog, 0).unwrap()).contains(&"door_row"));
    }

    #[test]
    fn postpartum_filters() {
        let catalog = full_catalog();
        let pp = ProgramBuilder
            .generate(&profile(FitnessLevel::Beginner, 30, true), &catalog, 0)
            .unwrap();
        assert!(!ids(&pp).contains(&"core_crunch"));
        assert_eq!(ids(&pp).first(), Some(&"core_plank"));
        assert!(ids(&pp).contains(&"mobility_1"));

        let regular = ProgramBuilder
            .generate(&profile(FitnessLevel::Beginner, 30, false), &catalog, 0)
            .unwrap();
        assert!(!ids(&regular).contains(&"kegel"));
    }

    #[test]
    fn level_sets_reps_and_rest() {
        let catalog = full_catalog();
        let beginner = ProgramBuilder
            .generate(&profile(FitnessLevel::Beginner, 60, false), &catalog, 0)
            .unwrap();
        for ex in &beginner.exercises {
            assert_eq!(ex.sets, 2);
            assert_eq!(ex.rest_s, 60);
        }
        assert_eq!(beginner.exercises[0].load, Load::Reps(8));

        let intermediate = ProgramBuilder
            .generate(&profile(FitnessLevel::Intermediate, 60, false), &catalog, 0)
            .unwrap();
        for ex in &intermediate.exercises {
            assert_eq!(ex.sets, 3);
            assert_eq!(ex.rest_s, 45);
        }
    }

    #[test]
    fn timed_patterns_get_durations() {
        let plan = ProgramBuilder
            .generate(&profile(FitnessLevel::Beginner, 60, false), &full_catalog(), 1)
            .unwrap();
        let core = plan
            .exercises
            .iter()
            .find(|e| e.exercise_id == "core_plank")
            .expect("core exercise selected");
        assert_eq!(core.load, Load::Timed(30));
    }

    #[test]
    fn senior_bracket_rests_longer() {
        let mut p = profile(FitnessLevel::Beginner, 30, false);
        p.age_bracket = AgeBracket::Age45Plus;
        let plan = ProgramBuilder.generate(&p, &full_catalog(), 0).unwrap();
        assert!(plan.exercises.iter().all(|e| e.rest_s == 75));
    }

    #[test]
    fn seeds_rotate_within_category() {
        let p = profile(FitnessLevel::Beginner, 30, false);
        let catalog = ExerciseCatalog::new(vec![
            make_exercise("push_a", Category::Push, MovementPattern::HorizontalPush),
            make_exercise("push_b", Category::Push, MovementPattern::HorizontalPush),
        ])
        .unwrap();
        let day0 = ProgramBuilder.generate(&p, &catalog, 0).unwrap();
        let day1 = ProgramBuilder.generate(&p, &catalog, 1).unwrap();
        assert_ne!(ids(&day0), ids(&day1));
    }

    #[test]
    fn empty_catalog_or_tiny_budget_yields_empty_plan() {
        let p = profile(FitnessLevel::Beginner, 30, false);
        assert!(ProgramBuilder
            .generate(&p, &ExerciseCatalog::default(), 0)
            .unwrap()
            .is_empty());
        let tiny = profile(FitnessLevel::Beginner, 1, false);
        assert!(ProgramBuilder.generate(&tiny, &full_catalog(), 0).unwrap().is_empty());
    }
}
