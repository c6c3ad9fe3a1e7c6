//! Deterministic plan transforms applied before a session is served:
//! progression substitution for mastered movements, then deload.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

use crate::catalog::ExerciseCatalog;
use crate::plan::SessionPlan;
use crate::profile::Profile;
use crate::schedule::is_deload_week;

/// Follow `progression_to` links from `start` while the current exercise is
/// mastered. Stops at the first unmastered target, on a revisited id, after
/// `catalog.len()` hops, or when the target is unknown or needs equipment
/// the profile does not have.
pub fn progressed_exercise(
    start: &str,
    catalog: &ExerciseCatalog,
    mastered: &BTreeSet<String>,
    has_equipment: bool,
) -> String {
    let mut current = start.to_string();
    let mut seen = HashSet::from([current.clone()]);

    for _ in 0..catalog.len() {
        if !mastered.contains(&current) {
            break;
        }
        let Some(next) = catalog.get(&current).and_then(|e| e.progression_to.as_deref()) else {
            break;
        };
        let Some(target) = catalog.get(next) else {
            tracing::warn!(from = %current, to = next, "progression target missing from catalog");
            break;
        };
        if target.equipment_required && !has_equipment {
            break;
        }
        if !seen.insert(target.id.clone()) {
            tracing::warn!(exercise = next, "progression chain loops back, stopping");
            break;
        }
        current = target.id.clone();
    }

    current
}

pub fn apply_progressions(
    plan: &SessionPlan,
    catalog: &ExerciseCatalog,
    mastered: &BTreeSet<String>,
    has_equipment: bool,
) -> SessionPlan {
    let mut adjusted = plan.clone();
    for entry in adjusted.exercises.iter_mut() {
        let next = progressed_exercise(&entry.exercise_id, catalog, mastered, has_equipment);
        if next != entry.exercise_id {
            tracing::debug!(from = %entry.exercise_id, to = %next, "progression applied");
            entry.exercise_id = next;
        }
    }
    adjusted
}

/// One set fewer per exercise, never below one
pub fn apply_deload(plan: &SessionPlan) -> SessionPlan {
    let mut adjusted = plan.clone();
    for entry in adjusted.exercises.iter_mut() {
        entry.sets = entry.sets.saturating_sub(1).max(1);
    }
    adjusted
}

/// Progression first, then deload when `date` falls in a recovery week
pub fn adjust(
    plan: &SessionPlan,
    profile: &Profile,
    catalog: &ExerciseCatalog,
    mastered: &BTreeSet<String>,
    date: NaiveDate,
) -> SessionPlan {
    let progressed = apply_progressions(plan, catalog, mastered, profile.has_equipment_anchor);
    if is_deload_week(profile, date) {
        tracing::debug!(%date, "deload week, reducing volume");
        apply_deload(&progressed)
    } else {
        progressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::make_exercise;
    use crate::catalog::{Category, Exercise, MovementPattern};
    use crate::plan::{Load, PlanExercise};

    fn linked(id: &str, next: Option<&str>) -> Exercise {
        let mut ex = make_exercise(id, Category::Push, MovementPattern::HorizontalPush);
        ex.progression_to = next.map(str::to_string);
        ex
    }

    fn chain_catalog() -> ExerciseCatalog {
        ExerciseCatalog::new(vec![
            linked("a", Some("b")),
            linked("b", Some("c")),
            linked("c", None),
        ])
        .unwrap()
    }

    fn mastered(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn plan_of(ids: &[&str]) -> SessionPlan {
        SessionPlan::new(ids.iter().map(|id| PlanExercise::reps(id, 3, 10, 60)).collect())
    }

    #[test]
    fn mastered_exercise_moves_to_its_progression() {
        let adjusted = apply_progressions(&plan_of(&["a"]), &chain_catalog(), &mastered(&["a"]), false);
        assert_eq!(adjusted.exercises[0].exercise_id, "b");
    }

    #[test]
    fn substitution_stops_at_first_unmastered_target() {
        let catalog = chain_catalog();
        assert_eq!(progressed_exercise("a", &catalog, &mastered(&["a"]), false), "b");
        assert_eq!(progressed_exercise("a", &catalog, &mastered(&["a", "b"]), false), "c");
    }

    #[test]
    fn unmastered_or_terminal_exercises_are_untouched() {
        let catalog = chain_catalog();
        assert_eq!(progressed_exercise("a", &catalog, &mastered(&[]), false), "a");
        assert_eq!(progressed_exercise("c", &catalog, &mastered(&["c"]), false), "c");
        assert_eq!(progressed_exercise("zzz", &catalog, &mastered(&["zzz"]), false), "zzz");
    }

    #[test]
    fn cyclic_chain_terminates() {
        let catalog = ExerciseCatalog::new(vec![linked("x", Some("y")), linked("y", Some("x"))]).unwrap();
        let result = progressed_exercise("x", &catalog, &mastered(&["x", "y"]), false);
        assert_eq!(result, "y");
    }

    #[test]
    fn equipment_target_needs_anchor() {
        let mut door = linked("b", None);
        door.equipment_required = true;
        let catalog = ExerciseCatalog::new(vec![linked("a", Some("b")), door]).unwrap();
        assert_eq!(progressed_exercise("a", &catalog, &mastered(&["a"]), false), "a");
        assert_eq!(progressed_exercise("a", &catalog, &mastered(&["a"]), true), "b");
    }

    #[test]
    fn deload_removes_one_set_with_floor_of_one() {
        let plan = SessionPlan::new(vec![
            PlanExercise::reps("a", 3, 10, 60),
            PlanExercise::timed("b", 1, 30, 45),
            PlanExercise::reps("c", 2, 8, 60),
        ]);
        let deloaded = apply_deload(&plan);
        let sets: Vec<u8> = deloaded.exercises.iter().map(|e| e.sets).collect();
        assert_eq!(sets, vec![2, 1, 1]);
        assert_eq!(deloaded.exercises[1].load, Load::Timed(30));
        assert_eq!(deloaded.exercises[0].rest_s, 60);
        // input untouched
        assert_eq!(plan.exercises[0].sets, 3);
    }

    #[test]
    fn adjust_applies_progression_then_deload_in_recovery_week() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let profile = Profile {
            program_start: Some(start),
            ..Profile::default()
        };
        let plan = plan_of(&["a"]);
        let catalog = chain_catalog();
        let m = mastered(&["a"]);

        let normal = adjust(&plan, &profile, &catalog, &m, start);
        assert_eq!(normal.exercises[0].exercise_id, "b");
        assert_eq!(normal.exercises[0].sets, 3);

        let week_three = start + chrono::Duration::days(21);
        let deload = adjust(&plan, &profile, &catalog, &m, week_three);
        assert_eq!(deload.exercises[0].exercise_id, "b");
        assert_eq!(deload.exercises[0].sets, 2);
    }
}
