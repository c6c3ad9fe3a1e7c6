use std::collections::{BTreeMap, BTreeSet};

use crate::plan::ExerciseEffortLog;
use crate::profile::Profile;

/// Logged ratings needed before the average is trusted
pub const MIN_LOGS: u32 = 2;
/// Ratings at or below this count as easy
pub const EASY_RPE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpeStat {
    pub avg_rpe: f64,
    pub count: u32,
}

/// Average rating and count per exercise id
pub fn rpe_stats(logs: &[ExerciseEffortLog]) -> BTreeMap<String, RpeStat> {
    let mut sums: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for log in logs {
        let entry = sums.entry(log.exercise_id.as_str()).or_default();
        entry.0 += log.rpe as u32;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(id, (sum, count))| {
            (
                id.to_string(),
                RpeStat {
                    avg_rpe: sum as f64 / count as f64,
                    count,
                },
            )
        })
        .collect()
}

pub fn qualifies_for_progression(stat: &RpeStat) -> bool {
    stat.count >= MIN_LOGS && stat.avg_rpe <= EASY_RPE as f64
}

/// Exercises treated as mastered: the profile's promoted set plus every
/// exercise whose logged ratings qualify.
pub fn mastered_set(profile: &Profile, stats: &BTreeMap<String, RpeStat>) -> BTreeSet<String> {
    let mut mastered = profile.mastered_exercises.clone();
    mastered.extend(
        stats
            .iter()
            .filter(|(_, stat)| qualifies_for_progression(stat))
            .map(|(id, _)| id.clone()),
    );
    mastered
}

/// An easy session promotes everything completed that day. Returns true
/// when the profile changed.
pub fn promote_easy_session(profile: &mut Profile, completed_ids: &[String], rpe: Option<u8>) -> bool {
    match rpe {
        Some(r) if r <= EASY_RPE => {
            let before = profile.mastered_exercises.len();
            profile.mastered_exercises.extend(completed_ids.iter().cloned());
            profile.mastered_exercises.len() != before
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(id: &str, rpe: u8) -> ExerciseEffortLog {
        ExerciseEffortLog {
            session_id: 1,
            exercise_id: id.to_string(),
            rpe,
        }
    }

    #[test]
    fn stats_group_and_average() {
        let stats = rpe_stats(&[log("a", 4), log("a", 6), log("b", 9)]);
        assert_eq!(stats["a"], RpeStat { avg_rpe: 5.0, count: 2 });
        assert_eq!(stats["b"], RpeStat { avg_rpe: 9.0, count: 1 });
        assert!(rpe_stats(&[]).is_empty());
    }

    #[test]
    fn qualification_needs_count_and_low_average() {
        assert!(qualifies_for_progression(&RpeStat { avg_rpe: 5.0, count: 2 }));
        assert!(!qualifies_for_progression(&RpeStat { avg_rpe: 3.0, count: 1 }));
        assert!(!qualifies_for_progression(&RpeStat { avg_rpe: 5.5, count: 4 }));
    }

    #[test]
    fn mastered_set_unions_both_pathways() {
        let profile = Profile {
            mastered_exercises: BTreeSet::from(["promoted".to_string()]),
            ..Profile::default()
        };
        let stats = rpe_stats(&[log("logged", 3), log("logged", 4), log("hard", 8), log("hard", 9)]);
        let mastered = mastered_set(&profile, &stats);
        assert!(mastered.contains("promoted"));
        assert!(mastered.contains("logged"));
        assert!(!mastered.contains("hard"));
    }

    #[test]
    fn easy_session_promotes_completed_exercises() {
        let mut profile = Profile::default();
        let done = vec!["a".to_string(), "b".to_string()];
        assert!(promote_easy_session(&mut profile, &done, Some(5)));
        assert_eq!(profile.mastered_exercises.len(), 2);
        // already mastered, nothing changes
        assert!(!promote_easy_session(&mut profile, &done, Some(2)));
    }

    #[test]
    fn hard_or_unrated_session_promotes_nothing() {
        let mut profile = Profile::default();
        let done = vec!["a".to_string()];
        assert!(!promote_easy_session(&mut profile, &done, Some(6)));
        assert!(!promote_easy_session(&mut profile, &done, None));
        assert!(profile.mastered_exercises.is_empty());
    }
}
