//! Weekly scheduling: which calendar days are training days and which
//! weeks of the program are recovery (deload) weeks.

use chrono::{Datelike, NaiveDate};

use crate::profile::Profile;

/// Frequency used when `sessions_per_week` is missing or outside the table
pub const DEFAULT_SESSIONS_PER_WEEK: u8 = 3;

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Every fourth program week is a recovery week
pub const DELOAD_CYCLE_WEEKS: i64 = 4;

/// Legacy weekday patterns keyed by sessions per week (0=Monday..6=Sunday)
pub fn workout_pattern(sessions_per_week: Option<u8>) -> &'static [u8] {
    match sessions_per_week {
        Some(2) => &[1, 4],
        Some(3) => &[0, 2, 4],
        Some(4) => &[0, 1, 3, 4],
        Some(5) => &[0, 1, 2, 3, 4],
        _ => workout_pattern(Some(DEFAULT_SESSIONS_PER_WEEK)),
    }
}

/// Monday=0..Sunday=6
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

pub fn is_training_day(date: NaiveDate, profile: &Profile) -> bool {
    let idx = weekday_index(date);
    if !profile.workout_days.is_empty() {
        return profile.workout_days.contains(&idx);
    }
    workout_pattern(profile.sessions_per_week).contains(&idx)
}

/// Zero-based program week containing `date`, or None before the program starts
pub fn week_number(profile: &Profile, date: NaiveDate) -> Option<i64> {
    let start = profile.program_start?;
    let days = (date - start).num_days();
    if days < 0 {
        return None;
    }
    Some(days / 7)
}

pub fn is_deload_week(profile: &Profile, date: NaiveDate) -> bool {
    week_number(profile, date).is_some_and(|week| (week + 1) % DELOAD_CYCLE_WEEKS == 0)
}

/// Seed handed to the plan generator: whole days since the Unix epoch
pub fn day_seed(date: NaiveDate) -> u32 {
    (date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE).max(0) as u32
}
