use chrono::NaiveDate;
use itertools::Itertools;

use crate::plan::CompletedSessionRecord;

/// Consecutive calendar days, ending today, that each have a recorded
/// session. Any day without a record ends the streak, scheduled rest days
/// included.
pub fn current_streak(records: &[CompletedSessionRecord], today: NaiveDate) -> u32 {
    let dates = records.iter().map(|r| r.date).sorted_by(|a, b| b.cmp(a));
    streak_from_dates(dates, today)
}

fn streak_from_dates<I: Iterator<Item = NaiveDate>>(dates_desc: I, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = today;

    for date in dates_desc {
        if date == cursor {
            streak += 1;
            match cursor.pred_opt() {
                Some(prev) => cursor = prev,
                None => break,
            }
        } else if date < cursor {
            break;
        }
        // records dated after the cursor (future, or a second record for a
        // day already counted) are passed over
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::SessionPlan;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    fn on(date: NaiveDate) -> CompletedSessionRecord {
        CompletedSessionRecord {
            id: None,
            date,
            plan: SessionPlan::default(),
            completed_exercise_ids: vec![],
            rpe: None,
            duration_actual_s: 0,
        }
    }

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(current_streak(&[], d(10)), 0);
    }

    #[test]
    fn three_consecutive_days_then_gap() {
        let history = vec![on(d(8)), on(d(10)), on(d(6)), on(d(9))];
        assert_eq!(current_streak(&history, d(10)), 3);
    }

    #[test]
    fn gap_right_before_today_without_today() {
        let history = vec![on(d(8)), on(d(7))];
        assert_eq!(current_streak(&history, d(10)), 0);
    }

    #[test]
    fn missing_today_breaks_even_with_yesterday() {
        let history = vec![on(d(9)), on(d(8))];
        assert_eq!(current_streak(&history, d(10)), 0);
    }

    #[test]
    fn duplicate_records_on_one_day_count_once() {
        let history = vec![on(d(10)), on(d(10)), on(d(9))];
        assert_eq!(current_streak(&history, d(10)), 2);
    }

    #[test]
    fn future_records_are_ignored() {
        let history = vec![on(d(12)), on(d(10))];
        assert_eq!(current_streak(&history, d(10)), 1);
    }
}
