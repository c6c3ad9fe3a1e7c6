//! Live training session: preview, timed sets, rests and the closing
//! effort rating, driven one timer tick or user action at a time.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::{Duration, SystemTime};

use crate::catalog::{Exercise, ExerciseCatalog};
use crate::plan::{is_valid_rpe, Load, PlanExercise, SessionPlan, SECS_PER_REP};
use crate::runtime::{ArmedTimer, TimerSlot, TimerToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Rest inserted when moving on to the next exercise
    pub rest_before_next_exercise_s: u32,
    /// Pause between picking a rating and finalizing
    pub settle_delay: Duration,
    pub secs_per_rep: u32,
    /// One countdown step; a second outside of tests
    pub tick: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            rest_before_next_exercise_s: 15,
            settle_delay: Duration::from_millis(400),
            secs_per_rep: SECS_PER_REP,
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestKind {
    BetweenSets,
    BeforeNextExercise,
}

/// Where the session is. `exercise` always indexes the active list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preview,
    Exercising {
        exercise: usize,
        set: u8,
        remaining_s: u32,
    },
    /// Position is already advanced to the set that follows the rest
    Resting {
        exercise: usize,
        set: u8,
        remaining_s: u32,
        kind: RestKind,
    },
    Rating {
        selected: Option<u8>,
    },
    Complete,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Aborted)
    }
}

/// What a finished session hands to the caller for persistence
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    /// The active list as performed, swaps included
    pub performed: SessionPlan,
    pub completed_exercise_ids: Vec<String>,
    pub rpe: Option<u8>,
    pub duration_actual_s: u32,
}

/// Returned by `abort`; carries no effort data
#[derive(Debug, Clone, PartialEq)]
pub struct AbortSummary {
    /// Exercises whose every set was finished before the abort
    pub finished_exercise_ids: Vec<String>,
    pub elapsed_s: u32,
}

pub struct SessionEngine<R: Rng = StdRng> {
    plan: SessionPlan,
    skipped: Vec<bool>,
    active: Vec<PlanExercise>,
    catalog: ExerciseCatalog,
    rng: R,
    timing: SessionTiming,
    timer: TimerSlot,
    phase: Phase,
    started_at: Option<SystemTime>,
    completion: Option<SessionCompletion>,
}

impl SessionEngine<StdRng> {
    pub fn with_entropy(plan: SessionPlan, catalog: ExerciseCatalog, timing: SessionTiming) -> Self {
        Self::new(plan, catalog, StdRng::from_entropy(), timing)
    }
}

impl<R: Rng> SessionEngine<R> {
    pub fn new(plan: SessionPlan, catalog: ExerciseCatalog, rng: R, timing: SessionTiming) -> Self {
        let skipped = vec![false; plan.exercise_count()];
        Self {
            plan,
            skipped,
            active: Vec::new(),
            catalog,
            rng,
            timing,
            timer: TimerSlot::default(),
            phase: Phase::Preview,
            started_at: None,
            completion: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    pub fn active(&self) -> &[PlanExercise] {
        &self.active
    }

    pub fn catalog(&self) -> &ExerciseCatalog {
        &self.catalog
    }

    pub fn is_skipped(&self, idx: usize) -> bool {
        self.skipped.get(idx).copied().unwrap_or(false)
    }

    pub fn armed_timer(&self) -> Option<ArmedTimer> {
        self.timer.armed()
    }

    pub fn completion(&self) -> Option<&SessionCompletion> {
        self.completion.as_ref()
    }

    /// Active-list entry the current phase refers to
    pub fn current_exercise(&self) -> Option<&PlanExercise> {
        match self.phase {
            Phase::Exercising { exercise, .. } | Phase::Resting { exercise, .. } => {
                self.active.get(exercise)
            }
            _ => None,
        }
    }

    /// Seconds left on the visible countdown
    pub fn countdown(&self) -> Option<u32> {
        match self.phase {
            Phase::Exercising { remaining_s, .. } | Phase::Resting { remaining_s, .. } => {
                Some(remaining_s)
            }
            _ => None,
        }
    }

    pub fn set_duration_s(&self, entry: &PlanExercise) -> u32 {
        match entry.load {
            Load::Timed(secs) => secs,
            Load::Reps(reps) => reps as u32 * self.timing.secs_per_rep,
        }
    }

    /// Flip the skip flag of a preview entry. Returns the new flag.
    pub fn toggle_skip(&mut self, idx: usize) -> bool {
        if self.phase != Phase::Preview {
            return self.is_skipped(idx);
        }
        match self.skipped.get_mut(idx) {
            Some(flag) => {
                *flag = !*flag;
                *flag
            }
            None => false,
        }
    }

    pub fn start(&mut self) {
        if self.phase != Phase::Preview {
            return;
        }
        self.active = self
            .plan
            .exercises
            .iter()
            .zip(&self.skipped)
            .filter(|(_, skipped)| !**skipped)
            .map(|(entry, _)| entry.clone())
            .collect();
        self.started_at = Some(SystemTime::now());
        tracing::info!(
            exercises = self.active.len(),
            skipped = self.plan.exercise_count() - self.active.len(),
            "session started"
        );

        if self.active.is_empty() {
            self.finalize(None);
        } else {
            self.enter_exercise(0, 0);
        }
    }

    /// Apply one elapsed interval of the timer identified by `token`.
    /// Ticks from a timer that is no longer armed are ignored.
    pub fn tick(&mut self, token: TimerToken) -> bool {
        if !self.timer.is_live(token) {
            tracing::trace!(?token, "stale tick dropped");
            return false;
        }

        match self.phase {
            Phase::Exercising {
                exercise,
                set,
                remaining_s,
            } => {
                let remaining_s = remaining_s.saturating_sub(1);
                if remaining_s == 0 {
                    self.finish_set();
                } else {
                    self.phase = Phase::Exercising {
                        exercise,
                        set,
                        remaining_s,
                    };
                }
            }
            Phase::Resting {
                exercise,
                set,
                remaining_s,
                kind,
            } => {
                let remaining_s = remaining_s.saturating_sub(1);
                if remaining_s == 0 {
                    self.enter_exercise(exercise, set);
                } else {
                    self.phase = Phase::Resting {
                        exercise,
                        set,
                        remaining_s,
                        kind,
                    };
                }
            }
            Phase::Rating { selected: Some(rpe) } => self.finalize(Some(rpe)),
            _ => return false,
        }
        true
    }

    pub fn skip_set(&mut self) {
        if matches!(self.phase, Phase::Exercising { .. }) {
            self.finish_set();
        }
    }

    pub fn skip_rest(&mut self) {
        if let Phase::Resting { exercise, set, .. } = self.phase {
            self.enter_exercise(exercise, set);
        }
    }

    /// Replace the current exercise with another one of the same movement
    /// pattern that is not already in the session. Returns the new id, or
    /// `None` when there is no alternative.
    pub fn swap_exercise(&mut self) -> Option<String> {
        let Phase::Exercising { exercise, .. } = self.phase else {
            return None;
        };
        let current = self.active.get(exercise)?.exercise_id.clone();

        let candidates: Vec<&Exercise> = self
            .catalog
            .same_pattern(&current)
            .into_iter()
            .filter(|e| !self.active.iter().any(|a| a.exercise_id == e.id))
            .collect();
        let chosen = *candidates.choose(&mut self.rng)?;
        let replacement = chosen.id.clone();
        let hold_s = chosen.is_timed().then_some(chosen.duration_s);

        tracing::info!(from = %current, to = %replacement, "exercise swapped");
        let entry = &mut self.active[exercise];
        entry.exercise_id = replacement.clone();
        if let Some(secs) = hold_s {
            entry.load = Load::Timed(secs);
        }
        self.enter_exercise(exercise, 0);
        Some(replacement)
    }

    /// Mark a rating; the session finalizes once the settle delay passes.
    /// Choosing again restarts the delay.
    pub fn select_rating(&mut self, rpe: u8) -> bool {
        if !matches!(self.phase, Phase::Rating { .. }) || !is_valid_rpe(rpe) {
            return false;
        }
        self.phase = Phase::Rating {
            selected: Some(rpe),
        };
        self.timer.arm(self.timing.settle_delay);
        true
    }

    pub fn skip_rating(&mut self) {
        if matches!(self.phase, Phase::Rating { .. }) {
            self.finalize(None);
        }
    }

    /// Leave the session from any non-terminal phase. No effort data is
    /// produced; persisting anything is up to the caller.
    pub fn abort(&mut self) -> Option<AbortSummary> {
        if self.phase.is_terminal() {
            return None;
        }
        let finished = match self.phase {
            Phase::Exercising { exercise, .. } | Phase::Resting { exercise, .. } => exercise,
            Phase::Rating { .. } => self.active.len(),
            _ => 0,
        };
        self.timer.cancel();
        self.phase = Phase::Aborted;

        let summary = AbortSummary {
            finished_exercise_ids: self.active[..finished.min(self.active.len())]
                .iter()
                .map(|e| e.exercise_id.clone())
                .collect(),
            elapsed_s: self.elapsed_s(),
        };
        tracing::info!(finished = summary.finished_exercise_ids.len(), "session aborted");
        Some(summary)
    }

    fn enter_exercise(&mut self, exercise: usize, set: u8) {
        let Some(entry) = self.active.get(exercise) else {
            self.enter_rating();
            return;
        };
        let remaining_s = self.set_duration_s(entry);
        if remaining_s == 0 {
            self.phase = Phase::Exercising {
                exercise,
                set,
                remaining_s,
            };
            self.finish_set();
            return;
        }

        tracing::debug!(exercise, set, remaining_s, "set started");
        self.phase = Phase::Exercising {
            exercise,
            set,
            remaining_s,
        };
        self.timer.arm(self.timing.tick);
    }

    fn finish_set(&mut self) {
        let Phase::Exercising { exercise, set, .. } = self.phase else {
            return;
        };
        let Some(entry) = self.active.get(exercise) else {
            self.enter_rating();
            return;
        };

        let (next_exercise, next_set, rest_s, kind) = if set + 1 < entry.sets {
            (exercise, set + 1, entry.rest_s, RestKind::BetweenSets)
        } else if exercise + 1 < self.active.len() {
            (
                exercise + 1,
                0,
                self.timing.rest_before_next_exercise_s,
                RestKind::BeforeNextExercise,
            )
        } else {
            self.enter_rating();
            return;
        };

        if rest_s == 0 {
            self.enter_exercise(next_exercise, next_set);
            return;
        }
        tracing::debug!(?kind, rest_s, "rest started");
        self.phase = Phase::Resting {
            exercise: next_exercise,
            set: next_set,
            remaining_s: rest_s,
            kind,
        };
        self.timer.arm(self.timing.tick);
    }

    fn enter_rating(&mut self) {
        self.timer.cancel();
        self.phase = Phase::Rating { selected: None };
        tracing::debug!("awaiting effort rating");
    }

    fn finalize(&mut self, rpe: Option<u8>) {
        self.timer.cancel();
        let completion = SessionCompletion {
            performed: SessionPlan::new(self.active.clone()),
            completed_exercise_ids: self.active.iter().map(|e| e.exercise_id.clone()).collect(),
            rpe,
            duration_actual_s: self.elapsed_s(),
        };
        tracing::info!(
            exercises = completion.completed_exercise_ids.len(),
            rpe = ?completion.rpe,
            duration_s = completion.duration_actual_s,
            "session complete"
        );
        self.completion = Some(completion);
        self.phase = Phase::Complete;
    }

    fn elapsed_s(&self) -> u32 {
        self.started_at
            .and_then(|t| t.elapsed().ok())
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }
}
