use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Identity of one armed countdown. Tokens are never reused, so a tick
/// carrying an old token can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// The live timer: its token and how often it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub token: TimerToken,
    pub interval: Duration,
}

/// The single timer slot of a session. Arming replaces whatever was armed
/// before; at most one timer is live at any instant.
#[derive(Debug, Default)]
pub struct TimerSlot {
    issued: u64,
    live: Option<ArmedTimer>,
}

impl TimerSlot {
    pub fn arm(&mut self, interval: Duration) -> TimerToken {
        self.issued += 1;
        let token = TimerToken(self.issued);
        self.live = Some(ArmedTimer { token, interval });
        token
    }

    pub fn cancel(&mut self) {
        self.live = None;
    }

    pub fn is_live(&self, token: TimerToken) -> bool {
        self.live.is_some_and(|t| t.token == token)
    }

    pub fn armed(&self) -> Option<ArmedTimer> {
        self.live
    }
}

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum CoachEvent {
    Key(KeyEvent),
    Resize,
    /// The armed timer with this token elapsed one interval
    Tick(TimerToken),
    /// Nothing happened within the idle interval
    Idle,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait CoachEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<CoachEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<CoachEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(CoachEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(CoachEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CoachEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CoachEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long to wait for input when no timer is armed
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<CoachEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<CoachEvent>) -> Self {
        Self { rx }
    }
}

impl CoachEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CoachEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time.
///
/// Deadlines are tracked per timer token: a newly armed token starts a
/// fresh interval, and input arriving mid-interval does not push the
/// deadline back.
pub struct Runner<E: CoachEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    pending: Option<(TimerToken, Instant)>,
}

impl<E: CoachEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
            pending: None,
        }
    }

    /// Blocks until the next input event or the armed timer's deadline
    pub fn step(&mut self, armed: Option<ArmedTimer>) -> CoachEvent {
        let Some(timer) = armed else {
            self.pending = None;
            return match self.event_source.recv_timeout(self.ticker.interval()) {
                Ok(ev) => ev,
                Err(_) => CoachEvent::Idle,
            };
        };

        let now = Instant::now();
        let deadline = match self.pending {
            Some((token, deadline)) if token == timer.token => deadline,
            _ => now + timer.interval,
        };
        self.pending = Some((timer.token, deadline));

        let wait = deadline.saturating_duration_since(now);
        match self.event_source.recv_timeout(wait) {
            Ok(ev) => ev,
            Err(err) => {
                if err == RecvTimeoutError::Disconnected {
                    std::thread::sleep(wait);
                }
                self.pending = Some((timer.token, deadline + timer.interval));
                CoachEvent::Tick(timer.token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn arming_replaces_the_live_timer() {
        let mut slot = TimerSlot::default();
        let first = slot.arm(Duration::from_secs(1));
        let second = slot.arm(Duration::from_secs(1));
        assert_ne!(first, second);
        assert!(!slot.is_live(first));
        assert!(slot.is_live(second));

        slot.cancel();
        assert!(!slot.is_live(second));
        assert!(slot.armed().is_none());
    }

    #[test]
    fn step_returns_idle_without_timer() {
        let (_tx, rx) = mpsc::channel();
        let mut runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        assert!(matches!(runner.step(None), CoachEvent::Idle));
    }

    #[test]
    fn step_ticks_with_armed_token() {
        let (_tx, rx) = mpsc::channel();
        let mut runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(50)),
        );
        let mut slot = TimerSlot::default();
        let token = slot.arm(Duration::from_millis(2));

        match runner.step(slot.armed()) {
            CoachEvent::Tick(t) => assert_eq!(t, token),
            other => panic!("expected Tick, got {other:?}"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(CoachEvent::Resize).unwrap();
        let mut runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );
        let mut slot = TimerSlot::default();
        slot.arm(Duration::from_secs(5));

        assert!(matches!(runner.step(slot.armed()), CoachEvent::Resize));
    }
}
