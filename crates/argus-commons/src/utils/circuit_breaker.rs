use std::sync::Mutex;
use std::time::{
    Duration,
    Instant,
};

use log::{
    info,
    warn,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Numeric form used for the state gauge: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(&self) -> i64 {
        match self {
            BreakerState::Closed => 0,
            BreakerState::HalfOpen => 1,
            BreakerState::Open => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_duration: Duration,
    pub success_threshold: u32,
    pub suppressed_log_interval: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        BreakerSettings {
            failure_threshold: 3,
            open_duration: Duration::from_secs(30),
            success_threshold: 2,
            suppressed_log_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    last_log_at: Option<Instant>,
    suppressed_logs: u64,
}

/// Three-state circuit breaker shared by the Kubernetes API wrapper and the
/// L2 persistence layer. All transitions happen under one mutex; the timed
/// Open -> HalfOpen transition is applied on every state read.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        CircuitBreaker {
            name: name.into(),
            settings,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                last_log_at: None,
                suppressed_logs: 0,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap();
        self.advance(&mut inner);
        inner.state
    }

    /// Whether a protected call may proceed. Calls are refused only while
    /// the breaker is open.
    pub fn is_allowed(&self) -> bool {
        self.state() != BreakerState::Open
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.advance(&mut inner);
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.settings.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                    info!("circuit breaker '{}' closed", self.name);
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.advance(&mut inner);
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    self.open(&mut inner);
                }
            }
            BreakerState::HalfOpen => {
                self.open(&mut inner);
            }
            BreakerState::Open => {}
        }
    }

    /// Log gate: always passes while closed or half-open; while open it
    /// passes at most once per `suppressed_log_interval` and counts the
    /// suppressed occurrences, reported at the next half-open transition.
    pub fn should_log(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        self.advance(&mut inner);
        if inner.state != BreakerState::Open {
            return true;
        }
        let now = Instant::now();
        let due = match inner.last_log_at {
            None => true,
            Some(last) => now.duration_since(last) >= self.settings.suppressed_log_interval,
        };
        if due {
            inner.last_log_at = Some(now);
            true
        } else {
            inner.suppressed_logs += 1;
            false
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.consecutive_successes = 0;
        inner.last_log_at = None;
        warn!(
            "circuit breaker '{}' opened after {} consecutive failures",
            self.name, inner.consecutive_failures
        );
    }

    fn advance(&self, inner: &mut BreakerInner) {
        if inner.state != BreakerState::Open {
            return;
        }
        let opened_at = match inner.opened_at {
            Some(instant) => instant,
            None => return,
        };
        if opened_at.elapsed() >= self.settings.open_duration {
            inner.state = BreakerState::HalfOpen;
            inner.consecutive_successes = 0;
            if inner.suppressed_logs > 0 {
                info!(
                    "circuit breaker '{}' half-open; {} log lines were suppressed while open",
                    self.name, inner.suppressed_logs
                );
                inner.suppressed_logs = 0;
            } else {
                info!("circuit breaker '{}' half-open", self.name);
            }
        }
    }
}
