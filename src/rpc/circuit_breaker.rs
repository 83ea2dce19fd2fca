use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-operation rolling-window circuit breaker (spec §4.1: "rolling
/// 10-call window, min 5 calls, trips OPEN at 50% failure rate, 30s OPEN,
/// HALF-OPEN single probe"). State lives behind a `std::sync::Mutex`,
/// matching the teacher's `RateLimiter`'s `Mutex<HashMap<...>>` shape
/// rather than reaching for `dashmap` (absent from the retrieval pack).
pub struct CircuitBreaker {
    window_size: usize,
    min_calls: usize,
    failure_threshold: f64,
    open_duration: Duration,
    state: Mutex<State>,
}

struct State {
    results: VecDeque<bool>,
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open(Instant),
    HalfOpen,
}

impl CircuitBreaker {
    pub fn new(window_size: usize, min_calls: usize, failure_threshold: f64, open_duration: Duration) -> Self {
        CircuitBreaker {
            window_size,
            min_calls,
            failure_threshold,
            open_duration,
            state: Mutex::new(State {
                results: VecDeque::with_capacity(window_size),
                phase: Phase::Closed,
            }),
        }
    }

    /// Whether a new call is currently allowed through. Transitions OPEN ->
    /// HALF-OPEN once `open_duration` has elapsed, admitting exactly one
    /// probe call.
    pub fn allow_request(&self) -> bool {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        match state.phase {
            Phase::Closed => true,
            Phase::HalfOpen => false,
            Phase::Open(opened_at) => {
                if opened_at.elapsed() >= self.open_duration {
                    state.phase = Phase::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        if state.phase == Phase::HalfOpen {
            state.phase = Phase::Closed;
            state.results.clear();
            return;
        }
        push(&mut state.results, self.window_size, true);
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        if state.phase == Phase::HalfOpen {
            state.phase = Phase::Open(Instant::now());
            state.results.clear();
            return;
        }

        push(&mut state.results, self.window_size, false);

        if state.results.len() >= self.min_calls {
            let failures = state.results.iter().filter(|ok| !**ok).count();
            let failure_rate = failures as f64 / state.results.len() as f64;
            if failure_rate >= self.failure_threshold {
                state.phase = Phase::Open(Instant::now());
                state.results.clear();
            }
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state.lock().expect("circuit breaker lock poisoned").phase,
            Phase::Open(_)
        )
    }
}

fn push(results: &mut VecDeque<bool>, window_size: usize, ok: bool) {
    if results.len() == window_size {
        results.pop_front();
    }
    results.push_back(ok);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_below_min_calls() {
        let breaker = CircuitBreaker::new(10, 5, 0.5, Duration::from_secs(30));
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(breaker.allow_request());
        assert!(!breaker.is_open());
    }

    #[test]
    fn trips_open_at_failure_threshold() {
        let breaker = CircuitBreaker::new(10, 5, 0.5, Duration::from_secs(30));
        for _ in 0..3 {
            breaker.record_success();
        }
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
        assert!(!breaker.allow_request());
    }

    #[test]
    fn half_open_probe_recovers_to_closed_on_success() {
        let breaker = CircuitBreaker::new(10, 5, 0.5, Duration::from_millis(1));
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.allow_request(), "half-open should admit a probe");
        breaker.record_success();
        assert!(!breaker.is_open());
        assert!(breaker.allow_request());
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(10, 5, 0.5, Duration::from_millis(1));
        for _ in 0..5 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.allow_request());
        breaker.record_failure();
        assert!(breaker.is_open());
    }
}
