use crate::error::{NemError, Result};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::cell::Cell;
use std::time::Duration;

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retrying.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Randomisation factor in `[0, 1]`: a delay `d` is drawn from
    /// `[d * (1 - jitter), d * (1 + jitter)]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(NemError::Configuration(
                "retry max_attempts must be at least 1".into(),
            ));
        }
        if self.multiplier < 1.0 {
            return Err(NemError::Configuration(
                "retry multiplier must be >= 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(NemError::Configuration(
                "retry jitter must be between 0.0 and 1.0".into(),
            ));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(NemError::Configuration(
                "initial_backoff must not exceed max_backoff".into(),
            ));
        }
        Ok(())
    }

    /// Backoff schedule for this policy. Elapsed time is unbounded; the
    /// attempt count is what stops retrying.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.jitter)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `op`, retrying while it fails with a transient error. `op`
    /// receives the 1-based attempt number.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let attempt = Cell::new(0);
        let outcome = backoff::retry_notify(
            self.backoff(),
            || {
                attempt.set(attempt.get() + 1);
                match op(attempt.get()) {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_transient() && attempt.get() < self.max_attempts => {
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            },
            |e: NemError, wait: Duration| {
                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt.get(),
                    self.max_attempts,
                    e,
                    wait
                );
            },
        );

        match outcome {
            Ok(value) => {
                if attempt.get() > 1 {
                    log::debug!("{} succeeded on attempt {}", what, attempt.get());
                }
                Ok(value)
            }
            Err(backoff::Error::Permanent(e)) => Err(e),
            Err(backoff::Error::Transient { err, .. }) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::backoff::Backoff;
    use std::io;

    fn transient() -> NemError {
        NemError::Io(io::Error::new(io::ErrorKind::Interrupted, "blip"))
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(4))
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = RetryPolicy::default()
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(300))
            .with_jitter(0.0)
            .backoff();
        let delays: Vec<Duration> = (0..4).filter_map(|_| backoff.next_backoff()).collect();
        let expected = [100, 200, 300, 300];
        for (delay, ms) in delays.iter().zip(expected) {
            let ms = Duration::from_millis(ms);
            assert!(*delay >= ms && *delay < ms + Duration::from_millis(1), "{delay:?}");
        }
        assert_eq!(delays.len(), 4);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::default()
            .with_initial_backoff(Duration::from_millis(100))
            .with_jitter(0.5);
        for _ in 0..100 {
            let d = policy.backoff().next_backoff().unwrap();
            assert!(d >= Duration::from_millis(49) && d <= Duration::from_millis(151), "{d:?}");
        }
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let mut calls = 0;
        let out = fast()
            .run("scan", |_| {
                calls += 1;
                if calls < 3 {
                    Err(transient())
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let err = fast()
            .with_max_attempts(2)
            .run::<(), _>("scan", |_| {
                calls += 1;
                Err(transient())
            })
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_permanent_errors_not_retried() {
        let mut calls = 0;
        let _ = fast().run::<(), _>("scan", |_| {
            calls += 1;
            Err(NemError::schema("prices_5min", "bad"))
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::default().with_max_attempts(0).validate().is_err());
        assert!(RetryPolicy::default().with_jitter(1.5).validate().is_err());
    }
}
