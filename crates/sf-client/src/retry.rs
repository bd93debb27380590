//! Backoff sequences for request retries and job polling.

use rand::Rng;
use std::time::Duration;

/// Backoff strategy for determining delays between attempts.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    /// Constant delay.
    Constant,
    /// Linear increase in delay (delay * attempt).
    Linear,
    /// Exponential increase in delay (delay * factor^attempt).
    Exponential { factor: f64 },
    /// Exponential with random jitter to avoid thundering herd.
    ExponentialWithJitter { factor: f64 },
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed), capped at `max_delay`.
    pub fn delay(&self, attempt: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = match self {
            BackoffStrategy::Constant => initial_delay.as_secs_f64(),
            BackoffStrategy::Linear => initial_delay.as_secs_f64() * f64::from(attempt + 1),
            BackoffStrategy::Exponential { factor } => {
                initial_delay.as_secs_f64() * factor.powi(exponent)
            }
            BackoffStrategy::ExponentialWithJitter { factor } => {
                let base = initial_delay.as_secs_f64() * factor.powi(exponent);
                base + rand::rng().random::<f64>() * base
            }
        };

        if !secs.is_finite() || secs >= max_delay.as_secs_f64() {
            max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// An unbounded, capped sequence of delays.
///
/// Polling loops pull from this until their own deadline fires; retry loops
/// wrap it in a [`RetryPolicy`] to bound the number of attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: BackoffStrategy,
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(strategy: BackoffStrategy, initial: Duration, max: Duration) -> Self {
        Self {
            strategy,
            initial,
            max,
            attempt: 0,
        }
    }

    /// Number of delays handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The next delay in the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.strategy.delay(self.attempt, self.initial, self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff strategy to use.
    pub backoff: BackoffStrategy,
    /// Whether to respect Retry-After headers.
    pub respect_retry_after: bool,
    /// Maximum time to wait from Retry-After header.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::ExponentialWithJitter { factor: 2.0 },
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Disable retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }
}

/// Bounded retry schedule for a single request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff: Backoff,
    max_attempts: u32,
    respect_retry_after: bool,
    max_retry_after: Duration,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            backoff: Backoff::new(config.backoff, config.initial_delay, config.max_delay),
            max_attempts: config.max_attempts,
            respect_retry_after: config.respect_retry_after,
            max_retry_after: config.max_retry_after,
        }
    }

    /// Retries handed out so far.
    pub fn attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    pub fn should_retry(&self) -> bool {
        self.attempt() < self.max_attempts
    }

    /// Record an attempt and return the delay before the next retry,
    /// or `None` once every attempt has been used.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let computed = self.backoff.next_delay();
        match retry_after {
            Some(server_hint) if self.respect_retry_after => {
                Some(server_hint.min(self.max_retry_after))
            }
            _ => Some(computed),
        }
    }
}
