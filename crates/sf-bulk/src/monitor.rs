//! Polling a job until it reaches a terminal state.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use sf_toolkit_client::{Backoff, BackoffStrategy};

use crate::error::{Error, ErrorKind, Result};
use crate::types::JobState;

/// Delay schedule between job status checks.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each check.
    pub factor: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 1.5,
        }
    }
}

impl PollConfig {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(
            BackoffStrategy::Exponential {
                factor: self.factor,
            },
            self.initial_delay,
            self.max_delay,
        )
    }
}

/// A job handle that can re-read its remote state.
pub(crate) trait PollTarget {
    fn job_id(&self) -> &str;

    async fn refresh_state(&mut self) -> Result<JobState>;
}

/// Refresh `job` until it is terminal or `timeout` elapses.
///
/// Timing out leaves the remote job running.
pub(crate) async fn wait_until_terminal<J: PollTarget>(
    job: &mut J,
    timeout: Duration,
    config: &PollConfig,
) -> Result<JobState> {
    let deadline = Instant::now() + timeout;
    let mut backoff = config.backoff();

    loop {
        let state = job.refresh_state().await?;
        if state.is_terminal() {
            return Ok(state);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::new(ErrorKind::Timeout(format!(
                "job {} still {state:?} after {timeout:?}",
                job.job_id()
            ))));
        }

        let delay = backoff.next_delay().min(deadline - now);
        debug!(job_id = job.job_id(), ?state, ?delay, "Job not finished");
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        states: Vec<JobState>,
        checks: usize,
    }

    impl PollTarget for Scripted {
        fn job_id(&self) -> &str {
            "750000000000001AAA"
        }

        async fn refresh_state(&mut self) -> Result<JobState> {
            let state = self.states[self.checks.min(self.states.len() - 1)];
            self.checks += 1;
            Ok(state)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_terminal() {
        let mut job = Scripted {
            states: vec![JobState::UploadComplete, JobState::InProgress, JobState::JobComplete],
            checks: 0,
        };
        let state = wait_until_terminal(&mut job, Duration::from_secs(60), &PollConfig::default())
            .await
            .unwrap();
        assert_eq!(state, JobState::JobComplete);
        assert_eq!(job.checks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let mut job = Scripted {
            states: vec![JobState::InProgress],
            checks: 0,
        };
        let started = Instant::now();
        let err = wait_until_terminal(&mut job, Duration::from_secs(10), &PollConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(job.checks > 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = PollConfig::default()
            .with_initial_delay(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(5))
            .with_factor(2.0);
        let mut backoff = config.backoff();
        let delays: Vec<_> = (0..4).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5)
            ]
        );
    }
}
