use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerErr;

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

/// Tunables of the staleness-bounded dispatch loop.
///
/// `quorum_size = num_workers` with `staleness_tolerance = 0` gives
/// synchronous barrier training; a tolerance larger than any reachable skew
/// gives fully asynchronous first-ready-first-served dispatch. Everything in
/// between bounds how far a fast worker may run ahead of the slowest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub num_workers: usize,
    pub quorum_size: usize,
    pub staleness_tolerance: u64,
    pub iteration_budget: u64,
    pub eval_interval: u64,
    /// Consecutive compute failures tolerated per worker before it is
    /// excluded from the run.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Base delay before a failed worker's re-dispatch; doubles per
    /// consecutive failure.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl SchedulerConfig {
    /// Creates a config with default retry hardening.
    ///
    /// # Arguments
    /// * `num_workers` - Size of the worker pool.
    /// * `quorum_size` - Usable contributions required per round.
    /// * `staleness_tolerance` - Allowed lead over the slowest worker.
    /// * `iteration_budget` - Number of rounds to run.
    /// * `eval_interval` - Rounds between evaluator invocations.
    pub fn new(
        num_workers: usize,
        quorum_size: usize,
        staleness_tolerance: u64,
        iteration_budget: u64,
        eval_interval: u64,
    ) -> Self {
        Self {
            num_workers,
            quorum_size,
            staleness_tolerance,
            iteration_budget,
            eval_interval,
            retry_limit: default_retry_limit(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }

    /// Checks the liveness-critical bounds before any round executes.
    ///
    /// # Arguments
    /// * `workers` - The number of workers actually provided.
    pub fn validate(&self, workers: usize) -> Result<(), SchedulerErr> {
        if self.num_workers == 0 {
            return Err(SchedulerErr::NoWorkers);
        }

        if workers != self.num_workers {
            return Err(SchedulerErr::WorkerCountMismatch {
                configured: self.num_workers,
                got: workers,
            });
        }

        if self.quorum_size == 0 || self.quorum_size > self.num_workers {
            return Err(SchedulerErr::InvalidQuorum {
                quorum: self.quorum_size,
                workers: self.num_workers,
            });
        }

        if self.iteration_budget == 0 {
            return Err(SchedulerErr::ZeroIterationBudget);
        }

        if self.eval_interval == 0 {
            return Err(SchedulerErr::ZeroEvalInterval);
        }

        Ok(())
    }

    /// Backoff before retry number `attempt` (1-based), doubling per
    /// consecutive failure.
    pub(crate) fn retry_backoff(&self, attempt: u32) -> Duration {
        let shift = (attempt - 1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1 << shift))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_must_fit_the_worker_pool() {
        let cfg = SchedulerConfig::new(3, 4, 0, 10, 1);
        assert!(matches!(
            cfg.validate(3),
            Err(SchedulerErr::InvalidQuorum {
                quorum: 4,
                workers: 3
            })
        ));

        let cfg = SchedulerConfig::new(3, 0, 0, 10, 1);
        assert!(matches!(
            cfg.validate(3),
            Err(SchedulerErr::InvalidQuorum { quorum: 0, .. })
        ));

        let cfg = SchedulerConfig::new(3, 3, 0, 10, 1);
        assert!(cfg.validate(3).is_ok());
    }

    #[test]
    fn worker_pool_must_match_the_config() {
        let cfg = SchedulerConfig::new(3, 1, 0, 10, 1);
        assert!(matches!(
            cfg.validate(2),
            Err(SchedulerErr::WorkerCountMismatch {
                configured: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = SchedulerConfig::new(1, 1, 0, 1, 1);

        assert_eq!(cfg.retry_backoff(1), Duration::from_millis(100));
        assert_eq!(cfg.retry_backoff(2), Duration::from_millis(200));
        assert_eq!(cfg.retry_backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn config_parses_from_json_with_retry_defaults() {
        let cfg: SchedulerConfig = serde_json::from_str(
            r#"{
                "num_workers": 4,
                "quorum_size": 2,
                "staleness_tolerance": 1,
                "iteration_budget": 100,
                "eval_interval": 10
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.quorum_size, 2);
        assert_eq!(cfg.retry_limit, 3);
        assert_eq!(cfg.retry_backoff_ms, 100);
    }
}
