use std::{
    error::Error,
    fmt::{self, Display},
};

use coordinator::ApplyErr;

/// Scheduler construction and runtime failures.
#[derive(Debug)]
pub enum SchedulerErr {
    NoWorkers,
    InvalidQuorum {
        quorum: usize,
        workers: usize,
    },
    ZeroIterationBudget,
    ZeroEvalInterval,
    WorkerCountMismatch {
        configured: usize,
        got: usize,
    },
    WorkerNumbering {
        expected: usize,
        got: usize,
    },
    /// Fewer live workers remain than the quorum needs; continuing would
    /// block forever, so the run aborts instead.
    Starved {
        active: usize,
        quorum: usize,
    },
    Apply(ApplyErr),
}

impl Display for SchedulerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerErr::NoWorkers => f.write_str("at least one worker is required"),
            SchedulerErr::InvalidQuorum { quorum, workers } => write!(
                f,
                "quorum size {quorum} must be between 1 and the worker count {workers}"
            ),
            SchedulerErr::ZeroIterationBudget => f.write_str("iteration budget must be > 0"),
            SchedulerErr::ZeroEvalInterval => f.write_str("eval interval must be > 0"),
            SchedulerErr::WorkerCountMismatch { configured, got } => write!(
                f,
                "config names {configured} workers but {got} were provided"
            ),
            SchedulerErr::WorkerNumbering { expected, got } => write!(
                f,
                "worker ids must be contiguous from zero: slot {expected} holds worker {got}"
            ),
            SchedulerErr::Starved { active, quorum } => write!(
                f,
                "quorum starved: {active} eligible workers remain, {quorum} required"
            ),
            SchedulerErr::Apply(e) => write!(f, "apply failed: {e}"),
        }
    }
}

impl Error for SchedulerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SchedulerErr::Apply(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApplyErr> for SchedulerErr {
    fn from(value: ApplyErr) -> Self {
        Self::Apply(value)
    }
}
