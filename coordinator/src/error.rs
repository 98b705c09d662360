use std::{
    error::Error,
    fmt::{self, Display},
};

/// Error returned by optimizer steps whenever the gradient length doesn't
/// match the tensor it is applied to.
#[derive(Debug, PartialEq, Eq)]
pub struct SizeMismatchErr;

impl Display for SizeMismatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the provided gradient length doesn't match the tensor size")
    }
}

impl Error for SizeMismatchErr {}

/// Fatal configuration failures, raised before any round executes.
#[derive(Debug, PartialEq)]
pub enum ConfigErr {
    UnknownAggregationRule(String),
    UnknownUpdateRule(String),
    NonPositiveLearningRate(f32),
    EmptyParameters,
}

impl Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::UnknownAggregationRule(name) => {
                write!(f, "unknown aggregation rule: {name:?} (expected sum or mean)")
            }
            ConfigErr::UnknownUpdateRule(name) => {
                write!(
                    f,
                    "unknown update rule: {name:?} (expected plain, momentum or adaptive)"
                )
            }
            ConfigErr::NonPositiveLearningRate(lr) => {
                write!(f, "learning rate must be positive, got {lr}")
            }
            ConfigErr::EmptyParameters => f.write_str("initial parameters hold no tensors"),
        }
    }
}

impl Error for ConfigErr {}

/// Failures of a single apply call.
///
/// Arity and shape mismatches mean a worker's model broke its contract;
/// the caller should treat them as unrecoverable for the run.
#[derive(Debug, PartialEq, Eq)]
pub enum ApplyErr {
    NoContributions,
    PayloadArity {
        worker_id: usize,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        position: usize,
    },
}

impl Display for ApplyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyErr::NoContributions => f.write_str("apply called with no contributions"),
            ApplyErr::PayloadArity {
                worker_id,
                got,
                expected,
            } => write!(
                f,
                "worker {worker_id} sent a payload with {got} tensors, expected {expected}"
            ),
            ApplyErr::ShapeMismatch { position } => {
                write!(f, "gradient shape mismatch at tensor position {position}")
            }
        }
    }
}

impl Error for ApplyErr {}
