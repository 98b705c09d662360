use std::{
    error::Error,
    fmt::{self, Display},
};

/// Failure reported by a model's forward/backward pass on a well-formed
/// batch. A collaborator contract violation, not a transient condition.
#[derive(Debug)]
pub struct ModelErr(String);

impl ModelErr {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model error: {}", self.0)
    }
}

impl Error for ModelErr {}

/// A failed compute request, tagged with the worker it ran on.
#[derive(Debug)]
pub struct ComputeErr {
    pub worker_id: usize,
    pub source: ModelErr,
}

impl Display for ComputeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compute failed on worker {}: {}",
            self.worker_id, self.source
        )
    }
}

impl Error for ComputeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
