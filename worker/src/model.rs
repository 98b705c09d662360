use coordinator::{Parameters, Tensor};

use crate::{data::Batch, error::ModelErr};

/// The numeric model's forward/backward capability, an external collaborator.
///
/// Given a parameter snapshot and one batch, produces one gradient-style
/// payload: one entry per tensor position, `None` for frozen tensors. Pure
/// with respect to coordinator state; any internal randomness is fixed at
/// construction.
pub trait Model: Send {
    /// Computes the gradient payload for `batch` at `params`.
    ///
    /// # Returns
    /// A `ModelErr` only on a broken contract (the caller treats it as
    /// unrecoverable for the request).
    fn gradient(&self, params: &Parameters, batch: &Batch) -> Result<Vec<Option<Tensor>>, ModelErr>;
}

/// Measures model quality on held-out data, an external collaborator.
///
/// Stateful: implementations own their held-out data source.
pub trait Evaluator {
    /// Returns accuracy as a percentage in `[0, 100]` at `params`.
    fn accuracy(&mut self, params: &Parameters) -> f32;
}
