use crate::error::SizeMismatchErr;

/// Defines the strategy for updating one tensor based on its aggregated
/// gradient. Implementations own whatever accumulator state the algorithm
/// needs, sized to the tensor at construction, persisting across calls for
/// the lifetime of the coordinator.
pub trait Optimizer {
    /// Updates the provided tensor using the aggregated gradient.
    ///
    /// # Arguments
    /// * `grad` - The aggregated gradient for this tensor.
    /// * `params` - The tensor to update in place.
    ///
    /// # Returns
    /// An error if `grad` and `params` lengths differ.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<(), SizeMismatchErr>;
}
