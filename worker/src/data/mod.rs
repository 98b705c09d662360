mod dataset;
mod loader;

pub use dataset::{Batch, InMemoryDataset};
pub use loader::ShuffledLoader;

/// A lazy, restartable, effectively infinite stream of labeled batches.
///
/// `next_batch` never signals exhaustion: when the underlying data runs out,
/// the source restarts itself (reshuffled) and keeps producing. Each worker
/// owns its source exclusively; the cursor is never shared.
pub trait DataSource: Send {
    /// Returns the next labeled batch.
    fn next_batch(&mut self) -> Batch;
}
