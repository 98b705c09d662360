use coordinator::{Contribution, Snapshot};
use log::debug;

use crate::{
    data::DataSource,
    error::ComputeErr,
    model::Model,
};

/// A unit the scheduler can dispatch compute requests to.
///
/// Implementations are moved into blocking tasks by the dispatcher, one
/// outstanding request per unit, and handed back with the result.
pub trait Compute: Send {
    /// The stable worker identifier.
    fn id(&self) -> usize;

    /// Computes one contribution against `snapshot`.
    fn compute(&mut self, snapshot: &Snapshot) -> Result<Contribution, ComputeErr>;
}

/// A worker: a private data cursor plus a model, stateless from the
/// coordinator's point of view.
///
/// Workers share no mutable state with each other; everything a worker
/// learns about other rounds arrives through the snapshots it is given.
pub struct Worker<D, M> {
    id: usize,
    source: D,
    model: M,
}

impl<D, M> Worker<D, M> {
    /// Creates a new `Worker`.
    ///
    /// # Arguments
    /// * `id` - The worker identifier, unique within a run.
    /// * `source` - The worker's private batch source.
    /// * `model` - The forward/backward collaborator.
    pub fn new(id: usize, source: D, model: M) -> Self {
        Self { id, source, model }
    }
}

impl<D: DataSource, M: Model> Compute for Worker<D, M> {
    fn id(&self) -> usize {
        self.id
    }

    /// Reads one batch from the local source (which restarts itself when
    /// exhausted) and runs the model on `(snapshot, batch)`. The returned
    /// contribution is tagged with the snapshot's version.
    fn compute(&mut self, snapshot: &Snapshot) -> Result<Contribution, ComputeErr> {
        let batch = self.source.next_batch();

        debug!(
            worker_id = self.id,
            version = snapshot.version,
            batch_len = batch.len();
            "computing contribution"
        );

        let payload = self
            .model
            .gradient(&snapshot.params, &batch)
            .map_err(|source| ComputeErr {
                worker_id: self.id,
                source,
            })?;

        Ok(Contribution {
            worker_id: self.id,
            payload,
            version: snapshot.version,
        })
    }
}
