use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, DataSource, dataset::InMemoryDataset};

/// A shuffling loader over an in-memory dataset.
///
/// Walks the dataset in a shuffled order; when the order is exhausted it
/// reshuffles and starts over, so callers never observe end-of-data. The
/// final batch of a pass may be short.
#[derive(Debug)]
pub struct ShuffledLoader {
    dataset: InMemoryDataset,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    rng: StdRng,
}

impl ShuffledLoader {
    /// Creates a new `ShuffledLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to draw from.
    /// * `batch_size` - The number of examples per batch.
    /// * `seed` - Seed for the shuffling rng, so runs are reproducible.
    ///
    /// # Panics
    /// If `batch_size` is zero.
    pub fn new(dataset: InMemoryDataset, batch_size: usize, seed: u64) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");

        let mut loader = Self {
            order: (0..dataset.len()).collect(),
            cursor: 0,
            dataset,
            batch_size,
            rng: StdRng::seed_from_u64(seed),
        };

        loader.restart();
        loader
    }

    /// Reshuffles the visit order and rewinds the cursor.
    fn restart(&mut self) {
        self.order.shuffle(&mut self.rng);
        self.cursor = 0;
    }
}

impl DataSource for ShuffledLoader {
    fn next_batch(&mut self) -> Batch {
        if self.cursor >= self.order.len() {
            self.restart();
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let picks = &self.order[self.cursor..end];
        let item_len = self.dataset.item_len();

        let mut xs = Vec::with_capacity(picks.len() * item_len);
        let mut ys = Vec::with_capacity(picks.len());

        for &idx in picks {
            xs.extend_from_slice(self.dataset.row(idx));
            ys.push(self.dataset.label(idx));
        }

        self.cursor = end;

        Batch {
            xs: xs.into_boxed_slice(),
            ys: ys.into_boxed_slice(),
            item_len,
        }
    }
}
