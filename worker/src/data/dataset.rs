use std::sync::Arc;

/// A minimal in-memory dataset of flat feature rows and scalar labels.
///
/// Rows are stored flattened: example `i` occupies
/// `xs[i * item_len .. (i + 1) * item_len]`. The buffers are shared, so
/// cloning the dataset for several workers doesn't copy the data.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    xs: Arc<[f32]>,
    ys: Arc<[f32]>,
    item_len: usize,
}

impl InMemoryDataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Panics
    /// - if `item_len` is zero
    /// - if `xs.len() != ys.len() * item_len`
    /// - if `ys` is empty
    pub fn new(xs: Vec<f32>, ys: Vec<f32>, item_len: usize) -> Self {
        assert!(item_len > 0, "item_len must be > 0");
        assert!(!ys.is_empty(), "dataset must be non-empty");
        assert_eq!(
            xs.len(),
            ys.len() * item_len,
            "xs must hold item_len features per label"
        );

        Self {
            xs: xs.into(),
            ys: ys.into(),
            item_len,
        }
    }

    /// Returns the number of examples.
    #[inline]
    pub fn len(&self) -> usize {
        self.ys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ys.is_empty()
    }

    /// Returns the number of features per example.
    #[inline]
    pub fn item_len(&self) -> usize {
        self.item_len
    }

    /// Returns the feature row of example `idx` (panics if out of bounds).
    #[inline]
    pub fn row(&self, idx: usize) -> &[f32] {
        &self.xs[idx * self.item_len..(idx + 1) * self.item_len]
    }

    /// Returns the label of example `idx` (panics if out of bounds).
    #[inline]
    pub fn label(&self, idx: usize) -> f32 {
        self.ys[idx]
    }
}

/// An owned batch of training data, rows flattened like the dataset.
#[derive(Debug, Clone)]
pub struct Batch {
    pub xs: Box<[f32]>,
    pub ys: Box<[f32]>,
    pub item_len: usize,
}

impl Batch {
    /// Returns the number of examples in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.ys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ys.is_empty()
    }

    /// Returns the feature row of batch example `idx`.
    #[inline]
    pub fn row(&self, idx: usize) -> &[f32] {
        &self.xs[idx * self.item_len..(idx + 1) * self.item_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_indexes_rows_and_labels() {
        let ds = InMemoryDataset::new(vec![1.0, 2.0, 3.0, 4.0], vec![10.0, 20.0], 2);

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.item_len(), 2);
        assert_eq!(ds.row(1), &[3.0, 4.0]);
        assert_eq!(ds.label(0), 10.0);
    }

    #[test]
    #[should_panic(expected = "item_len features per label")]
    fn mismatched_buffers_are_rejected() {
        InMemoryDataset::new(vec![1.0, 2.0, 3.0], vec![10.0, 20.0], 2);
    }
}
