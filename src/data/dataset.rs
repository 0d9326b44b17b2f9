use std::{ops::Range, sync::Arc};

use ndarray::Array2;

use crate::DataError;

/// A single point cloud with its class.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSample {
    /// `[num_points, 3]` coordinates ordered (z, y, x).
    pub points: Array2<f32>,
    pub label: usize,
}

/// An indexable collection of samples that can be shared across loader threads.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces the sample at `index`.
    ///
    /// # Returns
    /// The sample or `OutOfBounds` if `index >= len`.
    fn get(&self, index: usize) -> Result<PointSample, DataError>;
}

/// A contiguous window over a shared dataset.
#[derive(Debug)]
pub struct Subset<D> {
    dataset: Arc<D>,
    range: Range<usize>,
}

impl<D> Clone for Subset<D> {
    fn clone(&self) -> Self {
        Self {
            dataset: Arc::clone(&self.dataset),
            range: self.range.clone(),
        }
    }
}

impl<D: Dataset> Subset<D> {
    /// Creates a new `Subset`, clamping `range` to the dataset.
    pub fn new(dataset: Arc<D>, range: Range<usize>) -> Self {
        let end = range.end.min(dataset.len());
        let start = range.start.min(end);

        Self {
            dataset,
            range: start..end,
        }
    }

    /// A subset covering the whole dataset.
    pub fn full(dataset: Arc<D>) -> Self {
        let len = dataset.len();
        Self::new(dataset, 0..len)
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn dataset(&self) -> &Arc<D> {
        &self.dataset
    }
}

impl<D: Dataset> Dataset for Subset<D> {
    fn len(&self) -> usize {
        self.range.len()
    }

    fn get(&self, index: usize) -> Result<PointSample, DataError> {
        if index >= self.len() {
            return Err(DataError::OutOfBounds {
                index,
                len: self.len(),
            });
        }

        self.dataset.get(self.range.start + index)
    }
}

/// Splits a dataset into contiguous (train, validation) subsets.
///
/// The first `floor(len * val_split)` indices validate; training takes the rest
/// except for the very last index.
pub fn split<D: Dataset>(dataset: Arc<D>, val_split: f64) -> (Subset<D>, Subset<D>) {
    let len = dataset.len();
    let split = ((len as f64 * val_split).floor() as usize).min(len);

    let val = Subset::new(Arc::clone(&dataset), 0..split);
    let train = Subset::new(dataset, split..len.saturating_sub(1));
    (train, val)
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    struct Indices(usize);

    impl Dataset for Indices {
        fn len(&self) -> usize {
            self.0
        }

        fn get(&self, index: usize) -> Result<PointSample, DataError> {
            if index >= self.0 {
                return Err(DataError::OutOfBounds { index, len: self.0 });
            }

            Ok(PointSample {
                points: Array2::zeros((1, 3)),
                label: index,
            })
        }
    }

    #[test]
    fn split_sizes() {
        for (len, val_split, val, train) in [
            (100, 0.15, 15, 84),
            (10, 0.15, 1, 8),
            (10, 0.7, 7, 2),
            (10, 0.9, 9, 0),
            (1, 0.15, 0, 0),
        ] {
            let (t, v) = split(Arc::new(Indices(len)), val_split);
            assert_eq!((v.len(), t.len()), (val, train), "len {len}");
        }
    }

    #[test]
    fn subsets_are_contiguous_windows() {
        let (train, val) = split(Arc::new(Indices(20)), 0.25);
        assert_eq!(val.range(), 0..5);
        assert_eq!(train.range(), 5..19);
        assert_eq!(train.get(0).unwrap().label, 5);
        assert_eq!(train.get(13).unwrap().label, 18);
        assert_eq!(
            train.get(14),
            Err(DataError::OutOfBounds { index: 14, len: 14 })
        );
    }
}
