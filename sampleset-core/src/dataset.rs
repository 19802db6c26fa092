//! Dataset trait and index-scanning iterator

use std::iter::FusedIterator;

use crate::error::{Error, Result};

/// An indexable collection of samples
pub trait Dataset: Send + Sync {
    /// The type of sample produced by this dataset
    type Item;

    /// Get the number of samples in this dataset
    fn len(&self) -> usize;

    /// Get the sample at `index`
    ///
    /// Fails with [`Error::IndexOutOfBounds`] when `index >= self.len()`.
    fn get(&self, index: usize) -> Result<Self::Item>;

    /// Whether the dataset has no samples
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all samples in index order
    ///
    /// Every call starts a fresh scan from index zero.
    fn iter(&self) -> DatasetIter<'_, Self>
    where
        Self: Sized,
    {
        DatasetIter::new(self)
    }
}

/// Fail with [`Error::IndexOutOfBounds`] unless `index < len`
pub fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(Error::IndexOutOfBounds { index, len });
    }
    Ok(())
}

/// Field names for a set of optionally named fields
///
/// Unnamed fields are called by their position. Names must be unique.
pub(crate) fn resolve_keys(names: Vec<Option<String>>) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::with_capacity(names.len());
    for (position, name) in names.into_iter().enumerate() {
        let key = name.unwrap_or_else(|| position.to_string());
        if keys.contains(&key) {
            return Err(Error::Configuration(format!("duplicate field name {key}")));
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Iterator that reads a dataset sample by sample
pub struct DatasetIter<'a, D> {
    /// The dataset being scanned
    dataset: &'a D,

    /// Next index to read
    position: usize,

    /// Length captured when the scan started
    len: usize,
}

impl<'a, D: Dataset> DatasetIter<'a, D> {
    /// Start a scan at index zero
    pub fn new(dataset: &'a D) -> Self {
        Self {
            dataset,
            position: 0,
            len: dataset.len(),
        }
    }
}

impl<D: Dataset> Iterator for DatasetIter<'_, D> {
    type Item = Result<D::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.len {
            return None;
        }
        let item = self.dataset.get(self.position);
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.position;
        (remaining, Some(remaining))
    }
}

impl<D: Dataset> ExactSizeIterator for DatasetIter<'_, D> {}

impl<D: Dataset> FusedIterator for DatasetIter<'_, D> {}
