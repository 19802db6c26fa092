//! In-memory dataset of arrays kept in their original element type

use std::fmt;

use ndarray::{arr0, ArrayD};

use crate::array::{common_first_dim, RawArray};
use crate::dataset::{check_index, resolve_keys, Dataset};
use crate::error::Result;

/// Dataset wrapping several arrays that share their first dimension.
///
/// Unlike [`TensorDataset`](crate::TensorDataset) no conversion happens: a
/// sample holds the `index`-th slice of every array in its stored type.
#[derive(Debug, Clone)]
pub struct ArrayDataset {
    keys: Vec<String>,
    arrays: Vec<RawArray>,
    len: usize,
}

impl ArrayDataset {
    /// Create a dataset with positional field names
    pub fn new(arrays: Vec<RawArray>) -> Result<Self> {
        Self::build(arrays.into_iter().map(|a| (None, a)).collect())
    }

    /// Create a dataset with named fields
    pub fn named<K: Into<String>>(fields: Vec<(K, RawArray)>) -> Result<Self> {
        Self::build(
            fields
                .into_iter()
                .map(|(k, a)| (Some(k.into()), a))
                .collect(),
        )
    }

    fn build(fields: Vec<(Option<String>, RawArray)>) -> Result<Self> {
        let (names, arrays): (Vec<_>, Vec<_>) = fields.into_iter().unzip();
        let keys = resolve_keys(names)?;
        let len = common_first_dim(
            keys.iter()
                .map(String::as_str)
                .zip(arrays.iter().map(RawArray::shape)),
        )?;
        Ok(Self { keys, arrays, len })
    }

    /// Field names in sample order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The stored arrays
    pub fn arrays(&self) -> &[RawArray] {
        &self.arrays
    }

    /// Per-field mean in `f64`, with the same axis rules as
    /// [`TensorDataset::mean`](crate::TensorDataset::mean)
    pub fn mean(&self, axis: Option<usize>) -> Result<Vec<ArrayD<f64>>> {
        self.arrays
            .iter()
            .map(|a| match axis {
                None => a.mean().map(|m| arr0(m).into_dyn()),
                Some(axis) => a.mean_axis(axis),
            })
            .collect()
    }
}

impl Dataset for ArrayDataset {
    type Item = Vec<RawArray>;

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<Vec<RawArray>> {
        check_index(index, self.len)?;
        self.arrays.iter().map(|a| a.row(index)).collect()
    }
}

impl fmt::Display for ArrayDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .keys
            .iter()
            .zip(&self.arrays)
            .map(|(key, a)| format!("Array {key}: {:?} {}", a.shape(), a.element_type()))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}
