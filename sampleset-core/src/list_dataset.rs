//! Dataset over plain in-memory sequences

use std::fmt;

use crate::dataset::{check_index, Dataset};
use crate::error::{Error, Result};
use crate::transform::{positional_keys, DataTransform, FieldHooks, TransformContext};

/// Dataset zipping several equal-length sequences.
///
/// Sample `i` holds the `i`-th element of every sequence, optionally passed
/// through a transform. Fields are named by position (`"0"`, `"1"`, ...).
pub struct ListDataset<T> {
    /// The wrapped sequences
    sequences: Vec<Vec<T>>,

    /// Shared sequence length
    len: usize,

    /// Per-field functions offered to the transform
    hooks: FieldHooks<T>,

    /// Optional per-sample transform
    transform: Option<Box<dyn DataTransform<T>>>,
}

impl<T: Clone + Send + Sync + 'static> ListDataset<T> {
    /// Create a dataset from sequences of equal length
    pub fn new(sequences: Vec<Vec<T>>) -> Result<Self> {
        let len = sequences
            .first()
            .map(Vec::len)
            .ok_or_else(|| Error::Configuration("at least one sequence is required".into()))?;
        for (position, sequence) in sequences.iter().enumerate().skip(1) {
            if sequence.len() != len {
                return Err(Error::Configuration(format!(
                    "sequence {position} has length {}, but sequence 0 has {len}",
                    sequence.len()
                )));
            }
        }

        Ok(Self {
            sequences,
            len,
            hooks: FieldHooks::new(),
            transform: None,
        })
    }

    /// Set the per-field functions offered to the transform.
    ///
    /// An already attached transform is initialized again so it binds the new hooks.
    pub fn with_hooks(mut self, hooks: FieldHooks<T>) -> Result<Self> {
        self.hooks = hooks;
        if let Some(mut transform) = self.transform.take() {
            self.bind(&mut *transform)?;
            self.transform = Some(transform);
        }
        Ok(self)
    }

    /// Attach and initialize a per-sample transform
    pub fn with_transform(mut self, transform: impl DataTransform<T> + 'static) -> Result<Self> {
        let mut transform: Box<dyn DataTransform<T>> = Box::new(transform);
        self.bind(&mut *transform)?;
        self.transform = Some(transform);
        Ok(self)
    }

    fn bind(&self, transform: &mut dyn DataTransform<T>) -> Result<()> {
        let keys = positional_keys(self.sequences.len());
        transform.initialize(&TransformContext::new(&keys, &self.hooks))
    }

    /// The attached transform, if any
    pub fn transform(&self) -> Option<&dyn DataTransform<T>> {
        self.transform.as_deref()
    }

    /// The wrapped sequences
    pub fn sequences(&self) -> &[Vec<T>] {
        &self.sequences
    }
}

impl<T: Clone + Send + Sync + 'static> Dataset for ListDataset<T> {
    type Item = Vec<T>;

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<Vec<T>> {
        check_index(index, self.len)?;
        let sample: Vec<T> = self.sequences.iter().map(|s| s[index].clone()).collect();
        match &self.transform {
            Some(transform) => transform.apply(sample),
            None => Ok(sample),
        }
    }
}

impl<T> fmt::Display for ListDataset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .sequences
            .iter()
            .enumerate()
            .map(|(i, s)| format!("List {i}: {}", s.len()))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}
