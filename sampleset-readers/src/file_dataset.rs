//! Dataset backed by a keyed array store on disk

use std::fmt;
use std::path::Path;

use sampleset_core::dataset::{check_index, Dataset};
use sampleset_core::error::{Error as CoreError, Result as CoreResult};
use sampleset_core::transform::{DataTransform, FieldHooks, TransformContext};
use sampleset_core::value::{Sample, Value};
use sampleset_transforms::default_pipeline;

use crate::config::DatasetConfig;
use crate::error::{Error, Result};
use crate::store::{ArrayHandle, KeyedArrayStore};

/// Options for [`FileDataset::open_with`]
#[derive(Default)]
pub struct FileDatasetOptions {
    /// Side-channel array exposed through [`FileDataset::info`]
    pub info_key: Option<String>,

    /// Per-sample transform, `Chain[FieldTransforms -> ToTensor]` when unset
    pub transform: Option<Box<dyn DataTransform<Value>>>,

    /// Per-field functions offered to the transform
    pub hooks: FieldHooks<Value>,
}

impl FileDatasetOptions {
    /// Expose the array named `key` through [`FileDataset::info`]
    #[must_use]
    pub fn info_key(mut self, key: impl Into<String>) -> Self {
        self.info_key = Some(key.into());
        self
    }

    /// Replace the default transform
    #[must_use]
    pub fn transform(mut self, transform: impl DataTransform<Value> + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Set the per-field functions
    #[must_use]
    pub fn hooks(mut self, hooks: FieldHooks<Value>) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Dataset whose fields are arrays in a [`KeyedArrayStore`].
///
/// Every field must have the same first dimension. A sample reads row `index`
/// of each field straight from the mapped file and passes the rows through
/// the transform. The mapping is released when the dataset is dropped or
/// [`close`](Self::close)d.
pub struct FileDataset {
    /// The open store
    store: KeyedArrayStore,

    /// Field keys in sample order
    keys: Vec<String>,

    /// Side-channel array name
    info_key: Option<String>,

    /// Shared first dimension
    len: usize,

    /// Per-sample transform
    transform: Box<dyn DataTransform<Value>>,
}

impl FileDataset {
    /// Open `path` exposing `keys` as fields, with the default transform
    pub fn open<P, K>(path: P, keys: &[K]) -> Result<Self>
    where
        P: AsRef<Path>,
        K: AsRef<str>,
    {
        Self::open_with(path, keys, FileDatasetOptions::default())
    }

    /// Open the store described by `config`, with the default transform
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        let options = FileDatasetOptions {
            info_key: config.info_key.clone(),
            ..FileDatasetOptions::default()
        };
        Self::open_with(&config.path, config.keys.as_slice(), options)
    }

    /// Open `path` exposing `keys` as fields
    pub fn open_with<P, K>(path: P, keys: &[K], options: FileDatasetOptions) -> Result<Self>
    where
        P: AsRef<Path>,
        K: AsRef<str>,
    {
        let store = KeyedArrayStore::open(path)?;
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let len = validate_fields(&store, &keys)?;

        if let Some(info_key) = &options.info_key {
            if !store.contains(info_key) {
                return Err(Error::Configuration(format!(
                    "could not find info array {info_key} in {}",
                    store.path().display()
                )));
            }
        }

        let mut transform = options
            .transform
            .unwrap_or_else(|| Box::new(default_pipeline()));
        transform.initialize(&TransformContext::new(&keys, &options.hooks))?;

        tracing::debug!(
            path = %store.path().display(),
            fields = ?keys,
            len,
            transform = %transform.describe(),
            "opened file dataset"
        );

        Ok(Self {
            store,
            keys,
            info_key: options.info_key,
            len,
            transform,
        })
    }

    /// Field keys in sample order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The underlying store
    pub fn store(&self) -> &KeyedArrayStore {
        &self.store
    }

    /// The side-channel array, if one was configured
    pub fn info(&self) -> Option<ArrayHandle<'_>> {
        self.info_key.as_deref().and_then(|key| self.store.get(key))
    }

    /// The transform applied to every sample
    pub fn transform(&self) -> &dyn DataTransform<Value> {
        self.transform.as_ref()
    }

    /// Release the store mapping
    pub fn close(self) {
        self.store.close();
    }
}

/// Check every key exists with a decodable type and a shared first dimension
fn validate_fields(store: &KeyedArrayStore, keys: &[String]) -> Result<usize> {
    let mut expected: Option<(&str, usize)> = None;

    for key in keys {
        let handle = store.get(key).ok_or_else(|| {
            Error::Configuration(format!(
                "could not find {key} in {}",
                store.path().display()
            ))
        })?;
        if handle.element_type().is_none() {
            return Err(Error::Unsupported(format!(
                "field {key} has dtype {:?}",
                handle.dtype()
            )));
        }
        let len = handle
            .first_dim()
            .ok_or_else(|| Error::Configuration(format!("field {key} is 0-dimensional")))?;

        match expected {
            None => expected = Some((key.as_str(), len)),
            Some((first, n)) if n != len => {
                return Err(Error::Configuration(format!(
                    "length of {key} is {len}, but {first} has length {n}"
                )));
            }
            Some(_) => {}
        }
    }

    expected
        .map(|(_, n)| n)
        .ok_or_else(|| Error::Configuration("at least one field key is required".into()))
}

impl Dataset for FileDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> CoreResult<Sample> {
        check_index(index, self.len)?;
        let sample = self
            .keys
            .iter()
            .map(|key| {
                let handle = self.store.get(key).ok_or_else(|| {
                    CoreError::Configuration(format!(
                        "field {key} is missing from {}",
                        self.store.path().display()
                    ))
                })?;
                handle.row(index).map(Value::Array)
            })
            .collect::<CoreResult<Sample>>()?;
        self.transform.apply(sample)
    }
}

impl fmt::Display for FileDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.keys {
            match self.store.get(key) {
                Some(handle) => writeln!(f, "Tensor {key}: {:?}", handle.shape())?,
                None => writeln!(f, "Tensor {key}: missing")?,
            }
        }
        write!(f, "Transforms: {}", self.transform.describe())
    }
}

impl fmt::Debug for FileDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDataset")
            .field("path", &self.store.path())
            .field("keys", &self.keys)
            .field("info_key", &self.info_key)
            .field("len", &self.len)
            .field("transform", &self.transform.describe())
            .finish()
    }
}
