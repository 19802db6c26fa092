//! File-backed datasets for sampleset
//!
//! This crate reads keyed arrays from a memory-mapped safetensors store and
//! exposes chosen arrays as the fields of a [`FileDataset`].

#![warn(missing_docs)]

mod error;

pub mod config;
pub mod file_dataset;
pub mod store;

pub use config::DatasetConfig;
pub use error::{Error, Result};
pub use file_dataset::{FileDataset, FileDatasetOptions};
pub use store::{ArrayHandle, KeyedArrayStore, StoreWriter};

// Re-export core types
pub use sampleset_core::{Dataset, Sample, Value};
