//! Core traits, value types and in-memory dataset adapters
//!
//! This crate defines the [`Dataset`] contract used by training loops, the
//! [`DataTransform`] pipeline applied to every sample, the value types that
//! flow through it, and the in-memory adapters built on top of them.

#![warn(missing_docs)]

pub mod array;
pub mod array_dataset;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod list_dataset;
pub mod tensor;
pub mod tensor_dataset;
pub mod transform;
pub mod value;

#[cfg(test)]
mod test_util;

// Re-export key types for convenience
pub use array::{ElementType, RawArray};
pub use array_dataset::ArrayDataset;
pub use convert::{to_variables, ConversionOptions, ToVariables};
pub use dataset::{Dataset, DatasetIter};
pub use error::{Error, Result};
pub use list_dataset::ListDataset;
pub use tensor::{Device, Tensor, Variable, VariableOptions};
pub use tensor_dataset::{TensorDataset, TensorDatasetBuilder};
pub use transform::{Chain, DataTransform, FieldFn, FieldHooks, Identity, TransformContext};
pub use value::{Sample, Value};
