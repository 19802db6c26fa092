//! Conversion of raw arrays to tensors

use sampleset_core::error::Result;
use sampleset_core::tensor::Tensor;
use sampleset_core::transform::DataTransform;
use sampleset_core::value::{Sample, Value};

/// Converts every raw array field to an `f32` [`Tensor`].
///
/// Tensors and variables pass through unchanged, so applying the transform
/// twice is the same as applying it once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl DataTransform<Value> for ToTensor {
    fn apply(&self, sample: Sample) -> Result<Sample> {
        Ok(sample
            .into_iter()
            .map(|value| match value {
                Value::Array(array) => Value::Tensor(Tensor::from_array(&array)),
                other => other,
            })
            .collect())
    }

    fn describe(&self) -> String {
        "ToTensor".to_string()
    }
}
