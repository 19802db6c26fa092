//! Per-sample transforms for sampleset datasets
//!
//! [`FieldTransforms`] binds the per-field functions a dataset was built with,
//! [`ToTensor`] converts raw arrays to tensors, and [`default_pipeline`]
//! chains the two the way file-backed datasets expect.

#![warn(missing_docs)]

mod field;
mod to_tensor;

pub use field::FieldTransforms;
pub use to_tensor::ToTensor;

use sampleset_core::transform::Chain;
use sampleset_core::value::Value;

/// `Chain[FieldTransforms -> ToTensor]`
pub fn default_pipeline() -> Chain<Value> {
    Chain::new(Vec::new())
        .then(FieldTransforms::new())
        .then(ToTensor)
}
