//! Tensor and variable value types
//!
//! A [`Tensor`] is an `f32` n-dimensional array tagged with the [`Device`] it
//! is placed on. A [`Variable`] wraps a tensor with the gradient-tracking flags
//! a training loop needs. Placement is bookkeeping only: data always lives in
//! host memory, and moving a tensor rewrites its device tag.

use std::fmt;

use ndarray::{arr0, ArrayD, Axis};
use serde::{Deserialize, Serialize};

use crate::array::{check_axis, RawArray};
use crate::error::{Error, Result};

/// Where a tensor is placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// Host memory
    #[default]
    Host,
    /// Accelerator with the given ordinal
    Accelerator(usize),
}

impl Device {
    /// Whether this is an accelerator placement
    pub fn is_accelerator(self) -> bool {
        matches!(self, Device::Accelerator(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Host => write!(f, "host"),
            Device::Accelerator(ordinal) => write!(f, "accelerator:{ordinal}"),
        }
    }
}

/// A dense `f32` tensor with a device placement
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Tensor data
    data: ArrayD<f32>,

    /// Current placement
    device: Device,
}

impl Tensor {
    /// Create a host tensor from an `f32` array
    pub fn new(data: ArrayD<f32>) -> Self {
        Self {
            data,
            device: Device::Host,
        }
    }

    /// Create a 0-dimensional host tensor
    pub fn scalar(value: f32) -> Self {
        Self::new(arr0(value).into_dyn())
    }

    /// Convert a raw array, casting its elements to `f32`
    pub fn from_array(array: &RawArray) -> Self {
        Self::new(array.to_f32())
    }

    /// Get the underlying array
    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    /// Consume the tensor and return its array
    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    /// Get the shape of this tensor
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Get the current placement
    pub fn device(&self) -> Device {
        self.device
    }

    /// Size of the first dimension, `None` for 0-d tensors
    pub fn first_dim(&self) -> Option<usize> {
        self.shape().first().copied()
    }

    /// Value of a 0-dimensional tensor
    pub fn to_scalar(&self) -> Result<f32> {
        if self.data.ndim() != 0 {
            return Err(Error::InvalidArgument(format!(
                "expected a 0-dimensional tensor, got shape {:?}",
                self.shape()
            )));
        }
        self.data
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::InvalidArgument("empty tensor".into()))
    }

    /// Take the `index`-th slice along the first dimension, keeping the placement
    pub fn row(&self, index: usize) -> Result<Tensor> {
        let len = self.first_dim().ok_or_else(|| {
            Error::InvalidArgument("cannot index into a 0-dimensional tensor".into())
        })?;
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        Ok(Self {
            data: self.data.index_axis(Axis(0), index).to_owned(),
            device: self.device,
        })
    }

    /// Mean over all elements as a 0-dimensional tensor
    pub fn mean(&self) -> Result<Tensor> {
        let mean = self
            .data
            .mean()
            .ok_or_else(|| Error::InvalidArgument("cannot average an empty tensor".into()))?;
        Ok(Self {
            data: arr0(mean).into_dyn(),
            device: self.device,
        })
    }

    /// Mean along `axis`, keeping the reduced dimension with size 1
    pub fn mean_axis(&self, axis: usize) -> Result<Tensor> {
        check_axis(self.data.ndim(), axis)?;
        let mean = self
            .data
            .mean_axis(Axis(axis))
            .ok_or_else(|| Error::InvalidArgument(format!("axis {axis} has length 0")))?;
        Ok(Self {
            data: mean.insert_axis(Axis(axis)),
            device: self.device,
        })
    }

    /// Move the tensor to `device`
    #[must_use]
    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Move the tensor back to host memory
    #[must_use]
    pub fn to_host(self) -> Self {
        self.to_device(Device::Host)
    }
}

/// Options recognised when wrapping a tensor in a [`Variable`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariableOptions {
    /// Track gradients through this variable
    pub requires_grad: bool,

    /// Inference-only variable; nothing derived from it tracks gradients
    pub volatile: bool,
}

impl VariableOptions {
    /// Parse options from a JSON object such as `{"requires_grad": true}`
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Enable or disable gradient tracking
    #[must_use]
    pub fn requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Mark variables as inference-only
    #[must_use]
    pub fn volatile(mut self, volatile: bool) -> Self {
        self.volatile = volatile;
        self
    }

    fn validate(self) -> Result<()> {
        if self.requires_grad && self.volatile {
            return Err(Error::InvalidArgument(
                "a volatile variable cannot require gradients".into(),
            ));
        }
        Ok(())
    }
}

/// A tensor wrapped for use in a computation graph
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Wrapped tensor
    tensor: Tensor,

    /// Options the variable was built with
    options: VariableOptions,
}

impl Variable {
    /// Wrap `tensor` with the given options
    pub fn new(tensor: Tensor, options: VariableOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { tensor, options })
    }

    /// Get the wrapped tensor
    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    /// Unwrap the tensor
    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }

    /// Whether gradients are tracked
    pub fn requires_grad(&self) -> bool {
        self.options.requires_grad
    }

    /// Whether this is an inference-only variable
    pub fn is_volatile(&self) -> bool {
        self.options.volatile
    }

    /// Current placement of the wrapped tensor
    pub fn device(&self) -> Device {
        self.tensor.device()
    }

    /// Move the wrapped tensor to `device`
    #[must_use]
    pub fn to_device(self, device: Device) -> Self {
        Self {
            tensor: self.tensor.to_device(device),
            options: self.options,
        }
    }

    /// Move the wrapped tensor back to host memory
    #[must_use]
    pub fn to_host(self) -> Self {
        self.to_device(Device::Host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_array_casts_to_f32() {
        let raw = RawArray::from(array![[1u8, 2], [3, 4]]);
        let tensor = Tensor::from_array(&raw);
        assert_eq!(tensor.data(), &array![[1.0f32, 2.0], [3.0, 4.0]].into_dyn());
        assert_eq!(tensor.device(), Device::Host);
    }

    #[test]
    fn test_row_keeps_device() {
        let tensor = Tensor::new(array![[1.0f32, 2.0], [3.0, 4.0]].into_dyn())
            .to_device(Device::Accelerator(1));
        let row = tensor.row(1).unwrap();
        assert_eq!(row.data(), &array![3.0f32, 4.0].into_dyn());
        assert_eq!(row.device(), Device::Accelerator(1));
        assert!(matches!(
            tensor.row(2),
            Err(Error::IndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_mean() {
        let tensor = Tensor::new(array![[1.0f32, 2.0], [3.0, 6.0]].into_dyn());
        assert_eq!(tensor.mean().unwrap().to_scalar().unwrap(), 3.0);

        let along_rows = tensor.mean_axis(1).unwrap();
        assert_eq!(along_rows.shape(), &[2, 1]);
        assert_eq!(along_rows.data(), &array![[1.5f32], [4.5]].into_dyn());
    }

    #[test]
    fn test_variable_options_from_json() {
        let options = VariableOptions::from_json(r#"{"requires_grad": true}"#).unwrap();
        assert!(options.requires_grad);
        assert!(!options.volatile);

        assert!(matches!(
            VariableOptions::from_json(r#"{"requires_gradient": true}"#),
            Err(Error::Json(_))
        ));
        assert!(VariableOptions::from_json(r#"{"requires_grad": true, "volatile": true}"#).is_err());
    }

    #[test]
    fn test_variable_device_round_trip() {
        let var = Variable::new(Tensor::scalar(1.0), VariableOptions::default()).unwrap();
        let moved = var.clone().to_device(Device::Accelerator(0));
        assert!(moved.device().is_accelerator());
        assert_eq!(moved.to_host(), var);
    }
}
