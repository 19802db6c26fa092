//! Field values carried through transforms

use crate::array::RawArray;
use crate::error::{Error, Result};
use crate::tensor::{Tensor, Variable};

/// One field of a sample
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Array in its stored element type
    Array(RawArray),
    /// `f32` tensor
    Tensor(Tensor),
    /// Tensor wrapped for a computation graph
    Variable(Variable),
}

/// A sample: one value per dataset field, in field order
pub type Sample = Vec<Value>;

impl Value {
    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Array(_) => "array",
            Value::Tensor(_) => "tensor",
            Value::Variable(_) => "variable",
        }
    }

    /// Shape of the contained data
    pub fn shape(&self) -> &[usize] {
        match self {
            Value::Array(a) => a.shape(),
            Value::Tensor(t) => t.shape(),
            Value::Variable(v) => v.tensor().shape(),
        }
    }

    /// Borrow the value as a tensor
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow the value as a raw array
    pub fn as_array(&self) -> Option<&RawArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow the value as a variable
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Value::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Take the value as a tensor, failing for anything else
    pub fn into_tensor(self) -> Result<Tensor> {
        match self {
            Value::Tensor(t) => Ok(t),
            other => Err(Error::TypeMismatch(format!(
                "expected a tensor, got {}",
                other.kind()
            ))),
        }
    }
}

impl From<RawArray> for Value {
    fn from(array: RawArray) -> Self {
        Value::Array(array)
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Value::Tensor(tensor)
    }
}

impl From<Variable> for Value {
    fn from(variable: Variable) -> Self {
        Value::Variable(variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::VariableOptions;
    use ndarray::array;

    #[test]
    fn test_into_tensor() {
        let tensor = Tensor::new(array![1.0f32, 2.0].into_dyn());
        assert_eq!(Value::from(tensor.clone()).into_tensor().unwrap(), tensor);

        let array = Value::from(RawArray::from(array![1u8, 2]));
        assert!(matches!(
            array.into_tensor(),
            Err(Error::TypeMismatch(msg)) if msg.contains("array")
        ));

        let variable = Value::from(Variable::new(tensor, VariableOptions::default()).unwrap());
        assert!(matches!(variable.into_tensor(), Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn test_accessors_match_variant() {
        let value = Value::from(RawArray::from(array![[1i32, 2, 3]]));
        assert_eq!(value.kind(), "array");
        assert_eq!(value.shape(), &[1, 3]);
        assert!(value.as_array().is_some());
        assert!(value.as_tensor().is_none());
        assert!(value.as_variable().is_none());
    }
}
