//! Dynamically typed n-dimensional arrays as read from a store or handed in by callers

use std::fmt;

use ndarray::{Array, ArrayD, Axis, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element type of a [`RawArray`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
}

impl ElementType {
    /// Size of one element in bytes
    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::UInt8 => 1,
            ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::Float64 => 8,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::UInt8 => write!(f, "UInt8"),
            ElementType::Int32 => write!(f, "Int32"),
            ElementType::Int64 => write!(f, "Int64"),
            ElementType::Float32 => write!(f, "Float32"),
            ElementType::Float64 => write!(f, "Float64"),
        }
    }
}

/// An owned n-dimensional array that keeps its original element type
#[derive(Debug, Clone, PartialEq)]
pub enum RawArray {
    /// `u8` elements
    UInt8(ArrayD<u8>),
    /// `i32` elements
    Int32(ArrayD<i32>),
    /// `i64` elements
    Int64(ArrayD<i64>),
    /// `f32` elements
    Float32(ArrayD<f32>),
    /// `f64` elements
    Float64(ArrayD<f64>),
}

macro_rules! each_variant {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            RawArray::UInt8($a) => $body,
            RawArray::Int32($a) => $body,
            RawArray::Int64($a) => $body,
            RawArray::Float32($a) => $body,
            RawArray::Float64($a) => $body,
        }
    };
}

macro_rules! map_variant {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            RawArray::UInt8($a) => RawArray::UInt8($body),
            RawArray::Int32($a) => RawArray::Int32($body),
            RawArray::Int64($a) => RawArray::Int64($body),
            RawArray::Float32($a) => RawArray::Float32($body),
            RawArray::Float64($a) => RawArray::Float64($body),
        }
    };
}

macro_rules! impl_from_array {
    ($($elem:ty => $variant:ident),* $(,)?) => {
        $(
            impl<D: Dimension> From<Array<$elem, D>> for RawArray {
                fn from(array: Array<$elem, D>) -> Self {
                    RawArray::$variant(array.into_dyn())
                }
            }
        )*
    };
}

impl_from_array!(
    u8 => UInt8,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

impl RawArray {
    /// Get the element type of this array
    pub fn element_type(&self) -> ElementType {
        match self {
            RawArray::UInt8(_) => ElementType::UInt8,
            RawArray::Int32(_) => ElementType::Int32,
            RawArray::Int64(_) => ElementType::Int64,
            RawArray::Float32(_) => ElementType::Float32,
            RawArray::Float64(_) => ElementType::Float64,
        }
    }

    /// Get the shape of this array
    pub fn shape(&self) -> &[usize] {
        each_variant!(self, a => a.shape())
    }

    /// Get the number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Size of the first dimension, `None` for 0-d arrays
    pub fn first_dim(&self) -> Option<usize> {
        self.shape().first().copied()
    }

    /// Take the `index`-th slice along the first dimension
    pub fn row(&self, index: usize) -> Result<RawArray> {
        let len = self.first_dim().ok_or_else(|| {
            Error::InvalidArgument("cannot index into a 0-dimensional array".into())
        })?;
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        Ok(map_variant!(self, a => a.index_axis(Axis(0), index).to_owned()))
    }

    /// Cast every element to `f32`
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn to_f32(&self) -> ArrayD<f32> {
        each_variant!(self, a => a.mapv(|x| x as f32))
    }

    /// Cast every element to `f64`
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> ArrayD<f64> {
        each_variant!(self, a => a.mapv(|x| x as f64))
    }

    /// Arithmetic mean over all elements
    pub fn mean(&self) -> Result<f64> {
        self.to_f64()
            .mean()
            .ok_or_else(|| Error::InvalidArgument("cannot average an empty array".into()))
    }

    /// Mean along `axis`, keeping the reduced dimension with size 1
    pub fn mean_axis(&self, axis: usize) -> Result<ArrayD<f64>> {
        check_axis(self.ndim(), axis)?;
        self.to_f64()
            .mean_axis(Axis(axis))
            .map(|m| m.insert_axis(Axis(axis)))
            .ok_or_else(|| Error::InvalidArgument(format!("axis {axis} has length 0")))
    }
}

/// Reject reductions along axes the array does not have
pub(crate) fn check_axis(ndim: usize, axis: usize) -> Result<()> {
    if axis >= ndim {
        return Err(Error::InvalidArgument(format!(
            "axis {axis} out of range for {ndim}-dimensional array"
        )));
    }
    Ok(())
}

/// Check that every array has a first dimension and that they all agree on it.
///
/// Returns the shared length. Each shape is paired with its field name for error messages.
pub(crate) fn common_first_dim<'a, I>(shapes: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, &'a [usize])>,
{
    let mut expected: Option<(&str, usize)> = None;
    for (name, shape) in shapes {
        let len = *shape.first().ok_or_else(|| {
            Error::Configuration(format!("field {name} is 0-dimensional"))
        })?;
        match expected {
            None => expected = Some((name, len)),
            Some((first, n)) if n != len => {
                return Err(Error::Configuration(format!(
                    "field {name} has first dimension {len}, but field {first} has {n}"
                )));
            }
            Some(_) => {}
        }
    }
    expected
        .map(|(_, n)| n)
        .ok_or_else(|| Error::Configuration("at least one field is required".into()))
}
