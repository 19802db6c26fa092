//! Lazy conversion of samples into variables

use crate::error::{Error, Result};
use crate::tensor::{Device, Variable, VariableOptions};
use crate::value::{Sample, Value};

/// Options for [`to_variables`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionOptions {
    /// Device to move converted fields to, `None` to leave placement unchanged
    pub device: Option<Device>,

    /// Which fields to convert; inferred as all fields of the first sample when unset
    pub mask: Option<Vec<bool>>,

    /// Options for every created variable
    pub variable: VariableOptions,
}

impl ConversionOptions {
    /// Move converted fields to `device`
    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Convert only the fields marked `true`
    #[must_use]
    pub fn mask(mut self, mask: impl Into<Vec<bool>>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Set the variable options
    #[must_use]
    pub fn variable(mut self, variable: VariableOptions) -> Self {
        self.variable = variable;
        self
    }
}

/// Wrap selected fields of every sample in a [`Variable`].
///
/// The returned iterator is lazy and reads `samples` once. Fields whose mask
/// entry is `true` must be tensors; they are moved to the configured device
/// (if any) and wrapped. Other fields pass through unchanged. Every sample must
/// have as many fields as the mask, otherwise that element is an
/// [`Error::ArityMismatch`].
pub fn to_variables<I>(samples: I, options: ConversionOptions) -> ToVariables<I::IntoIter>
where
    I: IntoIterator<Item = Result<Sample>>,
{
    ToVariables {
        inner: samples.into_iter(),
        mask: options.mask.clone(),
        options,
    }
}

/// Iterator returned by [`to_variables`]
#[derive(Debug)]
pub struct ToVariables<I> {
    inner: I,
    options: ConversionOptions,
    mask: Option<Vec<bool>>,
}

impl<I> ToVariables<I> {
    /// The mask in effect, once given or inferred
    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    fn convert(&mut self, sample: Sample) -> Result<Sample> {
        let mask = self
            .mask
            .get_or_insert_with(|| vec![true; sample.len()]);
        if mask.len() != sample.len() {
            return Err(Error::ArityMismatch {
                expected: mask.len(),
                actual: sample.len(),
            });
        }

        sample
            .into_iter()
            .zip(mask.iter())
            .map(|(value, &convert)| {
                if !convert {
                    return Ok(value);
                }
                let mut tensor = value.into_tensor()?;
                if let Some(device) = self.options.device {
                    tensor = tensor.to_device(device);
                }
                Variable::new(tensor, self.options.variable).map(Value::Variable)
            })
            .collect()
    }
}

impl<I> Iterator for ToVariables<I>
where
    I: Iterator<Item = Result<Sample>>,
{
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = match self.inner.next()? {
            Ok(sample) => sample,
            Err(e) => return Some(Err(e)),
        };
        Some(self.convert(sample))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
