//! In-memory dataset of `f32` tensors

use std::fmt;

use crate::array::{common_first_dim, RawArray};
use crate::dataset::{check_index, resolve_keys, Dataset};
use crate::error::Result;
use crate::tensor::{Device, Tensor, Variable, VariableOptions};
use crate::transform::{DataTransform, FieldHooks, Identity, TransformContext};
use crate::value::{Sample, Value};

/// Dataset wrapping several arrays that share their first dimension.
///
/// Every array is converted to an `f32` [`Tensor`] when the dataset is built.
/// A sample is the `index`-th slice of each tensor along the first dimension,
/// passed through the dataset's transform.
pub struct TensorDataset {
    /// Field names in sample order
    keys: Vec<String>,

    /// One tensor per field
    tensors: Vec<Tensor>,

    /// Shared first dimension
    len: usize,

    /// Per-sample transform
    transform: Box<dyn DataTransform<Value>>,
}

impl TensorDataset {
    /// Create a dataset with positional field names and no transform
    pub fn new(arrays: Vec<RawArray>) -> Result<Self> {
        Self::builder().fields(arrays).build()
    }

    /// Start building a dataset
    pub fn builder() -> TensorDatasetBuilder {
        TensorDatasetBuilder::default()
    }

    /// Field names in sample order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The stored tensors
    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    /// The transform applied to every sample
    pub fn transform(&self) -> &dyn DataTransform<Value> {
        self.transform.as_ref()
    }

    /// Per-field mean.
    ///
    /// With `axis` unset every field reduces to a 0-dimensional tensor.
    /// Otherwise each field is averaged along `axis`, which is kept with size 1.
    pub fn mean(&self, axis: Option<usize>) -> Result<Vec<Tensor>> {
        self.tensors
            .iter()
            .map(|t| match axis {
                None => t.mean(),
                Some(axis) => t.mean_axis(axis),
            })
            .collect()
    }

    /// Wrap every field in a [`Variable`] without changing the dataset
    pub fn as_variables(&self, options: VariableOptions) -> Result<Vec<Variable>> {
        self.tensors
            .iter()
            .map(|t| Variable::new(t.clone(), options))
            .collect()
    }

    /// Placement of the stored tensors
    pub fn device(&self) -> Device {
        self.tensors.first().map_or(Device::Host, Tensor::device)
    }

    /// Move every stored tensor to `device`
    pub fn move_to(&mut self, device: Device) {
        tracing::debug!(%device, fields = self.tensors.len(), "moving tensor dataset");
        self.tensors = std::mem::take(&mut self.tensors)
            .into_iter()
            .map(|t| t.to_device(device))
            .collect();
    }

    /// Move every stored tensor to the first accelerator
    pub fn move_to_accelerator(&mut self) {
        self.move_to(Device::Accelerator(0));
    }

    /// Move every stored tensor back to host memory
    pub fn move_to_host(&mut self) {
        self.move_to(Device::Host);
    }
}

impl Dataset for TensorDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<Sample> {
        check_index(index, self.len)?;
        let sample = self
            .tensors
            .iter()
            .map(|t| t.row(index).map(Value::Tensor))
            .collect::<Result<Sample>>()?;
        self.transform.apply(sample)
    }
}

impl fmt::Display for TensorDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .keys
            .iter()
            .zip(&self.tensors)
            .map(|(key, t)| format!("Tensor {key}: {:?}", t.shape()))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

impl fmt::Debug for TensorDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorDataset")
            .field("keys", &self.keys)
            .field("len", &self.len)
            .field("device", &self.device())
            .field("transform", &self.transform.describe())
            .finish()
    }
}

/// A builder for [`TensorDataset`]
#[derive(Default)]
pub struct TensorDatasetBuilder {
    /// Fields with their optional names
    fields: Vec<(Option<String>, RawArray)>,

    /// Transform, identity when unset
    transform: Option<Box<dyn DataTransform<Value>>>,

    /// Per-field functions handed to the transform
    hooks: FieldHooks<Value>,
}

impl TensorDatasetBuilder {
    /// Add a field named by its position
    #[must_use]
    pub fn field(mut self, array: RawArray) -> Self {
        self.fields.push((None, array));
        self
    }

    /// Add several positional fields
    #[must_use]
    pub fn fields(mut self, arrays: impl IntoIterator<Item = RawArray>) -> Self {
        self.fields.extend(arrays.into_iter().map(|a| (None, a)));
        self
    }

    /// Add a named field
    #[must_use]
    pub fn named_field(mut self, name: impl Into<String>, array: RawArray) -> Self {
        self.fields.push((Some(name.into()), array));
        self
    }

    /// Set the per-sample transform
    #[must_use]
    pub fn transform(mut self, transform: impl DataTransform<Value> + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Set the per-field functions offered to the transform.
    ///
    /// Hooks only take effect through a transform that binds them, such as
    /// `FieldTransforms`. With the default identity transform they are unused
    /// and [`build`](Self::build) logs a warning.
    #[must_use]
    pub fn hooks(mut self, hooks: FieldHooks<Value>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validate the fields, convert them and initialize the transform
    pub fn build(self) -> Result<TensorDataset> {
        let (names, arrays): (Vec<_>, Vec<_>) = self.fields.into_iter().unzip();
        let keys = resolve_keys(names)?;
        let len = common_first_dim(
            keys.iter()
                .map(String::as_str)
                .zip(arrays.iter().map(RawArray::shape)),
        )?;

        let tensors = arrays.iter().map(Tensor::from_array).collect();

        let mut transform = self.transform.unwrap_or_else(|| {
            if !self.hooks.is_empty() {
                tracing::warn!(
                    hooks = ?self.hooks,
                    "field hooks given without a transform; the identity transform ignores them"
                );
            }
            Box::new(Identity::new())
        });
        transform.initialize(&TransformContext::new(&keys, &self.hooks))?;
        tracing::debug!(fields = keys.len(), len, transform = %transform.describe(), "built tensor dataset");

        Ok(TensorDataset {
            keys,
            tensors,
            len,
            transform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_util::capture_logs;
    use ndarray::{array, Array2};
    use proptest::prelude::*;
    use test_case::test_case;

    fn sample_dataset() -> TensorDataset {
        TensorDataset::builder()
            .named_field("x", RawArray::from(array![[1i64, 2], [3, 4], [5, 9]]))
            .named_field("y", RawArray::from(array![0u8, 1, 1]))
            .build()
            .unwrap()
    }

    struct Negate;

    impl DataTransform<Value> for Negate {
        fn apply(&self, sample: Sample) -> Result<Sample> {
            sample
                .into_iter()
                .map(|v| -> Result<Value> {
                    let t = v.into_tensor()?;
                    Ok(Value::Tensor(Tensor::new(-t.into_data())))
                })
                .collect()
        }

        fn describe(&self) -> String {
            "Negate".into()
        }
    }

    #[test]
    fn test_rejects_mismatched_first_dimension() {
        let result = TensorDataset::new(vec![
            RawArray::from(array![1.0f32, 2.0, 3.0]),
            RawArray::from(array![1.0f32, 2.0]),
        ]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_empty_field_list() {
        assert!(matches!(TensorDataset::new(Vec::new()), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_get_returns_f32_rows() {
        let ds = sample_dataset();
        assert_eq!(ds.len(), 3);
        let sample = ds.get(1).unwrap();
        assert_eq!(sample[0].as_tensor().unwrap().data(), &array![3.0f32, 4.0].into_dyn());
        assert_eq!(sample[1].as_tensor().unwrap().to_scalar().unwrap(), 1.0);
    }

    #[test]
    fn test_get_out_of_range() {
        let ds = sample_dataset();
        assert!(matches!(
            ds.get(ds.len()),
            Err(Error::IndexOutOfBounds { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_transform_is_applied() {
        let ds = TensorDataset::builder()
            .field(RawArray::from(array![1.0f32, 2.0]))
            .transform(Negate)
            .build()
            .unwrap();
        let sample = ds.get(1).unwrap();
        assert_eq!(sample[0].as_tensor().unwrap().to_scalar().unwrap(), -2.0);
        assert_eq!(ds.transform().describe(), "Negate");
    }

    #[test]
    fn test_mean_full_reduction() {
        let ds = sample_dataset();
        let means = ds.mean(None).unwrap();
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].to_scalar().unwrap(), 4.0);
        assert!((means[1].to_scalar().unwrap() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test_case(0, &[1, 2] ; "along rows")]
    #[test_case(1, &[3, 1] ; "along columns")]
    fn test_mean_axis_keeps_dimension(axis: usize, expected: &[usize]) {
        let ds = TensorDataset::new(vec![RawArray::from(array![[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]])]).unwrap();
        let means = ds.mean(Some(axis)).unwrap();
        assert_eq!(means[0].shape(), expected);
    }

    #[test]
    fn test_device_moves_in_place() {
        let mut ds = sample_dataset();
        assert_eq!(ds.device(), Device::Host);

        let variables = ds.as_variables(VariableOptions::default().requires_grad(true)).unwrap();
        assert_eq!(variables.len(), 2);
        assert!(variables.iter().all(Variable::requires_grad));
        assert_eq!(ds.device(), Device::Host);

        ds.move_to_accelerator();
        assert!(ds.tensors().iter().all(|t| t.device() == Device::Accelerator(0)));
        assert_eq!(ds.get(0).unwrap()[0].as_tensor().unwrap().device(), Device::Accelerator(0));

        ds.move_to_host();
        assert_eq!(ds.device(), Device::Host);
    }

    #[test]
    fn test_hooks_without_transform_are_reported() {
        let hooks = FieldHooks::new().with("x", |v: Value| Ok(v));
        let (ds, logs) = capture_logs(|| {
            TensorDataset::builder()
                .named_field("x", RawArray::from(array![1.0f32, 2.0]))
                .hooks(hooks)
                .build()
        });
        assert_eq!(ds.unwrap().transform().describe(), "Identity");
        assert!(logs.contains("WARN"));
        assert!(logs.contains("identity transform ignores them"));

        let (_, quiet) = capture_logs(|| TensorDataset::new(vec![RawArray::from(array![1.0f32])]));
        assert!(!quiet.contains("WARN"));
    }

    #[test]
    fn test_display_lists_shapes() {
        let ds = sample_dataset();
        assert_eq!(ds.to_string(), "Tensor x: [3, 2]\nTensor y: [3]");
    }

    proptest! {
        #[test]
        fn prop_get_matches_cast(rows in 1usize..8, cols in 1usize..5, seed in any::<i64>()) {
            let raw = Array2::from_shape_fn((rows, cols), |(i, j)| {
                seed.wrapping_add((i * cols + j) as i64) % 1000
            });
            let raw = RawArray::from(raw);
            let ds = TensorDataset::new(vec![raw.clone()]).unwrap();
            for i in 0..rows {
                let expected = Tensor::new(raw.row(i).unwrap().to_f32());
                let sample = ds.get(i).unwrap();
                prop_assert_eq!(sample[0].as_tensor().unwrap(), &expected);
            }
        }
    }
}
