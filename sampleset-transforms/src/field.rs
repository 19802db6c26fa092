//! Per-field functions bound from the dataset

use sampleset_core::error::{Error, Result};
use sampleset_core::transform::{DataTransform, FieldFn, TransformContext};

/// Applies the function registered for each field, identity for the rest.
///
/// On initialization the transform walks the dataset's fields in order and
/// binds the hook registered for each one. Keys that had a hook are listed by
/// [`describe`](DataTransform::describe).
pub struct FieldTransforms<T> {
    /// Bound function per field position, `None` for identity
    bound: Vec<Option<FieldFn<T>>>,

    /// Names of fields that have a custom function
    transformees: Vec<String>,

    /// Set once `initialize` has run
    initialized: bool,
}

impl<T> FieldTransforms<T> {
    /// Create an unbound transform
    pub fn new() -> Self {
        Self {
            bound: Vec::new(),
            transformees: Vec::new(),
            initialized: false,
        }
    }

    /// Names of the fields that had a custom function at initialization
    pub fn transformees(&self) -> &[String] {
        &self.transformees
    }
}

impl<T> Default for FieldTransforms<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DataTransform<T> for FieldTransforms<T> {
    fn initialize(&mut self, context: &TransformContext<'_, T>) -> Result<()> {
        self.bound.clear();
        self.transformees.clear();

        for key in context.keys() {
            let hook = context.hook(key);
            if hook.is_some() {
                self.transformees.push(key.clone());
            }
            self.bound.push(hook);
        }
        self.initialized = true;

        tracing::debug!(transformees = ?self.transformees, "bound field transforms");
        Ok(())
    }

    fn apply(&self, sample: Vec<T>) -> Result<Vec<T>> {
        if !self.initialized {
            return Err(Error::Transformation(
                "FieldTransforms applied before initialization".into(),
            ));
        }
        if sample.len() != self.bound.len() {
            return Err(Error::ArityMismatch {
                expected: self.bound.len(),
                actual: sample.len(),
            });
        }

        sample
            .into_iter()
            .zip(&self.bound)
            .map(|(value, hook)| match hook {
                Some(hook) => hook(value),
                None => Ok(value),
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("FieldTransforms({})", self.transformees.join(", "))
    }
}
