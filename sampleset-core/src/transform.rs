//! Transform trait and composition for per-sample processing
//!
//! A [`DataTransform`] maps a sample (one value per dataset field) to a new
//! sample of the same arity. Datasets call [`DataTransform::initialize`] once
//! at construction with a [`TransformContext`] describing their fields and the
//! per-field functions registered for them.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;

/// A function applied to a single field value
pub type FieldFn<T> = Arc<dyn Fn(T) -> Result<T> + Send + Sync>;

/// A per-sample transformation step
pub trait DataTransform<T>: Send + Sync {
    /// Bind the transform to the dataset it is attached to
    ///
    /// Called exactly once, before the first [`apply`](Self::apply).
    fn initialize(&mut self, _context: &TransformContext<'_, T>) -> Result<()> {
        Ok(())
    }

    /// Transform one sample
    fn apply(&self, sample: Vec<T>) -> Result<Vec<T>>;

    /// Diagnostic description of this transform
    fn describe(&self) -> String;
}

impl<T> fmt::Debug for dyn DataTransform<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Per-field functions keyed by field name
pub struct FieldHooks<T> {
    hooks: BTreeMap<String, FieldFn<T>>,
}

impl<T> FieldHooks<T> {
    /// Create an empty set of hooks
    pub fn new() -> Self {
        Self {
            hooks: BTreeMap::new(),
        }
    }

    /// Register `hook` for the field named `key`, replacing any earlier one
    pub fn insert<F>(&mut self, key: impl Into<String>, hook: F)
    where
        F: Fn(T) -> Result<T> + Send + Sync + 'static,
    {
        self.hooks.insert(key.into(), Arc::new(hook));
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with<F>(mut self, key: impl Into<String>, hook: F) -> Self
    where
        F: Fn(T) -> Result<T> + Send + Sync + 'static,
    {
        self.insert(key, hook);
        self
    }

    /// Get the hook registered for `key`
    pub fn get(&self, key: &str) -> Option<FieldFn<T>> {
        self.hooks.get(key).cloned()
    }

    /// Names of all fields with a hook
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl<T> Default for FieldHooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FieldHooks<T> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl<T> fmt::Debug for FieldHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

/// What a transform sees of its dataset during initialization
pub struct TransformContext<'a, T> {
    /// Field names in sample order
    keys: &'a [String],

    /// Per-field functions registered on the dataset
    hooks: &'a FieldHooks<T>,
}

impl<'a, T> TransformContext<'a, T> {
    /// Describe a dataset with the given fields and hooks
    pub fn new(keys: &'a [String], hooks: &'a FieldHooks<T>) -> Self {
        for key in hooks.keys() {
            if !keys.iter().any(|k| k == key) {
                tracing::warn!(field = key, "field hook registered for a field the dataset does not have");
            }
        }
        Self { keys, hooks }
    }

    /// Field names in sample order
    pub fn keys(&self) -> &[String] {
        self.keys
    }

    /// Hook registered for `key`, if any
    pub fn hook(&self, key: &str) -> Option<FieldFn<T>> {
        self.hooks.get(key)
    }
}

/// Positional field names `"0"`, `"1"`, ... for datasets without named fields
pub fn positional_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| i.to_string()).collect()
}

/// Transform that returns its input unchanged
pub struct Identity<T> {
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> Identity<T> {
    /// Create an identity transform
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Identity<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DataTransform<T> for Identity<T> {
    fn apply(&self, sample: Vec<T>) -> Result<Vec<T>> {
        Ok(sample)
    }

    fn describe(&self) -> String {
        "Identity".to_string()
    }
}

/// A chain of transforms applied in order
pub struct Chain<T> {
    /// The transforms in this chain
    transforms: Vec<Box<dyn DataTransform<T>>>,
}

impl<T> Chain<T> {
    /// Create a new transform chain
    pub fn new(transforms: Vec<Box<dyn DataTransform<T>>>) -> Self {
        Self { transforms }
    }

    /// Append a transform to the end of the chain
    #[must_use]
    pub fn then(mut self, transform: impl DataTransform<T> + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Get a reference to the transforms in this chain
    pub fn transforms(&self) -> &[Box<dyn DataTransform<T>>] {
        &self.transforms
    }
}

impl<T> DataTransform<T> for Chain<T> {
    fn initialize(&mut self, context: &TransformContext<'_, T>) -> Result<()> {
        for transform in &mut self.transforms {
            transform.initialize(context)?;
        }
        Ok(())
    }

    fn apply(&self, sample: Vec<T>) -> Result<Vec<T>> {
        let mut current = sample;

        for transform in &self.transforms {
            current = transform.apply(current)?;
        }

        Ok(current)
    }

    fn describe(&self) -> String {
        let steps: Vec<String> = self.transforms.iter().map(|t| t.describe()).collect();
        format!("Chain[{}]", steps.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_util::capture_logs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AddOne;

    impl DataTransform<i32> for AddOne {
        fn apply(&self, sample: Vec<i32>) -> Result<Vec<i32>> {
            Ok(sample.into_iter().map(|x| x + 1).collect())
        }

        fn describe(&self) -> String {
            "AddOne".into()
        }
    }

    struct Double;

    impl DataTransform<i32> for Double {
        fn apply(&self, sample: Vec<i32>) -> Result<Vec<i32>> {
            Ok(sample.into_iter().map(|x| x * 2).collect())
        }

        fn describe(&self) -> String {
            "Double".into()
        }
    }

    struct CountInit(Arc<AtomicUsize>);

    impl DataTransform<i32> for CountInit {
        fn initialize(&mut self, context: &TransformContext<'_, i32>) -> Result<()> {
            self.0.fetch_add(context.keys().len(), Ordering::SeqCst);
            Ok(())
        }

        fn apply(&self, sample: Vec<i32>) -> Result<Vec<i32>> {
            Ok(sample)
        }

        fn describe(&self) -> String {
            "CountInit".into()
        }
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = Chain::new(Vec::new()).then(AddOne).then(Double);
        assert_eq!(chain.apply(vec![1, 2]).unwrap(), vec![4, 6]);

        let reversed = Chain::new(Vec::new()).then(Double).then(AddOne);
        assert_eq!(reversed.apply(vec![1, 2]).unwrap(), vec![3, 5]);
    }

    #[test]
    fn test_chain_initializes_every_child() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut chain = Chain::new(Vec::new())
            .then(CountInit(counter.clone()))
            .then(CountInit(counter.clone()));

        let keys = positional_keys(3);
        let hooks = FieldHooks::new();
        chain.initialize(&TransformContext::new(&keys, &hooks)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_chain_describe() {
        let chain = Chain::new(Vec::new()).then(AddOne).then(Identity::new());
        assert_eq!(chain.describe(), "Chain[AddOne -> Identity]");
        assert_eq!(Chain::<i32>::new(Vec::new()).describe(), "Chain[]");
    }

    #[test]
    fn test_field_hooks_lookup() {
        let hooks = FieldHooks::new()
            .with("a", |x: i32| Ok(x * 10))
            .with("b", |_: i32| Err(Error::Transformation("bad".into())));
        assert_eq!(hooks.len(), 2);
        assert_eq!((hooks.get("a").unwrap())(2).unwrap(), 20);
        assert!((hooks.get("b").unwrap())(2).is_err());
        assert!(hooks.get("c").is_none());
    }

    #[test]
    fn test_hook_for_unknown_field_is_reported() {
        let keys = positional_keys(2);
        let hooks = FieldHooks::new()
            .with("1", |x: i32| Ok(x))
            .with("ghost", |x: i32| Ok(x));

        let ((), logs) = capture_logs(|| {
            let context = TransformContext::new(&keys, &hooks);
            assert!(context.hook("1").is_some());
        });
        let warnings: Vec<&str> = logs.lines().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ghost"));
    }

    #[test]
    fn test_positional_keys() {
        assert_eq!(positional_keys(3), vec!["0", "1", "2"]);
    }
}
