//! Descriptors: declarative recipes for a single object
//!
//! A descriptor names the type to build, how to build it (constructor or a
//! static factory, optionally on a separate factory type), the ordered
//! parameters passed to it, the properties assigned afterwards and the
//! lifecycle policy governing how often it is built.

use crate::value::{upsert, Value};

/// Object lifecycle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum Lifecycle {
    /// One shared instance per context
    #[default]
    Singleton,

    /// Fresh instance on every lookup, never cached
    Prototype,
}

impl Lifecycle {
    /// Label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Singleton => "singleton",
            Lifecycle::Prototype => "prototype",
        }
    }
}

/// Recipe for one object.
///
/// # Examples
///
/// ```rust
/// use object_wiring::{Descriptor, Value};
///
/// let foo = Descriptor::new("foo", "Sample1").with_property("bar", "baz");
/// let bar = Descriptor::new("bar", "Sample2").with_param(Value::reference("foo"));
///
/// assert_eq!(foo.properties().len(), 1);
/// assert_eq!(bar.param_count(), 1);
/// assert!(bar.is_singleton());
/// ```
#[derive(Debug, Clone)]
pub struct Descriptor {
    id: String,
    target_type: String,
    factory_type: Option<String>,
    factory_method: Option<String>,
    init_method: Option<String>,
    lifecycle: Lifecycle,
    lazy: bool,
    params: Vec<Value>,
    properties: Vec<(String, Value)>,
}

impl Descriptor {
    /// Create a lazy singleton descriptor built with the target type's
    /// constructor.
    pub fn new(id: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target_type: target_type.into(),
            factory_type: None,
            factory_method: None,
            init_method: None,
            lifecycle: Lifecycle::Singleton,
            lazy: true,
            params: Vec::new(),
            properties: Vec::new(),
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the lifecycle policy.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Shorthand for `with_lifecycle(Lifecycle::Prototype)`.
    pub fn prototype(self) -> Self {
        self.with_lifecycle(Lifecycle::Prototype)
    }

    /// Build immediately after loading instead of on first lookup.
    pub fn eager(mut self) -> Self {
        self.lazy = false;
        self
    }

    /// Set the laziness flag.
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Build through a static factory method instead of the constructor.
    pub fn with_factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method = Some(method.into());
        self
    }

    /// Look the factory method up on another type.
    pub fn with_factory_type(mut self, type_name: impl Into<String>) -> Self {
        self.factory_type = Some(type_name.into());
        self
    }

    /// Run a hook on the instance once its properties are assigned.
    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    /// Append a constructor/factory parameter.
    pub fn with_param(mut self, value: impl Into<Value>) -> Self {
        self.add_param(value);
        self
    }

    /// Assign a property after construction.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Append a parameter.
    pub fn add_param(&mut self, value: impl Into<Value>) {
        self.params.push(value.into());
    }

    /// Assign a property. Re-assigning a name keeps its original position.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        upsert(&mut self.properties, name.into(), value.into());
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    #[inline]
    pub fn factory_type(&self) -> Option<&str> {
        self.factory_type.as_deref()
    }

    #[inline]
    pub fn factory_method(&self) -> Option<&str> {
        self.factory_method.as_deref()
    }

    #[inline]
    pub fn init_method(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    /// The type the constructor or factory is looked up on.
    #[inline]
    pub fn construction_type(&self) -> &str {
        self.factory_type.as_deref().unwrap_or(&self.target_type)
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.lifecycle == Lifecycle::Singleton
    }

    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    #[inline]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    #[inline]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Properties in declaration order.
    #[inline]
    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }

    /// Check the descriptor is well formed before it is registered.
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.id.is_empty() {
            return Err(crate::WiringError::invalid(&self.id, "empty id"));
        }
        if self.target_type.is_empty() {
            return Err(crate::WiringError::invalid(&self.id, "missing target type"));
        }
        if self.factory_type.is_some() && self.factory_method.is_none() {
            return Err(crate::WiringError::invalid(
                &self.id,
                "factory type given without a factory method",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let desc = Descriptor::new("foo", "Sample1");
        assert_eq!(desc.lifecycle(), Lifecycle::Singleton);
        assert!(desc.is_lazy());
        assert_eq!(desc.construction_type(), "Sample1");
        assert!(desc.factory_method().is_none());
    }

    #[test]
    fn test_builder_chain() {
        let desc = Descriptor::new("foo", "Sample1")
            .prototype()
            .eager()
            .with_factory_type("Sample4")
            .with_factory_method("factory")
            .with_param(1)
            .with_param("two");

        assert_eq!(desc.lifecycle(), Lifecycle::Prototype);
        assert!(!desc.is_lazy());
        assert_eq!(desc.construction_type(), "Sample4");
        assert_eq!(desc.param_count(), 2);
    }

    #[test]
    fn test_set_property_replaces_in_place() {
        let mut desc = Descriptor::new("foo", "Sample1");
        desc.set_property("a", 1);
        desc.set_property("b", 2);
        desc.set_property("a", 3);

        let names: Vec<&str> = desc.properties().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_validate() {
        assert!(Descriptor::new("foo", "Sample1").validate().is_ok());
        assert!(Descriptor::new("", "Sample1").validate().is_err());
        assert!(Descriptor::new("foo", "").validate().is_err());
        assert!(
            Descriptor::new("foo", "Sample1")
                .with_factory_type("Sample4")
                .validate()
                .is_err()
        );
    }
}
