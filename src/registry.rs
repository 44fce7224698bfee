//! Construction capability
//!
//! The wiring engine never builds objects itself: it asks a [`TypeRegistry`]
//! for the [`TypeBinding`] registered under a type name and calls into it.
//! A binding describes one type's constructor, its static factories, its
//! post-construction hooks and its assignable properties.
//!
//! [`BindingTable`] is the registration-table implementation. Bindings can be
//! written by hand or generated with `#[derive(Wire)]` (feature `derive`).
//!
//! # Example
//!
//! ```rust
//! use object_wiring::{Arity, BindingTable, Object, TypeBinding};
//!
//! #[derive(Default)]
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let table = BindingTable::new().with(
//!     TypeBinding::of::<Greeter>("Greeter")
//!         .constructor(Arity::none(), |_args| Ok(Object::new(Greeter::default())))
//!         .property("greeting", |this: &mut Greeter, value| {
//!             this.greeting = object_wiring::FromResolved::from_resolved(value)?;
//!             Ok(())
//!         }),
//! );
//!
//! assert!(table.contains("Greeter"));
//! ```

use crate::value::{FromResolved, Resolved};
use crate::{Object, Result, WiringError};
use ahash::RandomState;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased constructor or static factory
type CallFn = Arc<dyn Fn(Args) -> Result<Object> + Send + Sync>;

/// Type-erased property setter
type SetterFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Resolved) -> Result<()> + Send + Sync>;

/// Type-erased post-construction hook
type HookFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> Result<()> + Send + Sync>;

// =============================================================================
// Arity and arguments
// =============================================================================

/// Accepted parameter count of a constructor or factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Parameters without a default
    pub required: usize,
    /// All parameters, optional ones included
    pub total: usize,
}

impl Arity {
    /// Takes no parameters.
    #[inline]
    pub const fn none() -> Self {
        Self { required: 0, total: 0 }
    }

    /// Takes exactly `n` parameters.
    #[inline]
    pub const fn exactly(n: usize) -> Self {
        Self { required: n, total: n }
    }

    /// Takes between `required` and `total` parameters.
    #[inline]
    pub const fn range(required: usize, total: usize) -> Self {
        Self { required, total }
    }

    #[inline]
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required && count <= self.total
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.required == self.total {
            write!(f, "{}", self.total)
        } else {
            write!(f, "between {} and {}", self.required, self.total)
        }
    }
}

/// Resolved arguments passed to a constructor or factory.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Resolved>,
}

impl Args {
    #[inline]
    pub fn new(values: Vec<Resolved>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw access to the argument at `index`.
    #[inline]
    pub fn raw(&self, index: usize) -> Option<&Resolved> {
        self.values.get(index)
    }

    /// Convert the argument at `index`. A missing argument converts from
    /// `Null`, so optional parameters can be read as `Option<T>`.
    pub fn get<T: FromResolved>(&self, index: usize) -> Result<T> {
        match self.values.get(index) {
            Some(value) => T::from_resolved(value),
            None => T::from_resolved(&Resolved::Null),
        }
    }

    /// Convert the argument at `index`, or fall back when it was not supplied.
    pub fn get_or<T: FromResolved>(&self, index: usize, default: T) -> Result<T> {
        match self.values.get(index) {
            Some(value) => T::from_resolved(value),
            None => Ok(default),
        }
    }

    #[inline]
    pub fn into_vec(self) -> Vec<Resolved> {
        self.values
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// A constructor or static factory.
#[derive(Clone)]
pub struct Callable {
    arity: Arity,
    call: CallFn,
}

impl Callable {
    #[inline]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    #[inline]
    pub fn invoke(&self, args: Args) -> Result<Object> {
        (self.call)(args)
    }
}

/// A named method on a type.
#[derive(Clone)]
pub enum Method {
    /// Static factory: builds an object from arguments
    Factory(Callable),
    /// Instance hook: runs against an already-built object
    Hook(HookFn),
}

impl Method {
    #[inline]
    pub fn is_static(&self) -> bool {
        matches!(self, Method::Factory(_))
    }
}

/// Everything the engine can do with one type.
#[derive(Clone)]
pub struct TypeBinding {
    name: String,
    type_id: Option<TypeId>,
    constructor: Option<Callable>,
    methods: HashMap<String, Method, RandomState>,
    properties: HashMap<String, SetterFn, RandomState>,
    supertypes: Vec<String>,
}

impl TypeBinding {
    /// Binding for the concrete Rust type `T`, registered under `name`.
    ///
    /// Objects of type `T` produced by any factory find this binding for
    /// their property assignments.
    pub fn of<T: Any + Send + Sync>(name: impl Into<String>) -> Self {
        let mut binding = Self::named(name);
        binding.type_id = Some(TypeId::of::<T>());
        binding
    }

    /// Binding that is not tied to a Rust type, such as a factory holder.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
            constructor: None,
            methods: HashMap::default(),
            properties: HashMap::default(),
            supertypes: Vec::new(),
        }
    }

    /// Register the constructor. Types without one can only be built through
    /// a static factory.
    pub fn constructor<F>(mut self, arity: Arity, f: F) -> Self
    where
        F: Fn(Args) -> Result<Object> + Send + Sync + 'static,
    {
        self.constructor = Some(Callable {
            arity,
            call: Arc::new(f),
        });
        self
    }

    /// Register a static factory method.
    pub fn factory<F>(mut self, name: impl Into<String>, arity: Arity, f: F) -> Self
    where
        F: Fn(Args) -> Result<Object> + Send + Sync + 'static,
    {
        self.methods.insert(
            name.into(),
            Method::Factory(Callable {
                arity,
                call: Arc::new(f),
            }),
        );
        self
    }

    /// Register a zero-argument instance hook.
    pub fn hook<T, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T) -> Result<()> + Send + Sync + 'static,
    {
        let hook: HookFn = Arc::new(move |target: &mut (dyn Any + Send + Sync)| {
            let this = target
                .downcast_mut::<T>()
                .ok_or_else(|| WiringError::mismatch(std::any::type_name::<T>(), "foreign object"))?;
            f(this)
        });
        self.methods.insert(name.into(), Method::Hook(hook));
        self
    }

    /// Register an assignable property.
    pub fn property<T, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T, &Resolved) -> Result<()> + Send + Sync + 'static,
    {
        let setter: SetterFn = Arc::new(move |target: &mut (dyn Any + Send + Sync), value: &Resolved| {
            let this = target
                .downcast_mut::<T>()
                .ok_or_else(|| WiringError::mismatch(std::any::type_name::<T>(), "foreign object"))?;
            f(this, value)
        });
        self.properties.insert(name.into(), setter);
        self
    }

    /// Declare that objects of this type may stand in for `name`.
    pub fn assignable_to(mut self, name: impl Into<String>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    #[inline]
    pub fn get_constructor(&self) -> Option<&Callable> {
        self.constructor.as_ref()
    }

    #[inline]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    #[inline]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    #[inline]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Whether objects of this type satisfy a target type `name`.
    pub fn is_assignable_to(&self, name: &str) -> bool {
        self.name == name || self.supertypes.iter().any(|s| s == name)
    }

    /// Assign a property on an object of this type.
    pub fn set_property(&self, object: &mut Object, name: &str, value: &Resolved) -> Result<()> {
        match self.properties.get(name) {
            Some(setter) => setter(object.value_mut(), value),
            None => Err(WiringError::construction(
                &self.name,
                format!("unknown property \"{}\" in type \"{}\"", name, self.name),
            )),
        }
    }

    /// Run a hook on an object of this type.
    pub fn run_hook(&self, object: &mut Object, name: &str) -> Result<()> {
        match self.methods.get(name) {
            Some(Method::Hook(hook)) => hook(object.value_mut()),
            Some(Method::Factory(_)) => Err(WiringError::construction(
                &self.name,
                format!("\"{}\" on type \"{}\" is a static factory, not a hook", name, self.name),
            )),
            None => Err(WiringError::construction(
                &self.name,
                format!("method \"{}\" is undefined in type \"{}\"", name, self.name),
            )),
        }
    }
}

impl std::fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort_unstable();
        let mut properties: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        properties.sort_unstable();
        f.debug_struct("TypeBinding")
            .field("name", &self.name)
            .field("constructor", &self.constructor.as_ref().map(|c| c.arity))
            .field("methods", &methods)
            .field("properties", &properties)
            .field("supertypes", &self.supertypes)
            .finish()
    }
}

// =============================================================================
// Registry capability
// =============================================================================

/// Source of type bindings consulted during construction.
pub trait TypeRegistry: Send + Sync {
    /// Binding registered under a type name.
    fn binding(&self, type_name: &str) -> Option<&TypeBinding>;

    /// Binding for the concrete type of a produced object.
    fn binding_of(&self, type_id: TypeId) -> Option<&TypeBinding>;
}

/// A type that can describe its own binding.
///
/// Implemented by `#[derive(Wire)]`.
pub trait Wire: Any + Send + Sync {
    fn binding() -> TypeBinding;
}

/// Registration table of type bindings.
#[derive(Debug, Default, Clone)]
pub struct BindingTable {
    by_name: HashMap<String, TypeBinding, RandomState>,
    by_type: HashMap<TypeId, String, RandomState>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding, replacing any previous one with the same name.
    pub fn register(&mut self, binding: TypeBinding) {
        #[cfg(feature = "logging")]
        tracing::trace!(
            target: "object_wiring",
            type_name = binding.name(),
            "Registering type binding"
        );

        if let Some(type_id) = binding.type_id {
            self.by_type.insert(type_id, binding.name.clone());
        }
        self.by_name.insert(binding.name.clone(), binding);
    }

    /// Register the binding a [`Wire`] type describes.
    pub fn register_wired<T: Wire>(&mut self) {
        self.register(T::binding());
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, binding: TypeBinding) -> Self {
        self.register(binding);
        self
    }

    /// Builder-style [`register_wired`](Self::register_wired).
    pub fn with_wired<T: Wire>(mut self) -> Self {
        self.register_wired::<T>();
        self
    }

    #[inline]
    pub fn contains(&self, type_name: &str) -> bool {
        self.by_name.contains_key(type_name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TypeRegistry for BindingTable {
    #[inline]
    fn binding(&self, type_name: &str) -> Option<&TypeBinding> {
        self.by_name.get(type_name)
    }

    #[inline]
    fn binding_of(&self, type_id: TypeId) -> Option<&TypeBinding> {
        self.by_type.get(&type_id).and_then(|name| self.by_name.get(name))
    }
}
