//! Live objects produced by the wiring engine
//!
//! An [`Object`] is owned and still mutable: constructors and factories
//! return one, and property setters run against it. Once fully populated it
//! is frozen into an [`Instance`], the shared handle that the context caches
//! and hands out.

use std::any::{Any, TypeId};
use std::sync::Arc;

/// A shared, type-erased live object.
///
/// Cloning an `Instance` clones the handle, never the object: identity is
/// preserved across clones and can be checked with [`Instance::ptr_eq`].
#[derive(Clone)]
pub struct Instance {
    type_id: TypeId,
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wrap an already-built value.
    #[inline]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing `Arc` without re-allocating.
    #[inline]
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            inner: value as Arc<dyn Any + Send + Sync>,
        }
    }

    /// Downcast to a shared handle of the concrete type.
    #[inline]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Borrow the concrete value.
    #[inline]
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Check whether the object is of type `T`.
    #[inline]
    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Identity comparison.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// `TypeId` of the concrete object.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the concrete object, for diagnostics.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// An owned object under construction.
pub struct Object {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl Object {
    /// Take ownership of a freshly built value.
    #[inline]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// `TypeId` of the concrete object.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the concrete object.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Mutable access for property setters and hooks.
    #[inline]
    pub(crate) fn value_mut(&mut self) -> &mut (dyn Any + Send + Sync) {
        &mut *self.value
    }

    /// Freeze into a shared instance.
    #[inline]
    pub fn into_instance(self) -> Instance {
        Instance {
            type_id: self.type_id,
            type_name: self.type_name,
            inner: Arc::from(self.value),
        }
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("type_name", &self.type_name)
            .finish()
    }
}
