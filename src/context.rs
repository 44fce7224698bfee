//! Descriptor registry and singleton lifecycle
//!
//! The `Context` owns every descriptor by id and the cache of built
//! singletons. Lookup by id is the single entry point: it returns the cached
//! singleton, or builds the descriptor through [`InstanceFactory`].

use crate::factory::InstanceFactory;
use crate::storage::{Claim, InstanceCache};
use crate::{BindingTable, Descriptor, Instance, Result, TypeRegistry, Value, WiringError};
use crate::value::{walk, Resolved};
use ahash::RandomState;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, info, trace};

/// Default limit on nested descriptor lookups.
pub const DEFAULT_MAX_DEPTH: usize = 128;

// =============================================================================
// Resolution path
// =============================================================================

/// Descriptor ids currently under construction in one lookup, outermost
/// first.
#[derive(Debug)]
pub(crate) struct Resolution {
    path: Vec<String>,
    max_depth: usize,
}

impl Resolution {
    #[inline]
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            path: Vec::new(),
            max_depth,
        }
    }

    pub(crate) fn enter(&mut self, id: &str) -> Result<()> {
        if self.path.len() >= self.max_depth {
            return Err(WiringError::DepthExceeded {
                depth: self.path.len() + 1,
            });
        }
        self.path.push(id.to_owned());
        Ok(())
    }

    #[inline]
    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }

    #[inline]
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.path.iter().any(|entry| entry == id)
    }

    /// Cycle error for re-entering `id`, starting at its first occurrence.
    ///
    /// When `id` is held by an outer lookup or a thread waiting on this one,
    /// the whole path leading back to it is reported.
    pub(crate) fn cycle(&self, id: &str) -> WiringError {
        let start = self.path.iter().position(|entry| entry == id).unwrap_or(0);
        let mut path = self.path[start..].to_vec();
        path.push(id.to_owned());
        WiringError::CircularDependency { path }
    }
}

// =============================================================================
// Context
// =============================================================================

/// Registry of descriptors plus the singleton instance cache.
///
/// # Examples
///
/// ```rust
/// use object_wiring::{Arity, BindingTable, Context, Descriptor, Object, TypeBinding};
///
/// struct Clock;
///
/// let registry = BindingTable::new().with(
///     TypeBinding::of::<Clock>("Clock").constructor(Arity::none(), |_| Ok(Object::new(Clock))),
/// );
///
/// let mut ctx = Context::new(registry);
/// ctx.insert(Descriptor::new("clock", "Clock")).unwrap();
///
/// let a = ctx.get("clock").unwrap().unwrap();
/// let b = ctx.get("clock").unwrap().unwrap();
/// assert!(a.ptr_eq(&b));
/// assert!(ctx.get("missing").unwrap().is_none());
/// ```
pub struct Context {
    registry: Arc<dyn TypeRegistry>,
    descriptors: HashMap<String, Descriptor, RandomState>,
    /// Registration order of descriptor ids
    order: Vec<String>,
    instances: InstanceCache,
    max_depth: usize,
}

impl Context {
    /// Create an empty context over a construction capability.
    pub fn new<R: TypeRegistry + 'static>(registry: R) -> Self {
        Self::with_shared(Arc::new(registry))
    }

    /// Create an empty context sharing a registry with other contexts.
    pub fn with_shared(registry: Arc<dyn TypeRegistry>) -> Self {
        #[cfg(feature = "logging")]
        debug!(target: "object_wiring", "Creating new wiring context");

        Self {
            registry,
            descriptors: HashMap::default(),
            order: Vec::new(),
            instances: InstanceCache::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Create a context with pre-allocated capacity.
    pub fn with_capacity<R: TypeRegistry + 'static>(registry: R, capacity: usize) -> Self {
        Self {
            registry: Arc::new(registry),
            descriptors: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            order: Vec::with_capacity(capacity),
            instances: InstanceCache::with_capacity(capacity),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit how deeply lookups may nest before failing with
    /// [`WiringError::DepthExceeded`].
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[inline]
    pub fn registry(&self) -> &dyn TypeRegistry {
        &*self.registry
    }

    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    // =========================================================================
    // Descriptor registry
    // =========================================================================

    /// Register or replace a descriptor.
    ///
    /// The descriptor is always stored under its own id, so `key` may name
    /// it differently (an alias used at the call site). A replaced id keeps
    /// its registration position and loses any cached instance.
    pub fn set(&mut self, key: &str, descriptor: Descriptor) -> Result<()> {
        descriptor.validate()?;
        let id = descriptor.id().to_owned();

        #[cfg(feature = "logging")]
        debug!(
            target: "object_wiring",
            key,
            id = id.as_str(),
            target_type = descriptor.target_type(),
            lifecycle = descriptor.lifecycle().as_str(),
            lazy = descriptor.is_lazy(),
            "Registering descriptor"
        );
        #[cfg(not(feature = "logging"))]
        let _ = key;

        if self.descriptors.insert(id.clone(), descriptor).is_some() {
            self.instances.remove(&id);
        } else {
            self.order.push(id);
        }
        Ok(())
    }

    /// Register a descriptor under its own id.
    #[inline]
    pub fn insert(&mut self, descriptor: Descriptor) -> Result<()> {
        let id = descriptor.id().to_owned();
        self.set(&id, descriptor)
    }

    /// Remove a descriptor and its cached instance.
    pub fn unset(&mut self, id: &str) -> Option<Descriptor> {
        let removed = self.descriptors.remove(id)?;
        self.order.retain(|entry| entry != id);
        self.instances.remove(id);

        #[cfg(feature = "logging")]
        debug!(target: "object_wiring", id, "Removed descriptor");

        Some(removed)
    }

    /// Whether a descriptor is registered under `id`. Cached instances are
    /// not consulted.
    #[inline]
    pub fn has(&self, id: &str) -> bool {
        self.descriptors.contains_key(id)
    }

    #[inline]
    pub fn descriptor(&self, id: &str) -> Option<&Descriptor> {
        self.descriptors.get(id)
    }

    /// Descriptors in registration order.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            order: self.order.iter(),
            descriptors: &self.descriptors,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Look up the instance for `id`.
    ///
    /// Singletons are built once and cached; prototypes are built on every
    /// call. An unknown id is `Ok(None)`, not an error.
    pub fn get(&self, id: &str) -> Result<Option<Instance>> {
        let mut resolution = self.resolution();
        self.resolve(id, &mut resolution)
    }

    /// Resolve a free-standing value against this context.
    pub fn resolve_value(&self, value: &Value) -> Result<Resolved> {
        let mut resolution = self.resolution();
        walk(value, &mut crate::ValueResolver::new(self, &mut resolution))
    }

    /// Build every non-lazy singleton that is not cached yet, in
    /// registration order. Returns how many were built.
    pub fn init_eager_singletons(&self) -> Result<usize> {
        let mut built = 0;
        for (id, descriptor) in self.iter() {
            if descriptor.is_singleton() && !descriptor.is_lazy() && !self.instances.is_built(id) {
                self.get(id)?;
                built += 1;
            }
        }

        #[cfg(feature = "logging")]
        info!(
            target: "object_wiring",
            built,
            descriptors = self.len(),
            "Initialized eager singletons"
        );

        Ok(built)
    }

    pub(crate) fn resolution(&self) -> Resolution {
        Resolution::new(self.max_depth)
    }

    pub(crate) fn resolve(&self, id: &str, resolution: &mut Resolution) -> Result<Option<Instance>> {
        let Some(descriptor) = self.descriptors.get(id) else {
            return Ok(None);
        };

        if !descriptor.is_singleton() {
            if resolution.contains(id) {
                return Err(resolution.cycle(id));
            }
            return InstanceFactory::new(descriptor, self).build(resolution).map(Some);
        }

        loop {
            match self.instances.claim(id) {
                Claim::Cached(instance) => {
                    #[cfg(feature = "logging")]
                    trace!(target: "object_wiring", id, "Singleton cache hit");

                    return Ok(Some(instance));
                }
                Claim::Reentered => return Err(resolution.cycle(id)),
                Claim::Pending(pending) => {
                    #[cfg(feature = "logging")]
                    trace!(target: "object_wiring", id, "Waiting for singleton built by another thread");

                    if !self.instances.wait_for(&pending) {
                        return Err(resolution.cycle(id));
                    }
                }
                Claim::Claimed(guard) => {
                    let instance = InstanceFactory::new(descriptor, self).build(resolution)?;
                    guard.commit(instance.clone());

                    #[cfg(feature = "logging")]
                    debug!(
                        target: "object_wiring",
                        id,
                        type_name = instance.type_name(),
                        "Cached singleton instance"
                    );

                    return Ok(Some(instance));
                }
            }
        }
    }

    // =========================================================================
    // Instance cache
    // =========================================================================

    /// Whether a built singleton is cached for `id`.
    #[inline]
    pub fn is_cached(&self, id: &str) -> bool {
        self.instances.is_built(id)
    }

    /// Drop the cached singleton for `id`; the next lookup rebuilds it.
    #[inline]
    pub fn evict(&self, id: &str) -> bool {
        self.instances.remove(id)
    }

    /// Drop every cached singleton.
    pub fn clear_instances(&self) {
        #[cfg(feature = "logging")]
        debug!(
            target: "object_wiring",
            cached = self.instances.len(),
            "Clearing singleton cache"
        );

        self.instances.clear();
    }

    /// Number of cached singletons.
    #[inline]
    pub fn cached_count(&self) -> usize {
        self.instances.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(BindingTable::new())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("descriptors", &self.order)
            .field("cached", &self.instances.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Iterator over `(id, descriptor)` pairs in registration order.
pub struct Iter<'a> {
    order: std::slice::Iter<'a, String>,
    descriptors: &'a HashMap<String, Descriptor, RandomState>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Descriptor);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.order.next()?;
        self.descriptors.get(id).map(|descriptor| (id.as_str(), descriptor))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = (&'a str, &'a Descriptor);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_registry, Sample1, Sample2};
    use crate::{Arity, Object, TypeBinding};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn context() -> Context {
        Context::new(sample_registry())
    }

    #[test]
    fn test_singleton_identity() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("foo", "Sample1").with_property("bar", "baz"))
            .unwrap();

        let a = ctx.get("foo").unwrap().unwrap();
        let b = ctx.get("foo").unwrap().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.downcast_ref::<Sample1>().unwrap().bar, Resolved::from("baz"));
    }

    #[test]
    fn test_prototype_distinct_but_equal() {
        let mut ctx = context();
        ctx.insert(
            Descriptor::new("foo", "Sample1")
                .prototype()
                .with_property("bar", "baz"),
        )
        .unwrap();

        let a = ctx.get("foo").unwrap().unwrap();
        let b = ctx.get("foo").unwrap().unwrap();
        assert!(!a.ptr_eq(&b));
        assert_eq!(
            a.downcast_ref::<Sample1>().unwrap().bar,
            b.downcast_ref::<Sample1>().unwrap().bar
        );
        assert!(!ctx.is_cached("foo"));
    }

    #[test]
    fn test_reference_sharing() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("foo", "Sample1").with_property("bar", "baz"))
            .unwrap();
        ctx.insert(Descriptor::new("bar", "Sample2").with_param(Value::reference("foo")))
            .unwrap();

        let bar = ctx.get("bar").unwrap().unwrap();
        let foo = ctx.get("foo").unwrap().unwrap().downcast::<Sample1>().unwrap();
        assert!(Arc::ptr_eq(&bar.downcast_ref::<Sample2>().unwrap().bar, &foo));
    }

    #[test]
    fn test_nested_map_round_trip() {
        let mut ctx = context();
        let map = Value::map([("foo", Value::from("lorem")), ("bar", Value::from("ipsum"))]);
        ctx.insert(Descriptor::new("baz", "Sample1").with_property("bar", map))
            .unwrap();

        let baz = ctx.get("baz").unwrap().unwrap();
        let bar = &baz.downcast_ref::<Sample1>().unwrap().bar;
        assert_eq!(bar.keys(), vec!["foo", "bar"]);
        assert_eq!(bar.get("foo"), Some(&Resolved::from("lorem")));
        assert_eq!(bar.get("bar"), Some(&Resolved::from("ipsum")));
    }

    #[test]
    fn test_unknown_id_is_none() {
        let ctx = context();
        assert!(ctx.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_set_stores_under_descriptor_id() {
        let mut ctx = context();
        ctx.set("alias", Descriptor::new("foo", "Sample1")).unwrap();

        assert!(ctx.has("foo"));
        assert!(!ctx.has("alias"));
        assert!(ctx.get("alias").unwrap().is_none());

        let instance = ctx.get("foo").unwrap().unwrap();
        assert!(instance.downcast_ref::<Sample1>().is_some());
        assert!(ctx.is_cached("foo"));
    }

    #[test]
    fn test_set_rejects_malformed_descriptor() {
        let mut ctx = context();
        let err = ctx.set("foo", Descriptor::new("foo", "")).unwrap_err();
        assert!(matches!(err, WiringError::InvalidDescriptor { .. }));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_replace_keeps_position_and_evicts() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("a", "Sample1")).unwrap();
        ctx.insert(Descriptor::new("b", "Sample1")).unwrap();
        let first = ctx.get("a").unwrap().unwrap();

        ctx.insert(Descriptor::new("a", "Sample1").with_property("bar", "new"))
            .unwrap();

        let ids: Vec<&str> = ctx.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!ctx.is_cached("a"));

        let second = ctx.get("a").unwrap().unwrap();
        assert!(!first.ptr_eq(&second));
        assert_eq!(second.downcast_ref::<Sample1>().unwrap().bar, Resolved::from("new"));
    }

    #[test]
    fn test_unset_removes_descriptor_and_instance() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("foo", "Sample1")).unwrap();
        ctx.get("foo").unwrap();
        assert!(ctx.is_cached("foo"));

        assert!(ctx.unset("foo").is_some());
        assert!(!ctx.has("foo"));
        assert!(!ctx.is_cached("foo"));
        assert!(ctx.unset("foo").is_none());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_has_ignores_instances() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("foo", "Sample1")).unwrap();
        assert!(ctx.has("foo"));
        assert!(!ctx.is_cached("foo"));
    }

    #[test]
    fn test_iteration_is_restartable() {
        let mut ctx = context();
        for id in ["c", "a", "b"] {
            ctx.insert(Descriptor::new(id, "Sample1")).unwrap();
        }

        let first: Vec<&str> = (&ctx).into_iter().map(|(id, _)| id).collect();
        let second: Vec<&str> = ctx.iter().map(|(id, _)| id).collect();
        assert_eq!(first, vec!["c", "a", "b"]);
        assert_eq!(first, second);
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn test_eager_singletons() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("lazy", "Sample1")).unwrap();
        ctx.insert(Descriptor::new("eager", "Sample1").eager()).unwrap();
        ctx.insert(Descriptor::new("proto", "Sample1").prototype().eager())
            .unwrap();

        assert_eq!(ctx.init_eager_singletons().unwrap(), 1);
        assert!(ctx.is_cached("eager"));
        assert!(!ctx.is_cached("lazy"));
        assert!(!ctx.is_cached("proto"));

        assert_eq!(ctx.init_eager_singletons().unwrap(), 0);
    }

    #[test]
    fn test_failed_construction_is_not_cached_and_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let registry = BindingTable::new().with(TypeBinding::of::<u32>("Flaky").constructor(
            Arity::none(),
            move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WiringError::construction("flaky", "first attempt fails"))
                } else {
                    Ok(Object::new(7u32))
                }
            },
        ));

        let mut ctx = Context::new(registry);
        ctx.insert(Descriptor::new("flaky", "Flaky")).unwrap();

        assert!(ctx.get("flaky").is_err());
        assert!(!ctx.is_cached("flaky"));
        assert_eq!(ctx.get("flaky").unwrap().unwrap().downcast_ref::<u32>(), Some(&7));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_lookup_waits_for_build() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let registry = BindingTable::new().with(TypeBinding::of::<u64>("Slow").constructor(
            Arity::none(),
            move |_| {
                std::thread::sleep(Duration::from_millis(100));
                Ok(Object::new(counter.fetch_add(1, Ordering::SeqCst) as u64))
            },
        ));

        let mut ctx = Context::new(registry);
        ctx.insert(Descriptor::new("slow", "Slow")).unwrap();

        let (first, second) = std::thread::scope(|scope| {
            let first = scope.spawn(|| ctx.get("slow"));
            std::thread::sleep(Duration::from_millis(20));
            let second = scope.spawn(|| ctx.get("slow"));
            (first.join().unwrap(), second.join().unwrap())
        });

        let first = first.unwrap().unwrap();
        let second = second.unwrap().unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cross_thread_cycle_fails_instead_of_blocking() {
        struct Delay;
        struct Pair;

        let registry = BindingTable::new()
            .with(TypeBinding::of::<Delay>("Delay").constructor(Arity::none(), |_| {
                std::thread::sleep(Duration::from_millis(50));
                Ok(Object::new(Delay))
            }))
            .with(TypeBinding::of::<Pair>("Pair").constructor(Arity::exactly(2), |_| {
                Ok(Object::new(Pair))
            }));

        let mut ctx = Context::new(registry);
        ctx.insert(Descriptor::new("delay", "Delay").prototype()).unwrap();
        for (id, other) in [("a", "b"), ("b", "a")] {
            ctx.insert(
                Descriptor::new(id, "Pair")
                    .with_param(Value::reference("delay"))
                    .with_param(Value::reference(other)),
            )
            .unwrap();
        }

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| ctx.get("a"));
            let b = scope.spawn(|| ctx.get("b"));
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(matches!(a, Err(WiringError::CircularDependency { .. })));
        assert!(matches!(b, Err(WiringError::CircularDependency { .. })));
        assert_eq!(ctx.cached_count(), 0);
    }

    #[test]
    fn test_singleton_constructor_cycle() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("a", "Sample2").with_param(Value::reference("b")))
            .unwrap();
        ctx.insert(Descriptor::new("b", "Sample2").with_param(Value::reference("a")))
            .unwrap();

        match ctx.get("a").unwrap_err() {
            WiringError::CircularDependency { path } => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ctx.cached_count(), 0);
    }

    #[test]
    fn test_prototype_cycle() {
        let mut ctx = context();
        ctx.insert(
            Descriptor::new("a", "Sample1")
                .prototype()
                .with_property("bar", Value::reference("a")),
        )
        .unwrap();

        assert!(matches!(
            ctx.get("a").unwrap_err(),
            WiringError::CircularDependency { .. }
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut ctx = context().with_max_depth(3);
        for (id, next) in [("a", "b"), ("b", "c"), ("c", "d")] {
            ctx.insert(Descriptor::new(id, "Sample1").with_property("bar", Value::reference(next)))
                .unwrap();
        }
        ctx.insert(Descriptor::new("d", "Sample1")).unwrap();

        assert!(matches!(
            ctx.get("a").unwrap_err(),
            WiringError::DepthExceeded { depth: 4 }
        ));
        assert!(ctx.get("b").is_ok());
    }

    #[test]
    fn test_resolve_value() {
        let mut ctx = context();
        ctx.insert(Descriptor::new("foo", "Sample1")).unwrap();

        let resolved = ctx
            .resolve_value(&Value::map([("x", Value::reference("foo"))]))
            .unwrap();
        assert!(resolved.get("x").unwrap().as_instance().unwrap().is::<Sample1>());
    }
}
