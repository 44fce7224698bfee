//! Instance construction
//!
//! [`InstanceFactory`] turns one [`Descriptor`] into a live [`Instance`]:
//! resolve parameters, invoke the constructor or static factory, assign
//! properties in declaration order, run the init hook, then freeze.
//!
//! [`ValueResolver`] is the runtime [`ValueSink`]: references become lookups
//! on the owning [`Context`].

use crate::context::Resolution;
use crate::registry::{Callable, Method, TypeBinding};
use crate::value::{walk, Literal, Resolved, Value, ValueSink};
use crate::{Args, Context, Descriptor, Instance, Result, WiringError};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Value resolution
// =============================================================================

/// Resolves descriptor values against a context.
pub struct ValueResolver<'a, 'r> {
    context: &'a Context,
    resolution: &'r mut Resolution,
}

impl<'a, 'r> ValueResolver<'a, 'r> {
    pub(crate) fn new(context: &'a Context, resolution: &'r mut Resolution) -> Self {
        Self {
            context,
            resolution,
        }
    }

    /// Resolve one value tree as a standalone lookup.
    pub fn resolve(value: &Value, context: &Context) -> Result<Resolved> {
        let mut resolution = context.resolution();
        walk(value, &mut ValueResolver::new(context, &mut resolution))
    }
}

impl ValueSink for ValueResolver<'_, '_> {
    type Output = Resolved;

    #[inline]
    fn literal(&mut self, literal: &Literal) -> Result<Resolved> {
        Ok(Resolved::from(literal.clone()))
    }

    fn reference(&mut self, id: &str) -> Result<Resolved> {
        match self.context.resolve(id, self.resolution)? {
            Some(instance) => Ok(Resolved::Object(instance)),
            None => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "object_wiring",
                    reference = id,
                    "Reference to unknown descriptor resolved to null"
                );
                Ok(Resolved::Null)
            }
        }
    }

    #[inline]
    fn list(&mut self, items: Vec<Resolved>) -> Result<Resolved> {
        Ok(Resolved::List(items))
    }

    #[inline]
    fn map(&mut self, entries: Vec<(String, Resolved)>) -> Result<Resolved> {
        Ok(Resolved::Map(entries))
    }
}

// =============================================================================
// Instance factory
// =============================================================================

/// Builds the instance one descriptor describes.
///
/// Never touches the singleton cache itself; caching is the context's job,
/// so a failed build leaves nothing behind.
pub struct InstanceFactory<'a> {
    descriptor: &'a Descriptor,
    context: &'a Context,
}

impl<'a> InstanceFactory<'a> {
    #[inline]
    pub fn new(descriptor: &'a Descriptor, context: &'a Context) -> Self {
        Self {
            descriptor,
            context,
        }
    }

    /// Build a fresh instance.
    ///
    /// Referenced singletons come from (and go into) the context's cache;
    /// the described object itself is never cached here.
    pub fn create(&self) -> Result<Instance> {
        let mut resolution = self.context.resolution();
        self.build(&mut resolution)
    }

    pub(crate) fn build(&self, resolution: &mut Resolution) -> Result<Instance> {
        resolution.enter(self.descriptor.id())?;
        let result = self.materialize(resolution);
        resolution.leave();
        result
    }

    fn materialize(&self, resolution: &mut Resolution) -> Result<Instance> {
        let descriptor = self.descriptor;
        let registry = self.context.registry();
        let construction_type = descriptor.construction_type();

        #[cfg(feature = "logging")]
        debug!(
            target: "object_wiring",
            id = descriptor.id(),
            construction_type,
            lifecycle = descriptor.lifecycle().as_str(),
            "Constructing instance"
        );

        let binding = registry.binding(construction_type).ok_or_else(|| {
            self.error(format!("type \"{}\" is not registered", construction_type))
        })?;
        let callable = self.callable(binding)?;

        let arity = callable.arity();
        if !arity.accepts(descriptor.param_count()) {
            return Err(self.error(format!(
                "\"{}\" expects {} parameters, {} given",
                self.callable_name(),
                arity,
                descriptor.param_count()
            )));
        }

        let args = descriptor
            .params()
            .iter()
            .map(|param| self.resolve(param, resolution))
            .collect::<Result<Vec<_>>>()?;
        let mut object = callable
            .invoke(Args::new(args))
            .map_err(|err| self.wrap(&self.callable_name(), err))?;

        if construction_type != descriptor.target_type() {
            let assignable = registry
                .binding_of(object.type_id())
                .is_some_and(|produced| produced.is_assignable_to(descriptor.target_type()));
            if !assignable {
                return Err(self.error(format!(
                    "\"{}\" produced {} which is not a \"{}\"",
                    self.callable_name(),
                    object.type_name(),
                    descriptor.target_type()
                )));
            }
        }

        if descriptor.properties().is_empty() && descriptor.init_method().is_none() {
            return Ok(object.into_instance());
        }

        let concrete = registry.binding_of(object.type_id()).ok_or_else(|| {
            self.error(format!("no binding registered for {}", object.type_name()))
        })?;

        for (name, value) in descriptor.properties() {
            if !concrete.has_property(name) {
                return Err(self.error(format!(
                    "property \"{}\" does not exist in type \"{}\"",
                    name,
                    concrete.name()
                )));
            }
            let resolved = self.resolve(value, resolution)?;

            #[cfg(feature = "logging")]
            trace!(
                target: "object_wiring",
                id = descriptor.id(),
                property = name.as_str(),
                value_type = resolved.type_label(),
                "Assigning property"
            );

            concrete
                .set_property(&mut object, name, &resolved)
                .map_err(|err| self.wrap(&format!("property \"{}\"", name), err))?;
        }

        if let Some(hook) = descriptor.init_method() {
            match concrete.method(hook) {
                Some(Method::Hook(_)) => concrete
                    .run_hook(&mut object, hook)
                    .map_err(|err| self.wrap(&format!("init method \"{}\"", hook), err))?,
                Some(Method::Factory(_)) => {
                    return Err(self.error(format!(
                        "init method \"{}\" in type \"{}\" is static",
                        hook,
                        concrete.name()
                    )));
                }
                None => {
                    return Err(self.error(format!(
                        "init method \"{}\" is undefined in type \"{}\"",
                        hook,
                        concrete.name()
                    )));
                }
            }
        }

        Ok(object.into_instance())
    }

    /// Pick the constructor or the named static factory.
    fn callable<'b>(&self, binding: &'b TypeBinding) -> Result<&'b Callable> {
        match self.descriptor.factory_method() {
            None => binding.get_constructor().ok_or_else(|| {
                self.error(format!(
                    "type \"{}\" has no accessible constructor",
                    binding.name()
                ))
            }),
            Some(method) => match binding.method(method) {
                Some(Method::Factory(callable)) => Ok(callable),
                Some(Method::Hook(_)) => Err(self.error(format!(
                    "factory method \"{}\" in type \"{}\" is not static",
                    method,
                    binding.name()
                ))),
                None => Err(self.error(format!(
                    "factory method \"{}\" is undefined in type \"{}\"",
                    method,
                    binding.name()
                ))),
            },
        }
    }

    fn callable_name(&self) -> String {
        match self.descriptor.factory_method() {
            Some(method) => format!("{}::{}", self.descriptor.construction_type(), method),
            None => self.descriptor.construction_type().to_owned(),
        }
    }

    #[inline]
    fn resolve(&self, value: &Value, resolution: &mut Resolution) -> Result<Resolved> {
        walk(value, &mut ValueResolver::new(self.context, resolution))
    }

    #[inline]
    fn error(&self, reason: String) -> WiringError {
        WiringError::construction(self.descriptor.id(), reason)
    }

    /// Errors raised by user callables are reported against this descriptor.
    fn wrap(&self, site: &str, err: WiringError) -> WiringError {
        if err.is_propagated() {
            err
        } else {
            self.error(format!("{}: {}", site, err))
        }
    }
}
