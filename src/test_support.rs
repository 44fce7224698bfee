//! Sample types shared by the unit tests.

use crate::{Arity, BindingTable, Context, Descriptor, Object, Resolved, TypeBinding, Value};
use std::sync::Arc;

/// Constructor with no parameters, one property, one hook.
#[derive(Debug, Default)]
pub(crate) struct Sample1 {
    pub(crate) bar: Resolved,
    pub(crate) initialized: bool,
}

/// Constructor taking a `Sample1`.
#[derive(Debug)]
pub(crate) struct Sample2 {
    pub(crate) bar: Arc<Sample1>,
}

/// Only buildable through its static factory.
#[derive(Debug)]
pub(crate) struct Sample3 {
    pub(crate) bar: String,
}

pub(crate) fn sample_registry() -> BindingTable {
    BindingTable::new()
        .with(
            TypeBinding::of::<Sample1>("Sample1")
                .constructor(Arity::none(), |_| Ok(Object::new(Sample1::default())))
                .property("bar", |this: &mut Sample1, value| {
                    this.bar = value.clone();
                    Ok(())
                })
                .hook("init", |this: &mut Sample1| {
                    this.initialized = true;
                    Ok(())
                })
                .assignable_to("Named"),
        )
        .with(
            TypeBinding::of::<Sample2>("Sample2")
                .constructor(Arity::exactly(1), |args| {
                    Ok(Object::new(Sample2 { bar: args.get(0)? }))
                })
                .property("bar", |this: &mut Sample2, value| {
                    this.bar = crate::FromResolved::from_resolved(value)?;
                    Ok(())
                }),
        )
        .with(
            TypeBinding::of::<Sample3>("Sample3")
                .factory("factory", Arity::none(), |_| {
                    Ok(Object::new(Sample3 { bar: "baz".into() }))
                })
                .property("bar", |this: &mut Sample3, value| {
                    this.bar = crate::FromResolved::from_resolved(value)?;
                    Ok(())
                }),
        )
        .with(
            TypeBinding::named("Sample4").factory("factory", Arity::none(), |_| {
                Ok(Object::new(Sample1::default()))
            }),
        )
}

/// Singletons covering constructors, references, nested collections and
/// factories.
pub(crate) fn sample1_context() -> Context {
    let mut ctx = Context::new(sample_registry());
    let descriptors = [
        Descriptor::new("foo", "Sample1").with_property("bar", "foobar"),
        Descriptor::new("bar", "Sample2").with_param(Value::reference("foo")),
        Descriptor::new("baz", "Sample1").with_property(
            "bar",
            Value::map([("foo", Value::from("lorem")), ("bar", Value::from("ipsum"))]),
        ),
        Descriptor::new("nested", "Sample1").with_property(
            "bar",
            Value::list([
                Value::from("foobar"),
                Value::reference("foo"),
                Value::from(vec!["lorem", "ipsum"]),
                Value::map([
                    ("lorem", Value::from("ipsum")),
                    ("foo", Value::reference("foo")),
                ]),
            ]),
        ),
        Descriptor::new("lorem", "Sample3").with_factory_method("factory"),
        Descriptor::new("ipsum", "Sample1")
            .with_factory_type("Sample4")
            .with_factory_method("factory")
            .with_property("bar", "foobar"),
    ];
    for descriptor in descriptors {
        ctx.insert(descriptor).expect("sample descriptor");
    }
    ctx
}

/// A prototype referenced from several singletons.
pub(crate) fn sample2_context() -> Context {
    let mut ctx = Context::new(sample_registry());
    let descriptors = [
        Descriptor::new("foo", "Sample1")
            .prototype()
            .with_property("bar", "foobar"),
        Descriptor::new("bar", "Sample2").with_param(Value::reference("foo")),
        Descriptor::new("baz", "Sample2").with_param(Value::list([
            Value::reference("foo"),
            Value::from("bar"),
            Value::reference("foo"),
        ])),
    ];
    for descriptor in descriptors {
        ctx.insert(descriptor).expect("sample descriptor");
    }
    ctx
}
