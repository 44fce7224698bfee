//! Benchmarks for descriptor resolution and compilation

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use object_wiring::{
    Arity, BindingTable, Context, Descriptor, GraphCompiler, Object, Resolved, TypeBinding, Value,
};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
#[derive(Default)]
struct Leaf {
    value: Resolved,
}

#[allow(dead_code)]
struct Node {
    child: Arc<Leaf>,
}

fn registry() -> BindingTable {
    BindingTable::new()
        .with(
            TypeBinding::of::<Leaf>("Leaf")
                .constructor(Arity::none(), |_| Ok(Object::new(Leaf::default())))
                .property("value", |this: &mut Leaf, value| {
                    this.value = value.clone();
                    Ok(())
                }),
        )
        .with(
            TypeBinding::of::<Node>("Node").constructor(Arity::exactly(1), |args| {
                Ok(Object::new(Node { child: args.get(0)? }))
            }),
        )
}

/// `n` nodes over `n` leaves, each leaf carrying a small nested literal.
fn graph(n: usize, lifecycle_prototype: bool) -> Context {
    let mut ctx = Context::with_capacity(registry(), n * 2);
    for i in 0..n {
        let mut leaf = Descriptor::new(format!("leaf{i}"), "Leaf").with_property(
            "value",
            Value::map([
                ("index", Value::from(i as i64)),
                ("tags", Value::from(vec!["a", "b", "c"])),
            ]),
        );
        if lifecycle_prototype {
            leaf = leaf.prototype();
        }
        ctx.insert(leaf).unwrap();
        ctx.insert(
            Descriptor::new(format!("node{i}"), "Node")
                .with_param(Value::reference(format!("leaf{i}"))),
        )
        .unwrap();
    }
    ctx
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    for n in [10usize, 100] {
        group.throughput(Throughput::Elements(n as u64 * 2));
        group.bench_with_input(BenchmarkId::new("descriptors", n), &n, |b, &n| {
            b.iter(|| black_box(graph(n, false)))
        });
    }

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let ctx = graph(10, false);
    ctx.get("node0").unwrap();

    group.bench_function("cached_singleton", |b| {
        b.iter(|| black_box(ctx.get("node0").unwrap()))
    });

    group.bench_function("singleton_cold", |b| {
        b.iter(|| {
            ctx.clear_instances();
            black_box(ctx.get("node0").unwrap())
        })
    });

    let protos = graph(10, true);
    group.bench_function("prototype_leaf", |b| {
        b.iter(|| black_box(protos.get("leaf0").unwrap()))
    });

    group.bench_function("unknown_id", |b| {
        b.iter(|| black_box(ctx.get("missing").unwrap()))
    });

    group.finish();
}

fn bench_eager_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("eager_init");

    let mut ctx = graph(50, false);
    let ids: Vec<String> = ctx.iter().map(|(id, _)| id.to_owned()).collect();
    for id in ids {
        if let Some(descriptor) = ctx.descriptor(&id).cloned() {
            ctx.set(&id, descriptor.eager()).unwrap();
        }
    }

    group.throughput(Throughput::Elements(100));
    group.bench_function("graph_50", |b| {
        b.iter(|| {
            ctx.clear_instances();
            black_box(ctx.init_eager_singletons().unwrap())
        })
    });

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for n in [10usize, 100] {
        let singletons = graph(n, false);
        group.bench_with_input(BenchmarkId::new("singletons", n), &singletons, |b, ctx| {
            b.iter(|| black_box(GraphCompiler::new(ctx).compile_to_string().unwrap()))
        });

        let prototypes = graph(n, true);
        group.bench_with_input(BenchmarkId::new("prototypes", n), &prototypes, |b, ctx| {
            b.iter(|| black_box(GraphCompiler::new(ctx).statements().unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_eager_init,
    bench_compile,
);

criterion_main!(benches);
