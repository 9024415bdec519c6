/*!
 * Resolution Benchmarks
 *
 * Measure effective-permission resolution, closure memoization, and
 * reverse-index construction over synthetic graphs of varying size
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use permscope::{
    AssignmentRecord, GrantEntityRecord, GraphBuilder, IntegrityPolicy, MembershipRecord,
    PermissionEngine, PermissionGrant, PermissionPredicate, PermissionRecord, ResourceAccess,
    ResourceFlags,
};

/// Build a layered graph: `principals` users each holding one group,
/// groups fanning out over `bundles` bundles, one resource grant each
fn synthetic_engine(principals: usize, bundles: usize) -> PermissionEngine {
    let groups = (bundles / 8).max(1);
    let mut b = GraphBuilder::new();

    b.push_entities((0..bundles).map(|i| GrantEntityRecord::bundle(format!("B{i}"), "bundle")));
    b.push_entities((0..groups).map(|i| GrantEntityRecord::group(format!("G{i}"), "group", true)));
    b.push_memberships((0..bundles).map(|i| MembershipRecord {
        group_id: format!("G{}", i % groups),
        member_id: format!("B{i}"),
    }));
    b.push_assignments((0..principals).flat_map(|p| {
        [
            AssignmentRecord {
                principal_id: format!("U{p}"),
                entity_id: format!("G{}", p % groups),
            },
            AssignmentRecord {
                principal_id: format!("U{p}"),
                entity_id: format!("B{}", p % bundles),
            },
        ]
    }));
    b.push_permissions((0..bundles).map(|i| {
        PermissionRecord::new(
            format!("B{i}"),
            PermissionGrant::resource(
                format!("Object{}", i % 16),
                ResourceFlags {
                    read: true,
                    edit: i % 2 == 0,
                    delete: i % 4 == 0,
                    ..ResourceFlags::default()
                },
            ),
        )
    }));

    match b.freeze(IntegrityPolicy::Abort) {
        Ok(graph) => PermissionEngine::from_graph(graph),
        Err(e) => panic!("synthetic graph failed to freeze: {e}"),
    }
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for bundles in [64usize, 512, 2048] {
        let engine = synthetic_engine(256, bundles);
        group.bench_with_input(BenchmarkId::from_parameter(bundles), &engine, |b, engine| {
            let mut next = 0usize;
            b.iter(|| {
                let principal = format!("U{}", next % 256);
                next += 1;
                black_box(engine.resolve(&principal)).ok();
            });
        });
    }

    group.finish();
}

fn bench_resolve_memoized(c: &mut Criterion) {
    let engine = synthetic_engine(256, 512);
    // Warm the closure caches, then measure steady-state resolution
    for p in 0..256 {
        engine.resolve(&format!("U{p}")).ok();
    }

    c.bench_function("resolve_memoized", |b| {
        let mut next = 0usize;
        b.iter(|| {
            let principal = format!("U{}", next % 256);
            next += 1;
            black_box(engine.resolve(&principal)).ok();
        });
    });
}

fn bench_reverse_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_index_build");
    group.sample_size(20);

    for bundles in [64usize, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(bundles), &bundles, |b, &n| {
            b.iter(|| {
                // A fresh engine per iteration so the lazy index is cold
                let engine = synthetic_engine(256, n);
                black_box(
                    engine.principals(&PermissionPredicate::resource(
                        "Object0",
                        ResourceAccess::Read,
                    )),
                );
            });
        });
    }

    group.finish();
}

fn bench_reverse_query_warm(c: &mut Criterion) {
    let engine = synthetic_engine(256, 512);
    let predicate = PermissionPredicate::resource("Object0", ResourceAccess::Delete);
    engine.principals(&predicate);

    c.bench_function("reverse_query_warm", |b| {
        b.iter(|| black_box(engine.principals(&predicate)));
    });
}

criterion_group!(
    benches,
    bench_resolve,
    bench_resolve_memoized,
    bench_reverse_index_build,
    bench_reverse_query_warm
);
criterion_main!(benches);
