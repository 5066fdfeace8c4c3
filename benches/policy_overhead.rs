//! Security-pipeline overhead benchmarks.
//!
//! Measures the per-request cost the engine adds on top of query execution:
//! context construction (role resolution + policy build), query rewriting,
//! and response filtering over masked/excluded fields.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench policy_overhead
//! ```

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;
use shroud_core::{
    FlsSpec, Identity, IndexRule, MaskSpec, MemoryEngine, QueryNode, Role, SaltRegistry,
    SearchRequest, SecurityEngine, StaticRoleStore, TermsAggregation,
};

fn setup_engine(docs: usize) -> MemoryEngine {
    let mut engine = MemoryEngine::new();
    engine.create_index("logs", ["os", "ip", "dept", "bytes"]);
    let os_values = ["win 8", "win xp", "ios", "osx", "win 7"];
    for i in 0..docs {
        engine
            .index_document(
                "logs",
                &format!("doc-{i}"),
                json!({
                    "os": os_values[i % os_values.len()],
                    "ip": format!("10.0.{}.{}", i / 256, i % 256),
                    "dept": if i % 3 == 0 { "eng" } else { "ops" },
                    "bytes": i * 17 % 4096,
                }),
            )
            .unwrap();
    }
    engine
}

fn setup_security() -> SecurityEngine {
    let roles = StaticRoleStore::new()
        .with_role(Role::new("admin").with_rule(IndexRule::new("*")))
        .with_role(
            Role::new("restricted").with_rule(
                IndexRule::new("logs")
                    .with_dls(QueryNode::term("dept", "eng"))
                    .with_fls(
                        FlsSpec::exclude(["bytes"]).with_mask("ip", MaskSpec::default()),
                    ),
            ),
        );
    SecurityEngine::new(Arc::new(roles), SaltRegistry::new("bench-salt"))
}

fn bench_context_resolution(c: &mut Criterion) {
    let security = setup_security();
    let schema: Vec<String> = ["os", "ip", "dept", "bytes"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let identity = Identity::new("u", ["restricted"]);

    c.bench_function("resolve_context", |b| {
        b.iter(|| {
            security
                .resolve_context(&identity, "logs", &schema)
                .unwrap()
        });
    });
}

fn bench_secured_search(c: &mut Criterion) {
    let engine = setup_engine(1000);
    let security = setup_security();
    let request = SearchRequest::new("logs", QueryNode::MatchAll)
        .with_aggregation(TermsAggregation::new("by_os", "os", 100))
        .with_size(50);

    let admin = Identity::new("admin", ["admin"]);
    c.bench_function("search_unrestricted_1k", |b| {
        b.iter(|| security.search(&engine, &request, &admin).unwrap());
    });

    let restricted = Identity::new("u", ["restricted"]);
    c.bench_function("search_masked_filtered_1k", |b| {
        b.iter(|| security.search(&engine, &request, &restricted).unwrap());
    });
}

criterion_group!(benches, bench_context_resolution, bench_secured_search);
criterion_main!(benches);
