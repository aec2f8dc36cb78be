//! Benchmarks for sentence matching and full turn handling.
//!
//! A synthetic model with many groups measures how matching cost scales
//! with rule count, and a turn benchmark covers the whole pipeline.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use edgar_chat::{
    Context, GroupDocument, Model, ModelDocument, ModuleRegistry, QueryOrchestrator,
    RuleDocument, SentenceMatcher,
};
use edgar_core::config::EdgarConfig;

const TOPICS: &[&str] = &[
    "weather", "music", "recipes", "travel", "movies", "sports", "news", "books",
];

/// Build a model with `groups` groups of `per_group` chained rules each.
fn synthetic_model(groups: usize, per_group: usize) -> Model {
    let groups = (0..groups)
        .map(|g| {
            let topic = TOPICS[g % TOPICS.len()];
            let rules = (0..per_group)
                .map(|r| RuleDocument {
                    id: format!("{}_{}_{}", topic, g, r),
                    triggers: vec![
                        format!("tell me about {} number {} in set {}", topic, r, g),
                        format!("what do you know about {} {} {}", topic, g, r),
                        format!("{} question {} {}", topic, g, r),
                    ],
                    responses: vec![format!("Answer {} for {} {}", r, topic, g)],
                    follow_up: if r + 1 < per_group {
                        vec![format!("{}_{}_{}", topic, g, r + 1)]
                    } else {
                        vec![]
                    },
                    ..RuleDocument::default()
                })
                .collect();
            GroupDocument {
                name: format!("{}_{}", topic, g),
                rules,
            }
        })
        .collect();

    Model::from_document(ModelDocument {
        name: "synthetic".to_string(),
        fallback_responses: vec![],
        groups,
    })
    .expect("synthetic model is valid")
}

/// Benchmark ranking one utterance against models of increasing size.
fn bench_match_rules(c: &mut Criterion) {
    let matcher = SentenceMatcher::default();
    let mut group = c.benchmark_group("match_rules");
    group.measurement_time(Duration::from_secs(5));

    for groups in [4, 16, 64] {
        let model = synthetic_model(groups, 8);
        group.bench_with_input(
            BenchmarkId::from_parameter(model.rule_count()),
            &model,
            |b, model| {
                b.iter(|| matcher.match_rules("tell me about music number 3", model.rules(), 0.6));
            },
        );
    }

    group.finish();
}

/// Benchmark full turns: a global match followed by a local follow-up.
fn bench_turns(c: &mut Criterion) {
    let model = synthetic_model(16, 8);
    let orch = QueryOrchestrator::new(&EdgarConfig::default(), ModuleRegistry::new());

    let mut group = c.benchmark_group("turns");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("global_then_follow_up", |b| {
        b.iter(|| {
            let (_, ctx) = orch.handle("tell me about music number 0 in set 1", &Context::default(), &model);
            orch.handle("music question 1 1", &ctx, &model)
        });
    });

    group.bench_function("fallback", |b| {
        b.iter(|| orch.handle("completely unrelated gibberish", &Context::default(), &model));
    });

    group.finish();
}

criterion_group!(benches, bench_match_rules, bench_turns);
criterion_main!(benches);
