//! Benchmarks for request-scope initialization.

use clientflow::prelude::*;
use clientflow::testing::{JsonProvider, PlainTextWriter, StatusMapper};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn pipeline_config() -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::new()
            .with_class(ProviderClass::of::<JsonProvider>("json"))
            .with_instance(ProviderInstance::from_provider(
                "catch-all",
                StatusMapper::new("", 500),
            )),
    )
}

fn scope_init_benchmark(c: &mut Criterion) {
    let config = pipeline_config();
    let stage = ScopeInitializationStage::with_defaults(
        Arc::clone(&config),
        StageSettings::new().with_emit_events(false),
    );

    c.bench_function("scope_init/pipeline_only", |b| {
        b.iter(|| {
            let mut request = ClientRequest::new(Method::Get, "https://example.test/")
                .with_configuration(Arc::clone(&config));
            stage.initialize(&mut request).ok();
            black_box(request)
        });
    });

    c.bench_function("scope_init/request_override", |b| {
        b.iter(|| {
            let mut request = ClientRequest::new(Method::Post, "https://example.test/")
                .with_configuration(Arc::clone(&config))
                .register_instance(ProviderInstance::from_provider("text", PlainTextWriter));
            stage.initialize(&mut request).ok();
            black_box(request)
        });
    });
}

criterion_group!(benches, scope_init_benchmark);
criterion_main!(benches);
