use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use stencil::{Environment, FilterRegistry, RenderContext, compile};

const PROMPT: &str = r#"You are a {{ role | default('helpful assistant') }}.
{% if rules %}Follow these rules:
{% for rule in rules %}{{ loop.index }}. {{ rule | trim | capitalize }}
{% endfor %}{% endif %}Answer in {{ language | upper }} about {{ topic | check_profanity }}."#;

fn context() -> RenderContext {
    let value = json!({
        "role": "careful reviewer",
        "rules": ["be brief", "cite sources", " no speculation "],
        "language": "english",
        "topic": "tide tables",
    });
    match value {
        Value::Object(map) => map,
        _ => RenderContext::new(),
    }
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_prompt", |b| b.iter(|| compile(black_box(PROMPT)).unwrap()));
}

fn bench_render(c: &mut Criterion) {
    let mut registry = FilterRegistry::standard();
    registry.add_filter(
        "check_profanity",
        stencil::ContentPolicy::new(["fuck"], "don't curse pls").unwrap(),
    );
    let env = Environment::sandboxed(registry);
    let template = compile(PROMPT).unwrap();
    let ctx = context();

    c.bench_function("render_prompt", |b| b.iter(|| env.render(black_box(&template), black_box(&ctx)).unwrap()));
}

criterion_group!(benches, bench_compile, bench_render);
criterion_main!(benches);
