//! Integration tests for the sandboxed and trusted environments
//!
//! These exercise the public API the way the prompt service uses it.

use std::sync::Arc;
use std::thread;

use serde_json::{Value, json};
use stencil::{
    AutoEscape, ContentPolicy, Environment, Error, FilterRegistry, Limits, RegistryProfile, RenderContext, RenderError,
    TemplateCatalog, compile, compile_named,
};

fn ctx(value: Value) -> RenderContext {
    match value {
        Value::Object(map) => map,
        other => panic!("context must be an object, got {other}"),
    }
}

fn sandbox() -> Environment {
    let mut registry = FilterRegistry::standard();
    registry.add_filter(
        "check_profanity",
        ContentPolicy::new(["fuck"], "don't curse pls").expect("valid policy"),
    );
    Environment::sandboxed(registry)
}

// =============================================================================
// Compiler Tests
// =============================================================================

#[test]
fn test_well_formed_templates_compile() {
    let sources = [
        "",
        "plain text",
        "Hello {{ name }}",
        "{% if a %}x{% elif b %}y{% else %}z{% endif %}",
        "{% for k, v in m | items %}{{ k }}={{ v }}{% else %}-{% endfor %}",
        "{% set greeting = 'hi' ~ ' ' ~ name %}{{ greeting | upper }}",
        "{# comment #}{% raw %}{{ not parsed }}{% endraw %}",
        "{{- x -}}  {%- if y -%} z {%- endif -%}",
    ];
    for source in sources {
        assert!(compile(source).is_ok(), "should compile: {source:?}");
    }
}

#[test]
fn test_syntax_errors_carry_position() {
    let err = compile_named("user", "Hi\n{% if x %}never closed").unwrap_err();
    assert_eq!(err.name.as_deref(), Some("user"));
    assert!(err.message.contains("endif"), "message: {}", err.message);

    let err = compile("Hi {{ name").unwrap_err();
    assert_eq!((err.line, err.column), (1, 4));
}

#[test]
fn test_escape_statements_do_not_compile() {
    for source in [
        "{% import 'os' as os %}",
        "{% include 'secrets.txt' %}",
        "{% macro m() %}{% endmacro %}",
        "{% extends 'base' %}",
        "{{ ''.__class__.__mro__() }}",
        "{{ cycler.__init__.__globals__.os.popen('id').read() }}",
    ] {
        assert!(compile(source).is_err(), "should be rejected: {source}");
    }
}

#[test]
fn test_deeply_nested_source_is_a_syntax_error() {
    let parens = format!("{{{{ {}1{} }}}}", "(".repeat(100), ")".repeat(100));
    let lists = format!("{{{{ {}1{} }}}}", "[".repeat(5000), "]".repeat(5000));
    for source in [parens, lists] {
        let err = compile(&source).unwrap_err();
        assert!(err.message.contains("too deep"));
    }
}

#[test]
fn test_compiled_template_renders_repeatedly() {
    let env = sandbox();
    let template = compile("{{ n * 2 }}").unwrap();
    for n in 0..5 {
        assert_eq!(env.render(&template, &ctx(json!({ "n": n }))).unwrap(), (n * 2).to_string());
    }
}

// =============================================================================
// Sandbox Tests
// =============================================================================

#[test]
fn test_attribute_probing_is_undefined() {
    let env = sandbox();
    for source in [
        "{{ user.__class__ }}",
        "{{ user.__dict__ }}",
        "{{ name.__len__ }}",
        "{{ config }}",
        "{{ self }}",
        "{{ request.environ }}",
    ] {
        let err = env
            .render(&compile(source).unwrap(), &ctx(json!({"user": {"id": 1}, "name": "x"})))
            .unwrap_err();
        assert!(err.is_unknown_name(), "{source}: {err:?}");
    }
}

#[test]
fn test_unregistered_names_are_rejected() {
    let env = sandbox();
    let err = env.render_str("{{ x | attr('__class__') }}", &ctx(json!({"x": 1}))).unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::UnknownFilter { ref name, .. }) if name == "attr"));

    let err = env.render_str("{{ lipsum() }}", &RenderContext::new()).unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::UnknownFunction { ref name, .. }) if name == "lipsum"));

    let err = env.render_str("{{ x | safe }}", &ctx(json!({"x": 1}))).unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::UnknownFilter { .. })));
}

#[test]
fn test_hostile_bindings_are_data() {
    let env = sandbox();
    let template = compile("{{ payload }}|{{ payload | length }}").unwrap();
    let out = env
        .render(&template, &ctx(json!({"payload": "{{ 7 * 7 }}{% import os %}"})))
        .unwrap();
    assert_eq!(out, "{{ 7 * 7 }}{% import os %}|26");
}

#[test]
fn test_context_is_not_modified() {
    let env = sandbox();
    let context = ctx(json!({"items": [3, 1, 2], "name": "x"}));
    let before = context.clone();
    env.render_str("{% set name = 'y' %}{{ items | sort | join(',') }}{{ name }}", &context)
        .unwrap();
    assert_eq!(context, before);
}

#[test]
fn test_defaults_and_conditionals() {
    let env = sandbox();
    let template = compile("{% if tone is defined %}[{{ tone | upper }}] {% endif %}{{ topic | default('anything') }}")
        .unwrap();
    assert_eq!(env.render(&template, &RenderContext::new()).unwrap(), "anything");
    assert_eq!(
        env.render(&template, &ctx(json!({"tone": "calm", "topic": "tides"}))).unwrap(),
        "[CALM] tides"
    );
}

#[test]
fn test_runaway_loops_are_bounded() {
    let env = sandbox().with_limits(Limits {
        max_iterations: 100,
        ..Limits::default()
    });
    let err = env
        .render_str(
            "{% for a in range(50) %}{% for b in range(50) %}x{% endfor %}{% endfor %}",
            &RenderContext::new(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::LimitExceeded { .. })));

    let err = env.render_str("{{ range(100000000) | length }}", &RenderContext::new()).unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::LimitExceeded { .. })));
}

#[test]
fn test_filter_amplification_is_bounded() {
    let env = sandbox();
    for source in [
        "{{ ('a' * 10000) | replace('a', 'a' * 10000) | length }}",
        "{{ ('a' * 10000) | replace('a', 'a' * 10000) | replace('a', 'a' * 10000) | length }}",
        "{{ range(10000) | join('x' * 1000) | length }}",
        "{{ ('\n' * 100000) | indent('x' * 100, true, true) | length }}",
    ] {
        let err = env.render_str(source, &RenderContext::new()).unwrap_err();
        assert!(
            matches!(err, Error::Render(RenderError::LimitExceeded { .. })),
            "should be bounded: {source}"
        );
    }
}

#[test]
fn test_loop_variable_cannot_shadow_loop_info() {
    let err = compile("{% for loop in items %}{{ loop }}{% endfor %}").unwrap_err();
    assert!(err.message.contains("'loop' is reserved"));
}

// =============================================================================
// Policy Tests
// =============================================================================

#[test]
fn test_policy_filter_rejects_and_discards_output() {
    let env = sandbox();
    let template = compile("before {{ text | check_profanity }} after").unwrap();

    let err = env.render(&template, &ctx(json!({"text": "what the Fuck"}))).unwrap_err();
    assert_eq!(err.to_string(), "don't curse pls");
    assert!(err.is_policy_violation());

    let out = env.render(&template, &ctx(json!({"text": "hello"}))).unwrap();
    assert_eq!(out, "before hello after");
}

#[test]
fn test_policy_filter_checks_nested_values() {
    let env = sandbox();
    let err = env
        .render_str(
            "{{ messages | check_profanity | length }}",
            &ctx(json!({"messages": [{"body": "ok"}, {"body": "FUCK"}]})),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::PolicyViolation { ref filter, .. }) if filter == "check_profanity"));
}

// =============================================================================
// Trusted Environment Tests
// =============================================================================

#[test]
fn test_trusted_catalog_escapes_values() {
    let env = Environment::trusted(FilterRegistry::with_profile(RegistryProfile::Trusted));
    let mut catalog = TemplateCatalog::new();
    catalog
        .add(
            "index",
            "<ul>{% for p in prompts %}<li title=\"{{ p }}\">{{ p }}</li>{% endfor %}</ul>{{ footer | safe }}",
        )
        .unwrap();

    let html = catalog
        .render(
            &env,
            "index",
            &ctx(json!({"prompts": ["a<b", "\"q\""], "footer": "<hr>"})),
        )
        .unwrap();
    assert_eq!(
        html,
        "<ul><li title=\"a&lt;b\">a&lt;b</li><li title=\"&#34;q&#34;\">&#34;q&#34;</li></ul><hr>"
    );
}

#[test]
fn test_sandbox_escaping_is_configurable() {
    let env = sandbox();
    assert_eq!(env.policy().auto_escape, AutoEscape::None);
    assert_eq!(env.render_str("{{ x }}", &ctx(json!({"x": "<b>"}))).unwrap(), "<b>");

    let env = env.with_auto_escape(AutoEscape::Html);
    assert_eq!(env.render_str("{{ x }}", &ctx(json!({"x": "<b>"}))).unwrap(), "&lt;b&gt;");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_shared_environment_across_threads() {
    let env = Arc::new(sandbox());
    let template = Arc::new(compile("{{ who }}-{{ n }}").unwrap());

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let env = Arc::clone(&env);
            let template = Arc::clone(&template);
            thread::spawn(move || env.render(&template, &ctx(json!({"who": "t", "n": n}))).unwrap())
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("t-{n}"));
    }
}
