//! Rendering a stored prompt against caller parameters

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stencil::value::type_name;
use stencil::{CompiledTemplate, Environment, RenderContext, RenderError};
use tracing::debug;

use super::cache::TemplateCache;
use super::error::{MessagePart, PromptError};
use crate::domain::PromptTemplate;

/// Both messages of a prompt, rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub system_message: String,
    pub user_message: String,
}

/// Parse render parameters from JSON text
///
/// The parameters must be a JSON object; `null` and empty input mean no
/// parameters.
pub fn parse_params(json: &str) -> Result<RenderContext, PromptError> {
    if json.trim().is_empty() {
        return Ok(RenderContext::new());
    }
    let value: Value = serde_json::from_str(json).map_err(|e| PromptError::InvalidParams(e.to_string()))?;
    params_from_value(value)
}

/// Render parameters from an already-parsed JSON value
pub fn params_from_value(value: Value) -> Result<RenderContext, PromptError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(RenderContext::new()),
        other => Err(PromptError::InvalidParams(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Compile and render both messages of `record`
///
/// Either both messages render or the call fails; nothing partial is
/// returned. A missing system message renders as empty.
pub fn render_prompt(
    env: &Environment,
    cache: &TemplateCache,
    record: &PromptTemplate,
    params: &RenderContext,
) -> Result<RenderedPrompt, PromptError> {
    debug!(path = %record.path, param_count = params.len(), "render_prompt: called");
    let system = compile_part(cache, MessagePart::System, record.system_message.as_deref().unwrap_or(""))?;
    let user = compile_part(cache, MessagePart::User, &record.user_message)?;

    let system_message = render_part(env, MessagePart::System, &system, params)?;
    let user_message = render_part(env, MessagePart::User, &user, params)?;

    Ok(RenderedPrompt {
        system_message,
        user_message,
    })
}

fn compile_part(cache: &TemplateCache, part: MessagePart, source: &str) -> Result<CompiledTemplate, PromptError> {
    cache
        .get_or_compile(source)
        .map_err(|source| PromptError::TemplateSyntax { part, source })
}

fn render_part(
    env: &Environment,
    part: MessagePart,
    template: &CompiledTemplate,
    params: &RenderContext,
) -> Result<String, PromptError> {
    env.render(template, params).map_err(|err| match err {
        RenderError::PolicyViolation { filter, message, .. } => PromptError::PolicyViolation { part, filter, message },
        source => PromptError::TemplateEvaluation { part, source },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stencil::{ContentPolicy, FilterRegistry, Limits};

    fn sandbox() -> Environment {
        let mut registry = FilterRegistry::standard();
        registry.add_filter(
            "check_profanity",
            ContentPolicy::new(["fuck"], "don't curse pls").unwrap(),
        );
        Environment::sandboxed(registry)
    }

    fn params(value: Value) -> RenderContext {
        params_from_value(value).unwrap()
    }

    fn record(system: Option<&str>, user: &str) -> PromptTemplate {
        PromptTemplate::new("greet", system.map(str::to_string), user)
    }

    #[test]
    fn test_renders_both_messages() {
        let cache = TemplateCache::new(8);
        let prompt = record(Some("You help {{ team }}."), "Hello, {{ name }}!");

        let rendered = render_prompt(&sandbox(), &cache, &prompt, &params(json!({"name": "Ada", "team": "ops"}))).unwrap();
        assert_eq!(rendered.system_message, "You help ops.");
        assert_eq!(rendered.user_message, "Hello, Ada!");
    }

    #[test]
    fn test_empty_and_missing_system_message() {
        let cache = TemplateCache::new(8);
        let ctx = params(json!({"name": "Ada"}));

        let empty = render_prompt(&sandbox(), &cache, &record(Some(""), "Hello, {{ name }}!"), &ctx).unwrap();
        assert_eq!(
            empty,
            RenderedPrompt {
                system_message: String::new(),
                user_message: "Hello, Ada!".to_string(),
            }
        );

        let missing = render_prompt(&sandbox(), &cache, &record(None, "Hello, {{ name }}!"), &ctx).unwrap();
        assert_eq!(missing, empty);
    }

    #[test]
    fn test_policy_violation() {
        let cache = TemplateCache::new(8);
        let prompt = record(None, "Hello, {{ name | check_profanity }}!");

        let err = render_prompt(&sandbox(), &cache, &prompt, &params(json!({"name": "fucking great"}))).unwrap_err();
        assert!(err.is_policy_violation());
        assert_eq!(err.to_string(), "don't curse pls");
        assert_eq!(err.status_code(), 400);

        let ok = render_prompt(&sandbox(), &cache, &prompt, &params(json!({"name": "great"}))).unwrap();
        assert_eq!(ok.user_message, "Hello, great!");
    }

    #[test]
    fn test_undefined_variable_is_evaluation_error() {
        let cache = TemplateCache::new(8);
        let err = render_prompt(&sandbox(), &cache, &record(None, "{{ undefined_var }}"), &params(json!({}))).unwrap_err();
        assert!(matches!(
            err,
            PromptError::TemplateEvaluation {
                part: MessagePart::User,
                source: RenderError::UndefinedVariable { .. }
            }
        ));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_unknown_filter_is_evaluation_error() {
        let cache = TemplateCache::new(8);
        let err = render_prompt(&sandbox(), &cache, &record(None, "{{ 'x' | system }}"), &params(json!({}))).unwrap_err();
        assert!(matches!(
            err,
            PromptError::TemplateEvaluation {
                source: RenderError::UnknownFilter { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_syntax_error_names_part() {
        let cache = TemplateCache::new(8);
        let err = render_prompt(&sandbox(), &cache, &record(Some("{% if %}"), "fine"), &params(json!({}))).unwrap_err();
        assert!(matches!(err, PromptError::TemplateSyntax { part: MessagePart::System, .. }));
        assert!(err.to_string().starts_with("system message template does not compile"));
    }

    #[test]
    fn test_no_partial_output_when_user_fails() {
        let cache = TemplateCache::new(8);
        let prompt = record(Some("system ok"), "{{ missing }}");
        let result = render_prompt(&sandbox(), &cache, &prompt, &params(json!({})));
        assert!(result.is_err());
    }

    #[test]
    fn test_limits_surface_as_evaluation_error() {
        let cache = TemplateCache::new(8);
        let env = sandbox().with_limits(Limits {
            max_iterations: 5,
            ..Limits::default()
        });
        let prompt = record(None, "{% for i in range(10) %}{{ i }}{% endfor %}");

        let err = render_prompt(&env, &cache, &prompt, &params(json!({}))).unwrap_err();
        assert!(matches!(
            err,
            PromptError::TemplateEvaluation {
                source: RenderError::LimitExceeded { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params(r#"{"a": 1}"#).unwrap().get("a"), Some(&json!(1)));
        assert!(parse_params("").unwrap().is_empty());
        assert!(parse_params("null").unwrap().is_empty());

        let err = parse_params("[1, 2]").unwrap_err();
        assert!(matches!(err, PromptError::InvalidParams(ref msg) if msg.contains("list")));
        assert!(matches!(parse_params("{not json").unwrap_err(), PromptError::InvalidParams(_)));
    }
}
