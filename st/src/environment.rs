//! Rendering environments
//!
//! An `Environment` pairs a filter registry with a rendering `Policy`. The
//! sandbox and the trusted view renderer are the same type with different
//! escaping and registries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, RenderError};
use crate::eval::Evaluator;
use crate::filters::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_RANGE, FilterRegistry, RegistryProfile};
use crate::template::{CompiledTemplate, compile};
use crate::value::RenderContext;

/// How `{{ }}` output is escaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoEscape {
    /// Output is written verbatim
    #[default]
    None,
    /// Output is HTML-escaped unless marked `safe`
    Html,
}

/// Per-render resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Limits {
    /// Total loop iterations across one render
    pub max_iterations: usize,
    /// Size of the rendered output
    pub max_output_bytes: usize,
    /// Longest sequence `range()` may build
    pub max_range: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_range: DEFAULT_MAX_RANGE,
        }
    }
}

impl Limits {
    /// No bound on iterations, output size or `range()`
    pub fn unbounded() -> Self {
        Self {
            max_iterations: usize::MAX,
            max_output_bytes: usize::MAX,
            max_range: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policy {
    pub auto_escape: AutoEscape,
    pub limits: Limits,
}

/// A registry plus the policy templates render under
#[derive(Debug, Clone)]
pub struct Environment {
    policy: Policy,
    registry: Arc<FilterRegistry>,
}

impl Environment {
    pub fn new(registry: impl Into<Arc<FilterRegistry>>, policy: Policy) -> Self {
        let mut env = Self {
            policy,
            registry: registry.into(),
        };
        if policy.limits.max_range != DEFAULT_MAX_RANGE {
            env.registry_mut().set_max_range(policy.limits.max_range);
        }
        if policy.limits.max_output_bytes != DEFAULT_MAX_OUTPUT_BYTES {
            env.registry_mut().set_max_output_bytes(policy.limits.max_output_bytes);
        }
        env
    }

    /// Environment for untrusted templates: no escaping, default limits
    pub fn sandboxed(registry: impl Into<Arc<FilterRegistry>>) -> Self {
        Self::new(registry, Policy::default())
    }

    /// Environment for application-owned HTML views: HTML escaping, no limits
    pub fn trusted(registry: impl Into<Arc<FilterRegistry>>) -> Self {
        Self::new(
            registry,
            Policy {
                auto_escape: AutoEscape::Html,
                limits: Limits::unbounded(),
            },
        )
    }

    pub fn with_auto_escape(mut self, auto_escape: AutoEscape) -> Self {
        self.policy.auto_escape = auto_escape;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        if limits.max_range != self.policy.limits.max_range {
            self.registry_mut().set_max_range(limits.max_range);
        }
        if limits.max_output_bytes != self.policy.limits.max_output_bytes {
            self.registry_mut().set_max_output_bytes(limits.max_output_bytes);
        }
        self.policy.limits = limits;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    /// Mutable registry access; clones the registry if it is shared
    pub fn registry_mut(&mut self) -> &mut FilterRegistry {
        Arc::make_mut(&mut self.registry)
    }

    /// Render a compiled template
    ///
    /// On failure no output is returned, including anything rendered
    /// before the failing expression.
    pub fn render(&self, template: &CompiledTemplate, ctx: &RenderContext) -> Result<String, RenderError> {
        debug!(name = ?template.name(), "Environment::render: called");
        Evaluator::new(&self.registry, &self.policy, ctx).render(template.body())
    }

    /// Render with any serializable value that serializes to a map
    pub fn render_serialize<S: Serialize>(&self, template: &CompiledTemplate, ctx: &S) -> Result<String, RenderError> {
        match serde_json::to_value(ctx) {
            Ok(serde_json::Value::Object(map)) => self.render(template, &map),
            Ok(serde_json::Value::Null) => self.render(template, &RenderContext::new()),
            Ok(other) => Err(RenderError::InvalidContext(crate::value::type_name(&other).to_string())),
            Err(e) => Err(RenderError::InvalidContext(e.to_string())),
        }
    }

    /// Compile and render in one step
    pub fn render_str(&self, source: &str, ctx: &RenderContext) -> Result<String, Error> {
        let template = compile(source)?;
        Ok(self.render(&template, ctx)?)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::sandboxed(FilterRegistry::with_profile(RegistryProfile::Sandbox))
    }
}
