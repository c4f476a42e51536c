//! Compiled templates and the named catalog used for application views

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::ast::Node;
use crate::environment::Environment;
use crate::error::{Error, SyntaxError};
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::value::RenderContext;

/// A parsed template, ready to render in any environment
///
/// Cloning is cheap; the body is shared.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    name: Option<Arc<str>>,
    body: Arc<[Node]>,
}

impl CompiledTemplate {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn body(&self) -> &[Node] {
        &self.body
    }
}

/// Compile template source
pub fn compile(source: &str) -> Result<CompiledTemplate, SyntaxError> {
    compile_inner(None, source)
}

/// Compile template source; `name` only appears in error messages
pub fn compile_named(name: &str, source: &str) -> Result<CompiledTemplate, SyntaxError> {
    compile_inner(Some(name), source)
}

fn compile_inner(name: Option<&str>, source: &str) -> Result<CompiledTemplate, SyntaxError> {
    debug!(?name, len = source.len(), "compile: called");
    let tokens = tokenize(source, name)?;
    let body = parse(tokens, name)?;
    Ok(CompiledTemplate {
        name: name.map(Arc::from),
        body: body.into(),
    })
}

/// Templates looked up by name
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, CompiledTemplate>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source` and store it under `name`
    pub fn add(&mut self, name: &str, source: &str) -> Result<(), SyntaxError> {
        let template = compile_named(name, source)?;
        self.templates.insert(name.to_string(), template);
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, template: CompiledTemplate) {
        self.templates.insert(name.into(), template);
    }

    pub fn get(&self, name: &str) -> Option<&CompiledTemplate> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Render the named template
    pub fn render(&self, env: &Environment, name: &str, ctx: &RenderContext) -> Result<String, Error> {
        let template = self
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;
        Ok(env.render(template, ctx)?)
    }
}
