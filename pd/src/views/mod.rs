//! Trusted HTML views
//!
//! Views are application-owned templates rendered with HTML auto-escaping.
//! Sources come from the configured override directory when a file exists
//! there, otherwise from the copies embedded in the binary. All views are
//! compiled once when `Views` is loaded.

mod embedded;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use stencil::{Environment, FilterRegistry, RegistryProfile, RenderError, SyntaxError, TemplateCatalog};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::PromptTemplate;

pub use embedded::get_embedded;

/// Names of the views every `Views` provides
pub const VIEW_NAMES: &[&str] = &["index", "prompt"];

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view not found: {0}")]
    NotFound(String),

    #[error("failed to read view {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A prompt as the views see it
#[derive(Debug, Serialize)]
struct PromptView<'a> {
    path: &'a str,
    parent: Option<&'a str>,
    system_message: Option<&'a str>,
    user_message: &'a str,
    created: String,
    updated: String,
}

impl<'a> From<&'a PromptTemplate> for PromptView<'a> {
    fn from(prompt: &'a PromptTemplate) -> Self {
        Self {
            path: &prompt.path,
            parent: prompt.parent(),
            system_message: prompt.system_message.as_deref(),
            user_message: &prompt.user_message,
            created: format_timestamp(prompt.created_at),
            updated: format_timestamp(prompt.updated_at),
        }
    }
}

#[derive(Serialize)]
struct IndexContext<'a> {
    title: &'a str,
    parent: Option<&'a str>,
    prompts: Vec<PromptView<'a>>,
}

#[derive(Serialize)]
struct PromptContext<'a> {
    prompt: PromptView<'a>,
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default()
}

/// Compiled views plus the trusted environment that renders them
#[derive(Debug, Clone)]
pub struct Views {
    env: Environment,
    catalog: TemplateCatalog,
}

impl Views {
    /// Load every view, preferring `{dir}/{name}.html` over the embedded source
    pub fn load(dir: Option<&Path>) -> Result<Self, ViewError> {
        debug!(?dir, "load: called");
        let mut catalog = TemplateCatalog::new();
        for name in VIEW_NAMES {
            let source = match dir.map(|d| d.join(format!("{}.html", name))) {
                Some(path) if path.exists() => {
                    info!(view = %name, path = %path.display(), "Loading view override");
                    fs::read_to_string(&path).map_err(|source| ViewError::Io { path, source })?
                }
                _ => get_embedded(name)
                    .ok_or_else(|| ViewError::NotFound(name.to_string()))?
                    .to_string(),
            };
            catalog.add(name, &source)?;
        }
        Ok(Self {
            env: Environment::trusted(FilterRegistry::with_profile(RegistryProfile::Trusted)),
            catalog,
        })
    }

    /// Load only the embedded views
    pub fn embedded() -> Result<Self, ViewError> {
        Self::load(None)
    }

    /// Render a view by name against any serializable data
    pub fn render<S: Serialize>(&self, name: &str, data: &S) -> Result<String, ViewError> {
        debug!(%name, "render: called");
        let template = self
            .catalog
            .get(name)
            .ok_or_else(|| ViewError::NotFound(name.to_string()))?;
        Ok(self.env.render_serialize(template, data)?)
    }

    /// Listing page for `prompts`, optionally scoped to a parent path
    pub fn render_index(&self, prompts: &[PromptTemplate], parent: Option<&str>) -> Result<String, ViewError> {
        let ctx = IndexContext {
            title: "Prompts",
            parent,
            prompts: prompts.iter().map(PromptView::from).collect(),
        };
        self.render("index", &ctx)
    }

    /// Detail page for one prompt
    pub fn render_prompt(&self, prompt: &PromptTemplate) -> Result<String, ViewError> {
        let ctx = PromptContext {
            prompt: PromptView::from(prompt),
        };
        self.render("prompt", &ctx)
    }
}
