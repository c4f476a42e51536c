//! Prompt service
//!
//! Ties the record store, the sandbox and the HTML views together. Records
//! are fetched through the state actor; rendering itself is synchronous.

mod cache;
mod error;
mod render;

use std::sync::Arc;

use eyre::{Context, Result};
use stencil::{ContentPolicy, Environment, FilterRegistry, RegistryProfile};
use tracing::{debug, info};

pub use cache::{CacheStats, TemplateCache};
pub use error::{MessagePart, PromptError};
pub use render::{RenderedPrompt, params_from_value, parse_params, render_prompt};

use crate::config::Config;
use crate::domain::{PromptTemplate, validate_path};
use crate::state::StateManager;
use crate::views::Views;

/// Build the sandbox registry: the standard filters plus the content policy
pub fn sandbox_registry(config: &Config) -> Result<FilterRegistry> {
    debug!(filter_name = %config.policy.filter_name, "sandbox_registry: called");
    let policy = ContentPolicy::new(&config.policy.banned_terms, config.policy.message.clone())
        .context("Failed to build content policy")?;
    let mut registry = FilterRegistry::with_profile(RegistryProfile::Sandbox);
    registry.add_filter(config.policy.filter_name.trim(), policy);
    Ok(registry)
}

/// Sandboxed environment configured from `config`
pub fn sandbox_environment(config: &Config) -> Result<Environment> {
    let registry = sandbox_registry(config)?;
    Ok(Environment::sandboxed(registry)
        .with_auto_escape(config.sandbox.auto_escape)
        .with_limits(config.sandbox.limits()))
}

/// Prompt operations over the state actor
#[derive(Clone)]
pub struct PromptService {
    state: StateManager,
    sandbox: Arc<Environment>,
    cache: Arc<TemplateCache>,
    views: Arc<Views>,
}

impl PromptService {
    pub fn new(config: &Config, state: StateManager) -> Result<Self> {
        debug!("PromptService::new: called");
        let sandbox = sandbox_environment(config)?;
        let views = Views::load(config.views.dir.as_deref()).context("Failed to load views")?;
        info!(
            filters = sandbox.registry().filter_names().len(),
            policy_filter = %config.policy.filter_name,
            auto_escape = ?config.sandbox.auto_escape,
            "PromptService ready"
        );
        Ok(Self {
            state,
            sandbox: Arc::new(sandbox),
            cache: Arc::new(TemplateCache::new(config.sandbox.cache_capacity)),
            views: Arc::new(views),
        })
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn sandbox(&self) -> &Environment {
        &self.sandbox
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// The prompt at `path`, or RecordNotFound
    pub async fn get(&self, path: &str) -> Result<PromptTemplate, PromptError> {
        debug!(%path, "get: called");
        self.state
            .get_prompt(path)
            .await?
            .ok_or_else(|| PromptError::RecordNotFound(path.to_string()))
    }

    /// Prompts sorted by path, optionally only the direct children of `parent`
    pub async fn list(&self, parent: Option<&str>) -> Result<Vec<PromptTemplate>, PromptError> {
        debug!(?parent, "list: called");
        Ok(self.state.list_prompts(parent.map(str::to_string)).await?)
    }

    /// Create or replace the prompt at `path`
    ///
    /// Template sources are stored as given; they are compiled when rendered.
    pub async fn put(
        &self,
        path: &str,
        system_message: Option<String>,
        user_message: String,
    ) -> Result<PromptTemplate, PromptError> {
        debug!(%path, "put: called");
        validate_path(path).map_err(PromptError::InvalidPath)?;
        let prompt = self.state.upsert_prompt(path, system_message, user_message).await?;
        info!(%path, "Stored prompt");
        Ok(prompt)
    }

    /// Delete the prompt at `path`; deleting an absent prompt succeeds
    pub async fn delete(&self, path: &str) -> Result<bool, PromptError> {
        debug!(%path, "delete: called");
        let removed = self.state.delete_prompt(path).await?;
        if removed {
            info!(%path, "Deleted prompt");
        }
        Ok(removed)
    }

    /// Render the prompt at `path` with JSON-encoded parameters
    pub async fn render(&self, path: &str, params_json: &str) -> Result<RenderedPrompt, PromptError> {
        debug!(%path, "render: called");
        let record = self.get(path).await?;
        let params = parse_params(params_json)?;
        let rendered = render_prompt(&self.sandbox, &self.cache, &record, &params);
        let stats = self.cache.stats();
        debug!(hits = stats.hits, misses = stats.misses, entries = stats.entries, "render: cache");
        rendered
    }

    /// Listing page as HTML
    pub async fn index_html(&self, parent: Option<&str>) -> Result<String, PromptError> {
        debug!(?parent, "index_html: called");
        let prompts = self.list(parent).await?;
        Ok(self.views.render_index(&prompts, parent)?)
    }

    /// Detail page for one prompt as HTML
    pub async fn prompt_html(&self, path: &str) -> Result<String, PromptError> {
        debug!(%path, "prompt_html: called");
        let prompt = self.get(path).await?;
        Ok(self.views.render_prompt(&prompt)?)
    }
}
