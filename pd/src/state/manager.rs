//! StateManager - actor that owns the PromptStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;

use promptstore::now_ms;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::{Filter, FilterOp, IndexValue, PromptTemplate, Store};

use super::messages::{StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the store in `store_path`
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let mut store = Store::open(store_path.as_ref())?;

        let prompt_count = store.rebuild_indexes::<PromptTemplate>()?;
        info!(prompt_count, "Rebuilt indexes for PromptTemplate records");

        Ok(Self::start(store))
    }

    /// Spawn an actor over an already-open store
    pub fn start(store: Store) -> Self {
        debug!("start: called");
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Get a prompt by path
    pub async fn get_prompt(&self, path: &str) -> StateResponse<Option<PromptTemplate>> {
        debug!(%path, "get_prompt: called");
        self.request(|reply| StateCommand::GetPrompt {
            path: path.to_string(),
            reply,
        })
        .await
    }

    /// List prompts sorted by path, optionally only the direct children of `parent`
    pub async fn list_prompts(&self, parent: Option<String>) -> StateResponse<Vec<PromptTemplate>> {
        debug!(?parent, "list_prompts: called");
        self.request(|reply| StateCommand::ListPrompts {
            parent_filter: parent,
            reply,
        })
        .await
    }

    /// Create or replace the prompt at `path`
    pub async fn upsert_prompt(
        &self,
        path: &str,
        system_message: Option<String>,
        user_message: String,
    ) -> StateResponse<PromptTemplate> {
        debug!(%path, has_system = system_message.is_some(), "upsert_prompt: called");
        self.request(|reply| StateCommand::UpsertPrompt {
            path: path.to_string(),
            system_message,
            user_message,
            reply,
        })
        .await
    }

    /// Delete the prompt at `path`; returns false if there was none
    pub async fn delete_prompt(&self, path: &str) -> StateResponse<bool> {
        debug!(%path, "delete_prompt: called");
        self.request(|reply| StateCommand::DeletePrompt {
            path: path.to_string(),
            reply,
        })
        .await
    }

    /// Shutdown the state manager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

fn store_error(e: eyre::Report) -> StateError {
    StateError::StoreError(format!("{:#}", e))
}

fn upsert(
    store: &mut Store,
    path: String,
    system_message: Option<String>,
    user_message: String,
) -> StateResponse<PromptTemplate> {
    let record = match store.get::<PromptTemplate>(&path).map_err(store_error)? {
        Some(existing) => PromptTemplate {
            system_message,
            user_message,
            updated_at: now_ms(),
            ..existing
        },
        None => PromptTemplate::new(path, system_message, user_message),
    };
    store.upsert(record.clone()).map_err(store_error)?;
    Ok(record)
}

async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::GetPrompt { path, reply } => {
                debug!(%path, "actor_loop: GetPrompt command");
                let result: StateResponse<Option<PromptTemplate>> = store.get(&path).map_err(store_error);
                let _ = reply.send(result);
            }

            StateCommand::ListPrompts { parent_filter, reply } => {
                debug!(?parent_filter, "actor_loop: ListPrompts command");
                let mut filters = Vec::new();
                if let Some(parent) = parent_filter {
                    filters.push(Filter {
                        field: "parent".to_string(),
                        op: FilterOp::Eq,
                        value: IndexValue::String(parent),
                    });
                }
                let result: StateResponse<Vec<PromptTemplate>> = store.list(&filters).map_err(store_error);
                let _ = reply.send(result);
            }

            StateCommand::UpsertPrompt {
                path,
                system_message,
                user_message,
                reply,
            } => {
                debug!(%path, "actor_loop: UpsertPrompt command");
                let result = upsert(&mut store, path, system_message, user_message);
                let _ = reply.send(result);
            }

            StateCommand::DeletePrompt { path, reply } => {
                debug!(%path, "actor_loop: DeletePrompt command");
                let result = store.delete::<PromptTemplate>(&path).map_err(store_error);
                if let Ok(false) = result {
                    warn!(%path, "DeletePrompt: no such prompt");
                }
                let _ = reply.send(result);
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}
