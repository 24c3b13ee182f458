//! Prompt registry: named, argument-templated prompts that expand into a
//! message sequence (C9).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use mcpeer_core::RequestContext;

use crate::content::ContentBlock;
use crate::error::ServerError;
use crate::resource::CompletionHandlerFn;

/// The speaker a [`PromptMessage`] is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a prompt's expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: ContentBlock,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: ContentBlock::text(text),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: ContentBlock::text(text),
        }
    }
}

/// One declared argument a prompt accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl PromptArgument {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            required: false,
        }
    }
}

/// A prompt's handler: receives the caller-supplied argument map (already
/// checked for required-argument presence) and the request context,
/// returning the expanded message sequence.
pub type PromptHandlerFn = Arc<
    dyn Fn(
            HashMap<String, String>,
            RequestContext,
        ) -> BoxFuture<'static, Result<Vec<PromptMessage>, ServerError>>
        + Send
        + Sync,
>;

/// What `prompts/list` exposes for one registered prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub arguments: Vec<PromptArgument>,
}

struct PromptEntry {
    description: Option<String>,
    arguments: Vec<PromptArgument>,
    handler: PromptHandlerFn,
}

/// A thread-safe table of registered prompts, keyed by unique name, plus
/// per-prompt-argument completion handlers.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: RwLock<HashMap<String, Arc<PromptEntry>>>,
    /// (prompt name, argument name) -> completion handler.
    completions: RwLock<HashMap<(String, String), CompletionHandlerFn>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`. Fails if already registered.
    pub fn register<F, Fut>(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        arguments: Vec<PromptArgument>,
        handler: F,
    ) -> Result<(), ServerError>
    where
        F: Fn(HashMap<String, String>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<PromptMessage>, ServerError>> + Send + 'static,
    {
        let name = name.into();
        let mut prompts = self.prompts.write();
        if prompts.contains_key(&name) {
            return Err(ServerError::DuplicatePrompt(name));
        }
        let handler: PromptHandlerFn = Arc::new(move |args, ctx| Box::pin(handler(args, ctx)));
        prompts.insert(
            name,
            Arc::new(PromptEntry {
                description,
                arguments,
                handler,
            }),
        );
        Ok(())
    }

    /// Attaches a completion handler for `argument_name` on `prompt_name`.
    /// Returns `false` if the prompt or argument isn't registered.
    pub fn set_completion_handler(
        &self,
        prompt_name: &str,
        argument_name: &str,
        handler: CompletionHandlerFn,
    ) -> bool {
        let has_argument = self
            .prompts
            .read()
            .get(prompt_name)
            .is_some_and(|p| p.arguments.iter().any(|a| a.name == argument_name));
        if !has_argument {
            return false;
        }
        self.completions.write().insert(
            (prompt_name.to_string(), argument_name.to_string()),
            handler,
        );
        true
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.prompts
            .read()
            .iter()
            .map(|(name, entry)| PromptDescriptor {
                name: name.clone(),
                description: entry.description.clone(),
                arguments: entry.arguments.clone(),
            })
            .collect()
    }

    /// Validates that every required argument is present, then invokes
    /// the handler. Missing required arguments are a protocol-level
    /// `-32602` error, matching the tool input-validation stance.
    pub async fn get(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
        ctx: RequestContext,
    ) -> Result<Vec<PromptMessage>, ServerError> {
        let entry = self
            .prompts
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::PromptNotFound(name.to_string()))?;

        for arg in &entry.arguments {
            if arg.required && !arguments.contains_key(&arg.name) {
                return Err(ServerError::MissingPromptArgument(arg.name.clone()));
            }
        }

        (entry.handler)(arguments, ctx).await
    }

    /// Requests completions for `prompt_name`'s `argument_name`.
    pub async fn complete(&self, prompt_name: &str, argument_name: &str, partial: &str) -> Vec<String> {
        let handler = self
            .completions
            .read()
            .get(&(prompt_name.to_string(), argument_name.to_string()))
            .cloned();
        match handler {
            Some(handler) => handler(argument_name.to_string(), partial.to_string()).await,
            None => Vec::new(),
        }
    }
}
