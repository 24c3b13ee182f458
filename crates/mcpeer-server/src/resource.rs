//! Resource registry: static and templated resources, reverse-matched
//! reads, argument completion, and subscription fan-out (C9, C10).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use mcpeer_transport_http::UriTemplate;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use mcpeer_core::RequestContext;

use crate::content::ResourceContents;
use crate::error::ServerError;

/// A static resource's handler: receives the request context and returns
/// the resource's contents. The uri is fixed at registration time, so the
/// handler doesn't need it passed in.
pub type ResourceHandlerFn = Arc<
    dyn Fn(RequestContext) -> BoxFuture<'static, Result<Vec<ResourceContents>, ServerError>>
        + Send
        + Sync,
>;

/// A template resource's handler: receives the expanded concrete uri and
/// the variables captured by reverse-matching against it.
pub type TemplateHandlerFn = Arc<
    dyn Fn(
            String,
            HashMap<String, String>,
            RequestContext,
        ) -> BoxFuture<'static, Result<Vec<ResourceContents>, ServerError>>
        + Send
        + Sync,
>;

/// Argument-completion handler shared by resource templates and prompts:
/// given the argument name and the partial value typed so far, returns
/// candidate completions.
pub type CompletionHandlerFn =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, Vec<String>> + Send + Sync>;

/// What `resources/list` exposes for one registered resource, static or
/// templated.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// `true` for a uri-template entry, surfaced so clients can tell a
    /// concrete resource from one that needs variable expansion.
    #[serde(rename = "isTemplate")]
    pub is_template: bool,
}

struct StaticResource {
    name: String,
    description: Option<String>,
    mime_type: String,
    handler: ResourceHandlerFn,
}

struct TemplateResource {
    template: UriTemplate,
    name: String,
    mime_type: String,
    handler: TemplateHandlerFn,
}

/// A thread-safe registry of static and templated resources, plus the
/// subscription table backing `resources/subscribe`/`unsubscribe`/
/// `notifications/resources/updated`.
///
/// Templates are tried in registration order on a read miss against the
/// static table — the first successful reverse-match wins.
#[derive(Default)]
pub struct ResourceRegistry {
    statics: RwLock<HashMap<String, Arc<StaticResource>>>,
    templates: RwLock<Vec<Arc<TemplateResource>>>,
    /// Completion handlers, keyed by the template's literal uri string —
    /// kept separate from `templates` so attaching one doesn't require
    /// rebuilding the template entry.
    completions: RwLock<HashMap<String, CompletionHandlerFn>>,
    /// uri -> set of subscriber identities (opaque to this registry; the
    /// engine supplies e.g. a session id for HTTP or a constant for
    /// stdio).
    subscriptions: RwLock<HashMap<String, HashSet<String>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a static resource at a concrete `uri`. Fails if `uri` is
    /// already registered, static or templated.
    pub fn register<F, Fut>(
        &self,
        uri: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        description: Option<String>,
        handler: F,
    ) -> Result<(), ServerError>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<ResourceContents>, ServerError>> + Send + 'static,
    {
        let uri = uri.into();
        if self.statics.read().contains_key(&uri) || self.template_uri_collides(&uri) {
            return Err(ServerError::DuplicateResource(uri));
        }
        let handler: ResourceHandlerFn = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.statics.write().insert(
            uri.clone(),
            Arc::new(StaticResource {
                name: name.into(),
                description,
                mime_type: mime_type.into(),
                handler,
            }),
        );
        Ok(())
    }

    /// Registers a parameterized resource template. Fails if the template
    /// string is malformed or its literal uri collides with an existing
    /// entry.
    pub fn register_template<F, Fut>(
        &self,
        uri_template: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        handler: F,
    ) -> Result<(), ServerError>
    where
        F: Fn(String, HashMap<String, String>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<ResourceContents>, ServerError>> + Send + 'static,
    {
        let source = uri_template.into();
        let template = UriTemplate::parse(source.clone())
            .map_err(|e| ServerError::SchemaCompile(e.to_string()))?;
        if self.statics.read().contains_key(&source)
            || self.templates.read().iter().any(|t| t.template.as_str() == source)
        {
            return Err(ServerError::DuplicateResource(source));
        }
        let handler: TemplateHandlerFn = Arc::new(move |uri, vars, ctx| Box::pin(handler(uri, vars, ctx)));
        self.templates.write().push(Arc::new(TemplateResource {
            template,
            name: name.into(),
            mime_type: mime_type.into(),
            handler,
        }));
        Ok(())
    }

    /// Attaches a completion handler to a previously registered template,
    /// keyed by the template's literal uri string. Returns `false` if no
    /// such template is registered.
    pub fn set_completion_handler(&self, uri_template: &str, handler: CompletionHandlerFn) -> bool {
        if !self.templates.read().iter().any(|t| t.template.as_str() == uri_template) {
            return false;
        }
        self.completions
            .write()
            .insert(uri_template.to_string(), handler);
        true
    }

    fn template_uri_collides(&self, uri: &str) -> bool {
        self.templates.read().iter().any(|t| t.template.as_str() == uri)
    }

    /// The union of static and templated resources, as surfaced by
    /// `resources/list`.
    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        let mut out: Vec<ResourceDescriptor> = self
            .statics
            .read()
            .iter()
            .map(|(uri, r)| ResourceDescriptor {
                uri: uri.clone(),
                name: r.name.clone(),
                description: r.description.clone(),
                mime_type: r.mime_type.clone(),
                is_template: false,
            })
            .collect();
        out.extend(self.templates.read().iter().map(|t| ResourceDescriptor {
            uri: t.template.as_str().to_string(),
            name: t.name.clone(),
            description: None,
            mime_type: t.mime_type.clone(),
            is_template: true,
        }));
        out
    }

    /// Reads `uri`: tries the static table first, then each template in
    /// registration order by reverse-match. [`ServerError::ResourceNotFound`]
    /// if nothing matches.
    pub async fn read(&self, uri: &str, ctx: RequestContext) -> Result<Vec<ResourceContents>, ServerError> {
        if let Some(resource) = self.statics.read().get(uri).cloned() {
            return (resource.handler)(ctx).await;
        }

        let candidate = self
            .templates
            .read()
            .iter()
            .find_map(|t| t.template.reverse_match(uri).map(|vars| (t.clone(), vars)));

        match candidate {
            Some((template, vars)) => (template.handler)(uri.to_string(), vars, ctx).await,
            None => Err(ServerError::ResourceNotFound(uri.to_string())),
        }
    }

    /// Requests completions for `uri_template`'s `argument_name`, given
    /// the text typed so far. Empty if no template or completion handler
    /// matches.
    pub async fn complete(&self, uri_template: &str, argument_name: &str, partial: &str) -> Vec<String> {
        let handler = self.completions.read().get(uri_template).cloned();
        match handler {
            Some(handler) => handler(argument_name.to_string(), partial.to_string()).await,
            None => Vec::new(),
        }
    }

    /// Registers `subscriber` as interested in updates to `uri`.
    pub fn subscribe(&self, uri: impl Into<String>, subscriber: impl Into<String>) {
        self.subscriptions
            .write()
            .entry(uri.into())
            .or_default()
            .insert(subscriber.into());
    }

    /// Removes one (`uri`, `subscriber`) pair.
    pub fn unsubscribe(&self, uri: &str, subscriber: &str) {
        if let Some(set) = self.subscriptions.write().get_mut(uri) {
            set.remove(subscriber);
        }
    }

    /// Removes every subscription belonging to `subscriber`, atomically,
    /// e.g. when an HTTP session terminates.
    pub fn remove_subscriber(&self, subscriber: &str) {
        let mut subs = self.subscriptions.write();
        for set in subs.values_mut() {
            set.remove(subscriber);
        }
        subs.retain(|_, set| !set.is_empty());
    }

    /// Snapshots the subscribers for `uri` under the lock and returns them
    /// for the caller to fan a `notifications/resources/updated` out to,
    /// outside the lock, so the notification callback never runs while
    /// this registry's lock is held.
    pub fn subscribers(&self, uri: &str) -> Vec<String> {
        self.subscriptions
            .read()
            .get(uri)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().values().map(|s| s.len()).sum()
    }
}

/// `_meta.progressToken`-style params carried by `resources/read` when a
/// client wants progress on a slow read; kept here since `read` is the
/// one resource operation likely to be long-running.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
    #[serde(default)]
    pub _meta: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::detached(1.into())
    }

    #[tokio::test]
    async fn static_resource_round_trips() {
        let registry = ResourceRegistry::new();
        registry
            .register("config://app", "app config", "text/plain", None, |_ctx| async {
                Ok(vec![ResourceContents::text("config://app", "text/plain", "hello")])
            })
            .unwrap();

        let result = registry.read("config://app", ctx()).await.unwrap();
        assert_eq!(result[0].text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn template_resource_receives_expanded_uri_and_params() {
        let registry = ResourceRegistry::new();
        registry
            .register_template("file://{+path}", "file", "text/plain", |uri, vars, _ctx| async move {
                Ok(vec![ResourceContents::text(
                    uri,
                    "text/plain",
                    vars.get("path").cloned().unwrap_or_default(),
                )])
            })
            .unwrap();

        let result = registry.read("file:///etc/config", ctx()).await.unwrap();
        assert_eq!(result[0].uri, "file:///etc/config");
        assert_eq!(result[0].text.as_deref(), Some("/etc/config"));
    }

    #[tokio::test]
    async fn plain_simple_template_still_recovers_a_slash_bearing_value() {
        // A plain `{path}` template (Level 1 simple expansion, no `+`)
        // must still recover a multi-segment value from a reverse match,
        // unencoded.
        let registry = ResourceRegistry::new();
        registry
            .register_template("file://{path}", "file", "text/plain", |uri, vars, _ctx| async move {
                Ok(vec![ResourceContents::text(
                    uri,
                    "text/plain",
                    vars.get("path").cloned().unwrap_or_default(),
                )])
            })
            .unwrap();

        let result = registry.read("file:///etc/config", ctx()).await.unwrap();
        assert_eq!(result[0].uri, "file:///etc/config");
        assert_eq!(result[0].text.as_deref(), Some("/etc/config"));
    }

    #[tokio::test]
    async fn unmatched_uri_is_not_found() {
        let registry = ResourceRegistry::new();
        let err = registry.read("nothing://here", ctx()).await.unwrap_err();
        assert!(matches!(err, ServerError::ResourceNotFound(_)));
    }

    #[test]
    fn is_template_is_present_in_the_serialized_listing() {
        let registry = ResourceRegistry::new();
        registry
            .register("config://app", "app config", "text/plain", None, |_ctx| async { Ok(vec![]) })
            .unwrap();
        registry
            .register_template("file://{+path}", "file", "text/plain", |uri, _vars, _ctx| async move {
                Ok(vec![ResourceContents::text(uri, "text/plain", "")])
            })
            .unwrap();

        let mut listing = registry.list_resources();
        listing.sort_by(|a, b| a.uri.cmp(&b.uri));
        let values: Vec<Value> = listing.iter().map(|d| serde_json::to_value(d).unwrap()).collect();

        assert_eq!(values[0]["isTemplate"], Value::Bool(false));
        assert_eq!(values[1]["isTemplate"], Value::Bool(true));
    }

    #[test]
    fn duplicate_static_uri_fails() {
        let registry = ResourceRegistry::new();
        registry
            .register("a://b", "x", "text/plain", None, |_ctx| async { Ok(vec![]) })
            .unwrap();
        let err = registry.register("a://b", "y", "text/plain", None, |_ctx| async { Ok(vec![]) });
        assert!(matches!(err, Err(ServerError::DuplicateResource(_))));
    }

    #[test]
    fn subscribe_and_fan_out_snapshot() {
        let registry = ResourceRegistry::new();
        registry.subscribe("a://b", "session-1");
        registry.subscribe("a://b", "session-2");
        let mut subs = registry.subscribers("a://b");
        subs.sort();
        assert_eq!(subs, vec!["session-1".to_string(), "session-2".to_string()]);

        registry.unsubscribe("a://b", "session-1");
        assert_eq!(registry.subscribers("a://b"), vec!["session-2".to_string()]);
    }

    #[test]
    fn remove_subscriber_clears_every_uri() {
        let registry = ResourceRegistry::new();
        registry.subscribe("a://b", "session-1");
        registry.subscribe("c://d", "session-1");
        registry.subscribe("c://d", "session-2");
        registry.remove_subscriber("session-1");
        assert!(registry.subscribers("a://b").is_empty());
        assert_eq!(registry.subscribers("c://d"), vec!["session-2".to_string()]);
    }

    #[tokio::test]
    async fn completion_handler_is_optional() {
        let registry = ResourceRegistry::new();
        registry
            .register_template("db://{table}", "table", "application/json", |uri, _vars, _ctx| async move {
                Ok(vec![ResourceContents::text(uri, "application/json", "{}")])
            })
            .unwrap();
        assert!(registry.complete("db://{table}", "table", "us").await.is_empty());

        registry.set_completion_handler(
            "db://{table}",
            Arc::new(|_arg, partial| {
                Box::pin(async move {
                    vec!["users".to_string(), "usage".to_string()]
                        .into_iter()
                        .filter(|c| c.starts_with(&partial))
                        .collect()
                })
            }),
        );
        let completions = registry.complete("db://{table}", "table", "us").await;
        assert_eq!(completions, vec!["users".to_string(), "usage".to_string()]);
    }
}
