//! The seam between the engine's dispatch loop and whatever the embedder
//! wants done with an inbound request or notification (C8).
//!
//! A client-role peer registers a [`RequestHandler`] for server-initiated
//! requests (`roots/list`, `sampling/createMessage`, `elicitation/create`)
//! and a server-role peer registers [`ServerDispatcher`], which routes the
//! standard MCP methods to the three registries in `mcpeer-server`. Both
//! shapes are the same trait — the engine doesn't need to know which role
//! it's playing to dispatch a request, only whether a handler is
//! registered at all.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use mcpeer_core::RequestContext;
use mcpeer_server::{PromptRegistry, ReadResourceParams, ResourceRegistry, ToolRegistry};
use mcpeer_wire::{JsonRpcError, JsonRpcErrorCode};

use crate::capabilities::{PromptsCapabilities, ResourcesCapabilities, ServerCapabilities, ToolsCapabilities};

/// Routes one inbound JSON-RPC request (minus `initialize`, which the
/// engine handles itself since it owns the peer-info slot) to whatever
/// handles that method, and answers with either the request's `result`
/// value or a JSON-RPC error.
///
/// `origin` is the subscriber/session identity the engine computed for
/// this inbound message — a session id string for HTTP, a fixed constant
/// for stdio — passed through so a handler that needs to record a
/// subscription (`resources/subscribe`) knows who to attribute it to.
pub trait RequestHandler: Send + Sync {
    fn handle(
        &self,
        method: String,
        params: Option<Value>,
        ctx: RequestContext,
        origin: String,
    ) -> BoxFuture<'static, Result<Value, JsonRpcError>>;

    /// The capabilities this handler supports, echoed in `initialize`'s
    /// result. Only meaningful for a server-role handler; a client-role
    /// handler's capabilities are declared directly by the caller of
    /// [`crate::Peer::initialize`].
    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities::default()
    }
}

/// Routes one inbound notification that isn't `notifications/progress`,
/// `notifications/cancelled`, or `notifications/initialized` — those three
/// are handled by the engine itself since they drive tracker/timeout/
/// handshake state.
pub trait NotificationHandler: Send + Sync {
    fn handle(&self, method: &str, params: Option<Value>);
}

/// The default notification handler: silently drops anything it doesn't
/// recognize, for a peer that hasn't registered one.
#[derive(Debug, Default)]
pub struct NullNotificationHandler;

impl NotificationHandler for NullNotificationHandler {
    fn handle(&self, _method: &str, _params: Option<Value>) {}
}

fn invalid_params(detail: impl Into<String>) -> JsonRpcError {
    JsonRpcError::new(JsonRpcErrorCode::InvalidParams, detail.into())
}

fn method_not_found(method: &str) -> JsonRpcError {
    JsonRpcError::new(JsonRpcErrorCode::MethodNotFound, format!("method not found: {method}"))
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Option<Value>, method: &str) -> Result<T, JsonRpcError> {
    let value = params.unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| invalid_params(format!("invalid params for {method}: {e}")))
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct SubscribeParams {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CompletionArgument {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ResourceCompleteParams {
    uri: String,
    argument: CompletionArgument,
}

#[derive(Debug, Deserialize)]
struct PromptCompleteParams {
    name: String,
    argument: CompletionArgument,
}

fn completion_result(values: Vec<String>) -> Value {
    let total = values.len();
    serde_json::json!({
        "completion": {
            "values": values,
            "total": total,
            "hasMore": false,
        }
    })
}

/// The server-role [`RequestHandler`]: routes every standard MCP server
/// method except `initialize` to the tool, resource, and prompt
/// registries.
pub struct ServerDispatcher {
    pub tools: Arc<ToolRegistry>,
    pub resources: Arc<ResourceRegistry>,
    pub prompts: Arc<PromptRegistry>,
}

impl ServerDispatcher {
    pub fn new(tools: Arc<ToolRegistry>, resources: Arc<ResourceRegistry>, prompts: Arc<PromptRegistry>) -> Self {
        Self { tools, resources, prompts }
    }
}

impl RequestHandler for ServerDispatcher {
    fn handle(
        &self,
        method: String,
        params: Option<Value>,
        ctx: RequestContext,
        origin: String,
    ) -> BoxFuture<'static, Result<Value, JsonRpcError>> {
        let tools = self.tools.clone();
        let resources = self.resources.clone();
        let prompts = self.prompts.clone();

        Box::pin(async move {
            match method.as_str() {
                "ping" => Ok(serde_json::json!({})),

                "tools/list" => Ok(serde_json::json!({ "tools": tools.list_tools() })),
                "tools/call" => {
                    let p: CallToolParams = parse_params(params, &method)?;
                    let result = tools.call(&p.name, p.arguments, ctx).await?;
                    serde_json::to_value(result).map_err(|e| invalid_params(e.to_string()))
                }

                "resources/list" => Ok(serde_json::json!({ "resources": resources.list_resources() })),
                "resources/read" => {
                    let p: ReadResourceParams = parse_params(params, &method)?;
                    let contents = resources
                        .read(&p.uri, ctx)
                        .await
                        .map_err(|e| e.to_json_rpc_error())?;
                    Ok(serde_json::json!({ "contents": contents }))
                }
                "resources/subscribe" => {
                    let p: SubscribeParams = parse_params(params, &method)?;
                    resources.subscribe(p.uri, origin);
                    Ok(serde_json::json!({}))
                }
                "resources/unsubscribe" => {
                    let p: SubscribeParams = parse_params(params, &method)?;
                    resources.unsubscribe(&p.uri, &origin);
                    Ok(serde_json::json!({}))
                }
                "resources/complete" => {
                    let p: ResourceCompleteParams = parse_params(params, &method)?;
                    let values = resources
                        .complete(&p.uri, &p.argument.name, &p.argument.value)
                        .await;
                    Ok(completion_result(values))
                }

                "prompts/list" => Ok(serde_json::json!({ "prompts": prompts.list_prompts() })),
                "prompts/get" => {
                    let p: GetPromptParams = parse_params(params, &method)?;
                    let messages = prompts
                        .get(&p.name, p.arguments, ctx)
                        .await
                        .map_err(|e| e.to_json_rpc_error())?;
                    Ok(serde_json::json!({ "messages": messages }))
                }
                "prompts/complete" => {
                    let p: PromptCompleteParams = parse_params(params, &method)?;
                    let values = prompts
                        .complete(&p.name, &p.argument.name, &p.argument.value)
                        .await;
                    Ok(completion_result(values))
                }

                other => Err(method_not_found(other)),
            }
        })
    }

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            experimental: None,
            logging: None,
            completions: Some(Default::default()),
            prompts: Some(PromptsCapabilities { list_changed: Some(true) }),
            resources: Some(ResourcesCapabilities {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            tools: Some(ToolsCapabilities { list_changed: Some(true) }),
        }
    }
}
