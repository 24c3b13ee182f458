//! Tool registry: schema-validated tool registration and dispatch (C9).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use jsonschema::Validator;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use mcpeer_core::RequestContext;
use mcpeer_wire::{JsonRpcError, JsonRpcErrorCode};

use crate::content::ContentBlock;
use crate::error::ServerError;

/// The handler a registered tool invokes: receives the already
/// input-validated arguments plus the request's [`RequestContext`], and
/// returns the tool's result.
pub type ToolHandlerFn =
    Arc<dyn Fn(Value, RequestContext) -> BoxFuture<'static, CallToolResult> + Send + Sync>;

/// Audience hint surfaced in [`ToolAnnotations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    User,
    Assistant,
}

/// Hints about a tool's behavior, surfaced in `tools/list` so a client can
/// make UI or safety decisions without calling the tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnnotations {
    #[serde(default)]
    pub destructive: bool,
    #[serde(default, rename = "readOnly")]
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// The `content`/`isError` result of a tool call.
///
/// Output-schema validation failure is surfaced here (`is_error: true` with
/// a diagnostic text block), never as a JSON-RPC error — a tool that ran to
/// completion but produced a malformed result is a tool-execution failure,
/// not a protocol failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: None,
            structured_content: None,
        }
    }

    pub fn success_structured(content: Vec<ContentBlock>, structured: Value) -> Self {
        Self {
            content,
            is_error: None,
            structured_content: Some(structured),
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(diagnostic)],
            is_error: Some(true),
            structured_content: None,
        }
    }
}

/// What `tools/list` exposes for one registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

struct ToolEntry {
    description: String,
    input_schema: Value,
    input_validator: Validator,
    output_schema: Option<Value>,
    output_validator: Option<Validator>,
    annotations: Option<ToolAnnotations>,
    handler: ToolHandlerFn,
}

/// A thread-safe table of registered tools, keyed by unique name.
///
/// Mutations (`register`) take the exclusive lock; reads (`list_tools`,
/// `call`'s lookup) take the shared lock and extract an `Arc` before
/// dropping it, so a handler invocation never runs while holding the
/// registry lock.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<ToolEntry>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, compiling its input schema (and output schema, if
    /// given) once up front. Fails if `name` is already registered or a
    /// schema doesn't compile.
    pub fn register<F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
        output_schema: Option<Value>,
        annotations: Option<ToolAnnotations>,
    ) -> Result<(), ServerError>
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = CallToolResult> + Send + 'static,
    {
        let name = name.into();
        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            return Err(ServerError::DuplicateTool(name));
        }

        let input_validator = jsonschema::validator_for(&input_schema)
            .map_err(|e| ServerError::SchemaCompile(e.to_string()))?;
        let output_validator = match &output_schema {
            Some(schema) => Some(
                jsonschema::validator_for(schema)
                    .map_err(|e| ServerError::SchemaCompile(e.to_string()))?,
            ),
            None => None,
        };

        let handler: ToolHandlerFn = Arc::new(move |args, ctx| Box::pin(handler(args, ctx)));

        tools.insert(
            name,
            Arc::new(ToolEntry {
                description: description.into(),
                input_schema,
                input_validator,
                output_schema,
                output_validator,
                annotations,
                handler,
            }),
        );
        Ok(())
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .iter()
            .map(|(name, entry)| ToolDescriptor {
                name: name.clone(),
                description: entry.description.clone(),
                input_schema: entry.input_schema.clone(),
                output_schema: entry.output_schema.clone(),
                annotations: entry.annotations.clone(),
            })
            .collect()
    }

    /// Validates `arguments` against the tool's input schema and, if it
    /// passes, invokes the handler. Input validation failure is a
    /// protocol-level `-32602` error; a registered but missing tool is a
    /// [`ServerError::ToolNotFound`]; anything past validation is the
    /// handler's own [`CallToolResult`], including output-schema failures.
    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
        ctx: RequestContext,
    ) -> Result<CallToolResult, JsonRpcError> {
        let entry = {
            let tools = self.tools.read();
            tools
                .get(name)
                .cloned()
                .ok_or_else(|| ServerError::ToolNotFound(name.to_string()).to_json_rpc_error())?
        };

        if let Err(error) = entry.input_validator.validate(&arguments) {
            return Err(JsonRpcError::new(
                JsonRpcErrorCode::InvalidParams,
                format!("invalid arguments for tool {name}: {error}"),
            ));
        }

        let mut result = (entry.handler)(arguments, ctx).await;

        if let Some(validator) = &entry.output_validator {
            match &result.structured_content {
                Some(structured) => {
                    if let Err(error) = validator.validate(structured) {
                        warn!(tool = name, %error, "tool output failed schema validation");
                        result = CallToolResult::failure(format!(
                            "tool {name} produced output that fails its declared output schema"
                        ));
                    }
                }
                None => {
                    result = CallToolResult::failure(format!(
                        "tool {name} declares an output schema but returned no structured content"
                    ));
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "a": {"type": "number"}, "b": {"type": "number"} },
            "required": ["a", "b"]
        })
    }

    #[tokio::test]
    async fn registers_and_calls_a_tool() {
        let registry = ToolRegistry::new();
        registry
            .register(
                "add",
                "adds two numbers",
                add_schema(),
                |args, _ctx| async move {
                    let a = args["a"].as_f64().unwrap();
                    let b = args["b"].as_f64().unwrap();
                    CallToolResult::success_structured(
                        vec![ContentBlock::text(format!("{}", a + b))],
                        json!({"sum": a + b}),
                    )
                },
                Some(json!({
                    "type": "object",
                    "properties": { "sum": {"type": "number"} },
                    "required": ["sum"]
                })),
                None,
            )
            .unwrap();

        let result = registry
            .call("add", json!({"a": 1, "b": 2}), RequestContext::detached(1.into()))
            .await
            .unwrap();
        assert_eq!(result.is_error, None);
        assert_eq!(result.structured_content, Some(json!({"sum": 3.0})));
    }

    #[tokio::test]
    async fn invalid_input_is_a_protocol_error() {
        let registry = ToolRegistry::new();
        registry
            .register(
                "add",
                "adds two numbers",
                add_schema(),
                |_args, _ctx| async move { CallToolResult::success(vec![]) },
                None,
                None,
            )
            .unwrap();

        let err = registry
            .call("add", json!({"a": "not a number"}), RequestContext::detached(1.into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, JsonRpcErrorCode::InvalidParams.code());
    }

    #[tokio::test]
    async fn output_schema_violation_is_a_tool_execution_failure() {
        let registry = ToolRegistry::new();
        registry
            .register(
                "broken",
                "always returns the wrong shape",
                json!({"type": "object"}),
                |_args, _ctx| async move { CallToolResult::success(vec![]) },
                Some(json!({
                    "type": "object",
                    "properties": { "sum": {"type": "number"} },
                    "required": ["sum"]
                })),
                None,
            )
            .unwrap();

        let result = registry
            .call("broken", json!({}), RequestContext::detached(1.into()))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = ToolRegistry::new();
        registry
            .register(
                "dup",
                "first",
                json!({"type": "object"}),
                |_args, _ctx| async move { CallToolResult::success(vec![]) },
                None,
                None,
            )
            .unwrap();

        let err = registry.register(
            "dup",
            "second",
            json!({"type": "object"}),
            |_args, _ctx| async move { CallToolResult::success(vec![]) },
            None,
            None,
        );
        assert!(matches!(err, Err(ServerError::DuplicateTool(_))));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry
            .call("missing", json!({}), RequestContext::detached(1.into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, -32001);
    }
}
