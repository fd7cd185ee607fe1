//! Tools the model may call mid-turn
//!
//! Results come back as `tool-output-available` / `tool-output-error`
//! events so they fold into the transcript like any other event.

pub mod clock;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::transcript::Event;
use crate::upstream::types::ToolDefinition;

/// Default upper bound on one tool execution
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A callable tool
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input object
    fn parameters(&self) -> Value;

    /// Run with the model-supplied input; `Err` carries the error text
    fn call(&self, input: Value) -> BoxFuture<'static, Result<Value, String>>;
}

/// Registered tools by name
#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registry with the named built-in tools enabled
    ///
    /// Unknown names are logged and skipped.
    pub fn from_names(names: &[String]) -> Self {
        let mut registry = Self::new();
        for name in names {
            match builtin(name) {
                Some(tool) => registry.register(tool),
                None => tracing::warn!(tool = %name, "Unknown tool in configuration, skipping"),
            }
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Definitions advertised in the upstream request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition::function(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    /// Run one call to completion and report it as a terminal event
    pub async fn execute(&self, call_id: String, name: String, input: Value) -> Event {
        let Some(tool) = self.get(&name) else {
            tracing::warn!(call_id = %call_id, tool = %name, "Model requested an unavailable tool");
            return Event::tool_error(call_id, format!("Tool '{}' is not available", name));
        };

        tracing::debug!(call_id = %call_id, tool = %name, "Executing tool");
        match tokio::time::timeout(self.timeout, tool.call(input)).await {
            Ok(Ok(output)) => Event::tool_output(call_id, output),
            Ok(Err(error_text)) => {
                tracing::info!(call_id = %call_id, tool = %name, "Tool failed: {}", error_text);
                Event::tool_error(call_id, error_text)
            }
            Err(_) => {
                tracing::warn!(call_id = %call_id, tool = %name, "Tool timed out");
                Event::tool_error(
                    call_id,
                    format!("Tool '{}' timed out after {:?}", name, self.timeout),
                )
            }
        }
    }
}

fn builtin(name: &str) -> Option<Arc<dyn Tool>> {
    match name {
        clock::CurrentTimeTool::NAME => Some(Arc::new(clock::CurrentTimeTool)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        fn call(&self, input: Value) -> BoxFuture<'static, Result<Value, String>> {
            async move {
                if input.get("fail").is_some() {
                    Err("asked to fail".to_string())
                } else {
                    Ok(input)
                }
            }
            .boxed()
        }
    }

    struct SleepyTool;

    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Never finishes in time"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        fn call(&self, _input: Value) -> BoxFuture<'static, Result<Value, String>> {
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Value::Null)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_execute_success_and_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ok = registry
            .execute("1".to_string(), "echo".to_string(), json!({"q": "x"}))
            .await;
        assert_eq!(ok, Event::tool_output("1", json!({"q": "x"})));

        let err = registry
            .execute("2".to_string(), "echo".to_string(), json!({"fail": true}))
            .await;
        assert_eq!(err, Event::tool_error("2", "asked to fail"));
    }

    #[tokio::test]
    async fn test_unregistered_tool() {
        let registry = ToolRegistry::new();
        let event = registry
            .execute("9".to_string(), "search".to_string(), json!({}))
            .await;
        assert_eq!(event, Event::tool_error("9", "Tool 'search' is not available"));
    }

    #[tokio::test]
    async fn test_tool_timeout() {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_millis(50));
        registry.register(Arc::new(SleepyTool));
        let event = registry
            .execute("t".to_string(), "sleepy".to_string(), json!({}))
            .await;
        assert_eq!(event, Event::tool_error("t", "Tool 'sleepy' timed out after 50ms"));
    }

    #[test]
    fn test_from_names_skips_unknown() {
        let registry =
            ToolRegistry::from_names(&["current_time".to_string(), "nope".to_string()]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["current_time"]);

        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].function.name, "current_time");
        assert_eq!(definitions[0].tool_type, "function");
    }
}
