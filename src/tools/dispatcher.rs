//! Tool dispatch: lookup, validation, execution and error normalisation.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ToolRegistry, schema};
use crate::types::{Observation, ToolCallRequest, ToolError};

/// Executes tool calls against a registry.
///
/// [`dispatch`](Dispatcher::dispatch) never fails: unknown tools, invalid
/// arguments, handler errors and handler panics all come back as error
/// observations so the model can react to them.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    pub async fn dispatch(&self, call: &ToolCallRequest) -> Observation {
        match self.try_dispatch(call).await {
            Ok(content) => {
                debug!(tool = %call.name, call_id = %call.id, "Tool call succeeded");
                Observation::success(&call.id, content)
            }
            Err(e) => {
                debug!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                Observation::error(&call.id, &e)
            }
        }
    }

    async fn try_dispatch(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::unknown_tool(&call.name))?;

        let arguments = match &call.arguments {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(ToolError::invalid_arguments(
                        "arguments must be a JSON object",
                    ));
                }
            },
            _ => {
                return Err(ToolError::invalid_arguments(
                    "arguments must be a JSON object",
                ));
            }
        };

        schema::validate_arguments(&tool.input_schema(), &arguments)?;

        match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = %call.name, panic = %message, "Tool handler panicked");
                Err(ToolError::execution_failed(format!(
                    "tool panicked: {}",
                    message
                )))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest::new("call_1", name, arguments)
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::demo_tools();
        let obs = Dispatcher::new(&registry)
            .dispatch(&call("get_stock_price", json!({"symbol": "ACME"})))
            .await;
        assert!(obs.is_error);
        assert_eq!(obs.content, "unknown tool: get_stock_price");
        assert_eq!(obs.call_id, "call_1");
    }

    #[tokio::test]
    async fn test_calculate_success() {
        let registry = ToolRegistry::demo_tools();
        let obs = Dispatcher::new(&registry)
            .dispatch(&call("calculate", json!({"expression": "2+3"})))
            .await;
        assert!(!obs.is_error);
        assert_eq!(obs.content, "5");
    }

    #[tokio::test]
    async fn test_runaway_expression_is_error_observation() {
        let registry = ToolRegistry::demo_tools();
        let dispatcher = Dispatcher::new(&registry);
        for expression in ["(".repeat(10_000), format!("{}1", "-".repeat(200_000))] {
            let obs = dispatcher
                .dispatch(&call("calculate", json!({ "expression": expression })))
                .await;
            assert!(obs.is_error);
            assert!(obs.content.starts_with("invalid expression"));
        }
    }

    #[tokio::test]
    async fn test_current_time_takes_no_arguments() {
        let registry = ToolRegistry::demo_tools();
        let obs = Dispatcher::new(&registry)
            .dispatch(&call("get_current_time", json!({})))
            .await;
        assert!(!obs.is_error, "{}", obs.content);
        assert_eq!(obs.content.len(), "2026-01-01 00:00:00".len());
    }

    #[tokio::test]
    async fn test_string_encoded_arguments() {
        let registry = ToolRegistry::demo_tools();
        let obs = Dispatcher::new(&registry)
            .dispatch(&call("calculate", json!("{\"expression\": \"2^3\"}")))
            .await;
        assert_eq!(obs.content, "8");

        let obs = Dispatcher::new(&registry)
            .dispatch(&call("calculate", json!("{not json")))
            .await;
        assert!(obs.is_error);
        assert!(obs.content.starts_with("invalid arguments"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let tool = FnTool::new(
            "count",
            "Counts calls",
            json!({
                "type": "object",
                "properties": {"n": {"type": "integer"}},
                "required": ["n"]
            }),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("ok".into())
            },
        );
        let registry = ToolRegistry::new().with(tool).unwrap();
        let dispatcher = Dispatcher::new(&registry);

        let obs = dispatcher.dispatch(&call("count", json!({"n": "one"}))).await;
        assert!(obs.is_error);
        let obs = dispatcher.dispatch(&call("count", json!([1, 2]))).await;
        assert!(obs.is_error);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let obs = dispatcher.dispatch(&call("count", json!({"n": 1}))).await;
        assert!(!obs.is_error);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_observation() {
        let tool = FnTool::new("fail", "Always fails", json!({"type": "object"}), |_| {
            Err(ToolError::execution_failed("backend unavailable"))
        });
        let registry = ToolRegistry::new().with(tool).unwrap();
        let obs = Dispatcher::new(&registry)
            .dispatch(&call("fail", json!({})))
            .await;
        assert!(obs.is_error);
        assert_eq!(obs.content, "execution failed: backend unavailable");
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let tool = FnTool::new("boom", "Panics", json!({"type": "object"}), |_| {
            panic!("kaboom")
        });
        let registry = ToolRegistry::new().with(tool).unwrap();
        let obs = Dispatcher::new(&registry)
            .dispatch(&call("boom", Value::Null))
            .await;
        assert!(obs.is_error);
        assert!(obs.content.contains("tool panicked: kaboom"));
    }
}
