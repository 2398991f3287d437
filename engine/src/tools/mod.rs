//! Tool registry
//!
//! Tools are the backend capabilities the planner can dispatch a decision to.
//! Each tool is exception-free: every transport or backend problem comes back
//! as `ToolResult::Failed` with a `ToolFailure` category and a pre-written,
//! user-safe apology.

pub mod calculator;
mod http;
pub mod outlet_query;
pub mod product_search;

pub use calculator::CalculatorTool;
pub use outlet_query::OutletQueryTool;
pub use product_search::{Product, ProductSearchTool};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ToolsConfig;
use crate::location::LocationClassifier;
use crate::session::SessionContext;
use sdk::{ToolFailure, ToolInput};

/// Normalized data returned by a successful tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolPayload {
    /// A calculator result
    Number { value: serde_json::Number },

    /// Product search hits, best match first
    Products { products: Vec<Product>, count: u64 },

    /// Outlet rows; `nearest` rows carry `distance_km` and are sorted by it
    Outlets {
        rows: Vec<Map<String, Value>>,
        count: u64,
        nearest: bool,
    },
}

/// Outcome of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Ok {
        payload: ToolPayload,
        message: String,
    },
    Failed {
        failure: ToolFailure,
        message: String,
    },
}

impl ToolResult {
    pub fn ok(payload: ToolPayload, message: impl Into<String>) -> Self {
        Self::Ok {
            payload,
            message: message.into(),
        }
    }

    pub fn failed(failure: ToolFailure, message: impl Into<String>) -> Self {
        Self::Failed {
            failure,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Ok { message, .. } | Self::Failed { message, .. } => message,
        }
    }

    pub fn failure(&self) -> Option<&ToolFailure> {
        match self {
            Self::Ok { .. } => None,
            Self::Failed { failure, .. } => Some(failure),
        }
    }

    pub fn payload(&self) -> Option<&ToolPayload> {
        match self {
            Self::Ok { payload, .. } => Some(payload),
            Self::Failed { .. } => None,
        }
    }
}

/// A named capability the planner can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses in the TOOL field
    fn name(&self) -> &str;

    /// Natural-language description injected into the system prompt
    fn description(&self) -> &str;

    /// Run the tool. Must not panic and has no error path.
    async fn execute(&self, input: &ToolInput) -> ToolResult;

    /// Session context entry to record after this result, if any
    fn remember(&self, _result: &ToolResult) -> Option<(String, Value)> {
        None
    }
}

/// Registry of available tools, built explicitly at startup
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the calculator, product search and outlet query adapters
    pub fn with_http_tools(
        config: &ToolsConfig,
        classifier: Arc<LocationClassifier>,
    ) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        registry
            .register(Arc::new(CalculatorTool::new(config)?))
            .register(Arc::new(ProductSearchTool::new(config)?))
            .register(Arc::new(OutletQueryTool::new(config, classifier)?));
        Ok(registry)
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!("Tool '{}' registered twice; keeping the latest", name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool catalogue for the system prompt
    pub fn catalogue(&self) -> String {
        self.tools
            .values()
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run a tool by name and record what it asks to remember in `context`.
    /// `None` if no such tool is registered.
    pub async fn dispatch(
        &self,
        input: &ToolInput,
        context: &mut SessionContext,
    ) -> Option<ToolResult> {
        let Some(tool) = self.get(&input.tool) else {
            warn!("Unknown tool requested: {}", input.tool);
            return None;
        };

        debug!(tool = %input.tool, params = %serde_json::Value::Object(input.params.clone()), "dispatching tool");
        let result = tool.execute(input).await;

        if let Some((key, value)) = tool.remember(&result) {
            debug!(tool = %input.tool, key = %key, "recording tool context");
            context.insert(key, value);
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes a number"
        }

        async fn execute(&self, input: &ToolInput) -> ToolResult {
            match input.param_f64_opt("value").and_then(serde_json::Number::from_f64) {
                Some(value) => ToolResult::ok(ToolPayload::Number { value }, "echoed"),
                None => ToolResult::failed(
                    ToolFailure::InvalidParams {
                        reason: "value".into(),
                    },
                    "Give me a number",
                ),
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_known_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let input = ToolInput::new("echo").with_param("value", serde_json::json!(7.5));
        let mut context = SessionContext::default();
        let result = registry.dispatch(&input, &mut context).await.unwrap();

        assert!(result.is_success());
        assert!(context.is_empty());
        assert_eq!(result.message(), "echoed");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = ToolRegistry::new();
        let mut context = SessionContext::default();
        assert!(registry
            .dispatch(&ToolInput::new("weather"), &mut context)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failure_accessors() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let mut context = SessionContext::default();
        let result = registry
            .dispatch(&ToolInput::new("echo"), &mut context)
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(result.failure().map(|f| f.label()), Some("invalid_params"));
        assert!(result.payload().is_none());
    }

    #[test]
    fn test_catalogue_lists_every_tool() {
        let classifier = Arc::new(LocationClassifier::new().unwrap());
        let registry = ToolRegistry::with_http_tools(&ToolsConfig::default(), classifier).unwrap();

        assert_eq!(
            registry.names(),
            vec!["calculator", "outlet_query", "product_search"]
        );
        let catalogue = registry.catalogue();
        assert!(catalogue.contains("- calculator:"));
        assert!(catalogue.contains("- outlet_query:"));
        assert!(catalogue.contains("- product_search:"));
    }
}
