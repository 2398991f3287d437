//! Tool Dispatcher
//!
//! Resolves a `use_tool` decision against the registry. Decisions that are not
//! ready to run come back as clarifications, never as errors.

use std::sync::Arc;
use tracing::{info, warn};

use super::decision::Decision;
use crate::session::SessionContext;
use crate::tools::{ToolRegistry, ToolResult};
use sdk::ToolInput;

pub const UNRESOLVED_TOOL: &str = "I need to clarify what you're asking for.";
pub const DEFAULT_CLARIFICATION: &str = "Could you please provide more details?";
pub const UNKNOWN_TOOL: &str =
    "Sorry, I don't have a way to help with that just yet. Is there anything about our products or outlets I can help with?";

/// What happened to a `use_tool` decision
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No tool was named; answer with a clarifying message
    Unresolved { message: String },

    /// The model still needs information from the customer
    Clarify { question: String },

    /// The named tool is not registered
    UnknownTool { tool: String, message: String },

    /// The tool ran; its result may still be a failure
    Executed { tool: String, result: ToolResult },
}

impl DispatchOutcome {
    pub fn requires_input(&self) -> bool {
        matches!(self, Self::Clarify { .. })
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run the decision's tool. Context is only touched by tools that ask to
    /// remember something from their result.
    pub async fn dispatch(&self, decision: &Decision, context: &mut SessionContext) -> DispatchOutcome {
        let Some(tool) = decision.tool.as_deref().filter(|t| !t.is_empty()) else {
            return DispatchOutcome::Unresolved {
                message: UNRESOLVED_TOOL.to_string(),
            };
        };

        if decision.has_missing() {
            let question = decision.question.trim();
            return DispatchOutcome::Clarify {
                question: if question.is_empty() {
                    DEFAULT_CLARIFICATION.to_string()
                } else {
                    question.to_string()
                },
            };
        }

        let input = ToolInput::with_params(tool, decision.params.clone());
        match self.registry.dispatch(&input, context).await {
            Some(result) => {
                if result.is_success() {
                    info!(tool, "Tool call succeeded");
                } else {
                    warn!(
                        tool,
                        failure = result.failure().map(|f| f.label()).unwrap_or("unknown"),
                        "Tool call failed"
                    );
                }
                DispatchOutcome::Executed {
                    tool: tool.to_string(),
                    result,
                }
            }
            None => DispatchOutcome::UnknownTool {
                tool: tool.to_string(),
                message: UNKNOWN_TOOL.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::decision::Action;
    use crate::session::CURRENT_OUTLET_KEY;
    use crate::tools::{Tool, ToolPayload};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct LookupTool {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for LookupTool {
        fn name(&self) -> &str {
            "outlet_query"
        }

        fn description(&self) -> &str {
            "Looks up outlets"
        }

        async fn execute(&self, _input: &ToolInput) -> ToolResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let row: Map<String, Value> = json!({"name": "ZUS Coffee SS 2"})
                .as_object()
                .cloned()
                .unwrap_or_default();
            ToolResult::ok(
                ToolPayload::Outlets {
                    rows: vec![row],
                    count: 1,
                    nearest: false,
                },
                "Found 1 outlet(s)",
            )
        }

        fn remember(&self, result: &ToolResult) -> Option<(String, Value)> {
            match result.payload()? {
                ToolPayload::Outlets { rows, .. } => rows
                    .first()
                    .map(|row| (CURRENT_OUTLET_KEY.to_string(), Value::Object(row.clone()))),
                _ => None,
            }
        }
    }

    fn setup() -> (Dispatcher, Arc<LookupTool>) {
        let tool = Arc::new(LookupTool::default());
        let mut registry = ToolRegistry::new();
        registry.register(tool.clone());
        (Dispatcher::new(Arc::new(registry)), tool)
    }

    fn use_tool(tool: Option<&str>, missing: &str) -> Decision {
        let mut decision = Decision::answer("");
        decision.action = Action::UseTool;
        decision.tool = tool.map(str::to_string);
        decision.missing = missing.to_string();
        decision
    }

    #[tokio::test]
    async fn test_missing_tool_is_unresolved() {
        let (dispatcher, tool) = setup();
        let mut context = SessionContext::default();

        let outcome = dispatcher.dispatch(&use_tool(None, "none"), &mut context).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Unresolved {
                message: UNRESOLVED_TOOL.to_string()
            }
        );
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_information_asks_before_running() {
        let (dispatcher, tool) = setup();
        let mut context = SessionContext::default();

        let mut decision = use_tool(Some("outlet_query"), "which area");
        decision.question = "Which area are you in?".to_string();
        let outcome = dispatcher.dispatch(&decision, &mut context).await;
        assert!(outcome.requires_input());
        assert_eq!(
            outcome,
            DispatchOutcome::Clarify {
                question: "Which area are you in?".to_string()
            }
        );

        decision.question.clear();
        let outcome = dispatcher.dispatch(&decision, &mut context).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Clarify {
                question: DEFAULT_CLARIFICATION.to_string()
            }
        );
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_apologises() {
        let (dispatcher, _) = setup();
        let mut context = SessionContext::default();

        match dispatcher.dispatch(&use_tool(Some("weather"), "none"), &mut context).await {
            DispatchOutcome::UnknownTool { tool, message } => {
                assert_eq!(tool, "weather");
                assert!(!message.contains("weather"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_lookup_remembers_outlet() {
        let (dispatcher, tool) = setup();
        let mut context = SessionContext::default();

        let outcome = dispatcher
            .dispatch(&use_tool(Some("outlet_query"), "none"), &mut context)
            .await;
        assert!(matches!(outcome, DispatchOutcome::Executed { .. }));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            context.current_outlet().and_then(|o| o.get("name")),
            Some(&json!("ZUS Coffee SS 2"))
        );
    }
}
