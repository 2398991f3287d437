//! Calculator adapter: `POST {base}/calculator/ {"expression": ...}`

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use super::{http, Tool, ToolPayload, ToolResult};
use crate::config::ToolsConfig;
use sdk::{ToolFailure, ToolInput};

const DESCRIPTION: &str = "Performs mathematical calculations. Use this when the user asks for math \
operations like percentages, sums or differences. Parameter: \"expression\" (the math expression \
to evaluate, e.g. \"100 * 0.15\" for 15% of 100)";

#[derive(Debug, Deserialize)]
struct CalculatorResponse {
    success: bool,
    #[serde(default)]
    result: Value,
}

pub struct CalculatorTool {
    client: Client,
    url: String,
}

impl CalculatorTool {
    pub fn new(config: &ToolsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(Duration::from_secs(config.calculator_timeout_secs))?,
            url: http::endpoint(&config.base_url, "calculator/"),
        })
    }

    fn apology(failure: &ToolFailure) -> &'static str {
        match failure {
            ToolFailure::Timeout => "The request timed out. Please try again later.",
            ToolFailure::Connection => "Could not connect to the calculator service.",
            ToolFailure::InvalidParams { .. } => {
                "Could you tell me the exact calculation you'd like me to work out?"
            }
            ToolFailure::Http { .. } => {
                "The calculator service couldn't process that just now. Please try again later."
            }
            ToolFailure::Backend | ToolFailure::Unexpected { .. } => {
                "I was unable to help with that request right now. Would you like to explore our products or outlets instead?"
            }
        }
    }

    fn fail(failure: ToolFailure) -> ToolResult {
        let message = Self::apology(&failure);
        ToolResult::failed(failure, message)
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn execute(&self, input: &ToolInput) -> ToolResult {
        let expression = match input.param_str("expression") {
            Ok(expression) => expression,
            Err(e) => return Self::fail(e.into()),
        };

        let response: CalculatorResponse =
            match http::post_json(&self.client, &self.url, &json!({ "expression": expression })).await {
                Ok(response) => response,
                Err(failure) => return Self::fail(failure),
            };

        if !response.success {
            warn!("calculator rejected the expression");
            return Self::fail(ToolFailure::Backend);
        }

        match response.result {
            Value::Number(value) => {
                let message = format!("Calculation result: {}", value);
                ToolResult::ok(ToolPayload::Number { value }, message)
            }
            other => Self::fail(ToolFailure::Unexpected {
                reason: format!("non-numeric result: {}", other),
            }),
        }
    }
}
