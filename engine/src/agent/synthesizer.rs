//! Response Synthesizer
//!
//! Turns a tool result into the customer-facing reply. Numbers are templated
//! directly; product and outlet rows are summarised by the model, with a
//! plain listing when the model is unavailable.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::prompt;
use crate::llm::{LLMProvider, Message};
use crate::tools::{Product, ToolPayload, ToolResult};

pub const NO_PRODUCTS: &str = "I couldn't find any products matching your description.";
pub const NO_NEARBY_OUTLETS: &str =
    "I couldn't find any outlets near your location. Please ensure location access is enabled.";
pub const NO_MATCHING_OUTLETS: &str = "I couldn't find any outlets matching your description.";
pub const OUTLET_CLARIFY: &str =
    "Sorry, I couldn't retrieve the information. Could you be more specific?";

const PRODUCT_LIMIT: usize = 5;
const OUTLET_LIMIT: usize = 3;

pub struct ResponseSynthesizer {
    provider: Arc<dyn LLMProvider>,
    brand: String,
    timeout: Duration,
}

impl ResponseSynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>, brand: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            brand: brand.into(),
            timeout,
        }
    }

    /// Reply for a finished tool call. Failed calls reuse the adapter's apology.
    pub async fn render(&self, result: &ToolResult) -> String {
        match result {
            ToolResult::Failed { message, .. } => message.clone(),
            ToolResult::Ok { payload, .. } => match payload {
                ToolPayload::Number { value } => format!("The answer is {}", value),
                ToolPayload::Products { products, .. } => self.products(products).await,
                ToolPayload::Outlets { rows, nearest, .. } => self.outlets(rows, *nearest).await,
            },
        }
    }

    async fn products(&self, products: &[Product]) -> String {
        if products.is_empty() {
            return NO_PRODUCTS.to_string();
        }

        let listing = prompt::product_listing(products, PRODUCT_LIMIT);
        let request = prompt::product_summary(&self.brand, &listing);

        match self.summarise(request).await {
            Some(summary) => summary,
            None => format!("Here are the products I found:\n\n{}", listing.trim_end()),
        }
    }

    async fn outlets(&self, rows: &[Map<String, Value>], nearest: bool) -> String {
        if rows.is_empty() {
            return if nearest {
                NO_NEARBY_OUTLETS
            } else {
                NO_MATCHING_OUTLETS
            }
            .to_string();
        }

        let shown = &rows[..rows.len().min(OUTLET_LIMIT)];
        if shown.iter().any(is_error_row) {
            debug!("Outlet rows carry only an error marker");
            return OUTLET_CLARIFY.to_string();
        }

        let entries = shown
            .iter()
            .map(|row| prompt::outlet_entry(row, nearest))
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = if nearest {
            prompt::nearest_outlet_summary(&self.brand, &entries)
        } else {
            prompt::outlet_summary(&self.brand, &entries)
        };

        match self.summarise(request).await {
            Some(summary) => summary,
            None if nearest => format!(
                "Here are the closest outlets I found:\n\n{}",
                entries.trim_end()
            ),
            None => format!("Here's what I found:\n\n{}", entries.trim_end()),
        }
    }

    /// One bounded model call; `None` when it fails, times out or says nothing
    async fn summarise(&self, request: String) -> Option<String> {
        let messages = [Message::user(request)];

        match tokio::time::timeout(self.timeout, self.provider.generate(&messages)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Ok(Err(e)) => {
                warn!("Summary generation failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Summary generation timed out after {:?}", self.timeout);
                None
            }
        }
    }
}

fn is_error_row(row: &Map<String, Value>) -> bool {
    let named = row
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    row.contains_key("error") && !named
}
