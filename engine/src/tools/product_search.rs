//! Product search adapter: `GET {base}/products?query=..&top_k=..`
//!
//! The collaborator is a vector-similarity index over the drinkware catalogue.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{http, Tool, ToolPayload, ToolResult};
use crate::config::ToolsConfig;
use sdk::{ToolFailure, ToolInput};

const DESCRIPTION: &str = "Search for drinkware products (mugs, tumblers, accessories). Use this when \
users ask about products, prices, or what's available in the shop. Parameters: \"query\" (what to \
look for), optional \"top_k\" (number of results)";

/// Default search when the model gives no terms
const DEFAULT_QUERY: &str = "drinkware";

/// Largest page the collaborator accepts
const MAX_TOP_K: u64 = 10;

/// One product hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ProductSearchResponse {
    #[serde(default)]
    products: Vec<Product>,
    count: Option<u64>,
}

pub struct ProductSearchTool {
    client: Client,
    url: String,
    default_top_k: u64,
}

impl ProductSearchTool {
    pub fn new(config: &ToolsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(Duration::from_secs(config.product_timeout_secs))?,
            url: http::endpoint(&config.base_url, "products"),
            default_top_k: config.product_top_k,
        })
    }

    /// Combine the free-text query with a product type or category
    pub fn search_terms(input: &ToolInput) -> String {
        let query = input.param_str_opt("query");
        let refinement = input
            .param_str_opt("product_type")
            .or_else(|| input.param_str_opt("category"));

        match (query, refinement) {
            (Some(query), Some(refinement)) => format!("{} {}", query, refinement),
            (Some(query), None) => query,
            (None, Some(refinement)) => refinement,
            (None, None) => DEFAULT_QUERY.to_string(),
        }
    }

    fn apology(failure: &ToolFailure) -> &'static str {
        match failure {
            ToolFailure::Timeout => "The request timed out. Please try again later.",
            ToolFailure::Connection => {
                "Could not connect to the product service. It may be temporarily unavailable."
            }
            ToolFailure::Http { .. } => {
                "I couldn't process your request right now, please try again later."
            }
            ToolFailure::Backend
            | ToolFailure::InvalidParams { .. }
            | ToolFailure::Unexpected { .. } => {
                "Product search failed right now. Please try again in a little while."
            }
        }
    }
}

#[async_trait]
impl Tool for ProductSearchTool {
    fn name(&self) -> &str {
        "product_search"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn execute(&self, input: &ToolInput) -> ToolResult {
        let terms = Self::search_terms(input);
        let top_k = input
            .param_u64_opt("top_k")
            .unwrap_or(self.default_top_k)
            .clamp(1, MAX_TOP_K);

        let query = [("query", terms.clone()), ("top_k", top_k.to_string())];
        match http::get_json::<ProductSearchResponse>(&self.client, &self.url, &query).await {
            Ok(response) => {
                let count = response.count.unwrap_or(response.products.len() as u64);
                ToolResult::ok(
                    ToolPayload::Products {
                        products: response.products,
                        count,
                    },
                    format!("Found {} products for '{}'", count, terms),
                )
            }
            Err(failure) => {
                let message = Self::apology(&failure);
                ToolResult::failed(failure, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_terms_combination() {
        let plain = ToolInput::new("product_search").with_param("query", json!("tumbler"));
        assert_eq!(ProductSearchTool::search_terms(&plain), "tumbler");

        let combined = ToolInput::new("product_search")
            .with_param("query", json!("steel"))
            .with_param("category", json!("bottle"));
        assert_eq!(ProductSearchTool::search_terms(&combined), "steel bottle");

        let typed = ToolInput::new("product_search").with_param("product_type", json!("mug"));
        assert_eq!(ProductSearchTool::search_terms(&typed), "mug");

        let empty = ToolInput::new("product_search");
        assert_eq!(ProductSearchTool::search_terms(&empty), "drinkware");
    }

    #[test]
    fn test_product_defaults() {
        let product: Product = serde_json::from_value(json!({"name": "ZUS Tumbler"})).unwrap();
        assert_eq!(product.name, "ZUS Tumbler");
        assert!(product.price.is_empty());
    }
}
