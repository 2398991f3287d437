//! Outlet query adapter
//!
//! Two collaborator endpoints:
//! - `POST {base}/outlets/nearest {latitude, longitude, limit}` for distance-ranked search
//! - `GET {base}/outlets/?query=..` for natural-language search (text-to-SQL)
//!
//! A call goes to the nearest endpoint when a coordinate is present and the
//! turn or the query asks for the nearest outlets, or only coordinates are given.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{http, Tool, ToolPayload, ToolResult};
use crate::config::ToolsConfig;
use crate::location::{Coordinate, LocationClassifier};
use crate::session::CURRENT_OUTLET_KEY;
use sdk::{ToolFailure, ToolInput};

/// Registry name of the outlet tool
pub const NAME: &str = "outlet_query";

/// Param the planner sets when the customer's turn asked for the nearest outlets
pub const NEAREST_PARAM: &str = "nearest";

const DESCRIPTION: &str = "Query outlets using natural language. Use this when users ask about:
  * Outlet locations (by city, state, area, or landmark)
  * Opening/closing hours or operating schedules
  * Contact information (phone numbers)
  * Addresses and directions
  * NEAREST or CLOSEST outlets to the user (pass the latitude and longitude provided)
  Parameters: \"query\" (the user's question), optional \"location\", \"latitude\", \"longitude\".
  Examples: 'outlets in KL', 'outlets near Sunway', 'outlets open at 8am', 'nearest outlets'";

/// Common Malaysian place abbreviations
const SHORT_FORMS: &[(&str, &str)] = &[
    ("kl", "kuala lumpur"),
    ("pj", "petaling jaya"),
    ("jb", "johor bahru"),
    ("kk", "kota kinabalu"),
    ("pg", "penang"),
    ("kt", "kuala terengganu"),
    ("ip", "ipoh"),
];

#[derive(Debug, Deserialize)]
struct OutletResponse {
    success: bool,
    #[serde(default)]
    results: Vec<Map<String, Value>>,
    count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

/// Which endpoint served a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Nearest,
    Search,
}

pub struct OutletQueryTool {
    client: Client,
    search_url: String,
    nearest_url: String,
    nearest_limit: u64,
    classifier: Arc<LocationClassifier>,
    short_forms: Vec<(Regex, &'static str)>,
}

impl OutletQueryTool {
    pub fn new(config: &ToolsConfig, classifier: Arc<LocationClassifier>) -> anyhow::Result<Self> {
        let short_forms = SHORT_FORMS
            .iter()
            .map(|(short, full)| Ok((Regex::new(&format!(r"(?i)\b{}\b", short))?, *full)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            client: http::client(Duration::from_secs(config.outlet_timeout_secs))?,
            search_url: http::endpoint(&config.base_url, "outlets/"),
            nearest_url: http::endpoint(&config.base_url, "outlets/nearest"),
            nearest_limit: config.nearest_limit,
            classifier,
            short_forms,
        })
    }

    /// Lower-case the query and expand place abbreviations
    pub fn normalize_query(&self, text: &str) -> String {
        self.short_forms
            .iter()
            .fold(text.to_lowercase(), |acc, (pattern, full)| {
                pattern.replace_all(&acc, *full).into_owned()
            })
    }

    /// Build the natural-language search text from query and location
    fn search_text(query: Option<String>, location: Option<String>) -> String {
        match (query, location) {
            (Some(query), Some(location)) => format!("{} in {}", query, location),
            (Some(query), None) => query,
            (None, Some(location)) => format!("outlets in {}", location),
            (None, None) => "show all outlets".to_string(),
        }
    }

    fn apology(failure: &ToolFailure, mode: Mode) -> &'static str {
        match (failure, mode) {
            (ToolFailure::Timeout, _) => "The request timed out. Please try again later.",
            (ToolFailure::Connection, _) => "Could not connect to the outlet service. Try again later.",
            (ToolFailure::Http { .. }, _) => {
                "I couldn't process your request right now, please try again later."
            }
            (ToolFailure::Backend, Mode::Nearest) => "Could not find nearest outlets.",
            (ToolFailure::Backend, Mode::Search) | (ToolFailure::InvalidParams { .. }, _) => {
                "Sorry, I couldn't retrieve the information. Could you be more specific?"
            }
            (ToolFailure::Unexpected { .. }, _) => {
                "Unexpected error occurred while searching for your request, please try again later."
            }
        }
    }

    fn fail(failure: ToolFailure, mode: Mode) -> ToolResult {
        let message = Self::apology(&failure, mode);
        ToolResult::failed(failure, message)
    }

    fn finish(response: OutletResponse, mode: Mode) -> ToolResult {
        if !response.success {
            // The backend's error text may carry generated SQL; it stays in the logs.
            warn!(
                error = response.error.as_deref().unwrap_or("unknown"),
                "outlet service reported failure"
            );
            return Self::fail(ToolFailure::Backend, mode);
        }

        let count = response.count.unwrap_or(response.results.len() as u64);
        let message = match (mode, count) {
            (Mode::Nearest, 0) => "No outlets found nearby.".to_string(),
            (Mode::Nearest, n) => format!("Found {} nearest outlet(s)", n),
            (Mode::Search, 0) => "No outlets were found matching your description.".to_string(),
            (Mode::Search, n) => format!("Found {} outlet(s)", n),
        };

        ToolResult::ok(
            ToolPayload::Outlets {
                rows: response.results,
                count,
                nearest: mode == Mode::Nearest,
            },
            message,
        )
    }
}

#[async_trait]
impl Tool for OutletQueryTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn execute(&self, input: &ToolInput) -> ToolResult {
        let query = input.param_str_opt("query");
        let location = input.param_str_opt("location");
        let coordinate = match (input.param_f64_opt("latitude"), input.param_f64_opt("longitude")) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon),
            _ => None,
        };

        let flagged = input
            .params
            .get(NEAREST_PARAM)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let wants_nearest = flagged
            || match &query {
                Some(query) => self.classifier.is_nearest(query),
                None => location.is_none() && coordinate.is_some(),
            };

        if let (true, Some(coordinate)) = (wants_nearest, coordinate) {
            debug!("outlet query routed to nearest search");
            let body = json!({
                "latitude": coordinate.latitude,
                "longitude": coordinate.longitude,
                "limit": self.nearest_limit,
            });
            return match http::post_json::<_, OutletResponse>(&self.client, &self.nearest_url, &body).await {
                Ok(response) => Self::finish(response, Mode::Nearest),
                Err(failure) => Self::fail(failure, Mode::Nearest),
            };
        }

        let text = self.normalize_query(Self::search_text(query, location).trim());
        let params = [("query", text)];
        match http::get_json::<OutletResponse>(&self.client, &self.search_url, &params).await {
            Ok(response) => Self::finish(response, Mode::Search),
            Err(failure) => Self::fail(failure, Mode::Search),
        }
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
