//! Natural-language to SQL compilation for the outlet catalogue

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::llm::{LLMProvider, Message};
use sdk::errors::EngineError;

/// Column reference handed to the model
pub const OUTLET_SCHEMA: &str = "\
Table: outlets
Columns:
- id (INTEGER): primary key
- name (TEXT): outlet name, e.g. 'ZUS Coffee - SS 2'
- address (TEXT): full street address
- city (TEXT): city, e.g. 'Petaling Jaya', 'Kuala Lumpur'
- state (TEXT): state, e.g. 'Selangor', 'Wilayah Persekutuan'
- postcode (TEXT): five digit postcode
- latitude (REAL): GPS latitude
- longitude (REAL): GPS longitude
- phone (TEXT): local phone number, e.g. '03-1234 5678'
- phone_international (TEXT): international format, e.g. '+60 3-1234 5678'
- operating_hours (TEXT): human readable opening hours
- open_time (TEXT): opening time as HH:MM:SS
- close_time (TEXT): closing time as HH:MM:SS
- business_status (TEXT): e.g. 'OPERATIONAL', 'CLOSED_TEMPORARILY'";

const SQL_SYSTEM_PROMPT: &str = "You are a SQL expert. Generate only SELECT queries for SQLite. \
Reply with the SQL statement alone, no explanation and no markdown.";

/// Turns an outlet request into a single SQL statement
#[async_trait]
pub trait SqlCompiler: Send + Sync {
    async fn compile(&self, request: &str) -> Result<String, EngineError>;
}

/// Compiler that asks the configured model to write the query
pub struct LlmSqlCompiler {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl LlmSqlCompiler {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    fn prompt(request: &str) -> String {
        format!(
            "{schema}

Write a SQLite query answering the request below.
Rules:
1. Only SELECT statements. Never modify data.
2. Match text with LOWER(column) LIKE '%term%'.
3. For a place name search name, address, city and state combined with OR.
4. Compare open_time and close_time as 'HH:MM:SS' strings.
5. Phone numbers may be stored with spaces or dashes; search phone and phone_international.
6. Add LIMIT 3 unless the request asks for a count or a complete list.

Request: {request}

SQL:",
            schema = OUTLET_SCHEMA,
            request = request.trim()
        )
    }
}

#[async_trait]
impl SqlCompiler for LlmSqlCompiler {
    async fn compile(&self, request: &str) -> Result<String, EngineError> {
        let messages = [
            Message::system(SQL_SYSTEM_PROMPT),
            Message::user(Self::prompt(request)),
        ];

        let raw = tokio::time::timeout(self.timeout, self.provider.generate(&messages))
            .await
            .map_err(|_| EngineError::LLMTimeout)??;

        let sql = strip_code_fence(&raw);
        debug!(sql = %sql, "Compiled outlet request");
        Ok(sql)
    }
}

/// Remove a surrounding markdown fence and any `SQL:` label
pub fn strip_code_fence(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    if let Some(label) = text.get(..4) {
        if label.eq_ignore_ascii_case("SQL:") {
            text = text[4..].trim();
        }
    }

    text.to_string()
}
