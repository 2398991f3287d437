//! Outlet Catalogue
//!
//! Local outlet search in two shapes: free-text requests compiled to SQL
//! behind the safety guard, and distance ranking from a coordinate. Results
//! carry rows only, never the statement that produced them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::guard::SqlGuard;
use crate::location::{rank_nearest, Coordinate};

pub mod compiler;
pub mod store;

pub use compiler::{strip_code_fence, LlmSqlCompiler, SqlCompiler, OUTLET_SCHEMA};
pub use store::{Outlet, SqlExecutor, SqliteOutletStore, LOCATED_OUTLETS_SQL};

/// Rows returned by an outlet search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutletSearchReport {
    pub success: bool,
    pub results: Vec<Map<String, Value>>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_location: Option<Coordinate>,
}

impl OutletSearchReport {
    fn rows(results: Vec<Map<String, Value>>) -> Self {
        Self {
            success: true,
            count: results.len(),
            results,
            ..Default::default()
        }
    }

    fn refused(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Guarded search over the outlet catalogue
pub struct OutletSearch {
    guard: SqlGuard,
    compiler: Arc<dyn SqlCompiler>,
    executor: Arc<dyn SqlExecutor>,
}

impl OutletSearch {
    pub fn new(
        compiler: Arc<dyn SqlCompiler>,
        executor: Arc<dyn SqlExecutor>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            guard: SqlGuard::new()?,
            compiler,
            executor,
        })
    }

    /// Answer a natural-language request from the catalogue.
    ///
    /// The request is screened before compilation and the compiled statement
    /// is screened again before it runs.
    pub async fn query(&self, request: &str) -> OutletSearchReport {
        if let Err(violation) = self.guard.check_request(request) {
            return OutletSearchReport::refused(format!(
                "Only read-only outlet searches are supported ({})",
                violation
            ));
        }

        let compiled = match self.compiler.compile(request).await {
            Ok(sql) => sql,
            Err(e) => {
                warn!("Outlet query compilation failed: {}", e);
                return OutletSearchReport::refused("Could not understand the outlet request");
            }
        };

        let statement = match self.guard.check_statement(&compiled) {
            Ok(statement) => statement,
            Err(violation) => {
                warn!(%violation, "Rejected compiled outlet statement");
                return OutletSearchReport::refused("Only read-only outlet searches are supported");
            }
        };

        debug!(sql = %statement, "Running outlet statement");
        match self.executor.fetch(statement).await {
            Ok(rows) => {
                info!(count = rows.len(), "Outlet query answered");
                OutletSearchReport::rows(rows)
            }
            Err(e) => {
                warn!("Outlet statement failed: {}", e);
                OutletSearchReport::refused("The outlet catalogue could not answer that request")
            }
        }
    }

    /// The `limit` closest outlets to `origin`, each annotated with `distance_km`
    pub async fn nearest(&self, origin: Coordinate, limit: usize) -> OutletSearchReport {
        let rows = match self.executor.fetch(LOCATED_OUTLETS_SQL).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Loading located outlets failed: {}", e);
                let mut report = OutletSearchReport::refused("Could not load outlet locations");
                report.user_location = Some(origin);
                return report;
            }
        };

        let located: Vec<(Map<String, Value>, Coordinate)> = rows
            .into_iter()
            .filter_map(|row| {
                let at = row_coordinate(&row)?;
                Some((row, at))
            })
            .collect();

        let results: Vec<Map<String, Value>> = rank_nearest(origin, located, limit)
            .into_iter()
            .map(|(mut row, km)| {
                row.insert("distance_km".to_string(), Value::from(km));
                row
            })
            .collect();

        let mut report = OutletSearchReport::rows(results);
        report.user_location = Some(origin);
        report
    }
}

fn row_coordinate(row: &Map<String, Value>) -> Option<Coordinate> {
    let latitude = row.get("latitude")?.as_f64()?;
    let longitude = row.get("longitude")?.as_f64()?;
    Coordinate::new(latitude, longitude)
}
