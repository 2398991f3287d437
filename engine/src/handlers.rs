//! Command handlers for CLI operations
//!
//! - chat: interactive conversation with slash commands
//! - ask: one turn, printed as text or JSON
//! - outlets query / nearest: guarded search over the local catalogue
//! - doctor: validate configuration and check collaborators

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::agent::{Planner, TurnOutcome};
use crate::config::Config;
use crate::llm::{build_provider, LLMProvider, MessageRole};
use crate::location::{Coordinate, LocationClassifier};
use crate::outlets::{LlmSqlCompiler, OutletSearch, OutletSearchReport, SqliteOutletStore};
use crate::session::SessionStore;
use crate::tools::ToolRegistry;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Slash commands understood by the chat loop
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    Clear,
    History,
    Location(Coordinate),
    Quit,
    Help,
    /// Anything else, sent to the planner as-is
    Say(String),
}

impl ChatCommand {
    /// Interpret one input line. `Err` carries a usage hint.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        match parts.next().unwrap_or_default().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "history" => Ok(Self::History),
            "quit" | "exit" => Ok(Self::Quit),
            "help" => Ok(Self::Help),
            "location" => {
                let lat = parts.next().and_then(|v| v.parse::<f64>().ok());
                let lon = parts.next().and_then(|v| v.parse::<f64>().ok());
                lat.zip(lon)
                    .and_then(|(lat, lon)| Coordinate::new(lat, lon))
                    .map(Self::Location)
                    .ok_or_else(|| "Usage: /location LAT LON (e.g. /location 3.139 101.6869)".to_string())
            }
            other => Err(format!("Unknown command '/{}'. Type /help for commands.", other)),
        }
    }
}

/// Wire the planner from configuration
pub fn build_planner(config: &Config) -> Result<Planner> {
    let provider = build_provider(&config.llm)?;
    let classifier = Arc::new(LocationClassifier::new()?);
    let registry = Arc::new(ToolRegistry::with_http_tools(&config.tools, classifier.clone())?);
    Planner::new(
        provider,
        registry,
        Arc::new(SessionStore::new()),
        classifier,
        config,
    )
}

fn coordinate_arg(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Coordinate>> {
    match lat.zip(lon) {
        Some((lat, lon)) => Coordinate::new(lat, lon)
            .map(Some)
            .with_context(|| format!("Invalid coordinate ({}, {})", lat, lon)),
        None => Ok(None),
    }
}

fn print_turn(outcome: &TurnOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", outcome.response),
        OutputFormat::Json => println!("{}", serde_json::to_string(outcome)?),
    }
    Ok(())
}

/// Send one message and print the reply
pub async fn handle_ask(
    message: String,
    lat: Option<f64>,
    lon: Option<f64>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let planner = build_planner(config)?;
    let session_id = Uuid::new_v4().to_string();

    if let Some(coordinate) = coordinate_arg(lat, lon)? {
        planner.set_location(&session_id, coordinate).await;
    }

    let outcome = planner.execute(&session_id, &message).await;
    match format {
        OutputFormat::Text => println!("{}", outcome.response),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}

/// Interactive conversation on stdin/stdout
pub async fn handle_chat(
    session: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let planner = build_planner(config)?;
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Some(coordinate) = coordinate_arg(lat, lon)? {
        planner.set_location(&session_id, coordinate).await;
    }

    if format == OutputFormat::Text {
        println!("{} assistant (session {})", config.core.brand, session_id);
        println!("Type /help for commands, /quit to leave.");
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if format == OutputFormat::Text {
            print!("you> ");
            std::io::stdout().flush().ok();
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match ChatCommand::parse(&line) {
            Ok(ChatCommand::Quit) => break,
            Ok(ChatCommand::Help) => {
                println!("/clear              forget this conversation");
                println!("/history            show the conversation so far");
                println!("/location LAT LON   share your position for nearest-outlet questions");
                println!("/quit               leave");
            }
            Ok(ChatCommand::Clear) => {
                planner.clear(&session_id).await;
                println!("Conversation cleared.");
            }
            Ok(ChatCommand::History) => {
                let history = planner.history(&session_id).await;
                match format {
                    OutputFormat::Text if history.is_empty() => println!("No messages yet."),
                    OutputFormat::Text => {
                        for message in &history {
                            let who = match message.role {
                                MessageRole::User => "you",
                                _ => "barista",
                            };
                            println!("{}> {}", who, message.content);
                        }
                    }
                    OutputFormat::Json => println!("{}", serde_json::to_string(&history)?),
                }
            }
            Ok(ChatCommand::Location(coordinate)) => {
                planner.set_location(&session_id, coordinate).await;
                println!(
                    "Location saved ({}, {}).",
                    coordinate.latitude, coordinate.longitude
                );
            }
            Ok(ChatCommand::Say(text)) => {
                let outcome = planner.execute(&session_id, &text).await;
                if format == OutputFormat::Text {
                    print!("barista> ");
                }
                print_turn(&outcome, format)?;
            }
            Err(hint) => println!("{}", hint),
        }
    }

    Ok(())
}

async fn open_outlet_search(config: &Config) -> Result<OutletSearch> {
    let store = Arc::new(SqliteOutletStore::open(&config.outlets.database_path).await?);
    let provider: Arc<dyn LLMProvider> = build_provider(&config.llm)?;
    let compiler = Arc::new(LlmSqlCompiler::new(provider, config.llm.timeout()));
    OutletSearch::new(compiler, store)
}

fn print_report(report: &OutletSearchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            if !report.success {
                println!(
                    "✗ {}",
                    report.error.as_deref().unwrap_or("Outlet search failed")
                );
                return Ok(());
            }
            if report.results.is_empty() {
                println!("No outlets found.");
                return Ok(());
            }
            println!("Found {} outlet(s):", report.count);
            println!();
            for (i, row) in report.results.iter().enumerate() {
                println!("{}. {}", i + 1, text_field(row, "name").unwrap_or("Unknown outlet"));
                if let Some(km) = row.get("distance_km").and_then(Value::as_f64) {
                    println!("   Distance: {} km", km);
                }
                for (label, key) in [
                    ("Address", "address"),
                    ("Phone", "phone"),
                    ("Hours", "operating_hours"),
                ] {
                    if let Some(value) = text_field(row, key) {
                        println!("   {}: {}", label, value);
                    }
                }
            }
        }
    }
    Ok(())
}

fn text_field<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    row.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Natural-language search over the local catalogue
pub async fn handle_outlets_query(text: String, config: &Config, format: OutputFormat) -> Result<()> {
    let search = open_outlet_search(config).await?;
    let report = search.query(&text).await;
    print_report(&report, format)
}

/// Closest outlets to a coordinate
pub async fn handle_outlets_nearest(
    lat: f64,
    lon: f64,
    limit: Option<usize>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let origin = Coordinate::new(lat, lon)
        .with_context(|| format!("Invalid coordinate ({}, {})", lat, lon))?;
    let limit = limit.unwrap_or(config.tools.nearest_limit as usize).max(1);

    let search = open_outlet_search(config).await?;
    let report = search.nearest(origin, limit).await;
    print_report(&report, format)
}

/// Validate configuration and check that collaborators respond
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    // Config is validated when loaded
    checks.push(("Configuration".into(), "Valid".into()));

    if config.core.data_dir.exists() {
        checks.push(("Data directory".into(), "Exists".into()));
    } else {
        checks.push(("Data directory".into(), "Missing".into()));
        issues.push(format!(
            "Data directory does not exist: {}",
            config.core.data_dir.display()
        ));
    }

    match build_provider(&config.llm) {
        Ok(provider) => {
            let label = format!("Model ({})", provider.name());
            if provider.check_health().await {
                checks.push((label, "Available".into()));
            } else {
                checks.push((label, "Not available".into()));
                issues.push(match config.llm.default_provider.as_str() {
                    "openai" => format!(
                        "OpenAI key missing. Set {} in the environment.",
                        config.llm.openai.api_key_env
                    ),
                    _ => format!("Ollama is not reachable at {}", config.llm.ollama.base_url),
                });
            }
        }
        Err(e) => {
            checks.push(("Model".into(), "Misconfigured".into()));
            issues.push(format!("Cannot build model provider: {}", e));
        }
    }

    match SqliteOutletStore::open(&config.outlets.database_path).await {
        Ok(store) => {
            match store.count().await {
                Ok(0) => {
                    checks.push(("Outlet catalogue".into(), "Empty".into()));
                    issues.push("The local outlet catalogue has no outlets yet.".to_string());
                }
                Ok(n) => checks.push(("Outlet catalogue".into(), format!("{} outlets", n))),
                Err(e) => {
                    checks.push(("Outlet catalogue".into(), "Unreadable".into()));
                    issues.push(format!("Cannot read outlet catalogue: {}", e));
                }
            }
            store.close().await;
        }
        Err(e) => {
            checks.push(("Outlet catalogue".into(), "Failed".into()));
            issues.push(format!("Cannot open outlet catalogue: {}", e));
        }
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()?;
    match client.get(&config.tools.base_url).send().await {
        Ok(_) => checks.push(("Tool services".into(), "Reachable".into())),
        Err(_) => {
            checks.push(("Tool services".into(), "Unreachable".into()));
            issues.push(format!(
                "Tool services are not reachable at {}",
                config.tools.base_url
            ));
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Barista System Diagnostics");
            println!("==========================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
