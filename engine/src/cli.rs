//! CLI interface for Barista
//!
//! Command-line surface built with clap's derive API: an interactive chat
//! loop, single-shot questions, direct outlet catalogue searches and
//! diagnostics.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Barista conversational assistant
///
/// Plans each customer message with a language model, calls the product,
/// outlet and calculator services when needed, and remembers the conversation
/// per session.
#[derive(Parser, Debug)]
#[command(name = "barista")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive conversation
    Chat {
        /// Session identifier (a new one is generated if omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Your latitude, for nearest-outlet questions
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Your longitude, for nearest-outlet questions
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Ask a single question and print the reply
    Ask {
        /// The message to send
        message: String,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Search the local outlet catalogue
    Outlets {
        #[command(subcommand)]
        action: OutletAction,
    },

    /// Run system diagnostics
    Doctor,
}

/// Outlet catalogue actions
#[derive(Subcommand, Debug)]
pub enum OutletAction {
    /// Answer a natural-language question from the catalogue
    Query {
        /// The question, e.g. "outlets in Petaling Jaya open before 9am"
        text: String,
    },

    /// List the outlets closest to a coordinate
    Nearest {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Number of outlets to list (defaults to tools.nearest_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}
