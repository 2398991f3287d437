//! Planner
//!
//! Runs one conversational turn end to end:
//!
//! 1. Lock the session for the whole turn
//! 2. Classify the turn and attach the stored coordinate to location turns
//! 3. Ask the model for a decision and parse it
//! 4. Backfill coordinates, then answer, clarify or dispatch a tool
//! 5. Sanitize the reply and record the exchange
//!
//! Model failures abort the turn before anything is written to the session.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use super::decision::{Action, Decision, DecisionParser};
use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::prompt;
use super::synthesizer::ResponseSynthesizer;
use crate::config::Config;
use crate::guard::{InjectionScreen, ReplySanitizer, INJECTION_REMINDER};
use crate::llm::{LLMProvider, Message};
use crate::location::{Coordinate, LocationClassifier};
use crate::session::{history_window, SessionStore};
use crate::tools::{outlet_query, ToolRegistry};
use sdk::errors::EngineError;
use sdk::{Params, ToolFailure};

pub const RATE_LIMITED: &str =
    "I'm currently receiving too many requests. Please try again in a moment.";
pub const MODEL_TIMEOUT: &str =
    "Sorry, I'm taking longer than usual to respond. Please try again in a moment.";
pub const MODEL_UNAVAILABLE: &str =
    "Sorry, I'm having trouble reaching my assistant service right now. Please try again shortly.";
pub const DEFAULT_QUESTION: &str = "Could you provide more details?";
pub const DEFAULT_ANSWER: &str = "I'm here to help!";

/// Why a turn could not be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnFailure {
    RateLimited,
    ModelTimeout,
    ModelUnavailable,
}

/// Tool call made during a turn. A failed tool still gives a successful turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDiagnostic {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ToolFailure>,
}

/// Result of `Planner::execute`
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub success: bool,
    pub response: String,
    pub requires_input: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TurnFailure>,
}

impl TurnOutcome {
    fn failed(failure: TurnFailure, response: &str) -> Self {
        Self {
            success: false,
            response: response.to_string(),
            requires_input: false,
            decision: None,
            tool: None,
            failure: Some(failure),
        }
    }
}

/// Reply chosen for a decision, before sanitizing
struct Reply {
    text: String,
    requires_input: bool,
    tool: Option<ToolDiagnostic>,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            requires_input: false,
            tool: None,
        }
    }

    fn ask(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            requires_input: true,
            tool: None,
        }
    }
}

/// Turn-level orchestration over the model, the tools and session memory
pub struct Planner {
    provider: Arc<dyn LLMProvider>,
    parser: DecisionParser,
    dispatcher: Dispatcher,
    synthesizer: ResponseSynthesizer,
    sessions: Arc<SessionStore>,
    classifier: Arc<LocationClassifier>,
    injection: InjectionScreen,
    sanitizer: ReplySanitizer,
    system_prompt: String,
    location_request: String,
    llm_timeout: Duration,
    max_history_tokens: usize,
}

impl Planner {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        sessions: Arc<SessionStore>,
        classifier: Arc<LocationClassifier>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let brand = config.core.brand.clone();
        let llm_timeout = config.llm.timeout();

        Ok(Self {
            parser: DecisionParser::new(registry.names())?,
            system_prompt: prompt::system_prompt(&brand, &registry.catalogue()),
            synthesizer: ResponseSynthesizer::new(provider.clone(), brand.clone(), llm_timeout),
            dispatcher: Dispatcher::new(registry),
            provider,
            sessions,
            classifier,
            injection: InjectionScreen::new()?,
            sanitizer: ReplySanitizer::new()?,
            location_request: format!(
                "Sorry, I can't find the nearest {} outlets near you without your location. \
                 Perhaps try giving an area instead.",
                brand
            ),
            llm_timeout,
            max_history_tokens: config.memory.max_history_tokens,
        })
    }

    /// Run one turn for `session_id`. Never fails; problems become a
    /// structured outcome.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn execute(&self, session_id: &str, text: &str) -> TurnOutcome {
        let handle = self.sessions.get_or_create(session_id).await;
        let mut session = handle.lock().await;

        let location_turn = self.classifier.is_location_sensitive(text);
        let nearest_turn = self.classifier.is_nearest(text);
        let stored = session.context.user_location();
        info!(location_turn, nearest_turn, "Turn started");

        let mut model_text = text.to_string();
        if location_turn {
            if let Some(coordinate) = stored {
                model_text.push_str(&coordinate.hint_line());
            }
        }

        let mut messages = vec![Message::system(self.system_prompt.clone())];
        messages.extend_from_slice(history_window(&session.messages, self.max_history_tokens));
        if let Some(warning) = self.injection.scan(text) {
            debug!(pattern = %warning.matched_pattern, "adding injection reminder");
            messages.push(Message::system(prompt::injection_reminder(INJECTION_REMINDER)));
        }
        messages.push(Message::user(model_text));

        let raw = match timeout(self.llm_timeout, self.provider.generate(&messages)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return model_failure(e.into()),
            Err(_) => return model_failure(EngineError::LLMTimeout),
        };

        let mut decision = self.parser.parse(&raw);
        if decision.is_fallback() {
            warn!("Model reply ignored the decision format; using it as the answer");
        }
        debug!(action = %decision.action, tool = ?decision.tool, intent = %decision.intent, "parsed decision");

        // The stored coordinate is the only one an outlet lookup may use
        let is_outlet_query = decision.tool.as_deref() == Some(outlet_query::NAME);
        if is_outlet_query && location_turn {
            match stored {
                Some(coordinate) => insert_coordinate(&mut decision.params, coordinate),
                None if nearest_turn => remove_coordinate(&mut decision.params),
                None => {}
            }
        }
        if is_outlet_query && nearest_turn && stored.is_some() {
            decision
                .params
                .insert(outlet_query::NEAREST_PARAM.to_string(), Value::Bool(true));
        }

        let reply = match decision.action {
            Action::UseTool if is_outlet_query && nearest_turn && stored.is_none() => {
                info!("Nearest outlets requested without a location");
                Reply::ask(self.location_request.clone())
            }
            Action::UseTool => {
                let outcome = self.dispatcher.dispatch(&decision, &mut session.context).await;
                let requires_input = outcome.requires_input();
                match outcome {
                    DispatchOutcome::Unresolved { message }
                    | DispatchOutcome::UnknownTool { message, .. } => {
                        decision.action = Action::Answer;
                        decision.answer = message.clone();
                        Reply::say(message)
                    }
                    DispatchOutcome::Clarify { question } => Reply {
                        text: question,
                        requires_input,
                        tool: None,
                    },
                    DispatchOutcome::Executed { tool, result } => Reply {
                        text: self.synthesizer.render(&result).await,
                        requires_input,
                        tool: Some(ToolDiagnostic {
                            name: tool,
                            success: result.is_success(),
                            failure: result.failure().cloned(),
                        }),
                    },
                }
            }
            Action::AskUser if decision.missing_mentions_coordinates() => {
                Reply::ask(self.location_request.clone())
            }
            Action::AskUser => Reply::ask(or_default(&decision.question, DEFAULT_QUESTION)),
            Action::Answer => Reply::say(or_default(&decision.answer, DEFAULT_ANSWER)),
        };

        let response = self.sanitizer.sanitize(&reply.text);
        let response = if response.is_empty() {
            DEFAULT_ANSWER.to_string()
        } else {
            response
        };

        session.append(Message::user(text));
        session.append(Message::assistant(response.clone()));
        info!(
            requires_input = reply.requires_input,
            messages = session.messages.len(),
            "Turn complete"
        );

        TurnOutcome {
            success: true,
            response,
            requires_input: reply.requires_input,
            decision: Some(decision),
            tool: reply.tool,
            failure: None,
        }
    }

    /// The session's messages in chronological order
    pub async fn history(&self, session_id: &str) -> Vec<Message> {
        self.sessions.history(session_id).await
    }

    /// Forget the session's messages and context
    pub async fn clear(&self, session_id: &str) {
        self.sessions.clear(session_id).await;
    }

    /// Record the customer's GPS position for later location turns
    pub async fn set_location(&self, session_id: &str, coordinate: Coordinate) {
        let handle = self.sessions.get_or_create(session_id).await;
        handle.lock().await.context.set_user_location(coordinate);
        debug!(session_id, "stored user location");
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.dispatcher.registry().names()
    }
}

fn model_failure(err: EngineError) -> TurnOutcome {
    error!("Model call failed: {}", err);
    match err {
        EngineError::RateLimited => TurnOutcome::failed(TurnFailure::RateLimited, RATE_LIMITED),
        EngineError::LLMTimeout => TurnOutcome::failed(TurnFailure::ModelTimeout, MODEL_TIMEOUT),
        _ => TurnOutcome::failed(TurnFailure::ModelUnavailable, MODEL_UNAVAILABLE),
    }
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn insert_coordinate(params: &mut Params, coordinate: Coordinate) {
    params.insert("latitude".to_string(), Value::from(coordinate.latitude));
    params.insert("longitude".to_string(), Value::from(coordinate.longitude));
}

fn remove_coordinate(params: &mut Params) {
    for key in ["latitude", "longitude"] {
        if params.remove(key).is_some() {
            debug!(key, "dropping model-supplied coordinate");
        }
    }
}
