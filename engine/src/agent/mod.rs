//! Conversation agent
//!
//! One turn flows planner → decision parser → dispatcher → synthesizer. The
//! planner owns the turn; the other parts are pure steps it composes.

pub mod decision;
pub mod dispatcher;
pub mod planner;
pub mod prompt;
pub mod synthesizer;

pub use decision::{Action, Decision, DecisionOrigin, DecisionParser};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use planner::{Planner, ToolDiagnostic, TurnFailure, TurnOutcome};
pub use synthesizer::ResponseSynthesizer;
