//! Decision protocol
//!
//! The planner asks the model for eight labeled lines:
//!
//! ```text
//! INTENT: ...
//! MISSING: ... | none
//! ACTION: use_tool | ask_user | answer
//! TOOL: <tool name> | none
//! PARAMS: {"json": "object"} | none
//! QUESTION: ...
//! ANSWER: ...
//! REASONING: ...
//! ```
//!
//! Model output is unreliable, so `DecisionParser::parse` never fails. Text
//! that does not open with the INTENT marker becomes a plain answer, each
//! field is extracted independently, and unusable PARAMS degrade to an
//! empty map.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use sdk::Params;

/// Sentinel the model writes when nothing is missing
pub const NONE_SENTINEL: &str = "none";

/// Characters stripped from the start of a field value
const LEADING_DECORATION: &[char] = &['*', '#', '>', '[', ']', '`', '"', '\'', '_', '~', '•'];

/// Characters stripped from the end of a field value
const TRAILING_DECORATION: &[char] = &['*', '[', ']', '`', '"', '\'', '_', '~'];

/// What the planner should do with a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    UseTool,
    AskUser,
    Answer,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::UseTool => "use_tool",
            Action::AskUser => "ask_user",
            Action::Answer => "answer",
        }
    }

    /// Parse an ACTION value, tolerating case, spaces or dashes and trailing prose
    /// such as `use_tool (calculator)`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");

        [Action::UseTool, Action::AskUser, Action::Answer]
            .into_iter()
            .find(|action| {
                normalized
                    .strip_prefix(action.as_str())
                    .map(|rest| !rest.starts_with(|c: char| c.is_ascii_alphanumeric()))
                    .unwrap_or(false)
            })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a decision was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOrigin {
    /// Parsed from the labeled-line protocol
    Protocol,
    /// The model ignored the protocol; the whole text became the answer
    Fallback,
}

/// Structured decision for one turn. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub intent: String,
    pub missing: String,
    pub action: Action,
    pub tool: Option<String>,
    pub params: Params,
    pub question: String,
    pub answer: String,
    pub reasoning: String,
    #[serde(skip)]
    pub origin: DecisionOrigin,
}

impl Decision {
    /// Decision for text that did not follow the protocol
    pub fn fallback(raw: &str) -> Self {
        Self {
            intent: "unstructured response".to_string(),
            missing: NONE_SENTINEL.to_string(),
            action: Action::Answer,
            tool: None,
            params: Params::new(),
            question: String::new(),
            answer: raw.trim().to_string(),
            reasoning: "fallback parsing due to format violation".to_string(),
            origin: DecisionOrigin::Fallback,
        }
    }

    /// A plain answer, used when the planner overrides a decision
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            intent: String::new(),
            missing: NONE_SENTINEL.to_string(),
            action: Action::Answer,
            tool: None,
            params: Params::new(),
            question: String::new(),
            answer: text.into(),
            reasoning: String::new(),
            origin: DecisionOrigin::Protocol,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == DecisionOrigin::Fallback
    }

    /// Whether the model reported missing information
    pub fn has_missing(&self) -> bool {
        let missing = self.missing.trim();
        !missing.is_empty() && !missing.eq_ignore_ascii_case(NONE_SENTINEL)
    }

    /// Whether the missing information is the user's coordinates
    pub fn missing_mentions_coordinates(&self) -> bool {
        let missing = self.missing.to_ascii_lowercase();
        missing.contains("latitude") || missing.contains("longitude")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Intent,
    Missing,
    Action,
    Tool,
    Params,
    Question,
    Answer,
    Reasoning,
}

impl Field {
    const ALL: [Field; 8] = [
        Field::Intent,
        Field::Missing,
        Field::Action,
        Field::Tool,
        Field::Params,
        Field::Question,
        Field::Answer,
        Field::Reasoning,
    ];

    fn label(self) -> &'static str {
        match self {
            Field::Intent => "INTENT",
            Field::Missing => "MISSING",
            Field::Action => "ACTION",
            Field::Tool => "TOOL",
            Field::Params => "PARAMS",
            Field::Question => "QUESTION",
            Field::Answer => "ANSWER",
            Field::Reasoning => "REASONING",
        }
    }
}

/// Raw field values before interpretation
#[derive(Debug, Default)]
struct RawFields {
    intent: String,
    missing: String,
    action: String,
    tool: String,
    params: String,
    question: String,
    answer: String,
    reasoning: String,
}

impl RawFields {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Intent => &mut self.intent,
            Field::Missing => &mut self.missing,
            Field::Action => &mut self.action,
            Field::Tool => &mut self.tool,
            Field::Params => &mut self.params,
            Field::Question => &mut self.question,
            Field::Answer => &mut self.answer,
            Field::Reasoning => &mut self.reasoning,
        }
    }
}

/// Parser for the decision protocol
#[derive(Debug, Clone)]
pub struct DecisionParser {
    marker: Regex,
    fields: Vec<(Field, Regex)>,
    tool_names: HashSet<String>,
}

impl DecisionParser {
    /// Create a parser that knows the registered tool names
    pub fn new<I, S>(tool_names: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let marker = Regex::new(r"(?i)\A[\s>*_#]*INTENT[ \t*_]*:")?;

        let fields = Field::ALL
            .iter()
            .map(|&field| {
                let pattern = format!(
                    r"(?im)^[ \t>*_#•\-]*{}[ \t*_]*:[ \t]*(.*)$",
                    field.label()
                );
                Ok((field, Regex::new(&pattern)?))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            marker,
            fields,
            tool_names: tool_names
                .into_iter()
                .map(|n| n.into().to_ascii_lowercase())
                .collect(),
        })
    }

    /// Whether the text opens with the INTENT marker
    pub fn follows_protocol(&self, raw: &str) -> bool {
        self.marker.is_match(raw)
    }

    /// Parse raw model output into a decision. Never fails.
    pub fn parse(&self, raw: &str) -> Decision {
        if !self.follows_protocol(raw) {
            return Decision::fallback(raw);
        }

        let mut fields = RawFields::default();
        for (field, regex) in &self.fields {
            if let Some(value) = regex.captures(raw).and_then(|c| c.get(1)) {
                *fields.slot(*field) = trim_decorations(value.as_str()).to_string();
            }
        }

        // Tool names end in a letter or digit; anything after is punctuation
        let tool_field = fields.tool.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
        let mut tool = none_to_option(tool_field).map(|t| t.to_ascii_lowercase());
        let action = match Action::parse(&fields.action) {
            Some(action) => action,
            None => {
                let candidate = fields.action.trim().to_ascii_lowercase();
                if candidate != Action::AskUser.as_str() && self.tool_names.contains(&candidate) {
                    // The model wrote the tool name where the action belongs
                    tool.get_or_insert(candidate);
                    Action::UseTool
                } else {
                    Action::Answer
                }
            }
        };

        Decision {
            intent: fields.intent,
            missing: fields.missing,
            action,
            tool,
            params: parse_params(&fields.params),
            question: none_to_empty(fields.question),
            answer: none_to_empty(fields.answer),
            reasoning: fields.reasoning,
            origin: DecisionOrigin::Protocol,
        }
    }
}

/// Strip markdown bullets, emphasis and brackets around a value while keeping
/// interior punctuation and closing `?`, `.` or `!`.
pub fn trim_decorations(value: &str) -> &str {
    let mut current = value.trim();
    loop {
        let before = current.len();

        current = current
            .trim_start_matches(|c: char| LEADING_DECORATION.contains(&c))
            .trim_start();
        if let Some(rest) = current.strip_prefix("- ") {
            current = rest.trim_start();
        }
        current = current
            .trim_end_matches(|c: char| TRAILING_DECORATION.contains(&c))
            .trim_end();

        if current.len() == before {
            return current;
        }
    }
}

/// Decode PARAMS: a JSON object, or an empty map for `none` or anything unusable
fn parse_params(raw: &str) -> Params {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(NONE_SENTINEL) {
        return Params::new();
    }

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => Params::new(),
    }
}

fn none_to_option(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty() && !value.eq_ignore_ascii_case(NONE_SENTINEL)).then(|| value.to_string())
}

fn none_to_empty(value: String) -> String {
    none_to_option(&value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> DecisionParser {
        DecisionParser::new(["calculator", "product_search", "outlet_query"]).unwrap()
    }

    const WELL_FORMED: &str = "INTENT: calculate a tip\n\
        MISSING: none\n\
        ACTION: use_tool\n\
        TOOL: calculator\n\
        PARAMS: {\"expression\": \"100 * 0.15\"}\n\
        QUESTION: none\n\
        ANSWER: none\n\
        REASONING: user asked for 15% of 100";

    #[test]
    fn test_well_formed_decision() {
        let decision = parser().parse(WELL_FORMED);

        assert_eq!(decision.intent, "calculate a tip");
        assert_eq!(decision.missing, "none");
        assert!(!decision.has_missing());
        assert_eq!(decision.action, Action::UseTool);
        assert_eq!(decision.tool.as_deref(), Some("calculator"));
        assert_eq!(decision.params.get("expression"), Some(&json!("100 * 0.15")));
        assert_eq!(decision.question, "");
        assert_eq!(decision.answer, "");
        assert_eq!(decision.reasoning, "user asked for 15% of 100");
        assert!(!decision.is_fallback());
    }

    #[test]
    fn test_fallback_for_free_text() {
        let decision = parser().parse("  Hello! How can I help you today?  \n");

        assert_eq!(decision.action, Action::Answer);
        assert_eq!(decision.answer, "Hello! How can I help you today?");
        assert_eq!(decision.missing, "none");
        assert!(decision.is_fallback());
    }

    #[test]
    fn test_missing_fields_keep_defaults() {
        let decision = parser().parse("INTENT: greet\nACTION: answer\nANSWER: Hi there!");

        assert_eq!(decision.intent, "greet");
        assert_eq!(decision.answer, "Hi there!");
        assert_eq!(decision.missing, "");
        assert_eq!(decision.reasoning, "");
        assert!(decision.tool.is_none());
        assert!(decision.params.is_empty());
    }

    #[test]
    fn test_markdown_decoration_is_trimmed() {
        let text = "**INTENT:** find mugs\n\
            - **ACTION**: use_tool\n\
            * TOOL: `product_search`\n\
            PARAMS: `{\"query\": \"mugs\"}`\n\
            ANSWER: [Would you like a tumbler?]";
        let decision = parser().parse(text);

        assert_eq!(decision.intent, "find mugs");
        assert_eq!(decision.action, Action::UseTool);
        assert_eq!(decision.tool.as_deref(), Some("product_search"));
        assert_eq!(decision.params.get("query"), Some(&json!("mugs")));
        assert_eq!(decision.answer, "Would you like a tumbler?");
    }

    #[test]
    fn test_interior_punctuation_is_preserved() {
        let decision =
            parser().parse("INTENT: x\nACTION: answer\nANSWER: We're open 8AM-10PM, daily!");
        assert_eq!(decision.answer, "We're open 8AM-10PM, daily!");
    }

    #[test]
    fn test_malformed_params_become_empty() {
        for params in ["{query: mugs}", "[1, 2]", "\"mugs\"", "none", "{\"a\": 1"] {
            let text = format!("INTENT: x\nACTION: use_tool\nTOOL: calculator\nPARAMS: {}", params);
            let decision = parser().parse(&text);
            assert!(decision.params.is_empty(), "params {:?}", params);
            assert_eq!(decision.action, Action::UseTool);
        }
    }

    #[test]
    fn test_tool_name_in_action_is_repaired() {
        let text = "INTENT: math\nMISSING: none\nACTION: calculator\nTOOL: none\nPARAMS: {\"expression\": \"2+2\"}";
        let decision = parser().parse(text);

        assert_eq!(decision.action, Action::UseTool);
        assert_eq!(decision.tool.as_deref(), Some("calculator"));
    }

    #[test]
    fn test_repair_keeps_explicit_tool() {
        let text = "INTENT: x\nACTION: outlet_query\nTOOL: outlet_query";
        let decision = parser().parse(text);
        assert_eq!(decision.action, Action::UseTool);
        assert_eq!(decision.tool.as_deref(), Some("outlet_query"));
    }

    #[test]
    fn test_trailing_punctuation_on_tool_is_dropped() {
        for tool in ["calculator.", "calculator:", "Calculator;", "calculator ."] {
            let text = format!("INTENT: x\nACTION: use_tool\nTOOL: {}", tool);
            let decision = parser().parse(&text);
            assert_eq!(decision.tool.as_deref(), Some("calculator"), "tool {:?}", tool);
        }

        let decision = parser().parse("INTENT: x\nACTION: answer\nTOOL: none.");
        assert!(decision.tool.is_none());
    }

    #[test]
    fn test_trailing_punctuation_kept_elsewhere() {
        let decision = parser().parse("INTENT: x\nACTION: ask_user\nQUESTION: Which area:");
        assert_eq!(decision.question, "Which area:");
    }

    #[test]
    fn test_unknown_action_becomes_answer() {
        let decision = parser().parse("INTENT: x\nACTION: dance\nANSWER: ok");
        assert_eq!(decision.action, Action::Answer);
        assert_eq!(decision.answer, "ok");
    }

    #[test]
    fn test_action_parse_variants() {
        assert_eq!(Action::parse("USE_TOOL"), Some(Action::UseTool));
        assert_eq!(Action::parse("use tool"), Some(Action::UseTool));
        assert_eq!(Action::parse("ask-user"), Some(Action::AskUser));
        assert_eq!(Action::parse("answer (greeting)"), Some(Action::Answer));
        assert_eq!(Action::parse("answers"), None);
        assert_eq!(Action::parse(""), None);
    }

    #[test]
    fn test_empty_value_does_not_swallow_next_line() {
        let decision = parser().parse("INTENT: x\nANSWER:\nREASONING: nothing to say");
        assert_eq!(decision.answer, "");
        assert_eq!(decision.reasoning, "nothing to say");
    }

    #[test]
    fn test_missing_mentions_coordinates() {
        let decision = parser().parse("INTENT: nearest\nMISSING: user latitude and longitude\nACTION: ask_user");
        assert!(decision.has_missing());
        assert!(decision.missing_mentions_coordinates());
        assert_eq!(decision.action, Action::AskUser);
    }

    #[test]
    fn test_trim_decorations() {
        assert_eq!(trim_decorations("  **bold**  "), "bold");
        assert_eq!(trim_decorations("- item"), "item");
        assert_eq!(trim_decorations("-5 degrees"), "-5 degrees");
        assert_eq!(trim_decorations("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(trim_decorations("Really?"), "Really?");
        assert_eq!(trim_decorations("***"), "");
    }
}
