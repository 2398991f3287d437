use regex::Regex;
use sdk::errors::EngineError;
use tracing::warn;

/// Verbs that mark a natural-language request as destructive
pub const DESTRUCTIVE_REQUEST_WORDS: &[&str] =
    &["delete", "drop", "update", "insert", "alter", "truncate"];

/// Keywords that may not appear anywhere in an executed statement
pub const FORBIDDEN_SQL_KEYWORDS: &[&str] = &[
    "drop", "delete", "update", "insert", "alter", "create", "truncate", "replace", "exec",
    "execute", "attach", "detach", "pragma",
];

/// Why the guard refused a request or statement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardViolation {
    #[error("request mentions destructive operation '{0}'")]
    DestructiveRequest(String),

    #[error("statement is empty")]
    EmptyStatement,

    #[error("statement does not start with SELECT")]
    NotSelect,

    #[error("statement contains forbidden keyword '{0}'")]
    ForbiddenKeyword(String),

    #[error("statement contains more than one command")]
    StackedStatements,
}

impl From<GuardViolation> for EngineError {
    fn from(violation: GuardViolation) -> Self {
        match violation {
            GuardViolation::DestructiveRequest(word) => EngineError::RequestRefused(word),
            _ => EngineError::WriteQueryNotAllowed,
        }
    }
}

/// Two-stage guard around the text-to-SQL collaborator
#[derive(Debug, Clone)]
pub struct SqlGuard {
    select_prefix: Regex,
    forbidden: Vec<(&'static str, Regex)>,
}

impl SqlGuard {
    pub fn new() -> anyhow::Result<Self> {
        let forbidden = FORBIDDEN_SQL_KEYWORDS
            .iter()
            .map(|kw| Ok((*kw, Regex::new(&format!(r"(?i)\b{}\b", kw))?)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            select_prefix: Regex::new(r"(?i)\Aselect\b")?,
            forbidden,
        })
    }

    /// Stage one: refuse natural-language requests that mention a destructive verb.
    ///
    /// Matching is a case-insensitive substring test, so "Deleted" and
    /// "dropping" are refused too.
    pub fn check_request(&self, request: &str) -> Result<(), GuardViolation> {
        let lowered = request.to_lowercase();
        match DESTRUCTIVE_REQUEST_WORDS
            .iter()
            .find(|word| lowered.contains(*word))
        {
            Some(word) => {
                warn!(keyword = %word, "refusing destructive outlet request");
                Err(GuardViolation::DestructiveRequest(word.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Stage two: accept only a single statement that starts with SELECT and
    /// contains no forbidden keyword. Returns the statement without a trailing
    /// semicolon.
    pub fn check_statement<'a>(&self, sql: &'a str) -> Result<&'a str, GuardViolation> {
        let statement = sql.trim();
        let statement = statement.strip_suffix(';').unwrap_or(statement).trim_end();

        let violation = if statement.is_empty() {
            Some(GuardViolation::EmptyStatement)
        } else if !self.select_prefix.is_match(statement) {
            Some(GuardViolation::NotSelect)
        } else if statement.contains(';') {
            Some(GuardViolation::StackedStatements)
        } else {
            self.forbidden
                .iter()
                .find(|(_, pattern)| pattern.is_match(statement))
                .map(|(kw, _)| GuardViolation::ForbiddenKeyword(kw.to_string()))
        };

        match violation {
            Some(violation) => {
                warn!(%violation, "refusing generated SQL");
                Err(violation)
            }
            None => Ok(statement),
        }
    }
}
