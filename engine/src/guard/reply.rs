use regex::Regex;

/// Strips markup from user-facing replies.
///
/// Replies may come straight from the model, so HTML tags and `javascript:`
/// URIs are removed before anything reaches a client that might render them.
/// Markdown is left alone.
#[derive(Debug, Clone)]
pub struct ReplySanitizer {
    tags: Regex,
    script_uri: Regex,
}

impl ReplySanitizer {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            tags: Regex::new(r"</?[A-Za-z][^<>]*>")?,
            script_uri: Regex::new(r"(?i)javascript\s*:")?,
        })
    }

    pub fn sanitize(&self, reply: &str) -> String {
        let without_tags = self.tags.replace_all(reply, "");
        self.script_uri
            .replace_all(&without_tags, "")
            .trim()
            .to_string()
    }
}
