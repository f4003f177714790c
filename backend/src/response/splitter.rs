//! Response splitter
//!
//! Only the first fenced block is used as the snippet. Every fenced block is
//! removed from the prose.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced block: triple backticks, optional language tag, non-greedy up to the
/// next triple backticks. Any tag may end the opening line; on a single-line
/// block only a known language name counts as a tag.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)```(?:[A-Za-z0-9_+\-]+[ \t]*\r?\n|(?i:python|py|json|sql)[ \t]+)?(.*?)```",
    )
    .expect("valid fenced block regex")
});

/// Chart-display call that the presentation layer makes redundant
const DISPLAY_CALL: &str = "fig.show()";

/// Agent output split into prose and an optional snippet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResponse {
    /// Inner content of the first fenced block, if any
    pub snippet: Option<String>,
    /// Text shown to the user
    pub prose: String,
}

/// Split raw agent output into snippet and prose
pub fn split(raw: &str) -> SplitResponse {
    let Some(captures) = FENCED_BLOCK.captures(raw) else {
        return SplitResponse {
            snippet: None,
            prose: raw.to_string(),
        };
    };

    let inner = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let snippet = inner
        .trim()
        .lines()
        .filter(|line| line.trim() != DISPLAY_CALL)
        .collect::<Vec<_>>()
        .join("\n");

    let prose = FENCED_BLOCK.replace_all(raw, "").trim().to_string();

    SplitResponse {
        snippet: Some(snippet),
        prose,
    }
}
