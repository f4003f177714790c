//! Conversation state
//!
//! Append-only history of answered questions plus the processing flag that
//! keeps a session to one question at a time.

use crate::chart::Chart;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What the user sees for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Chart produced by the answer, if any
    pub chart: Option<Chart>,
    /// Prose part of the answer
    pub text: String,
    /// Why a chart described by the answer could not be produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_error: Option<String>,
}

impl Answer {
    /// Text-only answer
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            chart: None,
            text: text.into(),
            chart_error: None,
        }
    }
}

/// One question and its answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Question as typed
    pub question: String,
    /// Answer shown for it
    pub answer: Answer,
    /// When the answer was recorded
    pub asked_at: DateTime<Utc>,
}

impl ConversationEntry {
    /// Entry stamped with the current time
    pub fn new(question: String, answer: Answer) -> Self {
        Self {
            question,
            answer,
            asked_at: Utc::now(),
        }
    }
}

/// Marks a question as in flight; clears the flag when dropped
#[derive(Debug)]
pub struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Ordered history of a session
#[derive(Debug, Default)]
pub struct ConversationState {
    entries: Vec<ConversationEntry>,
    processing: Arc<AtomicBool>,
}

impl ConversationState {
    /// Empty conversation, not processing
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its position with a copy of it
    pub fn append(&mut self, question: String, answer: Answer) -> (usize, ConversationEntry) {
        let entry = ConversationEntry::new(question, answer);
        self.entries.push(entry.clone());
        (self.entries.len() - 1, entry)
    }

    /// All entries in insertion order
    pub fn all(&self) -> &[ConversationEntry] {
        &self.entries
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&ConversationEntry> {
        self.entries.get(index)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been asked yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Claim the processing flag
    ///
    /// Returns `None` when a question is already in flight. The flag stays
    /// set until the returned guard is dropped, whatever the outcome.
    pub fn try_begin(&self) -> Option<ProcessingGuard> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProcessingGuard {
                flag: self.processing.clone(),
            })
    }

    /// Whether a question is in flight
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut state = ConversationState::new();
        assert!(state.is_empty());

        let (first_index, _) = state.append("How many customers?".into(), Answer::text("4"));
        let (second_index, second) = state.append("And orders?".into(), Answer::text("3"));

        assert_eq!((first_index, second_index), (0, 1));
        assert_eq!(state.len(), 2);
        assert_eq!(second.question, "And orders?");
        assert_eq!(state.all()[0].answer.text, "4");
        assert_eq!(state.get(1), Some(&second));
        assert_eq!(state.get(2), None);
    }

    #[test]
    fn test_guard_is_exclusive() {
        let state = ConversationState::new();
        let guard = state.try_begin().unwrap();
        assert!(state.is_processing());
        assert!(state.try_begin().is_none());

        drop(guard);
        assert!(!state.is_processing());
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn test_guard_released_on_early_return() {
        fn fails(state: &ConversationState) -> Result<(), &'static str> {
            let _guard = state.try_begin().ok_or("busy")?;
            Err("agent failed")
        }

        let state = ConversationState::new();
        assert_eq!(fails(&state), Err("agent failed"));
        assert!(!state.is_processing());
    }

    #[test]
    fn test_answer_serialization_omits_missing_chart_error() {
        let json = serde_json::to_value(Answer::text("4")).unwrap();
        assert_eq!(json, serde_json::json!({"chart": null, "text": "4"}));
    }
}
