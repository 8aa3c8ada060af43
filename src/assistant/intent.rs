//! Keyword fast-path intent routing
//!
//! A cheap pre-filter over the transcript, not a classifier: the label it
//! produces picks the pipeline branch, but the extractor's structured
//! output can override it when the shapes disagree.

use std::sync::LazyLock;

use regex::Regex;

/// Route label for one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Read-only question about pending/upcoming work
    Query,
    /// Remove existing records
    Delete,
    /// Fallback: create a reminder or exam
    Create,
}

static QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(how many|what|show|tell|list|pending|upcoming|overdue|do i have)\b")
        .expect("valid regex")
});

static DELETE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(delete|remove|cancel|clear)\b").expect("valid regex")
});

/// Route a transcript to a pipeline branch
///
/// Delete is checked before query: "cancel my pending exam" is a removal,
/// not a listing. Creation is the fallback when neither family matches.
#[must_use]
pub fn classify(transcript: &str) -> Intent {
    if DELETE_PATTERN.is_match(transcript) {
        Intent::Delete
    } else if QUERY_PATTERN.is_match(transcript) {
        Intent::Query
    } else {
        Intent::Create
    }
}
