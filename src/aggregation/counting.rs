//! Counting strategies
//!
//! A counting strategy turns one search match into zero or more
//! `(label, increment)` pairs that feed a [`super::BoundedAggregator`].

use regex::{Regex, RegexBuilder};

use crate::collaborators::SearchMatch;
use crate::error::{InsightsError, Result};

/// Query filters stripped before the remaining text is taken as the pattern
const QUERY_FILTER_FIELDS: &[&str] = &[
    "archived", "case", "content", "count", "file", "fork", "lang", "patterntype", "repo",
    "rev", "select", "timeout", "type", "visibility",
];

/// Extracts labelled increments from a search match
pub trait CountingStrategy: Send + Sync {
    /// Labelled increments for `m`
    fn count(&self, m: &SearchMatch) -> Vec<(String, u64)>;
}

/// Counts the value of the first capture group for every pattern match
#[derive(Debug, Clone)]
pub struct CaptureGroupCounter {
    regex: Regex,
}

impl CaptureGroupCounter {
    /// Compile `pattern`, which must contain at least one capture group
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .multi_line(true)
            .build()
            .map_err(|e| InsightsError::InvalidInput(format!("invalid pattern: {}", e)))?;

        if regex.captures_len() < 2 {
            return Err(InsightsError::InvalidInput(format!(
                "pattern '{}' has no capture group",
                pattern
            )));
        }

        Ok(Self { regex })
    }

    /// Build from a search query, ignoring `field:value` filters
    pub fn from_query(query: &str, case_sensitive: bool) -> Result<Self> {
        let pattern = extract_pattern(query);
        if pattern.is_empty() {
            return Err(InsightsError::InvalidInput(
                "query has no search pattern".to_string(),
            ));
        }
        Self::new(&pattern, case_sensitive)
    }

    /// Compiled pattern
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl CountingStrategy for CaptureGroupCounter {
    fn count(&self, m: &SearchMatch) -> Vec<(String, u64)> {
        self.regex
            .captures_iter(&m.content)
            .filter_map(|caps| caps.get(1))
            .map(|group| (group.as_str().to_string(), 1))
            .collect()
    }
}

/// Counts matches per file path
#[derive(Debug, Default, Clone, Copy)]
pub struct PathCounter;

impl CountingStrategy for PathCounter {
    fn count(&self, m: &SearchMatch) -> Vec<(String, u64)> {
        if m.match_count == 0 {
            return Vec::new();
        }
        vec![(m.path.clone(), m.match_count)]
    }
}

/// Pattern part of a query: every token that is not a known filter
pub fn extract_pattern(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|token| !is_filter(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_filter(token: &str) -> bool {
    let token = token.strip_prefix('-').unwrap_or(token);
    match token.split_once(':') {
        Some((field, _)) => QUERY_FILTER_FIELDS.contains(&field.to_ascii_lowercase().as_str()),
        None => false,
    }
}
