//! Honeytoken (bait value) detection.
//!
//! Bait is checked before checksum validation on purpose: a honeytoken is
//! shaped to look like a real identifier, and it must trigger whether or not
//! its checksum happens to pass. Exact literals are found anywhere in the
//! text with an Aho-Corasick pass; formatted variants of the same bait are
//! caught per candidate span by comparing digit-normalized forms.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use aho_corasick::{AhoCorasick, MatchKind};
use chrono::{DateTime, Utc};

use crate::error::{OpaqueError, Result};

/// Fixed replacement for a detected honeytoken, regardless of the configured
/// obfuscation method.
pub const HONEYTOKEN_MARKER: &str = "[HONEYTOKEN TRIGGERED]";

/// What the engine knows about a detection site when it raises an alert.
#[derive(Debug, Clone)]
pub struct AlertContext {
    /// Mapping key of the leaf being sanitized, when scanning a structured
    /// payload.
    pub field: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AlertContext {
    pub(crate) fn new(field: Option<&str>) -> Self {
        Self {
            field: field.map(String::from),
            timestamp: Utc::now(),
        }
    }
}

/// Injectable alert sink, invoked synchronously with the raw bait value.
pub type AlertHandler = Arc<dyn Fn(&str, &AlertContext) + Send + Sync>;

fn digits_of(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// The configured bait values plus the alert side effect. Static for the
/// lifetime of an engine configuration.
pub struct HoneytokenSet {
    literals: HashSet<String>,
    normalized: HashSet<String>,
    automaton: Option<AhoCorasick>,
    alert: Option<AlertHandler>,
}

impl HoneytokenSet {
    pub fn new(tokens: Vec<String>, alert: Option<AlertHandler>) -> Result<Self> {
        let automaton = if tokens.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&tokens)
                    .map_err(|e| OpaqueError::InvalidConfig {
                        reason: format!("honeytoken automaton build failed: {e}"),
                    })?,
            )
        };
        let normalized = tokens
            .iter()
            .map(|t| digits_of(t))
            .filter(|d| !d.is_empty())
            .collect();
        Ok(Self {
            literals: tokens.into_iter().collect(),
            normalized,
            automaton,
            alert,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Exact or digit-normalized match against the bait set.
    pub fn check(&self, raw: &str) -> bool {
        if self.literals.contains(raw) {
            return true;
        }
        let digits = digits_of(raw);
        !digits.is_empty() && self.normalized.contains(&digits)
    }

    /// Replace every literal bait occurrence with the fixed marker, raising
    /// one alert per occurrence. Runs before shape matching so bait that no
    /// pattern would ever match still triggers.
    pub(crate) fn replace_literals(&self, text: &str, field: Option<&str>) -> String {
        let Some(automaton) = &self.automaton else {
            return text.to_string();
        };
        let matches: Vec<(usize, usize)> = automaton
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();
        if matches.is_empty() {
            return text.to_string();
        }

        let mut result = String::with_capacity(text.len());
        let mut last = 0usize;
        for (start, end) in matches {
            self.raise(&text[start..end], field);
            result.push_str(&text[last..start]);
            result.push_str(HONEYTOKEN_MARKER);
            last = end;
        }
        result.push_str(&text[last..]);
        result
    }

    /// Deliver one alert. A panicking handler is contained and logged; alert
    /// delivery can never fail the sanitization call. Without an injected
    /// handler the detection is logged as an error event.
    pub(crate) fn raise(&self, raw: &str, field: Option<&str>) {
        let ctx = AlertContext::new(field);
        match &self.alert {
            Some(handler) => {
                if catch_unwind(AssertUnwindSafe(|| handler(raw, &ctx))).is_err() {
                    tracing::warn!(
                        target: "opaque::security",
                        "honeytoken alert handler panicked; alert dropped"
                    );
                }
            }
            None => {
                tracing::error!(
                    target: "opaque::security",
                    value = raw,
                    field = ctx.field.as_deref(),
                    "honeytoken detected"
                );
            }
        }
    }
}
