//! Candidate extraction and validation.
//!
//! The matcher runs every registered shape pattern over a string, resolves
//! overlapping hits deterministically, then asks each winning span's rule to
//! prove the candidate arithmetically. Failed candidates are kept in the
//! output so the caller's no-op is an explicit decision, not an absence.

use std::sync::Arc;

use crate::validate::{RuleId, ValidatorRegistry};

/// A shape match inside a source string. Offsets are byte offsets, valid for
/// the string the span was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSpan {
    pub start: usize,
    pub end: usize,
    pub raw: String,
    pub rule: RuleId,
}

impl CandidateSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A candidate span together with its checksum verdict. `normalized` is
/// populated only when the checksum passed; it is the canonical form handed
/// to the obfuscation strategies.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub span: CandidateSpan,
    pub passed: bool,
    pub normalized: Option<String>,
}

/// Scans text against a registry of compiled rules. Cheap to clone; the
/// compiled patterns live in the shared registry.
#[derive(Clone)]
pub struct CandidateMatcher {
    registry: Arc<ValidatorRegistry>,
}

impl CandidateMatcher {
    pub fn new(registry: Arc<ValidatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// All shape matches with overlaps resolved. Spans are ordered by start
    /// offset and never overlap: ties go to the earlier start, then the
    /// longer span, then the earlier-registered rule. A losing span is
    /// dropped entirely; the remainder of the string is not rescanned.
    pub fn find_candidates(&self, text: &str) -> Vec<CandidateSpan> {
        let mut hits: Vec<(usize, CandidateSpan)> = Vec::new();
        for (order, compiled) in self.registry.compiled().iter().enumerate() {
            for m in compiled.regex.find_iter(text) {
                hits.push((
                    order,
                    CandidateSpan {
                        start: m.start(),
                        end: m.end(),
                        raw: m.as_str().to_string(),
                        rule: compiled.rule.id().clone(),
                    },
                ));
            }
        }

        hits.sort_by(|(order_a, a), (order_b, b)| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.len().cmp(&a.len()))
                .then_with(|| order_a.cmp(order_b))
        });

        let mut kept: Vec<CandidateSpan> = Vec::with_capacity(hits.len());
        let mut last_end = 0usize;
        for (_, span) in hits {
            if kept.is_empty() || span.start >= last_end {
                last_end = span.end;
                kept.push(span);
            }
        }
        kept
    }

    /// Find candidates and run each one's checksum predicate.
    pub fn scan(&self, text: &str) -> Vec<ValidationOutcome> {
        self.find_candidates(text)
            .into_iter()
            .map(|span| {
                let Some(rule) = self.registry.get(&span.rule) else {
                    // Spans always come from the registry; treat a missing
                    // rule as a failed validation rather than panicking.
                    return ValidationOutcome {
                        span,
                        passed: false,
                        normalized: None,
                    };
                };
                let passed = rule.validate(&span.raw);
                let normalized = if passed {
                    Some(rule.normalize(&span.raw))
                } else {
                    tracing::debug!(
                        target: "opaque::security",
                        rule = %span.rule,
                        start = span.start,
                        end = span.end,
                        "shape match failed checksum validation; leaving untouched"
                    );
                    None
                };
                ValidationOutcome {
                    span,
                    passed,
                    normalized,
                }
            })
            .collect()
    }
}
