pub mod algorithms;
pub mod rules;

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OpaqueError, Result};

/// Identity of a validator rule: jurisdiction or domain plus document code,
/// e.g. `BR.CPF` or `FINANCE.CREDIT_CARD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId {
    domain: String,
    code: String,
}

impl RuleId {
    pub fn new(domain: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code: code.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.code)
    }
}

/// How a raw matched substring is reduced to the canonical form handed to
/// the obfuscation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Keep ASCII digits only (national IDs, card numbers).
    Digits,
    /// Remove whitespace, uppercase the rest (IBAN-style identifiers).
    StripSpaces,
    /// Trim surrounding whitespace, keep everything else (emails, UUIDs).
    Verbatim,
}

impl Normalization {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            Normalization::Digits => raw.chars().filter(char::is_ascii_digit).collect(),
            Normalization::StripSpaces => raw
                .chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_uppercase)
                .collect(),
            Normalization::Verbatim => raw.trim().to_string(),
        }
    }
}

/// The predicate half of a rule: a total boolean function over the raw
/// matched text.
pub type ValidatorFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A detection rule: shape pattern plus checksum predicate. Immutable once
/// registered; external plugins construct these exactly like the built-ins
/// in [`rules`].
#[derive(Clone)]
pub struct ValidatorRule {
    id: RuleId,
    pattern: String,
    normalization: Normalization,
    predicate: ValidatorFn,
}

impl ValidatorRule {
    pub fn new(
        id: RuleId,
        pattern: impl Into<String>,
        normalization: Normalization,
        predicate: ValidatorFn,
    ) -> Self {
        Self {
            id,
            pattern: pattern.into(),
            normalization,
            predicate,
        }
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Run the checksum predicate. A panicking predicate is contained here
    /// and reported as a failed validation, so one misbehaving plugin can
    /// never take the scan pipeline down.
    pub fn validate(&self, raw: &str) -> bool {
        catch_unwind(AssertUnwindSafe(|| (self.predicate)(raw))).unwrap_or_else(|_| {
            tracing::warn!(
                target: "opaque::security",
                rule = %self.id,
                "validator predicate panicked; treating candidate as not validated"
            );
            false
        })
    }

    /// Canonical form of a raw match under this rule's normalization.
    pub fn normalize(&self, raw: &str) -> String {
        self.normalization.apply(raw)
    }
}

impl fmt::Debug for ValidatorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRule")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("normalization", &self.normalization)
            .finish_non_exhaustive()
    }
}

/// A rule with its shape pattern compiled. Patterns are compiled exactly
/// once, at registration, and reused for every subsequent scan.
pub(crate) struct CompiledRule {
    pub(crate) rule: ValidatorRule,
    pub(crate) regex: Regex,
}

/// Ordered collection of validator rules. Registration order is significant:
/// it is the final tie-break when overlapping candidate spans are resolved.
#[derive(Default)]
pub struct ValidatorRegistry {
    rules: Vec<CompiledRule>,
    index: HashMap<RuleId, usize>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a rule list, preserving order.
    pub fn with_rules(rules: impl IntoIterator<Item = ValidatorRule>) -> Result<Self> {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        Ok(registry)
    }

    /// Add a rule, compiling its shape pattern. Registering an identity that
    /// already exists replaces the previous rule in place, keeping its
    /// original position in the order.
    pub fn register(&mut self, rule: ValidatorRule) -> Result<()> {
        let regex = Regex::new(rule.pattern()).map_err(|e| OpaqueError::InvalidRule {
            id: rule.id().clone(),
            reason: format!("invalid shape pattern: {e}"),
        })?;
        let compiled = CompiledRule { rule, regex };
        match self.index.get(compiled.rule.id()) {
            Some(&pos) => self.rules[pos] = compiled,
            None => {
                self.index
                    .insert(compiled.rule.id().clone(), self.rules.len());
                self.rules.push(compiled);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &RuleId) -> Option<&ValidatorRule> {
        self.index.get(id).map(|&pos| &self.rules[pos].rule)
    }

    /// All rules in registration order.
    pub fn all(&self) -> impl Iterator<Item = &ValidatorRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn compiled(&self) -> &[CompiledRule] {
        &self.rules
    }
}
