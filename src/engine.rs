//! The sanitization orchestrator.
//!
//! One engine instance is built from one [`EngineConfig`] and then shared by
//! reference across callers; `sanitize` performs no I/O and never suspends.
//! Per string leaf the pipeline is: honeytoken literal pass, breaker gate,
//! candidate matching, per-span honeytoken check, checksum validation,
//! obfuscation, splice. Splices run in descending offset order so earlier
//! replacements cannot invalidate later offsets.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::error::{OpaqueError, Result};
use crate::honeytoken::{HoneytokenSet, HONEYTOKEN_MARKER};
use crate::obfuscate::Obfuscator;
use crate::scan::CandidateMatcher;
use crate::validate::ValidatorRegistry;

struct EngineState {
    matcher: CandidateMatcher,
    obfuscator: Obfuscator,
    honeytokens: HoneytokenSet,
    breaker: CircuitBreaker,
}

impl EngineState {
    fn build(config: EngineConfig) -> Result<Self> {
        let registry = Arc::new(ValidatorRegistry::with_rules(config.rules)?);
        let obfuscator = Obfuscator::from_method(&config.method)?;
        let honeytokens = HoneytokenSet::new(config.honeytokens, config.alert)?;
        Ok(Self {
            matcher: CandidateMatcher::new(registry),
            obfuscator,
            honeytokens,
            breaker: CircuitBreaker::new(config.breaker),
        })
    }

    fn sanitize_str(&self, text: &str, field: Option<&str>) -> String {
        // Bait first: it must trigger even when no shape pattern would ever
        // match it, and even when the breaker is open.
        let mut current = self.honeytokens.replace_literals(text, field);

        if !self.breaker.should_process() {
            return current;
        }

        let outcomes = self.matcher.scan(&current);
        for outcome in outcomes.iter().rev() {
            let span = &outcome.span;
            if self.honeytokens.check(&span.raw) {
                self.honeytokens.raise(&span.raw, field);
                current.replace_range(span.start..span.end, HONEYTOKEN_MARKER);
                continue;
            }
            if !outcome.passed {
                // Explicit no-op: shape matched, arithmetic did not.
                continue;
            }
            let Some(normalized) = outcome.normalized.as_deref() else {
                continue;
            };
            let token = self.obfuscator.obfuscate(&span.raw, normalized, &span.rule);
            current.replace_range(span.start..span.end, &token);
            self.breaker.record_match();
        }
        current
    }

    fn sanitize_value(&self, value: &Value, field: Option<&str>) -> Value {
        match value {
            Value::String(s) => Value::String(self.sanitize_str(s, field)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.sanitize_value(item, field))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.sanitize_value(item, Some(key))))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// The engine a logging integration calls once per emitted record.
pub struct Engine {
    state: RwLock<Arc<EngineState>>,
}

impl Engine {
    /// Build an engine, surfacing every configuration error (bad pattern,
    /// missing vault passphrase, empty pseudonymization secret) here rather
    /// than during a scan.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            state: RwLock::new(Arc::new(EngineState::build(config)?)),
        })
    }

    /// Engine with built-in rules and the default HASH method.
    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    fn state(&self) -> Arc<EngineState> {
        Arc::clone(&self.state.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Replace the whole configuration atomically. Scans already in flight
    /// finish against the state they started with; the circuit breaker
    /// restarts closed.
    pub fn reconfigure(&self, config: EngineConfig) -> Result<()> {
        let next = Arc::new(EngineState::build(config)?);
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = next;
        Ok(())
    }

    /// Sanitize a single string. Infallible for any input.
    pub fn sanitize_text(&self, text: &str) -> String {
        self.state().sanitize_str(text, None)
    }

    /// Sanitize a structured payload. String leaves go through the full
    /// pipeline, objects are rebuilt value by value with keys untouched,
    /// arrays element by element; numbers, booleans and null pass through.
    /// The input is never mutated.
    pub fn sanitize(&self, payload: &Value) -> Value {
        self.state().sanitize_value(payload, None)
    }

    /// Explicit out-of-band reversal of a `[VAULT:...]` token. Only
    /// available when the engine was configured with the VAULT method;
    /// never reachable from the scan path.
    pub fn reveal(&self, token: &str) -> Result<String> {
        let state = self.state();
        match state.obfuscator.vault() {
            Some(vault) => vault.decrypt_str(token),
            None => Err(OpaqueError::VaultNotConfigured),
        }
    }
}
