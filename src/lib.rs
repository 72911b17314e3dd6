//! Inline sanitization engine for log pipelines.
//!
//! Detects identifier-shaped substrings in free text and nested structured
//! payloads, confirms each candidate with jurisdiction-specific checksum
//! arithmetic (no guessing: a candidate that cannot be proven is left
//! untouched), then replaces confirmed matches with the configured
//! obfuscation token. Honeytoken bait triggers alerts before validation,
//! and a circuit breaker fails open under flood so logging availability is
//! never sacrificed to redaction.
//!
//! ```
//! use opaque::{Engine, EngineConfig};
//!
//! let engine = Engine::with_defaults().unwrap();
//! let out = engine.sanitize_text("customer CPF 529.982.247-25");
//! assert!(out.contains("[HASH-"));
//! assert!(!out.contains("529.982.247-25"));
//! ```

pub mod breaker;
pub mod config;
pub mod engine;
pub mod error;
pub mod honeytoken;
pub mod obfuscate;
pub mod scan;
pub mod validate;

pub use breaker::{BreakerConfig, CircuitBreaker};
pub use config::{EngineConfig, EngineConfigBuilder, ObfuscationMethod, DEFAULT_HASH_SALT};
pub use engine::Engine;
pub use error::{OpaqueError, Result};
pub use honeytoken::{AlertContext, AlertHandler, HoneytokenSet, HONEYTOKEN_MARKER};
pub use obfuscate::vault::{Vault, VaultToken};
pub use obfuscate::{Fingerprinter, Obfuscator};
pub use scan::{CandidateMatcher, CandidateSpan, ValidationOutcome};
pub use validate::rules::default_rules;
pub use validate::{Normalization, RuleId, ValidatorRegistry, ValidatorRule};
