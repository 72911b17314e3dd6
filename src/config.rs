//! Engine configuration.
//!
//! One explicit configuration object per engine instance; there are no
//! process-wide defaults. Reconfiguration swaps the whole object atomically
//! (see [`Engine::reconfigure`](crate::engine::Engine::reconfigure)) so a
//! scan in progress never observes a half-updated setup.

use std::fmt;

use crate::breaker::BreakerConfig;
use crate::honeytoken::AlertHandler;
use crate::validate::{rules, ValidatorRule};

/// Salt used by the HASH method when none is configured. Deliberately ugly:
/// production deployments are expected to set their own.
pub const DEFAULT_HASH_SALT: &str = "default_insecure_salt_change_me";

/// The obfuscation strategy applied to confirmed matches. One variant per
/// strategy, each carrying exactly the parameters it needs, so dispatch is
/// exhaustive and missing material is a setup-time error.
#[derive(Clone)]
pub enum ObfuscationMethod {
    /// Deterministic salted one-way digest, `[HASH-XXXX]`. Verifiable by
    /// recomputation: pseudonymization, not anonymization.
    Hash { salt: String },
    /// Display masking: keep the last `keep_suffix` characters, replace the
    /// rest with `filler`. Cosmetic only.
    Mask { filler: char, keep_suffix: usize },
    /// Reversible authenticated encryption, `[VAULT:...]`. Requires a
    /// non-empty passphrase; reversal is a separate explicit operation.
    Vault { passphrase: String },
    /// Fresh random token per call, `[ANON-XXXXXXXX]`. No correlation table
    /// exists anywhere; the only truly anonymous strategy.
    Anonymize,
    /// Keyed deterministic transform (HMAC-SHA256), `[PSEUDO-XXXXXXXX]`.
    /// Same input, same secret, same output; still personal data.
    Pseudonymize { secret: String },
}

impl ObfuscationMethod {
    /// HASH with the default salt.
    pub fn hash() -> Self {
        Self::Hash {
            salt: DEFAULT_HASH_SALT.to_string(),
        }
    }

    /// MASK with `*` filler keeping the last four characters.
    pub fn mask() -> Self {
        Self::Mask {
            filler: '*',
            keep_suffix: 4,
        }
    }
}

impl Default for ObfuscationMethod {
    fn default() -> Self {
        Self::hash()
    }
}

// Key material must never end up in debug output.
impl fmt::Debug for ObfuscationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash { .. } => f.write_str("Hash"),
            Self::Mask {
                filler,
                keep_suffix,
            } => f
                .debug_struct("Mask")
                .field("filler", filler)
                .field("keep_suffix", keep_suffix)
                .finish(),
            Self::Vault { .. } => f.write_str("Vault"),
            Self::Anonymize => f.write_str("Anonymize"),
            Self::Pseudonymize { .. } => f.write_str("Pseudonymize"),
        }
    }
}

/// Everything an engine instance needs, assembled through
/// [`EngineConfig::builder`]. Validation happens in
/// [`Engine::new`](crate::engine::Engine::new), never during a scan.
pub struct EngineConfig {
    pub(crate) rules: Vec<ValidatorRule>,
    pub(crate) method: ObfuscationMethod,
    pub(crate) honeytokens: Vec<String>,
    pub(crate) alert: Option<AlertHandler>,
    pub(crate) breaker: BreakerConfig,
}

impl EngineConfig {
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules: rules::default_rules(),
            method: ObfuscationMethod::default(),
            honeytokens: Vec::new(),
            alert: None,
            breaker: BreakerConfig::default(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("rules", &self.rules.len())
            .field("method", &self.method)
            .field("honeytokens", &self.honeytokens.len())
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EngineConfig`].
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Replace the rule set entirely (the default is the built-in set).
    #[must_use]
    pub fn rules(mut self, rules: Vec<ValidatorRule>) -> Self {
        self.config.rules = rules;
        self
    }

    /// Append one rule, e.g. an external plugin.
    #[must_use]
    pub fn rule(mut self, rule: ValidatorRule) -> Self {
        self.config.rules.push(rule);
        self
    }

    #[must_use]
    pub fn method(mut self, method: ObfuscationMethod) -> Self {
        self.config.method = method;
        self
    }

    #[must_use]
    pub fn honeytokens(mut self, tokens: impl IntoIterator<Item = String>) -> Self {
        self.config.honeytokens = tokens.into_iter().collect();
        self
    }

    #[must_use]
    pub fn honeytoken(mut self, token: impl Into<String>) -> Self {
        self.config.honeytokens.push(token.into());
        self
    }

    /// Inject the honeytoken alert sink.
    #[must_use]
    pub fn alert(mut self, handler: AlertHandler) -> Self {
        self.config.alert = Some(handler);
        self
    }

    #[must_use]
    pub fn breaker(mut self, breaker: BreakerConfig) -> Self {
        self.config.breaker = breaker;
        self
    }

    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
