//! The interchangeable obfuscation strategies.
//!
//! One engine runs exactly one strategy, selected by
//! [`ObfuscationMethod`](crate::config::ObfuscationMethod) at setup; the
//! variants hold their own material and share no mutable state. Token
//! formats are stable wire surface: downstream log parsers detect sanitized
//! fields by the tagged brackets without parsing their contents.

pub mod vault;

use std::fmt;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ObfuscationMethod;
use crate::error::{OpaqueError, Result};
use crate::validate::RuleId;

use self::vault::Vault;

fn hex_upper(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        let _ = write!(s, "{b:02X}");
    }
    s
}

/// Deterministic salted SHA-256 fingerprint, `[HASH-XXXX]`.
///
/// Same input and salt always produce the same token, which makes the output
/// verifiable by recomputation: this is pseudonymization, not anonymization,
/// and the salt must be protected accordingly.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    salt: String,
}

impl Fingerprinter {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    pub fn fingerprint(&self, value: &str) -> String {
        let digest = Sha256::digest(format!("{value}{}", self.salt).as_bytes());
        let hex = format!("{digest:x}");
        format!("[HASH-{}]", hex[..4].to_ascii_uppercase())
    }
}

/// A configured strategy, built once at engine setup from the selected
/// [`ObfuscationMethod`].
pub enum Obfuscator {
    Hash(Fingerprinter),
    Mask { filler: char, keep_suffix: usize },
    Vault(Vault),
    Anonymize,
    Pseudonymize { key: ring::hmac::Key },
}

impl Obfuscator {
    /// Build the strategy, surfacing configuration errors (missing vault
    /// passphrase, empty pseudonymization secret) immediately rather than at
    /// scan time.
    pub fn from_method(method: &ObfuscationMethod) -> Result<Self> {
        match method {
            ObfuscationMethod::Hash { salt } => Ok(Self::Hash(Fingerprinter::new(salt.clone()))),
            ObfuscationMethod::Mask {
                filler,
                keep_suffix,
            } => Ok(Self::Mask {
                filler: *filler,
                keep_suffix: *keep_suffix,
            }),
            ObfuscationMethod::Vault { passphrase } => Ok(Self::Vault(Vault::new(passphrase)?)),
            ObfuscationMethod::Anonymize => Ok(Self::Anonymize),
            ObfuscationMethod::Pseudonymize { secret } => {
                if secret.is_empty() {
                    return Err(OpaqueError::InvalidConfig {
                        reason: "pseudonymization secret must not be empty".into(),
                    });
                }
                Ok(Self::Pseudonymize {
                    key: ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes()),
                })
            }
        }
    }

    /// Produce the replacement token for a confirmed match. `raw` is the
    /// text as it appeared in the source (used for display masking),
    /// `normalized` the canonical form (input to every cryptographic
    /// strategy). Never fails: the scan path has no error channel.
    pub fn obfuscate(&self, raw: &str, normalized: &str, rule: &RuleId) -> String {
        match self {
            Self::Hash(fingerprinter) => fingerprinter.fingerprint(normalized),
            Self::Mask {
                filler,
                keep_suffix,
            } => mask(raw, *filler, *keep_suffix),
            Self::Vault(vault) => match vault.encrypt(normalized) {
                Ok(token) => token.encode(),
                Err(e) => {
                    // Extremely unlikely (RNG failure); still never leak the
                    // value and never fail the scan.
                    tracing::error!(target: "opaque::security", error = %e, "vault encryption failed");
                    "[VAULT-UNAVAILABLE]".to_string()
                }
            },
            Self::Anonymize => {
                let id = Uuid::new_v4().simple().to_string();
                format!("[ANON-{}]", id[..8].to_ascii_uppercase())
            }
            Self::Pseudonymize { key } => {
                let tag = ring::hmac::sign(key, format!("{rule}:{normalized}").as_bytes());
                format!("[PSEUDO-{}]", hex_upper(&tag.as_ref()[..4]))
            }
        }
    }

    /// The vault, when this strategy is reversible.
    pub fn vault(&self) -> Option<&Vault> {
        match self {
            Self::Vault(vault) => Some(vault),
            _ => None,
        }
    }
}

impl fmt::Debug for Obfuscator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(_) => f.write_str("Obfuscator::Hash"),
            Self::Mask { .. } => f.write_str("Obfuscator::Mask"),
            Self::Vault(_) => f.write_str("Obfuscator::Vault"),
            Self::Anonymize => f.write_str("Obfuscator::Anonymize"),
            Self::Pseudonymize { .. } => f.write_str("Obfuscator::Pseudonymize"),
        }
    }
}

/// Keep the last `keep_suffix` characters, replace everything before them.
fn mask(raw: &str, filler: char, keep_suffix: usize) -> String {
    let total = raw.chars().count();
    let masked = total.saturating_sub(keep_suffix);
    raw.chars()
        .enumerate()
        .map(|(i, c)| if i < masked { filler } else { c })
        .collect()
}
