//! Reversible obfuscation backed by authenticated encryption.
//!
//! Keys are derived from a user-supplied passphrase with PBKDF2-HMAC-SHA256
//! over a per-install random salt, derived once per vault and cached; the
//! cipher is AES-256-GCM, so a tampered token fails at decrypt time instead
//! of yielding garbage. Decryption is never reachable from the scan path.

use std::fmt;
use std::num::NonZeroU32;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{OpaqueError, Result};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;
const TOKEN_VERSION: u8 = 1;

/// PBKDF2 iteration count for newly created vaults. Tokens carry their own
/// count, so this can be raised without breaking old tokens.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// The textual prefix every vault token starts with.
pub const VAULT_TOKEN_PREFIX: &str = "[VAULT:";

/// An opaque reversible token: ciphertext, GCM tag and the key-derivation
/// parameters (salt, iteration count) needed to reconstruct the key from a
/// passphrase. The key itself is never part of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultToken {
    salt: [u8; SALT_LEN],
    iterations: u32,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl VaultToken {
    /// Wire form: `[VAULT:<base64(version ‖ salt ‖ iterations ‖ nonce ‖ ct‖tag)>]`.
    pub fn encode(&self) -> String {
        let mut bytes =
            Vec::with_capacity(1 + SALT_LEN + 4 + NONCE_LEN + self.ciphertext.len());
        bytes.push(TOKEN_VERSION);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.iterations.to_be_bytes());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        format!("{VAULT_TOKEN_PREFIX}{}]", BASE64.encode(bytes))
    }

    /// Parse the wire form. Fails on anything that is not a well-formed
    /// token; this never touches the key or the ciphertext contents.
    pub fn decode(token: &str) -> Result<Self> {
        let inner = token
            .strip_prefix(VAULT_TOKEN_PREFIX)
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| OpaqueError::MalformedToken {
                reason: "missing [VAULT:...] framing".into(),
            })?;
        let bytes = BASE64
            .decode(inner)
            .map_err(|e| OpaqueError::MalformedToken {
                reason: format!("invalid base64 payload: {e}"),
            })?;

        const HEADER_LEN: usize = 1 + SALT_LEN + 4 + NONCE_LEN;
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(OpaqueError::MalformedToken {
                reason: format!("payload too short: {} bytes", bytes.len()),
            });
        }
        if bytes[0] != TOKEN_VERSION {
            return Err(OpaqueError::MalformedToken {
                reason: format!("unsupported token version {}", bytes[0]),
            });
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[1..1 + SALT_LEN]);
        let mut iter_bytes = [0u8; 4];
        iter_bytes.copy_from_slice(&bytes[1 + SALT_LEN..1 + SALT_LEN + 4]);
        let iterations = u32::from_be_bytes(iter_bytes);
        if iterations == 0 {
            return Err(OpaqueError::MalformedToken {
                reason: "zero iteration count".into(),
            });
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[1 + SALT_LEN + 4..HEADER_LEN]);

        Ok(Self {
            salt,
            iterations,
            nonce,
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }
}

fn derive_key(passphrase: &[u8], salt: &[u8], iterations: u32) -> Result<LessSafeKey> {
    let iterations =
        NonZeroU32::new(iterations).ok_or_else(|| OpaqueError::InvalidKeyMaterial {
            reason: "iteration count must be non-zero".into(),
        })?;
    let mut key_bytes = Zeroizing::new([0u8; KEY_LEN]);
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        passphrase,
        &mut key_bytes[..],
    );
    let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes[..]).map_err(|_| {
        OpaqueError::InvalidKeyMaterial {
            reason: "derived key rejected by cipher".into(),
        }
    })?;
    Ok(LessSafeKey::new(unbound))
}

fn open_with(key: &LessSafeKey, token: &VaultToken) -> Result<String> {
    let nonce = Nonce::assume_unique_for_key(token.nonce);
    let mut buf = token.ciphertext.clone();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut buf)
        .map_err(|_| OpaqueError::DecryptionFailed {
            reason: "wrong key or tampered token".into(),
        })?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| OpaqueError::DecryptionFailed {
        reason: "decrypted payload is not valid UTF-8".into(),
    })
}

/// Passphrase-keyed encryption for reversible tokens.
pub struct Vault {
    passphrase: Zeroizing<Vec<u8>>,
    salt: [u8; SALT_LEN],
    iterations: u32,
    key: LessSafeKey,
    rng: SystemRandom,
}

impl Vault {
    /// Create a vault with a fresh random salt and the default iteration
    /// count. The key is derived once here; encrypt/decrypt calls reuse it.
    pub fn new(passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(OpaqueError::MissingVaultKey);
        }
        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)
            .map_err(|_| OpaqueError::InvalidKeyMaterial {
                reason: "failed to generate vault salt".into(),
            })?;
        let key = derive_key(passphrase.as_bytes(), &salt, DEFAULT_ITERATIONS)?;
        Ok(Self {
            passphrase: Zeroizing::new(passphrase.as_bytes().to_vec()),
            salt,
            iterations: DEFAULT_ITERATIONS,
            key,
            rng,
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<VaultToken> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| OpaqueError::EncryptionFailed {
                reason: "failed to generate nonce".into(),
            })?;
        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| OpaqueError::EncryptionFailed {
                reason: "AES-256-GCM seal failed".into(),
            })?;
        Ok(VaultToken {
            salt: self.salt,
            iterations: self.iterations,
            nonce,
            ciphertext: in_out,
        })
    }

    /// Decrypt a parsed token. Tokens from another install (different salt
    /// or iteration count) re-derive the key from their own parameters.
    pub fn decrypt(&self, token: &VaultToken) -> Result<String> {
        if token.salt == self.salt && token.iterations == self.iterations {
            open_with(&self.key, token)
        } else {
            let key = derive_key(&self.passphrase, &token.salt, token.iterations)?;
            open_with(&key, token)
        }
    }

    /// Decrypt directly from the textual `[VAULT:...]` form.
    pub fn decrypt_str(&self, token: &str) -> Result<String> {
        self.decrypt(&VaultToken::decode(token)?)
    }

    /// One-shot reveal for out-of-band tooling: decode a token string and
    /// decrypt it with the given passphrase, without building a vault.
    pub fn reveal(token: &str, passphrase: &str) -> Result<String> {
        if passphrase.is_empty() {
            return Err(OpaqueError::MissingVaultKey);
        }
        let token = VaultToken::decode(token)?;
        let key = derive_key(passphrase.as_bytes(), &token.salt, token.iterations)?;
        open_with(&key, &token)
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("passphrase", &"[REDACTED]")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let vault = Vault::new("my-secret-master-key").unwrap();
        let token = vault.encrypt("123.456.789-00").unwrap();
        let encoded = token.encode();
        assert!(encoded.starts_with("[VAULT:"));
        assert!(encoded.ends_with(']'));
        assert!(!encoded.contains("123.456.789-00"));

        assert_eq!(vault.decrypt_str(&encoded).unwrap(), "123.456.789-00");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let vault1 = Vault::new("key1").unwrap();
        let vault2 = Vault::new("key2").unwrap();
        let encoded = vault1.encrypt("secret").unwrap().encode();
        let err = vault2.decrypt_str(&encoded).unwrap_err();
        assert!(matches!(err, OpaqueError::DecryptionFailed { .. }));
    }

    #[test]
    fn same_passphrase_different_install_succeeds() {
        // Token salt differs from the decrypting vault's own salt, forcing
        // the re-derivation path.
        let vault1 = Vault::new("shared").unwrap();
        let vault2 = Vault::new("shared").unwrap();
        let encoded = vault1.encrypt("payload").unwrap().encode();
        assert_eq!(vault2.decrypt_str(&encoded).unwrap(), "payload");
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let vault = Vault::new("key").unwrap();
        let mut token = vault.encrypt("payload").unwrap();
        let last = token.ciphertext.len() - 1;
        token.ciphertext[last] ^= 0x01;
        let err = vault.decrypt(&token).unwrap_err();
        assert!(matches!(err, OpaqueError::DecryptionFailed { .. }));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for bad in [
            "not a token",
            "[VAULT:]",
            "[VAULT:AAAA]",
            "[VAULT:!!not-base64!!]",
            "[VAULT:AAAA", // no closing bracket
        ] {
            assert!(matches!(
                VaultToken::decode(bad),
                Err(OpaqueError::MalformedToken { .. })
            ));
        }
    }

    #[test]
    fn empty_passphrase_is_a_setup_error() {
        assert!(matches!(Vault::new(""), Err(OpaqueError::MissingVaultKey)));
    }

    #[test]
    fn reveal_without_a_vault() {
        let vault = Vault::new("offline-key").unwrap();
        let encoded = vault.encrypt("cpf 52998224725").unwrap().encode();
        assert_eq!(
            Vault::reveal(&encoded, "offline-key").unwrap(),
            "cpf 52998224725"
        );
        assert!(Vault::reveal(&encoded, "wrong").is_err());
        assert!(matches!(
            Vault::reveal(&encoded, ""),
            Err(OpaqueError::MissingVaultKey)
        ));
    }
}
