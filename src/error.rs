use crate::validate::RuleId;

#[derive(Debug, thiserror::Error)]
pub enum OpaqueError {
    #[error("invalid rule {id}: {reason}")]
    InvalidRule { id: RuleId, reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("vault passphrase is missing or empty")]
    MissingVaultKey,

    #[error("no vault configured for this engine")]
    VaultNotConfigured,

    #[error("invalid key material: {reason}")]
    InvalidKeyMaterial { reason: String },

    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    #[error("malformed vault token: {reason}")]
    MalformedToken { reason: String },

    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },
}

pub type Result<T> = std::result::Result<T, OpaqueError>;
