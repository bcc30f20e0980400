//! Error taxonomy shared across the sealguard crates.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type SealguardResult<T> = Result<T, SealguardError>;

/// Failures surfaced by sealguard operations.
///
/// Per-share and per-endpoint failures (`Decryption`, `Submission`,
/// `MetricDelivery`) are non-fatal by contract: callers log them and move on
/// to the next share or endpoint. Whole-attempt results such as "not enough
/// shares" are modelled as [`crate::RecoveryOutcome`] values, not errors.
#[derive(Debug, Error)]
pub enum SealguardError {
    /// A key share could not be turned into usable plaintext.
    #[error("failed to decrypt key share {name}: {reason}")]
    Decryption { name: String, reason: String },

    /// An unseal submission was rejected or never reached the service.
    #[error("unseal submission failed: {0}")]
    Submission(String),

    /// A metric sample could not be delivered.
    #[error("metric delivery failed: {0}")]
    MetricDelivery(String),

    /// The private key file could not be parsed.
    #[error("invalid private key {path}: {reason}")]
    InvalidPrivateKey { path: PathBuf, reason: String },

    /// Configuration is structurally wrong.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP client could not be constructed.
    #[error("http transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
