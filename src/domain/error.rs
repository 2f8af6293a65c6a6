//! Error types for the coordinator, its collaborators and the HTTP surface.

use thiserror::Error;

use super::types::LifecycleState;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

/// Request validation failures
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("{0}")]
    Multiple(String),
}

/// Identifier codec failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Identifier is {len} bytes, maximum is {max}")]
    IdentifierTooLong { len: usize, max: usize },

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Failures reported by the external ledger client
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The ledger refused the action; code and message are passed through verbatim
    #[error("{message}")]
    Rejected { code: Option<i64>, message: String },

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("Malformed ledger response: {0}")]
    InvalidResponse(String),
}

/// Failures reported by the wallet/identity provider
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("Wallet unavailable: {0}")]
    Unavailable(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Coordinator usage errors surfaced to call sites
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Call site '{call_site}' already has attempt {token} in flight")]
    AttemptInFlight { call_site: String, token: u64 },

    #[error("Attempt is not in a terminal state (current: {0})")]
    NotTerminal(LifecycleState),

    #[error("Call site not found: {0}")]
    CallSiteNotFound(String),

    #[error("Call site already registered: {0}")]
    CallSiteExists(String),

    #[error("Coordinator for call site '{0}' has stopped")]
    CoordinatorStopped(String),

    #[error("Call-site limit of {0} reached")]
    RegistryFull(usize),
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid classifier rules: {0}")]
    Rules(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
