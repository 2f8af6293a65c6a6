//! Domain types with validation support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::error::{AppError, LedgerError, WalletError};
use super::identifier::Bytes32;

/// Wallet error code for a request the user declined
pub const USER_REJECTED_CODE: i64 = 4001;

/// Wallet error code for an account that is not authorized for the request
pub const UNAUTHORIZED_CODE: i64 = 4100;

// ============================================================================
// ACTIONS
// ============================================================================

/// One typed, already-encoded argument of an action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionArg {
    /// Fixed-width 32-byte value (identifiers go through the codec first)
    Bytes32(Bytes32),
    /// Unsigned integer
    Uint(u64),
    /// Account address, passed through untouched
    Address(String),
    Bool(bool),
    /// Free-form string argument
    Text(String),
}

/// Immutable description of one requested state-changing operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ActionDescriptor {
    capability: String,
    args: Vec<ActionArg>,
    label: String,
}

impl ActionDescriptor {
    #[must_use]
    pub fn new(capability: impl Into<String>, args: Vec<ActionArg>, label: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            args,
            label: label.into(),
        }
    }

    /// Target capability on the ledger interface (e.g. `registerEntity`)
    #[must_use]
    pub fn capability(&self) -> &str {
        &self.capability
    }

    #[must_use]
    pub fn args(&self) -> &[ActionArg] {
        &self.args
    }

    /// Human-readable label used in notifications
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Opaque in-flight identifier returned once the ledger accepted an action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(transparent)]
pub struct TransactionHandle(String);

impl TransactionHandle {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for notification text
    #[must_use]
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 14 {
            return self.0.clone();
        }
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl std::fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful terminal outcome reported by the confirmation channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConfirmationReceipt {
    pub handle: TransactionHandle,
    /// Correlation hash of the confirmed transaction
    pub correlation_hash: String,
}

/// Proof that the identity provider approved an action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct WalletApproval {
    /// Address that approved the action
    pub address: String,
    /// Signature over the action, encoding chosen by the provider
    pub signature: String,
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

/// Closed set of failure kinds every raw failure is mapped to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UserRejected,
    InsufficientResources,
    ValidationFailed,
    AuthorizationDenied,
    Expired,
    Reverted,
    NetworkTimeout,
    Unknown,
}

impl ErrorKind {
    /// Matching order, most specific first
    pub const PRIORITY: [ErrorKind; 8] = [
        ErrorKind::UserRejected,
        ErrorKind::AuthorizationDenied,
        ErrorKind::Expired,
        ErrorKind::InsufficientResources,
        ErrorKind::ValidationFailed,
        ErrorKind::Reverted,
        ErrorKind::NetworkTimeout,
        ErrorKind::Unknown,
    ];

    /// Position in [`ErrorKind::PRIORITY`]; lower wins
    #[must_use]
    pub fn priority(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|k| k == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRejected => "user_rejected",
            Self::InsufficientResources => "insufficient_resources",
            Self::ValidationFailed => "validation_failed",
            Self::AuthorizationDenied => "authorization_denied",
            Self::Expired => "expired",
            Self::Reverted => "reverted",
            Self::NetworkTimeout => "network_timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Headline shown to the user for this kind
    pub fn headline(&self) -> &'static str {
        match self {
            Self::UserRejected => "Transaction rejected in wallet",
            Self::InsufficientResources => "Insufficient funds to complete the transaction",
            Self::ValidationFailed => "The request was not valid",
            Self::AuthorizationDenied => "You are not authorized to perform this action",
            Self::Expired => "The request has expired",
            Self::Reverted => "Transaction reverted",
            Self::NetworkTimeout => "Network timed out",
            Self::Unknown => "Transaction failed",
        }
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PRIORITY
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Invalid error kind: {}", s))
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw failure as reported by a collaborator, before classification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RawFailure {
    /// Original failure message
    #[schema(example = "execution reverted: Battery does not exist")]
    pub message: String,
    /// Structured error code, when the collaborator provides one
    #[schema(example = 4001)]
    pub code: Option<i64>,
}

impl RawFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl From<&AppError> for RawFailure {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Ledger(LedgerError::Rejected { code, message }) => Self {
                message: message.clone(),
                code: *code,
            },
            AppError::Ledger(ledger_err) => Self::new(ledger_err.to_string()),
            AppError::Wallet(wallet_err @ WalletError::UserRejected(_)) => {
                Self::with_code(wallet_err.to_string(), USER_REJECTED_CODE)
            }
            AppError::Wallet(wallet_err) => Self::new(wallet_err.to_string()),
            other => Self::new(other.to_string()),
        }
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// State of one attempt in the coordinator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    /// Action handed to the ledger client, no handle yet
    Submitting,
    /// Wallet prompt is open
    AwaitingApproval,
    /// Handle received, waiting for the ledger outcome
    AwaitingConfirmation,
    Confirmed,
    Failed,
    /// The UI gave up waiting; the operation may still land
    TimedOut,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::AwaitingApproval => "awaiting_approval",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::TimedOut)
    }

    /// An attempt is in flight
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::AwaitingApproval | Self::AwaitingConfirmation
        )
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "submitting" => Ok(Self::Submitting),
            "awaiting_approval" => Ok(Self::AwaitingApproval),
            "awaiting_confirmation" => Ok(Self::AwaitingConfirmation),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            "timed_out" => Ok(Self::TimedOut),
            _ => Err(format!("Invalid lifecycle state: {}", s)),
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The coordinator's view of the current (or last) attempt at one call site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LifecycleRecord {
    /// Owning call site
    #[schema(example = "battery-registration")]
    pub call_site: String,
    /// Token of the current attempt; 0 before the first run
    pub attempt_token: u64,
    pub state: LifecycleState,
    /// Capability of the current attempt
    pub capability: Option<String>,
    /// Label of the current attempt, retained for terminal notifications
    pub label: Option<String>,
    pub handle: Option<TransactionHandle>,
    /// The single notification currently visible for this attempt
    pub notification_id: Option<NotificationId>,
    /// Set only in `failed` and `timed_out`
    pub error_kind: Option<ErrorKind>,
    /// Original failure message
    pub error_message: Option<String>,
    pub correlation_hash: Option<String>,
    /// When `awaiting_confirmation` gives up
    pub deadline: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LifecycleRecord {
    #[must_use]
    pub fn idle(call_site: impl Into<String>, attempt_token: u64) -> Self {
        Self {
            call_site: call_site.into(),
            attempt_token,
            state: LifecycleState::Idle,
            capability: None,
            label: None,
            handle: None,
            notification_id: None,
            error_kind: None,
            error_message: None,
            correlation_hash: None,
            deadline: None,
            started_at: None,
            updated_at: Utc::now(),
        }
    }

    /// `error_kind` is present exactly in the failure states
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.error_kind.is_some()
            == matches!(self.state, LifecycleState::Failed | LifecycleState::TimedOut)
    }
}

/// Policy for `run` while an attempt is still in flight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// Drop the prior attempt and start fresh
    #[default]
    Supersede,
    /// Refuse until the prior attempt resolves
    Reject,
}

impl std::str::FromStr for ReentryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supersede" => Ok(Self::Supersede),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("Invalid reentry policy: {}", s)),
        }
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Identifier assigned by the notification surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual style of a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
    Warning,
    Info,
}

/// Text of a notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct NotificationMessage {
    #[schema(example = "Register battery confirmed")]
    pub title: String,
    pub description: Option<String>,
    /// Call site that owns the notification
    pub source: Option<String>,
}

impl NotificationMessage {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A notification as currently held by a surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: NotificationMessage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// REQUESTS & RESPONSES
// ============================================================================

/// Typed argument as accepted by the API, before encoding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgumentInput {
    /// Human identifier, encoded to 32 bytes
    Identifier(String),
    /// Raw 32-byte value as hex
    Bytes32(String),
    Uint(u64),
    Address(String),
    Bool(bool),
    Text(String),
}

/// Request to run one action at a call site
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RunActionRequest {
    /// Capability name on the ledger interface
    #[validate(length(min = 1, max = 64, message = "Capability must be 1-64 characters"))]
    #[schema(example = "registerBattery")]
    pub capability: String,
    /// Label shown in notifications
    #[validate(length(min = 1, max = 128, message = "Label must be 1-128 characters"))]
    #[schema(example = "Register battery NV-2024-001234")]
    pub label: String,
    /// Ordered arguments
    #[validate(length(max = 16, message = "At most 16 arguments are allowed"))]
    #[serde(default)]
    pub args: Vec<ArgumentInput>,
}

impl RunActionRequest {
    #[must_use]
    pub fn new(capability: impl Into<String>, label: impl Into<String>, args: Vec<ArgumentInput>) -> Self {
        Self {
            capability: capability.into(),
            label: label.into(),
            args,
        }
    }
}

/// Per-call-site policy overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CallSiteOptions {
    /// Deadline for `awaiting_confirmation`, in milliseconds
    #[validate(range(min = 1, max = 3_600_000, message = "Timeout must be between 1ms and 1h"))]
    #[schema(example = 30000)]
    pub confirmation_timeout_ms: Option<u64>,
    /// Delay before a success notification is dismissed, in milliseconds
    #[validate(range(min = 1, max = 600_000, message = "Auto-dismiss must be between 1ms and 10min"))]
    #[schema(example = 5000)]
    pub auto_dismiss_ms: Option<u64>,
    pub reentry: Option<ReentryPolicy>,
}

/// Request to encode a human identifier
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EncodeIdentifierRequest {
    #[schema(example = "NV-2024-001234")]
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EncodeIdentifierResponse {
    pub bytes32: Bytes32,
}

/// Request to decode a 32-byte value back to an identifier
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecodeIdentifierRequest {
    /// 64 hex digits, optionally `0x`-prefixed
    #[schema(example = "0x4e562d323032342d303031323334000000000000000000000000000000000000")]
    pub bytes32: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecodeIdentifierResponse {
    pub identifier: String,
}

/// Classification of one raw failure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassifyResponse {
    pub kind: ErrorKind,
    /// User-facing headline for the kind
    #[schema(example = "Transaction rejected in wallet")]
    pub headline: String,
}

impl From<ErrorKind> for ClassifyResponse {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            headline: kind.headline().to_string(),
        }
    }
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Ledger client health
    pub ledger: HealthStatus,
    /// Number of registered call sites
    pub call_sites: usize,
    pub timestamp: DateTime<Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(ledger: HealthStatus, call_sites: usize) -> Self {
        Self {
            status: ledger,
            ledger,
            call_sites,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "validation_error")]
    pub r#type: String,
    /// Human-readable error message
    #[schema(example = "Label must be 1-128 characters")]
    pub message: String,
}
