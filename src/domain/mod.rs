//! Domain layer containing core types, the identifier codec, traits, and error definitions.

pub mod error;
pub mod identifier;
pub mod traits;
pub mod types;

pub use error::{
    AppError, CodecError, ConfigError, LedgerError, LifecycleError, ValidationError, WalletError,
};
pub use identifier::{Bytes32, IDENTIFIER_WIDTH, decode_identifier, encode_identifier};
pub use traits::{LedgerClient, NotificationSurface, WalletProvider};
pub use types::{
    ActionArg, ActionDescriptor, ArgumentInput, CallSiteOptions, ClassifyResponse,
    ConfirmationReceipt, DecodeIdentifierRequest, DecodeIdentifierResponse,
    EncodeIdentifierRequest, EncodeIdentifierResponse, ErrorDetail, ErrorKind, ErrorResponse,
    HealthResponse, HealthStatus, LifecycleRecord, LifecycleState, Notification, NotificationId, NotificationKind, NotificationMessage, RawFailure,
    ReentryPolicy, RunActionRequest, TransactionHandle, UNAUTHORIZED_CODE, USER_REJECTED_CODE,
    WalletApproval,
};
