//! Domain traits defining contracts for external systems.

use async_trait::async_trait;

use super::error::AppError;
use super::types::{
    ActionDescriptor, ConfirmationReceipt, Notification, NotificationId, NotificationKind,
    NotificationMessage, TransactionHandle, WalletApproval,
};

/// Ledger client trait for submitting actions and observing their outcome
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Check ledger connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Hand an action to the ledger. Resolves once the ledger accepted it for
    /// processing; the returned handle is not yet confirmed.
    async fn submit(
        &self,
        action: &ActionDescriptor,
        approval: Option<&WalletApproval>,
    ) -> Result<TransactionHandle, AppError>;

    /// Wait for the single terminal outcome of a submitted action.
    /// `Ok` is a confirmed success; any `Err` is a failed outcome.
    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
    ) -> Result<ConfirmationReceipt, AppError>;
}

/// Identity provider that supplies an address and approves actions
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Address actions are submitted from
    fn address(&self) -> String;

    /// Ask the holder to approve an action. May wait on a human.
    async fn approve(&self, action: &ActionDescriptor) -> Result<WalletApproval, AppError>;
}

/// The process-wide notification surface.
///
/// `dismiss` of an unknown or already-dismissed id must be a no-op.
pub trait NotificationSurface: Send + Sync {
    fn show(&self, message: &NotificationMessage, kind: NotificationKind) -> NotificationId;

    fn update(&self, id: &NotificationId, message: &NotificationMessage, kind: NotificationKind);

    fn dismiss(&self, id: &NotificationId);

    /// Currently visible notifications, oldest first
    fn visible(&self) -> Result<Vec<Notification>, AppError> {
        Err(AppError::NotSupported(
            "visible not implemented".to_string(),
        ))
    }
}
