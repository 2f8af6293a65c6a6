//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::{
    ActionDescriptor, AppError, ConfirmationReceipt, LedgerClient, LedgerError, Notification,
    NotificationId, NotificationKind, NotificationMessage, NotificationSurface, TransactionHandle,
    WalletApproval, WalletError, WalletProvider,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
    pub error_code: Option<i64>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            error_code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.error_code = Some(code);
        self
    }

    fn message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string())
    }
}

/// Scripted outcome of `await_confirmation`
#[derive(Debug, Clone)]
pub enum ConfirmBehavior {
    Confirm,
    /// Fail with this code and message, passed through verbatim
    Fail { code: Option<i64>, message: String },
    /// Never resolve
    Hang,
}

/// Mock ledger client with scripted latencies and outcomes
pub struct MockLedgerClient {
    submissions: Arc<Mutex<Vec<ActionDescriptor>>>,
    approvals: Arc<Mutex<Vec<WalletApproval>>>,
    config: MockConfig,
    confirm: ConfirmBehavior,
    submit_delay: Duration,
    confirm_delay: Duration,
    next_handle: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockLedgerClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            submissions: Arc::new(Mutex::new(Vec::new())),
            approvals: Arc::new(Mutex::new(Vec::new())),
            config,
            confirm: ConfirmBehavior::Confirm,
            submit_delay: Duration::ZERO,
            confirm_delay: Duration::ZERO,
            next_handle: AtomicU64::new(1),
            is_healthy: AtomicBool::new(true),
        }
    }

    /// Ledger that refuses every submission
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    #[must_use]
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    #[must_use]
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    #[must_use]
    pub fn with_confirm_behavior(mut self, behavior: ConfirmBehavior) -> Self {
        self.confirm = behavior;
        self
    }

    /// Shorthand for a confirmation that fails with `message`
    #[must_use]
    pub fn failing_confirmation(self, message: impl Into<String>) -> Self {
        self.with_confirm_behavior(ConfirmBehavior::Fail {
            code: None,
            message: message.into(),
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn get_submissions(&self) -> Vec<ActionDescriptor> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn get_approvals(&self) -> Vec<WalletApproval> {
        self.approvals.lock().unwrap().clone()
    }

    /// Correlation hash the mock reports for a handle
    #[must_use]
    pub fn correlation_hash_for(handle: &TransactionHandle) -> String {
        format!("0xhash-{}", handle.as_str())
    }
}

impl Default for MockLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Ledger(LedgerError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    async fn submit(
        &self,
        action: &ActionDescriptor,
        approval: Option<&WalletApproval>,
    ) -> Result<TransactionHandle, AppError> {
        tokio::time::sleep(self.submit_delay).await;
        if self.config.should_fail {
            return Err(AppError::Ledger(LedgerError::Rejected {
                code: self.config.error_code,
                message: self.config.message(),
            }));
        }

        self.submissions.lock().unwrap().push(action.clone());
        if let Some(approval) = approval {
            self.approvals.lock().unwrap().push(approval.clone());
        }
        let n = self.next_handle.fetch_add(1, Ordering::Relaxed);
        Ok(TransactionHandle::new(format!("0xmock{:04}", n)))
    }

    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
    ) -> Result<ConfirmationReceipt, AppError> {
        tokio::time::sleep(self.confirm_delay).await;
        match &self.confirm {
            ConfirmBehavior::Confirm => Ok(ConfirmationReceipt {
                handle: handle.clone(),
                correlation_hash: Self::correlation_hash_for(handle),
            }),
            ConfirmBehavior::Fail { code, message } => Err(AppError::Ledger(LedgerError::Rejected {
                code: *code,
                message: message.clone(),
            })),
            ConfirmBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Mock wallet that approves or rejects after an optional delay
pub struct MockWallet {
    address: String,
    config: MockConfig,
    delay: Duration,
    requests: AtomicU64,
}

impl MockWallet {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            config: MockConfig::success(),
            delay: Duration::ZERO,
            requests: AtomicU64::new(0),
        }
    }

    /// Wallet whose holder rejects every prompt
    #[must_use]
    pub fn rejecting(address: impl Into<String>) -> Self {
        Self {
            config: MockConfig::failure("User rejected the request."),
            ..Self::new(address)
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn approve(&self, action: &ActionDescriptor) -> Result<WalletApproval, AppError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.delay).await;
        if self.config.should_fail {
            return Err(AppError::Wallet(WalletError::UserRejected(
                self.config.message(),
            )));
        }
        Ok(WalletApproval {
            address: self.address.clone(),
            signature: format!("mock-signature-{}", action.capability()),
        })
    }
}

/// One call made against the recording surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Show {
        id: NotificationId,
        kind: NotificationKind,
        title: String,
    },
    Update {
        id: NotificationId,
        kind: NotificationKind,
        title: String,
    },
    Dismiss {
        id: NotificationId,
    },
}

#[derive(Default)]
struct SurfaceLog {
    visible: Vec<Notification>,
    operations: Vec<SurfaceOp>,
    max_visible: usize,
    next_id: u64,
}

/// Notification surface that records every call and tracks how many
/// notifications were visible at once
#[derive(Default)]
pub struct RecordingNotificationSurface {
    log: Mutex<SurfaceLog>,
}

impl RecordingNotificationSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible_count(&self) -> usize {
        self.log.lock().unwrap().visible.len()
    }

    /// Highest number of simultaneously visible notifications so far
    pub fn max_visible(&self) -> usize {
        self.log.lock().unwrap().max_visible
    }

    pub fn shown_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Show { .. }))
            .count()
    }

    pub fn operations(&self) -> Vec<SurfaceOp> {
        self.log.lock().unwrap().operations.clone()
    }

    /// The most recently shown or updated notification that is still visible
    pub fn current(&self) -> Option<Notification> {
        self.log
            .lock()
            .unwrap()
            .visible
            .iter()
            .max_by_key(|n| n.updated_at)
            .cloned()
    }

    /// Title of the last show or update, visible or not
    pub fn last_title(&self) -> Option<String> {
        self.log
            .lock()
            .unwrap()
            .operations
            .iter()
            .rev()
            .find_map(|op| match op {
                SurfaceOp::Show { title, .. } | SurfaceOp::Update { title, .. } => {
                    Some(title.clone())
                }
                SurfaceOp::Dismiss { .. } => None,
            })
    }

    /// Description of the most recently touched visible notification
    pub fn last_description(&self) -> Option<String> {
        self.current().and_then(|n| n.message.description)
    }
}

impl NotificationSurface for RecordingNotificationSurface {
    fn show(&self, message: &NotificationMessage, kind: NotificationKind) -> NotificationId {
        let mut log = self.log.lock().unwrap();
        log.next_id += 1;
        let id = NotificationId::new(format!("rec-{}", log.next_id));
        let now = Utc::now();
        log.visible.push(Notification {
            id: id.clone(),
            kind,
            message: message.clone(),
            created_at: now,
            updated_at: now,
        });
        log.max_visible = log.max_visible.max(log.visible.len());
        log.operations.push(SurfaceOp::Show {
            id: id.clone(),
            kind,
            title: message.title.clone(),
        });
        id
    }

    fn update(&self, id: &NotificationId, message: &NotificationMessage, kind: NotificationKind) {
        let mut log = self.log.lock().unwrap();
        if let Some(existing) = log.visible.iter_mut().find(|n| &n.id == id) {
            existing.kind = kind;
            existing.message = message.clone();
            existing.updated_at = Utc::now();
        }
        log.operations.push(SurfaceOp::Update {
            id: id.clone(),
            kind,
            title: message.title.clone(),
        });
    }

    fn dismiss(&self, id: &NotificationId) {
        let mut log = self.log.lock().unwrap();
        log.visible.retain(|n| &n.id != id);
        log.operations.push(SurfaceOp::Dismiss { id: id.clone() });
    }

    fn visible(&self) -> Result<Vec<Notification>, AppError> {
        Ok(self.log.lock().unwrap().visible.clone())
    }
}
