//! In-process ledger with configurable latency.
//!
//! Used when no gateway is configured. Capabilities prefixed with `fail:`
//! are accepted but revert on confirmation, with the remainder as the reason.

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    ActionDescriptor, AppError, ConfirmationReceipt, LedgerClient, LedgerError, TransactionHandle,
    WalletApproval,
};

const FAILURE_PREFIX: &str = "fail:";

#[derive(Debug, Clone)]
pub struct SimulatedLedgerConfig {
    pub submit_latency: Duration,
    pub confirm_latency: Duration,
}

impl Default for SimulatedLedgerConfig {
    fn default() -> Self {
        Self {
            submit_latency: Duration::from_millis(500),
            confirm_latency: Duration::from_millis(3000),
        }
    }
}

pub struct SimulatedLedgerClient {
    config: SimulatedLedgerConfig,
    /// Capability of every submitted handle nobody is waiting on yet
    pending: DashMap<TransactionHandle, String>,
}

impl SimulatedLedgerClient {
    #[must_use]
    pub fn new(config: SimulatedLedgerConfig) -> Self {
        Self {
            config,
            pending: DashMap::new(),
        }
    }

    /// Number of submitted actions whose confirmation has not been awaited
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn correlation_hash(handle: &TransactionHandle, capability: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(handle.as_str().as_bytes());
        hasher.update(capability.as_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }
}

impl Default for SimulatedLedgerClient {
    fn default() -> Self {
        Self::new(SimulatedLedgerConfig::default())
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedgerClient {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    #[instrument(skip(self, action, approval), fields(capability = %action.capability()))]
    async fn submit(
        &self,
        action: &ActionDescriptor,
        approval: Option<&WalletApproval>,
    ) -> Result<TransactionHandle, AppError> {
        tokio::time::sleep(self.config.submit_latency).await;

        if action.capability().trim().is_empty() {
            return Err(AppError::Ledger(LedgerError::Rejected {
                code: Some(-32602),
                message: "Invalid capability: empty".to_string(),
            }));
        }

        let handle = TransactionHandle::new(format!("0x{}", Uuid::new_v4().simple()));
        self.pending
            .insert(handle.clone(), action.capability().to_string());
        info!(
            handle = %handle,
            approved_by = ?approval.map(|a| a.address.as_str()),
            "Simulated submission accepted"
        );
        Ok(handle)
    }

    #[instrument(skip(self), fields(handle = %handle))]
    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
    ) -> Result<ConfirmationReceipt, AppError> {
        // Claimed up front: an abandoned wait must not leave an entry
        let (_, capability) = self.pending.remove(handle).ok_or_else(|| {
            AppError::Ledger(LedgerError::Rejected {
                code: None,
                message: format!("Transaction {} not found", handle),
            })
        })?;

        tokio::time::sleep(self.config.confirm_latency).await;

        if let Some(reason) = capability.strip_prefix(FAILURE_PREFIX) {
            warn!(reason = %reason, "Simulated transaction reverted");
            return Err(AppError::Ledger(LedgerError::Reverted(reason.to_string())));
        }

        Ok(ConfirmationReceipt {
            handle: handle.clone(),
            correlation_hash: Self::correlation_hash(handle, &capability),
        })
    }
}
