//! HTTP ledger gateway client.
//!
//! Actions are posted to `{base}/actions`; their outcome is polled from
//! `{base}/transactions/{handle}` until the gateway reports a terminal status.
//! The wait itself is unbounded here: the coordinator's deadline bounds it.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    ActionArg, ActionDescriptor, AppError, ConfirmationReceipt, LedgerClient, LedgerError,
    TransactionHandle, WalletApproval,
};

/// Configuration for the gateway client
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Delay between confirmation polls
    pub poll_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitActionBody<'a> {
    capability: &'a str,
    args: &'a [ActionArg],
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    approval: Option<&'a WalletApproval>,
}

#[derive(Debug, Deserialize)]
struct SubmitActionResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

impl From<GatewayErrorDetail> for AppError {
    fn from(detail: GatewayErrorDetail) -> Self {
        AppError::Ledger(LedgerError::Rejected {
            code: detail.code,
            message: detail.message,
        })
    }
}

/// Status document served for a submitted handle
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum TransactionStatusBody {
    Pending,
    Confirmed { hash: String },
    Failed { error: GatewayErrorDetail },
}

/// Ledger client speaking the gateway's JSON protocol
pub struct GatewayLedgerClient {
    http_client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    config: GatewayConfig,
}

impl GatewayLedgerClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        config: GatewayConfig,
    ) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Ledger(LedgerError::Connection(e.to_string())))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            config,
        })
    }

    pub fn with_defaults(base_url: &str) -> Result<Self, AppError> {
        Self::new(base_url, None, GatewayConfig::default())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        let response = self.authorized(builder).send().await.map_err(map_reqwest_error)?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GatewayErrorBody>(&text) {
            Ok(body) => Err(body.error.into()),
            Err(_) => Err(AppError::Ledger(LedgerError::Rejected {
                code: None,
                message: format!("Gateway returned {}: {}", status, text.trim()),
            })),
        }
    }

    async fn transaction_status(
        &self,
        handle: &TransactionHandle,
    ) -> Result<TransactionStatusBody, AppError> {
        let request = self
            .http_client
            .get(self.url(&format!("transactions/{}", handle.as_str())));
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::InvalidResponse(e.to_string())))
    }
}

#[async_trait]
impl LedgerClient for GatewayLedgerClient {
    async fn health_check(&self) -> Result<(), AppError> {
        let request = self.http_client.get(self.url("health"));
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self, action, approval), fields(capability = %action.capability()))]
    async fn submit(
        &self,
        action: &ActionDescriptor,
        approval: Option<&WalletApproval>,
    ) -> Result<TransactionHandle, AppError> {
        let body = SubmitActionBody {
            capability: action.capability(),
            args: action.args(),
            label: action.label(),
            approval,
        };
        let request = self.http_client.post(self.url("actions")).json(&body);

        let response: SubmitActionResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::InvalidResponse(e.to_string())))?;

        if response.handle.is_empty() {
            return Err(AppError::Ledger(LedgerError::InvalidResponse(
                "empty handle".to_string(),
            )));
        }
        info!(handle = %response.handle, "Action accepted by gateway");
        Ok(TransactionHandle::new(response.handle))
    }

    #[instrument(skip(self), fields(handle = %handle))]
    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
    ) -> Result<ConfirmationReceipt, AppError> {
        loop {
            match self.transaction_status(handle).await {
                Ok(TransactionStatusBody::Confirmed { hash }) => {
                    info!(hash = %hash, "Transaction confirmed");
                    return Ok(ConfirmationReceipt {
                        handle: handle.clone(),
                        correlation_hash: hash,
                    });
                }
                Ok(TransactionStatusBody::Failed { error }) => {
                    warn!(error = %error.message, "Transaction failed");
                    return Err(error.into());
                }
                Ok(TransactionStatusBody::Pending) => {
                    debug!("Transaction not yet confirmed");
                }
                Err(e) => {
                    warn!(error = %e, "Error checking transaction status");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Ledger(LedgerError::Timeout(err.to_string()))
    } else {
        AppError::Ledger(LedgerError::Connection(err.to_string()))
    }
}
