//! Dashboard service: the registry of call sites and their coordinators.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    ActionArg, ActionDescriptor, AppError, ArgumentInput, Bytes32, CallSiteOptions, ErrorKind,
    HealthResponse, HealthStatus, LedgerClient, LifecycleError, LifecycleRecord, Notification,
    NotificationSurface, RawFailure, RunActionRequest, ValidationError, WalletProvider,
    decode_identifier, encode_identifier,
};

use super::classifier::ErrorClassifier;
use super::coordinator::{Collaborators, CoordinatorConfig, LifecycleCoordinator};

/// Maximum length of a call-site id
const MAX_CALL_SITE_LEN: usize = 64;

/// Default bound on registered call sites, each of which owns a driver task
pub const DEFAULT_MAX_CALL_SITES: usize = 1024;

/// Application service owning one coordinator per call site
pub struct DashboardService {
    coordinators: DashMap<String, Arc<LifecycleCoordinator>>,
    collaborators: Collaborators,
    defaults: CoordinatorConfig,
    max_call_sites: usize,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        surface: Arc<dyn NotificationSurface>,
        classifier: Arc<ErrorClassifier>,
    ) -> Self {
        Self {
            coordinators: DashMap::new(),
            collaborators: Collaborators {
                ledger,
                wallet: None,
                surface,
                classifier,
            },
            defaults: CoordinatorConfig::default(),
            max_call_sites: DEFAULT_MAX_CALL_SITES,
        }
    }

    /// Route every submission through a wallet approval first
    #[must_use]
    pub fn with_wallet(mut self, wallet: Arc<dyn WalletProvider>) -> Self {
        self.collaborators.wallet = Some(wallet);
        self
    }

    /// Policy for call sites registered without overrides
    #[must_use]
    pub fn with_defaults(mut self, defaults: CoordinatorConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Bound the registry; registrations beyond it fail with `RegistryFull`
    #[must_use]
    pub fn with_max_call_sites(mut self, max_call_sites: usize) -> Self {
        self.max_call_sites = max_call_sites;
        self
    }

    #[must_use]
    pub fn defaults(&self) -> CoordinatorConfig {
        self.defaults
    }

    /// Register a call site with optional policy overrides
    #[instrument(skip(self, options))]
    pub fn open_call_site(
        &self,
        call_site: &str,
        options: &CallSiteOptions,
    ) -> Result<LifecycleRecord, AppError> {
        validate_call_site(call_site)?;
        options.validate().map_err(|e| {
            warn!(error = %e, "Call-site options rejected");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        if self.coordinators.contains_key(call_site) {
            return Err(LifecycleError::CallSiteExists(call_site.to_string()).into());
        }
        self.ensure_capacity()?;

        match self.coordinators.entry(call_site.to_string()) {
            Entry::Occupied(_) => Err(LifecycleError::CallSiteExists(call_site.to_string()).into()),
            Entry::Vacant(slot) => {
                let config = self.defaults.with_options(options);
                let coordinator =
                    LifecycleCoordinator::spawn(call_site, self.collaborators.clone(), config);
                let record = coordinator.record();
                slot.insert(Arc::new(coordinator));
                info!(call_site = %call_site, "Call site registered");
                Ok(record)
            }
        }
    }

    /// Run an action at a call site, registering it with defaults if needed
    #[instrument(skip(self, request), fields(capability = %request.capability))]
    pub async fn run_action(
        &self,
        call_site: &str,
        request: &RunActionRequest,
    ) -> Result<LifecycleRecord, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;
        let action = build_action(request)?;

        let coordinator = self.coordinator_or_open(call_site)?;
        coordinator.run(action).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, call_site: &str) -> Result<LifecycleRecord, AppError> {
        self.coordinator(call_site)?.cancel().await
    }

    #[instrument(skip(self))]
    pub async fn acknowledge(&self, call_site: &str) -> Result<LifecycleRecord, AppError> {
        self.coordinator(call_site)?.acknowledge().await
    }

    pub fn record(&self, call_site: &str) -> Result<LifecycleRecord, AppError> {
        Ok(self.coordinator(call_site)?.record())
    }

    /// Records of every registered call site, ordered by id
    pub fn call_sites(&self) -> Vec<LifecycleRecord> {
        let mut records: Vec<LifecycleRecord> = self
            .coordinators
            .iter()
            .map(|entry| entry.value().record())
            .collect();
        records.sort_by(|a, b| a.call_site.cmp(&b.call_site));
        records
    }

    /// Tear a call site down: cancel, release its notification, stop its task
    #[instrument(skip(self))]
    pub async fn close_call_site(&self, call_site: &str) -> Result<LifecycleRecord, AppError> {
        let (_, coordinator) = self
            .coordinators
            .remove(call_site)
            .ok_or_else(|| LifecycleError::CallSiteNotFound(call_site.to_string()))?;
        let record = coordinator.shutdown().await?;
        info!(call_site = %call_site, "Call site closed");
        Ok(record)
    }

    pub fn notifications(&self) -> Result<Vec<Notification>, AppError> {
        self.collaborators.surface.visible()
    }

    #[must_use]
    pub fn classify(&self, failure: &RawFailure) -> ErrorKind {
        self.collaborators.classifier.classify(failure)
    }

    pub fn encode_identifier(&self, identifier: &str) -> Result<Bytes32, AppError> {
        Ok(encode_identifier(identifier)?)
    }

    #[must_use]
    pub fn decode_identifier(&self, value: &Bytes32) -> String {
        decode_identifier(value)
    }

    /// Perform health check on the ledger
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let ledger = match self.collaborators.ledger.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = %e, "Ledger health check failed");
                HealthStatus::Unhealthy
            }
        };
        HealthResponse::new(ledger, self.coordinators.len())
    }

    // Checked outside any entry guard: `len` takes every shard lock
    fn ensure_capacity(&self) -> Result<(), AppError> {
        if self.coordinators.len() >= self.max_call_sites {
            warn!(limit = self.max_call_sites, "Call-site registry full");
            return Err(LifecycleError::RegistryFull(self.max_call_sites).into());
        }
        Ok(())
    }

    fn coordinator(&self, call_site: &str) -> Result<Arc<LifecycleCoordinator>, AppError> {
        self.coordinators
            .get(call_site)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LifecycleError::CallSiteNotFound(call_site.to_string()).into())
    }

    fn coordinator_or_open(&self, call_site: &str) -> Result<Arc<LifecycleCoordinator>, AppError> {
        validate_call_site(call_site)?;
        if let Ok(existing) = self.coordinator(call_site) {
            return Ok(existing);
        }
        self.ensure_capacity()?;

        let entry = self
            .coordinators
            .entry(call_site.to_string())
            .or_insert_with(|| {
                info!(call_site = %call_site, "Call site registered on first run");
                Arc::new(LifecycleCoordinator::spawn(
                    call_site,
                    self.collaborators.clone(),
                    self.defaults,
                ))
            });
        Ok(Arc::clone(entry.value()))
    }
}

fn validate_call_site(call_site: &str) -> Result<(), AppError> {
    let valid = !call_site.is_empty()
        && call_site.len() <= MAX_CALL_SITE_LEN
        && call_site
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: "call_site".to_string(),
            message: format!(
                "must be 1-{} characters of letters, digits, '-', '_' or '.'",
                MAX_CALL_SITE_LEN
            ),
        }
        .into())
    }
}

/// Convert API arguments into ledger arguments, encoding identifiers
fn build_action(request: &RunActionRequest) -> Result<ActionDescriptor, AppError> {
    let args = request
        .args
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let arg = match input {
                ArgumentInput::Identifier(value) => ActionArg::Bytes32(encode_identifier(value)?),
                ArgumentInput::Bytes32(hex) => ActionArg::Bytes32(Bytes32::from_hex(hex)?),
                ArgumentInput::Uint(value) => ActionArg::Uint(*value),
                ArgumentInput::Address(value) => {
                    if value.trim().is_empty() {
                        return Err(ValidationError::InvalidField {
                            field: format!("args[{}]", index),
                            message: "address cannot be empty".to_string(),
                        }
                        .into());
                    }
                    ActionArg::Address(value.clone())
                }
                ArgumentInput::Bool(value) => ActionArg::Bool(*value),
                ArgumentInput::Text(value) => ActionArg::Text(value.clone()),
            };
            Ok(arg)
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(ActionDescriptor::new(
        request.capability.clone(),
        args,
        request.label.clone(),
    ))
}
