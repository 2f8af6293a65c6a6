//! Application state management.

use std::sync::Arc;

use crate::domain::{LedgerClient, NotificationSurface, WalletProvider};

use super::classifier::ErrorClassifier;
use super::coordinator::CoordinatorConfig;
use super::service::{DEFAULT_MAX_CALL_SITES, DashboardService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DashboardService>,
    pub ledger: Arc<dyn LedgerClient>,
    pub surface: Arc<dyn NotificationSurface>,
    pub classifier: Arc<ErrorClassifier>,
    /// Optional approval stage ahead of every submission
    pub wallet: Option<Arc<dyn WalletProvider>>,
    /// Policy for call sites registered without overrides
    pub defaults: CoordinatorConfig,
    pub max_call_sites: usize,
}

impl AppState {
    /// Create a new application state with the default classifier and policy
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>, surface: Arc<dyn NotificationSurface>) -> Self {
        Self::with_classifier(ledger, surface, Arc::new(ErrorClassifier::default()))
    }

    #[must_use]
    pub fn with_classifier(
        ledger: Arc<dyn LedgerClient>,
        surface: Arc<dyn NotificationSurface>,
        classifier: Arc<ErrorClassifier>,
    ) -> Self {
        let service = Arc::new(DashboardService::new(
            Arc::clone(&ledger),
            Arc::clone(&surface),
            Arc::clone(&classifier),
        ));
        Self {
            service,
            ledger,
            surface,
            classifier,
            wallet: None,
            defaults: CoordinatorConfig::default(),
            max_call_sites: DEFAULT_MAX_CALL_SITES,
        }
    }

    /// Add a wallet approval stage (builder pattern).
    /// This rebuilds the service, so call it before any call site is opened.
    #[must_use]
    pub fn with_wallet(mut self, wallet: Arc<dyn WalletProvider>) -> Self {
        self.wallet = Some(wallet);
        self.rebuild_service();
        self
    }

    /// Replace the default call-site policy (builder pattern)
    #[must_use]
    pub fn with_defaults(mut self, defaults: CoordinatorConfig) -> Self {
        self.defaults = defaults;
        self.rebuild_service();
        self
    }

    /// Bound the number of registered call sites (builder pattern)
    #[must_use]
    pub fn with_max_call_sites(mut self, max_call_sites: usize) -> Self {
        self.max_call_sites = max_call_sites;
        self.rebuild_service();
        self
    }

    fn rebuild_service(&mut self) {
        let mut service = DashboardService::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.surface),
            Arc::clone(&self.classifier),
        )
        .with_defaults(self.defaults)
        .with_max_call_sites(self.max_call_sites);
        if let Some(wallet) = &self.wallet {
            service = service.with_wallet(Arc::clone(wallet));
        }
        self.service = Arc::new(service);
    }
}
