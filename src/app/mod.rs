//! Application layer: classification, notification flow, the lifecycle
//! machine and its coordinators, and shared state.

pub mod classifier;
pub mod coordinator;
pub mod machine;
pub mod messages;
pub mod notifier;
pub mod service;
pub mod state;

pub use classifier::{ClassificationRule, ErrorClassifier, default_rules};
pub use coordinator::{Collaborators, CoordinatorConfig, LifecycleCoordinator};
pub use machine::{Effect, LifecycleEvent, LifecycleMachine};
pub use notifier::NotificationChannel;
pub use service::{DEFAULT_MAX_CALL_SITES, DashboardService};
pub use state::AppState;
