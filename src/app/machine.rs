//! The lifecycle state machine for one call site.
//!
//! The machine is synchronous and owns the [`LifecycleRecord`] plus the one
//! notification visible for it. Call-site operations (`run`, `cancel`,
//! `acknowledge`) and asynchronous results ([`LifecycleEvent`]) mutate it and
//! return [`Effect`]s that the coordinator task carries out: spawning the
//! submission, the confirmation wait and the timers, or aborting them.
//!
//! Every event carries the attempt token it was issued for. Events for any
//! other token, or that do not apply to the current state, are dropped
//! without touching the record or the notification surface.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{
    ActionDescriptor, AppError, ConfirmationReceipt, ErrorKind, LifecycleError, LifecycleRecord,
    LifecycleState, NotificationKind, NotificationMessage, RawFailure, ReentryPolicy,
    TransactionHandle,
};

use super::classifier::ErrorClassifier;
use super::coordinator::CoordinatorConfig;
use super::messages;
use super::notifier::NotificationChannel;

/// Asynchronous result delivered back to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The wallet prompt opened
    ApprovalRequested { token: u64 },
    /// The ledger accepted the action
    Submitted { token: u64, handle: TransactionHandle },
    /// Wallet or ledger refused the action before a handle existed
    SubmitFailed { token: u64, failure: RawFailure },
    Confirmed { token: u64, receipt: ConfirmationReceipt },
    ConfirmationFailed { token: u64, failure: RawFailure },
    DeadlineElapsed { token: u64 },
    AutoDismiss { token: u64 },
}

impl LifecycleEvent {
    #[must_use]
    pub fn token(&self) -> u64 {
        match self {
            Self::ApprovalRequested { token }
            | Self::Submitted { token, .. }
            | Self::SubmitFailed { token, .. }
            | Self::Confirmed { token, .. }
            | Self::ConfirmationFailed { token, .. }
            | Self::DeadlineElapsed { token }
            | Self::AutoDismiss { token } => *token,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::Submitted { .. } => "submitted",
            Self::SubmitFailed { .. } => "submit_failed",
            Self::Confirmed { .. } => "confirmed",
            Self::ConfirmationFailed { .. } => "confirmation_failed",
            Self::DeadlineElapsed { .. } => "deadline_elapsed",
            Self::AutoDismiss { .. } => "auto_dismiss",
        }
    }
}

/// Work the coordinator task must perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run wallet approval (if any) and ledger submission
    Submit { token: u64, action: ActionDescriptor },
    /// Subscribe to the confirmation channel
    AwaitConfirmation { token: u64, handle: TransactionHandle },
    ArmDeadline { token: u64, after: Duration },
    DisarmDeadline,
    /// Drop the confirmation subscription
    CancelConfirmation,
    ScheduleAutoDismiss { token: u64, after: Duration },
    /// Abort every outstanding task of the previous attempt
    ReleaseAll,
}

pub struct LifecycleMachine {
    record: LifecycleRecord,
    notifier: NotificationChannel,
    classifier: Arc<ErrorClassifier>,
    config: CoordinatorConfig,
    wallet_address: Option<String>,
}

impl LifecycleMachine {
    #[must_use]
    pub fn new(
        call_site: impl Into<String>,
        notifier: NotificationChannel,
        classifier: Arc<ErrorClassifier>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            record: LifecycleRecord::idle(call_site, 0),
            notifier,
            classifier,
            config,
            wallet_address: None,
        }
    }

    /// Address shown while waiting for wallet approval
    #[must_use]
    pub fn with_wallet_address(mut self, address: Option<String>) -> Self {
        self.wallet_address = address;
        self
    }

    #[must_use]
    pub fn record(&self) -> &LifecycleRecord {
        &self.record
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Start a new attempt.
    ///
    /// An attempt still in flight is either superseded or causes
    /// [`LifecycleError::AttemptInFlight`], per the configured policy.
    pub fn run(&mut self, action: ActionDescriptor) -> Result<Vec<Effect>, AppError> {
        let previous = self.record.state;
        let mut effects = Vec::new();

        if previous.is_in_flight() {
            match self.config.reentry {
                ReentryPolicy::Reject => {
                    warn!(
                        call_site = %self.record.call_site,
                        token = self.record.attempt_token,
                        state = %previous,
                        "Run rejected: attempt still in flight"
                    );
                    return Err(LifecycleError::AttemptInFlight {
                        call_site: self.record.call_site.clone(),
                        token: self.record.attempt_token,
                    }
                    .into());
                }
                ReentryPolicy::Supersede => {
                    info!(
                        call_site = %self.record.call_site,
                        token = self.record.attempt_token,
                        state = %previous,
                        "Superseding in-flight attempt"
                    );
                }
            }
        }
        if previous != LifecycleState::Idle {
            effects.push(Effect::ReleaseAll);
        }
        self.release_notification();

        let token = self.record.attempt_token + 1;
        let now = Utc::now();
        let mut record = LifecycleRecord::idle(self.record.call_site.clone(), token);
        record.state = LifecycleState::Submitting;
        record.capability = Some(action.capability().to_string());
        record.label = Some(action.label().to_string());
        record.started_at = Some(now);
        record.updated_at = now;
        self.record = record;

        let id = self
            .notifier
            .show(messages::submitting(action.label()), NotificationKind::Loading);
        self.record.notification_id = Some(id);

        info!(
            call_site = %self.record.call_site,
            token = token,
            capability = %action.capability(),
            "Attempt started"
        );

        effects.push(Effect::Submit { token, action });
        Ok(effects)
    }

    /// Abandon the current attempt (or tear down a finished one).
    /// Results that arrive later for its token are dropped.
    pub fn cancel(&mut self) -> Vec<Effect> {
        if self.record.state == LifecycleState::Idle && self.record.notification_id.is_none() {
            return Vec::new();
        }

        let from = self.record.state;
        self.reset_to_idle();
        info!(
            call_site = %self.record.call_site,
            token = self.record.attempt_token,
            from = %from,
            "Attempt cancelled"
        );
        vec![Effect::ReleaseAll]
    }

    /// Release a terminal attempt once the call site has consumed it
    pub fn acknowledge(&mut self) -> Result<Vec<Effect>, AppError> {
        if !self.record.state.is_terminal() {
            return Err(LifecycleError::NotTerminal(self.record.state).into());
        }

        let from = self.record.state;
        self.reset_to_idle();
        debug!(
            call_site = %self.record.call_site,
            token = self.record.attempt_token,
            from = %from,
            "Attempt acknowledged"
        );
        Ok(vec![Effect::ReleaseAll])
    }

    /// Apply an asynchronous result
    pub fn handle(&mut self, event: LifecycleEvent) -> Vec<Effect> {
        if event.token() != self.record.attempt_token || self.record.state == LifecycleState::Idle {
            debug!(
                call_site = %self.record.call_site,
                event = event.name(),
                event_token = event.token(),
                live_token = self.record.attempt_token,
                "Dropping stale lifecycle event"
            );
            return Vec::new();
        }

        let label = self.record.label.clone().unwrap_or_default();

        match (self.record.state, event) {
            (LifecycleState::Submitting, LifecycleEvent::ApprovalRequested { .. }) => {
                self.transition(LifecycleState::AwaitingApproval);
                let message = messages::awaiting_approval(&label, self.wallet_address.as_deref());
                self.update_notification(message, NotificationKind::Loading);
                Vec::new()
            }
            (
                LifecycleState::Submitting | LifecycleState::AwaitingApproval,
                LifecycleEvent::Submitted { token, handle },
            ) => {
                let after = self.config.confirmation_timeout;
                self.transition(LifecycleState::AwaitingConfirmation);
                self.record.deadline = chrono::Duration::from_std(after)
                    .ok()
                    .and_then(|d| Utc::now().checked_add_signed(d));
                self.record.handle = Some(handle.clone());
                self.update_notification(
                    messages::confirming(&label, &handle),
                    NotificationKind::Loading,
                );
                vec![
                    Effect::ArmDeadline { token, after },
                    Effect::AwaitConfirmation { token, handle },
                ]
            }
            (
                LifecycleState::Submitting | LifecycleState::AwaitingApproval,
                LifecycleEvent::SubmitFailed { failure, .. },
            ) => {
                self.fail(&label, failure);
                Vec::new()
            }
            (LifecycleState::AwaitingConfirmation, LifecycleEvent::Confirmed { token, receipt }) => {
                self.transition(LifecycleState::Confirmed);
                self.update_notification(
                    messages::confirmed(&label, &receipt.correlation_hash),
                    NotificationKind::Success,
                );
                self.record.correlation_hash = Some(receipt.correlation_hash);
                vec![
                    Effect::DisarmDeadline,
                    Effect::ScheduleAutoDismiss {
                        token,
                        after: self.config.auto_dismiss_after,
                    },
                ]
            }
            (
                LifecycleState::AwaitingConfirmation,
                LifecycleEvent::ConfirmationFailed { failure, .. },
            ) => {
                self.fail(&label, failure);
                vec![Effect::DisarmDeadline]
            }
            (LifecycleState::AwaitingConfirmation, LifecycleEvent::DeadlineElapsed { .. }) => {
                let waited = self.config.confirmation_timeout;
                self.transition(LifecycleState::TimedOut);
                self.record.error_kind = Some(ErrorKind::NetworkTimeout);
                self.record.error_message = Some(format!(
                    "No confirmation within {}ms",
                    waited.as_millis()
                ));

                // A distinct notification, not an update of the pending one
                self.release_notification();
                let id = self
                    .notifier
                    .show(messages::timed_out(&label, waited), NotificationKind::Warning);
                self.record.notification_id = Some(id);

                warn!(
                    call_site = %self.record.call_site,
                    token = self.record.attempt_token,
                    handle = ?self.record.handle,
                    "Confirmation deadline elapsed"
                );
                vec![Effect::CancelConfirmation]
            }
            (LifecycleState::Confirmed, LifecycleEvent::AutoDismiss { .. }) => {
                self.release_notification();
                self.record.updated_at = Utc::now();
                Vec::new()
            }
            (state, event) => {
                debug!(
                    call_site = %self.record.call_site,
                    state = %state,
                    event = event.name(),
                    "Ignoring event not applicable to current state"
                );
                Vec::new()
            }
        }
    }

    fn fail(&mut self, label: &str, failure: RawFailure) {
        let kind = self.classifier.classify(&failure);
        self.transition(LifecycleState::Failed);
        self.record.error_kind = Some(kind);
        self.update_notification(
            messages::failed(label, kind, &failure.message),
            NotificationKind::Error,
        );
        warn!(
            call_site = %self.record.call_site,
            token = self.record.attempt_token,
            kind = %kind,
            error = %failure.message,
            "Attempt failed"
        );
        self.record.error_message = Some(failure.message);
    }

    fn transition(&mut self, to: LifecycleState) {
        info!(
            call_site = %self.record.call_site,
            token = self.record.attempt_token,
            from = %self.record.state,
            to = %to,
            "Lifecycle transition"
        );
        self.record.state = to;
        self.record.updated_at = Utc::now();
    }

    fn update_notification(&mut self, message: NotificationMessage, kind: NotificationKind) {
        match &self.record.notification_id {
            Some(id) => self.notifier.update(id, message, kind),
            None => {
                let id = self.notifier.show(message, kind);
                self.record.notification_id = Some(id);
            }
        }
    }

    fn release_notification(&mut self) {
        if let Some(id) = self.record.notification_id.take() {
            self.notifier.dismiss(&id);
        }
    }

    fn reset_to_idle(&mut self) {
        self.release_notification();
        self.record = LifecycleRecord::idle(self.record.call_site.clone(), self.record.attempt_token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionArg, encode_identifier};
    use crate::test_utils::{RecordingNotificationSurface, SurfaceOp};

    fn machine_with(config: CoordinatorConfig) -> (LifecycleMachine, Arc<RecordingNotificationSurface>) {
        let surface = Arc::new(RecordingNotificationSurface::new());
        let channel = NotificationChannel::new(surface.clone(), "battery-form");
        let machine = LifecycleMachine::new(
            "battery-form",
            channel,
            Arc::new(ErrorClassifier::default()),
            config,
        );
        (machine, surface)
    }

    fn machine() -> (LifecycleMachine, Arc<RecordingNotificationSurface>) {
        machine_with(CoordinatorConfig::default())
    }

    fn register_action() -> ActionDescriptor {
        ActionDescriptor::new(
            "register",
            vec![ActionArg::Bytes32(encode_identifier("NV-2024-001234").unwrap())],
            "Register battery",
        )
    }

    fn receipt(handle: &str) -> ConfirmationReceipt {
        ConfirmationReceipt {
            handle: TransactionHandle::new(handle),
            correlation_hash: "0xfeed".to_string(),
        }
    }

    #[test]
    fn test_run_shows_submitting_and_requests_submission() {
        let (mut machine, surface) = machine();
        let effects = machine.run(register_action()).unwrap();

        assert_eq!(
            effects,
            vec![Effect::Submit {
                token: 1,
                action: register_action()
            }]
        );
        let record = machine.record();
        assert_eq!(record.state, LifecycleState::Submitting);
        assert_eq!(record.attempt_token, 1);
        assert!(record.notification_id.is_some());
        assert_eq!(surface.visible_count(), 1);
        assert_eq!(surface.last_title().as_deref(), Some("Submitting Register battery"));
    }

    #[test]
    fn test_happy_path() {
        let (mut machine, surface) = machine();
        machine.run(register_action()).unwrap();

        let effects = machine.handle(LifecycleEvent::Submitted {
            token: 1,
            handle: TransactionHandle::new("0xabc"),
        });
        assert_eq!(
            effects,
            vec![
                Effect::ArmDeadline {
                    token: 1,
                    after: Duration::from_secs(30)
                },
                Effect::AwaitConfirmation {
                    token: 1,
                    handle: TransactionHandle::new("0xabc")
                },
            ]
        );
        assert_eq!(machine.record().state, LifecycleState::AwaitingConfirmation);
        assert!(machine.record().deadline.is_some());

        let effects = machine.handle(LifecycleEvent::Confirmed {
            token: 1,
            receipt: receipt("0xabc"),
        });
        assert_eq!(
            effects,
            vec![
                Effect::DisarmDeadline,
                Effect::ScheduleAutoDismiss {
                    token: 1,
                    after: Duration::from_secs(5)
                },
            ]
        );
        let record = machine.record();
        assert_eq!(record.state, LifecycleState::Confirmed);
        assert_eq!(record.correlation_hash.as_deref(), Some("0xfeed"));
        assert!(record.is_consistent());
        assert_eq!(surface.last_title().as_deref(), Some("Register battery confirmed"));

        machine.handle(LifecycleEvent::AutoDismiss { token: 1 });
        assert!(machine.record().notification_id.is_none());
        assert_eq!(machine.record().state, LifecycleState::Confirmed);
        assert_eq!(surface.visible_count(), 0);
        assert_eq!(surface.max_visible(), 1);
        // One show, updates in place, one dismiss
        assert_eq!(surface.shown_count(), 1);
    }

    #[test]
    fn test_submit_rejection_fails_without_deadline() {
        let (mut machine, surface) = machine();
        machine.run(register_action()).unwrap();

        let effects = machine.handle(LifecycleEvent::SubmitFailed {
            token: 1,
            failure: RawFailure::with_code("User rejected the request.", 4001),
        });
        assert!(effects.is_empty());

        let record = machine.record();
        assert_eq!(record.state, LifecycleState::Failed);
        assert_eq!(record.error_kind, Some(ErrorKind::UserRejected));
        assert!(record.deadline.is_none());
        assert!(record.is_consistent());
        assert_eq!(
            surface.last_title().as_deref(),
            Some(ErrorKind::UserRejected.headline())
        );
        assert_eq!(surface.visible_count(), 1);
    }

    #[test]
    fn test_confirmation_failure_keeps_original_message() {
        let (mut machine, surface) = machine();
        machine.run(register_action()).unwrap();
        machine.handle(LifecycleEvent::Submitted {
            token: 1,
            handle: TransactionHandle::new("0xabc"),
        });

        let effects = machine.handle(LifecycleEvent::ConfirmationFailed {
            token: 1,
            failure: RawFailure::new("execution reverted: Battery does not exist"),
        });
        assert_eq!(effects, vec![Effect::DisarmDeadline]);
        assert_eq!(machine.record().error_kind, Some(ErrorKind::ValidationFailed));
        assert_eq!(
            machine.record().error_message.as_deref(),
            Some("execution reverted: Battery does not exist")
        );
        assert!(
            surface
                .last_description()
                .unwrap()
                .contains("execution reverted: Battery does not exist")
        );
    }

    #[test]
    fn test_wallet_approval_stage() {
        let (machine, surface) = machine();
        let mut machine = machine.with_wallet_address(Some("Wallet1".to_string()));
        machine.run(register_action()).unwrap();

        machine.handle(LifecycleEvent::ApprovalRequested { token: 1 });
        assert_eq!(machine.record().state, LifecycleState::AwaitingApproval);
        assert_eq!(
            surface.last_title().as_deref(),
            Some("Confirm Register battery in your wallet")
        );

        machine.handle(LifecycleEvent::Submitted {
            token: 1,
            handle: TransactionHandle::new("0xabc"),
        });
        assert_eq!(machine.record().state, LifecycleState::AwaitingConfirmation);
        assert_eq!(surface.visible_count(), 1);
    }

    #[test]
    fn test_cancel_then_stale_confirmation_is_dropped() {
        let (mut machine, surface) = machine();
        machine.run(register_action()).unwrap();
        machine.handle(LifecycleEvent::Submitted {
            token: 1,
            handle: TransactionHandle::new("0xabc"),
        });

        assert_eq!(machine.cancel(), vec![Effect::ReleaseAll]);
        assert_eq!(machine.record().state, LifecycleState::Idle);
        assert_eq!(surface.visible_count(), 0);

        let ops_before = surface.operations().len();
        let record_before = machine.record().clone();
        let effects = machine.handle(LifecycleEvent::Confirmed {
            token: 1,
            receipt: receipt("0xabc"),
        });

        assert!(effects.is_empty());
        assert_eq!(machine.record(), &record_before);
        assert_eq!(surface.operations().len(), ops_before);
    }

    #[test]
    fn test_stale_token_after_supersede_is_dropped() {
        let (mut machine, surface) = machine();
        machine.run(register_action()).unwrap();
        machine.handle(LifecycleEvent::Submitted {
            token: 1,
            handle: TransactionHandle::new("0xold"),
        });

        let effects = machine.run(register_action()).unwrap();
        assert_eq!(effects[0], Effect::ReleaseAll);
        assert_eq!(machine.record().attempt_token, 2);
        assert_eq!(machine.record().state, LifecycleState::Submitting);
        assert_eq!(surface.visible_count(), 1);
        assert_eq!(surface.max_visible(), 1);

        let effects = machine.handle(LifecycleEvent::Confirmed {
            token: 1,
            receipt: receipt("0xold"),
        });
        assert!(effects.is_empty());
        assert_eq!(machine.record().state, LifecycleState::Submitting);
    }

    #[test]
    fn test_reject_policy_refuses_reentry() {
        let (mut machine, surface) = machine_with(CoordinatorConfig {
            reentry: ReentryPolicy::Reject,
            ..CoordinatorConfig::default()
        });
        machine.run(register_action()).unwrap();

        let result = machine.run(register_action());
        assert!(matches!(
            result,
            Err(AppError::Lifecycle(LifecycleError::AttemptInFlight { token: 1, .. }))
        ));
        assert_eq!(machine.record().attempt_token, 1);
        assert_eq!(surface.shown_count(), 1);

        // A terminal attempt may be replaced
        machine.handle(LifecycleEvent::SubmitFailed {
            token: 1,
            failure: RawFailure::new("network error"),
        });
        assert!(machine.run(register_action()).is_ok());
        assert_eq!(machine.record().attempt_token, 2);
        assert_eq!(surface.visible_count(), 1);
    }

    #[test]
    fn test_deadline_then_late_confirmation() {
        let (mut machine, surface) = machine();
        machine.run(register_action()).unwrap();
        machine.handle(LifecycleEvent::Submitted {
            token: 1,
            handle: TransactionHandle::new("0xabc"),
        });

        let effects = machine.handle(LifecycleEvent::DeadlineElapsed { token: 1 });
        assert_eq!(effects, vec![Effect::CancelConfirmation]);
        assert_eq!(machine.record().state, LifecycleState::TimedOut);
        assert_eq!(machine.record().error_kind, Some(ErrorKind::NetworkTimeout));
        assert!(machine.record().is_consistent());

        // Distinct notification: dismiss of the pending one precedes the new show
        let ops = surface.operations();
        let n = ops.len();
        assert!(matches!(ops[n - 2], SurfaceOp::Dismiss { .. }));
        assert!(matches!(ops[n - 1], SurfaceOp::Show { kind: NotificationKind::Warning, .. }));
        assert_eq!(surface.visible_count(), 1);

        let effects = machine.handle(LifecycleEvent::Confirmed {
            token: 1,
            receipt: receipt("0xabc"),
        });
        assert!(effects.is_empty());
        assert_eq!(machine.record().state, LifecycleState::TimedOut);
    }

    #[test]
    fn test_events_out_of_place_are_ignored() {
        let (mut machine, _surface) = machine();
        assert!(machine.handle(LifecycleEvent::DeadlineElapsed { token: 0 }).is_empty());

        machine.run(register_action()).unwrap();
        // No handle yet: deadline and confirmation do not apply
        assert!(machine.handle(LifecycleEvent::DeadlineElapsed { token: 1 }).is_empty());
        assert!(
            machine
                .handle(LifecycleEvent::Confirmed {
                    token: 1,
                    receipt: receipt("0xabc"),
                })
                .is_empty()
        );
        assert_eq!(machine.record().state, LifecycleState::Submitting);
    }

    #[test]
    fn test_acknowledge() {
        let (mut machine, surface) = machine();
        assert!(matches!(
            machine.acknowledge(),
            Err(AppError::Lifecycle(LifecycleError::NotTerminal(LifecycleState::Idle)))
        ));

        machine.run(register_action()).unwrap();
        machine.handle(LifecycleEvent::SubmitFailed {
            token: 1,
            failure: RawFailure::new("boom"),
        });
        assert_eq!(machine.record().error_kind, Some(ErrorKind::Unknown));

        assert_eq!(machine.acknowledge().unwrap(), vec![Effect::ReleaseAll]);
        assert_eq!(machine.record().state, LifecycleState::Idle);
        assert_eq!(machine.record().attempt_token, 1);
        assert!(machine.record().is_consistent());
        assert_eq!(surface.visible_count(), 0);
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let (mut machine, surface) = machine();
        assert!(machine.cancel().is_empty());
        assert!(surface.operations().is_empty());
    }
}
