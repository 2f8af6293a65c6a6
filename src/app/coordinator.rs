//! Per-call-site lifecycle coordinator.
//!
//! Each coordinator owns one [`LifecycleMachine`] inside a dedicated task.
//! Commands from the call site and results from background work are applied
//! one at a time, so transitions never interleave. The background work of an
//! attempt (submission, confirmation wait, deadline, auto-dismiss) runs in
//! tasks that only report back through the event channel; the machine decides
//! whether a report is still relevant.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::domain::{
    ActionDescriptor, AppError, CallSiteOptions, LedgerClient, LifecycleError, LifecycleRecord,
    NotificationSurface, RawFailure, ReentryPolicy, TransactionHandle, WalletProvider,
};

use super::classifier::ErrorClassifier;
use super::machine::{Effect, LifecycleEvent, LifecycleMachine};
use super::notifier::NotificationChannel;

const COMMAND_BUFFER: usize = 32;

/// Timing and re-entry policy for one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long `awaiting_confirmation` may last
    pub confirmation_timeout: Duration,
    /// Delay before a success notification is dismissed
    pub auto_dismiss_after: Duration,
    pub reentry: ReentryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(30),
            auto_dismiss_after: Duration::from_secs(5),
            reentry: ReentryPolicy::Supersede,
        }
    }
}

impl CoordinatorConfig {
    /// Apply per-call-site overrides on top of this config
    #[must_use]
    pub fn with_options(mut self, options: &CallSiteOptions) -> Self {
        if let Some(ms) = options.confirmation_timeout_ms {
            self.confirmation_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = options.auto_dismiss_ms {
            self.auto_dismiss_after = Duration::from_millis(ms);
        }
        if let Some(reentry) = options.reentry {
            self.reentry = reentry;
        }
        self
    }
}

/// Shared collaborators handed to every coordinator
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerClient>,
    pub wallet: Option<Arc<dyn WalletProvider>>,
    pub surface: Arc<dyn NotificationSurface>,
    pub classifier: Arc<ErrorClassifier>,
}

enum Command {
    Run {
        action: ActionDescriptor,
        reply: oneshot::Sender<Result<LifecycleRecord, AppError>>,
    },
    Cancel {
        reply: oneshot::Sender<LifecycleRecord>,
    },
    Acknowledge {
        reply: oneshot::Sender<Result<LifecycleRecord, AppError>>,
    },
    Shutdown {
        reply: oneshot::Sender<LifecycleRecord>,
    },
}

/// Handle to a running coordinator.
///
/// Dropping the last handle tears the call site down: the current attempt
/// is cancelled, its notification dismissed and its tasks aborted.
pub struct LifecycleCoordinator {
    call_site: String,
    commands: mpsc::Sender<Command>,
    record: watch::Receiver<LifecycleRecord>,
}

impl LifecycleCoordinator {
    /// Start the coordinator task. Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        call_site: impl Into<String>,
        collaborators: Collaborators,
        config: CoordinatorConfig,
    ) -> Self {
        let call_site = call_site.into();
        let channel = NotificationChannel::new(Arc::clone(&collaborators.surface), call_site.clone());
        let machine = LifecycleMachine::new(
            call_site.clone(),
            channel,
            Arc::clone(&collaborators.classifier),
            config,
        )
        .with_wallet_address(collaborators.wallet.as_ref().map(|w| w.address()));

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (record_tx, record_rx) = watch::channel(machine.record().clone());

        let driver = Driver {
            machine,
            ledger: collaborators.ledger,
            wallet: collaborators.wallet,
            events: events_tx,
            record: record_tx,
            tasks: TaskSlots::default(),
        };
        tokio::spawn(driver.run(commands_rx, events_rx));

        info!(
            call_site = %call_site,
            timeout_ms = config.confirmation_timeout.as_millis() as u64,
            reentry = ?config.reentry,
            "Coordinator started"
        );

        Self {
            call_site,
            commands: commands_tx,
            record: record_rx,
        }
    }

    pub fn call_site(&self) -> &str {
        &self.call_site
    }

    /// Start a new attempt. Returns the record right after the transition.
    #[instrument(skip(self, action), fields(call_site = %self.call_site, capability = %action.capability()))]
    pub async fn run(&self, action: ActionDescriptor) -> Result<LifecycleRecord, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Run { action, reply }).await?;
        rx.await.map_err(|_| self.stopped())?
    }

    #[instrument(skip(self), fields(call_site = %self.call_site))]
    pub async fn cancel(&self) -> Result<LifecycleRecord, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Cancel { reply }).await?;
        rx.await.map_err(|_| self.stopped())
    }

    #[instrument(skip(self), fields(call_site = %self.call_site))]
    pub async fn acknowledge(&self) -> Result<LifecycleRecord, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Acknowledge { reply }).await?;
        rx.await.map_err(|_| self.stopped())?
    }

    /// Cancel whatever is in flight and stop the coordinator task
    pub async fn shutdown(&self) -> Result<LifecycleRecord, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| self.stopped())
    }

    /// Latest published record
    #[must_use]
    pub fn record(&self) -> LifecycleRecord {
        self.record.borrow().clone()
    }

    /// Observe every published record
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleRecord> {
        self.record.clone()
    }

    async fn send(&self, command: Command) -> Result<(), AppError> {
        self.commands.send(command).await.map_err(|_| self.stopped())
    }

    fn stopped(&self) -> AppError {
        LifecycleError::CoordinatorStopped(self.call_site.clone()).into()
    }
}

/// Background tasks of the live attempt, at most one per kind
#[derive(Default)]
struct TaskSlots {
    submission: Option<JoinHandle<()>>,
    confirmation: Option<JoinHandle<()>>,
    deadline: Option<JoinHandle<()>>,
    auto_dismiss: Option<JoinHandle<()>>,
}

impl TaskSlots {
    fn replace(slot: &mut Option<JoinHandle<()>>, task: JoinHandle<()>) {
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    fn abort(slot: &mut Option<JoinHandle<()>>) {
        if let Some(task) = slot.take() {
            task.abort();
        }
    }

    fn abort_all(&mut self) {
        Self::abort(&mut self.submission);
        Self::abort(&mut self.confirmation);
        Self::abort(&mut self.deadline);
        Self::abort(&mut self.auto_dismiss);
    }
}

impl Drop for TaskSlots {
    fn drop(&mut self) {
        self.abort_all();
    }
}

struct Driver {
    machine: LifecycleMachine,
    ledger: Arc<dyn LedgerClient>,
    wallet: Option<Arc<dyn WalletProvider>>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    record: watch::Sender<LifecycleRecord>,
    tasks: TaskSlots,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<LifecycleEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Run { action, reply }) => {
                        let result = match self.machine.run(action) {
                            Ok(effects) => {
                                self.apply(effects);
                                Ok(self.publish())
                            }
                            Err(e) => Err(e),
                        };
                        let _ = reply.send(result);
                    }
                    Some(Command::Cancel { reply }) => {
                        let effects = self.machine.cancel();
                        self.apply(effects);
                        let _ = reply.send(self.publish());
                    }
                    Some(Command::Acknowledge { reply }) => {
                        let result = match self.machine.acknowledge() {
                            Ok(effects) => {
                                self.apply(effects);
                                Ok(self.publish())
                            }
                            Err(e) => Err(e),
                        };
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown { reply }) => {
                        self.teardown();
                        let _ = reply.send(self.publish());
                        break;
                    }
                    None => {
                        self.teardown();
                        self.publish();
                        break;
                    }
                },
                Some(event) = events.recv() => {
                    let effects = self.machine.handle(event);
                    self.apply(effects);
                    self.publish();
                }
            }
        }

        info!(call_site = %self.machine.record().call_site, "Coordinator stopped");
    }

    fn teardown(&mut self) {
        let effects = self.machine.cancel();
        self.apply(effects);
        self.tasks.abort_all();
    }

    fn publish(&self) -> LifecycleRecord {
        let record = self.machine.record().clone();
        self.record.send_replace(record.clone());
        record
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Submit { token, action } => {
                    let task = self.spawn_submission(token, action);
                    TaskSlots::replace(&mut self.tasks.submission, task);
                }
                Effect::AwaitConfirmation { token, handle } => {
                    let task = self.spawn_confirmation(token, handle);
                    TaskSlots::replace(&mut self.tasks.confirmation, task);
                }
                Effect::ArmDeadline { token, after } => {
                    let task = self.spawn_timer(after, LifecycleEvent::DeadlineElapsed { token });
                    TaskSlots::replace(&mut self.tasks.deadline, task);
                }
                Effect::DisarmDeadline => TaskSlots::abort(&mut self.tasks.deadline),
                Effect::CancelConfirmation => TaskSlots::abort(&mut self.tasks.confirmation),
                Effect::ScheduleAutoDismiss { token, after } => {
                    let task = self.spawn_timer(after, LifecycleEvent::AutoDismiss { token });
                    TaskSlots::replace(&mut self.tasks.auto_dismiss, task);
                }
                Effect::ReleaseAll => self.tasks.abort_all(),
            }
        }
    }

    fn spawn_submission(&self, token: u64, action: ActionDescriptor) -> JoinHandle<()> {
        let ledger = Arc::clone(&self.ledger);
        let wallet = self.wallet.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let approval = match wallet {
                Some(wallet) => {
                    let _ = events.send(LifecycleEvent::ApprovalRequested { token });
                    match wallet.approve(&action).await {
                        Ok(approval) => Some(approval),
                        Err(e) => {
                            let _ = events.send(LifecycleEvent::SubmitFailed {
                                token,
                                failure: RawFailure::from(&e),
                            });
                            return;
                        }
                    }
                }
                None => None,
            };

            let event = match ledger.submit(&action, approval.as_ref()).await {
                Ok(handle) => LifecycleEvent::Submitted { token, handle },
                Err(e) => LifecycleEvent::SubmitFailed {
                    token,
                    failure: RawFailure::from(&e),
                },
            };
            if events.send(event).is_err() {
                debug!(token, "Coordinator gone before submission result");
            }
        })
    }

    fn spawn_confirmation(&self, token: u64, handle: TransactionHandle) -> JoinHandle<()> {
        let ledger = Arc::clone(&self.ledger);
        let events = self.events.clone();

        tokio::spawn(async move {
            let event = match ledger.await_confirmation(&handle).await {
                Ok(receipt) => LifecycleEvent::Confirmed { token, receipt },
                Err(e) => LifecycleEvent::ConfirmationFailed {
                    token,
                    failure: RawFailure::from(&e),
                },
            };
            if events.send(event).is_err() {
                debug!(token, handle = %handle, "Coordinator gone before confirmation result");
            }
        })
    }

    fn spawn_timer(&self, after: Duration, event: LifecycleEvent) -> JoinHandle<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(event);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LifecycleState;
    use crate::test_utils::{MockLedgerClient, RecordingNotificationSurface};

    fn collaborators(
        ledger: MockLedgerClient,
    ) -> (Collaborators, Arc<RecordingNotificationSurface>) {
        let surface = Arc::new(RecordingNotificationSurface::new());
        let collaborators = Collaborators {
            ledger: Arc::new(ledger),
            wallet: None,
            surface: surface.clone(),
            classifier: Arc::new(ErrorClassifier::default()),
        };
        (collaborators, surface)
    }

    #[test]
    fn test_config_overrides() {
        let options = CallSiteOptions {
            confirmation_timeout_ms: Some(1_000),
            auto_dismiss_ms: None,
            reentry: Some(ReentryPolicy::Reject),
        };
        let config = CoordinatorConfig::default().with_options(&options);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(1));
        assert_eq!(config.auto_dismiss_after, Duration::from_secs(5));
        assert_eq!(config.reentry, ReentryPolicy::Reject);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_releases_notification() {
        let ledger = MockLedgerClient::new().with_submit_delay(Duration::from_secs(60));
        let (collaborators, surface) = collaborators(ledger);

        let coordinator =
            LifecycleCoordinator::spawn("form", collaborators, CoordinatorConfig::default());
        let record = coordinator
            .run(ActionDescriptor::new("register", vec![], "Register"))
            .await
            .unwrap();
        assert_eq!(record.state, LifecycleState::Submitting);
        assert_eq!(surface.visible_count(), 1);

        let mut updates = coordinator.subscribe();
        drop(coordinator);
        // The driver publishes a final idle record before exiting
        let _ = updates
            .wait_for(|record| record.state == LifecycleState::Idle)
            .await;

        assert_eq!(surface.visible_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_driver() {
        let (collaborators, _surface) = collaborators(MockLedgerClient::new());
        let coordinator =
            LifecycleCoordinator::spawn("form", collaborators, CoordinatorConfig::default());

        let record = coordinator.shutdown().await.unwrap();
        assert_eq!(record.state, LifecycleState::Idle);

        let result = coordinator.cancel().await;
        assert!(matches!(
            result,
            Err(AppError::Lifecycle(LifecycleError::CoordinatorStopped(_)))
        ));
    }
}
