use super::types::{ComponentStatus, StatusTransition};
use crate::error::{CxlEmuError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Span};

const TRANSITION_CHANNEL_CAPACITY: usize = 16;

/// What `stop()` has to do after claiming the stop transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopAction {
    /// Nothing is running; the component is already Stopped
    Done,
    /// Stopped before `run()` was ever invoked; only teardown remains
    NeverRan,
    /// This caller owns teardown and must wait for `run()` to exit
    Teardown,
    /// Another caller is tearing down; only wait
    Wait,
}

/// Lifecycle state shared between a component's `run()` and `stop()`.
///
/// Holds the component's label and logging span, the current status, a
/// broadcast of every transition for observers, and the cancellation token
/// handed to the component body.
pub struct Lifecycle {
    label: String,
    span: Span,
    status: watch::Sender<ComponentStatus>,
    transitions: broadcast::Sender<StatusTransition>,
    cancellation_token: CancellationToken,
    run_started: AtomicBool,
    reached_running: AtomicBool,
}

impl Lifecycle {
    /// Create a lifecycle for a component with the given label
    pub fn new<S: Into<String>>(label: S) -> Self {
        let label = label.into();
        let span = info_span!("component", label = %label);
        let (status, _) = watch::channel(ComponentStatus::NotRunning);
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);

        Self {
            label,
            span,
            status,
            transitions,
            cancellation_token: CancellationToken::new(),
            run_started: AtomicBool::new(false),
            reached_running: AtomicBool::new(false),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Logging handle for this component
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn status(&self) -> ComponentStatus {
        *self.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() == ComponentStatus::Running
    }

    /// Token cancelled when `stop()` is requested
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Subscribe to status transitions from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<StatusTransition> {
        self.transitions.subscribe()
    }

    /// Watch the current status
    pub fn watch_status(&self) -> watch::Receiver<ComponentStatus> {
        self.status.subscribe()
    }

    /// Report that the component's own resources are ready to accept work.
    ///
    /// Only the first call made while NotRunning transitions; later calls, or
    /// calls racing a stop request, return `false`.
    pub fn mark_running(&self) -> bool {
        let changed = self
            .transition(|current| current == ComponentStatus::NotRunning, ComponentStatus::Running)
            .is_some();

        if changed {
            self.reached_running.store(true, Ordering::SeqCst);
        } else {
            warn!(
                parent: &self.span,
                "{} ignored Running report while {}",
                self.label,
                self.status()
            );
        }

        changed
    }

    /// Wait until the component reports Running.
    ///
    /// Fails if the component stops without ever having been Running.
    pub async fn wait_for_ready(&self) -> Result<()> {
        let mut receiver = self.status.subscribe();
        receiver
            .wait_for(|status| *status >= ComponentStatus::Running)
            .await
            .map_err(|_| CxlEmuError::lifecycle(self.label.as_str(), "status channel closed"))?;

        if self.reached_running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CxlEmuError::lifecycle(
                self.label.as_str(),
                "stopped before becoming ready",
            ))
        }
    }

    /// Wait until the component reaches Stopped
    pub async fn wait_for_stopped(&self) {
        let mut receiver = self.status.subscribe();
        // The sender lives as long as `self`, so this only returns once Stopped.
        let _ = receiver
            .wait_for(|status| *status == ComponentStatus::Stopped)
            .await;
    }

    /// Claim the single `run()` for this lifecycle.
    ///
    /// Returns `Ok(false)` when the component was stopped before it ever ran.
    pub(crate) fn begin_run(&self) -> Result<bool> {
        let mut already_started = false;
        let mut stopped = false;

        // Checked under the status lock so a concurrent stop() sees a consistent view.
        self.status.send_if_modified(|current| {
            already_started = self.run_started.swap(true, Ordering::SeqCst);
            stopped = *current == ComponentStatus::Stopped;
            false
        });

        if already_started {
            return Err(CxlEmuError::lifecycle(
                self.label.as_str(),
                "run() already invoked; components are not restartable",
            ));
        }

        if stopped {
            debug!(parent: &self.span, "{} stopped before run, skipping", self.label);
            return Ok(false);
        }

        Ok(true)
    }

    /// Record that the component body has exited
    pub(crate) fn finish_run(&self) {
        self.transition(
            |current| current < ComponentStatus::Stopping,
            ComponentStatus::Stopping,
        );
        self.transition(
            |current| current == ComponentStatus::Stopping,
            ComponentStatus::Stopped,
        );
    }

    pub(crate) fn begin_stop(&self) -> StopAction {
        match self.status() {
            ComponentStatus::Stopped => return StopAction::Done,
            ComponentStatus::Stopping => return StopAction::Wait,
            _ => {}
        }

        let never_ran = self
            .transition(
                |current| {
                    current == ComponentStatus::NotRunning
                        && !self.run_started.load(Ordering::SeqCst)
                },
                ComponentStatus::Stopped,
            )
            .is_some();

        if never_ran {
            self.cancellation_token.cancel();
            return StopAction::NeverRan;
        }

        match self.transition(
            |current| current < ComponentStatus::Stopping,
            ComponentStatus::Stopping,
        ) {
            Some(_) => StopAction::Teardown,
            None if self.status() == ComponentStatus::Stopped => StopAction::Done,
            None => StopAction::Wait,
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    fn transition<F>(&self, allowed: F, to: ComponentStatus) -> Option<ComponentStatus>
    where
        F: FnOnce(ComponentStatus) -> bool,
    {
        let mut previous = None;

        self.status.send_if_modified(|current| {
            if *current == to || !allowed(*current) {
                return false;
            }

            let from = *current;
            *current = to;
            previous = Some(from);

            // Published under the status lock so observers see transitions in order.
            let _ = self.transitions.send(StatusTransition {
                label: self.label.clone(),
                from,
                to,
            });
            true
        });

        if let Some(from) = previous {
            debug!(
                parent: &self.span,
                "Component '{}' status changed: {} -> {}",
                self.label,
                from,
                to
            );
        }

        previous
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("label", &self.label)
            .field("status", &self.status())
            .finish()
    }
}
