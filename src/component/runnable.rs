use super::lifecycle::{Lifecycle, StopAction};
use crate::error::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

/// A long-lived unit driven by the lifecycle runtime.
///
/// Implementors provide the body in [`run_component`](Self::run_component),
/// which must call [`Lifecycle::mark_running`] once its own resources are
/// ready and return once the cancellation token fires. Teardown that has to
/// happen before cancellation (stopping owned children, for instance) goes in
/// [`stop_component`](Self::stop_component).
#[async_trait]
pub trait RunnableComponent: Send + Sync {
    fn lifecycle(&self) -> &Lifecycle;

    fn label(&self) -> &str {
        self.lifecycle().label()
    }

    /// Component body; runs until cancelled or a fatal error occurs
    async fn run_component(&self, cancellation_token: CancellationToken) -> Result<()>;

    /// Teardown performed before the body is cancelled
    async fn stop_component(&self) -> Result<()> {
        Ok(())
    }

    /// Run the component until it is stopped.
    ///
    /// A component runs at most once. Running a component that was stopped
    /// before it started is a no-op.
    async fn run(&self) -> Result<()> {
        let lifecycle = self.lifecycle();
        if !lifecycle.begin_run()? {
            return Ok(());
        }

        let span = lifecycle.span().clone();
        let result = self
            .run_component(lifecycle.cancellation_token())
            .instrument(span)
            .await;

        if let Err(e) = &result {
            error!(parent: lifecycle.span(), "{} exited with error: {}", self.label(), e);
        }

        lifecycle.finish_run();
        result
    }

    /// Request cancellation and wait until the component has fully stopped
    async fn stop(&self) -> Result<()> {
        default_stop(self).await
    }
}

/// Stock `stop()` behavior, for implementors that override `stop()` and
/// still need the lifecycle handling.
pub async fn default_stop<C>(component: &C) -> Result<()>
where
    C: RunnableComponent + ?Sized,
{
    let lifecycle = component.lifecycle();

    match lifecycle.begin_stop() {
        StopAction::Done => Ok(()),
        StopAction::NeverRan => component.stop_component().await,
        StopAction::Wait => {
            lifecycle.wait_for_stopped().await;
            Ok(())
        }
        StopAction::Teardown => {
            let span = lifecycle.span().clone();
            async {
                info!("Stopping {}", component.label());
                let teardown = component.stop_component().await;
                lifecycle.cancel();
                lifecycle.wait_for_stopped().await;
                info!("{} stopped", component.label());
                teardown
            }
            .instrument(span)
            .await
        }
    }
}

/// Stop every component concurrently and wait for all of them.
///
/// Every stop runs to completion even when another fails; the first error is
/// returned once all components have stopped.
pub async fn stop_all(components: &[&dyn RunnableComponent]) -> Result<()> {
    let results = join_all(components.iter().map(|component| component.stop())).await;

    let mut first_error = None;
    for (component, result) in components.iter().zip(results) {
        if let Err(e) = result {
            error!("Error stopping {}: {}", component.label(), e);
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
