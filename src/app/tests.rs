use super::*;
use crate::component::{ComponentStatus, Lifecycle, RunnableComponent};
use crate::config::CxlEmuConfig;
use crate::error::{CxlEmuError, Result};
use crate::irq::{Irq, IrqHandler};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Component with scripted startup, failure and stop behavior
struct Probe {
    lifecycle: Lifecycle,
    ready_delay: Duration,
    stop_delay: Duration,
    fail_before_ready: bool,
    fail_after: Option<Duration>,
}

impl Probe {
    fn new(label: &str) -> Self {
        Self {
            lifecycle: Lifecycle::new(label),
            ready_delay: Duration::ZERO,
            stop_delay: Duration::ZERO,
            fail_before_ready: false,
            fail_after: None,
        }
    }
}

#[async_trait]
impl RunnableComponent for Probe {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn run_component(&self, cancellation_token: CancellationToken) -> Result<()> {
        if self.fail_before_ready {
            return Err(CxlEmuError::component(self.label(), "setup failed"));
        }

        tokio::select! {
            _ = cancellation_token.cancelled() => return Ok(()),
            _ = sleep(self.ready_delay) => {}
        }
        self.lifecycle.mark_running();

        match self.fail_after {
            Some(delay) => tokio::select! {
                _ = cancellation_token.cancelled() => Ok(()),
                _ = sleep(delay) => Err(CxlEmuError::component(self.label(), "fault")),
            },
            None => {
                cancellation_token.cancelled().await;
                Ok(())
            }
        }
    }

    async fn stop_component(&self) -> Result<()> {
        sleep(self.stop_delay).await;
        Ok(())
    }
}

fn create_test_config() -> CxlEmuConfig {
    let mut config = CxlEmuConfig::default();
    config.irq.bind_port = 0;
    config.system.startup_timeout_ms = 1000;
    config.system.stop_timeout_ms = 1000;
    config
}

fn supervisor_with(config: CxlEmuConfig, probes: Vec<Probe>) -> Supervisor {
    let mut supervisor = Supervisor::empty(config);
    for probe in probes {
        supervisor.add(Arc::new(probe)).unwrap();
    }
    supervisor
}

#[tokio::test]
async fn test_supervisor_builds_components_from_config() {
    let supervisor = Supervisor::new(create_test_config()).unwrap();

    let states = supervisor.component_states();
    assert_eq!(states.len(), 2);
    assert_eq!(states.get("Port0"), Some(&ComponentStatus::NotRunning));
    assert_eq!(
        states.get("device0:IrqHandler"),
        Some(&ComponentStatus::NotRunning)
    );
    assert!(supervisor.device_client().is_some());
    assert!(supervisor.irq_handler().is_some());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = create_test_config();
    config.irq.target_ports.clear();

    assert!(matches!(
        Supervisor::new(config),
        Err(CxlEmuError::Config(_))
    ));
}

#[tokio::test]
async fn test_user_request_shuts_everything_down() {
    let mut supervisor = supervisor_with(
        create_test_config(),
        vec![Probe::new("alpha"), Probe::new("beta")],
    );

    supervisor.start().await.unwrap();
    assert_eq!(
        supervisor.component_state("alpha"),
        Some(ComponentStatus::Running)
    );
    assert_eq!(
        supervisor.component_state("beta"),
        Some(ComponentStatus::Running)
    );

    supervisor.request_shutdown();
    let exit_code = timeout(Duration::from_secs(5), supervisor.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit_code, 0);
    assert!(supervisor
        .component_states()
        .values()
        .all(|status| *status == ComponentStatus::Stopped));
}

#[tokio::test]
async fn test_component_failure_triggers_shutdown() {
    let mut failing = Probe::new("failing");
    failing.fail_after = Some(Duration::from_millis(50));
    let mut supervisor = supervisor_with(create_test_config(), vec![failing, Probe::new("steady")]);

    supervisor.start().await.unwrap();
    let exit_code = timeout(Duration::from_secs(5), supervisor.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit_code, 1);
    assert_eq!(
        supervisor.component_state("steady"),
        Some(ComponentStatus::Stopped)
    );
}

#[tokio::test]
async fn test_start_fails_when_component_fails_before_ready() {
    let mut broken = Probe::new("broken");
    broken.fail_before_ready = true;
    let mut supervisor = supervisor_with(create_test_config(), vec![broken, Probe::new("fine")]);

    assert!(supervisor.start().await.is_err());

    let exit_code = supervisor.shutdown().await.unwrap();
    assert_eq!(exit_code, 1);
    assert_eq!(
        supervisor.component_state("fine"),
        Some(ComponentStatus::Stopped)
    );
}

#[tokio::test]
async fn test_startup_timeout() {
    let mut config = create_test_config();
    config.system.startup_timeout_ms = 100;
    let mut sluggish = Probe::new("sluggish");
    sluggish.ready_delay = Duration::from_secs(5);
    let mut supervisor = supervisor_with(config, vec![sluggish]);

    let result = supervisor.start().await;
    assert!(matches!(result, Err(CxlEmuError::System { .. })));

    supervisor.shutdown().await.unwrap();
    assert_eq!(
        supervisor.component_state("sluggish"),
        Some(ComponentStatus::Stopped)
    );
}

#[tokio::test]
async fn test_stop_timeout_sets_failure_exit_code() {
    let mut config = create_test_config();
    config.system.stop_timeout_ms = 100;
    let mut stuck = Probe::new("stuck");
    stuck.stop_delay = Duration::from_secs(5);
    let mut supervisor = supervisor_with(config, vec![stuck, Probe::new("prompt")]);

    supervisor.start().await.unwrap();
    let exit_code = timeout(Duration::from_secs(2), supervisor.shutdown())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit_code, 1);
    assert_eq!(
        supervisor.component_state("prompt"),
        Some(ComponentStatus::Stopped)
    );
}

#[tokio::test]
async fn test_add_rules() {
    let mut supervisor = supervisor_with(create_test_config(), vec![Probe::new("one")]);

    assert!(supervisor.add(Arc::new(Probe::new("one"))).is_err());

    supervisor.start().await.unwrap();
    assert!(supervisor.add(Arc::new(Probe::new("two"))).is_err());
    assert!(supervisor.start().await.is_err());

    assert_eq!(supervisor.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_supervised_irq_handler_dispatches() {
    let config = create_test_config();
    let handler = Arc::new(IrqHandler::new(config.irq.clone()));
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    handler
        .register(Irq::HostSent, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let mut supervisor = Supervisor::empty(config);
    supervisor.add(Arc::clone(&handler) as Arc<dyn RunnableComponent>).unwrap();
    supervisor.start().await.unwrap();

    let addr = handler.local_addr().unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&[Irq::HostSent.as_byte()]).await.unwrap();
    drop(stream);

    timeout(Duration::from_secs(2), async {
        while received.load(Ordering::SeqCst) < 1 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let shutdown = supervisor.shutdown_handle();
    shutdown.request(ShutdownReason::UserRequest);
    assert_eq!(supervisor.run().await.unwrap(), 0);
    assert_eq!(handler.lifecycle().status(), ComponentStatus::Stopped);
}

#[tokio::test]
async fn test_lost_switch_link_triggers_shutdown() {
    let switch = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = create_test_config();
    config.device.host = "127.0.0.1".to_string();
    config.device.port = switch.local_addr().unwrap().port();

    let mut supervisor = Supervisor::new(config).unwrap();
    supervisor.start().await.unwrap();

    let (switch_side, _) = timeout(Duration::from_secs(2), switch.accept())
        .await
        .unwrap()
        .unwrap();
    drop(switch_side);

    let exit_code = timeout(Duration::from_secs(2), supervisor.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(exit_code, 1);
    assert!(supervisor
        .component_states()
        .values()
        .all(|status| *status == ComponentStatus::Stopped));
    let device_client = supervisor.device_client().unwrap();
    assert_eq!(
        device_client.device().lifecycle().status(),
        ComponentStatus::Stopped
    );
}
