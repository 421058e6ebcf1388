//! Daemon process control.
//!
//! Start/stop/restart the notebook server through the init system, with the
//! readiness guarantees callers rely on: `start` returns only once the
//! daemon's TCP port accepts a connection, `stop` returns only once the
//! process has left the process table, and `restart` is strictly the
//! composition of the two (never a native restart action) so the
//! stop-confirmation wait always happens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::errors::{ZeppError, ZeppResult};

/// Observed daemon service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    /// No daemon process present.
    Stopped,
    /// Process present but the REST port is not accepting connections yet.
    Starting,
    /// Process present and port reachable.
    Running,
    /// Stop issued, process still in the process table.
    Stopping,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running)
    }

    /// start() acts only from a state without a live process.
    pub fn can_start(&self) -> bool {
        matches!(self, ServiceStatus::Stopped)
    }

    /// stop() acts only while a process is present.
    pub fn can_stop(&self) -> bool {
        matches!(self, ServiceStatus::Starting | ServiceStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Init-system actions on a named unit.
///
/// The production implementation shells out to `systemctl`; tests inject
/// fakes that record the action sequence.
#[async_trait]
pub trait InitSystem: Send + Sync {
    async fn start(&self, unit: &str) -> ZeppResult<()>;
    async fn stop(&self, unit: &str) -> ZeppResult<()>;
    async fn enable(&self, unit: &str) -> ZeppResult<()>;
}

pub struct SystemdInit;

impl SystemdInit {
    async fn run(&self, action: &str, unit: &str) -> ZeppResult<()> {
        let output = tokio::process::Command::new("systemctl")
            .args([action, unit])
            .output()
            .await
            .map_err(|e| ZeppError::Service(format!("failed to run systemctl {action}: {e}")))?;
        if !output.status.success() {
            return Err(ZeppError::Service(format!(
                "systemctl {action} {unit} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl InitSystem for SystemdInit {
    async fn start(&self, unit: &str) -> ZeppResult<()> {
        self.run("start", unit).await
    }

    async fn stop(&self, unit: &str) -> ZeppResult<()> {
        self.run("stop", unit).await
    }

    async fn enable(&self, unit: &str) -> ZeppResult<()> {
        self.run("enable", unit).await
    }
}

/// Process-table lookup for the daemon.
pub trait ProcessProbe: Send + Sync {
    /// PID of the daemon process, if one is present.
    fn daemon_pid(&self) -> Option<u32>;
}

/// Scans `/proc/*/cmdline` for a process whose command line contains the
/// configured pattern, verifying liveness with `kill(pid, 0)`.
pub struct ProcTableProbe {
    pattern: String,
}

impl ProcTableProbe {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl ProcessProbe for ProcTableProbe {
    fn daemon_pid(&self) -> Option<u32> {
        let proc_dir = std::fs::read_dir("/proc").ok()?;
        for entry in proc_dir.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if pid == std::process::id() {
                continue;
            }
            let Ok(cmdline) = std::fs::read_to_string(entry.path().join("cmdline")) else {
                continue;
            };
            if cmdline.contains(&self.pattern) && is_process_alive(pid) {
                return Some(pid);
            }
        }
        None
    }
}

/// Check process existence with a null signal.
pub fn is_process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

/// Poll intervals and ceilings for the readiness and shutdown waits.
/// Injectable so tests run in milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
    pub start_interval: Duration,
    pub start_ceiling: Duration,
    pub stop_interval: Duration,
    pub stop_ceiling: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            start_interval: Duration::from_secs(2),
            start_ceiling: Duration::from_secs(30),
            stop_interval: Duration::from_secs(1),
            stop_ceiling: Duration::from_secs(30),
        }
    }
}

pub struct ProcessController {
    unit: String,
    port: u16,
    init: Arc<dyn InitSystem>,
    probe: Arc<dyn ProcessProbe>,
    poll: PollConfig,
}

impl ProcessController {
    pub fn new(
        unit: impl Into<String>,
        port: u16,
        init: Arc<dyn InitSystem>,
        probe: Arc<dyn ProcessProbe>,
    ) -> Self {
        Self {
            unit: unit.into(),
            port,
            init,
            probe,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Current observed status from the process table and port probe.
    pub async fn status(&self) -> ServiceStatus {
        match self.probe.daemon_pid() {
            None => ServiceStatus::Stopped,
            Some(_) => {
                if port_reachable(self.port).await {
                    ServiceStatus::Running
                } else {
                    ServiceStatus::Starting
                }
            }
        }
    }

    /// Enable the unit so the daemon survives host reboots.
    pub async fn enable(&self) -> ZeppResult<()> {
        self.init.enable(&self.unit).await
    }

    /// Start the daemon and wait until its port accepts a connection.
    ///
    /// No-op when a daemon process is already present. The init system's
    /// start return does not imply the HTTP listener is up, so readiness is
    /// confirmed by TCP connect, polled until the configured ceiling.
    /// Expiry is a fatal [`ZeppError::Timeout`]; the daemon is presumed
    /// misconfigured or crashed and is not retried.
    pub async fn start(&self) -> ZeppResult<()> {
        if let Some(pid) = self.probe.daemon_pid() {
            tracing::debug!(pid, "daemon already running, skipping start");
            return Ok(());
        }

        tracing::info!(unit = %self.unit, "starting daemon");
        self.init.start(&self.unit).await?;

        let deadline = Instant::now() + self.poll.start_ceiling;
        loop {
            if port_reachable(self.port).await {
                tracing::info!(port = self.port, "daemon is accepting connections");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ZeppError::Timeout(format!(
                    "daemon did not open port {} within {:?}",
                    self.port, self.poll.start_ceiling
                )));
            }
            tokio::time::sleep(self.poll.start_interval).await;
        }
    }

    /// Stop the daemon and wait until its process leaves the process table.
    ///
    /// No-op when no process is present. Confirming termination prevents a
    /// subsequent `start` from racing a not-yet-terminated instance.
    pub async fn stop(&self) -> ZeppResult<()> {
        if self.probe.daemon_pid().is_none() {
            tracing::debug!("daemon not running, skipping stop");
            return Ok(());
        }

        tracing::info!(unit = %self.unit, "stopping daemon");
        self.init.stop(&self.unit).await?;

        let deadline = Instant::now() + self.poll.stop_ceiling;
        loop {
            if self.probe.daemon_pid().is_none() {
                tracing::info!("daemon process has exited");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ZeppError::Timeout(format!(
                    "daemon process still present after {:?}",
                    self.poll.stop_ceiling
                )));
            }
            tokio::time::sleep(self.poll.stop_interval).await;
        }
    }

    /// Strictly `stop()` then `start()`.
    pub async fn restart(&self) -> ZeppResult<()> {
        self.stop().await?;
        self.start().await
    }
}

async fn port_reachable(port: u16) -> bool {
    tokio::time::timeout(
        Duration::from_secs(1),
        TcpStream::connect(("127.0.0.1", port)),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false)
}
