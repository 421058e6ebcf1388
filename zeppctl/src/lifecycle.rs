//! Event-driven lifecycle orchestration.
//!
//! The controller reacts to upstream-readiness and client-request events by
//! evaluating a guarded transition table over the persisted install flags,
//! then driving the installer, config writer, process controller and REST
//! client in order. Guards are evaluated here, in one pure function, rather
//! than by an external flag-matching engine; the effects follow in
//! [`LifecycleController::handle`].
//!
//! Every event is handled to completion before the next is considered:
//! there is a single logical actor and no overlapping handler execution.

use std::path::PathBuf;

use crate::config::{ConfigWriter, ServiceUser, SparkSettings};
use crate::errors::{ZeppError, ZeppResult};
use crate::install::Installer;
use crate::layout::DistLayout;
use crate::process::ProcessController;
use crate::resource::ResourceFetcher;
use crate::rest::{InterpreterChanges, ZeppelinApi};
use crate::state::{InstallState, StateStore};

/// A notebook registration request from a client service.
#[derive(Clone, Debug)]
pub struct NotebookRequest {
    /// Caller-supplied identifier (content hash or declared id).
    pub key: String,
    /// Notebook document as JSON text.
    pub content: String,
}

/// An interpreter change request from a client service.
#[derive(Clone, Debug)]
pub struct InterpreterRequest {
    pub name: String,
    pub changes: InterpreterChanges,
}

/// Lifecycle events delivered by the surrounding orchestration.
#[derive(Clone, Debug)]
pub enum Event {
    /// The upstream compute engine is ready, with its current settings.
    UpstreamReady(SparkSettings),
    /// Upstream settings changed (e.g. a new master endpoint).
    UpstreamChanged(SparkSettings),
    /// The upstream relation exists but is not ready yet.
    UpstreamWaiting,
    /// No upstream relation at all.
    UpstreamAbsent,
    /// The upstream relation was lost while we were running.
    UpstreamLost,
    RegisterNotebooks(Vec<NotebookRequest>),
    RemoveNotebooks(Vec<String>),
    ChangeInterpreters(Vec<InterpreterRequest>),
}

/// Unit status reported after handling an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Blocked(String),
    Waiting(String),
    Maintenance(String),
    Active(String),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Blocked(msg) => write!(f, "blocked: {msg}"),
            Status::Waiting(msg) => write!(f, "waiting: {msg}"),
            Status::Maintenance(msg) => write!(f, "maintenance: {msg}"),
            Status::Active(msg) => write!(f, "active: {msg}"),
        }
    }
}

/// Per-item acknowledgment for batch requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ack {
    Accepted {
        key: String,
        daemon_id: Option<String>,
    },
    Rejected {
        key: String,
        reason: String,
    },
}

/// Result of handling one event.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub status: Status,
    pub acks: Vec<Ack>,
}

impl Outcome {
    fn status(status: Status) -> Self {
        Self {
            status,
            acks: Vec::new(),
        }
    }
}

/// What the transition table says to do for (state, event).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// Install the distribution and write default config; sets `installed`.
    Install,
    /// Configure, start the daemon, open ports; sets `started`.
    ConfigureAndStart,
    /// Push changed upstream settings to the interpreter and restart.
    UpdateUpstream,
    /// Close ports and stop the daemon; clears `started`.
    Release,
    ReportBlocked,
    ReportWaiting,
    ImportNotebooks,
    DeleteNotebooks,
    ModifyInterpreters,
    /// Batch request arrived while the daemon is not running.
    RejectNotRunning,
    Noop,
}

/// The guarded transition table. Pure; exercised exhaustively in tests.
pub(crate) fn decide(state: InstallState, event: &Event) -> Action {
    match event {
        Event::UpstreamReady(_) | Event::UpstreamChanged(_) => {
            if !state.installed {
                Action::Install
            } else if !state.started {
                Action::ConfigureAndStart
            } else if matches!(event, Event::UpstreamChanged(_)) {
                Action::UpdateUpstream
            } else {
                Action::Noop
            }
        }
        Event::UpstreamWaiting => Action::ReportWaiting,
        Event::UpstreamAbsent => Action::ReportBlocked,
        Event::UpstreamLost => {
            if state.started {
                Action::Release
            } else {
                Action::ReportWaiting
            }
        }
        Event::RegisterNotebooks(_) => {
            if state.started {
                Action::ImportNotebooks
            } else {
                Action::RejectNotRunning
            }
        }
        Event::RemoveNotebooks(_) => {
            if state.started {
                Action::DeleteNotebooks
            } else {
                Action::RejectNotRunning
            }
        }
        Event::ChangeInterpreters(_) => {
            if state.started {
                Action::ModifyInterpreters
            } else {
                Action::RejectNotRunning
            }
        }
    }
}

/// Port exposure seam. The surrounding host decides what "open" means
/// (firewall rule, cloud security group); the default implementation just
/// records the intent in the log.
pub trait PortExposure: Send + Sync {
    fn open_port(&self, port: u16);
    fn close_port(&self, port: u16);
}

pub struct LoggingPorts;

impl PortExposure for LoggingPorts {
    fn open_port(&self, port: u16) {
        tracing::info!(port, "exposing daemon port");
    }

    fn close_port(&self, port: u16) {
        tracing::info!(port, "closing daemon port");
    }
}

/// The interpreter that receives the upstream master endpoint.
const SPARK_INTERPRETER: &str = "spark";

pub struct LifecycleController {
    layout: DistLayout,
    store: StateStore,
    fetcher: ResourceFetcher,
    process: ProcessController,
    api: ZeppelinApi,
    ports: Box<dyn PortExposure>,
    service_user: Option<ServiceUser>,
    tutorial_sets: Vec<PathBuf>,
}

impl LifecycleController {
    pub fn new(
        layout: DistLayout,
        store: StateStore,
        fetcher: ResourceFetcher,
        process: ProcessController,
        api: ZeppelinApi,
    ) -> Self {
        Self {
            layout,
            store,
            fetcher,
            process,
            api,
            ports: Box::new(LoggingPorts),
            service_user: None,
            tutorial_sets: Vec::new(),
        }
    }

    pub fn with_ports(mut self, ports: Box<dyn PortExposure>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_service_user(mut self, user: ServiceUser) -> Self {
        self.service_user = Some(user);
        self
    }

    pub fn with_tutorial_sets(mut self, sets: Vec<PathBuf>) -> Self {
        self.tutorial_sets = sets;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Handle one lifecycle event to completion.
    pub async fn handle(&self, event: Event) -> ZeppResult<Outcome> {
        let state = self.store.snapshot()?;
        let action = decide(state, &event);
        tracing::debug!(?state, ?action, "handling lifecycle event");

        match (action, event) {
            (Action::Install, _) => self.do_install().await,
            (Action::ConfigureAndStart, Event::UpstreamReady(spark))
            | (Action::ConfigureAndStart, Event::UpstreamChanged(spark)) => {
                self.do_configure_and_start(&spark).await
            }
            (Action::UpdateUpstream, Event::UpstreamChanged(spark)) => {
                self.do_update_upstream(&spark).await
            }
            (Action::Release, _) => self.do_release().await,
            (Action::ReportBlocked, _) => Ok(Outcome::status(Status::Blocked(
                "waiting for relation to Apache Spark".to_string(),
            ))),
            (Action::ReportWaiting, _) => Ok(Outcome::status(Status::Waiting(
                "waiting for Apache Spark to become ready".to_string(),
            ))),
            (Action::ImportNotebooks, Event::RegisterNotebooks(requests)) => {
                self.do_import_notebooks(&requests).await
            }
            (Action::DeleteNotebooks, Event::RemoveNotebooks(keys)) => {
                self.do_delete_notebooks(&keys).await
            }
            (Action::ModifyInterpreters, Event::ChangeInterpreters(requests)) => {
                self.do_modify_interpreters(&requests).await
            }
            (Action::RejectNotRunning, event) => Ok(self.reject_not_running(&event)),
            (Action::Noop, _) => Ok(Outcome::status(Status::Active("ready".to_string()))),
            // decide() only pairs an action with the event that produced it.
            (action, event) => Err(ZeppError::InvalidState(format!(
                "action {action:?} does not match event {event:?}"
            ))),
        }
    }

    async fn do_install(&self) -> ZeppResult<Outcome> {
        let installer = Installer::new(&self.layout, &self.store, &self.fetcher);
        if !installer.install(false).await? {
            return Ok(Outcome::status(Status::Blocked(
                "waiting for distribution artifact".to_string(),
            )));
        }

        // Default config is written at install time so a later configure
        // step only patches computed values.
        self.writer().setup_config()?;
        Ok(Outcome::status(Status::Maintenance(
            "zeppelin installed".to_string(),
        )))
    }

    async fn do_configure_and_start(&self, spark: &SparkSettings) -> ZeppResult<Outcome> {
        let writer = self.writer();
        // configure() appends to the env script, so every configure cycle
        // starts from the distribution defaults.
        writer.setup_config()?;
        writer.setup_tutorial(&self.tutorial_sets)?;
        writer.configure(spark)?;
        writer.install_unit()?;

        self.process.enable().await?;
        self.process.start().await?;

        for port in self.layout.exposed_ports() {
            self.ports.open_port(port);
        }
        // `started` is recorded only after start() returned without raising.
        self.store.set_started(true)?;
        Ok(Outcome::status(Status::Active("ready".to_string())))
    }

    async fn do_update_upstream(&self, spark: &SparkSettings) -> ZeppResult<Outcome> {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "master".to_string(),
            serde_json::Value::String(spark.master.clone()),
        );
        self.api
            .modify_interpreter(SPARK_INTERPRETER, &InterpreterChanges::properties(properties))
            .await?;
        self.process.restart().await?;
        Ok(Outcome::status(Status::Active("ready".to_string())))
    }

    async fn do_release(&self) -> ZeppResult<Outcome> {
        for port in self.layout.exposed_ports() {
            self.ports.close_port(port);
        }
        self.process.stop().await?;
        self.store.set_started(false)?;
        Ok(Outcome::status(Status::Waiting(
            "waiting for Apache Spark to become ready".to_string(),
        )))
    }

    async fn do_import_notebooks(&self, requests: &[NotebookRequest]) -> ZeppResult<Outcome> {
        let mut acks = Vec::with_capacity(requests.len());
        for request in requests {
            // A key already in the map was imported by an earlier delivery.
            if let Some(existing) = self.store.notebook_id(&request.key)? {
                acks.push(Ack::Accepted {
                    key: request.key.clone(),
                    daemon_id: Some(existing),
                });
                continue;
            }

            match self.api.import_notebook(&request.content).await {
                Ok(Some(daemon_id)) => {
                    self.store.record_notebook(&request.key, &daemon_id)?;
                    acks.push(Ack::Accepted {
                        key: request.key.clone(),
                        daemon_id: Some(daemon_id),
                    });
                }
                Ok(None) => acks.push(Ack::Rejected {
                    key: request.key.clone(),
                    reason: "rejected by daemon".to_string(),
                }),
                Err(e) => {
                    tracing::warn!(key = %request.key, "notebook import failed: {e}");
                    acks.push(Ack::Rejected {
                        key: request.key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(Outcome {
            status: Status::Active("ready".to_string()),
            acks,
        })
    }

    async fn do_delete_notebooks(&self, keys: &[String]) -> ZeppResult<Outcome> {
        let mut acks = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(daemon_id) = self.store.notebook_id(key)? else {
                // Never imported here: a skip, not an error.
                tracing::info!(%key, "removal requested for unknown notebook, skipping");
                acks.push(Ack::Accepted {
                    key: key.clone(),
                    daemon_id: None,
                });
                continue;
            };

            match self.api.delete_notebook(&daemon_id).await {
                Ok(()) => {
                    self.store.forget_notebook(key)?;
                    acks.push(Ack::Accepted {
                        key: key.clone(),
                        daemon_id: Some(daemon_id),
                    });
                }
                Err(e) => {
                    tracing::warn!(%key, "notebook delete failed: {e}");
                    acks.push(Ack::Rejected {
                        key: key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(Outcome {
            status: Status::Active("ready".to_string()),
            acks,
        })
    }

    async fn do_modify_interpreters(&self, requests: &[InterpreterRequest]) -> ZeppResult<Outcome> {
        let mut acks = Vec::with_capacity(requests.len());
        let mut any_applied = false;
        for request in requests {
            // Failures are acknowledged per item; the rest of the batch
            // still runs.
            match self
                .api
                .modify_interpreter(&request.name, &request.changes)
                .await
            {
                Ok(()) => {
                    any_applied = true;
                    acks.push(Ack::Accepted {
                        key: request.name.clone(),
                        daemon_id: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(interpreter = %request.name, "interpreter change failed: {e}");
                    acks.push(Ack::Rejected {
                        key: request.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if any_applied {
            self.process.restart().await?;
        }
        Ok(Outcome {
            status: Status::Active("ready".to_string()),
            acks,
        })
    }

    fn reject_not_running(&self, event: &Event) -> Outcome {
        let keys: Vec<String> = match event {
            Event::RegisterNotebooks(requests) => {
                requests.iter().map(|r| r.key.clone()).collect()
            }
            Event::RemoveNotebooks(keys) => keys.clone(),
            Event::ChangeInterpreters(requests) => {
                requests.iter().map(|r| r.name.clone()).collect()
            }
            _ => Vec::new(),
        };
        Outcome {
            status: Status::Waiting("daemon is not running".to_string()),
            acks: keys
                .into_iter()
                .map(|key| Ack::Rejected {
                    key,
                    reason: "daemon is not running".to_string(),
                })
                .collect(),
        }
    }

    fn writer(&self) -> ConfigWriter<'_> {
        let mut writer = ConfigWriter::new(&self.layout);
        if let Some(user) = &self.service_user {
            writer = writer.with_service_user(user.clone());
        }
        writer
    }
}
