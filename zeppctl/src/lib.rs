//! zeppctl — deployment and lifecycle management for an Apache Zeppelin
//! notebook server.
//!
//! The crate fetches a distribution archive, lays out configuration, drives
//! the daemon through the init system with readiness guarantees, and keeps a
//! small amount of state (notebooks, interpreter settings) synchronized with
//! the daemon's REST API in response to events about a companion Spark
//! service.
//!
//! Component map, leaf first:
//! - [`layout`]: logical names to filesystem paths and ports
//! - [`resource`]: obtaining and verifying the distribution artifact
//! - [`install`]: idempotent extraction into the deployment root
//! - [`site`] / [`config`]: configuration materialization and patching
//! - [`process`]: init-system control with bounded readiness waits
//! - [`rest`]: the daemon REST API client
//! - [`state`]: persisted install flags and the notebook id map
//! - [`lifecycle`]: the event-driven orchestrator on top of all of it

pub mod config;
pub mod errors;
pub mod install;
pub mod layout;
pub mod lifecycle;
pub mod process;
pub mod resource;
pub mod rest;
pub mod site;
pub mod state;

pub use config::{ConfigWriter, ServiceUser, SparkSettings};
pub use errors::{ZeppError, ZeppResult};
pub use install::Installer;
pub use layout::DistLayout;
pub use lifecycle::{
    Ack, Event, InterpreterRequest, LifecycleController, NotebookRequest, Outcome, PortExposure,
    Status,
};
pub use process::{
    InitSystem, PollConfig, ProcTableProbe, ProcessController, ProcessProbe, ServiceStatus,
    SystemdInit,
};
pub use resource::{DistArtifact, RemoteResource, ResourceFetcher};
pub use rest::{InterpreterChanges, ZeppelinApi};
pub use state::{InstallState, StateStore};
