use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use zeppctl::{
    DistArtifact, DistLayout, LifecycleController, ProcTableProbe, ProcessController,
    RemoteResource, ResourceFetcher, SparkSettings, StateStore, ZeppelinApi,
};

/// Command-line pattern matched against `/proc/*/cmdline` to find the
/// daemon's JVM. Deliberately not "zeppelin": our own command line carries
/// that word in paths.
const DAEMON_PATTERN: &str = "org.apache.zeppelin";

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Deployment root directory
    #[arg(
        long,
        env = "ZEPPCTL_ROOT",
        default_value = "/srv/zeppelin",
        global = true
    )]
    pub root: PathBuf,

    /// TCP port the daemon serves its UI and REST API on
    #[arg(
        long,
        env = "ZEPPCTL_PORT",
        default_value_t = zeppctl::layout::DEFAULT_SERVER_PORT,
        global = true
    )]
    pub port: u16,

    /// Override the system-wide environment file
    #[arg(long, value_name = "PATH", global = true)]
    pub system_env_file: Option<PathBuf>,

    /// Override the init-unit definition path
    #[arg(long, value_name = "PATH", global = true)]
    pub unit_file: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn layout(&self) -> DistLayout {
        let mut layout = DistLayout::new(self.root.clone(), self.port);
        if let Some(path) = &self.system_env_file {
            layout = layout.with_system_env_file(path.clone());
        }
        if let Some(path) = &self.unit_file {
            layout = layout.with_unit_file(path.clone());
        }
        layout
    }

    pub fn store(&self, layout: &DistLayout) -> anyhow::Result<StateStore> {
        std::fs::create_dir_all(layout.root())?;
        Ok(StateStore::open(&layout.state_db_path())?)
    }

    pub fn process(&self, layout: &DistLayout) -> ProcessController {
        ProcessController::new(
            layout.unit_name(),
            layout.server_port(),
            Arc::new(zeppctl::SystemdInit),
            Arc::new(ProcTableProbe::new(DAEMON_PATTERN)),
        )
    }

    pub fn controller(
        &self,
        artifact: Option<DistArtifact>,
    ) -> anyhow::Result<LifecycleController> {
        let layout = self.layout();
        let store = self.store(&layout)?;
        let fetcher = ResourceFetcher::new(artifact, layout.cache_dir());
        let process = self.process(&layout);
        let api = ZeppelinApi::new(layout.server_port());
        Ok(LifecycleController::new(layout, store, fetcher, process, api))
    }
}

/// Where the distribution archive comes from, shared by `install` and the
/// upstream events that may trigger an install.
#[derive(Args, Debug)]
pub struct ArtifactArgs {
    /// Local distribution archive (tar.gz)
    #[arg(long, value_name = "PATH", conflicts_with = "url")]
    pub archive: Option<PathBuf>,

    /// Remote archive URL
    #[arg(long, requires = "sha256")]
    pub url: Option<String>,

    /// Hex-encoded sha256 of the remote archive
    #[arg(long, requires = "url")]
    pub sha256: Option<String>,
}

impl ArtifactArgs {
    pub fn artifact(&self) -> Option<DistArtifact> {
        if let Some(path) = &self.archive {
            return Some(DistArtifact::Attached(path.clone()));
        }
        if let (Some(url), Some(sha256)) = (&self.url, &self.sha256) {
            return Some(DistArtifact::Remote(RemoteResource {
                url: url.clone(),
                sha256: sha256.clone(),
            }));
        }
        None
    }
}

/// Upstream compute-engine settings, shared by `configure` and the upstream
/// events.
#[derive(Args, Debug)]
pub struct SparkArgs {
    /// Master endpoint or execution mode
    #[arg(long, default_value = "yarn-client")]
    pub master: String,

    #[arg(long, default_value = "/usr/lib/spark")]
    pub spark_home: PathBuf,

    #[arg(long, default_value = "/etc/hadoop/conf")]
    pub hadoop_conf_dir: PathBuf,

    /// Extra entries for the daemon classpath
    #[arg(long, default_value = "")]
    pub extra_classpath: String,

    #[arg(long, default_value = "1g")]
    pub driver_memory: String,

    #[arg(long, default_value = "1g")]
    pub executor_memory: String,
}

impl SparkArgs {
    pub fn settings(&self) -> SparkSettings {
        SparkSettings {
            master: self.master.clone(),
            spark_home: self.spark_home.clone(),
            hadoop_conf_dir: self.hadoop_conf_dir.clone(),
            extra_classpath: self.extra_classpath.clone(),
            driver_memory: self.driver_memory.clone(),
            executor_memory: self.executor_memory.clone(),
        }
    }
}
