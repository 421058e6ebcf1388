//! Filesystem layout and port assignments for the managed deployment.
//!
//! Resolves logical names (installation, live config, notebooks, logs) to
//! concrete paths under a single configured root, and owns directory
//! creation/removal. Built once at process start and passed by reference;
//! nothing in here mutates after construction.

use std::path::{Path, PathBuf};

use crate::errors::{ZeppError, ZeppResult};

/// Directory structure constants.
pub mod dirs {
    /// Unpacked distribution tree.
    pub const ZEPPELIN_DIR: &str = "zeppelin";

    /// Live configuration directory, reset from the distribution templates.
    pub const CONF_DIR: &str = "conf";

    /// Real notebook store (the distribution tree symlinks back to this).
    pub const NOTEBOOKS_DIR: &str = "notebooks";

    /// Daemon log output.
    pub const LOGS_DIR: &str = "logs";

    /// Downloaded artifact cache.
    pub const CACHE_DIR: &str = "cache";
}

/// Well-known file names.
pub mod files {
    pub const ENV_FILE: &str = "zeppelin-env.sh";
    pub const SITE_FILE: &str = "zeppelin-site.xml";
    pub const TEMPLATE_SUFFIX: &str = ".template";
    pub const STATE_DB: &str = "state.db";
}

/// Default TCP port the daemon serves its UI and REST API on.
pub const DEFAULT_SERVER_PORT: u16 = 9090;

/// Resolved deployment layout: one root directory plus the daemon port.
///
/// The system environment file and init-unit path default to their
/// system-wide locations but are injectable so tests can point them at a
/// temporary directory.
#[derive(Clone, Debug)]
pub struct DistLayout {
    root: PathBuf,
    server_port: u16,
    system_env_file: PathBuf,
    unit_file: PathBuf,
    unit_name: String,
}

impl DistLayout {
    pub fn new(root: PathBuf, server_port: u16) -> Self {
        Self {
            root,
            server_port,
            system_env_file: PathBuf::from("/etc/environment"),
            unit_file: PathBuf::from("/etc/systemd/system/zeppelin.service"),
            unit_name: "zeppelin".to_string(),
        }
    }

    /// Override the system-wide environment file (tests).
    pub fn with_system_env_file(mut self, path: PathBuf) -> Self {
        self.system_env_file = path;
        self
    }

    /// Override the init-unit definition path (tests).
    pub fn with_unit_file(mut self, path: PathBuf) -> Self {
        self.unit_file = path;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Ports that must be exposed while the daemon is running.
    pub fn exposed_ports(&self) -> Vec<u16> {
        vec![self.server_port]
    }

    /// Installation tree: `<root>/zeppelin`
    pub fn home_dir(&self) -> PathBuf {
        self.root.join(dirs::ZEPPELIN_DIR)
    }

    /// Live configuration directory: `<root>/conf`
    pub fn conf_dir(&self) -> PathBuf {
        self.root.join(dirs::CONF_DIR)
    }

    /// Real notebook store: `<root>/notebooks`
    pub fn notebooks_dir(&self) -> PathBuf {
        self.root.join(dirs::NOTEBOOKS_DIR)
    }

    /// Daemon log directory: `<root>/logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(dirs::LOGS_DIR)
    }

    /// Download cache for remote artifacts: `<root>/cache`
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(dirs::CACHE_DIR)
    }

    /// Default configuration shipped inside the distribution:
    /// `<root>/zeppelin/conf`
    pub fn dist_conf_dir(&self) -> PathBuf {
        self.home_dir().join("conf")
    }

    /// Notebook directory inside the distribution tree:
    /// `<root>/zeppelin/notebook` (replaced by a symlink to the real store).
    pub fn dist_notebook_dir(&self) -> PathBuf {
        self.home_dir().join("notebook")
    }

    /// Environment script in the live config: `<root>/conf/zeppelin-env.sh`
    pub fn env_file(&self) -> PathBuf {
        self.conf_dir().join(files::ENV_FILE)
    }

    /// Site configuration in the live config: `<root>/conf/zeppelin-site.xml`
    pub fn site_file(&self) -> PathBuf {
        self.conf_dir().join(files::SITE_FILE)
    }

    /// Persistent state database: `<root>/state.db`
    pub fn state_db_path(&self) -> PathBuf {
        self.root.join(files::STATE_DB)
    }

    /// System-wide environment file edited during configure.
    pub fn system_env_file(&self) -> &Path {
        &self.system_env_file
    }

    /// Init-unit definition path.
    pub fn unit_file(&self) -> &Path {
        &self.unit_file
    }

    /// Init-unit name passed to the service manager.
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Create the writable directory tree (root, notebooks, logs, cache).
    ///
    /// The installation tree and live config are created by the installer
    /// and configurator respectively.
    pub fn prepare(&self) -> ZeppResult<()> {
        for dir in [
            self.root.clone(),
            self.notebooks_dir(),
            self.logs_dir(),
            self.cache_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                ZeppError::Storage(format!("failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Remove every managed directory. Explicit cleanup only; never called
    /// as part of normal lifecycle rollback.
    pub fn cleanup(&self) -> ZeppResult<()> {
        for dir in [
            self.home_dir(),
            self.conf_dir(),
            self.notebooks_dir(),
            self.logs_dir(),
            self.cache_dir(),
        ] {
            if dir.symlink_metadata().is_ok() {
                std::fs::remove_dir_all(&dir).map_err(|e| {
                    ZeppError::Storage(format!("failed to remove {}: {e}", dir.display()))
                })?;
            }
        }
        Ok(())
    }
}
