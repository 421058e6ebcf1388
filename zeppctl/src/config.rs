//! Configuration writing.
//!
//! Lays down the live configuration directory from the distribution's
//! templates, patches the site property map and environment script with
//! computed values, maintains the system-wide environment file, materializes
//! the init-unit definition, and relocates the bundled tutorial notebooks.
//!
//! `setup_config` is deliberately destructive (the live config is reset from
//! templates on every reconfiguration); `configure` is additive and safe to
//! re-run (the PATH entry is append-once).

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::{ZeppError, ZeppResult};
use crate::layout::{DistLayout, files};
use crate::site::SiteConfig;

/// Rendered into the init-unit definition and used for ownership handoff.
#[derive(Clone, Debug)]
pub struct ServiceUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

/// Upstream compute-engine settings consumed from the Spark relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparkSettings {
    /// Master endpoint or execution mode (`spark://host:7077`, `yarn-client`).
    pub master: String,
    pub spark_home: PathBuf,
    pub hadoop_conf_dir: PathBuf,
    pub extra_classpath: String,
    pub driver_memory: String,
    pub executor_memory: String,
}

impl Default for SparkSettings {
    fn default() -> Self {
        Self {
            master: "yarn-client".to_string(),
            spark_home: PathBuf::from("/usr/lib/spark"),
            hadoop_conf_dir: PathBuf::from("/etc/hadoop/conf"),
            extra_classpath: String::new(),
            driver_memory: "1g".to_string(),
            executor_memory: "1g".to_string(),
        }
    }
}

const UNIT_TEMPLATE: &str = include_str!("../templates/zeppelin.service.in");

pub struct ConfigWriter<'a> {
    layout: &'a DistLayout,
    service_user: Option<ServiceUser>,
}

impl<'a> ConfigWriter<'a> {
    pub fn new(layout: &'a DistLayout) -> Self {
        Self {
            layout,
            service_user: None,
        }
    }

    pub fn with_service_user(mut self, user: ServiceUser) -> Self {
        self.service_user = Some(user);
        self
    }

    // ========================================================================
    // TEMPLATE RESET
    // ========================================================================

    /// Reset the live configuration directory from the distribution's
    /// defaults, then materialize the env and site files from their
    /// `.template` siblings only where the live file does not yet exist.
    pub fn setup_config(&self) -> ZeppResult<()> {
        let conf = self.layout.conf_dir();
        if conf.exists() {
            std::fs::remove_dir_all(&conf).map_err(|e| {
                ZeppError::Config(format!("failed to reset {}: {e}", conf.display()))
            })?;
        }
        copy_tree(&self.layout.dist_conf_dir(), &conf)?;

        for name in [files::ENV_FILE, files::SITE_FILE] {
            let live = conf.join(name);
            let template = conf.join(format!("{name}{}", files::TEMPLATE_SUFFIX));
            if !live.exists() && template.exists() {
                std::fs::copy(&template, &live).map_err(|e| {
                    ZeppError::Config(format!(
                        "failed to materialize {}: {e}",
                        live.display()
                    ))
                })?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // CONFIGURE
    // ========================================================================

    /// Rewrite the system environment, site properties, and environment
    /// script with computed values. Safe to re-run: the PATH entry is
    /// appended exactly once.
    pub fn configure(&self, spark: &SparkSettings) -> ZeppResult<()> {
        self.update_system_env()?;
        self.update_site()?;
        self.append_env_script(spark)?;
        self.handoff_ownership()?;
        Ok(())
    }

    fn update_system_env(&self) -> ZeppResult<()> {
        let path = self.layout.system_env_file();
        let mut env = SystemEnv::load(path)?;

        let bin = self.layout.home_dir().join("bin");
        env.append_path_entry(&bin.to_string_lossy());
        env.set(
            "ZEPPELIN_CONF_DIR",
            &self.layout.conf_dir().to_string_lossy(),
        );
        env.save(path)
    }

    fn update_site(&self) -> ZeppResult<()> {
        let path = self.layout.site_file();
        let mut site = if path.exists() {
            SiteConfig::load(&path)?
        } else {
            SiteConfig::new()
        };
        site.set(
            "zeppelin.server.port",
            self.layout.server_port().to_string(),
        );
        site.set(
            "zeppelin.notebook.dir",
            self.layout.notebooks_dir().to_string_lossy().to_string(),
        );
        site.save(&path)
    }

    fn append_env_script(&self, spark: &SparkSettings) -> ZeppResult<()> {
        use std::fmt::Write as _;

        let home = self.layout.home_dir();
        let spark_home = spark.spark_home.display();

        let mut block = String::new();
        let mut export = |key: &str, value: String| {
            let _ = writeln!(block, "export {key}={value}");
        };
        export(
            "ZEPPELIN_CLASSPATH_OVERRIDES",
            spark.extra_classpath.clone(),
        );
        export("ZEPPELIN_HOME", home.display().to_string());
        export(
            "ZEPPELIN_JAVA_OPTS",
            format!(
                "\"-Dspark.driver.memory={} -Dspark.executor.memory={}\"",
                spark.driver_memory, spark.executor_memory
            ),
        );
        export(
            "ZEPPELIN_LOG_DIR",
            self.layout.logs_dir().display().to_string(),
        );
        export(
            "ZEPPELIN_MEM",
            "\"-Xms128m -Xmx1024m -XX:MaxPermSize=512m\"".to_string(),
        );
        export(
            "ZEPPELIN_NOTEBOOK_DIR",
            self.layout.notebooks_dir().display().to_string(),
        );
        export("SPARK_HOME", spark_home.to_string());
        export(
            "SPARK_SUBMIT_OPTIONS",
            format!(
                "\"--driver-memory {} --executor-memory {}\"",
                spark.driver_memory, spark.executor_memory
            ),
        );
        export(
            "HADOOP_CONF_DIR",
            spark.hadoop_conf_dir.display().to_string(),
        );
        export(
            "PYTHONPATH",
            format!("{spark_home}/python:{spark_home}/python/lib/py4j-src.zip"),
        );
        export("MASTER", spark.master.clone());

        let path = self.layout.env_file();
        let mut content = if path.exists() {
            std::fs::read_to_string(&path).map_err(|e| {
                ZeppError::Config(format!("failed to read {}: {e}", path.display()))
            })?
        } else {
            String::new()
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&block);
        std::fs::write(&path, content)
            .map_err(|e| ZeppError::Config(format!("failed to write {}: {e}", path.display())))
    }

    /// The daemon writes `interpreter.json` into its config directory at
    /// first run and persists notebooks itself, so both trees must belong to
    /// the runtime user. Direct syscalls, checked; no shelling out.
    fn handoff_ownership(&self) -> ZeppResult<()> {
        let Some(user) = &self.service_user else {
            return Ok(());
        };
        for root in [self.layout.conf_dir(), self.layout.notebooks_dir()] {
            if !root.exists() {
                continue;
            }
            chown_tree(&root, user.uid, user.gid)?;
        }
        Ok(())
    }

    // ========================================================================
    // INIT UNIT
    // ========================================================================

    /// Render the init-unit definition, rotating any pre-existing unit file
    /// to a `.backup` sibling first. A stale backup is removed before the
    /// rotation so the current unit is never silently lost.
    pub fn install_unit(&self) -> ZeppResult<()> {
        let unit_path = self.layout.unit_file();
        let user = self
            .service_user
            .as_ref()
            .map(|u| u.name.as_str())
            .unwrap_or("root");

        let rendered = UNIT_TEMPLATE
            .replace("@HOME@", &self.layout.home_dir().to_string_lossy())
            .replace("@CONF_DIR@", &self.layout.conf_dir().to_string_lossy())
            .replace("@USER@", user);

        if unit_path.exists() {
            let backup = backup_path(unit_path);
            if backup.exists() {
                std::fs::remove_file(&backup).map_err(|e| {
                    ZeppError::Config(format!(
                        "failed to remove stale backup {}: {e}",
                        backup.display()
                    ))
                })?;
            }
            std::fs::rename(unit_path, &backup).map_err(|e| {
                ZeppError::Config(format!(
                    "failed to back up unit file to {}: {e}",
                    backup.display()
                ))
            })?;
        }

        if let Some(parent) = unit_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ZeppError::Config(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        std::fs::write(unit_path, rendered).map_err(|e| {
            ZeppError::Config(format!("failed to write {}: {e}", unit_path.display()))
        })
    }

    // ========================================================================
    // TUTORIAL NOTEBOOKS
    // ========================================================================

    /// Relocate the distribution's bundled tutorial into the real notebook
    /// store, copy in the supplied example notebook sets, and symlink the
    /// distribution's notebook location back to the real store.
    ///
    /// The daemon has been observed to look in `ZEPPELIN_HOME/notebook`
    /// regardless of the configured notebook directory; the symlink keeps
    /// both views consistent.
    pub fn setup_tutorial(&self, extra_sets: &[PathBuf]) -> ZeppResult<()> {
        let notebooks = self.layout.notebooks_dir();
        let dist_notebooks = self.layout.dist_notebook_dir();

        if notebooks.exists() {
            std::fs::remove_dir_all(&notebooks).map_err(|e| {
                ZeppError::Config(format!("failed to reset {}: {e}", notebooks.display()))
            })?;
        }

        // Move the first bundled tutorial directory into the real store.
        match first_subdirectory(&dist_notebooks)? {
            Some(bundled) => {
                std::fs::rename(&bundled, &notebooks).map_err(|e| {
                    ZeppError::Config(format!(
                        "failed to move bundled tutorial to {}: {e}",
                        notebooks.display()
                    ))
                })?;
            }
            None => {
                std::fs::create_dir_all(&notebooks).map_err(|e| {
                    ZeppError::Config(format!("failed to create {}: {e}", notebooks.display()))
                })?;
            }
        }

        for source in extra_sets {
            let name = source
                .file_name()
                .ok_or_else(|| {
                    ZeppError::Config(format!(
                        "tutorial source has no name: {}",
                        source.display()
                    ))
                })?
                .to_os_string();
            copy_tree(source, &notebooks.join(name))?;
        }

        // The original location is now misleading; replace it with a symlink
        // to the real store. On a re-run it is already a symlink and must be
        // unlinked, not traversed.
        match dist_notebooks.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => {
                std::fs::remove_file(&dist_notebooks).map_err(|e| {
                    ZeppError::Config(format!(
                        "failed to unlink {}: {e}",
                        dist_notebooks.display()
                    ))
                })?;
            }
            Ok(_) => {
                std::fs::remove_dir_all(&dist_notebooks).map_err(|e| {
                    ZeppError::Config(format!(
                        "failed to remove {}: {e}",
                        dist_notebooks.display()
                    ))
                })?;
            }
            Err(_) => {}
        }
        std::os::unix::fs::symlink(&notebooks, &dist_notebooks).map_err(|e| {
            ZeppError::Config(format!(
                "failed to link {} -> {}: {e}",
                dist_notebooks.display(),
                notebooks.display()
            ))
        })?;
        Ok(())
    }
}

/// System-wide environment file (`/etc/environment` format): `KEY="VALUE"`
/// pairs, order and comments preserved across edits.
struct SystemEnv {
    lines: Vec<EnvLine>,
}

enum EnvLine {
    Pair(String, String),
    Verbatim(String),
}

impl SystemEnv {
    fn load(path: &Path) -> ZeppResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(ZeppError::Config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let lines = text
            .lines()
            .map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return EnvLine::Verbatim(line.to_string());
                }
                match trimmed.split_once('=') {
                    Some((key, value)) => EnvLine::Pair(
                        key.trim().to_string(),
                        value.trim().trim_matches('"').to_string(),
                    ),
                    None => EnvLine::Verbatim(line.to_string()),
                }
            })
            .collect();
        Ok(Self { lines })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            EnvLine::Pair(k, v) if k == key => Some(v.as_str()),
            _ => None,
        })
    }

    fn set(&mut self, key: &str, value: &str) {
        for line in &mut self.lines {
            if let EnvLine::Pair(k, v) = line
                && k == key
            {
                *v = value.to_string();
                return;
            }
        }
        self.lines
            .push(EnvLine::Pair(key.to_string(), value.to_string()));
    }

    /// Append a colon-separated PATH entry unless already present.
    fn append_path_entry(&mut self, entry: &str) {
        match self.get("PATH").map(str::to_string) {
            Some(current) => {
                if current.split(':').any(|p| p == entry) {
                    return;
                }
                self.set("PATH", &format!("{current}:{entry}"));
            }
            None => self.set("PATH", entry),
        }
    }

    fn save(&self, path: &Path) -> ZeppResult<()> {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                EnvLine::Pair(k, v) => out.push_str(&format!("{k}=\"{v}\"\n")),
                EnvLine::Verbatim(raw) => {
                    out.push_str(raw);
                    out.push('\n');
                }
            }
        }
        std::fs::write(path, out)
            .map_err(|e| ZeppError::Config(format!("failed to write {}: {e}", path.display())))
    }
}

/// Recursively copy a directory tree.
fn copy_tree(src: &Path, dst: &Path) -> ZeppResult<()> {
    for entry in WalkDir::new(src) {
        let entry =
            entry.map_err(|e| ZeppError::Config(format!("failed to walk {}: {e}", src.display())))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| ZeppError::Config(format!("path outside tree: {e}")))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| {
                ZeppError::Config(format!("failed to create {}: {e}", target.display()))
            })?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| {
                ZeppError::Config(format!("failed to copy to {}: {e}", target.display()))
            })?;
        }
    }
    Ok(())
}

/// Recursively chown a tree, symlinks not followed.
fn chown_tree(root: &Path, uid: u32, gid: u32) -> ZeppResult<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry
            .map_err(|e| ZeppError::Config(format!("failed to walk {}: {e}", root.display())))?;
        std::os::unix::fs::lchown(entry.path(), Some(uid), Some(gid)).map_err(|e| {
            ZeppError::Config(format!(
                "failed to chown {}: {e}",
                entry.path().display()
            ))
        })?;
    }
    Ok(())
}

fn backup_path(unit: &Path) -> PathBuf {
    let mut os = unit.as_os_str().to_os_string();
    os.push(".backup");
    PathBuf::from(os)
}

fn first_subdirectory(dir: &Path) -> ZeppResult<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ZeppError::Config(format!("failed to read {}: {e}", dir.display())))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    Ok(subdirs.into_iter().next())
}
