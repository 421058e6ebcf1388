//! Distribution installation.
//!
//! Extracts the fetched tarball into the deployment root, replacing any
//! previous installation wholesale (remove-then-move, never add-over).
//! Idempotent: once the persisted `installed` flag is set, repeated calls
//! short-circuit unless forced.

use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::errors::{ZeppError, ZeppResult};
use crate::layout::DistLayout;
use crate::resource::ResourceFetcher;
use crate::state::StateStore;

pub struct Installer<'a> {
    layout: &'a DistLayout,
    store: &'a StateStore,
    fetcher: &'a ResourceFetcher,
}

impl<'a> Installer<'a> {
    pub fn new(layout: &'a DistLayout, store: &'a StateStore, fetcher: &'a ResourceFetcher) -> Self {
        Self {
            layout,
            store,
            fetcher,
        }
    }

    /// Install the distribution.
    ///
    /// Returns `Ok(true)` when the installation is in place (either freshly
    /// laid out or already present), `Ok(false)` when no artifact is
    /// obtainable. Fetch and extraction failures propagate as
    /// [`ZeppError::Install`]; there is no automatic retry.
    pub async fn install(&self, force: bool) -> ZeppResult<bool> {
        if !force && self.store.is_installed()? {
            tracing::debug!("distribution already installed, skipping");
            return Ok(true);
        }

        if !self.fetcher.verify() {
            tracing::warn!("no distribution artifact available");
            return Ok(false);
        }

        let archive = self.fetcher.fetch().await?;
        self.layout.prepare()?;

        let destination = self.layout.home_dir();
        let root = self.layout.root().to_path_buf();
        tokio::task::spawn_blocking(move || extract_distribution(&archive, &root, &destination))
            .await
            .map_err(|e| ZeppError::Install(format!("extraction task failed: {e}")))??;

        self.store.set_installed(true)?;
        tracing::info!(home = %self.layout.home_dir().display(), "distribution installed");
        Ok(true)
    }
}

/// Unpack `archive` and move its contents to `destination`, replacing any
/// existing tree.
///
/// Distribution tarballs nest everything under a single versioned top-level
/// directory (`zeppelin-0.7.0-bin-all/...`); that level is stripped. The
/// staging directory lives under the deployment root so the final move is a
/// same-filesystem rename.
fn extract_distribution(archive: &Path, root: &Path, destination: &Path) -> ZeppResult<()> {
    let staging = tempfile::tempdir_in(root)
        .map_err(|e| ZeppError::Install(format!("failed to create staging dir: {e}")))?;

    let file = std::fs::File::open(archive)
        .map_err(|e| ZeppError::Install(format!("failed to open {}: {e}", archive.display())))?;
    Archive::new(GzDecoder::new(file))
        .unpack(staging.path())
        .map_err(|e| ZeppError::Install(format!("failed to extract {}: {e}", archive.display())))?;

    let source = strip_top_level(staging.path())?;

    if destination.symlink_metadata().is_ok() {
        std::fs::remove_dir_all(destination).map_err(|e| {
            ZeppError::Install(format!(
                "failed to remove previous installation {}: {e}",
                destination.display()
            ))
        })?;
    }
    std::fs::rename(&source, destination).map_err(|e| {
        ZeppError::Install(format!(
            "failed to move distribution into {}: {e}",
            destination.display()
        ))
    })?;
    Ok(())
}

/// Resolve the effective distribution root inside the staging directory.
/// A single directory entry is the nested top level; anything else means the
/// tarball had no wrapper directory and the staging dir itself is the root.
fn strip_top_level(staging: &Path) -> ZeppResult<PathBuf> {
    let entries: Vec<_> = std::fs::read_dir(staging)
        .map_err(|e| ZeppError::Install(format!("failed to read staging dir: {e}")))?
        .collect::<Result<_, _>>()
        .map_err(|e| ZeppError::Install(format!("failed to read staging dir: {e}")))?;

    match entries.as_slice() {
        [single] if single.path().is_dir() => Ok(single.path()),
        [] => Err(ZeppError::Install("archive is empty".to_string())),
        _ => Ok(staging.to_path_buf()),
    }
}
