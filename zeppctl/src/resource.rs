//! Distribution artifact sources.
//!
//! The distribution tarball arrives one of two ways: a file attached
//! directly to the unit, or a named remote resource (URL plus sha256)
//! registered in configuration. Each variant controls its own verification:
//! attached files must exist with nonzero size, remote downloads must match
//! their declared digest before they are handed to the installer.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::errors::{ZeppError, ZeppResult};

/// A named remote artifact descriptor.
#[derive(Clone, Debug)]
pub struct RemoteResource {
    pub url: String,
    /// Hex-encoded sha256 of the archive.
    pub sha256: String,
}

/// Where the distribution archive comes from.
#[derive(Clone, Debug)]
pub enum DistArtifact {
    /// A file supplied directly (already on local disk).
    Attached(PathBuf),
    /// A registered remote resource, downloaded on demand.
    Remote(RemoteResource),
}

/// Obtains the distribution archive and verifies it is usable.
pub struct ResourceFetcher {
    artifact: Option<DistArtifact>,
    cache_dir: PathBuf,
}

impl ResourceFetcher {
    pub fn new(artifact: Option<DistArtifact>, cache_dir: PathBuf) -> Self {
        Self {
            artifact,
            cache_dir,
        }
    }

    /// True iff a usable artifact is currently obtainable: an attached file
    /// of nonzero size, or a registered remote descriptor. Remote content is
    /// not downloaded here; its digest is checked at fetch time.
    pub fn verify(&self) -> bool {
        match &self.artifact {
            Some(DistArtifact::Attached(path)) => {
                path.metadata().map(|m| m.len() > 0).unwrap_or(false)
            }
            Some(DistArtifact::Remote(_)) => true,
            None => false,
        }
    }

    /// Produce a local path to the archive, downloading and digest-checking
    /// remote resources into the cache directory.
    pub async fn fetch(&self) -> ZeppResult<PathBuf> {
        match &self.artifact {
            Some(DistArtifact::Attached(path)) => {
                if !self.verify() {
                    return Err(ZeppError::UnavailableResource);
                }
                Ok(path.clone())
            }
            Some(DistArtifact::Remote(remote)) => self.download(remote).await,
            None => Err(ZeppError::UnavailableResource),
        }
    }

    async fn download(&self, remote: &RemoteResource) -> ZeppResult<PathBuf> {
        let filename = remote
            .url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("zeppelin.tar.gz");
        let target = self.cache_dir.join(filename);

        // Cache hit: reuse a previous download when its digest still matches.
        if target.is_file() && file_digest(&target)? == remote.sha256.to_lowercase() {
            tracing::debug!(path = %target.display(), "reusing cached artifact");
            return Ok(target);
        }

        std::fs::create_dir_all(&self.cache_dir).map_err(|e| {
            ZeppError::Storage(format!(
                "failed to create cache dir {}: {e}",
                self.cache_dir.display()
            ))
        })?;

        tracing::info!(url = %remote.url, "downloading distribution artifact");
        let response = reqwest::get(&remote.url).await?;
        if !response.status().is_success() {
            return Err(ZeppError::Install(format!(
                "artifact download failed: {} returned {}",
                remote.url,
                response.status()
            )));
        }
        let bytes = response.bytes().await?;

        let digest = hex::encode(Sha256::digest(&bytes));
        if digest != remote.sha256.to_lowercase() {
            return Err(ZeppError::Install(format!(
                "artifact digest mismatch for {}: expected {}, got {digest}",
                remote.url, remote.sha256
            )));
        }

        std::fs::write(&target, &bytes).map_err(|e| {
            ZeppError::Storage(format!("failed to write {}: {e}", target.display()))
        })?;
        Ok(target)
    }
}

/// Hex sha256 of a file on disk.
fn file_digest(path: &Path) -> ZeppResult<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| ZeppError::Storage(format!("failed to read {}: {e}", path.display())))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
