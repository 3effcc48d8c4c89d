// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact store — content-bearing blob storage keyed by an artifact locator.
//
// The pipeline only needs put/get with read-after-write consistency on the
// calling request path; durability must hold at least as long as the
// referencing catalog records exist.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::ArtifactLocator;

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
///
/// Every stored artifact records this fingerprint so lineage can be audited
/// against the actual bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Blob storage contract consumed by the pipeline.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` at `locator`. Overwriting is never expected — locators
    /// embed freshly allocated ids.
    async fn put(&self, locator: &ArtifactLocator, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Fetch the bytes at `locator`; a missing object is
    /// [`FalzwerkError::ObjectMissing`].
    async fn get(&self, locator: &ArtifactLocator) -> Result<Vec<u8>>;
}

/// Filesystem-backed artifact store: `<root>/<container>/<object_path>`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a locator to a path under the root, refusing any component
    /// that would escape it.
    fn resolve(&self, locator: &ArtifactLocator) -> Result<PathBuf> {
        let relative = Path::new(&locator.container).join(&locator.object_path);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(FalzwerkError::Store(format!(
                        "locator {locator} contains an invalid path component"
                    )));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    #[instrument(skip(self, bytes), fields(%locator, bytes_len = bytes.len(), content_type))]
    async fn put(&self, locator: &ArtifactLocator, bytes: &[u8], content_type: &str) -> Result<()> {
        let path = self.resolve(locator)?;
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| FalzwerkError::Store(format!("create {parent:?}: {err}")))?;
            }
            std::fs::write(&path, &bytes)
                .map_err(|err| FalzwerkError::Store(format!("write {path:?}: {err}")))
        })
        .await
        .map_err(|err| FalzwerkError::Store(format!("blocking task failed: {err}")))??;

        debug!("artifact stored");
        Ok(())
    }

    #[instrument(skip(self), fields(%locator))]
    async fn get(&self, locator: &ArtifactLocator) -> Result<Vec<u8>> {
        let path = self.resolve(locator)?;
        let display = locator.to_string();

        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            std::fs::read(&path).map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    FalzwerkError::ObjectMissing(display)
                } else {
                    FalzwerkError::Store(format!("read {path:?}: {err}"))
                }
            })
        })
        .await
        .map_err(|err| FalzwerkError::Store(format!("blocking task failed: {err}")))??;

        debug!(bytes_len = bytes.len(), "artifact fetched");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("hello") — verified against coreutils sha256sum.
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(hash_bytes(b"hello"), expected);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());
        let locator = ArtifactLocator::new("uploads", "abc/report.pdf");

        store
            .put(&locator, b"%PDF-1.5 fake", "application/pdf")
            .await
            .expect("put");
        let bytes = store.get(&locator).await.expect("get");
        assert_eq!(bytes, b"%PDF-1.5 fake");
    }

    #[tokio::test]
    async fn get_missing_object_is_typed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());
        let locator = ArtifactLocator::new("uploads", "nope/missing.pdf");

        let result = store.get(&locator).await;
        assert!(matches!(result, Err(FalzwerkError::ObjectMissing(_))));
    }

    #[tokio::test]
    async fn path_traversal_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());
        let locator = ArtifactLocator::new("uploads", "../outside.pdf");

        let result = store.put(&locator, b"x", "application/pdf").await;
        assert!(matches!(result, Err(FalzwerkError::Store(_))));
    }
}
