// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload intake — turn caller-supplied bytes into the first artifact of a
// lineage, with size/type validation, content fingerprinting, and a
// file.uploaded announcement.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use falzwerk_core::PipelineConfig;
use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::{
    ArtifactId, ArtifactLocator, ArtifactOrigin, ArtifactRecord, LifecycleEvent,
};
use falzwerk_store::{ArtifactStore, EventPublisher, MetadataCatalog, hash_bytes};

use crate::coordinator::DownloadPayload;

/// Accepts uploads and answers file queries.
#[derive(Clone)]
pub struct UploadIntake {
    store: Arc<dyn ArtifactStore>,
    catalog: Arc<dyn MetadataCatalog>,
    publisher: Arc<dyn EventPublisher>,
    config: PipelineConfig,
}

impl UploadIntake {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        catalog: Arc<dyn MetadataCatalog>,
        publisher: Arc<dyn EventPublisher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            publisher,
            config,
        }
    }

    /// Ingest one upload: validate, store, record, announce.
    ///
    /// The MIME type is sniffed from the content first; the caller's declared
    /// type and the file extension are fallbacks, never overrides. PDF
    /// uploads are summarised (page count, information dictionary) into the
    /// file record.
    #[instrument(skip(self, bytes), fields(filename = %original_filename, bytes_len = bytes.len()))]
    pub async fn ingest(
        &self,
        bytes: &[u8],
        original_filename: &str,
        declared_mime: Option<&str>,
        owner_id: Option<&str>,
    ) -> Result<ArtifactRecord> {
        if bytes.is_empty() {
            return Err(FalzwerkError::Validation("upload is empty".into()));
        }
        if bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(FalzwerkError::Validation(format!(
                "upload of {} bytes exceeds the limit of {} bytes",
                bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let mime_type = detect_mime(bytes, original_filename, declared_mime);
        if !self
            .config
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed == &mime_type)
        {
            return Err(FalzwerkError::Validation(format!(
                "unsupported file type: {mime_type}"
            )));
        }

        let artifact_id = ArtifactId::new();
        let safe_name = sanitise_filename(original_filename);
        let locator = ArtifactLocator::new(
            self.config.upload_container.as_str(),
            format!("{artifact_id}/{safe_name}"),
        );
        self.store.put(&locator, bytes, &mime_type).await?;

        let pdf_info = if mime_type == "application/pdf" {
            match falzwerk_document::inspect(bytes) {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn!(%err, "could not summarise uploaded PDF");
                    None
                }
            }
        } else {
            None
        };

        let record = ArtifactRecord {
            artifact_id,
            locator,
            mime_type: mime_type.clone(),
            size_bytes: bytes.len() as u64,
            sha256: hash_bytes(bytes),
            created_at: Utc::now(),
            owner_id: owner_id.map(str::to_owned),
            lineage_parent_id: None,
            origin: ArtifactOrigin::Uploaded {
                original_filename: original_filename.to_owned(),
            },
            pdf_info,
        };
        self.catalog.insert_file(&record).await?;

        let event = LifecycleEvent::FileUploaded {
            artifact_id,
            mime_type,
            original_filename: original_filename.to_owned(),
            owner_id: owner_id.map(str::to_owned),
        };
        if let Err(err) = self.publisher.publish(&event).await {
            warn!(%err, "file.uploaded publish failed; continuing");
        }

        info!(%artifact_id, "upload ingested");
        Ok(record)
    }

    /// The file record for `artifact_id`, or a not-found error.
    pub async fn file_info(&self, artifact_id: ArtifactId) -> Result<ArtifactRecord> {
        self.catalog
            .find_file(artifact_id)
            .await?
            .ok_or(FalzwerkError::ArtifactNotFound(artifact_id))
    }

    /// Page through one owner's files, newest first.
    pub async fn list_files(
        &self,
        owner_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ArtifactRecord>> {
        self.catalog.list_files(owner_id, offset, limit).await
    }

    /// Fetch any stored artifact's bytes with its response metadata.
    #[instrument(skip(self), fields(%artifact_id))]
    pub async fn fetch(&self, artifact_id: ArtifactId) -> Result<DownloadPayload> {
        let record = self.file_info(artifact_id).await?;
        let bytes = self.store.get(&record.locator).await?;

        let filename = match &record.origin {
            ArtifactOrigin::Uploaded { original_filename } => original_filename.clone(),
            ArtifactOrigin::Derived { .. } => format!("{artifact_id}.pdf"),
        };
        Ok(DownloadPayload {
            bytes,
            mime_type: record.mime_type,
            filename,
        })
    }
}

/// Determine the MIME type: content magic first, then the declared type,
/// then the file extension.
fn detect_mime(bytes: &[u8], filename: &str, declared: Option<&str>) -> String {
    if let Some(sniffed) = sniff_magic(bytes) {
        return sniffed.to_owned();
    }
    if let Some(declared) = declared
        && !declared.is_empty()
    {
        return declared.to_owned();
    }
    extension_mime(filename)
        .unwrap_or("application/octet-stream")
        .to_owned()
}

/// Well-known magic byte prefixes.
fn sniff_magic(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"\xFF\xD8\xFF") {
        Some("image/jpeg")
    } else if bytes.starts_with(b"II*\x00") || bytes.starts_with(b"MM\x00*") {
        Some("image/tiff")
    } else {
        None
    }
}

/// Infer a MIME type from the file extension.
fn extension_mime(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit('.').next()?;
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "tif" | "tiff" => Some("image/tiff"),
        "txt" => Some("text/plain"),
        "html" | "htm" => Some("text/html"),
        "md" | "markdown" => Some("text/markdown"),
        _ => None,
    }
}

/// Reduce a caller-supplied filename to a single safe path segment.
fn sanitise_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_owned()
    } else {
        base.to_owned()
    }
}
