// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Falzwerk operation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one transformation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an artifact's bytes live: a container plus an object path inside it.
///
/// Rendered as `container/object_path`. Object paths conventionally embed the
/// owning id, e.g. `<operation_id>/processed.pdf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocator {
    pub container: String,
    pub object_path: String,
}

impl ArtifactLocator {
    pub fn new(container: impl Into<String>, object_path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            object_path: object_path.into(),
        }
    }
}

impl std::fmt::Display for ArtifactLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.container, self.object_path)
    }
}

/// How an artifact came into existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ArtifactOrigin {
    /// Ingested directly from a caller.
    Uploaded { original_filename: String },
    /// Produced by a completed operation.
    Derived { operation_id: OperationId },
}

/// Document-information summary extracted from a PDF at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfSummary {
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// Catalog record for one immutable artifact.
///
/// Once written, the referenced bytes and the `artifact_id` never change.
/// Derived artifacts always carry `lineage_parent_id`, so the lineage forms
/// a forest rooted at uploaded files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub artifact_id: ArtifactId,
    pub locator: ArtifactLocator,
    pub mime_type: String,
    pub size_bytes: u64,
    /// SHA-256 hex digest of the stored bytes.
    pub sha256: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: Option<String>,
    pub lineage_parent_id: Option<ArtifactId>,
    pub origin: ArtifactOrigin,
    pub pdf_info: Option<PdfSummary>,
}

/// The closed set of supported transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Encrypt,
    Decrypt,
    Watermark,
    SetPermissions,
    Sanitize,
    Redact,
    Rotate,
    DeletePages,
    ExtractPages,
    Merge,
}

impl OperationKind {
    /// Stable wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Watermark => "watermark",
            Self::SetPermissions => "set_permissions",
            Self::Sanitize => "sanitize",
            Self::Redact => "redact",
            Self::Rotate => "rotate",
            Self::DeletePages => "delete_pages",
            Self::ExtractPages => "extract_pages",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle states of an operation record.
///
/// Transitions are monotonic: `Pending → Processing → {Completed, Failed}`.
/// `Completed` and `Failed` are terminal; nothing revives a terminal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` respects the one-directional state machine.
    pub fn can_transition_to(&self, next: OperationStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Processing | Self::Completed | Self::Failed),
            Self::Processing => matches!(next, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

/// Validated, operation-specific options: one tagged variant per kind.
///
/// The tag doubles as the operation kind on the wire, so a request cannot
/// carry options that disagree with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationOptions {
    Encrypt {
        password: String,
        #[serde(default = "default_true")]
        allow_printing: bool,
        #[serde(default = "default_true")]
        allow_copying: bool,
    },
    Decrypt {
        password: String,
    },
    Watermark {
        text: String,
        opacity: Option<f32>,
        rotation: Option<i32>,
        font_size: Option<u32>,
        color: Option<String>,
    },
    SetPermissions {
        password: String,
        #[serde(default = "default_true")]
        allow_printing: bool,
        #[serde(default = "default_true")]
        allow_copying: bool,
        #[serde(default = "default_false")]
        allow_modifying: bool,
        #[serde(default = "default_true")]
        allow_annotations: bool,
        #[serde(default = "default_true")]
        allow_forms: bool,
    },
    Sanitize {
        #[serde(default = "default_true")]
        remove_metadata: bool,
    },
    Redact {
        text: String,
    },
    Rotate {
        pages: Vec<u32>,
        angle: i32,
    },
    DeletePages {
        pages: Vec<u32>,
    },
    ExtractPages {
        pages: Vec<u32>,
    },
    Merge {
        /// Full ordered source list; the first entry must be the request's
        /// `source_artifact_id`.
        sources: Vec<ArtifactId>,
    },
}

impl OperationOptions {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Encrypt { .. } => OperationKind::Encrypt,
            Self::Decrypt { .. } => OperationKind::Decrypt,
            Self::Watermark { .. } => OperationKind::Watermark,
            Self::SetPermissions { .. } => OperationKind::SetPermissions,
            Self::Sanitize { .. } => OperationKind::Sanitize,
            Self::Redact { .. } => OperationKind::Redact,
            Self::Rotate { .. } => OperationKind::Rotate,
            Self::DeletePages { .. } => OperationKind::DeletePages,
            Self::ExtractPages { .. } => OperationKind::ExtractPages,
            Self::Merge { .. } => OperationKind::Merge,
        }
    }
}

/// An inbound transformation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    pub source_artifact_id: ArtifactId,
    pub options: OperationOptions,
    pub requested_by: Option<String>,
}

impl OperationRequest {
    pub fn new(source_artifact_id: ArtifactId, options: OperationOptions) -> Self {
        Self {
            source_artifact_id,
            options,
            requested_by: None,
        }
    }

    pub fn with_requester(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = Some(requested_by.into());
        self
    }
}

/// The tracked request/result of applying one transformation to one artifact.
///
/// `result_artifact_id` is set if and only if the status is `Completed`;
/// `error` is set if and only if the status is `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_id: OperationId,
    pub source_artifact_id: ArtifactId,
    pub kind: OperationKind,
    pub options: OperationOptions,
    pub status: OperationStatus,
    pub result_artifact_id: Option<ArtifactId>,
    pub error: Option<String>,
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn new(
        source_artifact_id: ArtifactId,
        options: OperationOptions,
        requested_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            operation_id: OperationId::new(),
            source_artifact_id,
            kind: options.kind(),
            options,
            status: OperationStatus::Pending,
            result_artifact_id: None,
            error: None,
            requested_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An artifact-lifecycle notification published to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    FileUploaded {
        artifact_id: ArtifactId,
        mime_type: String,
        original_filename: String,
        owner_id: Option<String>,
    },
    OperationCompleted {
        operation_id: OperationId,
        kind: OperationKind,
        result_artifact_id: ArtifactId,
    },
    OperationFailed {
        operation_id: OperationId,
        kind: OperationKind,
        error: String,
    },
}

impl LifecycleEvent {
    /// Hierarchical routing key used on the durable topic.
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::FileUploaded { .. } => "file.uploaded",
            Self::OperationCompleted { .. } => "file.operation.completed",
            Self::OperationFailed { .. } => "file.operation.failed",
        }
    }
}
