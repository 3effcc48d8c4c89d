// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Falzwerk.

use thiserror::Error;

use crate::types::{ArtifactId, OperationId, OperationStatus};

/// Typed failure of a single transformation.
///
/// The coordinator branches on these discriminants, never on message text;
/// in particular `WrongPassword` must stay distinguishable from generic
/// processing failure so callers can present an actionable message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("wrong password")]
    WrongPassword,

    #[error("document is not encrypted")]
    NotEncrypted,

    #[error("document is encrypted; decrypt it first")]
    Encrypted,

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("operation would produce an empty document")]
    EmptyDocument,

    #[error("PDF processing failed: {0}")]
    Pdf(String),
}

/// Top-level error type for all Falzwerk operations.
#[derive(Debug, Error)]
pub enum FalzwerkError {
    // -- Request validation --
    #[error("validation failed: {0}")]
    Validation(String),

    // -- Lookups --
    #[error("artifact {0} not found")]
    ArtifactNotFound(ArtifactId),

    #[error("operation {0} not found")]
    OperationNotFound(OperationId),

    #[error("stored object {0} not found")]
    ObjectMissing(String),

    #[error("operation result not ready: status is {0}")]
    NotReady(OperationStatus),

    // -- Transformation --
    #[error(transparent)]
    Transform(#[from] TransformError),

    // -- Dependencies --
    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("artifact store error: {0}")]
    Store(String),

    #[error("event publish failed: {0}")]
    Publish(String),

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FalzwerkError>;
