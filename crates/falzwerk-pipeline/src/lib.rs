// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// falzwerk-pipeline — The orchestration core of Falzwerk.
//
// The coordinator takes one transformation request end-to-end: validate,
// record, load the source artifact, run the transform, persist the result as
// a new immutable artifact, settle the operation record, and announce the
// outcome. The intake does the same dance for uploads. Neither ever mutates
// an existing artifact; every result is a new blob with a lineage pointer
// back to its source.

pub mod coordinator;
pub mod ingest;

pub use coordinator::{DownloadPayload, OperationCoordinator};
pub use ingest::UploadIntake;
