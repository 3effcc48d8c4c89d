// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// falzwerk-store — The consumed interfaces of the pipeline and their local
// implementations: blob storage for artifact bytes, the SQLite metadata
// catalog for file/operation records, and the durable lifecycle-event
// journal.

pub mod artifact;
pub mod catalog;
pub mod events;

pub use artifact::{ArtifactStore, FsArtifactStore, hash_bytes};
pub use catalog::{MetadataCatalog, OperationUpdate, SqliteCatalog};
pub use events::{EVENT_TOPIC, EventPublisher, JournalPublisher, StoredEvent};
