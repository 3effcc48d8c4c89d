// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// falzwerk-document — The transformation registry for the Falzwerk pipeline.
//
// Holds the closed set of PDF transformations (page edits, security
// transforms, watermarking, redaction), validates their option sets at the
// boundary, and exposes document inspection for ingestion. Every transform is
// a deterministic pure function of (source bytes, options): no I/O, no side
// effects.

pub mod options;
pub mod pdf;
pub mod registry;

// Re-export the primary entry points so callers can use
// `falzwerk_document::TransformRegistry` etc.
pub use pdf::inspect::{PageGeometry, inspect, page_geometry};
pub use registry::{TransformLimits, TransformRegistry};
