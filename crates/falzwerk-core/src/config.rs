// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Persistent pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Container holding uploaded source artifacts.
    pub upload_container: String,
    /// Container holding operation results.
    pub derived_container: String,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
    /// MIME types accepted at ingestion.
    pub allowed_mime_types: Vec<String>,
    /// Maximum watermark text length in characters.
    pub max_watermark_text_len: usize,
    /// Watermark opacity used when the request leaves it unset.
    pub default_watermark_opacity: f32,
    /// Watermark rotation in degrees used when the request leaves it unset.
    pub default_watermark_rotation: i32,
    /// Watermark font size in points used when the request leaves it unset.
    pub default_watermark_font_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_container: "pdf-uploads".into(),
            derived_container: "pdf-processed".into(),
            max_upload_bytes: 16 * 1024 * 1024,
            allowed_mime_types: vec![
                "application/pdf".into(),
                "image/jpeg".into(),
                "image/png".into(),
                "image/tiff".into(),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document".into(),
                "application/msword".into(),
                "application/vnd.openxmlformats-officedocument.presentationml.presentation".into(),
                "application/vnd.ms-powerpoint".into(),
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".into(),
                "application/vnd.ms-excel".into(),
                "text/plain".into(),
                "text/html".into(),
                "text/markdown".into(),
            ],
            max_watermark_text_len: 100,
            default_watermark_opacity: 0.3,
            default_watermark_rotation: 45,
            default_watermark_font_size: 36,
        }
    }
}
