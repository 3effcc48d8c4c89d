// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The transformation registry — validation and dispatch for the closed set of
// supported operations.

use falzwerk_core::PipelineConfig;
use falzwerk_core::error::{FalzwerkError, TransformError};
use falzwerk_core::types::{OperationKind, OperationOptions};

use crate::options;
use crate::pdf;
use crate::pdf::watermark::{WatermarkSpec, parse_hex_color};

/// Limits and defaults the registry applies when validating and resolving
/// options.
#[derive(Debug, Clone)]
pub struct TransformLimits {
    pub max_watermark_text_len: usize,
    pub default_watermark_opacity: f32,
    pub default_watermark_rotation: i32,
    pub default_watermark_font_size: u32,
}

impl Default for TransformLimits {
    fn default() -> Self {
        Self {
            max_watermark_text_len: 100,
            default_watermark_opacity: 0.3,
            default_watermark_rotation: 45,
            default_watermark_font_size: 36,
        }
    }
}

impl From<&PipelineConfig> for TransformLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_watermark_text_len: config.max_watermark_text_len,
            default_watermark_opacity: config.default_watermark_opacity,
            default_watermark_rotation: config.default_watermark_rotation,
            default_watermark_font_size: config.default_watermark_font_size,
        }
    }
}

/// Holds the closed set of supported operations and validates/executes them.
///
/// Every transform is a deterministic pure function of the supplied byte
/// buffers and options; the registry performs no I/O, which is what makes the
/// operations independently testable.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    limits: TransformLimits,
}

impl TransformRegistry {
    pub fn new(limits: TransformLimits) -> Self {
        Self { limits }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(TransformLimits::from(config))
    }

    /// Every operation kind this registry can execute.
    pub fn kinds() -> &'static [OperationKind] {
        &[
            OperationKind::Encrypt,
            OperationKind::Decrypt,
            OperationKind::Watermark,
            OperationKind::SetPermissions,
            OperationKind::Sanitize,
            OperationKind::Redact,
            OperationKind::Rotate,
            OperationKind::DeletePages,
            OperationKind::ExtractPages,
            OperationKind::Merge,
        ]
    }

    /// Boundary validation; rejected requests never create a record.
    pub fn validate(&self, options: &OperationOptions) -> Result<(), FalzwerkError> {
        options::validate(options, &self.limits).map_err(FalzwerkError::Validation)
    }

    /// Execute the transform for `options` against `sources` — the ordered
    /// input buffers: exactly one for every kind except merge, which receives
    /// one buffer per listed source artifact.
    pub fn apply(
        &self,
        sources: &[Vec<u8>],
        options: &OperationOptions,
    ) -> Result<Vec<u8>, TransformError> {
        let primary = sources
            .first()
            .ok_or_else(|| TransformError::Pdf("no source bytes supplied".into()))?;

        match options {
            OperationOptions::Encrypt {
                password,
                allow_printing,
                allow_copying,
            } => pdf::security::encrypt(primary, password, *allow_printing, *allow_copying),

            OperationOptions::Decrypt { password } => pdf::security::decrypt(primary, password),

            OperationOptions::Watermark {
                text,
                opacity,
                rotation,
                font_size,
                color,
            } => {
                let spec = WatermarkSpec {
                    text: text.clone(),
                    opacity: opacity.unwrap_or(self.limits.default_watermark_opacity),
                    rotation: rotation.unwrap_or(self.limits.default_watermark_rotation),
                    font_size: font_size.unwrap_or(self.limits.default_watermark_font_size) as f32,
                    // Validation guarantees the color parses; black otherwise.
                    color: color
                        .as_deref()
                        .and_then(parse_hex_color)
                        .unwrap_or((0.0, 0.0, 0.0)),
                };
                pdf::watermark::watermark(primary, &spec)
            }

            OperationOptions::SetPermissions {
                password,
                allow_printing,
                allow_copying,
                allow_modifying,
                allow_annotations,
                allow_forms,
            } => pdf::security::set_permissions(
                primary,
                password,
                *allow_printing,
                *allow_copying,
                *allow_modifying,
                *allow_annotations,
                *allow_forms,
            ),

            OperationOptions::Sanitize { remove_metadata } => {
                pdf::security::sanitize(primary, *remove_metadata)
            }

            OperationOptions::Redact { text } => pdf::redact::redact(primary, text),

            OperationOptions::Rotate { pages, angle } => pdf::pages::rotate(primary, pages, *angle),

            OperationOptions::DeletePages { pages } => pdf::pages::delete(primary, pages),

            OperationOptions::ExtractPages { pages } => pdf::pages::extract(primary, pages),

            OperationOptions::Merge { .. } => pdf::pages::merge(sources),
        }
    }
}
