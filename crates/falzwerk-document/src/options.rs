// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Option validation — every request is checked once here, at the boundary,
// before any record is created; transforms assume their options are valid.

use falzwerk_core::types::OperationOptions;

use crate::pdf::watermark::parse_hex_color;
use crate::registry::TransformLimits;

/// Validate an option set against the registry's limits.
///
/// Returns a human-readable rejection message, or `Ok(())` when the request
/// may proceed. Page-range checks against the actual document happen inside
/// the transforms, because the page count is only known after parsing.
pub fn validate(options: &OperationOptions, limits: &TransformLimits) -> Result<(), String> {
    match options {
        OperationOptions::Encrypt { password, .. } => require_password(password, "encrypt"),
        OperationOptions::Decrypt { password } => require_password(password, "decrypt"),
        OperationOptions::SetPermissions { password, .. } => {
            require_password(password, "set_permissions")
        }

        OperationOptions::Watermark {
            text,
            opacity,
            font_size,
            color,
            ..
        } => {
            if text.is_empty() {
                return Err("watermark text must not be empty".into());
            }
            let length = text.chars().count();
            if length > limits.max_watermark_text_len {
                return Err(format!(
                    "watermark text length {length} exceeds the maximum of {}",
                    limits.max_watermark_text_len
                ));
            }
            if let Some(opacity) = opacity
                && !(*opacity > 0.0 && *opacity <= 1.0)
            {
                return Err(format!("watermark opacity {opacity} must be in (0, 1]"));
            }
            if let Some(font_size) = font_size
                && *font_size == 0
            {
                return Err("watermark font size must be positive".into());
            }
            if let Some(color) = color
                && parse_hex_color(color).is_none()
            {
                return Err(format!("invalid watermark color {color:?}; expected #rrggbb"));
            }
            Ok(())
        }

        OperationOptions::Sanitize { .. } => Ok(()),

        OperationOptions::Redact { text } => {
            if text.is_empty() {
                return Err("redaction text must not be empty".into());
            }
            Ok(())
        }

        OperationOptions::Rotate { pages, angle } => {
            require_pages(pages, "rotate")?;
            if angle % 90 != 0 {
                return Err(format!("rotation angle {angle} must be a multiple of 90"));
            }
            Ok(())
        }

        OperationOptions::DeletePages { pages } => require_pages(pages, "delete_pages"),
        OperationOptions::ExtractPages { pages } => require_pages(pages, "extract_pages"),

        OperationOptions::Merge { sources } => {
            if sources.len() < 2 {
                return Err(format!(
                    "merge requires at least 2 source artifacts, got {}",
                    sources.len()
                ));
            }
            Ok(())
        }
    }
}

fn require_password(password: &str, kind: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err(format!("{kind} requires a non-empty password"));
    }
    Ok(())
}

fn require_pages(pages: &[u32], kind: &str) -> Result<(), String> {
    if pages.is_empty() {
        return Err(format!("{kind} requires at least one page"));
    }
    if pages.contains(&0) {
        return Err(format!("{kind} page indices are 1-based; 0 is invalid"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use falzwerk_core::types::ArtifactId;

    fn limits() -> TransformLimits {
        TransformLimits {
            max_watermark_text_len: 10,
            ..TransformLimits::default()
        }
    }

    #[test]
    fn empty_password_is_rejected_for_all_password_kinds() {
        for options in [
            OperationOptions::Encrypt {
                password: String::new(),
                allow_printing: true,
                allow_copying: true,
            },
            OperationOptions::Decrypt {
                password: String::new(),
            },
            OperationOptions::SetPermissions {
                password: String::new(),
                allow_printing: true,
                allow_copying: true,
                allow_modifying: false,
                allow_annotations: true,
                allow_forms: true,
            },
        ] {
            assert!(validate(&options, &limits()).is_err());
        }
    }

    #[test]
    fn watermark_text_boundary() {
        let at_limit = OperationOptions::Watermark {
            text: "x".repeat(10),
            opacity: None,
            rotation: None,
            font_size: None,
            color: None,
        };
        assert!(validate(&at_limit, &limits()).is_ok());

        let over_limit = OperationOptions::Watermark {
            text: "x".repeat(11),
            opacity: None,
            rotation: None,
            font_size: None,
            color: None,
        };
        assert!(validate(&over_limit, &limits()).is_err());
    }

    #[test]
    fn watermark_color_and_opacity_checks() {
        let bad_color = OperationOptions::Watermark {
            text: "ok".into(),
            opacity: None,
            rotation: None,
            font_size: None,
            color: Some("red".into()),
        };
        assert!(validate(&bad_color, &limits()).is_err());

        let bad_opacity = OperationOptions::Watermark {
            text: "ok".into(),
            opacity: Some(1.5),
            rotation: None,
            font_size: None,
            color: None,
        };
        assert!(validate(&bad_opacity, &limits()).is_err());

        let good = OperationOptions::Watermark {
            text: "ok".into(),
            opacity: Some(0.5),
            rotation: Some(30),
            font_size: Some(48),
            color: Some("#336699".into()),
        };
        assert!(validate(&good, &limits()).is_ok());
    }

    #[test]
    fn rotate_angle_must_be_right_angled() {
        let skewed = OperationOptions::Rotate {
            pages: vec![1],
            angle: 45,
        };
        assert!(validate(&skewed, &limits()).is_err());

        let negative_quarter = OperationOptions::Rotate {
            pages: vec![1],
            angle: -90,
        };
        assert!(validate(&negative_quarter, &limits()).is_ok());
    }

    #[test]
    fn page_lists_must_be_non_empty_and_one_based() {
        let empty = OperationOptions::ExtractPages { pages: vec![] };
        assert!(validate(&empty, &limits()).is_err());

        let zero_based = OperationOptions::DeletePages { pages: vec![0, 1] };
        assert!(validate(&zero_based, &limits()).is_err());
    }

    #[test]
    fn merge_needs_two_sources() {
        let single = OperationOptions::Merge {
            sources: vec![ArtifactId::new()],
        };
        assert!(validate(&single, &limits()).is_err());

        let pair = OperationOptions::Merge {
            sources: vec![ArtifactId::new(), ArtifactId::new()],
        };
        assert!(validate(&pair, &limits()).is_ok());
    }

    #[test]
    fn empty_redaction_text_is_rejected() {
        let options = OperationOptions::Redact {
            text: String::new(),
        };
        assert!(validate(&options, &limits()).is_err());
    }
}
