// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document inspection — page count, information dictionary, page geometry.

use falzwerk_core::error::TransformError;
use falzwerk_core::types::PdfSummary;
use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{load, object_to_f32, page_dimensions};

/// Geometry of a single page, 1-indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    pub rotation: i32,
}

/// Summarise a PDF: page count plus the document information dictionary.
///
/// Works on encrypted documents too — the page tree and (usually) the info
/// dictionary remain readable without the password.
#[instrument(skip(bytes), fields(bytes_len = bytes.len()))]
pub fn inspect(bytes: &[u8]) -> Result<PdfSummary, TransformError> {
    let document = load(bytes)?;
    let page_count = document.get_pages().len() as u32;

    let info = info_dictionary(&document);
    let field = |key: &[u8]| -> Option<String> {
        info.as_ref()
            .and_then(|dict| dict.get(key).ok())
            .and_then(|value| value.as_str().ok())
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
    };

    let summary = PdfSummary {
        page_count,
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        keywords: field(b"Keywords"),
        creator: field(b"Creator"),
        producer: field(b"Producer"),
    };
    debug!(page_count, "document inspected");
    Ok(summary)
}

/// Per-page width/height (points) and rotation for the whole document.
#[instrument(skip(bytes), fields(bytes_len = bytes.len()))]
pub fn page_geometry(bytes: &[u8]) -> Result<Vec<PageGeometry>, TransformError> {
    let document = load(bytes)?;
    let pages = document.get_pages();

    let mut geometry = Vec::with_capacity(pages.len());
    for (page_number, page_id) in pages {
        let (width, height) = page_dimensions(&document, page_id);
        let rotation = document
            .get_dictionary(page_id)
            .ok()
            .and_then(|dict| dict.get(b"Rotate").ok())
            .and_then(object_to_f32)
            .map(|value| value as i32)
            .unwrap_or(0);
        geometry.push(PageGeometry {
            page_number,
            width,
            height,
            rotation,
        });
    }
    Ok(geometry)
}

/// Resolve the trailer's /Info entry, whether inline or indirect.
fn info_dictionary(document: &Document) -> Option<Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => document.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}
