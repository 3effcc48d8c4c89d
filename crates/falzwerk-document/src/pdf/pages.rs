// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-level transforms — rotate, delete, extract, and merge.

use falzwerk_core::error::TransformError;
use lopdf::{Document, Object};
use tracing::{debug, info, instrument};

use super::{clone_page_into, empty_document, load_unencrypted, save};

/// Rotate the listed pages (1-indexed) by `angle` degrees, leaving all other
/// pages untouched.
///
/// The angle must be a multiple of 90; option validation enforces that before
/// a transform ever runs. A listed page outside the document is a typed
/// failure.
#[instrument(skip(bytes), fields(bytes_len = bytes.len(), angle))]
pub fn rotate(bytes: &[u8], pages: &[u32], angle: i32) -> Result<Vec<u8>, TransformError> {
    let mut document = load_unencrypted(bytes)?;
    let page_map = document.get_pages();
    let page_count = page_map.len() as u32;

    let mut targets = Vec::with_capacity(pages.len());
    for &page_number in pages {
        let page_id = *page_map.get(&page_number).ok_or(TransformError::PageOutOfRange {
            page: page_number,
            page_count,
        })?;
        targets.push((page_number, page_id));
    }

    for (page_number, page_id) in targets {
        // Read the existing /Rotate value, default 0.
        let existing = document
            .get_object(page_id)
            .ok()
            .and_then(|obj| match obj {
                Object::Dictionary(dict) => dict
                    .get(b"Rotate")
                    .ok()
                    .and_then(|rotate| rotate.as_i64().ok())
                    .map(|value| value as i32),
                _ => None,
            })
            .unwrap_or(0);

        let new_rotation = (existing + angle).rem_euclid(360);
        if let Ok(Object::Dictionary(dict)) = document.get_object_mut(page_id) {
            dict.set("Rotate", Object::Integer(new_rotation as i64));
        }
        debug!(page_number, existing, new_rotation, "page rotated");
    }

    info!(rotated = pages.len(), "rotation applied");
    save(document)
}

/// Remove the listed pages (1-indexed) from the document.
///
/// Entries outside the document are ignored; removing every remaining page is
/// rejected so the pipeline never persists an empty document.
#[instrument(skip(bytes), fields(bytes_len = bytes.len()))]
pub fn delete(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, TransformError> {
    let mut document = load_unencrypted(bytes)?;
    let page_map = document.get_pages();
    let page_count = page_map.len();

    let mut effective: Vec<u32> = pages
        .iter()
        .copied()
        .filter(|page_number| page_map.contains_key(page_number))
        .collect();
    effective.sort_unstable();
    effective.dedup();

    if effective.len() == page_count {
        return Err(TransformError::EmptyDocument);
    }

    document.delete_pages(&effective);
    info!(
        deleted = effective.len(),
        remaining = page_count - effective.len(),
        "pages deleted"
    );
    save(document)
}

/// Build a new document containing exactly the listed pages (1-indexed), in
/// the order given. The same page may appear more than once.
#[instrument(skip(bytes), fields(bytes_len = bytes.len()))]
pub fn extract(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, TransformError> {
    let document = load_unencrypted(bytes)?;
    let page_map = document.get_pages();
    let page_count = page_map.len() as u32;

    let mut extracted = empty_document();
    for &page_number in pages {
        let page_id = *page_map.get(&page_number).ok_or(TransformError::PageOutOfRange {
            page: page_number,
            page_count,
        })?;
        clone_page_into(&document, &mut extracted, page_id)?;
    }

    info!(extracted = pages.len(), source_pages = page_count, "pages extracted");
    save(extracted)
}

/// Concatenate the supplied documents in order into one document.
///
/// The first buffer is the base; every page of every following buffer is
/// cloned in after it.
#[instrument(skip(sources), fields(source_count = sources.len()))]
pub fn merge(sources: &[Vec<u8>]) -> Result<Vec<u8>, TransformError> {
    let first = sources
        .first()
        .ok_or_else(|| TransformError::Pdf("merge requires at least one source".into()))?;
    let mut merged = load_unencrypted(first)?;

    for (index, other_bytes) in sources.iter().enumerate().skip(1) {
        let other = load_unencrypted(other_bytes).map_err(|err| match err {
            TransformError::Encrypted => TransformError::Encrypted,
            TransformError::Pdf(message) => {
                TransformError::Pdf(format!("failed to load merge source #{}: {message}", index + 1))
            }
            other => other,
        })?;

        let other_pages = other.get_pages();
        let mut page_numbers: Vec<u32> = other_pages.keys().copied().collect();
        page_numbers.sort_unstable();

        for page_number in page_numbers {
            let page_id = other_pages[&page_number];
            clone_page_into(&other, &mut merged, page_id)?;
        }
    }

    let output = save(merged)?;
    debug!(output_bytes = output.len(), "merge complete");
    Ok(output)
}
