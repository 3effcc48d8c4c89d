// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — shared lopdf helpers plus the individual transform families.

pub mod inspect;
pub mod pages;
pub mod redact;
pub mod security;
pub mod watermark;

use falzwerk_core::error::TransformError;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

/// Convert a `lopdf::Error` into a generic processing failure.
pub(crate) fn pdf_err(err: lopdf::Error) -> TransformError {
    TransformError::Pdf(err.to_string())
}

/// Parse a document from raw bytes.
pub(crate) fn load(bytes: &[u8]) -> Result<Document, TransformError> {
    Document::load_mem(bytes).map_err(|err| TransformError::Pdf(format!("failed to load PDF: {err}")))
}

/// Parse a document and refuse encrypted input.
///
/// Every transform except decryption requires plaintext objects; rewriting an
/// encrypted document in place would corrupt it.
pub(crate) fn load_unencrypted(bytes: &[u8]) -> Result<Document, TransformError> {
    let document = load(bytes)?;
    if document.is_encrypted() {
        return Err(TransformError::Encrypted);
    }
    Ok(document)
}

/// Serialise a document back to bytes.
pub(crate) fn save(mut document: Document) -> Result<Vec<u8>, TransformError> {
    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|err| TransformError::Pdf(format!("failed to serialise PDF: {err}")))?;
    Ok(output)
}

/// Number of pages in a serialised document.
pub fn page_count(bytes: &[u8]) -> Result<u32, TransformError> {
    Ok(load(bytes)?.get_pages().len() as u32)
}

/// Create an empty document containing just a page tree and catalog, ready
/// for pages to be cloned in.
pub(crate) fn empty_document() -> Document {
    let mut document = Document::with_version("1.5");
    let pages_id = document.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Object::Array(Vec::new()),
        "Count" => Object::Integer(0),
    });
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    document.trailer.set("Root", Object::Reference(catalog_id));
    document
}

/// Clone a single page object (and its referenced resources) from `source`
/// into `target`, appending it as the last page.
///
/// Stream data, fonts, and images referenced by the page dictionary are copied
/// as new objects in the target document.
pub(crate) fn clone_page_into(
    source: &Document,
    target: &mut Document,
    page_id: ObjectId,
) -> Result<(), TransformError> {
    let page_object = source.get_object(page_id).map_err(|err| {
        TransformError::Pdf(format!("cannot read page object {page_id:?}: {err}"))
    })?;

    let cloned = deep_clone_object(source, target, page_object)?;
    let cloned_id = target.add_object(cloned);

    // Locate the target's /Pages node through its catalog.
    let pages_id = target
        .catalog()
        .map_err(|err| TransformError::Pdf(format!("no catalog: {err}")))
        .and_then(|catalog| {
            catalog
                .get(b"Pages")
                .map_err(|err| TransformError::Pdf(format!("no /Pages: {err}")))
                .and_then(|pages_ref| match pages_ref {
                    Object::Reference(id) => Ok(*id),
                    _ => Err(TransformError::Pdf("/Pages is not a reference".into())),
                })
        })?;

    // Append the page reference to /Kids and bump /Count.
    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(count_obj) = pages_dict.get_mut(b"Count")
            && let Object::Integer(count) = count_obj
        {
            *count += 1;
        }
    }

    // Point the cloned page back at the target's page tree.
    if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
        page_dict.set("Parent", Object::Reference(pages_id));
    }

    Ok(())
}

/// Deep-clone a single lopdf object, recursively resolving references (except
/// /Parent, which the caller patches to avoid circular cloning).
fn deep_clone_object(
    source: &Document,
    target: &mut Document,
    object: &Object,
) -> Result<Object, TransformError> {
    match object {
        Object::Dictionary(dict) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = deep_clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(arr) => {
            let mut new_arr = Vec::with_capacity(arr.len());
            for item in arr {
                new_arr.push(deep_clone_object(source, target, item)?);
            }
            Ok(Object::Array(new_arr))
        }
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = deep_clone_object(source, target, referenced)?;
                let new_id = target.add_object(cloned);
                Ok(Object::Reference(new_id))
            }
            Err(err) => {
                tracing::warn!(?ref_id, %err, "cannot resolve reference, using Null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = deep_clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Stream(lopdf::Stream::new(
                new_dict,
                stream.content.clone(),
            )))
        }
        other => Ok(other.clone()),
    }
}

/// Page dimensions in points, following the /Parent chain for an inherited
/// /MediaBox. Falls back to US Letter when no box is declared.
pub(crate) fn page_dimensions(document: &Document, page_id: ObjectId) -> (f32, f32) {
    let mut current = page_id;
    for _ in 0..32 {
        let Ok(dict) = document.get_dictionary(current) else {
            break;
        };
        if let Ok(Object::Array(media_box)) = dict.get(b"MediaBox")
            && media_box.len() == 4
        {
            let coords: Vec<f32> = media_box.iter().filter_map(object_to_f32).collect();
            if coords.len() == 4 {
                return ((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs());
            }
        }
        match dict.get(b"Parent").and_then(|parent| parent.as_reference()) {
            Ok(parent_id) => current = parent_id,
            Err(_) => break,
        }
    }
    (612.0, 792.0)
}

/// Numeric coercion for dictionary values that may be Integer or Real.
pub(crate) fn object_to_f32(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------
