// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark transform — overlay rotated, semi-transparent text on every page.
//
// The overlay is appended to each page's content stream: the original content
// is wrapped in q/Q so its graphics state cannot leak into the overlay, then
// the watermark text is drawn through an ExtGState carrying the alpha value.

use falzwerk_core::error::TransformError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument};

use super::{load_unencrypted, page_dimensions, pdf_err, save};

/// Resource names under which the overlay registers its graphics state and
/// font on each page.
const GSTATE_NAME: &str = "FwGS";
const FONT_NAME: &str = "FwF";

/// Fully resolved watermark parameters (defaults already applied).
#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    pub text: String,
    pub opacity: f32,
    pub rotation: i32,
    pub font_size: f32,
    pub color: (f32, f32, f32),
}

/// Parse a `#rrggbb` color string into unit-range RGB components.
pub fn parse_hex_color(color: &str) -> Option<(f32, f32, f32)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let component = |range: std::ops::Range<usize>| -> Option<f32> {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|value| value as f32 / 255.0)
    };
    Some((component(0..2)?, component(2..4)?, component(4..6)?))
}

/// Overlay `spec.text` on every page of the document.
#[instrument(skip(bytes, spec), fields(bytes_len = bytes.len(), text_len = spec.text.len()))]
pub fn watermark(bytes: &[u8], spec: &WatermarkSpec) -> Result<Vec<u8>, TransformError> {
    let mut document = load_unencrypted(bytes)?;

    let gstate_id = document.add_object(dictionary! {
        "Type" => "ExtGState",
        "CA" => Object::Real(spec.opacity.into()),
        "ca" => Object::Real(spec.opacity.into()),
    });
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let page_ids: Vec<(u32, ObjectId)> = document
        .get_pages()
        .iter()
        .map(|(number, id)| (*number, *id))
        .collect();

    for (page_number, page_id) in page_ids {
        add_page_resource(&mut document, page_id, b"ExtGState", GSTATE_NAME, gstate_id)?;
        add_page_resource(&mut document, page_id, b"Font", FONT_NAME, font_id)?;

        let overlay = overlay_operations(&document, page_id, spec)?;
        let original = document.get_page_content(page_id).map_err(pdf_err)?;

        let mut combined = Vec::with_capacity(original.len() + overlay.len() + 8);
        combined.extend_from_slice(b"q\n");
        combined.extend_from_slice(&original);
        combined.extend_from_slice(b"\nQ\n");
        combined.extend_from_slice(&overlay);

        document
            .change_page_content(page_id, combined)
            .map_err(pdf_err)?;
        debug!(page_number, "watermark applied");
    }

    info!(opacity = spec.opacity, rotation = spec.rotation, "watermark complete");
    save(document)
}

/// Encode the drawing operations for one page's overlay.
fn overlay_operations(
    document: &Document,
    page_id: ObjectId,
    spec: &WatermarkSpec,
) -> Result<Vec<u8>, TransformError> {
    let (width, height) = page_dimensions(document, page_id);
    let (center_x, center_y) = (width / 2.0, height / 2.0);

    let radians = (spec.rotation as f32).to_radians();
    let (sin, cos) = radians.sin_cos();

    // Helvetica glyphs average roughly half the font size in width; good
    // enough to centre the text on the rotation origin.
    let text_width = spec.text.chars().count() as f32 * 0.5 * spec.font_size;
    let (red, green, blue) = spec.color;

    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(GSTATE_NAME.into())]),
        Operation::new(
            "rg",
            vec![
                Object::Real(red.into()),
                Object::Real(green.into()),
                Object::Real(blue.into()),
            ],
        ),
        // Rotate about the page centre.
        Operation::new(
            "cm",
            vec![
                Object::Real(cos.into()),
                Object::Real(sin.into()),
                Object::Real((-sin).into()),
                Object::Real(cos.into()),
                Object::Real(center_x.into()),
                Object::Real(center_y.into()),
            ],
        ),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_NAME.into()),
                Object::Real(spec.font_size.into()),
            ],
        ),
        Operation::new(
            "Td",
            vec![
                Object::Real((-text_width / 2.0).into()),
                Object::Real(0.0_f32.into()),
            ],
        ),
        Operation::new("Tj", vec![Object::string_literal(spec.text.as_str())]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ];

    Content { operations }.encode().map_err(pdf_err)
}

/// Where a page keeps its /Resources entry.
#[derive(Clone, Copy)]
enum ResourceSlot {
    Inline,
    Referenced(ObjectId),
    Missing,
}

/// Register `value` under `category`/`name` in the page's resources,
/// preserving any existing entries. An indirect category dictionary is
/// dereferenced and written back inline so shared resources are not mutated
/// for unrelated pages.
fn add_page_resource(
    document: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    value: ObjectId,
) -> Result<(), TransformError> {
    let slot = {
        let page = document.get_dictionary(page_id).map_err(pdf_err)?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => ResourceSlot::Referenced(*id),
            Ok(Object::Dictionary(_)) => ResourceSlot::Inline,
            _ => ResourceSlot::Missing,
        }
    };

    // Snapshot the category dictionary (one level of indirection resolved).
    let mut category_dict: Dictionary = {
        let resources: Option<&Dictionary> = match slot {
            ResourceSlot::Referenced(id) => document.get_dictionary(id).ok(),
            ResourceSlot::Inline => document
                .get_dictionary(page_id)
                .ok()
                .and_then(|page| page.get(b"Resources").ok())
                .and_then(|entry| entry.as_dict().ok()),
            ResourceSlot::Missing => None,
        };
        match resources.and_then(|dict| dict.get(category).ok()) {
            Some(Object::Dictionary(existing)) => existing.clone(),
            Some(Object::Reference(id)) => document
                .get_dictionary(*id)
                .cloned()
                .unwrap_or_else(|_| Dictionary::new()),
            _ => Dictionary::new(),
        }
    };
    category_dict.set(name, Object::Reference(value));

    match slot {
        ResourceSlot::Referenced(id) => {
            let resources = document
                .get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_err)?;
            resources.set(category.to_vec(), Object::Dictionary(category_dict));
        }
        ResourceSlot::Inline => {
            let page = document
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_err)?;
            let resources = page
                .get_mut(b"Resources")
                .and_then(Object::as_dict_mut)
                .map_err(pdf_err)?;
            resources.set(category.to_vec(), Object::Dictionary(category_dict));
        }
        ResourceSlot::Missing => {
            let page = document
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_err)?;
            let mut resources = Dictionary::new();
            resources.set(category.to_vec(), Object::Dictionary(category_dict));
            page.set("Resources", Object::Dictionary(resources));
        }
    }

    Ok(())
}
