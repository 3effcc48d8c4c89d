// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security transforms — password protection, permission bits, and active
// content stripping, all through lopdf's encryption support.

use falzwerk_core::error::TransformError;
use lopdf::encryption::{DecryptionError, EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info, instrument};

use super::{load, load_unencrypted, pdf_err, save};

/// Assemble the PDF permission bitset.
///
/// Accessibility extraction is always granted regardless of the caller's
/// choices.
fn permission_bits(
    allow_printing: bool,
    allow_copying: bool,
    allow_modifying: bool,
    allow_annotations: bool,
    allow_forms: bool,
) -> Permissions {
    let mut permissions = Permissions::COPYABLE_FOR_ACCESSIBILITY;
    if allow_printing {
        permissions |= Permissions::PRINTABLE | Permissions::PRINTABLE_IN_HIGH_QUALITY;
    }
    if allow_copying {
        permissions |= Permissions::COPYABLE;
    }
    if allow_modifying {
        permissions |= Permissions::MODIFIABLE | Permissions::ASSEMBLABLE;
    }
    if allow_annotations {
        permissions |= Permissions::ANNOTABLE;
    }
    if allow_forms {
        permissions |= Permissions::FILLABLE;
    }
    permissions
}

/// Encrypt the document with both user and owner password set to `password`.
#[instrument(skip(bytes, password), fields(bytes_len = bytes.len()))]
pub fn encrypt(
    bytes: &[u8],
    password: &str,
    allow_printing: bool,
    allow_copying: bool,
) -> Result<Vec<u8>, TransformError> {
    let permissions = permission_bits(allow_printing, allow_copying, false, false, false);
    let output = apply_encryption(load_unencrypted(bytes)?, password, permissions)?;
    info!(allow_printing, allow_copying, "document encrypted");
    Ok(output)
}

/// Re-encrypt the document with an explicit permission bitset.
#[instrument(skip(bytes, password), fields(bytes_len = bytes.len()))]
pub fn set_permissions(
    bytes: &[u8],
    password: &str,
    allow_printing: bool,
    allow_copying: bool,
    allow_modifying: bool,
    allow_annotations: bool,
    allow_forms: bool,
) -> Result<Vec<u8>, TransformError> {
    let permissions = permission_bits(
        allow_printing,
        allow_copying,
        allow_modifying,
        allow_annotations,
        allow_forms,
    );
    let output = apply_encryption(load_unencrypted(bytes)?, password, permissions)?;
    info!(
        allow_printing,
        allow_copying,
        allow_modifying,
        allow_annotations,
        allow_forms,
        "permissions applied"
    );
    Ok(output)
}

fn apply_encryption(
    mut document: Document,
    password: &str,
    permissions: Permissions,
) -> Result<Vec<u8>, TransformError> {
    let state = {
        let version = EncryptionVersion::V2 {
            document: &document,
            owner_password: password,
            user_password: password,
            key_length: 128,
            permissions,
        };
        EncryptionState::try_from(version)
            .map_err(|err| TransformError::Pdf(format!("building encryption state: {err}")))?
    };

    document
        .encrypt(&state)
        .map_err(|err| TransformError::Pdf(format!("encrypting document: {err}")))?;

    save(document)
}

/// Remove encryption, producing a plaintext document.
///
/// A wrong password is a distinct, typed failure so callers can tell it apart
/// from generic processing errors; decrypting an unencrypted document is
/// refused rather than silently passed through.
#[instrument(skip(bytes, password), fields(bytes_len = bytes.len()))]
pub fn decrypt(bytes: &[u8], password: &str) -> Result<Vec<u8>, TransformError> {
    let mut document = load(bytes)?;
    if !document.is_encrypted() {
        return Err(TransformError::NotEncrypted);
    }

    match document.decrypt(password) {
        Ok(()) => {}
        Err(lopdf::Error::Decryption(DecryptionError::IncorrectPassword)) => {
            return Err(TransformError::WrongPassword);
        }
        Err(err) => return Err(pdf_err(err)),
    }

    // The Encrypt dictionary must not survive into the plaintext output.
    document.trailer.remove(b"Encrypt");

    info!("document decrypted");
    save(document)
}

/// Strip active content: open actions, additional actions, JavaScript,
/// embedded files, and form actions. With `remove_metadata` the document
/// information dictionary and XMP metadata stream go too.
#[instrument(skip(bytes), fields(bytes_len = bytes.len(), remove_metadata))]
pub fn sanitize(bytes: &[u8], remove_metadata: bool) -> Result<Vec<u8>, TransformError> {
    let mut document = load_unencrypted(bytes)?;

    let root_id = document
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(pdf_err)?;

    // Resolve indirect /Names and /AcroForm dictionaries before mutating.
    let names_id = dict_entry_reference(&document, root_id, b"Names");
    let acroform_id = dict_entry_reference(&document, root_id, b"AcroForm");

    if let Ok(catalog) = document.get_object_mut(root_id).and_then(Object::as_dict_mut) {
        for key in [b"OpenAction".as_slice(), b"AA", b"JavaScript", b"JS"] {
            catalog.remove(key);
        }
        if remove_metadata {
            catalog.remove(b"Metadata");
        }
        // An inline /Names or /AcroForm is scrubbed in place.
        if names_id.is_none()
            && let Ok(Object::Dictionary(names)) = catalog.get_mut(b"Names")
        {
            names.remove(b"JavaScript");
            names.remove(b"EmbeddedFiles");
        }
        if acroform_id.is_none()
            && let Ok(Object::Dictionary(acroform)) = catalog.get_mut(b"AcroForm")
        {
            acroform.remove(b"AA");
            acroform.remove(b"A");
            acroform.remove(b"XFA");
        }
    }

    if let Some(names_id) = names_id
        && let Ok(names) = document.get_object_mut(names_id).and_then(Object::as_dict_mut)
    {
        names.remove(b"JavaScript");
        names.remove(b"EmbeddedFiles");
    }

    if let Some(acroform_id) = acroform_id
        && let Ok(acroform) = document
            .get_object_mut(acroform_id)
            .and_then(Object::as_dict_mut)
    {
        acroform.remove(b"AA");
        acroform.remove(b"A");
        acroform.remove(b"XFA");
    }

    // Page-level additional actions.
    let page_ids: Vec<ObjectId> = document.get_pages().values().copied().collect();
    for page_id in page_ids {
        if let Ok(page) = document.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            page.remove(b"AA");
        }
    }

    if remove_metadata {
        document.trailer.remove(b"Info");
    }

    debug!("active content stripped");
    save(document)
}

/// If `key` in the dictionary behind `owner_id` is an indirect reference,
/// return the referenced object id.
fn dict_entry_reference(document: &Document, owner_id: ObjectId, key: &[u8]) -> Option<ObjectId> {
    document
        .get_dictionary(owner_id)
        .ok()
        .and_then(|dict| dict.get(key).ok())
        .and_then(|entry| entry.as_reference().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{n_page_pdf, page_content_contains};
    use crate::pdf::page_count;
    use lopdf::dictionary;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let pdf = n_page_pdf(2);
        let encrypted = encrypt(&pdf, "hunter2", true, true).expect("encrypt");

        let loaded = Document::load_mem(&encrypted).expect("load encrypted");
        assert!(loaded.is_encrypted());

        let decrypted = decrypt(&encrypted, "hunter2").expect("decrypt");
        let loaded = Document::load_mem(&decrypted).expect("load decrypted");
        assert!(!loaded.is_encrypted());
        assert_eq!(page_count(&decrypted).expect("count"), 2);
    }

    #[test]
    fn wrong_password_is_distinct_failure() {
        let pdf = n_page_pdf(1);
        let encrypted = encrypt(&pdf, "correct", true, true).expect("encrypt");

        let result = decrypt(&encrypted, "incorrect");
        assert_eq!(result.unwrap_err(), TransformError::WrongPassword);
    }

    #[test]
    fn decrypt_of_plaintext_document_is_refused() {
        let pdf = n_page_pdf(1);
        let result = decrypt(&pdf, "whatever");
        assert_eq!(result.unwrap_err(), TransformError::NotEncrypted);
    }

    #[test]
    fn encrypt_of_encrypted_document_is_refused() {
        let pdf = n_page_pdf(1);
        let encrypted = encrypt(&pdf, "first", true, true).expect("encrypt");
        let result = encrypt(&encrypted, "second", true, true);
        assert_eq!(result.unwrap_err(), TransformError::Encrypted);
    }

    #[test]
    fn set_permissions_produces_encrypted_output() {
        let pdf = n_page_pdf(1);
        let restricted =
            set_permissions(&pdf, "owner-pw", false, false, false, false, false).expect("apply");

        let loaded = Document::load_mem(&restricted).expect("load");
        assert!(loaded.is_encrypted());

        // The password still opens the document.
        let reopened = decrypt(&restricted, "owner-pw").expect("decrypt");
        assert_eq!(page_count(&reopened).expect("count"), 1);
    }

    /// Build a fixture carrying an open action, document JavaScript, and an
    /// information dictionary.
    fn active_content_pdf() -> Vec<u8> {
        let pdf = n_page_pdf(1);
        let mut doc = Document::load_mem(&pdf).expect("load fixture");

        let root_id = doc
            .trailer
            .get(b"Root")
            .and_then(|root| root.as_reference())
            .expect("catalog reference");

        let js_names = doc.add_object(dictionary! {
            "JavaScript" => dictionary! {},
        });

        if let Ok(catalog) = doc.get_object_mut(root_id).and_then(Object::as_dict_mut) {
            catalog.set("OpenAction", Object::string_literal("app.alert('hi')"));
            catalog.set("Names", Object::Reference(js_names));
        }

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Fixture"),
            "Producer" => Object::string_literal("falzwerk tests"),
        });
        doc.trailer.set("Info", Object::Reference(info_id));

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("serialise fixture");
        buf
    }

    #[test]
    fn sanitize_strips_open_action_and_names() {
        let pdf = active_content_pdf();
        let cleaned = sanitize(&pdf, true).expect("sanitize");

        let doc = Document::load_mem(&cleaned).expect("load cleaned");
        let catalog = doc.catalog().expect("catalog");
        assert!(catalog.get(b"OpenAction").is_err());
        assert!(doc.trailer.get(b"Info").is_err());

        // The document is still a usable single-pager.
        assert!(page_content_contains(&cleaned, 1, "Page 1"));
    }

    #[test]
    fn sanitize_can_keep_metadata() {
        let pdf = active_content_pdf();
        let cleaned = sanitize(&pdf, false).expect("sanitize");

        let doc = Document::load_mem(&cleaned).expect("load cleaned");
        assert!(doc.catalog().expect("catalog").get(b"OpenAction").is_err());
        assert!(doc.trailer.get(b"Info").is_ok());
    }
}
