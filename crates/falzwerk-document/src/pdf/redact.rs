// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction transform — remove matching text from page content streams.
//
// Matching byte sequences are deleted from the string operands of the
// text-show operators (Tj, ', ", TJ), so the target text no longer exists in
// the output. Text encoded through hex strings or CID font mappings is not
// matched, and no geometric region clearing takes place.

use falzwerk_core::error::TransformError;
use lopdf::Object;
use lopdf::content::Content;
use tracing::{info, instrument};

use super::{load_unencrypted, pdf_err, save};

/// Remove every occurrence of `target` from the text-show operands of every
/// page.
///
/// Pages without a match are left untouched. Matching zero occurrences is not
/// an error; the result is simply byte-identical content.
#[instrument(skip(bytes, target), fields(bytes_len = bytes.len(), target_len = target.len()))]
pub fn redact(bytes: &[u8], target: &str) -> Result<Vec<u8>, TransformError> {
    let mut document = load_unencrypted(bytes)?;
    let needle = target.as_bytes();

    let page_ids: Vec<lopdf::ObjectId> = document.get_pages().values().copied().collect();
    let mut total_removed = 0usize;

    for page_id in page_ids {
        let mut content: Content = document
            .get_and_decode_page_content(page_id)
            .map_err(pdf_err)?;

        let mut removed_on_page = 0usize;
        for operation in content.operations.iter_mut() {
            match operation.operator.as_str() {
                "Tj" | "'" | "\"" => {
                    for operand in operation.operands.iter_mut() {
                        if let Ok(text) = operand.as_str_mut() {
                            removed_on_page += scrub(text, needle);
                        }
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operation.operands.first_mut() {
                        for item in items.iter_mut() {
                            if let Ok(text) = item.as_str_mut() {
                                removed_on_page += scrub(text, needle);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if removed_on_page > 0 {
            let encoded = content.encode().map_err(pdf_err)?;
            document
                .change_page_content(page_id, encoded)
                .map_err(pdf_err)?;
            total_removed += removed_on_page;
        }
    }

    info!(total_removed, "redaction complete");
    save(document)
}

/// Delete every occurrence of `needle` from `haystack`, returning how many
/// were removed.
fn scrub(haystack: &mut Vec<u8>, needle: &[u8]) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut removed = 0;
    let mut index = 0;
    while index + needle.len() <= haystack.len() {
        if haystack[index..index + needle.len()] == *needle {
            haystack.drain(index..index + needle.len());
            removed += 1;
        } else {
            index += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{page_content_contains, sample_pdf};
    use crate::pdf::page_count;

    #[test]
    fn redact_removes_matching_text() {
        let pdf = sample_pdf(&["Public SecretWord Public", "Nothing here"]);
        let output = redact(&pdf, "SecretWord").expect("redact");

        assert!(!page_content_contains(&output, 1, "SecretWord"));
        assert!(page_content_contains(&output, 1, "Public"));
        assert!(page_content_contains(&output, 2, "Nothing here"));
        assert_eq!(page_count(&output).expect("count"), 2);
    }

    #[test]
    fn redact_without_matches_is_a_no_op_result() {
        let pdf = sample_pdf(&["Plain content"]);
        let output = redact(&pdf, "absent").expect("redact");
        assert!(page_content_contains(&output, 1, "Plain content"));
    }

    #[test]
    fn redact_handles_repeated_occurrences() {
        let pdf = sample_pdf(&["key key key"]);
        let output = redact(&pdf, "key").expect("redact");
        assert!(!page_content_contains(&output, 1, "key"));
    }

    #[test]
    fn scrub_counts_removals() {
        let mut text = b"abcXXdefXXghi".to_vec();
        assert_eq!(scrub(&mut text, b"XX"), 2);
        assert_eq!(text, b"abcdefghi");
    }

    #[test]
    fn scrub_handles_overlapping_candidates() {
        let mut text = b"aaaa".to_vec();
        assert_eq!(scrub(&mut text, b"aa"), 2);
        assert!(text.is_empty());
    }
}
