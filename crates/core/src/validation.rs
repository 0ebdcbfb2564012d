//! Request validation.
//!
//! Raw request fields arrive as optional strings. These functions turn them into the typed
//! requests the service accepts, so nothing below this layer sees an unchecked folder name,
//! file name or payload. Blank strings count as absent.

use crate::report::Section;
use crate::service::{ReportRequest, UploadFile, UploadRequest};
use crate::{FormsError, FormsResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use closeout_types::{NonEmptyText, PathSegment};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Validates the fields of a create-report request.
///
/// `sections` must be present but may be empty.
///
/// # Errors
///
/// Returns `FormsError::InvalidInput` naming the first missing or malformed field.
pub fn validate_report_request(
    folder_name: Option<&str>,
    employee_name: Option<&str>,
    sections: Option<Vec<Section>>,
) -> FormsResult<ReportRequest> {
    let folder = folder_segment(folder_name)?;
    let employee = present(employee_name)
        .and_then(|name| NonEmptyText::new(name).ok())
        .ok_or_else(|| FormsError::InvalidInput("Missing employeeName".into()))?;
    let sections = sections.ok_or_else(|| FormsError::InvalidInput("Missing sections".into()))?;

    Ok(ReportRequest {
        folder,
        employee,
        sections,
    })
}

/// Validates the fields of an upload request.
///
/// With neither `file_name` nor `file_data` the request only allocates the workspace. With
/// both, the payload is decoded here.
///
/// # Errors
///
/// Returns `FormsError::InvalidInput` if the folder name is missing or malformed, exactly
/// one of the file fields is given, the file name is not a single path segment, or the
/// payload is not base64.
pub fn validate_upload_request(
    folder_name: Option<&str>,
    file_name: Option<&str>,
    file_data: Option<&str>,
) -> FormsResult<UploadRequest> {
    let folder = folder_segment(folder_name)?;

    let file = match (present(file_name), present(file_data)) {
        (None, None) => None,
        (Some(name), Some(data)) => {
            let name = PathSegment::new(name)
                .map_err(|e| FormsError::InvalidInput(format!("Invalid fileName: {e}")))?;
            Some(UploadFile {
                name,
                bytes: decode_file_data(data)?,
            })
        }
        _ => {
            return Err(FormsError::InvalidInput(
                "Missing fileName or fileData".into(),
            ))
        }
    };

    Ok(UploadRequest { folder, file })
}

/// Decodes a base64 payload, accepting an optional `data:<type>;base64,` prefix and
/// embedded whitespace.
pub fn decode_file_data(data: &str) -> FormsResult<Vec<u8>> {
    let payload = match data.strip_prefix(DATA_URL_PREFIX) {
        Some(rest) => match rest.split_once(BASE64_MARKER) {
            Some((_, encoded)) => encoded,
            None => {
                return Err(FormsError::InvalidInput(
                    "Invalid fileData: data URL is not base64".into(),
                ))
            }
        },
        None => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    STANDARD
        .decode(compact)
        .map_err(|e| FormsError::InvalidInput(format!("Invalid fileData: {e}")))
}

fn folder_segment(folder_name: Option<&str>) -> FormsResult<PathSegment> {
    let name =
        present(folder_name).ok_or_else(|| FormsError::InvalidInput("Missing folderName".into()))?;
    PathSegment::new(name).map_err(|e| FormsError::InvalidInput(format!("Invalid folderName: {e}")))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(error: FormsError) -> String {
        match error {
            FormsError::InvalidInput(message) => message,
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_report_request_requires_every_field() {
        let err = validate_report_request(None, Some("Dana"), Some(vec![])).unwrap_err();
        assert_eq!(message(err), "Missing folderName");

        let err = validate_report_request(Some("branch12"), Some("  "), Some(vec![])).unwrap_err();
        assert_eq!(message(err), "Missing employeeName");

        let err = validate_report_request(Some("branch12"), Some("Dana"), None).unwrap_err();
        assert_eq!(message(err), "Missing sections");
    }

    #[test]
    fn test_report_request_accepts_empty_sections() {
        let request = validate_report_request(Some("סניף 12"), Some("Dana"), Some(vec![])).unwrap();
        assert_eq!(request.folder.as_str(), "סניף 12");
        assert_eq!(request.employee.as_str(), "Dana");
        assert!(request.sections.is_empty());
    }

    #[test]
    fn test_folder_name_must_be_single_segment() {
        for bad in ["a/b", "..", "a\\b", "tab\there"] {
            let err = validate_upload_request(Some(bad), None, None).unwrap_err();
            assert!(message(err).starts_with("Invalid folderName"), "{bad}");
        }
    }

    #[test]
    fn test_upload_without_file_only_allocates() {
        let request = validate_upload_request(Some("branch12"), None, Some("")).unwrap();
        assert!(request.file.is_none());
    }

    #[test]
    fn test_upload_with_one_file_field_is_rejected() {
        let err = validate_upload_request(Some("branch12"), Some("a.jpg"), None).unwrap_err();
        assert_eq!(message(err), "Missing fileName or fileData");

        let err = validate_upload_request(Some("branch12"), None, Some("AAAA")).unwrap_err();
        assert_eq!(message(err), "Missing fileName or fileData");
    }

    #[test]
    fn test_upload_decodes_payload() {
        let request =
            validate_upload_request(Some("branch12"), Some("a.txt"), Some("aGVsbG8=")).unwrap();
        let file = request.file.unwrap();
        assert_eq!(file.name.as_str(), "a.txt");
        assert_eq!(file.bytes, b"hello");
    }

    #[test]
    fn test_decode_accepts_data_url_and_line_breaks() {
        assert_eq!(
            decode_file_data("data:text/plain;base64,aGVs\nbG8=").unwrap(),
            b"hello"
        );
        assert!(decode_file_data("data:text/plain,hello").is_err());
        assert!(decode_file_data("not base64!").is_err());
    }

    #[test]
    fn test_file_name_must_be_single_segment() {
        let err =
            validate_upload_request(Some("branch12"), Some("../a.jpg"), Some("AAAA")).unwrap_err();
        assert!(message(err).starts_with("Invalid fileName"));
    }
}
