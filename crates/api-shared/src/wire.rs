//! Request and response bodies.
//!
//! Request fields are optional at this layer so that a missing field is reported with the
//! same message as a blank one, by the core validators, instead of as a deserialisation
//! failure.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// One checklist item of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SectionReq {
    pub text: String,
    pub done: bool,
    /// Image file names inside the workspace
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportReq {
    #[schema(example = "branch12")]
    pub folder_name: Option<String>,
    #[schema(example = "Dana")]
    pub employee_name: Option<String>,
    pub sections: Option<Vec<SectionReq>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateReportRes {
    /// Public link that renders the report in a browser
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadReq {
    #[schema(example = "branch12")]
    pub folder_name: Option<String>,
    pub file_name: Option<String>,
    /// Base64 file content, optionally as a `data:` URL
    pub file_data: Option<String>,
}

/// Either `folderPath` (allocation) or `message` (file upload) is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadRes {
    pub fn allocated(folder_path: impl Into<String>) -> Self {
        Self {
            folder_path: Some(folder_path.into()),
            message: None,
        }
    }

    pub fn uploaded() -> Self {
        Self {
            folder_path: None,
            message: Some("File uploaded".into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    /// Processing stage that failed: allocate, upload, compose, publish or share
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_report_req_is_camel_case() {
        let req: CreateReportReq = serde_json::from_value(json!({
            "folderName": "branch12",
            "employeeName": "Dana",
            "sections": [{ "text": "Door locked", "done": true }]
        }))
        .unwrap();

        assert_eq!(req.folder_name.as_deref(), Some("branch12"));
        let sections = req.sections.unwrap();
        assert!(sections[0].images.is_empty());
    }

    #[test]
    fn test_missing_fields_deserialise_as_none() {
        let req: UploadReq = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req, UploadReq::default());
    }

    #[test]
    fn test_upload_res_shapes() {
        assert_eq!(
            serde_json::to_value(UploadRes::allocated("/forms/branch12")).unwrap(),
            json!({ "folderPath": "/forms/branch12" })
        );
        assert_eq!(
            serde_json::to_value(UploadRes::uploaded()).unwrap(),
            json!({ "message": "File uploaded" })
        );
    }

    #[test]
    fn test_error_res_omits_missing_stage() {
        let res = ErrorRes {
            error: "Missing folderName".into(),
            stage: None,
        };
        assert_eq!(
            serde_json::to_value(res).unwrap(),
            json!({ "error": "Missing folderName" })
        );
    }
}
