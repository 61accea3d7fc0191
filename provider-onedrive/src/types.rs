//! Microsoft Graph drive item types

use serde::Deserialize;

/// Graph `driveItem` (only the selected fields)
#[derive(Debug, Clone, Deserialize)]
pub struct DriveItem {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

/// A page of `children`
#[derive(Debug, Deserialize)]
pub struct ChildrenResponse {
    #[serde(default)]
    pub value: Vec<DriveItem>,

    /// Absolute URL of the next page
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// Graph error envelope: `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorBody {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,
}
