//! Dropbox API v2 request and response types

use serde::{Deserialize, Serialize};

/// `files/list_folder` arguments
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    pub path: &'a str,
    pub recursive: bool,
    pub limit: u32,
}

/// `files/list_folder/continue` arguments
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// Listing entry. Only files matter for duplicate detection.
#[derive(Debug, Deserialize)]
pub struct Metadata {
    #[serde(rename = ".tag")]
    pub tag: String,
    pub name: String,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.tag == "file"
    }
}

#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    #[serde(default)]
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// `Dropbox-API-Arg` payload for `files/upload`
#[derive(Debug, Serialize)]
pub struct CommitInfo<'a> {
    pub path: &'a str,
    pub mode: &'static str,
    pub autorename: bool,
    pub mute: bool,
}

/// `files/upload` result (only the fields we read)
#[derive(Debug, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
}

/// Error envelope. `error_summary` is a `/`-joined tag path such as
/// `path/not_found/..`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error_summary: String,
}

impl ApiErrorResponse {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.error_summary
            .split('/')
            .any(|segment| segment.trim_end_matches('.') == tag)
    }
}
