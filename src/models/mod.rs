use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed frontmatter of a draft, keyed by field name.
pub type Frontmatter = Map<String, Value>;

/// An open pull request that carries a draft insight.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DraftPR {
    pub pr_number: u64,
    pub title: String,
    pub slug: String,
    pub branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pr_url: String,
    pub author: String,
}

/// A draft as presented to the editor.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DraftContent {
    pub slug: String,
    pub content: String,
    pub frontmatter: Frontmatter,
    pub file_sha: String,
    pub branch: String,
    pub pr_number: u64,
    pub image_files: Vec<String>,
}

/// Open pull request as reported by the git host, before any draft filtering.
#[derive(Debug, Deserialize, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head: PullRequestHead,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
    #[serde(default)]
    pub user: Option<PullRequestUser>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestHead {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestUser {
    pub login: String,
}

/// One entry of a pull request's changed-file listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PrFile {
    pub filename: String,
    pub sha: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl PrFile {
    pub fn is_removed(&self) -> bool {
        self.status.as_deref() == Some("removed")
    }
}

/// Decoded file content together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRevision {
    pub content: String,
    pub sha: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    pub merged: bool,
    pub live_url: String,
    pub message: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub success: bool,
    pub path: String,
    pub sha: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct DraftImages {
    pub images: Vec<String>,
    pub branch: String,
}

/// Draft content rewritten for display before it is merged.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DraftPreview {
    pub slug: String,
    pub pr_number: u64,
    pub branch: String,
    pub frontmatter: Frontmatter,
    pub hero_image_url: Option<String>,
    pub body: String,
    pub html: String,
    pub reading_time: usize,
}

pub mod git_operations;
