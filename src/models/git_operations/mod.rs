//! Access to the remote git host that stores drafts.
//!
//! Every draft lives on the host as an open pull request, so this trait is the
//! only storage seam the service has. Implementations perform exactly one
//! remote round trip per call (except [`GitHost::delete_draft`], which closes
//! the pull request and then removes its branch) and never retry.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FileRevision, MergeOutcome, PrFile, PullRequest};

pub mod github_operations;

#[cfg(any(test, feature = "test-support"))]
pub mod memory_operations;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("not found on git host: {0}")]
    NotFound(String),
    /// The supplied revision no longer matches the file on the branch.
    #[error("revision conflict: {0}")]
    Conflict(String),
    #[error("merge blocked: {0}")]
    MergeBlocked(String),
    #[error("git host rejected the token: {0}")]
    Authentication(String),
    #[error("git host error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error talking to git host: {0}")]
    Network(String),
    #[error("could not decode git host response: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait GitHost: Send + Sync {
    /// Open pull requests, one page of the configured size.
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, GitError>;

    async fn pull_request_files(&self, pr_number: u64) -> Result<Vec<PrFile>, GitError>;

    async fn get_file(&self, branch: &str, path: &str) -> Result<FileRevision, GitError>;

    async fn get_file_sha(&self, branch: &str, path: &str) -> Result<String, GitError>;

    /// Replaces an existing file. `sha` must be the revision being replaced.
    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        sha: &str,
        message: &str,
    ) -> Result<String, GitError>;

    /// Writes binary content. `existing_sha` must be the current revision
    /// when `path` already exists on the branch, and `None` otherwise.
    async fn create_file(
        &self,
        branch: &str,
        path: &str,
        base64_content: &str,
        existing_sha: Option<&str>,
        message: &str,
    ) -> Result<String, GitError>;

    async fn delete_file(
        &self,
        branch: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), GitError>;

    /// Squash-merges the pull request.
    async fn merge_pull_request(
        &self,
        pr_number: u64,
        commit_title: &str,
    ) -> Result<MergeOutcome, GitError>;

    /// Closes the pull request without merging and deletes its branch.
    async fn delete_draft(&self, pr_number: u64, branch: &str) -> Result<(), GitError>;

    /// Raw-content URL of a file on an unmerged branch. No network access.
    fn raw_file_url(&self, branch: &str, path: &str) -> String;
}
