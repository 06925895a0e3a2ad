//! Draft mutation operations.
//!
//! Every operation takes the already-verified [`AdminSession`] of the caller
//! and the git host explicitly; nothing here reads request state. A draft is
//! resolved by slug on every call, so once it is merged or discarded all
//! operations on it report not-found.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::config::Config;
use crate::helper::frontmatter_helpers::{mark_published, parse_frontmatter};
use crate::helper::preview_helpers;
use crate::helper::resolution_helpers::{self, content_path, image_path, image_prefix};
use crate::helper::sanitization_helpers::{self, ImageRejection};
use crate::helper::session_helpers::AdminSession;
use crate::models::git_operations::{GitError, GitHost};
use crate::models::{DraftContent, DraftImages, DraftPR, DraftPreview, PublishOutcome, StoredImage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    MergeBlocked(String),
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },
    #[error("{0}")]
    Configuration(String),
}

impl From<GitError> for DraftError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotFound(m) => DraftError::NotFound(m),
            GitError::Conflict(_) => DraftError::Conflict(
                "The draft was changed since it was loaded. Reload it and try again.".to_string(),
            ),
            GitError::MergeBlocked(m) => DraftError::MergeBlocked(m),
            GitError::Configuration(m) => DraftError::Configuration(m),
            GitError::Api { status, message } => DraftError::Upstream { status: Some(status), message },
            other => DraftError::Upstream { status: None, message: other.to_string() },
        }
    }
}

impl From<ImageRejection> for DraftError {
    fn from(err: ImageRejection) -> Self {
        DraftError::InvalidInput(err.to_string())
    }
}

fn not_found(slug: &str) -> DraftError {
    DraftError::NotFound(format!("Draft '{}' not found", slug))
}

/// Logs a host failure against the slug it happened on and converts it.
fn upstream<'a>(slug: &'a str, action: &'static str) -> impl FnOnce(GitError) -> DraftError + 'a {
    move |err| {
        match &err {
            GitError::NotFound(_) | GitError::Conflict(_) => {
                log::warn!("{} failed for draft '{}': {}", action, slug, err)
            }
            _ => log::error!("{} failed for draft '{}': {}", action, slug, err),
        }
        DraftError::from(err)
    }
}

pub async fn list_drafts(host: &dyn GitHost, session: &AdminSession) -> Result<Vec<DraftPR>, DraftError> {
    log::debug!("Listing drafts for {}", session.username);
    resolution_helpers::list_draft_prs(host).await.map_err(|err| {
        log::error!("Listing drafts failed: {}", err);
        DraftError::from(err)
    })
}

/// Resolves `slug` to its open draft or fails with not-found.
pub async fn resolve_draft(host: &dyn GitHost, slug: &str) -> Result<DraftPR, DraftError> {
    resolution_helpers::find_pr_by_slug(host, slug)
        .await
        .map_err(upstream(slug, "Resolving"))?
        .ok_or_else(|| not_found(slug))
}

pub async fn fetch_draft(host: &dyn GitHost, _session: &AdminSession, slug: &str) -> Result<DraftContent, DraftError> {
    let draft = resolve_draft(host, slug).await?;

    let file = host
        .get_file(&draft.branch, &content_path(slug))
        .await
        .map_err(upstream(slug, "Fetching content"))?;
    let files = host
        .pull_request_files(draft.pr_number)
        .await
        .map_err(upstream(slug, "Listing files"))?;

    let prefix = image_prefix(slug);
    let image_files = files
        .into_iter()
        .filter(|f| f.filename.starts_with(&prefix))
        .map(|f| f.filename)
        .collect();

    Ok(DraftContent {
        slug: slug.to_string(),
        frontmatter: parse_frontmatter(&file.content),
        content: file.content,
        file_sha: file.sha,
        branch: draft.branch,
        pr_number: draft.pr_number,
        image_files,
    })
}

/// Writes new content over the revision `sha`. Returns the new revision.
pub async fn save_draft(
    host: &dyn GitHost,
    session: &AdminSession,
    slug: &str,
    content: Option<&str>,
    sha: Option<&str>,
) -> Result<String, DraftError> {
    let (content, sha) = match (content, sha) {
        (Some(content), Some(sha)) if !content.is_empty() && !sha.is_empty() => (content, sha),
        _ => return Err(DraftError::InvalidInput("Content and sha are required".to_string())),
    };

    let draft = resolve_draft(host, slug).await?;
    let new_sha = host
        .update_file(&draft.branch, &content_path(slug), content, sha, &format!("Update draft: {}", slug))
        .await
        .map_err(upstream(slug, "Saving"))?;

    log::info!("{} saved draft '{}' (PR #{})", session.username, slug, draft.pr_number);
    Ok(new_sha)
}

pub async fn list_images(host: &dyn GitHost, _session: &AdminSession, slug: &str) -> Result<DraftImages, DraftError> {
    let draft = resolve_draft(host, slug).await?;
    let files = host
        .pull_request_files(draft.pr_number)
        .await
        .map_err(upstream(slug, "Listing images"))?;

    let prefix = image_prefix(slug);
    let images = files
        .into_iter()
        .filter(|f| f.filename.starts_with(&prefix) && !f.is_removed())
        .map(|f| f.filename)
        .collect();

    Ok(DraftImages { images, branch: draft.branch })
}

/// Stores an image under the draft's image directory.
///
/// Name, extension, encoding and size are all checked before the host is
/// contacted. An existing file of the same sanitized name is overwritten.
pub async fn upload_image(
    host: &dyn GitHost,
    session: &AdminSession,
    slug: &str,
    filename: Option<&str>,
    base64_content: Option<&str>,
) -> Result<StoredImage, DraftError> {
    let (filename, base64_content) = match (filename, base64_content) {
        (Some(f), Some(b)) if !f.trim().is_empty() && !b.is_empty() => (f, b),
        _ => return Err(DraftError::InvalidInput("Filename and base64 content are required".to_string())),
    };

    let clean_name = sanitization_helpers::sanitize_image_filename(filename)?;
    let bytes = STANDARD
        .decode(base64_content.trim().as_bytes())
        .map_err(|_| DraftError::InvalidInput("Image content is not valid base64".to_string()))?;
    sanitization_helpers::check_image_size(bytes.len())?;

    let draft = resolve_draft(host, slug).await?;
    let path = image_path(slug, &clean_name);
    let existing_sha = match host.get_file_sha(&draft.branch, &path).await {
        Ok(sha) => Some(sha),
        Err(GitError::NotFound(_)) => None,
        Err(e) => return Err(upstream(slug, "Looking up image")(e)),
    };
    let sha = host
        .create_file(
            &draft.branch,
            &path,
            &STANDARD.encode(&bytes),
            existing_sha.as_deref(),
            &format!("Add image: {} for {}", clean_name, slug),
        )
        .await
        .map_err(upstream(slug, "Uploading image"))?;

    log::info!("{} uploaded '{}' to draft '{}' ({} bytes)", session.username, clean_name, slug, bytes.len());
    Ok(StoredImage { success: true, path, sha })
}

pub async fn delete_image(
    host: &dyn GitHost,
    session: &AdminSession,
    slug: &str,
    filename: Option<&str>,
) -> Result<(), DraftError> {
    let filename = filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| DraftError::InvalidInput("Filename is required".to_string()))?;
    if filename.contains(['/', '\\']) || filename.contains("..") {
        return Err(DraftError::InvalidInput(format!("Invalid image filename '{}'", filename)));
    }

    let draft = resolve_draft(host, slug).await?;
    let path = image_path(slug, filename);
    let sha = host
        .get_file_sha(&draft.branch, &path)
        .await
        .map_err(upstream(slug, "Looking up image"))?;
    host.delete_file(&draft.branch, &path, &sha, &format!("Delete image: {} from {}", filename, slug))
        .await
        .map_err(upstream(slug, "Deleting image"))?;

    log::info!("{} deleted '{}' from draft '{}'", session.username, filename, slug);
    Ok(())
}

/// Flips the draft flag off, then merges.
///
/// The flip is committed only when the content still says `draft: true`, so a
/// retry after a failed merge goes straight to the merge.
pub async fn publish_draft(
    host: &dyn GitHost,
    config: &Config,
    session: &AdminSession,
    slug: &str,
) -> Result<PublishOutcome, DraftError> {
    let draft = resolve_draft(host, slug).await?;
    let path = content_path(slug);

    let file = host
        .get_file(&draft.branch, &path)
        .await
        .map_err(upstream(slug, "Fetching content"))?;
    if let Cow::Owned(updated) = mark_published(&file.content) {
        host.update_file(
            &draft.branch,
            &path,
            &updated,
            &file.sha,
            &format!("Publish: set draft to false for {}", slug),
        )
        .await
        .map_err(upstream(slug, "Clearing draft flag"))?;
    } else {
        log::info!("Draft flag already cleared for '{}', merging as is", slug);
    }

    let outcome = host
        .merge_pull_request(draft.pr_number, &format!("Publish: {}", slug))
        .await
        .map_err(upstream(slug, "Merging"))?;

    let live_url = config.live_url(slug);
    log::info!("{} published '{}' (PR #{})", session.username, slug, draft.pr_number);
    Ok(PublishOutcome {
        success: true,
        merged: outcome.merged,
        message: format!("Blog post published! It will be live at {} after the site rebuilds.", live_url),
        live_url,
    })
}

/// Closes the draft's pull request unmerged and deletes its branch.
pub async fn discard_draft(host: &dyn GitHost, session: &AdminSession, slug: &str) -> Result<(), DraftError> {
    let draft = resolve_draft(host, slug).await?;
    host.delete_draft(draft.pr_number, &draft.branch)
        .await
        .map_err(upstream(slug, "Discarding"))?;

    log::info!("{} discarded draft '{}' (PR #{})", session.username, slug, draft.pr_number);
    Ok(())
}

pub async fn preview_draft(host: &dyn GitHost, session: &AdminSession, slug: &str) -> Result<DraftPreview, DraftError> {
    let draft = fetch_draft(host, session, slug).await?;
    Ok(preview_helpers::build_preview(host, &draft))
}
