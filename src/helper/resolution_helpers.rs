//! Slug ↔ path contract and the draft resolution layer.
//!
//! There is no draft registry: a draft exists exactly while an open pull
//! request changes `content/insights/<slug>.mdx`. Callers go through
//! [`find_pr_by_slug`] so the scan can later be replaced by an index.

use crate::models::git_operations::{GitError, GitHost};
use crate::models::{DraftPR, PullRequest};

pub const CONTENT_PREFIX: &str = "content/insights/";
pub const CONTENT_SUFFIX: &str = ".mdx";
pub const IMAGE_PREFIX: &str = "public/images/insights/";

pub fn content_path(slug: &str) -> String {
    format!("{}{}{}", CONTENT_PREFIX, slug, CONTENT_SUFFIX)
}

/// Directory (with trailing slash) holding a draft's images.
pub fn image_prefix(slug: &str) -> String {
    format!("{}{}/", IMAGE_PREFIX, slug)
}

pub fn image_path(slug: &str, filename: &str) -> String {
    format!("{}{}", image_prefix(slug), filename)
}

/// Recovers the slug from a changed file, if that file is a draft's content file.
pub fn slug_from_content_path(path: &str) -> Option<&str> {
    path.strip_prefix(CONTENT_PREFIX)?
        .strip_suffix(CONTENT_SUFFIX)
        .filter(|slug| is_valid_slug(slug))
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn to_draft(pr: PullRequest, slug: &str) -> DraftPR {
    DraftPR {
        pr_number: pr.number,
        title: pr.title,
        slug: slug.to_string(),
        branch: pr.head.branch,
        created_at: pr.created_at,
        updated_at: pr.updated_at,
        pr_url: pr.html_url,
        author: pr.user.map(|u| u.login).unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Lists open pull requests that carry a draft insight.
///
/// Costs one host call per open pull request. A pull request whose file
/// listing cannot be read is skipped, not fatal.
pub async fn list_draft_prs(host: &dyn GitHost) -> Result<Vec<DraftPR>, GitError> {
    let pulls = host.list_open_pull_requests().await?;
    let mut drafts = Vec::new();

    for pr in pulls {
        let files = match host.pull_request_files(pr.number).await {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Skipping PR #{} while listing drafts: {}", pr.number, e);
                continue;
            }
        };

        let slug = files
            .iter()
            .filter(|f| !f.is_removed())
            .find_map(|f| slug_from_content_path(&f.filename))
            .map(str::to_string);

        if let Some(slug) = slug {
            drafts.push(to_draft(pr, &slug));
        }
    }

    Ok(drafts)
}

/// First open draft claiming `slug`, in host listing order.
pub async fn find_pr_by_slug(host: &dyn GitHost, slug: &str) -> Result<Option<DraftPR>, GitError> {
    if !is_valid_slug(slug) {
        return Ok(None);
    }

    let mut matches = list_draft_prs(host).await?.into_iter().filter(|d| d.slug == slug);
    let first = matches.next();

    if let Some(found) = &first {
        for duplicate in matches {
            log::warn!(
                "Slug '{}' is claimed by PR #{} and PR #{}; using PR #{}",
                slug, found.pr_number, duplicate.pr_number, found.pr_number
            );
        }
    }

    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::git_operations::memory_operations::MemoryGitHost;
    use rstest::rstest;

    #[rstest]
    #[case("hello-world")]
    #[case("q3_update-2025")]
    fn paths_are_pure_functions_of_slug(#[case] slug: &str) {
        assert_eq!(content_path(slug), format!("content/insights/{}.mdx", slug));
        assert_eq!(image_prefix(slug), format!("public/images/insights/{}/", slug));
        assert_eq!(content_path(slug), content_path(slug));
        assert_eq!(slug_from_content_path(&content_path(slug)), Some(slug));
    }

    #[rstest]
    #[case("content/insights/hello.md")]
    #[case("content/case-studies/hello.mdx")]
    #[case("content/insights/nested/hello.mdx")]
    #[case("content/insights/.mdx")]
    fn non_draft_paths_have_no_slug(#[case] path: &str) {
        assert_eq!(slug_from_content_path(path), None);
    }

    #[rstest]
    #[case("", false)]
    #[case("../etc", false)]
    #[case("a/b", false)]
    #[case("Hello-World", true)]
    fn slug_validation(#[case] slug: &str, #[case] valid: bool) {
        assert_eq!(is_valid_slug(slug), valid);
    }

    #[tokio::test]
    async fn lists_only_pull_requests_with_draft_content() {
        let host = MemoryGitHost::new();
        host.seed_draft(42, "hello-world", "---\ndraft: true\n---\n");
        host.open_pull_request(43, "Fix footer", "fix/footer", &[("src/footer.tsx", b"x")]);

        let drafts = list_draft_prs(&host).await.expect("listing should succeed");

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].slug, "hello-world");
        assert_eq!(drafts[0].pr_number, 42);
        assert_eq!(drafts[0].branch, "draft/hello-world");
        assert_eq!(drafts[0].author, "editor");
    }

    #[tokio::test]
    async fn unreadable_file_listing_skips_that_pull_request() {
        let host = MemoryGitHost::new();
        host.seed_draft(1, "first", "---\ndraft: true\n---\n");
        host.seed_draft(2, "second", "---\ndraft: true\n---\n");
        host.fail_file_listing(1);

        let drafts = list_draft_prs(&host).await.expect("listing should succeed");

        assert_eq!(drafts.iter().map(|d| d.slug.as_str()).collect::<Vec<_>>(), vec!["second"]);
    }

    #[tokio::test]
    async fn duplicate_slug_resolves_to_first_listed() {
        let host = MemoryGitHost::new();
        host.seed_draft(7, "dup", "---\ndraft: true\n---\nA");
        host.open_pull_request(8, "Another", "other/dup", &[("content/insights/dup.mdx", b"B")]);

        let found = find_pr_by_slug(&host, "dup").await.expect("lookup should succeed");

        assert_eq!(found.map(|d| d.pr_number), Some(7));
    }

    #[tokio::test]
    async fn invalid_slug_never_reaches_the_host() {
        let host = MemoryGitHost::new();

        let found = find_pr_by_slug(&host, "../secrets").await.expect("lookup should succeed");

        assert!(found.is_none());
        assert_eq!(host.call_count(), 0);
    }
}
