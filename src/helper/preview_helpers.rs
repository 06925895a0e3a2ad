//! Rewrites a draft so it can be displayed before its branch is merged.
//!
//! Published posts reference images as `/images/insights/<slug>/...`, served
//! from `public/` on the live site. On an unmerged branch those files only
//! exist on the git host, so every such reference is pointed at the branch's
//! raw-content URL instead.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::helper::{frontmatter_helpers, sanitization_helpers};
use crate::models::git_operations::GitHost;
use crate::models::{DraftContent, DraftPreview};

const LOCAL_IMAGE_ROOT: &str = "/images/insights/";
const WORDS_PER_MINUTE: usize = 200;

fn markdown_image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"!\[([^\]]*)\]\((/images/insights/[^)\s]+)((?:\s+"[^"]*")?)\)"#)
            .expect("markdown image pattern is valid")
    })
}

fn jsx_src_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"src=(["'])(/images/insights/[^"']+)(["'])"#)
            .expect("src attribute pattern is valid")
    })
}

/// Raw URL for a site-relative image path, or `None` if the path is not a draft image.
pub fn branch_image_url(host: &dyn GitHost, branch: &str, site_path: &str) -> Option<String> {
    site_path
        .starts_with(LOCAL_IMAGE_ROOT)
        .then(|| host.raw_file_url(branch, &format!("public{}", site_path)))
}

/// Points every local draft image reference in an MDX body at `branch`.
pub fn rewrite_image_paths(host: &dyn GitHost, branch: &str, body: &str) -> String {
    let markdown = markdown_image_regex().replace_all(body, |caps: &Captures| {
        let url = host.raw_file_url(branch, &format!("public{}", &caps[2]));
        format!("![{}]({}{})", &caps[1], url, &caps[3])
    });

    jsx_src_regex()
        .replace_all(&markdown, |caps: &Captures| {
            let url = host.raw_file_url(branch, &format!("public{}", &caps[2]));
            format!("src={}{}{}", &caps[1], url, &caps[3])
        })
        .into_owned()
}

/// Minutes to read at 200 words per minute, rounded up, never below one.
pub fn reading_time(body: &str) -> usize {
    body.split_whitespace().count().div_ceil(WORDS_PER_MINUTE).max(1)
}

/// Builds the preview of a fetched draft.
pub fn build_preview(host: &dyn GitHost, draft: &DraftContent) -> DraftPreview {
    let body = rewrite_image_paths(host, &draft.branch, frontmatter_helpers::strip_frontmatter(&draft.content));

    let hero_image_url = draft
        .frontmatter
        .get("heroImage")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|hero| branch_image_url(host, &draft.branch, hero).unwrap_or_else(|| hero.to_string()));

    DraftPreview {
        slug: draft.slug.clone(),
        pr_number: draft.pr_number,
        branch: draft.branch.clone(),
        frontmatter: draft.frontmatter.clone(),
        hero_image_url,
        html: sanitization_helpers::render_safe_html(&body),
        reading_time: reading_time(&body),
        body,
    }
}
