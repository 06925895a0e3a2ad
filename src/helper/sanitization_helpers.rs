use ammonia::Builder;
use pulldown_cmark::{html, Options, Parser};
use std::collections::HashSet;
use thiserror::Error;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".avif"];
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("Invalid filename")]
    InvalidFilename,
    #[error("File type {0} not allowed. Use: {allowed}", allowed = ALLOWED_IMAGE_EXTENSIONS.join(", "))]
    ExtensionNotAllowed(String),
    #[error("File too large. Maximum size is 10MB.")]
    TooLarge,
}

/// Reduces an uploaded filename to `[a-z0-9._-]`.
///
/// Disallowed characters become `-`, runs of `-` collapse, and dashes at the
/// edges of the stem are dropped, so `My Photo!!.PNG` becomes `my-photo.png`.
/// The result must carry an allowed image extension.
pub fn sanitize_image_filename(filename: &str) -> Result<String, ImageRejection> {
    let mut collapsed = String::with_capacity(filename.len());
    for c in filename.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            c.to_ascii_lowercase()
        } else {
            '-'
        };
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    let (stem, extension) = match collapsed.rfind('.') {
        Some(dot) => (&collapsed[..dot], &collapsed[dot..]),
        None => return Err(ImageRejection::InvalidFilename),
    };

    let stem = stem.trim_matches('-');
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        return Err(ImageRejection::InvalidFilename);
    }
    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension) {
        return Err(ImageRejection::ExtensionNotAllowed(extension.to_string()));
    }

    Ok(format!("{}{}", stem, extension))
}

pub fn check_image_size(size_bytes: usize) -> Result<(), ImageRejection> {
    if size_bytes > MAX_IMAGE_BYTES {
        Err(ImageRejection::TooLarge)
    } else {
        Ok(())
    }
}

/// Renders Markdown to HTML and keeps only a safe subset of tags and attributes.
/// Scripts and event handler attributes never survive.
pub fn render_safe_html(markdown_input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown_input, options);
    let mut unsafe_html = String::new();
    html::push_html(&mut unsafe_html, parser);

    let safe_tags: HashSet<&str> = [
        "h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "i", "em", "p", "br",
        "a", "ul", "ol", "li", "blockquote", "code", "pre", "hr", "img", "table",
        "thead", "tbody", "tr", "th", "td", "s", "del", "div", "span", "figure", "figcaption",
    ].into_iter().collect();

    let generic_attributes: HashSet<&str> = [
        "src", "href", "alt", "title", "class", "width", "height",
    ].into_iter().collect();

    Builder::new()
        .tags(safe_tags)
        .generic_attributes(generic_attributes)
        .link_rel(Some("noopener noreferrer"))
        .clean(&unsafe_html)
        .to_string()
}
