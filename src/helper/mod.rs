pub mod draft_helpers;
pub mod frontmatter_helpers;
pub mod preview_helpers;
pub mod resolution_helpers;
pub mod sanitization_helpers;
pub mod session_helpers;
