//! Markdown rendering for CMS documents and membership lessons.
//!
//! Bodies are authored as markdown with GitHub Flavored Markdown
//! extensions. Raw HTML in the source is dropped, never passed through.

use comrak::{Options, markdown_to_html};

/// Average reading speed used for reading time estimates.
const WORDS_PER_MINUTE: usize = 200;

/// Render markdown to HTML.
#[must_use]
pub fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    // GFM extensions
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    markdown_to_html(content, &options)
}

/// Estimated reading time in whole minutes, at least one.
#[must_use]
pub fn reading_time(content: &str) -> usize {
    content
        .split_whitespace()
        .count()
        .div_ceil(WORDS_PER_MINUTE)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_gfm() {
        let html = render_markdown("# Title\n\n~~old~~ new\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1>"));
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_raw_html_is_not_passed_through() {
        let html = render_markdown("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(200)), 1);
        assert_eq!(reading_time(&"word ".repeat(201)), 2);
        assert_eq!(reading_time(&"word ".repeat(1000)), 5);
    }
}
