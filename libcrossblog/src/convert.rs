//! HTML to Markdown conversion
//!
//! Platforms that only serve HTML convert through a [`MarkdownConverter`] so
//! the transformation can be swapped out in tests or replaced wholesale.

use crate::error::{PlatformError, Result};

/// Converts platform-native HTML into Markdown
pub trait MarkdownConverter: Send + Sync {
    fn convert(&self, html: &str) -> Result<String>;
}

/// Default converter backed by `html2md`
#[derive(Debug, Clone, Copy, Default)]
pub struct Html2MdConverter;

impl MarkdownConverter for Html2MdConverter {
    fn convert(&self, html: &str) -> Result<String> {
        if html.trim().is_empty() {
            return Err(PlatformError::Conversion("HTML body is empty".to_string()).into());
        }

        let markdown = html2md::parse_html(html);
        let markdown = markdown.trim();

        // Markup with no text content (e.g. a lone <img> the converter drops)
        if markdown.is_empty() {
            return Err(PlatformError::Conversion(
                "HTML produced no markdown content".to_string(),
            )
            .into());
        }

        Ok(markdown.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrossblogError;

    #[test]
    fn test_converts_paragraphs_and_emphasis() {
        let markdown = Html2MdConverter
            .convert("<p>Hello <strong>world</strong></p>")
            .unwrap();
        assert!(markdown.contains("Hello"));
        assert!(markdown.contains("**world**"));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let html = "<h1>Title</h1><p>Some <em>text</em> and a <a href=\"https://example.com\">link</a>.</p>";
        let first = Html2MdConverter.convert(html).unwrap();
        let second = Html2MdConverter.convert(html).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_html_is_a_conversion_error() {
        let result = Html2MdConverter.convert("   ");
        assert!(matches!(
            result,
            Err(CrossblogError::Platform(PlatformError::Conversion(_)))
        ));
    }
}
