//! HTML parsing boundary: decoding, tree building and source positions.

mod decode;
mod source_map;

pub use decode::decode_html_bytes;

use hl_core::HintError;
use hl_core::HintResult;
use hl_dom::Document;
use scraper::Html;

const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;
const MAX_DOCUMENT_BYTES_CEILING: usize = 256 * 1024 * 1024;

/// Parser limits and strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlConfig {
    pub max_document_bytes: usize,
    /// Fail on tree-builder errors and unknown charset labels instead of
    /// recovering.
    pub strict: bool,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            strict: false,
        }
    }
}

impl HtmlConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> HintResult<()> {
        if self.max_document_bytes == 0 {
            return Err(HintError::new(
                "config.invalid_document_limit",
                "max_document_bytes must be greater than zero",
            ));
        }

        if self.max_document_bytes > MAX_DOCUMENT_BYTES_CEILING {
            return Err(HintError::new(
                "config.invalid_document_limit",
                format!("max_document_bytes must not exceed {MAX_DOCUMENT_BYTES_CEILING}"),
            ));
        }

        Ok(())
    }
}

/// Parses raw HTML into a located [`Document`].
#[derive(Debug, Default, Clone)]
pub struct HtmlParser {
    config: HtmlConfig,
}

impl HtmlParser {
    pub fn new(config: HtmlConfig) -> HintResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HtmlConfig {
        &self.config
    }

    pub fn parse(&self, input: &str) -> HintResult<Document> {
        if input.len() > self.config.max_document_bytes {
            return Err(HintError::new(
                "parse.document_too_large",
                format!(
                    "document is {} bytes, limit is {}",
                    input.len(),
                    self.config.max_document_bytes
                ),
            ));
        }

        let html = Html::parse_document(input);
        if self.config.strict {
            if let Some(first) = html.errors.first() {
                return Err(HintError::new(
                    "parse.malformed_markup",
                    format!("{first} ({} errors total)", html.errors.len()),
                ));
            }
        }

        let document = Document::new(html);
        let locations = source_map::locate(input, &document);
        log::debug!(
            "parsed {} bytes into {} elements ({} located)",
            input.len(),
            document.element_count(),
            locations.len()
        );
        Ok(document.with_locations(locations))
    }

    /// Decodes `body` and parses it.
    pub fn parse_bytes(
        &self,
        body: &[u8],
        media_type: &str,
        declared_charset: Option<&str>,
    ) -> HintResult<Document> {
        if body.len() > self.config.max_document_bytes {
            return Err(HintError::new(
                "parse.document_too_large",
                format!(
                    "document is {} bytes, limit is {}",
                    body.len(),
                    self.config.max_document_bytes
                ),
            ));
        }

        let text = decode_html_bytes(body, media_type, declared_charset, self.config.strict)?;
        self.parse(&text)
    }
}
