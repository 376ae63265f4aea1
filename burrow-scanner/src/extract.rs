use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Malformed document at {url}: {reason}")]
    MalformedDocument { url: String, reason: String },
}

/// Links and visible text pulled from one parse of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Absolute link targets in document order. Duplicates are kept; the
    /// frontier dedupes.
    pub links: Vec<String>,
    pub text: String,
}

/// Skipped without resolving: these never lead to a fetchable page.
const SKIPPED_HREF_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Elements whose text is not part of the readable page.
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub struct LinkExtractor {
    anchors: Selector,
    base: Selector,
}

impl LinkExtractor {
    pub fn new() -> Self {
        Self {
            anchors: Selector::parse("a[href]").expect("static selector"),
            base: Selector::parse("base[href]").expect("static selector"),
        }
    }

    /// Every anchor `href` on the page, resolved to absolute form.
    ///
    /// `page_url` must be the address the document was served from, trailing
    /// slash included, since relative links resolve against it.
    pub fn extract(&self, page_url: &Url, content: &[u8]) -> Result<Vec<String>, ExtractError> {
        self.extract_page(page_url, content).map(|page| page.links)
    }

    pub fn extract_page(
        &self,
        page_url: &Url,
        content: &[u8],
    ) -> Result<ExtractedPage, ExtractError> {
        let malformed = |reason: &str| ExtractError::MalformedDocument {
            url: page_url.to_string(),
            reason: reason.to_string(),
        };

        let html = std::str::from_utf8(content).map_err(|_| malformed("content is not UTF-8"))?;
        if html.trim().is_empty() {
            return Err(malformed("document is empty"));
        }
        if !html.contains('<') {
            return Err(malformed("document contains no markup"));
        }

        let document = Html::parse_document(html);
        let base = self.document_base(&document, page_url);

        let mut links = Vec::new();
        for element in document.select(&self.anchors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.starts_with('#')
                || SKIPPED_HREF_PREFIXES.iter().any(|prefix| {
                    href.get(..prefix.len())
                        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
                })
            {
                continue;
            }
            match base.join(href) {
                Ok(absolute) => links.push(absolute.to_string()),
                Err(e) => debug!("Skipping unresolvable href {:?} on {}: {}", href, page_url, e),
            }
        }

        let text = visible_text(document.root_element());
        Ok(ExtractedPage { links, text })
    }

    /// `<base href>` if the document declares a usable one.
    fn document_base(&self, document: &Html, page_url: &Url) -> Url {
        document
            .select(&self.base)
            .next()
            .and_then(|element| element.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok())
            .unwrap_or_else(|| page_url.clone())
    }
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in root.descendants() {
        let Node::Text(chunk) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| NON_TEXT_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            text.push_str(chunk);
            text.push(' ');
        }
    }
    text
}
