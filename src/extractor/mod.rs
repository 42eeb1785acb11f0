pub mod document;

pub use document::{Document, Node};

use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::config::ExtractorConfig;
use crate::models::Record;
use crate::utils::error::Result;

/// Turns listing markup into [`Record`]s.
///
/// Blocks are found from structure, not class names: every anchor pointing at a
/// detail page seeds a block, which is widened while it still describes that
/// single listing.
#[derive(Debug, Clone)]
pub struct Extractor {
    base: Url,
    base_origin: String,
    detail_path_segment: String,
    currency_markers: Vec<String>,
    fallback_block_class: Option<String>,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let base = Url::parse(&config.base_origin)?;
        let currency_markers = config
            .currency_markers
            .iter()
            .map(|marker| marker.trim().to_lowercase())
            .filter(|marker| !marker.is_empty())
            .collect();

        Ok(Self {
            base,
            base_origin: config.base_origin.trim_end_matches('/').to_string(),
            detail_path_segment: config.detail_path_segment,
            currency_markers,
            fallback_block_class: config.fallback_block_class.filter(|c| !c.trim().is_empty()),
        })
    }

    /// Parses and extracts in one step. The parsed tree is dropped before returning.
    pub fn extract_markup(&self, markup: &str) -> Vec<Record> {
        let document = Document::parse(markup);
        self.extract(&document)
    }

    pub fn extract(&self, document: &Document) -> Vec<Record> {
        let anchors = document.find_all(|node| self.detail_href(node).is_some());

        if anchors.is_empty() {
            return match &self.fallback_block_class {
                Some(class) => self.extract_by_class(document, class),
                None => Vec::new(),
            };
        }

        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for anchor in anchors {
            let Some(href) = self.detail_href(&anchor) else {
                continue;
            };
            let link = self.normalize_link(href);
            let block = self.widen_block(anchor, &link);

            if !seen.insert(block.id()) {
                continue;
            }

            records.push(self.build_record(block, link));
        }

        debug!("Extracted {} records from {} blocks", records.len(), seen.len());
        records
    }

    fn extract_by_class(&self, document: &Document, class: &str) -> Vec<Record> {
        document
            .find_all(|node| node.has_class(class))
            .into_iter()
            .filter_map(|block| {
                let followable = |node: &Node<'_>| {
                    node.name() == "a" && node.non_empty_attr("href").is_some_and(is_followable)
                };
                let href = if followable(&block) {
                    block.non_empty_attr("href")
                } else {
                    block.find_first(followable).and_then(|a| a.non_empty_attr("href"))
                };

                match href {
                    Some(href) => Some(self.build_record(block, self.normalize_link(href))),
                    None => {
                        debug!("Dropping '{}' block without a link", class);
                        None
                    }
                }
            })
            .collect()
    }

    /// `href` of `node` when it is an anchor pointing at a detail page.
    fn detail_href<'a>(&self, node: &Node<'a>) -> Option<&'a str> {
        if node.name() != "a" {
            return None;
        }
        let href = node.non_empty_attr("href")?;
        let path = href.split(['?', '#']).next().unwrap_or_default();
        path.contains(self.detail_path_segment.as_str()).then_some(href)
    }

    /// Narrowest ancestor of `anchor` that carries the whole listing for `link`.
    ///
    /// The search stays inside the widest ancestor (below `<body>`) whose detail
    /// links all resolve to `link`, so neighbouring lots are never merged.
    fn widen_block<'a>(&self, anchor: Node<'a>, link: &str) -> Node<'a> {
        let mut chain = vec![anchor];
        while let Some(parent) = chain.last().and_then(Node::parent) {
            if matches!(parent.name(), "body" | "html") {
                break;
            }
            let foreign_link = parent.find_first(|node| {
                self.detail_href(node)
                    .is_some_and(|href| self.normalize_link(href) != link)
            });
            if foreign_link.is_some() {
                break;
            }
            chain.push(parent);
        }

        // Every anchor of this lot shares the same starting block.
        let own_links = chain.last().map_or(1, |outer| self.detail_link_count(outer));
        let start = chain
            .iter()
            .position(|node| self.detail_link_count(node) == own_links)
            .unwrap_or(0);

        self.complete_block(chain[start], &chain[start + 1..])
    }

    /// Walks up `wider` until the block holds an image and a price, without
    /// letting the title or an already found price change.
    fn complete_block<'a>(&self, start: Node<'a>, wider: &[Node<'a>]) -> Node<'a> {
        let mut block = start;

        for &candidate in wider {
            let texts = block.text_nodes();
            let price = self.find_price(&texts);
            if price.is_some() && find_image(block).is_some() {
                break;
            }

            let candidate_texts = candidate.text_nodes();
            if !texts.is_empty() && candidate_texts.first() != texts.first() {
                break;
            }
            if price.is_some() && self.find_price(&candidate_texts) != price {
                break;
            }
            block = candidate;
        }

        block
    }

    /// Detail anchors in `node`, counting `node` itself.
    fn detail_link_count(&self, node: &Node<'_>) -> usize {
        let own = usize::from(self.detail_href(node).is_some());
        own + node.find_all(|n| self.detail_href(n).is_some()).len()
    }

    fn build_record(&self, block: Node<'_>, link: String) -> Record {
        let image = find_image(block).map(str::to_string);

        let texts = block.text_nodes();
        let title = texts.first().copied().unwrap_or_default();
        let price = self.find_price(&texts).unwrap_or_default();

        if price.is_empty() {
            debug!("No price found for {}", link);
        }

        Record::new(title, price, image, link)
    }

    /// First `<number> <currency>` pair after the title node.
    fn find_price(&self, texts: &[&str]) -> Option<String> {
        texts
            .get(1..)?
            .windows(2)
            .find(|pair| is_numeric(pair[0]) && self.is_currency(pair[1]))
            .map(|pair| format!("{} {}", pair[0], pair[1]))
    }

    fn is_currency(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.currency_markers.iter().any(|marker| text.contains(marker.as_str()))
    }

    pub fn normalize_link(&self, href: &str) -> String {
        let href = href.trim();
        let lower = href.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return href.to_string();
        }

        match self.base.join(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!("Could not resolve '{}' against {}: {}", href, self.base, e);
                format!("{}/{}", self.base_origin, href.trim_start_matches('/'))
            }
        }
    }
}

/// First `<img>` source in `block`, falling back to lazy-load `data-src`.
fn find_image<'a>(block: Node<'a>) -> Option<&'a str> {
    block
        .find_first(|n| n.name() == "img")
        .and_then(|img| img.non_empty_attr("src").or_else(|| img.non_empty_attr("data-src")))
}

/// False for fragment-only hrefs and non-http schemes such as `javascript:`.
fn is_followable(href: &str) -> bool {
    if href.starts_with('#') {
        return false;
    }
    match Url::parse(href) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

fn is_numeric(text: &str) -> bool {
    let mut digits = text
        .chars()
        .filter(|c| !matches!(c, ',' | '.') && !c.is_whitespace())
        .peekable();

    digits.peek().is_some() && digits.all(|c| c.is_ascii_digit())
}
