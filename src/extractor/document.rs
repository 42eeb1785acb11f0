//! Typed query layer over a parsed HTML tree.
//!
//! Extraction code never touches `scraper` selectors directly: it walks the
//! tree with plain predicates over [`Node`], so block detection can be written
//! in terms of structure (links, images, text) rather than class names.

use scraper::{ElementRef, Html};
use std::hash::Hash;

/// Elements whose text is never part of the visible listing text.
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// A parsed markup document.
pub struct Document {
    html: Html,
}

/// An element inside a [`Document`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    element: ElementRef<'a>,
}

impl Document {
    /// Parses arbitrary markup. Parsing is lenient and never fails; broken or
    /// empty input yields a document with an empty body.
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            element: self.html.root_element(),
        }
    }

    /// All elements of the document matching `predicate`, in document order.
    pub fn find_all<P>(&self, predicate: P) -> Vec<Node<'_>>
    where
        P: Fn(&Node<'_>) -> bool,
    {
        let root = self.root();
        let mut nodes = Vec::new();
        if predicate(&root) {
            nodes.push(root);
        }
        nodes.extend(root.find_all(predicate));
        nodes
    }
}

impl<'a> Node<'a> {
    /// Stable identity of the element within its document.
    pub fn id(&self) -> impl Copy + Eq + Hash + use<> {
        self.element.id()
    }

    /// Lower-case tag name.
    pub fn name(&self) -> &'a str {
        self.element.value().name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Attribute value with surrounding whitespace removed, `None` when empty.
    pub fn non_empty_attr(&self, name: &str) -> Option<&'a str> {
        self.attr(name).map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.element.value().classes().any(|c| c == class)
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|element| Node { element })
    }

    /// Descendant elements (excluding `self`) matching `predicate`, in document order.
    pub fn find_all<P>(&self, predicate: P) -> Vec<Node<'a>>
    where
        P: Fn(&Node<'a>) -> bool,
    {
        self.element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .map(|element| Node { element })
            .filter(|node| predicate(node))
            .collect()
    }

    pub fn find_first<P>(&self, predicate: P) -> Option<Node<'a>>
    where
        P: Fn(&Node<'a>) -> bool,
    {
        self.element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .map(|element| Node { element })
            .find(|node| predicate(node))
    }

    /// Text nodes under this element in document order, trimmed, with empty
    /// strings and script/style content skipped.
    pub fn text_nodes(&self) -> Vec<&'a str> {
        self.element
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let inside_non_content = node
                    .parent()
                    .and_then(ElementRef::wrap)
                    .is_some_and(|parent| NON_CONTENT_ELEMENTS.contains(&parent.value().name()));
                if inside_non_content {
                    return None;
                }
                let trimmed = (&**text).trim();
                (!trimmed.is_empty()).then_some(trimmed)
            })
            .collect()
    }

    /// Flattened text with single spaces between text nodes.
    pub fn text(&self) -> String {
        self.text_nodes().join(" ")
    }
}
