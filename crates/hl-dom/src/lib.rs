//! Document handles shared with downstream plugins.
//!
//! A [`Document`] owns the parsed tree; [`Element`] values borrow it and are
//! only valid for the scope of the handler that received them.

use ego_tree::NodeId;
use ego_tree::NodeRef;
use hl_core::HintError;
use hl_core::HintResult;
use scraper::ElementRef;
use scraper::Html;
use scraper::Node;
use scraper::Selector;
use std::collections::HashMap;
use std::fmt;

/// Position of an element's start tag in the original source.
///
/// `line` is zero-based, `column` is the one-based column of the opening `<`
/// counted in UTF-16 code units, `offset` is its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Opaque identity of a node inside one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(NodeId);

/// Attribute name/value pair borrowed from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// Child node view used by consumers that need text and comments too.
#[derive(Debug, Clone, Copy)]
pub enum NodeView<'a> {
    Element(Element<'a>),
    Text(&'a str),
    Comment(&'a str),
}

/// A node with its place in the tree, as yielded by [`Document::nodes`].
#[derive(Debug, Clone, Copy)]
pub struct DocumentNode<'a> {
    pub key: NodeKey,
    /// `None` only for the `<html>` element.
    pub parent: Option<NodeKey>,
    pub view: NodeView<'a>,
}

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Parsed HTML document.
#[derive(Debug)]
pub struct Document {
    html: Html,
    locations: HashMap<NodeId, Location>,
}

impl Document {
    pub fn new(html: Html) -> Self {
        Self {
            html,
            locations: HashMap::new(),
        }
    }

    /// Attaches source positions produced by the parser.
    pub fn with_locations(mut self, locations: impl IntoIterator<Item = (NodeKey, Location)>) -> Self {
        self.locations
            .extend(locations.into_iter().map(|(key, location)| (key.0, location)));
        self
    }

    /// The `<html>` element.
    pub fn root(&self) -> Element<'_> {
        Element::new(self, self.html.root_element())
    }

    pub fn head(&self) -> Option<Element<'_>> {
        self.root()
            .children()
            .find(|child| child.local_name() == "head")
    }

    pub fn body(&self) -> Option<Element<'_>> {
        self.root()
            .children()
            .find(|child| matches!(child.local_name(), "body" | "frameset"))
    }

    /// Text of the first `<title>`, whitespace collapsed.
    pub fn title(&self) -> String {
        self.get_elements_by_tag_name("title")
            .first()
            .map(|title| {
                title
                    .text_content()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    pub fn doctype(&self) -> Option<&str> {
        self.html
            .tree
            .root()
            .children()
            .find_map(|node| node.value().as_doctype().map(|doctype| doctype.name()))
    }

    /// True when the document lacks an `html` doctype and renders in quirks mode.
    pub fn is_quirks_mode(&self) -> bool {
        self.doctype()
            .is_none_or(|name| !name.eq_ignore_ascii_case("html"))
    }

    /// Errors reported by the tree builder while parsing.
    pub fn parse_errors(&self) -> impl Iterator<Item = &str> {
        self.html.errors.iter().map(|error| error.as_ref())
    }

    /// Outer markup of the `<html>` element.
    pub fn page_html(&self) -> String {
        self.root().outer_html()
    }

    /// All elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = Element<'_>> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|inner| Element::new(self, inner))
    }

    /// Elements, text and comments under `<html>` (inclusive) in document order.
    pub fn nodes(&self) -> impl Iterator<Item = DocumentNode<'_>> {
        let root: NodeRef<'_, Node> = *self.html.root_element();
        root.descendants().filter_map(move |node| {
            Some(DocumentNode {
                key: NodeKey(node.id()),
                parent: node
                    .parent()
                    .filter(|parent| parent.id() != self.html.tree.root().id())
                    .map(|parent| NodeKey(parent.id())),
                view: node_view(self, node)?,
            })
        })
    }

    /// Looks up an element, text or comment node by key.
    pub fn node(&self, key: NodeKey) -> Option<NodeView<'_>> {
        self.html
            .tree
            .get(key.0)
            .and_then(|node| node_view(self, node))
    }

    pub fn element_count(&self) -> usize {
        self.elements().count()
    }

    pub fn query_selector_all(&self, selectors: &str) -> HintResult<Vec<Element<'_>>> {
        let selector = parse_selector(selectors)?;
        Ok(self
            .html
            .select(&selector)
            .map(|inner| Element::new(self, inner))
            .collect())
    }

    pub fn query_selector(&self, selectors: &str) -> HintResult<Option<Element<'_>>> {
        let selector = parse_selector(selectors)?;
        Ok(self
            .html
            .select(&selector)
            .next()
            .map(|inner| Element::new(self, inner)))
    }

    /// Case-insensitive tag lookup; `*` matches every element.
    pub fn get_elements_by_tag_name(&self, name: &str) -> Vec<Element<'_>> {
        self.elements()
            .filter(|element| tag_matches(element.local_name(), name))
            .collect()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Element<'_>> {
        self.elements()
            .find(|element| element.get_attribute("id") == Some(id))
    }

    fn location_of(&self, id: NodeId) -> Option<Location> {
        self.locations.get(&id).copied()
    }
}

/// Borrowed handle to an element of a [`Document`].
#[derive(Clone, Copy)]
pub struct Element<'a> {
    document: &'a Document,
    inner: ElementRef<'a>,
}

impl<'a> Element<'a> {
    fn new(document: &'a Document, inner: ElementRef<'a>) -> Self {
        Self { document, inner }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey(self.inner.id())
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// DOM local name; foreign elements keep their case, e.g. `clipPath`.
    pub fn local_name(&self) -> &'a str {
        self.inner.value().name()
    }

    /// Lower-cased local name, as used in `element::<tag>` event names.
    pub fn tag_name(&self) -> String {
        self.local_name().to_ascii_lowercase()
    }

    pub fn namespace(&self) -> &'a str {
        &self.inner.value().name.ns
    }

    /// DOM `nodeName`: upper-case for HTML elements, unchanged for SVG and MathML.
    pub fn node_name(&self) -> String {
        if self.namespace() == HTML_NAMESPACE {
            self.local_name().to_ascii_uppercase()
        } else {
            self.local_name().to_owned()
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<&'a str> {
        self.inner.value().attr(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    pub fn classes(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.inner.value().classes()
    }

    /// Attributes in source order.
    pub fn attributes(&self) -> Vec<Attribute<'a>> {
        self.inner
            .value()
            .attrs()
            .map(|(name, value)| Attribute { name, value })
            .collect()
    }

    pub fn outer_html(&self) -> String {
        self.inner.html()
    }

    pub fn inner_html(&self) -> String {
        self.inner.inner_html()
    }

    pub fn text_content(&self) -> String {
        self.inner.text().collect()
    }

    /// Start-tag position; `None` for elements implied by the tree builder.
    pub fn location(&self) -> Option<Location> {
        self.document.location_of(self.inner.id())
    }

    /// Node identity: both handles point at the same node of the same document.
    pub fn is_same(&self, other: &Element<'_>) -> bool {
        std::ptr::eq(self.document, other.document) && self.inner.id() == other.inner.id()
    }

    pub fn parent(&self) -> Option<Element<'a>> {
        self.inner
            .parent()
            .and_then(ElementRef::wrap)
            .map(|inner| Element::new(self.document, inner))
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = Element<'a>> + use<'a> {
        let document = self.document;
        self.inner
            .child_elements()
            .map(move |inner| Element::new(document, inner))
    }

    pub fn has_children(&self) -> bool {
        self.inner.child_elements().next().is_some()
    }

    /// Child elements, text and comments in document order.
    pub fn child_nodes(&self) -> Vec<NodeView<'a>> {
        self.inner
            .children()
            .filter_map(|node| node_view(self.document, node))
            .collect()
    }

    /// Descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> impl Iterator<Item = Element<'a>> + use<'a> {
        let document = self.document;
        self.inner
            .descendent_elements()
            .skip(1)
            .map(move |inner| Element::new(document, inner))
    }

    pub fn matches(&self, selectors: &str) -> HintResult<bool> {
        Ok(parse_selector(selectors)?.matches(&self.inner))
    }

    pub fn query_selector_all(&self, selectors: &str) -> HintResult<Vec<Element<'a>>> {
        let selector = parse_selector(selectors)?;
        Ok(self
            .inner
            .select(&selector)
            .map(|inner| Element::new(self.document, inner))
            .collect())
    }

    pub fn query_selector(&self, selectors: &str) -> HintResult<Option<Element<'a>>> {
        let selector = parse_selector(selectors)?;
        Ok(self
            .inner
            .select(&selector)
            .next()
            .map(|inner| Element::new(self.document, inner)))
    }

    pub fn get_elements_by_tag_name(&self, name: &str) -> Vec<Element<'a>> {
        self.descendants()
            .filter(|element| tag_matches(element.local_name(), name))
            .collect()
    }
}

impl PartialEq for Element<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for Element<'_> {}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.local_name())
            .field("location", &self.location())
            .finish()
    }
}

fn node_view<'a>(document: &'a Document, node: NodeRef<'a, Node>) -> Option<NodeView<'a>> {
    match node.value() {
        Node::Element(_) => {
            ElementRef::wrap(node).map(|inner| NodeView::Element(Element::new(document, inner)))
        }
        Node::Text(text) => Some(NodeView::Text(&text.text)),
        Node::Comment(comment) => Some(NodeView::Comment(&comment.comment)),
        _ => None,
    }
}

fn parse_selector(selectors: &str) -> HintResult<Selector> {
    Selector::parse(selectors).map_err(|error| {
        HintError::new(
            "dom.invalid_selector",
            format!("invalid selector `{selectors}`: {error}"),
        )
    })
}

fn tag_matches(local_name: &str, wanted: &str) -> bool {
    wanted == "*" || local_name.eq_ignore_ascii_case(wanted)
}
