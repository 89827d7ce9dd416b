//! Input data model for the classic-MOBI6 writer.
//!
//! This is deliberately distinct from [`crate::ir`]'s semantic IR: the
//! writer needs a literal element tree (tag, namespace, ordered
//! attributes, children, tail text) that mirrors lxml's element model,
//! since `href`/`src`/`id` rewriting and page-break bookkeeping all depend
//! on exact source order and attribute text -- a normalized semantic tree
//! would lose the fidelity the original source's `Serializer` relies on.

use std::collections::HashMap;

/// A node in a parsed XHTML document tree.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A parsed XHTML element, analogous to an lxml `Element`.
#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// Text following this element but still inside its parent.
    pub tail: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            tail: None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One XHTML document in the manifest.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub href: String,
    pub media_type: String,
    pub root: Element,
}

/// A non-XHTML manifest resource (image, font, stylesheet). Opaque to the
/// writer core; only raster images are consulted, to number them for
/// `src`/`recindex` rewriting -- no image bytes are ever embedded by this
/// crate (see Design Notes, Open Question c).
#[derive(Debug, Clone)]
pub struct BinaryResource {
    pub href: String,
    pub media_type: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SpineItem<'a> {
    pub href: &'a str,
    pub linear: bool,
}

/// TOC node classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocClass {
    Chapter,
    Periodical,
    Section,
    Article,
}

impl TocClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TocClass::Chapter => "chapter",
            TocClass::Periodical => "periodical",
            TocClass::Section => "section",
            TocClass::Article => "article",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TocNode {
    pub title: String,
    pub href: String,
    pub klass: Option<TocClass>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub children: Vec<TocNode>,
}

impl TocNode {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            klass: None,
            author: None,
            description: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Guide {
    /// Reference type (e.g. "masthead", "start") -> href.
    pub references: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Creator {
    pub name: String,
    pub file_as: Option<String>,
}

/// Metadata for the document being written. A subset is required
/// (`title`, `language`); the rest feed EXTH records (§6.5) and periodical
/// conformance checks (§4.E).
#[derive(Debug, Clone, Default)]
pub struct WriterMetadata {
    pub title: String,
    pub creators: Vec<Creator>,
    pub contributors: Vec<Creator>,
    pub language: String,
    /// `(scheme, value)` pairs, e.g. `("isbn", "0131103628")` or
    /// `("uuid", "...")`.
    pub identifiers: Vec<(String, String)>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub date: Option<String>,
    pub timestamp: Option<String>,
    pub rights: Option<String>,
    pub source: Option<String>,
    pub review: Option<String>,
    /// Format `"...:newspaper"` / `"...:magazine"` etc; only the suffix
    /// after the last `:` is inspected.
    pub publication_type: Option<String>,
}

/// Top-level input to the writer: everything needed to produce a `.mobi`
/// byte stream.
pub struct WriterDocument<'a> {
    pub manifest: Vec<ManifestItem>,
    pub images: Vec<BinaryResource>,
    pub spine: Vec<SpineItem<'a>>,
    pub toc: TocNode,
    pub guide: Guide,
    pub metadata: WriterMetadata,
    /// Caller requests periodical output (mirrors ground truth's
    /// `mobi_periodical` flag) rather than the writer inferring it solely
    /// from TOC shape.
    pub mobi_periodical: bool,
}
