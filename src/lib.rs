//! # mobi6-writer
//!
//! A writer for classic MOBI6 (Mobipocket) ebook containers.
//!
//! This crate implements the core binary-serialization engine for producing
//! `.mobi` files from an already-normalized e-book document model: a
//! manifest of parsed XHTML items, a spine ordering, a hierarchical table
//! of contents, and metadata. It does not parse EPUB/OPF/XHTML/CSS itself
//! (callers supply a parsed element tree per manifest item) and it does not
//! read existing MOBI files back -- both are treated as external
//! collaborators.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mobi6_writer::mobi::write_document;
//! use mobi6_writer::mobi::writer_config::WriterConfig;
//! use mobi6_writer::mobi::writer_model::{
//!     Element, ManifestItem, Node, SpineItem, TocNode, WriterDocument, Guide, WriterMetadata,
//! };
//!
//! let mut body = Element::new("body");
//! let mut h1 = Element::new("h1");
//! h1.attributes.push(("id".into(), "ch1".into()));
//! h1.children.push(Node::Text("Chapter One".into()));
//! body.children.push(Node::Element(h1));
//!
//! let manifest = vec![ManifestItem {
//!     href: "chapter1.xhtml".into(),
//!     media_type: "application/xhtml+xml".into(),
//!     root: body,
//! }];
//! let spine = vec![SpineItem { href: "chapter1.xhtml", linear: true }];
//! let mut toc = TocNode::new("Table of Contents", "");
//! toc.children.push(TocNode::new("Chapter One", "chapter1.xhtml#ch1"));
//!
//! let doc = WriterDocument {
//!     manifest,
//!     images: vec![],
//!     spine,
//!     toc,
//!     guide: Guide::default(),
//!     metadata: WriterMetadata {
//!         title: "Example Book".into(),
//!         language: "en".into(),
//!         ..Default::default()
//!     },
//!     mobi_periodical: false,
//! };
//!
//! let bytes = write_document(&doc, &WriterConfig::new()).unwrap();
//! std::fs::write("output.mobi", bytes).unwrap();
//! ```

pub mod error;
pub mod mobi;

pub use error::{Error, Result};
pub use mobi::{write_document, writer_config::WriterConfig};
