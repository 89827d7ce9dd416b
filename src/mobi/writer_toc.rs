//! Component E: classifies the input TOC into a document shape (book /
//! flat periodical / structured periodical), resolves each node's content
//! span, and flattens book-mode TOCs.
//!
//! Ground truth: `_flatten_toc`, `_evaluate_periodical_toc`,
//! `_establish_document_structure` in the original source.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::writer_model::{Guide, TocClass, TocNode, WriterMetadata};
use super::writer_serializer::resolve_offset;

#[derive(Debug, Clone)]
pub struct IndexedTocNode {
    pub title: String,
    pub href: String,
    pub klass: TocClass,
    pub author: Option<String>,
    pub description: Option<String>,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct PeriodicalSection {
    pub node: IndexedTocNode,
    pub articles: Vec<IndexedTocNode>,
}

#[derive(Debug, Clone)]
pub enum DocumentShape {
    Book {
        chapters: Vec<IndexedTocNode>,
    },
    Periodical {
        root: IndexedTocNode,
        sections: Vec<PeriodicalSection>,
    },
}

/// Mobi type byte, as written into Record 0 (`§6.5`).
pub const MOBI_TYPE_BOOK: u32 = 0x002;
pub const MOBI_TYPE_FLAT_PERIODICAL: u32 = 0x102;
pub const MOBI_TYPE_NEWSPAPER: u32 = 0x101;
pub const MOBI_TYPE_MAGAZINE: u32 = 0x103;

/// Walk `toc` pre-order (excluding the root) collecting every descendant
/// with a resolvable offset, dedupe by offset (first occurrence wins),
/// and renumber as a flat chapter list. Non-fatal: unresolved hrefs are
/// skipped and reported.
pub fn flatten_book_toc(
    toc: &TocNode,
    id_offsets: &HashMap<String, usize>,
    content_length: usize,
    diagnostics: &mut Vec<Error>,
) -> Vec<IndexedTocNode> {
    let mut raw: Vec<(String, String, usize)> = Vec::new();
    collect_descendants(toc, id_offsets, diagnostics, &mut raw);
    raw.sort_by_key(|(_, _, offset)| *offset);

    let mut seen_offsets = std::collections::HashSet::new();
    let mut deduped = Vec::new();
    for entry in raw {
        if seen_offsets.insert(entry.2) {
            deduped.push(entry);
        }
    }

    let mut chapters = Vec::with_capacity(deduped.len());
    for (i, (title, href, offset)) in deduped.iter().enumerate() {
        let length = deduped
            .get(i + 1)
            .map(|(_, _, next)| next - offset)
            .unwrap_or_else(|| content_length.saturating_sub(*offset));
        chapters.push(IndexedTocNode {
            title: title.clone(),
            href: href.clone(),
            klass: TocClass::Chapter,
            author: None,
            description: None,
            offset: *offset,
            length,
        });
    }
    chapters
}

fn collect_descendants(
    node: &TocNode,
    id_offsets: &HashMap<String, usize>,
    diagnostics: &mut Vec<Error>,
    out: &mut Vec<(String, String, usize)>,
) {
    for child in &node.children {
        match resolve_offset(id_offsets, &child.href) {
            Some(offset) => out.push((child.title.clone(), child.href.clone(), offset)),
            None => diagnostics.push(Error::MissingTocTarget {
                href: child.href.clone(),
            }),
        }
        collect_descendants(child, id_offsets, diagnostics, out);
    }
}

/// Validate periodical TOC shape (periodical/section/article nesting,
/// required date metadata, masthead guide entry) and build the structured
/// document shape. Returns `(shape, conforming)` -- a non-conforming
/// result still returns a best-effort shape (the caller degrades to flat
/// CTOC), never aborts.
pub fn classify_periodical(
    toc: &TocNode,
    metadata: &WriterMetadata,
    guide: &Guide,
    id_offsets: &HashMap<String, usize>,
    content_length: usize,
    diagnostics: &mut Vec<Error>,
) -> (DocumentShape, bool) {
    let mut conforms = true;

    // Missing date/timestamp is handled by the caller as a hard
    // `ConfigurationError::MissingDate` before this function is ever
    // reached (§7) -- it is not one of the structural nonconformities
    // that downgrade to book output.
    if !guide.references.contains_key("masthead") {
        conforms = false;
        diagnostics.push(Error::NonConformingPeriodical {
            reason: "missing masthead guide reference".into(),
        });
    }
    if toc.klass != Some(TocClass::Periodical) {
        conforms = false;
        diagnostics.push(Error::NonConformingPeriodical {
            reason: "root TOC node is not class periodical".into(),
        });
    }
    for section in &toc.children {
        if section.klass != Some(TocClass::Section) {
            conforms = false;
            diagnostics.push(Error::NonConformingPeriodical {
                reason: format!("node '{}' is not class section", section.title),
            });
        }
        for article in &section.children {
            if article.klass != Some(TocClass::Article) {
                conforms = false;
                diagnostics.push(Error::NonConformingPeriodical {
                    reason: format!("node '{}' is not class article", article.title),
                });
            }
        }
    }

    let root_offset = resolve_offset(id_offsets, &toc.href).unwrap_or(0);
    let mut sections = Vec::new();
    let section_count = toc.children.len();

    for (si, section) in toc.children.iter().enumerate() {
        let section_offset = resolve_offset(id_offsets, &section.href).unwrap_or(root_offset);
        let mut articles = Vec::new();
        for (ai, article) in section.children.iter().enumerate() {
            let offset = match resolve_offset(id_offsets, &article.href) {
                Some(o) => o,
                None => {
                    diagnostics.push(Error::MissingTocTarget {
                        href: article.href.clone(),
                    });
                    continue;
                }
            };
            let length = next_offset(toc, si, ai, id_offsets)
                .map(|next| next.saturating_sub(offset))
                .unwrap_or_else(|| content_length.saturating_sub(offset));
            articles.push(IndexedTocNode {
                title: article.title.clone(),
                href: article.href.clone(),
                klass: TocClass::Article,
                author: article.author.clone(),
                description: article.description.clone(),
                offset,
                length,
            });
        }
        let section_length = articles
            .iter()
            .map(|a| a.offset + a.length)
            .max()
            .unwrap_or(section_offset)
            .saturating_sub(section_offset);
        sections.push(PeriodicalSection {
            node: IndexedTocNode {
                title: section.title.clone(),
                href: section.href.clone(),
                klass: TocClass::Section,
                author: None,
                description: None,
                offset: section_offset,
                length: section_length,
            },
            articles,
        });
    }

    let total_length = sections
        .iter()
        .flat_map(|s| s.articles.iter())
        .map(|a| a.offset + a.length)
        .max()
        .unwrap_or(root_offset)
        .saturating_sub(root_offset);

    let root = IndexedTocNode {
        title: toc.title.clone(),
        href: toc.href.clone(),
        klass: TocClass::Periodical,
        author: None,
        description: None,
        offset: root_offset,
        length: total_length,
    };

    let _ = section_count;
    (DocumentShape::Periodical { root, sections }, conforms)
}

/// Find the offset of the article/section immediately following
/// `(section_index, article_index)` in document order, to bound the
/// current article's length.
fn next_offset(
    toc: &TocNode,
    section_index: usize,
    article_index: usize,
    id_offsets: &HashMap<String, usize>,
) -> Option<usize> {
    let section = &toc.children[section_index];
    if let Some(next_article) = section.children.get(article_index + 1) {
        return resolve_offset(id_offsets, &next_article.href);
    }
    for section in &toc.children[section_index + 1..] {
        if let Some(first) = section.children.first() {
            if let Some(o) = resolve_offset(id_offsets, &first.href) {
                return Some(o);
            }
        }
        if let Some(o) = resolve_offset(id_offsets, &section.href) {
            return Some(o);
        }
    }
    None
}

/// Resolve the document's mobi type (§6.5) from its shape and metadata.
pub fn mobi_type_for(shape: &DocumentShape, metadata: &WriterMetadata) -> Result<u32> {
    match shape {
        DocumentShape::Book { .. } => Ok(MOBI_TYPE_BOOK),
        DocumentShape::Periodical { sections, .. } => {
            if sections.len() <= 1 {
                Ok(MOBI_TYPE_FLAT_PERIODICAL)
            } else {
                let is_newspaper = metadata
                    .publication_type
                    .as_deref()
                    .and_then(|pt| pt.rsplit(':').next())
                    .map(|suffix| suffix.eq_ignore_ascii_case("newspaper"))
                    .unwrap_or(false);
                Ok(if is_newspaper {
                    MOBI_TYPE_NEWSPAPER
                } else {
                    MOBI_TYPE_MAGAZINE
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_dedups_by_offset_and_forces_chapter_class() {
        let mut root = TocNode::new("root", "book.xhtml");
        let mut a = TocNode::new("A", "c1.xhtml#a");
        a.klass = Some(TocClass::Article);
        let b = TocNode::new("B (dup)", "c1.xhtml#a");
        let c = TocNode::new("C", "c2.xhtml#c");
        root.children.push(a);
        root.children.push(b);
        root.children.push(c);

        let mut id_offsets = HashMap::new();
        id_offsets.insert("c1.xhtml#a".to_string(), 10);
        id_offsets.insert("c2.xhtml#c".to_string(), 50);

        let mut diagnostics = Vec::new();
        let chapters = flatten_book_toc(&root, &id_offsets, 100, &mut diagnostics);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "A");
        assert!(chapters.iter().all(|c| c.klass == TocClass::Chapter));
        assert_eq!(chapters[0].length, 40);
        assert_eq!(chapters[1].length, 50);
    }
}
