//! Component F: the compiled TOC string table (CNCX/CTOC), chunked into
//! 0x10000-aligned records with a 0xFBF8 payload threshold per chunk.
//!
//! Ground truth: `_add_to_ctoc`, `_add_flat_ctoc_node`,
//! `_add_structured_ctoc_node`, `_generate_ctoc`.

use std::collections::HashMap;

use super::vwi::{self, Direction};
use super::writer_toc::{DocumentShape, IndexedTocNode};

/// Max payload bytes per CNCX chunk before rolling to a new 0x10000-wide
/// logical record.
const CHUNK_THRESHOLD: usize = 0xfbf8;
const CHUNK_STRIDE: u32 = 0x10000;

#[derive(Debug, Clone, Default)]
pub struct CtocEntry {
    pub title_offset: u32,
    pub class_offset: Option<u32>,
    pub description_offset: Option<u32>,
    pub author_offset: Option<u32>,
}

pub struct CtocBuilder {
    current: Vec<u8>,
    records: Vec<Vec<u8>>,
    record_base: u32,
    /// Interned class-name offsets; class strings are written into record
    /// 0 before anything else, so their offsets never shift once assigned.
    class_offsets: HashMap<&'static str, u32>,
}

impl CtocBuilder {
    pub fn new() -> Self {
        Self {
            current: Vec::new(),
            records: Vec::new(),
            record_base: 0,
            class_offsets: HashMap::new(),
        }
    }

    /// Append `s` to the current chunk (rolling to a new one if it would
    /// overflow `CHUNK_THRESHOLD`) and return its absolute offset.
    fn add(&mut self, s: &str) -> u32 {
        let bytes = s.as_bytes();
        let len_prefix = vwi::encode(bytes.len() as u32, Direction::Forward);
        if CHUNK_THRESHOLD.saturating_sub(self.current.len()) < len_prefix.len() + bytes.len() {
            self.roll_chunk();
        }
        let offset = self.record_base + self.current.len() as u32;
        self.current.extend_from_slice(&len_prefix);
        self.current.extend_from_slice(bytes);
        offset
    }

    fn roll_chunk(&mut self) {
        let mut chunk = std::mem::take(&mut self.current);
        chunk.resize(CHUNK_THRESHOLD, 0);
        self.records.push(chunk);
        self.record_base += CHUNK_STRIDE;
    }

    /// Intern every class-name string used by `klasses` at the very start
    /// of record 0, before any node's title/description/author is added,
    /// so offsets assigned here never move once real content is appended.
    /// Must be called once, before any `add_node` call.
    fn pre_intern_classes(&mut self, klasses: &[&'static str]) {
        for &klass in klasses {
            if self.class_offsets.contains_key(klass) {
                continue;
            }
            let offset = self.add(klass);
            self.class_offsets.insert(klass, offset);
        }
    }

    fn intern_class(&mut self, klass: &'static str) -> u32 {
        *self
            .class_offsets
            .get(klass)
            .expect("class strings must be pre-interned before any node is added")
    }

    fn add_node(
        &mut self,
        node: &IndexedTocNode,
        want_class: bool,
        want_desc: bool,
        want_author: bool,
    ) -> CtocEntry {
        let title_offset = self.add(&node.title);
        let class_offset = if want_class {
            Some(self.intern_class(node.klass.as_str()))
        } else {
            None
        };
        let description_offset = if want_desc {
            node.description.as_deref().map(|d| self.add(d))
        } else {
            None
        };
        let author_offset = if want_author {
            node.author.as_deref().map(|a| self.add(a))
        } else {
            None
        };
        CtocEntry {
            title_offset,
            class_offset,
            description_offset,
            author_offset,
        }
    }

    /// Finish the builder: returns the CNCX records (aligned to 4 bytes,
    /// the final chunk null-terminated per ground truth's "the CTOC must
    /// end with a null byte" requirement).
    fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.push(0);
        self.roll_chunk();
        self.records
            .into_iter()
            .map(|mut r| {
                align_block(&mut r);
                r
            })
            .collect()
    }
}

fn align_block(buf: &mut Vec<u8>) {
    let rem = buf.len() % 4;
    if rem != 0 {
        buf.resize(buf.len() + (4 - rem), 0);
    }
}

/// Build CTOC entries + CNCX records for a book-mode (flat) document:
/// title only, per chapter.
pub fn build_flat_ctoc(chapters: &[IndexedTocNode]) -> (Vec<CtocEntry>, Vec<Vec<u8>>) {
    let mut builder = CtocBuilder::new();
    let entries = chapters
        .iter()
        .map(|c| builder.add_node(c, false, false, false))
        .collect();
    (entries, builder.finish())
}

/// Build CTOC entries + CNCX records for a periodical document, walking
/// root -> sections -> articles and recording class/description/author
/// offsets as applicable per node kind.
pub fn build_structured_ctoc(shape: &DocumentShape) -> (Vec<CtocEntry>, Vec<Vec<u8>>) {
    let mut builder = CtocBuilder::new();
    let mut entries = Vec::new();
    match shape {
        DocumentShape::Book { chapters } => {
            for c in chapters {
                entries.push(builder.add_node(c, false, false, false));
            }
        }
        DocumentShape::Periodical { root, sections } => {
            builder.pre_intern_classes(&["periodical", "section", "article"]);
            entries.push(builder.add_node(root, true, false, false));
            for section in sections {
                entries.push(builder.add_node(&section.node, true, false, false));
                for article in &section.articles {
                    entries.push(builder.add_node(article, true, true, true));
                }
            }
        }
    }
    (entries, builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::writer_model::TocClass;
    use super::super::writer_toc::PeriodicalSection;

    fn node(title: &str, klass: TocClass) -> IndexedTocNode {
        IndexedTocNode {
            title: title.into(),
            href: String::new(),
            klass,
            author: None,
            description: None,
            offset: 0,
            length: 0,
        }
    }

    /// Reproduces the offset-shift bug: class strings must be interned
    /// before any title is written, or every title offset recorded prior
    /// to the first class lookup would be stale once classes landed.
    #[test]
    fn class_offsets_stay_correct_after_many_nodes() {
        let shape = DocumentShape::Periodical {
            root: node("Daily News", TocClass::Periodical),
            sections: vec![PeriodicalSection {
                node: node("Section A", TocClass::Section),
                articles: vec![node("Article One", TocClass::Article), node("Article Two", TocClass::Article)],
            }],
        };
        let (entries, records) = build_structured_ctoc(&shape);
        let record0 = &records[0];
        for entry in &entries {
            let offset = entry.title_offset as usize;
            let (len, consumed) = vwi::decode_forward(&record0[offset..]);
            let title =
                std::str::from_utf8(&record0[offset + consumed..offset + consumed + len as usize])
                    .unwrap();
            assert!(["Daily News", "Section A", "Article One", "Article Two"].contains(&title));
        }
        let class_offset = entries[0].class_offset.unwrap() as usize;
        let (len, consumed) = vwi::decode_forward(&record0[class_offset..]);
        let klass = std::str::from_utf8(
            &record0[class_offset + consumed..class_offset + consumed + len as usize],
        )
        .unwrap();
        assert_eq!(klass, "periodical");
    }
}
