//! Component I: the primary (and, for periodicals, secondary) INDX0/INDX1
//! record pair -- the TAGX tag dictionary plus one INDXT entry per TOC
//! node, closed off by an IDXT offset trailer.
//!
//! Ground truth: `_generate_index`, `_generate_indxt`, `_write_chapter_node`,
//! `_write_periodical_node`, `_write_section_node`, `_write_article_node`.
//! The literal TAGX/INDXT byte tables below are carried over verbatim --
//! they're opaque control tables the reader's TAGX interpreter expects
//! byte-for-byte, not values this writer has freedom to choose.

use super::vwi::{self, Direction::Forward};
use super::writer_ctoc::CtocEntry;
use super::writer_toc::{DocumentShape, MOBI_TYPE_BOOK};

const TAGX_CHAPTER: &[u8] = &[
    0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x01, 0x00, 0x02, 0x01, 0x02, 0x00, 0x03, 0x01, 0x04, 0x00,
    0x04, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// Unused by any emission path here (chapters with subchapters are not a
/// document shape this writer produces) but carried for completeness since
/// it's one of the four named tag tables alongside `chapter`/`periodical`/
/// `secondary_periodical`.
#[allow(dead_code)]
const TAGX_SUBCHAPTER: &[u8] = &[
    0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x01, 0x00, 0x02, 0x01, 0x02, 0x00, 0x03, 0x01, 0x04, 0x00,
    0x04, 0x01, 0x08, 0x00, 0x05, 0x01, 0x10, 0x00, 0x15, 0x01, 0x10, 0x00, 0x16, 0x01, 0x20, 0x00,
    0x17, 0x01, 0x40, 0x00, 0x00, 0x00, 0x00, 0x01,
];

const TAGX_PERIODICAL: &[u8] = &[
    0x00, 0x00, 0x00, 0x02, 0x01, 0x01, 0x01, 0x00, 0x02, 0x01, 0x02, 0x00, 0x03, 0x01, 0x04, 0x00,
    0x04, 0x01, 0x08, 0x00, 0x05, 0x01, 0x10, 0x00, 0x15, 0x01, 0x20, 0x00, 0x16, 0x01, 0x40, 0x00,
    0x17, 0x01, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01, 0x45, 0x01, 0x01, 0x00, 0x46, 0x01, 0x02, 0x00,
    0x47, 0x01, 0x04, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// Secondary index for a flat book. Never wired to an emission path: a
/// secondary index is only ever built for periodicals (`build_secondary_index`
/// always emits the periodical variant), but the table is carried here since
/// the ground truth's `TAGX` dict names it alongside the table actually used.
#[allow(dead_code)]
const TAGX_SECONDARY_BOOK: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01];

const TAGX_SECONDARY_PERIODICAL: &[u8] = &[
    0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x01, 0x00, 0x0b, 0x03, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
];

const ENTRY_TYPE_CHAPTER: u32 = 0x0f;
const ENTRY_TYPE_ARTICLE: u32 = 0x3f;
const ENTRY_TYPE_PERIODICAL: u32 = 0xdf;
const ENTRY_TYPE_SECTION: u32 = 0xff;

fn fw(v: u32) -> Vec<u8> {
    vwi::encode(v, Forward)
}

fn align_block(buf: &mut Vec<u8>) {
    let rem = buf.len() % 4;
    if rem != 0 {
        buf.resize(buf.len() + (4 - rem), 0);
    }
}

fn be16(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}

fn be32(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}

/// Accumulates INDXT entries and their IDXT offsets as nodes are written
/// in final document-structure order.
struct IndxtBuilder {
    indxt: Vec<u8>,
    idxt_offsets: Vec<u16>,
    counter: u32,
}

impl IndxtBuilder {
    fn new() -> Self {
        Self {
            indxt: Vec::new(),
            idxt_offsets: Vec::new(),
            counter: 0,
        }
    }

    fn start_entry(&mut self) -> String {
        let name = format!("{:04X}", self.counter);
        self.counter += 1;
        self.idxt_offsets.push(0xc0 + self.indxt.len() as u16);
        self.indxt.push(name.len() as u8);
        self.indxt.extend_from_slice(name.as_bytes());
        name
    }

    fn write_chapter(&mut self, entry: &CtocEntry, offset: usize, length: usize) {
        self.start_entry();
        self.indxt.extend(fw(ENTRY_TYPE_CHAPTER));
        self.indxt.extend(fw(offset as u32));
        self.indxt.extend(fw(length as u32));
        self.indxt.extend(fw(entry.title_offset));
        self.indxt.extend(fw(0));
    }

    fn write_periodical(
        &mut self,
        entry: &CtocEntry,
        offset: usize,
        length: usize,
        first_section: u32,
        last_section: u32,
    ) {
        self.start_entry();
        self.indxt.extend(fw(ENTRY_TYPE_PERIODICAL));
        self.indxt.push(1);
        self.indxt.extend(fw(offset as u32));
        self.indxt.extend(fw(length as u32));
        self.indxt.extend(fw(entry.title_offset));
        self.indxt.extend(fw(0));
        self.indxt.extend(fw(entry.class_offset.unwrap_or(0)));
        self.indxt.extend(fw(first_section));
        self.indxt.extend(fw(last_section));
        self.indxt.extend(fw(0));
    }

    fn write_section(
        &mut self,
        entry: &CtocEntry,
        offset: usize,
        length: usize,
        parent_index: u32,
        first_article: u32,
        last_article: u32,
    ) {
        self.start_entry();
        self.indxt.extend(fw(ENTRY_TYPE_SECTION));
        self.indxt.push(0);
        self.indxt.extend(fw(offset as u32));
        self.indxt.extend(fw(length as u32));
        self.indxt.extend(fw(entry.title_offset));
        self.indxt.extend(fw(1));
        self.indxt.extend(fw(entry.class_offset.unwrap_or(0)));
        self.indxt.extend(fw(parent_index));
        self.indxt.extend(fw(first_article));
        self.indxt.extend(fw(last_article));
    }

    fn write_article(&mut self, entry: &CtocEntry, offset: usize, length: usize, parent_index: u32) {
        self.start_entry();
        self.indxt.extend(fw(ENTRY_TYPE_ARTICLE));
        let flag_bits: u8 =
            (if entry.author_offset.is_some() { 4 } else { 0 }) | (if entry.description_offset.is_some() { 2 } else { 0 });
        self.indxt.push(flag_bits);
        self.indxt.extend(fw(offset as u32));
        self.indxt.extend(fw(length as u32));
        self.indxt.extend(fw(entry.title_offset));
        self.indxt.extend(fw(2));
        self.indxt.extend(fw(entry.class_offset.unwrap_or(0)));
        self.indxt.extend(fw(parent_index));
        if let Some(d) = entry.description_offset {
            self.indxt.extend(fw(d));
        }
        if let Some(a) = entry.author_offset {
            self.indxt.extend(fw(a));
        }
    }

    fn finish(mut self) -> (Vec<u8>, Vec<u8>, u32, String) {
        let last_name = format!("{:04X}", self.counter.saturating_sub(1));
        align_block(&mut self.indxt);
        let mut idxt = Vec::new();
        idxt.extend_from_slice(b"IDXT");
        for off in &self.idxt_offsets {
            idxt.extend_from_slice(&be16(*off));
        }
        align_block(&mut idxt);
        (self.indxt, idxt, self.counter, last_name)
    }
}

/// The primary INDX0 (TAGX dictionary + header) and INDX1 (INDXT entries
/// + IDXT trailer) record pair.
pub struct PrimaryIndex {
    pub indx0: Vec<u8>,
    pub indx1: Vec<u8>,
}

/// Build the primary index for a document. Returns `None` if there are no
/// indexable TOC nodes at all (mirrors the reader having nothing to index
/// against, in which case the caller should skip indexing entirely).
pub fn build_primary_index(
    shape: &DocumentShape,
    ctoc_entries: &[CtocEntry],
    ctoc_record_count: usize,
    mobi_type: u32,
    language_code: u32,
) -> Option<PrimaryIndex> {
    if ctoc_entries.is_empty() {
        return None;
    }

    let mut builder = IndxtBuilder::new();

    match shape {
        DocumentShape::Book { chapters } => {
            for (chapter, entry) in chapters.iter().zip(ctoc_entries.iter()) {
                builder.write_chapter(entry, chapter.offset, chapter.length);
            }
        }
        DocumentShape::Periodical { root, sections } => {
            // `ctoc_entries` was produced by walking root, then each
            // section immediately followed by its own articles (see
            // `build_structured_ctoc`) -- interleaved, not grouped. Pair
            // each node up with its CTOC entry by repeating that exact
            // walk before reordering into INDX1's grouped layout.
            let mut walk = ctoc_entries.iter();
            let root_entry = walk.next().expect("checked non-empty above");
            let section_entries: Vec<(&CtocEntry, Vec<&CtocEntry>)> = sections
                .iter()
                .map(|section| {
                    let section_entry = walk.next().expect("ctoc entries match document shape");
                    let article_entries: Vec<&CtocEntry> = section
                        .articles
                        .iter()
                        .map(|_| walk.next().expect("ctoc entries match document shape"))
                        .collect();
                    (section_entry, article_entries)
                })
                .collect();

            let section_ids: Vec<u32> = (0..sections.len()).map(|i| (1 + i) as u32).collect();
            let mut article_ranges: Vec<(u32, u32)> = Vec::with_capacity(sections.len());
            let mut next_id = 1 + sections.len() as u32;
            for section in sections {
                let first = next_id;
                let last = first + section.articles.len().saturating_sub(1) as u32;
                article_ranges.push((first, last));
                next_id += section.articles.len() as u32;
            }

            builder.write_periodical(
                root_entry,
                root.offset,
                root.length,
                section_ids.first().copied().unwrap_or(1),
                section_ids.last().copied().unwrap_or(1),
            );

            // Every section entry is written before any article entry,
            // regardless of how many sections there are: a flat
            // periodical's single section makes this collapse to
            // periodical/section/article/article/... naturally, while a
            // structured periodical groups all sections first and all
            // articles (by section) second.
            for (i, section) in sections.iter().enumerate() {
                let (section_entry, _) = &section_entries[i];
                let (first_article, last_article) = article_ranges[i];
                builder.write_section(
                    section_entry,
                    section.node.offset,
                    section.node.length,
                    0,
                    first_article,
                    last_article,
                );
            }

            for (i, section) in sections.iter().enumerate() {
                let parent = section_ids[i];
                let (_, article_entries) = &section_entries[i];
                for (article, entry) in section.articles.iter().zip(article_entries.iter()) {
                    builder.write_article(entry, article.offset, article.length, parent);
                }
            }
        }
    }

    let (indxt, indices, indxt_count, last_name) = builder.finish();

    let idxt0 = {
        let mut b = Vec::new();
        b.push(last_name.len() as u8);
        b.extend_from_slice(last_name.as_bytes());
        b.extend_from_slice(&be16(indxt_count as u16));
        align_block(&mut b);
        b
    };

    let tagx_bytes: &[u8] = if mobi_type == MOBI_TYPE_BOOK {
        TAGX_CHAPTER
    } else {
        TAGX_PERIODICAL
    };
    let tagx = {
        let mut b = Vec::new();
        b.extend_from_slice(b"TAGX");
        b.extend_from_slice(&be32(8 + tagx_bytes.len() as u32));
        b.extend_from_slice(tagx_bytes);
        align_block(&mut b);
        b
    };

    let indx0_indices_pos = 0xc0 + tagx.len() as u32 + idxt0.len() as u32;
    let indx0_indices = {
        let mut b = Vec::new();
        b.extend_from_slice(b"IDXT");
        b.extend_from_slice(&be16((0xc0 + tagx.len()) as u16));
        align_block(&mut b);
        b
    };

    let mut indx0 = Vec::with_capacity(0xc0);
    indx0.extend_from_slice(b"INDX");
    indx0.extend_from_slice(&be32(0xc0));
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&be32(0));
    indx0.extend_from_slice(&be32(6));
    indx0.extend_from_slice(&be32(indx0_indices_pos));
    indx0.extend_from_slice(&be32(1));
    indx0.extend_from_slice(&be32(0xFDE9));
    indx0.extend_from_slice(&be32(language_code));
    indx0.extend_from_slice(&be32(indxt_count));
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&be32(ctoc_record_count as u32));
    indx0.resize(indx0.len() + 124, 0);
    indx0.extend_from_slice(&be32(0xc0));
    indx0.extend_from_slice(&[0u8; 8]);
    indx0.extend_from_slice(&tagx);
    indx0.extend_from_slice(&idxt0);
    indx0.extend_from_slice(&indx0_indices);

    let mut indx1 = Vec::new();
    indx1.extend_from_slice(b"INDX");
    indx1.extend_from_slice(&be32(0xc0));
    indx1.extend_from_slice(&[0u8; 4]);
    indx1.extend_from_slice(&be32(1));
    indx1.extend_from_slice(&[0u8; 4]);
    indx1.extend_from_slice(&be32(0xc0 + indxt.len() as u32));
    indx1.extend_from_slice(&be32(indxt_count + 1));
    indx1.extend_from_slice(&[0xffu8; 8]);
    indx1.resize(indx1.len() + 156, 0);
    indx1.extend_from_slice(&indxt);
    indx1.extend_from_slice(&indices);

    Some(PrimaryIndex { indx0, indx1 })
}

/// Secondary index pair, present only for periodicals (`mobi_type >
/// 0x100`). The reader's secondary lookup addresses three fixed,
/// literally-named entries: `author`, `description`, `mastheadImage`.
pub struct SecondaryIndex {
    pub indx0: Vec<u8>,
    pub indx1: Vec<u8>,
}

pub fn build_secondary_index(language_code: u32) -> SecondaryIndex {
    const NAMES: [&str; 3] = ["author", "description", "mastheadImage"];

    let mut indxt = Vec::new();
    let mut idxt_offsets = Vec::new();
    for name in NAMES {
        idxt_offsets.push(0xc0 + indxt.len() as u16);
        indxt.push(name.len() as u8);
        indxt.extend_from_slice(name.as_bytes());
        indxt.extend(fw(1));
        indxt.extend(fw(0));
        indxt.extend(fw(0));
    }
    align_block(&mut indxt);

    let mut indices = Vec::new();
    indices.extend_from_slice(b"IDXT");
    for off in &idxt_offsets {
        indices.extend_from_slice(&be16(*off));
    }
    align_block(&mut indices);

    let idxt0 = {
        let mut b = Vec::new();
        let last = NAMES[NAMES.len() - 1];
        b.push(last.len() as u8);
        b.extend_from_slice(last.as_bytes());
        b.extend_from_slice(&be16(NAMES.len() as u16));
        align_block(&mut b);
        b
    };

    let tagx = {
        let mut b = Vec::new();
        b.extend_from_slice(b"TAGX");
        b.extend_from_slice(&be32(8 + TAGX_SECONDARY_PERIODICAL.len() as u32));
        b.extend_from_slice(TAGX_SECONDARY_PERIODICAL);
        align_block(&mut b);
        b
    };

    let indx0_indices_pos = 0xc0 + tagx.len() as u32 + idxt0.len() as u32;
    let indx0_indices = {
        let mut b = Vec::new();
        b.extend_from_slice(b"IDXT");
        b.extend_from_slice(&be16((0xc0 + tagx.len()) as u16));
        align_block(&mut b);
        b
    };

    let mut indx0 = Vec::with_capacity(0xc0);
    indx0.extend_from_slice(b"INDX");
    indx0.extend_from_slice(&be32(0xc0));
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&be32(0));
    indx0.extend_from_slice(&be32(6));
    indx0.extend_from_slice(&be32(indx0_indices_pos));
    indx0.extend_from_slice(&be32(1));
    indx0.extend_from_slice(&be32(0xFDE9));
    indx0.extend_from_slice(&be32(language_code));
    indx0.extend_from_slice(&be32(NAMES.len() as u32));
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&[0u8; 4]);
    indx0.extend_from_slice(&be32(0));
    indx0.resize(indx0.len() + 124, 0);
    indx0.extend_from_slice(&be32(0xc0));
    indx0.extend_from_slice(&[0u8; 8]);
    indx0.extend_from_slice(&tagx);
    indx0.extend_from_slice(&idxt0);
    indx0.extend_from_slice(&indx0_indices);

    let mut indx1 = Vec::new();
    indx1.extend_from_slice(b"INDX");
    indx1.extend_from_slice(&be32(0xc0));
    indx1.extend_from_slice(&[0u8; 4]);
    indx1.extend_from_slice(&be32(1));
    indx1.extend_from_slice(&[0u8; 4]);
    indx1.extend_from_slice(&be32(0xc0 + indxt.len() as u32));
    indx1.extend_from_slice(&be32(NAMES.len() as u32 + 1));
    indx1.extend_from_slice(&[0xffu8; 8]);
    indx1.resize(indx1.len() + 156, 0);
    indx1.extend_from_slice(&indxt);
    indx1.extend_from_slice(&indices);

    SecondaryIndex { indx0, indx1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::writer_toc::IndexedTocNode;
    use super::super::writer_model::TocClass;

    fn chapter(offset: usize, length: usize) -> IndexedTocNode {
        IndexedTocNode {
            title: "t".into(),
            href: "h".into(),
            klass: TocClass::Chapter,
            author: None,
            description: None,
            offset,
            length,
        }
    }

    #[test]
    fn book_without_entries_returns_none() {
        let shape = DocumentShape::Book { chapters: vec![] };
        let result = build_primary_index(&shape, &[], 1, MOBI_TYPE_BOOK, 0x09);
        assert!(result.is_none());
    }

    #[test]
    fn book_with_one_chapter_produces_indx0_and_indx1() {
        let shape = DocumentShape::Book {
            chapters: vec![chapter(0, 100)],
        };
        let entries = vec![CtocEntry {
            title_offset: 0,
            class_offset: None,
            description_offset: None,
            author_offset: None,
        }];
        let result = build_primary_index(&shape, &entries, 1, MOBI_TYPE_BOOK, 0x09).unwrap();
        assert_eq!(&result.indx0[0..4], b"INDX");
        assert_eq!(&result.indx1[0..4], b"INDX");
        assert_eq!(result.indx0.len() % 4, 0);
        assert_eq!(result.indx1.len() % 4, 0);
    }
}
