//! Orchestrator: wires components B through J into a complete PalmDB/MOBI
//! byte stream, then frames the whole thing as a PalmDB container.
//!
//! Ground truth: the top-level `_generate`/`MobiWriter.write` driver.
//! Restructured here as a single function over local state rather than a
//! mutable builder object, since nothing downstream needs to observe
//! partial progress.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::mobi_lang;
use super::writer_config::WriterConfig;
use super::writer_ctoc::{self, CtocEntry};
use super::writer_htmlrecords;
use super::writer_indx;
use super::writer_model::WriterDocument;
use super::writer_pagebreaks;
use super::writer_record0::{self, Record0Config};
use super::writer_serializer;
use super::writer_tbs::{self, TbsState};
use super::writer_textrecords::{self, RECORD_SIZE};
use super::writer_toc::{self, DocumentShape, IndexedTocNode};

const NULL_U32: u32 = 0xFFFF_FFFF;
const PDB_HEADER_LEN: usize = 94;

/// FLIS record (§6.4): a fixed literal, independent of document contents.
const FLIS_RECORD: &[u8] = &[
    b'F', b'L', b'I', b'S', 0x00, 0x00, 0x00, 0x08, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0xff, 0x00, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01,
    0xff, 0xff, 0xff, 0xff,
];

/// EOF marker record (§6.4): always the file's final record.
const EOF_RECORD: &[u8] = &[0xe9, 0x8e, 0x0d, 0x0a];

fn fcis_record(text_length: u32) -> Vec<u8> {
    let mut r = Vec::with_capacity(0x30);
    r.extend_from_slice(b"FCIS");
    r.extend_from_slice(&0x0000_0014u32.to_be_bytes());
    r.extend_from_slice(&0x0000_0010u32.to_be_bytes());
    r.extend_from_slice(&0x0000_0001u32.to_be_bytes());
    r.extend_from_slice(&0x0000_0000u32.to_be_bytes());
    r.extend_from_slice(&text_length.to_be_bytes());
    r.extend_from_slice(&0x0000_0000u32.to_be_bytes());
    r.extend_from_slice(&0x0000_0000u32.to_be_bytes());
    r.extend_from_slice(&0x0000_0020u32.to_be_bytes());
    r.extend_from_slice(&0x0000_0008u32.to_be_bytes());
    r.extend_from_slice(&0x0001u16.to_be_bytes());
    r.extend_from_slice(&0x0001u16.to_be_bytes());
    r.extend_from_slice(&0x0000_0000u32.to_be_bytes());
    r
}

fn palm_timestamp() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Classify the document's shape and resolve its `mobiType` (§4.E). A
/// periodical request that fails structural conformance silently
/// downgrades to flat book output rather than aborting the write.
fn classify_document(
    doc: &WriterDocument<'_>,
    id_offsets: &HashMap<String, usize>,
    content_length: usize,
    diagnostics: &mut Vec<Error>,
) -> Result<(DocumentShape, u32)> {
    let shape = if doc.mobi_periodical {
        let (candidate, conforms) = writer_toc::classify_periodical(
            &doc.toc,
            &doc.metadata,
            &doc.guide,
            id_offsets,
            content_length,
            diagnostics,
        );
        if conforms {
            candidate
        } else {
            log::warn!("periodical TOC failed conformance checks, falling back to book output");
            DocumentShape::Book {
                chapters: writer_toc::flatten_book_toc(&doc.toc, id_offsets, content_length, diagnostics),
            }
        }
    } else {
        DocumentShape::Book {
            chapters: writer_toc::flatten_book_toc(&doc.toc, id_offsets, content_length, diagnostics),
        }
    };
    let mobi_type = writer_toc::mobi_type_for(&shape, &doc.metadata)?;
    Ok((shape, mobi_type))
}

/// Invariant 3: consecutive chapter/article offsets must abut exactly, or
/// indexing is abandoned for the whole document. Section/periodical
/// marker nodes are not part of this chain.
fn check_continuity(shape: &DocumentShape, diagnostics: &mut Vec<Error>) -> bool {
    let leaves: Vec<&IndexedTocNode> = match shape {
        DocumentShape::Book { chapters } => chapters.iter().collect(),
        DocumentShape::Periodical { sections, .. } => {
            let mut v: Vec<&IndexedTocNode> = sections.iter().flat_map(|s| s.articles.iter()).collect();
            v.sort_by_key(|n| n.offset);
            v
        }
    };
    let mut ok = true;
    for pair in leaves.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.offset + prev.length != next.offset {
            log::warn!(
                "TOC discontinuity between '{}' and '{}', disabling indexing",
                prev.title,
                next.title
            );
            diagnostics.push(Error::TocDiscontinuity {
                prev_title: prev.title.clone(),
                node_title: next.title.clone(),
            });
            ok = false;
        }
    }
    ok
}

/// Assemble a complete classic-MOBI6 container from a normalized document.
///
/// Returns the finished PalmDB byte stream. Only [`Error::ConfigurationError`]
/// ever escapes this function (§7) -- every other diagnostic is logged and
/// downgrades the output instead (unindexed text, or a book-shaped fallback
/// for a nonconforming periodical).
pub fn write_document(doc: &WriterDocument<'_>, config: &WriterConfig) -> Result<Vec<u8>> {
    let mut diagnostics: Vec<Error> = Vec::new();

    let masthead_href = doc.guide.references.get("masthead").map(|s| s.as_str());
    let serialized =
        writer_serializer::serialize_spine(&doc.manifest, &doc.images, &doc.spine, masthead_href);
    for href in &serialized.broken_links {
        log::warn!("broken hyperlink '{href}' left as a zero filepos placeholder");
        diagnostics.push(Error::BrokenHyperlink { href: href.clone() });
    }

    let content_length = serialized.bytes.len();
    let (shape, mobi_type) =
        classify_document(doc, &serialized.id_offsets, content_length, &mut diagnostics)?;
    let is_periodical = mobi_type > 0x100;

    // A periodical missing both `date` and `timestamp` is a hard
    // configuration failure; surface it before any further work.
    let (exth, _uuid) = writer_record0::build_exth(&doc.metadata, is_periodical, config.prefer_author_sort)?;

    let indexable = config.indexing && check_continuity(&shape, &mut diagnostics);

    let text_records = writer_textrecords::split_records(&serialized.bytes);
    let num_records = text_records.len();

    let nav_nodes = writer_htmlrecords::build_nav_nodes(&shape);
    let html_records = if indexable {
        writer_htmlrecords::build_record_map(&nav_nodes, num_records)
    } else {
        Vec::new()
    };

    let (ctoc_entries, ctoc_records): (Vec<CtocEntry>, Vec<Vec<u8>>) = if indexable {
        match &shape {
            DocumentShape::Book { chapters } => writer_ctoc::build_flat_ctoc(chapters),
            DocumentShape::Periodical { .. } => writer_ctoc::build_structured_ctoc(&shape),
        }
    } else {
        (Vec::new(), Vec::new())
    };

    let section_count = match &shape {
        DocumentShape::Periodical { sections, .. } => sections.len() as i64,
        DocumentShape::Book { .. } => 0,
    };

    let mut tbs_state = TbsState::default();
    let mut records: Vec<Vec<u8>> = Vec::with_capacity(num_records + 8);
    records.push(Vec::new()); // record 0 placeholder, filled in last

    for (i, rec) in text_records.iter().enumerate() {
        let is_last = i + 1 == num_records;
        let mut body = config.compressor.compress(&rec.data);
        body.extend_from_slice(&rec.overlap);
        body.push(rec.overlap.len() as u8);

        if config.write_pbreaks {
            let record_start = i * RECORD_SIZE;
            let record_end = record_start + RECORD_SIZE;
            let breaks: Vec<usize> = serialized
                .page_breaks
                .iter()
                .copied()
                .filter(|&pb| pb >= record_start && pb < record_end)
                .collect();
            body.extend(writer_pagebreaks::encode_pagebreaks(&breaks, record_start));
        }

        if indexable {
            let html = &html_records[i];
            let tbs = match &shape {
                DocumentShape::Book { .. } => writer_tbs::generate_book(&mut tbs_state, html, is_last),
                DocumentShape::Periodical { sections, .. } if sections.len() <= 1 => {
                    writer_tbs::generate_flat_periodical(&mut tbs_state, html, is_last)
                }
                DocumentShape::Periodical { .. } => writer_tbs::generate_structured_periodical(
                    &mut tbs_state,
                    html,
                    is_last,
                    section_count,
                ),
            };
            body.extend(tbs);
        }

        records.push(body);
    }

    let last_content_record = num_records as u16;
    let trailing_data_flags: u32 =
        1 | (if indexable { 2 } else { 0 }) | (if config.write_pbreaks { 4 } else { 0 });
    let language_code = mobi_lang::iana_to_mobi_lang(&doc.metadata.language);

    let mut primary_index_record = NULL_U32;
    let mut secondary_index_record = NULL_U32;
    if indexable {
        if let Some(primary) = writer_indx::build_primary_index(
            &shape,
            &ctoc_entries,
            ctoc_records.len(),
            mobi_type,
            language_code,
        ) {
            primary_index_record = records.len() as u32;
            records.push(primary.indx0);
            records.push(primary.indx1);
            for r in ctoc_records {
                records.push(r);
            }
            if is_periodical {
                secondary_index_record = records.len() as u32;
                let secondary = writer_indx::build_secondary_index(language_code);
                records.push(secondary.indx0);
                records.push(secondary.indx1);
            }
        } else {
            log::debug!("no indexable TOC nodes; writing unindexed output");
        }
    }

    let mut flis_record_num = None;
    let mut fcis_record_num = None;
    if config.fcis_flis {
        flis_record_num = Some(records.len() as u32);
        records.push(FLIS_RECORD.to_vec());
        fcis_record_num = Some(records.len() as u32);
        records.push(fcis_record(content_length as u32));
    }
    records.push(EOF_RECORD.to_vec());

    let record0_cfg = Record0Config {
        compression: config.compressor.code(),
        text_length: content_length as u32,
        text_record_count: num_records as u32,
        mobi_type,
        uid: rand::random::<u32>(),
        language_code,
        first_image_record: 0,
        trailing_data_flags,
        primary_index_record,
        secondary_index_record,
        last_content_record,
        fcis_record: fcis_record_num,
        flis_record: flis_record_num,
    };
    records[0] = writer_record0::build_record0(&record0_cfg, &exth, &doc.metadata.title);

    for diagnostic in &diagnostics {
        log::warn!("mobi write diagnostic: {diagnostic}");
    }

    Ok(frame_palmdb(&records, &doc.metadata.title))
}

/// Wrap `records` in a PalmDB container (§6.1): 94-byte header, one 8-byte
/// record-info entry per record, a 2-byte sentinel, then the records
/// themselves concatenated in order.
fn frame_palmdb(records: &[Vec<u8>], title: &str) -> Vec<u8> {
    let nrecords = records.len();
    let mut out = Vec::new();

    let mut name = [0u8; 32];
    let sanitized = writer_record0::sanitize_pdb_title(title);
    let name_bytes = sanitized.as_bytes();
    let n = name_bytes.len().min(31);
    name[..n].copy_from_slice(&name_bytes[..n]);
    out.extend_from_slice(&name);

    out.extend_from_slice(&0u16.to_be_bytes()); // attributes
    out.extend_from_slice(&0u16.to_be_bytes()); // version
    let now = palm_timestamp();
    out.extend_from_slice(&now.to_be_bytes()); // created
    out.extend_from_slice(&now.to_be_bytes()); // modified
    out.extend(std::iter::repeat(0u8).take(32)); // 44..75 reserved
    out.extend_from_slice(b"BOOK");
    out.extend_from_slice(b"MOBI");
    let unique_id_seed = 2 * nrecords as u32 - 1;
    out.extend_from_slice(&unique_id_seed.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // reserved
    out.extend_from_slice(&(nrecords as u16).to_be_bytes());

    debug_assert_eq!(out.len(), PDB_HEADER_LEN);

    let mut offset = PDB_HEADER_LEN + 8 * nrecords + 2;
    for (i, record) in records.iter().enumerate() {
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.push(0x00); // record attributes
        let id = 2 * i as u32;
        out.extend_from_slice(&id.to_be_bytes()[1..4]);
        offset += record.len();
    }
    out.extend_from_slice(&0u16.to_be_bytes()); // sentinel

    for record in records {
        out.extend_from_slice(record);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::writer_config::NoCompression;
    use super::super::writer_model::{
        Creator, Element, Guide, ManifestItem, Node, SpineItem, TocClass, TocNode, WriterMetadata,
    };

    fn sample_doc(mobi_periodical: bool) -> WriterDocument<'static> {
        let mut h1 = Element::new("h1");
        h1.attributes.push(("id".into(), "ch1".into()));
        h1.children.push(Node::Text("Chapter One".into()));
        let mut body = Element::new("body");
        body.children.push(Node::Element(h1));

        let manifest = vec![ManifestItem {
            href: "c1.xhtml".into(),
            media_type: "application/xhtml+xml".into(),
            root: body,
        }];
        let spine = vec![SpineItem {
            href: "c1.xhtml",
            linear: true,
        }];
        let mut toc = TocNode::new("Contents", "");
        toc.children.push(TocNode::new("Chapter One", "c1.xhtml#ch1"));

        WriterDocument {
            manifest,
            images: Vec::new(),
            spine,
            toc,
            guide: Guide::default(),
            metadata: WriterMetadata {
                title: "Sample Book".into(),
                language: "en".into(),
                creators: vec![Creator {
                    name: "Author Name".into(),
                    file_as: None,
                }],
                ..Default::default()
            },
            mobi_periodical,
        }
    }

    #[test]
    fn writes_a_well_formed_palmdb_header() {
        let doc = sample_doc(false);
        let bytes = write_document(&doc, &WriterConfig::new()).unwrap();
        assert_eq!(&bytes[76..80], b"BOOK");
        assert_eq!(&bytes[80..84], b"MOBI");
        let nrecords = u16::from_be_bytes(bytes[92..94].try_into().unwrap()) as usize;
        assert!(nrecords >= 3); // record0, one text record, EOF marker at least
        let record0_offset =
            u32::from_be_bytes(bytes[94..98].try_into().unwrap()) as usize;
        assert_eq!(&bytes[record0_offset + 0x10..record0_offset + 0x14], b"MOBI");
    }

    #[test]
    fn uncompressed_config_round_trips_text() {
        let doc = sample_doc(false);
        let config = WriterConfig::new().with_compressor(Box::new(NoCompression));
        let bytes = write_document(&doc, &config).unwrap();
        let record0_offset =
            u32::from_be_bytes(bytes[94..98].try_into().unwrap()) as usize;
        assert_eq!(
            u16::from_be_bytes(bytes[record0_offset..record0_offset + 2].try_into().unwrap()),
            writer_record0::UNCOMPRESSED
        );
    }

    #[test]
    fn periodical_without_date_is_a_configuration_error() {
        let mut doc = sample_doc(true);
        doc.guide.references.insert("masthead".into(), "mh.jpg".into());
        doc.toc.klass = Some(TocClass::Periodical);
        let mut section = TocNode::new("Section A", "c1.xhtml");
        section.klass = Some(TocClass::Section);
        let mut article = TocNode::new("Article One", "c1.xhtml#ch1");
        article.klass = Some(TocClass::Article);
        section.children.push(article);
        doc.toc.children = vec![section];

        let err = write_document(&doc, &WriterConfig::new()).unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));
    }

    #[test]
    fn gap_between_chapters_fails_continuity_check() {
        let chapter = |title: &str, offset: usize, length: usize| IndexedTocNode {
            title: title.into(),
            href: String::new(),
            klass: TocClass::Chapter,
            author: None,
            description: None,
            offset,
            length,
        };
        let shape = DocumentShape::Book {
            chapters: vec![chapter("One", 0, 10), chapter("Two", 20, 10)],
        };
        let mut diagnostics = Vec::new();
        assert!(!check_continuity(&shape, &mut diagnostics));
        assert!(matches!(diagnostics[0], Error::TocDiscontinuity { .. }));
    }

    #[test]
    fn contiguous_chapters_pass_continuity_check() {
        let chapter = |title: &str, offset: usize, length: usize| IndexedTocNode {
            title: title.into(),
            href: String::new(),
            klass: TocClass::Chapter,
            author: None,
            description: None,
            offset,
            length,
        };
        let shape = DocumentShape::Book {
            chapters: vec![chapter("One", 0, 10), chapter("Two", 10, 10)],
        };
        let mut diagnostics = Vec::new();
        assert!(check_continuity(&shape, &mut diagnostics));
        assert!(diagnostics.is_empty());
    }
}
