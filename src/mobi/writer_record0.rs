//! Component J: the Record 0 assembler -- PalmDOC header, MOBI header,
//! EXTH metadata block, and title, at the byte-exact offsets the reader
//! expects. Runs last, once every other record's final position is known.
//!
//! Ground truth: `_generate_mobi_header`, `_generate_exth`.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::writer_model::WriterMetadata;

pub const HEADER_LEN: u32 = 0xe8;
pub const UNCOMPRESSED: u16 = 1;
pub const PALMDOC: u16 = 2;

const NULL_U32: u32 = 0xFFFF_FFFF;

/// EXTH record codes used by this writer (§6.5). Not exhaustive of the
/// format -- only the codes this crate ever emits.
mod exth_code {
    pub const CREATOR: u32 = 100;
    pub const PUBLISHER: u32 = 101;
    pub const DESCRIPTION: u32 = 103;
    pub const IDENTIFIER: u32 = 104;
    pub const SUBJECT: u32 = 105;
    pub const PUBDATE: u32 = 106;
    pub const CONTRIBUTOR: u32 = 108;
    pub const RIGHTS: u32 = 109;
    pub const TYPE: u32 = 111;
    pub const SOURCE: u32 = 112;
    pub const UUID_ASIN: u32 = 113;
    pub const CDE_TYPE: u32 = 501;
    pub const TITLE: u32 = 503;
}

/// Collapse runs of ASCII/Unicode whitespace to a single space and trim
/// the ends, mirroring the original source's `COLLAPSE_RE`.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

fn join_names(names: &[String]) -> String {
    names.join("; ")
}

struct ExthBuilder {
    records: Vec<(u32, Vec<u8>)>,
}

impl ExthBuilder {
    fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    fn push(&mut self, code: u32, data: impl Into<Vec<u8>>) {
        self.records.push((code, data.into()));
    }

    fn push_str(&mut self, code: u32, s: &str) {
        if !s.is_empty() {
            self.push(code, collapse_whitespace(s).into_bytes());
        }
    }

    fn finish(self) -> Vec<u8> {
        let mut body = Vec::new();
        for (code, data) in &self.records {
            body.extend_from_slice(&code.to_be_bytes());
            body.extend_from_slice(&(8 + data.len() as u32).to_be_bytes());
            body.extend_from_slice(data);
        }
        let record_count = self.records.len() as u32;
        let mut out = Vec::with_capacity(12 + body.len());
        out.extend_from_slice(b"EXTH");
        out.extend_from_slice(&(12 + body.len() as u32).to_be_bytes());
        out.extend_from_slice(&record_count.to_be_bytes());
        out.extend_from_slice(&body);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }
}

/// Build the EXTH metadata block (§4.J, §6.5).
///
/// Returns `Err(ConfigurationError::MissingDate)` when `is_periodical` and
/// neither `date` nor `timestamp` is present -- callers must surface this
/// before the write proceeds any further (§7).
pub fn build_exth(
    metadata: &WriterMetadata,
    is_periodical: bool,
    prefer_author_sort: bool,
) -> Result<(Vec<u8>, String)> {
    if is_periodical && metadata.date.is_none() && metadata.timestamp.is_none() {
        return Err(Error::ConfigurationError(
            "periodical metadata requires a date or timestamp".into(),
        ));
    }

    let mut b = ExthBuilder::new();

    if !metadata.creators.is_empty() {
        let names: Vec<String> = metadata
            .creators
            .iter()
            .map(|c| {
                if prefer_author_sort {
                    c.file_as.clone().unwrap_or_else(|| c.name.clone())
                } else {
                    c.name.clone()
                }
            })
            .collect();
        b.push_str(exth_code::CREATOR, &join_names(&names));
    }
    if let Some(publisher) = &metadata.publisher {
        b.push_str(exth_code::PUBLISHER, publisher);
    }
    if let Some(description) = &metadata.description {
        b.push_str(exth_code::DESCRIPTION, description);
    }
    for (scheme, value) in &metadata.identifiers {
        if scheme.eq_ignore_ascii_case("isbn") {
            let isbn = value.strip_prefix("urn:isbn:").unwrap_or(value);
            b.push_str(exth_code::IDENTIFIER, isbn);
        }
    }
    for subject in &metadata.subjects {
        b.push_str(exth_code::SUBJECT, subject);
    }
    if let Some(date) = metadata.date.as_ref().or(metadata.timestamp.as_ref()) {
        b.push_str(exth_code::PUBDATE, date);
    }
    if !metadata.contributors.is_empty() {
        let names: Vec<String> = metadata
            .contributors
            .iter()
            .map(|c| c.name.clone())
            .collect();
        b.push_str(exth_code::CONTRIBUTOR, &join_names(&names));
    }
    if let Some(rights) = &metadata.rights {
        b.push_str(exth_code::RIGHTS, rights);
    }
    if let Some(publication_type) = &metadata.publication_type {
        b.push_str(exth_code::TYPE, publication_type);
    }
    if let Some(source) = &metadata.source {
        b.push_str(exth_code::SOURCE, source);
    }

    let uuid_value = metadata
        .identifiers
        .iter()
        .find(|(scheme, _)| scheme.eq_ignore_ascii_case("uuid"))
        .map(|(_, value)| {
            value
                .strip_prefix("urn:uuid:")
                .unwrap_or(value.as_str())
                .to_string()
        })
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    b.push_str(exth_code::UUID_ASIN, &uuid_value);

    if !is_periodical {
        b.push(exth_code::CDE_TYPE, b"EBOK".to_vec());
    }
    b.push_str(exth_code::TITLE, &metadata.title);

    Ok((b.finish(), uuid_value))
}

/// Sanitize a title for the 31-byte PDB database name field: ASCII
/// alphanumerics pass through, everything else becomes `_`, truncated.
pub fn sanitize_pdb_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(31)
        .collect()
}

/// Finalized layout facts the orchestrator has determined only after
/// every other record has been assembled.
pub struct Record0Config {
    pub compression: u16,
    pub text_length: u32,
    pub text_record_count: u32,
    pub mobi_type: u32,
    pub uid: u32,
    pub language_code: u32,
    pub first_image_record: u32,
    pub trailing_data_flags: u32,
    pub primary_index_record: u32,
    pub secondary_index_record: u32,
    pub last_content_record: u16,
    pub fcis_record: Option<u32>,
    pub flis_record: Option<u32>,
}

fn be16(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}
fn be32(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}

/// Assemble Record 0: PalmDOC header + MOBI header + EXTH + title + 8 KiB
/// zero pad (§4.J, §6.2).
pub fn build_record0(cfg: &Record0Config, exth: &[u8], title: &str) -> Vec<u8> {
    let mut h = vec![0u8; 0xf8];

    // PalmDOC header (0x00..0x10).
    h[0x00..0x02].copy_from_slice(&be16(cfg.compression));
    h[0x02..0x04].copy_from_slice(&be16(0));
    h[0x04..0x08].copy_from_slice(&be32(cfg.text_length));
    h[0x08..0x0a].copy_from_slice(&be16((cfg.text_record_count.saturating_sub(1)) as u16));
    h[0x0a..0x0c].copy_from_slice(&be16(0x1000));
    h[0x0c..0x10].copy_from_slice(&be32(0));

    // MOBI header (0x10..0xf8).
    h[0x10..0x14].copy_from_slice(b"MOBI");
    h[0x14..0x18].copy_from_slice(&be32(HEADER_LEN));
    h[0x18..0x1c].copy_from_slice(&be32(cfg.mobi_type));
    h[0x1c..0x20].copy_from_slice(&be32(65001));
    h[0x20..0x24].copy_from_slice(&be32(cfg.uid));
    h[0x24..0x28].copy_from_slice(&be32(6));
    h[0x28..0x30].fill(0xff);
    h[0x30..0x34].copy_from_slice(&be32(cfg.secondary_index_record));
    h[0x34..0x50].fill(0xff);
    h[0x50..0x54].copy_from_slice(&be32(cfg.text_record_count + 1));
    let title_offset = HEADER_LEN + 16 + exth.len() as u32;
    h[0x54..0x58].copy_from_slice(&be32(title_offset));
    h[0x58..0x5c].copy_from_slice(&be32(title.len() as u32));
    h[0x5c..0x60].copy_from_slice(&be32(cfg.language_code));
    // 0x60..0x68 zero (dict-in/out language).
    h[0x68..0x6c].copy_from_slice(&be32(6));
    h[0x6c..0x70].copy_from_slice(&be32(cfg.first_image_record));
    // 0x70..0x80 zero (HUFF/DATP slots).
    h[0x80..0x84].copy_from_slice(&be32(0x50));
    // 0x84..0xa4 zero.
    h[0xa4..0xa8].copy_from_slice(&be32(NULL_U32));
    h[0xa8..0xac].copy_from_slice(&be32(NULL_U32));
    // 0xac..0xb4 zero (drm flags / 2 reserved u32s).
    // 0xb4..0xc0 zero.
    h[0xc0..0xc2].copy_from_slice(&be16(1));
    h[0xc2..0xc4].copy_from_slice(&be16(cfg.last_content_record));
    h[0xc4..0xc8].copy_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    h[0xc8..0xcc].copy_from_slice(&be32(cfg.fcis_record.unwrap_or(NULL_U32)));
    h[0xcc..0xd0].copy_from_slice(&be32(if cfg.fcis_record.is_some() { 1 } else { NULL_U32 }));
    h[0xd0..0xd4].copy_from_slice(&be32(cfg.flis_record.unwrap_or(NULL_U32)));
    h[0xd4..0xd8].copy_from_slice(&be32(if cfg.flis_record.is_some() { 1 } else { NULL_U32 }));
    // 0xd8..0xe0 zero.
    h[0xe0..0xe4].copy_from_slice(&be32(NULL_U32));
    h[0xe4..0xe8].copy_from_slice(&be32(0));
    h[0xe8..0xec].copy_from_slice(&be32(NULL_U32));
    h[0xec..0xf0].copy_from_slice(&be32(NULL_U32));
    h[0xf0..0xf4].copy_from_slice(&be32(cfg.trailing_data_flags));
    h[0xf4..0xf8].copy_from_slice(&be32(cfg.primary_index_record));

    h.extend_from_slice(exth);
    h.extend_from_slice(title.as_bytes());
    h.extend(std::iter::repeat(0u8).take(8192));
    h
}

/// Unused placeholder, kept so callers building a `HashMap` of diagnostics
/// can be typed against this module without an extra import elsewhere.
#[allow(dead_code)]
pub type Diagnostics = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobi::writer_model::Creator;

    #[test]
    fn sanitizes_non_ascii_title() {
        // Non-ASCII code points are dropped outright (not substituted),
        // so "\u{dc}ber" ("\u{dc}ber") loses its leading U-umlaut entirely.
        assert_eq!(sanitize_pdb_title("\u{dc}ber"), "ber");
    }

    #[test]
    fn replaces_non_alphanumeric_ascii_with_underscore() {
        assert_eq!(sanitize_pdb_title("My Book: Vol. 2"), "My_Book__Vol__2");
    }

    #[test]
    fn record0_offsets_match_spec() {
        let cfg = Record0Config {
            compression: PALMDOC,
            text_length: 0x1800,
            text_record_count: 3,
            mobi_type: 0x002,
            uid: 0x1234_5678,
            language_code: 0x09,
            first_image_record: 0,
            trailing_data_flags: 1,
            primary_index_record: NULL_U32,
            secondary_index_record: NULL_U32,
            last_content_record: 3,
            fcis_record: None,
            flis_record: None,
        };
        let record0 = build_record0(&cfg, &[], "T");
        assert_eq!(&record0[0x10..0x14], b"MOBI");
        assert_eq!(u32::from_be_bytes(record0[0x14..0x18].try_into().unwrap()), 0xe8);
        assert_eq!(u32::from_be_bytes(record0[0x50..0x54].try_into().unwrap()), 4);
        assert_eq!(u32::from_be_bytes(record0[0xf0..0xf4].try_into().unwrap()), 1);
    }

    #[test]
    fn periodical_without_date_is_configuration_error() {
        let metadata = WriterMetadata {
            title: "News".into(),
            ..Default::default()
        };
        let err = build_exth(&metadata, true, false).unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));
    }

    #[test]
    fn author_sort_prefers_file_as() {
        let metadata = WriterMetadata {
            title: "T".into(),
            creators: vec![Creator {
                name: "Jane Doe".into(),
                file_as: Some("Doe, Jane".into()),
            }],
            language: "en".into(),
            ..Default::default()
        };
        let (exth, _) = build_exth(&metadata, false, true).unwrap();
        let text = String::from_utf8_lossy(&exth);
        assert!(text.contains("Doe, Jane"));
    }
}
