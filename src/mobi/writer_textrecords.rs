//! Component C: splits the serialized text stream into `RECORD_SIZE`
//! chunks on safe UTF-8 boundaries, borrowing a few bytes from the start
//! of the following record whenever a record would otherwise end
//! mid-codepoint.
//!
//! Ground truth (`_read_text_record`): each record's body is exactly
//! `RECORD_SIZE` bytes (the last record may be shorter); if the body ends
//! mid code point, the bytes needed to complete that code point are
//! duplicated from the following content as `overlap` and appended to the
//! record uncompressed, rather than being excluded from the body itself.

pub const RECORD_SIZE: usize = 0x1000;
/// Max bytes a UTF-8 continuation run can need beyond a record boundary.
const MAX_OVERLAP: usize = 3;

pub struct TextRecord {
    pub data: Vec<u8>,
    pub overlap: Vec<u8>,
}

/// Split `content` into `RECORD_SIZE`-bounded records, each carrying the
/// overlap bytes (if any) needed to complete its final code point.
pub fn split_records(content: &[u8]) -> Vec<TextRecord> {
    if content.is_empty() {
        return vec![TextRecord {
            data: Vec::new(),
            overlap: Vec::new(),
        }];
    }

    let mut records = Vec::new();
    let mut pos = 0;
    while pos < content.len() {
        let end = (pos + RECORD_SIZE).min(content.len());
        let body = &content[pos..end];
        let overlap = if end < content.len() {
            split_overlap(body, &content[end..])
        } else {
            Vec::new()
        };
        records.push(TextRecord {
            data: body.to_vec(),
            overlap,
        });
        pos = end;
    }
    records
}

fn is_continuation(b: u8) -> bool {
    b & 0xc0 == 0x80
}

/// Find the minimal `0..=MAX_OVERLAP` prefix of `follow` that, appended to
/// `body`'s trailing (possibly partial) code point, yields valid UTF-8.
pub(super) fn split_overlap(body: &[u8], follow: &[u8]) -> Vec<u8> {
    if body.is_empty() {
        return Vec::new();
    }
    let mut start = body.len() - 1;
    let mut steps = 0;
    while steps < MAX_OVERLAP && start > 0 && is_continuation(body[start]) {
        start -= 1;
        steps += 1;
    }

    let max_k = MAX_OVERLAP.min(follow.len());
    for k in 0..=max_k {
        let mut candidate = body[start..].to_vec();
        candidate.extend_from_slice(&follow[..k]);
        if std::str::from_utf8(&candidate).is_ok() {
            return follow[..k].to_vec();
        }
    }
    follow[..max_k].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_splits_on_exact_boundary() {
        let content = vec![b'a'; RECORD_SIZE * 2 + 10];
        let records = split_records(&content);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].data.len(), RECORD_SIZE);
        assert!(records[0].overlap.is_empty());
        assert_eq!(records[2].data.len(), 10);
    }

    #[test]
    fn multibyte_char_straddling_boundary_borrows_one_byte() {
        let mut content = vec![b'x'; RECORD_SIZE - 1];
        content.extend_from_slice("\u{00e9}".as_bytes()); // 2-byte char, split 1/1
        content.extend_from_slice(b"more text after boundary");
        let records = split_records(&content);
        assert_eq!(records[0].data.len(), RECORD_SIZE);
        assert_eq!(records[0].overlap.len(), 1);

        let mut reconstructed = records[0].data.clone();
        reconstructed.extend_from_slice(&records[0].overlap);
        assert!(std::str::from_utf8(&reconstructed).is_ok());

        // Bodies alone (without overlap) reconstruct the original content,
        // since overlap bytes are duplicated ahead rather than consumed.
        let mut all_data = Vec::new();
        for r in &records {
            all_data.extend_from_slice(&r.data);
        }
        assert_eq!(all_data, content);
    }

    #[test]
    fn three_byte_char_split_after_lead_byte_borrows_two_bytes() {
        let mut content = vec![b'x'; RECORD_SIZE - 1];
        content.extend_from_slice("\u{20ac}".as_bytes()); // 3-byte euro sign
        content.extend_from_slice(b"trailer");
        let records = split_records(&content);
        assert_eq!(records[0].overlap.len(), 2);
    }

    #[test]
    fn empty_content_yields_one_empty_record() {
        let records = split_records(&[]);
        assert_eq!(records.len(), 1);
        assert!(records[0].data.is_empty());
        assert!(records[0].overlap.is_empty());
    }
}
