//! Component H: the trailing byte sequence (TBS) generator -- the densest
//! part of the format. One state machine per `mobi_type`, called once per
//! text record in document order; each carries a little running state
//! across calls (`initial_index_record_found`, `first_section_concluded`).
//!
//! Ground truth: `_generate_tbs_book`, `_generate_tbs_flat_periodical`,
//! `_generate_tbs_structured_periodical`. All three emit forward-VWI
//! fields exclusively, terminated by a forward VWI self-describing the
//! total sequence length (including itself).

use super::vwi::{self, Direction::Forward};
use super::writer_htmlrecords::{HtmlRecordData, UNSET};

/// Mutable state threaded across successive calls to a single TBS
/// generator for one document.
#[derive(Debug, Default)]
pub struct TbsState {
    initial_index_record_found: bool,
    first_section_concluded: bool,
}

fn fw(v: i64) -> Vec<u8> {
    vwi::encode(v as u32, Forward)
}

fn node_count_byte(count: i64) -> u8 {
    if count == 0 { 0x80 } else { count as u8 }
}

fn finish(mut seq: Vec<u8>) -> Vec<u8> {
    let closing = fw(seq.len() as i64 + 1);
    seq.extend_from_slice(&closing);
    seq
}

/// Book (`mobi_type = 0x002`): a flat chapter list, no sections.
pub fn generate_book(state: &mut TbsState, rec: &HtmlRecordData, is_last: bool) -> Vec<u8> {
    if !state.initial_index_record_found {
        if rec.current_section_node_count == UNSET {
            return fw(1);
        }
        state.initial_index_record_found = true;
        let tbs_type: i64 = if rec.current_section_node_count == 1 { 2 } else { 6 };
        let mut seq = fw(tbs_type);
        seq.extend(fw(0));
        if tbs_type != 2 {
            seq.push(node_count_byte(rec.current_section_node_count));
        }
        return finish(seq);
    }

    let mut node_count = rec.current_section_node_count;
    let tbs_type: i64 = if is_last && node_count == 1 {
        2
    } else if rec.continuing_node > 0 && rec.opening_node == UNSET {
        node_count = 0x80;
        3
    } else {
        6
    };
    let shifted = (rec.continuing_node << 3) | tbs_type;
    let mut seq = fw(shifted);
    seq.extend(fw(0));
    if tbs_type != 2 {
        seq.push(node_count_byte(node_count));
    }
    finish(seq)
}

/// Flat periodical (`mobi_type = 0x102`): one section covers every
/// article, so no section-switch form is ever needed.
pub fn generate_flat_periodical(state: &mut TbsState, rec: &HtmlRecordData, is_last: bool) -> Vec<u8> {
    if !state.initial_index_record_found {
        if rec.current_section_node_count == UNSET {
            return fw(1);
        }
        state.initial_index_record_found = true;
        let mut seq = fw(6);
        seq.extend(fw(0));
        // +2 compensates for the periodical and section marker nodes,
        // which never get their own `node_index` and so aren't counted.
        seq.push(node_count_byte(rec.current_section_node_count + 2));
        return finish(seq);
    }

    if is_last && rec.current_section_node_count == 1 {
        let mut seq = fw(6);
        seq.extend(fw(0));
        seq.push(2);
        let arg3 = ((rec.continuing_node + 1) << 4) | 0;
        seq.extend(fw(arg3));
        return finish(seq);
    }

    if rec.continuing_node > 0 && rec.opening_node == UNSET {
        let mut seq = fw(6);
        seq.extend(fw(0));
        seq.push(2);
        let arg3 = ((rec.continuing_node + rec.continuing_node_parent + 1) << 4) | 1;
        seq.extend(fw(arg3));
        seq.push(node_count_byte(0x80));
        return finish(seq);
    }

    let mut seq = fw(7);
    seq.extend(fw(0));
    seq.push(2);
    seq.extend(fw(0));
    let arg4 = ((rec.continuing_node + rec.continuing_node_parent + 1) << 4) | 4;
    seq.extend(fw(arg4));
    seq.push(node_count_byte(rec.current_section_node_count));
    finish(seq)
}

/// Structured periodical (`mobi_type = 0x101`/`0x103`): one or more
/// sections, each with its own articles. `section_count` is the
/// document's total section count (fixed for the whole write, computed
/// once while the CTOC is built).
pub fn generate_structured_periodical(
    state: &mut TbsState,
    rec: &HtmlRecordData,
    is_last: bool,
    section_count: i64,
) -> Vec<u8> {
    if !state.initial_index_record_found {
        if rec.current_section_node_count == UNSET {
            return fw(1);
        }
        state.initial_index_record_found = true;
        let mut seq = fw(6);
        seq.extend(fw(0));
        seq.push(2);
        let arg3 = (section_count << 4) | 0x04;
        seq.extend(fw(arg3));
        seq.push(node_count_byte(rec.current_section_node_count));
        return finish(seq);
    }

    if !state.first_section_concluded {
        if rec.next_section_number == UNSET {
            if is_last && rec.current_section_node_count == 1 {
                let mut seq = fw(6);
                seq.extend(fw(0));
                seq.push(2);
                let arg3 = ((section_count + rec.continuing_node) << 4) | 0x04;
                seq.extend(fw(arg3));
                seq.push(node_count_byte(rec.current_section_node_count));
                return finish(seq);
            }
            if rec.continuing_node > 0 && rec.opening_node == UNSET {
                let mut seq = fw(6);
                seq.extend(fw(0));
                seq.push(2);
                let arg3 = ((section_count + rec.continuing_node) << 4) | 1;
                seq.extend(fw(arg3));
                seq.push(node_count_byte(0x80));
                return finish(seq);
            }
            let mut seq = fw(7);
            seq.extend(fw(0));
            seq.push(2);
            seq.extend(fw(0));
            let arg4 = ((section_count + rec.continuing_node) << 4) | 4;
            seq.extend(fw(arg4));
            seq.push(node_count_byte(rec.current_section_node_count));
            return finish(seq);
        }
        let seq = section_switch(rec, section_count);
        state.first_section_concluded = true;
        return seq;
    }

    if rec.next_section_number == UNSET {
        let mut seq = fw(2);
        seq.extend(fw(0));
        let mut arg2 = (rec.continuing_node_parent + 1) << 4;
        let arg2_has_nodes = rec.current_section_node_count > 0;
        if arg2_has_nodes {
            arg2 |= 1;
        }
        seq.extend(fw(arg2));
        if arg2_has_nodes {
            seq.extend(fw(0));
        }

        let mut arg3 = (section_count - rec.continuing_node_parent + rec.continuing_node) << 4;
        let arg3_flags: i64 = if rec.current_section_node_count > 0 { 4 } else { 1 };
        arg3 |= arg3_flags;
        seq.extend(fw(arg3));
        if arg3_flags == 4 {
            seq.push(node_count_byte(rec.current_section_node_count));
        } else {
            seq.extend(fw(0));
        }
        return finish(seq);
    }

    section_switch(rec, section_count)
}

/// The six/seven-argument section-switch TBS (type 3), shared by the
/// "conclude the first section" transition and every later section
/// boundary once `first_section_concluded` is set.
fn section_switch(rec: &HtmlRecordData, section_count: i64) -> Vec<u8> {
    let mut seq = fw(3);
    seq.extend(fw(0));
    seq.extend(fw(0));

    let arg3 = (rec.continuing_node_parent + 1) << 4;
    seq.extend(fw(arg3));

    let section_base = rec.continuing_node_parent;
    let section_delta = section_count - section_base - 1;
    let article_offset = rec.continuing_node + 1;
    let mut arg4 = (section_delta + article_offset) << 4;
    let arg4_flags: i64 = if rec.current_section_node_count > 1 { 4 } else { 0 };
    arg4 |= arg4_flags;
    seq.extend(fw(arg4));
    if arg4_flags == 4 {
        seq.push(node_count_byte(rec.current_section_node_count));
    }

    let mut arg5 = section_delta + article_offset;
    if rec.current_section_node_count < 2 {
        arg5 -= 1;
    }
    arg5 = (arg5 << 4) | 8;
    seq.extend(fw(arg5));

    let mut arg6 = (section_delta + rec.next_section_opening_node) << 4;
    let arg6_flags: i64 = if rec.next_section_node_count > 1 { 4 } else { 0 };
    arg6 |= arg6_flags;
    seq.extend(fw(arg6));
    if arg6_flags == 4 {
        seq.push(node_count_byte(rec.next_section_node_count));
    }

    finish(seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> HtmlRecordData {
        HtmlRecordData::default()
    }

    #[test]
    fn book_no_data_is_length_one() {
        let mut state = TbsState::default();
        let seq = generate_book(&mut state, &rec(), false);
        assert_eq!(seq, vec![0x81]);
    }

    #[test]
    fn book_first_singleton_is_type_two() {
        let mut state = TbsState::default();
        let mut r = rec();
        r.opening_node = 0;
        r.current_section_node_count = 1;
        let seq = generate_book(&mut state, &r, false);
        // type(2), arg1(0x80), len(3)
        assert_eq!(seq, vec![2 | 0x80, 0x80, 3 | 0x80]);
        assert!(state.initial_index_record_found);
    }

    #[test]
    fn book_first_multi_is_type_six_with_node_count() {
        let mut state = TbsState::default();
        let mut r = rec();
        r.opening_node = 0;
        r.current_section_node_count = 3;
        let seq = generate_book(&mut state, &r, false);
        assert_eq!(seq, vec![6 | 0x80, 0x80, 3, 4 | 0x80]);
    }

    #[test]
    fn book_span_only_record_is_type_three() {
        let mut state = TbsState {
            initial_index_record_found: true,
            ..Default::default()
        };
        let mut r = rec();
        r.continuing_node = 1;
        r.opening_node = UNSET;
        r.current_section_node_count = 1;
        let seq = generate_book(&mut state, &r, false);
        let shifted = (1i64 << 3) | 3;
        assert_eq!(seq[0], (shifted as u8) | 0x80);
        assert_eq!(*seq.last().unwrap() & 0x80, 0x80);
    }

    #[test]
    fn flat_periodical_first_record_adds_two_to_node_count() {
        let mut state = TbsState::default();
        let mut r = rec();
        r.opening_node = 0;
        r.current_section_node_count = 3;
        let seq = generate_flat_periodical(&mut state, &r, false);
        assert_eq!(seq, vec![6 | 0x80, 0x80, 5, 4 | 0x80]);
    }

    #[test]
    fn structured_periodical_first_record_uses_section_count_shift() {
        let mut state = TbsState::default();
        let mut r = rec();
        r.opening_node = 0;
        r.current_section_node_count = 2;
        let seq = generate_structured_periodical(&mut state, &r, false, 2);
        // type 6, arg1=0, arg2=2, arg3=((2<<4)|4)=0x24, nodeCount=2, len
        assert_eq!(seq[0], 6 | 0x80);
        assert_eq!(seq[2], 2);
    }

    #[test]
    fn section_switch_sets_first_section_concluded() {
        let mut state = TbsState {
            initial_index_record_found: true,
            ..Default::default()
        };
        let mut r = rec();
        r.continuing_node_parent = 0;
        r.continuing_node = 0;
        r.current_section_node_count = 1;
        r.next_section_number = 1;
        r.next_section_opening_node = 2;
        r.next_section_node_count = 1;
        let seq = generate_structured_periodical(&mut state, &r, false, 2);
        assert_eq!(seq[0], 3 | 0x80);
        assert!(state.first_section_concluded);
    }

    #[test]
    fn every_emitted_sequence_is_self_describing() {
        let mut state = TbsState::default();
        let mut r = rec();
        r.opening_node = 0;
        r.current_section_node_count = 1;
        let seq = generate_book(&mut state, &r, false);
        let (len, _) = vwi::decode_forward(&[*seq.last().unwrap()]);
        assert_eq!(len as usize, seq.len());
    }
}
