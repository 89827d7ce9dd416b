//! Component G: per-text-record indexing scratch state, describing which
//! TOC nodes open, continue, or close within each record's byte span.
//!
//! Ground truth: `HTMLRecordData`, `_generate_flat_indexed_navpoints`,
//! `_generate_indexed_navpoints`. Per the Design Notes, the getter/setter
//! property wrapping collapses to plain fields; `-1` remains the sentinel
//! for "unset" since the TBS generator (component H) does arithmetic
//! directly against these values the way the original does.

use super::writer_textrecords::RECORD_SIZE;
use super::writer_toc::DocumentShape;

pub const UNSET: i64 = -1;

#[derive(Debug, Clone, Copy)]
pub struct HtmlRecordData {
    pub continuing_node: i64,
    pub continuing_node_parent: i64,
    pub opening_node: i64,
    pub opening_node_parent: i64,
    pub current_section_node_count: i64,
    pub next_section_number: i64,
    pub next_section_opening_node: i64,
    pub next_section_node_count: i64,
}

impl Default for HtmlRecordData {
    fn default() -> Self {
        Self {
            continuing_node: UNSET,
            continuing_node_parent: UNSET,
            opening_node: UNSET,
            opening_node_parent: UNSET,
            current_section_node_count: UNSET,
            next_section_number: UNSET,
            next_section_opening_node: UNSET,
            next_section_node_count: UNSET,
        }
    }
}

/// A node to be distributed across the per-record map: its allocated
/// document-structure index (component I), parent index (section's
/// periodical, or article's section), and content span.
#[derive(Debug, Clone, Copy)]
pub struct NavNode {
    pub index: u32,
    pub parent_index: Option<u32>,
    pub offset: usize,
    pub length: usize,
    /// True for periodical/section marker nodes, whose span start also
    /// signals an upcoming section switch to the structured TBS machine.
    pub is_section_marker: bool,
    pub section_number: Option<u32>,
}

fn record_span(offset: usize, length: usize, num_records: usize) -> (usize, usize) {
    let start = (offset / RECORD_SIZE).min(num_records.saturating_sub(1));
    let end_raw = if length == 0 {
        offset
    } else {
        offset + length - 1
    };
    let end = (end_raw / RECORD_SIZE).min(num_records.saturating_sub(1));
    (start, end.max(start))
}

/// Build the flat list of [`NavNode`]s for a classified document shape
/// (ground truth `_generate_flat_indexed_navpoints` /
/// `_generate_indexed_navpoints`). Per invariant 5, `node.index` for a
/// chapter/article counts only article/chapter nodes; a section/periodical
/// marker's `index` is instead its section ordinal (1-based), shared with
/// the `parent_index` its articles carry.
pub fn build_nav_nodes(shape: &DocumentShape) -> Vec<NavNode> {
    match shape {
        DocumentShape::Book { chapters } => chapters
            .iter()
            .enumerate()
            .map(|(i, c)| NavNode {
                index: i as u32,
                parent_index: None,
                offset: c.offset,
                length: c.length,
                is_section_marker: false,
                section_number: None,
            })
            .collect(),
        DocumentShape::Periodical { sections, .. } => {
            let mut nodes = Vec::new();
            let mut node_index = 0u32;
            for (si, section) in sections.iter().enumerate() {
                let section_id = (si + 1) as u32;
                nodes.push(NavNode {
                    index: section_id,
                    parent_index: None,
                    offset: section.node.offset,
                    length: section.node.length,
                    is_section_marker: true,
                    section_number: Some(section_id),
                });
                for article in &section.articles {
                    nodes.push(NavNode {
                        index: node_index,
                        parent_index: Some(section_id),
                        offset: article.offset,
                        length: article.length,
                        is_section_marker: false,
                        section_number: None,
                    });
                    node_index += 1;
                }
            }
            nodes.sort_by_key(|n| n.offset);
            nodes
        }
    }
}

/// Distribute `nodes` (already sorted in document order) across
/// `num_records` [`HtmlRecordData`] slots.
pub fn build_record_map(nodes: &[NavNode], num_records: usize) -> Vec<HtmlRecordData> {
    let mut records = vec![HtmlRecordData::default(); num_records.max(1)];

    for node in nodes {
        let (start, end) = record_span(node.offset, node.length, records.len());

        {
            let rec = &mut records[start];
            if node.is_section_marker {
                rec.next_section_number = node.section_number.unwrap_or(0) as i64;
                rec.next_section_opening_node = node.index as i64;
                rec.next_section_node_count = 1;
            } else {
                if rec.opening_node == UNSET {
                    rec.opening_node = node.index as i64;
                    if let Some(parent) = node.parent_index {
                        rec.opening_node_parent = parent as i64;
                    }
                } else {
                    rec.continuing_node = node.index as i64;
                    if let Some(parent) = node.parent_index {
                        rec.continuing_node_parent = parent as i64;
                    }
                }
                rec.current_section_node_count = if rec.current_section_node_count < 0 {
                    1
                } else {
                    rec.current_section_node_count + 1
                };
            }
        }

        if node.is_section_marker {
            continue;
        }

        for r in (start + 1)..=end {
            let rec = &mut records[r];
            rec.continuing_node = node.index as i64;
            if let Some(parent) = node.parent_index {
                rec.continuing_node_parent = parent as i64;
            }
            if rec.current_section_node_count < 0 {
                rec.current_section_node_count = 1;
            }
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::writer_toc::{IndexedTocNode, PeriodicalSection};
    use super::super::writer_model::TocClass;

    fn leaf(title: &str, klass: TocClass, offset: usize, length: usize) -> IndexedTocNode {
        IndexedTocNode {
            title: title.into(),
            href: String::new(),
            klass,
            author: None,
            description: None,
            offset,
            length,
        }
    }

    #[test]
    fn periodical_nav_nodes_number_articles_across_sections() {
        let shape = DocumentShape::Periodical {
            root: leaf("Daily", TocClass::Periodical, 0, 300),
            sections: vec![
                PeriodicalSection {
                    node: leaf("Section A", TocClass::Section, 0, 200),
                    articles: vec![
                        leaf("A1", TocClass::Article, 0, 100),
                        leaf("A2", TocClass::Article, 100, 100),
                    ],
                },
                PeriodicalSection {
                    node: leaf("Section B", TocClass::Section, 200, 100),
                    articles: vec![leaf("B1", TocClass::Article, 200, 100)],
                },
            ],
        };
        let nodes = build_nav_nodes(&shape);
        let articles: Vec<&NavNode> = nodes.iter().filter(|n| !n.is_section_marker).collect();
        assert_eq!(articles.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(articles[2].parent_index, Some(2));
        let markers: Vec<&NavNode> = nodes.iter().filter(|n| n.is_section_marker).collect();
        assert_eq!(markers.iter().map(|n| n.index).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn single_chapter_within_one_record_is_opening_only() {
        let nodes = [NavNode {
            index: 0,
            parent_index: None,
            offset: 10,
            length: 100,
            is_section_marker: false,
            section_number: None,
        }];
        let map = build_record_map(&nodes, 1);
        assert_eq!(map[0].opening_node, 0);
        assert_eq!(map[0].current_section_node_count, 1);
    }

    #[test]
    fn chapter_spanning_two_records_continues_in_second() {
        let nodes = [NavNode {
            index: 0,
            parent_index: None,
            offset: RECORD_SIZE - 10,
            length: 50,
            is_section_marker: false,
            section_number: None,
        }];
        let map = build_record_map(&nodes, 2);
        assert_eq!(map[0].opening_node, 0);
        assert_eq!(map[1].continuing_node, 0);
    }
}
