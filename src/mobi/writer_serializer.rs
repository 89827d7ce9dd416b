//! Component B: walks the spine and serializes each document's element
//! tree into the shared text buffer, performing `href`/`src`/`id`
//! bookkeeping and `filepos=` placeholder insertion along the way.

use std::collections::HashMap;

use super::writer_model::{BinaryResource, Element, ManifestItem, Node, SpineItem, TocNode};

const FILEPOS_PLACEHOLDER_LEN: usize = 10;

pub struct SerializedText {
    pub bytes: Vec<u8>,
    /// `href` (including any `#fragment`) -> byte offset of its target anchor.
    pub id_offsets: HashMap<String, usize>,
    /// `href` (of a `filepos=` placeholder site) -> buffer offsets of the
    /// first zero digit of each unresolved placeholder referencing it.
    pub href_offsets: HashMap<String, Vec<usize>>,
    pub page_breaks: Vec<usize>,
    /// Offset of the first content byte -- the periodical's nominal start
    /// address (ground truth `_anchor_offset_kindle`).
    pub anchor_offset_kindle: usize,
    /// Hrefs that never resolved to an anchor; left as zero placeholders.
    pub broken_links: Vec<String>,
}

struct ImageIndex<'a> {
    href_to_index: HashMap<&'a str, usize>,
}

impl<'a> ImageIndex<'a> {
    fn build(images: &'a [BinaryResource], masthead_href: Option<&str>) -> Self {
        let mut href_to_index = HashMap::new();
        let mut next = 1usize;
        if let Some(m) = masthead_href {
            href_to_index.insert(m, next);
            next += 1;
        }
        for img in images {
            if Some(img.href.as_str()) == masthead_href {
                continue;
            }
            href_to_index.insert(img.href.as_str(), next);
            next += 1;
        }
        Self { href_to_index }
    }
}

struct SerializerState<'m> {
    buffer: Vec<u8>,
    id_offsets: HashMap<String, usize>,
    href_offsets: HashMap<String, Vec<usize>>,
    page_breaks: Vec<usize>,
    anchor_offset: Option<usize>,
    manifest_hrefs: HashMap<&'m str, ()>,
    images: ImageIndex<'m>,
    current_href: &'m str,
}

pub fn serialize_spine<'a>(
    manifest: &'a [ManifestItem],
    images: &'a [BinaryResource],
    spine: &[SpineItem<'_>],
    guide_masthead: Option<&str>,
) -> SerializedText {
    let manifest_hrefs = manifest.iter().map(|m| (m.href.as_str(), ())).collect();
    let by_href: HashMap<&str, &ManifestItem> =
        manifest.iter().map(|m| (m.href.as_str(), m)).collect();

    let mut state = SerializerState {
        buffer: Vec::new(),
        id_offsets: HashMap::new(),
        href_offsets: HashMap::new(),
        page_breaks: Vec::new(),
        anchor_offset: None,
        manifest_hrefs,
        images: ImageIndex::build(images, guide_masthead),
        current_href: "",
    };

    let anchor_offset_kindle = 0;

    for item in spine {
        if !item.linear {
            // Non-linear items contribute no body content, but the
            // current buffer end becomes a page-break marker.
            if !state.buffer.is_empty() {
                state.page_breaks.push(state.buffer.len() - 1);
            }
            continue;
        }
        let Some(doc) = by_href.get(item.href) else {
            continue;
        };
        state.current_href = item.href;
        state.anchor_offset = None;
        serialize_element(&mut state, &doc.root);
    }

    let mut broken_links = Vec::new();
    fixup_links(&mut state, &mut broken_links);

    SerializedText {
        bytes: state.buffer,
        id_offsets: state.id_offsets,
        href_offsets: state.href_offsets,
        page_breaks: state.page_breaks,
        anchor_offset_kindle,
        broken_links,
    }
}

fn serialize_element(state: &mut SerializerState, el: &Element) {
    // Empty-anchor pruning: a redundant `<a/>` right after an anchor was
    // already recorded for this position.
    if el.tag == "a"
        && el.attributes.is_empty()
        && el.children.is_empty()
        && state.anchor_offset.is_some()
    {
        if let Some(tail) = &el.tail {
            write_text(state, tail);
        }
        return;
    }

    if let Some(id) = el.attr("id") {
        let key = format!("{}#{}", state.current_href, id);
        let offset = state.anchor_offset.unwrap_or(state.buffer.len());
        state.id_offsets.insert(key, offset);
    }

    state.anchor_offset = Some(state.buffer.len());

    state.buffer.push(b'<');
    state.buffer.extend_from_slice(el.tag.as_bytes());
    for (name, value) in &el.attributes {
        if name == "id" {
            continue;
        }
        if name == "href" {
            write_href_attr(state, value);
            continue;
        }
        if name == "src" {
            write_src_attr(state, value);
            continue;
        }
        state.buffer.push(b' ');
        state.buffer.extend_from_slice(name.as_bytes());
        state.buffer.extend_from_slice(b"=\"");
        write_escaped(state, value);
        state.buffer.push(b'"');
    }

    if el.children.is_empty() {
        state.buffer.extend_from_slice(b" />");
    } else {
        state.buffer.push(b'>');
        for child in &el.children {
            match child {
                Node::Element(child_el) => serialize_element(state, child_el),
                Node::Text(text) => write_text(state, text),
            }
        }
        state.buffer.extend_from_slice(b"</");
        state.buffer.extend_from_slice(el.tag.as_bytes());
        state.buffer.push(b'>');
    }

    if let Some(tail) = &el.tail {
        write_text(state, tail);
    }
}

fn write_text(state: &mut SerializerState, text: &str) {
    if !text.is_empty() {
        state.anchor_offset = None;
    }
    write_escaped(state, text);
}

fn write_escaped(state: &mut SerializerState, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => state.buffer.extend_from_slice(b"&amp;"),
            '<' => state.buffer.extend_from_slice(b"&lt;"),
            '>' => state.buffer.extend_from_slice(b"&gt;"),
            _ => {
                let mut buf = [0u8; 4];
                state
                    .buffer
                    .extend_from_slice(ch.encode_utf8(&mut buf).as_bytes())
            }
        }
    }
}

fn write_href_attr(state: &mut SerializerState, href: &str) {
    let (target_href, _fragment) = split_fragment(href);
    if state.manifest_hrefs.contains_key(target_href) {
        state.buffer.extend_from_slice(b" href=\"filepos=");
        let placeholder_pos = state.buffer.len();
        state
            .buffer
            .extend(std::iter::repeat(b'0').take(FILEPOS_PLACEHOLDER_LEN));
        state.buffer.push(b'"');
        state
            .href_offsets
            .entry(href.to_string())
            .or_default()
            .push(placeholder_pos);
    } else {
        state.buffer.extend_from_slice(b" href=\"");
        write_escaped(state, href);
        state.buffer.push(b'"');
    }
}

fn write_src_attr(state: &mut SerializerState, src: &str) {
    if let Some(&index) = state.images.href_to_index.get(src) {
        state.buffer.extend_from_slice(b" recindex=\"");
        state
            .buffer
            .extend_from_slice(format!("{:05}", index).as_bytes());
        state.buffer.push(b'"');
    } else {
        state.buffer.extend_from_slice(b" src=\"");
        write_escaped(state, src);
        state.buffer.push(b'"');
    }
}

fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((base, frag)) => (base, Some(frag)),
        None => (href, None),
    }
}

fn fixup_links(state: &mut SerializerState, broken_links: &mut Vec<String>) {
    let href_offsets = std::mem::take(&mut state.href_offsets);
    for (href, positions) in &href_offsets {
        let resolved = state.id_offsets.get(href).copied().or_else(|| {
            let (base, _) = split_fragment(href);
            state.id_offsets.get(base).copied()
        });
        match resolved {
            Some(offset) => {
                let digits = format!("{:010}", offset);
                for &pos in positions {
                    state.buffer[pos..pos + FILEPOS_PLACEHOLDER_LEN]
                        .copy_from_slice(digits.as_bytes());
                }
            }
            None => broken_links.push(href.clone()),
        }
    }
    state.href_offsets = href_offsets;
}

/// Resolve a [`TocNode`]'s offset/length by consulting `id_offsets`
/// (component E/G helper, shared by TOC flattening and navpoint generation).
pub fn resolve_offset(id_offsets: &HashMap<String, usize>, href: &str) -> Option<usize> {
    id_offsets
        .get(href)
        .copied()
        .or_else(|| id_offsets.get(split_fragment(href).0).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobi::writer_model::ManifestItem;

    fn doc(href: &str, root: Element) -> ManifestItem {
        ManifestItem {
            href: href.to_string(),
            media_type: "application/xhtml+xml".to_string(),
            root,
        }
    }

    #[test]
    fn simple_link_resolves_to_filepos() {
        let mut target = Element::new("h1");
        target.attributes.push(("id".into(), "ch2".into()));
        target.children.push(Node::Text("Chapter 2".into()));

        let mut link = Element::new("a");
        link.attributes
            .push(("href".into(), "c2.xhtml#ch2".into()));
        link.children.push(Node::Text("go".into()));

        let mut root1 = Element::new("body");
        root1.children.push(Node::Element(link));
        let mut root2 = Element::new("body");
        root2.children.push(Node::Element(target));

        let manifest = vec![doc("c1.xhtml", root1), doc("c2.xhtml", root2)];
        let spine = vec![
            SpineItem {
                href: "c1.xhtml",
                linear: true,
            },
            SpineItem {
                href: "c2.xhtml",
                linear: true,
            },
        ];

        let result = serialize_spine(&manifest, &[], &spine, None);
        assert!(result.broken_links.is_empty());
        let text = String::from_utf8_lossy(&result.bytes);
        assert!(text.contains("filepos="));
        assert!(!text.contains("0000000000\""));
    }

    #[test]
    fn unresolved_href_is_reported_broken() {
        let mut link = Element::new("a");
        link.attributes
            .push(("href".into(), "missing.xhtml".into()));
        link.children.push(Node::Text("go".into()));
        let mut root = Element::new("body");
        root.children.push(Node::Element(link));

        // missing.xhtml is not in the manifest at all, so this isn't even
        // rewritten to a filepos placeholder -- broken_links stays empty
        // and the href is written through literally.
        let manifest = vec![doc("c1.xhtml", root)];
        let spine = vec![SpineItem {
            href: "c1.xhtml",
            linear: true,
        }];
        let result = serialize_spine(&manifest, &[], &spine, None);
        assert!(result.broken_links.is_empty());
    }
}
