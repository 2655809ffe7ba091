//! Start-tag positions recovered from the raw source.
//!
//! The tree builder does not report columns, so the source is scanned for
//! start tags and the tags are paired with elements in document order.

use hl_dom::Document;
use hl_dom::Location;
use hl_dom::NodeKey;

/// Elements the tree builder may insert without a start tag.
const IMPLIABLE: &[&str] = &["html", "head", "body", "tbody", "tr", "colgroup"];

/// Start tags the tree builder may drop (duplicates or out of context).
const DROPPABLE: &[&str] = &[
    "html", "head", "body", "frameset", "frame", "caption", "col", "colgroup", "tbody", "thead",
    "tfoot", "tr", "td", "th",
];

/// Elements whose content is not markup.
const RAW_TEXT: &[&str] = &[
    "script", "style", "title", "textarea", "xmp", "iframe", "noembed", "noframes", "noscript",
];

/// How far ahead a misplaced element may find its tag.
const RECOVERY_WINDOW: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceTag {
    pub name: String,
    pub location: Location,
}

/// Pairs document elements with their start tags.
pub(crate) fn locate(source: &str, document: &Document) -> Vec<(NodeKey, Location)> {
    let tags = scan_start_tags(source);
    let mut consumed = vec![false; tags.len()];
    let mut cursor = 0_usize;
    let mut out = Vec::with_capacity(tags.len());

    for element in document.elements() {
        while cursor < tags.len() && consumed[cursor] {
            cursor += 1;
        }

        let name = element.local_name();
        let mut next = cursor;
        while next < tags.len()
            && (consumed[next]
                || (DROPPABLE.contains(&tags[next].name.as_str())
                    && !tag_produces(&tags[next].name, name)))
        {
            next += 1;
        }

        let hit = if next < tags.len() && tag_produces(&tags[next].name, name) {
            for skipped in consumed.iter_mut().take(next).skip(cursor) {
                *skipped = true;
            }
            Some(next)
        } else if IMPLIABLE.contains(&name) {
            None
        } else {
            (cursor..tags.len().min(cursor + RECOVERY_WINDOW))
                .find(|&index| !consumed[index] && tag_produces(&tags[index].name, name))
        };

        if let Some(index) = hit {
            consumed[index] = true;
            out.push((element.key(), tags[index].location));
        }
    }

    out
}

fn tag_produces(tag: &str, element: &str) -> bool {
    tag.eq_ignore_ascii_case(element) || (tag == "image" && element == "img")
}

/// Finds every start tag outside comments, doctypes and raw text.
pub(crate) fn scan_start_tags(input: &str) -> Vec<SourceTag> {
    let bytes = input.as_bytes();
    let mut idx = 0_usize;
    let mut found: Vec<(String, usize)> = Vec::new();

    while idx < bytes.len() {
        if bytes[idx] != b'<' {
            idx = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            idx = skip_comment(bytes, idx);
            continue;
        }

        if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
            idx = skip_to_gt(bytes, idx.saturating_add(2));
            continue;
        }

        let Some((tag, next_idx)) = parse_tag(bytes, idx) else {
            idx = idx.saturating_add(1);
            continue;
        };

        if tag.is_end {
            idx = next_idx;
            continue;
        }

        found.push((tag.name.clone(), idx));

        if tag.name == "plaintext" {
            break;
        }

        if !tag.self_closing && RAW_TEXT.contains(&tag.name.as_str()) {
            idx = skip_raw_text(bytes, next_idx, &tag.name);
            continue;
        }

        idx = next_idx;
    }

    let offsets: Vec<usize> = found.iter().map(|(_, offset)| *offset).collect();
    let locations = locations_for_offsets(input, &offsets);
    found
        .into_iter()
        .zip(locations)
        .map(|((name, _), location)| SourceTag { name, location })
        .collect()
}

/// Converts ascending byte offsets to line/column pairs in one pass.
///
/// Columns count UTF-16 code units, so an astral character advances by two.
fn locations_for_offsets(input: &str, offsets: &[usize]) -> Vec<Location> {
    let mut out = Vec::with_capacity(offsets.len());
    let mut pending = offsets.iter().copied().peekable();
    let mut line = 0_usize;
    let mut column = 1_usize;
    let mut previous_cr = false;

    for (offset, ch) in input.char_indices() {
        while pending.peek().is_some_and(|&target| target <= offset) {
            if let Some(target) = pending.next() {
                out.push(Location {
                    line,
                    column,
                    offset: target,
                });
            }
        }
        if pending.peek().is_none() {
            break;
        }

        match ch {
            '\n' if previous_cr => {}
            '\n' | '\r' => {
                line += 1;
                column = 1;
            }
            _ => column += ch.len_utf16(),
        }
        previous_cr = ch == '\r';
    }

    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedTag {
    name: String,
    is_end: bool,
    self_closing: bool,
}

fn parse_tag(bytes: &[u8], start: usize) -> Option<(ParsedTag, usize)> {
    if bytes.get(start).copied() != Some(b'<') {
        return None;
    }

    let mut idx = start.saturating_add(1);
    let mut is_end = false;
    if bytes.get(idx).copied() == Some(b'/') {
        is_end = true;
        idx = idx.saturating_add(1);
    }

    if !bytes.get(idx).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }

    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();

    let mut after_equals = false;
    while idx < bytes.len() {
        let byte = bytes[idx];
        match byte {
            b'"' | b'\'' if after_equals => {
                idx = find_byte(bytes, idx.saturating_add(1), byte)?;
                after_equals = false;
            }
            b'=' => after_equals = true,
            b'>' => {
                let self_closing = idx > name_start && bytes[idx - 1] == b'/';
                return Some((
                    ParsedTag {
                        name,
                        is_end,
                        self_closing,
                    },
                    idx.saturating_add(1),
                ));
            }
            _ if byte.is_ascii_whitespace() => {}
            _ => after_equals = false,
        }

        idx = idx.saturating_add(1);
    }

    None
}

fn skip_raw_text(bytes: &[u8], start: usize, tag_name: &str) -> usize {
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
            && tag_name_boundary(bytes, idx.saturating_add(2 + tag_bytes.len()))
        {
            return idx;
        }

        idx = idx.saturating_add(1);
    }

    bytes.len()
}

/// End of a comment starting at `start`; `<!-->` and `<!--->` are complete.
fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let body = start.saturating_add(4);
    if starts_with(bytes, body, b">") {
        return body.saturating_add(1);
    }
    if starts_with(bytes, body, b"->") {
        return body.saturating_add(2);
    }

    find_subslice(bytes, body, b"-->")
        .map(|end| end.saturating_add(3))
        .unwrap_or(bytes.len())
}

fn skip_to_gt(bytes: &[u8], idx: usize) -> usize {
    find_byte(bytes, idx, b'>')
        .map(|end| end.saturating_add(1))
        .unwrap_or(bytes.len())
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn is_tag_name_char(byte: u8) -> bool {
    !(byte.is_ascii_whitespace() || matches!(byte, b'/' | b'>'))
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}
