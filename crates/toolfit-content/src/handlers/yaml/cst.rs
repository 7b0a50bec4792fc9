//! Lossless YAML syntax tree
//!
//! The tree does not own text: every node records byte spans into the source
//! it was parsed from. Edits are made by splicing the source and parsing it
//! again, so bytes outside an edit are never regenerated.
//!
//! Supported: block mappings and sequences (including compact `- key: v`
//! and `- - v` items and sequences indented at the same level as their
//! key), flow collections, plain/quoted/block scalars (plain ones may fold
//! over several lines), comments and a single document. Anchors, aliases,
//! tags, complex keys and multi-line quoted scalars are rejected.

use std::ops::Range;

use super::scalar::{parse_quoted, resolve_plain};
use crate::value::Scalar;

#[derive(Debug, Clone)]
pub(crate) struct YNode {
    pub kind: Kind,
    pub span: Range<usize>,
    /// Trailing comment on the line that holds the node (or its key).
    pub comment: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
pub(crate) enum Kind {
    /// A key or dash with no value.
    Empty,
    Scalar(Scalar),
    BlockMap {
        indent: usize,
        /// First entry shares its line with a sequence dash.
        compact: bool,
        entries: Vec<Entry>,
    },
    BlockSeq {
        indent: usize,
        /// Columns from the dash to the item content.
        gap: usize,
        /// First item shares its line with an outer sequence dash.
        compact: bool,
        items: Vec<Item>,
    },
    FlowMap(Vec<FlowEntry>),
    FlowSeq(Vec<YNode>),
}

/// The region owned by a block mapping entry or sequence item.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// First byte removed with the slot, dedicated comment lines included.
    pub removal_start: usize,
    /// From just after the `:` or `-` to the end of any same-line value.
    pub head: Range<usize>,
    /// Following lines holding the value.
    pub body: Range<usize>,
    /// End of the slot, past trailing comments indented deeper than its key.
    pub end: usize,
    pub value: YNode,
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub key: String,
    pub key_span: Range<usize>,
    pub slot: Slot,
}

#[derive(Debug, Clone)]
pub(crate) struct Item {
    pub slot: Slot,
}

#[derive(Debug, Clone)]
pub(crate) struct FlowEntry {
    pub key: String,
    pub span: Range<usize>,
    pub value: YNode,
}

/// Indentation conventions detected in a document and reused for new blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndentStyle {
    pub map_step: usize,
    pub seq_offset: usize,
    pub dash_gap: usize,
}

impl Default for IndentStyle {
    fn default() -> Self {
        Self {
            map_step: 2,
            seq_offset: 2,
            dash_gap: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Tree {
    pub root: Option<YNode>,
    pub style: IndentStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Content,
    DocStart,
    DocEnd,
    Directive,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    content_end: usize,
    end: usize,
    indent: usize,
    kind: LineKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Key,
    Dash,
}

struct KeyToken {
    key: String,
    span: Range<usize>,
    colon: usize,
}

pub(crate) fn parse(src: &str) -> Result<Tree, String> {
    let mut parser = Parser::new(src)?;
    let root = parser.parse_document()?;
    let style = root.as_ref().map(detect_style).unwrap_or_default();
    Ok(Tree { root, style })
}

struct Parser<'s> {
    src: &'s str,
    lines: Vec<Line>,
    pos: usize,
}

fn split_lines(src: &str) -> Result<Vec<Line>, String> {
    let mut lines = Vec::new();
    let mut start = 0;
    for raw in src.split_inclusive('\n') {
        let end = start + raw.len();
        let body = raw.trim_end_matches('\n').trim_end_matches('\r');
        let content_end = start + body.len();
        let indent = body.len() - body.trim_start_matches(' ').len();
        let rest = &body[indent..];

        let kind = if rest.trim().is_empty() {
            LineKind::Blank
        } else if rest.starts_with('\t') {
            return Err(format!(
                "tab indentation is not allowed (line {})",
                lines.len() + 1
            ));
        } else if rest.starts_with('#') {
            LineKind::Comment
        } else if indent == 0 && is_marker(rest, "---") {
            LineKind::DocStart
        } else if indent == 0 && is_marker(rest, "...") {
            LineKind::DocEnd
        } else if indent == 0 && rest.starts_with('%') {
            LineKind::Directive
        } else {
            LineKind::Content
        };

        lines.push(Line {
            start,
            content_end,
            end,
            indent,
            kind,
        });
        start = end;
    }
    Ok(lines)
}

fn is_marker(text: &str, marker: &str) -> bool {
    text.starts_with(marker)
        && text[marker.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ' || c == '\t')
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Result<Self, String> {
        Ok(Self {
            src,
            lines: split_lines(src)?,
            pos: 0,
        })
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.src.as_bytes().get(at).copied()
    }

    fn line_no(&self, idx: usize) -> usize {
        idx + 1
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.lines.binary_search_by(|l| l.start.cmp(&offset)) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    fn skip_spaces(&self, mut at: usize, limit: usize) -> usize {
        while at < limit && matches!(self.byte(at), Some(b' ' | b'\t')) {
            at += 1;
        }
        at
    }

    /// Next content line at or after `self.pos`, skipping blanks and comments.
    /// Stops at document markers.
    fn peek_content(&self) -> Option<usize> {
        for (idx, line) in self.lines.iter().enumerate().skip(self.pos) {
            match line.kind {
                LineKind::Blank | LineKind::Comment => continue,
                LineKind::Content => return Some(idx),
                _ => return None,
            }
        }
        None
    }

    fn parse_document(&mut self) -> Result<Option<YNode>, String> {
        let mut started = false;
        while let Some(line) = self.lines.get(self.pos).copied() {
            match line.kind {
                LineKind::Blank | LineKind::Comment => self.pos += 1,
                LineKind::Directive if !started => self.pos += 1,
                LineKind::DocStart if !started => {
                    let rest = &self.src[line.start + 3..line.content_end];
                    let rest = rest.trim_start();
                    if !rest.is_empty() && !rest.starts_with('#') {
                        return Err("content on the document start line is not supported".to_string());
                    }
                    started = true;
                    self.pos += 1;
                }
                LineKind::Content => break,
                _ => return Err("multiple documents are not supported".to_string()),
            }
        }

        let root = match self.peek_content() {
            Some(idx) => Some(self.parse_block_node(idx, self.lines[idx].indent)?),
            None => None,
        };

        let mut ended = false;
        while let Some(line) = self.lines.get(self.pos).copied() {
            match line.kind {
                LineKind::Blank | LineKind::Comment => {}
                LineKind::DocEnd if !ended => ended = true,
                LineKind::Content if !ended => {
                    return Err(format!(
                        "unexpected content at line {}",
                        self.line_no(self.pos)
                    ));
                }
                _ => return Err("multiple documents are not supported".to_string()),
            }
            self.pos += 1;
        }

        Ok(root)
    }

    fn is_dash(&self, at: usize, line: &Line) -> bool {
        let text = &self.src[at..line.content_end];
        text == "-" || text.starts_with("- ")
    }

    fn key_at(&self, at: usize, limit: usize) -> Option<KeyToken> {
        let text = &self.src[at..limit];
        let first = text.chars().next()?;
        match first {
            '"' | '\'' => {
                let (key, close) = parse_quoted(self.src, at, limit).ok()?;
                let colon = self.skip_spaces(close, limit);
                let after = self.byte(colon + 1);
                (self.byte(colon) == Some(b':') && (colon + 1 == limit || after == Some(b' ')))
                    .then_some(KeyToken {
                        key,
                        span: at..close,
                        colon,
                    })
            }
            '[' | '{' | '#' | '&' | '*' | '!' | '|' | '>' | '%' | '@' | '`' | ',' | '?' => None,
            '-' if text.len() == 1 || text.as_bytes()[1] == b' ' => None,
            _ => {
                let bytes = text.as_bytes();
                for (i, &b) in bytes.iter().enumerate() {
                    if b == b'#' && i > 0 && matches!(bytes[i - 1], b' ' | b'\t') {
                        return None;
                    }
                    if b == b':' && (i + 1 == bytes.len() || bytes[i + 1] == b' ') {
                        let key = text[..i].trim_end();
                        if key.is_empty() {
                            return None;
                        }
                        return Some(KeyToken {
                            key: key.to_string(),
                            span: at..at + key.len(),
                            colon: at + i,
                        });
                    }
                }
                None
            }
        }
    }

    fn reject_unsupported(&self, at: usize, idx: usize) -> Result<(), String> {
        let text = &self.src[at..self.lines[idx].content_end];
        if text == "?" || text.starts_with("? ") {
            return Err(format!(
                "complex mapping keys are not supported (line {})",
                self.line_no(idx)
            ));
        }
        if text.starts_with(['&', '*', '!']) {
            return Err(format!(
                "anchors, aliases and tags are not supported (line {})",
                self.line_no(idx)
            ));
        }
        Ok(())
    }

    fn parse_block_node(&mut self, idx: usize, indent: usize) -> Result<YNode, String> {
        let line = self.lines[idx];
        let at = line.start + indent;
        self.reject_unsupported(at, idx)?;

        if self.is_dash(at, &line) {
            return self.parse_block_seq(indent, None);
        }
        if self.key_at(at, line.content_end).is_some() {
            return self.parse_block_map(indent, None);
        }

        // A lone value on its own line, e.g. a scalar under a key. Its
        // continuation lines may sit at the same indent.
        let (node, last) = self.parse_inline_value(idx, at, indent.saturating_sub(1))?;
        self.pos = last + 1;
        Ok(node)
    }

    fn parse_block_map(&mut self, indent: usize, first: Option<(usize, usize)>) -> Result<YNode, String> {
        let mut entries = Vec::new();
        if let Some((idx, at)) = first {
            entries.push(self.parse_entry(idx, at, indent, false)?);
        }

        while let Some(idx) = self.peek_content() {
            let line = self.lines[idx];
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(format!("unexpected indentation at line {}", self.line_no(idx)));
            }
            let at = line.start + indent;
            if self.is_dash(at, &line) {
                break;
            }
            self.reject_unsupported(at, idx)?;
            entries.push(self.parse_entry(idx, at, indent, true)?);
        }

        let span = match (entries.first(), entries.last()) {
            (Some(f), Some(l)) => f.key_span.start..l.slot.end,
            _ => return Err("empty block mapping".to_string()),
        };
        Ok(YNode {
            kind: Kind::BlockMap {
                indent,
                compact: first.is_some(),
                entries,
            },
            span,
            comment: None,
        })
    }

    fn parse_entry(&mut self, idx: usize, at: usize, indent: usize, own_line: bool) -> Result<Entry, String> {
        let line = self.lines[idx];
        let key = self.key_at(at, line.content_end).ok_or_else(|| {
            format!("expected a mapping key at line {}", self.line_no(idx))
        })?;
        let removal_start = if own_line {
            self.dedicated_start(idx, indent)
        } else {
            key.span.start
        };
        let slot = self.parse_slot(idx, key.colon + 1, indent, removal_start, Owner::Key)?;
        Ok(Entry {
            key: key.key,
            key_span: key.span,
            slot,
        })
    }

    fn parse_block_seq(&mut self, indent: usize, first: Option<(usize, usize)>) -> Result<YNode, String> {
        let mut items = Vec::new();
        let mut gap = None;
        if let Some((idx, dash)) = first {
            let (item, item_gap) = self.parse_item(idx, dash, indent, false)?;
            gap = item_gap;
            items.push(item);
        }

        while let Some(idx) = self.peek_content() {
            let line = self.lines[idx];
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(format!("unexpected indentation at line {}", self.line_no(idx)));
            }
            let dash = line.start + indent;
            if !self.is_dash(dash, &line) {
                break;
            }
            let (item, item_gap) = self.parse_item(idx, dash, indent, true)?;
            gap = gap.or(item_gap);
            items.push(item);
        }

        let span = match (items.first(), items.last()) {
            (Some(f), Some(l)) => (f.slot.head.start - 1)..l.slot.end,
            _ => return Err("empty block sequence".to_string()),
        };
        Ok(YNode {
            kind: Kind::BlockSeq {
                indent,
                gap: gap.unwrap_or(2),
                compact: first.is_some(),
                items,
            },
            span,
            comment: None,
        })
    }

    fn parse_item(
        &mut self,
        idx: usize,
        dash: usize,
        indent: usize,
        own_line: bool,
    ) -> Result<(Item, Option<usize>), String> {
        let line = self.lines[idx];
        let removal_start = if own_line {
            self.dedicated_start(idx, indent)
        } else {
            dash
        };
        let after = dash + 1;
        let value_at = self.skip_spaces(after, line.content_end);
        let rest = &self.src[value_at..line.content_end];
        let gap = (!rest.is_empty() && !rest.starts_with('#')).then_some(value_at - dash);
        let column = value_at - line.start;

        if rest == "-" || rest.starts_with("- ") {
            let seq = self.parse_block_seq(column, Some((idx, value_at)))?;
            let slot = self.compact_slot(idx, after, indent, removal_start, seq);
            return Ok((Item { slot }, gap));
        }
        self.reject_unsupported(value_at, idx)?;

        if gap.is_some() && self.key_at(value_at, line.content_end).is_some() {
            let map = self.parse_block_map(column, Some((idx, value_at)))?;
            let slot = self.compact_slot(idx, after, indent, removal_start, map);
            return Ok((Item { slot }, gap));
        }

        let slot = self.parse_slot(idx, after, indent, removal_start, Owner::Dash)?;
        Ok((Item { slot }, gap))
    }

    /// Slot of an item whose collection value starts on the dash line.
    fn compact_slot(&mut self, idx: usize, after: usize, indent: usize, removal_start: usize, value: YNode) -> Slot {
        let line = self.lines[idx];
        let head_end = match &value.kind {
            Kind::BlockMap { entries, .. } => entries.first().map(|e| e.slot.head.end),
            Kind::BlockSeq { items, .. } => items.first().map(|i| i.slot.head.end),
            _ => None,
        }
        .unwrap_or(line.content_end);
        let last_line = self.pos - 1;
        let body = if last_line > idx {
            line.end..self.lines[last_line].end
        } else {
            line.end..line.end
        };
        let end = self.extend_over_comments(body.end.max(line.end), indent);
        Slot {
            removal_start,
            head: after..head_end,
            body,
            end,
            value,
        }
    }

    /// Walk back over comment lines directly above `idx` at the same indent.
    /// A blank line ends the block, so a file banner set apart from the
    /// first key is not claimed.
    fn dedicated_start(&self, idx: usize, indent: usize) -> usize {
        let mut first = idx;
        while first > 0 {
            let prev = self.lines[first - 1];
            if prev.kind == LineKind::Comment && prev.indent == indent {
                first -= 1;
            } else {
                break;
            }
        }
        self.lines[first].start
    }

    /// Consume comment lines indented deeper than `indent` that directly
    /// follow the current position; return the new slot end.
    fn extend_over_comments(&mut self, mut end: usize, indent: usize) -> usize {
        while let Some(line) = self.lines.get(self.pos) {
            if line.kind == LineKind::Comment && line.indent > indent {
                end = line.end;
                self.pos += 1;
            } else {
                break;
            }
        }
        end
    }

    fn trailing_comment(&self, at: usize, idx: usize) -> Result<Option<Range<usize>>, String> {
        let line = self.lines[idx];
        let rest_at = self.skip_spaces(at, line.content_end);
        if rest_at == line.content_end {
            return Ok(None);
        }
        if self.byte(rest_at) == Some(b'#') && rest_at > at {
            return Ok(Some(rest_at..line.content_end));
        }
        Err(format!("unexpected text after value at line {}", self.line_no(idx)))
    }

    fn parse_slot(
        &mut self,
        idx: usize,
        after: usize,
        indent: usize,
        removal_start: usize,
        owner: Owner,
    ) -> Result<Slot, String> {
        let line = self.lines[idx];
        let value_at = self.skip_spaces(after, line.content_end);
        let rest = &self.src[value_at..line.content_end];

        if rest.is_empty() || rest.starts_with('#') {
            let comment = rest.starts_with('#').then(|| value_at..line.content_end);
            self.pos = idx + 1;

            let child = match self.peek_content() {
                Some(next) if self.lines[next].indent > indent => {
                    Some(self.parse_block_node(next, self.lines[next].indent)?)
                }
                Some(next)
                    if owner == Owner::Key
                        && self.lines[next].indent == indent
                        && self.is_dash(self.lines[next].start + indent, &self.lines[next]) =>
                {
                    Some(self.parse_block_seq(indent, None)?)
                }
                _ => None,
            };

            let (value, body) = match child {
                Some(mut node) => {
                    node.comment = node.comment.or(comment);
                    let body = line.end..self.lines[self.pos - 1].end;
                    (node, body)
                }
                None => (
                    YNode {
                        kind: Kind::Empty,
                        span: after..after,
                        comment,
                    },
                    line.end..line.end,
                ),
            };
            let end = self.extend_over_comments(body.end.max(line.end), indent);
            return Ok(Slot {
                removal_start,
                head: after..after,
                body,
                end,
                value,
            });
        }

        if rest.starts_with(['|', '>']) {
            return self.parse_block_scalar(idx, after, value_at, indent, removal_start);
        }

        let (value, last) = self.parse_inline_value(idx, value_at, indent)?;
        let head = after..value.span.end;
        self.pos = last + 1;
        let last_end = self.lines[last].end;
        let end = self.extend_over_comments(last_end, indent);
        Ok(Slot {
            removal_start,
            head,
            body: last_end..last_end,
            end,
            value,
        })
    }

    /// Parse a flow collection or a quoted/plain scalar starting at `at` on
    /// line `idx`. Returns the node and the index of its last line.
    fn parse_inline_value(&mut self, idx: usize, at: usize, indent: usize) -> Result<(YNode, usize), String> {
        let line = self.lines[idx];
        let (mut node, last) = match self.byte(at) {
            Some(b'[' | b'{') => {
                let (node, end) = self.parse_flow(at)?;
                (node, self.line_of(end - 1))
            }
            Some(b'"' | b'\'') => {
                let (value, close) = parse_quoted(self.src, at, line.content_end)
                    .map_err(|e| format!("{e} (line {})", self.line_no(idx)))?;
                (
                    YNode {
                        kind: Kind::Scalar(Scalar::String(value)),
                        span: at..close,
                        comment: None,
                    },
                    idx,
                )
            }
            Some(b'&' | b'*' | b'!') => {
                return Err(format!(
                    "anchors, aliases and tags are not supported (line {})",
                    self.line_no(idx)
                ));
            }
            _ => self.parse_plain(idx, at, indent)?,
        };

        node.comment = self.trailing_comment(node.span.end, last)?;

        // Only plain scalars continue onto deeper lines.
        let saved = self.pos;
        self.pos = last + 1;
        let continued = self
            .peek_content()
            .is_some_and(|next| self.lines[next].indent > indent);
        self.pos = saved;
        if continued {
            return Err(format!(
                "unexpected continuation of a value at line {}",
                self.line_no(last + 1)
            ));
        }

        Ok((node, last))
    }

    /// Parse a plain scalar, folding continuation lines indented deeper than
    /// `indent`. A line break folds to a space; each blank line in between
    /// becomes a newline. A comment ends the scalar.
    fn parse_plain(&self, idx: usize, at: usize, indent: usize) -> Result<(YNode, usize), String> {
        let line = self.lines[idx];
        let end = self.plain_end(at, line.content_end);
        let token = self.src[at..end].trim_end();
        let mut text = token.to_string();
        let mut span_end = at + token.len();
        let mut last = idx;

        let mut commented = end < line.content_end;
        let mut blanks = 0;
        let mut k = idx + 1;
        while !commented && let Some(l) = self.lines.get(k) {
            match l.kind {
                LineKind::Blank => blanks += 1,
                LineKind::Content if l.indent > indent => {
                    let from = l.start + l.indent;
                    let stop = self.plain_end(from, l.content_end);
                    let piece = self.src[from..stop].trim_end();
                    if self.key_at(from, l.content_end).is_some() {
                        return Err(format!(
                            "mapping key inside a plain scalar at line {}",
                            self.line_no(k)
                        ));
                    }
                    if blanks == 0 {
                        text.push(' ');
                    } else {
                        text.push_str(&"\n".repeat(blanks));
                    }
                    text.push_str(piece);
                    blanks = 0;
                    span_end = from + piece.len();
                    last = k;
                    commented = stop < l.content_end;
                }
                _ => break,
            }
            k += 1;
        }

        let value = if last == idx {
            resolve_plain(token)
        } else {
            Scalar::String(text)
        };
        Ok((
            YNode {
                kind: Kind::Scalar(value),
                span: at..span_end,
                comment: None,
            },
            last,
        ))
    }

    fn plain_end(&self, at: usize, limit: usize) -> usize {
        let bytes = self.src.as_bytes();
        let mut i = at;
        while i < limit {
            if bytes[i] == b'#' && i > at && matches!(bytes[i - 1], b' ' | b'\t') {
                return i;
            }
            i += 1;
        }
        limit
    }

    fn parse_block_scalar(
        &mut self,
        idx: usize,
        after: usize,
        header_at: usize,
        indent: usize,
        removal_start: usize,
    ) -> Result<Slot, String> {
        let line = self.lines[idx];
        let header_end = self.plain_end(header_at, line.content_end);
        let header = self.src[header_at..header_end].trim_end();
        let header_end = header_at + header.len();

        let literal = header.starts_with('|');
        let mut chomp = ' ';
        let mut explicit = None;
        for c in header[1..].chars() {
            match c {
                '+' | '-' if chomp == ' ' => chomp = c,
                '1'..='9' if explicit.is_none() => explicit = c.to_digit(10).map(|d| d as usize),
                _ => {
                    return Err(format!(
                        "invalid block scalar header at line {}",
                        self.line_no(idx)
                    ));
                }
            }
        }
        let comment = self.trailing_comment(header_end, idx)?;

        let mut last = idx;
        let mut k = idx + 1;
        while let Some(l) = self.lines.get(k) {
            let blank = self.src[l.start..l.content_end].trim().is_empty();
            if blank {
                k += 1;
                continue;
            }
            if l.indent > indent {
                last = k;
                k += 1;
            } else {
                break;
            }
        }

        let content_lines = &self.lines[idx + 1..=last];
        let content_indent = explicit.map(|e| indent + e).unwrap_or_else(|| {
            content_lines
                .iter()
                .find(|l| !self.src[l.start..l.content_end].trim().is_empty())
                .map(|l| l.indent)
                .unwrap_or(indent + 1)
        });

        let texts: Vec<&str> = content_lines
            .iter()
            .map(|l| {
                let text = &self.src[l.start..l.content_end];
                text.get(content_indent..).unwrap_or("")
            })
            .collect();

        let mut value = if literal {
            texts.join("\n")
        } else {
            let mut folded = String::new();
            for (i, text) in texts.iter().enumerate() {
                if i > 0 {
                    folded.push(if text.is_empty() || texts[i - 1].is_empty() { '\n' } else { ' ' });
                }
                folded.push_str(text);
            }
            folded
        };
        match chomp {
            '-' => {}
            _ if !texts.is_empty() => value.push('\n'),
            _ => {}
        }

        self.pos = last + 1;
        let body = if last > idx {
            line.end..self.lines[last].end
        } else {
            line.end..line.end
        };
        let end = self.extend_over_comments(body.end.max(line.end), indent);
        let span_end = if last > idx {
            self.lines[last].content_end
        } else {
            header_end
        };

        Ok(Slot {
            removal_start,
            head: after..header_end,
            body,
            end,
            value: YNode {
                kind: Kind::Scalar(Scalar::String(value)),
                span: header_at..span_end,
                comment,
            },
        })
    }

    fn skip_flow_space(&self, mut at: usize) -> usize {
        let bytes = self.src.as_bytes();
        while at < bytes.len() {
            match bytes[at] {
                b' ' | b'\t' | b'\r' | b'\n' => at += 1,
                b'#' if at > 0 && matches!(bytes[at - 1], b' ' | b'\t' | b'\n') => {
                    while at < bytes.len() && bytes[at] != b'\n' {
                        at += 1;
                    }
                }
                _ => break,
            }
        }
        at
    }

    fn parse_flow(&self, at: usize) -> Result<(YNode, usize), String> {
        let seq = match self.byte(at) {
            Some(b'[') => true,
            Some(b'{') => false,
            _ => return Err("expected a flow collection".to_string()),
        };
        let close = if seq { b']' } else { b'}' };
        let mut pos = at + 1;
        let mut items = Vec::new();
        let mut entries = Vec::new();

        loop {
            pos = self.skip_flow_space(pos);
            match self.byte(pos) {
                None => return Err("unterminated flow collection".to_string()),
                Some(b) if b == close => break,
                _ => {}
            }

            if seq {
                let (node, end) = self.parse_flow_value(pos, seq)?;
                items.push(node);
                pos = end;
            } else {
                let (key, key_end) = self.parse_flow_key(pos)?;
                let mut next = self.skip_flow_space(key_end);
                let (value, end) = if self.byte(next) == Some(b':') {
                    next = self.skip_flow_space(next + 1);
                    match self.byte(next) {
                        Some(b',') | Some(b'}') => (empty_at(key_end), key_end),
                        _ => self.parse_flow_value(next, seq)?,
                    }
                } else {
                    (empty_at(key_end), key_end)
                };
                entries.push(FlowEntry {
                    key,
                    span: pos..end,
                    value,
                });
                pos = end;
            }

            pos = self.skip_flow_space(pos);
            match self.byte(pos) {
                Some(b',') => pos += 1,
                Some(b) if b == close => {}
                _ => return Err("expected ',' in flow collection".to_string()),
            }
        }

        let kind = if seq {
            Kind::FlowSeq(items)
        } else {
            Kind::FlowMap(entries)
        };
        Ok((
            YNode {
                kind,
                span: at..pos + 1,
                comment: None,
            },
            pos + 1,
        ))
    }

    fn flow_line_limit(&self, at: usize) -> usize {
        self.lines[self.line_of(at)].content_end
    }

    fn parse_flow_key(&self, at: usize) -> Result<(String, usize), String> {
        match self.byte(at) {
            Some(b'"' | b'\'') => parse_quoted(self.src, at, self.flow_line_limit(at)),
            Some(b'[' | b'{' | b'&' | b'*' | b'!' | b'?') => {
                Err("unsupported key in flow mapping".to_string())
            }
            _ => {
                let end = self.flow_plain_end(at);
                let key = self.src[at..end].trim_end();
                if key.is_empty() {
                    return Err("empty key in flow mapping".to_string());
                }
                Ok((key.to_string(), at + key.len()))
            }
        }
    }

    fn parse_flow_value(&self, at: usize, in_seq: bool) -> Result<(YNode, usize), String> {
        match self.byte(at) {
            Some(b'[' | b'{') => self.parse_flow(at),
            Some(b'"' | b'\'') => {
                let (value, close) = parse_quoted(self.src, at, self.flow_line_limit(at))?;
                Ok((
                    YNode {
                        kind: Kind::Scalar(Scalar::String(value)),
                        span: at..close,
                        comment: None,
                    },
                    close,
                ))
            }
            Some(b'&' | b'*' | b'!') => Err("anchors, aliases and tags are not supported".to_string()),
            _ => {
                let end = self.flow_plain_end(at);
                let token = self.src[at..end].trim_end();
                if token.is_empty() {
                    return Err("empty entry in flow collection".to_string());
                }
                if in_seq && self.byte(at + token.len()) == Some(b':') {
                    return Err("single-pair mappings in flow sequences are not supported".to_string());
                }
                Ok((
                    YNode {
                        kind: Kind::Scalar(resolve_plain(token)),
                        span: at..at + token.len(),
                        comment: None,
                    },
                    at + token.len(),
                ))
            }
        }
    }

    /// End of a plain scalar inside a flow collection.
    fn flow_plain_end(&self, at: usize) -> usize {
        let bytes = self.src.as_bytes();
        let mut i = at;
        while i < bytes.len() {
            match bytes[i] {
                b',' | b']' | b'}' | b'\n' | b'\r' => break,
                b'#' if i > at && matches!(bytes[i - 1], b' ' | b'\t') => break,
                b':' if matches!(bytes.get(i + 1), None | Some(b' ' | b',' | b']' | b'}' | b'\n')) => {
                    break;
                }
                _ => i += 1,
            }
        }
        i
    }
}

fn empty_at(offset: usize) -> YNode {
    YNode {
        kind: Kind::Empty,
        span: offset..offset,
        comment: None,
    }
}

fn detect_style(root: &YNode) -> IndentStyle {
    let mut style = IndentStyle::default();
    let mut found = (false, false, false);
    visit_style(root, &mut style, &mut found);
    style
}

fn visit_style(node: &YNode, style: &mut IndentStyle, found: &mut (bool, bool, bool)) {
    match &node.kind {
        Kind::BlockMap { indent, entries, .. } => {
            for entry in entries {
                match &entry.slot.value.kind {
                    Kind::BlockMap { indent: child, .. } if !found.0 && *child > *indent => {
                        style.map_step = child - indent;
                        found.0 = true;
                    }
                    Kind::BlockSeq { indent: child, .. } if !found.1 && *child >= *indent => {
                        style.seq_offset = child - indent;
                        found.1 = true;
                    }
                    _ => {}
                }
                visit_style(&entry.slot.value, style, found);
            }
        }
        Kind::BlockSeq { gap, items, .. } => {
            if !found.2 {
                style.dash_gap = *gap;
                found.2 = true;
            }
            for item in items {
                visit_style(&item.slot.value, style, found);
            }
        }
        _ => {}
    }
}
