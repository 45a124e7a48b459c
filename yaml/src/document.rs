//! # YAML Documents With Comments
//!
//! `serde_yaml` parses values but drops comments. This module rebuilds the
//! comment layer on top of it: values come from `serde_yaml`, comments come
//! from a line scanner that tracks which mapping key every comment line
//! precedes or trails. The result is a [`Document`] node tree whose
//! mapping keys carry their block and inline comments.
//!
//! Only comments attached to mapping keys reachable without crossing a
//! sequence are kept. Comments inside sequences are discarded.
//!
//! Emitting goes the other way: scalars are rendered by `serde_yaml`, the
//! block layout and the comments are written here.

use config::CommentLine;
use serde_yaml::Value as YamlValue;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Could not render scalar: {0}")]
    Render(#[from] serde_json::Error)
}

/// Shape of a node. Scalars hold plain `serde_yaml` scalars; tags are
/// already stripped.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(YamlValue),
    Sequence(Vec<Node>),
    Mapping(Vec<NodeTuple>)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub block_comments: Vec<CommentLine>,
    pub inline_comments: Vec<CommentLine>
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            block_comments: Vec::new(),
            inline_comments: Vec::new()
        }
    }

    pub fn scalar(value: YamlValue) -> Self {
        Self::new(NodeKind::Scalar(value))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence(_) | NodeKind::Mapping(_))
    }

    /// Text of a key node as stored in a section.
    pub fn key_text(&self) -> String {
        match &self.kind {
            NodeKind::Scalar(value) => scalar_text(value),
            NodeKind::Sequence(_) | NodeKind::Mapping(_) => String::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeTuple {
    pub key: Node,
    pub value: Node
}

/// A parsed document. `root` is `None` when the text has no content at
/// all (only comments and blank lines).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub block_comments: Vec<CommentLine>,
    pub root: Option<Node>,
    pub end_comments: Vec<CommentLine>
}

/// Emitter knobs.
///
/// `width` is carried for callers that configure it but scalars are never
/// folded; `serde_yaml` decides scalar layout on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    pub indent: usize,
    pub width: usize,
    pub emit_comments: bool
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            width: 80,
            emit_comments: true
        }
    }
}

/// String form of a scalar used as a mapping key.
pub fn scalar_text(value: &YamlValue) -> String {
    match value {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Tagged(tagged) => scalar_text(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default()
    }
}

/// Parses `text` into a [`Document`]. Comments are only scanned when
/// `parse_comments` is set.
pub fn parse(text: &str, parse_comments: bool) -> Result<Document, DocumentError> {
    if !has_content(text) {
        let mut document = Document::default();
        if parse_comments {
            document.end_comments = Scanner::new().scan(text).pending;
        }
        return Ok(document);
    }

    let value: YamlValue = serde_yaml::from_str(text)?;

    if !parse_comments {
        return Ok(Document {
            root: Some(build(value, None, &mut HashMap::new())),
            ..Document::default()
        });
    }

    let scanned = Scanner::new().scan(text);
    let mut entries = scanned.entries;
    let root = build(value, Some(Vec::new()), &mut entries);

    Ok(Document {
        block_comments: scanned.document_block,
        root: Some(root),
        end_comments: scanned.pending
    })
}

fn has_content(text: &str) -> bool {
    text.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#') && trimmed != "---" && trimmed != "..."
    })
}

type KeyPath = Vec<String>;

#[derive(Debug, Default)]
struct EntryComments {
    block: Vec<CommentLine>,
    inline: Vec<CommentLine>
}

fn build(
    value: YamlValue,
    path: Option<KeyPath>,
    comments: &mut HashMap<KeyPath, EntryComments>
) -> Node {
    match value {
        YamlValue::Mapping(mapping) => {
            let tuples = mapping
                .into_iter()
                .map(|(key, value)| {
                    let key = build(key, None, comments);
                    let child_path = path.as_ref().map(|parent| {
                        let mut child = parent.clone();
                        child.push(key.key_text());
                        child
                    });
                    let entry = child_path
                        .as_ref()
                        .and_then(|p| comments.remove(p))
                        .unwrap_or_default();
                    let mut tuple = NodeTuple {
                        key,
                        value: build(value, child_path, comments)
                    };
                    tuple.key.block_comments = entry.block;
                    if tuple.value.is_composite() {
                        tuple.key.inline_comments = entry.inline;
                    } else {
                        tuple.value.inline_comments = entry.inline;
                    }
                    tuple
                })
                .collect();
            Node::new(NodeKind::Mapping(tuples))
        }
        YamlValue::Sequence(items) => Node::new(NodeKind::Sequence(
            items
                .into_iter()
                .map(|item| build(item, None, comments))
                .collect()
        )),
        YamlValue::Tagged(tagged) => build(tagged.value, path, comments),
        scalar => Node::scalar(scalar)
    }
}

/// Multi-line constructs whose inner lines must not be read as keys or
/// comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    BlockScalar { indent: usize, held_blanks: usize },
    Quoted(char),
    Flow(usize)
}

/// One level of the key path. `key == None` marks a sequence item; every
/// line below it is opaque.
#[derive(Debug)]
struct Frame {
    indent: usize,
    key: Option<String>
}

#[derive(Debug, Default)]
struct Scanned {
    entries: HashMap<KeyPath, EntryComments>,
    document_block: Vec<CommentLine>,
    pending: Vec<CommentLine>
}

/// Result of scanning a value for quotes, flow brackets and a trailing
/// comment.
#[derive(Debug, Default, Clone, Copy)]
struct ScanState {
    quote: Option<char>,
    flow_depth: usize
}

impl ScanState {
    fn from_mode(mode: Mode) -> Self {
        match mode {
            Mode::Quoted(quote) => Self {
                quote: Some(quote),
                flow_depth: 0
            },
            Mode::Flow(depth) => Self {
                quote: None,
                flow_depth: depth
            },
            Mode::Normal | Mode::BlockScalar { .. } => Self::default()
        }
    }

    fn mode(self) -> Mode {
        match (self.quote, self.flow_depth) {
            (Some(quote), 0) => Mode::Quoted(quote),
            (_, depth) if depth > 0 => Mode::Flow(depth),
            _ => Mode::Normal
        }
    }

    /// Advances over `text`; returns the byte offset of a trailing comment.
    fn advance(&mut self, text: &str, mut token_start: bool) -> Option<usize> {
        let mut chars = text.char_indices().peekable();
        let mut after_space = true;

        while let Some((pos, c)) = chars.next() {
            if let Some(quote) = self.quote {
                if quote == '"' && c == '\\' {
                    chars.next();
                } else if c == quote {
                    if quote == '\'' && chars.peek().is_some_and(|(_, n)| *n == '\'') {
                        chars.next();
                    } else {
                        self.quote = None;
                        token_start = false;
                    }
                }
                after_space = false;
                continue;
            }

            match c {
                '#' if after_space => return Some(pos),
                '"' | '\'' if token_start => {
                    self.quote = Some(c);
                    token_start = false;
                }
                '[' | '{' if token_start || self.flow_depth > 0 => {
                    self.flow_depth += 1;
                    token_start = true;
                }
                ']' | '}' if self.flow_depth > 0 => {
                    self.flow_depth -= 1;
                    token_start = false;
                }
                ',' if self.flow_depth > 0 => token_start = true,
                ':' if self.flow_depth > 0 => token_start = true,
                c if c.is_whitespace() => {}
                _ => token_start = false
            }
            after_space = c.is_whitespace();
        }

        None
    }
}

struct Scanner {
    frames: Vec<Frame>,
    mode: Mode,
    /// Indent of the key whose plain scalar may continue on deeper lines.
    open_scalar: Option<usize>,
    /// Entry and column of the last inline comment, for aligned
    /// continuation lines.
    inline_anchor: Option<(KeyPath, usize)>,
    out: Scanned
}

impl Scanner {
    fn new() -> Self {
        Self {
            frames: Vec::new(),
            mode: Mode::Normal,
            open_scalar: None,
            inline_anchor: None,
            out: Scanned::default()
        }
    }

    fn scan(mut self, text: &str) -> Scanned {
        for line in text.lines() {
            if self.empty_inline(line) {
                continue;
            }
            self.line(line.trim_end());
        }
        if let Mode::BlockScalar { held_blanks, .. } = self.mode {
            self.out.pending.extend(std::iter::repeat_n(None, held_blanks));
        }
        self.out
    }

    /// A line of exactly as many spaces as the open inline comment's
    /// column is an empty inline line of that entry.
    fn empty_inline(&mut self, line: &str) -> bool {
        if self.mode != Mode::Normal {
            return false;
        }
        let Some((path, column)) = &self.inline_anchor else {
            return false;
        };
        if *column == 0 || line.len() != *column || line.bytes().any(|b| b != b' ') {
            return false;
        }
        self.out
            .entries
            .entry(path.clone())
            .or_default()
            .inline
            .push(None);
        true
    }

    fn line(&mut self, line: &str) {
        let indent = line.len() - line.trim_start_matches(' ').len();

        match self.mode {
            Mode::BlockScalar {
                indent: parent,
                held_blanks
            } => {
                if line.is_empty() {
                    self.mode = Mode::BlockScalar {
                        indent: parent,
                        held_blanks: held_blanks + 1
                    };
                    return;
                }
                if indent > parent {
                    self.mode = Mode::BlockScalar {
                        indent: parent,
                        held_blanks: 0
                    };
                    return;
                }
                self.out
                    .pending
                    .extend(std::iter::repeat_n(None, held_blanks));
                self.mode = Mode::Normal;
            }
            Mode::Quoted(_) | Mode::Flow(_) => {
                let mut state = ScanState::from_mode(self.mode);
                let token_start = state.flow_depth > 0;
                let comment = state.advance(line, token_start);
                self.mode = state.mode();
                if self.mode == Mode::Normal {
                    if let Some(pos) = comment {
                        self.trailing_comment(line, pos);
                    }
                }
                return;
            }
            Mode::Normal => {}
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            self.inline_anchor = None;
            self.out.pending.push(None);
            return;
        }

        if let Some(text) = trimmed.strip_prefix('#') {
            let column = line[..indent].chars().count();
            let text = comment_text(text);
            self.open_scalar = None;
            match self.inline_anchor.clone() {
                Some((path, anchor)) if anchor == column => {
                    self.out
                        .entries
                        .entry(path)
                        .or_default()
                        .inline
                        .push(Some(text));
                }
                _ => {
                    self.inline_anchor = None;
                    self.out.pending.push(Some(text));
                }
            }
            return;
        }

        if trimmed == "---" || trimmed == "..." {
            return;
        }

        self.inline_anchor = None;
        if let Some(key_indent) = self.open_scalar {
            if indent > key_indent {
                return;
            }
        }
        self.open_scalar = None;

        // only spaces indent; a dash behind other blanks is scalar text
        let space_indented = trimmed.len() == line.len() - indent;
        if space_indented && (trimmed == "-" || trimmed.starts_with("- ")) {
            self.sequence_item(line, trimmed, indent);
            return;
        }

        while self.frames.last().is_some_and(|f| f.indent >= indent) {
            self.frames.pop();
        }

        let Some((key, rest)) = split_key(trimmed) else {
            if self.frames.is_empty() && indent == 0 {
                self.out.document_block.append(&mut self.out.pending);
            } else {
                self.out.pending.clear();
            }
            let offset = line.len() - trimmed.len();
            self.value(line, offset, indent, None);
            return;
        };

        let path = if self.frames.iter().all(|f| f.key.is_some()) {
            let mut path: KeyPath = self.frames.iter().filter_map(|f| f.key.clone()).collect();
            path.push(key.clone());
            let block = std::mem::take(&mut self.out.pending);
            self.out.entries.insert(
                path.clone(),
                EntryComments {
                    block,
                    inline: Vec::new()
                }
            );
            Some(path)
        } else {
            self.out.pending.clear();
            None
        };

        self.frames.push(Frame {
            indent,
            key: Some(key)
        });
        let offset = line.len() - rest.len();
        self.value(line, offset, indent, path);
    }

    fn sequence_item(&mut self, line: &str, trimmed: &str, indent: usize) {
        while self
            .frames
            .last()
            .is_some_and(|f| f.indent > indent || (f.indent == indent && f.key.is_none()))
        {
            self.frames.pop();
        }
        self.out.pending.clear();
        self.frames.push(Frame { indent, key: None });

        let item = trimmed[1..].trim_start();
        let item = match split_key(item) {
            Some((_, rest)) => rest,
            None => item
        };
        let offset = line.len() - item.len();
        self.value(line, offset, indent, None);
    }

    /// Looks at the value starting at byte `offset` of `line`: switches into
    /// a multi-line mode when needed and records a trailing comment for
    /// `path`.
    fn value(&mut self, line: &str, offset: usize, indent: usize, path: Option<KeyPath>) {
        let value = strip_properties(&line[offset..]);
        let offset = line.len() - value.len();

        if value.starts_with('|') || value.starts_with('>') {
            self.mode = Mode::BlockScalar {
                indent,
                held_blanks: 0
            };
            if let (Some(path), Some(pos)) = (path, value.find(" #")) {
                let text = comment_text(&value[pos + 2..]);
                self.out.entries.entry(path).or_default().inline.push(Some(text));
            }
            return;
        }

        let mut state = ScanState::default();
        let comment = state.advance(value, true);
        self.mode = state.mode();

        let before_comment = comment.map_or(value, |pos| &value[..pos]).trim();
        if self.mode == Mode::Normal && !before_comment.is_empty() {
            self.open_scalar = Some(indent);
        }

        if let (Some(path), Some(pos)) = (path, comment) {
            let column = line[..offset + pos].chars().count();
            let text = comment_text(&value[pos + 1..]);
            self.out
                .entries
                .entry(path.clone())
                .or_default()
                .inline
                .push(Some(text));
            if self.mode == Mode::Normal {
                self.inline_anchor = Some((path, column));
            }
        }
    }

    /// Comment after the closing quote or bracket of a multi-line value.
    fn trailing_comment(&mut self, line: &str, pos: usize) {
        let Some(path) = self.current_path() else {
            return;
        };
        let column = line[..pos].chars().count();
        let text = comment_text(&line[pos + 1..]);
        self.out
            .entries
            .entry(path.clone())
            .or_default()
            .inline
            .push(Some(text));
        self.inline_anchor = Some((path, column));
    }

    fn current_path(&self) -> Option<KeyPath> {
        self.frames
            .iter()
            .map(|f| f.key.clone())
            .collect::<Option<KeyPath>>()
            .filter(|path| !path.is_empty())
    }
}

fn comment_text(text: &str) -> String {
    let text = text.strip_prefix(' ').unwrap_or(text);
    text.trim_end().to_string()
}

/// Skips leading anchors (`&a`) and tags (`!!str`).
fn strip_properties(mut value: &str) -> &str {
    value = value.trim_start();
    while value.starts_with('&') || value.starts_with('!') {
        let end = value.find(char::is_whitespace).unwrap_or(value.len());
        value = value[end..].trim_start();
    }
    value
}

/// Splits `key: rest` into the decoded key and the text after the colon.
/// `None` for lines that are not a block mapping entry.
fn split_key(text: &str) -> Option<(String, &str)> {
    let first = text.chars().next()?;

    if first == '"' || first == '\'' {
        let end = closing_quote(text, first)?;
        let after = text[end + 1..].trim_start();
        let rest = after.strip_prefix(':')?;
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            return None;
        }
        let key: String = serde_yaml::from_str(&text[..=end]).ok()?;
        return Some((key, rest));
    }

    if matches!(first, '[' | '{' | '?' | '#' | '&' | '*' | '!' | '|' | '>') {
        return None;
    }

    let mut previous = ' ';
    let mut chars = text.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        if c == '#' && previous.is_whitespace() {
            return None;
        }
        if c == ':' && chars.peek().is_none_or(|(_, n)| n.is_whitespace()) {
            return Some((plain_key(text[..pos].trim_end()), &text[pos + 1..]));
        }
        previous = c;
    }
    None
}

/// Plain keys resolve like any plain scalar (`~` is `null`, `0x10` is
/// `16`), so they match the text of the parsed key.
fn plain_key(raw: &str) -> String {
    serde_yaml::from_str::<YamlValue>(raw)
        .map(|value| scalar_text(&value))
        .unwrap_or_else(|_| raw.to_string())
}

fn closing_quote(text: &str, quote: char) -> Option<usize> {
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((pos, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            if quote == '\'' && chars.peek().is_some_and(|(_, n)| *n == '\'') {
                chars.next();
            } else {
                return Some(pos);
            }
        }
    }
    None
}

/// Renders `document` as block-style YAML.
pub fn emit(document: &Document, options: &EmitOptions) -> Result<String, DocumentError> {
    let mut emitter = Emitter {
        lines: Vec::new(),
        indent: options.indent.max(1),
        comments: options.emit_comments
    };

    emitter.block_comments(&document.block_comments, 0);
    if let Some(root) = &document.root {
        emitter.root(root)?;
    }
    emitter.block_comments(&document.end_comments, 0);

    let mut text = emitter.lines.join("\n");
    if !emitter.lines.is_empty() {
        text.push('\n');
    }
    Ok(text)
}

struct Emitter {
    lines: Vec<String>,
    indent: usize,
    comments: bool
}

impl Emitter {
    fn root(&mut self, node: &Node) -> Result<(), DocumentError> {
        match &node.kind {
            NodeKind::Mapping(tuples) if tuples.is_empty() => self.lines.push("{}".to_string()),
            NodeKind::Sequence(items) if items.is_empty() => self.lines.push("[]".to_string()),
            NodeKind::Mapping(tuples) => self.entries(tuples, 0)?,
            NodeKind::Sequence(items) => self.items(items, 0)?,
            NodeKind::Scalar(value) => {
                let rendered = render_scalar(value)?;
                self.lines.extend(rendered.lines().map(str::to_string));
            }
        }
        Ok(())
    }

    fn block_comments(&mut self, comments: &[CommentLine], pad: usize) {
        if !self.comments {
            return;
        }
        for comment in comments {
            match comment {
                Some(_) => self
                    .lines
                    .push(format!("{}{}", " ".repeat(pad), comment_marker(comment))),
                None => self.lines.push(String::new())
            }
        }
    }

    fn entries(&mut self, tuples: &[NodeTuple], pad: usize) -> Result<(), DocumentError> {
        for NodeTuple { key, value } in tuples {
            self.block_comments(&key.block_comments, pad);

            let prefix = format!("{}{}:", " ".repeat(pad), render_key(key)?);
            let inline: Vec<&CommentLine> = if self.comments {
                key.inline_comments
                    .iter()
                    .chain(&value.inline_comments)
                    .collect()
            } else {
                Vec::new()
            };

            match &value.kind {
                NodeKind::Mapping(children) if children.is_empty() => {
                    self.with_inline(format!("{prefix} {{}}"), &inline, None);
                }
                NodeKind::Sequence(items) if items.is_empty() => {
                    self.with_inline(format!("{prefix} []"), &inline, None);
                }
                NodeKind::Mapping(children) => {
                    let child_pad = pad + self.indent;
                    let next = self.leading_comment(&children[0].key, child_pad);
                    self.with_inline(prefix, &inline, next);
                    self.entries(children, child_pad)?;
                }
                NodeKind::Sequence(items) => {
                    let next = self.leading_item_comment(items, pad);
                    self.with_inline(prefix, &inline, next);
                    self.items(items, pad)?;
                }
                NodeKind::Scalar(scalar) => {
                    let rendered = render_scalar(scalar)?;
                    let mut lines = rendered.lines();
                    let first = lines.next().unwrap_or_default();
                    let rest: Vec<&str> = lines.collect();
                    if rest.is_empty() {
                        self.with_inline(format!("{prefix} {first}"), &inline, None);
                    } else {
                        // block scalars only take one trailing comment
                        self.with_inline(
                            format!("{prefix} {first}"),
                            &inline[..inline.len().min(1)],
                            None
                        );
                        self.continuation(&rest, pad);
                    }
                }
            }
        }
        Ok(())
    }

    fn items(&mut self, items: &[Node], pad: usize) -> Result<(), DocumentError> {
        let marker = format!("{}- ", " ".repeat(pad));
        for item in items {
            match &item.kind {
                NodeKind::Mapping(tuples) if tuples.is_empty() => {
                    self.lines.push(format!("{marker}{{}}"));
                }
                NodeKind::Sequence(nested) if nested.is_empty() => {
                    self.lines.push(format!("{marker}[]"));
                }
                NodeKind::Mapping(tuples) => {
                    let start = self.lines.len();
                    self.entries(tuples, pad + 2)?;
                    self.mark_item(start, &marker);
                }
                NodeKind::Sequence(nested) => {
                    let start = self.lines.len();
                    self.items(nested, pad + 2)?;
                    self.mark_item(start, &marker);
                }
                NodeKind::Scalar(scalar) => {
                    let rendered = render_scalar(scalar)?;
                    let mut lines = rendered.lines();
                    let first = lines.next().unwrap_or_default();
                    self.lines.push(format!("{marker}{first}"));
                    let rest: Vec<&str> = lines.collect();
                    self.continuation(&rest, pad);
                }
            }
        }
        Ok(())
    }

    /// Column of the block comment that opens `key`'s entry, if one is
    /// written directly at its start. A blank line in front needs nothing.
    fn leading_comment(&self, key: &Node, pad: usize) -> Option<usize> {
        match key.block_comments.first() {
            Some(Some(_)) if self.comments => Some(pad),
            _ => None
        }
    }

    fn leading_item_comment(&self, items: &[Node], pad: usize) -> Option<usize> {
        match &items.first()?.kind {
            NodeKind::Mapping(tuples) => self.leading_comment(&tuples.first()?.key, pad + 2),
            NodeKind::Sequence(nested) => self.leading_item_comment(nested, pad + 2),
            NodeKind::Scalar(_) => None
        }
    }

    /// Puts the item marker in front of the first content line emitted
    /// since `start`.
    fn mark_item(&mut self, start: usize, marker: &str) {
        let first_content = self.lines[start..].iter_mut().find(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        });
        if let Some(line) = first_content {
            *line = format!("{marker}{}", line.trim_start());
        }
    }

    fn continuation(&mut self, lines: &[&str], pad: usize) {
        let prefix = " ".repeat(pad);
        for line in lines {
            if line.is_empty() {
                self.lines.push(String::new());
            } else {
                self.lines.push(format!("{prefix}{line}"));
            }
        }
    }

    /// First inline comment on the line itself, the others on their own
    /// lines aligned under it. An empty (`None`) continuation is a line of
    /// spaces up to that column.
    ///
    /// `next` is the column of a comment line written right after this
    /// one. The inline comments move one column right when they would share
    /// it, since that comment would read back as one more inline line.
    fn with_inline(&mut self, line: String, inline: &[&CommentLine], next: Option<usize>) {
        let Some((first, rest)) = inline.split_first() else {
            self.lines.push(line);
            return;
        };
        let width = line.chars().count();
        let gap = if next == Some(width + 1) { 2 } else { 1 };
        let column = width + gap;
        self.lines
            .push(format!("{line}{}{}", " ".repeat(gap), comment_marker(first)));
        for comment in rest {
            match comment {
                Some(_) => self
                    .lines
                    .push(format!("{}{}", " ".repeat(column), comment_marker(comment))),
                None => self.lines.push(" ".repeat(column))
            }
        }
    }
}

fn comment_marker(comment: &CommentLine) -> String {
    match comment {
        Some(text) if !text.is_empty() => format!("# {text}"),
        _ => "#".to_string()
    }
}

fn render_key(key: &Node) -> Result<String, DocumentError> {
    let rendered = match &key.kind {
        NodeKind::Scalar(value) => render_scalar(value)?,
        NodeKind::Sequence(_) | NodeKind::Mapping(_) => String::new()
    };
    if rendered.is_empty() || rendered.contains('\n') {
        return Ok(serde_json::to_string(&key.key_text())?);
    }
    Ok(rendered)
}

fn render_scalar(value: &YamlValue) -> Result<String, DocumentError> {
    let mut rendered = serde_yaml::to_string(value)?;
    if rendered.ends_with('\n') {
        rendered.pop();
    }

    if let YamlValue::String(text) = value {
        let header = rendered.lines().next().unwrap_or_default();
        let block = header.starts_with('|') || header.starts_with('>');
        if block && header.chars().any(|c| c.is_ascii_digit()) {
            return Ok(serde_json::to_string(text)?);
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(document: &Document) -> &[NodeTuple] {
        match &document.root.as_ref().unwrap().kind {
            NodeKind::Mapping(tuples) => tuples,
            other => panic!("expected mapping, got {other:?}")
        }
    }

    fn line(text: &str) -> CommentLine {
        Some(text.to_string())
    }

    #[test]
    fn test_block_and_inline_comments() {
        let text = "# about a\na: 1 # one\n\n# about b\nb:\n  # about c\n  c: x\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(tuples[0].key.block_comments, vec![line("about a")]);
        assert_eq!(tuples[0].value.inline_comments, vec![line("one")]);
        assert_eq!(tuples[1].key.block_comments, vec![None, line("about b")]);

        let NodeKind::Mapping(children) = &tuples[1].value.kind else {
            panic!("b should be a mapping");
        };
        assert_eq!(children[0].key.block_comments, vec![line("about c")]);
    }

    #[test]
    fn test_inline_on_composite_goes_to_key() {
        let text = "list: # items\n- a\n- b\nmap: # entries\n  k: v\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(tuples[0].key.inline_comments, vec![line("items")]);
        assert_eq!(tuples[1].key.inline_comments, vec![line("entries")]);
        assert!(tuples[0].value.inline_comments.is_empty());
    }

    #[test]
    fn test_multiple_inline_comments() {
        let text = "a: 1 # first\n     # second\nb: 2\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(
            tuples[0].value.inline_comments,
            vec![line("first"), line("second")]
        );
        assert!(tuples[1].key.block_comments.is_empty());
    }

    #[test]
    fn test_comments_in_sequences_are_discarded() {
        let text = "list:\n# gone\n- a\n# also gone\n- b\n# kept\nnext: 1\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(tuples[1].key.block_comments, vec![line("kept")]);
    }

    #[test]
    fn test_hash_inside_quotes_and_block_scalars() {
        let text = "a: \"x # not a comment\"\nb: |\n  # content\n  more\n# for c\nc: 'it''s' # real\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert!(tuples[0].value.inline_comments.is_empty());
        assert_eq!(
            tuples[1].value.kind,
            NodeKind::Scalar(YamlValue::String("# content\nmore\n".to_string()))
        );
        assert_eq!(tuples[2].key.block_comments, vec![line("for c")]);
        assert_eq!(tuples[2].value.inline_comments, vec![line("real")]);
    }

    #[test]
    fn test_end_comments_and_empty_document() {
        let document = parse("a: 1\n# footer\n", true).unwrap();
        assert_eq!(document.end_comments, vec![line("footer")]);

        let document = parse("# only a comment\n\n", true).unwrap();
        assert!(document.root.is_none());
        assert_eq!(document.end_comments, vec![line("only a comment"), None]);
    }

    #[test]
    fn test_comments_before_flow_root() {
        let document = parse("# Title\n\n{}\n", true).unwrap();
        assert_eq!(document.block_comments, vec![line("Title"), None]);
        assert_eq!(mapping(&document).len(), 0);
    }

    #[test]
    fn test_quoted_keys_and_tags() {
        let text = "\"a: b\": 1 # quoted\n'==': Point\nc: !point 5\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(tuples[0].key.key_text(), "a: b");
        assert_eq!(tuples[0].value.inline_comments, vec![line("quoted")]);
        assert_eq!(tuples[1].key.key_text(), "==");
        assert_eq!(
            tuples[2].value.kind,
            NodeKind::Scalar(YamlValue::Number(5.into()))
        );
    }

    #[test]
    fn test_dash_behind_non_breaking_space_is_text() {
        let document = parse("key:\n  first line\n  \u{a0}- x\n", true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(
            tuples[0].value.kind,
            NodeKind::Scalar(YamlValue::String("first line \u{a0}- x".to_string()))
        );
    }

    #[test]
    fn test_blank_inline_line_at_comment_column() {
        let text = "a: 1 # x\n     \n     # z\n\nb: 2\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(
            tuples[0].value.inline_comments,
            vec![line("x"), None, line("z")]
        );
        assert_eq!(tuples[1].key.block_comments, vec![None]);
        assert_eq!(emit(&document, &EmitOptions::default()).unwrap(), text);
    }

    #[test]
    fn test_comments_on_resolved_plain_keys() {
        let text = "# about null\n~: 1\n# about hex\n0x10: 2 # sixteen\n";
        let document = parse(text, true).unwrap();
        let tuples = mapping(&document);

        assert_eq!(tuples[0].key.key_text(), "null");
        assert_eq!(tuples[0].key.block_comments, vec![line("about null")]);
        assert_eq!(tuples[1].key.key_text(), "16");
        assert_eq!(tuples[1].key.block_comments, vec![line("about hex")]);
        assert_eq!(tuples[1].value.inline_comments, vec![line("sixteen")]);
    }

    #[test]
    fn test_inline_comments_clear_of_child_comment() {
        let text = "ab: # x\n    # y\n  # about c\n  c: 1\n";
        let document = parse(text, true).unwrap();
        let options = EmitOptions {
            indent: 4,
            ..EmitOptions::default()
        };

        let emitted = emit(&document, &options).unwrap();
        assert_eq!(emitted, "ab:  # x\n     # y\n    # about c\n    c: 1\n");

        let parsed = parse(&emitted, true).unwrap();
        let tuples = mapping(&parsed);
        assert_eq!(tuples[0].key.inline_comments, vec![line("x"), line("y")]);
        let NodeKind::Mapping(children) = &tuples[0].value.kind else {
            panic!("ab should be a mapping");
        };
        assert_eq!(children[0].key.block_comments, vec![line("about c")]);
    }

    #[test]
    fn test_syntax_error() {
        let result = parse("a: [unmatched\n", true);
        assert!(matches!(result, Err(DocumentError::Yaml(_))));
    }

    #[test]
    fn test_parse_without_comments() {
        let document = parse("# c\na: 1 # d\n", false).unwrap();
        let tuples = mapping(&document);
        assert!(tuples[0].key.block_comments.is_empty());
        assert!(tuples[0].value.inline_comments.is_empty());
        assert!(document.end_comments.is_empty());
    }

    #[test]
    fn test_emit_layout() {
        let text = "# about a\na: 1 # one\n     # two\n\nb:\n  c: x\n  d: {}\nlist:\n- 1\n- k: v\n  w: 2\nempty: []\n# footer\n";
        let document = parse(text, true).unwrap();

        let emitted = emit(&document, &EmitOptions::default()).unwrap();
        assert_eq!(emitted, text);
    }

    #[test]
    fn test_emit_respects_indent() {
        let document = parse("a:\n  b:\n    c: 1\n", true).unwrap();
        let options = EmitOptions {
            indent: 4,
            ..EmitOptions::default()
        };

        assert_eq!(
            emit(&document, &options).unwrap(),
            "a:\n    b:\n        c: 1\n"
        );
    }

    #[test]
    fn test_emit_multiline_string_round_trips() {
        let mut tuples = Vec::new();
        tuples.push(NodeTuple {
            key: Node::scalar(YamlValue::String("text".to_string())),
            value: Node::scalar(YamlValue::String("line one\nline two".to_string()))
        });
        let document = Document {
            root: Some(Node::new(NodeKind::Mapping(tuples))),
            ..Document::default()
        };

        let emitted = emit(&document, &EmitOptions::default()).unwrap();
        let parsed = parse(&emitted, true).unwrap();
        let tuples = mapping(&parsed);
        assert_eq!(
            tuples[0].value.kind,
            NodeKind::Scalar(YamlValue::String("line one\nline two".to_string()))
        );
    }
}
