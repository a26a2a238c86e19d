//! Format-preserving document model
//!
//! Documents are validated with `serde_yaml` and then scanned into a tree of
//! mappings, sequences and scalars that remembers where every key and scalar
//! sits in the source text. Mutations (key renames, scalar replacements) are
//! recorded on the nodes and spliced back into the original text on
//! [`Document::serialize`], so comments, quoting, indentation and ordering of
//! everything else survive untouched.
//!
//! The scanner understands block mappings, block sequences (including
//! indentless ones), plain/quoted/block scalars, anchors and tags. Flow
//! collections (`{...}`, `[...]`) are kept as opaque scalars that remember
//! whether they are mappings.

use serde::{Deserialize, Serialize};

use super::error::ParseError;

/// 1-based line/column location in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Byte range in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// How a key was quoted in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Plain,
    Single,
    Double,
}

impl QuoteStyle {
    fn render(&self, text: &str) -> String {
        match self {
            QuoteStyle::Plain => text.to_string(),
            QuoteStyle::Single => format!("'{}'", text.replace('\'', "''")),
            QuoteStyle::Double => format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

/// A mapping key
#[derive(Debug, Clone)]
pub struct Key {
    name: String,
    style: QuoteStyle,
    span: Span,
    position: Position,
    renamed: Option<String>,
}

impl Key {
    /// Current name (the new name once renamed)
    pub fn name(&self) -> &str {
        self.renamed.as_deref().unwrap_or(&self.name)
    }

    /// Name as written in the source
    pub fn original_name(&self) -> &str {
        &self.name
    }

    pub fn style(&self) -> QuoteStyle {
        self.style
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Renames the key; only this key's text changes on serialization
    pub fn rename(&mut self, name: impl Into<String>) {
        self.renamed = Some(name.into());
    }

    pub fn is_renamed(&self) -> bool {
        self.renamed.is_some()
    }
}

/// How a scalar value was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
    FlowMapping,
    FlowSequence,
    Alias,
}

/// A scalar, or an opaque flow collection / alias
#[derive(Debug, Clone)]
pub struct Scalar {
    text: String,
    style: ScalarStyle,
    span: Span,
    position: Position,
    multiline: bool,
    replacement: Option<String>,
}

impl Scalar {
    /// Current text; quoted scalars are returned without their quotes
    pub fn text(&self) -> &str {
        self.replacement.as_deref().unwrap_or(&self.text)
    }

    pub fn style(&self) -> ScalarStyle {
        self.style
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// True if the scalar continues past its first line
    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    pub fn is_null(&self) -> bool {
        self.style == ScalarStyle::Plain && matches!(self.text.as_str(), "~" | "null" | "Null" | "NULL")
    }

    /// Replaces the text of a single-line plain scalar.
    ///
    /// Returns false (and does nothing) for any other scalar style.
    pub fn replace(&mut self, text: impl Into<String>) -> bool {
        let editable = !self.multiline && self.style == ScalarStyle::Plain;
        if editable {
            self.replacement = Some(text.into());
        }
        editable
    }
}

/// One key/value pair of a mapping
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: Key,
    pub value: Node,
}

/// Ordered block mapping
#[derive(Debug, Clone)]
pub struct Mapping {
    entries: Vec<Entry>,
    position: Position,
}

impl Mapping {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|e| e.key.name() == key)
            .map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|e| e.key.name() == key)
            .map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key.name() == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// Ordered block sequence
#[derive(Debug, Clone)]
pub struct Sequence {
    items: Vec<Node>,
    position: Position,
}

impl Sequence {
    pub fn items(&self) -> &[Node] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Node] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// A node of the document tree
#[derive(Debug, Clone)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Sequence),
    Scalar(Scalar),
    /// Empty value (`key:` with nothing after it)
    Null(Position),
}

impl Node {
    /// Source location of the node
    pub fn position(&self) -> Position {
        match self {
            Node::Mapping(m) => m.position,
            Node::Sequence(s) => s.position,
            Node::Scalar(s) => s.position,
            Node::Null(p) => *p,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut Scalar> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// True for mappings (block or flow) and empty/null values
    pub fn is_mapping_or_null(&self) -> bool {
        match self {
            Node::Mapping(_) | Node::Null(_) => true,
            Node::Scalar(s) => s.is_null() || s.style == ScalarStyle::FlowMapping,
            Node::Sequence(_) => false,
        }
    }

    fn collect_edits(&self, edits: &mut Vec<(Span, String)>) {
        match self {
            Node::Mapping(m) => {
                for entry in &m.entries {
                    if let Some(name) = &entry.key.renamed {
                        edits.push((entry.key.span, entry.key.style.render(name)));
                    }
                    entry.value.collect_edits(edits);
                }
            }
            Node::Sequence(s) => {
                for item in &s.items {
                    item.collect_edits(edits);
                }
            }
            Node::Scalar(s) => {
                if let Some(text) = &s.replacement {
                    edits.push((s.span, text.clone()));
                }
            }
            Node::Null(_) => {}
        }
    }
}

/// One step from a node to one of its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep {
    /// Value of the n-th mapping entry
    Entry(usize),
    /// n-th sequence item
    Item(usize),
}

/// Address of a node inside a [`Document`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodePath {
    root: usize,
    steps: Vec<PathStep>,
}

impl NodePath {
    pub fn root(root: usize) -> Self {
        Self {
            root,
            steps: Vec::new(),
        }
    }

    /// Returns a new path extended by one step
    pub fn child(&self, step: PathStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self {
            root: self.root,
            steps,
        }
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }
}

const BOM: char = '\u{feff}';

/// A parsed file: the source text plus one tree per YAML document
#[derive(Debug, Clone)]
pub struct Document {
    /// Source without any leading byte-order mark
    source: String,
    bom: bool,
    roots: Vec<Node>,
}

impl Document {
    /// Parses `text`; malformed input fails without any repair attempt
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        // Positions are counted after the mark; serialize puts it back
        let (bom, text) = match text.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        for doc in serde_yaml::Deserializer::from_str(text) {
            serde_yaml::Value::deserialize(doc)?;
        }

        let roots = Scanner::new(text).parse_documents();
        Ok(Self {
            source: text.to_string(),
            bom,
            roots,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// One root node per YAML document in the file
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    pub fn roots_mut(&mut self) -> &mut [Node] {
        &mut self.roots
    }

    /// Resolves a path produced by walking this document
    pub fn node(&self, path: &NodePath) -> Option<&Node> {
        let mut node = self.roots.get(path.root)?;
        for step in &path.steps {
            node = match (step, node) {
                (PathStep::Entry(i), Node::Mapping(m)) => &m.entries.get(*i)?.value,
                (PathStep::Item(i), Node::Sequence(s)) => s.items.get(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn node_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let mut node = self.roots.get_mut(path.root)?;
        for step in &path.steps {
            node = match (step, node) {
                (PathStep::Entry(i), Node::Mapping(m)) => &mut m.entries.get_mut(*i)?.value,
                (PathStep::Item(i), Node::Sequence(s)) => s.items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Renders the document; only renamed keys and replaced scalars differ
    /// from the source text
    pub fn serialize(&self) -> String {
        let mut edits = Vec::new();
        for root in &self.roots {
            root.collect_edits(&mut edits);
        }
        edits.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.source.len() + edits.len() * 16);
        if self.bom {
            out.push(BOM);
        }
        let mut cursor = 0;
        for (span, text) in edits {
            out.push_str(&self.source[cursor..span.start]);
            out.push_str(&text);
            cursor = span.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    /// Number of pending edits
    pub fn edit_count(&self) -> usize {
        let mut edits = Vec::new();
        for root in &self.roots {
            root.collect_edits(&mut edits);
        }
        edits.len()
    }
}

/// Source location of a node
pub fn locate(node: &Node) -> Position {
    node.position()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Content,
    /// Empty or comment-only
    Blank,
    DocumentStart,
    DocumentEnd,
    Directive,
}

#[derive(Debug)]
struct Line<'a> {
    /// Byte offset of the line in the source
    start: usize,
    /// Line text without the line terminator
    text: &'a str,
    /// Column where unconsumed content begins; moves right past `- `
    col: usize,
    kind: LineKind,
}

struct KeyToken {
    name: String,
    style: QuoteStyle,
    len: usize,
    value_offset: usize,
}

struct Scanner<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;

        for raw in source.split_inclusive('\n') {
            let text = raw.trim_end_matches('\n').trim_end_matches('\r');
            let indent = text.len() - text.trim_start_matches(' ').len();
            let content = &text[indent..];

            let kind = if content.is_empty() || content.starts_with('#') {
                LineKind::Blank
            } else if indent == 0 && is_marker(text, "---") {
                LineKind::DocumentStart
            } else if indent == 0 && is_marker(text, "...") {
                LineKind::DocumentEnd
            } else if indent == 0 && text.starts_with('%') {
                LineKind::Directive
            } else {
                LineKind::Content
            };

            lines.push(Line {
                start,
                text,
                col: indent,
                kind,
            });
            start += raw.len();
        }

        Self { lines, pos: 0 }
    }

    fn parse_documents(&mut self) -> Vec<Node> {
        let mut roots = Vec::new();

        while self.pos < self.lines.len() {
            match self.lines[self.pos].kind {
                LineKind::Blank | LineKind::Directive | LineKind::DocumentEnd => self.pos += 1,
                LineKind::DocumentStart => {
                    self.pos += 1;
                    roots.push(self.parse_block(0));
                }
                LineKind::Content => {
                    let before = self.pos;
                    roots.push(self.parse_block(0));
                    if self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }

        roots
    }

    /// Index of the next content line, stopping at document markers
    fn peek(&self) -> Option<usize> {
        let mut i = self.pos;
        while i < self.lines.len() {
            match self.lines[i].kind {
                LineKind::Content => return Some(i),
                LineKind::Blank | LineKind::Directive => i += 1,
                LineKind::DocumentStart | LineKind::DocumentEnd => return None,
            }
        }
        None
    }

    fn rest(&self, i: usize) -> &'a str {
        let line = &self.lines[i];
        &line.text[line.col..]
    }

    fn position(&self, i: usize, col: usize) -> Position {
        let text = self.lines[i].text;
        Position::new(i + 1, text[..col].chars().count() + 1)
    }

    fn current_position(&self) -> Position {
        let line = self.pos.min(self.lines.len().saturating_sub(1));
        Position::new(line + 1, 1)
    }

    /// Skips whitespace, anchors (`&a`) and tags (`!t`) starting at `col`
    fn skip_properties(&self, i: usize, col: usize) -> usize {
        let text = self.lines[i].text;
        let mut col = col;
        loop {
            let rest = &text[col..];
            col += rest.len() - rest.trim_start_matches([' ', '\t']).len();
            let rest = &text[col..];
            if rest.starts_with('&') || rest.starts_with('!') {
                col += rest.find([' ', '\t']).unwrap_or(rest.len());
            } else {
                return col;
            }
        }
    }

    fn parse_block(&mut self, min_col: usize) -> Node {
        let Some(i) = self.peek() else {
            return Node::Null(self.current_position());
        };

        let col = self.lines[i].col;
        if col < min_col {
            return Node::Null(self.position(i, col));
        }

        let rest = self.rest(i);
        if is_sequence_entry(rest) {
            Node::Sequence(self.parse_sequence(col))
        } else if scan_key(rest).is_some() {
            Node::Mapping(self.parse_mapping(col))
        } else {
            let value_col = self.skip_properties(i, col);
            if strip_comment(&self.lines[i].text[value_col..]).is_empty() {
                // Properties alone on the line; the value follows below
                self.pos = i + 1;
                self.parse_block(min_col)
            } else {
                self.parse_scalar(i, value_col, min_col)
            }
        }
    }

    fn parse_mapping(&mut self, col: usize) -> Mapping {
        let position = match self.peek() {
            Some(i) => self.position(i, col),
            None => self.current_position(),
        };
        let mut entries = Vec::new();

        while let Some(i) = self.peek() {
            if self.lines[i].col != col {
                break;
            }
            let rest = self.rest(i);
            if is_sequence_entry(rest) {
                break;
            }
            let Some(token) = scan_key(rest) else {
                break;
            };

            let start = self.lines[i].start + col;
            let key = Key {
                name: token.name,
                style: token.style,
                span: Span {
                    start,
                    end: start + token.len,
                },
                position: self.position(i, col),
                renamed: None,
            };

            let value_col = self.skip_properties(i, col + token.value_offset);
            let value = if strip_comment(&self.lines[i].text[value_col..]).is_empty() {
                self.pos = i + 1;
                self.parse_nested(col, true, key.position)
            } else {
                self.parse_scalar(i, value_col, col + 1)
            };

            entries.push(Entry { key, value });
        }

        Mapping { entries, position }
    }

    fn parse_sequence(&mut self, col: usize) -> Sequence {
        let position = match self.peek() {
            Some(i) => self.position(i, col),
            None => self.current_position(),
        };
        let mut items = Vec::new();

        while let Some(i) = self.peek() {
            if self.lines[i].col != col || !is_sequence_entry(self.rest(i)) {
                break;
            }

            let item_position = self.position(i, col);
            let value_col = self.skip_properties(i, col + 1);
            if strip_comment(&self.lines[i].text[value_col..]).is_empty() {
                self.pos = i + 1;
                items.push(self.parse_nested(col, false, item_position));
            } else {
                // Treat `- ` as indentation for the item's content
                self.lines[i].col = value_col;
                items.push(self.parse_block(col + 1));
            }
        }

        Sequence { items, position }
    }

    /// Parses the value below a `key:` or `-` that had nothing after it
    fn parse_nested(&mut self, parent_col: usize, allow_indentless: bool, fallback: Position) -> Node {
        match self.peek() {
            Some(i) if self.lines[i].col > parent_col => self.parse_block(parent_col + 1),
            Some(i)
                if allow_indentless
                    && self.lines[i].col == parent_col
                    && is_sequence_entry(self.rest(i)) =>
            {
                Node::Sequence(self.parse_sequence(parent_col))
            }
            _ => Node::Null(fallback),
        }
    }

    /// Parses a scalar starting at `col` of line `i`, consuming continuation
    /// lines indented at least `continuation_col`
    fn parse_scalar(&mut self, i: usize, col: usize, continuation_col: usize) -> Node {
        let line_text = self.lines[i].text;
        let value = strip_comment(&line_text[col..]);
        let start = self.lines[i].start + col;
        let position = self.position(i, col);
        self.pos = i + 1;

        let (style, text) = match value.chars().next() {
            Some('|') => (ScalarStyle::Literal, value.to_string()),
            Some('>') => (ScalarStyle::Folded, value.to_string()),
            Some('{') => (ScalarStyle::FlowMapping, value.to_string()),
            Some('[') => (ScalarStyle::FlowSequence, value.to_string()),
            Some('*') => (ScalarStyle::Alias, value.to_string()),
            Some(q @ ('"' | '\'')) => {
                let style = if q == '"' {
                    ScalarStyle::DoubleQuoted
                } else {
                    ScalarStyle::SingleQuoted
                };
                let inner = match closing_quote(value, q) {
                    Some(end) => unquote(&value[1..end], q),
                    None => value[1..].to_string(),
                };
                (style, inner)
            }
            _ => (ScalarStyle::Plain, value.to_string()),
        };

        let mut multiline = false;
        match style {
            ScalarStyle::FlowMapping | ScalarStyle::FlowSequence => {
                let mut depth = bracket_depth(value);
                while depth > 0 && self.pos < self.lines.len() {
                    let line = &self.lines[self.pos];
                    if matches!(line.kind, LineKind::DocumentStart | LineKind::DocumentEnd) {
                        break;
                    }
                    depth += bracket_depth(line.text);
                    self.pos += 1;
                    multiline = true;
                }
            }
            ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted
                if closing_quote(value, value.chars().next().unwrap_or('"')).is_none() =>
            {
                let quote = if style == ScalarStyle::DoubleQuoted { '"' } else { '\'' };
                while self.pos < self.lines.len() {
                    let text = self.lines[self.pos].text;
                    self.pos += 1;
                    multiline = true;
                    if closes_quote(text, quote) {
                        break;
                    }
                }
            }
            _ => {
                while let Some(next) = self.peek() {
                    if self.lines[next].col < continuation_col {
                        break;
                    }
                    self.pos = next + 1;
                    multiline = true;
                }
                // Block scalar bodies may hold comment-looking or blank lines
                if matches!(style, ScalarStyle::Literal | ScalarStyle::Folded) {
                    while self.pos < self.lines.len()
                        && self.lines[self.pos].kind == LineKind::Blank
                        && self.lines[self.pos].col >= continuation_col
                        && !self.lines[self.pos].text.trim().is_empty()
                    {
                        self.pos += 1;
                    }
                }
            }
        }

        Node::Scalar(Scalar {
            text,
            style,
            span: Span {
                start,
                end: start + value.len(),
            },
            position,
            multiline,
            replacement: None,
        })
    }
}

fn is_marker(text: &str, marker: &str) -> bool {
    text == marker || (text.starts_with(marker) && text[marker.len()..].starts_with([' ', '\t']))
}

fn is_sequence_entry(rest: &str) -> bool {
    rest == "-" || rest.starts_with("- ") || rest.starts_with("-\t")
}

/// Recognizes `key:` at the start of `rest`
fn scan_key(rest: &str) -> Option<KeyToken> {
    let first = rest.chars().next()?;
    let indicator_alone = rest.len() == 1
        || rest
            .get(1..)
            .is_some_and(|tail| tail.starts_with([' ', '\t']));

    match first {
        '"' | '\'' => {
            let end = closing_quote(rest, first)?;
            let after = &rest[end + 1..];
            let ws = after.len() - after.trim_start_matches([' ', '\t']).len();
            let tail = after[ws..].strip_prefix(':')?;
            if !(tail.is_empty() || tail.starts_with([' ', '\t'])) {
                return None;
            }
            Some(KeyToken {
                name: unquote(&rest[1..end], first),
                style: if first == '"' {
                    QuoteStyle::Double
                } else {
                    QuoteStyle::Single
                },
                len: end + 1,
                value_offset: end + 1 + ws + 1,
            })
        }
        '[' | '{' | '#' | '&' | '*' | '!' | '|' | '>' | '%' | '@' | '`' | ',' => None,
        '-' | '?' | ':' if indicator_alone => None,
        _ => {
            let mut prev_ws = false;
            for (idx, c) in rest.char_indices() {
                if c == '#' && prev_ws {
                    return None;
                }
                if c == ':' {
                    let tail = &rest[idx + 1..];
                    if tail.is_empty() || tail.starts_with([' ', '\t']) {
                        let name = rest[..idx].trim_end();
                        if name.is_empty() {
                            return None;
                        }
                        return Some(KeyToken {
                            name: name.to_string(),
                            style: QuoteStyle::Plain,
                            len: name.len(),
                            value_offset: idx + 1,
                        });
                    }
                }
                prev_ws = c == ' ' || c == '\t';
            }
            None
        }
    }
}

/// Byte index of the quote closing the quoted scalar that opens `s`
fn closing_quote(s: &str, quote: char) -> Option<usize> {
    let bytes = s.as_bytes();
    let q = quote as u8;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if q == b'"' => i += 2,
            b if b == q => {
                if q == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// True if a continuation line of a multi-line quoted scalar closes it
fn closes_quote(text: &str, quote: char) -> bool {
    let bytes = text.as_bytes();
    let q = quote as u8;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if q == b'"' => i += 2,
            b if b == q => {
                if q == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    return true;
                }
            }
            _ => i += 1,
        }
    }
    false
}

fn unquote(inner: &str, quote: char) -> String {
    if quote == '\'' {
        inner.replace("''", "'")
    } else {
        inner.replace("\\\"", "\"").replace("\\\\", "\\")
    }
}

/// Net open brackets on a line of flow content, ignoring quoted text
fn bracket_depth(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some('"') if c == '\\' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '{' | '[' => depth += 1,
                '}' | ']' => depth -= 1,
                '"' | '\'' => quote = Some(c),
                '#' => break,
                _ => {}
            },
        }
    }
    depth
}

/// Byte index where a trailing comment starts, honoring quotes
fn comment_start(s: &str) -> Option<usize> {
    let quotes_active = matches!(s.chars().next(), Some('"' | '\'' | '{' | '['));
    let mut quote: Option<char> = None;
    let mut prev_ws = true;
    let mut chars = s.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match quote {
            Some('"') => {
                if c == '\\' {
                    chars.next();
                } else if c == '"' {
                    quote = None;
                }
            }
            Some(q) => {
                if c == q {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => {
                if c == '#' && prev_ws {
                    return Some(idx);
                }
                if quotes_active && (c == '"' || c == '\'') {
                    quote = Some(c);
                }
            }
        }
        prev_ws = c == ' ' || c == '\t';
    }
    None
}

fn strip_comment(s: &str) -> &str {
    match comment_start(s) {
        Some(idx) => s[..idx].trim(),
        None => s.trim(),
    }
}
