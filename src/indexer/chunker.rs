/// Heuristic, language-aware chunking of source files.
///
/// Files are split at base-level declarations found by the per-language
/// [`BoundaryRule`](super::languages::BoundaryRule)s, never inside a body.
/// Blocks longer than `max_chunk_lines` are cut into consecutive `window`
/// chunks, and files without any recognizable marker fall back to windows
/// entirely. Chunking never fails: anything it cannot classify becomes a
/// window.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::languages::{BlockStructure, BoundaryRule, Language, LineContext, Marker};
use super::reader::{LineIndex, SourceFile};

pub const DEFAULT_MAX_CHUNK_LINES: usize = 80;
pub const DEFAULT_COMMENT_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Class,
    TopLevel,
    Window,
}

impl ChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::TopLevel => "top_level",
            ChunkType::Window => "window",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "function" => Some(ChunkType::Function),
            "class" => Some(ChunkType::Class),
            "top_level" => Some(ChunkType::TopLevel),
            "window" => Some(ChunkType::Window),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous, inclusive, 1-indexed line range of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub chunk_type: ChunkType,
    pub line_start: usize,
    pub line_end: usize,
    /// Verbatim text of the lines, terminators included.
    pub text: &'a str,
}

impl Chunk<'_> {
    pub fn line_count(&self) -> usize {
        self.line_end - self.line_start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Hard upper bound on the lines of any chunk.
    pub max_chunk_lines: usize,
    /// How many comment/blank/decorator lines above a declaration join it.
    pub comment_lookback: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_lines: DEFAULT_MAX_CHUNK_LINES,
            comment_lookback: DEFAULT_COMMENT_LOOKBACK,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundaryChunker {
    config: ChunkerConfig,
}

impl Default for BoundaryChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl BoundaryChunker {
    pub fn new(mut config: ChunkerConfig) -> Self {
        config.max_chunk_lines = config.max_chunk_lines.max(1);
        Self { config }
    }

    pub fn chunk_source<'a>(&self, source: &'a SourceFile) -> Vec<Chunk<'a>> {
        self.chunk(source.content(), source.language)
    }

    /// Split `content` into ordered, non-overlapping chunks.
    ///
    /// Empty content yields no chunks; any other content yields at least one.
    pub fn chunk<'a>(&self, content: &'a str, language: Language) -> Vec<Chunk<'a>> {
        let index = LineIndex::new(content);
        let line_count = index.line_count();
        if line_count == 0 {
            return Vec::new();
        }

        let blocks = match (language.structure(), language.boundary_rule()) {
            (Some(structure), Some(rule)) => {
                detect_blocks(content, &index, language, structure, rule, self.config.comment_lookback)
                    .map(|blocks| match structure {
                        BlockStructure::Prose => pack_prose(blocks, self.config.max_chunk_lines),
                        _ => blocks,
                    })
            }
            _ => None,
        };

        let mut chunks = Vec::new();
        match blocks {
            Some(blocks) => self.emit_blocks(content, &index, &blocks, &mut chunks),
            None => self.push_windows(content, &index, 1, line_count, false, &mut chunks),
        }

        if chunks.is_empty() {
            // Whitespace-only file: still non-empty, so it still gets chunks.
            self.push_windows(content, &index, 1, line_count, true, &mut chunks);
        }

        chunks
    }

    fn emit_blocks<'a>(
        &self,
        content: &'a str,
        index: &LineIndex,
        blocks: &[Block],
        out: &mut Vec<Chunk<'a>>,
    ) {
        for block in blocks {
            let chunk_type = if block.degraded {
                ChunkType::Window
            } else {
                block.opener.chunk_type()
            };
            let span = block.end - block.start + 1;
            if chunk_type == ChunkType::Window || span > self.config.max_chunk_lines {
                self.push_windows(content, index, block.start, block.end, false, out);
                continue;
            }
            let text = index.slice(content, block.start, block.end);
            if is_blank(text) {
                continue;
            }
            out.push(Chunk {
                chunk_type,
                line_start: block.start,
                line_end: block.end,
                text,
            });
        }
    }

    fn push_windows<'a>(
        &self,
        content: &'a str,
        index: &LineIndex,
        start: usize,
        end: usize,
        keep_blank: bool,
        out: &mut Vec<Chunk<'a>>,
    ) {
        let max = self.config.max_chunk_lines;
        for line_start in (start..=end).step_by(max) {
            let line_end = (line_start + max - 1).min(end);
            let text = index.slice(content, line_start, line_end);
            if !keep_blank && is_blank(text) {
                continue;
            }
            out.push(Chunk {
                chunk_type: ChunkType::Window,
                line_start,
                line_end,
                text,
            });
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

// ── Block detection ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    FileStart,
    Code,
    Marker(Marker),
}

impl Opener {
    fn is_declaration(self) -> bool {
        matches!(self, Opener::Marker(Marker::Function | Marker::Class))
    }

    fn chunk_type(self) -> ChunkType {
        match self {
            Opener::Marker(Marker::Function) => ChunkType::Function,
            Opener::Marker(Marker::Class) => ChunkType::Class,
            _ => ChunkType::TopLevel,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Block {
    start: usize,
    end: usize,
    opener: Opener,
    degraded: bool,
}

#[derive(Debug)]
struct OpenBlock {
    start: usize,
    decl_line: usize,
    opener: Opener,
    body_opened: bool,
    closed: bool,
    degraded: bool,
}

impl OpenBlock {
    fn new(start: usize, decl_line: usize, opener: Opener) -> Self {
        Self {
            start,
            decl_line,
            opener,
            body_opened: false,
            closed: false,
            degraded: false,
        }
    }

    /// Track whether a declaration's body has ended after line `ln`.
    fn observe(&mut self, ln: usize, info: &LineInfo, structure: BlockStructure) {
        if info.underflow {
            self.degraded = true;
        }
        if !self.opener.is_declaration() || self.closed {
            return;
        }
        match structure {
            BlockStructure::Brace => {
                if info.opened_brace {
                    self.body_opened = true;
                }
                if self.body_opened {
                    self.closed = info.depth_after == 0;
                } else if (ln > self.decl_line && info.blank)
                    || (info.depth_after == 0 && info.ends_statement)
                {
                    self.closed = true;
                }
            }
            BlockStructure::Indent | BlockStructure::Prose => self.closed = true,
        }
    }

    fn finish(self, end: usize) -> Block {
        Block {
            start: self.start,
            end,
            opener: self.opener,
            degraded: self.degraded,
        }
    }
}

/// Find logical blocks. `None` when no marker matched anywhere.
fn detect_blocks(
    content: &str,
    index: &LineIndex,
    language: Language,
    structure: BlockStructure,
    rule: &dyn BoundaryRule,
    lookback: usize,
) -> Option<Vec<Block>> {
    let line_count = index.line_count();
    let mut scanner = Scanner::new(language, structure);
    let lines: Vec<&str> = (1..=line_count)
        .map(|ln| index.line(content, ln).trim_end_matches(['\n', '\r']))
        .collect();
    let infos: Vec<LineInfo> = lines.iter().map(|line| scanner.scan(line)).collect();

    let mut blocks = Vec::new();
    let mut found_marker = false;
    let mut current = OpenBlock::new(1, 1, Opener::FileStart);
    let mut prev_blank = false;

    for (i, info) in infos.iter().enumerate() {
        let ln = i + 1;
        let marker = if info.base && !info.blank && !info.in_block_before {
            let ctx = LineContext {
                depth: info.depth_before,
                indent: info.indent,
                prev_blank,
                in_block: false,
            };
            rule.classify(lines[i], &ctx)
        } else {
            None
        };

        let opener = match marker {
            Some(m) => Some(Opener::Marker(m)),
            None if structure != BlockStructure::Prose
                && info.base
                && !info.prefix
                && !info.closing
                && current.opener.is_declaration()
                && current.closed =>
            {
                Some(Opener::Code)
            }
            None => None,
        };

        if let Some(opener) = opener {
            found_marker |= marker.is_some();
            let start = lookback_start(&infos, ln, current.start, lookback);
            if start > current.start {
                blocks.push(current.finish(start - 1));
            }
            current = OpenBlock::new(start, ln, opener);
        }

        current.observe(ln, info, structure);
        prev_blank = info.blank;
    }

    let final_depth = infos.last().map_or(0, |info| info.depth_after);
    if structure == BlockStructure::Brace
        && current.opener.is_declaration()
        && current.body_opened
        && final_depth > 0
    {
        current.degraded = true;
    }
    blocks.push(current.finish(line_count));

    found_marker.then_some(blocks)
}

/// First line of a block opened at `ln`: up to `max` directly preceding
/// base-level prefix lines move into it, never past `floor`.
fn lookback_start(infos: &[LineInfo], ln: usize, floor: usize, max: usize) -> usize {
    let mut start = ln;
    while start > floor && ln - start < max {
        let prev = &infos[start - 2];
        if !(prev.prefix && (prev.base || prev.blank)) {
            break;
        }
        start -= 1;
    }
    start
}

/// Merge paragraphs into the preceding section while it stays within `max`.
fn pack_prose(blocks: Vec<Block>, max: usize) -> Vec<Block> {
    let mut packed: Vec<Block> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if let Some(last) = packed.last_mut() {
            let soft = block.opener == Opener::Marker(Marker::Paragraph);
            if soft && !last.degraded && block.end - last.start < max {
                last.end = block.end;
                continue;
            }
        }
        packed.push(block);
    }
    packed
}

// ── Line scanning ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct LineInfo {
    blank: bool,
    indent: usize,
    depth_before: usize,
    depth_after: usize,
    opened_brace: bool,
    underflow: bool,
    in_block_before: bool,
    base: bool,
    prefix: bool,
    closing: bool,
    ends_statement: bool,
}

/// Tracks brace depth and multi-line regions (block comments, triple-quoted
/// strings, markdown fences) across lines. Strings and comments are skipped
/// while counting braces.
struct Scanner {
    language: Language,
    structure: BlockStructure,
    depth: usize,
    closer: Option<&'static str>,
}

impl Scanner {
    fn new(language: Language, structure: BlockStructure) -> Self {
        Self {
            language,
            structure,
            depth: 0,
            closer: None,
        }
    }

    fn scan(&mut self, line: &str) -> LineInfo {
        let trimmed = line.trim();
        let mut info = LineInfo {
            blank: trimmed.is_empty(),
            indent: line.len() - line.trim_start().len(),
            depth_before: self.depth,
            in_block_before: self.closer.is_some(),
            ..Default::default()
        };

        match self.structure {
            BlockStructure::Prose => self.scan_fence(trimmed),
            BlockStructure::Brace | BlockStructure::Indent => self.scan_code(line, &mut info),
        }
        info.depth_after = self.depth;

        info.base = match self.structure {
            BlockStructure::Brace => info.depth_before == 0,
            BlockStructure::Indent => info.indent == 0,
            BlockStructure::Prose => true,
        };
        info.prefix = match self.structure {
            BlockStructure::Prose => info.blank,
            _ => {
                info.blank
                    || info.in_block_before
                    || self.language.is_comment(trimmed)
                    || self.language.is_annotation(trimmed)
            }
        };
        info.closing = trimmed.starts_with(['}', ')', ']'])
            || trimmed == "end"
            || trimmed.starts_with("end ");
        info.ends_statement = trimmed.ends_with(';');
        info
    }

    fn scan_fence(&mut self, trimmed: &str) {
        if self.language != Language::Markdown {
            return;
        }
        for fence in ["```", "~~~"] {
            if trimmed.starts_with(fence) {
                match self.closer {
                    Some(open) if open == fence => self.closer = None,
                    None => self.closer = Some(fence),
                    Some(_) => {}
                }
                return;
            }
        }
    }

    fn scan_code(&mut self, line: &str, info: &mut LineInfo) {
        let mut i = 0;
        while i < line.len() {
            let rest = &line[i..];
            if let Some(closer) = self.closer {
                match rest.find(closer) {
                    Some(pos) => {
                        i += pos + closer.len();
                        self.closer = None;
                        continue;
                    }
                    None => return,
                }
            }

            if self.starts_line_comment(line, i) {
                return;
            }
            if self.language.has_block_comments() && rest.starts_with("/*") {
                self.closer = Some("*/");
                i += 2;
                continue;
            }
            if self.language == Language::Python {
                if rest.starts_with("\"\"\"") {
                    self.closer = Some("\"\"\"");
                    i += 3;
                    continue;
                }
                if rest.starts_with("'''") {
                    self.closer = Some("'''");
                    i += 3;
                    continue;
                }
            }

            let Some(ch) = rest.chars().next() else {
                break;
            };
            match ch {
                '"' | '`' => i = skip_string(line, i, ch),
                '\'' if self.language.single_quote_strings() => i = skip_string(line, i, ch),
                '\'' => i += char_literal_len(rest).unwrap_or(1),
                '{' => {
                    self.depth += 1;
                    info.opened_brace = true;
                    i += 1;
                }
                '}' => {
                    if self.depth == 0 {
                        info.underflow = true;
                    } else {
                        self.depth -= 1;
                    }
                    i += 1;
                }
                _ => i += ch.len_utf8(),
            }
        }
    }

    fn starts_line_comment(&self, line: &str, i: usize) -> bool {
        let rest = &line[i..];
        self.language.line_comments().iter().any(|token| {
            rest.starts_with(token)
                && (*token != "#"
                    || i == 0
                    || line[..i].ends_with(|c: char| c.is_whitespace()))
        })
    }
}

/// Index just past the string literal opening at `start`, or the line end
/// when it is not closed on this line.
fn skip_string(line: &str, start: usize, quote: char) -> usize {
    let mut escaped = false;
    for (offset, ch) in line[start + quote.len_utf8()..].char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return start + quote.len_utf8() + offset + ch.len_utf8();
        }
    }
    line.len()
}

/// Length of a char literal such as `'{'` or `'\n'` at the start of `rest`.
/// Lifetimes and lone quotes return `None`.
fn char_literal_len(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1);
    let (_, first) = chars.next()?;
    if first == '\\' {
        return rest[2..]
            .char_indices()
            .take(10)
            .find(|(offset, c)| *c == '\'' && *offset > 0)
            .map(|(offset, _)| 2 + offset + 1);
    }
    match chars.next() {
        Some((offset, '\'')) => Some(offset + 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max: usize) -> BoundaryChunker {
        BoundaryChunker::new(ChunkerConfig {
            max_chunk_lines: max,
            comment_lookback: DEFAULT_COMMENT_LOOKBACK,
        })
    }

    fn spans(chunks: &[Chunk<'_>]) -> Vec<(ChunkType, usize, usize)> {
        chunks
            .iter()
            .map(|c| (c.chunk_type, c.line_start, c.line_end))
            .collect()
    }

    /// Chunks are ordered, in range, bounded, verbatim, and leave only
    /// whitespace uncovered.
    fn assert_coverage(content: &str, chunks: &[Chunk<'_>], max: usize) {
        let index = LineIndex::new(content);
        let n = index.line_count();
        let mut next = 1;
        for chunk in chunks {
            assert!(chunk.line_start <= chunk.line_end, "inverted chunk {chunk:?}");
            assert!(chunk.line_end <= n, "chunk past EOF {chunk:?}");
            assert!(chunk.line_count() <= max, "chunk over bound {chunk:?}");
            assert!(chunk.line_start >= next, "overlapping chunk {chunk:?}");
            if chunk.line_start > next {
                let gap = index.slice(content, next, chunk.line_start - 1);
                assert!(gap.trim().is_empty(), "non-blank gap before {chunk:?}");
            }
            assert_eq!(chunk.text, index.slice(content, chunk.line_start, chunk.line_end));
            next = chunk.line_end + 1;
        }
        if next <= n {
            assert!(index.slice(content, next, n).trim().is_empty(), "non-blank tail");
        }
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        assert!(BoundaryChunker::default().chunk("", Language::Rust).is_empty());
        assert!(BoundaryChunker::default().chunk("", Language::Text).is_empty());
    }

    #[test]
    fn test_single_line_file() {
        let chunks = BoundaryChunker::default().chunk("print('hi')\n", Language::Python);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].line_start, 1);
        assert_eq!(chunks[0].line_end, 1);
        assert!(matches!(
            chunks[0].chunk_type,
            ChunkType::TopLevel | ChunkType::Window
        ));
    }

    #[test]
    fn test_ten_equal_functions() {
        let mut source = String::new();
        for f in 0..10 {
            source.push_str(&format!("int func_{f}(int x) {{\n"));
            for _ in 0..48 {
                source.push_str("    x = x + 1;\n");
            }
            source.push_str("}\n");
        }

        let chunks = chunker(80).chunk(&source, Language::C);
        assert_eq!(chunks.len(), 10);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_type, ChunkType::Function);
            assert_eq!(chunk.line_start, i * 50 + 1);
            assert_eq!(chunk.line_end, i * 50 + 50);
        }
        assert_coverage(&source, &chunks, 80);
    }

    #[test]
    fn test_python_module_layout() {
        let source = "\
import os
import sys

# Shared cache.
CACHE = {}


@dataclass
class Entry:
    key: str

    def size(self):
        return len(self.key)


def load(path):
    with open(path) as f:
        return f.read()

if __name__ == \"__main__\":
    load(sys.argv[1])
";
        let chunks = BoundaryChunker::default().chunk(source, Language::Python);
        assert_eq!(
            spans(&chunks),
            vec![
                (ChunkType::TopLevel, 1, 5),
                (ChunkType::Class, 6, 13),
                (ChunkType::Function, 14, 18),
                (ChunkType::TopLevel, 19, 21),
            ]
        );
        assert!(chunks[1].text.trim_start().starts_with("@dataclass\nclass Entry:"));
        assert_coverage(source, &chunks, 80);
    }

    #[test]
    fn test_rust_doc_comments_join_declaration() {
        let source = "\
use std::fmt;

/// A point.
#[derive(Debug)]
pub struct Point {
    x: i32,
}

/// Origin.
pub fn origin() -> Point {
    let s = \"}\";
    Point { x: 0 }
}
";
        let chunks = BoundaryChunker::default().chunk(source, Language::Rust);
        assert_eq!(
            spans(&chunks),
            vec![
                (ChunkType::TopLevel, 1, 1),
                (ChunkType::Class, 2, 7),
                (ChunkType::Function, 8, 13),
            ]
        );
        assert!(chunks[1].text.trim_start().starts_with("/// A point.\n#[derive(Debug)]"));
        assert!(chunks[2].text.trim_start().starts_with("/// Origin.\npub fn origin()"));
        assert_coverage(source, &chunks, 80);
    }

    #[test]
    fn test_lookback_is_capped() {
        let mut source = String::from("const A: u8 = 1;\n");
        for i in 0..8 {
            source.push_str(&format!("// note {i}\n"));
        }
        source.push_str("fn f() {}\n");

        let chunks = BoundaryChunker::new(ChunkerConfig {
            max_chunk_lines: 80,
            comment_lookback: 3,
        })
        .chunk(&source, Language::Rust);
        assert_eq!(
            spans(&chunks),
            vec![(ChunkType::TopLevel, 1, 6), (ChunkType::Function, 7, 10)]
        );
    }

    #[test]
    fn test_nested_declarations_stay_inside() {
        let source = "\
impl Store {
    fn get(&self) -> u8 {
        1
    }

    fn put(&mut self) {}
}
";
        let chunks = BoundaryChunker::default().chunk(source, Language::Rust);
        assert_eq!(spans(&chunks), vec![(ChunkType::Class, 1, 7)]);
    }

    #[test]
    fn test_oversized_block_becomes_windows() {
        let mut source = String::from("def big():\n");
        for i in 0..24 {
            source.push_str(&format!("    step_{i}()\n"));
        }
        source.push_str("\ndef small():\n    pass\n");

        let chunks = chunker(10).chunk(&source, Language::Python);
        assert_eq!(
            spans(&chunks),
            vec![
                (ChunkType::Window, 1, 10),
                (ChunkType::Window, 11, 20),
                (ChunkType::Window, 21, 25),
                (ChunkType::Function, 26, 28),
            ]
        );
        assert_coverage(&source, &chunks, 10);
    }

    #[test]
    fn test_unknown_language_without_breaks_uses_windows() {
        let source = (1..=25).map(|i| format!("line {i}\n")).collect::<String>();
        let chunks = chunker(10).chunk(&source, Language::Text);
        assert_eq!(
            spans(&chunks),
            vec![
                (ChunkType::Window, 1, 10),
                (ChunkType::Window, 11, 20),
                (ChunkType::Window, 21, 25),
            ]
        );
    }

    #[test]
    fn test_data_language_uses_windows() {
        let source = "{\n  \"a\": 1\n}\n";
        let chunks = BoundaryChunker::default().chunk(source, Language::Json);
        assert_eq!(spans(&chunks), vec![(ChunkType::Window, 1, 3)]);
    }

    #[test]
    fn test_code_without_markers_uses_windows() {
        let source = "package main\n\nvar x = 1\n";
        let chunks = BoundaryChunker::default().chunk(source, Language::Go);
        assert_eq!(spans(&chunks), vec![(ChunkType::Window, 1, 3)]);
    }

    #[test]
    fn test_markdown_sections_and_fences() {
        let source = "\
# Intro

First paragraph.

Second paragraph.

```sh
# not a heading
```

## Usage

Run it.
";
        let chunks = BoundaryChunker::default().chunk(source, Language::Markdown);
        assert_eq!(
            spans(&chunks),
            vec![(ChunkType::TopLevel, 1, 9), (ChunkType::TopLevel, 10, 13)]
        );
        assert!(chunks[1].text.trim_start().starts_with("## Usage"));
    }

    #[test]
    fn test_text_paragraphs_pack_up_to_bound() {
        let source = "a\nb\n\nc\nd\n\ne\nf\n\ng\n";
        let chunks = chunker(5).chunk(source, Language::Text);
        assert_eq!(
            spans(&chunks),
            vec![(ChunkType::TopLevel, 1, 5), (ChunkType::TopLevel, 6, 10)]
        );
        assert_coverage(source, &chunks, 5);
    }

    #[test]
    fn test_unbalanced_braces_degrade_to_window() {
        let source = "fn ok() {\n}\n\nfn broken() {\n    if x {\n";
        let chunks = BoundaryChunker::default().chunk(source, Language::Rust);
        assert_eq!(
            spans(&chunks),
            vec![(ChunkType::Function, 1, 2), (ChunkType::Window, 3, 5)]
        );
    }

    #[test]
    fn test_braces_in_strings_and_comments_ignored() {
        let source = "\
func a() {
\ts := \"{{{\"
\tc := '{'
\t// }
\t/* { */
}
func b() {}
";
        let chunks = BoundaryChunker::default().chunk(source, Language::Go);
        assert_eq!(
            spans(&chunks),
            vec![(ChunkType::Function, 1, 6), (ChunkType::Function, 7, 7)]
        );
    }

    #[test]
    fn test_whitespace_only_file_still_chunked() {
        let chunks = BoundaryChunker::default().chunk("\n   \n", Language::Rust);
        assert_eq!(spans(&chunks), vec![(ChunkType::Window, 1, 2)]);
    }

    #[test]
    fn test_leading_blank_lines_are_skipped() {
        let source = "\n\n\n\n\n\n\nfn main() {}\n";
        let chunks = chunker(80).chunk(source, Language::Rust);
        assert_eq!(spans(&chunks), vec![(ChunkType::Function, 3, 8)]);
        assert_coverage(source, &chunks, 80);
    }

    #[test]
    fn test_deterministic() {
        let source = "def a():\n    pass\n\nclass B:\n    x = 1\n";
        let first = BoundaryChunker::default().chunk(source, Language::Python);
        let second = BoundaryChunker::default().chunk(source, Language::Python);
        assert_eq!(first, second);
    }

    #[test]
    fn test_char_literal_len() {
        assert_eq!(char_literal_len("'{' rest"), Some(3));
        assert_eq!(char_literal_len("'\\n'"), Some(4));
        assert_eq!(char_literal_len("'a>"), None);
        assert_eq!(char_literal_len("'"), None);
    }

    #[test]
    fn test_chunk_type_names() {
        for t in [
            ChunkType::Function,
            ChunkType::Class,
            ChunkType::TopLevel,
            ChunkType::Window,
        ] {
            assert_eq!(ChunkType::from_name(t.as_str()), Some(t));
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{t}\""));
        }
    }

    mod proptest_chunker {
        use super::*;
        use proptest::prelude::*;

        const LINES: &[&str] = &[
            "",
            "   ",
            "fn a() {",
            "pub struct S {",
            "}",
            "    let x = \"{\";",
            "// comment",
            "/* open",
            "*/",
            "def f(x):",
            "class K:",
            "    return x",
            "@decorator",
            "# Title",
            "plain words here",
            "int g(int y) {",
            "```",
            "{",
            "end",
            "x = 1",
            "export function h(a) {",
            "const t = `tpl ${x} {`;",
            "public class C {",
            "    public void m() {",
            "fun k(): Int {",
            "namespace N {",
            "deploy() {",
            "<?php",
            "char c = '{';",
            "    # 注释 ünïcode",
        ];

        const LANGUAGES: &[Language] = &[
            Language::Rust,
            Language::Python,
            Language::C,
            Language::Cpp,
            Language::Go,
            Language::Java,
            Language::Kotlin,
            Language::CSharp,
            Language::TypeScript,
            Language::JavaScript,
            Language::Php,
            Language::Shell,
            Language::Ruby,
            Language::Markdown,
            Language::Text,
            Language::Json,
        ];

        const EOLS: &[&str] = &["\n", "\r\n"];

        fn content() -> impl Strategy<Value = String> {
            (
                prop::collection::vec(prop::sample::select(LINES), 0..160),
                proptest::bool::ANY,
                prop::sample::select(EOLS),
            )
                .prop_map(|(lines, trailing, eol)| {
                    let mut s = lines.join(eol);
                    if trailing && !s.is_empty() {
                        s.push_str(eol);
                    }
                    s
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(300))]

            #[test]
            fn chunks_cover_file_within_bound(
                content in content(),
                language in prop::sample::select(LANGUAGES),
                max in 1usize..40,
                lookback in 0usize..6,
            ) {
                let chunker = BoundaryChunker::new(ChunkerConfig {
                    max_chunk_lines: max,
                    comment_lookback: lookback,
                });
                let chunks = chunker.chunk(&content, language);
                if content.is_empty() {
                    prop_assert!(chunks.is_empty());
                } else {
                    prop_assert!(!chunks.is_empty());
                }
                assert_coverage(&content, &chunks, max);
            }

            #[test]
            fn chunking_is_deterministic(
                content in content(),
                language in prop::sample::select(LANGUAGES),
            ) {
                let chunker = BoundaryChunker::default();
                prop_assert_eq!(chunker.chunk(&content, language), chunker.chunk(&content, language));
            }
        }
    }
}
