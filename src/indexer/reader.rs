/// Line-exact source reading.
///
/// Files are read once per ingestion pass and kept verbatim: line terminators,
/// indentation and trailing whitespace are never normalized, so every line
/// number handed out downstream points at the exact bytes on disk.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::languages::Language;

/// Reasons a file cannot be turned into a [`SourceFile`].
///
/// All of them are per-file: the ingestion driver logs and skips the file.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("binary file skipped: {0}")]
    Binary(PathBuf),

    #[error("not valid UTF-8: {0}")]
    Decode(PathBuf),

    #[error("file too large ({size} bytes, limit {limit}): {path}")]
    TooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },
}

/// Byte offsets of every line start within a text.
///
/// A line ends after its `\n` (a `\r\n` pair stays inside the line). A last
/// line without terminator still counts; a trailing `\n` does not open an
/// extra empty line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = Vec::new();
        if !content.is_empty() {
            starts.push(0);
            for (i, b) in content.bytes().enumerate() {
                if b == b'\n' && i + 1 < content.len() {
                    starts.push(i + 1);
                }
            }
        }
        Self {
            starts,
            len: content.len(),
        }
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Byte range covering lines `start..=end` (1-indexed), clamped to the text.
    pub fn byte_range(&self, start: usize, end: usize) -> std::ops::Range<usize> {
        let count = self.line_count();
        if count == 0 || start == 0 || start > end || start > count {
            return 0..0;
        }
        let end = end.min(count);
        let from = self.starts[start - 1];
        let to = if end == count {
            self.len
        } else {
            self.starts[end]
        };
        from..to
    }

    /// Literal text of lines `start..=end` (1-indexed), terminators included.
    pub fn slice<'a>(&self, content: &'a str, start: usize, end: usize) -> &'a str {
        &content[self.byte_range(start, end)]
    }

    /// Literal text of a single line, terminator included.
    pub fn line<'a>(&self, content: &'a str, number: usize) -> &'a str {
        self.slice(content, number, number)
    }
}

/// One file of the repository, immutable for the duration of an ingestion pass.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub language: Language,
    content: String,
    lines: LineIndex,
}

impl SourceFile {
    /// Build a source file from already-decoded content.
    pub fn from_content(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = normalize_path(&path.into());
        let content = content.into();
        let lines = LineIndex::new(&content);
        let language = Language::from_path(&path);
        Self {
            path,
            language,
            content,
            lines,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn line_count(&self) -> usize {
        self.lines.line_count()
    }

    /// Final path component, used in citations.
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Literal text of lines `start..=end` (1-indexed, inclusive).
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.lines.slice(&self.content, start, end)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Read `path` and key it by its location relative to `root`.
///
/// Rejects binary content (a NUL byte) and invalid UTF-8. `max_bytes` of 0
/// disables the size guard.
pub fn read_source(root: &Path, path: &Path, max_bytes: u64) -> Result<SourceFile, ReadError> {
    if max_bytes > 0 {
        let size = fs::metadata(path)
            .map_err(|source| ReadError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > max_bytes {
            return Err(ReadError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: max_bytes,
            });
        }
    }

    let bytes = fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.contains(&0) {
        return Err(ReadError::Binary(path.to_path_buf()));
    }

    let content = String::from_utf8(bytes).map_err(|_| ReadError::Decode(path.to_path_buf()))?;

    Ok(SourceFile::from_content(relative_key(root, path), content))
}

/// Repository-relative key for `path`, falling back to the path itself.
pub fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    normalize_path(&rel.to_string_lossy())
}

fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}
