use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Language tag attached to every source file and chunk.
///
/// Detection is purely extension-based; unknown extensions map to
/// [`Language::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Go,
    TypeScript,
    JavaScript,
    Rust,
    Java,
    Kotlin,
    Scala,
    Swift,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Shell,
    Markdown,
    Json,
    Yaml,
    Toml,
    Sql,
    Html,
    Css,
    Text,
}

/// How a language delimits its top-level blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStructure {
    /// `{ ... }` bodies; base level is brace depth 0.
    Brace,
    /// Indentation bodies (or `end`-terminated); base level is column 0.
    Indent,
    /// Headings and paragraphs.
    Prose,
}

const ALL: &[Language] = &[
    Language::Python,
    Language::Go,
    Language::TypeScript,
    Language::JavaScript,
    Language::Rust,
    Language::Java,
    Language::Kotlin,
    Language::Scala,
    Language::Swift,
    Language::C,
    Language::Cpp,
    Language::CSharp,
    Language::Ruby,
    Language::Php,
    Language::Shell,
    Language::Markdown,
    Language::Json,
    Language::Yaml,
    Language::Toml,
    Language::Sql,
    Language::Html,
    Language::Css,
    Language::Text,
];

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyi" => Language::Python,
            "go" => Language::Go,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "scala" | "sc" => Language::Scala,
            "swift" => Language::Swift,
            "c" | "h" => Language::C,
            "cc" | "cpp" | "cxx" | "hh" | "hpp" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "sh" | "bash" | "zsh" => Language::Shell,
            "md" | "markdown" | "mdx" => Language::Markdown,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "toml" => Language::Toml,
            "sql" => Language::Sql,
            "html" | "htm" => Language::Html,
            "css" | "scss" => Language::Css,
            _ => Language::Text,
        }
    }

    /// Detect from a path; no extension means `text`.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Text)
    }

    /// Parse a tag previously produced by [`Language::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|l| l.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Go => "go",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Swift => "swift",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Shell => "shell",
            Language::Markdown => "markdown",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Text => "text",
        }
    }

    pub fn structure(self) -> Option<BlockStructure> {
        match self {
            Language::Python | Language::Ruby => Some(BlockStructure::Indent),
            Language::Markdown | Language::Text => Some(BlockStructure::Prose),
            Language::Json
            | Language::Yaml
            | Language::Toml
            | Language::Sql
            | Language::Html
            | Language::Css => None,
            _ => Some(BlockStructure::Brace),
        }
    }

    pub fn line_comments(self) -> &'static [&'static str] {
        match self {
            Language::Python
            | Language::Ruby
            | Language::Shell
            | Language::Yaml
            | Language::Toml => &["#"],
            Language::Php => &["//", "#"],
            Language::Sql => &["--"],
            Language::Markdown
            | Language::Text
            | Language::Json
            | Language::Html
            | Language::Css => &[],
            _ => &["//"],
        }
    }

    /// Whether `/* ... */` block comments exist.
    pub fn has_block_comments(self) -> bool {
        match self {
            Language::Shell => false,
            Language::Css | Language::Sql => true,
            _ => self.structure() == Some(BlockStructure::Brace),
        }
    }

    /// Whether `'...'` delimits strings rather than char literals or lifetimes.
    pub fn single_quote_strings(self) -> bool {
        matches!(
            self,
            Language::Python
                | Language::Ruby
                | Language::Shell
                | Language::Php
                | Language::JavaScript
                | Language::TypeScript
                | Language::Sql
        )
    }

    /// Lines that decorate the next declaration: `@decorator`, `#[attr]`,
    /// `[Attribute]`, `template <...>`.
    pub fn is_annotation(self, trimmed: &str) -> bool {
        match self {
            Language::Python
            | Language::Java
            | Language::Kotlin
            | Language::Scala
            | Language::Swift
            | Language::TypeScript
            | Language::JavaScript => trimmed.starts_with('@'),
            Language::Rust => trimmed.starts_with("#[") || trimmed.starts_with("#!["),
            Language::CSharp => trimmed.starts_with('[') && trimmed.ends_with(']'),
            Language::Cpp => trimmed.starts_with("template"),
            Language::Php => trimmed.starts_with("#["),
            _ => false,
        }
    }

    /// Whether `trimmed` is a comment line (or a continuation of a block comment).
    pub fn is_comment(self, trimmed: &str) -> bool {
        if self.line_comments().iter().any(|p| trimmed.starts_with(p)) {
            return true;
        }
        if self.has_block_comments()
            && (trimmed.starts_with("/*") || trimmed.starts_with("*/") || trimmed.starts_with('*'))
        {
            return true;
        }
        if matches!(self, Language::Python) {
            return trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''");
        }
        false
    }

    /// Boundary rule for this language, if it has one.
    pub fn boundary_rule(self) -> Option<&'static dyn BoundaryRule> {
        let rule: &'static dyn BoundaryRule = match self {
            Language::Python => &*PYTHON,
            Language::Go => &*GO,
            Language::TypeScript | Language::JavaScript => &*ECMASCRIPT,
            Language::Rust => &*RUST,
            Language::Java => &*JAVA,
            Language::Kotlin => &*KOTLIN,
            Language::Scala => &*SCALA,
            Language::Swift => &*SWIFT,
            Language::C => &*C_FAMILY,
            Language::Cpp => &*CPP,
            Language::CSharp => &*CSHARP,
            Language::Ruby => &*RUBY,
            Language::Php => &*PHP,
            Language::Shell => &*SHELL,
            Language::Markdown => &MARKDOWN,
            Language::Text => &PLAIN_TEXT,
            Language::Json
            | Language::Yaml
            | Language::Toml
            | Language::Sql
            | Language::Html
            | Language::Css => return None,
        };
        Some(rule)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Boundary rules ───────────────────────────────────────────────────

/// What a line opens when it starts a new logical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Function,
    Class,
    /// Hard prose break (markdown heading).
    Heading,
    /// Soft prose break; neighbouring paragraphs may be packed together.
    Paragraph,
}

/// Scanner state visible to a rule when it looks at a line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineContext {
    /// Brace depth before the line.
    pub depth: usize,
    /// Leading whitespace width of the line.
    pub indent: usize,
    pub prev_blank: bool,
    /// Inside a block comment, multi-line string or fenced region.
    pub in_block: bool,
}

/// Decides whether a base-level line starts a declaration.
pub trait BoundaryRule: Send + Sync {
    fn classify(&self, line: &str, ctx: &LineContext) -> Option<Marker>;
}

/// Regex table of function and class openers for one language.
pub struct MarkerRule {
    function: Vec<Regex>,
    class: Vec<Regex>,
    exclude: Option<Regex>,
}

impl MarkerRule {
    fn new(function: &[&str], class: &[&str], exclude: Option<&str>) -> Self {
        let compile = |p: &&str| Regex::new(p).expect("invalid boundary pattern");
        Self {
            function: function.iter().map(compile).collect(),
            class: class.iter().map(compile).collect(),
            exclude: exclude.map(|p| Regex::new(p).expect("invalid exclusion pattern")),
        }
    }
}

impl BoundaryRule for MarkerRule {
    fn classify(&self, line: &str, ctx: &LineContext) -> Option<Marker> {
        if ctx.in_block {
            return None;
        }
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        if self.exclude.as_ref().is_some_and(|re| re.is_match(text)) {
            return None;
        }
        if self.function.iter().any(|re| re.is_match(text)) {
            return Some(Marker::Function);
        }
        if self.class.iter().any(|re| re.is_match(text)) {
            return Some(Marker::Class);
        }
        None
    }
}

/// Headings (markdown only) and paragraph breaks.
pub struct ProseRule {
    headings: bool,
}

impl BoundaryRule for ProseRule {
    fn classify(&self, line: &str, ctx: &LineContext) -> Option<Marker> {
        if ctx.in_block {
            return None;
        }
        let text = line.trim_end();
        if text.trim_start().is_empty() {
            return None;
        }
        if self.headings && is_atx_heading(text) {
            return Some(Marker::Heading);
        }
        if ctx.prev_blank {
            return Some(Marker::Paragraph);
        }
        None
    }
}

fn is_atx_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    (1..=6).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ' || c == '\t')
}

static MARKDOWN: ProseRule = ProseRule { headings: true };
static PLAIN_TEXT: ProseRule = ProseRule { headings: false };

static RUST: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[
            r#"^(pub(\([^)]*\))?\s+)?(default\s+)?(const\s+)?(async\s+)?(unsafe\s+)?(extern\s+"[^"]*"\s+)?fn\s+\w+"#,
            r"^macro_rules!\s*\w+",
        ],
        &[r"^(pub(\([^)]*\))?\s+)?(unsafe\s+)?(struct|enum|union|trait|impl|mod)\b"],
        None,
    )
});

static PYTHON: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(&[r"^(async\s+)?def\s+\w+"], &[r"^class\s+\w+"], None)
});

static GO: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[r"^func\b"],
        &[r"^type\s+\w+(\[[^\]]*\])?\s+(struct|interface)\b"],
        None,
    )
});

static ECMASCRIPT: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[
            r"^(export\s+)?(default\s+)?(declare\s+)?(async\s+)?function\b",
            r"^(export\s+)?(const|let|var)\s+\w+(\s*:[^=]+)?\s*=\s*(async\s+)?(function\b|\([^)]*\)\s*(:[^=]+)?=>|\w+\s*=>)",
        ],
        &[
            r"^(export\s+)?(default\s+)?(declare\s+)?(abstract\s+)?(class|interface|namespace|module)\b",
            r"^(export\s+)?(declare\s+)?(const\s+)?enum\s+\w+",
        ],
        None,
    )
});

static JAVA: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[],
        &[r"^((public|protected|private|abstract|final|static|sealed|non-sealed|strictfp)\s+)*(class|interface|enum|record|@interface)\s+\w+"],
        None,
    )
});

static KOTLIN: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[r"^((public|private|internal|protected|inline|suspend|tailrec|operator|infix|override|open|abstract|actual|expect)\s+)*fun\b"],
        &[r"^((public|private|internal|protected|open|abstract|sealed|data|enum|annotation|inner|value)\s+)*(class|interface|object)\b"],
        None,
    )
});

static SCALA: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[r"^((private|protected|override|final|implicit|inline)\s+)*def\b"],
        &[r"^((private|protected|final|sealed|abstract|implicit|case)\s+)*(class|trait|object|enum)\b"],
        None,
    )
});

static SWIFT: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[r"^((public|private|internal|fileprivate|open|static|final|mutating)\s+)*func\b"],
        &[r"^((public|private|internal|fileprivate|open|final|indirect)\s+)*(class|struct|enum|protocol|extension|actor)\b"],
        None,
    )
});

const C_CONTROL: &str = r"^(#|(if|else|for|while|switch|return|do|case|goto|typedef|using|sizeof)\b)";

static C_FAMILY: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[r"^[A-Za-z_][\w\s\*&:<>,]*[\s\*&]\**[A-Za-z_][\w:]*\s*\([^;]*$"],
        &[r"^(typedef\s+)?(struct|union|enum)\b[^;(]*$"],
        Some(C_CONTROL),
    )
});

static CPP: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[r"^[A-Za-z_][\w\s\*&:<>,~]*[\s\*&]\**~?[A-Za-z_][\w:~]*\s*\([^;]*$"],
        &[r"^(typedef\s+)?(struct|union|enum|class|namespace)\b[^;(]*$"],
        Some(C_CONTROL),
    )
});

static CSHARP: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[],
        &[r"^((public|protected|private|internal|abstract|sealed|static|partial|readonly|unsafe|file)\s+)*(class|interface|enum|struct|record|namespace)\b"],
        None,
    )
});

static RUBY: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(&[r"^def\s"], &[r"^(class|module)\s"], None)
});

static PHP: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(
        &[r"^((public|private|protected|static|final|abstract)\s+)*function\b"],
        &[r"^((abstract|final|readonly)\s+)*(class|interface|trait|enum)\b"],
        None,
    )
});

static SHELL: LazyLock<MarkerRule> = LazyLock::new(|| {
    MarkerRule::new(&[r"^function\s+[\w-]+", r"^[\w-]+\s*\(\)"], &[], None)
});

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LineContext {
        LineContext::default()
    }

    fn classify(lang: Language, line: &str) -> Option<Marker> {
        lang.boundary_rule()
            .and_then(|rule| rule.classify(line, &base()))
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("TSX"), Language::TypeScript);
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("md"), Language::Markdown);
        assert_eq!(Language::from_extension("xyz"), Language::Text);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/main.rs"), Language::Rust);
        assert_eq!(Language::from_path("pkg/server.go"), Language::Go);
        assert_eq!(Language::from_path("Makefile"), Language::Text);
        assert_eq!(Language::from_path(".bashrc"), Language::Text);
        assert_eq!(Language::from_path("notes"), Language::Text);
    }

    #[test]
    fn test_name_round_trip() {
        for lang in ALL {
            assert_eq!(Language::from_name(lang.as_str()), Some(*lang));
            let json = serde_json::to_string(lang).unwrap();
            assert_eq!(json, format!("\"{}\"", lang.as_str()));
        }
        assert_eq!(Language::from_name("cobol"), None);
    }

    #[test]
    fn test_rust_markers() {
        assert_eq!(classify(Language::Rust, "fn main() {"), Some(Marker::Function));
        assert_eq!(
            classify(Language::Rust, "pub(crate) async fn load(path: &Path) -> Result<()> {"),
            Some(Marker::Function)
        );
        assert_eq!(classify(Language::Rust, "impl<T> Store<T> {"), Some(Marker::Class));
        assert_eq!(classify(Language::Rust, "pub struct Config {"), Some(Marker::Class));
        assert_eq!(classify(Language::Rust, "use std::fs;"), None);
        assert_eq!(classify(Language::Rust, "let impl_count = 3;"), None);
    }

    #[test]
    fn test_python_markers() {
        assert_eq!(classify(Language::Python, "def run(self):"), Some(Marker::Function));
        assert_eq!(classify(Language::Python, "async def fetch():"), Some(Marker::Function));
        assert_eq!(classify(Language::Python, "class Cache(Base):"), Some(Marker::Class));
        assert_eq!(classify(Language::Python, "import os"), None);
        assert_eq!(classify(Language::Python, "default = 3"), None);
    }

    #[test]
    fn test_go_markers() {
        assert_eq!(
            classify(Language::Go, "func (s *Server) Start() error {"),
            Some(Marker::Function)
        );
        assert_eq!(classify(Language::Go, "type Server struct {"), Some(Marker::Class));
        assert_eq!(classify(Language::Go, "type ID string"), None);
        assert_eq!(classify(Language::Go, "package main"), None);
    }

    #[test]
    fn test_ecmascript_markers() {
        assert_eq!(
            classify(Language::TypeScript, "export async function load(): Promise<void> {"),
            Some(Marker::Function)
        );
        assert_eq!(
            classify(Language::TypeScript, "export const handler = async (req: Req) => {"),
            Some(Marker::Function)
        );
        assert_eq!(
            classify(Language::JavaScript, "export default class App extends Base {"),
            Some(Marker::Class)
        );
        assert_eq!(classify(Language::TypeScript, "interface Props {"), Some(Marker::Class));
        assert_eq!(classify(Language::JavaScript, "const x = 42;"), None);
        assert_eq!(classify(Language::JavaScript, "import fs from 'fs';"), None);
    }

    #[test]
    fn test_c_markers() {
        assert_eq!(classify(Language::C, "int func_0(int x) {"), Some(Marker::Function));
        assert_eq!(
            classify(Language::C, "static const char *name_of(enum kind k)"),
            Some(Marker::Function)
        );
        assert_eq!(classify(Language::C, "struct point {"), Some(Marker::Class));
        assert_eq!(classify(Language::C, "int counter = next(3);"), None);
        assert_eq!(classify(Language::C, "#include <stdio.h>"), None);
        assert_eq!(classify(Language::C, "return foo(x)"), None);
    }

    #[test]
    fn test_rules_ignore_block_context() {
        let rule = Language::Rust.boundary_rule().unwrap();
        let ctx = LineContext {
            in_block: true,
            ..Default::default()
        };
        assert_eq!(rule.classify("fn hidden() {", &ctx), None);
    }

    #[test]
    fn test_prose_markers() {
        let md = Language::Markdown.boundary_rule().unwrap();
        assert_eq!(md.classify("# Title", &base()), Some(Marker::Heading));
        assert_eq!(md.classify("###", &base()), Some(Marker::Heading));
        assert_eq!(md.classify("#hashtag", &base()), None);
        let after_blank = LineContext {
            prev_blank: true,
            ..Default::default()
        };
        assert_eq!(md.classify("Some text", &after_blank), Some(Marker::Paragraph));
        assert_eq!(md.classify("Some text", &base()), None);

        let text = Language::Text.boundary_rule().unwrap();
        assert_eq!(text.classify("# not a heading", &base()), None);
        assert_eq!(text.classify("para", &after_blank), Some(Marker::Paragraph));
    }

    #[test]
    fn test_data_languages_have_no_rule() {
        assert!(Language::Json.boundary_rule().is_none());
        assert!(Language::Yaml.boundary_rule().is_none());
        assert!(Language::Json.structure().is_none());
    }

    #[test]
    fn test_comment_and_annotation_lines() {
        assert!(Language::Rust.is_comment("/// docs"));
        assert!(Language::Rust.is_comment("* continued"));
        assert!(Language::Python.is_comment("# note"));
        assert!(!Language::Python.is_comment("x = 1"));
        assert!(Language::Python.is_annotation("@dataclass"));
        assert!(Language::Rust.is_annotation("#[derive(Debug)]"));
        assert!(!Language::Go.is_annotation("@x"));
    }
}
