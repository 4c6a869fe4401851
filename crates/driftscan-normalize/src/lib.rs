//! Canonical text normalization for fingerprinting.
//!
//! Raw file bytes become a canonical single-line form: comments removed per
//! the file's comment syntax, whitespace runs collapsed to single spaces,
//! leading/trailing whitespace trimmed. The output is what gets hashed, so
//! this must be a pure function of its input. An unknown language hint falls
//! back to whitespace-only normalization rather than failing the run.

#![forbid(unsafe_code)]

/// Comment syntax family selected by a language hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSyntax {
    /// `// ...` line comments and terminated `/* ... */` blocks.
    CLike,
    /// `# ...` line comments.
    Hash,
    /// `-- ...` line comments.
    Dash,
    /// No comment stripping; whitespace normalization only.
    None,
}

impl CommentSyntax {
    /// Map a free-form language hint (module config string or file
    /// extension) to a comment syntax. Unrecognized hints get `None`.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "c" | "h" | "cpp" | "cc" | "cxx" | "hpp" | "c++" | "rust" | "rs" | "go" | "java"
            | "js" | "javascript" | "ts" | "typescript" | "cs" | "csharp" | "kotlin" | "swift"
            | "scala" | "zig" => CommentSyntax::CLike,
            "py" | "python" | "rb" | "ruby" | "sh" | "shell" | "bash" | "yaml" | "yml"
            | "toml" | "perl" | "makefile" | "dockerfile" => CommentSyntax::Hash,
            "sql" | "lua" | "haskell" | "hs" | "elm" | "ada" => CommentSyntax::Dash,
            _ => CommentSyntax::None,
        }
    }
}

/// Normalize raw file bytes into canonical text.
///
/// Bytes are decoded as UTF-8 with lossy replacement so binary junk cannot
/// fail the run; replacement characters hash like any other content.
pub fn normalize(raw: &[u8], hint: &str) -> String {
    normalize_text(&String::from_utf8_lossy(raw), CommentSyntax::from_hint(hint))
}

/// Normalize already-decoded text with an explicit syntax.
pub fn normalize_text(text: &str, syntax: CommentSyntax) -> String {
    let stripped = match syntax {
        CommentSyntax::CLike => strip_line_comments(&strip_block_comments(text), "//"),
        CommentSyntax::Hash => strip_line_comments(text, "#"),
        CommentSyntax::Dash => strip_line_comments(text, "--"),
        CommentSyntax::None => text.to_string(),
    };
    collapse_whitespace(&stripped)
}

/// Remove terminated `/* ... */` blocks, replacing each with one space.
/// An opener with no closer is left in place.
fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        match rest[start + 2..].find("*/") {
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push(' ');
                rest = &rest[start + 2 + end + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Remove `marker ...` through end of line, replacing with one space.
fn strip_line_comments(text: &str, marker: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match line.find(marker) {
            Some(pos) => {
                out.push_str(&line[..pos]);
                out.push(' ');
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Collapse every whitespace run (including newlines) to a single space and
/// trim the ends.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for token in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}
