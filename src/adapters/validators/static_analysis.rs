//! Language-aware static validation of generated code.
//!
//! The checks are deliberately structural: delimiter balance with
//! string/comment awareness, unterminated strings and block comments,
//! leftover markdown fences, and per-language block shape for Python.
//! Anything deeper (type checking, compilation) belongs to a heavier
//! validator behind the same port.

use async_trait::async_trait;
use regex::Regex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{IssueSeverity, ValidationIssue, ValidationReport};
use crate::domain::ports::CodeValidator;

/// Comment and string syntax of a language family.
#[derive(Debug, Clone, Copy)]
struct LanguageSyntax {
    line_comment: &'static str,
    block_comment: Option<(&'static str, &'static str)>,
    /// String delimiters, longest first.
    string_delims: &'static [&'static str],
}

const PYTHON_SYNTAX: LanguageSyntax = LanguageSyntax {
    line_comment: "#",
    block_comment: None,
    string_delims: &["\"\"\"", "'''", "\"", "'"],
};

// Single quotes excluded: lifetimes make them unreliable to scan.
const RUST_SYNTAX: LanguageSyntax = LanguageSyntax {
    line_comment: "//",
    block_comment: Some(("/*", "*/")),
    string_delims: &["\""],
};

const JS_SYNTAX: LanguageSyntax = LanguageSyntax {
    line_comment: "//",
    block_comment: Some(("/*", "*/")),
    string_delims: &["`", "\"", "'"],
};

const C_FAMILY_SYNTAX: LanguageSyntax = LanguageSyntax {
    line_comment: "//",
    block_comment: Some(("/*", "*/")),
    string_delims: &["\"", "'"],
};

fn syntax_for(language: &str) -> Option<LanguageSyntax> {
    match language.to_lowercase().as_str() {
        "python" | "py" => Some(PYTHON_SYNTAX),
        "rust" | "rs" => Some(RUST_SYNTAX),
        "javascript" | "js" | "typescript" | "ts" | "jsx" | "tsx" => Some(JS_SYNTAX),
        "go" | "golang" | "java" | "c" | "cpp" | "c++" | "csharp" | "c#" | "kotlin" | "swift"
        | "scala" => Some(C_FAMILY_SYNTAX),
        _ => None,
    }
}

/// Static-analysis implementation of the validator port.
pub struct StaticAnalysisValidator {
    todo_pattern: Regex,
}

impl StaticAnalysisValidator {
    pub fn new() -> Self {
        Self {
            // Compiled once; validate() is on the hot path.
            todo_pattern: Regex::new(r"(?i)\b(TODO|FIXME|XXX)\b").expect("static pattern compiles"),
        }
    }

    fn analyze(&self, code: &str, language: &str) -> ValidationReport {
        let mut issues = Vec::new();

        if code.trim().is_empty() {
            issues.push(ValidationIssue::new(
                IssueSeverity::Critical,
                "generated code is empty",
            ));
            return ValidationReport::failing(issues);
        }

        if code.contains("```") {
            issues.push(ValidationIssue::new(
                IssueSeverity::Error,
                "markdown fence delimiter left in generated code",
            ));
        }

        match syntax_for(language) {
            Some(syntax) => {
                scan_delimiters(code, syntax, IssueSeverity::Critical, &mut issues);
                if language.to_lowercase().starts_with("py") {
                    check_python_blocks(code, &mut issues);
                }
            }
            None => {
                // Unknown language: balance findings are advisory only.
                scan_delimiters(code, C_FAMILY_SYNTAX, IssueSeverity::Warning, &mut issues);
            }
        }

        if self.todo_pattern.is_match(code) {
            issues.push(ValidationIssue::new(
                IssueSeverity::Info,
                "code contains a TODO/FIXME marker",
            ));
        }

        let passed = !issues.iter().any(|issue| issue.severity.feeds_back());
        ValidationReport { passed, issues }
    }
}

impl Default for StaticAnalysisValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeValidator for StaticAnalysisValidator {
    fn name(&self) -> &'static str {
        "static-analysis"
    }

    async fn validate(&self, code: &str, language: &str) -> DomainResult<ValidationReport> {
        Ok(self.analyze(code, language))
    }
}

/// Scan for delimiter balance, skipping strings and comments.
fn scan_delimiters(
    code: &str,
    syntax: LanguageSyntax,
    imbalance_severity: IssueSeverity,
    issues: &mut Vec<ValidationIssue>,
) {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Str(&'static str),
        LineComment,
        BlockComment,
    }

    // Width of the UTF-8 character starting with this byte; keeps every
    // slice below on a character boundary.
    fn char_width(byte: u8) -> usize {
        match byte {
            b if b < 0x80 => 1,
            b if b >= 0xF0 => 4,
            b if b >= 0xE0 => 3,
            _ => 2,
        }
    }

    let bytes = code.as_bytes();
    let mut state = State::Code;
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut line = 1usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let rest = &code[i..];
        let byte = bytes[i];
        if byte == b'\n' {
            line += 1;
        }

        match state {
            State::Code => {
                if rest.starts_with(syntax.line_comment) {
                    state = State::LineComment;
                    i += syntax.line_comment.len();
                    continue;
                }
                if let Some((open, _)) = syntax.block_comment {
                    if rest.starts_with(open) {
                        state = State::BlockComment;
                        i += open.len();
                        continue;
                    }
                }
                if let Some(delim) = syntax
                    .string_delims
                    .iter()
                    .copied()
                    .find(|delim| rest.starts_with(delim))
                {
                    state = State::Str(delim);
                    i += delim.len();
                    continue;
                }
                match byte {
                    b'(' | b'[' | b'{' => stack.push((byte, line)),
                    b')' | b']' | b'}' => {
                        let expected = match byte {
                            b')' => b'(',
                            b']' => b'[',
                            _ => b'{',
                        };
                        match stack.pop() {
                            Some((open, _)) if open == expected => {}
                            _ => {
                                issues.push(ValidationIssue::new(
                                    imbalance_severity,
                                    format!(
                                        "unmatched closing delimiter `{}` at line {line}",
                                        byte as char
                                    ),
                                ));
                            }
                        }
                    }
                    _ => {}
                }
                i += char_width(byte);
            }
            State::Str(delim) => {
                if rest.starts_with('\\') {
                    // Skip the escaped character wholesale.
                    i += 1;
                    if i < bytes.len() {
                        i += char_width(bytes[i]);
                    }
                    continue;
                }
                if rest.starts_with(delim) {
                    state = State::Code;
                    i += delim.len();
                    continue;
                }
                if byte == b'\n' && delim.len() == 1 && delim != "`" {
                    issues.push(ValidationIssue::new(
                        IssueSeverity::Error,
                        format!("unterminated string literal at line {}", line - 1),
                    ));
                    state = State::Code;
                }
                i += char_width(byte);
            }
            State::LineComment => {
                if byte == b'\n' {
                    state = State::Code;
                }
                i += char_width(byte);
            }
            State::BlockComment => {
                if let Some((_, close)) = syntax.block_comment {
                    if rest.starts_with(close) {
                        state = State::Code;
                        i += close.len();
                        continue;
                    }
                }
                i += char_width(byte);
            }
        }
    }

    match state {
        State::Str(delim) if delim.len() > 1 || delim == "`" => {
            issues.push(ValidationIssue::new(
                IssueSeverity::Error,
                "unterminated multi-line string literal",
            ));
        }
        State::Str(_) => {
            issues.push(ValidationIssue::new(
                IssueSeverity::Error,
                "unterminated string literal at end of code",
            ));
        }
        State::BlockComment => {
            issues.push(ValidationIssue::new(
                IssueSeverity::Error,
                "unterminated block comment",
            ));
        }
        _ => {}
    }

    for (open, opened_at) in stack {
        issues.push(ValidationIssue::new(
            imbalance_severity,
            format!("unclosed delimiter `{}` opened at line {opened_at}", open as char),
        ));
    }
}

/// Python-specific checks: block introducers need an indented body, and
/// indentation must not mix tabs and spaces.
fn check_python_blocks(code: &str, issues: &mut Vec<ValidationIssue>) {
    let lines: Vec<&str> = code.lines().collect();
    let mut saw_tab_indent = false;
    let mut saw_space_indent = false;

    for (index, raw_line) in lines.iter().enumerate() {
        let line = strip_python_comment(raw_line);
        let trimmed = line.trim_end();

        let indent: String = raw_line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
        if !raw_line.trim().is_empty() {
            saw_tab_indent |= indent.contains('\t');
            saw_space_indent |= indent.contains(' ');
        }

        if !trimmed.ends_with(':') || !is_block_introducer(trimmed.trim_start()) {
            continue;
        }
        let introducer_indent = indent.chars().count();

        // Find the next non-empty, non-comment line.
        let body = lines[index + 1..]
            .iter()
            .map(|l| (*l, strip_python_comment(l)))
            .find(|(raw, stripped)| !raw.trim().is_empty() && !stripped.trim().is_empty());

        let indented = body.is_some_and(|(raw, _)| {
            raw.chars().take_while(|c| *c == ' ' || *c == '\t').count() > introducer_indent
        });
        if !indented {
            issues.push(ValidationIssue::new(
                IssueSeverity::Error,
                format!("expected an indented block after line {}", index + 1),
            ));
        }
    }

    if saw_tab_indent && saw_space_indent {
        issues.push(ValidationIssue::new(
            IssueSeverity::Warning,
            "indentation mixes tabs and spaces",
        ));
    }
}

/// Whether a stripped Python line opens a suite (so a dict key ending in
/// `:` is not mistaken for one).
fn is_block_introducer(line: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "def", "class", "if", "elif", "else", "for", "while", "try", "except", "finally",
        "with", "match", "case", "async",
    ];
    let first = line.split_whitespace().next().unwrap_or("");
    let first = first.trim_end_matches(':');
    KEYWORDS.contains(&first)
}

/// Drop a trailing `#` comment, ignoring `#` inside simple strings.
fn strip_python_comment(line: &str) -> &str {
    let mut in_string: Option<char> = None;
    for (idx, ch) in line.char_indices() {
        match in_string {
            Some(quote) => {
                if ch == quote {
                    in_string = None;
                }
            }
            None => match ch {
                '"' | '\'' => in_string = Some(ch),
                '#' => return &line[..idx],
                _ => {}
            },
        }
    }
    line
}
