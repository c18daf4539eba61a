//! Scope-aware text patching for virtual-host documents.
//!
//! Works on lines. The encrypted block is found by its secure listener,
//! bounded by brace depth, and content is spliced after the first line in
//! that block matching an anchor. A patch that cannot find its block or
//! anchor leaves the document untouched.

use log::debug;
use regex::Regex;
use std::sync::OnceLock;

const CHILD_INDENT: &str = "    ";

fn secure_listen_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*listen\s+(?:\S+:)?443\b[^;#]*\bssl\b").expect("static regex")
    })
}

fn root_location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*location\s+(?:=\s*|\^~\s*)?/\s*\{").expect("static regex")
    })
}

/// True when the line is a listen directive on 443 qualified with `ssl`
pub fn is_secure_listen(line: &str) -> bool {
    secure_listen_re().is_match(line)
}

/// True when the line opens the `/` location block
pub fn is_root_location(line: &str) -> bool {
    root_location_re().is_match(line)
}

/// Count block openers and closers on a line, ignoring quoted text and comments
pub fn brace_counts(line: &str) -> (usize, usize) {
    let mut opens = 0;
    let mut closes = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    // `#` opens a comment only where a new token would start
    let mut token_start = true;

    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some(q) => {
                if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                match c {
                    '#' if token_start => break,
                    '"' | '\'' => quote = Some(c),
                    '{' => opens += 1,
                    '}' => closes += 1,
                    _ => {}
                }
                token_start = c.is_whitespace() || matches!(c, '{' | '}' | ';');
            }
        }
    }

    (opens, closes)
}

/// Net brace balance of a run of lines
pub fn brace_balance<S: AsRef<str>>(lines: &[S]) -> i64 {
    lines
        .iter()
        .map(|l| {
            let (o, c) = brace_counts(l.as_ref());
            o as i64 - c as i64
        })
        .sum()
}

fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

/// Line span of a block: the opening line and the line where it closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub open: usize,
    /// Closing line, or the last line of an unterminated block
    pub close: usize,
}

impl BlockSpan {
    pub fn contains(&self, line: usize) -> bool {
        line >= self.open && line <= self.close
    }
}

/// Locate the block bound to the secure listener
pub fn secure_block<S: AsRef<str>>(lines: &[S]) -> Option<BlockSpan> {
    let marker = lines.iter().position(|l| is_secure_listen(l.as_ref()))?;
    let open = enclosing_open(lines, marker)?;
    Some(BlockSpan {
        open,
        close: block_close(lines, open),
    })
}

/// Nearest line at or before `from` that opens a block still open at `from`
fn enclosing_open<S: AsRef<str>>(lines: &[S], from: usize) -> Option<usize> {
    let (opens, closes) = brace_counts(lines[from].as_ref());
    if opens > closes {
        return Some(from);
    }

    let mut pending = 0usize;
    for i in (0..from).rev() {
        let (opens, closes) = brace_counts(lines[i].as_ref());
        pending += closes;
        if opens > pending {
            return Some(i);
        }
        pending -= opens;
    }
    None
}

/// Line where the block opened on `open` returns to depth zero
fn block_close<S: AsRef<str>>(lines: &[S], open: usize) -> usize {
    let mut depth: i64 = 1;
    for (i, line) in lines.iter().enumerate().skip(open + 1) {
        let (opens, closes) = brace_counts(line.as_ref());
        depth += opens as i64 - closes as i64;
        if depth <= 0 {
            return i;
        }
    }
    lines.len().saturating_sub(1)
}

/// Line pattern content is spliced after
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// `location / {`
    RootLocation,
    /// A directive by name, e.g. `server_name`
    Directive(String),
    /// An exact line, compared trimmed
    Line(String),
}

impl Anchor {
    pub fn directive(name: impl Into<String>) -> Self {
        Anchor::Directive(name.into())
    }

    pub fn line(line: impl Into<String>) -> Self {
        Anchor::Line(line.into().trim().to_string())
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            Anchor::RootLocation => is_root_location(line),
            Anchor::Directive(name) => {
                let trimmed = line.trim_start();
                trimmed
                    .strip_prefix(name.as_str())
                    .map(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == ';'))
                    .unwrap_or(false)
            }
            Anchor::Line(expected) => line.trim() == expected,
        }
    }
}

/// Which matching line wins when an anchor matches more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occurrence {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSecureBlock,
    NoAnchor,
    UnbalancedContent,
    EmptyContent,
}

/// Result of one patch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied {
        /// Index of the anchor line
        line: usize,
        /// Which entry of the anchor chain matched
        anchor: usize,
    },
    Skipped(SkipReason),
}

impl PatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PatchOutcome::Applied { .. })
    }
}

/// Document held as lines, trailing newline remembered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            trailing_newline: text.ends_with('\n'),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn secure_block(&self) -> Option<BlockSpan> {
        secure_block(&self.lines)
    }

    /// Splice `content` after the first line in the encrypted block matching
    /// an anchor. Anchors are tried in order; the first that matches wins.
    /// Content is indented to the anchor, one level deeper when the anchor
    /// opens a block.
    pub fn inject(
        &mut self,
        anchors: &[Anchor],
        occurrence: Occurrence,
        content: &[String],
    ) -> PatchOutcome {
        if content.is_empty() {
            return PatchOutcome::Skipped(SkipReason::EmptyContent);
        }
        if brace_balance(content) != 0 {
            return PatchOutcome::Skipped(SkipReason::UnbalancedContent);
        }
        let Some(span) = self.secure_block() else {
            return PatchOutcome::Skipped(SkipReason::NoSecureBlock);
        };

        for (anchor_idx, anchor) in anchors.iter().enumerate() {
            let mut found = None;
            for i in span.open + 1..span.close {
                if anchor.matches(&self.lines[i]) {
                    found = Some(i);
                    if occurrence == Occurrence::First {
                        break;
                    }
                }
            }

            if let Some(line) = found {
                self.splice_after(line, content);
                debug!(
                    "patched {} line(s) after line {} ({:?})",
                    content.len(),
                    line + 1,
                    anchor
                );
                return PatchOutcome::Applied {
                    line,
                    anchor: anchor_idx,
                };
            }
        }

        PatchOutcome::Skipped(SkipReason::NoAnchor)
    }

    fn splice_after(&mut self, line: usize, content: &[String]) {
        let anchor = &self.lines[line];
        let mut indent = indentation(anchor).to_string();
        let (opens, closes) = brace_counts(anchor);
        if opens > closes {
            indent.push_str(CHILD_INDENT);
        }

        let spliced: Vec<String> = content
            .iter()
            .map(|l| {
                if l.trim().is_empty() {
                    String::new()
                } else {
                    format!("{}{}", indent, l)
                }
            })
            .collect();

        self.lines.splice(line + 1..line + 1, spliced);
    }

    /// Rewrite lines of the encrypted block one at a time. Returns the number
    /// of lines changed, or `None` when there is no encrypted block.
    pub fn edit_secure_block<F>(&mut self, mut edit: F) -> Option<usize>
    where
        F: FnMut(&ScopedLine<'_>) -> LineEdit,
    {
        let span = self.secure_block()?;
        let mut out = Vec::with_capacity(self.lines.len());
        let mut changed = 0;
        let mut stack: Vec<String> = Vec::new();

        for (i, line) in self.lines.iter().enumerate() {
            if !span.contains(i) || i == span.open || i == span.close {
                out.push(line.clone());
                continue;
            }

            let in_location = stack.iter().any(|name| name == "location");
            let scoped = ScopedLine {
                index: i,
                depth: stack.len() + 1,
                in_location,
                text: line,
            };

            match edit(&scoped) {
                LineEdit::Keep => out.push(line.clone()),
                LineEdit::Remove => changed += 1,
                LineEdit::InsertAfter(extra) => {
                    let indent = indentation(line).to_string();
                    out.push(line.clone());
                    changed += extra.len();
                    out.extend(extra.into_iter().map(|e| format!("{}{}", indent, e)));
                }
            }

            let (opens, closes) = brace_counts(line);
            let name = line.split_whitespace().next().unwrap_or("").to_string();
            for _ in 0..closes {
                stack.pop();
            }
            for _ in 0..opens {
                stack.push(name.clone());
            }
        }

        self.lines = out;
        Some(changed)
    }

    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }
}

/// A line inside the encrypted block, with its nesting
#[derive(Debug, Clone, Copy)]
pub struct ScopedLine<'a> {
    pub index: usize,
    /// 1 for direct children of the block
    pub depth: usize,
    pub in_location: bool,
    pub text: &'a str,
}

/// What to do with a line during `edit_secure_block`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEdit {
    Keep,
    Remove,
    /// Keep the line and add siblings after it at the same indentation.
    /// Added lines must be brace-balanced directives.
    InsertAfter(Vec<String>),
}
