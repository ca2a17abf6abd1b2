//! Escape-aware splitting for the segment definition language.
//!
//! A backslash escapes exactly the next character. Splitting never resolves
//! escapes: every level hands the raw text of its chunks to the next level and
//! only expression values are unescaped, by the parser, at the leaves.

use crate::token::{SegmentKind, SegmentScope, Span, StepRelation};

pub const ESCAPE: char = '\\';

/// A slice of the original input together with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece<'a> {
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Piece<'a> {
    pub fn new(text: &'a str, start: usize) -> Self {
        Self {
            text,
            span: Span::new(start, start + text.len()),
        }
    }

    /// The whole input as a single piece.
    pub fn root(text: &'a str) -> Self {
        Self::new(text, 0)
    }

    /// Sub-piece over the byte range `from..to` of this piece.
    pub fn slice(&self, from: usize, to: usize) -> Piece<'a> {
        Piece::new(&self.text[from..to], self.span.start + from)
    }

    /// Drops the first `n` bytes.
    pub fn skip(&self, n: usize) -> Piece<'a> {
        self.slice(n, self.text.len())
    }

    /// Strips `prefix` if the piece starts with it.
    pub fn strip_prefix(&self, prefix: &str) -> Option<Piece<'a>> {
        self.text
            .starts_with(prefix)
            .then(|| self.skip(prefix.len()))
    }
}

/// Result of splitting a piece: chunks and separators interleaved,
/// `[chunk0, sep0, chunk1, sep1, ..., chunkN]`. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    pieces: Vec<Piece<'a>>,
}

impl<'a> Split<'a> {
    pub fn first(&self) -> Piece<'a> {
        self.pieces[0]
    }

    /// Every chunk, separators left out.
    pub fn chunks(&self) -> impl Iterator<Item = Piece<'a>> + '_ {
        self.pieces.iter().step_by(2).copied()
    }

    /// Chunks after the first one, each paired with the separator in front of it.
    pub fn separated(&self) -> impl Iterator<Item = (Piece<'a>, Piece<'a>)> + '_ {
        self.pieces[1..].chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}

struct Scanner<'a> {
    input: &'a str,
    /// Byte offset into `input`.
    position: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner { input, position: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Moves past the current character, or past the escape pair it opens.
    fn bump_escaped(&mut self) {
        if self.bump() == Some(ESCAPE) {
            self.bump();
        }
    }
}

/// Splits `piece` wherever `matcher` accepts an unescaped position.
///
/// `matcher` receives the remaining text and returns the byte length of the
/// separator found at its start.
pub fn split_unescaped<'a, F>(piece: Piece<'a>, matcher: F) -> Split<'a>
where
    F: Fn(&str) -> Option<usize>,
{
    let mut scanner = Scanner::new(piece.text);
    let mut pieces = Vec::new();
    let mut chunk_start = 0;

    while let Some(c) = scanner.peek() {
        if c != ESCAPE {
            if let Some(len) = matcher(scanner.rest()) {
                let at = scanner.position;
                pieces.push(piece.slice(chunk_start, at));
                pieces.push(piece.slice(at, at + len));
                scanner.position = at + len;
                chunk_start = scanner.position;
                continue;
            }
        }
        scanner.bump_escaped();
    }
    pieces.push(piece.slice(chunk_start, piece.text.len()));

    Split { pieces }
}

/// `;` that starts a new segment: optionally a scope, then a segment keyword.
pub fn segment_boundary(rest: &str) -> Option<usize> {
    let after = rest.strip_prefix(';')?;
    let after = match SegmentScope::from_prefix(after) {
        Some(scope) => &after[scope.as_str().len()..],
        None => after,
    };
    SegmentKind::from_prefix(after).map(|_| 1)
}

/// `;->>` or `;->` between sequence steps.
pub fn step_boundary(rest: &str) -> Option<usize> {
    StepRelation::from_prefix(rest).map(|relation| relation.as_str().len())
}

pub fn and_boundary(rest: &str) -> Option<usize> {
    rest.starts_with(';').then_some(1)
}

pub fn or_boundary(rest: &str) -> Option<usize> {
    rest.starts_with(',').then_some(1)
}

/// Splits at the first unescaped `separator`, leaving escapes untouched.
pub fn split_once_unescaped(s: &str, separator: char) -> Option<(&str, &str)> {
    let mut scanner = Scanner::new(s);
    while let Some(c) = scanner.peek() {
        if c == separator {
            let at = scanner.position;
            return Some((&s[..at], &s[at + c.len_utf8()..]));
        }
        scanner.bump_escaped();
    }
    None
}

/// Splits a single-character delimited list, resolving escapes as it goes.
///
/// `\<sep>` yields `<sep>`, `\\` yields `\`, and a backslash in front of any
/// other character is dropped. A trailing empty item is not emitted.
pub fn split_escaped_list(s: &str, separator: char) -> Vec<String> {
    let mut items = Vec::new();
    let mut buf = String::new();
    let mut escaped = false;

    for c in s.chars() {
        if c == ESCAPE {
            if escaped {
                buf.push(c);
            }
            escaped = !escaped;
        } else if c == separator {
            if escaped {
                escaped = false;
                buf.push(c);
            } else {
                items.push(std::mem::take(&mut buf));
            }
        } else {
            escaped = false;
            buf.push(c);
        }
    }
    if !buf.is_empty() {
        items.push(buf);
    }
    items
}

/// Escapes the list item so that [`split_escaped_list`] gives it back.
pub fn escape_list_item(item: &str, separator: char) -> String {
    let mut out = String::with_capacity(item.len());
    for c in item.chars() {
        if c == ESCAPE || c == separator {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Escapes the AND/OR separators inside an expression value.
pub fn escape_value(value: &str) -> String {
    value.replace(';', "\\;").replace(',', "\\,")
}

pub fn unescape_value(value: &str) -> String {
    value.replace("\\;", ";").replace("\\,", ",")
}

/// True when `text` ends in a backslash that escapes nothing. Written before a
/// separator, such a backslash would escape the separator instead.
pub fn has_dangling_escape(text: &str) -> bool {
    text.chars().rev().take_while(|&c| c == ESCAPE).count() % 2 == 1
}
