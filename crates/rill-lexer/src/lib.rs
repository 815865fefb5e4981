//! Tokenizer for Rill source text.
//!
//! Produces a flat list of `(Token, Span)` pairs plus the spans of any
//! unrecognized characters. Parsing decides what symbols mean; the lexer
//! only distinguishes parens, integer literals, the three constant
//! literals, and symbols.

use logos::Logos;
use smol_str::SmolStr;

// ── Spans ───────────────────────────────────────────────────────────────────

/// A half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

// ── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("true")]
    True,

    #[token("false")]
    False,

    /// The unit literal, written `<>`.
    #[token("<>")]
    Unit,

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok(), priority = 2)]
    Int(i64),

    /// Identifiers and operator names. The character set covers every
    /// primitive operator, so `+`, `<=`, `land` and friends all lex as
    /// plain symbols; keywords are recognized by the parser, not here.
    #[regex(
        r"[a-zA-Z_+\-*/%<>=!&|^~][a-zA-Z0-9_+\-*/%<>=!&|^~.?]*",
        |lex| SmolStr::from(lex.slice()),
        priority = 1
    )]
    Symbol(SmolStr),
}

/// Tokenize `source`, returning the recognized tokens and the spans of
/// any characters no rule matched.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<Span>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for (result, range) in Token::lexer(source).spanned() {
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(span),
        }
    }
    (tokens, errors)
}

// ── Line index ──────────────────────────────────────────────────────────────

/// Maps byte offsets to 1-based line and column numbers for diagnostics.
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        LineIndex { line_starts }
    }

    /// 1-based `(line, column)` of a byte offset. Columns count bytes.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line as u32 + 1, offset - self.line_starts[line] + 1)
    }
}
