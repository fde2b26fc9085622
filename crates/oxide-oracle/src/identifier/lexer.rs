//! A minimal SQL scanner.
//!
//! The scanner does not tokenize SQL fully. It only needs to tell apart the
//! spans where identifier rewriting is allowed from the spans where it is
//! not, so it recognises string literals (including Oracle `q'[...]'`
//! literals), double-quoted identifiers and comments, and lumps everything
//! else into plain text.

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The kind of a scanned span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Keywords, bare identifiers, operators, whitespace.
    Text,
    /// A single-quoted string literal, quotes included.
    StringLiteral,
    /// A double-quoted identifier, quotes included.
    QuotedIdentifier,
    /// A `--` or `/* */` comment.
    Comment,
}

/// A classified span of SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// What the span contains.
    pub kind: SegmentKind,
    /// Where it is.
    pub span: Span,
}

impl Segment {
    /// Returns the source text of this segment.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }

    /// Returns the unquoted, unescaped name for a quoted identifier.
    #[must_use]
    pub fn identifier(&self, source: &str) -> Option<String> {
        if self.kind != SegmentKind::QuotedIdentifier {
            return None;
        }
        let text = self.text(source);
        let inner = text.strip_prefix('"')?.strip_suffix('"')?;
        Some(inner.replace("\"\"", "\""))
    }
}

/// Splits SQL text into [`Segment`]s.
pub struct Scanner<'a> {
    /// The input source text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Returns true when the scanner sits on the start of a non-text span.
    fn at_special(&self) -> bool {
        match self.peek() {
            Some('\'' | '"') => true,
            Some('-') => self.peek_next() == Some('-'),
            Some('/') => self.peek_next() == Some('*'),
            Some('q' | 'Q') => self.at_q_quote(),
            _ => false,
        }
    }

    /// `q'` starts an alternative-quoting literal unless it ends a word.
    fn at_q_quote(&self) -> bool {
        if self.peek_next() != Some('\'') {
            return false;
        }
        let preceded_by_word = self.input[..self.pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        !preceded_by_word
    }

    /// Consumes a literal or identifier delimited by `quote`, where a doubled
    /// quote is an escaped one. Unterminated input runs to the end.
    fn scan_quoted(&mut self, quote: char) {
        self.advance(); // consume opening quote
        while let Some(c) = self.advance() {
            if c == quote {
                if self.peek() == Some(quote) {
                    self.advance();
                } else {
                    return;
                }
            }
        }
    }

    /// Consumes `q'<open> ... <close>'`.
    fn scan_q_quote(&mut self) {
        self.advance(); // q
        self.advance(); // '
        let Some(open) = self.advance() else {
            return;
        };
        let close = match open {
            '[' => ']',
            '{' => '}',
            '(' => ')',
            '<' => '>',
            other => other,
        };
        while let Some(c) = self.advance() {
            if c == close && self.peek() == Some('\'') {
                self.advance();
                return;
            }
        }
    }

    fn scan_line_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    fn scan_block_comment(&mut self) {
        self.advance(); // /
        self.advance(); // *
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    break;
                }
                None => break,
                _ => {}
            }
        }
    }

    fn scan_text(&mut self) {
        self.advance();
        while self.peek().is_some() && !self.at_special() {
            self.advance();
        }
    }

    /// Scans the next segment.
    pub fn next_segment(&mut self) -> Option<Segment> {
        let start = self.pos;
        let kind = match self.peek()? {
            '\'' => {
                self.scan_quoted('\'');
                SegmentKind::StringLiteral
            }
            '"' => {
                self.scan_quoted('"');
                SegmentKind::QuotedIdentifier
            }
            '-' if self.peek_next() == Some('-') => {
                self.scan_line_comment();
                SegmentKind::Comment
            }
            '/' if self.peek_next() == Some('*') => {
                self.scan_block_comment();
                SegmentKind::Comment
            }
            'q' | 'Q' if self.at_q_quote() => {
                self.scan_q_quote();
                SegmentKind::StringLiteral
            }
            _ => {
                self.scan_text();
                SegmentKind::Text
            }
        };
        Some(Segment {
            kind,
            span: Span::new(start, self.pos),
        })
    }
}

impl Iterator for Scanner<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment()
    }
}
