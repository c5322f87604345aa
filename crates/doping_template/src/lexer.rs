//! Single-pass scanner that splits template text into verbatim text and tags.
//!
//! The scanner is a finite-state machine over the raw bytes. All markers it
//! reacts to are ASCII, so every span it produces starts and ends on a UTF-8
//! character boundary of the source.

use crate::error::{RenderError, TagErrorKind};
use crate::span::Span;

pub const SUBSTITUTION_OPEN: &str = "/*<DOPING ";
pub const CONDITIONAL_OPEN: &str = "/*<DOPING_IF ";
pub const TAG_CLOSE: &str = ">*/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Source text copied through unchanged.
    Text(Span),
    /// `/*<DOPING NAME >*/`
    Substitution { name: String, span: Span },
    /// `/*<DOPING_IF NAME BODY >*/`
    Conditional { name: String, body: Span, span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InSingleQuote,
    InDoubleQuote,
    InLineComment,
    InBlockComment,
    InTag,
    InConditionalTag,
}

pub fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

pub fn scan(source: &str) -> Result<Vec<Segment>, RenderError> {
    Scanner::new(source).run()
}

struct Scanner<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    text_start: usize,
    tag_start: usize,
    state: ScanState,
    segments: Vec<Segment>,
}

impl<'src> Scanner<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            text_start: 0,
            tag_start: 0,
            state: ScanState::Normal,
            segments: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Segment>, RenderError> {
        while self.pos < self.bytes.len() {
            self.state = match self.state {
                ScanState::Normal => self.normal(),
                ScanState::InSingleQuote => self.quoted(b'\''),
                ScanState::InDoubleQuote => self.quoted(b'"'),
                ScanState::InLineComment => self.line_comment(),
                ScanState::InBlockComment => self.block_comment(),
                ScanState::InTag => self.substitution_tag()?,
                ScanState::InConditionalTag => self.conditional_tag()?,
            };
        }

        if matches!(self.state, ScanState::InTag | ScanState::InConditionalTag) {
            return Err(self.unterminated());
        }

        self.flush_text(self.bytes.len());
        Ok(self.segments)
    }

    fn normal(&mut self) -> ScanState {
        let rest = &self.bytes[self.pos..];

        if rest.starts_with(CONDITIONAL_OPEN.as_bytes()) {
            self.open_tag(CONDITIONAL_OPEN.len());
            return ScanState::InConditionalTag;
        }
        if rest.starts_with(SUBSTITUTION_OPEN.as_bytes()) {
            self.open_tag(SUBSTITUTION_OPEN.len());
            return ScanState::InTag;
        }

        match (rest[0], rest.get(1).copied()) {
            (b'\'', _) => {
                self.pos += 1;
                ScanState::InSingleQuote
            }
            (b'"', _) => {
                self.pos += 1;
                ScanState::InDoubleQuote
            }
            (b'/', Some(b'/')) => {
                self.pos += 2;
                ScanState::InLineComment
            }
            (b'/', Some(b'*')) => {
                self.pos += 2;
                ScanState::InBlockComment
            }
            _ => {
                self.pos += 1;
                ScanState::Normal
            }
        }
    }

    fn quoted(&mut self, quote: u8) -> ScanState {
        while let Some(&byte) = self.bytes.get(self.pos) {
            self.pos += 1;
            if byte == b'\\' {
                self.pos = (self.pos + 1).min(self.bytes.len());
            } else if byte == quote {
                return ScanState::Normal;
            }
        }
        self.state
    }

    fn line_comment(&mut self) -> ScanState {
        match self.bytes[self.pos..].iter().position(|&b| b == b'\n') {
            Some(offset) => {
                self.pos += offset + 1;
                ScanState::Normal
            }
            None => {
                self.pos = self.bytes.len();
                ScanState::InLineComment
            }
        }
    }

    // A `*/` directly preceded by `>` closes a tag-shaped region nested in the
    // comment, not the comment itself.
    fn block_comment(&mut self) -> ScanState {
        let mut cursor = self.pos;
        while cursor + 1 < self.bytes.len() {
            if self.bytes[cursor] == b'*'
                && self.bytes[cursor + 1] == b'/'
                && self.bytes[cursor - 1] != b'>'
            {
                self.pos = cursor + 2;
                return ScanState::Normal;
            }
            cursor += 1;
        }
        self.pos = self.bytes.len();
        ScanState::InBlockComment
    }

    fn substitution_tag(&mut self) -> Result<ScanState, RenderError> {
        self.skip_spaces();
        let name = self.tag_name()?;
        self.skip_spaces();

        if !self.bytes[self.pos..].starts_with(TAG_CLOSE.as_bytes()) {
            return Err(match self.current_char() {
                Some(ch) if !self.at_truncated_close() => {
                    self.error_at(TagErrorKind::ExpectedClose(ch))
                }
                _ => self.unterminated(),
            });
        }
        self.pos += TAG_CLOSE.len();

        let span = Span::new(self.tag_start, self.pos);
        self.segments.push(Segment::Substitution { name, span });
        self.text_start = self.pos;
        Ok(ScanState::Normal)
    }

    fn conditional_tag(&mut self) -> Result<ScanState, RenderError> {
        self.skip_spaces();
        let name = self.tag_name()?;

        let body_start = self.pos;
        let Some(offset) = self.source[body_start..].find(TAG_CLOSE) else {
            return Err(self.unterminated());
        };
        let body = Span::new(body_start, body_start + offset);
        self.pos = body.end() + TAG_CLOSE.len();

        let span = Span::new(self.tag_start, self.pos);
        self.segments.push(Segment::Conditional { name, body, span });
        self.text_start = self.pos;
        Ok(ScanState::Normal)
    }

    /// Reads `NAME` and the single space that terminates it.
    fn tag_name(&mut self) -> Result<String, RenderError> {
        let start = self.pos;
        while self.bytes.get(self.pos).copied().is_some_and(is_name_byte) {
            self.pos += 1;
        }

        match self.bytes.get(self.pos) {
            None => Err(self.unterminated()),
            Some(_) if self.pos == start => Err(self.error_at(TagErrorKind::EmptyName)),
            Some(b' ') => {
                let name = self.source[start..self.pos].to_string();
                self.pos += 1;
                Ok(name)
            }
            Some(_) => {
                let ch = self.current_char().unwrap_or('\u{FFFD}');
                Err(self.error_at(TagErrorKind::InvalidNameCharacter(ch)))
            }
        }
    }

    fn open_tag(&mut self, opener_len: usize) {
        self.flush_text(self.pos);
        self.tag_start = self.pos;
        self.pos += opener_len;
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.text_start {
            self.segments
                .push(Segment::Text(Span::new(self.text_start, end)));
        }
        self.text_start = end;
    }

    fn skip_spaces(&mut self) {
        while self.bytes.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }

    fn current_char(&self) -> Option<char> {
        self.source.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    /// True when the input ends in a prefix of `>*/`.
    fn at_truncated_close(&self) -> bool {
        let rest = &self.bytes[self.pos..];
        rest.len() < TAG_CLOSE.len() && TAG_CLOSE.as_bytes().starts_with(rest)
    }

    fn unterminated(&self) -> RenderError {
        RenderError::TagParse {
            kind: TagErrorKind::Unterminated,
            span: Span::new(self.tag_start, self.bytes.len()),
        }
    }

    fn error_at(&self, kind: TagErrorKind) -> RenderError {
        let width = self.current_char().map(char::len_utf8).unwrap_or(0);
        RenderError::TagParse {
            kind,
            span: Span::new(self.pos, self.pos + width),
        }
    }
}
