//-
// Copyright (c) 2020, 2024, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

//! Byte-level tokenisation for the RFC 5322 grammar.
//!
//! Every input byte becomes exactly one token. The grammar is defined almost
//! entirely in terms of individual ASCII characters, so there is nothing to
//! be gained by grouping bytes here; the parser collects runs itself.

use crate::support::scanner::{Scanner, ScannerState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Digit,
    /// ASCII letter
    Char,
    /// Any byte >= 0x80. RFC 6532 allows UTF-8 anywhere that text is
    /// permitted; continuation bytes are classified the same way so whole
    /// sequences can be collected without decoding.
    ExtendedChar,
    Space,
    Tab,
    Cr,
    Lf,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LCurly,
    RCurly,
    Less,
    Greater,
    At,
    Comma,
    Semicolon,
    Colon,
    Period,
    DQuote,
    SQuote,
    Backslash,
    Slash,
    Question,
    Equal,
    Plus,
    Minus,
    Asterisk,
    Percent,
    Dollar,
    Hash,
    Exclamation,
    Ampersand,
    Caret,
    Underscore,
    Backtick,
    Pipe,
    Tilde,
    /// NUL
    Zero,
    /// DEL
    Delete,
    /// The remaining C0 controls (0x01-0x08, 0x0B, 0x0C, 0x0E-0x1F).
    Control,
    Eof,
}

const fn classify(b: u8) -> TokenKind {
    use TokenKind::*;

    match b {
        b'0'..=b'9' => Digit,
        b'a'..=b'z' | b'A'..=b'Z' => Char,
        0x80..=0xFF => ExtendedChar,
        b' ' => Space,
        b'\t' => Tab,
        b'\r' => Cr,
        b'\n' => Lf,
        b'(' => LParen,
        b')' => RParen,
        b'[' => LBracket,
        b']' => RBracket,
        b'{' => LCurly,
        b'}' => RCurly,
        b'<' => Less,
        b'>' => Greater,
        b'@' => At,
        b',' => Comma,
        b';' => Semicolon,
        b':' => Colon,
        b'.' => Period,
        b'"' => DQuote,
        b'\'' => SQuote,
        b'\\' => Backslash,
        b'/' => Slash,
        b'?' => Question,
        b'=' => Equal,
        b'+' => Plus,
        b'-' => Minus,
        b'*' => Asterisk,
        b'%' => Percent,
        b'$' => Dollar,
        b'#' => Hash,
        b'!' => Exclamation,
        b'&' => Ampersand,
        b'^' => Caret,
        b'_' => Underscore,
        b'`' => Backtick,
        b'|' => Pipe,
        b'~' => Tilde,
        0 => Zero,
        0x7F => Delete,
        _ => Control,
    }
}

const fn build_kind_table() -> [TokenKind; 256] {
    let mut table = [TokenKind::Control; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = classify(i as u8);
        i += 1;
    }
    table
}

static KINDS: [TokenKind; 256] = build_kind_table();

pub fn kind_of(b: u8) -> TokenKind {
    KINDS[usize::from(b)]
}

/// Whether `kind` is an RFC 5322 "NO-WS-CTL" control character.
pub fn is_ctl(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Control | TokenKind::Delete)
}

pub fn is_wsp(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Space | TokenKind::Tab)
}

/// RFC 5322 3.2.3 "atext", amended by RFC 6532 to include non-ASCII.
pub fn is_atext(kind: TokenKind) -> bool {
    use TokenKind::*;

    matches!(
        kind,
        Digit
            | Char
            | ExtendedChar
            | Exclamation
            | Hash
            | Dollar
            | Percent
            | Ampersand
            | SQuote
            | Asterisk
            | Plus
            | Minus
            | Slash
            | Equal
            | Question
            | Caret
            | Underscore
            | Backtick
            | LCurly
            | Pipe
            | RCurly
            | Tilde
    )
}

/// Printable ASCII plus anything non-ASCII.
pub fn is_vchar(kind: TokenKind) -> bool {
    use TokenKind::*;

    !matches!(
        kind,
        Space | Tab | Cr | Lf | Zero | Control | Delete | Eof
    )
}

/// RFC 5322 3.2.4 "qtext" (RFC 6532 amended).
pub fn is_qtext(kind: TokenKind) -> bool {
    is_vchar(kind)
        && !matches!(kind, TokenKind::DQuote | TokenKind::Backslash)
}

/// RFC 5322 3.4.1 "dtext" (RFC 6532 amended).
pub fn is_dtext(kind: TokenKind) -> bool {
    use TokenKind::*;

    is_vchar(kind) && !matches!(kind, LBracket | RBracket | Backslash)
}

/// RFC 2047 "token": ASCII that is neither a control, a space, nor one of
/// the RFC 2047 especials.
pub fn is_ew_token(kind: TokenKind) -> bool {
    use TokenKind::*;

    is_vchar(kind)
        && !matches!(
            kind,
            ExtendedChar
                | LParen
                | RParen
                | Less
                | Greater
                | At
                | Comma
                | Semicolon
                | Colon
                | DQuote
                | Slash
                | LBracket
                | RBracket
                | Question
                | Period
                | Equal
        )
}

/// RFC 2047 "encoded-text": printable ASCII other than `?`.
pub fn is_encoded_text(kind: TokenKind) -> bool {
    is_vchar(kind)
        && !matches!(kind, TokenKind::ExtendedChar | TokenKind::Question)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: u8,
    /// Absolute offset in the lexer input.
    pub offset: usize,
}

impl Token {
    fn eof(offset: usize) -> Self {
        Token {
            kind: TokenKind::Eof,
            value: 0,
            offset,
        }
    }
}

/// A snapshot of the full lexer state, for backtracking.
#[derive(Clone, Copy, Debug)]
pub struct LexerState {
    scanner: ScannerState,
    current: Token,
    previous: Token,
}

/// A pull-based lexer with one token of lookahead.
///
/// `current` is the token under the cursor, not yet consumed. `previous` is
/// the token most recently consumed by `advance`.
#[derive(Clone, Debug)]
pub struct Lexer<'a> {
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        let mut lexer = Lexer {
            scanner: Scanner::new(input),
            current: Token::eof(0),
            previous: Token::eof(0),
        };
        lexer.current = lexer.next_token();
        lexer
    }

    fn next_token(&mut self) -> Token {
        let offset = self.scanner.offset();
        match self.scanner.read_one() {
            Some(b) => Token {
                kind: kind_of(b),
                value: b,
                offset,
            },
            None => Token::eof(offset),
        }
    }

    pub fn advance(&mut self) {
        self.previous = self.current;
        self.current = self.next_token();
    }

    pub fn current(&self) -> Token {
        self.current
    }

    pub fn previous(&self) -> Token {
        self.previous
    }

    pub fn save(&self) -> LexerState {
        LexerState {
            scanner: self.scanner.save(),
            current: self.current,
            previous: self.previous,
        }
    }

    pub fn restore(&mut self, state: LexerState) {
        self.scanner.restore(state.scanner);
        self.current = state.current;
        self.previous = state.previous;
    }
}
