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

//! Backtracking primitives shared by the RFC 5322 grammars.
//!
//! The grammar is written as recursive descent. Alternation is done by taking
//! a `save()` checkpoint, trying one branch, and `restore()`ing on failure
//! before trying the next.

use super::lexer::{Lexer, LexerState, Token, TokenKind};
use crate::mime::charset::CharsetResolver;
use crate::support::error::ParseError;

/// A run of bytes collected from the input, with the offset of its first
/// byte.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bytes {
    pub value: Vec<u8>,
    pub offset: usize,
}

impl Bytes {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn into_string(self) -> String {
        match String::from_utf8(self.value) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    pub(super) charsets: &'a dyn CharsetResolver,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a [u8], charsets: &'a dyn CharsetResolver) -> Self {
        Parser {
            lexer: Lexer::new(input),
            charsets,
        }
    }

    pub fn current(&self) -> Token {
        self.lexer.current()
    }

    pub fn previous(&self) -> Token {
        self.lexer.previous()
    }

    pub fn advance(&mut self) {
        self.lexer.advance();
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.lexer.current().kind == kind
    }

    pub fn check_with(&self, pred: impl Fn(TokenKind) -> bool) -> bool {
        pred(self.lexer.current().kind)
    }

    /// Advances past the current token iff it is of the given kind.
    pub fn matches(&mut self, kind: TokenKind) -> bool {
        self.matches_with(|k| k == kind)
    }

    pub fn matches_with(&mut self, pred: impl Fn(TokenKind) -> bool) -> bool {
        if self.check_with(pred) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn consume(
        &mut self,
        kind: TokenKind,
        message: &str,
    ) -> Result<(), ParseError> {
        if self.matches(kind) {
            Ok(())
        } else {
            Err(self.make_error(message))
        }
    }

    /// Consumes tokens for as long as `pred` holds.
    ///
    /// `pred` must not accept `Eof`.
    pub fn collect_while(&mut self, pred: impl Fn(TokenKind) -> bool) -> Bytes {
        let mut bytes = Bytes {
            value: Vec::new(),
            offset: self.current().offset,
        };

        while self.check_with(&pred) {
            bytes.value.push(self.current().value);
            self.advance();
        }

        bytes
    }

    /// Parses exactly `n` decimal digits.
    pub fn parse_number_n(&mut self, n: usize) -> Result<u32, ParseError> {
        let offset = self.current().offset;
        let mut value = 0u32;
        for _ in 0..n {
            if !self.check(TokenKind::Digit) {
                return Err(
                    self.make_error_at(format!("Expected {} digits", n), offset)
                );
            }

            value = value
                .checked_mul(10)
                .and_then(|v| {
                    v.checked_add(u32::from(self.current().value - b'0'))
                })
                .ok_or_else(|| self.make_error_at("Number too large", offset))?;
            self.advance();
        }

        Ok(value)
    }

    pub fn consume_newline(&mut self) -> Result<(), ParseError> {
        self.consume(TokenKind::Cr, "Expected CR")?;
        self.consume(TokenKind::Lf, "Expected LF")
    }

    pub fn make_error(&self, message: impl Into<String>) -> ParseError {
        self.make_error_at(message, self.current().offset)
    }

    pub fn make_error_at(
        &self,
        message: impl Into<String>,
        offset: usize,
    ) -> ParseError {
        ParseError::new(message, offset)
    }

    pub fn save(&self) -> LexerState {
        self.lexer.save()
    }

    pub fn restore(&mut self, state: LexerState) {
        self.lexer.restore(state);
    }
}
