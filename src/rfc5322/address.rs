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

//! The RFC 5322 3.4 address grammar, including the RFC 5322 4.4 obsolete
//! syntax and a number of relaxations needed to accept real-world mail:
//!
//! - `;` is accepted as a separator between top-level addresses.
//! - The `;` terminating a group is optional, and a whole group may be
//!   wrapped in double quotes.
//! - Inside angle brackets, the `addr-spec` may carry a `:port` suffix.
//! - A dot-atom domain may end with a period.
//! - Display names may contain unquoted `.` and `@`.
//! - `<>` is accepted as an address with an empty address part.

use super::lexer::*;
use super::model::Address;
use super::parser::Parser;
use crate::mime::encoded_word::ew_decode;
use crate::support::error::ParseError;

/// How a phrase fragment joins onto its neighbours when the display name is
/// reassembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StringKind {
    /// An ordinary word; separated from other words by a single space.
    Other,
    /// A bare `.` or `@`; joined without any space.
    Unspaced,
    /// A decoded RFC 2047 encoded word. RFC 2047 6.2 requires whitespace
    /// between adjacent encoded words to be dropped.
    Encoded,
}

#[derive(Clone, Debug)]
struct ParserString {
    value: String,
    kind: StringKind,
}

impl ParserString {
    fn unspaced(value: &str) -> Self {
        ParserString {
            value: value.to_owned(),
            kind: StringKind::Unspaced,
        }
    }
}

fn needs_space(prev: StringKind, cur: StringKind) -> bool {
    use StringKind::*;

    matches!(
        (prev, cur),
        (Other, Other) | (Other, Encoded) | (Encoded, Other)
    )
}

fn join_phrase(words: &[ParserString]) -> String {
    let mut ret = String::new();
    let mut prev: Option<StringKind> = None;
    for word in words {
        if prev.map_or(false, |prev| needs_space(prev, word.kind)) {
            ret.push(' ');
        }
        ret.push_str(&word.value);
        prev = Some(word.kind);
    }
    ret
}

fn is_separator(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Comma | TokenKind::Semicolon)
}

fn is_word_start(kind: TokenKind) -> bool {
    is_atext(kind) || TokenKind::DQuote == kind
}

/// Of two failed alternatives, report the one which got further into the
/// input, since it is more likely to be what the author intended.
fn furthest(a: ParseError, b: ParseError) -> ParseError {
    if b.offset > a.offset {
        b
    } else {
        a
    }
}

/// Whether `s` can be written as a dot-atom and so needs no quoting as a
/// local part.
fn is_dot_atom(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|atom| {
            !atom.is_empty()
                && atom.bytes().all(|b| is_atext(kind_of(b)))
        })
}

fn quote(s: &str) -> String {
    let mut ret = String::with_capacity(s.len() + 2);
    ret.push('"');
    for ch in s.chars() {
        if '"' == ch || '\\' == ch {
            ret.push('\\');
        }
        ret.push(ch);
    }
    ret.push('"');
    ret
}

impl Parser<'_> {
    /// `address-list := *([CFWS] SEP) address *(SEP [address / CFWS])`
    pub(super) fn parse_address_list(
        &mut self,
    ) -> Result<Vec<Address>, ParseError> {
        loop {
            let state = self.save();
            self.parse_cfws()?;
            if !self.matches_with(is_separator) {
                self.restore(state);
                break;
            }
        }

        let (mut addresses, mut consumed_semicolon) = self.parse_address()?;

        loop {
            self.parse_cfws()?;
            if self.check(TokenKind::Eof) {
                break;
            }

            if self.matches_with(is_separator) {
                consumed_semicolon = false;
                self.parse_cfws()?;
                if self.check(TokenKind::Eof) || self.check_with(is_separator)
                {
                    continue;
                }
            } else if !consumed_semicolon {
                // A group which ate its trailing `;` may be directly followed
                // by another address, as in `g:<a@b>;<c@d>`. Anything else
                // needs a separator.
                return Err(self.make_error("Expected ',' or ';'"));
            }

            let (more, semicolon) = self.parse_address()?;
            addresses.extend(more);
            consumed_semicolon = semicolon;
        }

        Ok(addresses)
    }

    /// Parses exactly one address (which may be a group) spanning the whole
    /// input.
    pub(super) fn parse_single_address(
        &mut self,
    ) -> Result<Vec<Address>, ParseError> {
        let (addresses, _) = self.parse_address()?;
        self.parse_cfws()?;
        if !self.check(TokenKind::Eof) {
            return Err(self.make_error("Unexpected data after address"));
        }
        Ok(addresses)
    }

    /// `address := angle-addr-only / mailbox / group`
    ///
    /// Returns the addresses found and whether a trailing `;` was consumed as
    /// part of a group.
    fn parse_address(&mut self) -> Result<(Vec<Address>, bool), ParseError> {
        self.parse_cfws()?;
        if self.check(TokenKind::Less) {
            let address = self.parse_angle_addr()?;
            return Ok((
                vec![Address {
                    name: String::new(),
                    address,
                }],
                false,
            ));
        }

        let state = self.save();
        let mailbox_error = match self.parse_mailbox() {
            Ok(mailbox) => return Ok((vec![mailbox], false)),
            Err(e) => e,
        };

        self.restore(state);
        self.parse_group().map_err(|e| furthest(mailbox_error, e))
    }

    /// `mailbox := name-addr / addr-spec`
    fn parse_mailbox(&mut self) -> Result<Address, ParseError> {
        let state = self.save();
        let name_addr_error = match self.parse_name_addr() {
            Ok(address) => return Ok(address),
            Err(e) => e,
        };

        self.restore(state);
        self.parse_cfws()?;
        match self.parse_addr_spec(false) {
            Ok(address) => {
                self.parse_cfws()?;
                Ok(Address {
                    name: String::new(),
                    address,
                })
            },
            Err(e) => Err(furthest(name_addr_error, e)),
        }
    }

    /// `name-addr := [CFWS] [display-name] angle-addr`
    fn parse_name_addr(&mut self) -> Result<Address, ParseError> {
        self.parse_cfws()?;
        let name = if self.check(TokenKind::Less) {
            String::new()
        } else {
            join_phrase(&self.parse_phrase()?)
        };

        let address = self.parse_angle_addr()?;
        Ok(Address { name, address })
    }

    /// `angle-addr := [CFWS] "<" [obs-route] [addr-spec] ">" [CFWS]`
    fn parse_angle_addr(&mut self) -> Result<String, ParseError> {
        self.parse_cfws()?;
        self.consume(TokenKind::Less, "Expected '<'")?;
        self.parse_obs_route()?;
        self.parse_cfws()?;

        let address = if self.check(TokenKind::Greater) {
            String::new()
        } else {
            self.parse_addr_spec(true)?
        };

        self.consume(TokenKind::Greater, "Expected '>'")?;
        self.parse_cfws()?;
        Ok(address)
    }

    /// `obs-route := *([CFWS] / ",") "@" domain
    ///               *("," [CFWS] ["@" domain]) ":"`
    ///
    /// The route is discarded.
    fn parse_obs_route(&mut self) -> Result<(), ParseError> {
        let state = self.save();
        loop {
            self.parse_cfws()?;
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }

        if !self.matches(TokenKind::At) {
            self.restore(state);
            return Ok(());
        }

        self.parse_domain()?;
        while self.matches(TokenKind::Comma) {
            self.parse_cfws()?;
            if self.matches(TokenKind::At) {
                self.parse_domain()?;
            }
        }

        self.consume(TokenKind::Colon, "Expected ':' after route")
    }

    /// `addr-spec := local-part "@" domain [":" atom]`
    ///
    /// The port suffix is only recognised when `allow_port` is set, i.e.,
    /// inside angle brackets.
    fn parse_addr_spec(
        &mut self,
        allow_port: bool,
    ) -> Result<String, ParseError> {
        let local = self.parse_local_part()?;
        self.consume(TokenKind::At, "Expected '@'")?;
        let domain = self.parse_domain()?;

        let mut address = format!("{}@{}", local, domain);
        if allow_port && self.matches(TokenKind::Colon) {
            let port = self.collect_while(is_atext);
            if port.is_empty() {
                return Err(self.make_error("Expected port after ':'"));
            }
            address.push(':');
            address.push_str(&port.into_string());
        }

        Ok(address)
    }

    /// `local-part := word *("." word)`
    fn parse_local_part(&mut self) -> Result<String, ParseError> {
        let mut local = self.parse_local_word()?;
        while self.matches(TokenKind::Period) {
            local.push('.');
            local.push_str(&self.parse_local_word()?);
        }
        Ok(local)
    }

    fn parse_local_word(&mut self) -> Result<String, ParseError> {
        self.parse_cfws()?;
        if !self.check(TokenKind::DQuote) {
            return self.parse_word().map(|w| w.value);
        }

        let word = self.parse_quoted_string(false)?;
        self.parse_cfws()?;
        Ok(if is_dot_atom(&word.value) {
            word.value
        } else {
            quote(&word.value)
        })
    }

    /// `domain := domain-literal / dot-atom`, with surrounding CFWS.
    fn parse_domain(&mut self) -> Result<String, ParseError> {
        self.parse_cfws()?;
        let domain = if self.check(TokenKind::LBracket) {
            self.parse_domain_literal()?
        } else {
            self.parse_dot_atom_text()?
        };
        self.parse_cfws()?;
        Ok(domain)
    }

    /// `dot-atom-text := 1*atext *("." 1*atext) ["."]`
    fn parse_dot_atom_text(&mut self) -> Result<String, ParseError> {
        let first = self.collect_while(is_atext);
        if first.is_empty() {
            return Err(self.make_error("Expected domain"));
        }

        let mut text = first.value;
        while self.matches(TokenKind::Period) {
            text.push(self.previous().value);
            let next = self.collect_while(is_atext);
            if next.is_empty() {
                break;
            }
            text.extend_from_slice(&next.value);
        }

        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// `domain-literal := "[" *([FWS] dtext) [FWS] "]"`
    ///
    /// The brackets are retained in the result.
    fn parse_domain_literal(&mut self) -> Result<String, ParseError> {
        let offset = self.current().offset;
        self.consume(TokenKind::LBracket, "Expected '['")?;

        let mut text = vec![b'['];
        let mut closed = false;
        while !closed {
            if self.matches(TokenKind::RBracket) {
                text.push(b']');
                closed = true;
                continue;
            }

            // obs-dtext admits the NO-WS-CTL controls
            if self.check_with(is_dtext) || self.check_with(is_ctl) {
                text.push(self.current().value);
                self.advance();
            } else if self.matches(TokenKind::Backslash) {
                // obs-dtext quoted-pair
                if self.check(TokenKind::Eof) {
                    break;
                }
                text.push(self.current().value);
                self.advance();
            } else if !self.parse_fws() {
                break;
            }
        }

        if !closed {
            return Err(
                self.make_error_at("Unterminated domain literal", offset)
            );
        }

        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// `group := [DQUOTE] display-name ":" [group-list] [";"] [CFWS]
    ///           [DQUOTE]`
    ///
    /// A leading quote may instead open a quoted-string display name, so the
    /// quoted form is tried first and the plain form on failure.
    fn parse_group(&mut self) -> Result<(Vec<Address>, bool), ParseError> {
        self.parse_cfws()?;
        let state = self.save();
        if !self.matches(TokenKind::DQuote) {
            return self.parse_group_body(false);
        }

        let quoted_error = match self.parse_group_body(true) {
            Ok(group) => return Ok(group),
            Err(e) => e,
        };

        self.restore(state);
        self.parse_group_body(false)
            .map_err(|e| furthest(quoted_error, e))
    }

    fn parse_group_body(
        &mut self,
        quoted: bool,
    ) -> Result<(Vec<Address>, bool), ParseError> {
        self.parse_phrase()?;
        self.consume(TokenKind::Colon, "Expected ':'")?;

        let mut addresses = Vec::new();
        let state = self.save();
        match self.parse_mailbox() {
            Ok(first) => {
                addresses.push(first);
                loop {
                    let state = self.save();
                    self.parse_cfws()?;
                    if !self.matches(TokenKind::Comma) {
                        self.restore(state);
                        break;
                    }

                    self.parse_cfws()?;
                    if self.check(TokenKind::Comma)
                        || self.check(TokenKind::Semicolon)
                        || self.check(TokenKind::Eof)
                    {
                        // obs-mbox-list permits empty elements
                        continue;
                    }

                    addresses.push(self.parse_mailbox()?);
                }
            },

            Err(_) => {
                // Either plain CFWS or obs-group-list
                self.restore(state);
                loop {
                    self.parse_cfws()?;
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            },
        }

        self.parse_cfws()?;
        let consumed_semicolon = self.matches(TokenKind::Semicolon);
        self.parse_cfws()?;
        if quoted {
            self.matches(TokenKind::DQuote);
        }

        Ok((addresses, consumed_semicolon))
    }

    /// `phrase := word *(word / "." / "@" / CFWS)`
    fn parse_phrase(&mut self) -> Result<Vec<ParserString>, ParseError> {
        let mut words = vec![self.parse_word()?];
        loop {
            self.parse_cfws()?;
            if self.matches(TokenKind::Period) {
                words.push(ParserString::unspaced("."));
            } else if self.matches(TokenKind::At) {
                words.push(ParserString::unspaced("@"));
            } else if self.check_with(is_word_start) {
                words.push(self.parse_word()?);
            } else {
                break;
            }
        }

        Ok(words)
    }

    /// `word := encoded-word / quoted-string / atom`, with surrounding CFWS.
    fn parse_word(&mut self) -> Result<ParserString, ParseError> {
        self.parse_cfws()?;

        let word = if self.check(TokenKind::DQuote) {
            self.parse_quoted_string(true)?
        } else {
            let state = self.save();
            match self.parse_encoded_word()? {
                Some(word) => word,
                None => {
                    self.restore(state);
                    self.parse_atom_text()?
                },
            }
        };

        self.parse_cfws()?;
        Ok(word)
    }

    fn parse_atom_text(&mut self) -> Result<ParserString, ParseError> {
        let text = self.collect_while(is_atext);
        if text.is_empty() {
            return Err(self.make_error("Expected word"));
        }

        Ok(ParserString {
            value: text.into_string(),
            kind: StringKind::Other,
        })
    }

    /// `encoded-word := "=?" charset "?" ("Q" / "B") "?" encoded-text "?="`
    ///
    /// Returns `Ok(None)` if the input is not syntactically an encoded word,
    /// in which case the caller must restore its checkpoint. A syntactically
    /// valid encoded word which cannot be decoded is an error.
    fn parse_encoded_word(
        &mut self,
    ) -> Result<Option<ParserString>, ParseError> {
        let offset = self.current().offset;
        if !self.matches(TokenKind::Equal) || !self.matches(TokenKind::Question)
        {
            return Ok(None);
        }

        let charset = self.collect_while(is_ew_token);
        if charset.is_empty() || !self.matches(TokenKind::Question) {
            return Ok(None);
        }

        let encoding = self.current().value;
        if !self.check(TokenKind::Char)
            || !matches!(encoding, b'q' | b'Q' | b'b' | b'B')
        {
            return Ok(None);
        }
        self.advance();

        if !self.matches(TokenKind::Question) {
            return Ok(None);
        }

        let text = self.collect_while(is_encoded_text);
        if !self.matches(TokenKind::Question) || !self.matches(TokenKind::Equal)
        {
            return Ok(None);
        }

        let literal = format!(
            "=?{}?{}?{}?=",
            charset.into_string(),
            char::from(encoding),
            text.into_string()
        );
        match ew_decode(&literal, self.charsets) {
            Ok(Some(value)) => Ok(Some(ParserString {
                value,
                kind: StringKind::Encoded,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(self.make_error_at(
                format!("Failed to decode encoded word: {}", e),
                offset,
            )),
        }
    }

    /// `quoted-string := DQUOTE *([FWS] qcontent) [FWS] DQUOTE`
    ///
    /// Folding line breaks are removed; the whitespace after them is kept.
    /// If `decode_words` is set and the whole content is an encoded word, it
    /// is decoded, since many agents quote encoded display names.
    fn parse_quoted_string(
        &mut self,
        decode_words: bool,
    ) -> Result<ParserString, ParseError> {
        let offset = self.current().offset;
        self.consume(TokenKind::DQuote, "Expected '\"'")?;

        let mut content = Vec::new();
        loop {
            if self.matches(TokenKind::DQuote) {
                break;
            }

            if self.check_with(is_qtext)
                || self.check_with(is_wsp)
                || self.check_with(is_ctl)
            {
                content.push(self.current().value);
                self.advance();
            } else if self.matches(TokenKind::Backslash) {
                if self.check(TokenKind::Eof) {
                    return Err(self.make_error_at(
                        "Unterminated quoted string",
                        offset,
                    ));
                }
                content.push(self.current().value);
                self.advance();
            } else if !self.parse_fws() {
                return Err(
                    self.make_error_at("Unterminated quoted string", offset)
                );
            }
        }

        let mut value = String::from_utf8_lossy(&content).into_owned();
        if decode_words {
            if let Ok(Some(decoded)) = ew_decode(value.trim(), self.charsets) {
                value = decoded;
            }
        }

        Ok(ParserString {
            value,
            kind: StringKind::Other,
        })
    }

    /// `CFWS := 1*([FWS] comment) [FWS] / FWS`, returning whether anything
    /// was consumed.
    pub(super) fn parse_cfws(&mut self) -> Result<bool, ParseError> {
        let mut consumed = false;
        loop {
            if self.parse_fws() {
                consumed = true;
            } else if self.check(TokenKind::LParen) {
                self.parse_comment()?;
                consumed = true;
            } else {
                return Ok(consumed);
            }
        }
    }

    /// `FWS := ([*WSP CRLF] 1*WSP) / obs-FWS`
    ///
    /// A line break is only consumed if whitespace follows it. Bare LF is
    /// accepted in place of CRLF.
    pub(super) fn parse_fws(&mut self) -> bool {
        let mut consumed = false;
        loop {
            if self.matches_with(is_wsp) {
                consumed = true;
                continue;
            }

            let state = self.save();
            let newline = if self.check(TokenKind::Cr) {
                self.consume_newline().is_ok()
            } else {
                self.matches(TokenKind::Lf)
            };

            if newline && self.check_with(is_wsp) {
                consumed = true;
            } else {
                self.restore(state);
                return consumed;
            }
        }
    }

    /// `comment := "(" *([FWS] ccontent) [FWS] ")"`
    ///
    /// Nesting is tracked with a counter rather than recursion so that
    /// deeply nested input cannot exhaust the stack. Comment content is
    /// discarded and is not validated beyond balancing and quoted-pairs.
    fn parse_comment(&mut self) -> Result<(), ParseError> {
        let offset = self.current().offset;
        self.consume(TokenKind::LParen, "Expected '('")?;

        let mut depth = 1u32;
        loop {
            match self.current().kind {
                TokenKind::Eof => {
                    return Err(
                        self.make_error_at("Unterminated comment", offset)
                    );
                },
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if 0 == depth {
                        self.advance();
                        return Ok(());
                    }
                },
                TokenKind::Backslash => {
                    self.advance();
                    if self.check(TokenKind::Eof) {
                        continue;
                    }
                },
                _ => (),
            }

            self.advance();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn word(value: &str, kind: StringKind) -> ParserString {
        ParserString {
            value: value.to_owned(),
            kind,
        }
    }

    #[test]
    fn phrase_spacing_table() {
        use StringKind::*;

        assert_eq!(
            "First MiddleLast",
            join_phrase(&[
                word("First", Other),
                word("Middle", Encoded),
                word("Last", Encoded),
            ])
        );
        assert_eq!(
            "a.b@c d",
            join_phrase(&[
                word("a", Other),
                word(".", Unspaced),
                word("b", Other),
                word("@", Unspaced),
                word("c", Other),
                word("d", Other),
            ])
        );
        assert_eq!(
            "x y",
            join_phrase(&[word("x", Encoded), word("y", Other)])
        );
        assert_eq!("", join_phrase(&[]));
    }

    #[test]
    fn dot_atom_detection() {
        assert!(is_dot_atom("john.doe"));
        assert!(!is_dot_atom("john doe"));
        assert!(!is_dot_atom("john..doe"));
        assert!(!is_dot_atom(""));
        assert_eq!(r#""john \"q\" doe""#, quote("john \"q\" doe"));
    }
}
