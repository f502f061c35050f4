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

//! RFC 2045 5.1 `Content-Type` values.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::map,
    error::ErrorKind,
    multi::many0,
    sequence::{preceded, separated_pair, tuple},
    IResult,
};

/// A parsed media type.
///
/// The type, subtype, and parameter names are lowercased. Parameter values
/// are kept as written, minus quoting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    pub typ: String,
    pub subtype: String,
    pub parms: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(typ: &str, subtype: &str) -> Self {
        ContentType {
            typ: typ.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parms: vec![],
        }
    }

    /// The RFC 2045 default, `text/plain`.
    pub fn text_plain() -> Self {
        ContentType::new("text", "plain")
    }

    /// The default within `multipart/digest` (RFC 2046 5.1.5).
    pub fn message_rfc822() -> Self {
        ContentType::new("message", "rfc822")
    }

    pub fn is_type(&self, typ: &str) -> bool {
        self.typ.eq_ignore_ascii_case(typ)
    }

    pub fn is_subtype(&self, subtype: &str) -> bool {
        self.subtype.eq_ignore_ascii_case(subtype)
    }

    /// Returns the first parameter named `name`, if any.
    pub fn parm(&self, name: &str) -> Option<&str> {
        self.parms
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| &v[..])
    }
}

// RFC 2045 5.1 "token"
fn is_token_char(b: u8) -> bool {
    b > b' ' && b < 0x7F && !b"()<>@,;:\\\"/[]?=".contains(&b)
}

fn ws(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while(|b: u8| b.is_ascii_whitespace())(i)
}

fn token(i: &[u8]) -> IResult<&[u8], String> {
    map(take_while1(is_token_char), |t: &[u8]| {
        String::from_utf8_lossy(t).into_owned()
    })(i)
}

// RFC 5322 quoted-string, leniently: an unterminated string runs to the end
// of the input.
fn quoted_string(i: &[u8]) -> IResult<&[u8], String> {
    let mut i = match i {
        [b'"', rest @ ..] => rest,
        _ => return Err(nom::Err::Error((i, ErrorKind::Char))),
    };
    let mut value = Vec::new();
    loop {
        match i {
            [] => break,
            [b'"', rest @ ..] => {
                i = rest;
                break;
            },
            [b'\\', escaped, rest @ ..] => {
                value.push(*escaped);
                i = rest;
            },
            [b, rest @ ..] => {
                value.push(*b);
                i = rest;
            },
        }
    }

    Ok((i, String::from_utf8_lossy(&value).into_owned()))
}

fn parameter(i: &[u8]) -> IResult<&[u8], (String, String)> {
    preceded(
        tuple((ws, char(';'), ws)),
        separated_pair(
            map(token, |t| t.to_ascii_lowercase()),
            tuple((ws, char('='), ws)),
            alt((quoted_string, token)),
        ),
    )(i)
}

fn content_type(i: &[u8]) -> IResult<&[u8], ContentType> {
    map(
        tuple((
            ws,
            token,
            ws,
            char('/'),
            ws,
            token,
            // Stops at the first malformed parameter; everything before it
            // is kept.
            many0(parameter),
        )),
        |(_, typ, _, _, _, subtype, parms)| ContentType {
            typ: typ.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parms,
        },
    )(i)
}

/// Parses the value of a `Content-Type` header.
///
/// Returns `None` if there is not even a recognisable `type/subtype`.
pub fn parse_content_type(value: &[u8]) -> Option<ContentType> {
    content_type(value).ok().map(|(_, ct)| ct)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn simple() {
        let ct = parse_content_type(b" Text/HTML").unwrap();
        assert_eq!(ContentType::new("text", "html"), ct);
        assert!(ct.is_type("TEXT"));
        assert!(ct.is_subtype("html"));
        assert_eq!(None, ct.parm("charset"));
    }

    #[test]
    fn parameters() {
        let ct = parse_content_type(
            b"multipart/mixed;\r\n\tBoundary=\"=_a \\\"b\\\"\"; charset=utf-8",
        )
        .unwrap();
        assert_eq!("multipart", ct.typ);
        assert_eq!(Some("=_a \"b\""), ct.parm("boundary"));
        assert_eq!(Some("utf-8"), ct.parm("CHARSET"));
    }

    #[test]
    fn lenient() {
        let ct =
            parse_content_type(b"text/plain; charset=us-ascii; (garbage)")
                .unwrap();
        assert_eq!(Some("us-ascii"), ct.parm("charset"));

        let ct = parse_content_type(b"text/plain; name=\"unterminated")
            .unwrap();
        assert_eq!(Some("unterminated"), ct.parm("name"));

        let ct = parse_content_type(b"text / plain ;format=flowed").unwrap();
        assert_eq!(Some("flowed"), ct.parm("format"));

        assert_eq!(None, parse_content_type(b"text"));
        assert_eq!(None, parse_content_type(b""));
        assert_eq!(None, parse_content_type(b"/plain"));
    }
}
