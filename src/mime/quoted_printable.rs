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

use std::borrow::Cow;

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// Encoded bytes and soft line endings are both handled, the latter by
/// discarding. UNIX line endings are handled as well as DOS line endings.
///
/// This never fails. Invalid sequences are passed through untransformed.
/// 8-bit characters are passed through, including invalid UTF-8.
///
/// Returns the decoded bytes, as well as a possible "dangling" slice at the
/// end of the input, which is an escape sequence that is not yet complete
/// and must be prepended to the next chunk of input.
pub fn qp_decode(s: &[u8]) -> (Cow<[u8]>, &[u8]) {
    if !s.contains(&b'=') {
        return (Cow::Borrowed(s), &[]);
    }

    let mut decoded = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        let Some(eq) = memchr::memchr(b'=', &s[ix..]) else {
            decoded.extend_from_slice(&s[ix..]);
            break;
        };

        decoded.extend_from_slice(&s[ix..ix + eq]);
        ix += eq;

        let escape = &s[ix + 1..(ix + 3).min(s.len())];
        match escape {
            [b'\n', ..] => ix += 2,
            [b'\r', b'\n'] => ix += 3,
            [hi, lo] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                decoded.push(hex_value(*hi) << 4 | hex_value(*lo));
                ix += 3;
            },
            // Incomplete at end of input; could still become valid
            [] | [b'\r'] => return (Cow::Owned(decoded), &s[ix..]),
            [hi] if hi.is_ascii_hexdigit() => {
                return (Cow::Owned(decoded), &s[ix..]);
            },
            _ => {
                decoded.push(b'=');
                ix += 1;
            },
        }
    }

    (Cow::Owned(decoded), &[])
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn assert_qp(expected: &[u8], expected_dangling: &[u8], input: &[u8]) {
        let (actual, actual_dangling) = qp_decode(input);
        assert_eq!(expected, &actual[..]);
        assert_eq!(expected_dangling, actual_dangling);
    }

    #[test]
    fn test_qp_decode() {
        assert_qp(b"hello world", b"", b"hello world");
        assert_qp(b"\xabfoo", b"", b"=ABfoo");
        assert_qp(b"fo\xabo", b"", b"fo=abo");
        assert_qp(b"foo\xab\xcd", b"", b"foo=AB=CD");

        assert_qp(b"foobar", b"", b"foo=\nbar");
        assert_qp(b"foobar", b"", b"foo=\r\nbar");

        assert_qp(b"foo=()bar", b"", b"foo=()bar");
        assert_qp(b"foo=\xabbar", b"", b"foo==ABbar");
        assert_qp(b"foo=A\xabbar", b"", b"foo=A=ABbar");
        assert_qp("foo=ゑbar".as_bytes(), b"", "foo=ゑbar".as_bytes());
        assert_qp(b"foo=\rbar", b"", b"foo=\rbar");

        assert_qp(b"foo", b"=", b"foo=");
        assert_qp(b"foo", b"=A", b"foo=A");
        assert_qp(b"foo", b"=\r", b"foo=\r");
        assert_qp(b"foo=x", b"", b"foo=x");
    }

    #[test]
    fn unescaped_input_is_borrowed() {
        assert!(matches!(qp_decode(b"plain").0, Cow::Borrowed(_)));
    }

    proptest! {
        #[test]
        fn qp_decode_never_fails(
            s in prop::collection::vec(prop::num::u8::ANY, 0..20)
        ) {
            let (decoded, dangling) = qp_decode(&s);
            prop_assert!(decoded.len() <= s.len());
            prop_assert!(dangling.len() <= 2);
        }
    }
}
