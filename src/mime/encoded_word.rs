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

use lazy_static::lazy_static;
use regex::Regex;

use super::charset::CharsetResolver;
use super::quoted_printable::qp_decode;
use crate::support::error::{Error, ParseError};

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
}

/// Test if `word` (in its entirety) is an RFC 2047 "encoded word".
///
/// If it is, decode it through `charsets` and return its decoded value.
///
/// Returns `Ok(None)` if it is not syntactically an encoded word, or names a
/// transfer encoding other than `Q` or `B`. An encoded word whose charset
/// cannot be resolved, or whose `B` content is not valid base64, is an error.
///
/// This returns an `Option` instead of returning the input unchanged in cases
/// where it is not an encoded word because the distinction is significant:
/// whitespace is supposed to be deleted between adjacent encoded words, but
/// must be left alone in all other cases.
pub fn ew_decode(
    word: &str,
    charsets: &dyn CharsetResolver,
) -> Result<Option<String>, Error> {
    // RFC 2047 limits encoded words to 75 characters, but some agents produce
    // longer ones and other readers accept them, so no limit is enforced.
    let captures = match ENCODED_WORD.captures(word) {
        Some(captures) => captures,
        None => return Ok(None),
    };

    let charset = &captures[1];
    let content = captures[3].as_bytes();

    let content = match &captures[2] {
        "q" | "Q" => {
            // _ in the content (before transfer decoding) stands for ASCII
            // space regardless of charset
            let content: Vec<u8> = content
                .iter()
                .map(|&b| if b'_' == b { b' ' } else { b })
                .collect();
            qp_decode(&content).0.into_owned()
        },
        // The offset is relative to the start of the encoded word
        "b" | "B" => base64::decode(content).map_err(|e| {
            ParseError::new(format!("Bad base64 in encoded word: {}", e), 0)
        })?,
        _ => return Ok(None),
    };

    charsets.decode(charset, &content).map(Some)
}
