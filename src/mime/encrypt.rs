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

//! Re-encoding of a leaf body after encryption.
//!
//! The actual cryptography is supplied by the caller through
//! `BodyEncrypter`; this module only deals with the MIME side of things:
//! undoing the original transfer encoding and wrapping the ciphertext in
//! base64.

use super::content_encoding::{decode_transfer, ContentTransferEncoding};
use super::header::Header;
use crate::support::error::Error;

/// Maximum line length of the base64 output, excluding the CRLF
/// (RFC 2045 6.8).
const LINE_LENGTH: usize = 76;

/// Turns a plaintext body into ciphertext.
pub trait BodyEncrypter {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error>;
}

impl<F> BodyEncrypter for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, Error>,
{
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self(plaintext)
    }
}

/// Encrypts `body`, which is encoded according to `header`, and returns the
/// ciphertext as base64.
///
/// `header` is updated to declare `Content-Transfer-Encoding: base64`. The
/// returned body is split into 76-character lines, each terminated by CRLF.
pub fn encode_encrypted_body(
    header: &mut Header,
    body: &[u8],
    encrypter: &dyn BodyEncrypter,
) -> Result<Vec<u8>, Error> {
    let cte = header.get("Content-Transfer-Encoding");
    let plaintext =
        decode_transfer(ContentTransferEncoding::parse(&cte), body);
    let ciphertext = encrypter.encrypt(&plaintext)?;

    header.set("Content-Transfer-Encoding", "base64");

    let encoded = base64::encode(&ciphertext);
    let mut ret = Vec::with_capacity(
        encoded.len() + 2 * (encoded.len() / LINE_LENGTH + 1),
    );
    for line in encoded.as_bytes().chunks(LINE_LENGTH) {
        ret.extend_from_slice(line);
        ret.extend_from_slice(b"\r\n");
    }

    Ok(ret)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime::header::parse_header;

    fn reverse(plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(plaintext.iter().rev().copied().collect())
    }

    #[test]
    fn quoted_printable_body() {
        let mut header = parse_header(
            b"Content-Type: text/plain\r\n\
              Content-Transfer-Encoding: quoted-printable\r\n\
              \r\n",
        )
        .unwrap();

        let body = encode_encrypted_body(&mut header, b"ab=3Dc", &reverse)
            .unwrap();
        assert_eq!(b"Yz1iYQ==\r\n", &body[..]);
        assert_eq!("base64", header.get("Content-Transfer-Encoding"));
        assert_eq!(1, header.get_all("content-transfer-encoding").len());
        assert_eq!("text/plain", header.get("Content-Type"));
    }

    #[test]
    fn missing_encoding_is_added() {
        let mut header = parse_header(b"Subject: x\r\n\r\n").unwrap();
        let body =
            encode_encrypted_body(&mut header, b"hi", &reverse).unwrap();
        assert_eq!(b"aWg=\r\n", &body[..]);
        assert_eq!("base64", header.get("Content-Transfer-Encoding"));
        assert_eq!("x", header.get("Subject"));
    }

    #[test]
    fn long_output_is_wrapped() {
        let mut header = parse_header(b"\r\n").unwrap();
        let body = encode_encrypted_body(&mut header, &[0u8; 100], &reverse)
            .unwrap();
        let lines: Vec<&[u8]> = body
            .split(|&b| b'\n' == b)
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(2, lines.len());
        assert_eq!(LINE_LENGTH + 1, lines[0].len());
        assert!(body.ends_with(b"\r\n"));
        assert_eq!(
            vec![0u8; 100],
            base64::decode(
                body.iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect::<Vec<u8>>()
            )
            .unwrap()
        );
    }

    #[test]
    fn encrypter_errors_propagate() {
        let mut header = parse_header(b"Subject: x\r\n\r\n").unwrap();
        let fail = |_: &[u8]| -> Result<Vec<u8>, Error> {
            Err(Error::invalid_message("no key"))
        };
        assert_matches!(
            Err(Error::InvalidMessage { .. }),
            encode_encrypted_body(&mut header, b"hi", &fail)
        );
        assert!(!header.has("Content-Transfer-Encoding"));
    }
}
