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

//! Streaming decoders for RFC 2045 `Content-Transfer-Encoding`.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, BufRead, Cursor, Read};

use super::quoted_printable::qp_decode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    /// `7bit`, `8bit`, `binary`, and anything unrecognised.
    Identity,
    Base64,
    QuotedPrintable,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding::Identity
    }
}

impl ContentTransferEncoding {
    /// Interprets a `Content-Transfer-Encoding` header value.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("base64") {
            ContentTransferEncoding::Base64
        } else if value.eq_ignore_ascii_case("quoted-printable") {
            ContentTransferEncoding::QuotedPrintable
        } else {
            ContentTransferEncoding::Identity
        }
    }
}

/// Wraps `reader` in a decoder for `cte`.
pub fn transfer_decoder<'a>(
    cte: ContentTransferEncoding,
    reader: impl Read + 'a,
) -> Box<dyn Read + 'a> {
    match cte {
        ContentTransferEncoding::Identity => Box::new(reader),
        ContentTransferEncoding::Base64 => Box::new(Base64Reader::new(reader)),
        ContentTransferEncoding::QuotedPrintable => {
            Box::new(QuotedPrintableReader::new(reader))
        },
    }
}

/// Decodes all of `data` per `cte`.
pub fn decode_transfer(cte: ContentTransferEncoding, data: &[u8]) -> Vec<u8> {
    let mut ret = Vec::new();
    // Reading from a slice cannot fail and the decoders never report errors
    let _ = transfer_decoder(cte, data).read_to_end(&mut ret);
    ret
}

const CHUNK_SIZE: usize = 4096;

/// Decodes base64 content.
///
/// Characters outside the base64 alphabet (line breaks, but also any junk)
/// are skipped. Decoding is done a quad at a time; a quad which is not valid
/// (e.g. padding in the middle of the stream) is dropped rather than failing
/// the whole body. Trailing characters which do not make up a full quad are
/// decoded as if padded.
pub struct Base64Reader<R> {
    reader: R,
    /// Alphabet characters not yet decoded.
    input_buffer: Vec<u8>,
    buffer: Cursor<Vec<u8>>,
    eof: bool,
}

impl<R> fmt::Debug for Base64Reader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Base64Reader")
            .field("input_buffer", &self.input_buffer)
            .field("buffer", &self.buffer)
            .field("eof", &self.eof)
            .finish()
    }
}

impl<R> Base64Reader<R> {
    pub fn new(reader: R) -> Self {
        Base64Reader {
            reader,
            input_buffer: Vec::with_capacity(CHUNK_SIZE),
            buffer: Cursor::new(Vec::with_capacity(CHUNK_SIZE)),
            eof: false,
        }
    }

    fn decode_quads(&mut self, final_chunk: bool) {
        self.buffer.get_mut().clear();
        self.buffer.set_position(0);

        if final_chunk {
            match self.input_buffer.len() % 4 {
                // A single leftover character carries no full byte
                1 => {
                    self.input_buffer.pop();
                },
                2 => self.input_buffer.extend_from_slice(b"=="),
                3 => self.input_buffer.push(b'='),
                _ => (),
            }
        }

        let usable_length = self.input_buffer.len() / 4 * 4;
        let out = self.buffer.get_mut();
        for quad in self.input_buffer[..usable_length].chunks(4) {
            let len = out.len();
            if base64::decode_config_buf(quad, base64::STANDARD, out).is_err() {
                out.truncate(len);
            }
        }

        self.input_buffer.drain(..usable_length);
    }
}

impl<R: Read> Read for Base64Reader<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.fill_buf()?;
        self.buffer.read(dst)
    }
}

impl<R: Read> BufRead for Base64Reader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let mut chunk = [0u8; CHUNK_SIZE];
        while (self.buffer.position() as usize) >= self.buffer.get_ref().len()
            && !self.eof
        {
            let nread = self.reader.read(&mut chunk)?;
            self.eof = 0 == nread;
            self.input_buffer.extend(
                chunk[..nread].iter().copied().filter(|&b| {
                    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
                }),
            );
            let eof = self.eof;
            self.decode_quads(eof);
        }

        self.buffer.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.buffer.consume(amt);
    }
}

/// Decodes quoted-printable content, carrying incomplete escape sequences
/// over from one chunk of input to the next.
pub struct QuotedPrintableReader<R> {
    reader: R,
    /// The incomplete escape sequence at the end of the previous chunk.
    dangling: Vec<u8>,
    buffer: Cursor<Vec<u8>>,
    eof: bool,
}

impl<R> fmt::Debug for QuotedPrintableReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("QuotedPrintableReader")
            .field("dangling", &self.dangling)
            .field("buffer", &self.buffer)
            .field("eof", &self.eof)
            .finish()
    }
}

impl<R> QuotedPrintableReader<R> {
    pub fn new(reader: R) -> Self {
        QuotedPrintableReader {
            reader,
            dangling: Vec::new(),
            buffer: Cursor::new(Vec::with_capacity(CHUNK_SIZE)),
            eof: false,
        }
    }
}

impl<R: Read> Read for QuotedPrintableReader<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.fill_buf()?;
        self.buffer.read(dst)
    }
}

impl<R: Read> BufRead for QuotedPrintableReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while (self.buffer.position() as usize) >= self.buffer.get_ref().len()
            && !self.eof
        {
            let mut input = std::mem::take(&mut self.dangling);
            let start = input.len();
            input.resize(start + CHUNK_SIZE, 0);
            let nread = self.reader.read(&mut input[start..])?;
            input.truncate(start + nread);
            self.eof = 0 == nread;

            let out = self.buffer.get_mut();
            out.clear();
            self.buffer.set_position(0);

            let (decoded, dangling) = qp_decode(&input);
            let out = self.buffer.get_mut();
            match decoded {
                Cow::Borrowed(d) => out.extend_from_slice(d),
                Cow::Owned(d) => *out = d,
            }

            if self.eof {
                // Nothing more is coming, so the incomplete escape is
                // just text
                out.extend_from_slice(dangling);
            } else {
                self.dangling = dangling.to_vec();
            }
        }

        self.buffer.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.buffer.consume(amt);
    }
}
