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

//! Charset resolution and streaming transcoding to UTF-8.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Cursor, Read};

use encoding_rs::{CoderResult, Decoder, Encoding};
use lazy_static::lazy_static;

use crate::support::config::CharsetConfig;
use crate::support::error::Error;

/// Maps charset labels to decoders.
///
/// This is the seam through which callers can supply charsets that are not
/// built in. Implementations must not fall back to passing bytes through
/// unchanged: a charset that cannot be resolved is an error.
pub trait CharsetResolver {
    /// Wraps `input` in a reader which transcodes from `charset` to UTF-8.
    fn decoder<'a>(
        &self,
        charset: &str,
        input: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn Read + 'a>, Error>;

    /// Decodes a complete, in-memory buffer.
    fn decode(&self, charset: &str, input: &[u8]) -> Result<String, Error> {
        let mut reader = self.decoder(charset, Box::new(input))?;
        let mut ret = String::new();
        reader.read_to_string(&mut ret)?;
        Ok(ret)
    }
}

lazy_static! {
    /// IANA preferred MIME names, and their common aliases, for the charsets
    /// that `encoding_rs` supports. Keys are lowercase.
    static ref MIME_NAMES: HashMap<&'static str, &'static Encoding> = {
        use encoding_rs::*;

        let mut m = HashMap::new();
        m.insert("us-ascii", WINDOWS_1252);
        m.insert("ascii", WINDOWS_1252);
        m.insert("utf-8", UTF_8);
        m.insert("utf8", UTF_8);
        m.insert("utf-16be", UTF_16BE);
        m.insert("utf-16le", UTF_16LE);
        m.insert("iso-8859-1", WINDOWS_1252);
        m.insert("latin1", WINDOWS_1252);
        m.insert("iso-8859-2", ISO_8859_2);
        m.insert("latin2", ISO_8859_2);
        m.insert("iso-8859-3", ISO_8859_3);
        m.insert("iso-8859-4", ISO_8859_4);
        m.insert("iso-8859-5", ISO_8859_5);
        m.insert("iso-8859-6", ISO_8859_6);
        m.insert("iso-8859-7", ISO_8859_7);
        m.insert("iso-8859-8", ISO_8859_8);
        m.insert("iso-8859-8-i", ISO_8859_8_I);
        m.insert("iso-8859-10", ISO_8859_10);
        m.insert("iso-8859-13", ISO_8859_13);
        m.insert("iso-8859-14", ISO_8859_14);
        m.insert("iso-8859-15", ISO_8859_15);
        m.insert("iso-8859-16", ISO_8859_16);
        m.insert("koi8-r", KOI8_R);
        m.insert("koi8-u", KOI8_U);
        m.insert("shift_jis", SHIFT_JIS);
        m.insert("euc-jp", EUC_JP);
        m.insert("iso-2022-jp", ISO_2022_JP);
        m.insert("euc-kr", EUC_KR);
        m.insert("ks_c_5601-1987", EUC_KR);
        m.insert("gb2312", GBK);
        m.insert("gbk", GBK);
        m.insert("gb18030", GB18030);
        m.insert("big5", BIG5);
        m.insert("macintosh", MACINTOSH);
        m.insert("ibm866", IBM866);
        m.insert("windows-874", WINDOWS_874);
        m.insert("windows-1250", WINDOWS_1250);
        m.insert("windows-1251", WINDOWS_1251);
        m.insert("windows-1252", WINDOWS_1252);
        m.insert("windows-1253", WINDOWS_1253);
        m.insert("windows-1254", WINDOWS_1254);
        m.insert("windows-1255", WINDOWS_1255);
        m.insert("windows-1256", WINDOWS_1256);
        m.insert("windows-1257", WINDOWS_1257);
        m.insert("windows-1258", WINDOWS_1258);
        m
    };
}

/// The built-in resolver, backed by `encoding_rs`.
///
/// Lookup tries, in order: the configured aliases; the IANA MIME name; the
/// IANA `cs`-prefixed alias form (e.g. `csISOLatin2`); and finally the WHATWG
/// encoding label index. UTF-7 is not supported.
#[derive(Clone, Debug, Default)]
pub struct StandardCharsets {
    aliases: HashMap<String, String>,
}

impl StandardCharsets {
    pub fn from_config(config: &CharsetConfig) -> Self {
        StandardCharsets {
            aliases: config
                .aliases
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
        }
    }

    pub fn lookup(&self, charset: &str) -> Option<&'static Encoding> {
        // RFC 2231 5 allows a language suffix, as in `utf-8*en`
        let charset = charset.split('*').next().unwrap_or(charset).trim();
        let mut label = charset.to_ascii_lowercase();
        if let Some(alias) = self.aliases.get(&label) {
            label = alias.to_ascii_lowercase();
        }

        MIME_NAMES
            .get(&label[..])
            .copied()
            .or_else(|| {
                label
                    .strip_prefix("cs")
                    .and_then(|l| MIME_NAMES.get(l).copied())
            })
            .or_else(|| Encoding::for_label_no_replacement(label.as_bytes()))
    }
}

impl CharsetResolver for StandardCharsets {
    fn decoder<'a>(
        &self,
        charset: &str,
        input: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn Read + 'a>, Error> {
        let encoding = self
            .lookup(charset)
            .ok_or_else(|| Error::UnsupportedCharset(charset.to_owned()))?;
        // UTF-8 also goes through the decoder so that the output is
        // guaranteed to be valid.
        Ok(Box::new(CharsetReader::new(encoding, input)))
    }
}

/// A `Read` adapter which transcodes its input to UTF-8.
///
/// Malformed input is replaced with U+FFFD. A byte-order mark at the start
/// of the input is removed.
pub struct CharsetReader<R> {
    reader: R,
    decoder: Decoder,
    input: Vec<u8>,
    buffer: Cursor<Vec<u8>>,
    finished: bool,
}

impl<R> fmt::Debug for CharsetReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CharsetReader")
            .field("encoding", &self.decoder.encoding().name())
            .field("input", &self.input.len())
            .field("buffer", &self.buffer)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R> CharsetReader<R> {
    pub fn new(encoding: &'static Encoding, reader: R) -> Self {
        CharsetReader {
            reader,
            decoder: encoding.new_decoder_with_bom_removal(),
            input: vec![0u8; 4096],
            buffer: Cursor::new(Vec::new()),
            finished: false,
        }
    }
}

impl<R: Read> Read for CharsetReader<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.fill_buf()?;
        self.buffer.read(dst)
    }
}

impl<R: Read> BufRead for CharsetReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while (self.buffer.position() as usize) >= self.buffer.get_ref().len()
            && !self.finished
        {
            let nread = self.reader.read(&mut self.input)?;
            let last = 0 == nread;
            let data = &self.input[..nread];

            let capacity = self
                .decoder
                .max_utf8_buffer_length(data.len())
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "Chunk too large")
                })?;

            let out = self.buffer.get_mut();
            out.clear();
            out.resize(capacity, 0);
            let (status, _nread, nwritten, _replaced) =
                self.decoder.decode_to_utf8(data, out, last);
            debug_assert_eq!(CoderResult::InputEmpty, status);
            out.truncate(nwritten);
            self.buffer.set_position(0);
            self.finished = last;
        }

        self.buffer.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.buffer.consume(amt);
    }
}
