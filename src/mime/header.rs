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

//! The RFC 5322 header block: an ordered sequence of `Key: value` fields.
//!
//! Parsing is deliberately structural only. Values are kept as the raw bytes
//! they were written with; interpretation (addresses, dates, media types) is
//! done on demand by the callers that need it.

use std::fmt;
use std::str;

use crate::support::error::Error;
use crate::support::scanner::Scanner;

/// A parsed header block.
///
/// Duplicate keys are preserved in the order they occur. Lookups are ASCII
/// case-insensitive and find the first occurrence.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<Entry>,
    /// The blank line which terminated the block, if there was one.
    trailer: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq)]
struct Entry {
    /// The full logical line, including folding and the final line ending.
    raw: Vec<u8>,
    /// The key as written, without trailing whitespace.
    key: String,
    /// `key`, lowercased, for lookup.
    map_key: String,
    /// Index into `raw` just past the `:`.
    value_start: usize,
}

impl Entry {
    fn raw_value(&self) -> &[u8] {
        &self.raw[self.value_start..]
    }

    /// The unfolded value: each physical line is trimmed of surrounding
    /// whitespace and the non-empty ones are joined with a single space.
    fn merged_value(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(self.raw.len() - self.value_start);
        for fragment in self.raw_value().split(|&b| b'\n' == b) {
            let fragment = trim_whitespace(fragment);
            if fragment.is_empty() {
                continue;
            }

            if !ret.is_empty() {
                ret.push(b' ');
            }
            ret.extend_from_slice(fragment);
        }
        ret
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| {
                (&e.key, String::from_utf8_lossy(e.raw_value()).into_owned())
            }))
            .finish()
    }
}

/// Parses a header block.
///
/// Parsing stops at the first blank line, which becomes the trailer of the
/// header; anything after it is not part of the header. Input without a
/// blank line is parsed to its end.
///
/// A physical line continues the previous field if it starts with
/// whitespace, if it has no `:` at all, or if the previous line left a
/// double-quoted string open. The last rule keeps values like
/// `name="long\nfilename: foo.doc"` in one field.
pub fn parse_header(input: &[u8]) -> Result<Header, Error> {
    let mut header = Header::default();
    let mut scanner = Scanner::new(input);
    let mut in_quotes = false;

    loop {
        let offset = scanner.offset();
        let line = scanner.read_until(b'\n');
        if line.is_empty() {
            break;
        }

        let content = trim_newline(line);
        if content.is_empty() {
            header.trailer = line.to_vec();
            break;
        }

        let colon = memchr::memchr(b':', content);
        let is_continuation = in_quotes
            || content.starts_with(b" ")
            || content.starts_with(b"\t")
            || colon.is_none();

        if is_continuation {
            let last = header
                .entries
                .last_mut()
                .ok_or(Error::KeyNotFound { offset })?;
            last.raw.extend_from_slice(line);
            in_quotes ^= has_odd_quotes(line);
            continue;
        }

        let colon = colon.ok_or(Error::KeyNotFound { offset })?;
        let key = trim_end(&content[..colon]);
        if key.is_empty() {
            return Err(Error::KeyNotFound { offset });
        }
        if !key.iter().all(|&b| (33..=126).contains(&b)) {
            return Err(Error::NonAsciiHeaderKey { offset });
        }

        // Infallible since the key is all printable ASCII
        let key = str::from_utf8(key).unwrap_or_default().to_owned();
        in_quotes = has_odd_quotes(&line[colon + 1..]);
        header.entries.push(Entry {
            raw: line.to_vec(),
            map_key: key.to_ascii_lowercase(),
            key,
            value_start: colon + 1,
        });
    }

    Ok(header)
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &line[..end]
}

fn trim_end(s: &[u8]) -> &[u8] {
    let end = s
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |ix| ix + 1);
    &s[..end]
}

pub(super) fn trim_whitespace(s: &[u8]) -> &[u8] {
    let s = trim_end(s);
    let start = s
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(s.len());
    &s[start..]
}

/// Whether `s` contains an odd number of `"` characters not escaped with a
/// backslash.
fn has_odd_quotes(s: &[u8]) -> bool {
    let mut odd = false;
    let mut escaped = false;
    for &b in s {
        if escaped {
            escaped = false;
        } else if b'\\' == b {
            escaped = true;
        } else if b'"' == b {
            odd = !odd;
        }
    }
    odd
}

/// Converts `key` to the canonical MIME form, in which the first letter and
/// any letter following a `-` are upper case and all others lower case.
pub fn canonical_key(key: &str) -> String {
    let mut upper = true;
    key.chars()
        .map(|c| {
            let c = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = '-' == c;
            c
        })
        .collect()
}

impl Header {
    fn find(&self, key: &str) -> Option<&Entry> {
        let key = key.to_ascii_lowercase();
        self.entries.iter().find(|e| e.map_key == key)
    }

    fn position(&self, key: &str) -> Option<usize> {
        let key = key.to_ascii_lowercase();
        self.entries.iter().position(|e| e.map_key == key)
    }

    /// Returns the unfolded value of the first field named `key`, or the
    /// empty string if there is none.
    ///
    /// Non-UTF-8 bytes are replaced with U+FFFD.
    pub fn get(&self, key: &str) -> String {
        String::from_utf8_lossy(&self.get_bytes(key)).into_owned()
    }

    /// Like `get`, but returns the raw octets.
    pub fn get_bytes(&self, key: &str) -> Vec<u8> {
        self.find(key).map(Entry::merged_value).unwrap_or_default()
    }

    /// Returns the unfolded values of every field named `key`, in order.
    pub fn get_all(&self, key: &str) -> Vec<String> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|e| e.map_key == key)
            .map(|e| String::from_utf8_lossy(&e.merged_value()).into_owned())
            .collect()
    }

    /// Returns the value of the first field named `key` exactly as written,
    /// including folding, leading whitespace, and the line ending.
    pub fn get_raw(&self, key: &str) -> Option<&[u8]> {
        self.find(key).map(Entry::raw_value)
    }

    /// Returns the whole first field named `key`, including its key.
    pub fn get_line(&self, key: &str) -> Option<&[u8]> {
        self.find(key).map(|e| &e.raw[..])
    }

    pub fn has(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, unfolded value)` in order. Keys are as written.
    pub fn entries(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.entries.iter().map(|e| {
            (
                &e.key[..],
                String::from_utf8_lossy(&e.merged_value()).into_owned(),
            )
        })
    }

    /// Sets the value of `key`.
    ///
    /// If a field named `key` exists, the first one is replaced in place,
    /// retaining its original key spelling. Otherwise, a new field is added
    /// at the front of the header with the key in canonical form.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.position(key) {
            Some(ix) => {
                let entry = &mut self.entries[ix];
                entry.raw.truncate(entry.value_start);
                entry.raw.push(b' ');
                entry.raw.extend_from_slice(value.as_bytes());
                entry.raw.extend_from_slice(b"\r\n");
            },

            None => {
                let key = canonical_key(key);
                let mut raw = Vec::with_capacity(key.len() + value.len() + 4);
                raw.extend_from_slice(key.as_bytes());
                raw.extend_from_slice(b": ");
                raw.extend_from_slice(value.as_bytes());
                raw.extend_from_slice(b"\r\n");
                self.entries.insert(
                    0,
                    Entry {
                        value_start: key.len() + 1,
                        map_key: key.to_ascii_lowercase(),
                        key,
                        raw,
                    },
                );
            },
        }
    }

    /// Removes the first field named `key`, returning whether there was one.
    pub fn del(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(ix) => {
                self.entries.remove(ix);
                true
            },
            None => false,
        }
    }

    /// Returns the fields whose keys are in `keys`, in their original order,
    /// followed by the terminating blank line.
    pub fn fields(&self, keys: &[&str]) -> Vec<u8> {
        self.filtered(keys, true)
    }

    /// Returns the fields whose keys are not in `keys`, in their original
    /// order, followed by the terminating blank line.
    pub fn fields_not(&self, keys: &[&str]) -> Vec<u8> {
        self.filtered(keys, false)
    }

    fn filtered(&self, keys: &[&str], keep_matching: bool) -> Vec<u8> {
        let mut ret = Vec::new();
        for entry in &self.entries {
            let matches =
                keys.iter().any(|k| k.eq_ignore_ascii_case(&entry.key));
            if matches == keep_matching {
                ret.extend_from_slice(&entry.raw);
            }
        }

        if self.trailer.is_empty() {
            ret.extend_from_slice(b"\r\n");
        } else {
            ret.extend_from_slice(&self.trailer);
        }
        ret
    }

    /// Reassembles the header block.
    ///
    /// For an unmodified header, this is exactly the input to
    /// `parse_header`, up to and including the terminating blank line.
    pub fn raw(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(
            self.entries.iter().map(|e| e.raw.len()).sum::<usize>()
                + self.trailer.len(),
        );
        for entry in &self.entries {
            ret.extend_from_slice(&entry.raw);
        }
        ret.extend_from_slice(&self.trailer);
        ret
    }
}
