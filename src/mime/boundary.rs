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

//! Splitting of `multipart/*` bodies at their boundary delimiters
//! (RFC 2046 5.1.1).

use crate::support::error::Error;
use crate::support::scanner::Scanner;

/// One body part found by `PartScanner::scan`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Part<'a> {
    /// Offset of `data` within the scanned input.
    pub offset: usize,
    /// The part, including its own header, without the line ending that
    /// precedes the next delimiter.
    pub data: &'a [u8],
}

#[derive(Clone, Debug)]
pub struct PartScanner {
    /// `--boundary`
    delimiter: Vec<u8>,
}

impl PartScanner {
    /// Prepares to scan for `boundary`.
    ///
    /// Boundaries which break the RFC 2046 rules (too long, or with
    /// characters outside `bchars`) are scanned as written. Trailing
    /// whitespace is dropped since delimiter lines are compared trimmed. Only
    /// a boundary which is empty after that is rejected.
    pub fn new(boundary: &str) -> Result<Self, Error> {
        let trimmed =
            boundary.trim_end_matches(|c: char| c.is_ascii_whitespace());
        if trimmed.is_empty() {
            return Err(Error::Boundary(boundary.to_owned()));
        }

        let mut delimiter = Vec::with_capacity(trimmed.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(trimmed.as_bytes());
        Ok(PartScanner { delimiter })
    }

    /// Splits `body` into its parts.
    ///
    /// Delimiter lines are compared after trimming ASCII whitespace, which
    /// also disposes of stray CRs such as in `--boundary\r\r\n`. The preamble
    /// and epilogue are discarded. If the close delimiter is missing, the
    /// final part runs to the end of `body`.
    pub fn scan<'a>(&self, body: &'a [u8]) -> Vec<Part<'a>> {
        let mut parts = Vec::new();
        let mut scanner = Scanner::new(body);
        let mut part_start: Option<usize> = None;

        loop {
            let line_start = scanner.offset();
            let line = scanner.read_until(b'\n');
            if line.is_empty() {
                break;
            }

            let is_close = match self.classify(line) {
                None => continue,
                Some(is_close) => is_close,
            };

            if let Some(start) = part_start.take() {
                parts.push(Part {
                    offset: start,
                    data: strip_line_ending(&body[start..line_start]),
                });
            }

            if is_close {
                return parts;
            }

            part_start = Some(scanner.offset());
        }

        if let Some(start) = part_start {
            parts.push(Part {
                offset: start,
                data: &body[start..],
            });
        }

        parts
    }

    /// Returns `Some(false)` for a delimiter line, `Some(true)` for the close
    /// delimiter, and `None` for anything else.
    fn classify(&self, line: &[u8]) -> Option<bool> {
        let line = super::header::trim_whitespace(line);
        let rest = line.strip_prefix(&self.delimiter[..])?;
        match rest {
            b"" => Some(false),
            b"--" => Some(true),
            _ => None,
        }
    }
}

fn strip_line_ending(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .unwrap_or(data)
}

#[cfg(test)]
mod test {
    use super::*;

    fn scan<'a>(boundary: &str, body: &'a [u8]) -> Vec<Part<'a>> {
        PartScanner::new(boundary).unwrap().scan(body)
    }

    #[test]
    fn malformed_line_endings() {
        let body = b"--longrandomstring\r\r\n\
                     \r\n\
                     body1\r\n\
                     \r\n\
                     --longrandomstring\r\r\n\
                     \r\n\
                     body2\r\n\
                     \r\n\
                     --longrandomstring--\r\r\n";
        let parts = scan("longrandomstring", body);
        assert_eq!(2, parts.len());
        assert_eq!(b"\r\nbody1\r\n", parts[0].data);
        assert_eq!(b"\r\nbody2\r\n", parts[1].data);
        for part in &parts {
            assert_eq!(
                part.data,
                &body[part.offset..part.offset + part.data.len()]
            );
        }
        assert_eq!(21, parts[0].offset);
    }

    #[test]
    fn preamble_and_epilogue_are_ignored() {
        let body = b"This is a preamble\r\n\
                     --b\r\n\
                     one\r\n\
                     --b\r\n\
                     two\r\n\
                     --b--\r\n\
                     epilogue\r\n";
        let parts = scan("b", body);
        assert_eq!(
            vec![&b"one"[..], &b"two"[..]],
            parts.iter().map(|p| p.data).collect::<Vec<_>>()
        );
    }

    #[test]
    fn unix_line_endings() {
        let parts = scan("b", b"--b\none\n\n--b\ntwo\n--b--\n");
        assert_eq!(b"one\n", parts[0].data);
        assert_eq!(b"two", parts[1].data);
    }

    #[test]
    fn missing_close_delimiter() {
        let parts = scan("b", b"--b\r\none\r\n--b\r\ntwo\r\n");
        assert_eq!(2, parts.len());
        assert_eq!(b"two\r\n", parts[1].data);
    }

    #[test]
    fn nested_boundary_prefix_does_not_match() {
        let parts = scan(
            "outer",
            b"--outer\r\n\
              --outer-inner\r\n\
              x\r\n\
              --outer--\r\n",
        );
        assert_eq!(1, parts.len());
        assert_eq!(b"--outer-inner\r\nx", parts[0].data);
    }

    #[test]
    fn empty_and_boundaryless_input() {
        assert!(scan("b", b"").is_empty());
        assert!(scan("b", b"no delimiters here\r\n").is_empty());
        // An empty part between adjacent delimiters
        assert_eq!(
            vec![Part {
                offset: 5,
                data: &b""[..],
            }],
            scan("b", b"--b\r\n--b--")
        );
    }

    #[test]
    fn lenient_boundaries() {
        assert_matches!(Err(Error::Boundary(_)), PartScanner::new(""));
        assert_matches!(Err(Error::Boundary(_)), PartScanner::new(" \t"));
        assert!(PartScanner::new("=_Part_0.1234:5").is_ok());

        let long = "x".repeat(71);
        let body =
            format!("--{0}\r\na\r\n--{0}\r\nb\r\n--{0}--\r\n", long);
        let parts = scan(&long, body.as_bytes());
        assert_eq!(2, parts.len());
        assert_eq!(b"a", parts[0].data);
        assert_eq!(b"b", parts[1].data);

        let parts = scan("#b!", b"--#b!\r\na\r\n--#b!--\r\n");
        assert_eq!(1, parts.len());
        assert_eq!(b"a", parts[0].data);

        // Trailing space never survives line trimming, so it is ignored
        let parts = scan("b ", b"--b\r\na\r\n--b--\r\n");
        assert_eq!(1, parts.len());
    }
}
