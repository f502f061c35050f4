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

//! The lazily-built tree of RFC 822 entities making up a message.
//!
//! A `Section` is a view into a shared buffer holding the whole message. The
//! root is created by `Section::parse`; children are only discovered the
//! first time they are asked for, and are cached thereafter. Every section
//! in a tree shares the root's buffer, so no message data is ever copied.
//!
//! `message/rfc822` entities are flattened: the children of the embedded
//! message become the children of the wrapper, which is what IMAP part
//! numbering expects (part `2.1` is the first part of the message embedded
//! as part `2`).

use std::fmt;
use std::io::Read;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use log::{debug, warn};

use super::boundary::PartScanner;
use super::charset::CharsetResolver;
use super::content_encoding::{
    decode_transfer, transfer_decoder, ContentTransferEncoding,
};
use super::header::{parse_header, Header};
use super::media_type::{parse_content_type, ContentType};
use crate::support::config::Limits;
use crate::support::error::Error;
use crate::support::scanner::Scanner;

/// Splits `message` into its header and body.
///
/// The header runs up to and including the first blank line, where a line
/// consisting only of CRs is also considered blank. If there is no blank
/// line, the whole input is header and the body is empty.
pub fn split(message: &[u8]) -> (&[u8], &[u8]) {
    let mut scanner = Scanner::new(message);
    loop {
        let line = scanner.read_until(b'\n');
        if line.is_empty() {
            return (message, &[]);
        }

        if line.iter().all(|&b| b'\r' == b || b'\n' == b) {
            return message.split_at(scanner.offset());
        }
    }
}

pub struct Section {
    /// The IMAP part path, 1-based. Empty for the root.
    identifier: Vec<usize>,
    literal: Arc<[u8]>,
    header_start: usize,
    body_start: usize,
    end: usize,
    depth: u32,
    /// The content type assumed if the header does not give one.
    default_content_type: ContentType,
    limits: Limits,
    /// Number of sections created under the root so far.
    part_count: Arc<AtomicU32>,
    header: OnceLock<Result<Header, Error>>,
    children: OnceLock<Vec<Section>>,
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Section")
            .field("identifier", &self.identifier)
            .field("header_range", &self.header_range())
            .field("body_range", &self.body_range())
            .field("depth", &self.depth)
            .field("default_content_type", &self.default_content_type)
            .finish()
    }
}

impl Section {
    /// Creates the root section of `message`.
    pub fn parse(message: impl Into<Arc<[u8]>>) -> Self {
        Self::parse_with_limits(message, Limits::default())
    }

    pub fn parse_with_limits(
        message: impl Into<Arc<[u8]>>,
        limits: Limits,
    ) -> Self {
        let literal = message.into();
        let end = literal.len();
        Self::new(
            vec![],
            literal,
            0,
            end,
            0,
            ContentType::text_plain(),
            limits,
            Arc::new(AtomicU32::new(1)),
        )
    }

    /// Reads a whole message from `reader` and creates its root section.
    pub fn read_from(
        mut reader: impl Read,
        limits: Limits,
    ) -> Result<Self, Error> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::parse_with_limits(data, limits))
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        identifier: Vec<usize>,
        literal: Arc<[u8]>,
        start: usize,
        end: usize,
        depth: u32,
        default_content_type: ContentType,
        limits: Limits,
        part_count: Arc<AtomicU32>,
    ) -> Self {
        let (header, _) = split(&literal[start..end]);
        let body_start = start + header.len();
        Section {
            identifier,
            literal,
            header_start: start,
            body_start,
            end,
            depth,
            default_content_type,
            limits,
            part_count,
            header: OnceLock::new(),
            children: OnceLock::new(),
        }
    }

    /// Creates a section sharing this one's buffer and bookkeeping, or
    /// returns `None` if the part limit has been reached.
    fn child(
        &self,
        identifier: Vec<usize>,
        range: Range<usize>,
        default_content_type: ContentType,
    ) -> Option<Section> {
        let count = self.part_count.fetch_add(1, Ordering::Relaxed);
        if count >= self.limits.max_parts {
            self.part_count.fetch_sub(1, Ordering::Relaxed);
            return None;
        }

        Some(Section::new(
            identifier,
            Arc::clone(&self.literal),
            range.start,
            range.end,
            self.depth + 1,
            default_content_type,
            self.limits,
            Arc::clone(&self.part_count),
        ))
    }

    fn load(&self) -> Vec<Section> {
        let content_type = self.content_type();
        let is_message = content_type.is_type("message")
            && content_type.is_subtype("rfc822");
        let is_multipart = content_type.is_type("multipart");
        if !is_message && !is_multipart {
            return vec![];
        }

        if self.depth >= self.limits.max_depth {
            warn!(
                "Section {:?} nested too deeply, not descending further",
                self.identifier
            );
            return vec![];
        }

        if is_message {
            return match self.child(
                self.identifier.clone(),
                self.body_range(),
                ContentType::text_plain(),
            ) {
                Some(embedded) => embedded.load(),
                None => {
                    self.warn_part_limit();
                    vec![]
                },
            };
        }

        let boundary = match content_type.parm("boundary") {
            Some(boundary) => boundary,
            None => {
                debug!(
                    "Multipart section {:?} has no boundary, treating as leaf",
                    self.identifier
                );
                return vec![];
            },
        };

        let scanner = match PartScanner::new(boundary) {
            Ok(scanner) => scanner,
            Err(e) => {
                warn!(
                    "Section {:?} cannot be split: {}, treating as leaf",
                    self.identifier, e
                );
                return vec![];
            },
        };

        let child_default_content_type =
            if content_type.is_subtype("digest") {
                ContentType::message_rfc822()
            } else {
                ContentType::text_plain()
            };

        let mut children = Vec::new();
        for (ix, part) in scanner.scan(self.body()).into_iter().enumerate() {
            let mut identifier = self.identifier.clone();
            identifier.push(ix + 1);
            let start = self.body_start + part.offset;

            match self.child(
                identifier,
                start..start + part.data.len(),
                child_default_content_type.clone(),
            ) {
                Some(child) => children.push(child),
                None => {
                    self.warn_part_limit();
                    break;
                },
            }
        }

        children
    }

    fn warn_part_limit(&self) {
        warn!(
            "Message has more than {} parts, ignoring the rest after {:?}",
            self.limits.max_parts, self.identifier
        );
    }

    /// The IMAP part path of this section. Empty for the root.
    pub fn identifier(&self) -> &[usize] {
        &self.identifier
    }

    /// The buffer shared by every section of the tree.
    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.literal
    }

    /// The whole entity, header and body.
    pub fn literal(&self) -> &[u8] {
        &self.literal[self.header_start..self.end]
    }

    /// The header, including the blank line which ends it.
    pub fn header(&self) -> &[u8] {
        &self.literal[self.header_range()]
    }

    /// The body, still transfer-encoded.
    pub fn body(&self) -> &[u8] {
        &self.literal[self.body_range()]
    }

    /// The location of `header()` within `buffer()`.
    pub fn header_range(&self) -> Range<usize> {
        self.header_start..self.body_start
    }

    /// The location of `body()` within `buffer()`.
    pub fn body_range(&self) -> Range<usize> {
        self.body_start..self.end
    }

    /// Parses the header on first call; later calls return the same result.
    pub fn parse_header(&self) -> Result<&Header, Error> {
        self.header
            .get_or_init(|| parse_header(self.header()))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The effective content type of this section.
    ///
    /// A missing or unparsable `Content-Type`, or a header which cannot be
    /// parsed at all, yields the default for the section's context.
    pub fn content_type(&self) -> ContentType {
        let header = match self.parse_header() {
            Ok(header) => header,
            Err(e) => {
                debug!(
                    "Header of section {:?} is unparsable ({}), \
                     assuming default content type",
                    self.identifier, e
                );
                return self.default_content_type.clone();
            },
        };

        let raw = match header.get_raw("Content-Type") {
            Some(raw) => raw,
            None => return self.default_content_type.clone(),
        };

        parse_content_type(raw).unwrap_or_else(|| {
            debug!(
                "Bad Content-Type {:?} on section {:?}, using default",
                String::from_utf8_lossy(raw).trim(),
                self.identifier
            );
            self.default_content_type.clone()
        })
    }

    fn content_transfer_encoding(&self) -> ContentTransferEncoding {
        self.parse_header()
            .map(|h| {
                ContentTransferEncoding::parse(
                    &h.get("Content-Transfer-Encoding"),
                )
            })
            .unwrap_or_default()
    }

    /// The sub-sections of this section, discovered on first call.
    ///
    /// Empty for leaves.
    pub fn children(&self) -> &[Section] {
        self.children.get_or_init(|| self.load())
    }

    /// Navigates to the descendant at `path`, where each element is a 1-based
    /// child index. The empty path returns `self`.
    pub fn part(&self, path: &[usize]) -> Option<&Section> {
        match path {
            [] => Some(self),
            [0, ..] => None,
            [ix, rest @ ..] => self.children().get(ix - 1)?.part(rest),
        }
    }

    /// Calls `f` on this section and every descendant, in preorder.
    pub fn walk(&self, f: &mut impl FnMut(&Section)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// The body with its `Content-Transfer-Encoding` undone.
    pub fn decoded_body(&self) -> Vec<u8> {
        decode_transfer(self.content_transfer_encoding(), self.body())
    }

    /// The body transfer-decoded and transcoded from its declared charset
    /// (US-ASCII if none) to UTF-8.
    pub fn decoded_text(
        &self,
        charsets: &dyn CharsetResolver,
    ) -> Result<String, Error> {
        let charset = self
            .content_type()
            .parm("charset")
            .unwrap_or("us-ascii")
            .to_owned();
        let transfer =
            transfer_decoder(self.content_transfer_encoding(), self.body());
        let mut reader = charsets.decoder(&charset, transfer)?;

        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(text)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::mime::charset::StandardCharsets;
    use crate::test_data::*;

    fn collect_identifiers(root: &Section) -> Vec<Vec<usize>> {
        let mut ret = Vec::new();
        root.walk(&mut |s| ret.push(s.identifier().to_vec()));
        ret
    }

    fn check_ranges(section: &Section) {
        let literal = section.literal();
        let header = section.header();
        assert_eq!(header, &literal[..header.len()]);
        assert_eq!(section.body(), &literal[header.len()..]);
        assert!(section.header_range().start <= section.body_range().start);
        assert!(section.body_range().start <= section.body_range().end);
    }

    #[test]
    fn split_at_blank_line() {
        assert_eq!(
            (&b"A: b\r\n\r\n"[..], &b"body\r\n\r\nmore"[..]),
            split(b"A: b\r\n\r\nbody\r\n\r\nmore")
        );
        assert_eq!(
            (&b"A: b\n\n"[..], &b"body"[..]),
            split(b"A: b\n\nbody")
        );
        assert_eq!(
            (&b"A: b\r\n\r\r\n"[..], &b"body"[..]),
            split(b"A: b\r\n\r\r\nbody")
        );
        // Without an empty line, everything is header
        assert_eq!(
            (&b"A: b\r\r\nbody"[..], &b""[..]),
            split(b"A: b\r\r\nbody")
        );
        assert_eq!((&b"A: b\r\n"[..], &b""[..]), split(b"A: b\r\n"));
        assert_eq!((&b"\r\n"[..], &b"x"[..]), split(b"\r\nx"));
        assert_eq!((&b""[..], &b""[..]), split(b""));
    }

    #[test]
    fn single_part_message() {
        crate::init_test_log();

        let root = Section::parse(
            &b"Subject: hi\r\nContent-Transfer-Encoding: base64\r\n\r\n\
               aGVsbG8=\r\n"[..],
        );
        assert!(root.identifier().is_empty());
        assert!(root.is_leaf());
        assert_eq!(b"aGVsbG8=\r\n", root.body());
        assert_eq!(b"hello", &root.decoded_body()[..]);
        assert_eq!("hi", root.parse_header().unwrap().get("subject"));
        assert_eq!(ContentType::text_plain(), root.content_type());
        check_ranges(&root);
    }

    #[test]
    fn nested_message_is_flattened() {
        crate::init_test_log();

        let root = Section::parse(NESTED_RFC822);
        assert_eq!(
            vec![vec![], vec![1], vec![2], vec![2, 1], vec![2, 2]],
            collect_identifiers(&root)
        );

        let plain = root.part(&[2, 1]).unwrap();
        assert_eq!(&[2, 1], plain.identifier());
        assert!(plain.content_type().is_subtype("plain"));
        assert_eq!(b"Lunch tomorrow?", plain.body());

        let html = root.part(&[2, 2]).unwrap();
        assert!(html.content_type().is_subtype("html"));
        assert_eq!(b"<p>Lunch tomorrow?</p>", html.body());

        assert_eq!(
            "See the forwarded message below. Café at noon?\r\n",
            root.part(&[1])
                .unwrap()
                .decoded_text(&StandardCharsets::default())
                .unwrap()
        );

        assert!(root.part(&[3]).is_none());
        assert!(root.part(&[0]).is_none());
        assert!(root.part(&[1, 1]).is_none());

        root.walk(&mut |s| {
            check_ranges(s);
            assert!(Arc::ptr_eq(root.buffer(), s.buffer()));
            assert_eq!(
                s.literal(),
                &root.buffer()[s.header_range().start..s.body_range().end]
            );
        });
    }

    #[test]
    fn children_lie_within_parent_body() {
        let root = Section::parse(NESTED_RFC822);
        fn check(parent: &Section) {
            for child in parent.children() {
                assert!(
                    child.header_range().start >= parent.body_range().start
                );
                assert!(child.body_range().end <= parent.body_range().end);
                check(child);
            }
        }
        check(&root);
    }

    #[test]
    fn digest_parts_default_to_message() {
        crate::init_test_log();

        let root = Section::parse(DIGEST);
        assert_eq!(
            vec![vec![], vec![1], vec![1, 1], vec![1, 2], vec![2]],
            collect_identifiers(&root)
        );
        assert_eq!(
            ContentType::message_rfc822(),
            root.part(&[1]).unwrap().content_type()
        );
        assert_eq!(b"Hello list.", root.part(&[1, 1]).unwrap().body());
        assert_eq!(b"Signature block.", root.part(&[1, 2]).unwrap().body());
        assert!(root.part(&[2]).unwrap().content_type().is_type("text"));
    }

    #[test]
    fn empty_path_is_self() {
        let root = Section::parse(NESTED_RFC822);
        assert_eq!(root.literal(), root.part(&[]).unwrap().literal());
        assert_eq!(NESTED_RFC822, root.literal());
    }

    #[test]
    fn depth_limit() {
        crate::init_test_log();

        let root = Section::parse_with_limits(
            NESTED_RFC822,
            Limits {
                max_depth: 1,
                ..Limits::default()
            },
        );
        assert_eq!(
            vec![vec![], vec![1], vec![2]],
            collect_identifiers(&root)
        );
        assert!(root.part(&[2]).unwrap().is_leaf());
    }

    #[test]
    fn part_limit() {
        crate::init_test_log();

        let root = Section::parse_with_limits(
            NESTED_RFC822,
            Limits {
                max_parts: 3,
                ..Limits::default()
            },
        );
        // The root and the two top-level parts use up the limit, so the
        // embedded message is never opened.
        assert_eq!(
            vec![vec![], vec![1], vec![2]],
            collect_identifiers(&root)
        );
    }

    #[test]
    fn unusable_boundaries_make_leaves() {
        crate::init_test_log();

        let root = Section::parse(
            &b"Content-Type: multipart/mixed\r\n\r\n\
               --x\r\n\r\na\r\n--x--\r\n"[..],
        );
        assert!(root.is_leaf());

        let root = Section::parse(
            &b"Content-Type: multipart/mixed; boundary=\"\"\r\n\r\n\
               --\r\n\r\na\r\n----\r\n"[..],
        );
        assert!(root.is_leaf());
    }

    #[test]
    fn nonconforming_boundaries_still_split() {
        crate::init_test_log();

        let long = "b".repeat(71);
        for boundary in [&long[..], "#b!"] {
            let message = format!(
                "Content-Type: multipart/mixed; boundary=\"{0}\"\r\n\r\n\
                 --{0}\r\n\r\none\r\n\
                 --{0}\r\n\r\ntwo\r\n\
                 --{0}--\r\n",
                boundary
            );
            let root = Section::parse(message.as_bytes());
            assert_eq!(2, root.children().len(), "boundary {:?}", boundary);
            assert_eq!(b"one", root.part(&[1]).unwrap().body());
            assert_eq!(b"two", root.part(&[2]).unwrap().body());
        }
    }

    #[test]
    fn broken_headers_are_tolerated() {
        crate::init_test_log();

        let root = Section::parse(
            &b"Content-Type: multipart/mixed; boundary=b\r\n\r\n\
               --b\r\n\
               no header here\r\n\
               --b\r\n\
               Content-Type: text/html\r\n\
               \r\n\
               <p>x</p>\r\n\
               --b--\r\n"[..],
        );
        assert_eq!(2, root.children().len());

        let first = root.part(&[1]).unwrap();
        assert_matches!(Err(Error::KeyNotFound { .. }), first.parse_header());
        assert_eq!(ContentType::text_plain(), first.content_type());
        assert!(root.part(&[2]).unwrap().content_type().is_subtype("html"));
    }

    #[test]
    fn read_from_reader() {
        let root =
            Section::read_from(NESTED_RFC822, Limits::default()).unwrap();
        assert_eq!(2, root.children().len());
    }

    proptest! {
        #[test]
        fn split_preserves_length(data in ".{0,100}") {
            let (header, body) = split(data.as_bytes());
            prop_assert_eq!(data.len(), header.len() + body.len());
            prop_assert_eq!(header, &data.as_bytes()[..header.len()]);
        }

        #[test]
        fn arbitrary_multiparts_are_consistent(
            parts in prop::collection::vec("[a-z:\r\n -]{0,30}", 0..5),
        ) {
            let mut message =
                b"Content-Type: multipart/mixed; boundary=zz\r\n\r\n".to_vec();
            for part in &parts {
                message.extend_from_slice(b"--zz\r\n");
                message.extend_from_slice(part.as_bytes());
                message.extend_from_slice(b"\r\n");
            }
            message.extend_from_slice(b"--zz--\r\n");

            let root = Section::parse(message);
            root.walk(&mut |s| check_ranges(s));
        }
    }
}
