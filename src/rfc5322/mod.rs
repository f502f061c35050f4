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

//! Parsers for the structured header fields of RFC 5322 (with the RFC 6532
//! UTF-8 extensions and RFC 2047 encoded words).

mod address;
mod date_time;
pub(crate) mod lexer;
mod model;
pub(crate) mod parser;

use chrono::prelude::*;

pub use self::model::Address;
use self::parser::Parser;
use crate::mime::charset::{CharsetResolver, StandardCharsets};
use crate::support::error::ParseError;

/// Parses `input` as a single address, which may be a group.
///
/// The whole input must be consumed; use `parse_address_list` for fields
/// which may contain more than one address.
pub fn parse_address(input: &str) -> Result<Vec<Address>, ParseError> {
    parse_address_with(input, &StandardCharsets::default())
}

pub fn parse_address_with(
    input: &str,
    charsets: &dyn CharsetResolver,
) -> Result<Vec<Address>, ParseError> {
    Parser::new(input.as_bytes(), charsets).parse_single_address()
}

/// Parses `input` as a comma- or semicolon-separated list of addresses.
///
/// Groups are flattened into their members.
pub fn parse_address_list(input: &str) -> Result<Vec<Address>, ParseError> {
    parse_address_list_with(input, &StandardCharsets::default())
}

pub fn parse_address_list_with(
    input: &str,
    charsets: &dyn CharsetResolver,
) -> Result<Vec<Address>, ParseError> {
    Parser::new(input.as_bytes(), charsets).parse_address_list()
}

/// Parses an RFC 5322 `date-time`, such as the value of a `Date` header.
pub fn parse_date_time(
    input: &str,
) -> Result<DateTime<FixedOffset>, ParseError> {
    let charsets = StandardCharsets::default();
    Parser::new(input.as_bytes(), &charsets).parse_date_time()
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use proptest::prelude::*;

    use super::*;

    fn addr(name: &str, address: &str) -> Address {
        Address {
            name: name.to_owned(),
            address: address.to_owned(),
        }
    }

    fn list(input: &str) -> Vec<Address> {
        match parse_address_list(input) {
            Ok(list) => list,
            Err(e) => panic!("Failed to parse {:?}: {}", input, e),
        }
    }

    #[test]
    fn angle_addr_with_port() {
        assert_eq!(
            vec![addr("First Last", "user@domain.com:25")],
            parse_address("First Last <user@domain.com:25>").unwrap()
        );
        // Outside angle brackets, a port is not an address
        assert!(parse_address("user@domain.com:25").is_err());
    }

    #[test]
    fn list_with_group_and_trailing_address() {
        let addresses = list("foo@bar, g:bar@bar; z@z");
        assert_eq!(
            vec!["foo@bar", "bar@bar", "z@z"],
            addresses
                .iter()
                .map(|a| &a.address[..])
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn encoded_words_join_without_space() {
        assert_eq!(
            vec![addr("First MiddleLast", "u@d.com")],
            list("First =?utf-8?Q?Middle?==?utf-8?Q?Last?= <u@d.com>")
        );
        assert_eq!(
            vec![addr("Keld Jørn Simonsen", "keld@dkuug.dk")],
            list("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?= <keld@dkuug.dk>")
        );
        assert_eq!(
            vec![addr("André Pirard", "PIRARD@vm1.ulg.ac.be")],
            list("=?ISO-8859-1?Q?Andr=E9?= Pirard <PIRARD@vm1.ulg.ac.be>")
        );
    }

    #[test]
    fn undecodable_encoded_word_is_error() {
        let err =
            parse_address_list("Foo =?x-no-such-charset?q?bar?= <a@b>")
                .unwrap_err();
        assert_eq!(4, err.offset);
        assert!(err.message.starts_with("Failed to decode encoded word"));
    }

    #[test]
    fn encoded_word_in_quotes() {
        assert_eq!(
            vec![addr("Café", "a@b")],
            list("\"=?utf-8?B?Q2Fmw6k=?=\" <a@b>")
        );
        // Garbage in quotes is just text
        assert_eq!(
            vec![addr("=?bogus", "a@b")],
            list("\"=?bogus\" <a@b>")
        );
    }

    #[test]
    fn domain_literal_regression() {
        let start = Instant::now();
        let err = parse_address("00@[000000000000000").unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(3, err.offset);
        assert!(parse_address_list("00@[000000000000000").is_err());

        assert_eq!(
            vec![addr("", "jdoe@[192.168.0.1]")],
            list("jdoe@[192.168.0.1]")
        );
    }

    #[test]
    fn null_address() {
        assert_eq!(vec![addr("", "")], list("<>"));
        assert_eq!(
            vec![addr("Mailer Daemon", "")],
            list("Mailer Daemon <>")
        );
    }

    #[test]
    fn groups() {
        assert_eq!(
            vec![addr("", "a@b"), addr("Cee", "c@d")],
            list("Friends: a@b, Cee <c@d>;")
        );
        // Empty group
        assert!(list("undisclosed-recipients:;").is_empty());
        // Missing terminator
        assert_eq!(vec![addr("", "a@b")], list("g: a@b"));
        // Quoted group
        assert_eq!(vec![addr("", "a@b")], list("\"g: a@b;\""));
        // Quoted-string display names
        assert_eq!(
            vec![addr("", "a@b"), addr("", "c@d")],
            list("\"Friends\": a@b, c@d;")
        );
        assert!(parse_address("\"Undisclosed recipients\":;")
            .unwrap()
            .is_empty());
        assert_eq!(
            vec![addr("", "a@b"), addr("", "z@z")],
            list("\"Team \\\"A\\\"\" : a@b; z@z")
        );
        // obs-mbox-list with empty elements
        assert_eq!(
            vec![addr("", "a@b"), addr("", "c@d")],
            list("g: a@b, , c@d;")
        );
        // A group may be directly followed by another address
        assert_eq!(
            vec![addr("", "a@b"), addr("", "c@d")],
            list("g:<a@b>;<c@d>")
        );
        assert_eq!(
            vec![addr("", "a@b"), addr("", "c@d")],
            list("g:<a@b>; <c@d>")
        );
    }

    #[test]
    fn separators() {
        assert_eq!(
            vec![addr("", "a@b"), addr("", "c@d")],
            list(" , ;a@b;; c@d,")
        );
        let err = parse_address_list("a@b c@d").unwrap_err();
        assert!(err.message.contains("Expected ','"), "{}", err);
        assert!(parse_address_list("").is_err());
        assert!(parse_address_list(" , ").is_err());
    }

    #[test]
    fn comments_and_folding() {
        assert_eq!(
            vec![addr("Pete", "pete@silly.example")],
            list(
                "Pete(A nice \\) chap) <pete(his account)@silly.example(his \
                 host)>"
            )
        );
        assert_eq!(
            vec![addr("John Doe", "jdoe@machine.example")],
            list("John\r\n Doe <jdoe@machine.example>")
        );
        assert_eq!(
            vec![addr("", "a@b")],
            list("(nested (comment) here) a@b (trailing)")
        );
        assert_eq!(4, parse_address_list("a@b (open").unwrap_err().offset);
    }

    #[test]
    fn obsolete_route_is_dropped() {
        assert_eq!(
            vec![addr("Joe", "joe@example.com")],
            list("Joe <@relay1.example,@relay2.example:joe@example.com>")
        );
    }

    #[test]
    fn relaxed_display_names() {
        assert_eq!(
            vec![addr("J.R.Smith", "jr@example.com")],
            list("J.R. Smith <jr@example.com>")
        );
        assert_eq!(
            vec![addr("jr@example.com", "jr@example.com")],
            list("jr@example.com <jr@example.com>")
        );
        assert_eq!(
            vec![addr("Giant; \"Big\" Box", "sysservices@example.net")],
            list(r#""Giant; \"Big\" Box" <sysservices@example.net>"#)
        );
        assert_eq!(
            vec![addr("Jörg", "jörg@example.de")],
            list("Jörg <jörg@example.de>")
        );
    }

    #[test]
    fn local_part_quoting_and_trailing_dot() {
        assert_eq!(
            vec![addr("", "\"john doe\"@example.com")],
            list("\"john doe\"@example.com")
        );
        assert_eq!(
            vec![addr("", "john.doe@example.com")],
            list("\"john\".doe@example.com")
        );
        assert_eq!(
            vec![addr("", "a@example.com.")],
            list("a@example.com.")
        );
    }

    #[test]
    fn obsolete_control_characters() {
        assert_eq!(
            vec![addr("a\x01b", "x@y")],
            list("\"a\x01b\" <x@y>")
        );
        assert_eq!(
            vec![addr("", "x@[1\x02]")],
            list("x@[1\x02]")
        );
        assert!(parse_address_list("a\x01b@c").is_err());
    }

    #[test]
    fn single_address_rejects_trailing_data() {
        assert!(parse_address("a@b, c@d").is_err());
        assert_eq!(
            vec![addr("", "a@b"), addr("", "c@d")],
            parse_address("g: a@b, c@d;").unwrap()
        );
    }

    proptest! {
        #[test]
        fn address_list_terminates(s in "[ -~\t\r\n]{0,64}") {
            let _ = parse_address_list(&s);
            let _ = parse_address(&s);
        }

        #[test]
        fn address_list_terminates_on_grammar_soup(
            s in "[a0@.\\[\\]<>()\",;: =?\\\\]{0,40}"
        ) {
            let _ = parse_address_list(&s);
        }
    }
}
