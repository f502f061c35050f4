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

//! Checks on the originator fields of a message being accepted for storage.

use log::debug;

use super::header::{parse_header, Header};
use super::section::split;
use crate::rfc5322::{parse_address, parse_address_list, Address};
use crate::support::error::Error;

/// Validates the header of a complete message (RFC 5322 3.6).
///
/// `Date` and `From` must be present and non-empty, and `From` must be a
/// valid address list. A `From` with several mailboxes requires a `Sender`
/// naming exactly one; with a single `From` mailbox, a `Sender` is allowed
/// only if it names someone else.
pub fn validate_message_header_fields(message: &[u8]) -> Result<(), Error> {
    let header = read_header(message)?;

    require(&header, "Date")?;
    let from = parse_from(&header)?;

    if from.len() > 1 {
        let sender = require(&header, "Sender")?;
        let sender = parse_address(&sender).map_err(|e| {
            debug!("Rejecting message with unparsable Sender: {}", e);
            Error::invalid_message_from("Failed to parse Sender", e)
        })?;
        if 1 != sender.len() {
            debug!("Rejecting message with {} Sender addresses", sender.len());
            return Err(Error::invalid_message(
                "Sender must be a single address if From has several",
            ));
        }
    } else if header.has("Sender") {
        let sender = parse_address(&header.get("Sender")).map_err(|e| {
            debug!("Rejecting message with unparsable Sender: {}", e);
            Error::invalid_message_from("Failed to parse Sender", e)
        })?;
        // An empty From group has nothing to compare against
        if let ([sender], [from]) = (sender.as_slice(), from.as_slice()) {
            if same_address(sender, from) {
                debug!("Rejecting message whose Sender equals From");
                return Err(Error::invalid_message(
                    "Sender should not be present if equal to From",
                ));
            }
        }
    }

    Ok(())
}

/// Validates the header of a draft, which need only have a valid `From`.
pub fn validate_message_header_fields_drafts(
    message: &[u8],
) -> Result<(), Error> {
    let header = read_header(message)?;
    parse_from(&header).map(|_| ())
}

fn read_header(message: &[u8]) -> Result<Header, Error> {
    let (header, _) = split(message);
    parse_header(header).map_err(|e| {
        debug!("Rejecting message with unparsable header: {}", e);
        Error::invalid_message_from("Failed to parse header", e)
    })
}

/// Returns the merged value of `key`, which must be present and non-empty.
fn require(header: &Header, key: &str) -> Result<String, Error> {
    let value = header.get(key);
    if value.trim().is_empty() {
        debug!("Rejecting message without {}", key);
        return Err(Error::invalid_message(format!(
            "Required header field '{}' not found or empty",
            key
        )));
    }

    Ok(value)
}

fn parse_from(header: &Header) -> Result<Vec<Address>, Error> {
    let from = require(header, "From")?;
    parse_address_list(&from).map_err(|e| {
        debug!("Rejecting message with unparsable From: {}", e);
        Error::invalid_message_from("Failed to parse From", e)
    })
}

fn same_address(a: &Address, b: &Address) -> bool {
    a.address == b.address
}
