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

//! Content fingerprinting for duplicate detection.

use openssl::sha::Sha256;

use super::header::Header;
use super::section::Section;
use crate::support::error::Error;

/// Top-level fields which identify a message independently of the route it
/// took to get here.
const MESSAGE_FIELDS: &[&str] =
    &["Subject", "From", "To", "Cc", "Reply-To", "In-Reply-To"];

/// Per-leaf fields included in the hash.
const PART_FIELDS: &[&str] = &["Content-Type", "Content-Disposition"];

/// Computes a base64-encoded SHA-256 fingerprint of `message`.
///
/// The fingerprint covers the identifying top-level fields and, for every
/// leaf section in preorder, its type, disposition, and body. Bodies are
/// transfer-decoded first, so the same content sent in a different
/// `Content-Transfer-Encoding` hashes the same. CRs are then removed and
/// surrounding whitespace trimmed, which makes the result insensitive to
/// line ending conversion.
///
/// A leaf whose header cannot be parsed contributes only its body.
pub fn get_message_hash(message: &[u8]) -> Result<String, Error> {
    let root = Section::parse(message);
    let mut hasher = Sha256::new();

    hash_fields(&mut hasher, root.parse_header()?, MESSAGE_FIELDS);

    root.walk(&mut |section| {
        if !section.is_leaf() {
            return;
        }

        if let Ok(header) = section.parse_header() {
            hash_fields(&mut hasher, header, PART_FIELDS);
        }

        let mut body = section.decoded_body();
        body.retain(|&b| b'\r' != b);
        hasher.update(trim_whitespace(&body));
    });

    Ok(base64::encode(&hasher.finish()))
}

fn hash_fields(hasher: &mut Sha256, header: &Header, keys: &[&str]) {
    for key in keys {
        hasher.update(&header.get_bytes(key));
    }
}

fn trim_whitespace(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(s.len());
    let end = s
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &s[start..end]
}
