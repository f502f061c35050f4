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

/// A `multipart/mixed` whose second part is a `message/rfc822` carrying its
/// own two-part `multipart/alternative`.
pub static NESTED_RFC822: &[u8] = include_bytes!("nested_rfc822.eml");

/// The same text body sent with `Content-Transfer-Encoding: 7bit` and with
/// `base64`.
pub static HASH_IDENTITY: &[u8] = include_bytes!("hash_identity.eml");
pub static HASH_BASE64: &[u8] = include_bytes!("hash_base64.eml");

/// A `multipart/digest` with one implicitly `message/rfc822` part and one
/// explicit `text/plain` part.
pub static DIGEST: &[u8] = include_bytes!("digest.eml");
