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

use std::fmt;

/// A single mailbox extracted from an address field.
///
/// Groups are flattened into their member mailboxes; the group name itself
/// is not retained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Address {
    /// The display name, with encoded words decoded and phrase fragments
    /// rejoined. Empty if there was none.
    pub name: String,
    /// `local-part@domain`, possibly with a `:port` suffix. Empty for the
    /// null address `<>`.
    pub address: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}>", self.address)
        } else {
            write!(
                f,
                "\"{}\" <{}>",
                self.name.replace('\\', "\\\\").replace('"', "\\\""),
                self.address
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            "<a@b>",
            Address {
                name: String::new(),
                address: "a@b".to_owned(),
            }
            .to_string()
        );
        assert_eq!(
            r#""Say \"hi\"" <a@b>"#,
            Address {
                name: "Say \"hi\"".to_owned(),
                address: "a@b".to_owned(),
            }
            .to_string()
        );
    }
}
