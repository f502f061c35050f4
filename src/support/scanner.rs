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

//! A random-access cursor over an in-memory byte slice.
//!
//! The cursor is a single offset, so checkpoints are free to take and can be
//! nested arbitrarily: restoring one simply moves the offset back.

/// A saved position of a `Scanner`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScannerState(usize);

#[derive(Clone, Copy, Debug)]
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    /// The offset of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Reads a single byte, or `None` at the end of input.
    pub fn read_one(&mut self) -> Option<u8> {
        let b = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    /// Reads up to and including the next occurrence of `delim`.
    ///
    /// If `delim` does not occur, everything up to the end of input is
    /// returned. An empty slice is only returned at the end of input.
    pub fn read_until(&mut self, delim: u8) -> &'a [u8] {
        let rest = &self.input[self.pos.min(self.input.len())..];
        let len = memchr::memchr(delim, rest).map_or(rest.len(), |ix| ix + 1);
        self.pos += len;
        &rest[..len]
    }

    pub fn save(&self) -> ScannerState {
        ScannerState(self.pos)
    }

    pub fn restore(&mut self, state: ScannerState) {
        self.pos = state.0;
    }
}
