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
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// A grammar failure, pinned to the byte offset in the parser input where it
/// was detected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        ParseError {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Header key at offset {offset} contains non-ASCII characters")]
    NonAsciiHeaderKey { offset: usize },
    #[error("Header line at offset {offset} has no key")]
    KeyNotFound { offset: usize },
    #[error("Invalid message: {message}")]
    InvalidMessage {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },
    #[error("Unusable multipart boundary: {0}")]
    Boundary(String),
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(Arc<io::Error>),
}

impl Error {
    pub(crate) fn invalid_message(message: impl Into<String>) -> Self {
        Error::InvalidMessage {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn invalid_message_from(
        message: impl Into<String>,
        source: impl Into<Error>,
    ) -> Self {
        let source = source.into();
        Error::InvalidMessage {
            message: format!("{}: {}", message.into(), source),
            source: Some(Box::new(source)),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}
