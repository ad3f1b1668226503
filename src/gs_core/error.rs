// Copyright 2024 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::error::Error;
use std::fmt;
use std::io;

/// Boundary-crossing failures shared by every crate in the workspace.
/// Internal invariant violations (a solved node with no R-zone, an
/// out-of-range bitboard position) stay as `assert!`/`debug_assert!`
/// panics per spec §7 -- this type is only for errors that can
/// legitimately arise from the outside world: malformed wire messages,
/// bad configuration, and I/O failures talking to the broker.
#[derive(Debug)]
pub enum GsError {
    /// A line received from (or destined for) the broker did not match
    /// any recognized message grammar.
    Protocol(String),
    /// A `SolverJob` wire payload was missing a field or had a field of
    /// the wrong shape.
    InvalidJob(String),
    /// A configuration value was out of its valid range or missing.
    InvalidConfig(String),
    /// The underlying transport to the broker failed.
    Io(io::Error),
}

impl fmt::Display for GsError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GsError::Protocol(msg) => write!(fmt, "protocol error: {}", msg),
            GsError::InvalidJob(msg) => write!(fmt, "invalid job: {}", msg),
            GsError::InvalidConfig(msg) => write!(fmt, "invalid configuration: {}", msg),
            GsError::Io(err) => write!(fmt, "i/o error: {}", err),
        }
    }
}

impl Error for GsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GsError {
    fn from(err: io::Error) -> Self {
        GsError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_protocol_error() {
        let err = GsError::Protocol("unrecognized line".to_string());
        assert_eq!(err.to_string(), "protocol error: unrecognized line");
    }

    #[test]
    fn wraps_io_error() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: GsError = io_err.into();

        assert!(err.source().is_some());
    }
}
