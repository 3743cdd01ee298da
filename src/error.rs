// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types returned by every fallible operation in the crate.

use std::fmt;

/// A specialized `Result` type for CAF container and codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by the parser, decoders, and metadata rewriter.
///
/// This is a flat enum rather than a hierarchy: every fallible operation in the crate
/// returns one of these variants directly, with a `&'static str` carrying whatever
/// context is useful. There is no `source()` chain beyond `Error::Io`.
#[derive(Debug)]
pub enum Error {
    /// An I/O error was returned by the underlying stream.
    Io(std::io::Error),
    /// The container's chunk structure itself is invalid: bad magic, a missing
    /// required chunk, an overflowing size field, a channel-count mismatch.
    Malformed(&'static str),
    /// The container is well-formed but describes something this crate does not
    /// implement: an unrecognized layout tag, a codec with no native decoder and
    /// no port configured, variable-frame packets with no packet-info chunk.
    Unsupported(&'static str),
    /// A codec FourCC was encountered that neither C6/C7 nor a configured
    /// external decoder port understands.
    UnsupportedCodec(&'static str),
    /// The magic-cookie extractor reached the end of an ES descriptor tree
    /// without finding the `DecoderSpecificInfo` (tag 5) record.
    CookieParse(&'static str),
    /// A cooperative cancellation token reported that the caller asked to stop.
    Aborted,
    /// A write was attempted against a stream or chunk that is not writable.
    NotWritable(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Malformed(msg) => write!(f, "malformed CAF container: {}", msg),
            Error::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            Error::UnsupportedCodec(msg) => write!(f, "unsupported codec: {}", msg),
            Error::CookieParse(msg) => write!(f, "magic cookie parse error: {}", msg),
            Error::Aborted => write!(f, "operation aborted"),
            Error::NotWritable(msg) => write!(f, "not writable: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Convenience constructor for a [`Error::Malformed`] wrapped in `Err`.
pub fn malformed_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::Malformed(msg))
}

/// Convenience constructor for a [`Error::Unsupported`] wrapped in `Err`.
pub fn unsupported_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::Unsupported(msg))
}

/// Convenience constructor for a [`Error::UnsupportedCodec`] wrapped in `Err`.
pub fn unsupported_codec_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::UnsupportedCodec(msg))
}

/// Convenience constructor for a [`Error::CookieParse`] wrapped in `Err`.
pub fn cookie_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::CookieParse(msg))
}

/// Convenience constructor for a [`Error::NotWritable`] wrapped in `Err`.
pub fn not_writable_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::NotWritable(msg))
}

/// Convenience constructor for [`Error::Aborted`] wrapped in `Err`.
pub fn aborted_error<T>() -> Result<T> {
    Err(Error::Aborted)
}
