// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A CAF (Core Audio Format) container reader/writer with native decoders
//! for LPCM and IMA4, and translation points (magic-cookie extraction,
//! channel-layout resolution, gapless/seek bookkeeping) for the codecs a
//! host decodes externally.
//!
//! Read path: [`io::Stream`] → [`parser::parse`] → [`model::CafModel`] →
//! [`codec::create_decoder`] → [`codec::Decoder::decode`] → PCM.
//!
//! Write path (tags only): [`metadata::TagList`] →
//! [`rewriter::rewrite_info_chunk`] → [`io::Stream`].
//!
//! This crate does not read or write audio files itself; it consumes an
//! [`io::Stream`] a host implements over its own file handle, and (for
//! codecs without a native decoder here) an [`codec::ExternalDecoderPort`] a
//! host implements over its own decoder bindings.

pub mod channels;
pub mod codec;
pub mod cookie;
pub mod error;
pub mod io;
pub mod metadata;
pub mod model;
pub mod parser;
pub mod rewriter;
pub mod seek;

pub use error::{Error, Result};
pub use metadata::TagList;
pub use model::CafModel;
pub use parser::parse;
pub use rewriter::rewrite_info_chunk;
