// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The port the façade (C8) calls for every codec this crate does not decode
//! natively: MP1/MP2/MP3, AAC LC/HE/HEv2, ALAC, FLAC, A-law/µ-law, MS-ADPCM.
//!
//! This crate never implements a decoder against this trait; a host links in
//! a concrete implementation (bound to whatever native/library decoder it
//! has available) and passes it to [`crate::codec::create_decoder`].

use crate::codec::PcmChunk;
use crate::error::Result;
use crate::io::AbortCheck;

/// Selects which decoder family `open` should hand back, mirroring the
/// owner-id families the host's packet-decoder port dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerId {
    Mpeg1Audio,
    Mpeg4Aac,
    Mpeg4Alac,
    Flac,
    ItuLaw,
    MsAdpcm,
    Matroska,
}

/// Information an external decoder can report about itself once opened;
/// mirrors the `file_info` sink the original `get_info` call filled in.
#[derive(Debug, Clone, Default)]
pub struct DecoderInfo {
    pub codec_name: Option<String>,
    pub sample_rate: Option<f64>,
    pub channels: Option<u32>,
    pub bits_per_sample: Option<u32>,
}

/// What `analyze_first_frame` discovers about an AAC bitstream: the decoded
/// sample rate/channel count (which may disagree with the container's
/// `desc`, notably under SBR/PS) and a profile string used to pick the
/// correct codec FourCC (`"LC"`, `"SBR"`, `"SBR+PS"`).
#[derive(Debug, Clone)]
pub struct AnalyzedFrameInfo {
    pub sample_rate: f64,
    pub channels: u32,
    pub profile: String,
}

/// A single opened external decoder session.
pub trait ExternalDecoder {
    fn get_info(&self) -> DecoderInfo;

    /// Packets this decoder needs to see, beyond the current one, before its
    /// output is valid (used by C12 to compute preroll on seek). 2 for MP3,
    /// 1 for MP1/MP2, 0 for the rest.
    fn max_frame_dependency(&self) -> u32;

    fn analyze_first_frame_supported(&self) -> bool {
        false
    }

    /// Inspects (without necessarily decoding) the first packet to discover
    /// format details the container's `desc` doesn't carry reliably. Only
    /// called when [`Self::analyze_first_frame_supported`] is true.
    fn analyze_first_frame(
        &mut self,
        _packet: &[u8],
        _abort: &dyn AbortCheck,
    ) -> Result<Option<AnalyzedFrameInfo>> {
        Ok(None)
    }

    fn decode(&mut self, packet: &[u8], abort: &dyn AbortCheck) -> Result<PcmChunk>;

    /// Called after a seek, before the first post-seek packet is decoded, so
    /// look-back codecs can discard any retained history.
    fn reset_after_seek(&mut self) {}
}

/// Opens sessions for the external decoder families this crate doesn't
/// implement natively. A host provides one implementation of this trait and
/// registers it with the façade.
pub trait ExternalDecoderPort {
    fn open(
        &self,
        owner: OwnerId,
        codec_private: &[u8],
        abort: &dyn AbortCheck,
    ) -> Result<Box<dyn ExternalDecoder>>;
}
