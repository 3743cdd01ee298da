// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The packet-decoder façade (C8): dispatches a codec FourCC to the native
//! LPCM/IMA4 decoders or to an external decoder port, and applies AAC
//! post-analysis format correction.

pub mod external;
pub mod ima4;
pub mod lpcm;

use crate::channels::ChannelLayout;
use crate::error::{unsupported_codec_error, Result};
use crate::io::{AbortCheck, FourCc};
use crate::model::AudioFormat;

pub use external::{AnalyzedFrameInfo, DecoderInfo, ExternalDecoder, ExternalDecoderPort, OwnerId};
pub use ima4::Ima4Decoder;
pub use lpcm::LpcmDecoder;

pub const CODEC_LPCM: FourCc = *b"lpcm";
pub const CODEC_IMA4: FourCc = *b"ima4";
pub const CODEC_AAC_LC: FourCc = *b"aac ";
pub const CODEC_AAC_HE: FourCc = *b"aach";
pub const CODEC_AAC_HE2: FourCc = *b"aacp";
pub const CODEC_ALAC: FourCc = *b"alac";
pub const CODEC_FLAC: FourCc = *b"flac";
pub const CODEC_ALAW: FourCc = *b"alaw";
pub const CODEC_ULAW: FourCc = *b"ulaw";
pub const CODEC_MS_ADPCM: FourCc = *b"ms\0\x02";
pub const CODEC_MP1: FourCc = *b".mp1";
pub const CODEC_MP2: FourCc = *b".mp2";
pub const CODEC_MP3: FourCc = *b".mp3";

/// Decoded PCM, in whatever numeric domain the source format naturally
/// produces: widened 32-bit integers for integer LPCM/IMA4, or `f64` for
/// float LPCM and externally-decoded formats that hand back floats.
#[derive(Debug, Clone, PartialEq)]
pub enum PcmSamples {
    Integer(Vec<i32>),
    Float(Vec<f64>),
}

/// One decoded packet: interleaved samples plus the frame/channel counts
/// needed to de-interleave them.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmChunk {
    pub channels: u32,
    pub frames: usize,
    pub samples: PcmSamples,
}

/// A tagged variant rather than a decoder class hierarchy: the façade
/// matches on this instead of invoking virtual dispatch.
pub enum Decoder {
    Lpcm(LpcmDecoder),
    Ima4(Ima4Decoder),
    External(Box<dyn ExternalDecoder>),
}

impl Decoder {
    pub fn decode(&mut self, packet: &[u8], abort: &dyn AbortCheck) -> Result<PcmChunk> {
        if abort.is_aborted() {
            return crate::error::aborted_error();
        }
        match self {
            Decoder::Lpcm(d) => d.decode(packet),
            Decoder::Ima4(d) => d.decode(packet),
            Decoder::External(d) => d.decode(packet, abort),
        }
    }

    pub fn max_frame_dependency(&self) -> u32 {
        match self {
            Decoder::Lpcm(_) | Decoder::Ima4(_) => 0,
            Decoder::External(d) => d.max_frame_dependency(),
        }
    }

    pub fn reset_after_seek(&mut self) {
        match self {
            Decoder::Lpcm(_) => {}
            Decoder::Ima4(d) => d.reset(),
            Decoder::External(d) => d.reset_after_seek(),
        }
    }
}

/// Builds the decoder for `format`'s codec id, consulting `port` for any
/// codec this crate doesn't implement natively.
pub fn create_decoder(
    format: &AudioFormat,
    layout: &ChannelLayout,
    port: Option<&dyn ExternalDecoderPort>,
    abort: &dyn AbortCheck,
) -> Result<Decoder> {
    match format.codec_id {
        CODEC_LPCM => Ok(Decoder::Lpcm(LpcmDecoder::try_new(format.clone(), layout.clone())?)),
        CODEC_IMA4 => Ok(Decoder::Ima4(Ima4Decoder::new(format.channels_per_frame)?)),
        other => {
            let owner = owner_for_codec(other)?;
            let port = match port {
                Some(port) => port,
                None => {
                    return unsupported_codec_error(
                        "codec requires an external decoder port but none was configured",
                    )
                }
            };
            let session = port.open(owner, &[], abort)?;
            Ok(Decoder::External(session))
        }
    }
}

fn owner_for_codec(codec_id: FourCc) -> Result<OwnerId> {
    match codec_id {
        CODEC_MP1 | CODEC_MP2 | CODEC_MP3 => Ok(OwnerId::Mpeg1Audio),
        CODEC_AAC_LC | CODEC_AAC_HE | CODEC_AAC_HE2 => Ok(OwnerId::Mpeg4Aac),
        CODEC_ALAC => Ok(OwnerId::Mpeg4Alac),
        CODEC_FLAC => Ok(OwnerId::Flac),
        CODEC_ALAW | CODEC_ULAW => Ok(OwnerId::ItuLaw),
        CODEC_MS_ADPCM => Ok(OwnerId::MsAdpcm),
        _ => unsupported_codec_error("codec FourCC is not handled natively or by a known external family"),
    }
}

/// Applies AAC post-analysis: after the external port's first-frame analysis
/// reports a sample rate/channel count that disagrees with the container's
/// declared `desc`, correct the codec id (LC/SBR/SBR+PS), scale
/// `frames_per_packet` to match, and return the corrected format plus a
/// layout built from the same label sequence at the new channel count.
///
/// Returns `None` when the analyzed values agree with the declared format
/// (no correction needed).
pub fn apply_aac_post_analysis(
    declared: &AudioFormat,
    declared_layout: &ChannelLayout,
    analyzed: &AnalyzedFrameInfo,
) -> Option<(AudioFormat, ChannelLayout)> {
    if (analyzed.sample_rate - declared.sample_rate).abs() < f64::EPSILON
        && analyzed.channels == declared.channels_per_frame
    {
        return None;
    }

    let codec_id = match analyzed.profile.as_str() {
        "LC" => CODEC_AAC_LC,
        "SBR" => CODEC_AAC_HE,
        "SBR+PS" => CODEC_AAC_HE2,
        _ => declared.codec_id,
    };

    let ratio = analyzed.sample_rate / declared.sample_rate;
    let frames_per_packet = ((declared.frames_per_packet as f64) * ratio).round() as u32;

    let mut corrected = declared.clone();
    corrected.codec_id = codec_id;
    corrected.sample_rate = analyzed.sample_rate;
    corrected.channels_per_frame = analyzed.channels;
    corrected.frames_per_packet = frames_per_packet;

    let layout = if analyzed.channels == declared.channels_per_frame {
        declared_layout.clone()
    } else {
        ChannelLayout::identity(analyzed.channels)
    };

    Some((corrected, layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FormatFlags;

    fn aac_format() -> AudioFormat {
        AudioFormat {
            sample_rate: 24000.0,
            codec_id: CODEC_AAC_LC,
            flags: FormatFlags::empty(),
            bytes_per_packet: 0,
            frames_per_packet: 1024,
            channels_per_frame: 2,
            bits_per_channel: 0,
        }
    }

    #[test]
    fn sbr_doubles_sample_rate_and_frames_per_packet() {
        let declared = aac_format();
        let layout = ChannelLayout::identity(2);
        let analyzed = AnalyzedFrameInfo { sample_rate: 48000.0, channels: 2, profile: "SBR".into() };
        let (corrected, _) = apply_aac_post_analysis(&declared, &layout, &analyzed).unwrap();
        assert_eq!(corrected.codec_id, CODEC_AAC_HE);
        assert_eq!(corrected.frames_per_packet, 2048);
        assert_eq!(corrected.sample_rate, 48000.0);
    }

    #[test]
    fn agreeing_analysis_needs_no_correction() {
        let declared = aac_format();
        let layout = ChannelLayout::identity(2);
        let analyzed = AnalyzedFrameInfo { sample_rate: 24000.0, channels: 2, profile: "LC".into() };
        assert!(apply_aac_post_analysis(&declared, &layout, &analyzed).is_none());
    }
}
