// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The seek/preroll driver (C12): resolves a seek target in seconds to a
//! packet index, a preroll count, and a frame-accurate `start_skip`, without
//! touching the stream itself (the caller re-enters the decode loop at the
//! packet index this returns).

use crate::io::FourCc;
use crate::model::CafModel;

/// `max_frame_dependency` the external decoder port reports for the handful
/// of look-back codecs this crate knows about; LPCM/IMA4/AAC/ALAC/FLAC need
/// no preroll of their own.
pub fn preroll_packets_for_codec(codec_id: FourCc, port_max_frame_dependency: u32) -> u32 {
    match codec_id {
        crate::codec::CODEC_MP1 | crate::codec::CODEC_MP2 => 1,
        crate::codec::CODEC_MP3 => 2,
        _ => port_max_frame_dependency,
    }
}

/// Encoder-inherent decode delay, added to `start_skip` unconditionally
/// (including at the very start of decode, seek target 0).
pub fn decoder_inherent_delay(codec_id: FourCc) -> u64 {
    match codec_id {
        crate::codec::CODEC_MP1 | crate::codec::CODEC_MP2 => 241,
        crate::codec::CODEC_MP3 => 529,
        crate::codec::CODEC_AAC_HE | crate::codec::CODEC_AAC_HE2 => 962,
        _ => 0,
    }
}

/// The resolved outcome of a seek: where to resume feeding packets, and how
/// many decoded frames at the front of that feed are scaffolding the caller
/// must discard before frames reach the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTarget {
    /// First packet index to decode (already backed off by preroll).
    pub feed_from_packet: u64,
    /// Frames to discard from the very first decoded chunk after
    /// `feed_from_packet`, before frames count toward the caller's output.
    pub start_skip: u64,
    /// The seek landed at or past the end of the stream.
    pub eof: bool,
}

/// Locates the packet whose span covers `frame` by binary search over the
/// packet table's cumulative `start_frame` column (used for the
/// variable-bytes-per-packet case; CBR streams compute the index directly).
fn packet_index_for_frame(model: &CafModel, frame: u64) -> u64 {
    // `partition_point` finds the first packet whose start_frame exceeds
    // `frame`; the packet covering `frame` is the one just before that.
    let upper = model.packet_table.partition_point(|p| p.start_frame <= frame);
    upper.saturating_sub(1) as u64
}

/// Resolves a seek to `target_seconds` into a [`SeekTarget`].
///
/// `codec_id` and `port_max_frame_dependency` (the latter only consulted for
/// codecs this crate doesn't special-case, i.e. anything the external port
/// decodes) together determine preroll; `codec_id` alone determines the
/// inherent decode delay folded into `start_skip`.
pub fn seek_to_time(
    model: &CafModel,
    target_seconds: f64,
    codec_id: FourCc,
    port_max_frame_dependency: u32,
) -> SeekTarget {
    let format = model.effective_format();
    let sample_rate = format.sample_rate;
    let frame = (target_seconds * sample_rate).round().max(0.0) as u64;

    if frame >= model.duration_frames {
        return SeekTarget { feed_from_packet: 0, start_skip: 0, eof: true };
    }

    let priming = model.packet_info.priming_frames.max(0) as u64;
    let adjusted_frame = frame + priming;

    let (ipacket, packet_start_frame) = if model.is_strictly_cbr() || format.frames_per_packet != 0 {
        let fpp = u64::from(format.frames_per_packet.max(1));
        let ipacket = adjusted_frame / fpp;
        (ipacket, ipacket * fpp)
    } else {
        let ipacket = packet_index_for_frame(model, adjusted_frame);
        let packet_start_frame = model.packet_table.get(ipacket as usize).map(|p| p.start_frame).unwrap_or(0);
        (ipacket, packet_start_frame)
    };

    let preroll = u64::from(preroll_packets_for_codec(codec_id, port_max_frame_dependency));
    let feed_from_packet = ipacket.saturating_sub(preroll);

    let start_skip =
        adjusted_frame.saturating_sub(packet_start_frame) + decoder_inherent_delay(codec_id);

    SeekTarget { feed_from_packet, start_skip, eof: false }
}

/// Whether the driver should feed one additional packet past the end of the
/// stream to pull out frames a look-back codec is still holding on to.
pub fn needs_trailing_packet(codec_id: FourCc, port_max_frame_dependency: u32, end_padding_frames: u64) -> bool {
    let delay = decoder_inherent_delay(codec_id).max(u64::from(port_max_frame_dependency));
    delay > end_padding_frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelLayout;
    use crate::model::{AudioFormat, FormatFlags, PacketEntry, PacketInfo};

    fn cbr_lpcm_model(sample_rate: f64, frames_per_packet: u32, duration_frames: u64) -> CafModel {
        CafModel {
            primary_format: AudioFormat {
                sample_rate,
                codec_id: *b"lpcm",
                flags: FormatFlags::SIGNED_INTEGER | FormatFlags::LITTLE_ENDIAN,
                bytes_per_packet: frames_per_packet * 2,
                frames_per_packet,
                channels_per_frame: 1,
                bits_per_channel: 16,
            },
            primary_layout: ChannelLayout::identity(1),
            layered_formats: Vec::new(),
            magic_cookie: Box::new([]),
            packet_table: Vec::new(),
            packet_info: PacketInfo::default(),
            data_offset: 0,
            data_size: 0,
            duration_frames,
            nearly_cbr: true,
        }
    }

    #[test]
    fn seek_past_duration_reports_eof() {
        let model = cbr_lpcm_model(44100.0, 1, 100);
        let target = seek_to_time(&model, 100.0, *b"lpcm", 0);
        assert!(target.eof);
    }

    #[test]
    fn seek_within_cbr_stream_computes_packet_and_skip() {
        // 1 frame/packet, 44100 Hz: seeking to exactly 1.0s lands on packet 44100
        // with no fractional skip (beyond codec-inherent delay, which is 0 for LPCM).
        let model = cbr_lpcm_model(44100.0, 1, 10 * 44100);
        let target = seek_to_time(&model, 1.0, *b"lpcm", 0);
        assert!(!target.eof);
        assert_eq!(target.feed_from_packet, 44100);
        assert_eq!(target.start_skip, 0);
    }

    #[test]
    fn mp3_seek_backs_off_for_preroll_and_inherent_delay() {
        let model = cbr_lpcm_model(44100.0, 1152, 10 * 44100);
        let target = seek_to_time(&model, 1.0, crate::codec::CODEC_MP3, 0);
        // ipacket = 44100 / 1152 = 38; preroll 2 packets -> feed from 36.
        assert_eq!(target.feed_from_packet, 36);
        assert_eq!(target.start_skip, 44100 - 38 * 1152 + 529);
    }

    #[test]
    fn variable_packet_table_uses_binary_search_over_start_frame() {
        let mut model = cbr_lpcm_model(44100.0, 0, 1000);
        model.primary_format.bytes_per_packet = 0;
        model.primary_format.frames_per_packet = 0;
        model.packet_table = vec![
            PacketEntry { start_offset: 0, byte_size: 10, frames: 100, start_frame: 0 },
            PacketEntry { start_offset: 10, byte_size: 10, frames: 100, start_frame: 100 },
            PacketEntry { start_offset: 20, byte_size: 10, frames: 100, start_frame: 200 },
        ];
        assert_eq!(packet_index_for_frame(&model, 150), 1);
        assert_eq!(packet_index_for_frame(&model, 0), 0);
        assert_eq!(packet_index_for_frame(&model, 250), 2);
    }

    #[test]
    fn trailing_packet_needed_when_delay_exceeds_padding() {
        assert!(needs_trailing_packet(crate::codec::CODEC_AAC_HE, 0, 0));
        assert!(!needs_trailing_packet(*b"lpcm", 0, 0));
    }
}
