// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The in-memory model a parsed CAF file resolves to: [`AudioFormat`],
//! [`CafModel`], the packet table, and packet/gapless info.

use bitflags::bitflags;

use crate::channels::ChannelLayout;
use crate::io::FourCc;

bitflags! {
    /// Bits of `AudioFormat::flags`, mirroring `mFormatFlags` on an
    /// `AudioStreamBasicDescription`. Only the bits this crate's codecs
    /// (LPCM, and the cookie/format bookkeeping around external codecs) act
    /// on are named.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatFlags: u32 {
        const FLOAT           = 1 << 0;
        const LITTLE_ENDIAN   = 1 << 1;
        const SIGNED_INTEGER  = 1 << 2;
        const PACKED          = 1 << 3;
        const ALIGNED_HIGH    = 1 << 4;
    }
}

/// Analogue of `AudioStreamBasicDescription`: the 8 big-endian fields stored
/// in a `desc` chunk, plus the fields this crate derives from them.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFormat {
    pub sample_rate: f64,
    pub codec_id: FourCc,
    pub flags: FormatFlags,
    /// 0 means variable (the packet table carries per-packet sizes).
    pub bytes_per_packet: u32,
    /// 0 means variable (the packet table carries per-packet frame counts).
    pub frames_per_packet: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl AudioFormat {
    /// `bytes_per_packet / frames_per_packet`, or 0 if either is variable.
    pub fn bytes_per_frame(&self) -> u32 {
        if self.frames_per_packet == 0 {
            0
        } else {
            self.bytes_per_packet / self.frames_per_packet
        }
    }

    pub fn is_variable_bytes_per_packet(&self) -> bool {
        self.bytes_per_packet == 0
    }

    pub fn is_variable_frames_per_packet(&self) -> bool {
        self.frames_per_packet == 0
    }
}

/// A format override introduced by an `ldsc` (layered-descriptions) chunk:
/// an additional `desc` + layout-tag pair.
#[derive(Debug, Clone)]
pub struct LayeredFormat {
    pub format: AudioFormat,
    pub layout: ChannelLayout,
}

/// One entry of a `pakt` packet table, with its absolute byte offset into the
/// `data` chunk's payload already computed by the running sum the parser
/// keeps while reading the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketEntry {
    pub start_offset: u64,
    pub byte_size: u64,
    /// 0 when `frames_per_packet != 0` (constant, taken from `desc` instead).
    pub frames: u64,
    /// Cumulative frame count at the start of this packet; used by seek's
    /// binary search over the table.
    pub start_frame: u64,
}

/// The four 64-bit header fields of a `pakt` chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketInfo {
    pub valid_frames: i64,
    pub priming_frames: i32,
    pub remainder_frames: i32,
}

impl PacketInfo {
    /// `valid_frames != 0` is the first and highest-priority duration source.
    pub fn has_valid_frames(&self) -> bool {
        self.valid_frames != 0
    }
}

/// The fully-parsed in-memory representation of a CAF file.
///
/// Constructed by the parser and immutable thereafter, except for
/// [`CafModel::update_format`] (called by the decoder façade when AAC
/// post-analysis reveals the real sample rate/profile) and the metadata
/// rewriter's tag list, which lives separately in [`crate::metadata::TagList`].
#[derive(Debug, Clone)]
pub struct CafModel {
    pub primary_format: AudioFormat,
    pub primary_layout: ChannelLayout,
    pub layered_formats: Vec<LayeredFormat>,
    pub magic_cookie: Box<[u8]>,
    pub packet_table: Vec<PacketEntry>,
    pub packet_info: PacketInfo,
    pub data_offset: u64,
    pub data_size: u64,
    pub duration_frames: u64,
    pub nearly_cbr: bool,
}

impl CafModel {
    /// The format a decoder session should actually use: the first layered
    /// override if one is present, otherwise the primary format.
    pub fn effective_format(&self) -> &AudioFormat {
        self.layered_formats.first().map(|l| &l.format).unwrap_or(&self.primary_format)
    }

    pub fn effective_layout(&self) -> &ChannelLayout {
        self.layered_formats.first().map(|l| &l.layout).unwrap_or(&self.primary_layout)
    }

    /// Called by the decoder façade once AAC post-analysis has determined the
    /// real sample rate, channel count, and specific codec id (`aac `/`aach`/
    /// `aacp`). Pushes a layered override rather than mutating the primary
    /// format, preserving what was actually read from the container.
    pub fn update_format(&mut self, format: AudioFormat, layout: ChannelLayout) {
        self.layered_formats.insert(0, LayeredFormat { format, layout });
    }

    pub fn is_strictly_cbr(&self) -> bool {
        self.packet_table.is_empty()
    }
}
