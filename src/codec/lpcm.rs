// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The native LPCM decoder (C6): endianness, float-vs-integer, bit-depth
//! packing, and channel permutation.

use crate::channels::ChannelLayout;
use crate::codec::{PcmChunk, PcmSamples};
use crate::error::{malformed_error, unsupported_error, Result};
use crate::model::{AudioFormat, FormatFlags};

/// `ceil(bits_per_channel / 8)`, the number of bytes the container occupies.
fn container_bytes(bits_per_channel: u32) -> Result<usize> {
    match bits_per_channel {
        1..=64 => Ok(((bits_per_channel + 7) / 8) as usize),
        _ => unsupported_error("LPCM bits-per-channel out of range"),
    }
}

fn read_container(bytes: &[u8], little_endian: bool) -> u64 {
    let mut v: u64 = 0;
    if little_endian {
        for &b in bytes.iter().rev() {
            v = (v << 8) | u64::from(b);
        }
    } else {
        for &b in bytes {
            v = (v << 8) | u64::from(b);
        }
    }
    v
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// The decoder for natively-understood LPCM packets: all integer bit-depths,
/// both endiannesses, IEEE float, and channel reordering per the resolved
/// [`ChannelLayout`].
pub struct LpcmDecoder {
    format: AudioFormat,
    channel_map: Vec<u8>,
    frame_bytes: usize,
}

impl LpcmDecoder {
    pub fn try_new(format: AudioFormat, layout: ChannelLayout) -> Result<Self> {
        if format.channels_per_frame == 0 {
            return malformed_error("LPCM format declares zero channels");
        }
        let per_sample = container_bytes(format.bits_per_channel)?;
        let frame_bytes = per_sample * format.channels_per_frame as usize;
        if layout.channel_map.len() != format.channels_per_frame as usize {
            return malformed_error("channel map length does not match channel count");
        }
        Ok(LpcmDecoder { format, channel_map: layout.channel_map, frame_bytes })
    }

    fn is_identity_map(&self) -> bool {
        self.channel_map.iter().enumerate().all(|(i, &m)| m as usize == i)
    }

    pub fn decode(&mut self, packet: &[u8]) -> Result<PcmChunk> {
        if self.frame_bytes == 0 || packet.len() % self.frame_bytes != 0 {
            return malformed_error("LPCM packet length is not a multiple of the frame size");
        }
        let frames = packet.len() / self.frame_bytes;
        let channels = self.format.channels_per_frame as usize;
        let little_endian = self.format.flags.contains(FormatFlags::LITTLE_ENDIAN);

        let samples = if self.format.flags.contains(FormatFlags::FLOAT) {
            PcmSamples::Float(self.decode_float(packet, frames, channels, little_endian)?)
        } else {
            PcmSamples::Integer(self.decode_integer(packet, frames, channels, little_endian)?)
        };

        Ok(PcmChunk { channels: self.format.channels_per_frame, frames, samples })
    }

    fn decode_float(
        &self,
        packet: &[u8],
        frames: usize,
        channels: usize,
        little_endian: bool,
    ) -> Result<Vec<f64>> {
        let per_sample = container_bytes(self.format.bits_per_channel)?;
        let mut out = vec![0.0f64; frames * channels];
        for frame in 0..frames {
            for ch in 0..channels {
                let offset = frame * self.frame_bytes + ch * per_sample;
                let raw = &packet[offset..offset + per_sample];
                let value = match self.format.bits_per_channel {
                    32 => {
                        let bits = read_container(raw, little_endian) as u32;
                        f32::from_bits(bits) as f64
                    }
                    64 => {
                        let bits = read_container(raw, little_endian);
                        f64::from_bits(bits)
                    }
                    _ => return unsupported_error("float LPCM must be 32 or 64 bits per channel"),
                };
                out[self.dest_index(frame, ch, channels)] = value;
            }
        }
        Ok(out)
    }

    fn decode_integer(
        &self,
        packet: &[u8],
        frames: usize,
        channels: usize,
        little_endian: bool,
    ) -> Result<Vec<i32>> {
        let per_sample = container_bytes(self.format.bits_per_channel)?;
        let signed = self.format.flags.contains(FormatFlags::SIGNED_INTEGER);
        let aligned_high = self.format.flags.contains(FormatFlags::ALIGNED_HIGH);
        let container_bits = per_sample as u32 * 8;
        let shift = if aligned_high && container_bits > self.format.bits_per_channel {
            container_bits - self.format.bits_per_channel
        } else {
            0
        };

        let mut out = vec![0i32; frames * channels];
        for frame in 0..frames {
            for ch in 0..channels {
                let offset = frame * self.frame_bytes + ch * per_sample;
                let raw = read_container(&packet[offset..offset + per_sample], little_endian);
                let normalized = raw >> shift;
                let value = if signed {
                    sign_extend(normalized, self.format.bits_per_channel) as i32
                } else if self.format.bits_per_channel == 8 {
                    // Unsigned 8-bit PCM is conventionally centered at 128.
                    i32::from(normalized as u8) - 128
                } else {
                    return unsupported_error("unsigned integer LPCM is only supported at 8 bits per channel");
                };
                out[self.dest_index(frame, ch, channels)] = value;
            }
        }
        Ok(out)
    }

    /// Maps the channel read at source position `ch` to its destination slot
    /// in the output frame, per `dst[i] = src[channel_map[i]]`.
    fn dest_index(&self, frame: usize, ch: usize, channels: usize) -> usize {
        if self.is_identity_map() {
            return frame * channels + ch;
        }
        // channel_map[dst] = src; find dst such that channel_map[dst] == ch.
        let dst = self.channel_map.iter().position(|&src| src as usize == ch).unwrap_or(ch);
        frame * channels + dst
    }
}
