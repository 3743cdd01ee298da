// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The CAF chunk parser (C4): magic/version check, the chunk walker, and
//! per-chunk handlers for `desc / chan / ldsc / kuki / info / pakt / data /
//! free`, finishing with duration derivation.

use crate::channels::ChannelLayout;
use crate::error::{malformed_error, unsupported_error, Result};
use crate::io::{
    self, read_variable_length_integer, SeekFrom, Stream, CHUNK_CHAN, CHUNK_DATA, CHUNK_DESC,
    CHUNK_FREE, CHUNK_INFO, CHUNK_KUKI, CHUNK_LDSC, CHUNK_PAKT,
};
use crate::metadata::TagList;
use crate::model::{AudioFormat, CafModel, FormatFlags, LayeredFormat, PacketEntry, PacketInfo};

const MAX_INFO_CHUNK_SIZE: u64 = 64 * 1024 * 1024;
const MIN_INFO_CHUNK_SIZE: u64 = 5;
const DESC_CHUNK_SIZE: u64 = 32;

/// How a `chan` or `ldsc` entry's layout was expressed, kept around
/// unresolved until the channel count needed to validate it is known.
enum ChanSource {
    Bitmap(u32),
    Tag(u32),
    Descriptions(Vec<u8>),
}

fn resolve_chan_source(source: &ChanSource, channels: u32) -> Result<ChannelLayout> {
    match source {
        ChanSource::Bitmap(bitmap) => ChannelLayout::from_bitmap(*bitmap, channels),
        ChanSource::Tag(tag) => ChannelLayout::from_tag(*tag, channels),
        ChanSource::Descriptions(labels) => {
            if labels.len() as u32 != channels {
                return malformed_error("channel description count does not match desc channel count");
            }
            let normalized = crate::channels::normalize_simple_labels(labels);
            let folded = crate::channels::fold_rear_surround(&normalized);
            if folded.iter().any(|&l| l > 18 && l != 33 && l != 34) {
                return malformed_error("channel label exceeds TopBackLeft after folding");
            }
            ChannelLayout::from_labels(&folded)
        }
    }
}

fn read_desc<S: Stream + ?Sized>(stream: &mut S) -> Result<AudioFormat> {
    let sample_rate = stream.read_be_f64()?;
    let codec_id = stream.read_fourcc()?;
    let flags = FormatFlags::from_bits_retain(stream.read_be_u32()?);
    let bytes_per_packet = stream.read_be_u32()?;
    let frames_per_packet = stream.read_be_u32()?;
    let channels_per_frame = stream.read_be_u32()?;
    let bits_per_channel = stream.read_be_u32()?;
    Ok(AudioFormat {
        sample_rate,
        codec_id,
        flags,
        bytes_per_packet,
        frames_per_packet,
        channels_per_frame,
        bits_per_channel,
    })
}

/// Reads a `chan` chunk's body: `layout_tag, bitmap, description_count`, then
/// either `description_count` 20-byte descriptions or nothing.
fn read_chan<S: Stream + ?Sized>(stream: &mut S) -> Result<ChanSource> {
    let layout_tag = stream.read_be_u32()?;
    let bitmap = stream.read_be_u32()?;
    let description_count = stream.read_be_u32()?;

    if layout_tag == crate::channels::LAYOUT_TAG_USE_CHANNEL_BITMAP {
        return Ok(ChanSource::Bitmap(bitmap));
    }
    if layout_tag == crate::channels::LAYOUT_TAG_USE_CHANNEL_DESCRIPTIONS {
        let mut labels = Vec::with_capacity(description_count as usize);
        for _ in 0..description_count {
            let label = stream.read_be_u32()?;
            stream.ignore_bytes(16)?; // channel flags (4) + coordinates (12)
            if label == 0 || label > 34 {
                return malformed_error("channel description label out of range");
            }
            labels.push(label as u8);
        }
        return Ok(ChanSource::Descriptions(labels));
    }
    // Any other tag: resolve by table lookup; trailing descriptions (if any
    // are present alongside a predefined tag) are skipped by the chunk
    // walker's uniform seek-to-next-chunk, not read here.
    Ok(ChanSource::Tag(layout_tag))
}

fn read_ldsc<S: Stream + ?Sized>(stream: &mut S, chunk_size: u64) -> Result<Vec<(AudioFormat, ChanSource)>> {
    let mut entries = Vec::new();
    let mut remaining = chunk_size;
    while remaining >= DESC_CHUNK_SIZE + 4 {
        let format = read_desc(stream)?;
        let layout_tag = stream.read_be_u32()?;
        entries.push((format, ChanSource::Tag(layout_tag)));
        remaining -= DESC_CHUNK_SIZE + 4;
    }
    Ok(entries)
}

fn read_pakt<S: Stream + ?Sized>(
    stream: &mut S,
    format: &AudioFormat,
) -> Result<(Vec<PacketEntry>, PacketInfo, bool)> {
    let packet_count = stream.read_be_u64()?;
    let packet_info = PacketInfo {
        valid_frames: stream.read_be_i64()?,
        priming_frames: stream.read_be_u32()? as i32,
        remainder_frames: stream.read_be_u32()? as i32,
    };

    let mut packets = Vec::with_capacity(packet_count as usize);
    let mut offset = 0u64;
    let mut start_frame = 0u64;
    let mut min_size = u64::MAX;
    let mut max_size = 0u64;

    for _ in 0..packet_count {
        let byte_size = if format.is_variable_bytes_per_packet() {
            read_variable_length_integer(stream)?
        } else {
            u64::from(format.bytes_per_packet)
        };
        let frames = if format.is_variable_frames_per_packet() {
            read_variable_length_integer(stream)?
        } else {
            u64::from(format.frames_per_packet)
        };

        min_size = min_size.min(byte_size);
        max_size = max_size.max(byte_size);

        packets.push(PacketEntry { start_offset: offset, byte_size, frames, start_frame });
        offset += byte_size;
        start_frame += frames;
    }

    let nearly_cbr = packet_count == 0 || max_size <= min_size + 1;
    Ok((packets, packet_info, nearly_cbr))
}

fn compute_duration(model: &CafModel) -> Result<u64> {
    let time_scale = if model.layered_formats.is_empty() {
        1.0
    } else {
        model.effective_format().sample_rate / model.primary_format.sample_rate
    };

    if model.packet_info.has_valid_frames() {
        return Ok((model.packet_info.valid_frames as f64 * time_scale).round() as u64);
    }
    if model.packet_table.is_empty() {
        let bpp = model.primary_format.bytes_per_packet;
        let fpp = model.primary_format.frames_per_packet;
        if bpp == 0 {
            return malformed_error("CBR format (empty packet table) declares zero bytes-per-packet");
        }
        return Ok((model.data_size / u64::from(bpp)) * u64::from(fpp));
    }
    if model.primary_format.frames_per_packet != 0 {
        return Ok(model.packet_table.len() as u64 * u64::from(model.primary_format.frames_per_packet));
    }
    unsupported_error("variable frames per packet with no packet-info chunk; cannot derive duration")
}

/// Parses a full CAF stream into a [`CafModel`]. The stream's current
/// position is treated as the start of the file (byte 0, where the `caff`
/// magic lives).
pub fn parse<S: Stream + ?Sized>(stream: &mut S) -> Result<(CafModel, TagList)> {
    let magic = stream.read_fourcc()?;
    if magic != io::CAF_MAGIC {
        return malformed_error("file does not start with the 'caff' magic");
    }
    let version = stream.read_be_u16()?;
    let _flags = stream.read_be_u16()?;
    if version != 1 {
        return malformed_error("unsupported CAF version (expected 1)");
    }

    let file_size = stream.size()?;

    let mut primary_format: Option<AudioFormat> = None;
    let mut primary_chan: Option<ChanSource> = None;
    let mut layered: Vec<(AudioFormat, ChanSource)> = Vec::new();
    let mut magic_cookie: Box<[u8]> = Box::new([]);
    let mut tags = TagList::new();
    let mut packet_table: Vec<PacketEntry> = Vec::new();
    let mut packet_info = PacketInfo::default();
    let mut nearly_cbr = true;
    let mut data_offset: Option<u64> = None;
    let mut data_size: u64 = 0;

    loop {
        let chunk_start = stream.position()?;
        if chunk_start >= file_size {
            break;
        }
        let fourcc = stream.read_fourcc()?;
        let size = stream.read_be_i64()?;
        if size < 0 && fourcc != CHUNK_DATA {
            return malformed_error("negative chunk size is only legal for the 'data' chunk");
        }
        let payload_start = chunk_start + 12;

        match fourcc {
            CHUNK_DESC => primary_format = Some(read_desc(stream)?),
            CHUNK_CHAN => primary_chan = Some(read_chan(stream)?),
            CHUNK_LDSC => layered.extend(read_ldsc(stream, size as u64)?),
            CHUNK_KUKI => magic_cookie = stream.read_boxed_slice(size as usize)?,
            CHUNK_INFO => {
                if size >= MIN_INFO_CHUNK_SIZE as i64 && (size as u64) <= MAX_INFO_CHUNK_SIZE {
                    tags = TagList::parse_info_chunk(stream, size as u64)?;
                } else {
                    log::warn!("skipping info chunk with unusual size {}", size);
                }
            }
            CHUNK_PAKT => {
                let format = match &primary_format {
                    Some(format) => format,
                    None => return malformed_error("'pakt' chunk encountered before 'desc'"),
                };
                let (packets, info, cbr) = read_pakt(stream, format)?;
                packet_table = packets;
                packet_info = info;
                nearly_cbr = cbr;
            }
            CHUNK_DATA => {
                data_offset = Some(payload_start + 4);
                data_size = if size < 0 {
                    file_size - (payload_start + 4)
                } else {
                    (size as u64).saturating_sub(4)
                };
            }
            CHUNK_FREE => {}
            other => log::debug!("skipping unrecognized chunk {:?}", io::fourcc_to_string(other)),
        }

        // "-1" on the data chunk means "payload runs to EOF": nothing legally
        // follows, so the walker stops instead of seeking past the file end.
        if fourcc == CHUNK_DATA && size < 0 {
            break;
        }
        stream.seek(SeekFrom::Start(payload_start + size as u64))?;
    }

    let primary_format = match primary_format {
        Some(format) => format,
        None => return malformed_error("missing required 'desc' chunk"),
    };
    let data_offset = match data_offset {
        Some(offset) => offset,
        None => return malformed_error("missing required 'data' chunk"),
    };

    let primary_layout = match &primary_chan {
        Some(source) => resolve_chan_source(source, primary_format.channels_per_frame)?,
        None => ChannelLayout::identity(primary_format.channels_per_frame),
    };

    let layered_formats = layered
        .into_iter()
        .map(|(format, source)| {
            let channels = format.channels_per_frame;
            resolve_chan_source(&source, channels).map(|layout| LayeredFormat { format, layout })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut model = CafModel {
        primary_format,
        primary_layout,
        layered_formats,
        magic_cookie,
        packet_table,
        packet_info,
        data_offset,
        data_size,
        duration_frames: 0,
        nearly_cbr,
    };
    model.duration_frames = compute_duration(&model)?;

    Ok((model, tags))
}
