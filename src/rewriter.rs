// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The info-chunk rewriter (C10): updates a CAF file's tags in place without
//! ever leaving the file, mid-write, in a state a reader could mistake for a
//! complete-but-corrupt `info` chunk.
//!
//! Two write orderings are used depending on where the new chunk lands:
//!
//! - Reusing the existing `info` chunk's own slot (optionally swallowing a
//!   contiguous run of `free` chunks right after it): the slot's FourCC is
//!   flipped to `free` *first* (a single 4-byte write), so for the entire
//!   duration of the rewrite the region honestly reads as ignorable space;
//!   only once the new size and payload are fully written is the FourCC
//!   flipped back to `info`, committing the change.
//! - Appending a new chunk at EOF: the new chunk is written in full — size,
//!   then payload, then its FourCC last — at previously unused space the
//!   file's old structure doesn't yet reference. Only once that is durably
//!   in place is the *old* `info` chunk's FourCC flipped to `free`, as the
//!   final step.
//!
//! In both orderings, the single 4-byte FourCC write is the only instant at
//! which the chunk's identity changes, and an observer reading the file at
//! any other instant sees either the fully-old or the fully-new state.

use crate::error::Result;
use crate::io::{
    FourCc, SeekFrom, Stream, CHUNK_DATA, CHUNK_FREE, CHUNK_INFO,
};
use crate::metadata::TagList;

const CHUNK_HEADER_SIZE: u64 = 12;

#[derive(Debug, Clone, Copy)]
struct ChunkSpan {
    start: u64,
    /// Header plus payload.
    total_size: u64,
}

fn write_all<S: Stream + ?Sized>(stream: &mut S, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let n = stream.write(buf)?;
        if n == 0 {
            return Err(crate::error::Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "stream refused to accept any more bytes",
            )));
        }
        buf = &buf[n..];
    }
    Ok(())
}

/// Walks the top-level chunk list (the file must already have passed
/// [`crate::parser::parse`]), returning each chunk's FourCC and span.
fn scan_chunks<S: Stream + ?Sized>(stream: &mut S) -> Result<(u64, Vec<(FourCc, ChunkSpan)>)> {
    let file_size = stream.size()?;
    let mut chunks = Vec::new();
    stream.seek(SeekFrom::Start(8))?; // past the 'caff' + version + flags header.

    loop {
        let start = stream.position()?;
        if start >= file_size {
            break;
        }
        let fourcc = stream.read_fourcc()?;
        let size = stream.read_be_i64()?;
        let total_size = if size < 0 {
            file_size - start
        } else {
            CHUNK_HEADER_SIZE + size as u64
        };
        chunks.push((fourcc, ChunkSpan { start, total_size }));
        if fourcc == CHUNK_DATA && size < 0 {
            break;
        }
        stream.seek(SeekFrom::Start(start + total_size))?;
    }

    Ok((file_size, chunks))
}

/// The existing `info` chunk's span, extended by any run of `free` chunks
/// immediately (byte-contiguously) following it.
fn anchored_reusable_run(chunks: &[(FourCc, ChunkSpan)]) -> Option<(ChunkSpan, ChunkSpan)> {
    let info_index = chunks.iter().position(|(fourcc, _)| *fourcc == CHUNK_INFO)?;
    let info_span = chunks[info_index].1;

    let mut run_size = info_span.total_size;
    let mut next_expected = info_span.start + info_span.total_size;
    for (fourcc, span) in &chunks[info_index + 1..] {
        if *fourcc != CHUNK_FREE || span.start != next_expected {
            break;
        }
        run_size += span.total_size;
        next_expected += span.total_size;
    }

    Some((info_span, ChunkSpan { start: info_span.start, total_size: run_size }))
}

/// Demotes-first, promotes-last: see the module doc comment.
fn write_in_place<S: Stream + ?Sized>(stream: &mut S, start: u64, payload: &[u8]) -> Result<()> {
    stream.seek(SeekFrom::Start(start))?;
    stream.write_fourcc(CHUNK_FREE)?;

    stream.seek(SeekFrom::Start(start + 4))?;
    stream.write_be_i64(payload.len() as i64)?;

    stream.seek(SeekFrom::Start(start + CHUNK_HEADER_SIZE))?;
    write_all(stream, payload)?;

    stream.seek(SeekFrom::Start(start))?;
    stream.write_fourcc(CHUNK_INFO)?;
    Ok(())
}

fn write_free_chunk<S: Stream + ?Sized>(stream: &mut S, start: u64, payload_len: u64) -> Result<()> {
    stream.seek(SeekFrom::Start(start))?;
    stream.write_fourcc(CHUNK_FREE)?;
    stream.write_be_i64(payload_len as i64)?;
    write_all(stream, &vec![0u8; payload_len as usize])?;
    Ok(())
}

/// Append-then-demote-last: see the module doc comment.
fn append_at_eof<S: Stream + ?Sized>(
    stream: &mut S,
    file_size: u64,
    payload: &[u8],
    old_info: Option<ChunkSpan>,
) -> Result<()> {
    let new_start = file_size;
    stream.resize(new_start + CHUNK_HEADER_SIZE + payload.len() as u64)?;

    stream.seek(SeekFrom::Start(new_start + 4))?;
    stream.write_be_i64(payload.len() as i64)?;

    stream.seek(SeekFrom::Start(new_start + CHUNK_HEADER_SIZE))?;
    write_all(stream, payload)?;

    stream.seek(SeekFrom::Start(new_start))?;
    stream.write_fourcc(CHUNK_INFO)?;

    if let Some(old) = old_info {
        stream.seek(SeekFrom::Start(old.start))?;
        stream.write_fourcc(CHUNK_FREE)?;
    }
    Ok(())
}

/// Rewrites `stream`'s `info` chunk to carry `tags`, preferring to reuse the
/// existing `info` chunk's slot (plus any adjoining `free` run) and falling
/// back to appending a new chunk at EOF when that slot is too small or the
/// file has no `info` chunk at all.
pub fn rewrite_info_chunk<S: Stream + ?Sized>(stream: &mut S, tags: &TagList) -> Result<()> {
    let (file_size, chunks) = scan_chunks(stream)?;
    let payload = tags.to_info_chunk_bytes();
    let required = CHUNK_HEADER_SIZE + payload.len() as u64;

    let anchored = anchored_reusable_run(&chunks);
    let old_info = anchored.map(|(info, _)| info);

    match anchored {
        Some((_, run)) if run.total_size >= required => {
            let spare = run.total_size - required;
            if spare == 0 {
                write_in_place(stream, run.start, &payload)?;
            } else if spare < CHUNK_HEADER_SIZE {
                let mut padded = payload;
                padded.extend(std::iter::repeat(0u8).take(spare as usize));
                write_in_place(stream, run.start, &padded)?;
            } else {
                write_in_place(stream, run.start, &payload)?;
                write_free_chunk(stream, run.start + required, spare - CHUNK_HEADER_SIZE)?;
            }
        }
        _ => append_at_eof(stream, file_size, &payload, old_info)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    fn minimal_caf_with_info(info_payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"caff");
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());

        bytes.extend_from_slice(b"desc");
        bytes.extend_from_slice(&32i64.to_be_bytes());
        bytes.extend_from_slice(&44100.0f64.to_be_bytes());
        bytes.extend_from_slice(b"lpcm");
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&16u32.to_be_bytes());

        bytes.extend_from_slice(b"info");
        bytes.extend_from_slice(&(info_payload.len() as i64).to_be_bytes());
        bytes.extend_from_slice(info_payload);

        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&8i64.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);

        bytes
    }

    fn info_payload(pairs: &[(&str, &str)]) -> Vec<u8> {
        let mut tags = TagList::new();
        for (k, v) in pairs {
            tags.push(k.to_string(), v.to_string());
        }
        // TagList's own serializer already gives us a valid info payload.
        tags.to_info_chunk_bytes()
    }

    fn reparse_tags(bytes: &[u8]) -> TagList {
        let (_model, tags) = crate::parser::parse(&mut MemoryStream::new(bytes.to_vec())).unwrap();
        tags
    }

    #[test]
    fn exact_fit_rewrites_in_place_and_preserves_file_length() {
        let old_payload = info_payload(&[("title", "Old")]);
        let bytes = minimal_caf_with_info(&old_payload);
        let original_len = bytes.len();
        let mut stream = MemoryStream::new(bytes);

        let mut tags = TagList::new();
        tags.push("title", "Old"); // same length payload -> exact fit
        rewrite_info_chunk(&mut stream, &tags).unwrap();

        let out = stream.into_inner();
        assert_eq!(out.len(), original_len);
        assert_eq!(reparse_tags(&out).get("title"), Some("Old"));
    }

    #[test]
    fn shorter_payload_leaves_a_free_chunk_behind() {
        let old_payload = info_payload(&[("title", "A Much Longer Title Than The Replacement")]);
        let bytes = minimal_caf_with_info(&old_payload);
        let original_len = bytes.len();
        let mut stream = MemoryStream::new(bytes);

        let mut tags = TagList::new();
        tags.push("title", "X");
        rewrite_info_chunk(&mut stream, &tags).unwrap();

        let out = stream.into_inner();
        assert_eq!(out.len(), original_len, "in-place rewrite must not change file length");
        assert_eq!(reparse_tags(&out).get("title"), Some("X"));
    }

    #[test]
    fn larger_payload_appends_at_eof_and_demotes_old_chunk() {
        let old_payload = info_payload(&[("title", "X")]);
        let bytes = minimal_caf_with_info(&old_payload);
        let original_len = bytes.len();
        let mut stream = MemoryStream::new(bytes);

        let mut tags = TagList::new();
        tags.push("title", "A Much Longer Title Than The Original Had Room For");
        rewrite_info_chunk(&mut stream, &tags).unwrap();

        let out = stream.into_inner();
        assert!(out.len() > original_len);
        assert_eq!(
            reparse_tags(&out).get("title"),
            Some("A Much Longer Title Than The Original Had Room For")
        );
    }

    #[test]
    fn missing_info_chunk_appends_a_new_one() {
        let bytes = {
            let mut b = Vec::new();
            b.extend_from_slice(b"caff");
            b.extend_from_slice(&1u16.to_be_bytes());
            b.extend_from_slice(&0u16.to_be_bytes());
            b.extend_from_slice(b"desc");
            b.extend_from_slice(&32i64.to_be_bytes());
            b.extend_from_slice(&44100.0f64.to_be_bytes());
            b.extend_from_slice(b"lpcm");
            b.extend_from_slice(&2u32.to_be_bytes());
            b.extend_from_slice(&2u32.to_be_bytes());
            b.extend_from_slice(&1u32.to_be_bytes());
            b.extend_from_slice(&1u32.to_be_bytes());
            b.extend_from_slice(&16u32.to_be_bytes());
            b.extend_from_slice(b"data");
            b.extend_from_slice(&8i64.to_be_bytes());
            b.extend_from_slice(&0u32.to_be_bytes());
            b.extend_from_slice(&[0, 0, 0, 0]);
            b
        };
        let mut stream = MemoryStream::new(bytes);
        let mut tags = TagList::new();
        tags.push("title", "Brand New");
        rewrite_info_chunk(&mut stream, &tags).unwrap();

        let out = stream.into_inner();
        assert_eq!(reparse_tags(&out).get("title"), Some("Brand New"));
    }
}
