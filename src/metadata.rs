// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The metadata codec (C9): translates the `info` chunk's free-form
//! key/value strings to and from a generic tag vocabulary, splitting and
//! rejoining the `"n/total"` convention `track number`/`disc number` use.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::Result;
use crate::io::Stream;

/// CAF info key (lowercase, space-separated) to generic tag key. The generic
/// side is lowercase throughout, matching the host vocabulary's own
/// convention (`title`, `artist`, `tracknumber`, `totaltracks`, `date`, …) —
/// a CAF key absent from this table still round-trips verbatim on read, and
/// is uppercased only when a not-otherwise-recognized generic key is written
/// back out, to stay out of Apple's reserved lowercase `info` namespace. The
/// `REPLAYGAIN_*` keys are the one exception: the host's replaygain API uses
/// them uppercase directly, so they pass through unchanged in both
/// directions.
const KEY_PAIRS: &[(&str, &str)] = &[
    ("title", "title"),
    ("subtitle", "subtitle"),
    ("artist", "artist"),
    ("album artist", "albumartist"),
    ("album", "album"),
    ("genre", "genre"),
    ("tempo", "bpm"),
    ("key signature", "initialkey"),
    ("time signature", "timesignature"),
    ("composer", "composer"),
    ("lyricist", "writer"),
    ("recorded date", "record date"),
    ("year", "date"),
    ("comments", "comment"),
    ("copyright", "copyright"),
    ("source encoder", "encoder"),
    ("encoding application", "tool"),
    ("nominal bit rate", "nominal_bitrate"),
    ("channel layout", "channellayout"),
    ("replaygain_track_gain", "REPLAYGAIN_TRACK_GAIN"),
    ("replaygain_track_peak", "REPLAYGAIN_TRACK_PEAK"),
    ("replaygain_album_gain", "REPLAYGAIN_ALBUM_GAIN"),
    ("replaygain_album_peak", "REPLAYGAIN_ALBUM_PEAK"),
];

lazy_static! {
    static ref CAF_TO_GENERIC: HashMap<&'static str, &'static str> = KEY_PAIRS.iter().copied().collect();
    static ref GENERIC_TO_CAF: HashMap<&'static str, &'static str> =
        KEY_PAIRS.iter().map(|&(caf, generic)| (generic, caf)).collect();
}

/// One resolved, generic-vocabulary tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// The set of tags carried by an `info` chunk, in the generic vocabulary.
#[derive(Debug, Clone, Default)]
pub struct TagList {
    tags: Vec<Tag>,
}

fn split_n_total(value: &str) -> (String, Option<String>) {
    match value.split_once('/') {
        Some((n, total)) => (n.trim().to_string(), Some(total.trim().to_string())),
        None => (value.trim().to_string(), None),
    }
}

fn read_cstring<S: Stream + ?Sized>(stream: &mut S) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = stream.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_cstring(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

impl TagList {
    pub fn new() -> Self {
        TagList::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.push(Tag { key: key.into(), value: value.into() });
    }

    /// `caf_key` is the raw key as it appeared in the file; matching against
    /// the recognized vocabulary is case-insensitive, but an unrecognized key
    /// is carried through to the generic tag list exactly as written, not
    /// case-folded.
    fn push_caf_pair(&mut self, caf_key: &str, value: String) {
        match caf_key.to_lowercase().as_str() {
            "track number" => {
                let (n, total) = split_n_total(&value);
                self.push("tracknumber", n);
                if let Some(total) = total {
                    self.push("totaltracks", total);
                }
            }
            "disc number" => {
                let (n, total) = split_n_total(&value);
                self.push("discnumber", n);
                if let Some(total) = total {
                    self.push("totaldiscs", total);
                }
            }
            lower => {
                let generic = CAF_TO_GENERIC.get(lower).map(|s| s.to_string()).unwrap_or_else(|| caf_key.to_string());
                self.push(generic, value);
            }
        }
    }

    /// Reads an `info` chunk body: a big-endian entry count followed by that
    /// many NUL-terminated `(key, value)` string pairs.
    pub fn parse_info_chunk<S: Stream + ?Sized>(stream: &mut S, _chunk_size: u64) -> Result<Self> {
        let count = stream.read_be_u32()?;
        let mut tags = TagList::new();
        for _ in 0..count {
            let key = read_cstring(stream)?;
            let value = read_cstring(stream)?;
            tags.push_caf_pair(&key, value);
        }
        Ok(tags)
    }

    /// Serializes this tag list back into `info`-chunk-payload bytes (the
    /// entry count plus key/value pairs), for the rewriter to embed.
    pub fn to_info_chunk_bytes(&self) -> Vec<u8> {
        let mut remaining: Vec<&Tag> = self.tags.iter().collect();
        let mut entries: Vec<(String, String)> = Vec::new();

        for (number_key, total_key, caf_key) in
            [("tracknumber", "totaltracks", "track number"), ("discnumber", "totaldiscs", "disc number")]
        {
            if let Some(pos) = remaining.iter().position(|t| t.key == number_key) {
                let number = remaining.remove(pos).value.clone();
                let total_pos = remaining.iter().position(|t| t.key == total_key);
                let value = match total_pos {
                    Some(p) => format!("{}/{}", number, remaining.remove(p).value),
                    None => number,
                };
                entries.push((caf_key.to_string(), value));
            }
        }

        for tag in remaining {
            let caf_key = GENERIC_TO_CAF.get(tag.key.as_str()).map(|s| s.to_string()).unwrap_or_else(|| tag.key.to_uppercase());
            entries.push((caf_key, tag.value.clone()));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        for (key, value) in &entries {
            write_cstring(&mut out, key);
            write_cstring(&mut out, value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    fn info_chunk_bytes(pairs: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
        for (k, v) in pairs {
            write_cstring(&mut out, k);
            write_cstring(&mut out, v);
        }
        out
    }

    #[test]
    fn translates_known_keys() {
        let bytes = info_chunk_bytes(&[("title", "Ink"), ("artist", "The Band")]);
        let mut stream = MemoryStream::new(bytes);
        let tags = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(tags.get("title"), Some("Ink"));
        assert_eq!(tags.get("artist"), Some("The Band"));
    }

    #[test]
    fn lyricist_and_encoding_application_use_distinct_host_keys() {
        let bytes = info_chunk_bytes(&[("lyricist", "Jane Doe"), ("encoding application", "Encoder 1.0")]);
        let mut stream = MemoryStream::new(bytes);
        let tags = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(tags.get("writer"), Some("Jane Doe"));
        assert_eq!(tags.get("tool"), Some("Encoder 1.0"));
    }

    #[test]
    fn recorded_date_and_year_stay_distinct() {
        let bytes = info_chunk_bytes(&[("recorded date", "2024-01-02"), ("year", "2024")]);
        let mut stream = MemoryStream::new(bytes);
        let tags = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(tags.get("record date"), Some("2024-01-02"));
        assert_eq!(tags.get("date"), Some("2024"));
    }

    #[test]
    fn splits_track_number_into_number_and_total() {
        let bytes = info_chunk_bytes(&[("track number", "3/12")]);
        let mut stream = MemoryStream::new(bytes);
        let tags = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(tags.get("tracknumber"), Some("3"));
        assert_eq!(tags.get("totaltracks"), Some("12"));
    }

    #[test]
    fn track_number_without_total_round_trips() {
        let bytes = info_chunk_bytes(&[("track number", "7")]);
        let mut stream = MemoryStream::new(bytes);
        let tags = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(tags.get("tracknumber"), Some("7"));
        assert_eq!(tags.get("totaltracks"), None);

        let serialized = tags.to_info_chunk_bytes();
        let mut stream = MemoryStream::new(serialized);
        let roundtripped = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(roundtripped.get("tracknumber"), Some("7"));
    }

    #[test]
    fn unknown_key_passes_through_verbatim() {
        let bytes = info_chunk_bytes(&[("some custom key", "value")]);
        let mut stream = MemoryStream::new(bytes);
        let tags = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(tags.get("some custom key"), Some("value"));
    }

    #[test]
    fn unknown_generic_key_is_uppercased_on_write() {
        let mut tags = TagList::new();
        tags.push("some custom key", "value");
        let bytes = tags.to_info_chunk_bytes();
        let mut stream = MemoryStream::new(bytes);
        let parsed = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(parsed.get("SOME CUSTOM KEY"), Some("value"));
    }

    #[test]
    fn serialization_rejoins_track_and_disc_numbers() {
        let mut tags = TagList::new();
        tags.push("tracknumber", "2");
        tags.push("totaltracks", "10");
        tags.push("title", "Encore");
        let bytes = tags.to_info_chunk_bytes();

        let mut stream = MemoryStream::new(bytes);
        let parsed = TagList::parse_info_chunk(&mut stream, 0).unwrap();
        assert_eq!(parsed.get("tracknumber"), Some("2"));
        assert_eq!(parsed.get("totaltracks"), Some("10"));
        assert_eq!(parsed.get("title"), Some("Encore"));
    }
}
