// Copyright (c) 2019-2025 The Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The magic-cookie extractor (C5): peels `AudioSpecificConfig` out of an
//! MPEG-4 ES descriptor tree for AAC, and strips the ISO-BMFF `frma/alac`
//! wrapper for ALAC. Every other codec's cookie passes through unchanged.

use crate::codec::{CODEC_AAC_HE, CODEC_AAC_HE2, CODEC_AAC_LC, CODEC_ALAC};
use crate::error::{cookie_error, Result};
use crate::io::FourCc;

const TAG_ES_DESCRIPTOR: u8 = 3;
const TAG_DECODER_CONFIG_DESCRIPTOR: u8 = 4;
const TAG_DECODER_SPECIFIC_INFO: u8 = 5;

/// Reads a descriptor's `{tag, size}` pair. Descriptor sizes use the same
/// BER-varint encoding as packet-table entries, but bounded to 4 bytes by
/// the MPEG-4 systems spec rather than 9.
fn read_descriptor_header(cookie: &[u8], pos: &mut usize) -> Option<(u8, usize)> {
    if *pos >= cookie.len() {
        return None;
    }
    let tag = cookie[*pos];
    *pos += 1;

    let mut size: usize = 0;
    for _ in 0..4 {
        if *pos >= cookie.len() {
            return None;
        }
        let byte = cookie[*pos];
        *pos += 1;
        size = (size << 7) | usize::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            break;
        }
    }
    Some((tag, size))
}

/// Walks the ES-descriptor tree to find `DecoderSpecificInfo` (tag 5), the
/// `AudioSpecificConfig` bytes an AAC decoder actually needs.
fn extract_audio_specific_config(cookie: &[u8]) -> Result<Box<[u8]>> {
    let mut pos = 0usize;
    while let Some((tag, size)) = read_descriptor_header(cookie, &mut pos) {
        let payload_start = pos;
        let payload_end = payload_start.checked_add(size).filter(|&e| e <= cookie.len());
        let payload_end = match payload_end {
            Some(e) => e,
            None => return cookie_error("descriptor size runs past the end of the magic cookie"),
        };

        match tag {
            TAG_ES_DESCRIPTOR => {
                // ES_ID (2 bytes) + flags (1 byte).
                if payload_start + 3 > payload_end {
                    return cookie_error("ES_Descriptor shorter than its fixed header");
                }
                let flags = cookie[payload_start + 2];
                let mut inner = payload_start + 3;
                if flags & 0x80 != 0 {
                    inner += 2; // streamDependence
                }
                if flags & 0x40 != 0 {
                    if inner >= payload_end {
                        return cookie_error("ES_Descriptor URL flag set but no length byte");
                    }
                    let url_len = cookie[inner] as usize;
                    inner += 1 + url_len;
                }
                if flags & 0x20 != 0 {
                    inner += 2; // OCRstream
                }
                pos = inner; // descend into children, bounded by the outer loop reading past `payload_end` naturally
            }
            TAG_DECODER_CONFIG_DESCRIPTOR => {
                if payload_start + 13 > payload_end {
                    return cookie_error("DecoderConfigDescriptor shorter than its fixed header");
                }
                pos = payload_start + 13;
            }
            TAG_DECODER_SPECIFIC_INFO => {
                return Ok(cookie[payload_start..payload_end].to_vec().into_boxed_slice());
            }
            _ => {
                pos = payload_end;
            }
        }
    }
    cookie_error("ES descriptor tree ended without a DecoderSpecificInfo record")
}

/// `....frmaalac` wrapper check: bytes 4..12 equal `"frmaalac"` and the
/// cookie is longer than 24 bytes.
fn strip_alac_frma_wrapper(cookie: &[u8]) -> &[u8] {
    if cookie.len() > 24 && &cookie[4..12] == b"frmaalac" {
        &cookie[24..]
    } else {
        cookie
    }
}

/// Translates the raw `kuki` chunk bytes, as stored, into the form the
/// external decoder for `codec_id` expects.
pub fn translate_magic_cookie(codec_id: FourCc, cookie: &[u8]) -> Result<Box<[u8]>> {
    match codec_id {
        CODEC_AAC_LC | CODEC_AAC_HE | CODEC_AAC_HE2 => extract_audio_specific_config(cookie),
        CODEC_ALAC => Ok(strip_alac_frma_wrapper(cookie).to_vec().into_boxed_slice()),
        _ => Ok(cookie.to_vec().into_boxed_slice()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_asc_from_es_descriptor() {
        let cookie: &[u8] = &[
            0x03, 0x20, 0x00, 0x00, 0x00, // ES_Descriptor, size=0x20, ES_ID=0, flags=0
            0x04, 0x12, 0x40, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, // DecoderConfigDescriptor, size=0x12, 13-byte fixed header
            0x05, 0x02, 0x12, 0x10, // DecoderSpecificInfo, size=2, ASC = 12 10
            0x06, 0x01, 0x02, // SLConfigDescriptor, ignored
        ];
        let asc = translate_magic_cookie(CODEC_AAC_LC, cookie).unwrap();
        assert_eq!(&*asc, &[0x12, 0x10]);
    }

    #[test]
    fn cookie_without_decoder_specific_info_errors() {
        let cookie: &[u8] = &[0x06, 0x01, 0x02];
        assert!(translate_magic_cookie(CODEC_AAC_LC, cookie).is_err());
    }

    #[test]
    fn alac_frma_wrapper_is_stripped() {
        let mut cookie = vec![0u8; 4];
        cookie.extend_from_slice(b"frmaalac");
        cookie.extend_from_slice(&[0xAB; 13]); // pad past 24 bytes total
        let translated = translate_magic_cookie(CODEC_ALAC, &cookie).unwrap();
        assert_eq!(&*translated, &cookie[24..]);
    }

    #[test]
    fn alac_cookie_without_wrapper_passes_through() {
        let cookie: &[u8] = &[1, 2, 3, 4, 5];
        let translated = translate_magic_cookie(CODEC_ALAC, cookie).unwrap();
        assert_eq!(&*translated, cookie);
    }

    #[test]
    fn other_codecs_pass_through_unchanged() {
        let cookie: &[u8] = &[9, 9, 9];
        let translated = translate_magic_cookie(*b"flac", cookie).unwrap();
        assert_eq!(&*translated, cookie);
    }
}
