// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pcm` module converts decoder output to 16-bit signed little-endian
//! stereo.
//!
//! Conversion of 8-bit PCM is a single phase: unsigned to signed, mono to
//! stereo, and 8 to 16 bits all happen while expanding into a separate
//! buffer. Conversion of 16-bit PCM splits into an in-place phase (byte
//! order, signedness) and an expanding phase (mono to stereo). Anything
//! wider than 16 bits or with more than two channels passes through
//! untouched.

use crate::sf::SampleFormat;

/// An expanding conversion: reads samples from `src` and writes the
/// converted, possibly channel-duplicated samples to `dst`. `dst` must hold
/// `src.len() * factor` bytes, where `factor` is the scale recorded in the
/// [`Conversion`].
pub type ConvertFn = fn(dst: &mut [u8], src: &[u8]);

/// An in-place conversion over 16-bit samples.
pub type ConvertInPlaceFn = fn(buf: &mut [u8]);

/// The conversion plan for one decoder format.
#[derive(Clone, Copy, Default)]
pub struct Conversion {
    /// Expanding conversion, if one applies.
    pub convert: Option<ConvertFn>,
    /// In-place conversion, if one applies.
    pub convert_in_place: Option<ConvertInPlaceFn>,
    /// Output bytes per input byte: 4 for 8-bit mono, 2 for 8-bit stereo or
    /// 16-bit mono, 1 otherwise.
    pub scale: usize,
}

impl Conversion {
    pub fn is_noop(&self) -> bool {
        self.convert.is_none() && self.convert_in_place.is_none()
    }
}

fn convert_u8_1ch_to_s16_2ch(dst: &mut [u8], src: &[u8]) {
    for (i, &s) in src.iter().enumerate() {
        let sample = ((u16::from(s) << 8) ^ 0x8000) as i16;
        dst[4 * i..4 * i + 2].copy_from_slice(&sample.to_le_bytes());
        dst[4 * i + 2..4 * i + 4].copy_from_slice(&sample.to_le_bytes());
    }
}

fn convert_s8_1ch_to_s16_2ch(dst: &mut [u8], src: &[u8]) {
    for (i, &s) in src.iter().enumerate() {
        let sample = i16::from(s as i8) << 8;
        dst[4 * i..4 * i + 2].copy_from_slice(&sample.to_le_bytes());
        dst[4 * i + 2..4 * i + 4].copy_from_slice(&sample.to_le_bytes());
    }
}

fn convert_u8_2ch_to_s16_2ch(dst: &mut [u8], src: &[u8]) {
    for (i, &s) in src.iter().enumerate() {
        let sample = ((u16::from(s) << 8) ^ 0x8000) as i16;
        dst[2 * i..2 * i + 2].copy_from_slice(&sample.to_le_bytes());
    }
}

fn convert_s8_2ch_to_s16_2ch(dst: &mut [u8], src: &[u8]) {
    for (i, &s) in src.iter().enumerate() {
        let sample = i16::from(s as i8) << 8;
        dst[2 * i..2 * i + 2].copy_from_slice(&sample.to_le_bytes());
    }
}

fn convert_16_1ch_to_16_2ch(dst: &mut [u8], src: &[u8]) {
    for (i, sample) in src.chunks_exact(2).enumerate() {
        dst[4 * i..4 * i + 2].copy_from_slice(sample);
        dst[4 * i + 2..4 * i + 4].copy_from_slice(sample);
    }
}

fn convert_u16_le_to_s16_le(buf: &mut [u8]) {
    for sample in buf.chunks_exact_mut(2) {
        let biased = u16::from_le_bytes([sample[0], sample[1]]) ^ 0x8000;
        sample.copy_from_slice(&biased.to_le_bytes());
    }
}

fn convert_u16_be_to_s16_le(buf: &mut [u8]) {
    for sample in buf.chunks_exact_mut(2) {
        let biased = u16::from_be_bytes([sample[0], sample[1]]) ^ 0x8000;
        sample.copy_from_slice(&biased.to_le_bytes());
    }
}

fn convert_s16_be_to_s16_le(buf: &mut [u8]) {
    for sample in buf.chunks_exact_mut(2) {
        sample.swap(0, 1);
    }
}

/// Pick the conversion plan for `sf`. Returns a no-op plan with scale 1 when
/// the format passes through untouched.
pub fn conversion(sf: &SampleFormat) -> Conversion {
    let mut conv = Conversion { convert: None, convert_in_place: None, scale: 1 };

    if sf.bits == 8 {
        if sf.channels == 1 {
            conv.scale = 4;
            conv.convert = Some(if sf.signed {
                convert_s8_1ch_to_s16_2ch as ConvertFn
            }
            else {
                convert_u8_1ch_to_s16_2ch as ConvertFn
            });
        }
        else if sf.channels == 2 {
            conv.scale = 2;
            conv.convert = Some(if sf.signed {
                convert_s8_2ch_to_s16_2ch as ConvertFn
            }
            else {
                convert_u8_2ch_to_s16_2ch as ConvertFn
            });
        }
    }
    else if sf.bits == 16 {
        if sf.channels == 1 {
            conv.scale = 2;
            conv.convert = Some(convert_16_1ch_to_16_2ch as ConvertFn);
        }
        if sf.channels <= 2 {
            conv.convert_in_place = match (sf.signed, sf.big_endian) {
                (false, false) => Some(convert_u16_le_to_s16_le as ConvertInPlaceFn),
                (false, true) => Some(convert_u16_be_to_s16_le as ConvertInPlaceFn),
                (true, true) => Some(convert_s16_be_to_s16_le as ConvertInPlaceFn),
                (true, false) => None,
            };
        }
    }

    conv
}

/// The sample format presented upstream once the plan in `conversion` has
/// been applied: canonical s16-LE stereo when any conversion applies,
/// otherwise the decoder's format verbatim.
pub fn converted_format(sf: &SampleFormat) -> SampleFormat {
    if conversion(sf).is_noop() {
        *sf
    }
    else {
        SampleFormat::s16_le(sf.rate)
    }
}
