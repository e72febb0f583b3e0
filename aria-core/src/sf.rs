// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sf` module defines the sample format descriptor shared by the input
//! and output layers.

use std::fmt;

/// `SampleFormat` describes raw interleaved PCM: the sample rate in Hz, the
/// width of one sample in bits, the channel count, signedness, and byte
/// order. Two formats are interchangeable if and only if every field is
/// equal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleFormat {
    /// Sample rate in Hz.
    pub rate: u32,
    /// Bits per sample (8, 16, 24, or 32).
    pub bits: u8,
    /// Number of interleaved channels.
    pub channels: u8,
    /// Samples are signed integers.
    pub signed: bool,
    /// Samples are big-endian.
    pub big_endian: bool,
}

impl SampleFormat {
    pub fn new(rate: u32, bits: u8, channels: u8, signed: bool, big_endian: bool) -> Self {
        SampleFormat { rate, bits, channels, signed, big_endian }
    }

    /// The canonical format produced by the PCM converter: signed 16-bit
    /// little-endian stereo at the given rate.
    pub fn s16_le(rate: u32) -> Self {
        SampleFormat::new(rate, 16, 2, true, false)
    }

    /// Size of one sample in bytes.
    pub fn sample_size(&self) -> usize {
        usize::from(self.bits) / 8
    }

    /// Size of one frame (one sample per channel) in bytes.
    pub fn frame_size(&self) -> usize {
        self.sample_size() * usize::from(self.channels)
    }

    /// Number of bytes consumed by one second of audio.
    pub fn second_size(&self) -> usize {
        self.rate as usize * self.frame_size()
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} bit, {} ch, {}{}",
            self.rate,
            self.bits,
            self.channels,
            if self.signed { "signed" } else { "unsigned" },
            if self.bits > 8 { if self.big_endian { ", BE" } else { ", LE" } } else { "" },
        )
    }
}
