// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Null output plugin: discards audio while behaving like a real device.
//!
//! The plugin maintains a fixed-size virtual buffer that drains at the
//! opened sample rate, so `write` back-pressures and `buffer_space` shrinks
//! and grows exactly as they would on hardware. This keeps playback timing
//! honest on machines without a sound device and gives the engine tests a
//! deterministic output.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::time::Instant;

use log::debug;

use aria_core::errors::{OutputError, OutputResult};
use aria_core::output::{Mixer, OutputDescriptor, PcmOutput};
use aria_core::sf::SampleFormat;

/// The null output plugin descriptor. Worst priority: it is the fallback
/// when nothing else initializes.
pub static NULL_PLUGIN: OutputDescriptor = OutputDescriptor {
    name: "null",
    priority: 99,
    options: &["buffer_ms"],
    mixer_options: &[],
    new_pcm: new_null_output,
    new_mixer: Some(new_soft_mixer),
};

/// Virtual device buffer length.
const DEFAULT_BUFFER_MS: u64 = 250;

fn new_null_output() -> Box<dyn PcmOutput> {
    Box::new(NullOutput { buffer_ms: DEFAULT_BUFFER_MS, open: None })
}

fn new_soft_mixer() -> Box<dyn Mixer> {
    Box::new(SoftMixer { volume: (SoftMixer::MAX, SoftMixer::MAX) })
}

struct OpenState {
    sf: SampleFormat,
    /// Virtual buffer capacity in bytes.
    capacity: usize,
    /// Bytes accepted but not yet "played".
    pending: usize,
    /// Clock position of the last drain.
    mark: Instant,
    paused: bool,
}

impl OpenState {
    /// Consume bytes from the virtual buffer at the sample rate.
    fn drain(&mut self) {
        if self.paused {
            return;
        }
        let now = Instant::now();
        let second_size = self.sf.second_size() as f64;
        let consumable = (now.duration_since(self.mark).as_secs_f64() * second_size) as usize;
        if consumable >= self.pending {
            self.pending = 0;
            self.mark = now;
        }
        else {
            self.pending -= consumable;
            // Advance the mark only by the whole bytes consumed, keeping
            // the fractional remainder for the next drain.
            self.mark += std::time::Duration::from_secs_f64(consumable as f64 / second_size);
        }
    }
}

struct NullOutput {
    buffer_ms: u64,
    open: Option<OpenState>,
}

impl NullOutput {
    fn state(&mut self) -> OutputResult<&mut OpenState> {
        self.open.as_mut().ok_or(OutputError::Internal("output not open"))
    }
}

impl PcmOutput for NullOutput {
    fn init(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn exit(&mut self) {}

    fn open(&mut self, sf: SampleFormat) -> OutputResult<()> {
        let capacity = (sf.second_size() as u64 * self.buffer_ms / 1000) as usize;
        let capacity = capacity.max(sf.frame_size());
        debug!("null device open: {} ({} byte buffer)", sf, capacity);
        self.open =
            Some(OpenState { sf, capacity, pending: 0, mark: Instant::now(), paused: false });
        Ok(())
    }

    fn close(&mut self) -> OutputResult<()> {
        self.open = None;
        Ok(())
    }

    fn drop_audio(&mut self) -> OutputResult<()> {
        let state = self.state()?;
        state.pending = 0;
        state.mark = Instant::now();
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> OutputResult<usize> {
        let state = self.state()?;
        state.drain();
        let n = buf.len().min(state.capacity - state.pending);
        state.pending += n;
        Ok(n)
    }

    fn buffer_space(&mut self) -> OutputResult<usize> {
        let state = self.state()?;
        state.drain();
        Ok(state.capacity - state.pending)
    }

    fn pause(&mut self) -> OutputResult<()> {
        let state = self.state()?;
        state.drain();
        state.paused = true;
        Ok(())
    }

    fn unpause(&mut self) -> OutputResult<()> {
        let state = self.state()?;
        state.mark = Instant::now();
        state.paused = false;
        Ok(())
    }

    fn set_option(&mut self, key: &str, val: &str) -> OutputResult<()> {
        match key {
            "buffer_ms" => {
                self.buffer_ms =
                    val.parse().map_err(|_| OutputError::Internal("bad buffer_ms value"))?;
                Ok(())
            }
            _ => Err(OutputError::NotOption),
        }
    }

    fn get_option(&self, key: &str) -> OutputResult<String> {
        match key {
            "buffer_ms" => Ok(self.buffer_ms.to_string()),
            _ => Err(OutputError::NotOption),
        }
    }
}

/// A software mixer storing volumes in 0..255 device units.
struct SoftMixer {
    volume: (u32, u32),
}

impl SoftMixer {
    const MAX: u32 = 255;
}

impl Mixer for SoftMixer {
    fn init(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn exit(&mut self) {}

    fn open(&mut self) -> OutputResult<u32> {
        Ok(SoftMixer::MAX)
    }

    fn close(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn get_volume(&self) -> OutputResult<(u32, u32)> {
        Ok(self.volume)
    }

    fn set_volume(&mut self, left: u32, right: u32) -> OutputResult<()> {
        self.volume = (left.min(SoftMixer::MAX), right.min(SoftMixer::MAX));
        Ok(())
    }
}
