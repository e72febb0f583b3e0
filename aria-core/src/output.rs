// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `output` module manages PCM output plugins and their mixers.
//!
//! Plugins declare a priority; when the user has not chosen one, the layer
//! selects the initialized plugin with the numerically lowest priority
//! value. Selecting a plugin closes the previous plugin's mixer and opens
//! the new one's.

use log::{debug, warn};

use crate::errors::{OutputError, OutputResult};
use crate::sf::SampleFormat;

/// `buffer_space` reports from a device are clamped to this many frames;
/// outputs returning absurd values get the cap instead.
const MAX_BUFFER_SPACE_FRAMES: usize = 1024;

/// A PCM sink. `open` configures the device for one sample format; `write`
/// returns the number of bytes the device accepted and may be short or
/// would-block when its buffer is full.
pub trait PcmOutput: Send {
    fn init(&mut self) -> OutputResult<()>;
    fn exit(&mut self);
    fn open(&mut self, sf: SampleFormat) -> OutputResult<()>;
    fn close(&mut self) -> OutputResult<()>;
    /// Discard buffered audio and return to the prepared state.
    fn drop_audio(&mut self) -> OutputResult<()>;
    fn write(&mut self, buf: &[u8]) -> OutputResult<usize>;
    /// Bytes currently writable without blocking.
    fn buffer_space(&mut self) -> OutputResult<usize>;
    fn pause(&mut self) -> OutputResult<()>;
    fn unpause(&mut self) -> OutputResult<()>;

    fn set_option(&mut self, _key: &str, _val: &str) -> OutputResult<()> {
        Err(OutputError::NotOption)
    }

    fn get_option(&self, _key: &str) -> OutputResult<String> {
        Err(OutputError::NotOption)
    }
}

/// A hardware or software volume control paired with an output plugin.
/// `open` reports the device-native maximum; volumes are per channel in
/// device units.
pub trait Mixer: Send {
    fn init(&mut self) -> OutputResult<()>;
    fn exit(&mut self);
    fn open(&mut self) -> OutputResult<u32>;
    fn close(&mut self) -> OutputResult<()>;
    fn get_volume(&self) -> OutputResult<(u32, u32)>;
    fn set_volume(&mut self, left: u32, right: u32) -> OutputResult<()>;

    fn set_option(&mut self, _key: &str, _val: &str) -> OutputResult<()> {
        Err(OutputError::NotOption)
    }

    fn get_option(&self, _key: &str) -> OutputResult<String> {
        Err(OutputError::NotOption)
    }
}

/// A declarative description of one output plugin.
#[derive(Copy, Clone)]
pub struct OutputDescriptor {
    /// A short ASCII-only name identifying the plugin.
    pub name: &'static str,
    /// Selection priority; numerically lower is preferred.
    pub priority: i32,
    /// Option keys understood by the PCM half.
    pub options: &'static [&'static str],
    /// Option keys understood by the mixer half.
    pub mixer_options: &'static [&'static str],
    /// Factory for the PCM half.
    pub new_pcm: fn() -> Box<dyn PcmOutput>,
    /// Factory for the optional mixer half.
    pub new_mixer: Option<fn() -> Box<dyn Mixer>>,
}

struct RegisteredOutput {
    desc: OutputDescriptor,
    pcm: Box<dyn PcmOutput>,
    mixer: Option<Box<dyn Mixer>>,
    pcm_initialized: bool,
    mixer_initialized: bool,
    mixer_open: bool,
}

/// The output plugin layer: the registered plugins, the selected plugin,
/// and the sample format the device is currently opened with.
pub struct OutputLayer {
    outputs: Vec<RegisteredOutput>,
    current: Option<usize>,
    current_sf: Option<SampleFormat>,
    /// Volume is between 0 and `volume_max` in device units; 0 when no
    /// mixer is open.
    volume_max: u32,
}

impl Default for OutputLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputLayer {
    pub fn new() -> Self {
        OutputLayer { outputs: Vec::new(), current: None, current_sf: None, volume_max: 0 }
    }

    /// Register a plugin, keeping the list ordered by ascending priority.
    pub fn register(&mut self, descriptor: &OutputDescriptor) {
        let output = RegisteredOutput {
            desc: *descriptor,
            pcm: (descriptor.new_pcm)(),
            mixer: descriptor.new_mixer.map(|new_mixer| new_mixer()),
            pcm_initialized: false,
            mixer_initialized: false,
            mixer_open: false,
        };
        let pos = self
            .outputs
            .iter()
            .position(|o| descriptor.priority < o.desc.priority)
            .unwrap_or(self.outputs.len());
        self.outputs.insert(pos, output);
    }

    /// Initialize every registered plugin that has not been initialized
    /// yet. Failures are logged and the plugin stays unavailable.
    pub fn init_all(&mut self) {
        for output in &mut self.outputs {
            init_output(output);
        }
    }

    pub fn exit_all(&mut self) {
        for output in &mut self.outputs {
            if output.mixer_initialized {
                if let Some(mixer) = &mut output.mixer {
                    mixer.exit();
                }
                output.mixer_initialized = false;
            }
            if output.pcm_initialized {
                output.pcm.exit();
                output.pcm_initialized = false;
            }
        }
        self.current = None;
        self.current_sf = None;
        self.volume_max = 0;
    }

    /// Select a plugin by name, initializing it on demand.
    pub fn select(&mut self, name: &str) -> OutputResult<()> {
        let idx = self
            .outputs
            .iter()
            .position(|o| o.desc.name.eq_ignore_ascii_case(name))
            .ok_or(OutputError::NoPlugin)?;

        init_output(&mut self.outputs[idx]);
        if !self.outputs[idx].pcm_initialized {
            return Err(OutputError::NotInitialized);
        }

        self.close_mixer();
        self.current = Some(idx);
        self.open_mixer();
        debug!("selected output plugin {}", name);
        Ok(())
    }

    /// Select the initialized plugin with the best (lowest) priority.
    pub fn select_any(&mut self) -> OutputResult<()> {
        let name = self
            .outputs
            .iter()
            .find(|o| o.pcm_initialized)
            .map(|o| o.desc.name)
            .ok_or(OutputError::NoPlugin)?;
        self.select(name)
    }

    pub fn current_name(&self) -> Option<&'static str> {
        self.current.map(|idx| self.outputs[idx].desc.name)
    }

    pub fn is_open(&self) -> bool {
        self.current_sf.is_some()
    }

    /// The sample format the device is opened with, if open.
    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.current_sf
    }

    pub fn open(&mut self, sf: SampleFormat) -> OutputResult<()> {
        let output = self.current_output()?;
        output.pcm.open(sf)?;
        self.current_sf = Some(sf);
        Ok(())
    }

    pub fn close(&mut self) -> OutputResult<()> {
        self.current_sf = None;
        self.current_output()?.pcm.close()
    }

    /// Reconfigure the device if `sf` differs from the opened format.
    /// Returns true when the device was re-opened.
    pub fn set_sf(&mut self, sf: SampleFormat) -> OutputResult<bool> {
        if self.current_sf == Some(sf) {
            return Ok(false);
        }
        debug!("sample format change: {:?} -> {}", self.current_sf, sf);
        self.close()?;
        self.open(sf)?;
        Ok(true)
    }

    pub fn write(&mut self, buf: &[u8]) -> OutputResult<usize> {
        self.current_output()?.pcm.write(buf)
    }

    pub fn buffer_space(&mut self) -> OutputResult<usize> {
        let max = self
            .current_sf
            .map(|sf| MAX_BUFFER_SPACE_FRAMES * sf.frame_size())
            .unwrap_or(MAX_BUFFER_SPACE_FRAMES * 4);
        let space = self.current_output()?.pcm.buffer_space()?;
        if space > max {
            Ok(max)
        }
        else {
            Ok(space)
        }
    }

    pub fn drop_audio(&mut self) -> OutputResult<()> {
        self.current_output()?.pcm.drop_audio()
    }

    pub fn pause(&mut self) -> OutputResult<()> {
        self.current_output()?.pcm.pause()
    }

    pub fn unpause(&mut self) -> OutputResult<()> {
        self.current_output()?.pcm.unpause()
    }

    /// Bytes per second of the opened format, or 0 when closed.
    pub fn second_size(&self) -> usize {
        self.current_sf.map(|sf| sf.second_size()).unwrap_or(0)
    }

    /// Set the volume on the 0..100 user scale, converting to device units
    /// with round-half-up.
    pub fn set_volume(&mut self, left: u32, right: u32) -> OutputResult<()> {
        let max = self.volume_max;
        let output = self.current_output()?;
        if !output.mixer_open {
            return Err(OutputError::NotSupported);
        }
        let mixer = output.mixer.as_mut().ok_or(OutputError::NotSupported)?;
        mixer.set_volume(scale_to_device(left.min(100), max), scale_to_device(right.min(100), max))
    }

    /// Get the volume on the 0..100 user scale.
    pub fn get_volume(&mut self) -> OutputResult<(u32, u32)> {
        let max = self.volume_max;
        let output = self.current_output()?;
        if !output.mixer_open {
            return Err(OutputError::NotSupported);
        }
        let mixer = output.mixer.as_ref().ok_or(OutputError::NotSupported)?;
        let (left, right) = mixer.get_volume()?;
        Ok((scale_from_device(left, max), scale_from_device(right, max)))
    }

    pub fn volume_max(&self) -> u32 {
        self.volume_max
    }

    /// Set a plugin option, addressed as `dsp.<plugin>.<key>` or
    /// `mixer.<plugin>.<key>`. Setting a mixer option of the selected
    /// plugin re-opens its mixer.
    pub fn set_option(&mut self, key: &str, val: &str) -> OutputResult<()> {
        let (scope, plugin, option) = split_option_key(key).ok_or(OutputError::NotOption)?;
        let idx = self
            .outputs
            .iter()
            .position(|o| o.desc.name.eq_ignore_ascii_case(plugin))
            .ok_or(OutputError::NotOption)?;

        if scope == "mixer" {
            let output = &mut self.outputs[idx];
            let mixer = output.mixer.as_mut().ok_or(OutputError::NotOption)?;
            mixer.set_option(option, val)?;
            if self.current == Some(idx) {
                self.close_mixer();
                self.open_mixer();
            }
            Ok(())
        }
        else {
            self.outputs[idx].pcm.set_option(option, val)
        }
    }

    pub fn get_option(&self, key: &str) -> OutputResult<String> {
        let (scope, plugin, option) = split_option_key(key).ok_or(OutputError::NotOption)?;
        let output = self
            .outputs
            .iter()
            .find(|o| o.desc.name.eq_ignore_ascii_case(plugin))
            .ok_or(OutputError::NotOption)?;
        if scope == "mixer" {
            output.mixer.as_ref().ok_or(OutputError::NotOption)?.get_option(option)
        }
        else {
            output.pcm.get_option(option)
        }
    }

    /// Every option key of every plugin, in `dsp.`/`mixer.` form.
    pub fn option_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for output in &self.outputs {
            for opt in output.desc.options {
                keys.push(format!("dsp.{}.{}", output.desc.name, opt));
            }
            if output.mixer.is_some() {
                for opt in output.desc.mixer_options {
                    keys.push(format!("mixer.{}.{}", output.desc.name, opt));
                }
            }
        }
        keys
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.outputs.iter().map(|o| o.desc.name).collect()
    }

    fn current_output(&mut self) -> OutputResult<&mut RegisteredOutput> {
        let idx = self.current.ok_or(OutputError::NotInitialized)?;
        Ok(&mut self.outputs[idx])
    }

    fn close_mixer(&mut self) {
        self.volume_max = 0;
        if let Some(idx) = self.current {
            let output = &mut self.outputs[idx];
            if output.mixer_open {
                if let Some(mixer) = &mut output.mixer {
                    let _ = mixer.close();
                }
                output.mixer_open = false;
            }
        }
    }

    fn open_mixer(&mut self) {
        let idx = match self.current {
            Some(idx) => idx,
            None => return,
        };
        let output = &mut self.outputs[idx];
        debug_assert!(!output.mixer_open);
        if !output.mixer_initialized {
            return;
        }
        if let Some(mixer) = &mut output.mixer {
            match mixer.open() {
                Ok(max) => {
                    self.volume_max = max;
                    output.mixer_open = true;
                }
                Err(err) => {
                    warn!("could not open mixer for {}: {}", output.desc.name, err);
                    self.volume_max = 0;
                }
            }
        }
    }
}

fn init_output(output: &mut RegisteredOutput) {
    if !output.mixer_initialized {
        if let Some(mixer) = &mut output.mixer {
            match mixer.init() {
                Ok(()) => output.mixer_initialized = true,
                Err(err) => debug!("could not initialize mixer {}: {}", output.desc.name, err),
            }
        }
    }
    if !output.pcm_initialized {
        match output.pcm.init() {
            Ok(()) => output.pcm_initialized = true,
            Err(err) => debug!("could not initialize output {}: {}", output.desc.name, err),
        }
    }
}

fn split_option_key(key: &str) -> Option<(&str, &str, &str)> {
    let (scope, rest) = key.split_once('.')?;
    if scope != "dsp" && scope != "mixer" {
        return None;
    }
    let (plugin, option) = rest.split_once('.')?;
    Some((scope, plugin, option))
}

/// 0..100 to 0..max, round half up.
fn scale_to_device(vol: u32, max: u32) -> u32 {
    (vol * max + 50) / 100
}

/// 0..max to 0..100, round half up.
fn scale_from_device(vol: u32, max: u32) -> u32 {
    if max == 0 {
        0
    }
    else {
        (vol * 100 + max / 2) / max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestPcm {
        open_sf: Option<SampleFormat>,
        fail_init: bool,
        written: usize,
    }

    impl PcmOutput for TestPcm {
        fn init(&mut self) -> OutputResult<()> {
            if self.fail_init {
                Err(OutputError::Internal("init failure"))
            }
            else {
                Ok(())
            }
        }

        fn exit(&mut self) {}

        fn open(&mut self, sf: SampleFormat) -> OutputResult<()> {
            self.open_sf = Some(sf);
            Ok(())
        }

        fn close(&mut self) -> OutputResult<()> {
            self.open_sf = None;
            Ok(())
        }

        fn drop_audio(&mut self) -> OutputResult<()> {
            Ok(())
        }

        fn write(&mut self, buf: &[u8]) -> OutputResult<usize> {
            self.written += buf.len();
            Ok(buf.len())
        }

        fn buffer_space(&mut self) -> OutputResult<usize> {
            // Deliberately absurd; the layer must clamp it.
            Ok(usize::MAX / 2)
        }

        fn pause(&mut self) -> OutputResult<()> {
            Ok(())
        }

        fn unpause(&mut self) -> OutputResult<()> {
            Ok(())
        }
    }

    struct TestMixer {
        max: u32,
        volume: (u32, u32),
    }

    impl Mixer for TestMixer {
        fn init(&mut self) -> OutputResult<()> {
            Ok(())
        }

        fn exit(&mut self) {}

        fn open(&mut self) -> OutputResult<u32> {
            Ok(self.max)
        }

        fn close(&mut self) -> OutputResult<()> {
            Ok(())
        }

        fn get_volume(&self) -> OutputResult<(u32, u32)> {
            Ok(self.volume)
        }

        fn set_volume(&mut self, left: u32, right: u32) -> OutputResult<()> {
            self.volume = (left, right);
            Ok(())
        }
    }

    fn new_test_pcm() -> Box<dyn PcmOutput> {
        Box::new(TestPcm::default())
    }

    fn new_failing_pcm() -> Box<dyn PcmOutput> {
        Box::new(TestPcm { fail_init: true, ..Default::default() })
    }

    fn new_test_mixer() -> Box<dyn Mixer> {
        Box::new(TestMixer { max: 255, volume: (0, 0) })
    }

    static GOOD: OutputDescriptor = OutputDescriptor {
        name: "good",
        priority: 2,
        options: &[],
        mixer_options: &[],
        new_pcm: new_test_pcm,
        new_mixer: Some(new_test_mixer),
    };

    static BROKEN: OutputDescriptor = OutputDescriptor {
        name: "broken",
        priority: 0,
        options: &[],
        mixer_options: &[],
        new_pcm: new_failing_pcm,
        new_mixer: None,
    };

    fn layer() -> OutputLayer {
        let mut layer = OutputLayer::new();
        layer.register(&GOOD);
        layer.register(&BROKEN);
        layer.init_all();
        layer
    }

    #[test]
    fn select_any_skips_uninitialized_plugins() {
        let mut layer = layer();
        // "broken" has the better priority but failed to initialize.
        layer.select_any().unwrap();
        assert_eq!(layer.current_name(), Some("good"));
    }

    #[test]
    fn select_unknown_plugin_fails() {
        let mut layer = layer();
        assert!(matches!(layer.select("nope"), Err(OutputError::NoPlugin)));
        assert!(matches!(layer.select("broken"), Err(OutputError::NotInitialized)));
    }

    #[test]
    fn set_sf_reopens_only_on_change() {
        let mut layer = layer();
        layer.select_any().unwrap();
        let a = SampleFormat::s16_le(44100);
        let b = SampleFormat::s16_le(48000);
        layer.open(a).unwrap();
        assert!(!layer.set_sf(a).unwrap());
        assert!(layer.set_sf(b).unwrap());
        assert_eq!(layer.sample_format(), Some(b));
    }

    #[test]
    fn buffer_space_is_clamped() {
        let mut layer = layer();
        layer.select_any().unwrap();
        let sf = SampleFormat::s16_le(44100);
        layer.open(sf).unwrap();
        assert_eq!(layer.buffer_space().unwrap(), 1024 * sf.frame_size());
    }

    #[test]
    fn volume_scale_round_trip() {
        let mut layer = layer();
        layer.select_any().unwrap();
        assert_eq!(layer.volume_max(), 255);
        layer.set_volume(50, 50).unwrap();
        assert_eq!(layer.get_volume().unwrap(), (50, 50));
        layer.set_volume(0, 100).unwrap();
        assert_eq!(layer.get_volume().unwrap(), (0, 100));
    }

    #[test]
    fn device_unit_conversion() {
        assert_eq!(scale_to_device(50, 255), 128);
        assert_eq!(scale_to_device(100, 255), 255);
        assert_eq!(scale_to_device(0, 255), 0);
        assert_eq!(scale_from_device(128, 255), 50);
        assert_eq!(scale_from_device(255, 255), 100);
        assert_eq!(scale_from_device(0, 255), 0);
    }
}
