// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine scenarios: real WAV fixtures decoded through the producer,
//! drained into the paced null device or a recording output.

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

use aria_codec_wav::WAV_PLUGIN;
use aria_core::comment::Comments;
use aria_core::errors::OutputResult;
use aria_core::input::InputRegistry;
use aria_core::output::{OutputDescriptor, OutputLayer, PcmOutput};
use aria_core::sf::SampleFormat;
use aria_library::track_info::TrackInfo;
use aria_output_null::NULL_PLUGIN;
use aria_player::{Player, PlayerCallbacks, Status};

lazy_static! {
    static ref REGISTRY: InputRegistry = {
        let mut registry = InputRegistry::new();
        registry.register(&WAV_PLUGIN);
        registry
    };
}

fn make_wav(rate: u32, frames: u32) -> Vec<u8> {
    let frame_size = 4u32; // s16 stereo
    let data_len = frames * frame_size;

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(4 + 24 + 8 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&rate.to_le_bytes());
    out.extend_from_slice(&(rate * frame_size).to_le_bytes());
    out.extend_from_slice(&(frame_size as u16).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

fn write_wav(dir: &Path, name: &str, rate: u32, frames: u32) -> String {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&make_wav(rate, frames)).unwrap();
    path.to_str().unwrap().to_string()
}

fn no_tracks() -> PlayerCallbacks {
    PlayerCallbacks { get_next: Box::new(|| None), get_prev: Box::new(|| None) }
}

fn queue_callbacks(files: Vec<String>) -> PlayerCallbacks {
    let queue: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(files.into()));
    PlayerCallbacks {
        get_next: Box::new(move || {
            queue.lock().unwrap().pop_front().map(|filename| {
                TrackInfo::new(filename, Comments::new(), -1, -1)
            })
        }),
        get_prev: Box::new(|| None),
    }
}

fn null_output(buffer_ms: &str) -> OutputLayer {
    let mut outputs = OutputLayer::new();
    outputs.register(&NULL_PLUGIN);
    outputs.set_option("dsp.null.buffer_ms", buffer_ms).unwrap();
    outputs
}

fn wait_for(player: &Player, what: &str, timeout: Duration, mut pred: impl FnMut(&aria_player::PlayerInfo) -> bool) {
    let deadline = Instant::now() + timeout;
    loop {
        let info = player.info();
        if pred(&info) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {}; info: {:?}", what, info);
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn plays_to_the_end_and_reports_the_full_position() {
    let dir = tempfile::tempdir().unwrap();
    // Two seconds of 8 kHz stereo silence.
    let file = write_wav(dir.path(), "two.wav", 8000, 16000);

    let player = Player::new(&REGISTRY, null_output("100"), no_tracks());
    player.play_file(&file);

    wait_for(&player, "end of playback", Duration::from_secs(10), |info| {
        info.status == Status::Stopped
    });
    let info = player.info();
    assert_eq!(info.pos, 2);
    assert_eq!(info.filename, file);
    assert!(info.error.is_none(), "unexpected error: {:?}", info.error);
}

#[test]
fn pause_toggles_and_freezes_the_position() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_wav(dir.path(), "long.wav", 8000, 8000 * 30);

    let player = Player::new(&REGISTRY, null_output("100"), no_tracks());
    player.play_file(&file);
    wait_for(&player, "playback start", Duration::from_secs(5), |info| {
        info.status == Status::Playing
    });

    player.pause();
    wait_for(&player, "pause", Duration::from_secs(5), |info| info.status == Status::Paused);
    let pos = player.info().pos;
    thread::sleep(Duration::from_millis(300));
    assert_eq!(player.info().pos, pos);

    player.pause();
    wait_for(&player, "resume", Duration::from_secs(5), |info| info.status == Status::Playing);
    player.stop();
    wait_for(&player, "stop", Duration::from_secs(5), |info| info.status == Status::Stopped);
    assert_eq!(player.info().pos, 0);
}

#[test]
fn seek_moves_the_reported_position_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_wav(dir.path(), "four.wav", 8000, 8000 * 4);

    let player = Player::new(&REGISTRY, null_output("100"), no_tracks());
    player.play_file(&file);
    wait_for(&player, "playback start", Duration::from_secs(5), |info| {
        info.status == Status::Playing
    });

    player.seek_absolute(3.0);
    wait_for(&player, "seek to take effect", Duration::from_millis(500), |info| info.pos == 3);

    // And it keeps playing to the end from there.
    wait_for(&player, "end of playback", Duration::from_secs(5), |info| {
        info.status == Status::Stopped
    });
    assert_eq!(player.info().pos, 4);
}

#[test]
fn volume_round_trips_through_the_soft_mixer() {
    let player = Player::new(&REGISTRY, null_output("100"), no_tracks());
    player.set_volume(50, 50);
    wait_for(&player, "volume change", Duration::from_secs(5), |info| {
        (info.vol_left, info.vol_right) == (50, 50)
    });
}

#[test]
fn eof_advances_through_the_callback_queue() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_wav(dir.path(), "first.wav", 8000, 4000);
    let second = write_wav(dir.path(), "second.wav", 8000, 4000);

    let player =
        Player::new(&REGISTRY, null_output("50"), queue_callbacks(vec![second.clone()]));
    player.play_file(&first);

    wait_for(&player, "advance to the queued track", Duration::from_secs(10), |info| {
        info.filename == second
    });
    wait_for(&player, "end of playback", Duration::from_secs(10), |info| {
        info.status == Status::Stopped
    });
    assert!(player.info().error.is_none());
}

// -- sample-format renegotiation ---------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Event {
    Open(u32),
    Close,
    Write(usize),
}

static EVENTS: Mutex<Vec<Event>> = Mutex::new(Vec::new());

struct Recorder;

impl PcmOutput for Recorder {
    fn init(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn exit(&mut self) {}

    fn open(&mut self, sf: SampleFormat) -> OutputResult<()> {
        EVENTS.lock().unwrap().push(Event::Open(sf.rate));
        Ok(())
    }

    fn close(&mut self) -> OutputResult<()> {
        EVENTS.lock().unwrap().push(Event::Close);
        Ok(())
    }

    fn drop_audio(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> OutputResult<usize> {
        EVENTS.lock().unwrap().push(Event::Write(buf.len()));
        Ok(buf.len())
    }

    fn buffer_space(&mut self) -> OutputResult<usize> {
        Ok(1 << 20)
    }

    fn pause(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn unpause(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

fn new_recorder() -> Box<dyn PcmOutput> {
    Box::new(Recorder)
}

static RECORDER_PLUGIN: OutputDescriptor = OutputDescriptor {
    name: "recorder",
    priority: 0,
    options: &[],
    mixer_options: &[],
    new_pcm: new_recorder,
    new_mixer: None,
};

#[test]
fn format_change_reopens_the_device_on_the_track_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_wav(dir.path(), "a.wav", 44100, 4410);
    let b = write_wav(dir.path(), "b.wav", 48000, 4800);

    let mut outputs = OutputLayer::new();
    outputs.register(&RECORDER_PLUGIN);

    let player = Player::new(&REGISTRY, outputs, queue_callbacks(vec![b]));
    player.play_file(&a);
    wait_for(&player, "end of playback", Duration::from_secs(10), |info| {
        info.status == Status::Stopped
    });

    let events = EVENTS.lock().unwrap().clone();

    // open(44.1k), a's bytes, close+open(48k), b's bytes, final close.
    assert_eq!(events.first(), Some(&Event::Open(44100)));
    let reopen = events
        .iter()
        .position(|event| *event == Event::Open(48000))
        .expect("no re-open at the new rate");
    assert_eq!(events[reopen - 1], Event::Close);

    let bytes_before: usize = events[..reopen]
        .iter()
        .filter_map(|event| match event {
            Event::Write(n) => Some(*n),
            _ => None,
        })
        .sum();
    let bytes_after: usize = events[reopen..]
        .iter()
        .filter_map(|event| match event {
            Event::Write(n) => Some(*n),
            _ => None,
        })
        .sum();
    assert_eq!(bytes_before, 4410 * 4);
    assert_eq!(bytes_after, 4800 * 4);
}
