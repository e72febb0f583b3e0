// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `player` module is the playback state machine: a decode (producer)
//! thread filling the chunk ring from the open input, an output (consumer)
//! thread draining it into the output device, and a command channel both
//! loops poll at their boundaries.
//!
//! The producer owns the input handle; the consumer owns the output layer
//! behind its own mutex, which commands lock when they need to touch the
//! device. A sample-format change is a barrier: the producer flushes the
//! ring and waits for the consumer to drain it before bytes of the new
//! format enter, so the ring never holds two formats at once and the
//! consumer re-opens the device exactly on the track boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, warn};

use aria_core::buffer::{Buffer, CHUNK_SIZE};
use aria_core::input::{Input, InputRegistry};
use aria_core::output::OutputLayer;
use aria_core::sf::SampleFormat;
use aria_library::track_info::TrackInfo;

/// Sleep used by both loops when they have nothing to do.
const LOOP_SLEEP: Duration = Duration::from_millis(50);

/// Ring sizing assumes the canonical 44.1 kHz s16 stereo stream.
const CANONICAL_SECOND_SIZE: usize = 44100 * 4;

/// Default ring capacity in seconds of canonical audio.
const DEFAULT_BUFFER_SECONDS: u32 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Stopped,
    Playing,
    Paused,
}

/// Commands accepted by the engine. Enqueued from any thread; picked up at
/// loop boundaries.
#[derive(Debug)]
pub enum Command {
    /// Open a file and play it, or resume/restart playback without one.
    Play(Option<String>),
    /// Set the current file, keeping the playback status.
    SetFile(String),
    /// Toggle between playing and paused.
    Pause,
    Stop,
    SeekRelative(f64),
    SeekAbsolute(f64),
    Next,
    Prev,
    /// Per-channel volume on the 0..100 scale.
    SetVolume(u32, u32),
    /// Switch the output plugin; only legal while stopped.
    SetOutput(String),
    /// Resize the ring; only legal while stopped.
    SetBufferChunks(usize),
    /// Resize the ring to hold this many seconds of canonical audio; only
    /// legal while stopped.
    SetBufferSeconds(u32),
    /// Whether playback continues with the next track at end of stream.
    SetCont(bool),
    ToggleCont,
    Exit,
}

/// Snapshot of the user-visible player state. Each `*_changed` flag is set
/// when the matching field changes and stays set until `clear_changed`.
#[derive(Clone, Debug)]
pub struct PlayerInfo {
    pub filename: String,
    /// Raw stream metadata block (`StreamTitle='...';`).
    pub metadata: String,
    pub status: Status,
    /// Position in whole seconds.
    pub pos: u32,
    /// Continue with the next track at end of stream.
    pub cont: bool,
    pub vol_left: u32,
    pub vol_right: u32,
    /// Buffered bytes in the ring.
    pub buffer_fill: usize,
    /// Ring capacity in bytes.
    pub buffer_size: usize,
    /// Last error message, for the UI to display.
    pub error: Option<String>,

    pub file_changed: bool,
    pub metadata_changed: bool,
    pub status_changed: bool,
    pub position_changed: bool,
    pub buffer_fill_changed: bool,
    pub volume_changed: bool,
}

impl PlayerInfo {
    fn new(volume: Option<(u32, u32)>, buffer_size: usize) -> Self {
        let (vol_left, vol_right) = volume.unwrap_or((0, 0));
        PlayerInfo {
            filename: String::new(),
            metadata: String::new(),
            status: Status::Stopped,
            pos: 0,
            cont: true,
            vol_left,
            vol_right,
            buffer_fill: 0,
            buffer_size,
            error: None,
            file_changed: false,
            metadata_changed: false,
            status_changed: false,
            position_changed: false,
            buffer_fill_changed: false,
            volume_changed: false,
        }
    }

    /// Reset all dirty flags, typically after the UI redrew.
    pub fn clear_changed(&mut self) {
        self.file_changed = false;
        self.metadata_changed = false;
        self.status_changed = false;
        self.position_changed = false;
        self.buffer_fill_changed = false;
        self.volume_changed = false;
    }
}

/// Track selection callbacks consulted on end of stream and for the
/// next/prev commands. The embedder composes these from the play queue and
/// the library (queue head first, then the library order).
pub struct PlayerCallbacks {
    pub get_next: Box<dyn FnMut() -> Option<Arc<TrackInfo>> + Send>,
    pub get_prev: Box<dyn FnMut() -> Option<Arc<TrackInfo>> + Send>,
}

struct ConsumerState {
    op: OutputLayer,
    /// Format of the PCM currently entering the ring. Updated by the
    /// producer only across a drained ring.
    in_sf: Option<SampleFormat>,
    /// Bytes the device accepted since `pos_base`.
    consumed: u64,
    /// Track position at the last open or seek, seconds.
    pos_base: f64,
}

struct Shared {
    ring: Buffer,
    info: Mutex<PlayerInfo>,
    consumer: Mutex<ConsumerState>,
    exit: AtomicBool,
}

impl Shared {
    fn status(&self) -> Status {
        self.info.lock().unwrap().status
    }

    fn set_status(&self, status: Status) {
        let mut info = self.info.lock().unwrap();
        if info.status != status {
            info.status = status;
            info.status_changed = true;
        }
    }

    fn set_pos(&self, pos: u32) {
        let mut info = self.info.lock().unwrap();
        if info.pos != pos {
            info.pos = pos;
            info.position_changed = true;
        }
    }

    fn set_error(&self, message: String) {
        error!("{}", message);
        self.info.lock().unwrap().error = Some(message);
    }

    fn update_buffer_fill(&self) {
        let fill = self.ring.filled_chunks() * CHUNK_SIZE;
        let size = self.ring.nr_chunks() * CHUNK_SIZE;
        let mut info = self.info.lock().unwrap();
        if info.buffer_fill != fill || info.buffer_size != size {
            info.buffer_fill = fill;
            info.buffer_size = size;
            info.buffer_fill_changed = true;
        }
    }
}

/// The playback engine. Dropping it stops both threads.
pub struct Player {
    tx: Sender<Command>,
    shared: Arc<Shared>,
    producer: Option<thread::JoinHandle<()>>,
    consumer: Option<thread::JoinHandle<()>>,
}

impl Player {
    /// Start the engine: initializes and auto-selects an output plugin and
    /// spawns the producer and consumer threads.
    pub fn new(
        registry: &'static InputRegistry,
        mut outputs: OutputLayer,
        callbacks: PlayerCallbacks,
    ) -> Player {
        outputs.init_all();
        if let Err(err) = outputs.select_any() {
            warn!("no usable output plugin: {}", err);
        }
        let volume = outputs.get_volume().ok();

        let nr_chunks = seconds_to_chunks(DEFAULT_BUFFER_SECONDS);
        let shared = Arc::new(Shared {
            ring: Buffer::new(nr_chunks),
            info: Mutex::new(PlayerInfo::new(volume, nr_chunks * CHUNK_SIZE)),
            consumer: Mutex::new(ConsumerState {
                op: outputs,
                in_sf: None,
                consumed: 0,
                pos_base: 0.0,
            }),
            exit: AtomicBool::new(false),
        });

        let (tx, rx) = unbounded();

        let producer_shared = shared.clone();
        let producer = thread::Builder::new()
            .name("player-producer".to_string())
            .spawn(move || {
                Producer { shared: producer_shared, rx, registry, callbacks, input: None }.run()
            })
            .expect("failed to spawn producer thread");

        let consumer_shared = shared.clone();
        let consumer = thread::Builder::new()
            .name("player-consumer".to_string())
            .spawn(move || consumer_loop(&consumer_shared))
            .expect("failed to spawn consumer thread");

        Player { tx, shared, producer: Some(producer), consumer: Some(consumer) }
    }

    pub fn send(&self, command: Command) {
        let _ = self.tx.send(command);
    }

    pub fn play_file(&self, filename: &str) {
        self.send(Command::Play(Some(filename.to_string())));
    }

    pub fn play(&self) {
        self.send(Command::Play(None));
    }

    pub fn set_file(&self, filename: &str) {
        self.send(Command::SetFile(filename.to_string()));
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn seek_relative(&self, seconds: f64) {
        self.send(Command::SeekRelative(seconds));
    }

    pub fn seek_absolute(&self, seconds: f64) {
        self.send(Command::SeekAbsolute(seconds));
    }

    pub fn next(&self) {
        self.send(Command::Next);
    }

    pub fn prev(&self) {
        self.send(Command::Prev);
    }

    pub fn set_volume(&self, left: u32, right: u32) {
        self.send(Command::SetVolume(left, right));
    }

    pub fn set_output(&self, name: &str) {
        self.send(Command::SetOutput(name.to_string()));
    }

    pub fn set_buffer_seconds(&self, seconds: u32) {
        self.send(Command::SetBufferSeconds(seconds));
    }

    pub fn set_cont(&self, cont: bool) {
        self.send(Command::SetCont(cont));
    }

    /// Snapshot the user-visible state.
    pub fn info(&self) -> PlayerInfo {
        self.shared.info.lock().unwrap().clone()
    }

    /// Clear the dirty flags after consuming a snapshot.
    pub fn clear_changed(&self) {
        self.shared.info.lock().unwrap().clear_changed();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shared.exit.store(true, Ordering::Relaxed);
        let _ = self.tx.send(Command::Exit);
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
    }
}

fn seconds_to_chunks(seconds: u32) -> usize {
    (seconds as usize * CANONICAL_SECOND_SIZE / CHUNK_SIZE).max(1)
}

// -- producer -----------------------------------------------------------

struct Producer {
    shared: Arc<Shared>,
    rx: Receiver<Command>,
    registry: &'static InputRegistry,
    callbacks: PlayerCallbacks,
    input: Option<Input>,
}

/// Result of a single attempt to feed the ring buffer from the input.
enum FillOutcome {
    /// No write lease was available; the consumer hasn't caught up yet.
    RingFull,
    /// The input produced an error while reading.
    Error(String),
    /// A lease was taken and the loop should continue immediately.
    Progressed,
}

impl Producer {
    fn run(mut self) {
        loop {
            if self.shared.exit.load(Ordering::Relaxed) {
                self.input = None;
                return;
            }

            // Drain pending commands at the loop boundary.
            loop {
                match self.rx.try_recv() {
                    Ok(command) => self.handle(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.shared.exit.store(true, Ordering::Relaxed);
                        return;
                    }
                }
            }

            let status = self.shared.status();
            let eof = self.input.as_ref().map(|input| input.is_eof());
            if status != Status::Playing || eof.is_none() {
                if !self.wait_for_command() {
                    return;
                }
                continue;
            }
            if eof == Some(true) {
                // Reached earlier, or resumed mid-drain after a pause.
                self.handle_eof();
                continue;
            }

            match self.fill_from_input() {
                FillOutcome::RingFull => {
                    // Ring full; wait for the consumer.
                    self.shared.update_buffer_fill();
                    if !self.wait_for_command() {
                        return;
                    }
                }
                FillOutcome::Error(message) => {
                    self.shared.set_error(message);
                    self.stop(true);
                }
                FillOutcome::Progressed => {}
            }
        }
    }

    /// Take one write lease and feed it from the current input, if any lease
    /// is available. Reports what happened so the caller can decide whether
    /// to wait for the consumer or report an error.
    fn fill_from_input(&mut self) -> FillOutcome {
        let mut lease = match self.shared.ring.get_write_lease() {
            Some(lease) => lease,
            None => return FillOutcome::RingFull,
        };
        let input = self.input.as_mut().expect("decoding without input");
        match input.read(lease.buf()) {
            Ok(0) => {
                // End of stream: flush the partial chunk. The next loop
                // iteration drains and advances.
                self.shared.ring.commit_write(lease, 0);
            }
            Ok(n) => {
                self.shared.ring.commit_write(lease, n);
                self.shared.update_buffer_fill();
                if let Some(metadata) = self.input.as_mut().unwrap().metadata_changed() {
                    let mut info = self.shared.info.lock().unwrap();
                    info.metadata = metadata;
                    info.metadata_changed = true;
                }
            }
            Err(err) if err.is_would_block() => {
                // Nothing arrived within the poll interval.
                drop(lease);
            }
            Err(err) => {
                drop(lease);
                let filename = self.current_filename();
                return FillOutcome::Error(format!("{}: {}", filename, err));
            }
        }
        FillOutcome::Progressed
    }

    /// Block up to the loop sleep for a command. Returns false on channel
    /// shutdown.
    fn wait_for_command(&mut self) -> bool {
        match self.rx.recv_timeout(LOOP_SLEEP) {
            Ok(command) => {
                self.handle(command);
                true
            }
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => {
                self.shared.exit.store(true, Ordering::Relaxed);
                false
            }
        }
    }

    fn current_filename(&self) -> String {
        self.shared.info.lock().unwrap().filename.clone()
    }

    fn handle(&mut self, command: Command) {
        debug!("command: {:?}", command);
        match command {
            Command::Play(Some(filename)) => {
                self.discard_buffered();
                if let Err(message) = self.open_and_start(&filename, true) {
                    self.shared.set_error(message);
                    self.stop(true);
                }
            }
            Command::Play(None) => match self.shared.status() {
                Status::Paused => {
                    let mut cs = self.shared.consumer.lock().unwrap();
                    let _ = cs.op.unpause();
                    drop(cs);
                    self.shared.set_status(Status::Playing);
                }
                Status::Stopped => {
                    let filename = self.current_filename();
                    if !filename.is_empty() {
                        if let Err(message) = self.open_and_start(&filename, true) {
                            self.shared.set_error(message);
                            self.stop(true);
                        }
                    }
                }
                Status::Playing => {}
            },
            Command::SetFile(filename) => {
                let play = self.shared.status() == Status::Playing;
                self.discard_buffered();
                if let Err(message) = self.open_and_start(&filename, play) {
                    self.shared.set_error(message);
                    self.stop(true);
                }
            }
            Command::Pause => match self.shared.status() {
                Status::Playing => {
                    let mut cs = self.shared.consumer.lock().unwrap();
                    let _ = cs.op.pause();
                    drop(cs);
                    self.shared.set_status(Status::Paused);
                }
                Status::Paused => {
                    let mut cs = self.shared.consumer.lock().unwrap();
                    let _ = cs.op.unpause();
                    drop(cs);
                    self.shared.set_status(Status::Playing);
                }
                Status::Stopped => {}
            },
            Command::Stop => self.stop(true),
            Command::SeekRelative(delta) => self.seek(None, delta),
            Command::SeekAbsolute(target) => self.seek(Some(target), 0.0),
            Command::Next => self.advance(true),
            Command::Prev => self.advance(false),
            Command::SetVolume(left, right) => {
                let mut cs = self.shared.consumer.lock().unwrap();
                match cs.op.set_volume(left, right) {
                    Ok(()) => {
                        let volume = cs.op.get_volume().unwrap_or((left, right));
                        drop(cs);
                        let mut info = self.shared.info.lock().unwrap();
                        if (info.vol_left, info.vol_right) != volume {
                            info.vol_left = volume.0;
                            info.vol_right = volume.1;
                            info.volume_changed = true;
                        }
                    }
                    Err(err) => {
                        drop(cs);
                        self.shared.set_error(format!("setting volume: {}", err));
                    }
                }
            }
            Command::SetOutput(name) => {
                if self.shared.status() != Status::Stopped {
                    self.shared.set_error("output plugin can only be changed while stopped".into());
                    return;
                }
                let mut cs = self.shared.consumer.lock().unwrap();
                if let Err(err) = cs.op.select(&name) {
                    drop(cs);
                    self.shared.set_error(format!("{}: {}", name, err));
                }
            }
            Command::SetBufferChunks(n) => self.resize_ring(n.max(1)),
            Command::SetBufferSeconds(seconds) => self.resize_ring(seconds_to_chunks(seconds)),
            Command::SetCont(value) => {
                self.shared.info.lock().unwrap().cont = value;
            }
            Command::ToggleCont => {
                let mut info = self.shared.info.lock().unwrap();
                info.cont = !info.cont;
            }
            Command::Exit => {
                self.shared.exit.store(true, Ordering::Relaxed);
            }
        }
    }

    fn resize_ring(&mut self, nr_chunks: usize) {
        if self.shared.status() != Status::Stopped {
            self.shared.set_error("buffer size can only be changed while stopped".into());
            return;
        }
        // The consumer is idle while stopped; still take its lock so the
        // resize cannot interleave with a straggling iteration.
        let cs = self.shared.consumer.lock().unwrap();
        self.shared.ring.resize(nr_chunks);
        drop(cs);
        self.shared.update_buffer_fill();
    }

    /// Open `filename` and make it the current track. With `play`, makes
    /// sure the output is open and running and sets the status; without,
    /// the previous status is kept.
    fn open_and_start(&mut self, filename: &str, play: bool) -> Result<(), String> {
        self.input = None;
        let input = match Input::open(filename, self.registry) {
            Ok(input) => input,
            Err(err) => return Err(format!("{}: {}", filename, err)),
        };
        let sf = input.sample_format();
        self.input = Some(input);

        {
            let mut cs = self.shared.consumer.lock().unwrap();
            cs.in_sf = Some(sf);
            cs.consumed = 0;
            cs.pos_base = 0.0;
            if play {
                if cs.op.is_open() {
                    let _ = cs.op.unpause();
                }
                else if let Err(err) = cs.op.open(sf) {
                    cs.in_sf = None;
                    drop(cs);
                    self.input = None;
                    return Err(format!("opening output: {}", err));
                }
            }
        }

        let mut info = self.shared.info.lock().unwrap();
        if info.filename != filename {
            info.filename = filename.to_string();
            info.file_changed = true;
        }
        if info.pos != 0 {
            info.pos = 0;
            info.position_changed = true;
        }
        if !info.metadata.is_empty() {
            info.metadata.clear();
            info.metadata_changed = true;
        }
        if play && info.status != Status::Playing {
            info.status = Status::Playing;
            info.status_changed = true;
        }
        Ok(())
    }

    /// Drop everything buffered ahead of a manual track switch or seek.
    /// Quiesces the consumer for the ring reset by holding its lock.
    fn discard_buffered(&mut self) {
        let mut cs = self.shared.consumer.lock().unwrap();
        if cs.op.is_open() {
            let _ = cs.op.drop_audio();
        }
        self.shared.ring.reset();
        cs.consumed = 0;
        cs.pos_base = 0.0;
    }

    fn advance(&mut self, forward: bool) {
        let next = if forward { (self.callbacks.get_next)() } else { (self.callbacks.get_prev)() };
        let ti = match next {
            Some(ti) => ti,
            None => return,
        };
        let play = self.shared.status() == Status::Playing;
        self.discard_buffered();
        if let Err(message) = self.open_and_start(&ti.filename, play) {
            self.shared.set_error(message);
            self.stop(true);
        }
    }

    fn seek(&mut self, absolute: Option<f64>, delta: f64) {
        if self.input.is_none() {
            return;
        }

        let current = {
            let cs = self.shared.consumer.lock().unwrap();
            let second_size = cs.in_sf.map(|sf| sf.second_size()).unwrap_or(0);
            if second_size == 0 {
                0.0
            }
            else {
                cs.pos_base + cs.consumed as f64 / second_size as f64
            }
        };
        let mut target = absolute.unwrap_or(current + delta).max(0.0);

        let input = self.input.as_mut().unwrap();
        if let Ok(duration) = input.duration() {
            if duration >= 0 {
                target = target.min(duration as f64);
            }
        }

        match input.seek(target) {
            Ok(()) => {
                let mut cs = self.shared.consumer.lock().unwrap();
                if cs.op.is_open() {
                    let _ = cs.op.drop_audio();
                }
                self.shared.ring.reset();
                cs.consumed = 0;
                cs.pos_base = target;
                drop(cs);
                self.shared.set_pos(target as u32);
                self.shared.update_buffer_fill();
            }
            Err(err) => {
                let filename = self.current_filename();
                self.shared.set_error(format!("seeking in {}: {}", filename, err));
            }
        }
    }

    /// End of stream. Flush was already committed; wait for the consumer
    /// to drain the ring, then move to the next track or finish. Commands
    /// stay responsive during the wait and abort the auto-advance when
    /// they change the state.
    fn handle_eof(&mut self) {
        loop {
            if self.shared.exit.load(Ordering::Relaxed) {
                return;
            }
            if self.shared.status() != Status::Playing {
                return;
            }
            // A seek or a new file clears the end-of-stream condition.
            if self.input.as_ref().map_or(true, |input| !input.is_eof()) {
                return;
            }
            if self.shared.ring.filled_chunks() == 0 {
                break;
            }
            self.shared.update_buffer_fill();
            if !self.wait_for_command() {
                return;
            }
        }

        let cont = self.shared.info.lock().unwrap().cont;
        let next = if cont { (self.callbacks.get_next)() } else { None };
        match next {
            Some(ti) => {
                debug!("end of stream, continuing with {}", ti.filename);
                if let Err(message) = self.open_and_start(&ti.filename, true) {
                    self.shared.set_error(message);
                    self.finish_stopped();
                }
            }
            None => self.finish_stopped(),
        }
    }

    /// Playback ran to its end: close everything but keep the reported
    /// position, which by now reflects the full track.
    fn finish_stopped(&mut self) {
        self.input = None;
        let mut cs = self.shared.consumer.lock().unwrap();
        if cs.op.is_open() {
            let _ = cs.op.close();
        }
        cs.in_sf = None;
        drop(cs);
        self.shared.set_status(Status::Stopped);
        self.shared.update_buffer_fill();
    }

    /// Hard stop: discard buffered audio, close input and output.
    fn stop(&mut self, reset_pos: bool) {
        self.input = None;
        let mut cs = self.shared.consumer.lock().unwrap();
        if cs.op.is_open() {
            let _ = cs.op.drop_audio();
            let _ = cs.op.close();
        }
        cs.in_sf = None;
        cs.consumed = 0;
        cs.pos_base = 0.0;
        self.shared.ring.reset();
        drop(cs);
        self.shared.set_status(Status::Stopped);
        if reset_pos {
            self.shared.set_pos(0);
        }
        self.shared.update_buffer_fill();
    }
}

// -- consumer -----------------------------------------------------------

fn consumer_loop(shared: &Shared) {
    loop {
        if shared.exit.load(Ordering::Relaxed) {
            let mut cs = shared.consumer.lock().unwrap();
            if cs.op.is_open() {
                let _ = cs.op.close();
            }
            return;
        }

        if shared.status() != Status::Playing {
            thread::sleep(LOOP_SLEEP);
            continue;
        }

        let mut cs = shared.consumer.lock().unwrap();
        if !cs.op.is_open() {
            drop(cs);
            thread::sleep(LOOP_SLEEP);
            continue;
        }

        let lease = match shared.ring.get_read_lease() {
            Some(lease) => lease,
            None => {
                drop(cs);
                thread::sleep(LOOP_SLEEP);
                continue;
            }
        };

        // Sample-format barrier: the producer only changes `in_sf` across a
        // drained ring, so everything in this lease is in `in_sf`.
        let in_sf = match cs.in_sf {
            Some(in_sf) => in_sf,
            None => {
                drop(lease);
                drop(cs);
                thread::sleep(LOOP_SLEEP);
                continue;
            }
        };
        if cs.op.sample_format() != Some(in_sf) {
            if let Err(err) = cs.op.set_sf(in_sf) {
                drop(lease);
                shared.set_error(format!("output: {}", err));
                shared.set_status(Status::Stopped);
                continue;
            }
        }

        let space = match cs.op.buffer_space() {
            Ok(space) => space,
            Err(err) => {
                drop(lease);
                shared.set_error(format!("output: {}", err));
                shared.set_status(Status::Stopped);
                continue;
            }
        };
        if space == 0 {
            drop(lease);
            drop(cs);
            thread::sleep(Duration::from_millis(20));
            continue;
        }

        let count = space.min(lease.len());
        match cs.op.write(&lease.bytes()[..count]) {
            Ok(written) => {
                shared.ring.commit_read(lease, written);
                cs.consumed += written as u64;
                let pos = cs.pos_base + cs.consumed as f64 / in_sf.second_size() as f64;
                drop(cs);
                shared.set_pos(pos as u32);
                shared.update_buffer_fill();
            }
            Err(err) if err.is_would_block() => {
                drop(lease);
                drop(cs);
                thread::sleep(LOOP_SLEEP);
            }
            Err(err) if err.is_underrun() => {
                // Underrun: re-prepare the device and retry once.
                warn!("output underrun: {}", err);
                let _ = cs.op.drop_audio();
                match cs.op.write(&lease.bytes()[..count]) {
                    Ok(written) => {
                        shared.ring.commit_read(lease, written);
                        cs.consumed += written as u64;
                    }
                    Err(err) => {
                        drop(lease);
                        shared.set_error(format!("output: {}", err));
                        shared.set_status(Status::Stopped);
                    }
                }
            }
            Err(err) => {
                drop(lease);
                shared.set_error(format!("output: {}", err));
                shared.set_status(Status::Stopped);
            }
        }
    }
}
