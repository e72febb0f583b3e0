// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line demo player: loads the given files, playlists, and URLs
//! into a library and plays them through.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::{App, Arg};
use log::{error, warn};

use aria::core::input::parse_stream_metadata;
use aria::core::playlist;
use aria::core::worker::Worker;
use aria::library::library::{Library, PlayMode};
use aria::library::play_queue::PlayQueue;
use aria::library::store::TrackStore;
use aria::player::{Player, PlayerCallbacks, Status};

/// Worker job type for library scans.
const JOB_ADD: u32 = 1;

fn main() {
    pretty_env_logger::init();

    let matches = App::new("aria-play")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play audio files, playlists, and streams")
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .help("Output plugin to use instead of the best available"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .takes_value(true)
                .help("Playback volume, 0-100"),
        )
        .arg(
            Arg::new("shuffle")
                .long("shuffle")
                .help("Play the library in shuffled order"),
        )
        .arg(Arg::new("repeat").long("repeat").help("Wrap around at the end of the library"))
        .arg(
            Arg::new("list-plugins")
                .long("list-plugins")
                .help("List input and output plugins and exit"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Files, playlists, or URLs to play")
                .multiple_values(true)
                .required_unless_present("list-plugins"),
        )
        .get_matches();

    if matches.is_present("list-plugins") {
        list_plugins();
        return;
    }

    let store = Arc::new(match cache_base() {
        Some(base) => TrackStore::with_cache(&base),
        None => TrackStore::new(),
    });
    let library = Arc::new(Mutex::new(Library::new()));
    let queue = Arc::new(PlayQueue::new());

    {
        let mut lib = library.lock().unwrap();
        if matches.is_present("shuffle") {
            lib.set_play_mode(PlayMode::Shuffle);
        }
        lib.set_repeat(matches.is_present("repeat"));
        lib.set_sort_keys(
            ["artist", "date", "album", "discnumber", "tracknumber", "title"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
    }

    // Expand playlists up front, then let the worker resolve the tracks in
    // the background the way library scans run.
    let inputs: Vec<String> =
        matches.values_of("INPUT").unwrap().flat_map(expand_playlist).collect();
    if inputs.is_empty() {
        error!("nothing to play");
        std::process::exit(1);
    }

    let worker = Worker::start();
    for filename in &inputs {
        let filename = filename.clone();
        let store = store.clone();
        let library = library.clone();
        worker.add_job(JOB_ADD, move |ctx| {
            if ctx.cancelling() {
                return;
            }
            match store.get(&filename, aria::default::get_inputs()) {
                Some(ti) => library.lock().unwrap().add_track(ti),
                None => warn!("skipping {}", filename),
            }
        });
    }

    let player = {
        let next_lib = library.clone();
        let next_queue = queue.clone();
        let prev_lib = library.clone();
        let callbacks = PlayerCallbacks {
            get_next: Box::new(move || {
                next_queue.pop_head().or_else(|| next_lib.lock().unwrap().next())
            }),
            get_prev: Box::new(move || prev_lib.lock().unwrap().prev()),
        };
        Player::new(aria::default::get_inputs(), aria::default::get_outputs(), callbacks)
    };

    if let Some(name) = matches.value_of("output") {
        player.set_output(name);
    }
    if let Some(volume) = matches.value_of("volume") {
        match volume.parse::<u32>() {
            Ok(volume) if volume <= 100 => player.set_volume(volume, volume),
            _ => warn!("ignoring bad volume '{}'", volume),
        }
    }

    // Wait for the scan, then start with the first track.
    while !worker.is_idle() {
        thread::sleep(Duration::from_millis(50));
    }
    let first = library.lock().unwrap().next();
    let first = match first {
        Some(ti) => ti,
        None => {
            error!("none of the inputs could be opened");
            std::process::exit(1);
        }
    };
    player.play_file(&first.filename);

    status_loop(&player);

    store.close();
}

fn list_plugins() {
    print!("Input file types:");
    for ext in aria::default::get_inputs().supported_extensions() {
        print!(" {}", ext);
    }
    println!();
    println!("Output plugins:");
    for name in aria::default::get_outputs().plugin_names() {
        println!("  {}", name);
    }
}

/// Print state transitions until playback finishes.
fn status_loop(player: &Player) {
    let mut started = false;
    loop {
        let info = player.info();
        player.clear_changed();

        if let Some(message) = &info.error {
            error!("{}", message);
        }
        if info.file_changed {
            println!("+ {}", info.filename);
        }
        if info.metadata_changed && !info.metadata.is_empty() {
            let (title, _url) = parse_stream_metadata(&info.metadata);
            if let Some(title) = title {
                println!("  > {}", title);
            }
        }

        match info.status {
            Status::Playing | Status::Paused => started = true,
            Status::Stopped => {
                // Done, or the open failed outright.
                if started || info.error.is_some() {
                    return;
                }
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
}

fn expand_playlist(input: &str) -> Vec<String> {
    let path = Path::new(input);
    if path.is_file() && playlist::is_playlist_filename(input) {
        match playlist::load(path) {
            Ok(entries) => return entries,
            Err(err) => {
                warn!("could not load playlist {}: {}", input, err);
                return Vec::new();
            }
        }
    }
    vec![input.to_string()]
}

fn cache_base() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let dir = Path::new(&home).join(".aria");
    if let Err(err) = std::fs::create_dir_all(&dir) {
        warn!("could not create {}: {}", dir.display(), err);
        return None;
    }
    Some(dir.join("cache"))
}
