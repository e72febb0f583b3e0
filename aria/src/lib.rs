// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Aria
//!
//! Aria is the playback core of a terminal music player: a decoupled
//! producer/consumer audio pipeline, input and output plugin layers, and a
//! metadata-cache-backed track library.
//!
//! The building blocks live in their own crates and are re-exported here:
//!
//! * [`core`]: sample formats, the chunked ring buffer, PCM conversion,
//!   and the input/output plugin contracts.
//! * [`library`]: the track-info store, the persistent metadata cache,
//!   filter expressions, and the tree/shuffle/sorted views.
//! * [`player`]: the playback engine and its command channel.
//!
//! [`default`] provides registries with the bundled plugins pre-registered:
//! the WAV input plugin and the null output plugin. Embedders with their
//! own plugins can build an
//! [`InputRegistry`][core::input::InputRegistry] or
//! [`OutputLayer`][core::output::OutputLayer] from scratch instead.

pub use aria_core as core;
pub use aria_library as library;
pub use aria_player as player;

pub mod default {
    //! Registries preloaded with the plugins enabled at build time.

    use lazy_static::lazy_static;

    use aria_core::input::InputRegistry;
    use aria_core::output::OutputLayer;

    lazy_static! {
        static ref INPUTS: InputRegistry = {
            let mut registry = InputRegistry::new();
            registry.register(&aria_codec_wav::WAV_PLUGIN);
            registry
        };
    }

    /// The input registry with all bundled input plugins registered.
    pub fn get_inputs() -> &'static InputRegistry {
        &INPUTS
    }

    /// An output layer with all bundled output plugins registered, not yet
    /// initialized or selected.
    pub fn get_outputs() -> OutputLayer {
        let mut outputs = OutputLayer::new();
        outputs.register(&aria_output_null::NULL_PLUGIN);
        outputs
    }
}
