// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `track_info` module defines the cached metadata record for one file
//! or URL.

use std::sync::Arc;

use aria_core::comment::Comments;
use aria_core::http;

/// Metadata for one track, keyed by its absolute filename or URL. Shared
/// across the store, the library views, and the play queue through an
/// `Arc`; the last owner frees it.
#[derive(Debug)]
pub struct TrackInfo {
    /// Absolute filename, or URL for streams.
    pub filename: String,
    pub comments: Comments,
    /// Duration in whole seconds, -1 when unknown.
    pub duration: i64,
    /// Filesystem mtime in seconds since the epoch, -1 for URLs.
    pub mtime: i64,
}

impl TrackInfo {
    pub fn new(filename: String, comments: Comments, duration: i64, mtime: i64) -> Arc<Self> {
        Arc::new(TrackInfo { filename, comments, duration, mtime })
    }

    /// A stream entry: no comments, unknown duration, no mtime.
    pub fn for_url(url: String) -> Arc<Self> {
        Arc::new(TrackInfo { filename: url, comments: Comments::new(), duration: -1, mtime: -1 })
    }

    pub fn is_url(&self) -> bool {
        http::is_url(&self.filename)
    }

    /// True when the track has any of the tags the tree view is built from.
    pub fn has_tag(&self) -> bool {
        self.comments.get("artist").is_some()
            || self.comments.get("album").is_some()
            || self.comments.get("title").is_some()
    }

    /// Word search over artist, album, and title; falls back to the
    /// basename for untagged tracks.
    pub fn matches(&self, text: &str) -> bool {
        let artist = self.comments.get("artist");
        let album = self.comments.get("album");
        let title = self.comments.get("title");

        let mut matched = false;
        for word in text.split_whitespace() {
            matched = true;
            if artist.is_some() || album.is_some() || title.is_some() {
                let hit = [artist, album, title]
                    .iter()
                    .flatten()
                    .any(|field| contains_ci(field, word));
                if !hit {
                    return false;
                }
            }
            else {
                let basename = self.filename.rsplit('/').next().unwrap_or(&self.filename);
                if !contains_ci(basename, word) {
                    return false;
                }
            }
        }
        matched
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
