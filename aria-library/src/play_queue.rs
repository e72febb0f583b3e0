// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `play_queue` module holds tracks queued for playback ahead of the
//! library's next/prev order. The queue is consumed head-first and owns
//! its references independently of the library views.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::track_info::TrackInfo;

#[derive(Default)]
pub struct PlayQueue {
    inner: Mutex<VecDeque<Arc<TrackInfo>>>,
}

impl PlayQueue {
    pub fn new() -> Self {
        PlayQueue { inner: Mutex::new(VecDeque::new()) }
    }

    /// Append to the tail.
    pub fn append(&self, ti: Arc<TrackInfo>) {
        self.inner.lock().unwrap().push_back(ti);
    }

    /// Jump the queue: play this one next.
    pub fn prepend(&self, ti: Arc<TrackInfo>) {
        self.inner.lock().unwrap().push_front(ti);
    }

    /// Take the head; the played track leaves the queue.
    pub fn pop_head(&self) -> Option<Arc<TrackInfo>> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Remove the first queued occurrence of `filename`.
    pub fn remove(&self, filename: &str) -> bool {
        let mut queue = self.inner.lock().unwrap();
        match queue.iter().position(|ti| ti.filename == filename) {
            Some(idx) => {
                queue.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn for_each(&self, mut f: impl FnMut(&Arc<TrackInfo>)) {
        for ti in self.inner.lock().unwrap().iter() {
            f(ti);
        }
    }
}
