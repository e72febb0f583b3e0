// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `store` module is the process-wide track-info store: a mutex-guarded
//! map from absolute filename to shared [`TrackInfo`], backed by the
//! persistent cache.
//!
//! A miss probes the file through the input layer (duration plus comments)
//! unless the cache already holds a record with a matching mtime. URLs are
//! never probed; they are inserted with unknown duration and no comments.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use log::{debug, warn};

use aria_core::comment::Comments;
use aria_core::http;
use aria_core::input::{Input, InputRegistry};

use crate::db::Db;
use crate::track_info::TrackInfo;

struct Inner {
    map: HashMap<String, Arc<TrackInfo>>,
    cache: Option<Db>,
}

/// The process-wide track-info store.
pub struct TrackStore {
    inner: Mutex<Inner>,
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackStore {
    /// A store without a persistent cache.
    pub fn new() -> Self {
        TrackStore { inner: Mutex::new(Inner { map: HashMap::new(), cache: None }) }
    }

    /// A store backed by the cache files `<base>.idx` / `<base>.dat`. Cache
    /// load failures degrade to an uncached store.
    pub fn with_cache(base: &Path) -> Self {
        let mut cache = Db::new(base);
        let cache = match cache.load() {
            Ok(()) => Some(cache),
            Err(err) => {
                warn!("could not load track cache {}: {}", base.display(), err);
                None
            }
        };
        TrackStore { inner: Mutex::new(Inner { map: HashMap::new(), cache }) }
    }

    /// Get a reference for `filename`, creating the record on first
    /// encounter. Returns `None` when the file cannot be probed.
    pub fn get(&self, filename: &str, registry: &InputRegistry) -> Option<Arc<TrackInfo>> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(ti) = inner.map.get(filename) {
            return Some(ti.clone());
        }

        if http::is_url(filename) {
            let ti = TrackInfo::for_url(filename.to_string());
            inner.map.insert(filename.to_string(), ti.clone());
            return Some(ti);
        }

        let mtime = file_mtime(filename);
        if let Some(cache) = &mut inner.cache {
            match cache.query(filename) {
                Ok(Some(data)) => match decode_entry(filename, &data) {
                    Some(ti) if ti.mtime == mtime && mtime != -1 => {
                        let ti = Arc::new(ti);
                        inner.map.insert(filename.to_string(), ti.clone());
                        return Some(ti);
                    }
                    _ => {
                        // Stale or undecodable record.
                        cache.remove(filename);
                    }
                },
                Ok(None) => {}
                Err(err) => warn!("cache query failed for {}: {}", filename, err),
            }
        }

        let (duration, comments) = match probe(filename, registry) {
            Ok(probed) => probed,
            Err(err) => {
                debug!("could not probe {}: {}", filename, err);
                return None;
            }
        };
        let ti = TrackInfo::new(filename.to_string(), comments, duration, mtime);
        if let Some(cache) = &mut inner.cache {
            if let Err(err) = cache.insert(filename.to_string(), encode_entry(&ti)) {
                warn!("cache insert failed for {}: {}", filename, err);
            }
        }
        inner.map.insert(filename.to_string(), ti.clone());
        Some(ti)
    }

    /// Drop the store's reference; other holders keep theirs.
    pub fn remove(&self, filename: &str) {
        self.inner.lock().unwrap().map.remove(filename);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every record. Iteration order is undefined.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<TrackInfo>)) {
        let inner = self.inner.lock().unwrap();
        for ti in inner.map.values() {
            f(ti);
        }
    }

    /// Flush the persistent cache. Records stay available in memory.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cache) = inner.cache.take() {
            if let Err(err) = cache.close() {
                warn!("could not write track cache: {}", err);
            }
        }
    }
}

fn probe(filename: &str, registry: &InputRegistry) -> aria_core::errors::InputResult<(i64, Comments)> {
    let mut input = Input::open(filename, registry)?;
    let duration = input.duration()?;
    let comments = input.read_comments()?;
    Ok((duration, comments))
}

fn file_mtime(filename: &str) -> i64 {
    std::fs::metadata(filename)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
        .map(|since| since.as_secs() as i64)
        .unwrap_or(-1)
}

/// Cache record: `mtime:u32`, `duration:u32`, then `key\0value\0` pairs,
/// integers big-endian.
fn encode_entry(ti: &TrackInfo) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(ti.mtime as u32).to_be_bytes());
    data.extend_from_slice(&(ti.duration as u32).to_be_bytes());
    for (key, val) in ti.comments.iter() {
        data.extend_from_slice(key.as_bytes());
        data.push(0);
        data.extend_from_slice(val.as_bytes());
        data.push(0);
    }
    data
}

fn decode_entry(filename: &str, data: &[u8]) -> Option<TrackInfo> {
    if data.len() < 8 {
        return None;
    }
    let mtime = u32::from_be_bytes(data[0..4].try_into().ok()?) as i32 as i64;
    let duration = u32::from_be_bytes(data[4..8].try_into().ok()?) as i32 as i64;

    let mut strings = Vec::new();
    let rest = &data[8..];
    if !rest.is_empty() {
        if *rest.last()? != 0 {
            return None;
        }
        for chunk in rest[..rest.len() - 1].split(|&b| b == 0) {
            strings.push(String::from_utf8(chunk.to_vec()).ok()?);
        }
        if strings.len() % 2 != 0 {
            return None;
        }
    }

    let mut comments = Comments::new();
    for pair in strings.chunks(2) {
        comments.add(&pair[0], pair[1].clone());
    }
    Some(TrackInfo { filename: filename.to_string(), comments, duration, mtime })
}
