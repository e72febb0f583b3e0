// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `db` module is the on-disk key-value store behind the track cache.
//!
//! Two files: `<base>.idx` holds the sorted entry table and is rebuildable,
//! `<base>.dat` holds append-only payloads. Inserts first land in a bounded
//! in-memory queue; the queue is flushed to the data file and merged into
//! the sorted index when it fills up or when the store is closed. All
//! integers on disk are big-endian. A corrupt index is treated as empty.

use std::fs;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::warn;

/// Inserts queued in memory before a flush.
const INSERT_QUEUE_SIZE: usize = 128;

struct Entry {
    data_pos: u32,
    data_size: u32,
    key: String,
}

struct QueuedEntry {
    key: String,
    data: Vec<u8>,
}

/// The store. `load` must be called before queries.
pub struct Db {
    idx_path: PathBuf,
    dat_path: PathBuf,
    /// Always sorted by key.
    entries: Vec<Entry>,
    queue: Vec<QueuedEntry>,
    dat: Option<fs::File>,
    index_dirty: bool,
}

impl Db {
    pub fn new(base: &Path) -> Db {
        let mut idx_path = base.as_os_str().to_owned();
        idx_path.push(".idx");
        let mut dat_path = base.as_os_str().to_owned();
        dat_path.push(".dat");
        Db {
            idx_path: PathBuf::from(idx_path),
            dat_path: PathBuf::from(dat_path),
            entries: Vec::new(),
            queue: Vec::new(),
            dat: None,
            index_dirty: false,
        }
    }

    /// Load the index and open the data file, creating it if needed.
    pub fn load(&mut self) -> io::Result<()> {
        match load_index(&self.idx_path) {
            Ok(entries) => self.entries = entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!("corrupt cache index {}, starting empty", self.idx_path.display());
                self.entries.clear();
                self.index_dirty = true;
            }
            Err(err) => return Err(err),
        }
        self.dat = Some(
            fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&self.dat_path)?,
        );
        Ok(())
    }

    /// Look up `key`, checking the insert queue before the index.
    pub fn query(&mut self, key: &str) -> io::Result<Option<Vec<u8>>> {
        if let Some(queued) = self.queue.iter().find(|q| q.key == key) {
            return Ok(Some(queued.data.clone()));
        }

        let idx = match self.entries.binary_search_by(|e| e.key.as_str().cmp(key)) {
            Ok(idx) => idx,
            Err(_) => return Ok(None),
        };
        let entry = &self.entries[idx];
        let dat = self.dat.as_mut().expect("cache queried before load");
        dat.seek(SeekFrom::Start(u64::from(entry.data_pos)))?;
        let mut data = vec![0u8; entry.data_size as usize];
        dat.read_exact(&mut data)?;
        Ok(Some(data))
    }

    /// Queue an insert, flushing the queue first if it is full.
    pub fn insert(&mut self, key: String, data: Vec<u8>) -> io::Result<()> {
        if self.queue.len() == INSERT_QUEUE_SIZE {
            self.flush_queue()?;
        }
        self.queue.push(QueuedEntry { key, data });
        Ok(())
    }

    /// Remove `key` from the index or the insert queue.
    pub fn remove(&mut self, key: &str) -> bool {
        if let Ok(idx) = self.entries.binary_search_by(|e| e.key.as_str().cmp(key)) {
            self.entries.remove(idx);
            self.index_dirty = true;
            return true;
        }
        if let Some(idx) = self.queue.iter().position(|q| q.key == key) {
            self.queue.remove(idx);
            return true;
        }
        false
    }

    /// Flush pending inserts and write the index back if it changed.
    pub fn close(mut self) -> io::Result<()> {
        if !self.queue.is_empty() {
            self.flush_queue()?;
        }
        self.dat = None;
        if self.index_dirty {
            self.save_index()?;
        }
        Ok(())
    }

    fn flush_queue(&mut self) -> io::Result<()> {
        let dat = self.dat.as_mut().expect("cache flushed before load");
        let mut pos = dat.seek(SeekFrom::End(0))?;
        for queued in self.queue.drain(..) {
            dat.write_all(&queued.data)?;
            self.entries.push(Entry {
                data_pos: pos as u32,
                data_size: queued.data.len() as u32,
                key: queued.key,
            });
            pos += queued.data.len() as u64;
        }
        self.entries.sort_by(|a, b| a.key.cmp(&b.key));
        self.index_dirty = true;
        Ok(())
    }

    fn save_index(&mut self) -> io::Result<()> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.data_pos.to_be_bytes());
            out.extend_from_slice(&entry.data_size.to_be_bytes());
            out.extend_from_slice(&(entry.key.len() as u32).to_be_bytes());
            out.extend_from_slice(entry.key.as_bytes());
        }
        fs::write(&self.idx_path, out)?;
        self.index_dirty = false;
        Ok(())
    }
}

fn load_index(path: &Path) -> io::Result<Vec<Entry>> {
    let buf = fs::read(path)?;
    let corrupt = || io::Error::new(io::ErrorKind::InvalidData, "corrupt index");

    let mut pos = 0usize;
    let mut read_u32 = |pos: &mut usize| -> io::Result<u32> {
        let bytes: [u8; 4] =
            buf.get(*pos..*pos + 4).and_then(|b| b.try_into().ok()).ok_or_else(corrupt)?;
        *pos += 4;
        Ok(u32::from_be_bytes(bytes))
    };

    let nr_entries = read_u32(&mut pos)?;
    let mut entries = Vec::with_capacity(nr_entries.min(1 << 20) as usize);
    for _ in 0..nr_entries {
        let data_pos = read_u32(&mut pos)?;
        let data_size = read_u32(&mut pos)?;
        let key_size = read_u32(&mut pos)? as usize;
        let key_bytes = buf.get(pos..pos + key_size).ok_or_else(corrupt)?;
        pos += key_size;
        let key = String::from_utf8(key_bytes.to_vec()).map_err(|_| corrupt())?;
        entries.push(Entry { data_pos, data_size, key });
    }
    if pos != buf.len() {
        return Err(corrupt());
    }
    // The index is written sorted; don't trust it.
    if !entries.windows(2).all(|w| w[0].key <= w[1].key) {
        return Err(corrupt());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("cache")
    }

    #[test]
    fn queue_is_visible_before_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        db.insert("alpha".to_string(), vec![1, 2, 3]).unwrap();
        assert_eq!(db.query("alpha").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(db.query("beta").unwrap(), None);
    }

    #[test]
    fn close_persists_and_reload_finds_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        db.insert("zeta".to_string(), vec![9]).unwrap();
        db.insert("alpha".to_string(), vec![1]).unwrap();
        db.close().unwrap();

        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        assert_eq!(db.query("alpha").unwrap(), Some(vec![1]));
        assert_eq!(db.query("zeta").unwrap(), Some(vec![9]));
        assert_eq!(db.query("gamma").unwrap(), None);
    }

    #[test]
    fn queue_overflow_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        for i in 0..INSERT_QUEUE_SIZE + 10 {
            db.insert(format!("key{:04}", i), vec![i as u8]).unwrap();
        }
        assert_eq!(db.query("key0000").unwrap(), Some(vec![0]));
        assert_eq!(db.query("key0130").unwrap(), Some(vec![130]));
        db.close().unwrap();
    }

    #[test]
    fn remove_hits_index_and_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        db.insert("a".to_string(), vec![1]).unwrap();
        db.close().unwrap();

        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        db.insert("b".to_string(), vec![2]).unwrap();
        assert!(db.remove("a"));
        assert!(db.remove("b"));
        assert!(!db.remove("c"));
        assert_eq!(db.query("a").unwrap(), None);
        assert_eq!(db.query("b").unwrap(), None);
    }

    #[test]
    fn corrupt_index_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let idx = dir.path().join("cache.idx");
        fs::write(&idx, b"\xff\xff\xff\xffgarbage").unwrap();

        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        assert_eq!(db.query("anything").unwrap(), None);
        db.insert("fresh".to_string(), vec![5]).unwrap();
        db.close().unwrap();

        let mut db = Db::new(&base(&dir));
        db.load().unwrap();
        assert_eq!(db.query("fresh").unwrap(), Some(vec![5]));
    }
}
