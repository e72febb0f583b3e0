// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `buffer` module implements the chunked ring buffer between the
//! decode (producer) and output (consumer) threads.
//!
//! The ring is a fixed sequence of chunks plus a read index and a write
//! index. A chunk is owned by exactly one side at a time: a chunk marked
//! `filled` may only be touched by the consumer, any other chunk only by the
//! producer. The mutex serializes index and flag updates and the handoff of
//! a chunk's payload; it is never held while payload bytes are being copied.
//! Ownership handoff is expressed as a *lease*: taking a lease moves the
//! chunk's boxed payload out under the lock, the payload is filled or
//! drained lock-free, and committing the lease moves it back and updates the
//! indices. A lease dropped without commit returns the chunk untouched.

use std::sync::Mutex;

/// Size of one chunk's payload.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A chunk whose free space falls below this after a commit is handed to the
/// consumer immediately instead of waiting for the residue to fill.
const FILL_THRESHOLD: usize = 1024;

struct Chunk {
    /// Payload; `None` while leased out to one side.
    data: Option<Box<[u8]>>,
    /// Index of the first filled byte.
    l: usize,
    /// Index of the last filled byte plus one; `h - l` bytes are available.
    h: usize,
    /// Filled chunks belong to the consumer, all others to the producer.
    filled: bool,
}

impl Chunk {
    fn new() -> Self {
        Chunk { data: Some(vec![0u8; CHUNK_SIZE].into_boxed_slice()), l: 0, h: 0, filled: false }
    }
}

struct Ring {
    chunks: Vec<Chunk>,
    ridx: usize,
    widx: usize,
}

impl Ring {
    fn with_chunks(nr_chunks: usize) -> Self {
        assert!(nr_chunks >= 1);
        Ring { chunks: (0..nr_chunks).map(|_| Chunk::new()).collect(), ridx: 0, widx: 0 }
    }
}

/// The producer/consumer chunk ring.
pub struct Buffer {
    ring: Mutex<Ring>,
}

/// A write region: the chunk at the write index, leased to the producer.
/// Commit with `count == 0` while the chunk holds data to flush it to the
/// consumer early.
pub struct WriteLease<'a> {
    buffer: &'a Buffer,
    data: Option<Box<[u8]>>,
    start: usize,
}

impl WriteLease<'_> {
    /// Free bytes available for writing.
    pub fn len(&self) -> usize {
        CHUNK_SIZE - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The writable region.
    pub fn buf(&mut self) -> &mut [u8] {
        let start = self.start;
        &mut self.data.as_mut().expect("lease already committed")[start..]
    }
}

impl Drop for WriteLease<'_> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            let mut ring = self.buffer.ring.lock().unwrap();
            let widx = ring.widx;
            ring.chunks[widx].data = Some(data);
        }
    }
}

/// A read region: the filled chunk at the read index, leased to the
/// consumer. Dropping the lease without committing leaves the chunk filled.
pub struct ReadLease<'a> {
    buffer: &'a Buffer,
    data: Option<Box<[u8]>>,
    l: usize,
    h: usize,
}

impl ReadLease<'_> {
    /// Filled bytes available for reading.
    pub fn len(&self) -> usize {
        self.h - self.l
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The readable region.
    pub fn bytes(&self) -> &[u8] {
        &self.data.as_ref().expect("lease already committed")[self.l..self.h]
    }
}

impl Drop for ReadLease<'_> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            let mut ring = self.buffer.ring.lock().unwrap();
            let ridx = ring.ridx;
            ring.chunks[ridx].data = Some(data);
        }
    }
}

impl Buffer {
    pub fn new(nr_chunks: usize) -> Self {
        Buffer { ring: Mutex::new(Ring::with_chunks(nr_chunks)) }
    }

    /// Lease the chunk at the write index. Returns `None` when that chunk is
    /// filled, i.e. the ring is full.
    pub fn get_write_lease(&self) -> Option<WriteLease<'_>> {
        let mut ring = self.ring.lock().unwrap();
        let widx = ring.widx;
        let chunk = &mut ring.chunks[widx];
        if chunk.filled {
            return None;
        }
        let data = chunk.data.take().expect("write chunk already leased");
        Some(WriteLease { buffer: self, data: Some(data), start: chunk.h })
    }

    /// Return a write lease with `count` new bytes. The chunk is handed to
    /// the consumer when its remaining free space drops below the fill
    /// threshold, or when `count` is zero and the chunk holds data (an
    /// explicit flush at end of stream or before a format change).
    pub fn commit_write(&self, mut lease: WriteLease<'_>, count: usize) {
        let data = lease.data.take().expect("lease already committed");
        let mut ring = self.ring.lock().unwrap();
        let widx = ring.widx;
        let nr_chunks = ring.chunks.len();
        let chunk = &mut ring.chunks[widx];
        debug_assert!(!chunk.filled);
        debug_assert_eq!(chunk.h, lease.start);
        assert!(count <= CHUNK_SIZE - chunk.h);
        chunk.data = Some(data);
        chunk.h += count;

        if CHUNK_SIZE - chunk.h < FILL_THRESHOLD || (count == 0 && chunk.h > 0) {
            chunk.filled = true;
            ring.widx = (widx + 1) % nr_chunks;
        }
    }

    /// Lease the chunk at the read index. Returns `None` when that chunk is
    /// not filled, i.e. the ring is empty.
    pub fn get_read_lease(&self) -> Option<ReadLease<'_>> {
        let mut ring = self.ring.lock().unwrap();
        let ridx = ring.ridx;
        let chunk = &mut ring.chunks[ridx];
        if !chunk.filled {
            return None;
        }
        let data = chunk.data.take().expect("read chunk already leased");
        Some(ReadLease { buffer: self, data: Some(data), l: chunk.l, h: chunk.h })
    }

    /// Return a read lease with `count` bytes consumed. A fully drained
    /// chunk is recycled and handed back to the producer.
    pub fn commit_read(&self, mut lease: ReadLease<'_>, count: usize) {
        assert!(count <= lease.len());
        let data = lease.data.take().expect("lease already committed");
        let mut ring = self.ring.lock().unwrap();
        let ridx = ring.ridx;
        let nr_chunks = ring.chunks.len();
        let chunk = &mut ring.chunks[ridx];
        debug_assert!(chunk.filled);
        chunk.data = Some(data);
        chunk.l += count;
        if chunk.l == chunk.h {
            chunk.l = 0;
            chunk.h = 0;
            chunk.filled = false;
            ring.ridx = (ridx + 1) % nr_chunks;
        }
    }

    /// Set the buffer empty. Producer-side operation; the caller must make
    /// sure the consumer holds no lease.
    pub fn reset(&self) {
        let mut ring = self.ring.lock().unwrap();
        ring.ridx = 0;
        ring.widx = 0;
        for chunk in &mut ring.chunks {
            debug_assert!(chunk.data.is_some(), "reset with a lease outstanding");
            chunk.l = 0;
            chunk.h = 0;
            chunk.filled = false;
        }
    }

    /// Replace the ring with `nr_chunks` fresh chunks, discarding contents.
    pub fn resize(&self, nr_chunks: usize) {
        let mut ring = self.ring.lock().unwrap();
        *ring = Ring::with_chunks(nr_chunks);
    }

    pub fn filled_chunks(&self) -> usize {
        let ring = self.ring.lock().unwrap();
        if ring.ridx < ring.widx {
            ring.widx - ring.ridx
        }
        else if ring.ridx > ring.widx {
            ring.chunks.len() - ring.ridx + ring.widx
        }
        else if ring.chunks[ring.ridx].filled {
            ring.chunks.len()
        }
        else {
            0
        }
    }

    pub fn free_chunks(&self) -> usize {
        let ring = self.ring.lock().unwrap();
        if ring.ridx < ring.widx {
            ring.chunks.len() - ring.widx + ring.ridx
        }
        else if ring.ridx > ring.widx {
            ring.ridx - ring.widx
        }
        else if ring.chunks[ring.ridx].filled {
            0
        }
        else {
            ring.chunks.len()
        }
    }

    pub fn nr_chunks(&self) -> usize {
        self.ring.lock().unwrap().chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_all(buf: &Buffer, bytes: &[u8]) {
        let mut off = 0;
        while off < bytes.len() {
            let mut lease = buf.get_write_lease().expect("ring full");
            let n = lease.len().min(bytes.len() - off);
            lease.buf()[..n].copy_from_slice(&bytes[off..off + n]);
            buf.commit_write(lease, n);
            off += n;
        }
    }

    fn drain_all(buf: &Buffer) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(lease) = buf.get_read_lease() {
            out.extend_from_slice(lease.bytes());
            let n = lease.len();
            buf.commit_read(lease, n);
        }
        out
    }

    #[test]
    fn bytes_come_out_in_order_regardless_of_chunking() {
        let buf = Buffer::new(4);
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

        // Interleave odd-sized writes with drains so the ring wraps.
        let mut off = 0;
        let mut out = Vec::new();
        let sizes = [1usize, 7, 4096, 65000, 333, 1023, 1025];
        let mut si = 0;
        while off < data.len() {
            let want = sizes[si % sizes.len()].min(data.len() - off);
            si += 1;
            match buf.get_write_lease() {
                Some(mut lease) => {
                    let n = lease.len().min(want);
                    lease.buf()[..n].copy_from_slice(&data[off..off + n]);
                    buf.commit_write(lease, n);
                    off += n;
                }
                None => out.extend(drain_all(&buf)),
            }
        }
        // Flush the partial tail chunk.
        if let Some(lease) = buf.get_write_lease() {
            buf.commit_write(lease, 0);
        }
        out.extend(drain_all(&buf));
        assert_eq!(out, data);
    }

    #[test]
    fn filled_plus_free_is_invariant() {
        let buf = Buffer::new(5);
        assert_eq!(buf.filled_chunks() + buf.free_chunks(), 5);

        write_all(&buf, &[0xaa; CHUNK_SIZE * 2]);
        assert_eq!(buf.filled_chunks() + buf.free_chunks(), 5);
        assert_eq!(buf.filled_chunks(), 2);

        let lease = buf.get_read_lease().unwrap();
        let n = lease.len();
        buf.commit_read(lease, n);
        assert_eq!(buf.filled_chunks() + buf.free_chunks(), 5);
    }

    #[test]
    fn reset_empties_the_ring() {
        let buf = Buffer::new(3);
        write_all(&buf, &[1; CHUNK_SIZE + 17]);
        buf.reset();
        assert_eq!(buf.filled_chunks(), 0);
        assert_eq!(buf.free_chunks(), 3);
        assert!(buf.get_read_lease().is_none());
    }

    #[test]
    fn commit_near_capacity_advances_write_index() {
        let buf = Buffer::new(2);
        let mut lease = buf.get_write_lease().unwrap();
        let n = CHUNK_SIZE - 1023;
        lease.buf()[..n].fill(7);
        // 1023 bytes remain, which is below the threshold.
        buf.commit_write(lease, n);
        assert_eq!(buf.filled_chunks(), 1);

        let lease = buf.get_read_lease().unwrap();
        assert_eq!(lease.len(), n);
        buf.commit_read(lease, n);
    }

    #[test]
    fn zero_commit_flushes_partial_chunk() {
        let buf = Buffer::new(2);
        let mut lease = buf.get_write_lease().unwrap();
        lease.buf()[..10].fill(3);
        buf.commit_write(lease, 10);
        assert_eq!(buf.filled_chunks(), 0);

        let lease = buf.get_write_lease().unwrap();
        buf.commit_write(lease, 0);
        assert_eq!(buf.filled_chunks(), 1);
        let lease = buf.get_read_lease().unwrap();
        assert_eq!(lease.bytes(), &[3; 10]);
        buf.commit_read(lease, 10);
        assert_eq!(buf.filled_chunks(), 0);
    }

    #[test]
    fn zero_commit_on_empty_chunk_is_a_no_op() {
        let buf = Buffer::new(2);
        let lease = buf.get_write_lease().unwrap();
        buf.commit_write(lease, 0);
        assert_eq!(buf.filled_chunks(), 0);
    }

    #[test]
    fn full_ring_refuses_write_leases() {
        let buf = Buffer::new(2);
        write_all(&buf, &[0; CHUNK_SIZE * 2]);
        assert!(buf.get_write_lease().is_none());
        assert_eq!(buf.free_chunks(), 0);
    }

    #[test]
    fn partial_reads_keep_the_chunk() {
        let buf = Buffer::new(2);
        write_all(&buf, &[9; CHUNK_SIZE]);
        let lease = buf.get_read_lease().unwrap();
        buf.commit_read(lease, 100);
        let lease = buf.get_read_lease().unwrap();
        assert_eq!(lease.len(), CHUNK_SIZE - 100);
        let n = lease.len();
        buf.commit_read(lease, n);
        assert_eq!(buf.filled_chunks(), 0);
    }

    #[test]
    fn dropped_leases_return_the_chunk_untouched() {
        let buf = Buffer::new(2);
        {
            let mut lease = buf.get_write_lease().unwrap();
            lease.buf()[..4].fill(1);
            // Dropped without commit: nothing written.
        }
        assert_eq!(buf.filled_chunks(), 0);
        let lease = buf.get_write_lease().unwrap();
        assert_eq!(lease.len(), CHUNK_SIZE);
        buf.commit_write(lease, 0);

        write_all(&buf, &[5; CHUNK_SIZE]);
        {
            let lease = buf.get_read_lease().unwrap();
            assert!(!lease.is_empty());
            // Dropped without commit: chunk stays filled.
        }
        assert_eq!(buf.filled_chunks(), 1);
    }

    #[test]
    fn resize_changes_capacity() {
        let buf = Buffer::new(2);
        write_all(&buf, &[0; CHUNK_SIZE]);
        buf.resize(8);
        assert_eq!(buf.nr_chunks(), 8);
        assert_eq!(buf.free_chunks(), 8);
    }
}
