// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `library` module keeps three synchronized projections of the
//! filtered track set and selects the next and previous track under the
//! play modes.
//!
//! Projections: a tree of artists (case-insensitive name order) holding
//! albums (`(date, name)` order) holding tracks (`(disc, number,
//! filename)` order); a shuffle list (random permutation, new tracks
//! inserted at uniform random positions); and a sorted list ordered by the
//! user's sort keys. Every unfiltered track appears in all three exactly
//! once. Tracks failing the filter stay in `entries` but leave the
//! projections.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::expr::Expr;
use crate::track_info::TrackInfo;

pub type TrackId = usize;

/// Which projection drives next/prev.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlayMode {
    Tree,
    Shuffle,
    Sorted,
}

/// How far next/prev may advance before stopping or wrapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaylistMode {
    All,
    Artist,
    Album,
}

struct LibTrack {
    info: Arc<TrackInfo>,
    title: Option<String>,
    disc: i64,
    num: i64,
}

pub struct Album {
    name: Option<String>,
    date: i64,
    tracks: Vec<TrackId>,
}

impl Album {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

pub struct Artist {
    name: Option<String>,
    /// Whether the tree view shows this artist's albums.
    pub expanded: bool,
    albums: Vec<Album>,
}

impl Artist {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }
}

/// The library model.
pub struct Library {
    /// Every track added, whether or not the filter admits it.
    entries: HashMap<String, Arc<TrackInfo>>,
    /// Projected tracks only.
    tracks: HashMap<TrackId, LibTrack>,
    next_id: TrackId,
    artists: Vec<Artist>,
    shuffle: Vec<TrackId>,
    sorted: Vec<TrackId>,
    sort_keys: Vec<String>,
    filter: Option<Expr>,
    play_mode: PlayMode,
    playlist_mode: PlaylistMode,
    repeat: bool,
    cur: Option<TrackId>,
    /// Sum of known durations of projected tracks.
    total_time: i64,
    rng: SmallRng,
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl Library {
    pub fn new() -> Self {
        Library {
            entries: HashMap::new(),
            tracks: HashMap::new(),
            next_id: 0,
            artists: Vec::new(),
            shuffle: Vec::new(),
            sorted: Vec::new(),
            sort_keys: Vec::new(),
            filter: None,
            play_mode: PlayMode::Tree,
            playlist_mode: PlaylistMode::All,
            repeat: false,
            cur: None,
            total_time: 0,
            rng: SmallRng::from_os_rng(),
        }
    }

    // -- adding and removing tracks ------------------------------------

    /// Add a track. A filename already present is ignored; a track failing
    /// the filter is kept in the entry set but not projected.
    pub fn add_track(&mut self, ti: Arc<TrackInfo>) {
        if self.entries.contains_key(&ti.filename) {
            return;
        }
        self.entries.insert(ti.filename.clone(), ti.clone());
        if self.filter_admits(&ti) {
            self.project_track(ti);
            self.sorted_insert_last();
        }
    }

    /// Remove one track everywhere, including the entry set.
    pub fn remove_track(&mut self, filename: &str) {
        self.entries.remove(filename);
        if let Some(id) = self.find_id(filename) {
            self.unproject_track(id);
        }
    }

    /// Remove an artist subtree (matched case-insensitively), including
    /// its tracks' entries. The current track survives if it belongs to
    /// another artist.
    pub fn remove_artist(&mut self, name: &str) {
        let ai = match self.artists.iter().position(|a| casecmp_opt(a.name.as_deref(), Some(name)) == Ordering::Equal) {
            Some(ai) => ai,
            None => return,
        };
        let ids: Vec<TrackId> =
            self.artists[ai].albums.iter().flat_map(|album| album.tracks.iter().copied()).collect();
        for id in ids {
            let filename = self.tracks[&id].info.filename.clone();
            self.entries.remove(&filename);
            self.unproject_track(id);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.clear_views();
    }

    // -- accessors ------------------------------------------------------

    /// Number of projected tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of tracks in the entry set, filtered or not.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn total_time(&self) -> i64 {
        self.total_time
    }

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn current(&self) -> Option<Arc<TrackInfo>> {
        self.cur.map(|id| self.tracks[&id].info.clone())
    }

    /// The sorted projection, in order.
    pub fn sorted_tracks(&self) -> Vec<Arc<TrackInfo>> {
        self.sorted.iter().map(|id| self.tracks[id].info.clone()).collect()
    }

    /// The shuffle projection, in order.
    pub fn shuffle_tracks(&self) -> Vec<Arc<TrackInfo>> {
        self.shuffle.iter().map(|id| self.tracks[id].info.clone()).collect()
    }

    /// Visit every projected track in sorted order.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<TrackInfo>)) {
        for id in &self.sorted {
            f(&self.tracks[id].info);
        }
    }

    // -- modes ----------------------------------------------------------

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.play_mode = mode;
    }

    pub fn playlist_mode(&self) -> PlaylistMode {
        self.playlist_mode
    }

    pub fn set_playlist_mode(&mut self, mode: PlaylistMode) {
        self.playlist_mode = mode;
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn toggle_repeat(&mut self) {
        self.repeat = !self.repeat;
    }

    pub fn toggle_expand_artist(&mut self, name: &str) {
        if let Some(artist) = self
            .artists
            .iter_mut()
            .find(|a| casecmp_opt(a.name.as_deref(), Some(name)) == Ordering::Equal)
        {
            artist.expanded = !artist.expanded;
        }
    }

    // -- selection ------------------------------------------------------

    /// Make the track with `filename` current, as if selected in a view.
    pub fn select(&mut self, filename: &str) -> Option<Arc<TrackInfo>> {
        let id = self.find_id(filename)?;
        self.cur = Some(id);
        Some(self.tracks[&id].info.clone())
    }

    /// Advance to the next track of the active projection and return it.
    pub fn next(&mut self) -> Option<Arc<TrackInfo>> {
        let next = match self.play_mode {
            PlayMode::Tree => self.next_tree(Direction::Forward),
            PlayMode::Shuffle => self.next_linear(&self.shuffle, Direction::Forward),
            PlayMode::Sorted => self.next_linear(&self.sorted, Direction::Forward),
        };
        if let Some(id) = next {
            self.cur = Some(id);
        }
        next.map(|id| self.tracks[&id].info.clone())
    }

    /// Step back to the previous track of the active projection.
    pub fn prev(&mut self) -> Option<Arc<TrackInfo>> {
        let prev = match self.play_mode {
            PlayMode::Tree => self.next_tree(Direction::Backward),
            PlayMode::Shuffle => self.next_linear(&self.shuffle, Direction::Backward),
            PlayMode::Sorted => self.next_linear(&self.sorted, Direction::Backward),
        };
        if let Some(id) = prev {
            self.cur = Some(id);
        }
        prev.map(|id| self.tracks[&id].info.clone())
    }

    // -- sorting, shuffling, filtering ---------------------------------

    /// Replace the sort key sequence and re-sort the sorted projection.
    pub fn set_sort_keys(&mut self, keys: Vec<String>) {
        self.sort_keys = keys;
        self.sort_sorted();
    }

    /// Rebuild the shuffle projection as a fresh permutation.
    pub fn reshuffle(&mut self) {
        let old = std::mem::take(&mut self.shuffle);
        for id in old {
            let pos = self.rng.random_range(0..=self.shuffle.len());
            self.shuffle.insert(pos, id);
        }
    }

    /// Replace the filter and re-project every entry, keeping the current
    /// track current when it survives the new filter.
    pub fn set_filter(&mut self, filter: Option<Expr>) {
        let cur_filename = self.current().map(|ti| ti.filename.clone());

        self.clear_views();
        self.filter = filter;

        let entries: Vec<Arc<TrackInfo>> = self.entries.values().cloned().collect();
        for ti in entries {
            if self.filter_admits(&ti) {
                self.project_track(ti);
            }
        }
        self.sort_sorted();

        if let Some(filename) = cur_filename {
            self.cur = self.find_id(&filename);
        }
    }

    // -- internals ------------------------------------------------------

    fn filter_admits(&self, ti: &TrackInfo) -> bool {
        match &self.filter {
            Some(filter) => filter.eval(ti),
            None => true,
        }
    }

    fn find_id(&self, filename: &str) -> Option<TrackId> {
        self.tracks
            .iter()
            .find(|(_, track)| track.info.filename == filename)
            .map(|(id, _)| *id)
    }

    fn clear_views(&mut self) {
        self.tracks.clear();
        self.artists.clear();
        self.shuffle.clear();
        self.sorted.clear();
        self.cur = None;
        self.total_time = 0;
    }

    /// Insert one admitted track into all three projections. The sorted
    /// projection is appended to; callers re-sort when done.
    fn project_track(&mut self, ti: Arc<TrackInfo>) {
        let id = self.next_id;
        self.next_id += 1;

        let track = LibTrack {
            title: ti.comments.get("title").map(str::to_string),
            disc: ti.comments.get_int("discnumber"),
            num: ti.comments.get_int("tracknumber"),
            info: ti,
        };
        if track.info.duration != -1 {
            self.total_time += track.info.duration;
        }
        self.tracks.insert(id, track);

        self.tree_add(id);

        let pos = self.rng.random_range(0..=self.shuffle.len());
        self.shuffle.insert(pos, id);

        self.sorted.push(id);
    }

    /// Remove one track from all three projections, collapsing empty
    /// albums and artists.
    fn unproject_track(&mut self, id: TrackId) {
        let track = match self.tracks.remove(&id) {
            Some(track) => track,
            None => return,
        };
        if track.info.duration != -1 {
            self.total_time -= track.info.duration;
        }

        'outer: for ai in 0..self.artists.len() {
            for bi in 0..self.artists[ai].albums.len() {
                let album = &mut self.artists[ai].albums[bi];
                if let Some(pos) = album.tracks.iter().position(|&t| t == id) {
                    album.tracks.remove(pos);
                    if album.tracks.is_empty() {
                        self.artists[ai].albums.remove(bi);
                        if self.artists[ai].albums.is_empty() {
                            self.artists.remove(ai);
                        }
                    }
                    break 'outer;
                }
            }
        }

        self.shuffle.retain(|&t| t != id);
        self.sorted.retain(|&t| t != id);
        if self.cur == Some(id) {
            self.cur = None;
        }
    }

    /// Insert into the tree, creating the artist and album as needed.
    fn tree_add(&mut self, id: TrackId) {
        let track = &self.tracks[&id];
        let ti = &track.info;
        let mut artist_name = ti.comments.get("artist").map(str::to_string);
        let mut album_name = ti.comments.get("album").map(str::to_string);
        if ti.is_url() && artist_name.is_none() && album_name.is_none() {
            artist_name = Some("<Stream>".to_string());
            album_name = Some("<Stream>".to_string());
        }
        let date = ti.comments.get_int("date");

        let ai = match self
            .artists
            .iter()
            .position(|a| casecmp_opt(a.name.as_deref(), artist_name.as_deref()) == Ordering::Equal)
        {
            Some(ai) => ai,
            None => {
                let pos = self
                    .artists
                    .iter()
                    .position(|a| casecmp_opt(artist_name.as_deref(), a.name.as_deref()) == Ordering::Less)
                    .unwrap_or(self.artists.len());
                self.artists
                    .insert(pos, Artist { name: artist_name, expanded: false, albums: Vec::new() });
                pos
            }
        };

        let artist = &mut self.artists[ai];
        let bi = match artist
            .albums
            .iter()
            .position(|b| casecmp_opt(b.name.as_deref(), album_name.as_deref()) == Ordering::Equal)
        {
            Some(bi) => bi,
            None => {
                let pos = artist
                    .albums
                    .iter()
                    .position(|b| match date.cmp(&b.date) {
                        Ordering::Less => true,
                        Ordering::Greater => false,
                        Ordering::Equal => {
                            casecmp_opt(album_name.as_deref(), b.name.as_deref()) == Ordering::Less
                        }
                    })
                    .unwrap_or(artist.albums.len());
                artist.albums.insert(pos, Album { name: album_name, date, tracks: Vec::new() });
                pos
            }
        };

        let album = &mut self.artists[ai].albums[bi];
        let pos = album
            .tracks
            .iter()
            .position(|&other| album_track_cmp(&self.tracks, id, other) == Ordering::Less)
            .unwrap_or(album.tracks.len());
        album.tracks.insert(pos, id);
    }

    fn sort_sorted(&mut self) {
        let tracks = &self.tracks;
        let keys = &self.sort_keys;
        self.sorted.sort_by(|&a, &b| sorted_view_cmp(tracks, keys, a, b));
    }

    /// Move the id `project_track` appended into its sorted position,
    /// after any equal keys.
    fn sorted_insert_last(&mut self) {
        let id = match self.sorted.pop() {
            Some(id) => id,
            None => return,
        };
        let tracks = &self.tracks;
        let keys = &self.sort_keys;
        let pos = self
            .sorted
            .partition_point(|&other| sorted_view_cmp(tracks, keys, other, id) != Ordering::Greater);
        self.sorted.insert(pos, id);
    }

    /// Coordinates of a projected track in the tree.
    fn coords(&self, id: TrackId) -> Option<(usize, usize, usize)> {
        for (ai, artist) in self.artists.iter().enumerate() {
            for (bi, album) in artist.albums.iter().enumerate() {
                if let Some(ti) = album.tracks.iter().position(|&t| t == id) {
                    return Some((ai, bi, ti));
                }
            }
        }
        None
    }

    fn first_track(&self) -> Option<TrackId> {
        self.artists.first()?.albums.first()?.tracks.first().copied()
    }

    fn last_track(&self) -> Option<TrackId> {
        self.artists.last()?.albums.last()?.tracks.last().copied()
    }

    fn next_tree(&self, direction: Direction) -> Option<TrackId> {
        let cur = match self.cur {
            Some(cur) => cur,
            None => return self.first_track(),
        };
        let (ai, bi, ti) = self.coords(cur)?;
        match direction {
            Direction::Forward => self.tree_forward(ai, bi, ti),
            Direction::Backward => self.tree_backward(ai, bi, ti),
        }
    }

    fn tree_forward(&self, ai: usize, bi: usize, ti: usize) -> Option<TrackId> {
        let artist = &self.artists[ai];
        let album = &artist.albums[bi];

        // Next track of the album.
        if ti + 1 < album.tracks.len() {
            return Some(album.tracks[ti + 1]);
        }

        if self.playlist_mode == PlaylistMode::Album {
            if !self.repeat {
                return None;
            }
            return album.tracks.first().copied();
        }

        // First track of the next album of the artist.
        if bi + 1 < artist.albums.len() {
            return artist.albums[bi + 1].tracks.first().copied();
        }

        if self.playlist_mode == PlaylistMode::Artist {
            if !self.repeat {
                return None;
            }
            return artist.albums.first()?.tracks.first().copied();
        }

        // First track of the first album of the next artist.
        if ai + 1 < self.artists.len() {
            return self.artists[ai + 1].albums.first()?.tracks.first().copied();
        }

        if !self.repeat {
            return None;
        }
        self.first_track()
    }

    fn tree_backward(&self, ai: usize, bi: usize, ti: usize) -> Option<TrackId> {
        let artist = &self.artists[ai];
        let album = &artist.albums[bi];

        if ti > 0 {
            return Some(album.tracks[ti - 1]);
        }

        if self.playlist_mode == PlaylistMode::Album {
            if !self.repeat {
                return None;
            }
            return album.tracks.last().copied();
        }

        if bi > 0 {
            return artist.albums[bi - 1].tracks.last().copied();
        }

        if self.playlist_mode == PlaylistMode::Artist {
            if !self.repeat {
                return None;
            }
            return artist.albums.last()?.tracks.last().copied();
        }

        if ai > 0 {
            return self.artists[ai - 1].albums.last()?.tracks.last().copied();
        }

        if !self.repeat {
            return None;
        }
        self.last_track()
    }

    /// Walk a linear projection, skipping tracks outside the playlist-mode
    /// scope, wrapping once when repeat is on.
    fn next_linear(&self, list: &[TrackId], direction: Direction) -> Option<TrackId> {
        let cur = match self.cur {
            Some(cur) => cur,
            None => return list.first().copied(),
        };
        let pos = list.iter().position(|&id| id == cur)?;
        let (cur_ai, cur_bi, _) = self.coords(cur)?;

        let candidates: Vec<TrackId> = match (direction, self.repeat) {
            (Direction::Forward, false) => list[pos + 1..].to_vec(),
            (Direction::Forward, true) => {
                list[pos + 1..].iter().chain(list[..=pos].iter()).copied().collect()
            }
            (Direction::Backward, false) => list[..pos].iter().rev().copied().collect(),
            (Direction::Backward, true) => {
                list[..pos].iter().rev().chain(list[pos..].iter().rev()).copied().collect()
            }
        };

        candidates.into_iter().find(|&id| {
            let (ai, bi, _) = match self.coords(id) {
                Some(coords) => coords,
                None => return false,
            };
            match self.playlist_mode {
                PlaylistMode::All => true,
                PlaylistMode::Artist => ai == cur_ai,
                PlaylistMode::Album => ai == cur_ai && bi == cur_bi,
            }
        })
    }
}

#[derive(Copy, Clone)]
enum Direction {
    Forward,
    Backward,
}

/// Case-insensitive compare with missing values first.
fn casecmp_opt(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Track order within an album: disc, then number, then filename when a
/// number is missing, then title.
fn album_track_cmp(tracks: &HashMap<TrackId, LibTrack>, a: TrackId, b: TrackId) -> Ordering {
    let a = &tracks[&a];
    let b = &tracks[&b];
    match a.disc.cmp(&b.disc) {
        Ordering::Equal => {}
        other => return other,
    }
    if a.num == -1 || b.num == -1 {
        // Can't sort by track number; fall back to the filename.
        return ascii_casecmp(&a.info.filename, &b.info.filename);
    }
    match a.num.cmp(&b.num) {
        Ordering::Equal => casecmp_opt(a.title.as_deref(), b.title.as_deref()),
        other => other,
    }
}

/// Sort-key comparison: left-to-right over the keys, numeric for
/// tracknumber and discnumber, filename compared as bytes, everything else
/// case-insensitively. A missing value sorts before a present one.
fn sorted_view_cmp(
    tracks: &HashMap<TrackId, LibTrack>,
    sort_keys: &[String],
    a: TrackId,
    b: TrackId,
) -> Ordering {
    let a = &tracks[&a];
    let b = &tracks[&b];
    for key in sort_keys {
        let res = match key.as_str() {
            "tracknumber" => a.num.cmp(&b.num),
            "discnumber" => a.disc.cmp(&b.disc),
            // Filenames are not necessarily UTF-8-meaningful; compare them
            // byte-wise ignoring ASCII case.
            "filename" => ascii_casecmp(&a.info.filename, &b.info.filename),
            key => casecmp_opt(a.info.comments.get(key), b.info.comments.get(key)),
        };
        if res != Ordering::Equal {
            return res;
        }
    }
    Ordering::Equal
}

fn ascii_casecmp(a: &str, b: &str) -> Ordering {
    a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
}
