// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `comment` module defines the key/value tag list attached to a track.

/// An unordered, duplicate-free mapping of lowercase comment keys (artist,
/// album, title, date, tracknumber, discnumber, genre, ...) to UTF-8 values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comments(Vec<(String, String)>);

impl Comments {
    pub fn new() -> Self {
        Comments(Vec::new())
    }

    /// Build a comment list from raw key/value pairs. Keys are lowercased;
    /// a key seen more than once keeps its first value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut comments = Comments::new();
        for (key, val) in pairs {
            comments.add(key.as_ref(), val.into());
        }
        comments
    }

    /// Add a single comment. The key is lowercased; duplicates are dropped.
    pub fn add(&mut self, key: &str, val: String) {
        let key = key.to_ascii_lowercase();
        if self.0.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.0.push((key, val));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Parse the value of `key` as a non-negative integer. Missing keys and
    /// unparseable values yield -1, like the rest of the numeric track
    /// metadata.
    pub fn get_int(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(val) => {
                // "tracknumber" is commonly "3/12"; take the leading digits.
                let digits: &str = val
                    .split(|c: char| !c.is_ascii_digit())
                    .next()
                    .unwrap_or("");
                digits.parse().unwrap_or(-1)
            }
            None => -1,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_lowercased_and_deduplicated() {
        let c = Comments::from_pairs(vec![
            ("Artist", "Ester"),
            ("ARTIST", "Other"),
            ("Title", "Song"),
        ]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("artist"), Some("Ester"));
        assert_eq!(c.get("title"), Some("Song"));
    }

    #[test]
    fn get_int_handles_slashed_numbers() {
        let c = Comments::from_pairs(vec![("tracknumber", "3/12"), ("date", "1997")]);
        assert_eq!(c.get_int("tracknumber"), 3);
        assert_eq!(c.get_int("date"), 1997);
        assert_eq!(c.get_int("discnumber"), -1);
    }
}
