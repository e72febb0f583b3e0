// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `playlist` module parses `.pls` and `.m3u` playlist contents, from
//! disk or from an HTTP response body.

use std::fs;
use std::io;
use std::path::Path;

/// Playlists are recognized by filename extension alone. A file with one of
/// these extensions is treated as a playlist no matter what it contains, and
/// a URL with one of these extensions is expanded rather than decoded.
pub fn is_playlist_filename(filename: &str) -> bool {
    let ext = match filename.rsplit('/').next().and_then(|name| name.rsplit_once('.')) {
        Some((_, ext)) => ext,
        None => return false,
    };
    ext.eq_ignore_ascii_case("m3u") || ext.eq_ignore_ascii_case("pls") || ext.eq_ignore_ascii_case("pl")
}

/// Parse `[playlist]` INI contents, returning the `FileN=` values in order.
/// Returns `None` when the contents are not a PLS playlist.
pub fn pls_files(contents: &str) -> Option<Vec<String>> {
    let mut lines = contents.lines().map(str::trim_end).filter(|line| !line.is_empty());

    match lines.next() {
        Some(first) if first.len() >= 10 && first[..10].eq_ignore_ascii_case("[playlist]") => {}
        _ => return None,
    }

    let mut files = Vec::new();
    for line in lines {
        // FileN=..., TitleN=..., LengthN=..., NumberOfEntries=...
        let (key, val) = line.split_once('=')?;
        if key.len() >= 4 && key[..4].eq_ignore_ascii_case("file") {
            files.push(val.to_string());
        }
    }
    Some(files)
}

/// Split M3U contents into entries: one path or URL per line, `\r` stripped,
/// empty lines and `#` comment lines ignored.
pub fn m3u_files(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Write entries as a plain playlist: one absolute filename or URL per
/// line, UTF-8. This is also the library serialisation format.
pub fn save<'a>(path: &Path, entries: impl IntoIterator<Item = &'a str>) -> io::Result<()> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(entry);
        out.push('\n');
    }
    fs::write(path, out)
}

/// Load a playlist file from disk, dispatching on its extension.
pub fn load(path: &Path) -> io::Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    let ext = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("pls") {
        pls_files(&contents)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "not a PLS playlist"))
    }
    else {
        Ok(m3u_files(&contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_playlist_extensions() {
        assert!(is_playlist_filename("/music/list.m3u"));
        assert!(is_playlist_filename("/music/list.PLS"));
        assert!(is_playlist_filename("/music/list.pl"));
        assert!(!is_playlist_filename("/music/song.mp3"));
        assert!(!is_playlist_filename("/music/noext"));
        assert!(is_playlist_filename("http://h:8000/stream.pls"));
    }

    #[test]
    fn parses_pls() {
        let contents = "[playlist]\nNumberOfEntries=2\nFile1=http://h:80/s.mp3\nTitle1=One\nFile2=/x/y.wav\n";
        let files = pls_files(contents).unwrap();
        assert_eq!(files, vec!["http://h:80/s.mp3".to_string(), "/x/y.wav".to_string()]);
    }

    #[test]
    fn rejects_non_pls() {
        assert!(pls_files("File1=x\n").is_none());
        assert!(pls_files("").is_none());
    }

    #[test]
    fn parses_m3u() {
        let contents = "#EXTM3U\r\n/a/b.wav\r\n\r\nhttp://h/s.mp3\n";
        assert_eq!(m3u_files(contents), vec!["/a/b.wav".to_string(), "http://h/s.mp3".to_string()]);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("aria-pl-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("lib.pl");
        save(&path, ["/m/one.wav", "http://h/s.mp3"]).unwrap();
        assert_eq!(
            load(&path).unwrap(),
            vec!["/m/one.wav".to_string(), "http://h/s.mp3".to_string()]
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
