// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote-open scenarios against a local single-shot HTTP server: MIME
//! dispatch, playlist expansion, status errors, and Shoutcast metadata
//! framing end to end.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use aria_core::errors::{InputError, InputResult};
use aria_core::input::{
    parse_stream_metadata, Input, InputDecoder, InputDescriptor, InputRegistry, InputSource,
};
use aria_core::sf::SampleFormat;

/// A raw-PCM test plugin: the body bytes are the decoded stream.
struct RawDecoder {
    source: InputSource,
    sf: SampleFormat,
}

impl InputDecoder for RawDecoder {
    fn sample_format(&self) -> SampleFormat {
        self.sf
    }

    fn read(&mut self, buf: &mut [u8]) -> InputResult<usize> {
        Ok(self.source.read(buf)?)
    }

    fn seek(&mut self, _seconds: f64) -> InputResult<()> {
        Err(InputError::FunctionNotSupported)
    }

    fn read_comments(&mut self) -> InputResult<aria_core::comment::Comments> {
        Ok(aria_core::comment::Comments::new())
    }

    fn duration(&mut self) -> InputResult<i64> {
        Ok(-1)
    }
}

fn open_raw(source: InputSource) -> InputResult<Box<dyn InputDecoder>> {
    Ok(Box::new(RawDecoder { source, sf: SampleFormat::s16_le(44100) }))
}

static RAW_PLUGIN: InputDescriptor = InputDescriptor {
    name: "rawtest",
    extensions: &["rawtest"],
    mime_types: &["audio/x-rawtest", "audio/mpeg"],
    open: open_raw,
};

fn registry() -> InputRegistry {
    let mut registry = InputRegistry::new();
    registry.register(&RAW_PLUGIN);
    registry
}

/// Serve exactly one connection with a canned response, in the background.
fn serve_once(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        // Read the request head before answering.
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            match stream.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => request.push(byte[0]),
                Err(_) => break,
            }
        }
        let _ = stream.write_all(&response);
    });
    format!("http://127.0.0.1:{}", port)
}

fn response(content_type: &str, extra_headers: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: {}\r\n{}\r\n",
        content_type, extra_headers
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

fn read_to_end(input: &mut Input) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) if err.is_would_block() => continue,
            Err(err) => panic!("read failed: {}", err),
        }
    }
    out
}

#[test]
fn mime_dispatch_selects_the_plugin() {
    let pcm = vec![7u8; 1024];
    let base = serve_once(response("audio/x-rawtest", "", &pcm));
    let registry = registry();

    let mut input = Input::open(&format!("{}/stream", base), &registry).unwrap();
    assert!(input.is_remote());
    assert_eq!(input.sample_format(), SampleFormat::s16_le(44100));
    assert_eq!(read_to_end(&mut input), pcm);
    assert!(input.is_eof());
}

#[test]
fn unknown_mime_falls_back_to_audio_mpeg() {
    let base = serve_once(response("application/octet-stream", "", &[1, 2, 3, 4]));
    let registry = registry();
    // The raw plugin also claims audio/mpeg, so the fallback lands on it.
    let mut input = Input::open(&format!("{}/s", base), &registry).unwrap();
    assert_eq!(read_to_end(&mut input), vec![1, 2, 3, 4]);
}

#[test]
fn pls_playlist_redirects_to_its_first_entry() {
    let pcm = vec![9u8; 256];
    let target = serve_once(response("audio/x-rawtest", "", &pcm));
    let playlist = format!("[playlist]\nNumberOfEntries=1\nFile1={}/s.mp3\nTitle1=x\n", target);
    let base = serve_once(response("audio/x-scpls", "", playlist.as_bytes()));
    let registry = registry();

    let mut input = Input::open(&format!("{}/list.pls", base), &registry).unwrap();
    assert_eq!(input.sample_format(), SampleFormat::s16_le(44100));
    assert_eq!(read_to_end(&mut input), pcm);
}

#[test]
fn m3u_playlist_redirects_to_its_first_entry() {
    let pcm = vec![4u8; 64];
    let target = serve_once(response("audio/x-rawtest", "", &pcm));
    let playlist = format!("# a comment\r\n\r\n{}/one\r\n{}/two\r\n", target, target);
    let base = serve_once(response("audio/m3u", "", playlist.as_bytes()));
    let registry = registry();

    let mut input = Input::open(&format!("{}/list", base), &registry).unwrap();
    assert_eq!(read_to_end(&mut input), pcm);
}

#[test]
fn http_error_status_carries_code_and_reason() {
    let base = serve_once(b"HTTP/1.0 404 Not Found\r\n\r\n".to_vec());
    let registry = registry();

    match Input::open(&format!("{}/gone", base), &registry) {
        Err(InputError::HttpStatus(code, reason)) => {
            assert_eq!(code, 404);
            assert_eq!(reason, "Not Found");
        }
        other => panic!("expected HttpStatus, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn icy_metadata_is_stripped_and_reported() {
    // metaint 8: two PCM blocks with a metadata frame between them.
    let mut body = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
    let mut meta = b"StreamTitle='Night Flight';".to_vec();
    meta.resize(32, 0);
    body.push(2);
    body.extend_from_slice(&meta);
    body.extend_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

    let base = serve_once(response("audio/x-rawtest", "icy-metaint: 8\r\n", &body));
    let registry = registry();

    let mut input = Input::open(&format!("{}/radio", base), &registry).unwrap();
    let pcm = read_to_end(&mut input);
    assert_eq!(pcm, (1u8..=16).collect::<Vec<u8>>());

    let metadata = input.metadata_changed().expect("no metadata reported");
    let (title, url) = parse_stream_metadata(&metadata);
    assert_eq!(title.as_deref(), Some("Night Flight"));
    assert_eq!(url, None);
    // Reported once only.
    assert!(input.metadata_changed().is_none());
}

#[test]
fn unparsable_urls_are_invalid() {
    let registry = registry();
    assert!(matches!(
        Input::open("http://:99/x", &registry).map(|_| ()),
        Err(InputError::InvalidUri)
    ));
}
