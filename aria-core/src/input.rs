// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `input` module opens audio sources and dispatches them to input
//! plugins.
//!
//! A plugin is selected by filename extension for local files and by MIME
//! type for HTTP streams. Remote playlists (`audio/x-scpls`, `audio/m3u`)
//! are expanded one level and the first entry is opened in their place.
//! Decoded PCM is normalized to signed 16-bit little-endian stereo whenever
//! the conversion is cheap; wider formats pass through with the decoder's
//! own sample format.

use std::fs;
use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::comment::Comments;
use crate::errors::{InputError, InputResult};
use crate::http;
use crate::pcm;
use crate::pcm::Conversion;
use crate::playlist;
use crate::sf::SampleFormat;

/// How long one socket read may wait for data before the producer gets
/// control back.
const READ_POLL: Duration = Duration::from_millis(50);

/// An icy metadata block is at most `16 * 255` bytes.
const ICY_MAX: usize = 16 * 255;

/// A decoder instance created by an input plugin for one open source.
///
/// `read` returns raw PCM bytes in the plugin's reported sample format;
/// zero means end of stream. `duration` is whole seconds, -1 when unknown.
pub trait InputDecoder: Send {
    fn sample_format(&self) -> SampleFormat;
    fn read(&mut self, buf: &mut [u8]) -> InputResult<usize>;
    fn seek(&mut self, seconds: f64) -> InputResult<()>;
    fn read_comments(&mut self) -> InputResult<Comments>;
    fn duration(&mut self) -> InputResult<i64>;
}

/// A declarative description of one input plugin: the extensions and MIME
/// types it claims and a factory to open a source with it.
#[derive(Copy, Clone)]
pub struct InputDescriptor {
    /// A short ASCII-only name identifying the plugin.
    pub name: &'static str,
    /// Case-insensitive filename extensions handled by the plugin.
    pub extensions: &'static [&'static str],
    /// Case-insensitive MIME types handled by the plugin.
    pub mime_types: &'static [&'static str],
    /// A factory function to open a source with this plugin.
    pub open: fn(InputSource) -> InputResult<Box<dyn InputDecoder>>,
}

/// The set of registered input plugins. Registration order does not matter;
/// lookups scan the extension and MIME tables.
#[derive(Default)]
pub struct InputRegistry {
    plugins: Vec<InputDescriptor>,
}

impl InputRegistry {
    pub fn new() -> Self {
        InputRegistry { plugins: Vec::new() }
    }

    pub fn register(&mut self, descriptor: &InputDescriptor) {
        self.plugins.push(*descriptor);
    }

    pub fn by_extension(&self, ext: &str) -> Option<&InputDescriptor> {
        self.plugins
            .iter()
            .find(|p| p.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    pub fn by_mime(&self, mime: &str) -> Option<&InputDescriptor> {
        self.plugins
            .iter()
            .find(|p| p.mime_types.iter().any(|m| m.eq_ignore_ascii_case(mime)))
    }

    /// All claimed extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut exts: Vec<&'static str> =
            self.plugins.iter().flat_map(|p| p.extensions.iter().copied()).collect();
        exts.sort_unstable();
        exts
    }
}

/// The filename extension after the last `.`, if any.
pub fn extension(filename: &str) -> Option<&str> {
    let name = filename.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    }
    else {
        Some(ext)
    }
}

#[derive(Default)]
struct IcyState {
    changed: bool,
    data: String,
}

enum SourceKind {
    File(fs::File),
    Remote(TcpStream),
    #[cfg(test)]
    Memory(io::Cursor<Vec<u8>>),
}

/// The byte source handed to a plugin: an owned file or socket. For remote
/// sources, reads strip inline Shoutcast metadata frames transparently and
/// never block longer than the 50 ms poll interval.
pub struct InputSource {
    filename: String,
    kind: SourceKind,
    remote: bool,
    metaint: u32,
    counter: u32,
    icy: Arc<Mutex<IcyState>>,
}

impl InputSource {
    fn from_file(filename: &str, file: fs::File) -> Self {
        InputSource {
            filename: filename.to_string(),
            kind: SourceKind::File(file),
            remote: false,
            metaint: 0,
            counter: 0,
            icy: Arc::new(Mutex::new(IcyState::default())),
        }
    }

    fn from_socket(filename: &str, stream: TcpStream, metaint: u32) -> Self {
        InputSource {
            filename: filename.to_string(),
            kind: SourceKind::Remote(stream),
            remote: true,
            metaint,
            counter: 0,
            icy: Arc::new(Mutex::new(IcyState::default())),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.kind {
            SourceKind::File(file) => file.read(buf),
            SourceKind::Remote(stream) => stream.read(buf),
            #[cfg(test)]
            SourceKind::Memory(cursor) => cursor.read(buf),
        }
    }

    /// Read exactly `buf.len()` bytes, riding out the short poll timeouts,
    /// bounded by the HTTP read timeout. Used only for metadata blocks.
    /// Returns false when the stream ends before the first byte.
    fn read_raw_exact(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let deadline = Instant::now() + http::READ_TIMEOUT;
        let mut off = 0;
        while off < buf.len() {
            match self.read_raw(&mut buf[off..]) {
                Ok(0) if off == 0 => return Ok(false),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => off += n,
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    if Instant::now() >= deadline {
                        return Err(io::ErrorKind::TimedOut.into());
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    /// Consume one metadata frame. Returns false when the stream ended
    /// cleanly on the frame boundary.
    fn read_icy_metadata(&mut self) -> io::Result<bool> {
        let mut len = [0u8; 1];
        if !self.read_raw_exact(&mut len)? {
            return Ok(false);
        }
        let len = usize::from(len[0]) * 16;
        if len == 0 {
            return Ok(true);
        }
        let mut block = vec![0u8; len.min(ICY_MAX)];
        if !self.read_raw_exact(&mut block)? {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        let text: String =
            String::from_utf8_lossy(&block).trim_end_matches('\0').to_string();
        debug!("stream metadata: {}", text);
        let mut state = self.icy.lock().unwrap();
        if state.data != text {
            state.data = text;
            state.changed = true;
        }
        Ok(true)
    }
}

impl Read for InputSource {
    /// Read PCM bytes. When the server framed the stream with
    /// `icy-metaint`, the metadata blocks are consumed here and never reach
    /// the decoder.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.metaint == 0 {
            return self.read_raw(buf);
        }
        if self.counter == self.metaint {
            if !self.read_icy_metadata()? {
                return Ok(0);
            }
            self.counter = 0;
        }
        let want = buf.len().min((self.metaint - self.counter) as usize);
        let n = self.read_raw(&mut buf[..want])?;
        self.counter += n as u32;
        Ok(n)
    }
}

impl Seek for InputSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.kind {
            SourceKind::File(file) => file.seek(pos),
            SourceKind::Remote(_) => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not seekable"))
            }
            #[cfg(test)]
            SourceKind::Memory(cursor) => cursor.seek(pos),
        }
    }
}

/// Extract the `StreamTitle` and `StreamUrl` values from a raw metadata
/// block (`StreamTitle='...';StreamUrl='...';`).
pub fn parse_stream_metadata(raw: &str) -> (Option<String>, Option<String>) {
    let mut title = None;
    let mut url = None;
    for item in raw.split(';') {
        let (key, val) = match item.split_once('=') {
            Some(pair) => pair,
            None => continue,
        };
        let val = val.trim_matches('\'');
        if key.eq_ignore_ascii_case("StreamTitle") {
            title = Some(val.to_string());
        }
        else if key.eq_ignore_ascii_case("StreamUrl") {
            url = Some(val.to_string());
        }
    }
    (title, url)
}

/// An open input: the selected plugin's decoder plus the conversion applied
/// to its output.
pub struct Input {
    filename: String,
    remote: bool,
    decoder: Box<dyn InputDecoder>,
    icy: Arc<Mutex<IcyState>>,
    conv: Conversion,
    /// Format of the bytes `read` returns (after conversion).
    sf: SampleFormat,
    eof: bool,
}

impl Input {
    /// Open `filename`, which is either a local path or an `http://` URL.
    pub fn open(filename: &str, registry: &InputRegistry) -> InputResult<Input> {
        let remote = http::is_url(filename);
        let (decoder, icy) = if remote {
            open_remote(filename, registry)?
        }
        else {
            open_file(filename, registry)?
        };

        let decoder_sf = decoder.sample_format();
        let conv = pcm::conversion(&decoder_sf);
        let sf = pcm::converted_format(&decoder_sf);
        debug!(
            "opened {}: {} (convert scale {}, in place {})",
            filename,
            decoder_sf,
            conv.scale,
            conv.convert_in_place.is_some(),
        );

        Ok(Input { filename: filename.to_string(), remote, decoder, icy, conv, sf, eof: false })
    }

    /// The sample format of the bytes `read` produces.
    pub fn sample_format(&self) -> SampleFormat {
        self.sf
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read converted PCM into `buf`. Returns 0 at end of stream (latched
    /// into `is_eof`); a would-block error means no data arrived within the
    /// poll interval and the caller should retry.
    pub fn read(&mut self, buf: &mut [u8]) -> InputResult<usize> {
        let n = if self.conv.scale > 1 {
            // 8-bit and 16-bit mono formats expand through a scratch buffer.
            let mut tmp = [0u8; 8 * 1024];
            let count = (buf.len() / self.conv.scale).min(tmp.len());
            let rc = self.decoder.read(&mut tmp[..count])?;
            if let Some(convert_in_place) = self.conv.convert_in_place {
                convert_in_place(&mut tmp[..rc]);
            }
            if let Some(convert) = self.conv.convert {
                convert(&mut buf[..rc * self.conv.scale], &tmp[..rc]);
            }
            rc * self.conv.scale
        }
        else {
            let rc = self.decoder.read(buf)?;
            if let Some(convert_in_place) = self.conv.convert_in_place {
                convert_in_place(&mut buf[..rc]);
            }
            rc
        };
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Seek to an absolute offset in seconds. Not supported for streams.
    pub fn seek(&mut self, seconds: f64) -> InputResult<()> {
        if self.remote {
            return Err(InputError::FunctionNotSupported);
        }
        self.decoder.seek(seconds)?;
        self.eof = false;
        Ok(())
    }

    pub fn read_comments(&mut self) -> InputResult<Comments> {
        self.decoder.read_comments()
    }

    pub fn duration(&mut self) -> InputResult<i64> {
        self.decoder.duration()
    }

    /// Take the stream metadata if it changed since the last call.
    pub fn metadata_changed(&mut self) -> Option<String> {
        let mut state = self.icy.lock().unwrap();
        if state.changed {
            state.changed = false;
            Some(state.data.clone())
        }
        else {
            None
        }
    }
}

fn open_file(
    filename: &str,
    registry: &InputRegistry,
) -> InputResult<(Box<dyn InputDecoder>, Arc<Mutex<IcyState>>)> {
    let ext = extension(filename).ok_or(InputError::UnrecognizedFileType)?;
    let descriptor = registry.by_extension(ext).ok_or(InputError::UnrecognizedFileType)?;
    let file = fs::File::open(filename)?;
    let source = InputSource::from_file(filename, file);
    let icy = source.icy.clone();
    let decoder = (descriptor.open)(source)?;
    Ok((decoder, icy))
}

fn do_http_get(uri: &str) -> InputResult<(TcpStream, http::Response)> {
    let uri = http::parse_uri(uri)?;
    let (stream, response) = http::get(&uri)?;
    if response.code != 200 {
        return Err(InputError::HttpStatus(response.code, response.reason));
    }
    Ok((stream, response))
}

fn setup_remote(
    filename: &str,
    response: &http::Response,
    stream: TcpStream,
    registry: &InputRegistry,
) -> InputResult<(Box<dyn InputDecoder>, Arc<Mutex<IcyState>>)> {
    let descriptor = match response.header("Content-Type") {
        Some(mime) => registry.by_mime(mime).or_else(|| {
            warn!("unsupported content type {}, assuming audio/mpeg", mime);
            registry.by_mime("audio/mpeg")
        }),
        None => {
            debug!("no content type, assuming audio/mpeg");
            registry.by_mime("audio/mpeg")
        }
    }
    .ok_or(InputError::FileFormat)?;

    let metaint = response
        .header("icy-metaint")
        .and_then(|val| val.trim().parse::<u32>().ok())
        .unwrap_or(0);
    if metaint > 0 {
        debug!("metaint: {}", metaint);
    }

    stream.set_read_timeout(Some(READ_POLL)).map_err(InputError::Io)?;
    let source = InputSource::from_socket(filename, stream, metaint);
    let icy = source.icy.clone();
    let decoder = (descriptor.open)(source)?;
    Ok((decoder, icy))
}

fn open_remote(
    filename: &str,
    registry: &InputRegistry,
) -> InputResult<(Box<dyn InputDecoder>, Arc<Mutex<IcyState>>)> {
    let (stream, response) = do_http_get(filename)?;

    match response.header("Content-Type") {
        Some(mime) if mime.eq_ignore_ascii_case("audio/x-scpls") => {
            let body = http::read_body(stream)?;
            let files = playlist::pls_files(&body).ok_or(InputError::HttpResponse)?;
            let target = files.first().ok_or(InputError::HttpResponse)?.clone();
            debug!("following playlist entry {}", target);
            let (stream, response) = do_http_get(&target)?;
            setup_remote(filename, &response, stream, registry)
        }
        Some(mime) if mime.eq_ignore_ascii_case("audio/m3u") => {
            let body = http::read_body(stream)?;
            let files = playlist::m3u_files(&body);
            let target = files.first().ok_or(InputError::HttpResponse)?.clone();
            debug!("following playlist entry {}", target);
            let (stream, response) = do_http_get(&target).map_err(|err| match err {
                // An entry that is not a URL at all is a bad playlist, not a
                // bad request.
                InputError::InvalidUri => InputError::HttpResponse,
                other => other,
            })?;
            setup_remote(filename, &response, stream, registry)
        }
        _ => setup_remote(filename, &response, stream, registry),
    }
}
