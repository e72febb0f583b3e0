// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RIFF/WAVE input plugin: uncompressed integer PCM only. Serves as the
//! reference implementation of the input plugin contract.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use aria_core::comment::Comments;
use aria_core::errors::{InputError, InputResult};
use aria_core::input::{InputDecoder, InputDescriptor, InputSource};
use aria_core::sf::SampleFormat;

/// The WAV input plugin descriptor.
pub static WAV_PLUGIN: InputDescriptor = InputDescriptor {
    name: "wav",
    extensions: &["wav", "wave"],
    mime_types: &["audio/wav", "audio/x-wav", "audio/wave"],
    open: open,
};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

struct WavDecoder {
    source: InputSource,
    sf: SampleFormat,
    data_start: u64,
    data_len: u64,
    /// Byte offset of the next read within the data chunk.
    pos: u64,
    comments: Comments,
}

fn open(source: InputSource) -> InputResult<Box<dyn InputDecoder>> {
    let mut decoder = parse(source)?;
    decoder.source.seek(SeekFrom::Start(decoder.data_start))?;
    debug!(
        "{}: {} ({} data bytes)",
        decoder.source.filename(),
        decoder.sf,
        decoder.data_len
    );
    Ok(Box::new(decoder))
}

fn read_exact(source: &mut InputSource, buf: &mut [u8]) -> InputResult<()> {
    source.read_exact(buf).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => InputError::FileFormat,
        _ => InputError::Io(err),
    })
}

fn read_u16(source: &mut InputSource) -> InputResult<u16> {
    let mut buf = [0u8; 2];
    read_exact(source, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(source: &mut InputSource) -> InputResult<u32> {
    let mut buf = [0u8; 4];
    read_exact(source, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_fourcc(source: &mut InputSource) -> InputResult<[u8; 4]> {
    let mut buf = [0u8; 4];
    read_exact(source, &mut buf)?;
    Ok(buf)
}

fn parse(mut source: InputSource) -> InputResult<WavDecoder> {
    if &read_fourcc(&mut source)? != b"RIFF" {
        return Err(InputError::FileFormat);
    }
    let _riff_len = read_u32(&mut source)?;
    if &read_fourcc(&mut source)? != b"WAVE" {
        return Err(InputError::FileFormat);
    }

    let mut sf = None;
    let mut data = None;
    let mut comments = Comments::new();

    // Walk the chunk list. Chunks are word-aligned; odd sizes carry a pad
    // byte.
    loop {
        let id = match read_fourcc(&mut source) {
            Ok(id) => id,
            Err(InputError::FileFormat) => break,
            Err(err) => return Err(err),
        };
        let size = u64::from(read_u32(&mut source)?);
        let next = source.stream_position()? + size + (size & 1);

        match &id {
            b"fmt " => {
                if size < 16 {
                    return Err(InputError::FileFormat);
                }
                sf = Some(parse_fmt(&mut source)?);
            }
            b"data" => {
                let start = source.stream_position()?;
                data = Some((start, size));
            }
            b"LIST" => {
                let kind = read_fourcc(&mut source)?;
                if &kind == b"INFO" {
                    parse_info(&mut source, size - 4, &mut comments)?;
                }
            }
            _ => {}
        }
        source.seek(SeekFrom::Start(next))?;
    }

    let sf = sf.ok_or(InputError::FileFormat)?;
    let (data_start, mut data_len) = data.ok_or(InputError::FileFormat)?;

    // Clip a data chunk that claims more bytes than the file holds.
    let file_len = source.seek(SeekFrom::End(0))?;
    if data_start + data_len > file_len {
        data_len = file_len.saturating_sub(data_start);
    }
    // Whole frames only.
    data_len -= data_len % sf.frame_size() as u64;

    Ok(WavDecoder { source, sf, data_start, data_len, pos: 0, comments })
}

fn parse_fmt(source: &mut InputSource) -> InputResult<SampleFormat> {
    let format = read_u16(source)?;
    let channels = read_u16(source)?;
    let rate = read_u32(source)?;
    let _byte_rate = read_u32(source)?;
    let _block_align = read_u16(source)?;
    let bits = read_u16(source)?;

    if format != WAVE_FORMAT_PCM && format != WAVE_FORMAT_EXTENSIBLE {
        return Err(InputError::FileFormat);
    }
    if channels == 0 || channels > 16 {
        return Err(InputError::FileFormat);
    }
    if !matches!(bits, 8 | 16 | 24 | 32) {
        return Err(InputError::SampleFormat);
    }
    if rate == 0 {
        return Err(InputError::FileFormat);
    }

    // 8-bit WAV is unsigned, wider is signed; always little-endian.
    Ok(SampleFormat::new(rate, bits as u8, channels as u8, bits > 8, false))
}

/// RIFF INFO ids with a tag equivalent.
fn info_key(id: &[u8; 4]) -> Option<&'static str> {
    match id {
        b"IART" => Some("artist"),
        b"INAM" => Some("title"),
        b"IPRD" => Some("album"),
        b"ICRD" => Some("date"),
        b"IGNR" => Some("genre"),
        b"ITRK" => Some("tracknumber"),
        b"ICMT" => Some("comment"),
        _ => None,
    }
}

fn parse_info(source: &mut InputSource, len: u64, comments: &mut Comments) -> InputResult<()> {
    let mut remaining = len;
    while remaining >= 8 {
        let id = read_fourcc(source)?;
        let size = u64::from(read_u32(source)?);
        remaining -= 8;
        if size > remaining {
            break;
        }
        let padded = size + (size & 1);

        match info_key(&id) {
            Some(key) => {
                let mut value = vec![0u8; size as usize];
                read_exact(source, &mut value)?;
                if size & 1 == 1 {
                    let mut pad = [0u8; 1];
                    read_exact(source, &mut pad)?;
                }
                let value = String::from_utf8_lossy(&value);
                let value = value.trim_end_matches('\0').trim();
                if !value.is_empty() {
                    comments.add(key, value.to_string());
                }
            }
            None => {
                source.seek(SeekFrom::Current(padded as i64))?;
            }
        }
        remaining = remaining.saturating_sub(padded);
    }
    Ok(())
}

impl InputDecoder for WavDecoder {
    fn sample_format(&self) -> SampleFormat {
        self.sf
    }

    fn read(&mut self, buf: &mut [u8]) -> InputResult<usize> {
        let remaining = self.data_len - self.pos;
        if remaining == 0 {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self.source.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, seconds: f64) -> InputResult<()> {
        let offset = (seconds * self.sf.second_size() as f64) as u64;
        let offset = offset - offset % self.sf.frame_size() as u64;
        let offset = offset.min(self.data_len);
        self.source.seek(SeekFrom::Start(self.data_start + offset))?;
        self.pos = offset;
        Ok(())
    }

    fn read_comments(&mut self) -> InputResult<Comments> {
        Ok(self.comments.clone())
    }

    fn duration(&mut self) -> InputResult<i64> {
        Ok((self.data_len / self.sf.second_size() as u64) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use aria_core::input::{Input, InputRegistry};

    /// Build a minimal RIFF/WAVE file: fmt, an INFO list, and `frames`
    /// frames of silence.
    fn make_wav(rate: u32, bits: u16, channels: u16, frames: u32) -> Vec<u8> {
        let frame_size = u32::from(bits / 8) * u32::from(channels);
        let data_len = frames * frame_size;

        let mut info = Vec::new();
        info.extend_from_slice(b"INFO");
        for (id, value) in [(b"IART", &b"Ester"[..]), (b"INAM", &b"Silence"[..])] {
            info.extend_from_slice(id);
            info.extend_from_slice(&(value.len() as u32).to_le_bytes());
            info.extend_from_slice(value);
            if value.len() % 2 == 1 {
                info.push(0);
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        let riff_len = 4 + 24 + (8 + info.len() as u32) + 8 + data_len;
        out.extend_from_slice(&riff_len.to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * frame_size).to_le_bytes());
        out.extend_from_slice(&(frame_size as u16).to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());

        out.extend_from_slice(b"LIST");
        out.extend_from_slice(&(info.len() as u32).to_le_bytes());
        out.extend_from_slice(&info);

        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    fn write_wav(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn registry() -> InputRegistry {
        let mut registry = InputRegistry::new();
        registry.register(&WAV_PLUGIN);
        registry
    }

    #[test]
    fn reports_format_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "two-seconds.wav", &make_wav(44100, 16, 2, 2 * 44100));

        let mut input = Input::open(&path, &registry()).unwrap();
        assert_eq!(input.sample_format(), SampleFormat::s16_le(44100));
        assert_eq!(input.duration().unwrap(), 2);

        let comments = input.read_comments().unwrap();
        assert_eq!(comments.get("artist"), Some("Ester"));
        assert_eq!(comments.get("title"), Some("Silence"));
    }

    #[test]
    fn reads_all_frames_then_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "short.wav", &make_wav(8000, 16, 2, 100));

        let mut input = Input::open(&path, &registry()).unwrap();
        let mut total = 0;
        let mut buf = [0u8; 64];
        loop {
            let n = input.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 100 * 4);
        assert!(input.is_eof());
    }

    #[test]
    fn seek_is_frame_aligned_and_clears_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "seek.wav", &make_wav(8000, 16, 2, 8000));

        let mut input = Input::open(&path, &registry()).unwrap();
        let mut buf = [0u8; 4096];
        while input.read(&mut buf).unwrap() > 0 {}
        assert!(input.is_eof());

        input.seek(0.5).unwrap();
        assert!(!input.is_eof());
        let mut total = 0;
        loop {
            let n = input.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        // Half a second left after the seek.
        assert_eq!(total, 4000 * 4);
    }

    #[test]
    fn eight_bit_mono_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = make_wav(8000, 8, 1, 1000);
        // u8 silence is 0x80, not zero.
        let len = bytes.len();
        bytes[len - 1000..].fill(0x80);
        let path = write_wav(&dir, "8bit.wav", &bytes);

        let mut input = Input::open(&path, &registry()).unwrap();
        // u8 mono widens and duplicates to canonical s16 stereo.
        assert_eq!(input.sample_format(), SampleFormat::s16_le(8000));

        let mut buf = [0u8; 4096];
        let n = input.read(&mut buf).unwrap();
        assert!(n > 0 && n % 4 == 0);
        // Silence in u8 is 0x80, which biases to 0.
        assert!(buf[..n].iter().all(|&b| b == 0));
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "garbage.wav", b"definitely not a riff file");
        assert!(matches!(
            Input::open(&path, &registry()),
            Err(InputError::FileFormat)
        ));
    }
}
