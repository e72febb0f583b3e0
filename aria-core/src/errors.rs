// Aria
// Copyright (c) 2026 The Project Aria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the closed error types of the input and
//! output layers.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;

/// `InputError` enumerates every way opening or reading a source can fail.
#[derive(Debug)]
pub enum InputError {
    /// An IO error occurred while opening, reading, or seeking the source.
    Io(io::Error),
    /// No input plugin claims the filename extension.
    UnrecognizedFileType,
    /// The operation is not supported by this kind of source (e.g. seeking
    /// a live stream).
    FunctionNotSupported,
    /// The source data is not in a format the selected plugin understands,
    /// or no plugin claims the MIME type.
    FileFormat,
    /// The URL could not be parsed.
    InvalidUri,
    /// The plugin cannot decode to a supported sample format.
    SampleFormat,
    /// The HTTP response could not be parsed.
    HttpResponse,
    /// The HTTP server answered with a status other than 200.
    HttpStatus(u16, String),
    /// An internal error in a plugin.
    Internal(&'static str),
}

impl InputError {
    /// True when a read simply had no data ready within its timeout and
    /// should be retried.
    pub fn is_would_block(&self) -> bool {
        match self {
            InputError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Io(err) => write!(f, "{}", err),
            InputError::UnrecognizedFileType => write!(f, "unrecognized filename extension"),
            InputError::FunctionNotSupported => write!(f, "function not supported"),
            InputError::FileFormat => write!(f, "file format not supported or corrupted file"),
            InputError::InvalidUri => write!(f, "invalid URI"),
            InputError::SampleFormat => {
                write!(f, "input plugin doesn't support the sample format")
            }
            InputError::HttpResponse => write!(f, "invalid HTTP response"),
            InputError::HttpStatus(code, reason) => write!(f, "{} {}", code, reason),
            InputError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for InputError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            InputError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for InputError {
    fn from(err: io::Error) -> InputError {
        InputError::Io(err)
    }
}

pub type InputResult<T> = result::Result<T, InputError>;

/// Convenience for raising `InputError::FileFormat`.
pub fn file_format_error<T>() -> InputResult<T> {
    Err(InputError::FileFormat)
}

/// `OutputError` enumerates every way an output or mixer operation can fail.
#[derive(Debug)]
pub enum OutputError {
    /// An IO error reported by the output device.
    Io(io::Error),
    /// No plugin with the requested name is registered.
    NoPlugin,
    /// The required plugin could not be initialized.
    NotInitialized,
    /// The plugin does not implement the operation.
    NotSupported,
    /// The device rejected the sample format.
    SampleFormat,
    /// The plugin has no such option.
    NotOption,
    /// An internal error in a plugin.
    Internal(&'static str),
}

impl OutputError {
    /// True when a write was refused because the device buffer is full and
    /// should be retried after a short sleep.
    pub fn is_would_block(&self) -> bool {
        match self {
            OutputError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// True for the underrun condition that asks the consumer to re-prepare
    /// the device and retry once.
    pub fn is_underrun(&self) -> bool {
        match self {
            OutputError::Io(err) => err.kind() == io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::Io(err) => write!(f, "{}", err),
            OutputError::NoPlugin => write!(f, "no such plugin"),
            OutputError::NotInitialized => {
                write!(f, "couldn't initialize required output plugin")
            }
            OutputError::NotSupported => write!(f, "function not supported"),
            OutputError::SampleFormat => write!(f, "sample format not supported"),
            OutputError::NotOption => write!(f, "no such option"),
            OutputError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for OutputError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            OutputError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for OutputError {
    fn from(err: io::Error) -> OutputError {
        OutputError::Io(err)
    }
}

pub type OutputResult<T> = result::Result<T, OutputError>;
