use crate::error::{Error, Result};
use crate::writer::ResponseWriter;
use compression_codecs::{EncodeV2, gzip::GzipEncoder};
use compression_core::util::{PartialBuffer, WriteBuffer};
use std::fmt;
use std::io;

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

/// Number of distinct levels: `1..=9` plus the default sentinel.
pub(crate) const LEVEL_COUNT: usize = 10;

/// A validated gzip compression level.
///
/// Valid values are `1` (fastest) through `9` (smallest output), plus `-1`
/// which selects the codec's default level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Level(i32);

impl Level {
    /// The codec's default level.
    pub const DEFAULT: Level = Level(-1);
    /// Fastest compression.
    pub const BEST_SPEED: Level = Level(1);
    /// Smallest output.
    pub const BEST_COMPRESSION: Level = Level(9);

    /// Validates a raw gzip level.
    pub fn new(level: i32) -> Result<Self> {
        let precise = Self::BEST_SPEED.0..=Self::BEST_COMPRESSION.0;
        if level == Self::DEFAULT.0 || precise.contains(&level) {
            Ok(Level(level))
        } else {
            Err(Error::InvalidLevel(level))
        }
    }

    /// Returns the raw level value.
    pub fn get(self) -> i32 {
        self.0
    }

    /// Index of this level into per-level tables.
    pub(crate) fn index(self) -> usize {
        if self == Self::DEFAULT {
            LEVEL_COUNT - 1
        } else {
            (self.0 - Self::BEST_SPEED.0) as usize
        }
    }

    fn codec_level(self) -> compression_core::Level {
        if self == Self::DEFAULT {
            compression_core::Level::Default
        } else {
            compression_core::Level::Precise(self.0)
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i32> for Level {
    type Error = Error;

    fn try_from(level: i32) -> Result<Self> {
        Level::new(level)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::DEFAULT {
            f.write_str("default")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A reusable gzip compressor handle.
///
/// Handles come from a [`WriterPool`](crate::WriterPool) and write their output
/// into whatever sink is passed to each call. A handle produces one complete
/// gzip member between acquisition and [`finish`](Compressor::finish).
pub struct Compressor {
    id: u64,
    level: Level,
    encoder: Box<dyn EncodeV2 + Send>,
    output_buffer: Vec<u8>,
}

impl Compressor {
    pub(crate) fn new(id: u64, level: Level) -> Self {
        Self {
            id,
            level,
            encoder: Self::encoder(level),
            output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
        }
    }

    fn encoder(level: Level) -> Box<dyn EncodeV2 + Send> {
        Box::new(GzipEncoder::new(level.codec_level().into()))
    }

    /// Pool-unique identity of this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The level this handle compresses at.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Compresses `input`, writing any produced output to `sink`.
    pub fn write<W>(&mut self, input: &[u8], sink: &mut W) -> io::Result<()>
    where
        W: ResponseWriter + ?Sized,
    {
        if input.is_empty() {
            return Ok(());
        }

        let mut input_buf = PartialBuffer::new(input);

        // Keep encoding until all input is consumed
        loop {
            let consumed = input_buf.written_len();
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            self.encoder.encode(&mut input_buf, &mut output)?;

            let written = output.written_len();
            if written > 0 {
                sink.write_all(&self.output_buffer[..written])?;
            }

            if input_buf.written_len() >= input.len() {
                return Ok(());
            }

            if written == 0 && input_buf.written_len() == consumed {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "gzip encoder made no progress",
                ));
            }
        }
    }

    /// Flushes pending compressed output to `sink` without ending the stream.
    pub fn flush<W>(&mut self, sink: &mut W) -> io::Result<()>
    where
        W: ResponseWriter + ?Sized,
    {
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            let done = self.encoder.flush(&mut output)?;

            let written = output.written_len();
            if written > 0 {
                sink.write_all(&self.output_buffer[..written])?;
            }
            if done {
                return Ok(());
            }
        }
    }

    /// Ends the gzip stream, writing the remaining output and trailer to `sink`.
    pub fn finish<W>(&mut self, sink: &mut W) -> io::Result<()>
    where
        W: ResponseWriter + ?Sized,
    {
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            let done = self.encoder.finish(&mut output)?;

            let written = output.written_len();
            if written > 0 {
                sink.write_all(&self.output_buffer[..written])?;
            }
            if done {
                return Ok(());
            }
        }
    }

    /// Discards all stream state so the handle can start a new gzip member.
    pub(crate) fn reset(&mut self) {
        self.encoder = Self::encoder(self.level);
        self.output_buffer.fill(0);
    }
}

impl fmt::Debug for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compressor")
            .field("id", &self.id)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
