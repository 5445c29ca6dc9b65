//! Byte-stream source abstraction (spec.md §6.1): the thin interface the
//! container parser reads through. No teacher component covers this — the
//! `embedded-gif` decoder reads from a bare `Iterator<Item = u8>` with no
//! seek at all — so this is grounded directly on spec.md's required
//! capability list, with little-endian reads modeled on
//! `other_examples`'s `sondrele-image` GIF decoder's use of
//! `byteorder::ReadBytesExt`/`LittleEndian`.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::GifError;

/// Everything the container parser needs from a byte-stream source.
///
/// Mirrors spec.md §6.1: byte/short reads, mark/seek/reset, skip, position,
/// close. The frame pre-scan (spec.md §4.5) needs `seek`/`mark`/`reset`;
/// sources that can't support them should buffer their entire input once at
/// open, which `SliceSource`/`BufferedSource` below both do unconditionally
/// (spec.md §9: "GIFs are bounded in size in practice").
pub trait DataSource {
    /// Reads exactly `buf.len()` bytes, or fails with `UnexpectedEndOfStream`.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), GifError>;

    /// Reads a single unsigned byte.
    fn read_u8(&mut self) -> Result<u8, GifError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a little-endian unsigned 16-bit value.
    fn read_u16_le(&mut self) -> Result<u16, GifError> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Current absolute byte offset from the start of the stream.
    fn position(&self) -> u64;

    /// Seeks to an absolute byte offset.
    fn seek(&mut self, pos: u64) -> Result<(), GifError>;

    /// Records the current position for a later `reset`.
    fn mark(&mut self) -> u64 {
        self.position()
    }

    /// Seeks back to a position previously returned by `mark`.
    fn reset(&mut self, mark: u64) -> Result<(), GifError> {
        self.seek(mark)
    }

    /// Skips up to `n` bytes, returning the number actually skipped (fewer
    /// than `n` only at end of stream).
    fn skip(&mut self, n: u64) -> Result<u64, GifError>;

    /// Releases any underlying resource. Idempotent.
    fn close(&mut self) {}
}

/// An in-memory source over a byte slice, the common case since GIFs are
/// bounded in size in practice (spec.md §9).
pub struct SliceSource {
    cursor: Cursor<Vec<u8>>,
}

impl SliceSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        SliceSource {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataSource for SliceSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), GifError> {
        self.cursor.read_exact(buf).map_err(GifError::from)
    }

    fn read_u16_le(&mut self) -> Result<u16, GifError> {
        self.cursor.read_u16::<LittleEndian>().map_err(GifError::from)
    }

    fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn seek(&mut self, pos: u64) -> Result<(), GifError> {
        self.cursor.set_position(pos);
        Ok(())
    }

    fn skip(&mut self, n: u64) -> Result<u64, GifError> {
        let remaining = self.len().saturating_sub(self.position());
        let to_skip = remaining.min(n);
        self.cursor.set_position(self.position() + to_skip);
        Ok(to_skip)
    }
}

/// Adapts any `Read`-only source (file, pipe) by buffering it fully into
/// memory at construction time, per spec.md §9's sanctioned fallback when
/// seek is unavailable on the underlying source.
pub struct BufferedSource {
    inner: SliceSource,
}

impl BufferedSource {
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, GifError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| GifError::Io(io::Error::new(e.kind(), e)))?;
        Ok(BufferedSource {
            inner: SliceSource::new(bytes),
        })
    }
}

impl DataSource for BufferedSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), GifError> {
        self.inner.read_exact(buf)
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn seek(&mut self, pos: u64) -> Result<(), GifError> {
        self.inner.seek(pos)
    }

    fn skip(&mut self, n: u64) -> Result<u64, GifError> {
        self.inner.skip(n)
    }
}
