//! Error and warning types for the GIF decoder.
//!
//! `GifError` covers the fatal kinds from the container/LZW design; `Warning`
//! covers the non-fatal ones that get attached to a [`crate::model::Frame`]
//! instead of aborting decode.

use std::io;
use thiserror::Error;

/// A fatal decoding error.
///
/// Stream-level variants (everything except the ones explicitly called out
/// as frame-level below) close the [`crate::reader::Reader`] for good.
/// `MissingColorTable` and `CorruptLzwStream` are caught by the container
/// parser and reported on the affected [`crate::model::Frame`] instead of
/// propagating, so the reader can keep going.
#[derive(Debug, Error)]
pub enum GifError {
    /// Bytes 0-5 are not `GIF87a`/`GIF89a`.
    #[error("not a valid GIF87a/GIF89a signature")]
    InvalidSignature,

    /// A required field ran past the end of the source.
    #[error("unexpected end of stream while reading a required field")]
    UnexpectedEndOfStream,

    /// A top-level block identifier outside {0x21, 0x2C, 0x3B}.
    #[error("unknown block identifier 0x{0:02X}")]
    UnknownBlock(u8),

    /// An extension subtype the caller's filter insisted on but the parser
    /// has no sub-reader for.
    #[error("extension subtype 0x{0:02X} is not handled")]
    UnsupportedExtension(u8),

    /// A frame has neither a local nor a global color table to draw from.
    #[error("frame has no local or global color table to decode against")]
    MissingColorTable,

    /// An LZW code was out of range, or referenced a table slot that is
    /// neither populated nor the "not yet in table" special case.
    #[error("corrupt LZW stream: {0}")]
    CorruptLzwStream(&'static str),

    /// A sub-block chain that requires at least one payload byte declared
    /// a length of zero instead.
    #[error("a sub-block length of zero was declared where at least one byte was required")]
    EmptyBlockSize,

    /// Any other I/O failure reading from the byte-stream source.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for GifError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            GifError::UnexpectedEndOfStream
        } else {
            GifError::Io(err)
        }
    }
}

/// A non-fatal condition recorded against a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// The LZW decoder produced more pixels than the frame buffer holds;
    /// `dropped_pixels` is the count of pixels that were discarded.
    BufferOverflow { dropped_pixels: usize },
}
