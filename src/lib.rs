//! A pull-style GIF89a/GIF87a decoder: container parsing, LZW
//! decompression, and an optional frame compositor, bounded in memory by
//! the logical screen size rather than the frame count.

pub mod bitreader;
pub mod compositor;
pub mod dictionary;
pub mod error;
pub mod filter;
pub mod lzw_decoder;
pub mod model;
pub mod parser;
pub mod reader;
pub mod stream;
pub mod util;

pub use error::{GifError, Warning};
pub use filter::{AdmitAll, BlockContext, BlockFilter};
pub use model::{BlockId, DisposalMethod, Frame, Metadata, PlainText};
pub use reader::{DecoderContext, Reader, ReaderOptions};
pub use stream::{BufferedSource, DataSource, SliceSource};
