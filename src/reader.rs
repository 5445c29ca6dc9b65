//! Reader Facade (spec.md §6.2): owns the stream, drives the two-pass
//! scan-then-yield cycle, and exposes the pull-iterator contract.
//!
//! Grounded on `embedded-gif`'s top-level `GifDecoder` usage pattern from
//! its own integration test (`tests/gif_test.rs`: construct once, loop
//! `parse_frame_metadata`/`decode_frame_image` until `GifEnded`), turned
//! into a pull iterator; the decode-next loop that skips uninteresting
//! results is grounded on `other_examples`'s `nwin-gif` `Reader`/
//! `ReadDecoder` split (`decode_next` looping past `Decoded::Nothing`,
//! stopping at `Decoded::Trailer`/EOF).

use crate::compositor::Compositor;
use crate::error::GifError;
use crate::filter::{AdmitAll, BlockFilter};
use crate::model::{Frame, Metadata};
use crate::parser::ContainerParser;
use crate::stream::{BufferedSource, DataSource, SliceSource};
use crate::util::deinterlace;
use std::io::Read;

/// Runtime knobs generalizing `embedded-gif`'s compile-time `MAX_SIZE`
/// ceiling into options a caller can set per `Reader`.
pub struct ReaderOptions {
    /// Deliver compositor-rendered, logical-screen-sized frames instead
    /// of raw sub-images.
    pub compositing: bool,
    /// In sub-image mode, de-interlace before delivery. Compositor mode
    /// always de-interlaces internally regardless of this flag.
    pub deinterlace: bool,
    /// Optional ceiling on frames delivered, independent of the stream's
    /// own frame count.
    pub max_frames: Option<usize>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            compositing: false,
            deinterlace: false,
            max_frames: None,
        }
    }
}

/// Caller-owned state remembering the last global color table seen across
/// `Reader` lifetimes (spec.md §9 "Global state and last-table memory"),
/// expressed as an explicit object rather than process-wide mutable state.
#[derive(Default)]
pub struct DecoderContext {
    last_global_color_table: Option<Vec<u32>>,
}

impl DecoderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_global_color_table(&self) -> Option<&[u32]> {
        self.last_global_color_table.as_deref()
    }

    fn remember(&mut self, table: &[u32]) {
        self.last_global_color_table = Some(table.to_vec());
    }
}

/// The pull-style GIF reader described in spec.md §6.2.
pub struct Reader<S: DataSource> {
    parser: ContainerParser<S>,
    metadata: Metadata,
    filter: Box<dyn BlockFilter>,
    frames_delivered: usize,
    closed: bool,
    options: ReaderOptions,
    compositor: Option<Compositor>,
    fallback_global_table: Option<Vec<u32>>,
}

impl Reader<SliceSource> {
    /// Opens a reader over an in-memory byte buffer (the common case,
    /// spec.md §9: GIFs are bounded in size in practice).
    pub fn open_slice(bytes: Vec<u8>) -> Result<Self, GifError> {
        Self::open(SliceSource::new(bytes), ReaderOptions::default())
    }
}

impl<S: DataSource> Reader<S> {
    /// Eagerly parses header through global color table and performs the
    /// frame pre-scan.
    pub fn open(source: S, options: ReaderOptions) -> Result<Self, GifError> {
        Self::open_with(source, options, &mut AdmitAll, None)
    }

    /// Like `open`, but threads an explicit [`DecoderContext`] so a
    /// stream with no color table of its own can fall back to the last
    /// global table remembered from a prior stream, and so this stream's
    /// own global table (if any) is remembered for the next one.
    pub fn open_with_context(source: S, options: ReaderOptions, context: &mut DecoderContext) -> Result<Self, GifError> {
        let fallback = context.last_global_color_table().map(|t| t.to_vec());
        let reader = Self::open_with(source, options, &mut AdmitAll, fallback)?;
        if let Some(gct) = reader.metadata.active_global_table() {
            context.remember(gct);
        }
        Ok(reader)
    }

    fn open_with(
        source: S,
        options: ReaderOptions,
        filter: &mut dyn BlockFilter,
        fallback_global_table: Option<Vec<u32>>,
    ) -> Result<Self, GifError> {
        let (metadata, parser) = ContainerParser::open(source, filter)?;
        let compositor = options
            .compositing
            .then(|| Compositor::new(metadata.width, metadata.height));

        Ok(Reader {
            parser,
            metadata,
            filter: Box::new(AdmitAll),
            frames_delivered: 0,
            closed: false,
            options,
            compositor,
            fallback_global_table,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn total_frames(&self) -> usize {
        self.metadata.total_frames
    }

    pub fn has_remaining(&self) -> bool {
        !self.closed && self.frames_delivered < self.metadata.total_frames
    }

    /// Attaches or replaces the block filter; the default admits every
    /// block.
    pub fn set_filter<F: BlockFilter + 'static>(&mut self, filter: F) {
        self.filter = Box::new(filter);
    }

    /// Returns the next frame, or `None` at the Trailer, at EOF, once a
    /// `max_frames` ceiling is reached, or when the image-data block was
    /// filtered out. Fatal stream-level errors close the reader and are
    /// returned here; frame-level errors are instead reported on the
    /// returned `Frame` itself (`data == None`, `error == Some(..)`).
    pub fn next_frame(&mut self) -> Result<Option<Frame>, GifError> {
        if self.closed {
            return Ok(None);
        }
        if let Some(max) = self.options.max_frames {
            if self.frames_delivered >= max {
                return Ok(None);
            }
        }

        let fallback = self.fallback_global_table.as_deref();
        match self.parser.advance(&mut self.metadata, self.filter.as_mut(), fallback) {
            Ok(Some(frame)) => {
                self.frames_delivered += 1;
                if frame.skipped {
                    return Ok(None);
                }
                Ok(Some(self.finish_frame(frame)))
            }
            Ok(None) => {
                self.closed = true;
                Ok(None)
            }
            Err(err) => {
                self.closed = true;
                Err(err)
            }
        }
    }

    fn finish_frame(&mut self, mut frame: Frame) -> Frame {
        if let Some(compositor) = self.compositor.as_mut() {
            let canvas = compositor.composite(&frame);
            frame.width = compositor.screen_width() as u16;
            frame.height = compositor.screen_height() as u16;
            frame.left = 0;
            frame.top = 0;
            frame.data = Some(canvas);
        } else if self.options.deinterlace && frame.interlace_flag {
            if let Some(data) = frame.data.take() {
                frame.data = Some(deinterlace(&data, frame.width as usize, frame.height as usize));
            }
        }
        frame
    }

    /// Releases the underlying stream. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.parser.close();
            self.closed = true;
        }
    }

    /// An iterator view over the remaining frames; filtered frames are
    /// transparently skipped rather than surfaced as `None`.
    pub fn frames(&mut self) -> FrameIter<'_, S> {
        FrameIter { reader: self }
    }
}

impl Reader<BufferedSource> {
    /// Opens a reader over any `Read`-only source by buffering it fully
    /// at construction time (spec.md §9's sanctioned fallback when seek
    /// is unavailable on the underlying source).
    pub fn open_reader<R: Read>(reader: R, options: ReaderOptions) -> Result<Self, GifError> {
        let source = BufferedSource::from_reader(reader)?;
        Self::open(source, options)
    }
}

/// Yields `Result<Frame, GifError>`, transparently skipping frames
/// suppressed by the block filter and stopping at Trailer/EOF or the
/// first stream-level error.
pub struct FrameIter<'a, S: DataSource> {
    reader: &'a mut Reader<S>,
}

impl<'a, S: DataSource> Iterator for FrameIter<'a, S> {
    type Item = Result<Frame, GifError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.next_frame() {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => {
                    if self.reader.closed {
                        return None;
                    }
                    continue; // a filtered frame; keep pulling
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
