//! Container Parser / Block Dispatcher (spec.md §4.4) and frame count
//! pre-scan (§4.5).
//!
//! Grounded on `embedded-gif`'s `GifDecoder` state machine
//! (`gif_decoder.rs`: `parse_gif_metadata`, `parse_frame_metadata`,
//! `decode_frame_image`), generalized from its image-descriptor-only
//! extension handling (the teacher only understands `0xF9`; everything
//! else is unconditionally skipped, and interlacing is a hard error) to
//! the full dispatch table of spec.md §4.4, plus the block-filter hook
//! and the two-pass frame-count scan neither teacher variant implements.

use crate::error::GifError;
use crate::filter::{BlockContext, BlockFilter};
use crate::model::{BlockId, DisposalMethod, Frame, Metadata, PlainText};
use crate::stream::DataSource;
use crate::lzw_decoder;
use crate::util::argb_opaque;

struct PendingGce {
    disposal_method: DisposalMethod,
    user_input_flag: bool,
    transparency_flag: bool,
    delay: u16,
    transparency_index: u8,
}

/// The block-dispatched state machine described in spec.md §4.4. Owns the
/// byte-stream source and whatever parser-local state (pending graphic
/// control extension, next frame index) must persist across calls to
/// [`ContainerParser::advance`].
pub struct ContainerParser<S: DataSource> {
    source: S,
    pending_gce: Option<PendingGce>,
    next_index: usize,
    ended: bool,
}

impl<S: DataSource> ContainerParser<S> {
    /// Parses the header, logical screen descriptor and global color
    /// table, performs the frame pre-scan (spec.md §4.5), and returns the
    /// populated [`Metadata`] alongside a parser positioned at the first
    /// block after the global color table.
    pub fn open(mut source: S, filter: &mut dyn BlockFilter) -> Result<(Metadata, Self), GifError> {
        let (signature, version) = Self::parse_header(&mut source)?;

        let mut metadata = Metadata {
            signature,
            version,
            width: 0,
            height: 0,
            global_color_table_flag: false,
            color_resolution: 0,
            sort_flag: false,
            background_color_index: 0,
            pixel_aspect_ratio: 0,
            global_color_table: None,
            comments: Vec::new(),
            plain_text: None,
            loop_count: 0,
            total_frames: 0,
        };

        if filter.skip(BlockContext::LogicalScreenDescriptor) {
            source.skip(7)?;
        } else {
            let width = source.read_u16_le()?;
            let height = source.read_u16_le()?;
            let packed = source.read_u8()?;
            let background_color_index = source.read_u8()?;
            let pixel_aspect_ratio = source.read_u8()?;

            let global_color_table_flag = packed & 0b1000_0000 != 0;
            let color_resolution = ((packed >> 4) & 0b0000_0111) + 1;
            let sort_flag = packed & 0b0000_1000 != 0;
            let gct_size_power = packed & 0b0000_0111;

            metadata.width = width;
            metadata.height = height;
            metadata.global_color_table_flag = global_color_table_flag;
            metadata.color_resolution = color_resolution;
            metadata.sort_flag = sort_flag;
            metadata.background_color_index = background_color_index;
            metadata.pixel_aspect_ratio = pixel_aspect_ratio;

            if global_color_table_flag {
                let size = 1usize << (gct_size_power + 1);
                if filter.skip(BlockContext::GlobalColorTable) {
                    source.skip(size as u64 * 3)?;
                } else {
                    metadata.global_color_table = Some(Self::read_color_table(&mut source, size)?);
                }
            }
        }

        let total_frames = Self::prescan_total_frames(&mut source)?;
        metadata.total_frames = total_frames;

        Ok((
            metadata,
            ContainerParser {
                source,
                pending_gce: None,
                next_index: 0,
                ended: false,
            },
        ))
    }

    fn parse_header(source: &mut S) -> Result<([u8; 3], [u8; 3]), GifError> {
        let mut signature = [0u8; 3];
        source.read_exact(&mut signature)?;
        let mut version = [0u8; 3];
        source.read_exact(&mut version)?;

        if &signature != b"GIF" || (&version != b"87a" && &version != b"89a") {
            return Err(GifError::InvalidSignature);
        }
        Ok((signature, version))
    }

    fn read_color_table(source: &mut S, size: usize) -> Result<Vec<u32>, GifError> {
        let mut table = Vec::with_capacity(size);
        for _ in 0..size {
            let r = source.read_u8()?;
            let g = source.read_u8()?;
            let b = source.read_u8()?;
            table.push(argb_opaque(r, g, b));
        }
        Ok(table)
    }

    /// Reads a chain of `(length, bytes)` sub-blocks into a list of owned
    /// byte vectors, stopping at the zero-length terminator. A zero length
    /// on the very first sub-block is a legitimate empty chain here;
    /// callers that require at least one non-empty sub-block (GCE,
    /// plain-text, application extensions) check `blocks.is_empty()`
    /// themselves and raise `EmptyBlockSize`.
    fn read_subblocks(source: &mut S) -> Result<Vec<Vec<u8>>, GifError> {
        let mut blocks = Vec::new();
        loop {
            let len = source.read_u8()?;
            if len == 0 {
                break;
            }
            let mut buf = vec![0u8; len as usize];
            source.read_exact(&mut buf)?;
            blocks.push(buf);
        }
        Ok(blocks)
    }

    fn skip_subblocks(source: &mut S) -> Result<(), GifError> {
        loop {
            let len = source.read_u8()?;
            if len == 0 {
                break;
            }
            source.skip(len as u64)?;
        }
        Ok(())
    }

    /// Performs the minimal pre-scan pass (spec.md §4.5): skips every
    /// payload but counts Image Descriptor occurrences, stopping at
    /// Trailer or EOF. The stream position is restored afterwards.
    fn prescan_total_frames(source: &mut S) -> Result<usize, GifError> {
        let mark = source.mark();
        let mut count = 0usize;

        loop {
            let id = match source.read_u8() {
                Ok(b) => b,
                Err(_) => break, // tolerate EOF: stop counting, as at Trailer
            };
            match id {
                0x3B => break,
                0x21 => {
                    let _label = source.read_u8()?;
                    Self::skip_subblocks(source)?;
                }
                0x2C => {
                    source.skip(8)?; // left, top, width, height
                    let packed = source.read_u8()?;
                    if packed & 0b1000_0000 != 0 {
                        let power = packed & 0b0000_0111;
                        let size = 1u64 << (power + 1);
                        source.skip(size * 3)?;
                    }
                    source.read_u8()?; // min_code_size
                    Self::skip_subblocks(source)?;
                    count += 1;
                }
                _ => break, // unknown block: stop the tolerant pre-scan early
            }
        }

        source.reset(mark)?;
        Ok(count)
    }

    /// Parses forward until either a frame is produced (filtered or not)
    /// or the Trailer/EOF is reached (`Ok(None)`). `fallback_global_table`
    /// supplies spec.md §3's cross-stream global-table memory when this
    /// stream declares none of its own.
    pub fn advance(
        &mut self,
        metadata: &mut Metadata,
        filter: &mut dyn BlockFilter,
        fallback_global_table: Option<&[u32]>,
    ) -> Result<Option<Frame>, GifError> {
        if self.ended {
            return Ok(None);
        }

        loop {
            let id = self.source.read_u8()?;
            match id {
                0x21 => {
                    if let Some(frame) = self.handle_extension(metadata, filter)? {
                        return Ok(Some(frame));
                    }
                    // extensions never themselves produce a frame; loop.
                }
                0x2C => {
                    let frame = self.handle_image_descriptor(metadata, filter, fallback_global_table)?;
                    return Ok(Some(frame));
                }
                0x3B => {
                    self.ended = true;
                    return Ok(None);
                }
                other => {
                    self.ended = true;
                    return Err(GifError::UnknownBlock(other));
                }
            }
        }
    }

    /// Handles one extension block. Extensions never produce a `Frame`
    /// directly (the return type exists only to share the `advance` loop
    /// shape); it is always `Ok(None)` on success.
    fn handle_extension(&mut self, metadata: &mut Metadata, filter: &mut dyn BlockFilter) -> Result<Option<Frame>, GifError> {
        let label = self.source.read_u8()?;

        if filter.skip(BlockContext::Extension(BlockId::Extension(label))) {
            Self::skip_subblocks(&mut self.source)?;
            return Ok(None);
        }

        match label {
            0xF9 => {
                let blocks = Self::read_subblocks(&mut self.source)?;
                let payload = blocks.first().ok_or(GifError::EmptyBlockSize)?;
                if payload.len() < 4 {
                    return Err(GifError::EmptyBlockSize);
                }
                let packed = payload[0];
                let delay = u16::from_le_bytes([payload[1], payload[2]]);
                let transparency_index = payload[3];

                self.pending_gce = Some(PendingGce {
                    disposal_method: DisposalMethod::from_packed((packed >> 2) & 0b0000_0111),
                    user_input_flag: packed & 0b0000_0010 != 0,
                    transparency_flag: packed & 0b0000_0001 != 0,
                    delay,
                    transparency_index,
                });
            }
            0xFE => {
                let blocks = Self::read_subblocks(&mut self.source)?;
                metadata.comments.push(blocks.concat());
            }
            0x01 => {
                let blocks = Self::read_subblocks(&mut self.source)?;
                let grid = blocks.first().ok_or(GifError::EmptyBlockSize)?;
                if grid.len() < 12 {
                    return Err(GifError::EmptyBlockSize);
                }
                metadata.plain_text = Some(PlainText {
                    left: u16::from_le_bytes([grid[0], grid[1]]),
                    top: u16::from_le_bytes([grid[2], grid[3]]),
                    grid_width: u16::from_le_bytes([grid[4], grid[5]]),
                    grid_height: u16::from_le_bytes([grid[6], grid[7]]),
                    cell_width: grid[8],
                    cell_height: grid[9],
                    fg_color_index: grid[10],
                    bg_color_index: grid[11],
                    text: blocks[1..].concat(),
                });
            }
            0xFF => {
                let blocks = Self::read_subblocks(&mut self.source)?;
                let id_auth = blocks.first().ok_or(GifError::EmptyBlockSize)?;
                if id_auth.len() < 11 {
                    return Err(GifError::EmptyBlockSize);
                }
                let identifier = &id_auth[0..8];
                let auth_code = &id_auth[8..11];
                let is_netscape_loop = (identifier == b"NETSCAPE" && auth_code == b"2.0")
                    || (identifier == b"ANIMEXTS" && auth_code == b"1.0");
                if is_netscape_loop {
                    if let Some(sub) = blocks.get(1) {
                        if sub.len() == 3 && sub[0] == 1 {
                            metadata.loop_count = u16::from_le_bytes([sub[1], sub[2]]);
                        }
                    }
                }
            }
            other => {
                return Err(GifError::UnsupportedExtension(other));
            }
        }

        Ok(None)
    }

    fn handle_image_descriptor(
        &mut self,
        metadata: &mut Metadata,
        filter: &mut dyn BlockFilter,
        fallback_global_table: Option<&[u32]>,
    ) -> Result<Frame, GifError> {
        let index = self.next_index;
        self.next_index += 1;

        if filter.skip(BlockContext::ImageDescriptor) {
            self.pending_gce = None;
            self.source.skip(8)?;
            let packed = self.source.read_u8()?;
            if packed & 0b1000_0000 != 0 {
                let power = packed & 0b0000_0111;
                let size = 1u64 << (power + 1);
                self.source.skip(size * 3)?;
            }
            self.source.read_u8()?; // min_code_size
            Self::skip_subblocks(&mut self.source)?;

            let mut frame = Frame::new(index);
            frame.skipped = true;
            return Ok(frame);
        }

        let left = self.source.read_u16_le()?;
        let top = self.source.read_u16_le()?;
        let width = self.source.read_u16_le()?;
        let height = self.source.read_u16_le()?;
        let packed = self.source.read_u8()?;

        let local_color_table_flag = packed & 0b1000_0000 != 0;
        let interlace_flag = packed & 0b0100_0000 != 0;
        let sort_flag = packed & 0b0010_0000 != 0;
        let lct_size_power = packed & 0b0000_0111;
        let local_color_table_size = if local_color_table_flag {
            1usize << (lct_size_power + 1)
        } else {
            0
        };

        let mut frame = Frame::new(index);
        frame.left = left;
        frame.top = top;
        frame.width = width;
        frame.height = height;
        frame.interlace_flag = interlace_flag;
        frame.sort_flag = sort_flag;
        frame.local_color_table_flag = local_color_table_flag;
        frame.local_color_table_size = local_color_table_size;

        if local_color_table_flag {
            if filter.skip(BlockContext::LocalColorTable) {
                self.source.skip(local_color_table_size as u64 * 3)?;
            } else {
                frame.local_color_table = Some(Self::read_color_table(&mut self.source, local_color_table_size)?);
            }
        }

        if let Some(gce) = self.pending_gce.take() {
            frame.disposal_method = gce.disposal_method;
            frame.user_input_flag = gce.user_input_flag;
            frame.transparency_flag = gce.transparency_flag;
            frame.delay = gce.delay;
            frame.transparency_index = gce.transparency_index;
        }

        if filter.skip(BlockContext::ImageDataHeader) {
            self.source.read_u8()?; // min_code_size
            Self::skip_subblocks(&mut self.source)?;
            frame.skipped = true;
            return Ok(frame);
        }

        let min_code_size = self.source.read_u8()?;
        frame.min_code_size = min_code_size;

        let mut data_buf = Vec::new();
        loop {
            let len = self.source.read_u8()?;
            if len == 0 {
                break;
            }
            if filter.skip(BlockContext::ImageDataSubBlock) {
                self.source.skip(len as u64)?;
            } else {
                let mut chunk = vec![0u8; len as usize];
                self.source.read_exact(&mut chunk)?;
                data_buf.extend_from_slice(&chunk);
            }
        }

        // spec.md §3: min_code_size must lie in [2, 8]. Outside that range
        // the shifts that derive clear_code/eoi_code (here and in
        // bitreader.rs/model.rs) would overflow; this is an attacker- or
        // corruption-controlled byte, so it is validated before any of
        // that arithmetic runs, same frame-level-error treatment as
        // `MissingColorTable`/`CorruptLzwStream` below.
        if !(2..=8).contains(&min_code_size) {
            log::warn!("frame {index} has an out-of-range min_code_size {min_code_size}; reporting null data");
            frame.error = Some(
                GifError::CorruptLzwStream("min_code_size outside the valid range [2, 8]").to_string(),
            );
            return Ok(frame);
        }

        let active_table: Option<Vec<u32>> = if frame.local_color_table_flag {
            frame.local_color_table.clone()
        } else if let Some(gct) = metadata.active_global_table() {
            Some(gct.to_vec())
        } else {
            fallback_global_table.map(|t| t.to_vec())
        };

        match active_table {
            None => {
                log::warn!("frame {index} has no local or global color table; reporting null data");
                frame.error = Some(GifError::MissingColorTable.to_string());
            }
            Some(table) => {
                let transparency_index = if frame.transparency_flag {
                    Some(frame.transparency_index)
                } else {
                    None
                };
                let capacity = frame.width as usize * frame.height as usize;
                match lzw_decoder::decode(&data_buf, frame.min_code_size, &table, transparency_index, capacity) {
                    Ok((pixels, warnings)) => {
                        frame.data = Some(pixels);
                        frame.warnings = warnings;
                    }
                    Err(err) => {
                        log::warn!("frame {index} failed LZW decode: {err}");
                        frame.error = Some(err.to_string());
                    }
                }
            }
        }

        Ok(frame)
    }

    pub fn close(&mut self) {
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AdmitAll;
    use crate::stream::SliceSource;

    /// S1 from spec.md §8: GIF89a, 1x1 screen, global table of 2 colors
    /// (black, white), one opaque 1x1 white frame, Trailer.
    const S1: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x00, 0x00,
        0x00, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
    ];

    fn open(bytes: &[u8]) -> (Metadata, ContainerParser<SliceSource>) {
        ContainerParser::open(SliceSource::new(bytes.to_vec()), &mut AdmitAll).unwrap()
    }

    #[test]
    fn rejects_bad_signature() {
        let bytes = b"JIFF89a".to_vec();
        let err = ContainerParser::open(SliceSource::new(bytes), &mut AdmitAll).unwrap_err();
        assert!(matches!(err, GifError::InvalidSignature));
    }

    #[test]
    fn parses_header_and_global_color_table() {
        let (metadata, _parser) = open(S1);
        assert_eq!(&metadata.signature, b"GIF");
        assert_eq!(&metadata.version, b"89a");
        assert_eq!(metadata.width, 1);
        assert_eq!(metadata.height, 1);
        assert!(metadata.global_color_table_flag);
        let gct = metadata.active_global_table().unwrap();
        assert_eq!(gct.len(), 2);
        assert_eq!(gct[1], argb_opaque(255, 255, 255));
    }

    #[test]
    fn prescan_counts_one_frame() {
        let (metadata, _parser) = open(S1);
        assert_eq!(metadata.total_frames, 1);
    }

    #[test]
    fn advance_yields_decoded_frame_then_none() {
        let (mut metadata, mut parser) = open(S1);
        let frame = parser.advance(&mut metadata, &mut AdmitAll, None).unwrap().unwrap();
        assert_eq!(frame.width, 1);
        assert_eq!(frame.height, 1);
        assert_eq!(frame.data.unwrap(), vec![argb_opaque(255, 255, 255)]);
        assert!(parser.advance(&mut metadata, &mut AdmitAll, None).unwrap().is_none());
    }

    #[test]
    fn filtering_global_color_table_leaves_metadata_without_one() {
        let bytes = S1.to_vec();
        let mut filter = |ctx: BlockContext| matches!(ctx, BlockContext::GlobalColorTable);
        let (metadata, _parser) = ContainerParser::open(SliceSource::new(bytes), &mut filter).unwrap();
        assert!(metadata.active_global_table().is_none());
    }

    #[test]
    fn missing_color_table_reports_frame_error_instead_of_failing_stream() {
        // identical to S1 but with the global color table flag cleared in
        // the logical screen descriptor's packed byte.
        let mut bytes = S1.to_vec();
        bytes[10] = 0x00;
        // drop the two color table entries that would otherwise follow.
        bytes.drain(13..19);
        let (mut metadata, mut parser) = ContainerParser::open(SliceSource::new(bytes), &mut AdmitAll).unwrap();
        let frame = parser.advance(&mut metadata, &mut AdmitAll, None).unwrap().unwrap();
        assert!(frame.data.is_none());
        assert!(frame.error.is_some());
    }

    fn subblocks(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![payload.len() as u8];
        out.extend_from_slice(payload);
        out.push(0);
        out
    }

    #[test]
    fn graphic_control_extension_populates_pending_frame_fields() {
        let mut bytes = vec![0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        bytes.push(0x21);
        bytes.push(0xF9);
        // packed: disposal=2 (RestoreToBackground) << 2, transparency=1
        bytes.extend(subblocks(&[0b0000_1001, 0x0A, 0x00, 0x03]));
        bytes.push(0x2C);
        bytes.extend([0, 0, 0, 0, 1, 0, 1, 0, 0x00]);
        bytes.push(0x02); // min_code_size
        bytes.extend(subblocks(&[0x44, 0x01]));
        bytes.push(0x3B);

        let (mut metadata, mut parser) = ContainerParser::open(SliceSource::new(bytes), &mut AdmitAll).unwrap();
        let frame = parser.advance(&mut metadata, &mut AdmitAll, None).unwrap().unwrap();
        assert!(matches!(frame.disposal_method, DisposalMethod::RestoreToBackground));
        assert!(frame.transparency_flag);
        assert_eq!(frame.transparency_index, 3);
        assert_eq!(frame.delay, 10);
    }

    #[test]
    fn comment_extension_is_collected_on_metadata() {
        let mut bytes = vec![0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        bytes.push(0x21);
        bytes.push(0xFE);
        bytes.extend(subblocks(b"hello"));
        bytes.push(0x3B);

        let (metadata, _parser) = ContainerParser::open(SliceSource::new(bytes), &mut AdmitAll).unwrap();
        assert_eq!(metadata.comments, vec![b"hello".to_vec()]);
    }

    #[test]
    fn netscape_application_extension_sets_loop_count() {
        let mut bytes = vec![0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        bytes.push(0x21);
        bytes.push(0xFF);
        let id_auth = b"NETSCAPE2.0".to_vec(); // "NETSCAPE" + "2.0", 11 bytes
        let mut ext = vec![id_auth.len() as u8];
        ext.extend(id_auth);
        ext.push(3);
        ext.extend([1, 0x05, 0x00]); // sub-block id 1, loop count = 5
        ext.push(0);
        bytes.extend(ext);
        bytes.push(0x3B);

        let (metadata, _parser) = ContainerParser::open(SliceSource::new(bytes), &mut AdmitAll).unwrap();
        assert_eq!(metadata.loop_count, 5);
    }

    #[test]
    fn unrecognized_extension_with_consume_filter_is_unsupported() {
        let mut bytes = vec![0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        bytes.push(0x21);
        bytes.push(0x05); // not a recognized label
        bytes.extend(subblocks(&[0x00]));
        bytes.push(0x3B);

        let (mut metadata, mut parser) = ContainerParser::open(SliceSource::new(bytes), &mut AdmitAll).unwrap();
        let err = parser.advance(&mut metadata, &mut AdmitAll, None).unwrap_err();
        assert!(matches!(err, GifError::UnsupportedExtension(0x05)));
    }

    #[test]
    fn unrecognized_extension_is_skipped_when_filter_requests_it() {
        let mut bytes = vec![0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        bytes.push(0x21);
        bytes.push(0x05);
        bytes.extend(subblocks(&[0x00]));
        bytes.push(0x3B);

        let mut filter = |ctx: BlockContext| matches!(ctx, BlockContext::Extension(_));
        let (mut metadata, mut parser) = ContainerParser::open(SliceSource::new(bytes), &mut filter).unwrap();
        assert!(parser.advance(&mut metadata, &mut filter, None).unwrap().is_none());
    }

    #[test]
    fn local_color_table_overrides_global_table() {
        let mut bytes = vec![
            0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00,
        ];
        bytes.extend([0, 0, 0, 255, 255, 255]); // global: black, white
        bytes.push(0x2C);
        bytes.extend([0, 0, 0, 0, 1, 0, 1, 0, 0b1000_0000]); // lct flag, size power 0 -> 2 entries
        bytes.extend([255, 0, 0, 0, 0, 255]); // local: red, blue
        bytes.push(0x02); // min_code_size
        bytes.extend(subblocks(&[0x44, 0x01])); // clear, code 0 (red), eoi
        bytes.push(0x3B);

        let (mut metadata, mut parser) = ContainerParser::open(SliceSource::new(bytes), &mut AdmitAll).unwrap();
        let frame = parser.advance(&mut metadata, &mut AdmitAll, None).unwrap().unwrap();
        assert_eq!(frame.data.unwrap(), vec![argb_opaque(255, 0, 0)]);
    }
}
