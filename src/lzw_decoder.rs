//! LZW Decoder (spec.md §4.3): drives the bit reader and dictionary,
//! emitting ARGB pixel runs into a pre-sized frame buffer.
//!
//! Grounded on `embedded-gif`'s `FrameDecoder` (`frame_decoder.rs`) for
//! overall control flow — CLEAR/stop-code handling, incremental output —
//! generalized from the teacher's fixed-size `output_buffer` chunked
//! rendering to direct emission into a `Vec<u32>`, and switched to the
//! run-dictionary semantics of `dictionary.rs` in place of the teacher's
//! parent+suffix chain walk.

use crate::dictionary::Dictionary;
use crate::error::{GifError, Warning};
use crate::bitreader::BitReader;

/// Decodes one frame's compressed sub-blocks into its ARGB pixel buffer.
///
/// `buf` is the concatenation of the frame's LZW sub-block payloads
/// (terminator stripped). `active_table` is the resolved local-or-global
/// color table. `capacity` is `width * height`, the exact size of the
/// output buffer; overflow truncates per spec.md §4.3's emit policy
/// instead of panicking.
pub fn decode(
    buf: &[u8],
    min_code_size: u8,
    active_table: &[u32],
    transparency_index: Option<u8>,
    capacity: usize,
) -> Result<(Vec<u32>, Vec<Warning>), GifError> {
    // spec.md §3: min_code_size ∈ [2, 8]. `parser.rs` already rejects an
    // out-of-range value before reaching here, but `decode` is a public
    // entry point in its own right; guarding it too means the
    // `clear_code`/`eoi_code` shift below can never overflow regardless
    // of caller.
    if !(2..=8).contains(&min_code_size) {
        return Err(GifError::CorruptLzwStream("min_code_size outside the valid range [2, 8]"));
    }

    let clear_code = 1u16 << min_code_size;
    let eoi_code = clear_code + 1;

    let mut reader = BitReader::new(buf, min_code_size);
    let mut dict = Dictionary::initialize(active_table, transparency_index, clear_code, eoi_code);

    let mut out: Vec<u32> = Vec::with_capacity(capacity);
    let mut dropped: usize = 0;
    let mut truncated = false;

    let mut emit = |pixels: &[u32], out: &mut Vec<u32>, dropped: &mut usize, truncated: &mut bool| {
        if *truncated {
            *dropped += pixels.len();
            return;
        }
        let remaining = capacity.saturating_sub(out.len());
        if pixels.len() <= remaining {
            out.extend_from_slice(pixels);
        } else {
            out.extend_from_slice(&pixels[..remaining]);
            *dropped += pixels.len() - remaining;
            *truncated = true;
        }
    };

    let mut code = reader.read();
    if code == clear_code {
        dict.reset();
        code = reader.read();
    }

    if code != eoi_code {
        if !dict.is_known(code) {
            return Err(GifError::CorruptLzwStream(
                "initial LZW code references an unpopulated dictionary slot",
            ));
        }
        emit(dict.get(code), &mut out, &mut dropped, &mut truncated);

        let mut prev = code;
        loop {
            if reader.is_exhausted() {
                break;
            }
            code = reader.read();

            if code == clear_code {
                dict.reset();
                code = reader.read();
                if code == eoi_code {
                    break;
                }
                if !dict.is_known(code) {
                    return Err(GifError::CorruptLzwStream(
                        "code following a CLEAR references an unpopulated dictionary slot",
                    ));
                }
                emit(dict.get(code), &mut out, &mut dropped, &mut truncated);
                prev = code;
                continue;
            }
            if code == eoi_code {
                break;
            }

            if dict.is_known(code) {
                let pixels = dict.get(code).to_vec();
                emit(&pixels, &mut out, &mut dropped, &mut truncated);

                let mut new_run = dict.get(prev).to_vec();
                new_run.push(pixels[0]);
                if dict.add_entry(new_run, reader.code_size()) {
                    reader.grow_code_size();
                }
            } else if code == dict.next_code() {
                let prev_run = dict.get(prev).to_vec();
                let mut new_run = prev_run.clone();
                new_run.push(prev_run[0]);
                emit(&new_run, &mut out, &mut dropped, &mut truncated);
                if dict.add_entry(new_run, reader.code_size()) {
                    reader.grow_code_size();
                }
            } else {
                return Err(GifError::CorruptLzwStream(
                    "LZW code out of range and not the \"not yet in table\" case",
                ));
            }

            prev = code;
        }
    }

    let mut warnings = Vec::new();
    if truncated {
        log::warn!("LZW decode overflowed frame buffer by {dropped} pixels; truncating");
        warnings.push(Warning::BufferOverflow { dropped_pixels: dropped });
    }

    Ok((out, warnings))
}
