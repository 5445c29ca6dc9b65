//! Frame Compositor (spec.md §4.6): disposal-method-aware composition of
//! sub-rectangles into the logical screen, with interlace de-scrambling.
//!
//! Grounded on `embedded-gif`'s `ImageRenderer` trait (`renderer.rs`,
//! `write_area`/`flush_frame`) as the shape of "push a rendered rectangle
//! somewhere"; generalized from a caller-supplied external renderer (the
//! teacher's embedded use case pushes pixels straight to a screen driver)
//! to an in-process canvas the reader owns, since spec.md §4.6 requires
//! disposal-method state a `write_area` call has no memory of the
//! *previous* frame to hold.

use crate::model::{DisposalMethod, Frame};
use crate::util::{deinterlace, is_transparent, TRANSPARENT};

struct PriorRect {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    disposal: DisposalMethod,
}

/// Owns the logical-screen-sized canvas and a previous-canvas snapshot,
/// applying disposal methods and straight-alpha blits across calls.
pub struct Compositor {
    width: usize,
    height: usize,
    canvas: Vec<u32>,
    previous_canvas: Vec<u32>,
    prior: Option<PriorRect>,
}

impl Compositor {
    pub fn new(width: u16, height: u16) -> Self {
        let size = width as usize * height as usize;
        Compositor {
            width: width as usize,
            height: height as usize,
            canvas: vec![TRANSPARENT; size],
            previous_canvas: vec![TRANSPARENT; size],
            prior: None,
        }
    }

    /// Composites `frame` onto the canvas, returning a full logical-screen
    /// sized copy of the result. `frame` must not be `skipped`.
    pub fn composite(&mut self, frame: &Frame) -> Vec<u32> {
        if let Some(prior) = self.prior.take() {
            match prior.disposal {
                DisposalMethod::RestoreToBackground => {
                    self.clear_region(prior.left, prior.top, prior.width, prior.height);
                }
                DisposalMethod::RestoreToPrevious => {
                    self.restore_region(prior.left, prior.top, prior.width, prior.height);
                }
                DisposalMethod::None | DisposalMethod::DoNotDispose => {}
            }
        }

        // Always snapshot before the blit (spec.md §4.6 step 1 explicitly
        // allows "always" in place of the conditional form), so a later
        // RestoreToPrevious has a true pre-blit state to return to.
        self.previous_canvas.copy_from_slice(&self.canvas);

        if let Some(data) = &frame.data {
            let source: std::borrow::Cow<'_, [u32]> = if frame.interlace_flag {
                std::borrow::Cow::Owned(deinterlace(data, frame.width as usize, frame.height as usize))
            } else {
                std::borrow::Cow::Borrowed(data)
            };
            self.blit(frame.left, frame.top, frame.width, frame.height, &source);
        }

        self.prior = Some(PriorRect {
            left: frame.left,
            top: frame.top,
            width: frame.width,
            height: frame.height,
            disposal: frame.disposal_method,
        });

        self.canvas.clone()
    }

    pub fn screen_width(&self) -> usize {
        self.width
    }

    pub fn screen_height(&self) -> usize {
        self.height
    }

    fn blit(&mut self, left: u16, top: u16, width: u16, height: u16, source: &[u32]) {
        for row in 0..height as usize {
            let dest_y = top as usize + row;
            if dest_y >= self.height {
                break;
            }
            for col in 0..width as usize {
                let dest_x = left as usize + col;
                if dest_x >= self.width {
                    break;
                }
                let src_index = row * width as usize + col;
                let Some(&pixel) = source.get(src_index) else {
                    continue;
                };
                if is_transparent(pixel) {
                    continue;
                }
                self.canvas[dest_y * self.width + dest_x] = pixel;
            }
        }
    }

    fn clear_region(&mut self, left: u16, top: u16, width: u16, height: u16) {
        for row in 0..height as usize {
            let dest_y = top as usize + row;
            if dest_y >= self.height {
                break;
            }
            for col in 0..width as usize {
                let dest_x = left as usize + col;
                if dest_x >= self.width {
                    break;
                }
                self.canvas[dest_y * self.width + dest_x] = TRANSPARENT;
            }
        }
    }

    fn restore_region(&mut self, left: u16, top: u16, width: u16, height: u16) {
        for row in 0..height as usize {
            let dest_y = top as usize + row;
            if dest_y >= self.height {
                break;
            }
            for col in 0..width as usize {
                let dest_x = left as usize + col;
                if dest_x >= self.width {
                    break;
                }
                let idx = dest_y * self.width + dest_x;
                self.canvas[idx] = self.previous_canvas[idx];
            }
        }
    }
}
