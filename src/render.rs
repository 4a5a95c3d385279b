//! Answers to paint requests from a render surface.

use crate::frame::{Frame, FrameSequence};
use crate::layout::centered_origin;

/// What to draw for one paint request.
///
/// Platform-agnostic: each surface blits `frame` at (`x`, `y`) with its own
/// backend.
#[derive(Clone, Debug)]
pub struct RenderResult {
    /// Frame to draw, already zoom-scaled
    pub frame: Frame,
    /// Index of the frame within its sequence
    pub index: usize,
    /// Left edge in surface pixels (negative when the frame overflows)
    pub x: i64,
    /// Top edge in surface pixels
    pub y: i64,
}

/// Pick the frame at `index` and center it on a surface.
///
/// The index wraps to the sequence length.
///
/// ## Example
///
/// ```rust
/// use animview_core::{Frame, FrameSequence};
/// use animview_core::render::render_sequence;
/// use image::RgbaImage;
///
/// let sequence = FrameSequence::single(Frame::new(RgbaImage::new(4, 2)));
/// let result = render_sequence(&sequence, 0, 10, 10);
/// assert_eq!((result.x, result.y), (3, 4));
/// ```
pub fn render_sequence(
    sequence: &FrameSequence,
    index: usize,
    surface_width: u32,
    surface_height: u32,
) -> RenderResult {
    let index = index % sequence.len();
    let frame = sequence.keyframe();
    let frame = sequence.get(index).unwrap_or(frame).clone();
    let (x, y) = centered_origin((surface_width, surface_height), frame.dimensions());
    RenderResult { frame, index, x, y }
}
