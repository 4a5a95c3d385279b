//! Core data structures for animated frames.

use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};

/// An immutable RGBA pixel buffer.
///
/// Cloning is cheap: the pixels are shared, never copied or mutated after
/// construction.
#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbaImage>,
}

impl Frame {
    /// Wrap a decoded or scaled image.
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Get the frame dimensions as (width, height).
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Get the pixel at the given position.
    ///
    /// Returns None if position is out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.image.get_pixel_checked(x, y).copied()
    }

    /// Borrow the underlying image buffer.
    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Check whether two frames share the same pixel buffer.
    #[inline]
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl From<RgbaImage> for Frame {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}

/// An ordered, non-empty run of frames belonging to one animation.
///
/// Index 0 is the keyframe. The sequence is immutable; clones alias the same
/// frames, which is how an unscaled zoom shares the source without copying.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    frames: Arc<[Frame]>,
}

impl FrameSequence {
    /// Build a sequence from frames in display order.
    ///
    /// Returns None for an empty list.
    pub fn new(frames: Vec<Frame>) -> Option<Self> {
        if frames.is_empty() {
            return None;
        }
        Some(Self {
            frames: frames.into(),
        })
    }

    /// Wrap one frame as a one-element sequence.
    pub fn single(frame: Frame) -> Self {
        Self {
            frames: Arc::from(vec![frame]),
        }
    }

    /// Get the number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; kept for the `len` convention.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get the frame at the given index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// The first frame.
    #[inline]
    pub fn keyframe(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Check whether two sequences are the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &FrameSequence) -> bool {
        Arc::ptr_eq(&self.frames, &other.frames)
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Where a sequence's delay came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimingSource {
    /// Read from the container's frame-0 metadata.
    Metadata,
    /// Metadata was absent or unparsable.
    Fallback,
}

/// The single delay applied to every frame transition of a sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingInfo {
    pub delay: Duration,
    pub source: TimingSource,
}

impl TimingInfo {
    /// Timing read from metadata stored in centiseconds.
    pub fn from_centis(centis: u16) -> Self {
        Self {
            delay: Duration::from_millis(u64::from(centis) * 10),
            source: TimingSource::Metadata,
        }
    }

    /// Timing used when metadata could not be read.
    pub fn fallback(delay: Duration) -> Self {
        Self {
            delay,
            source: TimingSource::Fallback,
        }
    }
}
