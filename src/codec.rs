//! Decoding of delta-encoded animated containers into composited frames.
//!
//! Animated GIFs usually store every frame after the first as only the
//! region that changed. Decoding reads the raw frames and layers each one
//! over the previous composited frame, anchored to the bottom-right corner.

use std::io::Cursor;
use std::time::Duration;

use image::{imageops, ImageError, ImageFormat, RgbaImage};

use crate::error::{DecodeError, MetadataError};
use crate::frame::{Frame, FrameSequence, TimingInfo};

/// Delay used when frame-0 timing metadata is absent or unparsable.
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// One frame as stored in the container, before compositing.
#[derive(Clone, Debug)]
pub struct RawFrame {
    /// Decoded pixels of the stored region
    pub image: RgbaImage,
    /// Placement the container declares for this region, if any
    pub declared_offset: Option<(u32, u32)>,
}

/// Random access to the raw frames of one byte stream.
///
/// Implement this for any container that stores frames as change-only
/// regions. [`open_reader`] picks an implementation by sniffing the stream.
pub trait FrameReader {
    /// Number of frames stored in the container.
    fn frame_count(&mut self) -> Result<usize, DecodeError>;

    /// Decode the stored region of frame `index`.
    fn read(&mut self, index: usize) -> Result<RawFrame, DecodeError>;

    /// Frame delay in centiseconds from the metadata of frame `index`.
    fn delay_centis(&mut self, index: usize) -> Result<u16, MetadataError>;
}

/// GIF reader yielding frames exactly as stored (no disposal, no compositing).
pub struct GifReader {
    frames: Vec<RawFrame>,
    delays: Vec<u16>,
}

impl GifReader {
    /// Read every frame of a GIF stream.
    pub fn new(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(Cursor::new(bytes)).map_err(|e| {
            // The decoder wants an image descriptor before the trailer.
            if is_frameless_gif(bytes) {
                DecodeError::NoFrames
            } else {
                DecodeError::Truncated(e.to_string())
            }
        })?;

        let mut frames = Vec::new();
        let mut delays = Vec::new();
        while let Some(frame) = decoder
            .read_next_frame()
            .map_err(|e| DecodeError::Truncated(e.to_string()))?
        {
            let width = u32::from(frame.width);
            let height = u32::from(frame.height);
            let image = RgbaImage::from_raw(width, height, frame.buffer.to_vec()).ok_or_else(|| {
                DecodeError::Truncated(format!(
                    "frame {} buffer does not match {}x{}",
                    frames.len(),
                    width,
                    height
                ))
            })?;
            frames.push(RawFrame {
                image,
                declared_offset: Some((u32::from(frame.left), u32::from(frame.top))),
            });
            delays.push(frame.delay);
        }

        Ok(Self { frames, delays })
    }
}

/// Whether a GIF stream reaches its trailer without a single image descriptor.
///
/// Walks the header, the global color table and any extension blocks. A
/// stream that ends early is not frameless; it is truncated.
fn is_frameless_gif(bytes: &[u8]) -> bool {
    const HEADER_LEN: usize = 13;
    if bytes.len() < HEADER_LEN {
        return false;
    }
    let packed = bytes[10];
    let mut pos = HEADER_LEN;
    if packed & 0x80 != 0 {
        pos += 3 * (1usize << ((packed & 0x07) + 1));
    }

    loop {
        match bytes.get(pos) {
            Some(0x3B) => return true,
            Some(0x21) => {
                // Introducer and label, then data sub-blocks up to a zero length.
                pos += 2;
                loop {
                    let Some(&len) = bytes.get(pos) else {
                        return false;
                    };
                    pos += 1 + usize::from(len);
                    if len == 0 {
                        break;
                    }
                }
            }
            _ => return false,
        }
    }
}

impl FrameReader for GifReader {
    fn frame_count(&mut self) -> Result<usize, DecodeError> {
        Ok(self.frames.len())
    }

    fn read(&mut self, index: usize) -> Result<RawFrame, DecodeError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or_else(|| DecodeError::Truncated(format!("frame {} out of range", index)))
    }

    fn delay_centis(&mut self, index: usize) -> Result<u16, MetadataError> {
        // A zero delay is what a frame without a graphics control extension reports.
        match self.delays.get(index) {
            Some(0) | None => Err(MetadataError::Missing),
            Some(&centis) => Ok(centis),
        }
    }
}

/// Reader for single-image formats. Carries no timing metadata.
pub struct StillReader {
    image: RgbaImage,
}

impl StillReader {
    pub fn new(bytes: &[u8], format: ImageFormat) -> Result<Self, DecodeError> {
        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| match e {
            ImageError::Unsupported(_) => DecodeError::UnsupportedFormat,
            other => DecodeError::Truncated(other.to_string()),
        })?;
        Ok(Self {
            image: image.to_rgba8(),
        })
    }
}

impl FrameReader for StillReader {
    fn frame_count(&mut self) -> Result<usize, DecodeError> {
        Ok(1)
    }

    fn read(&mut self, index: usize) -> Result<RawFrame, DecodeError> {
        if index != 0 {
            return Err(DecodeError::Truncated(format!("frame {} out of range", index)));
        }
        Ok(RawFrame {
            image: self.image.clone(),
            declared_offset: None,
        })
    }

    fn delay_centis(&mut self, _index: usize) -> Result<u16, MetadataError> {
        Err(MetadataError::Missing)
    }
}

/// Pick a reader for the byte stream by its magic bytes.
pub fn open_reader(bytes: &[u8]) -> Result<Box<dyn FrameReader>, DecodeError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Gif) => Ok(Box::new(GifReader::new(bytes)?)),
        Ok(format) => Ok(Box::new(StillReader::new(bytes, format)?)),
        Err(_) => Err(DecodeError::UnsupportedFormat),
    }
}

/// Decode a byte stream into composited frames and their shared delay.
///
/// ## Example
///
/// ```rust
/// use animview_core::{decode, DecodeError};
///
/// let result = decode(b"definitely not an image");
/// assert!(matches!(result, Err(DecodeError::UnsupportedFormat)));
/// ```
pub fn decode(bytes: &[u8]) -> Result<(FrameSequence, TimingInfo), DecodeError> {
    let mut reader = open_reader(bytes)?;
    decode_with(reader.as_mut(), DEFAULT_FRAME_DELAY)
}

/// Decode every frame from `reader`, compositing deltas over their predecessor.
///
/// `fallback_delay` applies when frame-0 timing metadata cannot be read.
pub fn decode_with(
    reader: &mut dyn FrameReader,
    fallback_delay: Duration,
) -> Result<(FrameSequence, TimingInfo), DecodeError> {
    let count = reader.frame_count()?;
    if count == 0 {
        return Err(DecodeError::NoFrames);
    }

    let mut frames: Vec<Frame> = Vec::with_capacity(count);
    let keyframe = reader.read(0)?;
    frames.push(Frame::new(keyframe.image));

    for i in 1..count {
        let delta = reader.read(i)?;
        let previous = frames[i - 1].image();
        let (x, y) = bottom_right_offset(previous, &delta.image);
        if let Some((left, top)) = delta.declared_offset {
            if i64::from(left) != x || i64::from(top) != y {
                log::trace!(
                    "frame {} declares offset ({}, {}), compositing at ({}, {})",
                    i,
                    left,
                    top,
                    x,
                    y
                );
            }
        }
        let composited = composite_delta(previous, &delta.image);
        frames.push(Frame::new(composited));
    }

    let timing = match reader.delay_centis(0) {
        Ok(centis) => TimingInfo::from_centis(centis),
        Err(err) => {
            log::debug!("using fallback frame delay: {}", err);
            TimingInfo::fallback(fallback_delay)
        }
    };

    log::debug!(
        "decoded {} frames, {}x{} keyframe, {:?} delay",
        frames.len(),
        frames[0].width(),
        frames[0].height(),
        timing.delay
    );

    let sequence = FrameSequence::new(frames).ok_or(DecodeError::NoFrames)?;
    Ok((sequence, timing))
}

/// Offset that aligns `delta` to the bottom-right corner of `canvas`.
///
/// Negative when the delta is larger than the canvas; the overhang is clipped.
#[inline]
pub fn bottom_right_offset(canvas: &RgbaImage, delta: &RgbaImage) -> (i64, i64) {
    (
        i64::from(canvas.width()) - i64::from(delta.width()),
        i64::from(canvas.height()) - i64::from(delta.height()),
    )
}

/// Layer `delta` over a copy of `previous`, anchored bottom-right.
///
/// The result has the dimensions of `previous`. Transparent delta pixels
/// leave the previous frame showing through.
pub fn composite_delta(previous: &RgbaImage, delta: &RgbaImage) -> RgbaImage {
    let mut canvas = RgbaImage::new(previous.width(), previous.height());
    imageops::overlay(&mut canvas, previous, 0, 0);
    let (x, y) = bottom_right_offset(&canvas, delta);
    imageops::overlay(&mut canvas, delta, x, y);
    canvas
}
