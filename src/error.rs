//! Error types for decoding, zoom requests and background recompute.

/// Failure to turn a byte stream into a frame sequence.
///
/// Any of these leaves the previously installed animation untouched.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// No reader recognizes the byte stream.
    #[error("unsupported image format")]
    UnsupportedFormat,

    /// The container was readable but held zero frames.
    #[error("image contains no frames")]
    NoFrames,

    /// The stream ended early or a frame could not be decoded.
    #[error("truncated or unreadable image data: {0}")]
    Truncated(String),
}

/// Failure to read the frame-timing metadata.
///
/// Never surfaced by [`crate::decode`]; it only selects the fallback delay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("no timing metadata")]
    Missing,

    #[error("unparsable delay value {0:?}")]
    Unparsable(String),
}

/// Failure while scaling a frame sequence in the background.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecomputeError {
    /// The factor collapses a frame to an empty image.
    #[error("scaling {width}x{height} by {factor} yields an empty frame")]
    ZeroSize { width: u32, height: u32, factor: f64 },

    /// The scaled frame would exceed the configured pixel budget.
    #[error("scaled frame {width}x{height} exceeds the limit of {limit} pixels")]
    TooLarge { width: u32, height: u32, limit: u64 },

    #[error("scale failed: {0}")]
    Scale(String),
}

/// Failure to set up the background machinery of a view.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("failed to build recompute pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn playback clock: {0}")]
    Clock(#[from] std::io::Error),
}

/// Rejected zoom request.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ZoomError {
    #[error("zoom factor must be finite and greater than zero, got {0}")]
    InvalidFactor(f64),
}
