//! # animview-core
//!
//! Core engine for animated, zoomable image views.
//!
//! This crate provides platform-agnostic logic for:
//! - Decoding delta-encoded animations (GIF) into fully composited frames
//! - Holding the active frame sequence and its playback position
//! - Driving playback from a periodic clock thread
//! - Rescaling frames in the background when the zoom changes, without
//!   ever letting a stale rescale replace a newer one
//!
//! ## Features
//!
//! - `serde` - Enable serialization/deserialization for configuration
//! - `toml` - Load [`ViewConfig`] from a TOML string
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use animview_core::{ImageView, NoopObserver, ViewConfig, ZoomInput};
//!
//! let view = ImageView::new(ViewConfig::default(), Arc::new(NoopObserver))?;
//! view.load(&gif_bytes)?;
//!
//! // Slider mid-drag: applied only when it moved far enough
//! view.zoom_input(ZoomInput::from_percent(180, true))?;
//! // Slider released
//! view.zoom_settled()?;
//!
//! let frame = view.current_frame();
//! ```

mod codec;
mod config;
mod error;
mod frame;
pub mod layout;
mod observer;
mod playback;
pub mod render;
mod store;
mod view;
mod zoom;

pub use codec::{
    bottom_right_offset, composite_delta, decode, decode_with, open_reader, FrameReader, GifReader,
    RawFrame, StillReader, DEFAULT_FRAME_DELAY,
};
pub use config::ViewConfig;
pub use error::{DecodeError, MetadataError, RecomputeError, ViewError, ZoomError};
pub use frame::{Frame, FrameSequence, TimingInfo, TimingSource};
pub use observer::{NoopObserver, ViewEvent, ViewObserver};
pub use playback::{ClockControl, ClockTick, PlaybackClock, PlaybackState};
pub use render::RenderResult;
pub use store::{FrameStore, StoreSnapshot, STILL_IMAGE_DELAY};
pub use view::ImageView;
pub use zoom::{
    scaled_dimensions, FrameScaler, ResampleScaler, ScaleFilter, ZoomCache, ZoomInput, ZoomPolicy,
};
