//! The animated image view: store, clock and zoom cache wired together.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::RgbaImage;

use crate::codec::{decode_with, open_reader};
use crate::config::ViewConfig;
use crate::error::{DecodeError, ViewError, ZoomError};
use crate::frame::{Frame, FrameSequence, TimingInfo, TimingSource};
use crate::layout::preferred_size;
use crate::observer::{ViewEvent, ViewObserver};
use crate::playback::{ClockTick, PlaybackClock};
use crate::render::{render_sequence, RenderResult};
use crate::store::{lock, FrameStore};
use crate::zoom::{ZoomCache, ZoomInput, ZoomPolicy};

/// An animated, zoomable image.
///
/// Loading installs new frames and restarts playback; zooming schedules a
/// background rescale while the previous rendering keeps playing. All
/// methods take `&self` and may be called from any thread.
///
/// ## Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use animview_core::{ImageView, ViewConfig, ViewEvent};
///
/// let view = ImageView::new(ViewConfig::default(), Arc::new(|event: ViewEvent| {
///     if event.wants_repaint() {
///         // schedule a repaint of the surface
///     }
/// }))?;
/// view.load(&std::fs::read("spinner.gif")?)?;
/// view.set_zoom(2.0)?;
///
/// // In the surface's paint handler:
/// if let Some(paint) = view.render(640, 480) {
///     // draw paint.frame at (paint.x, paint.y)
/// }
/// ```
pub struct ImageView {
    config: ViewConfig,
    store: Arc<FrameStore>,
    zoom: ZoomCache,
    policy: Mutex<ZoomPolicy>,
    _clock: PlaybackClock,
}

impl ImageView {
    pub fn new(config: ViewConfig, observer: Arc<dyn ViewObserver>) -> Result<Self, ViewError> {
        let mut clock = PlaybackClock::new();
        let store = Arc::new(FrameStore::with_clock(clock.control()));

        let weak = Arc::downgrade(&store);
        let tick_observer = Arc::clone(&observer);
        clock.start(move |tick: ClockTick| {
            let Some(store) = weak.upgrade() else {
                return;
            };
            if !tick.advance {
                if store.revision() == tick.epoch {
                    tick_observer.on_event(ViewEvent::Restarted {
                        revision: tick.epoch,
                    });
                }
                return;
            }
            if let Some(index) = store.advance(tick.epoch) {
                tick_observer.on_event(ViewEvent::Tick { index });
            }
        })?;

        let zoom = ZoomCache::new(Arc::clone(&store), &config, observer)?;
        let policy = Mutex::new(ZoomPolicy::new(config.zoom_hysteresis));

        Ok(Self {
            config,
            store,
            zoom,
            policy,
            _clock: clock,
        })
    }

    /// Decode `bytes` and install the result.
    ///
    /// A single frame without timing metadata plays at the still-image
    /// delay. On error the current animation is left untouched.
    pub fn load(&self, bytes: &[u8]) -> Result<TimingInfo, DecodeError> {
        let mut reader = open_reader(bytes)?;
        let (sequence, timing) = decode_with(reader.as_mut(), self.config.fallback_delay())?;
        let delay = if sequence.len() == 1 && timing.source == TimingSource::Fallback {
            self.config.still_image_delay()
        } else {
            timing.delay
        };
        self.set_frames(Some(sequence), delay);
        Ok(timing)
    }

    /// Install a sequence (or nothing) and restart playback.
    ///
    /// The current zoom factor is reapplied against the new frames.
    pub fn set_frames(&self, sequence: Option<FrameSequence>, delay: Duration) {
        match sequence {
            Some(sequence) => {
                self.store.replace(sequence, delay);
            }
            None => {
                self.store.clear();
            }
        }
        self.zoom.source_changed();
    }

    /// Show a single still image.
    pub fn set_image(&self, image: RgbaImage) {
        let sequence = FrameSequence::single(Frame::new(image));
        self.set_frames(Some(sequence), self.config.still_image_delay());
    }

    /// Remove all frames. Paint requests return nothing until the next load.
    pub fn clear(&self) {
        self.set_frames(None, Duration::ZERO);
    }

    /// Set the zoom factor directly. Returns the zoom generation.
    pub fn set_zoom(&self, factor: f64) -> Result<u64, ZoomError> {
        self.zoom.set_zoom(factor)
    }

    /// Feed a value from an interactive zoom control.
    ///
    /// Returns the generation when the value was applied, None when it was
    /// held back because the control is still moving.
    pub fn zoom_input(&self, input: ZoomInput) -> Result<Option<u64>, ZoomError> {
        let apply = lock(&self.policy).decide(self.zoom.factor(), input);
        apply.map(|factor| self.zoom.set_zoom(factor)).transpose()
    }

    /// The zoom control finished moving; apply any held-back value.
    pub fn zoom_settled(&self) -> Result<Option<u64>, ZoomError> {
        let pending = lock(&self.policy).settle();
        pending.map(|factor| self.zoom.set_zoom(factor)).transpose()
    }

    /// The most recently requested zoom factor.
    pub fn zoom(&self) -> f64 {
        self.zoom.factor()
    }

    /// Generation and factor of the visible zoom rendering.
    pub fn committed_zoom(&self) -> Option<(u64, f64)> {
        self.zoom.committed()
    }

    /// The frame to paint now, zoom-scaled when a scaled copy is ready.
    pub fn current_frame(&self) -> Option<Frame> {
        let (sequence, index) = self.zoom.render_state()?;
        sequence.get(index % sequence.len()).cloned()
    }

    /// The current frame centered on a `width` x `height` surface.
    pub fn render(&self, width: u32, height: u32) -> Option<RenderResult> {
        let (sequence, index) = self.zoom.render_state()?;
        Some(render_sequence(&sequence, index, width, height))
    }

    /// Keyframe size at the requested zoom.
    pub fn preferred_size(&self) -> Option<(u32, u32)> {
        let sequence = self.store.sequence()?;
        let (width, height) = sequence.keyframe().dimensions();
        Some(preferred_size(width, height, self.zoom.factor()))
    }

    pub fn playback_index(&self) -> usize {
        self.store.playback_index()
    }

    pub fn frame_count(&self) -> usize {
        self.store.sequence().map_or(0, |s| s.len())
    }

    pub fn delay(&self) -> Duration {
        self.store.delay()
    }

    /// The unscaled source frames.
    pub fn sequence(&self) -> Option<FrameSequence> {
        self.store.sequence()
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }
}
