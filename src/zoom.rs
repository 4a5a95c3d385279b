//! Zoom-scaled copies of the frame sequence, recomputed in the background.
//!
//! Every [`ZoomCache::set_zoom`] call takes a new generation number. A
//! background pass scales a snapshot of the source frames and commits the
//! result only if its generation is still the newest when it finishes, so
//! a slow, superseded pass can never overwrite a fresher one.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use image::imageops::{self, FilterType};

use crate::config::ViewConfig;
use crate::error::{RecomputeError, ViewError, ZoomError};
use crate::frame::{Frame, FrameSequence};
use crate::observer::{ViewEvent, ViewObserver};
use crate::store::{lock, FrameStore};

/// Resampling filter used when scaling frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScaleFilter {
    Nearest,
    Triangle,
    /// Bicubic
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ScaleFilter> for FilterType {
    fn from(filter: ScaleFilter) -> Self {
        match filter {
            ScaleFilter::Nearest => FilterType::Nearest,
            ScaleFilter::Triangle => FilterType::Triangle,
            ScaleFilter::CatmullRom => FilterType::CatmullRom,
            ScaleFilter::Gaussian => FilterType::Gaussian,
            ScaleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Output size of a frame scaled by `factor`, rounded per axis.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let w = (f64::from(width) * factor).round();
    let h = (f64::from(height) * factor).round();
    (w as u32, h as u32)
}

/// Scales one frame. Runs on recompute workers.
pub trait FrameScaler: Send + Sync {
    fn scale(&self, frame: &Frame, factor: f64) -> Result<Frame, RecomputeError>;
}

/// [`FrameScaler`] backed by `image`'s resampling filters.
#[derive(Clone, Copy, Debug)]
pub struct ResampleScaler {
    pub filter: ScaleFilter,
    /// Largest output frame allowed, in pixels
    pub max_pixels: u64,
}

impl ResampleScaler {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            filter: config.filter,
            max_pixels: config.max_scaled_pixels,
        }
    }
}

impl Default for ResampleScaler {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl FrameScaler for ResampleScaler {
    fn scale(&self, frame: &Frame, factor: f64) -> Result<Frame, RecomputeError> {
        let (width, height) = scaled_dimensions(frame.width(), frame.height(), factor);
        if width == 0 || height == 0 {
            return Err(RecomputeError::ZeroSize {
                width: frame.width(),
                height: frame.height(),
                factor,
            });
        }
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(RecomputeError::TooLarge {
                width,
                height,
                limit: self.max_pixels,
            });
        }
        let scaled = imageops::resize(frame.image(), width, height, self.filter.into());
        Ok(Frame::new(scaled))
    }
}

/// A value from a continuously adjusting zoom control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomInput {
    pub factor: f64,
    /// The control is still moving (e.g. a slider mid-drag)
    pub adjusting: bool,
}

impl ZoomInput {
    pub fn adjusting(factor: f64) -> Self {
        Self {
            factor,
            adjusting: true,
        }
    }

    pub fn settled(factor: f64) -> Self {
        Self {
            factor,
            adjusting: false,
        }
    }

    /// From a percentage control where 100 is unscaled.
    pub fn from_percent(percent: u32, adjusting: bool) -> Self {
        Self {
            factor: f64::from(percent) / 100.0,
            adjusting,
        }
    }
}

/// Hysteresis for zoom values arriving mid-gesture.
///
/// While the control is adjusting, a factor is applied only if it moved
/// more than `threshold` away from the current one. Skipped values are kept
/// as pending and applied once the control settles.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoomPolicy {
    /// Absolute factor difference (0.10 = ten percentage points)
    pub threshold: f64,
    pending: Option<f64>,
}

impl ZoomPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            pending: None,
        }
    }

    /// Decide whether `input` should be applied now, given the current factor.
    pub fn decide(&mut self, current: f64, input: ZoomInput) -> Option<f64> {
        if input.adjusting && (input.factor - current).abs() <= self.threshold {
            self.pending = Some(input.factor);
            return None;
        }
        self.pending = None;
        Some(input.factor)
    }

    /// The control settled without sending a final value.
    pub fn settle(&mut self) -> Option<f64> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<f64> {
        self.pending
    }
}

#[derive(Clone, Debug)]
struct Committed {
    generation: u64,
    factor: f64,
    /// The store sequence this was derived from
    source: FrameSequence,
    derived: FrameSequence,
}

#[derive(Debug)]
struct ZoomState {
    factor: f64,
    generation: u64,
    committed: Option<Committed>,
}

struct Shared {
    store: Arc<FrameStore>,
    state: Mutex<ZoomState>,
    /// Mirror of `state.generation` for lock-free staleness checks
    latest: AtomicU64,
    scaler: Arc<dyn FrameScaler>,
    observer: Arc<dyn ViewObserver>,
}

/// Derived, zoom-scaled copy of a [`FrameStore`]'s sequence.
///
/// Recomputes run on a small fixed pool. Requests are coalesced: a queued
/// pass that has been superseded exits before doing any work, and a running
/// one stops at the next frame boundary.
pub struct ZoomCache {
    shared: Arc<Shared>,
    pool: rayon::ThreadPool,
}

impl ZoomCache {
    /// A cache over `store` using the configured filter and pool size.
    pub fn new(
        store: Arc<FrameStore>,
        config: &ViewConfig,
        observer: Arc<dyn ViewObserver>,
    ) -> Result<Self, ViewError> {
        Self::with_scaler(
            store,
            Arc::new(ResampleScaler::from_config(config)),
            config.worker_threads,
            observer,
        )
    }

    /// A cache with a custom scaler and `workers` recompute threads.
    pub fn with_scaler(
        store: Arc<FrameStore>,
        scaler: Arc<dyn FrameScaler>,
        workers: usize,
        observer: Arc<dyn ViewObserver>,
    ) -> Result<Self, ViewError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("animview-zoom-{}", i))
            .panic_handler(|payload| {
                log::error!("zoom worker panicked: {}", panic_message(payload.as_ref()));
            })
            .build()?;
        Ok(Self {
            shared: Arc::new(Shared {
                store,
                state: Mutex::new(ZoomState {
                    factor: 1.0,
                    generation: 0,
                    committed: None,
                }),
                latest: AtomicU64::new(0),
                scaler,
                observer,
            }),
            pool,
        })
    }

    /// Request a new zoom factor. Returns the generation assigned to it.
    ///
    /// A factor of exactly 1.0 commits an alias of the source immediately.
    /// Any other factor schedules a background pass.
    pub fn set_zoom(&self, factor: f64) -> Result<u64, ZoomError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ZoomError::InvalidFactor(factor));
        }
        let state = lock(&self.shared.state);
        Ok(self.request(state, factor))
    }

    /// Drop the derived sequence and recompute the current factor against
    /// the store's new content.
    ///
    /// The factor is read and re-requested under one lock, so a concurrent
    /// [`ZoomCache::set_zoom`] is never reverted.
    pub fn source_changed(&self) -> u64 {
        let mut state = lock(&self.shared.state);
        state.committed = None;
        let factor = state.factor;
        self.request(state, factor)
    }

    /// Take a generation for `factor` and either alias the source (1.0) or
    /// schedule a background pass. Releases `state` before notifying.
    fn request(&self, mut state: MutexGuard<'_, ZoomState>, factor: f64) -> u64 {
        state.generation += 1;
        state.factor = factor;
        let generation = state.generation;
        self.shared.latest.store(generation, Ordering::SeqCst);

        let source = self.shared.store.sequence();
        if factor == 1.0 {
            state.committed = source.map(|sequence| Committed {
                generation,
                factor,
                source: sequence.clone(),
                derived: sequence,
            });
            drop(state);
            self.shared
                .observer
                .on_event(ViewEvent::ZoomCommitted { generation, factor });
            return generation;
        }
        drop(state);

        let shared = Arc::clone(&self.shared);
        self.pool
            .spawn(move || shared.recompute(generation, factor, source));
        generation
    }

    /// The sequence to paint: the derived one if it belongs to the store's
    /// current source, else the source itself. None when the store is empty.
    pub fn current_render_sequence(&self) -> Option<FrameSequence> {
        self.render_state().map(|(sequence, _)| sequence)
    }

    /// The sequence to paint together with the playback index, both read
    /// from one store snapshot.
    pub fn render_state(&self) -> Option<(FrameSequence, usize)> {
        let snapshot = self.shared.store.snapshot();
        let source = snapshot.sequence?;
        let state = lock(&self.shared.state);
        let sequence = match &state.committed {
            Some(committed) if committed.source.ptr_eq(&source) => committed.derived.clone(),
            _ => source,
        };
        Some((sequence, snapshot.index))
    }

    /// The most recently requested factor.
    pub fn factor(&self) -> f64 {
        lock(&self.shared.state).factor
    }

    /// The newest generation handed out.
    pub fn generation(&self) -> u64 {
        self.shared.latest.load(Ordering::SeqCst)
    }

    /// Generation and factor of the visible derived sequence.
    pub fn committed(&self) -> Option<(u64, f64)> {
        lock(&self.shared.state)
            .committed
            .as_ref()
            .map(|c| (c.generation, c.factor))
    }
}

impl Shared {
    fn is_stale(&self, generation: u64) -> bool {
        self.latest.load(Ordering::SeqCst) != generation
    }

    fn discard(&self, generation: u64) {
        log::debug!("discarding stale zoom recompute (generation {})", generation);
        self.observer
            .on_event(ViewEvent::ZoomDiscarded { generation });
    }

    fn recompute(&self, generation: u64, factor: f64, source: Option<FrameSequence>) {
        if self.is_stale(generation) {
            self.discard(generation);
            return;
        }

        let Some(source) = source else {
            self.commit(generation, factor, None);
            return;
        };

        let mut frames = Vec::with_capacity(source.len());
        for (i, frame) in source.iter().enumerate() {
            if self.is_stale(generation) {
                self.discard(generation);
                return;
            }
            let start = Instant::now();
            let scaled = panic::catch_unwind(AssertUnwindSafe(|| {
                self.scaler.scale(frame, factor)
            }))
            .unwrap_or_else(|payload| {
                Err(RecomputeError::Scale(format!(
                    "scaler panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
            match scaled {
                Ok(scaled) => frames.push(scaled),
                Err(_) if self.is_stale(generation) => {
                    self.discard(generation);
                    return;
                }
                Err(error) => {
                    log::warn!(
                        "zoom recompute failed on frame {} (generation {}): {}",
                        i,
                        generation,
                        error
                    );
                    self.observer
                        .on_event(ViewEvent::RecomputeFailed { generation, error });
                    return;
                }
            }
            log::trace!("scaled frame {} in {:?}", i, start.elapsed());
        }

        match FrameSequence::new(frames) {
            Some(derived) => self.commit(generation, factor, Some((source, derived))),
            None => self.commit(generation, factor, None),
        }
    }

    fn commit(&self, generation: u64, factor: f64, result: Option<(FrameSequence, FrameSequence)>) {
        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                drop(state);
                self.discard(generation);
                return;
            }

            let current = self.store.sequence();
            let committed = match (result, current) {
                (Some((source, derived)), Some(current)) if source.ptr_eq(&current) => {
                    Some(Committed {
                        generation,
                        factor,
                        source,
                        derived,
                    })
                }
                // The store was cleared while scaling.
                (_, None) => None,
                // The store was replaced while scaling.
                _ => {
                    drop(state);
                    self.discard(generation);
                    return;
                }
            };
            state.committed = committed;
        }

        log::debug!("committed zoom {} (generation {})", factor, generation);
        self.observer
            .on_event(ViewEvent::ZoomCommitted { generation, factor });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::channel_observer;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn sequence(len: usize, width: u32, height: u32) -> FrameSequence {
        let frames = (0..len)
            .map(|i| Frame::new(RgbaImage::from_pixel(width, height, Rgba([i as u8, 9, 9, 255]))))
            .collect();
        FrameSequence::new(frames).unwrap()
    }

    /// Blocks on `gate` when asked to scale by `gated_factor`, then
    /// optionally fails.
    struct GatedScaler {
        gated_factor: f64,
        fail: bool,
        gate: Receiver<()>,
        inner: ResampleScaler,
    }

    impl GatedScaler {
        fn new(gated_factor: f64) -> (Arc<Self>, Sender<()>) {
            Self::build(gated_factor, false)
        }

        fn failing(gated_factor: f64) -> (Arc<Self>, Sender<()>) {
            Self::build(gated_factor, true)
        }

        fn build(gated_factor: f64, fail: bool) -> (Arc<Self>, Sender<()>) {
            let (release, gate) = unbounded();
            let scaler = Self {
                gated_factor,
                fail,
                gate,
                inner: ResampleScaler::default(),
            };
            (Arc::new(scaler), release)
        }
    }

    impl FrameScaler for GatedScaler {
        fn scale(&self, frame: &Frame, factor: f64) -> Result<Frame, RecomputeError> {
            if factor == self.gated_factor {
                let _ = self.gate.recv();
                if self.fail {
                    return Err(RecomputeError::Scale("out of memory".into()));
                }
            }
            self.inner.scale(frame, factor)
        }
    }

    struct PanickingScaler {
        panicking_factor: f64,
    }

    impl FrameScaler for PanickingScaler {
        fn scale(&self, frame: &Frame, factor: f64) -> Result<Frame, RecomputeError> {
            if factor == self.panicking_factor {
                panic!("resampler blew up");
            }
            ResampleScaler::default().scale(frame, factor)
        }
    }

    struct CountingScaler {
        calls: AtomicUsize,
    }

    impl FrameScaler for CountingScaler {
        fn scale(&self, frame: &Frame, factor: f64) -> Result<Frame, RecomputeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ResampleScaler::default().scale(frame, factor)
        }
    }

    struct FailingScaler {
        failing_factor: f64,
    }

    impl FrameScaler for FailingScaler {
        fn scale(&self, frame: &Frame, factor: f64) -> Result<Frame, RecomputeError> {
            if factor == self.failing_factor {
                return Err(RecomputeError::Scale("out of memory".into()));
            }
            ResampleScaler::default().scale(frame, factor)
        }
    }

    #[test]
    fn test_scaled_dimensions_round() {
        assert_eq!(scaled_dimensions(10, 10, 1.5), (15, 15));
        assert_eq!(scaled_dimensions(3, 5, 0.5), (2, 3));
        assert_eq!(scaled_dimensions(7, 7, 1.0), (7, 7));
    }

    #[test]
    fn test_resample_rejects_empty_and_oversized() {
        let frame = Frame::new(RgbaImage::new(2, 2));
        let scaler = ResampleScaler::default();
        assert!(matches!(
            scaler.scale(&frame, 0.1),
            Err(RecomputeError::ZeroSize { .. })
        ));

        let tight = ResampleScaler {
            filter: ScaleFilter::Nearest,
            max_pixels: 15,
        };
        assert!(matches!(
            tight.scale(&frame, 2.0),
            Err(RecomputeError::TooLarge { width: 4, height: 4, limit: 15 })
        ));
        assert_eq!(tight.scale(&frame, 1.5).unwrap().dimensions(), (3, 3));
    }

    #[test]
    fn test_unit_zoom_aliases_source_without_recompute() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(3, 4, 4), Duration::from_millis(10));
        let scaler = Arc::new(CountingScaler {
            calls: AtomicUsize::new(0),
        });
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store.clone(), scaler.clone(), 2, observer).unwrap();

        let generation = cache.set_zoom(1.0).unwrap();
        // Committed synchronously, before set_zoom returned.
        assert_eq!(
            events.rx.try_recv().unwrap(),
            ViewEvent::ZoomCommitted { generation, factor: 1.0 }
        );
        assert_eq!(cache.committed(), Some((generation, 1.0)));

        let rendered = cache.current_render_sequence().unwrap();
        assert!(rendered.ptr_eq(&store.sequence().unwrap()));
        assert_eq!(scaler.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zoom_scales_every_frame() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(3, 4, 6), Duration::from_millis(10));
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::new(store.clone(), &ViewConfig::default(), observer).unwrap();

        let generation = cache.set_zoom(2.0).unwrap();
        assert_eq!(
            events.settled(generation),
            ViewEvent::ZoomCommitted { generation, factor: 2.0 }
        );

        let rendered = cache.current_render_sequence().unwrap();
        assert_eq!(rendered.len(), 3);
        for (i, frame) in rendered.iter().enumerate() {
            assert_eq!(frame.dimensions(), (8, 12));
            assert_eq!(frame.pixel(3, 3), Some(Rgba([i as u8, 9, 9, 255])));
        }
    }

    #[test]
    fn test_slow_stale_recompute_never_wins() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(2, 4, 4), Duration::from_millis(10));
        let (scaler, release) = GatedScaler::new(2.0);
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store, scaler, 2, observer).unwrap();

        let g1 = cache.set_zoom(2.0).unwrap();
        let g2 = cache.set_zoom(3.0).unwrap();
        assert!(g2 > g1);

        assert_eq!(
            events.settled(g2),
            ViewEvent::ZoomCommitted { generation: g2, factor: 3.0 }
        );
        drop(release);
        assert_eq!(events.settled(g1), ViewEvent::ZoomDiscarded { generation: g1 });

        assert_eq!(cache.committed(), Some((g2, 3.0)));
        let rendered = cache.current_render_sequence().unwrap();
        assert_eq!(rendered.keyframe().dimensions(), (12, 12));
    }

    #[test]
    fn test_fast_older_recompute_is_overwritten() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(2, 4, 4), Duration::from_millis(10));
        let (scaler, release) = GatedScaler::new(3.0);
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store, scaler, 2, observer).unwrap();

        let g1 = cache.set_zoom(2.0).unwrap();
        let g2 = cache.set_zoom(3.0).unwrap();

        // g1 may commit (if it finished before g2 was issued) or be discarded.
        events.settled(g1);
        drop(release);
        assert_eq!(
            events.settled(g2),
            ViewEvent::ZoomCommitted { generation: g2, factor: 3.0 }
        );
        assert_eq!(cache.committed(), Some((g2, 3.0)));
        let rendered = cache.current_render_sequence().unwrap();
        assert_eq!(rendered.keyframe().dimensions(), (12, 12));
    }

    #[test]
    fn test_failed_recompute_keeps_last_good() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(2, 4, 4), Duration::from_millis(10));
        let scaler = Arc::new(FailingScaler { failing_factor: 5.0 });
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store, scaler, 1, observer).unwrap();

        let good = cache.set_zoom(2.0).unwrap();
        events.settled(good);
        let bad = cache.set_zoom(5.0).unwrap();
        assert!(matches!(
            events.settled(bad),
            ViewEvent::RecomputeFailed { .. }
        ));

        assert_eq!(cache.committed(), Some((good, 2.0)));
        let rendered = cache.current_render_sequence().unwrap();
        assert_eq!(rendered.keyframe().dimensions(), (8, 8));
    }

    #[test]
    fn test_replace_during_recompute_discards_result() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(2, 4, 4), Duration::from_millis(10));
        let (scaler, release) = GatedScaler::new(2.0);
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store.clone(), scaler, 2, observer).unwrap();

        let g1 = cache.set_zoom(2.0).unwrap();
        let replacement = sequence(3, 5, 5);
        store.replace(replacement.clone(), Duration::from_millis(10));
        drop(release);
        assert_eq!(events.settled(g1), ViewEvent::ZoomDiscarded { generation: g1 });

        // Until recomputed, the new source shows unscaled.
        let rendered = cache.current_render_sequence().unwrap();
        assert!(rendered.ptr_eq(&replacement));

        let g2 = cache.source_changed();
        assert_eq!(
            events.settled(g2),
            ViewEvent::ZoomCommitted { generation: g2, factor: 2.0 }
        );
        let rendered = cache.current_render_sequence().unwrap();
        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered.keyframe().dimensions(), (10, 10));
    }

    #[test]
    fn test_clear_during_recompute_commits_empty() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(2, 4, 4), Duration::from_millis(10));
        let (scaler, release) = GatedScaler::new(2.0);
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store.clone(), scaler, 2, observer).unwrap();

        let generation = cache.set_zoom(2.0).unwrap();
        store.clear();
        drop(release);

        assert_eq!(
            events.settled(generation),
            ViewEvent::ZoomCommitted { generation, factor: 2.0 }
        );
        assert_eq!(cache.committed(), None);
        assert!(cache.current_render_sequence().is_none());
    }

    #[test]
    fn test_superseded_failure_is_discarded() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(2, 4, 4), Duration::from_millis(10));
        let (scaler, release) = GatedScaler::failing(5.0);
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store, scaler, 2, observer).unwrap();

        let g1 = cache.set_zoom(5.0).unwrap();
        let g2 = cache.set_zoom(2.0).unwrap();
        assert_eq!(
            events.settled(g2),
            ViewEvent::ZoomCommitted { generation: g2, factor: 2.0 }
        );
        drop(release);
        assert_eq!(events.settled(g1), ViewEvent::ZoomDiscarded { generation: g1 });
        assert_eq!(cache.committed(), Some((g2, 2.0)));
    }

    #[test]
    fn test_scaler_panic_reported_as_failure() {
        let store = Arc::new(FrameStore::new());
        store.replace(sequence(2, 4, 4), Duration::from_millis(10));
        let scaler = Arc::new(PanickingScaler { panicking_factor: 3.0 });
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::with_scaler(store, scaler, 1, observer).unwrap();

        let bad = cache.set_zoom(3.0).unwrap();
        match events.settled(bad) {
            ViewEvent::RecomputeFailed { error: RecomputeError::Scale(message), .. } => {
                assert!(message.contains("resampler blew up"));
            }
            other => panic!("unexpected event {:?}", other),
        }

        // The pool survives and keeps serving requests.
        let good = cache.set_zoom(2.0).unwrap();
        assert_eq!(
            events.settled(good),
            ViewEvent::ZoomCommitted { generation: good, factor: 2.0 }
        );
    }

    #[test]
    fn test_source_changed_keeps_concurrent_factor() {
        for _ in 0..200 {
            let store = Arc::new(FrameStore::new());
            store.replace(sequence(1, 2, 2), Duration::from_millis(10));
            let cache = Arc::new(
                ZoomCache::new(store, &ViewConfig::default(), Arc::new(crate::NoopObserver))
                    .unwrap(),
            );
            cache.set_zoom(2.0).unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let zoomer = {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.set_zoom(3.0).unwrap()
                })
            };
            barrier.wait();
            for _ in 0..8 {
                cache.source_changed();
            }
            zoomer.join().unwrap();

            // Every re-request after the 3.0 call must carry 3.0 forward.
            assert_eq!(cache.factor(), 3.0);
        }
    }

    #[test]
    fn test_zoom_without_source_commits_nothing() {
        let store = Arc::new(FrameStore::new());
        let (observer, mut events) = channel_observer();
        let cache = ZoomCache::new(store, &ViewConfig::default(), observer).unwrap();

        let generation = cache.set_zoom(2.0).unwrap();
        assert_eq!(
            events.settled(generation),
            ViewEvent::ZoomCommitted { generation, factor: 2.0 }
        );
        assert!(cache.current_render_sequence().is_none());
        assert_eq!(cache.committed(), None);
    }

    #[test]
    fn test_invalid_factor_rejected() {
        let store = Arc::new(FrameStore::new());
        let cache =
            ZoomCache::new(store, &ViewConfig::default(), Arc::new(crate::NoopObserver)).unwrap();
        assert_eq!(cache.set_zoom(0.0), Err(ZoomError::InvalidFactor(0.0)));
        assert!(cache.set_zoom(-1.0).is_err());
        assert!(cache.set_zoom(f64::NAN).is_err());
        assert!(cache.set_zoom(f64::INFINITY).is_err());
        assert_eq!(cache.generation(), 0);
    }

    #[test]
    fn test_policy_hysteresis() {
        let mut policy = ZoomPolicy::new(0.10);

        assert_eq!(policy.decide(1.0, ZoomInput::adjusting(1.05)), None);
        assert_eq!(policy.pending(), Some(1.05));
        assert_eq!(policy.decide(1.0, ZoomInput::adjusting(1.25)), Some(1.25));
        assert_eq!(policy.pending(), None);

        assert_eq!(policy.decide(1.25, ZoomInput::adjusting(1.30)), None);
        assert_eq!(policy.settle(), Some(1.30));
        assert_eq!(policy.settle(), None);

        // Settled values always apply, however small the change.
        assert_eq!(policy.decide(1.30, ZoomInput::settled(1.31)), Some(1.31));
    }

    #[test]
    fn test_zoom_input_from_percent() {
        let input = ZoomInput::from_percent(150, true);
        assert_eq!(input.factor, 1.5);
        assert!(input.adjusting);
    }
}
