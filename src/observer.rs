//! Notifications from the engine to the render surface.

use crate::error::RecomputeError;

/// Something the render surface may want to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    /// The clock restarted; the current frame should be shown now.
    Restarted { revision: u64 },
    /// The clock advanced playback.
    Tick { index: usize },
    /// A zoomed sequence (or the unscaled alias) became visible.
    ZoomCommitted { generation: u64, factor: f64 },
    /// A recompute was superseded by a newer request and dropped.
    ZoomDiscarded { generation: u64 },
    /// A recompute failed; the previous rendering stays in place.
    RecomputeFailed {
        generation: u64,
        error: RecomputeError,
    },
}

impl ViewEvent {
    /// Whether the surface should repaint in response.
    pub fn wants_repaint(&self) -> bool {
        matches!(
            self,
            ViewEvent::Restarted { .. } | ViewEvent::Tick { .. } | ViewEvent::ZoomCommitted { .. }
        )
    }
}

/// Receiver of [`ViewEvent`]s.
///
/// Called from the clock thread and from recompute workers, never while an
/// engine lock is held. Closures `Fn(ViewEvent) + Send + Sync` implement it.
pub trait ViewObserver: Send + Sync {
    fn on_event(&self, event: ViewEvent);
}

impl<F> ViewObserver for F
where
    F: Fn(ViewEvent) + Send + Sync,
{
    fn on_event(&self, event: ViewEvent) {
        self(event)
    }
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ViewObserver for NoopObserver {
    fn on_event(&self, _event: ViewEvent) {}
}
