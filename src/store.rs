//! The active frame sequence, its delay and the playback position.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::frame::{Frame, FrameSequence};
use crate::playback::{ClockControl, PlaybackState};

/// Delay given to a single still image.
pub const STILL_IMAGE_DELAY: Duration = Duration::from_millis(1000);

/// Lock a mutex, recovering the guard if a panicking thread poisoned it.
///
/// Every critical section in this crate swaps whole values, so the data
/// behind a poisoned lock is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A consistent copy of the store taken under its lock.
#[derive(Clone, Debug)]
pub struct StoreSnapshot {
    pub sequence: Option<FrameSequence>,
    pub delay: Duration,
    pub index: usize,
    /// Bumped on every replace or clear
    pub revision: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    sequence: Option<FrameSequence>,
    delay: Duration,
    playback: PlaybackState,
}

/// Owner of the displayed frame sequence.
///
/// Writers swap the whole sequence under the lock; readers clone the
/// `FrameSequence` handle and read pixels without holding it.
#[derive(Debug, Default)]
pub struct FrameStore {
    state: Mutex<StoreState>,
    clock: Option<ClockControl>,
}

impl FrameStore {
    /// A store with no clock attached. Playback only moves via [`FrameStore::advance`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that restarts and stops `clock` whenever its content changes.
    pub fn with_clock(clock: ClockControl) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock: Some(clock),
        }
    }

    /// Install a new sequence and delay, rewind to frame 0 and restart the clock.
    ///
    /// Returns the new revision.
    pub fn replace(&self, sequence: FrameSequence, delay: Duration) -> u64 {
        let mut state = lock(&self.state);
        let epoch = state.playback.reset(sequence.len());
        state.sequence = Some(sequence);
        state.delay = delay;
        // Sent under the lock so clock commands arrive in revision order.
        if let Some(clock) = &self.clock {
            clock.restart(delay, epoch);
        }
        epoch
    }

    /// Wrap a single image as a one-frame sequence with the still-image delay.
    pub fn set_image(&self, frame: Frame) -> u64 {
        self.replace(FrameSequence::single(frame), STILL_IMAGE_DELAY)
    }

    /// Drop the current sequence. Nothing is displayable and the clock stops.
    pub fn clear(&self) -> u64 {
        let mut state = lock(&self.state);
        let epoch = state.playback.reset(0);
        state.sequence = None;
        if let Some(clock) = &self.clock {
            clock.stop();
        }
        epoch
    }

    /// Get the frame at `index`, wrapped to the sequence length.
    ///
    /// Returns None when no sequence is installed.
    pub fn current_frame(&self, index: usize) -> Option<Frame> {
        let state = lock(&self.state);
        let sequence = state.sequence.as_ref()?;
        sequence.get(index % sequence.len()).cloned()
    }

    pub fn delay(&self) -> Duration {
        lock(&self.state).delay
    }

    pub fn playback_index(&self) -> usize {
        lock(&self.state).playback.current_frame()
    }

    pub fn sequence(&self) -> Option<FrameSequence> {
        lock(&self.state).sequence.clone()
    }

    pub fn revision(&self) -> u64 {
        lock(&self.state).playback.epoch()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = lock(&self.state);
        StoreSnapshot {
            sequence: state.sequence.clone(),
            delay: state.delay,
            index: state.playback.current_frame(),
            revision: state.playback.epoch(),
        }
    }

    /// Apply one clock tick scheduled under `revision`.
    ///
    /// Returns the new index, or None when the tick is stale or nothing is
    /// displayable.
    pub fn advance(&self, revision: u64) -> Option<usize> {
        let mut state = lock(&self.state);
        if state.playback.epoch() != revision {
            log::trace!(
                "dropping tick for revision {} (current {})",
                revision,
                state.playback.epoch()
            );
            return None;
        }
        if state.playback.tick() {
            Some(state.playback.current_frame())
        } else {
            None
        }
    }
}
