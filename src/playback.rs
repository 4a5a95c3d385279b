//! Playback position and the periodic clock that advances it.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

/// Shortest period the clock will run at.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Position within the active frame sequence.
///
/// Only two things move the index: [`PlaybackState::tick`] and
/// [`PlaybackState::reset`]. Each reset starts a new epoch so that ticks
/// scheduled for the previous sequence can be recognized and dropped.
///
/// ## Example
///
/// ```rust
/// use animview_core::PlaybackState;
///
/// let mut state = PlaybackState::new();
/// state.reset(3);
/// for _ in 0..4 {
///     state.tick();
/// }
/// assert_eq!(state.current_frame(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackState {
    /// Current frame index
    index: usize,
    /// Total number of frames (0 when nothing is displayable)
    frame_count: usize,
    /// Bumped on every reset
    epoch: u64,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind to frame 0 for a sequence of `frame_count` frames.
    ///
    /// Returns the new epoch.
    pub fn reset(&mut self, frame_count: usize) -> u64 {
        self.index = 0;
        self.frame_count = frame_count;
        self.epoch += 1;
        self.epoch
    }

    /// Advance to the next frame, wrapping at the end.
    ///
    /// Returns false (and leaves the index at 0) when there are no frames.
    pub fn tick(&mut self) -> bool {
        if self.frame_count == 0 {
            return false;
        }
        self.index = (self.index + 1) % self.frame_count;
        true
    }

    /// Get the current frame index.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.index
    }

    /// Get the total number of frames.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// One firing of the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockTick {
    /// Epoch the clock was restarted with
    pub epoch: u64,
    /// False for the immediate firing right after a restart, which only
    /// displays the current frame
    pub advance: bool,
}

#[derive(Debug)]
enum ClockCommand {
    Restart { delay: Duration, epoch: u64 },
    Stop,
    Shutdown,
}

/// Cloneable handle for restarting and stopping a running clock.
#[derive(Clone, Debug)]
pub struct ClockControl {
    tx: Sender<ClockCommand>,
}

impl ClockControl {
    /// Discard any pending tick and start over with a new period.
    ///
    /// The first firing happens immediately and does not advance.
    pub fn restart(&self, delay: Duration, epoch: u64) {
        let _ = self.tx.send(ClockCommand::Restart { delay, epoch });
    }

    /// Stop ticking until the next restart.
    pub fn stop(&self) {
        let _ = self.tx.send(ClockCommand::Stop);
    }
}

/// A dedicated ticker thread.
///
/// The clock idles until restarted. Restart and stop take effect before
/// the next tick, so a stopped or restarted clock never delivers a tick
/// scheduled under the old period. Dropping the clock stops the thread.
pub struct PlaybackClock {
    control: ClockControl,
    rx: Option<Receiver<ClockCommand>>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackClock {
    /// Create a clock that is not running yet.
    ///
    /// Its [`ClockControl`] may be handed out right away; commands sent
    /// before [`PlaybackClock::start`] are delivered once it runs.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            control: ClockControl { tx },
            rx: Some(rx),
            handle: None,
        }
    }

    /// Spawn the clock thread. `on_tick` runs on that thread.
    ///
    /// Does nothing if the clock was already started.
    pub fn start<F>(&mut self, on_tick: F) -> std::io::Result<()>
    where
        F: FnMut(ClockTick) + Send + 'static,
    {
        let Some(rx) = self.rx.take() else {
            return Ok(());
        };
        let handle = thread::Builder::new()
            .name("animview-clock".into())
            .spawn(move || run_clock(rx, on_tick))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Create and start a clock in one step.
    pub fn spawn<F>(on_tick: F) -> std::io::Result<Self>
    where
        F: FnMut(ClockTick) + Send + 'static,
    {
        let mut clock = Self::new();
        clock.start(on_tick)?;
        Ok(clock)
    }

    pub fn control(&self) -> ClockControl {
        self.control.clone()
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        let _ = self.control.tx.send(ClockCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            // Dropped from inside a tick callback: the thread exits on its own.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn run_clock<F>(rx: Receiver<ClockCommand>, mut on_tick: F)
where
    F: FnMut(ClockTick),
{
    let mut active: Option<(Duration, u64)> = None;
    loop {
        let command = match active {
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => return,
            },
            Some((delay, epoch)) => match rx.recv_timeout(delay) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    on_tick(ClockTick { epoch, advance: true });
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => return,
            },
        };

        match command {
            ClockCommand::Restart { delay, epoch } => {
                active = Some((delay.max(MIN_TICK), epoch));
                on_tick(ClockTick { epoch, advance: false });
            }
            ClockCommand::Stop => active = None,
            ClockCommand::Shutdown => return,
        }
    }
}
