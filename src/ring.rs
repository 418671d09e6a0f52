//! # Frame Ring Buffer
//!
//! A fixed-size circular array of frame slots with one monotonically
//! advancing write cursor shared by all readers. Each consumer keeps its own
//! private [`Cursor`]; under back-pressure the fan-out consumers are snapped
//! forward to near the producer ("latest wins"), while the dump consumers
//! observe every slot.
//!
//! ## Locking
//!
//! The slot array and write cursor live under a `RwLock`: the producer and
//! the colorization republisher take it exclusively for the duration of one
//! slot copy, consumers take it shared while copying a slot out. The wakeup
//! signal (frame-ready / stop) lives under a separate `Mutex` + `Condvar` so
//! waiting consumers never hold the slot lock. Slot overwrites only happen
//! once a consumer is more than [`MAX_LAG`] slots behind, at which point that
//! consumer is also snapped forward and re-reads, preserving the
//! latest-wins-with-bounded-lag contract.

use std::sync::{Condvar, Mutex, RwLock};
use std::time::Instant;

use crate::frame::FrameUpdate;

/// Number of slots in the ring.
pub const RING_SIZE: usize = 16;
/// A fan-out consumer further behind than this is snapped forward.
pub const MAX_LAG: usize = 8;
/// Distance behind the producer a snapped consumer resumes at.
pub const MIN_LAG: usize = 2;

struct Slots {
    frames: Box<[FrameUpdate]>,
    write_index: usize,
    replay: Option<Box<FrameUpdate>>,
}

struct Signal {
    frame_ready: bool,
    stop: bool,
}

/// Outcome of a consumer wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// The frame-ready flag is set
    Frame,
    /// The requested deadline passed without a new frame
    Deadline,
    /// Shutdown was requested
    Stop,
}

pub struct FrameRing {
    slots: RwLock<Slots>,
    signal: Mutex<Signal>,
    ready: Condvar,
}

impl FrameRing {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots {
                frames: vec![FrameUpdate::zeroed(); RING_SIZE].into_boxed_slice(),
                write_index: 0,
                replay: None,
            }),
            signal: Mutex::new(Signal { frame_ready: false, stop: false }),
            ready: Condvar::new(),
        }
    }

    /// Advance the write cursor, bit-copy the record into the new slot and
    /// wake every consumer. With `buffered` the record is also kept in the
    /// replay slot.
    pub fn push(&self, frame: &FrameUpdate, buffered: bool) {
        {
            let mut slots = self.slots.write().expect("ring slot lock poisoned");
            slots.write_index = (slots.write_index + 1) % RING_SIZE;
            let index = slots.write_index;
            slots.frames[index] = *frame;
            if buffered {
                if let Some(slot) = slots.replay.as_deref_mut() {
                    *slot = *frame;
                } else {
                    slots.replay = Some(Box::new(*frame));
                }
            }
        }
        let mut signal = self.signal.lock().expect("ring signal lock poisoned");
        signal.frame_ready = true;
        drop(signal);
        self.ready.notify_all();
    }

    pub fn write_index(&self) -> usize {
        self.slots.read().expect("ring slot lock poisoned").write_index
    }

    /// Copy one slot into the caller's scratch record.
    pub fn read_slot(&self, index: usize, out: &mut FrameUpdate) {
        let slots = self.slots.read().expect("ring slot lock poisoned");
        *out = slots.frames[index];
    }

    /// Copy the replay slot out, if a buffered update was stored.
    pub fn replay_into(&self, out: &mut FrameUpdate) -> bool {
        let slots = self.slots.read().expect("ring slot lock poisoned");
        match &slots.replay {
            Some(slot) => {
                *out = **slot;
                true
            }
            None => false,
        }
    }

    /// Block until a frame is ready or shutdown is requested.
    /// Returns `false` on shutdown.
    pub fn wait_frame(&self) -> bool {
        let mut signal = self.signal.lock().expect("ring signal lock poisoned");
        while !signal.frame_ready && !signal.stop {
            signal = self.ready.wait(signal).expect("ring signal lock poisoned");
        }
        !signal.stop
    }

    /// Block until a frame is ready, the deadline passes, or shutdown is
    /// requested. `None` waits indefinitely for a frame.
    pub fn wait_frame_until(&self, deadline: Option<Instant>) -> Wakeup {
        let mut signal = self.signal.lock().expect("ring signal lock poisoned");
        loop {
            if signal.stop {
                return Wakeup::Stop;
            }
            if signal.frame_ready {
                return Wakeup::Frame;
            }
            match deadline {
                None => {
                    signal = self.ready.wait(signal).expect("ring signal lock poisoned");
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Wakeup::Deadline;
                    }
                    let (guard, _) = self
                        .ready
                        .wait_timeout(signal, deadline - now)
                        .expect("ring signal lock poisoned");
                    signal = guard;
                }
            }
        }
    }

    pub fn clear_frame_ready(&self) {
        self.signal.lock().expect("ring signal lock poisoned").frame_ready = false;
    }

    pub fn request_stop(&self) {
        let mut signal = self.signal.lock().expect("ring signal lock poisoned");
        signal.stop = true;
        drop(signal);
        self.ready.notify_all();
    }

    pub fn stopped(&self) -> bool {
        self.signal.lock().expect("ring signal lock poisoned").stop
    }
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer's private position in the ring.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pos: usize,
    snap: bool,
}

impl Cursor {
    /// Cursor with the latest-wins snap-forward policy, starting at `pos`.
    pub fn fanout_at(pos: usize) -> Self {
        Self { pos, snap: true }
    }

    /// Cursor that observes every slot (dump sinks), starting at `pos`.
    pub fn lossless_at(pos: usize) -> Self {
        Self { pos, snap: false }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether this consumer has processed everything the producer wrote.
    pub fn caught_up(&self, write_index: usize) -> bool {
        self.pos == write_index
    }

    /// Step to the next slot. A snapping cursor that would fall more than
    /// [`MAX_LAG`] behind jumps to [`MIN_LAG`] slots behind the producer.
    pub fn advance(&mut self, write_index: usize) -> usize {
        self.pos = (self.pos + 1) % RING_SIZE;
        if self.snap {
            let lag = (write_index + RING_SIZE - self.pos) % RING_SIZE;
            if lag > MAX_LAG {
                self.pos = (write_index + RING_SIZE - MIN_LAG) % RING_SIZE;
            }
        }
        self.pos
    }
}
