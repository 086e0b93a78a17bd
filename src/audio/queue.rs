//! Frame queues between the hardware threads and the rest of the system.
//!
//! Two queues with deliberately different overflow policies:
//!
//! * [`CaptureQueue`] — bounds latency.  Detection wants *fresh* audio, so
//!   when the consumer falls behind, old frames are discarded wholesale.
//! * [`PlaybackQueue`] — bounds memory without ever dropping.  Truncating
//!   queued speech is not acceptable, so a fast producer is throttled
//!   (blocked) instead once the backlog grows.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::frame::AudioFrame;

/// Soft capacity of the capture queue in frames (~3.2 s of audio).
pub const CAPTURE_SOFT_CAP: usize = 50;

/// Frames retained after a capture overflow (~0.64 s of audio).
pub const CAPTURE_RETAIN: usize = 10;

/// Playback backlog above which producers are throttled (~0.5 s of audio).
pub const PLAYBACK_BACKLOG: usize = 8;

// ---------------------------------------------------------------------------
// CaptureQueue
// ---------------------------------------------------------------------------

/// FIFO queue of captured frames with a freshness-over-completeness policy.
///
/// When a push grows the queue past [`CAPTURE_SOFT_CAP`], the oldest frames
/// are discarded until only [`CAPTURE_RETAIN`] remain.  Within the surviving
/// frames, capture order is always preserved.
///
/// The queue itself is not synchronised; the engine wraps it in a `Mutex`.
#[derive(Debug, Default)]
pub struct CaptureQueue {
    frames: VecDeque<AudioFrame>,
}

impl CaptureQueue {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
        }
    }

    /// Append a frame, applying the overflow policy.
    ///
    /// Returns the number of stale frames discarded (0 in the common case).
    pub fn push(&mut self, frame: AudioFrame) -> usize {
        self.frames.push_back(frame);

        if self.frames.len() <= CAPTURE_SOFT_CAP {
            return 0;
        }

        let mut dropped = 0;
        while self.frames.len() > CAPTURE_RETAIN {
            self.frames.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Remove and return the oldest frame, if any.
    pub fn pop(&mut self) -> Option<AudioFrame> {
        self.frames.pop_front()
    }

    /// Discard all pending frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PlaybackQueue
// ---------------------------------------------------------------------------

/// Ordered playback queue with producer backpressure.
///
/// * Producers call [`push_wait`](Self::push_wait): the call blocks while the
///   backlog exceeds [`PLAYBACK_BACKLOG`] and `running` is still set.  Frames
///   are never dropped.
/// * The playback thread calls [`pop_wait`](Self::pop_wait) with a bounded
///   timeout, so an engine `stop()` is always observed within one wait
///   interval.
/// * [`wake_all`](Self::wake_all) releases both sides during shutdown.
pub struct PlaybackQueue {
    inner: Mutex<VecDeque<AudioFrame>>,
    /// Signalled when a frame is pushed (wakes the playback thread).
    consumer_cv: Condvar,
    /// Signalled when a frame is popped (wakes throttled producers).
    producer_cv: Condvar,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            consumer_cv: Condvar::new(),
            producer_cv: Condvar::new(),
        }
    }

    /// Enqueue a frame, blocking while the backlog exceeds
    /// [`PLAYBACK_BACKLOG`].
    ///
    /// The wait is re-checked every 50 ms against `running`, so a stopping
    /// engine releases throttled producers promptly.  The frame is enqueued
    /// even when `running` has been cleared — the queue simply drains with
    /// the engine.
    pub fn push_wait(&self, frame: AudioFrame, running: &AtomicBool) {
        let mut queue = self.inner.lock().unwrap();
        while running.load(Ordering::SeqCst) && queue.len() > PLAYBACK_BACKLOG {
            let (guard, _timeout) = self
                .producer_cv
                .wait_timeout(queue, Duration::from_millis(50))
                .unwrap();
            queue = guard;
        }
        queue.push_back(frame);
        drop(queue);
        self.consumer_cv.notify_one();
    }

    /// Wait up to `timeout` for a frame; `None` on timeout or shutdown wake.
    ///
    /// A `None` with an empty queue is not an error — the playback thread
    /// simply loops back to waiting.
    pub fn pop_wait(&self, timeout: Duration, running: &AtomicBool) -> Option<AudioFrame> {
        let queue = self.inner.lock().unwrap();
        let (mut queue, _timeout) = self
            .consumer_cv
            .wait_timeout_while(queue, timeout, |q| {
                q.is_empty() && running.load(Ordering::SeqCst)
            })
            .unwrap();

        let frame = queue.pop_front();
        drop(queue);
        if frame.is_some() {
            self.producer_cv.notify_all();
        }
        frame
    }

    /// Wake every blocked producer and consumer (shutdown path).
    pub fn wake_all(&self) {
        self.consumer_cv.notify_all();
        self.producer_cv.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
