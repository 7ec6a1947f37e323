//! Bounded SPSC frame queues
//!
//! These queues decouple the real-time audio callbacks from the worker
//! threads. Enqueue never blocks: when the queue is full the newest
//! frame is rejected and counted. Dequeue either returns immediately or
//! waits with a bounded poll, so no consumer blocks indefinitely.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::frame::AudioFrame;

/// Poll granularity for [`FrameQueue::pop_timeout`].
const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Bounded single-producer single-consumer frame queue.
///
/// Capacity bounds the worst-case latency the queue can add; it is a
/// rate-decoupling buffer, not a correctness buffer.
pub struct FrameQueue {
    queue: ArrayQueue<AudioFrame>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push a frame without blocking.
    ///
    /// Returns false if the queue is full; the frame is dropped and the
    /// overflow counter incremented. Safe to call from an audio callback.
    pub fn push(&self, frame: AudioFrame) -> bool {
        match self.queue.push(frame) {
            Ok(()) => true,
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop a frame without blocking, counting an underrun when empty.
    pub fn pop(&self) -> Option<AudioFrame> {
        match self.queue.pop() {
            Some(frame) => Some(frame),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Pop without counting an underrun (playback callback fast path).
    pub fn try_pop(&self) -> Option<AudioFrame> {
        self.queue.pop()
    }

    /// Pop a frame, waiting up to `timeout` in short poll steps.
    ///
    /// Worker-thread side of the queue; the wait is bounded so the
    /// running flag is rechecked at least once per timeout.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioFrame> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.queue.pop() {
                return Some(frame);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a frame queue
pub type SharedFrameQueue = Arc<FrameQueue>;

/// Create a new shared frame queue
pub fn create_shared_queue(capacity: usize) -> SharedFrameQueue {
    Arc::new(FrameQueue::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fifo_order_preserved() {
        let queue = FrameQueue::new(4);
        queue.push(AudioFrame::new(vec![0.0]));
        queue.push(AudioFrame::new(vec![1.0]));
        queue.push(AudioFrame::new(vec![2.0]));

        assert_eq!(queue.pop().unwrap().samples()[0], 0.0);
        assert_eq!(queue.pop().unwrap().samples()[0], 1.0);
        assert_eq!(queue.pop().unwrap().samples()[0], 2.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_rejects_newest_and_never_blocks() {
        let queue = FrameQueue::new(3);
        for i in 0..10 {
            queue.push(AudioFrame::new(vec![i as f32]));
        }

        // Exactly capacity frames retained, the oldest ones.
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.overflow_count(), 7);
        assert_eq!(queue.pop().unwrap().samples()[0], 0.0);
        assert_eq!(queue.pop().unwrap().samples()[0], 1.0);
        assert_eq!(queue.pop().unwrap().samples()[0], 2.0);
    }

    #[test]
    fn pop_timeout_returns_none_when_empty() {
        let queue = FrameQueue::new(2);
        let start = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(10)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn pop_timeout_returns_queued_frame_immediately() {
        let queue = FrameQueue::new(2);
        queue.push(AudioFrame::silent(8));
        assert!(queue.pop_timeout(Duration::from_millis(100)).is_some());
    }

    #[test]
    fn underrun_counted_on_empty_pop() {
        let queue = FrameQueue::new(2);
        assert!(queue.pop().is_none());
        assert!(queue.pop().is_none());
        assert_eq!(queue.underrun_count(), 2);
        // try_pop does not count
        assert!(queue.try_pop().is_none());
        assert_eq!(queue.underrun_count(), 2);
    }

    proptest! {
        #[test]
        fn retained_frames_never_exceed_capacity(
            capacity in 1usize..32,
            pushes in 0usize..256,
        ) {
            let queue = FrameQueue::new(capacity);
            for _ in 0..pushes {
                queue.push(AudioFrame::silent(1));
            }
            prop_assert_eq!(queue.len(), pushes.min(capacity));
            prop_assert_eq!(queue.overflow_count(), pushes.saturating_sub(capacity));
        }
    }
}
