//! The tone queue (C3): a bounded FIFO of [`Tone`] descriptors shared
//! between a client thread and the generator's worker thread.
//!
//! Guarded by one [`Mutex`] and three [`Condvar`]s, matching the concurrency
//! model in the specification: `data_avail` wakes a blocked dequeue,
//! `space_avail` wakes a blocked enqueue, `drained` wakes `wait_for_drained`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::{CwError, CwResult};
use crate::tone::Tone;

pub const TQ_CAPACITY_DEFAULT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Busy,
}

type LowWaterCallback = Box<dyn FnMut() + Send>;

struct Inner {
    buf: VecDeque<Tone>,
    capacity: usize,
    low_level: usize,
    low_water_cb: Option<LowWaterCallback>,
    /// Tracks whether we're still above `low_level` since the last callback
    /// fire, so the callback runs at most once per low→high→low cycle.
    low_water_armed: bool,
    /// True while the worker is synthesising a tone it has already removed
    /// from `buf` (or is replaying a `Hold` tone still at the head).
    currently_playing: bool,
}

impl Inner {
    fn state(&self) -> QueueState {
        if self.buf.is_empty() && !self.currently_playing {
            QueueState::Idle
        } else {
            QueueState::Busy
        }
    }

    fn len(&self) -> usize {
        self.buf.len()
    }
}

/// Bounded producer/consumer queue of tone descriptors. Owned by exactly one
/// [`crate::generator::Generator`].
pub struct ToneQueue {
    inner: Mutex<Inner>,
    data_avail: Condvar,
    space_avail: Condvar,
    drained: Condvar,
}

impl ToneQueue {
    pub fn new(capacity: usize) -> Self {
        ToneQueue {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(capacity),
                capacity,
                low_level: 0,
                low_water_cb: None,
                low_water_armed: true,
                currently_playing: false,
            }),
            data_avail: Condvar::new(),
            space_avail: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().unwrap().state()
    }

    /// Non-blocking enqueue. Fails with [`CwError::QueueFull`] if the queue
    /// is at capacity.
    pub fn enqueue(&self, tone: Tone) -> CwResult<()> {
        let mut guard = self.inner.lock().unwrap();
        if guard.buf.len() >= guard.capacity {
            return Err(CwError::QueueFull);
        }
        self.push_locked(&mut guard, tone);
        drop(guard);
        self.data_avail.notify_all();
        Ok(())
    }

    /// Blocking enqueue: waits for space rather than failing.
    pub fn enqueue_blocking(&self, tone: Tone) {
        let mut guard = self.inner.lock().unwrap();
        while guard.buf.len() >= guard.capacity {
            guard = self.space_avail.wait(guard).unwrap();
        }
        self.push_locked(&mut guard, tone);
        drop(guard);
        self.data_avail.notify_all();
    }

    fn push_locked(&self, guard: &mut Inner, tone: Tone) {
        // A `Hold` tone sitting alone at the head is superseded the instant
        // anything is enqueued behind it.
        if guard.buf.len() == 1 && guard.buf.front().is_some_and(|t| t.is_hold()) {
            guard.buf.pop_front();
        }
        guard.buf.push_back(tone);
        if guard.buf.len() > guard.low_level {
            guard.low_water_armed = true;
        }
    }

    /// Non-blocking dequeue. Returns `None` and marks the queue `Idle` when
    /// empty. A `Hold` tone alone at the head is returned (cloned) without
    /// being removed.
    pub fn try_dequeue(&self) -> Option<Tone> {
        let mut guard = self.inner.lock().unwrap();
        self.pop_locked(&mut guard)
    }

    /// Blocking dequeue: waits for data, waking periodically to check
    /// `stop_flag` so `Generator::stop` can interrupt a parked worker.
    pub fn dequeue_blocking(&self, stop_flag: &AtomicBool) -> Option<Tone> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if !guard.buf.is_empty() {
                return self.pop_locked(&mut guard);
            }
            if stop_flag.load(Ordering::Acquire) {
                guard.currently_playing = false;
                self.drained.notify_all();
                return None;
            }
            let (g, _timeout) = self
                .data_avail
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = g;
        }
    }

    fn pop_locked(&self, guard: &mut Inner) -> Option<Tone> {
        let prev_len = guard.buf.len();
        let tone = if guard.buf.len() == 1 && guard.buf.front().is_some_and(|t| t.is_hold()) {
            guard.currently_playing = true;
            guard.buf.front().copied()
        } else if let Some(t) = guard.buf.pop_front() {
            guard.currently_playing = true;
            self.space_avail.notify_all();
            Some(t)
        } else {
            guard.currently_playing = false;
            None
        };

        if tone.is_none() {
            self.drained.notify_all();
            return None;
        }

        let new_len = guard.buf.len();
        if prev_len > guard.low_level && new_len <= guard.low_level && guard.low_water_armed {
            guard.low_water_armed = false;
            if let Some(cb) = guard.low_water_cb.as_mut() {
                cb();
            }
        }
        tone
    }

    /// Called by the generator worker once a dequeued tone has been fully
    /// synthesised (its samples all written), so `wait_for_drained` can wake.
    pub fn mark_tone_finished(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.currently_playing = false;
        if guard.buf.is_empty() {
            drop(guard);
            self.drained.notify_all();
        }
    }

    /// Drops all pending tones. Does not interrupt a tone currently being
    /// synthesised.
    pub fn flush(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.buf.clear();
        drop(guard);
        self.space_avail.notify_all();
    }

    pub fn wait_for_level(&self, n: usize) {
        let guard = self.inner.lock().unwrap();
        let _unused = self
            .space_avail
            .wait_while(guard, |g| g.buf.len() > n)
            .unwrap();
    }

    pub fn wait_for_drained(&self) {
        let guard = self.inner.lock().unwrap();
        let _unused = self
            .drained
            .wait_while(guard, |g| !g.buf.is_empty() || g.currently_playing)
            .unwrap();
    }

    /// Registers a callback fired on the worker thread the first time the
    /// queue length drops to `level` after having been above it. Replaces
    /// any previously registered callback.
    pub fn register_low_water_callback(&self, level: usize, cb: LowWaterCallback) {
        let mut guard = self.inner.lock().unwrap();
        guard.low_level = level;
        guard.low_water_cb = Some(cb);
        guard.low_water_armed = guard.buf.len() > level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::{SlopeMode, Tone};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration as StdDuration;

    fn tone(freq: i32) -> Tone {
        Tone::new(freq, StdDuration::from_millis(10), SlopeMode::None)
    }

    #[test]
    fn fifo_order_preserved() {
        let q = ToneQueue::new(8);
        for f in [100, 200, 300] {
            q.enqueue(tone(f)).unwrap();
        }
        assert_eq!(q.try_dequeue().unwrap().frequency_hz, 100);
        assert_eq!(q.try_dequeue().unwrap().frequency_hz, 200);
        assert_eq!(q.try_dequeue().unwrap().frequency_hz, 300);
        assert!(q.try_dequeue().is_none());
    }

    #[test]
    fn capacity_boundary_rejects_overflow() {
        let q = ToneQueue::new(2);
        q.enqueue(tone(1)).unwrap();
        q.enqueue(tone(2)).unwrap();
        match q.enqueue(tone(3)) {
            Err(CwError::QueueFull) => {}
            other => panic!("expected QueueFull, got {other:?}"),
        }
    }

    #[test]
    fn hold_tone_survives_repeated_dequeue_until_superseded() {
        let q = ToneQueue::new(8);
        q.enqueue(Tone::hold(700, SlopeMode::RisingOnly)).unwrap();
        let a = q.try_dequeue().unwrap();
        let b = q.try_dequeue().unwrap();
        assert!(a.is_hold() && b.is_hold());
        assert_eq!(q.len(), 1);

        q.enqueue(tone(900)).unwrap();
        let next = q.try_dequeue().unwrap();
        assert_eq!(next.frequency_hz, 900);
        assert!(!next.is_hold());
    }

    #[test]
    fn low_water_callback_fires_once_per_cycle() {
        let q = Arc::new(ToneQueue::new(8));
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired_cb = fired.clone();
        q.register_low_water_callback(
            1,
            Box::new(move || {
                fired_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );
        for f in [1, 2, 3] {
            q.enqueue(tone(f)).unwrap();
        }
        q.try_dequeue(); // len 2, above level, no fire
        q.try_dequeue(); // len 1 == level, fires
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        q.try_dequeue(); // len 0, still <= level, armed is false, no re-fire
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_for_drained_blocks_until_worker_finishes() {
        let q = Arc::new(ToneQueue::new(8));
        q.enqueue(tone(1)).unwrap();
        let worker_q = q.clone();
        let handle = thread::spawn(move || {
            let stop = AtomicBool::new(false);
            let t = worker_q.dequeue_blocking(&stop);
            assert!(t.is_some());
            thread::sleep(StdDuration::from_millis(30));
            worker_q.mark_tone_finished();
        });
        q.wait_for_drained();
        assert!(q.is_empty());
        handle.join().unwrap();
    }
}
