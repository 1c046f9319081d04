//! The Morse key abstraction (C6): maps logical key events into tones
//! enqueued on a [`ToneQueue`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::CwResult;
use crate::queue::ToneQueue;
use crate::tone::{SlopeMode, Tone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Open,
    Closed,
}

/// A manual on/off key. Closing it holds a tone indefinitely; opening it
/// supersedes the hold with a short release tone whose falling envelope
/// suppresses the keying click (see `SPEC_FULL.md` §9 on the `Hold`
/// sentinel).
pub struct StraightKey {
    queue: Arc<ToneQueue>,
    frequency_hz: i32,
    release: Duration,
    state: KeyState,
}

impl StraightKey {
    pub fn new(queue: Arc<ToneQueue>, frequency_hz: i32, release: Duration) -> Self {
        StraightKey {
            queue,
            frequency_hz,
            release,
            state: KeyState::Open,
        }
    }

    pub fn notify(&mut self, state: KeyState) -> CwResult<()> {
        if state == self.state {
            return Ok(());
        }
        self.state = state;
        match state {
            KeyState::Closed => {
                self.queue
                    .enqueue_blocking(Tone::hold(self.frequency_hz, SlopeMode::RisingOnly));
            }
            KeyState::Open => {
                self.queue.enqueue_blocking(Tone::new(
                    self.frequency_hz,
                    self.release,
                    SlopeMode::FallingOnly,
                ));
            }
        }
        Ok(())
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Equivalent to "the tone queue is non-empty" per the specification.
    pub fn is_busy(&self) -> bool {
        !self.queue.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Dot,
    Dash,
}

struct PaddleState {
    dot_down: AtomicBool,
    dash_down: AtomicBool,
    stop: AtomicBool,
}

/// An iambic paddle keyer running Mode-B squeeze semantics on its own
/// background thread: while either paddle is held, it alternates dot/dash
/// elements; if both paddles are squeezed and released mid-element, the
/// opposite element of whichever was playing is still emitted once to
/// complete the squeeze.
pub struct IambicPaddle {
    state: Arc<PaddleState>,
    elements: Arc<(Mutex<u64>, Condvar)>,
    worker: Option<JoinHandle<()>>,
}

impl IambicPaddle {
    pub fn new(
        queue: Arc<ToneQueue>,
        frequency_hz: i32,
        dot_duration: Duration,
        dash_duration: Duration,
        element_gap: Duration,
    ) -> Self {
        let state = Arc::new(PaddleState {
            dot_down: AtomicBool::new(false),
            dash_down: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        });
        let elements = Arc::new((Mutex::new(0u64), Condvar::new()));

        let worker_state = state.clone();
        let worker_elements = elements.clone();
        let worker = std::thread::spawn(move || {
            iambic_loop(
                queue,
                frequency_hz,
                dot_duration,
                dash_duration,
                element_gap,
                worker_state,
                worker_elements,
            );
        });

        IambicPaddle {
            state,
            elements,
            worker: Some(worker),
        }
    }

    pub fn notify(&self, dot_paddle_down: bool, dash_paddle_down: bool) {
        self.state.dot_down.store(dot_paddle_down, Ordering::Release);
        self.state
            .dash_down
            .store(dash_paddle_down, Ordering::Release);
    }

    /// Blocks until one more element has been emitted since the call.
    pub fn wait_for_element(&self) {
        let (lock, cvar) = &*self.elements;
        let guard = lock.lock().unwrap();
        let start = *guard;
        let _unused = cvar.wait_while(guard, |count| *count == start).unwrap();
    }
}

impl Drop for IambicPaddle {
    fn drop(&mut self) {
        self.state.stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

const TICK: Duration = Duration::from_millis(1);

fn opposite(element: Element) -> Element {
    match element {
        Element::Dot => Element::Dash,
        Element::Dash => Element::Dot,
    }
}

/// Picks the next element given the paddles' current state and whether a
/// squeeze (both paddles down at once) was observed at any point while the
/// last element was playing. Mode B: once `last_element` is known, a squeeze
/// seen during its playback still completes the opposite element even if
/// both paddles have since been released.
fn decide_next(
    dot_down: bool,
    dash_down: bool,
    last_element: Option<Element>,
    squeeze_seen: bool,
) -> Option<Element> {
    if dot_down && dash_down {
        Some(match last_element {
            Some(Element::Dot) => Element::Dash,
            _ => Element::Dot,
        })
    } else if dot_down {
        Some(Element::Dot)
    } else if dash_down {
        Some(Element::Dash)
    } else if squeeze_seen {
        last_element.map(opposite)
    } else {
        None
    }
}

/// Sleeps out `total`, polling the paddles every tick, and reports whether
/// both were ever down at the same time.
fn watch_for_squeeze(state: &PaddleState, total: Duration) -> bool {
    let mut remaining = total;
    let mut squeezed = false;
    while remaining > Duration::ZERO {
        if state.dot_down.load(Ordering::Acquire) && state.dash_down.load(Ordering::Acquire) {
            squeezed = true;
        }
        let step = TICK.min(remaining);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    squeezed
}

fn iambic_loop(
    queue: Arc<ToneQueue>,
    frequency_hz: i32,
    dot_duration: Duration,
    dash_duration: Duration,
    element_gap: Duration,
    state: Arc<PaddleState>,
    elements: Arc<(Mutex<u64>, Condvar)>,
) {
    let mut last_element: Option<Element> = None;
    let mut squeeze_seen = false;

    while !state.stop.load(Ordering::Acquire) {
        let dot_down = state.dot_down.load(Ordering::Acquire);
        let dash_down = state.dash_down.load(Ordering::Acquire);

        let Some(element) = decide_next(dot_down, dash_down, last_element, squeeze_seen) else {
            squeeze_seen = false;
            std::thread::sleep(TICK);
            continue;
        };

        let duration = match element {
            Element::Dot => dot_duration,
            Element::Dash => dash_duration,
        };
        queue.enqueue_blocking(Tone::new(frequency_hz, duration, SlopeMode::Both));
        squeeze_seen = watch_for_squeeze(&state, duration);
        queue.enqueue_blocking(Tone::rest(element_gap));
        last_element = Some(element);

        let (lock, cvar) = &*elements;
        {
            let mut count = lock.lock().unwrap();
            *count += 1;
        }
        cvar.notify_all();

        if state.stop.load(Ordering::Acquire) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_key_closed_enqueues_a_hold_tone() {
        let queue = Arc::new(ToneQueue::new(8));
        let mut key = StraightKey::new(queue.clone(), 700, Duration::from_millis(5));

        key.notify(KeyState::Closed).unwrap();

        assert_eq!(queue.len(), 1);
        assert!(queue.try_dequeue().unwrap().is_hold());
        assert_eq!(key.state(), KeyState::Closed);
    }

    #[test]
    fn straight_key_open_supersedes_the_hold_with_a_release_tone() {
        let queue = Arc::new(ToneQueue::new(8));
        let mut key = StraightKey::new(queue.clone(), 700, Duration::from_millis(5));

        key.notify(KeyState::Closed).unwrap();
        key.notify(KeyState::Open).unwrap();

        // The hold is superseded, so only the release tone remains queued.
        assert_eq!(queue.len(), 1);
        let tone = queue.try_dequeue().unwrap();
        assert!(!tone.is_hold());
        assert_eq!(key.state(), KeyState::Open);
    }

    #[test]
    fn straight_key_repeated_same_state_is_a_no_op() {
        let queue = Arc::new(ToneQueue::new(8));
        let mut key = StraightKey::new(queue.clone(), 700, Duration::from_millis(5));

        key.notify(KeyState::Open).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn decide_next_alternates_on_squeeze() {
        assert_eq!(
            decide_next(true, true, Some(Element::Dot), false),
            Some(Element::Dash)
        );
        assert_eq!(
            decide_next(true, true, Some(Element::Dash), false),
            Some(Element::Dot)
        );
        assert_eq!(decide_next(true, true, None, false), Some(Element::Dot));
    }

    #[test]
    fn decide_next_prefers_single_paddle_over_stale_squeeze() {
        assert_eq!(
            decide_next(true, false, Some(Element::Dash), true),
            Some(Element::Dot)
        );
        assert_eq!(
            decide_next(false, true, Some(Element::Dot), true),
            Some(Element::Dash)
        );
    }

    #[test]
    fn decide_next_completes_squeeze_after_both_paddles_released() {
        assert_eq!(
            decide_next(false, false, Some(Element::Dot), true),
            Some(Element::Dash)
        );
        assert_eq!(
            decide_next(false, false, Some(Element::Dash), true),
            Some(Element::Dot)
        );
    }

    #[test]
    fn decide_next_idles_with_no_paddle_and_no_squeeze() {
        assert_eq!(decide_next(false, false, Some(Element::Dot), false), None);
        assert_eq!(decide_next(false, false, None, false), None);
    }
}
