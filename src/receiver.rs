//! The Morse receiver state machine (C7): classifies mark-begin/mark-end
//! timestamps into dots and dashes, assembles a representation string, and
//! detects end-of-character / end-of-word gaps. Single-threaded, not
//! internally synchronised — callers own exclusive access to one instance.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::adaptive::{clamp_speed_wpm, AdaptiveTracker};
use crate::error::{CwError, CwResult};
use crate::morse::lookup_representation;
use crate::timing::{
    derive_receiver_timings, unit_length_us, ReceiverTimings, DOT_CALIBRATION_US, GAP_MAX,
    GAP_MIN, NOISE_SPIKE_MAX_US, NOISE_SPIKE_MIN_US, SPEED_MAX_WPM, SPEED_MIN_WPM,
    TOLERANCE_MAX_PERCENT, TOLERANCE_MIN_PERCENT,
};

/// Representation buffer capacity (invariant I7): the cursor must never
/// wrap, writing past it is an error-gap transition.
const REP_CAPACITY: usize = 256;
const STATS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Mark,
    Space,
    EocGap,
    EowGap,
    EocGapErr,
    EowGapErr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    fn as_char(self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatClass {
    Dot,
    Dash,
    InterMarkSpace,
    InterCharSpace,
}

pub struct Receiver {
    speed_wpm: f64,
    tolerance_percent: u32,
    gap: u32,
    is_adaptive: bool,
    noise_spike_threshold_us: i64,
    adaptive_threshold_us: i64,

    timings: ReceiverTimings,
    parameters_in_sync: bool,
    adaptive: AdaptiveTracker,

    epoch: Instant,
    last_ts: Option<Duration>,
    mark_start: Option<Duration>,
    mark_end: Option<Duration>,

    representation: String,
    state: ReceiverState,
    is_pending_inter_word_space: bool,

    stats: VecDeque<(StatClass, i64)>,
}

impl Receiver {
    pub fn new(
        speed_wpm: f64,
        tolerance_percent: u32,
        gap: u32,
        is_adaptive: bool,
        noise_spike_threshold_us: i64,
    ) -> Self {
        let adaptive_threshold_us = 2 * unit_length_us(speed_wpm);
        let timings = derive_receiver_timings(
            speed_wpm,
            tolerance_percent,
            gap,
            is_adaptive,
            adaptive_threshold_us,
        );
        Receiver {
            speed_wpm,
            tolerance_percent,
            gap,
            is_adaptive,
            noise_spike_threshold_us,
            adaptive_threshold_us,
            timings,
            parameters_in_sync: true,
            adaptive: AdaptiveTracker::new(),
            epoch: Instant::now(),
            last_ts: None,
            mark_start: None,
            mark_end: None,
            representation: String::new(),
            state: ReceiverState::Idle,
            is_pending_inter_word_space: false,
            stats: VecDeque::with_capacity(STATS_CAPACITY),
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn timings(&mut self) -> ReceiverTimings {
        self.sync_parameters();
        self.timings
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sync_parameters(&mut self) {
        if self.parameters_in_sync {
            return;
        }
        self.timings = derive_receiver_timings(
            self.speed_wpm,
            self.tolerance_percent,
            self.gap,
            self.is_adaptive,
            self.adaptive_threshold_us,
        );
        self.parameters_in_sync = true;
    }

    fn check_monotonic(&mut self, ts: Duration) -> CwResult<()> {
        if let Some(last) = self.last_ts {
            if ts < last {
                return Err(CwError::Invalid(format!(
                    "timestamp {ts:?} precedes previous {last:?}"
                )));
            }
        }
        self.last_ts = Some(ts);
        Ok(())
    }

    fn record_stat(&mut self, class: StatClass, observed_us: i64, ideal_us: i64) {
        if self.stats.len() == STATS_CAPACITY {
            self.stats.pop_front();
        }
        self.stats.push_back((class, observed_us - ideal_us));
    }

    /// Population standard deviation of recorded deltas for `class`, or 0 if
    /// none have been recorded.
    pub fn get_stats(&self, class: StatClass) -> f64 {
        let deltas: Vec<f64> = self
            .stats
            .iter()
            .filter(|(c, _)| *c == class)
            .map(|(_, d)| *d as f64)
            .collect();
        if deltas.is_empty() {
            return 0.0;
        }
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        let variance = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / deltas.len() as f64;
        variance.sqrt()
    }

    fn push_symbol(&mut self, symbol: Symbol) -> CwResult<()> {
        if self.representation.len() >= REP_CAPACITY - 1 {
            self.state = ReceiverState::EocGapErr;
            return Err(CwError::NoMemory);
        }
        self.representation.push(symbol.as_char());
        Ok(())
    }

    fn clear_representation(&mut self) {
        self.representation.clear();
    }

    // ---------- Parameter setters -------------------------------------

    pub fn set_speed_wpm(&mut self, wpm: f64) -> CwResult<()> {
        if self.is_adaptive {
            return Err(CwError::NotPermitted(
                "cannot set speed directly while adaptive mode is on".into(),
            ));
        }
        if !(SPEED_MIN_WPM as f64..=SPEED_MAX_WPM as f64).contains(&wpm) {
            return Err(CwError::OutOfRange {
                value: wpm as i64,
                min: SPEED_MIN_WPM as i64,
                max: SPEED_MAX_WPM as i64,
            });
        }
        self.speed_wpm = wpm;
        self.parameters_in_sync = false;
        Ok(())
    }

    pub fn set_tolerance_percent(&mut self, percent: u32) -> CwResult<()> {
        if !(TOLERANCE_MIN_PERCENT..=TOLERANCE_MAX_PERCENT).contains(&percent) {
            return Err(CwError::OutOfRange {
                value: percent as i64,
                min: TOLERANCE_MIN_PERCENT as i64,
                max: TOLERANCE_MAX_PERCENT as i64,
            });
        }
        self.tolerance_percent = percent;
        self.parameters_in_sync = false;
        Ok(())
    }

    pub fn set_gap(&mut self, gap: u32) -> CwResult<()> {
        if !(GAP_MIN..=GAP_MAX).contains(&gap) {
            return Err(CwError::OutOfRange {
                value: gap as i64,
                min: GAP_MIN as i64,
                max: GAP_MAX as i64,
            });
        }
        self.gap = gap;
        self.parameters_in_sync = false;
        Ok(())
    }

    pub fn set_noise_spike_threshold_us(&mut self, threshold_us: i64) -> CwResult<()> {
        if !(NOISE_SPIKE_MIN_US..=NOISE_SPIKE_MAX_US).contains(&threshold_us) {
            return Err(CwError::OutOfRange {
                value: threshold_us,
                min: NOISE_SPIKE_MIN_US,
                max: NOISE_SPIKE_MAX_US,
            });
        }
        self.noise_spike_threshold_us = threshold_us;
        Ok(())
    }

    pub fn set_adaptive(&mut self, enabled: bool) {
        if enabled && !self.is_adaptive {
            self.sync_parameters();
            self.adaptive.seed(self.timings.dot.ideal_us, self.timings.dash.ideal_us);
        }
        self.is_adaptive = enabled;
        self.parameters_in_sync = false;
    }

    // ---------- FSM operations -----------------------------------------

    pub fn mark_begin(&mut self, ts: Option<Duration>) -> CwResult<()> {
        self.sync_parameters();
        let ts = ts.unwrap_or_else(|| self.now());
        self.check_monotonic(ts)?;

        if self.is_pending_inter_word_space {
            self.clear_representation();
            self.is_pending_inter_word_space = false;
            self.state = ReceiverState::Idle;
        } else {
            match self.state {
                ReceiverState::Idle | ReceiverState::Space => {}
                other => {
                    return Err(CwError::StateError(format!(
                        "mark_begin illegal in state {other:?}"
                    )))
                }
            }
        }

        if self.state == ReceiverState::Space {
            if let Some(prev_end) = self.mark_end {
                let space_len = (ts - prev_end).as_micros() as i64;
                self.record_stat(StatClass::InterMarkSpace, space_len, self.timings.eom.ideal_us);
            }
        }

        self.mark_start = Some(ts);
        self.state = ReceiverState::Mark;
        Ok(())
    }

    pub fn mark_end(&mut self, ts: Option<Duration>) -> CwResult<()> {
        if self.state != ReceiverState::Mark {
            return Err(CwError::StateError(format!(
                "mark_end illegal in state {:?}",
                self.state
            )));
        }
        self.sync_parameters();
        let ts = ts.unwrap_or_else(|| self.now());
        self.check_monotonic(ts)?;

        let mark_start = self.mark_start.expect("Mark state implies mark_start set");
        let mark_len = (ts - mark_start).as_micros() as i64;

        if self.noise_spike_threshold_us > 0 && mark_len <= self.noise_spike_threshold_us {
            self.state = if self.representation.is_empty() {
                ReceiverState::Idle
            } else {
                ReceiverState::Space
            };
            return Err(CwError::TryAgain("mark rejected as noise spike".into()));
        }

        let symbol = if self.timings.dot.contains(mark_len) {
            Symbol::Dot
        } else if self.timings.dash.contains(mark_len) {
            Symbol::Dash
        } else {
            self.state = if mark_len <= self.timings.eoc.max_us {
                ReceiverState::EocGapErr
            } else {
                ReceiverState::EowGapErr
            };
            return Err(CwError::NotFound(format!(
                "mark of {mark_len}us could not be classified"
            )));
        };

        self.push_symbol(symbol)?;

        if self.is_adaptive {
            let threshold = match symbol {
                Symbol::Dot => self.adaptive.observe_dot(mark_len, self.timings.dash.ideal_us),
                Symbol::Dash => self.adaptive.observe_dash(mark_len, self.timings.dot.ideal_us),
            };
            let ideal_us = match symbol {
                Symbol::Dot => self.timings.dot.ideal_us,
                Symbol::Dash => self.timings.dash.ideal_us,
            };
            self.record_stat(
                match symbol {
                    Symbol::Dot => StatClass::Dot,
                    Symbol::Dash => StatClass::Dash,
                },
                mark_len,
                ideal_us,
            );

            let implied_speed = DOT_CALIBRATION_US as f64 / (threshold as f64 / 2.0);
            let (clamped_speed, did_clamp) = clamp_speed_wpm(implied_speed);
            let resolved_threshold = if did_clamp {
                2 * unit_length_us(clamped_speed)
            } else {
                threshold
            };
            self.adaptive_threshold_us = resolved_threshold;
            self.parameters_in_sync = false;
            // Resync propagates the clamp; a second resync is a no-op here
            // since the derivation is a pure function of the now-clamped
            // threshold, unlike the stateful double-resync the legacy
            // implementation needed.
            self.sync_parameters();
        } else {
            let ideal_us = match symbol {
                Symbol::Dot => self.timings.dot.ideal_us,
                Symbol::Dash => self.timings.dash.ideal_us,
            };
            self.record_stat(
                match symbol {
                    Symbol::Dot => StatClass::Dot,
                    Symbol::Dash => StatClass::Dash,
                },
                mark_len,
                ideal_us,
            );
        }

        self.mark_end = Some(ts);
        self.state = ReceiverState::Space;
        Ok(())
    }

    /// Shortcut for callers that already know the classified symbol: records
    /// `mark_end` and appends the symbol directly, without measuring a
    /// duration or updating adaptive statistics.
    pub fn add_mark(&mut self, ts: Option<Duration>, symbol: Symbol) -> CwResult<()> {
        self.sync_parameters();
        let ts = ts.unwrap_or_else(|| self.now());
        self.check_monotonic(ts)?;

        if self.is_pending_inter_word_space {
            self.clear_representation();
            self.is_pending_inter_word_space = false;
            self.state = ReceiverState::Idle;
        } else {
            match self.state {
                ReceiverState::Idle | ReceiverState::Space => {}
                other => {
                    return Err(CwError::StateError(format!(
                        "add_mark illegal in state {other:?}"
                    )))
                }
            }
        }

        self.push_symbol(symbol)?;
        self.mark_end = Some(ts);
        self.state = ReceiverState::Space;
        Ok(())
    }

    pub fn poll_representation(&mut self, ts: Option<Duration>) -> CwResult<(String, bool)> {
        self.sync_parameters();
        match self.state {
            ReceiverState::EowGap | ReceiverState::EowGapErr => {
                Ok((self.representation.clone(), true))
            }
            ReceiverState::Idle | ReceiverState::Mark => Err(CwError::StateError(format!(
                "poll_representation illegal in state {:?}",
                self.state
            ))),
            ReceiverState::Space | ReceiverState::EocGap | ReceiverState::EocGapErr => {
                let ts = ts.unwrap_or_else(|| self.now());
                let mark_end = self
                    .mark_end
                    .ok_or_else(|| CwError::StateError("no mark_end recorded".into()))?;
                let space_len = (ts - mark_end).as_micros() as i64;

                if self.timings.eoc.contains(space_len) {
                    if self.state == ReceiverState::Space {
                        self.record_stat(StatClass::InterCharSpace, space_len, self.timings.eoc.ideal_us);
                        self.state = ReceiverState::EocGap;
                    }
                    Ok((self.representation.clone(), false))
                } else if space_len > self.timings.eoc.max_us {
                    self.state = if self.state == ReceiverState::EocGapErr {
                        ReceiverState::EowGapErr
                    } else {
                        ReceiverState::EowGap
                    };
                    Ok((self.representation.clone(), true))
                } else {
                    Err(CwError::TryAgain("character still assembling".into()))
                }
            }
        }
    }

    pub fn poll_character(&mut self, ts: Option<Duration>) -> CwResult<(char, bool)> {
        let (representation, is_end_of_word) = self.poll_representation(ts)?;
        let character = lookup_representation(&representation)
            .ok_or_else(|| CwError::NotFound(format!("no character for '{representation}'")))?;
        if !is_end_of_word {
            self.is_pending_inter_word_space = true;
        }
        Ok((character, is_end_of_word))
    }

    /// Clears the representation buffer, cursor, and pending-word-space
    /// flag; transitions to `Idle`. Parameters and statistics are untouched.
    pub fn reset_state(&mut self) {
        self.clear_representation();
        self.is_pending_inter_word_space = false;
        self.state = ReceiverState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us(value: i64) -> Duration {
        Duration::from_micros(value as u64)
    }

    #[test]
    fn decodes_paris_dot_at_fixed_speed() {
        let mut r = Receiver::new(20.0, 50, 0, false, 0);
        let dot = r.timings().dot.ideal_us;
        r.mark_begin(Some(us(0))).unwrap();
        r.mark_end(Some(us(dot))).unwrap();
        assert_eq!(r.representation, ".");
    }

    /// Feeds the three characters of "SOS" (dot-dot-dot, dash-dash-dash,
    /// dot-dot-dot) as separate marks-then-poll groups, per seed scenarios
    /// S1-S3: each character is polled (and the representation buffer reset
    /// via the pending-inter-word-space mechanism) before the next begins.
    /// The final gap is widened to a 7-unit word gap so `is_eow` is also
    /// exercised true, as in S3.
    #[test]
    fn decodes_sos() {
        let mut r = Receiver::new(20.0, 50, 0, false, 0);
        let dot = r.timings().dot.ideal_us;
        let dash = r.timings().dash.ideal_us;
        let eom = r.timings().eom.ideal_us;
        let eoc = r.timings().eoc.ideal_us;

        // Sends each element of `elements`, leaving a trailing inter-mark
        // gap (`eom`) after the last one; `t` lands exactly `eom` past the
        // final mark_end.
        fn send_elements(r: &mut Receiver, t: &mut i64, eom: i64, elements: &[i64]) {
            for &len in elements {
                r.mark_begin(Some(us(*t))).unwrap();
                *t += len;
                r.mark_end(Some(us(*t))).unwrap();
                *t += eom;
            }
        }

        let mut t = 0i64;

        send_elements(&mut r, &mut t, eom, &[dot, dot, dot]);
        t += eoc - eom;
        let (ch, is_eow) = r.poll_character(Some(us(t))).unwrap();
        assert_eq!(ch, 'S');
        assert!(!is_eow);

        send_elements(&mut r, &mut t, eom, &[dash, dash, dash]);
        t += eoc - eom;
        let (ch, is_eow) = r.poll_character(Some(us(t))).unwrap();
        assert_eq!(ch, 'O');
        assert!(!is_eow);

        send_elements(&mut r, &mut t, eom, &[dot, dot, dot]);
        t += 7 * eom - eom;
        let (ch, is_eow) = r.poll_character(Some(us(t))).unwrap();
        assert_eq!(ch, 'S');
        assert!(is_eow);
    }

    #[test]
    fn mark_end_without_begin_is_state_error() {
        let mut r = Receiver::new(20.0, 50, 0, false, 0);
        assert!(matches!(
            r.mark_end(Some(us(1))),
            Err(CwError::StateError(_))
        ));
    }

    #[test]
    fn noise_spike_rejected_without_mutating_representation() {
        let mut r = Receiver::new(20.0, 50, 0, false, 5_000);
        r.mark_begin(Some(us(0))).unwrap();
        let result = r.mark_end(Some(us(1_000)));
        assert!(matches!(result, Err(CwError::TryAgain(_))));
        assert!(r.representation.is_empty());
        assert_eq!(r.state(), ReceiverState::Idle);
    }

    #[test]
    fn retrograde_timestamp_is_invalid() {
        let mut r = Receiver::new(20.0, 50, 0, false, 0);
        r.mark_begin(Some(us(1_000))).unwrap();
        assert!(matches!(
            r.mark_end(Some(us(500))),
            Err(CwError::Invalid(_))
        ));
    }

    #[test]
    fn pending_inter_word_space_resets_representation_on_next_mark_begin() {
        let mut r = Receiver::new(20.0, 50, 0, false, 0);
        let dot = r.timings().dot.ideal_us;
        let eoc = r.timings().eoc.ideal_us;

        r.mark_begin(Some(us(0))).unwrap();
        r.mark_end(Some(us(dot))).unwrap();
        let (_, _) = r.poll_character(Some(us(dot + eoc))).unwrap();
        assert!(r.is_pending_inter_word_space);

        r.mark_begin(Some(us(dot + eoc + 1))).unwrap();
        assert!(!r.is_pending_inter_word_space);
        assert_eq!(r.representation, "");
    }

    #[test]
    fn adaptive_mode_seeds_from_fixed_speed_ideals() {
        let mut r = Receiver::new(20.0, 50, 0, false, 0);
        let dot_ideal = r.timings().dot.ideal_us;
        r.set_adaptive(true);
        assert!(r.adaptive.is_seeded());
        let t = r.timings();
        assert_eq!(t.dot.ideal_us, dot_ideal);
    }

    #[test]
    fn set_speed_rejected_while_adaptive() {
        let mut r = Receiver::new(20.0, 50, 0, true, 0);
        assert!(matches!(
            r.set_speed_wpm(25.0),
            Err(CwError::NotPermitted(_))
        ));
    }

    /// An unclassifiable mark at or under `eoc.max_us` lands in `EocGapErr`;
    /// one past it lands in `EowGapErr` (the corrected, non-degenerate
    /// `eoc.max_us` at 20 WPM is `5u = 300000`us with gap 0).
    #[test]
    fn unclassifiable_mark_picks_error_gap_state_by_eoc_max() {
        let mut r = Receiver::new(20.0, 50, 0, false, 0);
        let eoc_max = r.timings().eoc.max_us;
        assert_eq!(eoc_max, 300_000);

        let mut at_eoc_max = Receiver::new(20.0, 50, 0, false, 0);
        at_eoc_max.mark_begin(Some(us(0))).unwrap();
        assert!(matches!(
            at_eoc_max.mark_end(Some(us(eoc_max))),
            Err(CwError::NotFound(_))
        ));
        assert_eq!(at_eoc_max.state(), ReceiverState::EocGapErr);

        let mut past_eoc_max = Receiver::new(20.0, 50, 0, false, 0);
        past_eoc_max.mark_begin(Some(us(0))).unwrap();
        assert!(matches!(
            past_eoc_max.mark_end(Some(us(eoc_max + 1))),
            Err(CwError::NotFound(_))
        ));
        assert_eq!(past_eoc_max.state(), ReceiverState::EowGapErr);
    }
}
