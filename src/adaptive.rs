//! The adaptive speed tracker (C8): moving averages of observed dot/dash
//! lengths feed a continuously re-estimated words-per-minute figure back
//! into the timing engine (C1).

use crate::timing::{SPEED_MAX_WPM, SPEED_MIN_WPM};

const RING_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
struct MovingAverage {
    ring: [i64; RING_LEN],
    cursor: usize,
    filled: usize,
    running_sum: i64,
    last_average: i64,
}

impl MovingAverage {
    fn seeded(value_us: i64) -> Self {
        MovingAverage {
            ring: [value_us; RING_LEN],
            cursor: 0,
            filled: RING_LEN,
            running_sum: value_us * RING_LEN as i64,
            last_average: value_us,
        }
    }

    fn update(&mut self, value_us: i64) -> i64 {
        let evicted = self.ring[self.cursor];
        self.ring[self.cursor] = value_us;
        self.running_sum += value_us - evicted;
        self.cursor = (self.cursor + 1) % RING_LEN;
        self.filled = (self.filled + 1).min(RING_LEN);
        self.last_average = self.running_sum / RING_LEN as i64;
        self.last_average
    }
}

/// Tracks dot/dash length moving averages and derives the receiver's
/// `adaptive_threshold_us` from them. One instance per receiver.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveTracker {
    dot: Option<MovingAverage>,
    dash: Option<MovingAverage>,
}

impl AdaptiveTracker {
    pub fn new() -> Self {
        AdaptiveTracker {
            dot: None,
            dash: None,
        }
    }

    /// Seeds both averages from the current fixed-speed ideals. Called when
    /// adaptive mode is switched on so the first estimate matches the speed
    /// already in effect rather than being biased by stale samples.
    pub fn seed(&mut self, dot_ideal_us: i64, dash_ideal_us: i64) {
        self.dot = Some(MovingAverage::seeded(dot_ideal_us));
        self.dash = Some(MovingAverage::seeded(dash_ideal_us));
    }

    pub fn is_seeded(&self) -> bool {
        self.dot.is_some() && self.dash.is_some()
    }

    fn dot_mut(&mut self, dot_ideal_us: i64) -> &mut MovingAverage {
        self.dot.get_or_insert_with(|| MovingAverage::seeded(dot_ideal_us))
    }

    fn dash_mut(&mut self, dash_ideal_us: i64) -> &mut MovingAverage {
        self.dash.get_or_insert_with(|| MovingAverage::seeded(dash_ideal_us))
    }

    /// Feeds one observed dot length and recomputes `adaptive_threshold_us`.
    pub fn observe_dot(&mut self, dot_len_us: i64, dash_ideal_us: i64) -> i64 {
        let avg_dot = self.dot_mut(dot_len_us).update(dot_len_us);
        let avg_dash = self.dash_mut(dash_ideal_us).last_average;
        recompute_threshold(avg_dot, avg_dash)
    }

    /// Feeds one observed dash length and recomputes `adaptive_threshold_us`.
    pub fn observe_dash(&mut self, dash_len_us: i64, dot_ideal_us: i64) -> i64 {
        let avg_dot = self.dot_mut(dot_ideal_us).last_average;
        let avg_dash = self.dash_mut(dash_len_us).update(dash_len_us);
        recompute_threshold(avg_dot, avg_dash)
    }
}

impl Default for AdaptiveTracker {
    fn default() -> Self {
        AdaptiveTracker::new()
    }
}

fn recompute_threshold(avg_dot_us: i64, avg_dash_us: i64) -> i64 {
    (avg_dash_us - avg_dot_us) / 2 + avg_dot_us
}

/// Clamps a derived speed (WPM, from `adaptive_threshold_us`) into the
/// supported range, reporting whether clamping occurred so the caller can
/// resync twice as the specification requires: once to propagate the clamp,
/// once to restore any parameter the clamped resync disturbed.
pub fn clamp_speed_wpm(speed_wpm: f64) -> (f64, bool) {
    let min = SPEED_MIN_WPM as f64;
    let max = SPEED_MAX_WPM as f64;
    if speed_wpm < min {
        (min, true)
    } else if speed_wpm > max {
        (max, true)
    } else {
        (speed_wpm, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_average_matches_seed_value() {
        let mut t = AdaptiveTracker::new();
        t.seed(60_000, 180_000);
        assert!(t.is_seeded());
        let threshold = recompute_threshold(60_000, 180_000);
        assert_eq!(threshold, 120_000);
    }

    #[test]
    fn observe_dot_shifts_average_toward_new_samples() {
        let mut t = AdaptiveTracker::new();
        t.seed(60_000, 180_000);
        for _ in 0..4 {
            t.observe_dot(80_000, 180_000);
        }
        // After 4 updates the ring is entirely 80_000.
        let threshold = t.observe_dot(80_000, 180_000);
        assert_eq!(threshold, recompute_threshold(80_000, 180_000));
    }

    #[test]
    fn clamp_speed_reports_out_of_range() {
        let (clamped, did_clamp) = clamp_speed_wpm(2.0);
        assert_eq!(clamped, SPEED_MIN_WPM as f64);
        assert!(did_clamp);

        let (clamped, did_clamp) = clamp_speed_wpm(30.0);
        assert_eq!(clamped, 30.0);
        assert!(!did_clamp);
    }
}
