//! The timing-parameter engine (C1): derives the low-level microsecond
//! timings both the generator and the receiver operate on from the four
//! user-visible knobs (speed, tolerance, gap, weighting).

/// Microseconds per dot at 1 WPM, from the PARIS calibration word (50 dot
/// units per word at the nominal speed).
pub const DOT_CALIBRATION_US: i64 = 1_200_000;

pub const SPEED_MIN_WPM: u32 = 4;
pub const SPEED_MAX_WPM: u32 = 60;
pub const SPEED_DEFAULT_WPM: u32 = 12;

pub const FREQUENCY_MIN_HZ: i32 = 0;
pub const FREQUENCY_MAX_HZ: i32 = 4_000;
pub const FREQUENCY_DEFAULT_HZ: i32 = 800;

pub const VOLUME_MIN_PERCENT: u32 = 0;
pub const VOLUME_MAX_PERCENT: u32 = 100;
pub const VOLUME_DEFAULT_PERCENT: u32 = 70;

pub const GAP_MIN: u32 = 0;
pub const GAP_MAX: u32 = 60;
pub const GAP_DEFAULT: u32 = 0;

pub const TOLERANCE_MIN_PERCENT: u32 = 0;
pub const TOLERANCE_MAX_PERCENT: u32 = 90;
pub const TOLERANCE_DEFAULT_PERCENT: u32 = 50;

pub const WEIGHTING_MIN: u32 = 20;
pub const WEIGHTING_MAX: u32 = 80;
pub const WEIGHTING_DEFAULT: u32 = 50;

pub const NOISE_SPIKE_MIN_US: i64 = 0;
pub const NOISE_SPIKE_MAX_US: i64 = 20_000;
pub const NOISE_SPIKE_DEFAULT_US: i64 = 10_000;

/// `u = DOT_CALIBRATION_US / wpm`, the unit dot length at a given speed.
pub fn unit_length_us(speed_wpm: f64) -> i64 {
    (DOT_CALIBRATION_US as f64 / speed_wpm).round() as i64
}

/// Derived timings consumed by the generator (C5) and by the straight-key /
/// iambic-paddle abstraction (C6).
#[derive(Debug, Clone, Copy)]
pub struct GeneratorTimings {
    pub dot_ideal_us: i64,
    pub dash_ideal_us: i64,
    pub eoe_delay_us: i64,
    pub eoc_delay_us: i64,
    pub eow_delay_us: i64,
    pub additional_delay_us: i64,
    pub adjustment_delay_us: i64,
}

/// Derive generator timings from the essential knobs. Invoked after any
/// change to send speed, gap or weighting.
pub fn derive_generator_timings(speed_wpm: u32, gap: u32, weighting: u32) -> GeneratorTimings {
    let u = unit_length_us(speed_wpm as f64);

    let (dot_ideal_us, dash_ideal_us) = if weighting == 50 {
        (u, 3 * u)
    } else {
        // Weighting skews the dot/dash split symmetrically: a dot is
        // stretched or shrunk by `weighting/50`, and the dash absorbs the
        // opposite adjustment so the unit-length average stays constant.
        let dot = u * weighting as i64 / 50;
        let dash = 3 * u - (dot - u);
        (dot, dash)
    };

    let eoe_delay_us = u;
    let eoc_delay_us = 3 * u;
    let eow_delay_us = 7 * u;
    let additional_delay_us = gap as i64 * u;
    let adjustment_delay_us = (7 * additional_delay_us) / 3;

    GeneratorTimings {
        dot_ideal_us,
        dash_ideal_us,
        eoe_delay_us,
        eoc_delay_us,
        eow_delay_us,
        additional_delay_us,
        adjustment_delay_us,
    }
}

/// A classification window: an ideal value plus the [min, max] range an
/// observed duration must fall in to be accepted as this class.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub ideal_us: i64,
    pub min_us: i64,
    pub max_us: i64,
}

impl Window {
    pub fn contains(&self, value_us: i64) -> bool {
        value_us >= self.min_us && value_us <= self.max_us
    }
}

/// Derived timings consumed by the receiver state machine (C7).
#[derive(Debug, Clone, Copy)]
pub struct ReceiverTimings {
    pub dot: Window,
    pub dash: Window,
    pub eom: Window,
    pub eoc: Window,
    pub additional_delay_us: i64,
    pub adjustment_delay_us: i64,
    pub adaptive_threshold_us: i64,
    pub effective_speed_wpm: f64,
}

/// Derive receiver timings. `adaptive_threshold_us` is read (in adaptive
/// mode) or written (in fixed-speed mode) as part of reconciling the two.
pub fn derive_receiver_timings(
    speed_wpm: f64,
    tolerance_percent: u32,
    gap: u32,
    is_adaptive: bool,
    adaptive_threshold_us: i64,
) -> ReceiverTimings {
    let (u, adaptive_threshold_us, effective_speed_wpm) = if is_adaptive {
        let speed = DOT_CALIBRATION_US as f64 / (adaptive_threshold_us as f64 / 2.0);
        (unit_length_us(speed), adaptive_threshold_us, speed)
    } else {
        let u = unit_length_us(speed_wpm);
        (u, 2 * u, speed_wpm)
    };

    let dot_ideal_us = u;
    let dash_ideal_us = 3 * u;
    let eom_ideal_us = u;
    let eoc_ideal_us = 3 * u;

    let additional_delay_us = gap as i64 * u;
    let adjustment_delay_us = (7 * additional_delay_us) / 3;

    let (dot, dash, eom, eoc) = if is_adaptive {
        let dot = Window {
            ideal_us: dot_ideal_us,
            min_us: 0,
            max_us: 2 * dot_ideal_us,
        };
        let dash = Window {
            ideal_us: dash_ideal_us,
            min_us: 2 * dot_ideal_us,
            max_us: i64::MAX,
        };
        let eom = Window {
            ideal_us: eom_ideal_us,
            min_us: dot.min_us,
            max_us: dot.max_us,
        };
        let eoc = Window {
            ideal_us: eoc_ideal_us,
            min_us: eom.max_us,
            max_us: 5 * dot_ideal_us,
        };
        (dot, dash, eom, eoc)
    } else {
        let width = dot_ideal_us * tolerance_percent as i64 / 100;
        let dot = Window {
            ideal_us: dot_ideal_us,
            min_us: (dot_ideal_us - width).max(0),
            max_us: dot_ideal_us + width,
        };
        let dash = Window {
            ideal_us: dash_ideal_us,
            min_us: dash_ideal_us - width,
            max_us: dash_ideal_us + width,
        };
        let eom = Window {
            ideal_us: eom_ideal_us,
            min_us: dot.min_us,
            max_us: dot.max_us,
        };
        let eoc = Window {
            ideal_us: eoc_ideal_us,
            min_us: dash.min_us,
            max_us: 5 * dot_ideal_us + additional_delay_us + adjustment_delay_us,
        };
        (dot, dash, eom, eoc)
    };

    ReceiverTimings {
        dot,
        dash,
        eom,
        eoc,
        additional_delay_us,
        adjustment_delay_us,
        adaptive_threshold_us,
        effective_speed_wpm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_length_paris_calibration() {
        assert_eq!(unit_length_us(20.0), 60_000);
        assert_eq!(unit_length_us(1.0), 1_200_000);
    }

    #[test]
    fn generator_timings_at_default_weighting() {
        let t = derive_generator_timings(20, 0, 50);
        assert_eq!(t.dot_ideal_us, 60_000);
        assert_eq!(t.dash_ideal_us, 180_000);
        assert_eq!(t.eoe_delay_us, 60_000);
        assert_eq!(t.eoc_delay_us, 180_000);
        assert_eq!(t.eow_delay_us, 420_000);
        assert_eq!(t.additional_delay_us, 0);
    }

    #[test]
    fn generator_timings_with_gap() {
        let t = derive_generator_timings(20, 10, 50);
        assert_eq!(t.additional_delay_us, 600_000);
        assert_eq!(t.adjustment_delay_us, 7 * 600_000 / 3);
    }

    #[test]
    fn receiver_timings_fixed_speed_invariants() {
        let t = derive_receiver_timings(20.0, 50, 0, false, 0);
        assert!(t.dot.min_us <= t.dot.ideal_us && t.dot.ideal_us <= t.dot.max_us);
        assert!(t.dash.min_us <= t.dash.ideal_us && t.dash.ideal_us <= t.dash.max_us);
        assert!(t.dot.max_us < t.dash.min_us, "I1: dot_max < dash_min");
        assert!(t.eom.max_us < t.eoc.min_us, "I2: eom_max < eoc_min");
    }

    /// At 20 WPM (`u = 60000`), a 4-unit inter-character gap must still read
    /// as end-of-character while a 7-unit gap reads as end-of-word (seed
    /// scenarios S1-S3).
    #[test]
    fn receiver_timings_eoc_window_admits_four_units_rejects_seven() {
        let t = derive_receiver_timings(20.0, 50, 0, false, 0);
        assert!(t.eoc.contains(4 * 60_000), "4u gap must be end-of-character");
        assert!(!t.eoc.contains(7 * 60_000), "7u gap must be end-of-word");
    }

    #[test]
    fn receiver_timings_adaptive_windows_adjoin() {
        let t = derive_receiver_timings(20.0, 50, 0, true, 120_000);
        assert_eq!(t.dot.max_us, t.dash.min_us, "adaptive ranges adjoin");
        assert_eq!(t.dash.max_us, i64::MAX);
    }
}
