use std::time::Duration;

/// Which amplitude envelopes bracket a tone, used to suppress keying clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeMode {
    None,
    RisingOnly,
    FallingOnly,
    Both,
}

impl SlopeMode {
    pub fn has_rising(self) -> bool {
        matches!(self, SlopeMode::RisingOnly | SlopeMode::Both)
    }

    pub fn has_falling(self) -> bool {
        matches!(self, SlopeMode::FallingOnly | SlopeMode::Both)
    }
}

/// How long a tone lasts.
///
/// `Hold` replaces the legacy negative-duration sentinel with an explicit
/// variant: the generator worker holds this tone indefinitely, re-emitting it
/// from the queue head until a concrete-duration tone is enqueued behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneDuration {
    Finite(Duration),
    Hold,
}

impl ToneDuration {
    pub fn as_micros(self) -> Option<i64> {
        match self {
            ToneDuration::Finite(d) => Some(d.as_micros() as i64),
            ToneDuration::Hold => None,
        }
    }
}

/// One immutable tone segment: a frequency held for a duration, shaped by an
/// envelope. `frequency_hz == 0` denotes a rest (silence) of the given duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: i32,
    pub duration: ToneDuration,
    pub slope_mode: SlopeMode,
}

impl Tone {
    pub fn new(frequency_hz: i32, duration: Duration, slope_mode: SlopeMode) -> Self {
        Tone {
            frequency_hz,
            duration: ToneDuration::Finite(duration),
            slope_mode,
        }
    }

    pub fn rest(duration: Duration) -> Self {
        Tone {
            frequency_hz: 0,
            duration: ToneDuration::Finite(duration),
            slope_mode: SlopeMode::None,
        }
    }

    pub fn hold(frequency_hz: i32, slope_mode: SlopeMode) -> Self {
        Tone {
            frequency_hz,
            duration: ToneDuration::Hold,
            slope_mode,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self.duration, ToneDuration::Hold)
    }

    pub fn is_rest(&self) -> bool {
        self.frequency_hz == 0
    }

    /// Number of PCM samples this tone occupies at `sample_rate`, or `None`
    /// for a `Hold` tone (the worker treats those specially; see the queue).
    pub fn n_samples(&self, sample_rate: u32) -> Option<usize> {
        match self.duration {
            ToneDuration::Finite(d) => {
                Some(((d.as_micros() as u64) * sample_rate as u64 / 1_000_000) as usize)
            }
            ToneDuration::Hold => None,
        }
    }
}
