//! The audio-sink interface (C4). Concrete back-ends live in [`crate::sinks`];
//! this module only defines the capability the generator's worker thread
//! depends on.

use crate::error::CwResult;

/// Sample rates probed in preference order; a sink reports back the closest
/// one it actually supports.
pub const SAMPLE_RATE_PREFERENCE: [u32; 4] = [48_000, 44_100, 22_050, 8_000];

/// Picks the highest-preference rate a predicate accepts, falling back to
/// the lowest preference entry if none are explicitly supported.
pub fn negotiate_sample_rate(is_supported: impl Fn(u32) -> bool) -> u32 {
    SAMPLE_RATE_PREFERENCE
        .iter()
        .copied()
        .find(|&rate| is_supported(rate))
        .unwrap_or(*SAMPLE_RATE_PREFERENCE.last().unwrap())
}

/// A pluggable audio back-end. The generator worker is the exclusive owner
/// of a sink between `open` and `close` (invariant I6).
pub trait AudioSink: Send {
    /// Opens the device, fixing `sample_rate()` and `buffer_n_samples()` for
    /// the lifetime of this open/close pair.
    fn open(&mut self, device_name: &str) -> CwResult<()>;

    /// Consumes exactly `buffer_n_samples()` samples. Blocks for
    /// approximately one sink period.
    fn write(&mut self, samples: &[i16]) -> CwResult<()>;

    fn close(&mut self);

    fn sample_rate(&self) -> u32;

    fn buffer_n_samples(&self) -> usize;
}

/// Selects which concrete [`AudioSink`] backs a generator. The legacy
/// `Null | Console | Oss | Alsa | PulseAudio` enum collapses to three
/// variants in this rewrite — see `SPEC_FULL.md` §9 for the rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Null,
    Wav,
    RingBuffer,
}

/// Static availability probe, mirroring the legacy per-backend
/// `is_available(device)` predicate.
pub fn is_available(kind: SinkKind, _device: &str) -> bool {
    match kind {
        SinkKind::Null | SinkKind::Wav => true,
        SinkKind::RingBuffer => crate::sinks::ringbuffer::RingBufferSink::host_has_output_device(),
    }
}
