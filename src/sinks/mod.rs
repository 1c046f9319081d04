//! Concrete [`crate::sink::AudioSink`] back-ends. These sit outside the
//! core's invariant surface (§1) but ship in the crate the way `unixcw`
//! ships its `null`/`console`/`alsa`/`pulseaudio` plug-ins alongside `libcw`.

pub mod null;
pub mod ringbuffer;
pub mod wav;

pub use null::NullSink;
pub use ringbuffer::RingBufferSink;
pub use wav::WavSink;
