//! A library for converting between text and Continuous Wave (CW / Morse)
//! code: a transmitter that renders text as sampled sine-wave audio through
//! a pluggable sink, and a receiver that reconstructs characters from
//! key-down/key-up timestamps, optionally adapting to the sender's speed.

pub mod adaptive;
pub mod error;
pub mod generator;
pub mod key;
pub mod morse;
pub mod queue;
pub mod receiver;
pub mod sink;
pub mod sinks;
pub mod timing;
pub mod tone;

pub use error::{CwError, CwResult};
pub use generator::{Generator, PaddingMode, SlopeShape};
pub use key::{Element, IambicPaddle, KeyState, StraightKey};
pub use receiver::{Receiver, ReceiverState, StatClass, Symbol};
pub use sink::{AudioSink, SinkKind};
pub use tone::{SlopeMode, Tone, ToneDuration};
