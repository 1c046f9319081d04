//! A real-time sink built the way the `emu198x` audio backend is built:
//! `cpal` owns the device and its callback thread, and a lock-free SPSC
//! ring buffer (`ringbuf`) hands samples from the generator's worker thread
//! (producer) to the platform audio callback (consumer). This is this
//! rewrite's single cross-platform stand-in for the legacy
//! ALSA/OSS/PulseAudio back-ends (`SPEC_FULL.md` §9).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapProd, HeapRb,
};

use crate::error::{CwError, CwResult};
use crate::sink::{negotiate_sample_rate, AudioSink};

/// Rest level fed to the device on underrun, to avoid audible clicks.
const REST_LEVEL: f32 = 0.0;

/// Target sink period, used to size the preferred PCM buffer.
const BUFFER_N_SAMPLES_DEFAULT: usize = 512;

pub struct RingBufferSink {
    device_name_hint: String,
    sample_rate: u32,
    buffer_n_samples: usize,
    stream: Option<Stream>,
    producer: Option<HeapProd<f32>>,
}

impl RingBufferSink {
    pub fn new(preferred_sample_rate_hint: u32, buffer_n_samples: usize) -> Self {
        RingBufferSink {
            device_name_hint: String::new(),
            sample_rate: preferred_sample_rate_hint,
            buffer_n_samples,
            stream: None,
            producer: None,
        }
    }

    pub fn host_has_output_device() -> bool {
        cpal::default_host().default_output_device().is_some()
    }

    fn select_device(&self) -> Option<cpal::Device> {
        let host = cpal::default_host();
        if self.device_name_hint.is_empty() {
            return host.default_output_device();
        }
        host.output_devices().ok()?.find(|d| {
            d.name()
                .map(|n| n == self.device_name_hint)
                .unwrap_or(false)
        })
    }
}

impl Default for RingBufferSink {
    fn default() -> Self {
        RingBufferSink::new(44_100, BUFFER_N_SAMPLES_DEFAULT)
    }
}

impl AudioSink for RingBufferSink {
    fn open(&mut self, device_name: &str) -> CwResult<()> {
        self.device_name_hint = device_name.to_string();
        let device = self
            .select_device()
            .ok_or_else(|| CwError::SinkError("no output device available".into()))?;

        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| CwError::SinkError(e.to_string()))?
            .collect();

        let negotiated = negotiate_sample_rate(|rate| {
            supported.iter().any(|c| {
                rate >= c.min_sample_rate().0 && rate <= c.max_sample_rate().0
            })
        });

        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(negotiated),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = HeapRb::<f32>::new(self.buffer_n_samples * 8);
        let (mut producer, mut consumer) = ring.split();
        for _ in 0..self.buffer_n_samples * 4 {
            let _ = producer.try_push(REST_LEVEL);
        }

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().unwrap_or(REST_LEVEL);
                    }
                },
                |err| eprintln!("cw ring buffer sink: stream error: {err}"),
                None,
            )
            .map_err(|e| CwError::SinkError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CwError::SinkError(e.to_string()))?;

        self.sample_rate = negotiated;
        self.stream = Some(stream);
        self.producer = Some(producer);
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> CwResult<()> {
        let producer = self
            .producer
            .as_mut()
            .ok_or_else(|| CwError::SinkError("write before open".into()))?;
        for &sample in samples {
            let normalized = sample as f32 / i16::MAX as f32;
            while producer.try_push(normalized).is_err() {
                // Back-pressure: the consumer (device callback) paces us.
                std::thread::yield_now();
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
        self.producer = None;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_n_samples(&self) -> usize {
        self.buffer_n_samples
    }
}
