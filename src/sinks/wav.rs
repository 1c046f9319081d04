use std::fs::File;
use std::io::BufWriter;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{CwError, CwResult};
use crate::sink::AudioSink;

/// Streams PCM samples straight to a WAV file via `hound`, mirroring the
/// teacher's `save_audio_to_wav` but incrementally rather than buffering the
/// whole signal in memory first.
pub struct WavSink {
    sample_rate: u32,
    buffer_n_samples: usize,
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn new(sample_rate: u32, buffer_n_samples: usize) -> Self {
        WavSink {
            sample_rate,
            buffer_n_samples,
            writer: None,
        }
    }
}

impl AudioSink for WavSink {
    fn open(&mut self, device_name: &str) -> CwResult<()> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(device_name, spec)
            .map_err(|e| CwError::SinkError(format!("creating {device_name}: {e}")))?;
        self.writer = Some(writer);
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> CwResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CwError::SinkError("write before open".into()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| CwError::SinkError(e.to_string()))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.finalize();
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_n_samples(&self) -> usize {
        self.buffer_n_samples
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        self.close();
    }
}
