use crate::error::CwResult;
use crate::sink::AudioSink;

/// Discards every sample. Used in tests and headless operation where a
/// generator must run but nothing should actually sound.
pub struct NullSink {
    sample_rate: u32,
    buffer_n_samples: usize,
    open: bool,
}

impl NullSink {
    pub fn new(sample_rate: u32, buffer_n_samples: usize) -> Self {
        NullSink {
            sample_rate,
            buffer_n_samples,
            open: false,
        }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        NullSink::new(44_100, 512)
    }
}

impl AudioSink for NullSink {
    fn open(&mut self, _device_name: &str) -> CwResult<()> {
        self.open = true;
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> CwResult<()> {
        debug_assert_eq!(samples.len(), self.buffer_n_samples);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_n_samples(&self) -> usize {
        self.buffer_n_samples
    }
}
