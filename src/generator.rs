//! The generator / sample synthesiser (C5): a background worker that
//! dequeues tones from a [`ToneQueue`] and renders them into PCM buffers
//! handed to an [`AudioSink`].

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{CwError, CwResult};
use crate::morse;
use crate::queue::ToneQueue;
use crate::sink::AudioSink;
use crate::timing::{
    self, derive_generator_timings, FREQUENCY_MAX_HZ, FREQUENCY_MIN_HZ, GAP_MAX, GAP_MIN,
    GeneratorTimings, SPEED_MAX_WPM, SPEED_MIN_WPM, VOLUME_MAX_PERCENT, VOLUME_MIN_PERCENT,
    WEIGHTING_MAX, WEIGHTING_MIN,
};
use crate::tone::{SlopeMode, Tone};

pub const SLOPE_US_DEFAULT: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeShape {
    Linear,
    RaisedCosine,
    Sine,
    Rectangular,
}

/// Whether the worker blocks waiting for tones, or pads with silence to
/// keep a period-polled sink fed. See `SPEC_FULL.md` §4.5 step 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingMode {
    SilentPad,
    BlockOnEmpty,
}

#[derive(Debug, Clone, Copy)]
struct Knobs {
    frequency_hz: i32,
    volume_percent: u32,
    send_speed_wpm: u32,
    weighting: u32,
    gap: u32,
    slope_shape: SlopeShape,
    slope_us: i64,
}

impl Default for Knobs {
    fn default() -> Self {
        Knobs {
            frequency_hz: timing::FREQUENCY_DEFAULT_HZ,
            volume_percent: timing::VOLUME_DEFAULT_PERCENT,
            send_speed_wpm: timing::SPEED_DEFAULT_WPM,
            weighting: timing::WEIGHTING_DEFAULT,
            gap: timing::GAP_DEFAULT,
            slope_shape: SlopeShape::RaisedCosine,
            slope_us: SLOPE_US_DEFAULT,
        }
    }
}

impl Knobs {
    fn timings(&self) -> GeneratorTimings {
        derive_generator_timings(self.send_speed_wpm, self.gap, self.weighting)
    }

    fn amplitude_peak(&self) -> f64 {
        self.volume_percent as f64 * 32768.0 / 100.0
    }
}

#[derive(Debug, Clone, Copy)]
struct WorkerSnapshot {
    knobs: Knobs,
    timings: GeneratorTimings,
}

enum RunState {
    New,
    Running,
    Stopped,
}

/// Renders text and primitive Morse elements to sampled audio via a
/// background worker thread, which is the sole owner of the sink between
/// `start()` and `stop()` (invariant I6).
pub struct Generator {
    queue: Arc<ToneQueue>,
    knobs: Arc<Mutex<Knobs>>,
    sink: Option<Box<dyn AudioSink>>,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    padding_mode: PaddingMode,
    state: RunState,
    sample_rate: u32,
    buffer_n_samples: usize,
}

impl Generator {
    pub fn new(sink: Box<dyn AudioSink>, queue_capacity: usize, padding_mode: PaddingMode) -> Self {
        Generator {
            queue: Arc::new(ToneQueue::new(queue_capacity)),
            knobs: Arc::new(Mutex::new(Knobs::default())),
            sink: Some(sink),
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
            padding_mode,
            state: RunState::New,
            sample_rate: 0,
            buffer_n_samples: 0,
        }
    }

    pub fn queue(&self) -> Arc<ToneQueue> {
        self.queue.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    // ---- knob setters -----------------------------------------------

    pub fn set_frequency(&self, hz: i32) -> CwResult<()> {
        if !(FREQUENCY_MIN_HZ..=FREQUENCY_MAX_HZ).contains(&hz) {
            return Err(CwError::OutOfRange {
                value: hz as i64,
                min: FREQUENCY_MIN_HZ as i64,
                max: FREQUENCY_MAX_HZ as i64,
            });
        }
        self.knobs.lock().unwrap().frequency_hz = hz;
        Ok(())
    }

    pub fn set_volume(&self, percent: u32) -> CwResult<()> {
        if !(VOLUME_MIN_PERCENT..=VOLUME_MAX_PERCENT).contains(&percent) {
            return Err(CwError::OutOfRange {
                value: percent as i64,
                min: VOLUME_MIN_PERCENT as i64,
                max: VOLUME_MAX_PERCENT as i64,
            });
        }
        self.knobs.lock().unwrap().volume_percent = percent;
        Ok(())
    }

    pub fn set_speed(&self, wpm: u32) -> CwResult<()> {
        if !(SPEED_MIN_WPM..=SPEED_MAX_WPM).contains(&wpm) {
            return Err(CwError::OutOfRange {
                value: wpm as i64,
                min: SPEED_MIN_WPM as i64,
                max: SPEED_MAX_WPM as i64,
            });
        }
        self.knobs.lock().unwrap().send_speed_wpm = wpm;
        Ok(())
    }

    pub fn set_gap(&self, gap: u32) -> CwResult<()> {
        if !(GAP_MIN..=GAP_MAX).contains(&gap) {
            return Err(CwError::OutOfRange {
                value: gap as i64,
                min: GAP_MIN as i64,
                max: GAP_MAX as i64,
            });
        }
        self.knobs.lock().unwrap().gap = gap;
        Ok(())
    }

    pub fn set_weighting(&self, weighting: u32) -> CwResult<()> {
        if !(WEIGHTING_MIN..=WEIGHTING_MAX).contains(&weighting) {
            return Err(CwError::OutOfRange {
                value: weighting as i64,
                min: WEIGHTING_MIN as i64,
                max: WEIGHTING_MAX as i64,
            });
        }
        self.knobs.lock().unwrap().weighting = weighting;
        Ok(())
    }

    // ---- lifecycle -----------------------------------------------------

    pub fn start(&mut self, device_name: &str) -> CwResult<()> {
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| CwError::StateError("generator already started".into()))?;
        sink.open(device_name)?;
        self.sample_rate = sink.sample_rate();
        self.buffer_n_samples = sink.buffer_n_samples();

        let queue = self.queue.clone();
        let knobs = self.knobs.clone();
        let stop_flag = self.stop_flag.clone();
        let padding_mode = self.padding_mode;
        let sample_rate = self.sample_rate;
        let buffer_n_samples = self.buffer_n_samples;

        self.worker = Some(std::thread::spawn(move || {
            run_worker(
                sink,
                queue,
                knobs,
                stop_flag,
                padding_mode,
                sample_rate,
                buffer_n_samples,
            );
        }));
        self.state = RunState::Running;
        Ok(())
    }

    pub fn stop(&mut self) {
        if matches!(self.state, RunState::Stopped | RunState::New) {
            return;
        }
        self.stop_flag.store(true, Ordering::Release);
        // Wake a worker parked in a blocking dequeue.
        let _ = self.queue.enqueue(Tone::rest(Duration::from_micros(0)));
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.state = RunState::Stopped;
    }

    // ---- transmit --------------------------------------------------

    /// Encodes `text` as tones and enqueues them, blocking if the queue
    /// fills. Unknown characters are skipped (mirroring the teacher's
    /// treatment of whitespace control characters).
    pub fn send_string(&self, text: &str) -> CwResult<()> {
        let chars: Vec<char> = text.chars().collect();
        for (i, &ch) in chars.iter().enumerate() {
            let up = ch.to_ascii_uppercase();
            if up == ' ' {
                self.enqueue_word_gap();
                continue;
            }
            let Some(repr) = morse::lookup_char(up) else {
                continue;
            };
            self.send_representation(repr);
            let last = i + 1 == chars.len();
            let next_is_space = chars.get(i + 1) == Some(&' ');
            if !last && !next_is_space {
                self.enqueue_char_gap();
            }
        }
        Ok(())
    }

    fn send_representation(&self, repr: &str) {
        let knobs = *self.knobs.lock().unwrap();
        let timings = knobs.timings();
        let symbols: Vec<char> = repr.chars().collect();
        for (i, &sym) in symbols.iter().enumerate() {
            let dur_us = match sym {
                '.' => timings.dot_ideal_us,
                '-' => timings.dash_ideal_us,
                _ => continue,
            };
            self.queue.enqueue_blocking(Tone::new(
                knobs.frequency_hz,
                Duration::from_micros(dur_us as u64),
                SlopeMode::Both,
            ));
            if i + 1 != symbols.len() {
                self.queue
                    .enqueue_blocking(Tone::rest(Duration::from_micros(timings.eoe_delay_us as u64)));
            }
        }
    }

    fn enqueue_char_gap(&self) {
        let knobs = *self.knobs.lock().unwrap();
        let timings = knobs.timings();
        let gap_us = timings.eoc_delay_us + timings.additional_delay_us;
        self.queue
            .enqueue_blocking(Tone::rest(Duration::from_micros(gap_us as u64)));
    }

    fn enqueue_word_gap(&self) {
        let knobs = *self.knobs.lock().unwrap();
        let timings = knobs.timings();
        let gap_us = timings.eow_delay_us + timings.adjustment_delay_us;
        self.queue
            .enqueue_blocking(Tone::rest(Duration::from_micros(gap_us as u64)));
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn precompute_slope_table(shape: SlopeShape, slope_n: usize) -> Vec<f64> {
    (0..slope_n.max(1))
        .map(|k| match shape {
            SlopeShape::RaisedCosine => {
                (1.0 - (PI * k as f64 / slope_n.max(1) as f64).cos()) / 2.0
            }
            SlopeShape::Linear => k as f64 / slope_n.max(1) as f64,
            SlopeShape::Sine => (PI / 2.0 * k as f64 / slope_n.max(1) as f64).sin(),
            SlopeShape::Rectangular => 1.0,
        })
        .collect()
}

/// Amplitude at sample index `idx` (0-based since the tone/hold started).
/// `total_n` is `None` for an unbounded `Hold` tone: the falling-edge region
/// is only ever evaluated for finite tones.
fn tone_amplitude(
    tone: &Tone,
    idx: usize,
    total_n: Option<usize>,
    slope_n: usize,
    slope_table: &[f64],
    peak: f64,
) -> f64 {
    if tone.is_rest() {
        return 0.0;
    }
    let rising = tone.slope_mode.has_rising() && idx < slope_n;
    let falling = match total_n {
        Some(n) if tone.slope_mode.has_falling() => idx + slope_n >= n,
        _ => false,
    };
    if rising {
        peak * slope_table[idx.min(slope_table.len() - 1)]
    } else if falling {
        let n = total_n.unwrap();
        let k = n.saturating_sub(1).saturating_sub(idx).min(slope_table.len() - 1);
        peak * slope_table[k]
    } else {
        peak
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_chunk(
    tone: &Tone,
    start_idx: usize,
    count: usize,
    total_n: Option<usize>,
    slope_n: usize,
    slope_table: &[f64],
    peak: f64,
    sample_rate: u32,
    phase: &mut f64,
    buffer: &mut [i16],
    sub_start: &mut usize,
    sink: &mut dyn AudioSink,
) -> CwResult<()> {
    let phase_inc = 2.0 * PI * tone.frequency_hz as f64 / sample_rate as f64;
    for k in 0..count {
        let idx = start_idx + k;
        let amp = tone_amplitude(tone, idx, total_n, slope_n, slope_table, peak);
        let sample = (amp * phase.sin()).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        buffer[*sub_start] = sample;
        *sub_start += 1;
        *phase += phase_inc;
        if *phase > 2.0 * PI {
            *phase -= 2.0 * PI;
        }
        if *sub_start == buffer.len() {
            sink.write(buffer)?;
            *sub_start = 0;
        }
    }
    Ok(())
}

fn run_worker(
    mut sink: Box<dyn AudioSink>,
    queue: Arc<ToneQueue>,
    knobs: Arc<Mutex<Knobs>>,
    stop_flag: Arc<AtomicBool>,
    padding_mode: PaddingMode,
    sample_rate: u32,
    buffer_n_samples: usize,
) {
    let mut buffer = vec![0i16; buffer_n_samples.max(1)];
    let mut sub_start = 0usize;
    let mut phase = 0f64;
    let mut current_hold: Option<(i32, usize)> = None;

    loop {
        if stop_flag.load(Ordering::Acquire) && queue.is_empty() {
            break;
        }

        let tone = match padding_mode {
            PaddingMode::BlockOnEmpty => queue.dequeue_blocking(&stop_flag),
            PaddingMode::SilentPad => queue.try_dequeue(),
        };

        let Some(tone) = tone else {
            if stop_flag.load(Ordering::Acquire) {
                break;
            }
            // Silent padding: finish the current buffer with silence so a
            // period-polled sink is never starved.
            for s in buffer[sub_start..].iter_mut() {
                *s = 0;
            }
            if sink.write(&buffer).is_err() {
                break;
            }
            sub_start = 0;
            std::thread::sleep(Duration::from_millis(1));
            continue;
        };

        let current_knobs = *knobs.lock().unwrap();
        let snap = WorkerSnapshot {
            knobs: current_knobs,
            timings: current_knobs.timings(),
        };
        let slope_n = ((snap.knobs.slope_us as i64).max(0) as u64 * sample_rate as u64
            / 1_000_000) as usize;
        let slope_table = precompute_slope_table(snap.knobs.slope_shape, slope_n);
        let peak = snap.knobs.amplitude_peak();

        match tone.n_samples(sample_rate) {
            Some(n) => {
                current_hold = None;
                if emit_chunk(
                    &tone,
                    0,
                    n,
                    Some(n),
                    slope_n,
                    &slope_table,
                    peak,
                    sample_rate,
                    &mut phase,
                    &mut buffer,
                    &mut sub_start,
                    sink.as_mut(),
                )
                .is_err()
                {
                    break;
                }
                queue.mark_tone_finished();
            }
            None => {
                let start_idx = match current_hold {
                    Some((freq, emitted)) if freq == tone.frequency_hz => emitted,
                    _ => 0,
                };
                let count = buffer.len() - sub_start;
                if emit_chunk(
                    &tone,
                    start_idx,
                    count,
                    None,
                    slope_n,
                    &slope_table,
                    peak,
                    sample_rate,
                    &mut phase,
                    &mut buffer,
                    &mut sub_start,
                    sink.as_mut(),
                )
                .is_err()
                {
                    break;
                }
                current_hold = Some((tone.frequency_hz, start_idx + count));
            }
        }
    }

    sink.close();
}
