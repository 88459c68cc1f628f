//! Deterministic drill backend
//!
//! A frame-accounting recognizer with no model behind it: it frames the
//! accepted waveform at 10 ms, consumes a fixed number of frames per decode
//! step, and reports a running account as its hypothesis. Used for protocol
//! validation and load drills, and as the wiring reference for real engines.
//! An optional per-step delay simulates model latency.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{OnlineStream, RecognitionResult, Recognizer};
use crate::config::RecognizerConfig;
use crate::error::Result;

pub struct DrillRecognizer {
    sample_rate: u32,
    samples_per_frame: usize,
    frames_per_chunk: usize,
    decoding_method: String,
    step_delay: Duration,
}

impl DrillRecognizer {
    pub fn new(config: &RecognizerConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            // 10 ms frames, the usual feature frame shift
            samples_per_frame: (config.sample_rate / 100).max(1) as usize,
            frames_per_chunk: config.frames_per_chunk,
            decoding_method: config.decoding_method.clone(),
            step_delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every decode step, simulating model latency.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

impl Recognizer for DrillRecognizer {
    fn create_stream(&self) -> Arc<dyn OnlineStream> {
        Arc::new(DrillStream {
            samples_per_frame: self.samples_per_frame,
            frames_per_chunk: self.frames_per_chunk,
            frame_secs: self.samples_per_frame as f32 / self.sample_rate as f32,
            decoding_method: self.decoding_method.clone(),
            step_delay: self.step_delay,
            state: Mutex::new(DrillState::default()),
        })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[derive(Default)]
struct DrillState {
    total_samples: usize,
    finished: bool,
    decoded_frames: usize,
    steps: usize,
}

pub struct DrillStream {
    samples_per_frame: usize,
    frames_per_chunk: usize,
    frame_secs: f32,
    decoding_method: String,
    step_delay: Duration,
    state: Mutex<DrillState>,
}

impl DrillStream {
    fn frames_ready(state: &DrillState, samples_per_frame: usize) -> usize {
        state.total_samples / samples_per_frame
    }

    /// Total samples accepted so far.
    pub fn samples_accepted(&self) -> usize {
        self.state.lock().total_samples
    }
}

impl OnlineStream for DrillStream {
    fn accept_waveform(&self, _sample_rate: u32, samples: &[f32]) {
        let mut state = self.state.lock();
        state.total_samples += samples.len();
    }

    fn input_finished(&self) {
        self.state.lock().finished = true;
    }

    fn is_ready(&self) -> bool {
        let state = self.state.lock();
        let undecoded =
            Self::frames_ready(&state, self.samples_per_frame) - state.decoded_frames;
        undecoded >= self.frames_per_chunk || (state.finished && undecoded > 0)
    }

    fn decode(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            let undecoded =
                Self::frames_ready(&state, self.samples_per_frame) - state.decoded_frames;
            let consumed = undecoded.min(self.frames_per_chunk);
            if consumed == 0 {
                return Ok(());
            }
            state.decoded_frames += consumed;
            state.steps += 1;
        }

        if !self.step_delay.is_zero() {
            std::thread::sleep(self.step_delay);
        }

        Ok(())
    }

    fn result(&self) -> RecognitionResult {
        let state = self.state.lock();
        let frames = Self::frames_ready(&state, self.samples_per_frame);
        let decoded_secs = state.decoded_frames as f32 * self.frame_secs;

        RecognitionResult {
            method: self.decoding_method.clone(),
            segment: 0,
            text: format!("decoded {:.2}s in {} steps", decoded_secs, state.steps),
            tokens: (1..=state.steps).map(|step| format!("step{step}")).collect(),
            timestamps: (1..=state.steps)
                .map(|step| step as f32 * self.frames_per_chunk as f32 * self.frame_secs)
                .collect(),
            is_final: state.finished && state.decoded_frames == frames,
        }
    }

    fn num_frames_ready(&self) -> usize {
        let state = self.state.lock();
        Self::frames_ready(&state, self.samples_per_frame)
    }

    fn is_last_frame(&self, frame: usize) -> bool {
        let state = self.state.lock();
        let frames = Self::frames_ready(&state, self.samples_per_frame);
        state.finished && frames > 0 && frame == frames - 1
    }
}
