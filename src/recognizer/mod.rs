//! Recognizer capability seam
//!
//! The acoustic/language model is an external collaborator: the server only
//! needs a factory for per-connection decoding streams and the handful of
//! stream operations the dispatcher drives. Engines implement these traits
//! and hand the server an `Arc<dyn Recognizer>`.
//!
//! Per-stream operations live on [`OnlineStream`] so both traits stay
//! object-safe; an implementation keeps its own handle to shared model
//! state. The recognizer must tolerate concurrent `decode` calls on
//! *distinct* streams; the server never calls `decode` on the same stream
//! concurrently.

pub mod drill;

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;

/// Per-stream decoding state created by a [`Recognizer`].
///
/// A stream is exclusively owned by its connection and shared with the
/// dispatcher only while enqueued or during a decode step. Once
/// `input_finished` has been signalled and the final frame decoded, the
/// stream is terminal.
pub trait OnlineStream: Send + Sync {
    /// Append waveform samples. The slice is copied into stream-owned
    /// storage before this returns.
    fn accept_waveform(&self, sample_rate: u32, samples: &[f32]);

    /// Signal that no more audio will arrive.
    fn input_finished(&self);

    /// True when enough new frames are buffered for one decode step.
    fn is_ready(&self) -> bool;

    /// Run one decode step. Blocking; must only run on the compute pool.
    fn decode(&self) -> Result<()>;

    /// Current hypothesis for everything decoded so far.
    fn result(&self) -> RecognitionResult;

    /// Number of feature frames extracted from the accepted waveform.
    fn num_frames_ready(&self) -> usize;

    /// Whether `frame` is the final frame of the stream. Only true after
    /// `input_finished`.
    fn is_last_frame(&self, frame: usize) -> bool;
}

/// Factory for decoding streams plus the model-wide properties the server
/// needs.
pub trait Recognizer: Send + Sync {
    fn create_stream(&self) -> Arc<dyn OnlineStream>;

    /// Sample rate the loaded model expects. Fixed for the process lifetime.
    fn sample_rate(&self) -> u32;
}

/// One decoding step's hypothesis, sent to the client as a JSON text frame.
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResult {
    /// Decoding method the engine used
    pub method: String,
    /// Segment index, bumped at endpoint boundaries
    pub segment: usize,
    /// Current hypothesis text
    pub text: String,
    /// Token strings making up the hypothesis
    pub tokens: Vec<String>,
    /// Per-token timestamps in seconds
    pub timestamps: Vec<f32>,
    /// True once the stream is terminal
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn as_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
