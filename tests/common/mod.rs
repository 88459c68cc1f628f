//! Shared test fixtures: a scripted recognizer that records how it is
//! driven, and a helper that boots a full server on a random port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use streaming_asr_server::error::{Error, Result};
use streaming_asr_server::recognizer::{OnlineStream, RecognitionResult, Recognizer};
use streaming_asr_server::{ServerConfig, StreamingServer};

/// 10 ms frames at 16 kHz
pub const SAMPLES_PER_FRAME: usize = 160;

pub struct ScriptedRecognizer {
    frames_per_chunk: usize,
    decode_delay: Duration,
    fail_decode: bool,
    streams: Mutex<Vec<Arc<ScriptedStream>>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self {
            frames_per_chunk: 32,
            decode_delay: Duration::ZERO,
            fail_decode: false,
            streams: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chunk(mut self, frames: usize) -> Self {
        self.frames_per_chunk = frames;
        self
    }

    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_decode = true;
        self
    }

    pub fn new_stream(&self) -> Arc<ScriptedStream> {
        let stream = Arc::new(ScriptedStream {
            frames_per_chunk: self.frames_per_chunk,
            decode_delay: self.decode_delay,
            fail_decode: AtomicBool::new(self.fail_decode),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            decode_calls: AtomicUsize::new(0),
            log: None,
            label: String::new(),
            state: Mutex::new(StreamState::default()),
        });
        self.streams.lock().push(stream.clone());
        stream
    }

    /// Streams created so far, in creation order.
    pub fn streams(&self) -> Vec<Arc<ScriptedStream>> {
        self.streams.lock().clone()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn create_stream(&self) -> Arc<dyn OnlineStream> {
        self.new_stream()
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }
}

#[derive(Default)]
struct StreamState {
    total_samples: usize,
    finished: bool,
    decoded_frames: usize,
}

pub struct ScriptedStream {
    frames_per_chunk: usize,
    decode_delay: Duration,
    fail_decode: AtomicBool,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub decode_calls: AtomicUsize,
    log: Option<Arc<Mutex<Vec<String>>>>,
    label: String,
    state: Mutex<StreamState>,
}

impl ScriptedStream {
    /// Standalone labelled stream appending to a shared decode log.
    pub fn labelled(
        label: &str,
        frames_per_chunk: usize,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            frames_per_chunk,
            decode_delay: Duration::ZERO,
            fail_decode: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            decode_calls: AtomicUsize::new(0),
            log: Some(log),
            label: label.to_string(),
            state: Mutex::new(StreamState::default()),
        })
    }

    pub fn samples_accepted(&self) -> usize {
        self.state.lock().total_samples
    }

    pub fn feed_frames(&self, frames: usize) {
        self.accept_waveform(16_000, &vec![0.0; frames * SAMPLES_PER_FRAME]);
    }

    fn frames(state: &StreamState) -> usize {
        state.total_samples / SAMPLES_PER_FRAME
    }
}

impl OnlineStream for ScriptedStream {
    fn accept_waveform(&self, _sample_rate: u32, samples: &[f32]) {
        self.state.lock().total_samples += samples.len();
    }

    fn input_finished(&self) {
        self.state.lock().finished = true;
    }

    fn is_ready(&self) -> bool {
        let state = self.state.lock();
        let undecoded = Self::frames(&state) - state.decoded_frames;
        undecoded >= self.frames_per_chunk || (state.finished && undecoded > 0)
    }

    fn decode(&self) -> Result<()> {
        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);

        if self.fail_decode.load(Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Recognizer("scripted decode failure".to_string()));
        }

        if !self.decode_delay.is_zero() {
            std::thread::sleep(self.decode_delay);
        }

        {
            let mut state = self.state.lock();
            let undecoded = Self::frames(&state) - state.decoded_frames;
            state.decoded_frames += undecoded.min(self.frames_per_chunk);
        }

        if let Some(log) = &self.log {
            log.lock().push(self.label.clone());
        }
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn result(&self) -> RecognitionResult {
        let state = self.state.lock();
        let frames = Self::frames(&state);
        RecognitionResult {
            method: "scripted".to_string(),
            segment: 0,
            text: format!("decoded {} of {} frames", state.decoded_frames, frames),
            tokens: Vec::new(),
            timestamps: Vec::new(),
            is_final: state.finished && state.decoded_frames == frames,
        }
    }

    fn num_frames_ready(&self) -> usize {
        Self::frames(&self.state.lock())
    }

    fn is_last_frame(&self, frame: usize) -> bool {
        let state = self.state.lock();
        let frames = Self::frames(&state);
        state.finished && frames > 0 && frame == frames - 1
    }
}

/// Boot a server on a random port with a scripted recognizer and a
/// populated doc root. The tempdir guard must stay alive for the test.
pub async fn start_server(
    recognizer: Arc<ScriptedRecognizer>,
    mutate: impl FnOnce(&mut ServerConfig),
) -> (Arc<StreamingServer>, SocketAddr, tempfile::TempDir) {
    let doc_root = tempfile::tempdir().expect("create doc root");
    std::fs::write(doc_root.path().join("index.html"), "<html>INDEX</html>").unwrap();
    std::fs::write(doc_root.path().join("app.js"), "console.log('ready');").unwrap();

    let mut config = ServerConfig {
        port: 0,
        doc_root: doc_root.path().to_path_buf(),
        ..Default::default()
    };
    mutate(&mut config);

    let server = StreamingServer::new(config, recognizer).expect("server setup");
    let listener = server.bind().expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(server.clone().serve(listener));

    (server, addr, doc_root)
}

/// Poll until `predicate` holds or the timeout elapses.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
