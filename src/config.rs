//! Server configuration
//!
//! All options are fixed once the server starts. Configuration is loaded
//! from a TOML file and may be overridden per-field by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_sample_rate() -> u32 {
    16_000
}

fn default_feat_dim() -> usize {
    80
}

fn default_decoding_method() -> String {
    "greedy_search".to_string()
}

fn default_frames_per_chunk() -> usize {
    32
}

/// Options forwarded to the recognizer backend.
///
/// These are the properties every online recognizer exposes; engine-specific
/// options (model paths, search parameters) live with the engine
/// implementation behind the [`Recognizer`](crate::recognizer::Recognizer)
/// seam.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognizerConfig {
    /// Sample rate the model was trained on. Incoming audio must match.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Feature dimension of the model
    #[serde(default = "default_feat_dim")]
    pub feat_dim: usize,

    /// Decoding method, echoed in result messages
    #[serde(default = "default_decoding_method")]
    pub decoding_method: String,

    /// Feature frames consumed by one decode step
    #[serde(default = "default_frames_per_chunk")]
    pub frames_per_chunk: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            feat_dim: default_feat_dim(),
            decoding_method: default_decoding_method(),
            frames_per_chunk: default_frames_per_chunk(),
        }
    }
}

fn default_doc_root() -> PathBuf {
    PathBuf::from("./web")
}

fn default_port() -> u16 {
    6006
}

fn default_tail_padding_secs() -> f32 {
    0.3
}

fn default_max_active_connections() -> usize {
    500
}

fn default_max_message_bytes() -> usize {
    1 << 20
}

fn default_max_queue() -> usize {
    1024
}

/// Main server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Recognizer options
    #[serde(default)]
    pub recognizer: RecognizerConfig,

    /// Directory where files like index.html for the HTTP server locate
    #[serde(default = "default_doc_root")]
    pub doc_root: PathBuf,

    /// Log file; logs are appended to it in addition to stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// TCP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds of zero samples appended when a client signals "Done",
    /// flushing the model's right context
    #[serde(default = "default_tail_padding_secs")]
    pub tail_padding_secs: f32,

    /// Upgrades beyond this limit are refused with 503
    #[serde(default = "default_max_active_connections")]
    pub max_active_connections: usize,

    /// Maximum size of a single WebSocket message
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// High-water mark for the ready queue; new streams are refused a slot
    /// beyond it until the queue drains
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            recognizer: RecognizerConfig::default(),
            doc_root: default_doc_root(),
            log_file: None,
            port: default_port(),
            tail_padding_secs: default_tail_padding_secs(),
            max_active_connections: default_max_active_connections(),
            max_message_bytes: default_max_message_bytes(),
            max_queue: default_max_queue(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Check the configuration before the server starts accepting.
    ///
    /// Failures here are fatal: the caller is expected to exit with the
    /// returned message.
    pub fn validate(&self) -> Result<()> {
        if self.doc_root.as_os_str().is_empty() {
            return Err(Error::Config(
                "doc_root is empty; point it at the directory holding index.html".to_string(),
            ));
        }

        let index = self.doc_root.join("index.html");
        if !index.is_file() {
            return Err(Error::Config(format!(
                "{} does not exist; doc_root must contain index.html",
                index.display()
            )));
        }

        if self.recognizer.sample_rate == 0 {
            return Err(Error::Config("recognizer.sample_rate must be non-zero".to_string()));
        }

        if !self.tail_padding_secs.is_finite() || self.tail_padding_secs < 0.0 {
            return Err(Error::Config(format!(
                "tail_padding_secs must be finite and non-negative, got {}",
                self.tail_padding_secs
            )));
        }

        if self.recognizer.frames_per_chunk == 0 {
            return Err(Error::Config(
                "recognizer.frames_per_chunk must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
