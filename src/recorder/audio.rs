//! Best-effort audio capture alongside a keyframe recording
//!
//! An [`AudioEncoder`] pushes encoded chunks into an [`AudioChunkSink`] from
//! whatever thread it runs on. The payload becomes final once the recorder
//! has requested the last data *and* the encoder has flushed; only then does
//! the matching [`PendingAudio`] resolve. Readers that look too early simply
//! see no audio.

use crate::utils::error::AppResult;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Default container type for captured audio
pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// Finalization state of a session's audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioStatus {
    /// Still assembling
    Pending,
    /// Final payload as a `data:` URI
    Ready(String),
    /// No audio was captured
    Absent,
}

/// Encoder fed from an audio-only stream
pub trait AudioEncoder: Send {
    fn mime_type(&self) -> &str {
        DEFAULT_AUDIO_MIME
    }

    /// Begin encoding into `sink`. The encoder calls [`AudioChunkSink::finish`]
    /// once its last chunk has been delivered.
    fn start(&mut self, sink: AudioChunkSink) -> AppResult<()>;

    /// Ask the encoder to deliver whatever it has buffered
    fn request_data(&mut self);

    fn stop(&mut self);
}

/// Something that may carry an audio track
pub trait AudioTrackSource: Send {
    /// A new encoder bound to an audio-only stream; `None` without a track
    fn open_encoder(&mut self) -> Option<Box<dyn AudioEncoder>>;
}

struct Assembly {
    mime: String,
    payload: Vec<u8>,
    chunks: usize,
    stop_requested: bool,
    flushed: bool,
    finalized: bool,
}

struct Shared {
    assembly: Mutex<Assembly>,
    status_tx: watch::Sender<AudioStatus>,
}

impl Shared {
    fn try_finalize(&self, assembly: &mut Assembly) {
        if !assembly.finalized && assembly.stop_requested && assembly.flushed {
            self.finalize(assembly);
        }
    }

    fn finalize(&self, assembly: &mut Assembly) {
        assembly.finalized = true;
        let status = if assembly.payload.is_empty() {
            AudioStatus::Absent
        } else {
            AudioStatus::Ready(to_data_uri(&assembly.mime, &assembly.payload))
        };
        tracing::debug!(
            "Audio finalized: {} chunks, {} bytes",
            assembly.chunks,
            assembly.payload.len()
        );
        self.status_tx.send_replace(status);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Encoder and recorder both let go without a flush
        let mut assembly = self.assembly.lock();
        if !assembly.finalized {
            self.finalize(&mut assembly);
        }
    }
}

/// Write end handed to an encoder
#[derive(Clone)]
pub struct AudioChunkSink {
    shared: Arc<Shared>,
}

impl AudioChunkSink {
    /// Append one encoded chunk
    pub fn push(&self, chunk: &[u8]) {
        let mut assembly = self.shared.assembly.lock();
        if assembly.finalized {
            return;
        }
        assembly.payload.extend_from_slice(chunk);
        assembly.chunks += 1;
    }

    /// Signal that the encoder has flushed its last chunk
    pub fn finish(&self) {
        let mut assembly = self.shared.assembly.lock();
        assembly.flushed = true;
        self.shared.try_finalize(&mut assembly);
    }

    fn request_stop(&self) {
        let mut assembly = self.shared.assembly.lock();
        assembly.stop_requested = true;
        self.shared.try_finalize(&mut assembly);
    }
}

/// Read end: resolves once the audio is final
#[derive(Debug, Clone)]
pub struct PendingAudio {
    rx: watch::Receiver<AudioStatus>,
}

impl PendingAudio {
    /// Already settled with no audio
    pub fn absent() -> Self {
        let (_tx, rx) = watch::channel(AudioStatus::Absent);
        Self { rx }
    }

    pub fn status(&self) -> AudioStatus {
        self.rx.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        *self.rx.borrow() != AudioStatus::Pending
    }

    /// The audio reference if it has already arrived
    pub fn current(&self) -> Option<String> {
        match &*self.rx.borrow() {
            AudioStatus::Ready(uri) => Some(uri.clone()),
            _ => None,
        }
    }

    /// Wait for finalization
    pub async fn wait(&self) -> Option<String> {
        let mut rx = self.rx.clone();
        if rx
            .wait_for(|status| *status != AudioStatus::Pending)
            .await
            .is_err()
        {
            tracing::debug!("Audio sender dropped before settling");
        }
        let settled = rx.borrow().clone();
        match settled {
            AudioStatus::Ready(uri) => Some(uri),
            _ => None,
        }
    }
}

/// A running encoder and its assembly
pub struct AudioCapture {
    encoder: Box<dyn AudioEncoder>,
    sink: AudioChunkSink,
}

impl AudioCapture {
    /// Start `encoder`, returning the capture and its pending result
    pub fn start(mut encoder: Box<dyn AudioEncoder>) -> AppResult<(Self, PendingAudio)> {
        let (status_tx, rx) = watch::channel(AudioStatus::Pending);
        let sink = AudioChunkSink {
            shared: Arc::new(Shared {
                assembly: Mutex::new(Assembly {
                    mime: encoder.mime_type().to_string(),
                    payload: Vec::new(),
                    chunks: 0,
                    stop_requested: false,
                    flushed: false,
                    finalized: false,
                }),
                status_tx,
            }),
        };

        encoder.start(sink.clone())?;

        Ok((Self { encoder, sink }, PendingAudio { rx }))
    }

    /// Request final data and stop; finalization completes when the encoder flushes
    pub fn stop(mut self) {
        self.encoder.request_data();
        self.encoder.stop();
        self.sink.request_stop();
    }
}

/// Encode bytes as a self-contained `data:` URI
pub fn to_data_uri(mime: &str, payload: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(payload))
}

/// Split a base64 `data:` URI into its mime type and bytes
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    let bytes = BASE64.decode(data).ok()?;
    Some((mime.to_string(), bytes))
}
