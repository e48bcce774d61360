//! Session recording.
//!
//! [`SessionRecorder::start`] spawns a task that pulls chunks from a
//! [`MediaSource`] into a [`SegmentBuffer`] until [`SessionRecorder::finish`]
//! is called.  Dialogue phase changes never reach the recorder, so capture
//! keeps running through interruptions.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::buffer::SegmentBuffer;

// ---------------------------------------------------------------------------
// RecorderError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("capture device unavailable: {0}")]
    Device(String),

    #[error("capture stream failed: {0}")]
    Stream(String),

    #[error("recorder task ended unexpectedly: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// MediaSource
// ---------------------------------------------------------------------------

/// A live capture stream producing encoded media bytes.
#[async_trait]
pub trait MediaSource: Send {
    /// MIME type of the concatenated artifact, e.g. `video/webm`.
    fn mime_type(&self) -> &str;

    /// Next chunk of bytes; `None` once the stream has ended.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, RecorderError>;

    /// Release the capture device.
    fn stop(&mut self) {}
}

/// A [`MediaSource`] fed by an embedding host over a channel.
///
/// The host keeps the [`mpsc::Sender`] and pushes encoded chunks as its
/// capture pipeline produces them; dropping the sender ends the stream.
pub struct ChannelSource {
    mime_type: String,
    chunks: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    pub fn new(mime_type: impl Into<String>, capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                mime_type: mime_type.into(),
                chunks: rx,
            },
        )
    }
}

#[async_trait]
impl MediaSource for ChannelSource {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, RecorderError> {
        Ok(self.chunks.recv().await)
    }

    /// Closes the channel; chunks already queued are still delivered.
    fn stop(&mut self) {
        self.chunks.close();
    }
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// The finished artifact handed to the upload collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Number of buffer segments the bytes were collected in.
    pub segments: usize,
    /// Set when capture broke off early; `bytes` holds what came before.
    pub stream_error: Option<String>,
}

impl Recording {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the MIME type, for local storage.
    pub fn extension(&self) -> &str {
        let subtype = self
            .mime_type
            .split(';')
            .next()
            .and_then(|m| m.split('/').nth(1))
            .unwrap_or("")
            .trim();
        match subtype {
            "" => "bin",
            "x-matroska" => "mkv",
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRecorder
// ---------------------------------------------------------------------------

/// How long a stopped source gets to hand over chunks it already produced.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SessionRecorder {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Recording>,
}

impl SessionRecorder {
    /// Begin capture.  Called once, when devices are granted.
    pub fn start(mut source: Box<dyn MediaSource>, segment_bytes: usize) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut buffer = SegmentBuffer::new(segment_bytes.max(1));
            let mime_type = source.mime_type().to_string();
            log::info!("recorder: capture started ({mime_type})");

            let mut failure = None;
            let stopped = loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break true,
                    chunk = source.next_chunk() => match chunk {
                        Ok(Some(bytes)) => buffer.push_slice(&bytes),
                        Ok(None) => {
                            log::debug!("recorder: source ended");
                            break false;
                        }
                        Err(e) => {
                            failure = Some(e);
                            break false;
                        }
                    },
                }
            };
            source.stop();

            if stopped {
                let drained =
                    tokio::time::timeout(DRAIN_TIMEOUT, drain(source.as_mut(), &mut buffer)).await;
                match drained {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => failure = Some(e),
                    Err(_) => log::warn!("recorder: source still open {DRAIN_TIMEOUT:?} after stop"),
                }
            }

            if let Some(e) = &failure {
                log::warn!("recorder: capture failed after {} bytes: {e}", buffer.len());
            }
            let segments = buffer.segment_count();
            let bytes = buffer.drain();
            log::info!(
                "recorder: stopped, {} bytes in {} segments",
                bytes.len(),
                segments
            );
            Recording {
                mime_type,
                bytes,
                segments,
                stream_error: failure.map(|e| e.to_string()),
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            task,
        }
    }

    /// Stop capture and return everything recorded as one artifact.
    ///
    /// A capture stream that failed mid-session still yields the bytes it
    /// delivered, with [`Recording::stream_error`] set.
    pub async fn finish(mut self) -> Result<Recording, RecorderError> {
        if let Some(stop) = self.stop_tx.take() {
            // The task may already have ended on its own.
            let _ = stop.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| RecorderError::Task(e.to_string()))
    }
}

/// Pull the chunks a stopped source still holds.
async fn drain(
    source: &mut dyn MediaSource,
    buffer: &mut SegmentBuffer,
) -> Result<(), RecorderError> {
    while let Some(bytes) = source.next_chunk().await? {
        buffer.push_slice(&bytes);
    }
    Ok(())
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if self.stop_tx.is_some() {
            self.task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
