//! Microphone capture via `cpal` (feature `microphone`).
//!
//! `cpal::Stream` is not `Send`, so the stream is built and held on a
//! dedicated thread; the cpal callback forwards raw samples, encoded as
//! little-endian `f32`, over a tokio channel.  [`MediaSource::stop`] signals
//! the thread, which drops the stream.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;

use super::recorder::{MediaSource, RecorderError};

pub struct MicrophoneSource {
    mime_type: String,
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneSource {
    /// Open the system default input device and start streaming.
    pub fn open() -> Result<Self, RecorderError> {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(u32, u16), RecorderError>>();

        let thread = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match build_stream(chunk_tx) {
                    Ok((stream, rate, channels)) => {
                        let _ = ready_tx.send(Ok((rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Block until stopped or the source is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("recorder: microphone stream closed");
            })
            .map_err(|e| RecorderError::Device(e.to_string()))?;

        let (rate, channels) = ready_rx
            .recv()
            .map_err(|e| RecorderError::Device(e.to_string()))??;
        log::info!("recorder: microphone open ({rate} Hz, {channels} ch)");

        Ok(Self {
            mime_type: format!("audio/pcm;format=f32le;rate={rate};channels={channels}"),
            chunks: chunk_rx,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

fn build_stream(
    tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<(cpal::Stream, u32, u16), RecorderError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RecorderError::Device("no input device found".into()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| RecorderError::Device(e.to_string()))?;

    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut bytes = Vec::with_capacity(data.len() * 4);
                for sample in data {
                    bytes.extend_from_slice(&sample.to_le_bytes());
                }
                // Ignore send errors; the recorder may already be finished.
                let _ = tx.send(bytes);
            },
            |err: cpal::StreamError| {
                log::error!("recorder: cpal stream error: {err}");
            },
            None,
        )
        .map_err(|e| RecorderError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| RecorderError::Stream(e.to_string()))?;
    Ok((stream, sample_rate, channels))
}

#[async_trait]
impl MediaSource for MicrophoneSource {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, RecorderError> {
        Ok(self.chunks.recv().await)
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}
