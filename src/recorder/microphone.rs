//! Microphone capture using cpal
//!
//! Records the default input device as 16-bit PCM and delivers it as one
//! self-contained WAV file once the stream stops.

use super::audio::{AudioChunkSink, AudioEncoder, AudioTrackSource};
use crate::utils::error::{AppError, AppResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Container type of the delivered payload
pub const WAV_MIME: &str = "audio/wav";

fn default_input_device() -> Option<Device> {
    cpal::default_host().default_input_device()
}

/// Audio track backed by the default input device
#[derive(Debug, Default)]
pub struct MicrophoneTrack;

impl MicrophoneTrack {
    pub fn new() -> Self {
        Self
    }

    /// Check if an input device is present
    pub fn is_available(&self) -> bool {
        default_input_device().is_some()
    }
}

impl AudioTrackSource for MicrophoneTrack {
    fn open_encoder(&mut self) -> Option<Box<dyn AudioEncoder>> {
        let device = default_input_device()?;
        let config = match device.default_input_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to get input config: {}", e);
                return None;
            }
        };
        Some(Box::new(MicrophoneEncoder::new(
            config.sample_rate().0,
            config.channels(),
            config.sample_format(),
        )))
    }
}

/// WAV encoder reading the default input device
pub struct MicrophoneEncoder {
    is_recording: Arc<AtomicBool>,
    stream_handle: Option<std::thread::JoinHandle<()>>,
    sample_rate: u32,
    channels: u16,
    sample_format: SampleFormat,
}

impl MicrophoneEncoder {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            is_recording: Arc::new(AtomicBool::new(false)),
            stream_handle: None,
            sample_rate,
            channels,
            sample_format,
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
    is_recording: Arc<AtomicBool>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + 'static,
    i16: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if is_recording.load(Ordering::Relaxed) {
                samples
                    .lock()
                    .extend(data.iter().map(|&sample| i16::from_sample_(sample)));
            }
        },
        |err| tracing::error!("Microphone stream error: {}", err),
        None,
    )
}

/// Wrap interleaved 16-bit samples in a WAV container
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> AppResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
        .map_err(|e| AppError::Audio(format!("Failed to create WAV writer: {}", e)))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| AppError::Audio(format!("Failed to write sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| AppError::Audio(format!("Failed to finalize WAV: {}", e)))?;

    Ok(bytes)
}

impl AudioEncoder for MicrophoneEncoder {
    fn mime_type(&self) -> &str {
        WAV_MIME
    }

    fn start(&mut self, sink: AudioChunkSink) -> AppResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(AppError::Audio("Microphone already recording".to_string()));
        }
        if !matches!(
            self.sample_format,
            SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
        ) {
            return Err(AppError::Audio(format!(
                "Unsupported sample format {:?}",
                self.sample_format
            )));
        }
        if default_input_device().is_none() {
            return Err(AppError::Audio("No default input device".to_string()));
        }

        self.is_recording.store(true, Ordering::SeqCst);

        let is_recording = self.is_recording.clone();
        let sample_format = self.sample_format;
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let stream_config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // cpal streams are not Send, so the stream lives on its own thread
        let handle = std::thread::spawn(move || {
            let Some(device) = default_input_device() else {
                tracing::error!("Failed to get default input device");
                sink.finish();
                return;
            };

            let samples = Arc::new(Mutex::new(Vec::new()));
            let stream = match sample_format {
                SampleFormat::I16 => {
                    build_stream::<i16>(&device, &stream_config, samples.clone(), is_recording.clone())
                }
                SampleFormat::U16 => {
                    build_stream::<u16>(&device, &stream_config, samples.clone(), is_recording.clone())
                }
                _ => build_stream::<f32>(&device, &stream_config, samples.clone(), is_recording.clone()),
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build input stream: {}", e);
                    sink.finish();
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start microphone stream: {}", e);
                sink.finish();
                return;
            }

            tracing::info!("Microphone stream started ({:?})", sample_format);

            while is_recording.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }

            drop(stream);
            let samples = std::mem::take(&mut *samples.lock());
            if !samples.is_empty() {
                match encode_wav(&samples, sample_rate, channels) {
                    Ok(wav) => sink.push(&wav),
                    Err(e) => tracing::error!("{}", e),
                }
            }
            sink.finish();
            tracing::info!("Microphone stream stopped: {} samples", samples.len());
        });

        self.stream_handle = Some(handle);
        Ok(())
    }

    fn request_data(&mut self) {
        // The WAV is written in one piece when the stream stops
    }

    fn stop(&mut self) {
        self.is_recording.store(false, Ordering::SeqCst);
        if let Some(handle) = self.stream_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MicrophoneEncoder {
    fn drop(&mut self) {
        self.stop();
    }
}
