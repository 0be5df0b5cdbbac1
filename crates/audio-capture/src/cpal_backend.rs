//! cpal-backed audio capture.
//!
//! cpal invokes a callback on its own audio thread; the callback converts
//! to 16-bit and forwards each buffer over a channel, so the capture thread
//! that opened the stream reads blocks with a timeout. `cpal::Stream` is not
//! `Send` and therefore lives on that capture thread.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use zoomcast_common::{ZoomcastError, ZoomcastResult};

use crate::backend::{
    f32_to_i16, select_loopback, AudioBackend, BlockStream, DeviceInfo, StreamFormat,
};

/// Audio through the platform's default cpal host.
///
/// The host is looked up per call; cpal hosts are not `Sync` on every
/// platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    fn find_input_device(&self, name: &str) -> ZoomcastResult<cpal::Device> {
        let devices = cpal::default_host()
            .input_devices()
            .map_err(|e| ZoomcastError::backend_unavailable(e.to_string()))?;
        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(device);
            }
        }
        Err(ZoomcastError::device_not_found(format!(
            "input device '{name}' disappeared"
        )))
    }

    /// Loopback source: an input named like a monitor, else (WASAPI) the
    /// default output device opened for capture.
    fn loopback_device(&self) -> ZoomcastResult<(cpal::Device, cpal::SupportedStreamConfig)> {
        let host = cpal::default_host();
        let inputs = self.input_devices().unwrap_or_default();
        if let Some(info) = select_loopback(&inputs) {
            let device = self.find_input_device(&info.name)?;
            let config = device
                .default_input_config()
                .map_err(|e| ZoomcastError::stream_read(e.to_string()))?;
            tracing::info!(device = %info.name, "Using loopback input device");
            return Ok((device, config));
        }

        if cfg!(target_os = "windows") {
            if let Some(device) = host.default_output_device() {
                let config = device
                    .default_output_config()
                    .map_err(|e| ZoomcastError::stream_read(e.to_string()))?;
                let name = device.name().unwrap_or_else(|_| "default output".into());
                tracing::info!(device = %name, "Using output device loopback");
                return Ok((device, config));
            }
        }

        Err(ZoomcastError::device_not_found(
            "no loopback/monitor capture device found",
        ))
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn is_available(&self) -> bool {
        cpal::default_host().input_devices().is_ok()
    }

    fn input_devices(&self) -> ZoomcastResult<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| ZoomcastError::backend_unavailable(e.to_string()))?;

        let mut infos = Vec::new();
        for device in devices {
            let Ok(name) = device.name() else { continue };
            let Ok(config) = device.default_input_config() else {
                tracing::debug!(device = %name, "Skipping input without a default config");
                continue;
            };
            infos.push(DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                channels: config.channels(),
                default_sample_rate: config.sample_rate().0,
            });
        }
        Ok(infos)
    }

    fn open_loopback(&self) -> ZoomcastResult<Box<dyn BlockStream>> {
        let (device, config) = self.loopback_device()?;
        let stream = CpalBlockStream::open(&device, config.into(), false)?;
        Ok(Box::new(stream))
    }

    fn open_microphone(
        &self,
        device: &DeviceInfo,
        preferred_rate: u32,
    ) -> ZoomcastResult<Box<dyn BlockStream>> {
        let cpal_device = self.find_input_device(&device.name)?;
        let config = preferred_input_config(&cpal_device, preferred_rate)?;
        let stream = CpalBlockStream::open(&cpal_device, config, true)?;
        Ok(Box::new(stream))
    }
}

/// The device's config at `rate` if it supports it, else its default.
fn preferred_input_config(
    device: &cpal::Device,
    rate: u32,
) -> ZoomcastResult<cpal::StreamConfig> {
    if let Ok(ranges) = device.supported_input_configs() {
        for range in ranges {
            if range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
            {
                return Ok(range.with_sample_rate(cpal::SampleRate(rate)).into());
            }
        }
    }
    device
        .default_input_config()
        .map(Into::into)
        .map_err(|e| ZoomcastError::stream_read(e.to_string()))
}

struct CpalBlockStream {
    // Dropping the stream stops the callback.
    _stream: cpal::Stream,
    blocks: Receiver<Vec<i16>>,
    failure: Arc<Mutex<Option<String>>>,
    format: StreamFormat,
}

impl CpalBlockStream {
    fn open(device: &cpal::Device, config: cpal::StreamConfig, mono: bool) -> ZoomcastResult<Self> {
        let device_channels = config.channels.max(1) as usize;
        let format = StreamFormat::new(
            config.sample_rate.0,
            if mono { 1 } else { config.channels },
        );
        let (tx, rx) = unbounded();
        let failure = Arc::new(Mutex::new(None));
        let error_slot = Arc::clone(&failure);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let block: Vec<i16> = if mono && device_channels > 1 {
                        data.chunks_exact(device_channels)
                            .map(|frame| f32_to_i16(frame.iter().sum::<f32>() / device_channels as f32))
                            .collect()
                    } else {
                        data.iter().map(|&s| f32_to_i16(s)).collect()
                    };
                    // Receiver gone means the capture thread is shutting down.
                    let _ = tx.send(block);
                },
                move |err| {
                    tracing::warn!(error = %err, "Audio stream error");
                    *error_slot.lock() = Some(err.to_string());
                },
                None,
            )
            .map_err(|e| ZoomcastError::stream_read(e.to_string()))?;
        stream
            .play()
            .map_err(|e| ZoomcastError::stream_read(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            blocks: rx,
            failure,
            format,
        })
    }
}

impl BlockStream for CpalBlockStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read_block(&mut self, timeout: Duration) -> ZoomcastResult<Option<Vec<i16>>> {
        if let Some(message) = self.failure.lock().take() {
            return Err(ZoomcastError::stream_read(message));
        }
        match self.blocks.recv_timeout(timeout) {
            Ok(block) => Ok(Some(block)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ZoomcastError::stream_read("audio callback stopped"))
            }
        }
    }
}

/// Enumerate input devices with the default cpal host.
pub fn list_input_devices() -> ZoomcastResult<Vec<DeviceInfo>> {
    let backend = CpalBackend::new();
    if !backend.is_available() {
        return Err(ZoomcastError::backend_unavailable(format!(
            "{} audio host",
            backend.name()
        )));
    }
    backend.input_devices()
}
