//! List audio input devices.

use zoomcast_audio_capture::backend::{select_loopback, select_microphone};
use zoomcast_audio_capture::{list_input_devices, AudioBackend, CpalBackend};
use zoomcast_common::ZoomcastError;

pub fn run() -> anyhow::Result<()> {
    let devices = match list_input_devices() {
        Ok(devices) => devices,
        Err(ZoomcastError::BackendUnavailable { message }) => {
            println!("[WARN] No audio host available ({message})");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    let microphone = select_microphone(&devices).map(|d| d.name.clone());
    let loopback = select_loopback(&devices).map(|d| d.name.clone());
    println!("Audio input devices ({}):", CpalBackend::new().name());
    for device in &devices {
        let mut tags = Vec::new();
        if device.is_default {
            tags.push("default");
        }
        if loopback.as_deref() == Some(device.name.as_str()) {
            tags.push("loopback");
        }
        if microphone.as_deref() == Some(device.name.as_str()) {
            tags.push("microphone");
        }
        println!(
            "  {} ({} ch, {} Hz){}",
            device.name,
            device.channels,
            device.default_sample_rate,
            if tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", tags.join(", "))
            }
        );
    }
    Ok(())
}
