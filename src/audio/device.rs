//! Audio device resolution
//!
//! Interactive device selection lives outside this crate; here we only
//! resolve a configured device name (substring match) or fall back to
//! the system default, failing fast at startup when nothing matches.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;

/// Get the default input device.
pub fn default_input() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| AudioError::DeviceNotFound("no default input device".to_string()))
}

/// Get the default output device.
pub fn default_output() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceNotFound("no default output device".to_string()))
}

/// Find an input device whose name contains `name`, or the default when
/// `name` is `None`.
pub fn find_input(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    match name {
        None => default_input(),
        Some(wanted) => {
            let devices = cpal::default_host()
                .input_devices()
                .map_err(|e| AudioError::CpalError(e.to_string()))?;
            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name.contains(wanted) {
                        return Ok(device);
                    }
                }
            }
            Err(AudioError::DeviceNotFound(wanted.to_string()))
        }
    }
}

/// Find an output device whose name contains `name`, or the default when
/// `name` is `None`.
pub fn find_output(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    match name {
        None => default_output(),
        Some(wanted) => {
            let devices = cpal::default_host()
                .output_devices()
                .map_err(|e| AudioError::CpalError(e.to_string()))?;
            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name.contains(wanted) {
                        return Ok(device);
                    }
                }
            }
            Err(AudioError::DeviceNotFound(wanted.to_string()))
        }
    }
}

/// Summary of one audio device for the startup log.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
}

/// List all available devices.
pub fn list_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let mut devices: Vec<DeviceInfo> = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                devices.push(DeviceInfo {
                    name,
                    is_input: true,
                    is_output: false,
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                    existing.is_output = true;
                } else {
                    devices.push(DeviceInfo {
                        name,
                        is_input: false,
                        is_output: true,
                    });
                }
            }
        }
    }

    devices
}
