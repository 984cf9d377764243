use std::fmt;

use clap::ValueEnum;
use log::info;

use crate::{Result, TrainErr};

/// Where tensors live and kernels run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// The device asked for on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DevicePreference {
    /// Use the accelerator when there is one.
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// Whether the numerical backend can run on an accelerator.
///
/// The ndarray backend only runs on the host.
pub fn accelerator_available() -> bool {
    false
}

/// Resolves the device the whole run will use.
///
/// # Arguments
/// * `preference` - The requested device.
/// * `no_cuda` - Forces the cpu whatever the preference is.
/// * `accelerator` - Whether the backend reports an accelerator.
///
/// # Returns
/// The selected device, or `DeviceUnavailable` if the accelerator was asked for explicitly
/// and there's none.
pub fn select(preference: DevicePreference, no_cuda: bool, accelerator: bool) -> Result<Device> {
    let device = match (preference, no_cuda, accelerator) {
        (_, true, _) | (DevicePreference::Cpu, ..) => Device::Cpu,
        (_, false, true) => Device::Cuda(0),
        (DevicePreference::Auto, false, false) => {
            info!("no accelerator available, falling back to the cpu");
            Device::Cpu
        }
        (DevicePreference::Cuda, false, false) => {
            return Err(TrainErr::DeviceUnavailable(Device::Cuda(0).to_string()));
        }
    };

    if device != Device::Cpu {
        info!("Using CUDA");
    }

    info!("selected device {device}");
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cuda_always_wins() {
        for preference in [DevicePreference::Auto, DevicePreference::Cpu, DevicePreference::Cuda] {
            assert_eq!(select(preference, true, true).unwrap(), Device::Cpu);
        }
    }

    #[test]
    fn auto_follows_the_backend() {
        assert_eq!(select(DevicePreference::Auto, false, true).unwrap(), Device::Cuda(0));
        assert_eq!(select(DevicePreference::Auto, false, false).unwrap(), Device::Cpu);
    }

    #[test]
    fn explicit_cuda_without_accelerator_is_fatal() {
        assert!(matches!(
            select(DevicePreference::Cuda, false, false),
            Err(TrainErr::DeviceUnavailable(_))
        ));
    }
}
