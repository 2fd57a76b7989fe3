//! Candle device selection shared by the embedding and reranker models.

use candle_core::Device;
use tracing::{debug, info};

use crate::config::DevicePreference;
use crate::error::{ModelError, ModelResult};

/// Pick a device for `pref`. `Auto` falls back to CPU silently.
pub(crate) fn select_device(pref: DevicePreference) -> ModelResult<Device> {
    match pref {
        DevicePreference::Auto => Ok(try_gpu().unwrap_or_else(|| {
            info!("Using CPU");
            Device::Cpu
        })),
        DevicePreference::Gpu => try_gpu().ok_or_else(|| ModelError::DeviceNotAvailable {
            reason: gpu_not_available_reason(),
        }),
        DevicePreference::Cpu => Ok(Device::Cpu),
    }
}

/// First GPU device compiled in and present, if any.
pub(crate) fn try_gpu() -> Option<Device> {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal GPU");
                return Some(device);
            }
            Err(e) => debug!("Metal not available: {}", e),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA GPU");
                return Some(device);
            }
            Err(e) => debug!("CUDA not available: {}", e),
        }
    }

    debug!("No GPU backend available");
    None
}

pub(crate) fn gpu_not_available_reason() -> String {
    if cfg!(feature = "metal") {
        "Metal GPU not available on this system".to_string()
    } else if cfg!(feature = "cuda") {
        "CUDA GPU not available. Ensure NVIDIA drivers and CUDA toolkit are installed".to_string()
    } else {
        "hukum was built without GPU support. \
         Rebuild with --features metal (macOS) or --features cuda (NVIDIA GPU)"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_always_available() {
        assert!(matches!(select_device(DevicePreference::Cpu), Ok(Device::Cpu)));
        assert!(select_device(DevicePreference::Auto).is_ok());
    }

    #[cfg(not(any(feature = "metal", feature = "cuda")))]
    #[test]
    fn test_gpu_without_features_fails() {
        let err = select_device(DevicePreference::Gpu).unwrap_err();
        assert!(err.to_string().contains("without GPU support"));
    }
}
