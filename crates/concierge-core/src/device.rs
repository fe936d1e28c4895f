//! Compute target selection.
//!
//! The device is chosen once per process and shared by every model in the
//! registry: CUDA when available, Metal on Apple Silicon, CPU otherwise.

use candle_core::{DType, Device};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cuda,
    Metal,
    Cpu,
}

impl DeviceKind {
    pub fn is_cpu(&self) -> bool {
        matches!(self, DeviceKind::Cpu)
    }
}

/// Coarse compute classification reported alongside each loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeTarget {
    Cpu,
    Accelerator,
}

impl From<DeviceKind> for ComputeTarget {
    fn from(kind: DeviceKind) -> Self {
        if kind.is_cpu() {
            ComputeTarget::Cpu
        } else {
            ComputeTarget::Accelerator
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device: Device,
    pub kind: DeviceKind,
    pub supports_bf16: bool,
}

impl DeviceProfile {
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            kind: DeviceKind::Cpu,
            supports_bf16: false,
        }
    }

    pub fn compute_target(&self) -> ComputeTarget {
        self.kind.into()
    }

    /// Weight dtype for T5 checkpoints on this device.
    ///
    /// T5 activations overflow in F16, so half precision is only used as BF16
    /// on CUDA. Metal and CPU run F32.
    pub fn select_dtype(&self, requested: Option<&str>) -> DType {
        let dtype = match (requested.unwrap_or(""), self.kind) {
            ("float32" | "f32", _) => DType::F32,
            (_, DeviceKind::Cuda) if self.supports_bf16 => DType::BF16,
            _ => DType::F32,
        };

        debug!(
            "Selected dtype {:?} for device {:?} (requested: {:?})",
            dtype, self.kind, requested
        );

        dtype
    }
}

pub struct DeviceSelector;

impl DeviceSelector {
    fn try_metal() -> Option<DeviceProfile> {
        let device = std::panic::catch_unwind(|| Device::new_metal(0)).ok()?.ok()?;
        if device.is_metal() {
            Some(DeviceProfile {
                device,
                kind: DeviceKind::Metal,
                supports_bf16: false,
            })
        } else {
            None
        }
    }

    fn try_cuda() -> Option<DeviceProfile> {
        let device = std::panic::catch_unwind(|| Device::cuda_if_available(0))
            .ok()?
            .ok()?;
        if device.is_cuda() {
            Some(DeviceProfile {
                device,
                kind: DeviceKind::Cuda,
                // Assumes compute capability 8.0+
                supports_bf16: true,
            })
        } else {
            None
        }
    }

    pub fn detect() -> DeviceProfile {
        if let Some(profile) = Self::try_cuda() {
            info!("Using CUDA device for inference");
            return profile;
        }

        if cfg!(target_os = "macos") {
            if let Some(profile) = Self::try_metal() {
                info!("Using Metal device for inference");
                return profile;
            }
        }

        info!("Falling back to CPU for inference");
        DeviceProfile::cpu()
    }

    pub fn detect_with_preference(preference: Option<&str>) -> DeviceProfile {
        match preference.unwrap_or("") {
            "cuda" => Self::try_cuda().unwrap_or_else(Self::detect),
            "metal" | "mps" => Self::try_metal().unwrap_or_else(Self::detect),
            "cpu" => {
                info!("Using CPU for inference (requested)");
                DeviceProfile::cpu()
            }
            _ => Self::detect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_preference_returns_cpu() {
        let profile = DeviceSelector::detect_with_preference(Some("cpu"));
        assert_eq!(profile.kind, DeviceKind::Cpu);
        assert!(profile.device.is_cpu());
        assert_eq!(profile.compute_target(), ComputeTarget::Cpu);
    }

    #[test]
    fn detected_kind_matches_device() {
        let profile = DeviceSelector::detect();
        match profile.kind {
            DeviceKind::Cpu => assert!(profile.device.is_cpu()),
            DeviceKind::Metal => assert!(profile.device.is_metal()),
            DeviceKind::Cuda => assert!(profile.device.is_cuda()),
        }
    }

    #[test]
    fn accelerators_map_to_accelerator_target() {
        assert_eq!(ComputeTarget::from(DeviceKind::Cuda), ComputeTarget::Accelerator);
        assert_eq!(ComputeTarget::from(DeviceKind::Metal), ComputeTarget::Accelerator);
    }

    #[test]
    fn cuda_prefers_bf16_unless_f32_requested() {
        let cuda = DeviceProfile {
            device: Device::Cpu,
            kind: DeviceKind::Cuda,
            supports_bf16: true,
        };
        assert_eq!(cuda.select_dtype(None), DType::BF16);
        assert_eq!(cuda.select_dtype(Some("f32")), DType::F32);
    }

    #[test]
    fn cpu_always_f32() {
        let cpu = DeviceProfile::cpu();
        assert_eq!(cpu.select_dtype(None), DType::F32);
        assert_eq!(cpu.select_dtype(Some("bf16")), DType::F32);
        assert_eq!(cpu.select_dtype(Some("f16")), DType::F32);
    }
}
