//! One-shot GPU capability probing.
//!
//! Probing enumerates adapters through wgpu and derives capability
//! flags from adapter features. It runs once per [`DeviceContext`]
//! construction; the result is cached because enumeration walks every
//! driver on the machine and is far too expensive for a per-tick path.
//!
//! [`DeviceContext`]: crate::DeviceContext

use crate::error::DeviceError;

/// Cached device capabilities, computed once at initialization.
#[derive(Clone, Debug)]
pub struct DeviceCaps {
    /// Whether a usable device was created at all.
    pub available: bool,
    /// Whether `SHADER_F64` is supported (double-precision kernels).
    pub f64_shaders: bool,
    /// Whether `TIMESTAMP_QUERY` is supported.
    pub timestamps: bool,
    /// Adapter name as reported by the driver, if available.
    pub adapter_name: Option<String>,
}

impl DeviceCaps {
    /// Capabilities of a disabled context: nothing available.
    pub fn none() -> Self {
        Self {
            available: false,
            f64_shaders: false,
            timestamps: false,
            adapter_name: None,
        }
    }
}

/// Pick the most capable adapter from the instance.
///
/// Preference order: discrete adapters with `SHADER_F64`, then any
/// adapter with `SHADER_F64`, then any non-CPU adapter. Software
/// rasterizers are skipped — falling back to the modules' own CPU
/// paths beats emulating a GPU on the CPU.
pub(crate) fn select_adapter(instance: &wgpu::Instance) -> Result<wgpu::Adapter, DeviceError> {
    let adapters = instance.enumerate_adapters(wgpu::Backends::all());
    if adapters.is_empty() {
        return Err(DeviceError::NoAdapter);
    }

    let mut best_f64 = None;
    let mut any_f64 = None;
    let mut any_gpu = None;
    for adapter in adapters {
        let info = adapter.get_info();
        if info.device_type == wgpu::DeviceType::Cpu {
            continue;
        }
        let has_f64 = adapter.features().contains(wgpu::Features::SHADER_F64);
        if has_f64 && info.device_type == wgpu::DeviceType::DiscreteGpu && best_f64.is_none() {
            best_f64 = Some(adapter);
        } else if has_f64 && any_f64.is_none() {
            any_f64 = Some(adapter);
        } else if any_gpu.is_none() {
            any_gpu = Some(adapter);
        }
    }

    best_f64
        .or(any_f64)
        .or(any_gpu)
        .ok_or(DeviceError::NoAdapter)
}

/// Derive capability flags from the features a device was created with.
pub(crate) fn caps_from_features(name: String, features: wgpu::Features) -> DeviceCaps {
    DeviceCaps {
        available: true,
        f64_shaders: features.contains(wgpu::Features::SHADER_F64),
        timestamps: features.contains(wgpu::Features::TIMESTAMP_QUERY),
        adapter_name: Some(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_caps_report_unavailable() {
        let caps = DeviceCaps::none();
        assert!(!caps.available);
        assert!(!caps.f64_shaders);
        assert!(!caps.timestamps);
        assert!(caps.adapter_name.is_none());
    }

    #[test]
    fn caps_from_features_maps_flags() {
        let caps = caps_from_features(
            "test adapter".to_string(),
            wgpu::Features::SHADER_F64 | wgpu::Features::TIMESTAMP_QUERY,
        );
        assert!(caps.available);
        assert!(caps.f64_shaders);
        assert!(caps.timestamps);
        assert_eq!(caps.adapter_name.as_deref(), Some("test adapter"));

        let bare = caps_from_features("bare".to_string(), wgpu::Features::empty());
        assert!(bare.available);
        assert!(!bare.f64_shaders);
        assert!(!bare.timestamps);
    }
}
