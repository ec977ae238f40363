//! Hardware profile record
//!
//! A `HardwareProfile` is an immutable snapshot of the prober's output:
//! which backend is active, what else is available, and the always-present
//! system facts. It is built once per [`SystemArbiter`](crate::SystemArbiter)
//! and shared by reference afterwards.

use super::backend::Backend;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of detected hardware, immutable after construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Active backend, chosen by fixed priority order
    pub backend: Backend,
    /// Human-readable device name (e.g. "NVIDIA GeForce RTX 4090")
    pub device_name: String,
    /// Accelerator memory of the active backend in MB (0 for CPU)
    pub vram_mb: u64,
    /// Total system RAM in MB
    pub system_ram_mb: u64,
    /// Logical CPU count
    pub cpu_cores: usize,
    /// Physical CPU core count, when the OS exposes it
    pub physical_cores: Option<usize>,
    /// OS platform string (e.g. "linux", "macos")
    pub platform: String,
    /// CPU architecture string (e.g. "x86_64", "aarch64")
    pub architecture: String,
    /// Every backend that probed successfully, in detection order.
    /// Always contains [`Backend::Cpu`].
    pub available_backends: Vec<Backend>,
    pub driver_version: Option<String>,
    pub cuda_version: Option<String>,
    pub rocm_version: Option<String>,
    pub sycl_version: Option<String>,
    pub vulkan_version: Option<String>,
    pub metal_support: bool,
    pub sycl_support: bool,
    pub vulkan_support: bool,
}

impl HardwareProfile {
    /// Returns the available accelerator memory in GB
    pub fn vram_gb(&self) -> f64 {
        self.vram_mb as f64 / 1024.0
    }

    /// Returns total system RAM in GB
    pub fn system_ram_gb(&self) -> f64 {
        self.system_ram_mb as f64 / 1024.0
    }

    /// Whether any accelerator backend is active
    pub fn has_accelerator(&self) -> bool {
        self.backend.is_accelerator()
    }
}

impl fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({} MB VRAM, {} MB RAM, {} cores, {}/{})",
            self.backend,
            self.device_name,
            self.vram_mb,
            self.system_ram_mb,
            self.cpu_cores,
            self.platform,
            self.architecture
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{cpu_profile, cuda_profile};
    use super::*;

    #[test]
    fn test_gb_conversions() {
        let profile = cuda_profile(8192);
        assert!((profile.vram_gb() - 8.0).abs() < f64::EPSILON);
        assert!((profile.system_ram_gb() - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_has_accelerator() {
        assert!(!cpu_profile().has_accelerator());
        assert!(cuda_profile(4096).has_accelerator());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let profile = cuda_profile(24576);
        let json = serde_json::to_string(&profile).unwrap();
        let back: HardwareProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.backend, Backend::Cuda);
        assert_eq!(back.vram_mb, 24576);
        assert_eq!(back.available_backends, profile.available_backends);
    }

    #[test]
    fn test_display_contains_backend() {
        let rendered = cpu_profile().to_string();
        assert!(rendered.contains("cpu"));
        assert!(rendered.contains("x86_64"));
    }
}
