//! Execution settings synthesis
//!
//! Derives concrete llama.cpp-style execution parameters from the hardware
//! profile and, when a model is known, its requirement assessment. Settings
//! are synthesized fresh per request and never persisted.
//!
//! The context window field is filled with a per-backend default here; when
//! a model path is available the arbiter overwrites it with the resolver's
//! cached value.

use super::assess::ModelRequirement;
use super::backend::Backend;
use super::profile::HardwareProfile;
use crate::config::RigConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Offload-all-layers sentinel
pub const OFFLOAD_ALL: i32 = -1;

/// Concrete execution parameters for an inference engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Layers offloaded to the accelerator; -1 offloads everything
    pub n_gpu_layers: i32,
    /// Active GPU device index
    pub main_gpu: u32,
    pub use_mmap: bool,
    pub use_mlock: bool,
    /// Threads for single-stream decoding
    pub n_threads: u32,
    /// Threads for batched decoding
    pub n_threads_batch: u32,
    /// Attention fast-path; only worthwhile on accelerators
    pub flash_attn: bool,
    pub n_batch: u32,
    pub n_ubatch: u32,
    /// Context window in tokens
    pub n_ctx: u32,
}

/// Synthesizes execution settings for the current hardware.
///
/// `requirement` carries the assessment for a specific model when one is
/// being configured; `None` yields generic settings for the machine.
pub fn synthesize(
    profile: &HardwareProfile,
    cfg: &RigConfig,
    requirement: Option<&ModelRequirement>,
) -> ExecutionSettings {
    let n_threads = thread_count(profile);
    let n_gpu_layers = offload_layers(profile, cfg, requirement);
    let flash_attn = profile.backend.is_accelerator();
    let use_mlock = profile.system_ram_mb > cfg.mlock_threshold_mb;

    let (n_batch, n_ubatch) = match profile.backend {
        // Metal benefits from smaller batches
        Backend::Metal => (512, 512),
        // CUDA/ROCm can handle high-throughput batching
        Backend::Cuda | Backend::Rocm => (2048, 2048),
        _ => (512, 512),
    };

    let n_ctx = match profile.backend {
        Backend::Cuda | Backend::Rocm => 8192,
        _ => 4096,
    };

    let settings = ExecutionSettings {
        n_gpu_layers,
        main_gpu: 0,
        use_mmap: true,
        use_mlock,
        n_threads,
        n_threads_batch: n_threads,
        flash_attn,
        n_batch,
        n_ubatch,
        n_ctx,
    };

    debug!(
        "Synthesized settings for {}: {} gpu layers, {} threads, batch {}",
        profile.backend, settings.n_gpu_layers, settings.n_threads, settings.n_batch
    );

    settings
}

/// Thread count: physical cores minus an OS reserve, floored at one thread.
/// When the physical count is unknown the logical count is used unmodified.
fn thread_count(profile: &HardwareProfile) -> u32 {
    match profile.physical_cores {
        Some(physical) => {
            let reserve = if physical > 4 { 2 } else { 1 };
            physical.saturating_sub(reserve).max(1) as u32
        }
        None => profile.cpu_cores.max(1) as u32,
    }
}

/// Offload ladder: full offload when the model fits (or nearly fits),
/// partial at the configured depth when at least half fits, CPU otherwise.
fn offload_layers(
    profile: &HardwareProfile,
    cfg: &RigConfig,
    requirement: Option<&ModelRequirement>,
) -> i32 {
    if !profile.backend.is_accelerator() {
        return 0;
    }

    match requirement {
        Some(req) => {
            if req.fits_vram {
                return OFFLOAD_ALL;
            }
            // estimated_vram_mb exceeds vram_mb here, so it is non-zero
            let ratio = profile.vram_mb as f64 / req.estimated_vram_mb as f64;
            if ratio >= cfg.full_offload_ratio {
                OFFLOAD_ALL
            } else if ratio >= cfg.partial_offload_ratio {
                cfg.partial_offload_layers as i32
            } else {
                0
            }
        }
        None => {
            if profile.vram_mb > cfg.generic_offload_threshold_mb {
                OFFLOAD_ALL
            } else {
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::profile::test_support::{cpu_profile, cuda_profile};
    use std::path::PathBuf;

    fn requirement(estimated_vram_mb: u64, fits_vram: bool) -> ModelRequirement {
        ModelRequirement {
            model_path: PathBuf::from("/models/test.gguf"),
            estimated_vram_mb,
            quantization: Some("Q4_K_M".to_string()),
            fits_vram,
            recommended_backend: if fits_vram { Backend::Cuda } else { Backend::Cpu },
            fallback_backends: vec![Backend::Cpu],
        }
    }

    #[test]
    fn test_cpu_profile_low_ram_settings() {
        let profile = HardwareProfile {
            system_ram_mb: 8000,
            ..cpu_profile()
        };
        let settings = synthesize(&profile, &RigConfig::default(), None);

        assert_eq!(settings.n_gpu_layers, 0);
        assert!(!settings.use_mlock);
        assert!(!settings.flash_attn);
        assert!(settings.use_mmap);
        assert_eq!(settings.n_batch, 512);
        assert_eq!(settings.n_ubatch, 512);
        assert_eq!(settings.n_ctx, 4096);
    }

    #[test]
    fn test_cuda_generic_settings() {
        let profile = HardwareProfile {
            system_ram_mb: 32768,
            ..cuda_profile(24576)
        };
        let settings = synthesize(&profile, &RigConfig::default(), None);

        assert_eq!(settings.n_gpu_layers, OFFLOAD_ALL);
        assert!(settings.use_mlock);
        assert!(settings.flash_attn);
        assert_eq!(settings.n_batch, 2048);
        assert_eq!(settings.n_ubatch, 2048);
        assert_eq!(settings.n_ctx, 8192);
    }

    #[test]
    fn test_cuda_small_card_generic_stays_on_cpu() {
        let profile = cuda_profile(2048);
        let settings = synthesize(&profile, &RigConfig::default(), None);
        assert_eq!(settings.n_gpu_layers, 0);
    }

    #[test]
    fn test_offload_ladder() {
        let cfg = RigConfig::default();
        let profile = cuda_profile(4000);

        // Fits: everything offloaded
        let s = synthesize(&profile, &cfg, Some(&requirement(3000, true)));
        assert_eq!(s.n_gpu_layers, OFFLOAD_ALL);

        // 4000/4500 = 0.89: close enough for full offload
        let s = synthesize(&profile, &cfg, Some(&requirement(4500, false)));
        assert_eq!(s.n_gpu_layers, OFFLOAD_ALL);

        // 4000/6000 = 0.67: partial offload
        let s = synthesize(&profile, &cfg, Some(&requirement(6000, false)));
        assert_eq!(s.n_gpu_layers, 32);

        // 4000/28672 = 0.14: forced CPU fallback
        let s = synthesize(&profile, &cfg, Some(&requirement(28672, false)));
        assert_eq!(s.n_gpu_layers, 0);
    }

    #[test]
    fn test_thread_reserve_rule() {
        // 8 physical cores: reserve 2
        let profile = cpu_profile();
        let s = synthesize(&profile, &RigConfig::default(), None);
        assert_eq!(s.n_threads, 6);
        assert_eq!(s.n_threads_batch, 6);

        // 4 physical cores: reserve 1
        let profile = HardwareProfile {
            physical_cores: Some(4),
            ..cpu_profile()
        };
        let s = synthesize(&profile, &RigConfig::default(), None);
        assert_eq!(s.n_threads, 3);

        // 1 physical core: floor at 1
        let profile = HardwareProfile {
            physical_cores: Some(1),
            ..cpu_profile()
        };
        let s = synthesize(&profile, &RigConfig::default(), None);
        assert_eq!(s.n_threads, 1);

        // Unknown physical count: logical cores unmodified
        let profile = HardwareProfile {
            physical_cores: None,
            cpu_cores: 12,
            ..cpu_profile()
        };
        let s = synthesize(&profile, &RigConfig::default(), None);
        assert_eq!(s.n_threads, 12);
    }

    #[test]
    fn test_metal_batch_sizes() {
        let profile = HardwareProfile {
            backend: Backend::Metal,
            vram_mb: 24576,
            metal_support: true,
            available_backends: vec![Backend::Cpu, Backend::Metal],
            ..cpu_profile()
        };
        let s = synthesize(&profile, &RigConfig::default(), None);
        assert_eq!(s.n_batch, 512);
        assert_eq!(s.n_ubatch, 512);
        assert_eq!(s.n_ctx, 4096);
        assert!(s.flash_attn);
    }

    #[test]
    fn test_settings_serialize() {
        let s = synthesize(&cpu_profile(), &RigConfig::default(), None);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["n_gpu_layers"], 0);
        assert_eq!(json["use_mmap"], true);
    }
}
