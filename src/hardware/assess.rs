//! Per-model requirement assessment
//!
//! Combines the hardware profile with the quantization advisor's footprint
//! estimate to decide whether a model fits the active accelerator's memory,
//! and which backend (plus fallbacks) should run it. Requirements are cheap
//! to compute and models change between calls, so nothing here is cached.

use super::backend::Backend;
use super::profile::HardwareProfile;
use super::quant;
use crate::config::RigConfig;
use crate::error::HardwareError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hardware requirements and backend verdict for one model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequirement {
    pub model_path: PathBuf,
    /// Estimated accelerator memory the model needs at runtime, in MB
    pub estimated_vram_mb: u64,
    /// Quantization label detected from the filename, if any
    pub quantization: Option<String>,
    /// Whether the model fits the active backend's memory. Always true when
    /// the active backend reports zero VRAM (no meaningful capacity check).
    pub fits_vram: bool,
    pub recommended_backend: Backend,
    /// Alternatives in detection order; `[cpu]` when the model fits nowhere
    pub fallback_backends: Vec<Backend>,
}

/// Assesses hardware requirements for a model file.
///
/// # Errors
///
/// Returns [`HardwareError::ModelNotFound`] when the path does not exist;
/// this is the only caller-visible failure in the engine.
pub fn assess(
    profile: &HardwareProfile,
    cfg: &RigConfig,
    model_path: &Path,
) -> Result<ModelRequirement, HardwareError> {
    if !model_path.exists() {
        return Err(HardwareError::ModelNotFound {
            path: model_path.to_path_buf(),
        });
    }
    Ok(assess_unchecked(profile, cfg, model_path))
}

/// Assessment without the existence check. Missing files degrade to the
/// advisor's default estimate; used by settings synthesis, which must never
/// fail a request.
pub(crate) fn assess_unchecked(
    profile: &HardwareProfile,
    cfg: &RigConfig,
    model_path: &Path,
) -> ModelRequirement {
    let estimated_vram_mb = quant::estimate_required_memory_mb(cfg, model_path, None);
    let quantization = model_path
        .file_name()
        .and_then(|name| quant::extract_quant_label(&name.to_string_lossy()))
        .map(str::to_string);

    // Zero reported VRAM means no capacity check is meaningful
    let fits_vram = if profile.vram_mb > 0 {
        estimated_vram_mb <= profile.vram_mb
    } else {
        true
    };

    let (recommended_backend, fallback_backends) = if fits_vram {
        let fallbacks: Vec<Backend> = profile
            .available_backends
            .iter()
            .copied()
            .filter(|b| *b != profile.backend)
            .collect();
        (profile.backend, fallbacks)
    } else {
        (Backend::Cpu, vec![Backend::Cpu])
    };

    debug!(
        "Assessed {}: {} MB estimated, quant {:?}, fits={}, recommended={}",
        model_path.display(),
        estimated_vram_mb,
        quantization,
        fits_vram,
        recommended_backend
    );

    ModelRequirement {
        model_path: model_path.to_path_buf(),
        estimated_vram_mb,
        quantization,
        fits_vram,
        recommended_backend,
        fallback_backends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::profile::test_support::{cpu_profile, cuda_profile};
    use std::io::Write;

    fn write_model(dir: &tempfile::TempDir, name: &str, size_mb: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; size_mb * 1024 * 1024]).unwrap();
        path
    }

    #[test]
    fn test_missing_model_is_typed_error() {
        let profile = cpu_profile();
        let cfg = RigConfig::default();
        let err = assess(&profile, &cfg, Path::new("/nonexistent/model.gguf")).unwrap_err();
        assert!(matches!(err, HardwareError::ModelNotFound { .. }));
    }

    #[test]
    fn test_cpu_profile_always_fits() {
        let profile = cpu_profile();
        let cfg = RigConfig::default();
        let dir = tempfile::tempdir().unwrap();
        // Large enough that any accelerator check would fail
        let path = write_model(&dir, "big-Q8_0.gguf", 64);

        let req = assess(&profile, &cfg, &path).unwrap();
        assert!(req.fits_vram);
        assert_eq!(req.recommended_backend, Backend::Cpu);
        assert!(req.fallback_backends.is_empty());
    }

    #[test]
    fn test_model_that_fits_keeps_active_backend() {
        let profile = cuda_profile(24576);
        let cfg = RigConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, "small-Q4_K_M.gguf", 8);

        let req = assess(&profile, &cfg, &path).unwrap();
        assert!(req.fits_vram);
        assert_eq!(req.quantization.as_deref(), Some("Q4_K_M"));
        assert_eq!(req.recommended_backend, Backend::Cuda);
        // Everything else available, active backend excluded
        assert_eq!(req.fallback_backends, vec![Backend::Cpu]);
    }

    #[test]
    fn test_model_that_does_not_fit_forces_cpu() {
        // 4 GB card; a 64 MB Q8 file estimates 128 MB, so shrink the card
        let profile = cuda_profile(64);
        let cfg = RigConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, "big-Q8_0.gguf", 64);

        let req = assess(&profile, &cfg, &path).unwrap();
        assert_eq!(req.estimated_vram_mb, 128);
        assert!(!req.fits_vram);
        assert_eq!(req.recommended_backend, Backend::Cpu);
        assert_eq!(req.fallback_backends, vec![Backend::Cpu]);
    }

    #[test]
    fn test_unchecked_missing_file_uses_default_estimate() {
        let profile = cuda_profile(24576);
        let cfg = RigConfig::default();
        let req = assess_unchecked(&profile, &cfg, Path::new("/nonexistent/model.gguf"));
        assert_eq!(req.estimated_vram_mb, cfg.default_vram_estimate_mb);
        assert!(req.fits_vram);
    }
}
