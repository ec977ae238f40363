//! Quantization advisor
//!
//! Static tables mapping quantization formats to memory behavior, plus the
//! estimation helpers the assessor and synthesizer build on: label extraction
//! from filenames, per-backend preference orderings, file-size-driven memory
//! estimates, and parameter-count fit checks.

use super::backend::Backend;
use crate::config::RigConfig;
use std::path::Path;
use tracing::{debug, warn};

const MB: u64 = 1024 * 1024;

/// Known quantization tokens in match-precedence order. More specific tokens
/// come before shorter ones that could otherwise shadow them (`Q4_K_M` must
/// win over `Q4_0`-style prefixes).
pub const KNOWN_QUANTS: &[&str] = &[
    "Q8_K_M", "Q5_K_M", "Q5_K_S", "Q4_K_M", "Q4_K_S", "Q3_K_M", "Q3_K_S", "Q2_K", "Q6_K", "Q8_0",
    "Q5_0", "Q4_0", "FP16", "BF16",
];

/// Accelerator preference: highest quality first
const ACCEL_QUANT_ORDER: &[&str] = &["Q8_K_M", "Q6_K", "Q5_K_M", "Q4_K_M", "Q4_K_S", "Q4_0"];

/// CPU preference: lightest first, so slow machines stay responsive
const CPU_QUANT_ORDER: &[&str] = &["Q4_K_S", "Q4_0", "Q4_K_M", "Q5_K_S", "Q5_K_M", "Q6_K"];

/// Scans a filename for a known quantization token.
///
/// Matching is case-insensitive; the returned label is the canonical
/// uppercase form. Returns `None` when no known token appears.
pub fn extract_quant_label(filename: &str) -> Option<&'static str> {
    let upper = filename.to_uppercase();
    KNOWN_QUANTS
        .iter()
        .find(|quant| upper.contains(*quant))
        .copied()
}

/// Quantization preference order for a backend
pub fn recommended_quant_order(backend: Backend) -> &'static [&'static str] {
    match backend {
        Backend::Cuda | Backend::Rocm | Backend::Metal | Backend::Sycl | Backend::Vulkan => {
            ACCEL_QUANT_ORDER
        }
        Backend::Cpu => CPU_QUANT_ORDER,
    }
}

/// String-keyed variant of [`recommended_quant_order`]; unrecognized backend
/// names fall back to the CPU ordering.
pub fn recommended_quants_for_backend(name: &str) -> &'static [&'static str] {
    name.parse::<Backend>()
        .map(recommended_quant_order)
        .unwrap_or(CPU_QUANT_ORDER)
}

/// Relative on-disk/in-memory size factor of a quantization versus the Q8
/// reference. Unknown formats assume no compression benefit.
pub fn quant_size_factor(label: &str) -> f64 {
    let upper = label.to_uppercase();
    if upper.starts_with("FP16") || upper.starts_with("BF16") {
        2.0
    } else if upper.starts_with("Q8") {
        1.0
    } else if upper.starts_with("Q6") {
        0.75
    } else if upper.starts_with("Q5") {
        0.625
    } else if upper.starts_with("Q4") {
        0.5
    } else if upper.starts_with("Q3") {
        0.4
    } else if upper.starts_with("Q2") {
        0.3
    } else {
        1.0
    }
}

/// Approximate runtime memory cost in MB per billion parameters, weights
/// plus KV/activation overhead included
fn mb_per_billion_params(label: &str) -> f64 {
    match label.to_uppercase().as_str() {
        "FP16" | "BF16" => 16000.0,
        "Q8_K_M" | "Q8_0" => 8500.0,
        "Q6_K" => 6500.0,
        "Q5_K_M" => 5500.0,
        "Q5_K_S" | "Q5_0" => 5200.0,
        "Q4_K_M" => 4500.0,
        "Q4_K_S" => 4200.0,
        "Q4_0" => 4000.0,
        "Q3_K_M" => 3500.0,
        "Q3_K_S" => 3300.0,
        "Q2_K" => 2800.0,
        _ => 4500.0,
    }
}

/// Estimates the accelerator memory (MB) a model will need at runtime.
///
/// Reads the file's byte size; a missing or unreadable file yields the
/// configured default estimate rather than an error, since estimation must
/// never block a request. The estimate is file size scaled by the
/// quantization's size factor and the inference-overhead multiplier, capped
/// at the configured maximum.
pub fn estimate_required_memory_mb(cfg: &RigConfig, path: &Path, quant: Option<&str>) -> u64 {
    let file_mb = match std::fs::metadata(path) {
        Ok(meta) => meta.len() / MB,
        Err(e) => {
            warn!(
                "Cannot stat model file {}: {}. Using default estimate of {} MB",
                path.display(),
                e,
                cfg.default_vram_estimate_mb
            );
            return cfg.default_vram_estimate_mb;
        }
    };

    let label = quant.map(str::to_string).or_else(|| {
        path.file_name()
            .and_then(|name| extract_quant_label(&name.to_string_lossy()))
            .map(str::to_string)
    });
    let factor = label.as_deref().map(quant_size_factor).unwrap_or(1.0);

    let estimate = (file_mb as f64 * factor * cfg.vram_overhead_factor).round() as u64;
    let capped = estimate.min(cfg.max_vram_estimate_mb);

    debug!(
        "Memory estimate for {}: {} MB file, quant {:?}, factor {} -> {} MB",
        path.display(),
        file_mb,
        label,
        factor,
        capped
    );

    capped
}

/// Whether a model of `param_count` parameters at the given quantization fits
/// in `available_mb`. With an unknown parameter count nothing can be
/// concluded, so the check passes rather than blocking the caller.
pub fn quant_fits_memory(
    cfg: &RigConfig,
    label: &str,
    available_mb: u64,
    param_count: Option<u64>,
) -> bool {
    let Some(params) = param_count else {
        return true;
    };

    let billions = params as f64 / 1_000_000_000.0;
    let required_mb = mb_per_billion_params(label) * billions * cfg.quant_safety_margin;

    required_mb <= available_mb as f64
}

/// Whether a backend can run the given quantization.
///
/// CPU fails open (every label is accepted); accelerators fail closed
/// against the static supported set, so an unrecognized label is rejected.
pub fn is_quant_supported(label: &str, backend: Backend) -> bool {
    if backend == Backend::Cpu {
        return true;
    }
    let upper = label.to_uppercase();
    KNOWN_QUANTS.contains(&upper.as_str())
}

/// Picks the best quantization for a backend within a memory budget.
///
/// Without a parameter count the model's own quantization is returned
/// unchanged. Otherwise the backend's preference order is walked and the
/// first entry that both fits and is supported wins; if nothing qualifies,
/// the most conservative entry of the order is returned.
pub fn pick_best_quant(
    cfg: &RigConfig,
    model_quant: &str,
    backend: Backend,
    available_mb: u64,
    param_count: Option<u64>,
) -> String {
    if param_count.is_none() {
        return model_quant.to_string();
    }

    let order = recommended_quant_order(backend);
    for quant in order {
        if quant_fits_memory(cfg, quant, available_mb, param_count)
            && is_quant_supported(quant, backend)
        {
            debug!(
                "Best quant for {} with {} MB: {} (model shipped {})",
                backend, available_mb, quant, model_quant
            );
            return quant.to_string();
        }
    }

    let fallback = order.last().copied().unwrap_or(model_quant);
    debug!(
        "No quant in the {} table fits {} MB; falling back to {}",
        backend, available_mb, fallback
    );
    fallback.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        q4_k_m = { "model-Q4_K_M.gguf", Some("Q4_K_M") },
        q5_k_s = { "llama-Q5_K_S.gguf", Some("Q5_K_S") },
        q8_0 = { "model-Q8_0.gguf", Some("Q8_0") },
        q6_k = { "mistral-Q6_K.gguf", Some("Q6_K") },
        fp16 = { "model-FP16.gguf", Some("FP16") },
        bf16 = { "model-BF16.gguf", Some("BF16") },
        full_path = { "/models/llama-Q4_K_M.gguf", Some("Q4_K_M") },
        lowercase = { "model-q4_k_m.gguf", Some("Q4_K_M") },
        complex = { "Llama-2-7b-chat-Q4_K_M-v2.gguf", Some("Q4_K_M") },
        none = { "model.gguf", None },
    )]
    fn test_extract_quant_label(filename: &str, expected: Option<&str>) {
        assert_eq!(extract_quant_label(filename), expected);
    }

    #[test]
    fn test_cuda_recommendations_quality_first() {
        let quants = recommended_quant_order(Backend::Cuda);
        assert_eq!(quants[0], "Q8_K_M");
        assert!(quants.contains(&"Q4_K_M"));
        assert!(quants.contains(&"Q4_0"));
    }

    #[test]
    fn test_metal_matches_cuda_hierarchy() {
        assert_eq!(
            recommended_quant_order(Backend::Metal)[0],
            recommended_quant_order(Backend::Cuda)[0]
        );
        assert!(recommended_quant_order(Backend::Rocm).contains(&"Q8_K_M"));
    }

    #[test]
    fn test_cpu_recommendations_lightest_first() {
        let quants = recommended_quant_order(Backend::Cpu);
        assert_eq!(quants[0], "Q4_K_S");
        assert!(quants.contains(&"Q4_0"));
    }

    #[test]
    fn test_unknown_backend_name_defaults_to_cpu() {
        assert_eq!(
            recommended_quants_for_backend("unknown-backend"),
            recommended_quant_order(Backend::Cpu)
        );
        assert_eq!(
            recommended_quants_for_backend("cuda"),
            recommended_quant_order(Backend::Cuda)
        );
    }

    #[parameterized(
        fp16 = { "FP16", 2.0 },
        q4_k_m = { "Q4_K_M", 0.5 },
        q8_k_m = { "Q8_K_M", 1.0 },
        unknown = { "UNKNOWN", 1.0 },
    )]
    fn test_quant_size_factor(label: &str, expected: f64) {
        assert!((quant_size_factor(label) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_quant_fits_memory_q8_7b_does_not_fit_8gb() {
        // 7B params at Q8_K_M: 8500 MB/B * 7 * 1.2 = 71400 MB
        let cfg = RigConfig::default();
        assert!(!quant_fits_memory(
            &cfg,
            "Q8_K_M",
            8000,
            Some(7_000_000_000)
        ));
    }

    #[test]
    fn test_quant_fits_memory_q4_7b_fits_40gb() {
        // 7B params at Q4_K_M: 4500 MB/B * 7 * 1.2 = 37800 MB
        let cfg = RigConfig::default();
        assert!(quant_fits_memory(
            &cfg,
            "Q4_K_M",
            40000,
            Some(7_000_000_000)
        ));
    }

    #[test]
    fn test_quant_fits_memory_unknown_params_assumes_fit() {
        let cfg = RigConfig::default();
        assert!(quant_fits_memory(&cfg, "Q8_K_M", 1, None));
    }

    #[test]
    fn test_is_quant_supported_cpu_fails_open() {
        assert!(is_quant_supported("Q4_K_M", Backend::Cpu));
        assert!(is_quant_supported("Q8_K_M", Backend::Cpu));
        assert!(is_quant_supported("UNKNOWN", Backend::Cpu));
    }

    #[test]
    fn test_is_quant_supported_cuda_fails_closed() {
        assert!(is_quant_supported("Q4_K_M", Backend::Cuda));
        assert!(is_quant_supported("Q8_K_M", Backend::Cuda));
        assert!(!is_quant_supported("UNKNOWN", Backend::Cuda));
    }

    #[test]
    fn test_pick_best_quant_no_params_returns_input() {
        let cfg = RigConfig::default();
        let picked = pick_best_quant(&cfg, "Q4_K_M", Backend::Cuda, 8000, None);
        assert_eq!(picked, "Q4_K_M");
    }

    #[test]
    fn test_pick_best_quant_limited_vram_picks_light() {
        let cfg = RigConfig::default();
        let picked = pick_best_quant(&cfg, "Q8_K_M", Backend::Cuda, 4000, Some(7_000_000_000));
        // Nothing fits 4 GB for a 7B model; falls back to the most
        // conservative entry of the accelerator table
        assert!(picked == "Q4_K_S" || picked == "Q4_0");
    }

    #[test]
    fn test_pick_best_quant_large_vram_picks_quality() {
        let cfg = RigConfig::default();
        // 80 GB fits even Q8_K_M for 7B (71400 MB)
        let picked = pick_best_quant(&cfg, "Q4_K_M", Backend::Cuda, 80000, Some(7_000_000_000));
        assert_eq!(picked, "Q8_K_M");
    }

    #[test]
    fn test_estimate_missing_file_returns_default() {
        let cfg = RigConfig::default();
        let estimate =
            estimate_required_memory_mb(&cfg, Path::new("/nonexistent/model.gguf"), None);
        assert_eq!(estimate, 4096);
    }

    #[test]
    fn test_estimate_existing_file_positive_and_capped() {
        use std::io::Write;
        let cfg = RigConfig::default();
        let mut file = tempfile::Builder::new()
            .suffix(".gguf")
            .tempfile()
            .unwrap();
        file.write_all(&vec![0u8; 4 * 1024 * 1024]).unwrap();
        file.flush().unwrap();

        let estimate = estimate_required_memory_mb(&cfg, file.path(), Some("Q8_K_M"));
        // 4 MB file, factor 1.0, overhead 2.0
        assert_eq!(estimate, 8);
        assert!(estimate <= cfg.max_vram_estimate_mb);

        let q4 = estimate_required_memory_mb(&cfg, file.path(), Some("Q4_K_M"));
        assert_eq!(q4, 4);
    }

    #[test]
    fn test_estimate_infers_quant_from_filename() {
        use std::io::Write;
        let cfg = RigConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny-Q4_K_M.gguf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&vec![0u8; 2 * 1024 * 1024])
            .unwrap();

        // 2 MB file, inferred factor 0.5, overhead 2.0
        assert_eq!(estimate_required_memory_mb(&cfg, &path, None), 2);
    }
}
