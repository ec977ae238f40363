//! modelrig - hardware arbitration and execution settings for local LLM
//! inference
//!
//! This library probes the machine for compute backends, estimates whether a
//! GGUF model fits the available accelerator memory, and synthesizes
//! llama.cpp-style execution parameters tuned to what the hardware can
//! actually sustain.
//!
//! # Core Concepts
//!
//! - **Backend arbitration**: accelerators are probed in a fixed priority
//!   order (CUDA, ROCm, Metal, SYCL, Vulkan) and the first working one wins;
//!   a machine with none arbitrates to CPU, never to an error
//! - **Requirement assessment**: per-model memory estimates derived from
//!   file size and the quantization encoded in the filename
//! - **Settings synthesis**: thread counts, GPU layer offload, batch sizes
//!   and the context window, derived fresh per request
//!
//! # Example Usage
//!
//! ```no_run
//! use modelrig::config::RigConfig;
//! use modelrig::hardware::SystemArbiter;
//! use std::path::Path;
//!
//! let arbiter = SystemArbiter::new(RigConfig::default());
//!
//! let profile = arbiter.hardware_profile();
//! println!("Active backend: {}", profile.backend);
//!
//! let settings = arbiter.synthesize_settings(Some(Path::new("model-Q4_K_M.gguf")));
//! println!("GPU layers: {}, context: {}", settings.n_gpu_layers, settings.n_ctx);
//! ```
//!
//! # Project Structure
//!
//! - [`hardware`]: probing, assessment, settings synthesis, and the arbiter
//! - [`config`]: tuning constants with environment overrides

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod hardware;
pub mod util;

// Re-export key types for convenient access
pub use config::{ConfigError, RigConfig};
pub use error::HardwareError;
pub use hardware::{
    Backend, ExecutionSettings, HardwareProfile, ModelRequirement, SystemArbiter, SystemSummary,
};
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_modelrig() {
        assert_eq!(NAME, "modelrig");
    }
}
