//! Acceleration backend enumeration
//!
//! A `Backend` is one execution path a model can run on. Keeping it a closed
//! enum makes unsupported-backend handling an exhaustive match instead of a
//! stringly-typed lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported acceleration backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Cpu,
    Cuda,
    Rocm,
    Metal,
    Sycl,
    Vulkan,
}

impl Backend {
    /// Probe priority order: CUDA/ROCm > Metal > SYCL > Vulkan. CPU is the
    /// unconditional fallback and is not probed.
    pub const PROBE_ORDER: &'static [Backend] = &[
        Backend::Cuda,
        Backend::Rocm,
        Backend::Metal,
        Backend::Sycl,
        Backend::Vulkan,
    ];

    /// Returns true for any non-CPU backend
    pub fn is_accelerator(&self) -> bool {
        !matches!(self, Backend::Cpu)
    }

    /// Lowercase wire name, as used in logs, JSON, and ledger keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Cuda => "cuda",
            Backend::Rocm => "rocm",
            Backend::Metal => "metal",
            Backend::Sycl => "sycl",
            Backend::Vulkan => "vulkan",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized backend name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown backend '{}'. Valid options: cpu, cuda, rocm, metal, sycl, vulkan",
            self.0
        )
    }
}

impl std::error::Error for UnknownBackend {}

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "cuda" => Ok(Backend::Cuda),
            "rocm" => Ok(Backend::Rocm),
            "metal" => Ok(Backend::Metal),
            "sycl" => Ok(Backend::Sycl),
            "vulkan" => Ok(Backend::Vulkan),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrip() {
        for backend in [
            Backend::Cpu,
            Backend::Cuda,
            Backend::Rocm,
            Backend::Metal,
            Backend::Sycl,
            Backend::Vulkan,
        ] {
            let parsed: Backend = backend.to_string().parse().unwrap();
            assert_eq!(parsed, backend);
        }
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("CUDA".parse::<Backend>().unwrap(), Backend::Cuda);
        assert_eq!("Metal".parse::<Backend>().unwrap(), Backend::Metal);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "tpu".parse::<Backend>().unwrap_err();
        assert_eq!(err.0, "tpu");
    }

    #[test]
    fn test_is_accelerator() {
        assert!(!Backend::Cpu.is_accelerator());
        assert!(Backend::Cuda.is_accelerator());
        assert!(Backend::Vulkan.is_accelerator());
    }

    #[test]
    fn test_probe_order_excludes_cpu() {
        assert!(!Backend::PROBE_ORDER.contains(&Backend::Cpu));
        assert_eq!(Backend::PROBE_ORDER[0], Backend::Cuda);
        assert_eq!(Backend::PROBE_ORDER[1], Backend::Rocm);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Backend::Rocm).unwrap();
        assert_eq!(json, "\"rocm\"");
        let back: Backend = serde_json::from_str("\"vulkan\"").unwrap();
        assert_eq!(back, Backend::Vulkan);
    }
}
