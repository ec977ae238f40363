//! Configuration management for modelrig
//!
//! Every numeric tuning constant in the arbitration engine lives here rather
//! than as a scattered literal: the memory-per-token figure, safety margins,
//! offload thresholds, and the context-window floor/cap are all
//! hardware-generation-specific values that will be revisited. Each can be
//! overridden through a `MODELRIG_*` environment variable; unset or
//! unparseable values fall back to compiled defaults.
//!
//! # Environment Variables
//!
//! - `MODELRIG_DEFAULT_VRAM_ESTIMATE_MB`: estimate used when a model file is
//!   missing - default: "4096"
//! - `MODELRIG_MAX_VRAM_ESTIMATE_MB`: cap on any memory estimate - default: "32768"
//! - `MODELRIG_VRAM_OVERHEAD_FACTOR`: inference overhead multiplier on file
//!   size - default: "2.0"
//! - `MODELRIG_QUANT_SAFETY_MARGIN`: margin on parameter-count fit checks -
//!   default: "1.2"
//! - `MODELRIG_MLOCK_THRESHOLD_MB`: system RAM above which mlock is enabled -
//!   default: "16384"
//! - `MODELRIG_GENERIC_OFFLOAD_THRESHOLD_MB`: VRAM above which generic
//!   (model-less) settings offload all layers - default: "4096"
//! - `MODELRIG_PARTIAL_OFFLOAD_LAYERS`: layer count for partial offload -
//!   default: "32"
//! - `MODELRIG_GB_PER_1K_TOKENS`: RAM cost of 1k context tokens - default: "0.015"
//! - `MODELRIG_RAM_RESERVE_GB`: RAM reserved for the OS when budgeting
//!   context - default: "2.0"
//! - `MODELRIG_CONTEXT_FLOOR`: minimum resolved context window - default: "2048"
//! - `MODELRIG_STABILITY_CAP`: maximum resolved context window - default: "65536"
//! - `MODELRIG_LOG_LEVEL`: logging level - default: "info"

use std::env;
use std::fmt;
use thiserror::Error;

const DEFAULT_VRAM_ESTIMATE_MB: u64 = 4096;
const DEFAULT_MAX_VRAM_ESTIMATE_MB: u64 = 32768;
const DEFAULT_VRAM_OVERHEAD_FACTOR: f64 = 2.0;
const DEFAULT_QUANT_SAFETY_MARGIN: f64 = 1.2;
const DEFAULT_MLOCK_THRESHOLD_MB: u64 = 16384;
const DEFAULT_GENERIC_OFFLOAD_THRESHOLD_MB: u64 = 4096;
const DEFAULT_PARTIAL_OFFLOAD_LAYERS: u32 = 32;
const DEFAULT_FULL_OFFLOAD_RATIO: f64 = 0.8;
const DEFAULT_PARTIAL_OFFLOAD_RATIO: f64 = 0.5;
const DEFAULT_GB_PER_1K_TOKENS: f64 = 0.015;
const DEFAULT_RAM_RESERVE_GB: f64 = 2.0;
const DEFAULT_CONTEXT_FLOOR: u32 = 2048;
const DEFAULT_STABILITY_CAP: u32 = 65536;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Tuning constants for the arbitration engine
#[derive(Debug, Clone)]
pub struct RigConfig {
    /// Memory estimate (MB) for models whose file cannot be read
    pub default_vram_estimate_mb: u64,
    /// Upper bound (MB) on any memory estimate
    pub max_vram_estimate_mb: u64,
    /// Multiplier applied to file size when estimating runtime memory
    pub vram_overhead_factor: f64,
    /// Margin applied to parameter-count based fit checks (1.2 = +20%)
    pub quant_safety_margin: f64,
    /// System RAM (MB) above which model memory locking is enabled
    pub mlock_threshold_mb: u64,
    /// VRAM (MB) above which generic settings offload all layers
    pub generic_offload_threshold_mb: u64,
    /// Layers offloaded when a model only partially fits
    pub partial_offload_layers: u32,
    /// available/required ratio at or above which all layers are offloaded
    pub full_offload_ratio: f64,
    /// available/required ratio at or above which partial offload applies
    pub partial_offload_ratio: f64,
    /// RAM cost (GB) of 1k context tokens for a Q4-class model
    pub gb_per_1k_tokens: f64,
    /// RAM (GB) kept back for the OS when budgeting context
    pub ram_reserve_gb: f64,
    /// Minimum usable context window in tokens
    pub context_floor: u32,
    /// Hard stability cap on the context window in tokens
    pub stability_cap: u32,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for RigConfig {
    /// Loads configuration from `MODELRIG_*` environment variables, falling
    /// back to compiled defaults for anything unset or unparseable.
    fn default() -> Self {
        Self {
            default_vram_estimate_mb: env_parsed(
                "MODELRIG_DEFAULT_VRAM_ESTIMATE_MB",
                DEFAULT_VRAM_ESTIMATE_MB,
            ),
            max_vram_estimate_mb: env_parsed(
                "MODELRIG_MAX_VRAM_ESTIMATE_MB",
                DEFAULT_MAX_VRAM_ESTIMATE_MB,
            ),
            vram_overhead_factor: env_parsed(
                "MODELRIG_VRAM_OVERHEAD_FACTOR",
                DEFAULT_VRAM_OVERHEAD_FACTOR,
            ),
            quant_safety_margin: env_parsed(
                "MODELRIG_QUANT_SAFETY_MARGIN",
                DEFAULT_QUANT_SAFETY_MARGIN,
            ),
            mlock_threshold_mb: env_parsed(
                "MODELRIG_MLOCK_THRESHOLD_MB",
                DEFAULT_MLOCK_THRESHOLD_MB,
            ),
            generic_offload_threshold_mb: env_parsed(
                "MODELRIG_GENERIC_OFFLOAD_THRESHOLD_MB",
                DEFAULT_GENERIC_OFFLOAD_THRESHOLD_MB,
            ),
            partial_offload_layers: env_parsed(
                "MODELRIG_PARTIAL_OFFLOAD_LAYERS",
                DEFAULT_PARTIAL_OFFLOAD_LAYERS,
            ),
            full_offload_ratio: DEFAULT_FULL_OFFLOAD_RATIO,
            partial_offload_ratio: DEFAULT_PARTIAL_OFFLOAD_RATIO,
            gb_per_1k_tokens: env_parsed("MODELRIG_GB_PER_1K_TOKENS", DEFAULT_GB_PER_1K_TOKENS),
            ram_reserve_gb: env_parsed("MODELRIG_RAM_RESERVE_GB", DEFAULT_RAM_RESERVE_GB),
            context_floor: env_parsed("MODELRIG_CONTEXT_FLOOR", DEFAULT_CONTEXT_FLOOR),
            stability_cap: env_parsed("MODELRIG_STABILITY_CAP", DEFAULT_STABILITY_CAP),
            log_level: env::var("MODELRIG_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl RigConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any field is outside its sane range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_floor == 0 {
            return Err(ConfigError::ValidationFailed(
                "Context floor must be at least 1 token".to_string(),
            ));
        }
        if self.stability_cap < self.context_floor {
            return Err(ConfigError::ValidationFailed(format!(
                "Stability cap ({}) cannot be below the context floor ({})",
                self.stability_cap, self.context_floor
            )));
        }
        if self.vram_overhead_factor <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "VRAM overhead factor must be positive".to_string(),
            ));
        }
        if self.quant_safety_margin < 1.0 {
            return Err(ConfigError::ValidationFailed(
                "Quant safety margin below 1.0 would under-reserve memory".to_string(),
            ));
        }
        if self.gb_per_1k_tokens <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "GB-per-1k-tokens must be positive".to_string(),
            ));
        }
        if self.ram_reserve_gb < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "RAM reserve cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.partial_offload_ratio)
            || !(0.0..=1.0).contains(&self.full_offload_ratio)
            || self.partial_offload_ratio > self.full_offload_ratio
        {
            return Err(ConfigError::ValidationFailed(
                "Offload ratios must satisfy 0 <= partial <= full <= 1".to_string(),
            ));
        }
        if self.max_vram_estimate_mb < self.default_vram_estimate_mb {
            return Err(ConfigError::ValidationFailed(
                "Max VRAM estimate cannot be below the default estimate".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }
}

impl fmt::Display for RigConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Modelrig Configuration:")?;
        writeln!(
            f,
            "  Default VRAM Estimate: {} MB (cap {} MB)",
            self.default_vram_estimate_mb, self.max_vram_estimate_mb
        )?;
        writeln!(f, "  VRAM Overhead Factor: {}", self.vram_overhead_factor)?;
        writeln!(f, "  Quant Safety Margin: {}", self.quant_safety_margin)?;
        writeln!(f, "  mlock Threshold: {} MB", self.mlock_threshold_mb)?;
        writeln!(
            f,
            "  Offload: >{} MB generic, {} partial layers, ratios {}/{}",
            self.generic_offload_threshold_mb,
            self.partial_offload_layers,
            self.partial_offload_ratio,
            self.full_offload_ratio
        )?;
        writeln!(
            f,
            "  Context: {} GB/1k tokens, {} GB reserve, [{}, {}] tokens",
            self.gb_per_1k_tokens, self.ram_reserve_gb, self.context_floor, self.stability_cap
        )?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
