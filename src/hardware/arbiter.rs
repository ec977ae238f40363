//! System arbiter
//!
//! The single context object that owns hardware arbitration state: the
//! lazily probed [`HardwareProfile`], the per-model context window cache,
//! and the performance ledger. Construct one per process and share it by
//! reference; every surface is `&self` and thread-safe.

use super::assess::{self, ModelRequirement};
use super::backend::Backend;
use super::context_window;
use super::ledger::{FallbackStats, OperationStats, PerformanceLedger};
use super::probe;
use super::profile::HardwareProfile;
use super::settings::{self, ExecutionSettings};
use crate::config::RigConfig;
use crate::error::HardwareError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

/// Serializable snapshot of everything the arbiter knows
#[derive(Debug, Clone, Serialize)]
pub struct SystemSummary {
    pub hardware_profile: HardwareProfile,
    pub performance_stats: BTreeMap<String, OperationStats>,
    pub fallback_stats: BTreeMap<String, FallbackStats>,
    pub timestamp: DateTime<Utc>,
}

/// Owns arbitration state for one process
#[derive(Debug)]
pub struct SystemArbiter {
    cfg: RigConfig,
    profile: OnceLock<HardwareProfile>,
    context_windows: Mutex<HashMap<PathBuf, u32>>,
    ledger: PerformanceLedger,
}

impl SystemArbiter {
    pub fn new(cfg: RigConfig) -> Self {
        Self {
            cfg,
            profile: OnceLock::new(),
            context_windows: Mutex::new(HashMap::new()),
            ledger: PerformanceLedger::new(),
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.cfg
    }

    /// The hardware profile, probed at most once for the arbiter's lifetime
    pub fn hardware_profile(&self) -> &HardwareProfile {
        self.profile.get_or_init(|| {
            let profile = probe::detect();
            info!("Hardware arbitration settled: {}", profile);
            profile
        })
    }

    /// Assesses hardware requirements for a model file.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::ModelNotFound`] when the path does not exist.
    pub fn assess_model_requirements(
        &self,
        model_path: &Path,
    ) -> Result<ModelRequirement, HardwareError> {
        assess::assess(self.hardware_profile(), &self.cfg, model_path)
    }

    /// Synthesizes execution settings, model-specific when a path is given.
    ///
    /// Never fails: a missing or unreadable model degrades to conservative
    /// estimates. With a path the context window comes from the resolver's
    /// cache instead of the per-backend default.
    pub fn synthesize_settings(&self, model_path: Option<&Path>) -> ExecutionSettings {
        let profile = self.hardware_profile();
        match model_path {
            Some(path) => {
                let requirement = assess::assess_unchecked(profile, &self.cfg, path);
                let mut settings = settings::synthesize(profile, &self.cfg, Some(&requirement));
                settings.n_ctx = self.resolve_context_window(path);
                settings
            }
            None => settings::synthesize(profile, &self.cfg, None),
        }
    }

    /// Resolves the usable context window for a model, cached per path.
    ///
    /// The probe runs outside the cache lock; concurrent first calls for the
    /// same path may both compute, and the later write wins. Both compute
    /// the same native limit, so the cached value is stable either way.
    pub fn resolve_context_window(&self, model_path: &Path) -> u32 {
        {
            let cache = self.context_windows.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(&window) = cache.get(model_path) {
                debug!("Context window cache hit for {}: {}", model_path.display(), window);
                return window;
            }
        }

        let window = context_window::resolve(&self.cfg, model_path);

        let mut cache = self.context_windows.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(model_path.to_path_buf(), window);
        window
    }

    /// Drops the cached context window for one model, for when the file on
    /// disk was replaced
    pub fn invalidate_context_window(&self, model_path: &Path) {
        let mut cache = self.context_windows.lock().unwrap_or_else(|e| e.into_inner());
        if cache.remove(model_path).is_some() {
            debug!("Invalidated context window for {}", model_path.display());
        }
    }

    /// Drops all cached context windows
    pub fn clear_context_windows(&self) {
        let mut cache = self.context_windows.lock().unwrap_or_else(|e| e.into_inner());
        cache.clear();
    }

    pub fn record_operation(&self, backend: Backend, operation: &str, duration_ms: f64) {
        self.ledger.record_operation(backend, operation, duration_ms);
    }

    pub fn record_fallback(&self, from: Backend, to: Backend, reason: &str) {
        self.ledger.record_fallback(from, to, reason);
    }

    pub fn performance_stats(&self) -> BTreeMap<String, OperationStats> {
        self.ledger.operation_snapshot()
    }

    pub fn fallback_stats(&self) -> BTreeMap<String, FallbackStats> {
        self.ledger.fallback_snapshot()
    }

    /// One serializable snapshot of profile and ledger state
    pub fn system_summary(&self) -> SystemSummary {
        SystemSummary {
            hardware_profile: self.hardware_profile().clone(),
            performance_stats: self.performance_stats(),
            fallback_stats: self.fallback_stats(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for SystemArbiter {
    fn default() -> Self {
        Self::new(RigConfig::default())
    }
}
