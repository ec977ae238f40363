//! Performance and fallback ledger
//!
//! A passive sink for operation timings and backend fallback events. Nothing
//! in the engine reads the ledger back to influence arbitration; it exists
//! so operators can see which backend actually did the work and how often
//! the engine had to retreat from an accelerator.

use super::backend::Backend;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{info, warn};

/// Aggregated timings for one (backend, operation) pair
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub total_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_updated: DateTime<Utc>,
}

impl OperationStats {
    pub fn average_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

/// Aggregated fallback events for one (from, to) backend transition
#[derive(Debug, Clone, Serialize)]
pub struct FallbackStats {
    pub count: u64,
    /// Reason string to occurrence count
    pub reasons: BTreeMap<String, u64>,
    pub last_occurrence: DateTime<Utc>,
}

/// Thread-safe ledger of operation timings and fallback events
#[derive(Debug, Default)]
pub struct PerformanceLedger {
    operations: Mutex<HashMap<(Backend, String), OperationStats>>,
    fallbacks: Mutex<HashMap<(Backend, Backend), FallbackStats>>,
}

impl PerformanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one timed operation. Every tenth sample for a given pair
    /// emits a log line with the running average.
    pub fn record_operation(&self, backend: Backend, operation: &str, duration_ms: f64) {
        let mut operations = self.operations.lock().unwrap_or_else(|e| e.into_inner());
        let stats = operations
            .entry((backend, operation.to_string()))
            .or_insert_with(|| OperationStats {
                count: 0,
                total_ms: 0.0,
                min_ms: f64::INFINITY,
                max_ms: 0.0,
                last_updated: Utc::now(),
            });

        stats.count += 1;
        stats.total_ms += duration_ms;
        stats.min_ms = stats.min_ms.min(duration_ms);
        stats.max_ms = stats.max_ms.max(duration_ms);
        stats.last_updated = Utc::now();

        if stats.count % 10 == 0 {
            info!(
                "{} {} x{}: avg {:.1}ms (min {:.1}, max {:.1})",
                backend,
                operation,
                stats.count,
                stats.average_ms(),
                stats.min_ms,
                stats.max_ms
            );
        }
    }

    /// Records a backend fallback with its reason. Always logged at warn;
    /// a fallback means an accelerator the probe accepted was not usable
    /// in practice.
    pub fn record_fallback(&self, from: Backend, to: Backend, reason: &str) {
        warn!("Backend fallback {} -> {}: {}", from, to, reason);

        let mut fallbacks = self.fallbacks.lock().unwrap_or_else(|e| e.into_inner());
        let stats = fallbacks.entry((from, to)).or_insert_with(|| FallbackStats {
            count: 0,
            reasons: BTreeMap::new(),
            last_occurrence: Utc::now(),
        });

        stats.count += 1;
        *stats.reasons.entry(reason.to_string()).or_insert(0) += 1;
        stats.last_occurrence = Utc::now();
    }

    /// Snapshot of operation stats keyed `"<backend>:<operation>"`
    pub fn operation_snapshot(&self) -> BTreeMap<String, OperationStats> {
        let operations = self.operations.lock().unwrap_or_else(|e| e.into_inner());
        operations
            .iter()
            .map(|((backend, op), stats)| (format!("{backend}:{op}"), stats.clone()))
            .collect()
    }

    /// Snapshot of fallback stats keyed `"<from>-><to>"`
    pub fn fallback_snapshot(&self) -> BTreeMap<String, FallbackStats> {
        let fallbacks = self.fallbacks.lock().unwrap_or_else(|e| e.into_inner());
        fallbacks
            .iter()
            .map(|((from, to), stats)| (format!("{from}->{to}"), stats.clone()))
            .collect()
    }
}
