//! Hardware arbitration and execution settings
//!
//! Decides which compute backend local LLM inference should run on and what
//! execution parameters to hand the engine. Probing is best-effort and
//! soft-failing: a machine with no working accelerator tooling arbitrates
//! to CPU, never to an error.

pub mod arbiter;
pub mod assess;
pub mod backend;
pub mod context_window;
pub mod ledger;
pub mod probe;
pub mod profile;
pub mod quant;
pub mod settings;

pub use arbiter::{SystemArbiter, SystemSummary};
pub use assess::ModelRequirement;
pub use backend::Backend;
pub use ledger::{FallbackStats, OperationStats, PerformanceLedger};
pub use profile::HardwareProfile;
pub use settings::{ExecutionSettings, OFFLOAD_ALL};
