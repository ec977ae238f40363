//! Context window resolution
//!
//! Merges three signals into one usable context length: the model's
//! self-declared native limit (read from GGUF metadata), a ceiling derived
//! from live available system memory, and a hard stability cap. Every
//! failure path degrades to a file-size heuristic; this module never errors.
//!
//! The result is cached per model path by the arbiter - metadata probing is
//! I/O-bound and the answer is stable for a given file.

use super::probe;
use crate::config::RigConfig;
use candle_core::quantized::gguf_file::{self, Value};
use std::path::Path;
use tracing::{debug, info, warn};

const GIB: u64 = 1024 * 1024 * 1024;

/// GGUF metadata keys that carry the trained context length, checked in
/// order after the `general.architecture`-derived key
const CONTEXT_LENGTH_KEYS: &[&str] = &[
    "llama.context_length",
    "llm.context_length",
    "phi3.context_length",
    "gemma.context_length",
    "qwen2.context_length",
];

/// Resolves the context window for a model: min(native limit, hardware
/// limit), capped at the stability ceiling and floored at the minimum
/// usable window. Reads live available memory on every call; caching is the
/// caller's concern.
pub fn resolve(cfg: &RigConfig, model_path: &Path) -> u32 {
    let native_limit = native_context_limit(cfg, model_path);
    let hardware_limit = hardware_context_limit(cfg);

    let merged = native_limit.min(hardware_limit);
    let result = merged.min(cfg.stability_cap).max(cfg.context_floor);

    debug_assert!(result >= cfg.context_floor && result <= cfg.stability_cap);

    info!(
        "Context window for {}: native {}, hardware {}, cap {} -> {}",
        model_path.display(),
        native_limit,
        hardware_limit,
        cfg.stability_cap,
        result
    );

    result
}

/// The model's declared maximum context length.
///
/// Reads GGUF metadata; a declared limit at or below the conservative
/// default on a large file is treated as a likely metadata-read failure and
/// bumped by file size. An unreadable file skips straight to the size-only
/// heuristic.
fn native_context_limit(cfg: &RigConfig, model_path: &Path) -> u32 {
    let file_size = std::fs::metadata(model_path).map(|m| m.len()).unwrap_or(0);

    match probe_gguf_context_length(model_path) {
        Ok(declared) => {
            let mut limit = declared.unwrap_or(4096);
            // Large files rarely ship with only a 4k context; trust the file
            // size over a suspiciously small metadata value
            if limit <= 4096 {
                if file_size > 8 * GIB {
                    limit = limit.max(32768);
                } else if file_size > 4 * GIB {
                    limit = limit.max(16384);
                } else if file_size > 2 * GIB {
                    limit = limit.max(8192);
                }
            }
            limit
        }
        Err(e) => {
            warn!(
                "Could not read native context limit for {}: {}",
                model_path.display(),
                e
            );
            if file_size > 10 * GIB {
                32768
            } else if file_size > 5 * GIB {
                16384
            } else {
                8192
            }
        }
    }
}

/// Reads the declared context length from GGUF metadata, trying the
/// architecture-derived key first, then the fixed key list, then any key
/// ending in `.context_length`.
fn probe_gguf_context_length(model_path: &Path) -> anyhow::Result<Option<u32>> {
    let mut file = std::fs::File::open(model_path)?;
    let content = gguf_file::Content::read(&mut file)?;
    let metadata = &content.metadata;

    if let Some(arch) = metadata
        .get("general.architecture")
        .and_then(value_to_string)
    {
        let key = format!("{arch}.context_length");
        if let Some(limit) = metadata.get(&key).and_then(value_to_u64) {
            if limit > 0 {
                return Ok(Some(limit as u32));
            }
        }
    }

    for key in CONTEXT_LENGTH_KEYS {
        if let Some(limit) = metadata.get(*key).and_then(value_to_u64) {
            if limit > 0 {
                return Ok(Some(limit as u32));
            }
        }
    }

    // Last resort: any architecture we have never heard of
    for (key, value) in metadata.iter() {
        if key.ends_with(".context_length") {
            if let Some(limit) = value_to_u64(value) {
                if limit > 0 {
                    debug!("Context length found under unexpected key {}", key);
                    return Ok(Some(limit as u32));
                }
            }
        }
    }

    Ok(None)
}

/// Token budget from live available RAM, after the OS reserve
fn hardware_context_limit(cfg: &RigConfig) -> u32 {
    let available_gb = probe::available_ram_mb() as f64 / 1024.0;
    let usable_gb = (available_gb - cfg.ram_reserve_gb).max(0.0);
    let tokens = (usable_gb / cfg.gb_per_1k_tokens) * 1024.0;

    tokens.min(u32::MAX as f64) as u32
}

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::U8(n) => Some(*n as u64),
        Value::U16(n) => Some(*n as u64),
        Value::U32(n) => Some(*n as u64),
        Value::U64(n) => Some(*n),
        Value::I8(n) => u64::try_from(*n).ok(),
        Value::I16(n) => u64::try_from(*n).ok(),
        Value::I32(n) => u64::try_from(*n).ok(),
        Value::I64(n) => u64::try_from(*n).ok(),
        Value::F32(f) if *f > 0.0 => Some(*f as u64),
        Value::F64(f) if *f > 0.0 => Some(*f as u64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
