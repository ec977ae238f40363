//! Backend probing
//!
//! Probes accelerator backends in fixed priority order (CUDA -> ROCm ->
//! Metal -> SYCL -> Vulkan) and assembles a [`HardwareProfile`]. Every probe
//! fails soft: a missing driver tool, a non-zero exit, or unparseable output
//! all collapse to "backend absent" and are logged at debug level. System
//! facts (RAM, CPU topology, platform) are gathered unconditionally via
//! `sysinfo`, so the worst case is a CPU-only profile.
//!
//! Probes shell out to vendor tooling (`nvidia-smi`, `rocminfo`, `sycl-ls`,
//! `vulkaninfo`, `sysctl`). No timeout is applied; an unresponsive driver
//! command will stall the one-time detection.

use super::backend::Backend;
use super::profile::HardwareProfile;
use std::process::Command;
use sysinfo::System;
use tracing::{debug, info};

const MB: u64 = 1024 * 1024;

/// Result of one successful backend probe
#[derive(Debug, Clone)]
pub struct BackendProbe {
    pub backend: Backend,
    pub device_name: String,
    /// Reported accelerator memory in MB; 0 when the probe cannot tell
    pub vram_mb: u64,
    pub driver_version: Option<String>,
    pub runtime_version: Option<String>,
}

/// Detects available hardware and builds the profile.
///
/// Idempotency is the caller's concern: [`SystemArbiter`](crate::SystemArbiter)
/// memoizes the result behind a `OnceLock`, so within a process this runs at
/// most once per arbiter.
pub fn detect() -> HardwareProfile {
    let mut sys = System::new_all();
    sys.refresh_all();

    let system_ram_mb = sys.total_memory() / MB;
    let cpu_cores = sys.cpus().len().max(1);
    let physical_cores = System::physical_core_count();

    let mut active: Option<BackendProbe> = None;
    let mut available = vec![Backend::Cpu];
    let mut cuda_version = None;
    let mut rocm_version = None;
    let mut sycl_version = None;
    let mut vulkan_version = None;
    let mut metal_support = false;
    let mut sycl_support = false;
    let mut vulkan_support = false;

    for &backend in Backend::PROBE_ORDER {
        let probed = match backend {
            Backend::Cuda => probe_cuda(),
            Backend::Rocm => probe_rocm(),
            Backend::Metal => probe_metal(system_ram_mb),
            Backend::Sycl => probe_sycl(),
            Backend::Vulkan => probe_vulkan(),
            Backend::Cpu => unreachable!("CPU is never probed"),
        };

        let Some(probe) = probed else {
            debug!("{} not available", backend);
            continue;
        };

        match backend {
            Backend::Cuda => cuda_version = probe.runtime_version.clone(),
            Backend::Rocm => rocm_version = probe.runtime_version.clone(),
            Backend::Metal => metal_support = true,
            Backend::Sycl => {
                sycl_support = true;
                sycl_version = probe.runtime_version.clone();
            }
            Backend::Vulkan => {
                vulkan_support = true;
                vulkan_version = probe.runtime_version.clone();
            }
            Backend::Cpu => {}
        }

        available.push(backend);
        if active.is_none() {
            active = Some(probe);
        }
    }

    let (backend, device_name, vram_mb, driver_version) = match active {
        Some(probe) => (
            probe.backend,
            probe.device_name,
            probe.vram_mb,
            probe.driver_version,
        ),
        None => (Backend::Cpu, "CPU".to_string(), 0, None),
    };

    let profile = HardwareProfile {
        backend,
        device_name,
        vram_mb,
        system_ram_mb,
        cpu_cores,
        physical_cores,
        platform: std::env::consts::OS.to_string(),
        architecture: std::env::consts::ARCH.to_string(),
        available_backends: available,
        driver_version,
        cuda_version,
        rocm_version,
        sycl_version,
        vulkan_version,
        metal_support,
        sycl_support,
        vulkan_support,
    };

    info!(
        "Detected hardware: {} backend on {} ({} MB VRAM)",
        profile.backend, profile.device_name, profile.vram_mb
    );
    debug!("Available backends: {:?}", profile.available_backends);

    profile
}

/// Runs a command and returns trimmed stdout on success
fn run(cmd: &str, args: &[&str]) -> Option<String> {
    match Command::new(cmd).args(args).output() {
        Ok(out) if out.status.success() => {
            Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
        }
        Ok(out) => {
            debug!("{} exited with {}", cmd, out.status);
            None
        }
        Err(e) => {
            debug!("{} not runnable: {}", cmd, e);
            None
        }
    }
}

/// NVIDIA GPU via nvidia-smi.
///
/// Query output is one CSV line per device, e.g.
/// `NVIDIA GeForce RTX 4090, 24564, 550.54.14`. Only device 0 is used.
fn probe_cuda() -> Option<BackendProbe> {
    let out = run(
        "nvidia-smi",
        &[
            "--query-gpu=name,memory.total,driver_version",
            "--format=csv,noheader,nounits",
        ],
    )?;
    let line = out.lines().next()?;
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 2 {
        debug!("unexpected nvidia-smi output: {}", line);
        return None;
    }

    let device_name = fields[0].to_string();
    let vram_mb: u64 = fields[1].parse().ok()?;
    let driver_version = fields.get(2).map(|v| v.to_string());

    info!(
        "CUDA device detected: {} with {} MB memory",
        device_name, vram_mb
    );

    Some(BackendProbe {
        backend: Backend::Cuda,
        device_name,
        vram_mb,
        driver_version: driver_version.clone(),
        runtime_version: driver_version,
    })
}

/// AMD GPU via rocminfo. The tool does not report memory size in a stable
/// format, so a conservative 4096 MB fallback is used.
fn probe_rocm() -> Option<BackendProbe> {
    run("rocminfo", &[])?;

    let runtime_version = run("rocminfo", &["--version"]);

    info!("ROCm runtime detected");

    Some(BackendProbe {
        backend: Backend::Rocm,
        device_name: "AMD GPU (ROCm)".to_string(),
        vram_mb: 4096,
        driver_version: None,
        runtime_version,
    })
}

/// Apple Silicon unified memory via sysctl (macOS only).
///
/// Metal has no dedicated VRAM; the usable share of unified memory is
/// estimated from total RAM, leaving headroom for the OS.
#[cfg(target_os = "macos")]
fn probe_metal(system_ram_mb: u64) -> Option<BackendProbe> {
    let brand = run("sysctl", &["-n", "machdep.cpu.brand_string"])?;
    if !brand.contains("Apple") {
        debug!("Metal probe: non-Apple CPU '{}', skipping", brand);
        return None;
    }

    let vram_mb = estimate_metal_vram_mb(system_ram_mb);

    info!(
        "Metal device detected: {} ({} MB usable unified memory)",
        brand, vram_mb
    );

    Some(BackendProbe {
        backend: Backend::Metal,
        device_name: format!("{} (Metal)", brand),
        vram_mb,
        driver_version: None,
        runtime_version: None,
    })
}

#[cfg(not(target_os = "macos"))]
fn probe_metal(_system_ram_mb: u64) -> Option<BackendProbe> {
    None
}

/// Usable unified memory for Metal, derived from total RAM
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn estimate_metal_vram_mb(system_ram_mb: u64) -> u64 {
    let three_quarters = system_ram_mb * 3 / 4;
    if system_ram_mb >= 64 * 1024 {
        three_quarters.min(48 * 1024)
    } else if system_ram_mb >= 32 * 1024 {
        three_quarters.min(24 * 1024)
    } else {
        // Leave 2GB for the OS on small machines
        (system_ram_mb * 65 / 100).min(system_ram_mb.saturating_sub(2048))
    }
}

/// Intel GPU via sycl-ls. Presence only; memory size is not exposed.
fn probe_sycl() -> Option<BackendProbe> {
    let out = run("sycl-ls", &[])?;
    let lower = out.to_lowercase();
    if !lower.contains("gpu") {
        debug!("sycl-ls lists no GPU device");
        return None;
    }

    info!("SYCL GPU device detected");

    Some(BackendProbe {
        backend: Backend::Sycl,
        device_name: "Intel GPU (SYCL)".to_string(),
        vram_mb: 0,
        driver_version: None,
        runtime_version: None,
    })
}

/// Generic Vulkan support via vulkaninfo. Presence only.
fn probe_vulkan() -> Option<BackendProbe> {
    run("vulkaninfo", &["--summary"])?;

    info!("Vulkan support detected");

    Some(BackendProbe {
        backend: Backend::Vulkan,
        device_name: "Vulkan Device".to_string(),
        vram_mb: 0,
        driver_version: None,
        runtime_version: None,
    })
}

/// Live available system memory in MB. Read fresh on every call; the context
/// window resolver needs the current figure, not the boot-time snapshot.
pub fn available_ram_mb() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory() / MB
}
