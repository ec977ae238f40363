//! Command handlers
//!
//! Each handler runs one subcommand against a shared [`SystemArbiter`] and
//! returns a process exit code. Output goes to stdout; diagnostics go
//! through `tracing` to stderr.

use super::commands::{
    AssessArgs, ContextWindowArgs, DetectArgs, OutputFormatArg, SettingsArgs, SummaryArgs,
};
use crate::hardware::{ExecutionSettings, ModelRequirement, SystemArbiter};
use tracing::error;

pub fn handle_detect(arbiter: &SystemArbiter, args: &DetectArgs) -> i32 {
    let profile = arbiter.hardware_profile();
    match args.format {
        OutputFormatArg::Json => print_json(profile),
        OutputFormatArg::Human => {
            println!("{profile}");
            println!();
            println!("Available backends: {}", join_backends(profile));
            if let Some(driver) = &profile.driver_version {
                println!("Driver version:     {driver}");
            }
            println!("Platform:           {}/{}", profile.platform, profile.architecture);
            0
        }
    }
}

pub fn handle_assess(arbiter: &SystemArbiter, args: &AssessArgs) -> i32 {
    let requirement = match arbiter.assess_model_requirements(&args.model_path) {
        Ok(requirement) => requirement,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            return 1;
        }
    };

    match args.format {
        OutputFormatArg::Json => print_json(&requirement),
        OutputFormatArg::Human => {
            print_requirement_human(&requirement);
            0
        }
    }
}

pub fn handle_settings(arbiter: &SystemArbiter, args: &SettingsArgs) -> i32 {
    let settings = arbiter.synthesize_settings(args.model_path.as_deref());
    match args.format {
        OutputFormatArg::Json => print_json(&settings),
        OutputFormatArg::Human => {
            print_settings_human(&settings);
            0
        }
    }
}

pub fn handle_context_window(arbiter: &SystemArbiter, args: &ContextWindowArgs) -> i32 {
    let window = arbiter.resolve_context_window(&args.model_path);
    match args.format {
        OutputFormatArg::Json => {
            print_json(&serde_json::json!({
                "model_path": args.model_path,
                "context_window": window,
            }))
        }
        OutputFormatArg::Human => {
            println!("{window}");
            0
        }
    }
}

pub fn handle_summary(arbiter: &SystemArbiter, args: &SummaryArgs) -> i32 {
    let summary = arbiter.system_summary();
    match args.format {
        OutputFormatArg::Json => print_json(&summary),
        OutputFormatArg::Human => {
            println!("{}", summary.hardware_profile);
            println!();
            if summary.performance_stats.is_empty() {
                println!("No operations recorded.");
            } else {
                println!("Operations:");
                for (key, stats) in &summary.performance_stats {
                    println!(
                        "  {key}: {} calls, avg {:.1}ms (min {:.1}, max {:.1})",
                        stats.count,
                        stats.average_ms(),
                        stats.min_ms,
                        stats.max_ms
                    );
                }
            }
            if summary.fallback_stats.is_empty() {
                println!("No fallbacks recorded.");
            } else {
                println!("Fallbacks:");
                for (key, stats) in &summary.fallback_stats {
                    println!("  {key}: {} occurrences", stats.count);
                }
            }
            0
        }
    }
}

fn print_requirement_human(requirement: &ModelRequirement) {
    println!("Model:              {}", requirement.model_path.display());
    println!(
        "Quantization:       {}",
        requirement.quantization.as_deref().unwrap_or("unknown")
    );
    println!("Estimated VRAM:     {} MB", requirement.estimated_vram_mb);
    println!(
        "Fits VRAM:          {}",
        if requirement.fits_vram { "yes" } else { "no" }
    );
    println!("Recommended:        {}", requirement.recommended_backend);
    let fallbacks: Vec<String> = requirement
        .fallback_backends
        .iter()
        .map(|b| b.to_string())
        .collect();
    println!(
        "Fallbacks:          {}",
        if fallbacks.is_empty() {
            "none".to_string()
        } else {
            fallbacks.join(", ")
        }
    );
}

fn print_settings_human(settings: &ExecutionSettings) {
    println!("n_gpu_layers:    {}", settings.n_gpu_layers);
    println!("main_gpu:        {}", settings.main_gpu);
    println!("n_threads:       {}", settings.n_threads);
    println!("n_threads_batch: {}", settings.n_threads_batch);
    println!("n_batch:         {}", settings.n_batch);
    println!("n_ubatch:        {}", settings.n_ubatch);
    println!("n_ctx:           {}", settings.n_ctx);
    println!("use_mmap:        {}", settings.use_mmap);
    println!("use_mlock:       {}", settings.use_mlock);
    println!("flash_attn:      {}", settings.flash_attn);
}

fn join_backends(profile: &crate::hardware::HardwareProfile) -> String {
    profile
        .available_backends
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            error!("Failed to serialize output: {e}");
            eprintln!("Error: failed to serialize output: {e}");
            1
        }
    }
}
