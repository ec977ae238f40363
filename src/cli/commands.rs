use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Hardware arbitration and execution settings for local LLM inference
#[derive(Parser, Debug)]
#[command(
    name = "modelrig",
    about = "Hardware arbitration and execution settings for local LLM inference",
    version,
    author,
    long_about = "modelrig probes the machine for compute backends (CUDA, ROCm, Metal, \
                  SYCL, Vulkan), assesses whether a GGUF model fits the available \
                  accelerator memory, and synthesizes llama.cpp-style execution \
                  settings tuned to the hardware."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Increase verbosity")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Probe the machine and report the hardware profile",
        long_about = "Probes for accelerator backends in priority order and reports the \
                      resulting hardware profile.\n\n\
                      Examples:\n  \
                      modelrig detect\n  \
                      modelrig detect --format json"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Assess hardware requirements for a model file",
        long_about = "Estimates the memory footprint of a GGUF model and reports whether \
                      it fits the active backend, plus the recommended fallbacks.\n\n\
                      Examples:\n  \
                      modelrig assess ./models/llama-7b-Q4_K_M.gguf\n  \
                      modelrig assess ./models/llama-7b-Q4_K_M.gguf --format json"
    )]
    Assess(AssessArgs),

    #[command(
        about = "Synthesize execution settings",
        long_about = "Synthesizes execution settings for the current hardware, tuned to a \
                      specific model when one is given.\n\n\
                      Examples:\n  \
                      modelrig settings\n  \
                      modelrig settings ./models/llama-7b-Q4_K_M.gguf --format json"
    )]
    Settings(SettingsArgs),

    #[command(
        name = "context-window",
        about = "Resolve the usable context window for a model",
        long_about = "Merges the model's declared context length with the memory this \
                      machine can actually back.\n\n\
                      Examples:\n  \
                      modelrig context-window ./models/llama-7b-Q4_K_M.gguf"
    )]
    ContextWindow(ContextWindowArgs),

    #[command(
        about = "Report the full system summary",
        long_about = "Reports the hardware profile together with recorded performance and \
                      fallback statistics.\n\n\
                      Examples:\n  \
                      modelrig summary --format json"
    )]
    Summary(SummaryArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct AssessArgs {
    #[arg(value_name = "MODEL", help = "Path to the GGUF model file")]
    pub model_path: PathBuf,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct SettingsArgs {
    #[arg(
        value_name = "MODEL",
        help = "Path to the GGUF model file (omit for generic settings)"
    )]
    pub model_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ContextWindowArgs {
    #[arg(value_name = "MODEL", help = "Path to the GGUF model file")]
    pub model_path: PathBuf,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct SummaryArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}
