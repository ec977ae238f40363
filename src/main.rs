use modelrig::cli::handlers::{
    handle_assess, handle_context_window, handle_detect, handle_settings, handle_summary,
};
use modelrig::cli::{CliArgs, Commands};
use modelrig::config::RigConfig;
use modelrig::hardware::SystemArbiter;
use modelrig::util::logging::{self, parse_level, LoggingConfig};
use modelrig::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, error, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("modelrig v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let cfg = RigConfig::default();
    if let Err(e) = cfg.validate() {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(2);
    }

    let arbiter = SystemArbiter::new(cfg);

    let exit_code = match &args.command {
        Commands::Detect(detect_args) => handle_detect(&arbiter, detect_args),
        Commands::Assess(assess_args) => handle_assess(&arbiter, assess_args),
        Commands::Settings(settings_args) => handle_settings(&arbiter, settings_args),
        Commands::ContextWindow(ctx_args) => handle_context_window(&arbiter, ctx_args),
        Commands::Summary(summary_args) => handle_summary(&arbiter, summary_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("MODELRIG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let use_json = env::var("MODELRIG_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    logging::init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}
