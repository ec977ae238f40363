pub mod commands;
pub mod handlers;

pub use commands::{
    AssessArgs, CliArgs, Commands, ContextWindowArgs, DetectArgs, OutputFormatArg, SettingsArgs,
    SummaryArgs,
};
