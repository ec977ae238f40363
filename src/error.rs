//! Typed errors for the arbitration engine
//!
//! Almost nothing in this crate errors toward the caller: probe failures,
//! unreadable metadata, and unassessable fits all degrade to documented
//! conservative defaults. The one exception is requirement assessment for a
//! path that does not exist at all - silently estimating for a nonexistent
//! file would mislead capacity planning.

use std::path::PathBuf;
use thiserror::Error;

/// Hardware arbitration errors
#[derive(Debug, Error)]
pub enum HardwareError {
    /// The model file does not exist
    #[error("Model not found: {path}")]
    ModelNotFound { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_message() {
        let err = HardwareError::ModelNotFound {
            path: PathBuf::from("/models/missing.gguf"),
        };
        assert_eq!(err.to_string(), "Model not found: /models/missing.gguf");
    }
}
