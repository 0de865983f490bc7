//! Resolution of the external workflow executables.
//!
//! Search order:
//! 1. An environment variable naming the executable explicitly
//! 2. `PATH`, via `which`
//!
//! The variable wins even when the binary also sits on `PATH`, so a test run
//! can pin a particular checkout of the pipeline.

use anyhow::{anyhow, Result};
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Overrides the workflow entry point.
pub const WORKFLOW_BIN_ENV: &str = "CACTUS_WORKFLOW_BIN";
/// Overrides the job-tree statistics reporter.
pub const STATS_BIN_ENV: &str = "CACTUS_STATS_BIN";

pub const DEFAULT_WORKFLOW_BIN: &str = "cactus_workflow.py";
pub const DEFAULT_STATS_BIN: &str = "toil";

/// Find `binary_name`, preferring the path in `env_var` when it is set.
pub fn find_binary(binary_name: &str, env_var: &str) -> Result<PathBuf> {
    if let Ok(value) = env::var(env_var) {
        let path = PathBuf::from(value);
        if path.exists() {
            debug!("Using {} from {}: {}", binary_name, env_var, path.display());
            return Ok(path);
        }
        return Err(anyhow!(
            "{} points at {}, which does not exist",
            env_var,
            path.display()
        ));
    }

    if let Ok(output) = Command::new("which").arg(binary_name).output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                debug!("Using {} from PATH: {}", binary_name, path);
                return Ok(PathBuf::from(path));
            }
        }
    }

    Err(anyhow!(
        "'{}' not found on PATH. Install the pipeline or set {} to its location.",
        binary_name,
        env_var
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_names_env_var() {
        let err = find_binary(
            "definitely-not-a-cactus-binary-7f3a",
            "CACTUS_TESTKIT_UNSET_VARIABLE_7f3a",
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("definitely-not-a-cactus-binary-7f3a"), "{msg}");
        assert!(msg.contains("CACTUS_TESTKIT_UNSET_VARIABLE_7f3a"), "{msg}");
    }
}
