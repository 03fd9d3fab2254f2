//! Process execution seam.
//!
//! The external tool is spawned through the [`ProcessRunner`] trait so the
//! orchestrator can be exercised in tests without creating real processes.
//! [`SystemRunner`] is the production implementation: full stdio
//! inheritance, so interactive prompts and coloring behave exactly as if
//! Terraform had been invoked directly.

use std::path::Path;
use std::process::Command;

use indexmap::IndexMap;

use crate::error::{Result, TfwrapError};

/// Narrow process-spawn contract: merge `env` over the inherited
/// environment, run `program args` in `working_dir`, return the exit code.
pub trait ProcessRunner {
    fn run(
        &self,
        env: &IndexMap<String, String>,
        working_dir: &Path,
        program: &str,
        args: &[String],
    ) -> Result<i32>;
}

/// Spawns the real process with inherited stdin/stdout/stderr.
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        env: &IndexMap<String, String>,
        working_dir: &Path,
        program: &str,
        args: &[String],
    ) -> Result<i32> {
        let status = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .envs(env)
            .status()
            .map_err(|e| TfwrapError::execution(format!("could not spawn {program:?}: {e}")))?;
        // Terminated by signal: no code to forward, report failure.
        Ok(status.code().unwrap_or(1))
    }
}
