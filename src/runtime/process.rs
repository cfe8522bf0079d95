//! Shell script execution for lifecycle phases.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::RealRuntime;

/// Shell used for phase scripts. Scripts run with `-e` so the first failing
/// command aborts the phase.
const SHELL: &str = "sh";

/// A script to run, the directory to run it in, and extra environment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptInvocation {
    pub script: String,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ScriptInvocation {
    pub fn new(script: impl Into<String>, cwd: &Path) -> Self {
        Self {
            script: script.into(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Captured result of a finished script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self, invocation), fields(cwd = ?invocation.cwd))]
    pub(crate) fn run_script_impl(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        debug!("Running script in {:?}:\n{}", invocation.cwd, invocation.script);

        let mut cmd = Command::new(SHELL);
        cmd.arg("-e")
            .arg("-c")
            .arg(&invocation.script)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null());
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", SHELL))?;

        Ok(ScriptOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
