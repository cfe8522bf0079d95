use thiserror::Error;

use crate::package::{DependencyConstraint, Unsatisfied, Version};
use crate::runtime::ScriptOutput;

/// Failure of a lifecycle phase.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("Packaging failed: {0}")]
    Packaging(String),

    #[error("Unsatisfied dependency: {}", describe(.constraint, .available))]
    UnsatisfiedDependency {
        constraint: DependencyConstraint,
        available: Vec<Version>,
    },
}

impl From<Unsatisfied> for BuildError {
    fn from(value: Unsatisfied) -> Self {
        BuildError::UnsatisfiedDependency {
            constraint: value.constraint,
            available: value.available,
        }
    }
}

fn describe(constraint: &DependencyConstraint, available: &[Version]) -> String {
    Unsatisfied {
        constraint: constraint.clone(),
        available: available.to_vec(),
    }
    .to_string()
}

/// Message for a failed phase script: its stderr verbatim, or the exit code
/// when it wrote nothing.
pub(crate) fn script_failure(section: &str, output: &ScriptOutput) -> String {
    if output.stderr.trim().is_empty() {
        format!("%{} exited with code {}", section, output.code())
    } else {
        output.stderr.clone()
    }
}
