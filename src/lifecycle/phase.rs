use serde::Serialize;
use std::fmt;

/// Lifecycle phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Prepare,
    Build,
    Install,
    Package,
    Clean,
}

impl Phase {
    pub const ORDER: [Phase; 5] = [
        Phase::Prepare,
        Phase::Build,
        Phase::Install,
        Phase::Package,
        Phase::Clean,
    ];

    /// Descriptor section holding the phase's script, if it has one.
    pub fn section(self) -> Option<&'static str> {
        match self {
            Phase::Prepare => Some("prep"),
            Phase::Build => Some("build"),
            Phase::Install => Some("install"),
            Phase::Package => None,
            Phase::Clean => Some("clean"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Build => "build",
            Phase::Install => "install",
            Phase::Package => "package",
            Phase::Clean => "clean",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
