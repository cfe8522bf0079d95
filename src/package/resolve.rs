//! Checking dependency sets against a provider.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::dependency::{DependencyConstraint, DependencySet};
use super::provider::DependencyProvider;
use super::version::Version;

/// A constraint nothing available satisfies.
#[derive(Debug, Clone, PartialEq)]
pub struct Unsatisfied {
    pub constraint: DependencyConstraint,
    /// Everything the provider offered for this name (possibly nothing).
    pub available: Vec<Version>,
}

impl std::fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.available.is_empty() {
            write!(f, "{} is needed but not available", self.constraint)
        } else {
            let available: Vec<String> = self.available.iter().map(ToString::to_string).collect();
            write!(
                f,
                "{} is needed but only {} available",
                self.constraint,
                available.join(", ")
            )
        }
    }
}

/// Find the best (highest) available version satisfying `constraint`.
pub fn best_match<'a>(
    constraint: &DependencyConstraint,
    available: &'a [Version],
) -> Option<&'a Version> {
    available
        .iter()
        .filter(|v| constraint.is_satisfied_by(v))
        .max_by(|a, b| a.compare(b))
}

/// Outcome of checking one constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Satisfied {
        constraint: DependencyConstraint,
        version: Version,
    },
    Unsatisfied(Unsatisfied),
}

/// Check a single constraint against what `provider` offers.
pub fn resolve<P: DependencyProvider + ?Sized>(
    provider: &P,
    constraint: &DependencyConstraint,
) -> Result<Resolution> {
    let available = provider
        .available_versions(&constraint.name)
        .with_context(|| format!("Failed to query '{}'", constraint.name))?;
    let resolution = match best_match(constraint, &available) {
        Some(version) => {
            debug!("{} satisfied by {}", constraint, version);
            Resolution::Satisfied {
                constraint: constraint.clone(),
                version: version.clone(),
            }
        }
        None => Resolution::Unsatisfied(Unsatisfied {
            constraint: constraint.clone(),
            available,
        }),
    };
    Ok(resolution)
}

/// Resolve every constraint of every set, in order.
///
/// Returns `None` when the provider is not authoritative and nothing was
/// checked.
pub fn resolve_all<P: DependencyProvider + ?Sized>(
    provider: &P,
    sets: &[&DependencySet],
) -> Result<Option<Vec<Resolution>>> {
    if !provider.is_authoritative() {
        warn!("Dependency check skipped");
        return Ok(None);
    }
    sets.iter()
        .flat_map(|set| set.iter())
        .map(|constraint| resolve(provider, constraint))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Check every constraint of every set, collecting the unsatisfied ones.
///
/// Non-authoritative providers skip the check entirely.
pub fn check_all<P: DependencyProvider + ?Sized>(
    provider: &P,
    sets: &[&DependencySet],
) -> Result<Vec<Unsatisfied>> {
    let resolutions = resolve_all(provider, sets)?.unwrap_or_default();
    Ok(resolutions
        .into_iter()
        .filter_map(|resolution| match resolution {
            Resolution::Unsatisfied(missing) => Some(missing),
            Resolution::Satisfied { .. } => None,
        })
        .collect())
}
