//! Package versions and dependencies
//!
//! This module provides version ordering, dependency constraint parsing,
//! availability providers and the dependency check run before a build.

mod dependency;
mod provider;
mod resolve;
mod version;

pub use dependency::{DependencyConstraint, DependencySet, parse_dependency_list};
pub use provider::{DependencyProvider, Inventory, Permissive, QueryCommand};
#[cfg(test)]
pub use provider::MockDependencyProvider;
pub use resolve::{Resolution, Unsatisfied, best_match, check_all, resolve, resolve_all};
pub use version::{Op, Version, VersionConstraint, compare_segments};
