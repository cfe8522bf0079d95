//! Command-line use cases.

mod build;
mod check;
mod clean;
pub mod config;
mod show;

pub use build::build;
pub use check::check;
pub use clean::clean;
pub use config::{Availability, Config, ConfigOptions};
pub use show::show;
