//! Package build descriptors
//!
//! A descriptor is an RPM-style `.spec` file: a preamble of `Tag: value`
//! lines followed by `%section` bodies. This module parses it into a
//! [`Descriptor`] with macros expanded.

mod changelog;
mod macros;
mod model;
mod parser;

use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;

use crate::runtime::Runtime;

pub use changelog::{Changelog, ChangelogEntry};
pub use macros::MacroTable;
pub use model::{
    Descriptor, FileEntry, FileKind, FilesSpec, NOARCH, PackageMetadata, Scripts, SetupDirective,
};
pub use parser::{parse_descriptor, parse_file_entries};

impl Descriptor {
    /// Read and parse a descriptor file.
    #[tracing::instrument(skip(runtime, macros))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path, macros: MacroTable) -> Result<Self> {
        let text = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read descriptor {:?}", path))?;
        parse_descriptor(&text, macros).with_context(|| format!("Invalid descriptor {:?}", path))
    }
}

impl FromStr for Descriptor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_descriptor(s, MacroTable::new())
    }
}
