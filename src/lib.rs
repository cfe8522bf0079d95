pub mod archive;
pub mod cleanup;
pub mod commands;
pub mod descriptor;
pub mod lifecycle;
pub mod package;
pub mod runtime;
