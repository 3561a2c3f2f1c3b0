//! Infrastructure layer for Skillward.
//!
//! Everything that touches the filesystem: `skillward.toml` loading, the
//! skill format parsers and directory discovery, and lockfile I/O. The
//! verification pipeline in `skillward-core` never reads a file itself.

pub mod config;
pub mod lockfile;
pub mod parser;
