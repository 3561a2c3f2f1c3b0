//! Observability set-up for Skillward binaries.

pub mod tracing_setup;
