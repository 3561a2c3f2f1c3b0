//! The Skillward verification pipeline.
//!
//! Turns parsed skill records into per-skill verdicts, trust scores, and one
//! consistent resolved configuration. This crate does no filesystem I/O; it
//! depends only on `skillward-types`, never on `skillward-infra`.

pub mod analysis;
pub mod graph;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod trust;
