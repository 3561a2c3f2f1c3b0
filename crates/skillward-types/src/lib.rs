//! Shared domain types for Skillward.
//!
//! This crate contains the domain types used across the Skillward workspace:
//! the capability lattice, the unified skill record, findings and verdicts,
//! trust scores, policy and resolved configurations, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, semver, chrono, thiserror.

pub mod capability;
pub mod config;
pub mod error;
pub mod finding;
pub mod resolution;
pub mod skill;
pub mod trust;
pub mod version;
