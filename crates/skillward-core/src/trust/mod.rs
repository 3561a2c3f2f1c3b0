//! Trust algebra: weighted intrinsic scores, historical decay, monotone
//! evidence updates, and min-propagation over dependencies.

pub mod engine;
pub mod propagation;

pub use engine::{decay_factor, update_with_evidence, TrustEngine};
pub use propagation::{effective_score, propagate};
