//! Grounding checks for extraction output.
//!
//! # Core Principle
//! "LLMs assist; they do not decide."
//!
//! An extraction collaborator transcribes; it may not author. Every
//! returned segment must be traceable to the region it was asked to read.
//! Output that fails the check is rejected whole and the caller falls back
//! to the detector's text. It is never repaired.

mod validator;

pub use validator::{GroundingError, GroundingValidator, MIN_GROUNDING_SIMILARITY};
