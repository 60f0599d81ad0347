//! Shared utilities for the kontrib merge engine.
//!
//! This crate provides cross-cutting concerns used by all other kontrib crates:
//! the unified error type and the hashing helpers behind result fingerprints
//! and hint marker names.

pub mod errors;
pub mod hash;
