//! Core data types for the kontrib merge engine.
//!
//! This crate defines the fundamental types shared by the hint codec and the
//! resolver: type and scope identifiers, contribution records, merge requests
//! and results, diagnostics, engine configuration, and the capability
//! interface a host compiler implements to expose its declarations.
//!
//! This crate is intentionally free of resolution logic.

pub mod config;
pub mod diagnostic;
pub mod host;
pub mod ids;
pub mod naming;
pub mod record;
pub mod request;
