//! Merge resolution for kontrib: the session-scoped contribution index,
//! binding conflict resolution, replacement and exclusion, and the
//! per-request merge algorithm.

pub mod conflict;
pub mod graph;
pub mod index;
pub mod resolver;
pub mod session;

pub use session::Session;
