//! Hint codec for kontrib.
//!
//! A hint makes one contribution record visible to later compilation units.
//! The record is encoded as a `|`-joined token plus an optional JSON detail
//! and attached to a marker declaration in a reserved namespace that nothing
//! else references.

pub mod codec;
pub mod marker;

pub use codec::{decode, decode_with_detail, encode, encode_detail, HintDetail, DELIMITER};
pub use marker::{decode_arguments, marker_name, markers_for, HintMarker};
