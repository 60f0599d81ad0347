//! Marker declarations carrying hint tokens.
//!
//! The generator emits one marker per contributed type and scope. Consumers
//! only look markers up by listing the namespace, never by reference.

use std::collections::BTreeMap;

use kontrib_core::host::HintArguments;
use kontrib_core::ids::{ScopeId, TypeId};
use kontrib_core::record::ContributionRecord;
use kontrib_util::errors::{KontribError, KontribResult};
use kontrib_util::hash::short_md5_hex;

use crate::codec;

/// A synthetic declaration in the hint namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintMarker {
    pub namespace: String,
    pub name: String,
    /// Sorted hint tokens.
    pub hints: Vec<String>,
    /// JSON details, aligned with `hints`.
    pub details: Vec<String>,
}

impl HintMarker {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn arguments(&self) -> HintArguments {
        HintArguments {
            hints: self.hints.clone(),
            details: self.details.clone(),
        }
    }
}

/// `<contributed with '.' as '_'>_<md5 prefix of scope and contributed>`.
pub fn marker_name(scope: &ScopeId, contributed: &TypeId) -> String {
    format!(
        "{}_{}",
        contributed.as_str().replace('.', "_"),
        short_md5_hex(&[scope.as_str(), contributed.as_str()])
    )
}

/// Group `records` into markers, ordered by marker name.
pub fn markers_for(records: &[ContributionRecord], namespace: &str) -> KontribResult<Vec<HintMarker>> {
    let mut grouped: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for record in records {
        let record = record.canonical();
        let entry = (codec::encode(&record), codec::encode_detail(&record)?);
        grouped
            .entry(marker_name(record.scope(), record.contributed()))
            .or_default()
            .push(entry);
    }

    Ok(grouped
        .into_iter()
        .map(|(name, mut entries)| {
            entries.sort();
            entries.dedup();
            let (hints, details): (Vec<String>, Vec<String>) = entries.into_iter().unzip();
            HintMarker {
                namespace: namespace.to_string(),
                name,
                hints,
                details,
            }
        })
        .collect())
}

/// Decode every token of one marker, one result per token.
///
/// Tokens pair with `details` by index. A marker without details holds
/// module tokens only; a marker whose detail count differs from its token
/// count cannot be paired and every token in it is malformed.
pub fn decode_arguments(arguments: &HintArguments) -> Vec<KontribResult<ContributionRecord>> {
    let HintArguments { hints, details } = arguments;
    if !details.is_empty() && details.len() != hints.len() {
        tracing::debug!(
            "Hint marker has {} tokens but {} details",
            hints.len(),
            details.len()
        );
        return hints
            .iter()
            .map(|token| {
                Err(KontribError::MalformedHint {
                    token: token.clone(),
                    reason: format!(
                        "marker carries {} tokens but {} details",
                        hints.len(),
                        details.len()
                    ),
                })
            })
            .collect();
    }

    hints
        .iter()
        .enumerate()
        .map(|(i, token)| codec::decode_with_detail(token, details.get(i).map(String::as_str)))
        .collect()
}
