//! Token and detail encoding for contribution records.
//!
//! A token is `scope|contributed|replaced...`, one canonical type name per
//! segment. Everything else a record carries travels in a sibling JSON detail
//! so no field ever has to be escaped inside the token.

use serde::{Deserialize, Serialize};

use kontrib_core::ids::{ScopeId, TypeId};
use kontrib_core::naming;
use kontrib_core::record::{
    BindingContribution, ContributionRecord, Qualifier, Rank, SubcomponentContribution, TypeList,
};
use kontrib_util::errors::{KontribError, KontribResult};

/// Segment delimiter of a hint token. Canonical names never contain it.
pub const DELIMITER: char = '|';

/// Out-of-band fields of a hint, keyed by record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HintDetail {
    Supertype,
    Module,
    Binding {
        bound_type: TypeId,
        #[serde(default)]
        rank: Rank,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qualifier: Option<Qualifier>,
        #[serde(default, skip_serializing_if = "is_false")]
        ignore_qualifier: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        multibinding: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        generated_module: Option<TypeId>,
    },
    Subcomponent {
        parent_scope: ScopeId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        modules: Vec<TypeId>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        excludes: Vec<TypeId>,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl HintDetail {
    fn of(record: &ContributionRecord) -> Self {
        match record {
            ContributionRecord::Supertype { .. } => HintDetail::Supertype,
            ContributionRecord::Module { .. } => HintDetail::Module,
            ContributionRecord::Binding(b) => HintDetail::Binding {
                bound_type: b.bound_type.clone(),
                rank: b.rank,
                qualifier: b.qualifier.clone(),
                ignore_qualifier: b.ignore_qualifier,
                multibinding: b.multibinding,
                generated_module: Some(b.generated_module.clone()),
            },
            ContributionRecord::Subcomponent(s) => HintDetail::Subcomponent {
                parent_scope: s.parent_scope.clone(),
                modules: s.modules.to_vec(),
                excludes: s.excludes.to_vec(),
            },
        }
    }
}

/// Encode the identity part of `record` as a hint token.
pub fn encode(record: &ContributionRecord) -> String {
    let mut token = String::from(record.scope().as_str());
    token.push(DELIMITER);
    token.push_str(record.contributed().as_str());
    for replaced in record.replaces().iter() {
        token.push(DELIMITER);
        token.push_str(replaced.as_str());
    }
    token
}

/// Encode the kind-specific fields of `record` as JSON.
pub fn encode_detail(record: &ContributionRecord) -> KontribResult<String> {
    serde_json::to_string(&HintDetail::of(record)).map_err(|e| KontribError::MalformedHint {
        token: encode(record),
        reason: format!("detail could not be encoded: {e}"),
    })
}

/// Decode a token without a detail. Such tokens describe module contributions.
pub fn decode(token: &str) -> KontribResult<ContributionRecord> {
    decode_with_detail(token, None)
}

pub fn decode_with_detail(token: &str, detail: Option<&str>) -> KontribResult<ContributionRecord> {
    let (scope, contributed, replaces) = split(token)?;

    let detail = match detail.map(str::trim).filter(|d| !d.is_empty()) {
        None => HintDetail::Module,
        Some(raw) => serde_json::from_str(raw).map_err(|e| KontribError::MalformedHint {
            token: token.to_string(),
            reason: format!("invalid detail `{raw}`: {e}"),
        })?,
    };

    let record = match detail {
        HintDetail::Supertype => ContributionRecord::Supertype {
            scope,
            contributed,
            replaces,
        },
        HintDetail::Module => ContributionRecord::Module {
            scope,
            contributed,
            replaces,
        },
        HintDetail::Binding {
            bound_type,
            rank,
            qualifier,
            ignore_qualifier,
            multibinding,
            generated_module,
        } => {
            let generated_module = generated_module
                .unwrap_or_else(|| naming::binding_module(&contributed, &scope, multibinding));
            ContributionRecord::Binding(BindingContribution {
                scope,
                bound_type,
                contributed,
                replaces,
                rank,
                qualifier,
                ignore_qualifier,
                multibinding,
                generated_module,
            })
        }
        HintDetail::Subcomponent {
            parent_scope,
            modules,
            excludes,
        } => ContributionRecord::Subcomponent(SubcomponentContribution {
            scope,
            parent_scope,
            contributed,
            replaces,
            modules: modules.into(),
            excludes: excludes.into(),
        }),
    };
    Ok(record)
}

fn split(token: &str) -> KontribResult<(ScopeId, TypeId, TypeList)> {
    let segments: Vec<&str> = token.split(DELIMITER).map(str::trim).collect();
    if segments.len() < 2 {
        return Err(KontribError::MalformedHint {
            token: token.to_string(),
            reason: "expected at least a scope and a contributed type".to_string(),
        });
    }
    if let Some(position) = segments.iter().position(|s| s.is_empty()) {
        return Err(KontribError::MalformedHint {
            token: token.to_string(),
            reason: format!("segment {position} is empty"),
        });
    }
    let scope = ScopeId::new(segments[0]);
    let contributed = TypeId::new(segments[1]);
    let replaces = segments[2..].iter().map(|s| TypeId::new(s)).collect();
    Ok((scope, contributed, replaces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontrib_core::record::ContributionKind;

    #[test]
    fn token_without_detail_is_a_module() {
        let record = decode("com.example.AppScope|com.example.NetworkModule").unwrap();
        assert_eq!(record.kind(), ContributionKind::Module);
        assert_eq!(record.scope().as_str(), "com.example.AppScope");
        assert!(record.replaces().is_empty());
    }

    #[test]
    fn segments_are_trimmed() {
        let record = decode(" AppScope | com.example.Real | com.example.Fake ").unwrap();
        assert_eq!(record.contributed().as_str(), "com.example.Real");
        assert_eq!(record.replaces()[0].as_str(), "com.example.Fake");
    }

    #[test]
    fn single_segment_is_malformed() {
        let err = decode("com.example.AppScope").unwrap_err();
        assert!(matches!(err, KontribError::MalformedHint { .. }));
        assert!(err.to_string().contains("at least a scope"), "got: {err}");
    }

    #[test]
    fn empty_segment_is_malformed() {
        let err = decode("AppScope||com.example.Fake").unwrap_err();
        assert!(err.to_string().contains("segment 1 is empty"), "got: {err}");
        assert!(decode("").is_err());
    }

    #[test]
    fn supertype_detail() {
        let record = decode_with_detail("AppScope|com.example.Api", Some(r#"{"kind":"supertype"}"#))
            .unwrap();
        assert_eq!(record, ContributionRecord::supertype("AppScope", "com.example.Api"));
    }

    #[test]
    fn blank_detail_is_ignored() {
        let record = decode_with_detail("AppScope|com.example.Mod", Some("  ")).unwrap();
        assert_eq!(record.kind(), ContributionKind::Module);
    }

    #[test]
    fn binding_detail_defaults() {
        let record = decode_with_detail(
            "com.example.AppScope|com.example.ConsoleLogger",
            Some(r#"{"kind":"binding","bound_type":"com.example.Logger"}"#),
        )
        .unwrap();
        let ContributionRecord::Binding(binding) = record else {
            panic!("expected a binding");
        };
        assert_eq!(binding.rank, Rank::NORMAL);
        assert!(!binding.multibinding);
        assert_eq!(
            binding.generated_module.as_str(),
            "com.example.ConsoleLogger_AppScope_BindingModule"
        );
    }

    #[test]
    fn invalid_detail_is_malformed() {
        let err = decode_with_detail("AppScope|X", Some(r#"{"kind":"gadget"}"#)).unwrap_err();
        assert!(err.to_string().contains("invalid detail"), "got: {err}");
    }

    #[test]
    fn binding_survives_encoding() {
        let record = ContributionRecord::Binding(BindingContribution {
            scope: ScopeId::new("com.example.AppScope"),
            bound_type: TypeId::new("com.example.Logger"),
            contributed: TypeId::new("com.example.FileLogger"),
            replaces: vec![TypeId::new("com.example.ConsoleLogger")].into(),
            rank: Rank::HIGH,
            qualifier: Some(Qualifier::with_value("javax.inject.Named", "io")),
            ignore_qualifier: false,
            multibinding: false,
            generated_module: TypeId::new("com.example.FileLogger_AppScope_BindingModule"),
        });
        let token = encode(&record);
        assert_eq!(
            token,
            "com.example.AppScope|com.example.FileLogger|com.example.ConsoleLogger"
        );
        let detail = encode_detail(&record).unwrap();
        assert!(detail.contains(r#""rank":0"#), "got: {detail}");
        assert!(!detail.contains("multibinding"), "got: {detail}");
        assert_eq!(decode_with_detail(&token, Some(&detail)).unwrap(), record);
    }
}
