//! Core merge algorithm: candidate collection, exclusion, replacement,
//! binding conflicts and partitioning into supertypes and modules.

use std::collections::{BTreeSet, VecDeque};

use kontrib_core::config::EngineConfig;
use kontrib_core::diagnostic::Diagnostic;
use kontrib_core::host::CompilationHost;
use kontrib_core::ids::TypeId;
use kontrib_core::naming;
use kontrib_core::record::{BindingContribution, ContributionRecord, SubcomponentContribution};
use kontrib_core::request::{MergeRequest, MergeResult};
use kontrib_util::errors::{KontribError, KontribResult};

use crate::conflict::resolve_bindings;
use crate::graph::{ContributionGraph, Fate};
use crate::index::ContributionIndex;

/// The output of one merge.
pub struct Resolution {
    pub result: MergeResult,
    pub graph: ContributionGraph,
    /// Contributed subcomponents that survived, sorted.
    pub subcomponents: Vec<SubcomponentContribution>,
}

/// Resolve one merge request against the session index.
///
/// Errors other than host failures abort this request only.
pub fn resolve<H>(
    index: &ContributionIndex<'_, H>,
    host: &H,
    config: &EngineConfig,
    request: &MergeRequest,
) -> KontribResult<Resolution>
where
    H: CompilationHost + ?Sized,
{
    let target = request.target();
    let kind = request.kind();
    if kind.requires_interface_target() && !host.is_interface(target)? {
        return Err(KontribError::NotInterface {
            type_name: target.to_string(),
            message: format!(
                "{target} merges contributed supertypes, but it is not an interface. \
                 Components must be interfaces."
            ),
        });
    }
    check_include_exclude(request)?;

    let candidates = collect_candidates(index, request)?;
    let mut graph = ContributionGraph::new(target);
    let mut diagnostics = Vec::new();
    for candidate in &candidates {
        graph.add_candidate(candidate);
        let count = index.discovery_count(candidate)?;
        if count > 1 {
            diagnostics.push(Diagnostic::note(
                Diagnostic::DUPLICATE_CONTRIBUTION,
                format!("{candidate} was discovered {count} times and collapsed into one"),
            ));
        }
    }

    let implemented = implemented_types(host, target)?;
    apply_exclusions(request, &candidates, &implemented, &mut graph)?;
    apply_replacements(index, host, &candidates, &mut graph)?;

    let kept: Vec<ContributionRecord> = graph.kept().into_iter().cloned().collect();
    for record in &kept {
        if let ContributionRecord::Supertype { scope, contributed, .. } = record {
            if !host.is_interface(contributed)? {
                return Err(KontribError::NotInterface {
                    type_name: contributed.to_string(),
                    message: format!(
                        "{contributed} is contributed to {scope} as a supertype, but it is not an interface."
                    ),
                });
            }
        }
    }

    let bindings: Vec<&BindingContribution> = kept
        .iter()
        .filter_map(|r| match r {
            ContributionRecord::Binding(b) => Some(b),
            _ => None,
        })
        .collect();
    let bindings = resolve_bindings(bindings)?;
    for entry in &bindings.overrides {
        for record in &kept {
            if let ContributionRecord::Binding(b) = record {
                if !b.multibinding && b.contributed == entry.loser && b.key() == entry.key {
                    graph.mark(
                        record,
                        Fate::Overridden {
                            by: entry.winner.clone(),
                        },
                    );
                }
            }
        }
        if config.report_overrides {
            diagnostics.push(Diagnostic::note(
                Diagnostic::BINDING_OVERRIDDEN,
                entry.to_string(),
            ));
        }
    }

    let mut supertypes = host.supertypes(target)?;
    let mut modules = Vec::new();
    let mut subcomponents = Vec::new();
    for record in &kept {
        match record {
            ContributionRecord::Supertype { contributed, .. } => supertypes.push(contributed.clone()),
            ContributionRecord::Module { contributed, .. } => modules.push(contributed.clone()),
            ContributionRecord::Binding(_) => {}
            ContributionRecord::Subcomponent(s) => {
                let generated = naming::generated_subcomponent(&s.contributed, target);
                supertypes.push(naming::parent_component(&generated));
                modules.push(naming::subcomponent_module(&generated));
                subcomponents.push(s.clone());
            }
        }
    }
    if kind.merges_modules() {
        modules.extend(bindings.modules());
        modules.extend(request.explicit_modules().iter().cloned());
    }

    tracing::debug!(
        "Merged {} candidates into {target}: {} kept",
        candidates.len(),
        kept.len()
    );
    Ok(Resolution {
        result: MergeResult::new(
            supertypes,
            modules,
            request.explicit_dependencies(),
            diagnostics,
        ),
        graph,
        subcomponents,
    })
}

fn check_include_exclude(request: &MergeRequest) -> KontribResult<()> {
    let excluded: BTreeSet<&TypeId> = request.explicit_excludes().iter().collect();
    let both: BTreeSet<&TypeId> = request
        .explicit_modules()
        .iter()
        .filter(|m| excluded.contains(m))
        .collect();
    if both.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = both.iter().map(ToString::to_string).collect();
    Err(KontribError::Exclusion {
        target: request.target().to_string(),
        message: format!(
            "{} includes and excludes modules at the same time: {}",
            request.target(),
            names.join(", ")
        ),
        excluded: names,
    })
}

/// Union of the requested scopes' records, restricted to what the merge kind
/// outputs. Subcomponents are found through their parent scope.
fn collect_candidates<H>(
    index: &ContributionIndex<'_, H>,
    request: &MergeRequest,
) -> KontribResult<BTreeSet<ContributionRecord>>
where
    H: CompilationHost + ?Sized,
{
    let kind = request.kind();
    let mut candidates = BTreeSet::new();
    for scope in request.scopes() {
        index.check_declarations(scope)?;
        for record in index.for_scope(scope)?.iter() {
            let wanted = match record {
                ContributionRecord::Supertype { .. } => kind.merges_supertypes(),
                ContributionRecord::Module { .. } | ContributionRecord::Binding(_) => {
                    kind.merges_modules()
                }
                ContributionRecord::Subcomponent(_) => false,
            };
            if wanted {
                candidates.insert(record.clone());
            }
        }
        if kind.merges_supertypes() && kind.merges_modules() {
            candidates.extend(index.for_parent_scope(scope)?.iter().cloned());
        }
    }
    Ok(candidates)
}

/// The target's declared supertypes and all of theirs.
fn implemented_types<H>(host: &H, target: &TypeId) -> KontribResult<BTreeSet<TypeId>>
where
    H: CompilationHost + ?Sized,
{
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<TypeId> = host.supertypes(target)?.into();
    while let Some(ty) = queue.pop_front() {
        if seen.insert(ty.clone()) {
            queue.extend(host.supertypes(&ty)?);
        }
    }
    Ok(seen)
}

fn apply_exclusions(
    request: &MergeRequest,
    candidates: &BTreeSet<ContributionRecord>,
    implemented: &BTreeSet<TypeId>,
    graph: &mut ContributionGraph,
) -> KontribResult<()> {
    let target = request.target();
    for excluded in request.explicit_excludes() {
        let matches: Vec<&ContributionRecord> =
            candidates.iter().filter(|r| r.answers_to(excluded)).collect();
        if matches.is_empty() {
            let scopes: Vec<String> = request.scopes().iter().map(ToString::to_string).collect();
            return Err(KontribError::Exclusion {
                target: target.to_string(),
                excluded: vec![excluded.to_string()],
                message: format!(
                    "{target} with scopes [{}] wants to exclude {excluded}, but the excluded \
                     type isn't contributed to the same scope.",
                    scopes.join(", ")
                ),
            });
        }
        if implemented.contains(excluded) {
            return Err(KontribError::Exclusion {
                target: target.to_string(),
                excluded: vec![excluded.to_string()],
                message: format!(
                    "{target} excludes {excluded}, but it implements it directly. \
                     Remove the exclusion or the supertype."
                ),
            });
        }
        for record in matches {
            tracing::debug!("Excluding {record} from {target}");
            graph.mark(record, Fate::Excluded);
        }
    }
    Ok(())
}

fn apply_replacements<H>(
    index: &ContributionIndex<'_, H>,
    host: &H,
    candidates: &BTreeSet<ContributionRecord>,
    graph: &mut ContributionGraph,
) -> KontribResult<()>
where
    H: CompilationHost + ?Sized,
{
    for replacer in candidates {
        // Excluded records don't replace anything.
        if graph.fate(replacer) == Some(&Fate::Excluded) {
            continue;
        }
        for replaced in replacer.replaces().iter() {
            let targets: Vec<&ContributionRecord> = candidates
                .iter()
                .filter(|c| *c != replacer && can_replace(replacer, c, replaced))
                .collect();
            if targets.is_empty() {
                return Err(replacement_error(index, replacer, replaced)?);
            }
            if matches!(replacer, ContributionRecord::Supertype { .. }) && !host.is_interface(replaced)? {
                return Err(KontribError::Replacement {
                    replacer: replacer.contributed().to_string(),
                    replaced: replaced.to_string(),
                    message: format!(
                        "{} wants to replace {replaced}, but the replaced type is not an interface.",
                        replacer.contributed()
                    ),
                });
            }
            for target in targets {
                tracing::debug!("{} replaces {target}", replacer.contributed());
                graph.add_replacement(replacer, target);
            }
        }
    }
    Ok(())
}

fn can_replace(replacer: &ContributionRecord, candidate: &ContributionRecord, replaced: &TypeId) -> bool {
    match replacer {
        ContributionRecord::Supertype { .. } => {
            matches!(candidate, ContributionRecord::Supertype { contributed, .. } if contributed == replaced)
        }
        ContributionRecord::Module { .. } | ContributionRecord::Binding(_) => {
            candidate.is_module_like() && candidate.answers_to(replaced)
        }
        ContributionRecord::Subcomponent(_) => {
            matches!(candidate, ContributionRecord::Subcomponent(s) if &s.contributed == replaced)
        }
    }
}

fn replaceable_kinds(replacer: &ContributionRecord) -> &'static str {
    match replacer {
        ContributionRecord::Supertype { .. } => "contributed supertypes",
        ContributionRecord::Module { .. } | ContributionRecord::Binding(_) => {
            "contributed modules and bindings"
        }
        ContributionRecord::Subcomponent(_) => "contributed subcomponents",
    }
}

fn replacement_error<H>(
    index: &ContributionIndex<'_, H>,
    replacer: &ContributionRecord,
    replaced: &TypeId,
) -> KontribResult<KontribError>
where
    H: CompilationHost + ?Sized,
{
    let contributed = replacer.contributed();
    let elsewhere = index.contributions_of(replaced)?;
    let compatible = elsewhere
        .iter()
        .any(|r| can_replace(replacer, r, replaced));
    let message = if elsewhere.is_empty() {
        format!(
            "{contributed} wants to replace {replaced}, but the replaced type is not \
             contributed to any scope."
        )
    } else if !compatible {
        format!(
            "{contributed} wants to replace {replaced}, but a {} contribution can only replace {}.",
            replacer.kind(),
            replaceable_kinds(replacer)
        )
    } else {
        format!(
            "{contributed} with scope {} wants to replace {replaced}, but the replaced type \
             is not contributed to the same scope.",
            replacer.scope()
        )
    };
    Ok(KontribError::Replacement {
        replacer: contributed.to_string(),
        replaced: replaced.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontrib_core::host::{HintArguments, InMemoryHost};
    use kontrib_core::ids::ScopeId;
    use kontrib_hint::{encode, encode_detail};

    fn marker(records: &[ContributionRecord]) -> HintArguments {
        HintArguments {
            hints: records.iter().map(encode).collect(),
            details: records.iter().map(|r| encode_detail(r).unwrap()).collect(),
        }
    }

    fn resolve_with(host: &InMemoryHost, request: &MergeRequest) -> KontribResult<Resolution> {
        let config = EngineConfig::default();
        let index = ContributionIndex::new(host, config.clone());
        resolve(&index, host, &config, request)
    }

    #[test]
    fn can_replace_respects_kinds() {
        let supertype = ContributionRecord::supertype("A", "Y").replacing(["X"]);
        let module = ContributionRecord::module("A", "X");
        let replaced = TypeId::new("X");
        assert!(!can_replace(&supertype, &module, &replaced));
        assert!(can_replace(&supertype, &ContributionRecord::supertype("A", "X"), &replaced));
        let module_replacer = ContributionRecord::module("A", "Y").replacing(["X"]);
        assert!(can_replace(&module_replacer, &module, &replaced));
    }

    #[test]
    fn target_must_be_interface() {
        let host = InMemoryHost::new().class("com.example.AppComponent", &[]);
        let request = MergeRequest::builder("com.example.AppComponent")
            .scope("AppScope")
            .build();
        let err = resolve_with(&host, &request).err().unwrap();
        assert!(matches!(err, KontribError::NotInterface { .. }));
    }

    #[test]
    fn excluded_replacer_does_not_replace() {
        let records = [
            ContributionRecord::module("AppScope", "com.example.Real"),
            ContributionRecord::module("AppScope", "com.example.Fake").replacing(["com.example.Real"]),
        ];
        let host = InMemoryHost::new().hint_marker("lib", "kontrib.hint", "m", marker(&records));
        let request = MergeRequest::builder("Component")
            .scope(ScopeId::new("AppScope"))
            .exclude("com.example.Fake")
            .build();
        let resolution = resolve_with(&host, &request).ok().unwrap();
        assert_eq!(resolution.result.final_modules, vec![TypeId::new("com.example.Real")]);
    }
}
