//! Session-scoped index of every contribution visible to the current unit.
//!
//! The index is built lazily on the first query: local declarations are
//! converted through the host, and every dependency's hint namespace is
//! listed and decoded. Per-scope lists are memoized so repeated lookups
//! share one allocation.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use kontrib_core::config::EngineConfig;
use kontrib_core::diagnostic::Diagnostic;
use kontrib_core::host::CompilationHost;
use kontrib_core::ids::{ScopeId, TypeId};
use kontrib_core::record::ContributionRecord;
use kontrib_hint::decode_arguments;
use kontrib_util::errors::{KontribError, KontribResult};

/// Result of the one full scan.
#[derive(Debug, Default)]
struct Scan {
    /// Deduplicated and sorted.
    records: Vec<ContributionRecord>,
    /// Records declared in the current unit, deduplicated and sorted.
    local: Vec<ContributionRecord>,
    /// How often each collapsed record was seen, for records seen twice or more.
    duplicates: BTreeMap<ContributionRecord, usize>,
    diagnostics: Vec<Diagnostic>,
    /// Local declarations that failed to convert, by declaring scope.
    rejected: BTreeMap<ScopeId, Vec<Rejected>>,
}

#[derive(Debug)]
struct Rejected {
    type_name: String,
    message: String,
}

pub struct ContributionIndex<'h, H: ?Sized> {
    host: &'h H,
    config: EngineConfig,
    scan: OnceLock<Scan>,
    scopes: DashMap<ScopeId, Arc<[ContributionRecord]>>,
    parent_scopes: DashMap<ScopeId, Arc<[ContributionRecord]>>,
}

impl<'h, H> ContributionIndex<'h, H>
where
    H: CompilationHost + ?Sized,
{
    pub fn new(host: &'h H, config: EngineConfig) -> Self {
        Self {
            host,
            config,
            scan: OnceLock::new(),
            scopes: DashMap::new(),
            parent_scopes: DashMap::new(),
        }
    }

    /// All records whose `scope` is `scope`, sorted.
    pub fn for_scope(&self, scope: &ScopeId) -> KontribResult<Arc<[ContributionRecord]>> {
        if let Some(hit) = self.scopes.get(scope) {
            tracing::trace!("Scope {scope} served from memo");
            return Ok(Arc::clone(hit.value()));
        }
        let computed: Arc<[ContributionRecord]> = self
            .scan()?
            .records
            .iter()
            .filter(|r| r.scope() == scope)
            .cloned()
            .collect();
        let entry = self.scopes.entry(scope.clone()).or_insert(computed);
        Ok(Arc::clone(entry.value()))
    }

    /// Subcomponent records contributed to `parent`, sorted.
    pub fn for_parent_scope(&self, parent: &ScopeId) -> KontribResult<Arc<[ContributionRecord]>> {
        if let Some(hit) = self.parent_scopes.get(parent) {
            tracing::trace!("Parent scope {parent} served from memo");
            return Ok(Arc::clone(hit.value()));
        }
        let computed: Arc<[ContributionRecord]> = self
            .scan()?
            .records
            .iter()
            .filter(|r| matches!(r, ContributionRecord::Subcomponent(s) if &s.parent_scope == parent))
            .cloned()
            .collect();
        let entry = self.parent_scopes.entry(parent.clone()).or_insert(computed);
        Ok(Arc::clone(entry.value()))
    }

    /// Every record identified by `ty`, in any scope.
    pub fn contributions_of(&self, ty: &TypeId) -> KontribResult<Vec<ContributionRecord>> {
        Ok(self
            .scan()?
            .records
            .iter()
            .filter(|r| r.answers_to(ty))
            .cloned()
            .collect())
    }

    pub fn local_records(&self) -> KontribResult<&[ContributionRecord]> {
        Ok(&self.scan()?.local)
    }

    /// Number of times `record` was discovered; 0 if it wasn't.
    pub fn discovery_count(&self, record: &ContributionRecord) -> KontribResult<usize> {
        let scan = self.scan()?;
        if let Some(count) = scan.duplicates.get(record) {
            return Ok(*count);
        }
        Ok(usize::from(scan.records.binary_search(record).is_ok()))
    }

    /// Fails with the first local declaration in `scope` that could not be
    /// converted. Other scopes are unaffected by it.
    pub fn check_declarations(&self, scope: &ScopeId) -> KontribResult<()> {
        match self.scan()?.rejected.get(scope).and_then(|r| r.first()) {
            Some(rejected) => Err(KontribError::Declaration {
                type_name: rejected.type_name.clone(),
                message: rejected.message.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Warnings produced while scanning, sorted by message.
    pub fn diagnostics(&self) -> KontribResult<&[Diagnostic]> {
        Ok(&self.scan()?.diagnostics)
    }

    fn scan(&self) -> KontribResult<&Scan> {
        if let Some(scan) = self.scan.get() {
            return Ok(scan);
        }
        let computed = self.build()?;
        Ok(self.scan.get_or_init(|| computed))
    }

    fn build(&self) -> KontribResult<Scan> {
        let mut local = Vec::new();
        let mut rejected: BTreeMap<ScopeId, Vec<Rejected>> = BTreeMap::new();
        for contribution in self.host.local_contributions()? {
            let scope = contribution.scope.clone();
            match contribution.into_record(self.host) {
                Ok(record) => local.push(record),
                Err(KontribError::Declaration { type_name, message }) => {
                    tracing::debug!("Rejected local contribution {type_name} in {scope}: {message}");
                    rejected
                        .entry(scope)
                        .or_default()
                        .push(Rejected { type_name, message });
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!("Found {} local contributions", local.len());

        let mut discovered = local.clone();
        let mut diagnostics = Vec::new();
        let namespace = self.config.hint_namespace.as_str();
        for dependency in self.host.dependencies()? {
            let before = discovered.len();
            for name in self.host.hint_names(&dependency, namespace)? {
                let arguments = self.host.hint_arguments(&dependency, namespace, &name)?;
                for decoded in decode_arguments(&arguments) {
                    match decoded {
                        Ok(record) => discovered.push(record),
                        Err(e) if self.config.fail_fast => return Err(e),
                        Err(e) => {
                            tracing::warn!("Dropping hint {namespace}.{name} from {dependency}: {e}");
                            diagnostics.push(Diagnostic::warning(
                                Diagnostic::MALFORMED_HINT,
                                format!("Dropped hint {namespace}.{name} from {dependency}: {e}"),
                            ));
                        }
                    }
                }
            }
            tracing::debug!(
                "Decoded {} hints from {dependency}",
                discovered.len() - before
            );
        }

        let mut counts: BTreeMap<ContributionRecord, usize> = BTreeMap::new();
        for record in discovered {
            *counts.entry(record).or_default() += 1;
        }
        let duplicates = counts
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(r, n)| (r.clone(), *n))
            .collect();
        let records: Vec<ContributionRecord> = counts.into_keys().collect();

        local.sort();
        local.dedup();
        diagnostics.sort_by(|a: &Diagnostic, b: &Diagnostic| a.message.cmp(&b.message));

        tracing::debug!("Contribution index holds {} records", records.len());
        Ok(Scan {
            records,
            local,
            duplicates,
            diagnostics,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontrib_core::host::{HintArguments, InMemoryHost};

    fn module_marker(tokens: &[&str]) -> HintArguments {
        HintArguments {
            hints: tokens.iter().map(|t| t.to_string()).collect(),
            details: Vec::new(),
        }
    }

    #[test]
    fn scope_lists_are_memoized() {
        let host = InMemoryHost::new().hint_marker(
            "lib-a",
            "kontrib.hint",
            "NetworkModule_0",
            module_marker(&["AppScope|com.example.NetworkModule"]),
        );
        let index = ContributionIndex::new(&host, EngineConfig::default());
        let first = index.for_scope(&ScopeId::new("AppScope")).unwrap();
        let second = index.for_scope(&ScopeId::new("AppScope")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 1);
        assert_eq!(host.hint_scans(), 1);
    }

    #[test]
    fn duplicates_collapse() {
        let host = InMemoryHost::new()
            .hint_marker("lib-a", "kontrib.hint", "M", module_marker(&["AppScope|com.example.M"]))
            .hint_marker("lib-b", "kontrib.hint", "M", module_marker(&["AppScope|com.example.M"]));
        let index = ContributionIndex::new(&host, EngineConfig::default());
        let records = index.for_scope(&ScopeId::new("AppScope")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(index.discovery_count(&records[0]).unwrap(), 2);
    }

    #[test]
    fn unknown_scope_is_empty() {
        let host = InMemoryHost::new();
        let index = ContributionIndex::new(&host, EngineConfig::default());
        assert!(index.for_scope(&ScopeId::new("Nothing")).unwrap().is_empty());
        assert!(index.diagnostics().unwrap().is_empty());
    }
}
