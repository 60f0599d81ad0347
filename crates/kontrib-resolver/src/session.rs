//! The explicit per-compilation context every merge runs in.

use kontrib_core::config::EngineConfig;
use kontrib_core::diagnostic::Diagnostic;
use kontrib_core::host::CompilationHost;
use kontrib_core::naming;
use kontrib_core::request::{MergeKind, MergeRequest, MergeResult};
use kontrib_hint::{markers_for, HintMarker};
use kontrib_util::errors::KontribResult;

use crate::index::ContributionIndex;
use crate::resolver::{self, Resolution};

/// One compilation session: a host, its configuration and the lazily built
/// contribution index. Drop it when the compilation ends.
///
/// `Session` is `Sync` whenever the host is, so merge requests may be
/// resolved from several threads.
pub struct Session<'h, H: ?Sized> {
    host: &'h H,
    config: EngineConfig,
    index: ContributionIndex<'h, H>,
}

impl<'h, H> Session<'h, H>
where
    H: CompilationHost + ?Sized,
{
    pub fn new(host: &'h H, config: EngineConfig) -> KontribResult<Self> {
        config.validate()?;
        Ok(Self::unchecked(host, config))
    }

    pub fn with_defaults(host: &'h H) -> Self {
        Self::unchecked(host, EngineConfig::default())
    }

    fn unchecked(host: &'h H, config: EngineConfig) -> Self {
        Self {
            host,
            index: ContributionIndex::new(host, config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &ContributionIndex<'h, H> {
        &self.index
    }

    pub fn resolve(&self, request: &MergeRequest) -> KontribResult<MergeResult> {
        Ok(self.resolve_detailed(request)?.result)
    }

    /// Resolve every request. A failing request doesn't affect the others;
    /// only a session-fatal error aborts the batch.
    pub fn resolve_all(
        &self,
        requests: &[MergeRequest],
    ) -> KontribResult<Vec<KontribResult<MergeResult>>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            match self.resolve(request) {
                Err(e) if e.is_session_fatal() => return Err(e),
                outcome => results.push(outcome),
            }
        }
        Ok(results)
    }

    /// Requests for the subcomponents generated into `request`'s target.
    pub fn subcomponent_requests(&self, request: &MergeRequest) -> KontribResult<Vec<MergeRequest>> {
        let resolution = self.resolve_detailed(request)?;
        Ok(resolution
            .subcomponents
            .iter()
            .map(|s| {
                MergeRequest::builder(naming::generated_subcomponent(&s.contributed, request.target()))
                    .kind(MergeKind::Subcomponent)
                    .scope(s.scope.clone())
                    .modules(s.modules.iter().cloned())
                    .excludes(s.excludes.iter().cloned())
                    .build()
            })
            .collect())
    }

    /// Render every candidate of `request` and what happened to it.
    pub fn explain(&self, request: &MergeRequest) -> KontribResult<String> {
        Ok(self.resolve_detailed(request)?.graph.print_tree())
    }

    /// Markers the generator emits for this unit's own contributions.
    pub fn hint_markers(&self) -> KontribResult<Vec<HintMarker>> {
        markers_for(self.index.local_records()?, &self.config.hint_namespace)
    }

    /// Warnings about hints dropped while building the index.
    pub fn diagnostics(&self) -> KontribResult<Vec<Diagnostic>> {
        Ok(self.index.diagnostics()?.to_vec())
    }

    fn resolve_detailed(&self, request: &MergeRequest) -> KontribResult<Resolution> {
        resolver::resolve(&self.index, self.host, &self.config, request)
    }
}
