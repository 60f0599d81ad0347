//! Merge requests and the results the downstream generator consumes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use kontrib_util::hash::sha256_bytes;

use crate::diagnostic::Diagnostic;
use crate::ids::{ScopeId, TypeId};

/// Which merge annotation produced a request, and therefore which outputs it wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeKind {
    /// A component: merges supertypes and modules.
    #[default]
    Component,
    /// A subcomponent: merges supertypes and modules.
    Subcomponent,
    /// A module aggregating other modules.
    Modules,
    /// A plain interface aggregating other interfaces.
    Interfaces,
}

impl MergeKind {
    pub fn merges_supertypes(self) -> bool {
        !matches!(self, MergeKind::Modules)
    }

    pub fn merges_modules(self) -> bool {
        !matches!(self, MergeKind::Interfaces)
    }

    /// Targets that receive merged supertypes must themselves be interfaces.
    pub fn requires_interface_target(self) -> bool {
        self.merges_supertypes()
    }
}

/// One merge-annotated declaration asking for the union of its scopes'
/// contributions. Immutable once built; see [`MergeRequestBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    target: TypeId,
    kind: MergeKind,
    scopes: BTreeSet<ScopeId>,
    explicit_modules: Vec<TypeId>,
    explicit_dependencies: Vec<TypeId>,
    explicit_excludes: Vec<TypeId>,
}

impl MergeRequest {
    pub fn builder(target: impl Into<TypeId>) -> MergeRequestBuilder {
        MergeRequestBuilder::new(target)
    }

    pub fn target(&self) -> &TypeId {
        &self.target
    }

    pub fn kind(&self) -> MergeKind {
        self.kind
    }

    pub fn scopes(&self) -> &BTreeSet<ScopeId> {
        &self.scopes
    }

    pub fn explicit_modules(&self) -> &[TypeId] {
        &self.explicit_modules
    }

    pub fn explicit_dependencies(&self) -> &[TypeId] {
        &self.explicit_dependencies
    }

    pub fn explicit_excludes(&self) -> &[TypeId] {
        &self.explicit_excludes
    }
}

/// Fluent builder for [`MergeRequest`].
#[derive(Debug, Clone)]
pub struct MergeRequestBuilder {
    target: TypeId,
    kind: MergeKind,
    scopes: BTreeSet<ScopeId>,
    modules: Vec<TypeId>,
    dependencies: Vec<TypeId>,
    excludes: Vec<TypeId>,
}

impl MergeRequestBuilder {
    pub fn new(target: impl Into<TypeId>) -> Self {
        Self {
            target: target.into(),
            kind: MergeKind::default(),
            scopes: BTreeSet::new(),
            modules: Vec::new(),
            dependencies: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: MergeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn scope(mut self, scope: impl Into<ScopeId>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    pub fn scopes(mut self, scopes: impl IntoIterator<Item = impl Into<ScopeId>>) -> Self {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn module(mut self, module: impl Into<TypeId>) -> Self {
        self.modules.push(module.into());
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = impl Into<TypeId>>) -> Self {
        self.modules.extend(modules.into_iter().map(Into::into));
        self
    }

    pub fn dependency(mut self, dependency: impl Into<TypeId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn exclude(mut self, excluded: impl Into<TypeId>) -> Self {
        self.excludes.push(excluded.into());
        self
    }

    pub fn excludes(mut self, excluded: impl IntoIterator<Item = impl Into<TypeId>>) -> Self {
        self.excludes.extend(excluded.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> MergeRequest {
        MergeRequest {
            target: self.target,
            kind: self.kind,
            scopes: self.scopes,
            explicit_modules: self.modules,
            explicit_dependencies: self.dependencies,
            explicit_excludes: self.excludes,
        }
    }
}

/// The resolved contributions for one [`MergeRequest`].
///
/// `final_supertypes` and `final_modules` are deduplicated and sorted by
/// canonical name. `final_dependencies` keeps request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub final_supertypes: Vec<TypeId>,
    pub final_modules: Vec<TypeId>,
    #[serde(default)]
    pub final_dependencies: Vec<TypeId>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeResult {
    pub fn new(
        supertypes: impl IntoIterator<Item = TypeId>,
        modules: impl IntoIterator<Item = TypeId>,
        dependencies: &[TypeId],
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let final_supertypes: BTreeSet<TypeId> = supertypes.into_iter().collect();
        let final_modules: BTreeSet<TypeId> = modules.into_iter().collect();
        let mut seen = HashSet::new();
        let final_dependencies = dependencies
            .iter()
            .filter(|d| seen.insert(*d))
            .cloned()
            .collect();
        Self {
            final_supertypes: final_supertypes.into_iter().collect(),
            final_modules: final_modules.into_iter().collect(),
            final_dependencies,
            diagnostics,
        }
    }

    pub fn has_supertype(&self, ty: &str) -> bool {
        self.final_supertypes.iter().any(|t| t.as_str() == ty)
    }

    pub fn has_module(&self, ty: &str) -> bool {
        self.final_modules.iter().any(|t| t.as_str() == ty)
    }

    /// SHA-256 over the canonical rendering of the merged declarations.
    ///
    /// Diagnostics are not part of the fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut canonical = String::new();
        for (label, types) in [
            ("supertype", &self.final_supertypes),
            ("module", &self.final_modules),
            ("dependency", &self.final_dependencies),
        ] {
            for ty in types {
                canonical.push_str(label);
                canonical.push(' ');
                canonical.push_str(ty.as_str());
                canonical.push('\n');
            }
        }
        sha256_bytes(canonical.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_scopes_as_set() {
        let request = MergeRequest::builder("com.example.AppComponent")
            .scope("com.example.AppScope")
            .scope("com.example.AppScope")
            .scope("com.example.UserScope")
            .build();
        assert_eq!(request.scopes().len(), 2);
        assert_eq!(request.kind(), MergeKind::Component);
    }

    #[test]
    fn merge_kind_outputs() {
        assert!(MergeKind::Component.merges_supertypes());
        assert!(MergeKind::Component.merges_modules());
        assert!(!MergeKind::Modules.merges_supertypes());
        assert!(!MergeKind::Modules.requires_interface_target());
        assert!(!MergeKind::Interfaces.merges_modules());
        assert!(MergeKind::Interfaces.requires_interface_target());
    }

    #[test]
    fn result_sorts_and_dedups() {
        let result = MergeResult::new(
            [TypeId::new("b.Y"), TypeId::new("a.X"), TypeId::new("b.Y")],
            [TypeId::new("m.Two"), TypeId::new("m.One")],
            &[TypeId::new("d.Z"), TypeId::new("d.A"), TypeId::new("d.Z")],
            Vec::new(),
        );
        let supertypes: Vec<&str> = result.final_supertypes.iter().map(TypeId::as_str).collect();
        assert_eq!(supertypes, ["a.X", "b.Y"]);
        let modules: Vec<&str> = result.final_modules.iter().map(TypeId::as_str).collect();
        assert_eq!(modules, ["m.One", "m.Two"]);
        let deps: Vec<&str> = result.final_dependencies.iter().map(TypeId::as_str).collect();
        assert_eq!(deps, ["d.Z", "d.A"]);
    }

    #[test]
    fn fingerprint_ignores_diagnostics() {
        let plain = MergeResult::new([TypeId::new("a.X")], Vec::new(), &[], Vec::new());
        let noted = MergeResult::new(
            [TypeId::new("a.X")],
            Vec::new(),
            &[],
            vec![Diagnostic::note(Diagnostic::BINDING_OVERRIDDEN, "lost")],
        );
        assert_eq!(plain.fingerprint(), noted.fingerprint());
        assert_eq!(plain.fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_distinguishes_lists() {
        let as_supertype = MergeResult::new([TypeId::new("a.X")], Vec::new(), &[], Vec::new());
        let as_module = MergeResult::new(Vec::new(), [TypeId::new("a.X")], &[], Vec::new());
        assert_ne!(as_supertype.fingerprint(), as_module.fingerprint());
    }
}
