//! Contribution records: one declaration opted into a scope's merge.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use crate::ids::{ScopeId, TypeId};

/// An ordered list of types whose identity is the *set* of its members.
///
/// Order is preserved for output, but two lists holding the same types in a
/// different order (or with repeats) compare, hash and sort as equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeList(Vec<TypeId>);

impl TypeList {
    pub fn new() -> Self {
        Self::default()
    }

    fn canonical(&self) -> BTreeSet<&TypeId> {
        self.0.iter().collect()
    }

    /// The members sorted by name, without repeats.
    pub fn sorted(&self) -> Self {
        self.canonical().into_iter().cloned().collect()
    }
}

impl Deref for TypeList {
    type Target = [TypeId];

    fn deref(&self) -> &[TypeId] {
        &self.0
    }
}

impl PartialEq for TypeList {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for TypeList {}

impl Hash for TypeList {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for ty in self.canonical() {
            ty.hash(state);
        }
    }
}

impl Ord for TypeList {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl PartialOrd for TypeList {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Vec<TypeId>> for TypeList {
    fn from(types: Vec<TypeId>) -> Self {
        Self(types)
    }
}

impl FromIterator<TypeId> for TypeList {
    fn from_iter<I: IntoIterator<Item = TypeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A qualifier annotation distinguishing otherwise-identical bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qualifier {
    #[serde(rename = "type")]
    pub type_id: TypeId,
    #[serde(default)]
    pub value: Option<String>,
}

impl Qualifier {
    pub fn new(type_id: impl Into<TypeId>) -> Self {
        Self {
            type_id: type_id.into(),
            value: None,
        }
    }

    pub fn with_value(type_id: impl Into<TypeId>, value: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            value: Some(value.into()),
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "@{}(\"{value}\")", self.type_id),
            None => write!(f, "@{}", self.type_id),
        }
    }
}

/// Integer priority breaking ties among competing bindings; higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub i32);

impl Rank {
    pub const NORMAL: Rank = Rank(i32::MIN);
    pub const HIGH: Rank = Rank(0);
    pub const HIGHEST: Rank = Rank(i32::MAX);
}

impl Default for Rank {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Rank::NORMAL => f.write_str("NORMAL"),
            Rank::HIGH => f.write_str("HIGH"),
            Rank::HIGHEST => f.write_str("HIGHEST"),
            Rank(n) => write!(f, "{n}"),
        }
    }
}

/// Discriminant of a [`ContributionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Supertype,
    Module,
    Binding,
    Subcomponent,
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContributionKind::Supertype => "supertype",
            ContributionKind::Module => "module",
            ContributionKind::Binding => "binding",
            ContributionKind::Subcomponent => "subcomponent",
        };
        f.write_str(s)
    }
}

/// A single-method binding of `contributed` to `bound_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingContribution {
    pub scope: ScopeId,
    pub bound_type: TypeId,
    pub contributed: TypeId,
    pub replaces: TypeList,
    pub rank: Rank,
    pub qualifier: Option<Qualifier>,
    pub ignore_qualifier: bool,
    pub multibinding: bool,
    /// The module generated to hold this binding.
    pub generated_module: TypeId,
}

impl BindingContribution {
    pub fn key(&self) -> BindingKey {
        BindingKey {
            scope: self.scope.clone(),
            bound_type: self.bound_type.clone(),
            qualifier: if self.ignore_qualifier {
                None
            } else {
                self.qualifier.clone()
            },
        }
    }
}

/// A subcomponent contributed to `parent_scope`, itself merging `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubcomponentContribution {
    pub scope: ScopeId,
    pub parent_scope: ScopeId,
    pub contributed: TypeId,
    pub replaces: TypeList,
    pub modules: TypeList,
    pub excludes: TypeList,
}

/// One contribution to a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContributionRecord {
    /// An interface added as a supertype of the merge target.
    Supertype {
        scope: ScopeId,
        contributed: TypeId,
        replaces: TypeList,
    },
    /// A DI module added to the target's module list.
    Module {
        scope: ScopeId,
        contributed: TypeId,
        replaces: TypeList,
    },
    Binding(BindingContribution),
    Subcomponent(SubcomponentContribution),
}

impl ContributionRecord {
    pub fn supertype(scope: impl Into<ScopeId>, contributed: impl Into<TypeId>) -> Self {
        ContributionRecord::Supertype {
            scope: scope.into(),
            contributed: contributed.into(),
            replaces: TypeList::new(),
        }
    }

    pub fn module(scope: impl Into<ScopeId>, contributed: impl Into<TypeId>) -> Self {
        ContributionRecord::Module {
            scope: scope.into(),
            contributed: contributed.into(),
            replaces: TypeList::new(),
        }
    }

    /// A copy whose `replaces` list is sorted and free of repeats.
    pub fn canonical(&self) -> Self {
        self.clone().replacing(self.replaces().sorted().iter().cloned())
    }

    /// Return a copy with `replaces` set to `types`.
    pub fn replacing<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeId>,
    {
        let list: TypeList = types.into_iter().map(Into::into).collect();
        match &mut self {
            ContributionRecord::Supertype { replaces, .. }
            | ContributionRecord::Module { replaces, .. } => *replaces = list,
            ContributionRecord::Binding(b) => b.replaces = list,
            ContributionRecord::Subcomponent(s) => s.replaces = list,
        }
        self
    }

    pub fn kind(&self) -> ContributionKind {
        match self {
            ContributionRecord::Supertype { .. } => ContributionKind::Supertype,
            ContributionRecord::Module { .. } => ContributionKind::Module,
            ContributionRecord::Binding(_) => ContributionKind::Binding,
            ContributionRecord::Subcomponent(_) => ContributionKind::Subcomponent,
        }
    }

    pub fn scope(&self) -> &ScopeId {
        match self {
            ContributionRecord::Supertype { scope, .. }
            | ContributionRecord::Module { scope, .. } => scope,
            ContributionRecord::Binding(b) => &b.scope,
            ContributionRecord::Subcomponent(s) => &s.scope,
        }
    }

    pub fn contributed(&self) -> &TypeId {
        match self {
            ContributionRecord::Supertype { contributed, .. }
            | ContributionRecord::Module { contributed, .. } => contributed,
            ContributionRecord::Binding(b) => &b.contributed,
            ContributionRecord::Subcomponent(s) => &s.contributed,
        }
    }

    pub fn replaces(&self) -> &TypeList {
        match self {
            ContributionRecord::Supertype { replaces, .. }
            | ContributionRecord::Module { replaces, .. } => replaces,
            ContributionRecord::Binding(b) => &b.replaces,
            ContributionRecord::Subcomponent(s) => &s.replaces,
        }
    }

    /// Module and binding contributions both end up in the module list.
    pub fn is_module_like(&self) -> bool {
        matches!(
            self,
            ContributionRecord::Module { .. } | ContributionRecord::Binding(_)
        )
    }

    /// Whether this record is identified by `ty`, either as the contributed
    /// type or, for bindings, as the generated module.
    pub fn answers_to(&self, ty: &TypeId) -> bool {
        match self {
            ContributionRecord::Binding(b) => &b.contributed == ty || &b.generated_module == ty,
            other => other.contributed() == ty,
        }
    }
}

impl fmt::Display for ContributionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributionRecord::Binding(b) => write!(
                f,
                "{} -> {} [binding, scope {}, rank {}]",
                b.contributed, b.bound_type, b.scope, b.rank
            ),
            ContributionRecord::Subcomponent(s) => write!(
                f,
                "{} [subcomponent, scope {}, parent {}]",
                s.contributed, s.scope, s.parent_scope
            ),
            other => write!(
                f,
                "{} [{}, scope {}]",
                other.contributed(),
                other.kind(),
                other.scope()
            ),
        }
    }
}

/// Identity of competing bindings: `(scope, bound type, effective qualifier)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub scope: ScopeId,
    pub bound_type: TypeId,
    pub qualifier: Option<Qualifier>,
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q} {} in {}", self.bound_type, self.scope),
            None => write!(f, "{} in {}", self.bound_type, self.scope),
        }
    }
}
