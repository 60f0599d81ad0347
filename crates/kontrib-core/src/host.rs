//! The capability interface a host compiler implements.
//!
//! The resolver never sees the host's declaration model. Whether a type
//! comes from source or from an already compiled binary, the host answers the
//! same handful of questions through [`CompilationHost`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use kontrib_util::errors::{KontribError, KontribResult};

use crate::ids::{ScopeId, TypeId};
use crate::naming;
use crate::record::{
    BindingContribution, ContributionKind, ContributionRecord, Qualifier, Rank,
    SubcomponentContribution, TypeList,
};

/// Opaque handle for one transitive binary dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(pub String);

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DependencyId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Annotation arguments of one hint marker declaration.
///
/// `details[i]` is the out-of-band detail for `hints[i]`; producers that
/// only emit module hints leave `details` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintArguments {
    pub hints: Vec<String>,
    pub details: Vec<String>,
}

/// Arguments of a contribution annotation as the host extracted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributionArgs {
    pub replaces: Vec<TypeId>,
    pub bound_type: Option<TypeId>,
    pub rank: Option<Rank>,
    pub qualifier: Option<Qualifier>,
    pub ignore_qualifier: bool,
    pub multibinding: bool,
    pub generated_module: Option<TypeId>,
    pub parent_scope: Option<ScopeId>,
    pub modules: Vec<TypeId>,
    pub excludes: Vec<TypeId>,
}

/// A contribution annotation declared in the current compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalContribution {
    pub kind: ContributionKind,
    pub scope: ScopeId,
    pub contributed: TypeId,
    pub args: ContributionArgs,
}

impl LocalContribution {
    pub fn new(
        kind: ContributionKind,
        scope: impl Into<ScopeId>,
        contributed: impl Into<TypeId>,
    ) -> Self {
        Self {
            kind,
            scope: scope.into(),
            contributed: contributed.into(),
            args: ContributionArgs::default(),
        }
    }

    pub fn with_args(mut self, args: ContributionArgs) -> Self {
        self.args = args;
        self
    }

    /// Convert the raw annotation into a record.
    ///
    /// A binding without an explicit bound type binds the single declared
    /// supertype of the contributed class. An annotation that can't be
    /// converted is a `Declaration` error; host failures pass through.
    pub fn into_record<H>(self, host: &H) -> KontribResult<ContributionRecord>
    where
        H: CompilationHost + ?Sized,
    {
        let LocalContribution {
            kind,
            scope,
            contributed,
            args,
        } = self;
        let replaces: TypeList = args.replaces.into_iter().collect();
        let record = match kind {
            ContributionKind::Supertype => ContributionRecord::Supertype {
                scope,
                contributed,
                replaces,
            },
            ContributionKind::Module => ContributionRecord::Module {
                scope,
                contributed,
                replaces,
            },
            ContributionKind::Binding => {
                let bound_type = match args.bound_type {
                    Some(bound) => bound,
                    None => infer_bound_type(host, &contributed)?,
                };
                let generated_module = args.generated_module.unwrap_or_else(|| {
                    naming::binding_module(&contributed, &scope, args.multibinding)
                });
                ContributionRecord::Binding(BindingContribution {
                    scope,
                    bound_type,
                    contributed,
                    replaces,
                    rank: args.rank.unwrap_or_default(),
                    qualifier: args.qualifier,
                    ignore_qualifier: args.ignore_qualifier,
                    multibinding: args.multibinding,
                    generated_module,
                })
            }
            ContributionKind::Subcomponent => {
                let parent_scope = args.parent_scope.ok_or_else(|| KontribError::Declaration {
                    type_name: contributed.to_string(),
                    message: format!("{contributed} is a contributed subcomponent without a parent scope"),
                })?;
                ContributionRecord::Subcomponent(SubcomponentContribution {
                    scope,
                    parent_scope,
                    contributed,
                    replaces,
                    modules: args.modules.into_iter().collect(),
                    excludes: args.excludes.into_iter().collect(),
                })
            }
        };
        Ok(record)
    }
}

fn infer_bound_type<H>(host: &H, contributed: &TypeId) -> KontribResult<TypeId>
where
    H: CompilationHost + ?Sized,
{
    let mut supertypes = host.supertypes(contributed)?;
    match supertypes.len() {
        1 => Ok(supertypes.remove(0)),
        0 => Err(KontribError::Declaration {
            type_name: contributed.to_string(),
            message: format!(
                "{contributed} contributes a binding, but does not specify the bound type. \
                 This is only allowed with exactly one direct super type; there are none."
            ),
        }),
        n => Err(KontribError::Declaration {
            type_name: contributed.to_string(),
            message: format!(
                "{contributed} contributes a binding, but does not specify the bound type. \
                 This is only allowed with exactly one direct super type; there are {n}."
            ),
        }),
    }
}

/// Everything the engine needs from the host compiler.
///
/// Errors returned from these methods mean the host state is unusable and
/// are propagated without recovery.
pub trait CompilationHost {
    /// Contribution annotations declared in the current unit.
    fn local_contributions(&self) -> KontribResult<Vec<LocalContribution>>;

    /// All transitive binary dependencies of the current unit.
    fn dependencies(&self) -> KontribResult<Vec<DependencyId>>;

    /// Top-level names present in `namespace` inside `dependency`.
    fn hint_names(&self, dependency: &DependencyId, namespace: &str) -> KontribResult<Vec<String>>;

    /// Annotation arguments of the marker `namespace.name` inside `dependency`.
    fn hint_arguments(
        &self,
        dependency: &DependencyId,
        namespace: &str,
        name: &str,
    ) -> KontribResult<HintArguments>;

    /// Whether `ty` is an interface or abstract type.
    fn is_interface(&self, ty: &TypeId) -> KontribResult<bool>;

    /// Direct declared supertypes of `ty`.
    fn supertypes(&self, ty: &TypeId) -> KontribResult<Vec<TypeId>>;
}

#[derive(Debug, Clone, Default)]
struct TypeShape {
    interface: bool,
    supertypes: Vec<TypeId>,
}

#[derive(Debug, Clone)]
struct HintMarkerEntry {
    namespace: String,
    name: String,
    arguments: HintArguments,
}

/// A [`CompilationHost`] backed by plain collections.
///
/// Types that were never declared are treated as interfaces without
/// supertypes.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    locals: Vec<LocalContribution>,
    dependencies: Vec<(DependencyId, Vec<HintMarkerEntry>)>,
    types: HashMap<TypeId, TypeShape>,
    failure: Option<String>,
    hint_scans: AtomicUsize,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(mut self, contribution: LocalContribution) -> Self {
        self.locals.push(contribution);
        self
    }

    pub fn dependency(mut self, dependency: impl Into<DependencyId>) -> Self {
        let id = dependency.into();
        if !self.dependencies.iter().any(|(d, _)| d == &id) {
            self.dependencies.push((id, Vec::new()));
        }
        self
    }

    /// Add a marker to `dependency`, registering the dependency if needed.
    pub fn hint_marker(
        mut self,
        dependency: impl Into<DependencyId>,
        namespace: &str,
        name: &str,
        arguments: HintArguments,
    ) -> Self {
        let id = dependency.into();
        let entry = HintMarkerEntry {
            namespace: namespace.to_string(),
            name: name.to_string(),
            arguments,
        };
        match self.dependencies.iter_mut().find(|(d, _)| d == &id) {
            Some((_, markers)) => markers.push(entry),
            None => self.dependencies.push((id, vec![entry])),
        }
        self
    }

    pub fn interface(mut self, ty: &str, supertypes: &[&str]) -> Self {
        self.types.insert(
            TypeId::new(ty),
            TypeShape {
                interface: true,
                supertypes: supertypes.iter().map(|s| TypeId::new(s)).collect(),
            },
        );
        self
    }

    pub fn class(mut self, ty: &str, supertypes: &[&str]) -> Self {
        self.types.insert(
            TypeId::new(ty),
            TypeShape {
                interface: false,
                supertypes: supertypes.iter().map(|s| TypeId::new(s)).collect(),
            },
        );
        self
    }

    /// Make every subsequent host call fail with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Reverse the dependency scan order.
    pub fn reverse_dependencies(mut self) -> Self {
        self.dependencies.reverse();
        self
    }

    /// How many times a dependency's hint namespace has been listed.
    pub fn hint_scans(&self) -> usize {
        self.hint_scans.load(Ordering::SeqCst)
    }

    fn check(&self) -> KontribResult<()> {
        match &self.failure {
            Some(message) => Err(KontribError::Host {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn markers(&self, dependency: &DependencyId) -> KontribResult<&[HintMarkerEntry]> {
        self.dependencies
            .iter()
            .find(|(d, _)| d == dependency)
            .map(|(_, markers)| markers.as_slice())
            .ok_or_else(|| KontribError::Host {
                message: format!("Unknown dependency {dependency}"),
            })
    }
}

impl CompilationHost for InMemoryHost {
    fn local_contributions(&self) -> KontribResult<Vec<LocalContribution>> {
        self.check()?;
        Ok(self.locals.clone())
    }

    fn dependencies(&self) -> KontribResult<Vec<DependencyId>> {
        self.check()?;
        Ok(self.dependencies.iter().map(|(d, _)| d.clone()).collect())
    }

    fn hint_names(&self, dependency: &DependencyId, namespace: &str) -> KontribResult<Vec<String>> {
        self.check()?;
        self.hint_scans.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .markers(dependency)?
            .iter()
            .filter(|m| m.namespace == namespace)
            .map(|m| m.name.clone())
            .collect())
    }

    fn hint_arguments(
        &self,
        dependency: &DependencyId,
        namespace: &str,
        name: &str,
    ) -> KontribResult<HintArguments> {
        self.check()?;
        self.markers(dependency)?
            .iter()
            .find(|m| m.namespace == namespace && m.name == name)
            .map(|m| m.arguments.clone())
            .ok_or_else(|| KontribError::Host {
                message: format!("No marker {namespace}.{name} in {dependency}"),
            })
    }

    fn is_interface(&self, ty: &TypeId) -> KontribResult<bool> {
        self.check()?;
        Ok(self.types.get(ty).map(|t| t.interface).unwrap_or(true))
    }

    fn supertypes(&self, ty: &TypeId) -> KontribResult<Vec<TypeId>> {
        self.check()?;
        Ok(self
            .types
            .get(ty)
            .map(|t| t.supertypes.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_infers_single_supertype() {
        let host = InMemoryHost::new().class("com.example.ConsoleLogger", &["com.example.Logger"]);
        let record = LocalContribution::new(
            ContributionKind::Binding,
            "com.example.AppScope",
            "com.example.ConsoleLogger",
        )
        .into_record(&host)
        .unwrap();
        match record {
            ContributionRecord::Binding(b) => {
                assert_eq!(b.bound_type.as_str(), "com.example.Logger");
                assert_eq!(b.rank, Rank::NORMAL);
                assert_eq!(
                    b.generated_module.as_str(),
                    "com.example.ConsoleLogger_AppScope_BindingModule"
                );
            }
            other => panic!("expected binding, got {other:?}"),
        }
    }

    #[test]
    fn binding_without_supertype_is_rejected() {
        let host = InMemoryHost::new().class("com.example.Orphan", &[]);
        let err = LocalContribution::new(ContributionKind::Binding, "AppScope", "com.example.Orphan")
            .into_record(&host)
            .unwrap_err();
        assert!(err.to_string().contains("there are none"), "got: {err}");
        assert!(matches!(err, KontribError::Declaration { .. }));
        assert!(!err.is_session_fatal());
    }

    #[test]
    fn binding_with_many_supertypes_is_rejected() {
        let host = InMemoryHost::new().class("com.example.Both", &["A", "B"]);
        let err = LocalContribution::new(ContributionKind::Binding, "AppScope", "com.example.Both")
            .into_record(&host)
            .unwrap_err();
        assert!(err.to_string().contains("there are 2"), "got: {err}");
    }

    #[test]
    fn subcomponent_requires_parent_scope() {
        let host = InMemoryHost::new();
        let err = LocalContribution::new(ContributionKind::Subcomponent, "LoginScope", "Login")
            .into_record(&host)
            .unwrap_err();
        assert!(matches!(err, KontribError::Declaration { .. }));
    }

    #[test]
    fn failing_host_reports_host_errors() {
        let host = InMemoryHost::new().failing("symbol table gone");
        let err = host.dependencies().unwrap_err();
        assert!(err.is_session_fatal());
    }

    #[test]
    fn hint_names_filter_by_namespace() {
        let host = InMemoryHost::new()
            .hint_marker("lib-a", "kontrib.hint", "One", HintArguments::default())
            .hint_marker("lib-a", "other.ns", "Two", HintArguments::default());
        let names = host
            .hint_names(&DependencyId::from("lib-a"), "kontrib.hint")
            .unwrap();
        assert_eq!(names, vec!["One".to_string()]);
        assert_eq!(host.hint_scans(), 1);
    }
}
