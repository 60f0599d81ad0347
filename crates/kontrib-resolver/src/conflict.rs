//! Binding conflict resolution and override reporting.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kontrib_core::ids::TypeId;
use kontrib_core::record::{BindingContribution, BindingKey, Rank};
use kontrib_util::errors::{KontribError, KontribResult};

/// A binding that lost its key to a higher rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOverride {
    pub key: BindingKey,
    pub winner: TypeId,
    pub winner_rank: Rank,
    pub loser: TypeId,
    pub loser_rank: Rank,
}

impl fmt::Display for BindingOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (rank {}) overrides {} (rank {})",
            self.key, self.winner, self.winner_rank, self.loser, self.loser_rank
        )
    }
}

/// The surviving bindings of one merge.
#[derive(Debug, Default)]
pub struct BindingResolution {
    /// One winner per scalar binding key, ordered by key.
    pub winners: Vec<BindingContribution>,
    /// Every multibinding, ordered by key and then by record.
    pub multibindings: Vec<BindingContribution>,
    /// Scalar bindings that silently lost to a higher rank.
    pub overrides: Vec<BindingOverride>,
}

impl BindingResolution {
    /// Generated modules of every surviving binding, deduplicated and sorted.
    pub fn modules(&self) -> Vec<TypeId> {
        let modules: BTreeSet<&TypeId> = self
            .winners
            .iter()
            .chain(&self.multibindings)
            .map(|b| &b.generated_module)
            .collect();
        modules.into_iter().cloned().collect()
    }
}

/// Pick one winner per binding key.
///
/// Multibindings are grouped apart from scalar bindings of the same key and
/// are all kept. Among scalar bindings the highest rank wins; a tie between
/// different classes at that rank is an error.
pub fn resolve_bindings<'a, I>(bindings: I) -> KontribResult<BindingResolution>
where
    I: IntoIterator<Item = &'a BindingContribution>,
{
    let mut groups: BTreeMap<(BindingKey, bool), Vec<&BindingContribution>> = BTreeMap::new();
    for binding in bindings {
        groups
            .entry((binding.key(), binding.multibinding))
            .or_default()
            .push(binding);
    }

    let mut resolution = BindingResolution::default();
    for ((key, multibinding), mut group) in groups {
        group.sort();
        if multibinding {
            resolution
                .multibindings
                .extend(group.into_iter().cloned());
            continue;
        }

        let Some(top_rank) = group.iter().map(|b| b.rank).max() else {
            continue;
        };
        let top: Vec<&BindingContribution> =
            group.iter().copied().filter(|b| b.rank == top_rank).collect();
        let tied: BTreeSet<&TypeId> = top.iter().map(|b| &b.contributed).collect();
        if tied.len() > 1 {
            return Err(KontribError::AmbiguousBinding {
                scope: key.scope.to_string(),
                bound_type: key.bound_type.to_string(),
                qualifier: key.qualifier.as_ref().map(ToString::to_string),
                rank: top_rank.to_string(),
                contributors: tied.into_iter().map(ToString::to_string).collect(),
            });
        }

        let winner = top[0];
        for loser in group.iter().filter(|b| b.contributed != winner.contributed) {
            tracing::debug!(
                "{} (rank {}) overrides {} (rank {}) for {key}",
                winner.contributed,
                winner.rank,
                loser.contributed,
                loser.rank
            );
            resolution.overrides.push(BindingOverride {
                key: key.clone(),
                winner: winner.contributed.clone(),
                winner_rank: winner.rank,
                loser: loser.contributed.clone(),
                loser_rank: loser.rank,
            });
        }
        resolution.winners.push(winner.clone());
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontrib_core::ids::ScopeId;
    use kontrib_core::record::{Qualifier, TypeList};

    fn binding(contributed: &str, rank: Rank) -> BindingContribution {
        BindingContribution {
            scope: ScopeId::new("AppScope"),
            bound_type: TypeId::new("Logger"),
            contributed: TypeId::new(contributed),
            replaces: TypeList::new(),
            rank,
            qualifier: None,
            ignore_qualifier: false,
            multibinding: false,
            generated_module: TypeId::new(format!("{contributed}_GeneratedModule")),
        }
    }

    #[test]
    fn single_binding_wins() {
        let bindings = [binding("ConsoleLogger", Rank::HIGH)];
        let resolution = resolve_bindings(&bindings).unwrap();
        assert_eq!(resolution.modules(), vec![TypeId::new("ConsoleLogger_GeneratedModule")]);
        assert!(resolution.overrides.is_empty());
    }

    #[test]
    fn higher_rank_wins_and_is_reported() {
        let bindings = [binding("ConsoleLogger", Rank(0)), binding("FileLogger", Rank(1))];
        let resolution = resolve_bindings(&bindings).unwrap();
        assert_eq!(resolution.modules(), vec![TypeId::new("FileLogger_GeneratedModule")]);
        assert_eq!(resolution.overrides.len(), 1);
        let s = resolution.overrides[0].to_string();
        assert!(s.contains("FileLogger (rank 1) overrides ConsoleLogger (rank HIGH)"), "got: {s}");
    }

    #[test]
    fn tie_at_top_rank_is_ambiguous() {
        let bindings = [
            binding("FileLogger", Rank(1)),
            binding("ConsoleLogger", Rank(1)),
            binding("NullLogger", Rank::NORMAL),
        ];
        let err = resolve_bindings(&bindings).unwrap_err();
        let KontribError::AmbiguousBinding { contributors, rank, .. } = err else {
            panic!("expected an ambiguous binding error");
        };
        assert_eq!(contributors, vec!["ConsoleLogger".to_string(), "FileLogger".to_string()]);
        assert_eq!(rank, "1");
    }

    #[test]
    fn same_class_twice_is_not_a_tie() {
        let mut other_module = binding("ConsoleLogger", Rank::NORMAL);
        other_module.generated_module = TypeId::new("Other_GeneratedModule");
        let bindings = [binding("ConsoleLogger", Rank::NORMAL), other_module];
        let resolution = resolve_bindings(&bindings).unwrap();
        assert_eq!(resolution.winners.len(), 1);
        assert!(resolution.overrides.is_empty());
    }

    #[test]
    fn qualifiers_split_keys() {
        let mut io = binding("FileLogger", Rank::NORMAL);
        io.qualifier = Some(Qualifier::with_value("javax.inject.Named", "io"));
        let bindings = [binding("ConsoleLogger", Rank::NORMAL), io];
        let resolution = resolve_bindings(&bindings).unwrap();
        assert_eq!(resolution.winners.len(), 2);
    }

    #[test]
    fn multibindings_are_all_kept() {
        let mut a = binding("ConsoleLogger", Rank::NORMAL);
        a.multibinding = true;
        let mut b = binding("FileLogger", Rank::NORMAL);
        b.multibinding = true;
        let scalar = binding("NullLogger", Rank::NORMAL);
        let bindings = [a, b, scalar];
        let resolution = resolve_bindings(&bindings).unwrap();
        assert_eq!(resolution.multibindings.len(), 2);
        assert_eq!(resolution.winners.len(), 1);
        assert_eq!(resolution.modules().len(), 3);
    }
}
