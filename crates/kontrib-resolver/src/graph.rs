//! Candidate graph of one merge: which record replaced, excluded or
//! overrode which.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use kontrib_core::ids::TypeId;
use kontrib_core::record::ContributionRecord;

/// What happened to a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fate {
    Kept,
    Excluded,
    /// Replaced by the listed contributed types, sorted.
    Replaced { by: Vec<TypeId> },
    Overridden { by: TypeId },
}

impl fmt::Display for Fate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fate::Kept => f.write_str("kept"),
            Fate::Excluded => f.write_str("excluded"),
            Fate::Replaced { by } => {
                let names: Vec<&str> = by.iter().map(TypeId::as_str).collect();
                write!(f, "replaced by {}", names.join(", "))
            }
            Fate::Overridden { by } => write!(f, "lost to binding {by}"),
        }
    }
}

/// Edge label in the candidate graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Merge target to candidate.
    Candidate,
    /// Replacer to replaced.
    Replaces,
}

#[derive(Debug, Clone)]
pub enum GraphNode {
    Target(TypeId),
    Record {
        record: ContributionRecord,
        fate: Fate,
    },
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Target(target) => write!(f, "{target}"),
            GraphNode::Record { record, fate } => write!(f, "{record} ({fate})"),
        }
    }
}

/// Candidates of one merge request backed by petgraph.
pub struct ContributionGraph {
    graph: DiGraph<GraphNode, Relation>,
    index: HashMap<ContributionRecord, NodeIndex>,
    root: NodeIndex,
}

impl ContributionGraph {
    pub fn new(target: &TypeId) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(GraphNode::Target(target.clone()));
        Self {
            graph,
            index: HashMap::new(),
            root,
        }
    }

    /// Add or retrieve a candidate.
    pub fn add_candidate(&mut self, record: &ContributionRecord) -> NodeIndex {
        if let Some(&idx) = self.index.get(record) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Record {
            record: record.clone(),
            fate: Fate::Kept,
        });
        self.graph.add_edge(self.root, idx, Relation::Candidate);
        self.index.insert(record.clone(), idx);
        idx
    }

    /// Record that `replacer` replaces `replaced`. Both must be candidates.
    pub fn add_replacement(&mut self, replacer: &ContributionRecord, replaced: &ContributionRecord) {
        let (Some(&from), Some(&to)) = (self.index.get(replacer), self.index.get(replaced)) else {
            return;
        };
        if !self.graph.edges(from).any(|e| e.target() == to) {
            self.graph.add_edge(from, to, Relation::Replaces);
        }
        let by = self.replaced_by(replaced);
        if let GraphNode::Record { fate, .. } = &mut self.graph[to] {
            if matches!(fate, Fate::Kept | Fate::Replaced { .. }) {
                *fate = Fate::Replaced { by };
            }
        }
    }

    pub fn mark(&mut self, record: &ContributionRecord, new_fate: Fate) {
        if let Some(&idx) = self.index.get(record) {
            if let GraphNode::Record { fate, .. } = &mut self.graph[idx] {
                *fate = new_fate;
            }
        }
    }

    pub fn fate(&self, record: &ContributionRecord) -> Option<&Fate> {
        let idx = self.index.get(record)?;
        match &self.graph[*idx] {
            GraphNode::Record { fate, .. } => Some(fate),
            GraphNode::Target(_) => None,
        }
    }

    /// Contributed types of the records replacing `record`, sorted.
    pub fn replaced_by(&self, record: &ContributionRecord) -> Vec<TypeId> {
        let Some(&idx) = self.index.get(record) else {
            return Vec::new();
        };
        let replacers: BTreeSet<TypeId> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| *e.weight() == Relation::Replaces)
            .filter_map(|e| match &self.graph[e.source()] {
                GraphNode::Record { record, .. } => Some(record.contributed().clone()),
                GraphNode::Target(_) => None,
            })
            .collect();
        replacers.into_iter().collect()
    }

    /// Candidates still kept, sorted.
    pub fn kept(&self) -> Vec<&ContributionRecord> {
        let mut kept: Vec<&ContributionRecord> = self
            .graph
            .node_weights()
            .filter_map(|n| match n {
                GraphNode::Record {
                    record,
                    fate: Fate::Kept,
                } => Some(record),
                _ => None,
            })
            .collect();
        kept.sort();
        kept
    }

    /// Print every candidate under the merge target, with the records each
    /// replacement removed nested under its replacer.
    pub fn print_tree(&self) -> String {
        let mut output = format!("{}\n", self.graph[self.root]);
        let candidates = self.sorted_targets(self.root, Relation::Candidate);
        let count = candidates.len();
        for (i, idx) in candidates.into_iter().enumerate() {
            self.print_subtree(&mut output, idx, "", i == count - 1);
        }
        output
    }

    fn print_subtree(&self, output: &mut String, idx: NodeIndex, prefix: &str, is_last: bool) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        output.push_str(&format!("{prefix}{connector}{node}\n"));

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let replaced = self.sorted_targets(idx, Relation::Replaces);
        let count = replaced.len();
        for (i, child) in replaced.into_iter().enumerate() {
            let connector = if i == count - 1 { "└── " } else { "├── " };
            let label = match &self.graph[child] {
                GraphNode::Record { record, .. } => record.to_string(),
                GraphNode::Target(target) => target.to_string(),
            };
            output.push_str(&format!("{child_prefix}{connector}replaces {label}\n"));
        }
    }

    fn sorted_targets(&self, from: NodeIndex, relation: Relation) -> Vec<NodeIndex> {
        let mut targets: Vec<(&ContributionRecord, NodeIndex)> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .filter(|e| *e.weight() == relation)
            .filter_map(|e| match &self.graph[e.target()] {
                GraphNode::Record { record, .. } => Some((record, e.target())),
                GraphNode::Target(_) => None,
            })
            .collect();
        targets.sort();
        targets.into_iter().map(|(_, idx)| idx).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supertype(contributed: &str) -> ContributionRecord {
        ContributionRecord::supertype("A", contributed)
    }

    #[test]
    fn add_candidate_is_idempotent() {
        let mut graph = ContributionGraph::new(&TypeId::new("Component"));
        let a = graph.add_candidate(&supertype("X"));
        let b = graph.add_candidate(&supertype("X"));
        assert_eq!(a, b);
        assert_eq!(graph.kept().len(), 1);
    }

    #[test]
    fn replacement_changes_fate() {
        let mut graph = ContributionGraph::new(&TypeId::new("Component"));
        let x = supertype("X");
        let y = supertype("Y").replacing(["X"]);
        graph.add_candidate(&x);
        graph.add_candidate(&y);
        graph.add_replacement(&y, &x);
        assert_eq!(
            graph.fate(&x),
            Some(&Fate::Replaced {
                by: vec![TypeId::new("Y")]
            })
        );
        assert_eq!(graph.kept(), vec![&y]);
    }

    #[test]
    fn every_replacer_is_named() {
        let mut graph = ContributionGraph::new(&TypeId::new("Component"));
        let x = supertype("X");
        let z = supertype("Z").replacing(["X"]);
        let y = supertype("Y").replacing(["X"]);
        for record in [&x, &z, &y] {
            graph.add_candidate(record);
        }
        graph.add_replacement(&z, &x);
        graph.add_replacement(&y, &x);
        assert_eq!(graph.replaced_by(&x), vec![TypeId::new("Y"), TypeId::new("Z")]);
        assert!(graph.print_tree().contains("X [supertype, scope A] (replaced by Y, Z)"));
    }

    #[test]
    fn tree_printing() {
        let mut graph = ContributionGraph::new(&TypeId::new("com.example.Component"));
        let x = supertype("X");
        let y = supertype("Y").replacing(["X"]);
        let z = ContributionRecord::module("A", "Z");
        graph.add_candidate(&x);
        graph.add_candidate(&y);
        graph.add_candidate(&z);
        graph.add_replacement(&y, &x);
        graph.mark(&z, Fate::Excluded);

        let tree = graph.print_tree();
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines[0], "com.example.Component");
        assert_eq!(lines[1], "├── X [supertype, scope A] (replaced by Y)");
        assert_eq!(lines[2], "├── Y [supertype, scope A] (kept)");
        assert_eq!(lines[3], "│   └── replaces X [supertype, scope A]");
        assert_eq!(lines[4], "└── Z [module, scope A] (excluded)");
    }
}
