//! Source → output production graph.
//!
//! Edges record which outputs a source contributes to. The graph is not a
//! scheduling order, so cycles are never checked.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "N: Serialize + Ord",
    deserialize = "N: Deserialize<'de> + Ord"
))]
pub struct DependencyGraph<N: Ord = String> {
    outgoing: BTreeMap<N, BTreeSet<N>>,
    incoming: BTreeMap<N, BTreeSet<N>>,
}

impl<N: Ord> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
        }
    }
}

impl<N: Ord + Clone> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding an edge that already exists is a no-op.
    pub fn add_edge(&mut self, source: N, output: N) {
        self.incoming
            .entry(output.clone())
            .or_default()
            .insert(source.clone());
        self.outgoing.entry(source).or_default().insert(output);
    }

    pub fn merge_from(&mut self, other: &DependencyGraph<N>) {
        for (source, outputs) in &other.outgoing {
            for output in outputs {
                self.add_edge(source.clone(), output.clone());
            }
        }
    }

    /// Every node reachable from `changed` through one or more edges.
    pub fn affected_outputs<'a, I>(&self, changed: I) -> BTreeSet<N>
    where
        I: IntoIterator<Item = &'a N>,
        N: 'a,
    {
        let mut affected = BTreeSet::new();
        let mut queue: VecDeque<&N> = VecDeque::new();
        for node in changed {
            queue.push_back(node);
        }

        while let Some(node) = queue.pop_front() {
            let Some(outputs) = self.outgoing.get(node) else {
                continue;
            };
            for output in outputs {
                if affected.insert(output.clone()) {
                    queue.push_back(output);
                }
            }
        }

        affected
    }

    /// Nodes with at least one incoming edge.
    pub fn all_outputs(&self) -> BTreeSet<N> {
        self.incoming.keys().cloned().collect()
    }

    /// Nodes with at least one outgoing edge.
    pub fn sources(&self) -> BTreeSet<N> {
        self.outgoing.keys().cloned().collect()
    }

    pub fn outputs_of(&self, source: &N) -> BTreeSet<N> {
        self.outgoing.get(source).cloned().unwrap_or_default()
    }

    pub fn sources_of(&self, output: &N) -> BTreeSet<N> {
        self.incoming.get(output).cloned().unwrap_or_default()
    }

    pub fn has_edge(&self, source: &N, output: &N) -> bool {
        self.outgoing
            .get(source)
            .is_some_and(|outputs| outputs.contains(output))
    }

    pub fn contains(&self, node: &N) -> bool {
        self.outgoing.contains_key(node) || self.incoming.contains_key(node)
    }

    /// Drops a node and every edge touching it.
    pub fn remove_node(&mut self, node: &N) {
        if let Some(outputs) = self.outgoing.remove(node) {
            for output in outputs {
                if let Some(sources) = self.incoming.get_mut(&output) {
                    sources.remove(node);
                    if sources.is_empty() {
                        self.incoming.remove(&output);
                    }
                }
            }
        }
        if let Some(sources) = self.incoming.remove(node) {
            for source in sources {
                if let Some(outputs) = self.outgoing.get_mut(&source) {
                    outputs.remove(node);
                    if outputs.is_empty() {
                        self.outgoing.remove(&source);
                    }
                }
            }
        }
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }
}

impl DependencyGraph<String> {
    /// Records an edge between two path identifiers. Empty identifiers are a
    /// caller bug.
    pub fn add_path_edge(&mut self, source: impl Into<String>, output: impl Into<String>) {
        let source = source.into();
        let output = output.into();
        debug_assert!(!source.is_empty(), "dependency source must not be empty");
        debug_assert!(!output.is_empty(), "dependency output must not be empty");
        self.add_edge(source, output);
    }
}
