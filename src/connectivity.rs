//! Connectivity analysis over a flat netlist.
//!
//! Builds an undirected graph whose nodes are instance names (plus port
//! names and the instance halves of dangling endpoints) and whose edges
//! come from connections and port mappings. Reachability over this graph
//! drives dead-instance pruning.

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use crate::Netlist;

/// The undirected instance-connectivity graph of a flat netlist.
///
/// Parallel edges are deduplicated; multiplicity is irrelevant to
/// reachability.
pub(crate) struct ConnectivityGraph {
    graph: UnGraph<ArcStr, ()>,
    nodes: HashMap<ArcStr, NodeIndex>,
}

impl ConnectivityGraph {
    /// Builds the connectivity graph of the given netlist.
    ///
    /// Declared instances are seeded as nodes first, in natural
    /// (alphanumeric-aware) order, so node numbering is deterministic for
    /// diagnostic output. One edge is added per connection entry (linking
    /// the instance halves of its two endpoints) and one per port entry
    /// (linking the port name, itself a node, to its target's instance
    /// half). Endpoint instances absent from `instances` still become
    /// nodes.
    pub(crate) fn build(netlist: &Netlist) -> Self {
        let mut this = Self {
            graph: UnGraph::default(),
            nodes: HashMap::new(),
        };

        let mut names: Vec<&ArcStr> = netlist.instances().keys().collect();
        names.sort_by(|a, b| natord::compare(a.as_str(), b.as_str()));
        for name in names {
            this.node(name);
        }

        for (a, b) in netlist.connections() {
            let a = this.node(a.instance());
            let b = this.node(b.instance());
            this.graph.update_edge(a, b, ());
        }
        for (port, target) in netlist.ports() {
            let p = this.node(port);
            let t = this.node(target.instance());
            this.graph.update_edge(p, t, ());
        }

        this
    }

    fn node(&mut self, name: &ArcStr) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        self.nodes.insert(name.clone(), idx);
        idx
    }

    /// The names of all nodes in the graph.
    pub(crate) fn node_names(&self) -> impl Iterator<Item = &ArcStr> {
        self.graph.node_weights()
    }

    /// Computes the set of node names reachable from any of the given
    /// source nodes, excluding each source itself unless it is reached
    /// from another source.
    ///
    /// Sources with no corresponding node are skipped.
    pub(crate) fn reachable_from<'a>(
        &self,
        sources: impl Iterator<Item = &'a ArcStr>,
    ) -> HashSet<ArcStr> {
        let mut reachable = HashSet::new();
        for source in sources {
            let Some(&start) = self.nodes.get(source) else {
                continue;
            };
            let mut bfs = Bfs::new(&self.graph, start);
            // The first visited node is the source itself.
            bfs.next(&self.graph);
            while let Some(idx) = bfs.next(&self.graph) {
                reachable.insert(self.graph[idx].clone());
            }
        }
        reachable
    }
}
