//! Dead-instance pruning.
//!
//! An instance is dead when no path of connections and port mappings links
//! it to any declared external port. Pruning removes dead instances, the
//! connections keyed by their endpoints, and the ports targeting them.
//! The pass is per-level: each netlist in a hierarchy is pruned against
//! its own ports only.

use std::collections::HashSet;

use arcstr::ArcStr;
use tracing::{span, Level};

use crate::connectivity::ConnectivityGraph;
use crate::{Netlist, RecursiveNetlist};

impl Netlist {
    /// Returns a copy of this netlist with all unused instances removed.
    ///
    /// Unused means unreachable from every declared port name over the
    /// connectivity graph. Connections are dropped when the instance half
    /// of their key-side endpoint is unused; ports are dropped when their
    /// target's instance is unused. Placements are carried unchanged.
    ///
    /// A netlist with no ports prunes to one with no instances and no
    /// connections; this is a valid outcome, not an error. Pruning is
    /// idempotent.
    pub fn prune_unused(&self) -> Netlist {
        let _guard = span!(Level::INFO, "pruning unused instances").entered();

        let graph = ConnectivityGraph::build(self);
        let reachable = graph.reachable_from(self.ports().keys());
        let unused: HashSet<&ArcStr> = graph
            .node_names()
            .filter(|name| !reachable.contains(name.as_str()))
            .collect();

        let mut out = Netlist::new();
        for (name, component) in self.instances() {
            if !unused.contains(name) {
                out.instances.insert(name.clone(), component.clone());
            }
        }
        for (a, b) in self.connections() {
            if !unused.contains(a.instance()) {
                out.connections.insert(a.clone(), b.clone());
            }
        }
        for (name, target) in self.ports() {
            if !unused.contains(target.instance()) {
                out.ports.insert(name.clone(), target.clone());
            }
        }
        out.placements = self.placements.clone();
        out
    }
}

impl RecursiveNetlist {
    /// Returns a copy of this hierarchy with every level pruned
    /// independently via [`Netlist::prune_unused`].
    pub fn prune_unused(&self) -> RecursiveNetlist {
        let mut out = RecursiveNetlist::new();
        for (name, netlist) in self.iter() {
            out.netlists.insert(name.clone(), netlist.prune_unused());
        }
        out
    }
}
