//! Hierarchy flattening.
//!
//! Recursively inlines every instance whose component type is defined in
//! the hierarchy, bottom-up, producing a single flat netlist whose
//! instance names encode the full instantiation path
//! (`leaf`, `a~b`, `a~b~c`, ...).
//!
//! Flattening is best-effort: a connection or port referencing a port the
//! inlined sub-circuit does not define is dropped and reported as a
//! warning rather than failing the whole pass. Cyclic hierarchies fail
//! fast with [`Error::CyclicHierarchy`].

use std::fmt::{self, Display, Formatter};

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{span, Level};

use crate::diag::{Diagnostic, IssueSet, Severity};
use crate::{Component, Endpoint, Error, Netlist, RecursiveNetlist, Result};

/// The default separator used to mangle inlined instance names.
///
/// Identifier cleaning maps `~` to `_`, so no canonical identifier ever
/// contains it and mangled names parse back unambiguously.
pub const DEFAULT_SEPARATOR: &str = "~";

/// The result of flattening a hierarchy: the flat netlist plus any
/// recoverable inconsistencies encountered along the way.
#[derive(Debug, Clone)]
pub struct Flattened {
    /// The flattened netlist. Placements are not propagated.
    pub netlist: Netlist,
    /// Warnings for connections and ports dropped during inlining.
    pub issues: IssueSet<FlattenIssue>,
}

/// A recoverable inconsistency encountered while flattening.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlattenIssue {
    cause: Cause,
    severity: Severity,
}

/// The underlying causes of [`FlattenIssue`]s.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// A connection references a port the inlined sub-circuit does not
    /// define; the connection was dropped.
    MissingConnectionPort {
        /// The instance being inlined.
        instance: ArcStr,
        /// The endpoint whose port was not found on the sub-circuit.
        endpoint: Endpoint,
        /// The other endpoint of the dropped connection.
        other: Endpoint,
    },
    /// A port's target references a port the inlined sub-circuit does not
    /// define; the port was dropped.
    MissingPortTarget {
        /// The external port name that was dropped.
        port: ArcStr,
        /// Its unresolvable target endpoint.
        target: Endpoint,
    },
}

impl FlattenIssue {
    pub(crate) fn missing_connection_port(
        instance: &ArcStr,
        endpoint: &Endpoint,
        other: &Endpoint,
    ) -> Self {
        Self {
            cause: Cause::MissingConnectionPort {
                instance: instance.clone(),
                endpoint: endpoint.clone(),
                other: other.clone(),
            },
            severity: Severity::Warning,
        }
    }

    pub(crate) fn missing_port_target(port: &ArcStr, target: &Endpoint) -> Self {
        Self {
            cause: Cause::MissingPortTarget {
                port: port.clone(),
                target: target.clone(),
            },
            severity: Severity::Warning,
        }
    }

    /// Gets the underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl Diagnostic for FlattenIssue {
    fn severity(&self) -> Severity {
        self.severity
    }
}

impl Display for FlattenIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConnectionPort {
                instance,
                endpoint,
                other,
            } => write!(
                f,
                "port `{}` not found on inlined instance `{}`: connection `{}`<->`{}` ignored",
                endpoint.port(),
                instance,
                endpoint,
                other,
            ),
            Self::MissingPortTarget { port, target } => write!(
                f,
                "missing port definition for `{}`: port `{}` ignored",
                target, port,
            ),
        }
    }
}

/// The mutable working form of a netlist during flattening.
///
/// Placements are deliberately absent: the flattening pass does not
/// propagate them.
#[derive(Default)]
struct Work {
    instances: IndexMap<ArcStr, Component>,
    connections: IndexMap<Endpoint, Endpoint>,
    ports: IndexMap<ArcStr, Endpoint>,
}

impl Work {
    fn copy_of(netlist: &Netlist) -> Self {
        Self {
            instances: netlist.instances.clone(),
            connections: netlist.connections.clone(),
            ports: netlist.ports.clone(),
        }
    }

    fn into_netlist(self) -> Netlist {
        Netlist {
            instances: self.instances,
            connections: self.connections,
            ports: self.ports,
            placements: IndexMap::new(),
        }
    }
}

impl RecursiveNetlist {
    /// Flattens this hierarchy into a single netlist using
    /// [`DEFAULT_SEPARATOR`].
    ///
    /// See [`flatten_with_separator`](RecursiveNetlist::flatten_with_separator).
    pub fn flatten(&self) -> Result<Flattened> {
        self.flatten_with_separator(DEFAULT_SEPARATOR)
    }

    /// Flattens this hierarchy into a single netlist.
    ///
    /// Starting from the first (top-level) entry, every instance whose
    /// component type is a key of the hierarchy is replaced, depth-first
    /// and bottom-up, by the contents of that sub-circuit: its instances
    /// are re-added under `"{name}{sep}{inner}"`, its internal connections
    /// are carried over with both endpoints mangled, and connections and
    /// ports of the parent that touched the instance are rewritten through
    /// the sub-circuit's exported ports. Instances of undefined component
    /// types are opaque leaves and are left untouched.
    ///
    /// An empty hierarchy flattens to an empty netlist. A hierarchy in
    /// which a circuit type transitively instantiates itself is
    /// [`Error::CyclicHierarchy`]; a separator that could also appear
    /// inside a canonical identifier is [`Error::InvalidSeparator`].
    pub fn flatten_with_separator(&self, sep: &str) -> Result<Flattened> {
        if sep.is_empty() || sep.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidSeparator(sep.to_string()));
        }

        let Some((top_name, top)) = self.top() else {
            return Ok(Flattened {
                netlist: Netlist::new(),
                issues: IssueSet::new(),
            });
        };

        let _guard = span!(Level::INFO, "flattening netlist hierarchy", top = %top_name).entered();

        let mut issues = IssueSet::new();
        let mut work = Work::copy_of(top);
        let mut path = vec![top_name.clone()];
        self.flatten_level(&mut work, sep, &mut path, &mut issues)?;

        Ok(Flattened {
            netlist: work.into_netlist(),
            issues,
        })
    }

    /// Inlines, in place, every expandable instance of `work`.
    fn flatten_level(
        &self,
        work: &mut Work,
        sep: &str,
        path: &mut Vec<ArcStr>,
        issues: &mut IssueSet<FlattenIssue>,
    ) -> Result<()> {
        let names: Vec<ArcStr> = work.instances.keys().cloned().collect();
        for name in names {
            let Some(component) = work.instances.get(&name).map(|c| c.name().clone()) else {
                continue;
            };
            let Some(child_netlist) = self.get(&component) else {
                // Opaque leaf.
                continue;
            };
            if path.iter().any(|p| *p == component) {
                let mut cycle: Vec<String> = path.iter().map(|p| p.to_string()).collect();
                cycle.push(component.to_string());
                return Err(Error::CyclicHierarchy { cycle });
            }

            let mut child = Work::copy_of(child_netlist);
            path.push(component);
            self.flatten_level(&mut child, sep, path, issues)?;
            path.pop();

            inline(work, &name, child, sep, issues);
        }
        Ok(())
    }
}

/// Splices the flattened `child` into `parent` in place of instance `name`.
fn inline(parent: &mut Work, name: &ArcStr, child: Work, sep: &str, issues: &mut IssueSet<FlattenIssue>) {
    parent.instances.shift_remove(name);
    for (iname, component) in child.instances {
        parent
            .instances
            .insert(arcstr::format!("{}{}{}", name, sep, iname), component);
    }

    // How each child port is addressed from the parent after inlining.
    let exported: IndexMap<ArcStr, Endpoint> = child
        .ports
        .iter()
        .map(|(port, target)| (port.clone(), target.prefixed(name, sep)))
        .collect();

    let connections = std::mem::take(&mut parent.connections);
    for (a, b) in connections {
        let a = if a.instance() == name {
            match exported.get(a.port()) {
                Some(resolved) => resolved.clone(),
                None => {
                    issues.add(FlattenIssue::missing_connection_port(name, &a, &b));
                    continue;
                }
            }
        } else {
            a
        };
        let b = if b.instance() == name {
            match exported.get(b.port()) {
                Some(resolved) => resolved.clone(),
                None => {
                    issues.add(FlattenIssue::missing_connection_port(name, &b, &a));
                    continue;
                }
            }
        } else {
            b
        };
        parent.connections.insert(a, b);
    }
    for (a, b) in child.connections {
        parent
            .connections
            .insert(a.prefixed(name, sep), b.prefixed(name, sep));
    }

    let ports = std::mem::take(&mut parent.ports);
    for (port, target) in ports {
        if target.instance() == name {
            match exported.get(target.port()) {
                Some(resolved) => {
                    parent.ports.insert(port, resolved.clone());
                }
                None => {
                    issues.add(FlattenIssue::missing_port_target(&port, &target));
                }
            }
        } else {
            parent.ports.insert(port, target);
        }
    }
}
