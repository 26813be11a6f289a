//! Hierarchical circuit netlist intermediate representation (netir).
//!
//! A string-keyed model of circuit netlists: instances of sub-circuit
//! types, the connections between their ports, and the external ports a
//! netlist exposes at its own hierarchy level. On top of the model, this
//! crate provides two transformations:
//!
//! - **Flattening**: recursively inlining every instance whose component
//!   type is itself defined in the hierarchy, producing a single flat
//!   netlist with path-mangled instance names (`u~v~w`).
//! - **Dead-instance pruning**: removing instances that are not reachable
//!   from any declared port through the connection graph.
//!
//! All identifiers are canonicalized at construction time (see
//! [`clean_string`]); connection and port targets are `instance,port`
//! [`Endpoint`]s. Dangling references are tolerated by the model and
//! handled gracefully (dropped, with diagnostics) by the transformations.
//!
//! Model values are immutable once built: the mutating methods exist for
//! the construction phase, and every transformation returns a new value
//! rather than modifying its input, so independent inputs can be processed
//! concurrently without locking.
#![warn(missing_docs)]

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub(crate) mod connectivity;
pub mod diag;
pub mod flatten;
mod ident;
pub mod load;
mod prune;
mod query;
pub mod validation;

#[cfg(test)]
mod tests;

pub use diag::{Diagnostic, IssueSet, Severity};
pub use flatten::{FlattenIssue, Flattened, DEFAULT_SEPARATOR};
pub use ident::{clean_string, Endpoint};
pub use load::{load_netlist, load_recursive_netlist, NetlistCache};
pub use validation::ValidationIssue;

use ident::{clean_component_name, clean_name};

/// The synthetic top-level key a flat netlist is wrapped under when it is
/// normalized into a hierarchy.
pub const TOP_LEVEL_KEY: &str = "top_level";

/// The error type for netlist construction and transformation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An instance, component, or port name contains a disallowed
    /// character sequence. Raised eagerly at model construction time.
    #[error("invalid identifier `{name}`: {reason}")]
    InvalidIdentifier {
        /// The offending raw name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },
    /// The input mapping matches neither the flat nor the hierarchical
    /// netlist shape.
    #[error("malformed netlist input: {0}")]
    MalformedInput(String),
    /// No top-level netlist name matches the given prefix.
    #[error("no top-level netlist name starts with `{prefix}`")]
    NotFound {
        /// The prefix that matched nothing.
        prefix: String,
    },
    /// A circuit type transitively instantiates itself.
    #[error("cyclic hierarchy: {}", .cycle.join(" -> "))]
    CyclicHierarchy {
        /// The chain of circuit-type names forming the cycle.
        cycle: Vec<String>,
    },
    /// A flattening separator that would produce ambiguous mangled names.
    #[error("invalid separator `{0}`: separators must contain a character outside `[0-9A-Za-z_]`")]
    InvalidSeparator(String),
    /// An I/O error while loading a netlist file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A YAML parse or shape error while loading a netlist file.
    #[error("failed to parse netlist file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The result type for netlist construction and transformation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A reference to a circuit building block type.
///
/// The component name is canonicalized on construction; any `$`-suffix is
/// stripped first. Settings are arbitrary key-value parameters, opaque to
/// every pass in this crate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Component {
    component: ArcStr,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    settings: IndexMap<ArcStr, serde_json::Value>,
}

impl Component {
    /// Creates a component reference with no settings.
    pub fn new(component: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            component: clean_component_name(component.as_ref())?,
            settings: IndexMap::new(),
        })
    }

    /// Adds a setting, returning the modified component.
    pub fn with_setting(
        mut self,
        key: impl Into<ArcStr>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// The canonicalized component type name.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.component
    }

    /// The opaque settings of this component reference.
    #[inline]
    pub fn settings(&self) -> &IndexMap<ArcStr, serde_json::Value> {
        &self.settings
    }
}

/// Raw component shape: either a bare type-name string or a full mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawComponent {
    Name(String),
    Full {
        component: String,
        #[serde(default)]
        settings: IndexMap<String, serde_json::Value>,
    },
}

impl TryFrom<RawComponent> for Component {
    type Error = Error;

    fn try_from(raw: RawComponent) -> Result<Self> {
        match raw {
            RawComponent::Name(name) => Component::new(name),
            RawComponent::Full {
                component,
                settings,
            } => {
                let mut out = Component::new(component)?;
                out.settings = settings
                    .into_iter()
                    .map(|(k, v)| (ArcStr::from(k), v))
                    .collect();
                Ok(out)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Component {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawComponent::deserialize(deserializer)?;
        raw.try_into().map_err(serde::de::Error::custom)
    }
}

/// A placement coordinate: a number, or an unevaluated expression string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coord {
    /// A plain numeric offset.
    Num(f64),
    /// An expression left for downstream layout tools to interpret.
    Expr(ArcStr),
}

impl Default for Coord {
    fn default() -> Self {
        Self::Num(0.0)
    }
}

impl From<f64> for Coord {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

/// One of the fixed compass anchor positions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum CompassAnchor {
    Ce,
    Cw,
    Nc,
    Ne,
    Nw,
    Sc,
    Se,
    Sw,
    Cc,
    Center,
}

/// Anchor for a placement's `port` field: a compass position or an
/// arbitrary port name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortAnchor {
    /// A fixed compass position.
    Compass(CompassAnchor),
    /// An arbitrary port name on the placed instance.
    Named(ArcStr),
}

/// Layout metadata for one instance.
///
/// Carried opaquely: no pass in this crate interprets placements, and
/// flattening does not propagate them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Placement {
    pub x: Coord,
    pub y: Coord,
    pub dx: Coord,
    pub dy: Coord,
    pub rotation: f64,
    pub mirror: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmin: Option<Coord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmax: Option<Coord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ymin: Option<Coord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ymax: Option<Coord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortAnchor>,
}

/// One level of circuit hierarchy.
///
/// Connections and ports are not required to reference instances present
/// in `instances`; such dangling references are tolerated and handled by
/// pruning and flattening.
///
/// # Examples
///
/// ```
/// use netir::{Component, Netlist, RecursiveNetlist};
///
/// let mut sub = Netlist::new();
/// sub.add_instance("v", Component::new("wg")?)?;
/// sub.expose_port("o", "v,o1")?;
///
/// let mut top = Netlist::new();
/// top.add_instance("u", Component::new("sub")?)?;
/// top.expose_port("out", "u,o")?;
///
/// let mut recnet = RecursiveNetlist::new();
/// recnet.add_netlist("top", top)?;
/// recnet.add_netlist("sub", sub)?;
///
/// let flat = recnet.flatten()?;
/// assert!(flat.netlist.instances().contains_key("u~v"));
/// assert_eq!(flat.netlist.ports()["out"].to_string(), "u~v,o1");
/// # Ok::<(), netir::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Netlist {
    pub(crate) instances: IndexMap<ArcStr, Component>,
    pub(crate) connections: IndexMap<Endpoint, Endpoint>,
    pub(crate) ports: IndexMap<ArcStr, Endpoint>,
    pub(crate) placements: IndexMap<ArcStr, Placement>,
}

impl Netlist {
    /// Creates a new, empty netlist.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance of the given component under `name`.
    ///
    /// Returns the canonicalized instance name. Adding under a name that
    /// already exists replaces the previous component and keeps the
    /// original position.
    pub fn add_instance(&mut self, name: impl AsRef<str>, component: Component) -> Result<ArcStr> {
        let name = clean_name(name.as_ref())?;
        self.instances.insert(name.clone(), component);
        Ok(name)
    }

    /// Adds an undirected wire between two `instance,port` endpoints.
    pub fn connect(&mut self, a: impl AsRef<str>, b: impl AsRef<str>) -> Result<()> {
        let a = Endpoint::parse(a.as_ref())?;
        let b = Endpoint::parse(b.as_ref())?;
        self.connections.insert(a, b);
        Ok(())
    }

    /// Exposes an internal endpoint under an external port name.
    pub fn expose_port(&mut self, name: impl AsRef<str>, target: impl AsRef<str>) -> Result<ArcStr> {
        let name = clean_name(name.as_ref())?;
        let target = Endpoint::parse(target.as_ref())?;
        self.ports.insert(name.clone(), target);
        Ok(name)
    }

    /// Attaches layout metadata to the named instance.
    pub fn place(&mut self, name: impl AsRef<str>, placement: Placement) -> Result<ArcStr> {
        let name = clean_name(name.as_ref())?;
        self.placements.insert(name.clone(), placement);
        Ok(name)
    }

    /// The instances of this netlist, in insertion order.
    #[inline]
    pub fn instances(&self) -> &IndexMap<ArcStr, Component> {
        &self.instances
    }

    /// The connections of this netlist, in insertion order.
    #[inline]
    pub fn connections(&self) -> &IndexMap<Endpoint, Endpoint> {
        &self.connections
    }

    /// The external ports of this netlist, in insertion order.
    #[inline]
    pub fn ports(&self) -> &IndexMap<ArcStr, Endpoint> {
        &self.ports
    }

    /// The placements of this netlist.
    #[inline]
    pub fn placements(&self) -> &IndexMap<ArcStr, Placement> {
        &self.placements
    }

    /// Gets the component of the named instance.
    #[inline]
    pub fn instance(&self, name: &str) -> Option<&Component> {
        self.instances.get(name)
    }

    /// Gets the target endpoint of the named external port.
    #[inline]
    pub fn port(&self, name: &str) -> Option<&Endpoint> {
        self.ports.get(name)
    }
}

/// Raw flat-netlist shape, before canonicalization.
#[derive(Deserialize)]
struct RawNetlist {
    #[serde(default)]
    instances: IndexMap<String, Component>,
    #[serde(default)]
    connections: IndexMap<String, String>,
    #[serde(default)]
    ports: IndexMap<String, String>,
    #[serde(default)]
    placements: IndexMap<String, Placement>,
}

impl TryFrom<RawNetlist> for Netlist {
    type Error = Error;

    fn try_from(raw: RawNetlist) -> Result<Self> {
        let mut net = Netlist::new();
        for (name, component) in raw.instances {
            net.add_instance(name, component)?;
        }
        for (a, b) in raw.connections {
            net.connect(a, b)?;
        }
        for (name, target) in raw.ports {
            net.expose_port(name, target)?;
        }
        for (name, placement) in raw.placements {
            net.place(name, placement)?;
        }
        Ok(net)
    }
}

impl<'de> Deserialize<'de> for Netlist {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawNetlist::deserialize(deserializer)?;
        raw.try_into().map_err(serde::de::Error::custom)
    }
}

/// A hierarchy of netlists: an insertion-ordered mapping from circuit-type
/// name to [`Netlist`].
///
/// By convention the first entry is the netlist of interest; the remaining
/// entries define the sub-circuit types referenced by [`Component`] names
/// anywhere in the hierarchy. A component name with no entry here is an
/// opaque leaf, not further expandable.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecursiveNetlist {
    pub(crate) netlists: IndexMap<ArcStr, Netlist>,
}

impl RecursiveNetlist {
    /// Creates a new, empty hierarchy.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a netlist under the given circuit-type name.
    ///
    /// Returns the canonicalized name. Re-adding an existing name replaces
    /// the definition and keeps its original position.
    pub fn add_netlist(&mut self, name: impl AsRef<str>, netlist: Netlist) -> Result<ArcStr> {
        let name = clean_name(name.as_ref())?;
        self.netlists.insert(name.clone(), netlist);
        Ok(name)
    }

    /// The first (top-level) entry of the hierarchy, if any.
    #[inline]
    pub fn top(&self) -> Option<(&ArcStr, &Netlist)> {
        self.netlists.first()
    }

    /// Gets the netlist defining the given circuit type.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Netlist> {
        self.netlists.get(name)
    }

    /// Returns `true` if the hierarchy defines the given circuit type.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.netlists.contains_key(name)
    }

    /// Iterates over the `(name, netlist)` entries in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&ArcStr, &Netlist)> {
        self.netlists.iter()
    }

    /// The number of netlists in the hierarchy.
    #[inline]
    pub fn len(&self) -> usize {
        self.netlists.len()
    }

    /// Returns `true` if the hierarchy has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.netlists.is_empty()
    }

    /// Builds a hierarchy from a raw structured value.
    ///
    /// A mapping with an `instances` key is taken as a single flat netlist
    /// and wrapped under [`TOP_LEVEL_KEY`]; any other mapping is taken as
    /// hierarchical (circuit name to netlist). Anything else is
    /// [`Error::MalformedInput`].
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(ref map) if map.contains_key("instances") => {
                let flat: Netlist = serde_json::from_value(value)
                    .map_err(|e| Error::MalformedInput(e.to_string()))?;
                Ok(Self::from(flat))
            }
            serde_json::Value::Object(_) => {
                serde_json::from_value(value).map_err(|e| Error::MalformedInput(e.to_string()))
            }
            other => Err(Error::MalformedInput(format!(
                "expected a flat or hierarchical netlist mapping, got: {}",
                other
            ))),
        }
    }
}

impl From<Netlist> for RecursiveNetlist {
    /// Wraps a flat netlist under the synthetic [`TOP_LEVEL_KEY`].
    fn from(netlist: Netlist) -> Self {
        let mut netlists = IndexMap::with_capacity(1);
        netlists.insert(ArcStr::from(TOP_LEVEL_KEY), netlist);
        Self { netlists }
    }
}

impl<'de> Deserialize<'de> for RecursiveNetlist {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: IndexMap<String, Netlist> = IndexMap::deserialize(deserializer)?;
        let mut out = Self::new();
        for (name, net) in raw {
            out.add_netlist(name, net)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(out)
    }
}

/// Any accepted input for the [`netlist`] construction entry point.
#[derive(Debug, Clone)]
pub enum AnyNetlist {
    /// An already-constructed flat netlist.
    Flat(Netlist),
    /// An already-constructed hierarchy, passed through unchanged.
    Recursive(RecursiveNetlist),
    /// A raw structured value in flat or hierarchical shape.
    Raw(serde_json::Value),
}

impl From<Netlist> for AnyNetlist {
    #[inline]
    fn from(value: Netlist) -> Self {
        Self::Flat(value)
    }
}

impl From<RecursiveNetlist> for AnyNetlist {
    #[inline]
    fn from(value: RecursiveNetlist) -> Self {
        Self::Recursive(value)
    }
}

impl From<serde_json::Value> for AnyNetlist {
    #[inline]
    fn from(value: serde_json::Value) -> Self {
        Self::Raw(value)
    }
}

/// Normalizes any accepted netlist input into a hierarchy.
///
/// Flat inputs are wrapped under [`TOP_LEVEL_KEY`]; hierarchical inputs
/// pass through. When `remove_unused_instances` is set, dead-instance
/// pruning is applied to every level of the result.
pub fn netlist(input: impl Into<AnyNetlist>, remove_unused_instances: bool) -> Result<RecursiveNetlist> {
    let net = match input.into() {
        AnyNetlist::Flat(flat) => RecursiveNetlist::from(flat),
        AnyNetlist::Recursive(recnet) => recnet,
        AnyNetlist::Raw(value) => RecursiveNetlist::from_value(value)?,
    };
    Ok(if remove_unused_instances {
        net.prune_unused()
    } else {
        net
    })
}
