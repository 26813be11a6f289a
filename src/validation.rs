//! Reference validation.
//!
//! The model tolerates connections and ports whose endpoints reference
//! instances that do not exist at their hierarchy level; pruning and
//! flattening handle them gracefully. This pass surfaces those tolerated
//! inconsistencies as warnings without altering the hierarchy.

use std::fmt::{self, Display, Formatter};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use tracing::{span, Level};

use crate::diag::{Diagnostic, IssueSet, Severity};
use crate::{Endpoint, RecursiveNetlist};

/// An issue identified while validating references in a hierarchy.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    cause: Cause,
    severity: Severity,
}

/// The underlying causes of [`ValidationIssue`]s.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// A connection endpoint references an instance the netlist does not
    /// declare.
    DanglingConnectionEndpoint {
        /// The netlist containing the connection.
        netlist: ArcStr,
        /// The endpoint whose instance is undeclared.
        endpoint: Endpoint,
    },
    /// A port targets an instance the netlist does not declare.
    DanglingPortTarget {
        /// The netlist containing the port.
        netlist: ArcStr,
        /// The external port name.
        port: ArcStr,
        /// The target endpoint whose instance is undeclared.
        target: Endpoint,
    },
}

impl ValidationIssue {
    fn new(cause: Cause) -> Self {
        Self {
            cause,
            severity: Severity::Warning,
        }
    }

    /// Gets the underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl Diagnostic for ValidationIssue {
    fn severity(&self) -> Severity {
        self.severity
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingConnectionEndpoint { netlist, endpoint } => write!(
                f,
                "dangling connection endpoint `{}` in netlist `{}`: no such instance",
                endpoint, netlist,
            ),
            Self::DanglingPortTarget {
                netlist,
                port,
                target,
            } => write!(
                f,
                "port `{}` in netlist `{}` targets `{}`: no such instance",
                port, netlist, target,
            ),
        }
    }
}

impl RecursiveNetlist {
    /// Reports dangling references in every netlist of this hierarchy.
    ///
    /// Dangling references never make a hierarchy unusable, so every issue
    /// is a warning.
    pub fn validate(&self) -> IssueSet<ValidationIssue> {
        let _guard = span!(Level::INFO, "validating netlist hierarchy").entered();
        let mut issues = IssueSet::new();
        for (name, netlist) in self.iter() {
            let _guard =
                span!(Level::INFO, "validating netlist references", netlist = %name).entered();
            for (a, b) in netlist.connections() {
                for endpoint in [a, b] {
                    if netlist.instance(endpoint.instance()).is_none() {
                        issues.add(ValidationIssue::new(Cause::DanglingConnectionEndpoint {
                            netlist: name.clone(),
                            endpoint: endpoint.clone(),
                        }));
                    }
                }
            }
            for (port, target) in netlist.ports() {
                if netlist.instance(target.instance()).is_none() {
                    issues.add(ValidationIssue::new(Cause::DanglingPortTarget {
                        netlist: name.clone(),
                        port: port.clone(),
                        target: target.clone(),
                    }));
                }
            }
        }
        issues
    }
}
