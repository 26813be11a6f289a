//! Non-fatal issue collection.
//!
//! Connectivity inconsistencies found while flattening or validating a
//! hierarchy are deliberately not failures: they are dropped from the
//! result and collected here so large hierarchies flatten to completion
//! with visible diagnostics.

use std::fmt::{self, Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Severity of a reported issue.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A recoverable inconsistency; the offending entry was dropped.
    #[default]
    Warning,
    /// An error. The pass that produced it usually still completed.
    Error,
}

impl Severity {
    /// Returns `true` if the severity is [`Severity::Error`].
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(*self, Self::Error)
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A non-fatal issue that should be surfaced to users.
pub trait Diagnostic: Debug + Display {
    /// The severity of this issue.
    ///
    /// The default implementation returns [`Severity::default`].
    fn severity(&self) -> Severity {
        Default::default()
    }
}

/// An ordered collection of issues produced by a single pass.
///
/// Issues are logged through [`tracing`] as they are added, at the level
/// matching their severity.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
}

impl<T> IssueSet<T> {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Returns an iterator over the issues in this set, in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    /// The number of issues in this set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if no issues were reported.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Adds an issue to the set, logging it at its severity's level.
    pub fn add(&mut self, issue: T) {
        match issue.severity() {
            Severity::Info => tracing::info!("{}", issue),
            Severity::Warning => tracing::warn!("{}", issue),
            Severity::Error => tracing::error!("{}", issue),
        }
        self.issues.push(issue);
    }

    /// Returns `true` if any issue has severity [`Severity::Error`].
    pub fn has_error(&self) -> bool {
        self.issues.iter().any(|i| i.severity().is_error())
    }

    /// Returns `true` if any issue has severity [`Severity::Warning`].
    pub fn has_warning(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity() == Severity::Warning)
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<T: Display> Display for IssueSet<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}
