//! Identifier canonicalization and endpoint parsing.
//!
//! All instance, component, and port names in a netlist are stored in a
//! canonical form produced by [`clean_string`]. Endpoints (`instance,port`
//! pairs) are parsed by [`Endpoint::parse`], which splits on the last comma
//! and rejects any comma in the instance part.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Canonicalizes a raw name into identifier form.
///
/// Leading and trailing whitespace is trimmed, `.` maps to `p`, `-` maps to
/// `m`, every other character outside `[0-9A-Za-z_]` maps to `_`, and a
/// leading digit gains a `_` prefix. The transform is deterministic and
/// idempotent.
///
/// # Examples
///
/// ```
/// use netir::clean_string;
/// assert_eq!(clean_string("My Inst!"), "My_Inst_");
/// assert_eq!(clean_string("coupler.50-50"), "couplerp50m50");
/// assert_eq!(clean_string("2x2"), "_2x2");
/// ```
pub fn clean_string(raw: &str) -> ArcStr {
    let s = raw.trim();
    let mut out = String::with_capacity(s.len() + 1);
    for (i, c) in s.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            out.push('_');
        }
        out.push(match c {
            '.' => 'p',
            '-' => 'm',
            c if c.is_ascii_alphanumeric() || c == '_' => c,
            _ => '_',
        });
    }
    out.into()
}

/// Validates and canonicalizes an instance or port name.
///
/// Fails if the name contains a comma; commas delimit the two halves of an
/// endpoint and may never appear inside either half.
pub(crate) fn clean_name(raw: &str) -> Result<ArcStr> {
    if raw.contains(',') {
        return Err(Error::InvalidIdentifier {
            name: raw.to_string(),
            reason: "name must not contain `,`",
        });
    }
    Ok(clean_string(raw))
}

/// Validates and canonicalizes a component type name.
///
/// Any `$`-suffix is stripped before cleaning; the comma check applies to
/// the raw name, suffix included.
pub(crate) fn clean_component_name(raw: &str) -> Result<ArcStr> {
    if raw.contains(',') {
        return Err(Error::InvalidIdentifier {
            name: raw.to_string(),
            reason: "component name must not contain `,`",
        });
    }
    let base = match raw.split_once('$') {
        Some((base, _)) => base,
        None => raw,
    };
    Ok(clean_string(base))
}

/// One terminal of a connection or port mapping: an `instance,port` pair.
///
/// The wire form is exactly `"<instance>,<port>"` with no escaping; neither
/// half may itself contain a comma. Both halves are canonicalized on
/// construction, so an `Endpoint` is its own normal form.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    instance: ArcStr,
    port: ArcStr,
}

impl Endpoint {
    /// Creates an endpoint from already-separated instance and port names.
    pub fn new(instance: &str, port: &str) -> Result<Self> {
        Ok(Self {
            instance: clean_name(instance)?,
            port: clean_name(port)?,
        })
    }

    /// Parses an `instance,port` endpoint string.
    ///
    /// The string is split on its last comma; a comma anywhere in the
    /// instance part, or a string with no comma at all, is an
    /// [`Error::InvalidIdentifier`].
    pub fn parse(raw: &str) -> Result<Self> {
        let (instance, port) = raw.rsplit_once(',').ok_or_else(|| Error::InvalidIdentifier {
            name: raw.to_string(),
            reason: "expected an `instance,port` endpoint",
        })?;
        if instance.contains(',') {
            return Err(Error::InvalidIdentifier {
                name: raw.to_string(),
                reason: "instance part of an endpoint must not contain `,`",
            });
        }
        Ok(Self {
            instance: clean_string(instance),
            port: clean_string(port),
        })
    }

    /// The instance-name half of this endpoint.
    #[inline]
    pub fn instance(&self) -> &ArcStr {
        &self.instance
    }

    /// The port-name half of this endpoint.
    #[inline]
    pub fn port(&self) -> &ArcStr {
        &self.port
    }

    /// Returns this endpoint with its instance half mangled under `prefix`.
    pub(crate) fn prefixed(&self, prefix: &str, sep: &str) -> Self {
        Self {
            instance: arcstr::format!("{}{}{}", prefix, sep, self.instance),
            port: self.port.clone(),
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.instance, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    #[inline]
    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    #[inline]
    fn from(value: Endpoint) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_is_deterministic_and_idempotent() {
        let a = clean_string("My Inst!");
        let b = clean_string("My Inst!");
        assert_eq!(a, b);
        assert_eq!(a, "My_Inst_");
        assert_eq!(clean_string(a.as_str()), a);
    }

    #[test]
    fn cleaning_maps_special_characters() {
        assert_eq!(clean_string("  mmi 1x2  "), "mmi_1x2");
        assert_eq!(clean_string("wg.long-arm"), "wgplongmarm");
        assert_eq!(clean_string("90bend"), "_90bend");
        assert_eq!(clean_string(""), "");
    }

    #[test]
    fn component_names_drop_dollar_suffix() {
        assert_eq!(clean_component_name("coupler$1").unwrap(), "coupler");
        assert_eq!(clean_component_name("coupler").unwrap(), "coupler");
        assert!(matches!(
            clean_component_name("a,b$1"),
            Err(Error::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn endpoint_parses_on_last_comma() {
        let ep = Endpoint::parse("wg1,o2").unwrap();
        assert_eq!(ep.instance(), "wg1");
        assert_eq!(ep.port(), "o2");
        assert_eq!(ep.to_string(), "wg1,o2");
    }

    #[test]
    fn endpoint_rejects_malformed_strings() {
        assert!(matches!(
            Endpoint::parse("noport"),
            Err(Error::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            Endpoint::parse("a,b,c"),
            Err(Error::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn endpoint_canonicalizes_both_halves() {
        let ep = Endpoint::parse(" my inst ,o 1").unwrap();
        assert_eq!(ep.instance(), "my_inst");
        assert_eq!(ep.port(), "o_1");
    }
}
