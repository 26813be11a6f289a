//! Prefix queries over a hierarchy.

use arcstr::ArcStr;

use crate::{Error, RecursiveNetlist, Result};

impl RecursiveNetlist {
    /// Returns every top-level circuit-type name starting with `prefix`,
    /// in hierarchy order.
    ///
    /// An empty result is a valid outcome, not an error.
    pub fn instances_by_prefix(&self, prefix: &str) -> Vec<ArcStr> {
        self.netlists
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the instance names, in netlist order, whose component type
    /// starts with `component_name_prefix`, within the first top-level
    /// entry matching `top_level_prefix`.
    ///
    /// When several top-level names match the prefix, the first in
    /// hierarchy order is used; callers wanting a specific netlist should
    /// pass an unambiguous prefix. Fails with [`Error::NotFound`] when no
    /// top-level name matches.
    pub fn component_instances(
        &self,
        top_level_prefix: &str,
        component_name_prefix: &str,
    ) -> Result<Vec<ArcStr>> {
        let (_, netlist) = self
            .iter()
            .find(|(name, _)| name.starts_with(top_level_prefix))
            .ok_or_else(|| Error::NotFound {
                prefix: top_level_prefix.to_string(),
            })?;
        Ok(netlist
            .instances()
            .iter()
            .filter(|(_, component)| component.name().starts_with(component_name_prefix))
            .map(|(name, _)| name.clone())
            .collect())
    }
}
