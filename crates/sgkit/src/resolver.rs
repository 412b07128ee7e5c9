//! Group lookups by name or id, memoized per run.

use crate::backend::ControlPlane;
use crate::error::Result;
use crate::types::GroupDescriptor;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct GroupIndex {
    groups: Vec<GroupDescriptor>,
    by_key: HashMap<String, usize>,
}

impl GroupIndex {
    fn build(groups: Vec<GroupDescriptor>) -> Self {
        let mut by_key = HashMap::with_capacity(groups.len() * 2);
        for (i, group) in groups.iter().enumerate() {
            by_key.insert(group.id.clone(), i);
            // ids win over a group that happens to be named like an id
            by_key.entry(group.name.clone()).or_insert(i);
        }
        Self { groups, by_key }
    }

    fn get(&self, query: &str) -> Option<&GroupDescriptor> {
        self.by_key.get(query).map(|&i| &self.groups[i])
    }
}

/// Resolves group names and ids to descriptors.
///
/// The first lookup lists every group once; later lookups are answered from
/// that listing until [`GroupResolver::refresh`] is called. Changes made by
/// others in between are not seen.
pub struct GroupResolver<'a> {
    plane: &'a dyn ControlPlane,
    index: Option<GroupIndex>,
}

impl<'a> GroupResolver<'a> {
    pub fn new(plane: &'a dyn ControlPlane) -> Self {
        Self { plane, index: None }
    }

    fn index(&mut self) -> Result<&GroupIndex> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let groups = self.plane.list_groups()?;
                log::debug!("Indexed {} security groups", groups.len());
                GroupIndex::build(groups)
            }
        };
        Ok(self.index.insert(index))
    }

    /// Find a group by name or id.
    pub fn lookup(&mut self, query: &str) -> Result<Option<&GroupDescriptor>> {
        Ok(self.index()?.get(query))
    }

    /// Find a group by name, inside `vpc` when one is given.
    ///
    /// Names are only unique per VPC. Without a VPC the first group listed
    /// under the name is returned.
    pub fn find(&mut self, name: &str, vpc: Option<&str>) -> Result<Option<&GroupDescriptor>> {
        let index = self.index()?;
        let Some(vpc) = vpc else {
            let named = index.groups.iter().filter(|g| g.name == name).count();
            if named > 1 {
                log::warn!("{named} security groups are named {name}; using the first listed");
            }
            return Ok(index.get(name));
        };
        Ok(index
            .groups
            .iter()
            .find(|g| g.name == name && g.vpc_id.as_deref() == Some(vpc)))
    }

    /// Like [`lookup`](Self::lookup), but never lists.
    pub fn peek(&self, query: &str) -> Option<&GroupDescriptor> {
        self.index.as_ref().and_then(|index| index.get(query))
    }

    /// Every listed group, in listing order.
    pub fn groups(&mut self) -> Result<&[GroupDescriptor]> {
        Ok(&self.index()?.groups)
    }

    /// Drop the memoized listing so the next lookup lists again.
    pub fn refresh(&mut self) {
        self.index = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    /// Display name for a group id: `name (id)` when known.
    pub fn label(&self, id: &str) -> String {
        match self.peek(id) {
            Some(group) if group.id == id => format!("{} ({id})", group.name),
            _ => id.to_string(),
        }
    }
}
