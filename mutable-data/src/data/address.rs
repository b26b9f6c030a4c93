use std::cell::OnceCell;

use super::{DataTree, NodeId, NodeKind, NodeType};
use crate::{
    definition::ADDRESS_SEPARATOR,
    error::{DataError, Result},
};

const CURRENT: &str = ".";
const PARENT: &str = "..";

impl DataTree {
    /// The node's address: the root name followed by the name or delta of
    /// every node down to this one, joined with `:`.
    pub fn address(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        if let Some(address) = node.address.get() {
            return Ok(address.clone());
        }
        let address = match node.parent {
            Some(parent) => format!("{}{ADDRESS_SEPARATOR}{}", self.address(parent)?, node.name),
            None => node.name.clone(),
        };
        // The cache only fails to take the value if it was filled meanwhile.
        let _ = node.address.set(address.clone());
        Ok(address)
    }

    /// Clears cached addresses of a node and all of its descendants.
    pub(super) fn invalidate_addresses(&mut self, id: NodeId) -> Result<()> {
        let mut ids = Vec::new();
        self.walk(id, |_, node| ids.push(node))?;
        for node in ids {
            self.node_mut(node)?.address = OnceCell::new();
        }
        Ok(())
    }

    /// Resolves an address to a node.
    ///
    /// Addresses starting with `.` are relative to `id`, and each leading
    /// `..` ascends one level. Any other address is absolute, its first
    /// segment naming the root. Property segments instantiate their node;
    /// delta segments must name an existing item.
    pub fn get_item(&mut self, id: NodeId, address: &str) -> Result<NodeId> {
        let mut segments: Vec<&str> = address.split(ADDRESS_SEPARATOR).collect();
        let mut current = id;
        match segments.first().copied() {
            Some(CURRENT) => {
                segments.remove(0);
            }
            Some(PARENT) => {}
            _ => {
                current = self.root();
                segments.remove(0);
            }
        }

        for segment in segments {
            trace!("Resolving '{segment}' of '{address}' from {}", self.address(current)?);
            current = self.child_for_segment(current, segment, address)?;
        }
        Ok(current)
    }

    fn child_for_segment(&mut self, current: NodeId, segment: &str, address: &str) -> Result<NodeId> {
        if segment == PARENT {
            return self.parent(current)?.ok_or_else(|| {
                DataError::invalid_address(format!(
                    "Unable to go higher than the root with address '{address}'."
                ))
            });
        }
        let not_found = |tree: &Self| -> Result<DataError> {
            Ok(DataError::invalid_address(format!(
                "Unable to get child item '{segment}' from item with address '{}' in request for item '{address}'.",
                tree.address(current)?
            )))
        };

        if let Ok(delta) = segment.parse::<usize>() {
            let item = match &self.node(current)?.kind {
                NodeKind::Array { items, .. } => items.get(delta).copied(),
                _ => None,
            };
            return match item {
                Some(item) => Ok(item),
                None => Err(not_found(self)?),
            };
        }
        match self.node_type(current)? {
            NodeType::Simple => Err(DataError::invalid_address(format!(
                "Unable to get child item '{segment}' from simple item with address '{}'.",
                self.address(current)?
            ))),
            NodeType::Complex | NodeType::Mutable if self.has_property(current, segment)? => {
                self.get_property(current, segment)
            }
            NodeType::Array | NodeType::Complex | NodeType::Mutable => Err(not_found(self)?),
        }
    }

    /// Rewrites an address starting with `.` or `..` into an absolute one,
    /// without checking that it resolves.
    ///
    /// Any other address is returned unchanged.
    pub fn relative_address_to_absolute(&self, id: NodeId, relative: &str) -> Result<String> {
        let mut segments = relative.split(ADDRESS_SEPARATOR).peekable();
        let mut current = id;
        match segments.peek().copied() {
            Some(CURRENT) => {
                segments.next();
            }
            Some(PARENT) => {
                while segments.next_if_eq(&PARENT).is_some() {
                    current = self.parent(current)?.ok_or_else(|| {
                        DataError::invalid_address(format!(
                            "Unable to go higher than the root with address '{relative}'."
                        ))
                    })?;
                }
            }
            _ => return Ok(relative.to_string()),
        }

        let mut absolute = self.address(current)?;
        for segment in segments {
            absolute.push(ADDRESS_SEPARATOR);
            absolute.push_str(segment);
        }
        Ok(absolute)
    }
}
