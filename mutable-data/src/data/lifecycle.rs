//! Suspending a tree to plain data, and resuming it later.
//!
//! Suspended data keeps values and set state but no definitions. The root
//! records the name of the definition source it was built from; resuming
//! rebuilds the definition from that source and reattaches it node by node.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DataTree, NodeId, NodeKind, VariantState};
use crate::{
    error::{DataError, Result},
    factory::DataItemFactory,
};

/// A suspended tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendedData {
    /// Name of the definition source registered on the factory.
    pub definition_source: String,
    pub root: SuspendedItem,
}

/// A suspended node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendedItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<usize>,
    pub set: bool,
    #[serde(flatten)]
    pub kind: SuspendedKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SuspendedKind {
    Simple {
        value: Value,
    },
    Array {
        items: Vec<SuspendedItem>,
    },
    Complex {
        children: IndexMap<String, SuspendedItem>,
    },
    Mutable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
        children: IndexMap<String, SuspendedItem>,
    },
}

impl DataTree {
    /// Suspends the whole tree.
    ///
    /// Only trees built from a named definition source can be suspended.
    pub fn suspend(&self) -> Result<SuspendedData> {
        let definition_source = self.definition_source.clone().ok_or_else(|| {
            DataError::definition(
                "Data that does not use a definition source may not be suspended.",
            )
        })?;
        let root = self.suspend_item(self.root())?;
        debug!("Suspended data from definition source '{definition_source}'");
        Ok(SuspendedData {
            definition_source,
            root,
        })
    }

    fn suspend_item(&self, id: NodeId) -> Result<SuspendedItem> {
        let node = self.node(id)?;
        let suspend_children = |children: &IndexMap<String, NodeId>| -> Result<IndexMap<String, SuspendedItem>> {
            let mut suspended = IndexMap::new();
            for child in self.child_ids(id)? {
                let name = self.name(child)?.to_string();
                if children.contains_key(&name) {
                    suspended.insert(name, self.suspend_item(child)?);
                }
            }
            Ok(suspended)
        };
        let kind = match &node.kind {
            NodeKind::Simple { value } => SuspendedKind::Simple {
                value: value.clone(),
            },
            NodeKind::Array { items, .. } => SuspendedKind::Array {
                items: items
                    .iter()
                    .map(|item| self.suspend_item(*item))
                    .collect::<Result<_>>()?,
            },
            NodeKind::Complex { children } => SuspendedKind::Complex {
                children: suspend_children(children)?,
            },
            NodeKind::Mutable { children, variant } => SuspendedKind::Mutable {
                variant: match variant {
                    VariantState::Unselected => None,
                    VariantState::Selected { variant, .. } => Some(variant.clone()),
                },
                children: suspend_children(children)?,
            },
        };
        Ok(SuspendedItem {
            name: node.name.clone(),
            delta: node.delta,
            set: node.set,
            kind,
        })
    }

    /// Rebuilds a suspended tree against a fresh definition.
    pub(crate) fn resume(factory: Arc<DataItemFactory>, suspended: SuspendedData) -> Result<Self> {
        let source = factory.definition_source(&suspended.definition_source)?;
        let definition = Arc::new(source()?);
        let mut tree = DataTree::new(factory, definition)?;
        tree.definition_source = Some(suspended.definition_source);
        let root = tree.root();
        tree.restore(root, suspended.root)?;
        debug!("Resumed data at {}", tree.address(root)?);
        Ok(tree)
    }

    fn restore(&mut self, id: NodeId, item: SuspendedItem) -> Result<()> {
        let mismatch = |tree: &Self| -> Result<DataError> {
            Ok(DataError::definition(format!(
                "Suspended data at {} does not match its definition.",
                tree.address(id)?
            )))
        };
        self.node_mut(id)?.set = item.set;

        match item.kind {
            SuspendedKind::Simple { value } => match &mut self.node_mut(id)?.kind {
                NodeKind::Simple { value: current } => *current = value,
                _ => return Err(mismatch(self)?),
            },
            SuspendedKind::Array { items } => {
                if !matches!(self.node(id)?.kind, NodeKind::Array { .. }) {
                    return Err(mismatch(self)?);
                }
                for child in items {
                    let node = self.push_item(id)?;
                    self.restore(node, child)?;
                }
            }
            SuspendedKind::Complex { children } => {
                if !matches!(self.node(id)?.kind, NodeKind::Complex { .. }) {
                    return Err(mismatch(self)?);
                }
                self.restore_children(id, children)?;
            }
            SuspendedKind::Mutable { variant, children } => {
                if !matches!(self.node(id)?.kind, NodeKind::Mutable { .. }) {
                    return Err(mismatch(self)?);
                }
                match variant {
                    Some(variant) if self.definition(id)?.variant(&variant).is_none() => {
                        warn!(
                            "Skipping suspended variant '{variant}' at {}, no longer defined",
                            self.address(id)?
                        );
                        self.node_mut(id)?.set = false;
                        return Ok(());
                    }
                    Some(variant) => self.restore_variant(id, &variant)?,
                    None => {}
                }
                self.restore_children(id, children)?;
            }
        }
        Ok(())
    }

    fn restore_children(&mut self, id: NodeId, children: IndexMap<String, SuspendedItem>) -> Result<()> {
        for (name, child) in children {
            if !self.has_property(id, &name)? {
                warn!(
                    "Skipping suspended property '{name}' at {}, no longer defined",
                    self.address(id)?
                );
                continue;
            }
            let node = self.get_property(id, &name)?;
            self.restore(node, child)?;
        }
        Ok(())
    }
}
