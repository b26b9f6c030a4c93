//! Data (instance) tree.
//!
//! A [`DataTree`] is an arena of nodes built from a shared
//! [`DataDefinition`](crate::definition::DataDefinition). Nodes are referred
//! to by [`NodeId`]; a removed node's id stays invalid for the life of the
//! tree.
//!
//! Every node is one of four kinds:
//!
//! - **simple**: a scalar value or null
//! - **array**: an ordered list of items, each addressed by its delta
//! - **complex**: named properties, instantiated on first access
//! - **mutable**: a variant property whose value selects further properties

mod address;
mod array;
mod complex;
mod defaults;
mod item;
mod lifecycle;
mod mutable;
mod tree;
mod validate;

use std::{cell::OnceCell, fmt, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;

use crate::definition::DataDefinition;

pub use lifecycle::{SuspendedData, SuspendedItem, SuspendedKind};
pub use tree::DataTree;
pub use validate::Violations;

/// Handle to a node of a [`DataTree`].
///
/// Slots of removed nodes are reused; the generation tells a handle to a
/// removed node apart from the node that later took its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Name given to a root whose definition has no machine name.
pub const DEFAULT_ROOT_NAME: &str = "data";

pub(crate) struct Node {
    name: String,
    delta: Option<usize>,
    definition: Arc<DataDefinition>,
    parent: Option<NodeId>,
    set: bool,
    reveal_internal: bool,
    address: OnceCell<String>,
    kind: NodeKind,
}

pub(crate) enum NodeKind {
    Simple {
        value: Value,
    },
    Array {
        items: Vec<NodeId>,
        delta_definition: Arc<DataDefinition>,
    },
    Complex {
        children: IndexMap<String, NodeId>,
    },
    Mutable {
        children: IndexMap<String, NodeId>,
        variant: VariantState,
    },
}

/// The kind of a data node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Simple,
    Array,
    Complex,
    Mutable,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeType::Simple => "simple",
            NodeType::Array => "array",
            NodeType::Complex => "complex",
            NodeType::Mutable => "mutable",
        })
    }
}

impl NodeKind {
    fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Simple { .. } => NodeType::Simple,
            NodeKind::Array { .. } => NodeType::Array,
            NodeKind::Complex { .. } => NodeType::Complex,
            NodeKind::Mutable { .. } => NodeType::Mutable,
        }
    }

    /// Instantiated named children, for complex and mutable nodes.
    fn children(&self) -> Option<&IndexMap<String, NodeId>> {
        match self {
            NodeKind::Complex { children } | NodeKind::Mutable { children, .. } => Some(children),
            _ => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut IndexMap<String, NodeId>> {
        match self {
            NodeKind::Complex { children } | NodeKind::Mutable { children, .. } => Some(children),
            _ => None,
        }
    }
}

/// Selection state of a mutable node.
pub(crate) enum VariantState {
    /// Only the variant property is available.
    Unselected,
    Selected {
        variant: String,
        /// The variant property followed by the variant's own properties.
        properties: IndexMap<String, Arc<DataDefinition>>,
    },
}
