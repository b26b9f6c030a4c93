use std::{cell::OnceCell, fmt, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;

use super::{DEFAULT_ROOT_NAME, Node, NodeId, NodeKind, NodeType, VariantState};
use crate::{
    definition::{DataDefinition, DefinitionKind},
    error::{DataError, Result},
    factory::DataItemFactory,
};

/// An arena slot; `generation` is bumped whenever its node is freed.
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A tree of data built from a definition.
///
/// All operations take the [`NodeId`] of the node they act on. Reading a
/// property instantiates it, so most accessors need `&mut self`.
pub struct DataTree {
    pub(super) factory: Arc<DataItemFactory>,
    nodes: Vec<Slot>,
    /// Indexes of empty slots, reused before the arena grows.
    free: Vec<usize>,
    root: NodeId,
    pub(super) definition_source: Option<String>,
    /// Nodes whose default expression or callable is being evaluated.
    pub(super) evaluating: Vec<NodeId>,
}

impl fmt::Debug for DataTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTree")
            .field("root", &self.root)
            .field("definition_source", &self.definition_source)
            .field("data", &self.raw_value(self.root).unwrap_or(Value::Null))
            .finish()
    }
}

impl DataTree {
    pub(crate) fn new(factory: Arc<DataItemFactory>, definition: Arc<DataDefinition>) -> Result<Self> {
        let mut tree = Self {
            factory,
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            definition_source: None,
            evaluating: Vec::new(),
        };
        tree.root = tree.create_node(definition, None, None)?;
        Ok(tree)
    }

    /// Instantiates a node for `definition`.
    ///
    /// Non-root nodes take their name from the delta when inside an array,
    /// and otherwise from the definition, which must then have one.
    pub(crate) fn create_node(
        &mut self,
        definition: Arc<DataDefinition>,
        parent: Option<NodeId>,
        delta: Option<usize>,
    ) -> Result<NodeId> {
        let name = match (delta, definition.name(), parent) {
            (Some(delta), _, _) => delta.to_string(),
            (None, Some(name), _) => name.to_string(),
            (None, None, None) => DEFAULT_ROOT_NAME.to_string(),
            (None, None, Some(_)) => {
                return Err(DataError::definition(
                    "Non-root properties must have a machine name.",
                ));
            }
        };

        let kind = match definition.kind() {
            DefinitionKind::Simple(_) => NodeKind::Simple { value: Value::Null },
            DefinitionKind::Array => NodeKind::Array {
                items: Vec::new(),
                delta_definition: Arc::new(definition.delta_definition()),
            },
            DefinitionKind::Complex => NodeKind::Complex {
                children: IndexMap::new(),
            },
            DefinitionKind::Mutable => {
                if definition.properties().len() != 1 {
                    return Err(DataError::definition(format!(
                        "Mutable data '{name}' must have exactly one property, found {}.",
                        definition.properties().len()
                    )));
                }
                if definition.variants().is_empty() {
                    return Err(DataError::definition(format!(
                        "Variant property on mutable data '{name}' has no variants set."
                    )));
                }
                NodeKind::Mutable {
                    children: IndexMap::new(),
                    variant: VariantState::Unselected,
                }
            }
        };

        let node = Node {
            name,
            delta,
            definition,
            parent,
            set: false,
            reveal_internal: false,
            address: OnceCell::new(),
            kind,
        };
        if let Some(index) = self.free.pop()
            && let Some(slot) = self.nodes.get_mut(index)
        {
            slot.node = Some(node);
            return Ok(NodeId {
                index,
                generation: slot.generation,
            });
        }
        let index = self.nodes.len();
        self.nodes.push(Slot {
            generation: 0,
            node: Some(node),
        });
        Ok(NodeId {
            index,
            generation: 0,
        })
    }

    pub(super) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(|| DataError::invalid_access(format!("Data node {id} does not exist.")))
    }

    pub(super) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| DataError::invalid_access(format!("Data node {id} does not exist.")))
    }

    /// Child nodes in tree order, without instantiating anything.
    pub(super) fn child_ids(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            NodeKind::Simple { .. } => Vec::new(),
            NodeKind::Array { items, .. } => items.clone(),
            NodeKind::Complex { children } | NodeKind::Mutable { children, .. } => {
                // Declared order, not instantiation order.
                let mut ids = Vec::with_capacity(children.len());
                for name in self.active_properties(id)?.keys() {
                    if let Some(child) = children.get(name) {
                        ids.push(*child);
                    }
                }
                ids
            }
        })
    }

    /// Drops a node and everything below it from the arena, leaving their
    /// slots for reuse.
    pub(super) fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self
                .nodes
                .get_mut(current.index)
                .filter(|slot| slot.generation == current.generation)
            else {
                continue;
            };
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                match node.kind {
                    NodeKind::Array { items, .. } => stack.extend(items),
                    NodeKind::Complex { children } | NodeKind::Mutable { children, .. } => {
                        stack.extend(children.into_values())
                    }
                    NodeKind::Simple { .. } => {}
                }
            }
        }
    }

    // ---- accessors ----

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn factory(&self) -> &Arc<DataItemFactory> {
        &self.factory
    }

    /// Name of the definition source this tree was built from, if any.
    pub fn definition_source(&self) -> Option<&str> {
        self.definition_source.as_deref()
    }

    pub(crate) fn set_definition_source(&mut self, name: impl Into<String>) {
        self.definition_source = Some(name.into());
    }

    /// Whether `id` refers to a node still in the tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn node_type(&self, id: NodeId) -> Result<NodeType> {
        Ok(self.node(id)?.kind.node_type())
    }

    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(&self.node(id)?.name)
    }

    /// Position within the parent array, for array items.
    pub fn delta(&self, id: NodeId) -> Result<Option<usize>> {
        Ok(self.node(id)?.delta)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn definition(&self, id: NodeId) -> Result<&Arc<DataDefinition>> {
        Ok(&self.node(id)?.definition)
    }

    /// Whether a value was set explicitly, imported, or applied as a default.
    pub fn is_set(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.set)
    }

    /// The definition label, followed by the 1-based position for array items.
    pub fn label(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        let mut label = node.definition.label().to_string();
        if let Some(delta) = node.delta {
            label.push_str(&format!(": {}", delta + 1));
        }
        Ok(label)
    }

    /// Makes internal properties visible on this node and every node below
    /// it that exists now.
    pub fn show_internal(&mut self, id: NodeId) -> Result<()> {
        let mut ids = Vec::new();
        self.walk(id, |_, node| ids.push(node))?;
        for node in ids {
            self.node_mut(node)?.reveal_internal = true;
        }
        Ok(())
    }

    /// Visits this node and its instantiated descendants, parents first.
    pub fn walk<F>(&self, id: NodeId, mut callback: F) -> Result<()>
    where
        F: FnMut(&DataTree, NodeId),
    {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            callback(self, current);
            let children = self.child_ids(current)?;
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    /// Child nodes: items of an array, instantiated properties of a complex
    /// or mutable node, and the node itself for simple data.
    pub fn items(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        match self.node_type(id)? {
            NodeType::Simple => Ok(vec![id]),
            NodeType::Array => {
                self.apply_default(id)?;
                self.child_ids(id)
            }
            NodeType::Complex | NodeType::Mutable => self.child_ids(id),
        }
    }

    /// Removes this node from its parent.
    pub fn unset(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let parent = node.parent.ok_or_else(|| {
            DataError::invalid_access("unset() may not be called on the root data.")
        })?;
        if let Some(delta) = node.delta {
            return self.remove_item(parent, delta);
        }
        let name = node.name.clone();
        self.remove_property(parent, &name)
    }

    /// Instantiates every visible node below this one and applies defaults.
    pub fn access(&mut self, id: NodeId) -> Result<()> {
        match self.node_type(id)? {
            NodeType::Simple => {
                self.value(id)?;
            }
            NodeType::Array => {
                for item in self.items(id)? {
                    self.access(item)?;
                }
            }
            NodeType::Complex | NodeType::Mutable => {
                for (_, child) in self.properties(id)? {
                    self.access(child)?;
                }
            }
        }
        Ok(())
    }

    // ---- values ----

    /// Sets the value: a scalar for simple data, a sequence for arrays, and
    /// a map of property values for complex and mutable data.
    pub fn set(&mut self, id: NodeId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.node_type(id)? {
            NodeType::Simple => self.set_simple(id, value),
            NodeType::Array => self.set_array(id, value),
            NodeType::Complex => self.set_complex(id, value),
            NodeType::Mutable => self.set_mutable(id, value),
        }
    }

    /// Appends to arrays; same as [`set`](Self::set) for everything else.
    pub fn add(&mut self, id: NodeId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.node_type(id)? {
            NodeType::Array => self.add_array(id, value),
            _ => self.set(id, value),
        }
    }

    /// Sets a value previously produced by [`export`](Self::export).
    ///
    /// Unlike [`set`](Self::set), data for properties the definition no
    /// longer has is skipped rather than rejected.
    pub fn import(&mut self, id: NodeId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.node_type(id)? {
            NodeType::Simple => self.set_simple(id, value),
            NodeType::Array => self.import_array(id, value),
            NodeType::Complex => self.import_complex(id, value),
            NodeType::Mutable => self.import_mutable(id, value),
        }
    }

    /// The plain nested form of the data, applying defaults.
    ///
    /// Null values of properties are omitted.
    pub fn export(&mut self, id: NodeId) -> Result<Value> {
        match self.node_type(id)? {
            NodeType::Simple => self.value(id),
            NodeType::Array => {
                let mut export = Vec::new();
                for item in self.items(id)? {
                    export.push(self.export(item)?);
                }
                Ok(Value::Array(export))
            }
            NodeType::Complex | NodeType::Mutable => {
                let mut export = serde_json::Map::new();
                for child in self.child_ids(id)? {
                    let value = self.export(child)?;
                    if !value.is_null() {
                        export.insert(self.name(child)?.to_string(), value);
                    }
                }
                Ok(Value::Object(export))
            }
        }
    }

    /// Like [`export`](Self::export), without applying defaults.
    pub fn raw_value(&self, id: NodeId) -> Result<Value> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Simple { value } => Ok(value.clone()),
            NodeKind::Array { items, .. } => items
                .iter()
                .map(|item| self.raw_value(*item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            NodeKind::Complex { .. } | NodeKind::Mutable { .. } => {
                let mut raw = serde_json::Map::new();
                for child in self.child_ids(id)? {
                    let value = self.raw_value(child)?;
                    if !value.is_null() {
                        raw.insert(self.name(child)?.to_string(), value);
                    }
                }
                Ok(Value::Object(raw))
            }
        }
    }

    /// The value of the node, applying its default when it has none.
    ///
    /// For arrays, complex and mutable data this is the same as
    /// [`export`](Self::export).
    pub fn value(&mut self, id: NodeId) -> Result<Value> {
        if self.node_type(id)? != NodeType::Simple {
            return self.export(id);
        }
        if self.is_empty(id)? && self.definition(id)?.has_default() {
            self.apply_default(id)?;
        }
        self.raw_value(id)
    }

    /// Whether the node holds no data.
    ///
    /// Empty strings, zero and `false` are values, not emptiness.
    pub fn is_empty(&self, id: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Simple { value } => Ok(value.is_null()),
            NodeKind::Array { items, .. } => {
                for item in items {
                    if !self.is_empty(*item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NodeKind::Complex { children } => {
                for name in self.visible_properties(id)?.keys() {
                    if let Some(child) = children.get(name)
                        && !self.is_empty(*child)?
                    {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NodeKind::Mutable { children, .. } => {
                let variant_name = self.variant_property_name(id)?;
                match children.get(&variant_name) {
                    Some(child) => self.is_empty(*child),
                    None => Ok(true),
                }
            }
        }
    }

    /// Tells every ancestor and the factory's change listeners that a
    /// simple node changed.
    pub(super) fn notify_change(&mut self, changed: NodeId, value: &Value) -> Result<()> {
        let mut current = self.node(changed)?.parent;
        while let Some(id) = current {
            if self.is_variant_child(id, changed)? {
                self.set_variant(id, value, false)?;
            }
            current = self.node(id)?.parent;
        }
        let factory = Arc::clone(&self.factory);
        for listener in factory.change_listeners() {
            listener(self, changed, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DataDefinition;
    use serde_json::json;

    fn tree(definition: DataDefinition) -> DataTree {
        DataItemFactory::shared()
            .create_from_definition(definition)
            .expect("tree")
    }

    #[test]
    fn test_root_name() {
        let data = tree(DataDefinition::string());
        assert_eq!(data.name(data.root()).expect("name"), "data");

        let data = tree(DataDefinition::string().with_name("colour").expect("name"));
        assert_eq!(data.name(data.root()).expect("name"), "colour");
        assert_eq!(data.parent(data.root()).expect("parent"), None);
    }

    #[test]
    fn test_unnamed_child_rejected() {
        let mut data = tree(DataDefinition::complex());
        let definition = Arc::new(DataDefinition::string());
        let root = data.root();
        let err = data
            .create_node(definition, Some(root), None)
            .expect_err("unnamed child");
        assert!(err.is_definition());
    }

    #[test]
    fn test_mutable_without_variants_rejected() {
        let definition = DataDefinition::mutable()
            .with_properties([("kind", DataDefinition::string())])
            .expect("property");
        let err = DataItemFactory::shared()
            .create_from_definition(definition)
            .expect_err("no variants");
        assert!(err.is_definition());
    }

    #[test]
    fn test_unset_root_rejected() {
        let mut data = tree(DataDefinition::string());
        let root = data.root();
        assert!(data.unset(root).expect_err("root").is_invalid_access());
    }

    #[test]
    fn test_walk_order() {
        let mut data = tree(
            DataDefinition::complex()
                .with_name("root")
                .expect("name")
                .with_properties([
                    ("one", DataDefinition::string()),
                    ("two", DataDefinition::string().with_multiple(true)),
                ])
                .expect("properties"),
        );
        let root = data.root();
        data.set(root, json!({"two": ["a", "b"], "one": "x"}))
            .expect("set");

        let mut seen = Vec::new();
        data.walk(root, |tree, id| {
            seen.push(tree.address(id).expect("address"));
        })
        .expect("walk");
        assert_eq!(
            seen,
            ["root", "root:one", "root:two", "root:two:0", "root:two:1"]
        );
    }

    #[test]
    fn test_stale_node() {
        let mut data = tree(
            DataDefinition::complex()
                .with_properties([("one", DataDefinition::string())])
                .expect("properties"),
        );
        let root = data.root();
        let one = data.get_property(root, "one").expect("one");
        data.unset(one).expect("unset");
        assert!(!data.contains(one));
        assert!(data.name(one).expect_err("stale").is_invalid_access());
    }

    #[test]
    fn test_freed_slots_reused() {
        let mut data = tree(DataDefinition::string().with_multiple(true));
        let root = data.root();
        let first = data.create_item(root).expect("first");
        data.remove_item(root, 0).expect("remove");

        let second = data.create_item(root).expect("second");
        assert_eq!(second.index(), first.index());
        assert_ne!(second, first);
        assert!(!data.contains(first));
        assert!(data.value(first).expect_err("stale").is_invalid_access());

        for _ in 0..10 {
            data.set(root, json!(["a", "b", "c"])).expect("set");
            data.set(root, json!([])).expect("clear");
        }
        data.set(root, json!(["x"])).expect("set");
        let item = data.item(root, 0).expect("item");
        assert!(item.index() <= 3, "{item}");
    }
}
