use std::sync::Arc;

use serde_json::Value;

use super::{DataTree, NodeId, NodeKind};
use crate::{
    definition::CARDINALITY_UNLIMITED,
    error::{DataError, Result},
};

impl DataTree {
    fn array_items(&self, id: NodeId) -> Result<&Vec<NodeId>> {
        match &self.node(id)?.kind {
            NodeKind::Array { items, .. } => Ok(items),
            _ => Err(DataError::invalid_access(format!(
                "Data at {} is not multiple-valued.",
                self.address(id)?
            ))),
        }
    }

    fn array_items_mut(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>> {
        let address = self.address(id)?;
        match &mut self.node_mut(id)?.kind {
            NodeKind::Array { items, .. } => Ok(items),
            _ => Err(DataError::invalid_access(format!(
                "Data at {address} is not multiple-valued."
            ))),
        }
    }

    /// Number of items, after applying the array's default.
    pub fn count(&mut self, id: NodeId) -> Result<usize> {
        self.apply_default(id)?;
        Ok(self.array_items(id)?.len())
    }

    /// Whether another item fits within the cardinality.
    pub fn may_add_item(&mut self, id: NodeId) -> Result<bool> {
        let count = self.count(id)?;
        let cardinality = self.definition(id)?.cardinality();
        Ok(cardinality == CARDINALITY_UNLIMITED || cardinality > count as i64)
    }

    /// Gets the item at `delta`.
    ///
    /// Reading the delta one past the end creates that item, which allows
    /// building an array by successive reads.
    pub fn item(&mut self, id: NodeId, delta: usize) -> Result<NodeId> {
        if delta == self.count(id)? {
            return self.create_item(id);
        }
        self.array_items(id)?.get(delta).copied().ok_or_else(|| {
            DataError::invalid_access(format!("Offset {delta} not found."))
        })
    }

    /// Sets the item at `delta`, or appends when `delta` is `None` or one
    /// past the end.
    pub fn set_item(&mut self, id: NodeId, delta: Option<usize>, value: impl Into<Value>) -> Result<()> {
        let count = self.count(id)?;
        let delta = delta.unwrap_or(count);
        if delta == count {
            let item = self.create_item(id)?;
            return self.set(item, value);
        }
        let item = self.array_items(id)?.get(delta).copied().ok_or_else(|| {
            DataError::invalid_access(format!("Delta {delta} is not set."))
        })?;
        self.set(item, value)?;
        self.node_mut(id)?.set = true;
        Ok(())
    }

    /// Appends a new empty item.
    pub fn create_item(&mut self, id: NodeId) -> Result<NodeId> {
        let count = self.array_items(id)?.len();
        let cardinality = self.definition(id)?.cardinality();
        if cardinality != CARDINALITY_UNLIMITED && count as i64 >= cardinality {
            return Err(DataError::invalid_input(format!(
                "Unable to add an item to data '{}', already at maximum cardinality of {cardinality}.",
                self.address(id)?
            )));
        }
        let item = self.new_item(id, count)?;
        self.array_items_mut(id)?.push(item);
        self.node_mut(id)?.set = true;
        Ok(item)
    }

    /// Appends a new item regardless of cardinality.
    pub(super) fn push_item(&mut self, id: NodeId) -> Result<NodeId> {
        let delta = self.array_items(id)?.len();
        let item = self.new_item(id, delta)?;
        self.array_items_mut(id)?.push(item);
        Ok(item)
    }

    fn new_item(&mut self, id: NodeId, delta: usize) -> Result<NodeId> {
        let definition = match &self.node(id)?.kind {
            NodeKind::Array {
                delta_definition, ..
            } => Arc::clone(delta_definition),
            _ => return Err(DataError::invalid_access("Items can only be added to arrays.")),
        };
        self.create_node(definition, Some(id), Some(delta))
    }

    /// Inserts a new empty item at `delta`, shifting later items up.
    pub fn insert_before(&mut self, id: NodeId, delta: usize) -> Result<NodeId> {
        let count = self.count(id)?;
        if delta > count {
            return Err(DataError::invalid_access(format!(
                "Cannot insert before delta {delta} of {count} items at {}.",
                self.address(id)?
            )));
        }
        if !self.may_add_item(id)? {
            return Err(DataError::invalid_input(format!(
                "Unable to add an item to data '{}', already at maximum cardinality of {count}.",
                self.address(id)?
            )));
        }
        let item = self.new_item(id, delta)?;
        self.array_items_mut(id)?.insert(delta, item);
        self.node_mut(id)?.set = true;
        self.renumber(id, delta + 1)?;
        Ok(item)
    }

    /// Removes the item at `delta`, shifting later items down.
    pub fn remove_item(&mut self, id: NodeId, delta: usize) -> Result<()> {
        let items = self.array_items_mut(id)?;
        if delta >= items.len() {
            return Err(DataError::invalid_access(format!(
                "Attempt to remove nonexistent delta {delta}."
            )));
        }
        let removed = items.remove(delta);
        self.free_subtree(removed);
        self.renumber(id, delta)
    }

    /// Gives every item from `from` onwards its current position as delta
    /// and name.
    fn renumber(&mut self, id: NodeId, from: usize) -> Result<()> {
        let items = self.array_items(id)?.clone();
        for (delta, item) in items.into_iter().enumerate().skip(from) {
            let node = self.node_mut(item)?;
            node.delta = Some(delta);
            node.name = delta.to_string();
            self.invalidate_addresses(item)?;
        }
        debug!("Renumbered items of {} from delta {from}", self.address(id)?);
        Ok(())
    }

    /// Raw values of the items; only for arrays of simple data.
    pub fn values(&mut self, id: NodeId) -> Result<Vec<Value>> {
        if !self.definition(id)?.data_type().is_simple() {
            return Err(DataError::invalid_access(format!(
                "Only arrays of simple data have values(), at {}.",
                self.address(id)?
            )));
        }
        self.items(id)?
            .into_iter()
            .map(|item| self.raw_value(item))
            .collect()
    }

    /// Whether any item's value equals `value`.
    pub fn has_value(&mut self, id: NodeId, value: &Value) -> Result<bool> {
        for item in self.items(id)? {
            if self.value(item)? == *value {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Replaces all items.
    pub(super) fn set_array(&mut self, id: NodeId, value: Value) -> Result<()> {
        let values = match value {
            Value::Null => Vec::new(),
            Value::Array(values) => values,
            Value::Object(map) => {
                let keys: Vec<_> = map.keys().cloned().collect();
                let sequential = keys
                    .iter()
                    .enumerate()
                    .all(|(index, key)| *key == index.to_string());
                if !sequential {
                    return Err(DataError::invalid_input(format!(
                        "An array set on data at {} must have sequential numeric keys, got: {}.",
                        self.address(id)?,
                        keys.join(", ")
                    )));
                }
                map.into_iter().map(|(_, value)| value).collect()
            }
            scalar => vec![scalar],
        };

        let cardinality = self.definition(id)?.cardinality();
        if cardinality != CARDINALITY_UNLIMITED && values.len() as i64 > cardinality {
            return Err(DataError::invalid_input(format!(
                "Unable to set {} items on data '{}', maximum cardinality is {cardinality}.",
                values.len(),
                self.address(id)?
            )));
        }

        let items = self.array_items_mut(id)?;
        let surplus = items.split_off(values.len().min(items.len()));
        let existing = items.clone();
        for item in surplus {
            self.free_subtree(item);
        }
        self.node_mut(id)?.set = true;

        for (delta, value) in values.into_iter().enumerate() {
            let item = match existing.get(delta) {
                Some(item) => *item,
                None => self.create_item(id)?,
            };
            self.set(item, value)?;
        }
        Ok(())
    }

    /// Appends each element of a sequence, or a single value.
    pub(super) fn add_array(&mut self, id: NodeId, value: Value) -> Result<()> {
        let values = match value {
            Value::Array(values) => values,
            single => vec![single],
        };
        for value in values {
            let item = self.create_item(id)?;
            self.set(item, value)?;
        }
        Ok(())
    }

    /// Imports items by position, skipping anything that cannot be placed.
    pub(super) fn import_array(&mut self, id: NodeId, value: Value) -> Result<()> {
        self.node_mut(id)?.set = true;
        let entries: Vec<(Option<usize>, Value)> = match value {
            Value::Null => Vec::new(),
            Value::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(delta, value)| (Some(delta), value))
                .collect(),
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| (key.parse::<usize>().ok(), value))
                .collect(),
            scalar => vec![(Some(0), scalar)],
        };

        for (delta, value) in entries {
            let Some(delta) = delta else {
                warn!("Skipping non-numeric delta on import at {}", self.address(id)?);
                continue;
            };
            let existing = self.array_items(id)?.get(delta).copied();
            let item = match existing {
                Some(item) => item,
                None if self.may_add_item(id)? => self.create_item(id)?,
                None => {
                    warn!(
                        "Skipping delta {delta} on import at {}, cardinality reached",
                        self.address(id)?
                    );
                    continue;
                }
            };
            self.import(item, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{data::DataTree, definition::DataDefinition, factory::DataItemFactory};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn array(definition: DataDefinition) -> DataTree {
        DataItemFactory::shared()
            .create_from_definition(definition)
            .expect("tree")
    }

    fn strings() -> DataTree {
        array(DataDefinition::string().with_multiple(true))
    }

    #[test]
    fn test_set_then_values() {
        let mut data = strings();
        let root = data.root();
        let input = vec![json!("a"), json!("b"), json!("c")];
        data.set(root, input.clone()).expect("set");
        assert_eq!(data.values(root).expect("values"), input);
        assert_eq!(data.count(root).expect("count"), 3);

        data.set(root, json!(["z"])).expect("shrink");
        assert_eq!(data.values(root).expect("values"), [json!("z")]);

        data.set(root, json!([])).expect("clear");
        assert_eq!(data.count(root).expect("count"), 0);
        assert!(data.is_empty(root).expect("empty"));
    }

    #[test]
    fn test_set_non_sequential_keys() {
        let mut data = strings();
        let root = data.root();
        let err = data
            .set(root, json!({"0": "a", "2": "b"}))
            .expect_err("gap");
        assert!(err.is_invalid_input());
        data.set(root, json!({"0": "a", "1": "b"})).expect("keyed");
        assert_eq!(data.values(root).expect("values"), [json!("a"), json!("b")]);
    }

    #[test]
    fn test_scalar_set_replaces() {
        let mut data = strings();
        let root = data.root();
        data.set(root, json!(["a", "b"])).expect("set");
        data.set(root, "c").expect("scalar");
        assert_eq!(data.values(root).expect("values"), [json!("c")]);
    }

    #[test]
    fn test_add() {
        let mut data = strings();
        let root = data.root();
        data.add(root, "a").expect("one");
        data.add(root, json!(["b", "c"])).expect("many");
        assert_eq!(
            data.values(root).expect("values"),
            [json!("a"), json!("b"), json!("c")]
        );
    }

    #[test]
    fn test_cardinality_cap() {
        let mut data = array(
            DataDefinition::string()
                .with_cardinality(4)
                .expect("cardinality"),
        );
        let root = data.root();
        for letter in ["a", "b", "c"] {
            assert!(data.may_add_item(root).expect("may add"));
            data.add(root, letter).expect("add");
        }
        data.add(root, "d").expect("fourth");
        assert!(!data.may_add_item(root).expect("may add"));

        let err = data.add(root, "e").expect_err("fifth");
        assert!(err.is_invalid_input());
        assert!(data.create_item(root).expect_err("create").is_invalid_input());
        assert!(
            data.set(root, json!(["a", "b", "c", "d", "e"]))
                .expect_err("set five")
                .is_invalid_input()
        );
        assert_eq!(data.count(root).expect("count"), 4);
    }

    #[test]
    fn test_item_autovivify() {
        let mut data = strings();
        let root = data.root();
        let first = data.item(root, 0).expect("first");
        data.set(first, "a").expect("set");
        let second = data.item(root, 1).expect("second");
        assert_eq!(data.count(root).expect("count"), 2);
        assert!(data.is_empty(second).expect("empty"));

        assert!(data.item(root, 5).expect_err("gap").is_invalid_access());
    }

    #[test]
    fn test_set_item() {
        let mut data = strings();
        let root = data.root();
        data.set_item(root, None, "a").expect("append");
        data.set_item(root, Some(1), "b").expect("next");
        data.set_item(root, Some(0), "z").expect("replace");
        assert_eq!(data.values(root).expect("values"), [json!("z"), json!("b")]);
        assert!(
            data.set_item(root, Some(4), "x")
                .expect_err("gap")
                .is_invalid_access()
        );
    }

    #[test]
    fn test_remove_renumbers() {
        let mut data = strings();
        let root = data.root();
        data.set(root, json!(["a", "b", "c", "d"])).expect("set");
        let last = data.item(root, 3).expect("last");
        assert_eq!(data.address(last).expect("address"), "data:3");

        data.remove_item(root, 1).expect("remove");
        assert_eq!(
            data.values(root).expect("values"),
            [json!("a"), json!("c"), json!("d")]
        );
        assert_eq!(data.delta(last).expect("delta"), Some(2));
        assert_eq!(data.name(last).expect("name"), "2");
        assert_eq!(data.address(last).expect("address"), "data:2");

        assert!(data.remove_item(root, 3).expect_err("gone").is_invalid_access());
    }

    #[test]
    fn test_insert_before() {
        let mut data = strings();
        let root = data.root();
        data.set(root, json!(["a", "c"])).expect("set");
        let inserted = data.insert_before(root, 1).expect("insert");
        data.set(inserted, "b").expect("set b");
        assert_eq!(
            data.values(root).expect("values"),
            [json!("a"), json!("b"), json!("c")]
        );
        let last = data.item(root, 2).expect("last");
        assert_eq!(data.address(last).expect("address"), "data:2");
    }

    #[test]
    fn test_insert_before_full_array() {
        let mut data = array(
            DataDefinition::string()
                .with_cardinality(2)
                .expect("cardinality"),
        );
        let root = data.root();
        data.set(root, json!(["a", "b"])).expect("set");
        for delta in [0, 1, 2] {
            assert!(
                data.insert_before(root, delta)
                    .expect_err("full")
                    .is_invalid_input()
            );
        }
        assert_eq!(data.values(root).expect("values"), [json!("a"), json!("b")]);
    }

    #[test]
    fn test_over_full_array_rejects_more_items() {
        let mut data = array(
            DataDefinition::string()
                .with_cardinality(2)
                .expect("cardinality"),
        );
        let root = data.root();
        for _ in 0..3 {
            data.push_item(root).expect("push");
        }
        assert!(!data.may_add_item(root).expect("may add"));
        assert!(data.create_item(root).expect_err("create").is_invalid_input());
        assert!(data.add(root, "d").expect_err("add").is_invalid_input());
        assert!(data.insert_before(root, 0).expect_err("insert").is_invalid_input());
        assert_eq!(data.count(root).expect("count"), 3);
    }

    #[test]
    fn test_values_only_for_simple() {
        let mut data = array(
            DataDefinition::complex()
                .with_multiple(true)
                .with_properties([("one", DataDefinition::string())])
                .expect("properties"),
        );
        let root = data.root();
        assert!(data.values(root).expect_err("complex").is_invalid_access());
    }

    #[test]
    fn test_has_value() {
        let mut data = strings();
        let root = data.root();
        data.set(root, json!(["red", "green"])).expect("set");
        assert!(data.has_value(root, &json!("green")).expect("has"));
        assert!(!data.has_value(root, &json!("blue")).expect("has"));
    }

    #[test]
    fn test_import_skips_bad_deltas() {
        let mut data = array(
            DataDefinition::string()
                .with_cardinality(2)
                .expect("cardinality"),
        );
        let root = data.root();
        data.import(root, json!({"0": "a", "x": "skipped", "1": "b", "2": "over"}))
            .expect("import");
        assert_eq!(data.values(root).expect("values"), [json!("a"), json!("b")]);
        assert!(data.is_set(root).expect("set"));
    }
}
