use serde_json::{Number, Value};

use super::{DataTree, NodeId, NodeKind};
use crate::{
    definition::DataType,
    error::{DataError, Result},
};

impl DataTree {
    /// Sets a scalar on simple data, then notifies ancestors.
    ///
    /// If an ancestor rejects the change the previous value is restored.
    pub(super) fn set_simple(&mut self, id: NodeId, value: Value) -> Result<()> {
        let data_type = self.definition(id)?.data_type();
        let value = self.coerce(id, data_type, value)?;

        let node = self.node_mut(id)?;
        let NodeKind::Simple { value: current } = &mut node.kind else {
            return Err(DataError::invalid_access(format!(
                "Node {id} is not simple data."
            )));
        };
        let previous = std::mem::replace(current, value.clone());
        let was_set = std::mem::replace(&mut node.set, true);

        if let Err(err) = self.notify_change(id, &value) {
            let node = self.node_mut(id)?;
            if let NodeKind::Simple { value } = &mut node.kind {
                *value = previous;
            }
            node.set = was_set;
            return Err(err);
        }
        Ok(())
    }

    fn coerce(&self, id: NodeId, data_type: DataType, value: Value) -> Result<Value> {
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            return Err(DataError::invalid_input(format!(
                "Simple data may only have scalar or null values; got '{value}' at address {}.",
                self.address(id)?
            )));
        }
        let coerced = match (data_type, value) {
            (_, Value::Null) => Some(Value::Null),
            (DataType::String, Value::String(s)) => Some(Value::String(s)),
            (DataType::String, other) => Some(Value::String(other.to_string())),
            (DataType::Boolean, value) => match value {
                Value::Bool(b) => Some(Value::Bool(b)),
                Value::Number(n) if n.as_f64() == Some(0.0) => Some(Value::Bool(false)),
                Value::Number(n) if n.as_f64() == Some(1.0) => Some(Value::Bool(true)),
                Value::String(s) if s == "0" => Some(Value::Bool(false)),
                Value::String(s) if s == "1" => Some(Value::Bool(true)),
                _ => None,
            },
            (DataType::Integer, value) => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Some(Value::Number(n)),
                Value::Number(n) => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| Value::from(f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            (DataType::Number, value) => match value {
                Value::Number(n) => Some(Value::Number(n)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            },
            (DataType::Complex | DataType::Mutable, _) => None,
        };
        coerced.ok_or_else(|| match self.address(id) {
            Ok(address) => DataError::invalid_input(format!(
                "{} data may not have the given value at address {address}.",
                capitalize(data_type.as_str())
            )),
            Err(err) => err,
        })
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
