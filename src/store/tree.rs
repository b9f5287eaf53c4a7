//! JSON tree helpers shared by the store clients.

use super::{ChildEvent, NodePath, NodeValue};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub(crate) fn lookup<'a>(root: &'a Value, path: &NodePath) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

pub(crate) fn set(root: &mut Value, path: &NodePath, value: Value) {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        *root = match value {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            if value.is_null() {
                return;
            }
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        if value.is_null() {
            return;
        }
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        if value.is_null() {
            map.remove(*last);
        } else {
            map.insert(last.to_string(), value);
        }
    }
}

/// Drop nulls and empty objects below the root.
pub(crate) fn prune(value: &mut Value) {
    if let Value::Object(map) = value {
        for child in map.values_mut() {
            prune(child);
        }
        map.retain(|_, child| match child {
            Value::Null => false,
            Value::Object(inner) => !inner.is_empty(),
            _ => true,
        });
    }
}

fn children(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

pub(crate) fn diff_children(before: Option<&Value>, after: Option<&Value>) -> Vec<ChildEvent> {
    let empty = Map::new();
    let before = children(before).unwrap_or(&empty);
    let after = children(after).unwrap_or(&empty);
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    keys.into_iter()
        .filter_map(|key| match (before.get(key), after.get(key)) {
            (None, Some(value)) => Some(ChildEvent::Added {
                key: key.clone(),
                value: NodeValue::from_json(value.clone()),
            }),
            (Some(old), Some(new)) if old != new => Some(ChildEvent::Changed {
                key: key.clone(),
                value: NodeValue::from_json(new.clone()),
            }),
            (Some(_), None) => Some(ChildEvent::Removed { key: key.clone() }),
            _ => None,
        })
        .collect()
}
