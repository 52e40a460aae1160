use std::collections::BTreeMap;

use serde::Serialize;

use crate::resizer::Resizer;

/// A single statistics value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Str(String),
    I64(i64),
    F64(f64),
}

impl StatValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StatValue::I64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::F64(value) => Some(*value),
            _ => None,
        }
    }
}

/// Point-in-time utilization of every node of a resizer tree, flattened into
/// dotted keys.
///
/// For a node at path `cache.stream-info` the entries are
/// `cache.stream-info.name`, `cache.stream-info.sizeBytes`,
/// `cache.stream-info.capacityBytes` and
/// `cache.stream-info.utilizationPercent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CacheStats {
    entries: BTreeMap<String, StatValue>,
}

impl CacheStats {
    pub fn collect(root: &Resizer) -> Self {
        let mut entries = BTreeMap::new();
        root.walk(|path, node| {
            let size = node.size();
            let capacity = node.capacity();
            entries.insert(
                format!("{path}.name"),
                StatValue::Str(node.name().to_owned()),
            );
            entries.insert(format!("{path}.sizeBytes"), StatValue::I64(size));
            entries.insert(format!("{path}.capacityBytes"), StatValue::I64(capacity));
            entries.insert(
                format!("{path}.utilizationPercent"),
                StatValue::F64(utilization_percent(size, capacity)),
            );
        });
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, StatValue> {
        self.entries
    }
}

/// `100 * size / capacity`; zero for an empty capacity.
pub fn utilization_percent(size: i64, capacity: i64) -> f64 {
    if capacity <= 0 {
        return 0.0;
    }
    100.0 * size as f64 / capacity as f64
}
