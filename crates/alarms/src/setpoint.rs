use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    #[serde(alias = "valor")]
    pub value: f64,
    #[serde(default, alias = "unidad")]
    pub unit: String,
}

impl Setpoint {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// Target values consulted by relative-to-setpoint conditions.
///
/// Owned and mutated by the host; the evaluator only reads it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetpointStore {
    entries: HashMap<String, Setpoint>,
}

impl SetpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, tag: impl Into<String>, setpoint: Setpoint) -> Option<Setpoint> {
        self.entries.insert(tag.into(), setpoint)
    }

    pub fn remove(&mut self, tag: &str) -> Option<Setpoint> {
        self.entries.remove(tag)
    }

    pub fn get(&self, tag: &str) -> Option<&Setpoint> {
        self.entries.get(tag)
    }

    pub fn value(&self, tag: &str) -> Option<f64> {
        self.entries.get(tag).map(|sp| sp.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plant_document_keys() {
        let store = SetpointStore::from_json_str(
            r#"{
                "2270-TAH-11801": {"valor": 70.0, "unidad": "°C"},
                "2270-TIC-11801": {"value": 72.5}
            }"#,
        )
        .unwrap();
        assert_eq!(store.value("2270-TAH-11801"), Some(70.0));
        assert_eq!(store.get("2270-TAH-11801").unwrap().unit, "°C");
        assert_eq!(store.value("2270-TIC-11801"), Some(72.5));
        assert_eq!(store.value("2270-TAL-11801"), None);
    }

    #[test]
    fn set_and_remove() {
        let mut store = SetpointStore::new();
        assert!(store.set("T1", Setpoint::new(70.0, "°C")).is_none());
        let old = store.set("T1", Setpoint::new(75.0, "°C")).unwrap();
        assert_eq!(old.value, 70.0);
        assert_eq!(store.value("T1"), Some(75.0));
        store.remove("T1");
        assert!(store.is_empty());
    }
}
