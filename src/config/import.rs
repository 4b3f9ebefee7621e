// Decode/import strategies handed to the engine
// Options are opaque here; only the engine interprets them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMethodType {
    Ffms2,
    Lsmash,
    Dgdecnv,
    Bestsource,
}

/// One import strategy, tried by the engine in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportMethod {
    #[serde(rename = "type")]
    pub method: ImportMethodType,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ImportMethod {
    pub fn new(method: ImportMethodType) -> Self {
        Self { method, options: Map::new() }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Drop repeated strategies of the same type, keeping the first (highest priority) one.
pub fn dedup_import_methods(methods: &mut Vec<ImportMethod>) {
    let mut seen = Vec::with_capacity(methods.len());
    methods.retain(|m| {
        if seen.contains(&m.method) {
            false
        } else {
            seen.push(m.method);
            true
        }
    });
}
