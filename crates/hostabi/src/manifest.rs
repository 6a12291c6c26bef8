//! Serializable description of a built host module.
//!
//! A manifest records what a guest must import to link against a module:
//! its name and the word-level signature of every export.

use serde::{Deserialize, Serialize};

use hostabi_types::ValueType;

use crate::error::HostResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub module: String,
    pub functions: Vec<FunctionManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionManifest {
    pub export: String,
    /// Debug name; equals `export` unless renamed.
    pub name: String,
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl ModuleManifest {
    pub fn to_json(&self) -> HostResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> HostResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn function(&self, export: &str) -> Option<&FunctionManifest> {
        self.functions.iter().find(|f| f.export == export)
    }
}
