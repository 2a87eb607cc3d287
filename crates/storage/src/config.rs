//! Startup configuration for a Tessera database.
//!
//! ```toml
//! tables = ["users"]
//!
//! [table.users]
//! name = "users"
//! file = "data/users.csv"
//! unique_columns = "email, username"
//! indexes = ["age"]
//! multi_column_indexes = [["country", "age"]]
//!
//! [table.users.column_kinds]
//! age = "int"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tessera_core::{Error, Result, ValueKind};

/// Tables to load at startup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Table identifiers, loaded in this order.
    #[serde(default)]
    pub tables: Vec<String>,
    /// Per-identifier table settings.
    #[serde(default)]
    pub table: BTreeMap<String, TableConfig>,
}

/// Settings for one table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    /// Backing file. Relative paths resolve against the working directory.
    pub file: PathBuf,
    /// Comma separated column names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_columns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_capacity: Option<usize>,
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(default)]
    pub multi_column_indexes: Vec<Vec<String>>,
    /// Kinds used to parse column text on load.
    #[serde(default)]
    pub column_kinds: BTreeMap<String, ValueKind>,
}

impl TableConfig {
    /// Creates settings with only a name and a file.
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            unique_columns: None,
            cache_capacity: None,
            indexes: Vec::new(),
            multi_column_indexes: Vec::new(),
            column_kinds: BTreeMap::new(),
        }
    }

    /// Splits `unique_columns` on commas, trimming blanks.
    pub fn unique_column_list(&self) -> Vec<String> {
        self.unique_columns
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl DatabaseConfig {
    /// Reads and parses a TOML config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        content.parse()
    }

    /// Renders this config as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))
    }
}

impl FromStr for DatabaseConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::config(format!("failed to parse config: {}", e)))
    }
}
