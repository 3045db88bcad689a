//! Schema: an ordered list of typed columns, some of which form the
//! primary key.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{Error, Result};

/// A scalar column type. Widths are fixed and declared up front; there is
/// no dynamic typing within a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dtype {
    Int64,
    Float64,
    Timestamp64,
    String,
}

/// One column in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub dtype: Dtype,
    pub is_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: Dtype, is_key: bool) -> Column {
        return Column { name: name.into(), dtype, is_key };
    }
}

/// An ordered list of columns. At least one column must be a key column;
/// key columns form a lexicographic primary key over rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Schema> {
        if !columns.iter().any(|c| c.is_key) {
            return Err(Error::schema("schema requires at least one key column".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(Error::schema(format!("duplicate column name: {}", c.name)));
            }
        }
        return Ok(Schema { columns });
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &Column> {
        return self.columns.iter().filter(|c| c.is_key);
    }

    pub fn key_names(&self) -> Vec<&str> {
        return self.key_columns().map(|c| c.name.as_str()).collect();
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        return self.columns.iter().find(|c| c.name == name);
    }

    /// Canonical bytes for this schema, used to content-address it in the
    /// repo registry.
    pub fn to_bytes(&self) -> Vec<u8> {
        return serde_json::to_vec(self).expect("schema serializes");
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Schema> {
        return serde_json::from_slice(bytes)
            .map_err(|e| Error::schema(format!("malformed schema object: {e}")));
    }

    pub fn digest(&self) -> Digest {
        return Digest::of(&self.to_bytes());
    }
}
