//! Plain configuration struct. Not a network service — `Repo::open` takes
//! one by value or a caller can load it from TOML.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::segment::DEFAULT_SEGMENT_ROWS;

/// Tunables that don't belong in the wire format: how many rows a segment
/// targets, and the grace period `Changelog::pack` leaves loose revisions
/// unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segment_rows: usize,
    pub pack_grace_millis: u64,
}

impl Default for Config {
    fn default() -> Config {
        return Config { segment_rows: DEFAULT_SEGMENT_ROWS, pack_grace_millis: 60_000 };
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Config> {
        return toml::from_str(s).map_err(|e| Error::schema(format!("malformed config: {e}")));
    }
}
