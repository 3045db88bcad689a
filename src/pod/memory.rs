//! An in-memory pod: a per-instance backing map, never truly global.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::Pod;
use crate::error::{Error, Result};

/// A pod backed by a `BTreeMap` held behind a mutex. Useful as a cache layer
/// in a [`super::CachedPod`] and as the fast backend in tests.
pub struct MemoryPod {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryPod {
    pub fn new() -> MemoryPod {
        return MemoryPod { entries: Mutex::new(BTreeMap::new()) };
    }
}

impl Default for MemoryPod {
    fn default() -> MemoryPod {
        return MemoryPod::new();
    }
}

impl Pod for MemoryPod {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let entries = self.entries.lock().expect("memory pod lock poisoned");
        return entries.get(key).cloned().ok_or_else(|| Error::not_found(key));
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().expect("memory pod lock poisoned");
        entries.insert(key.to_string(), bytes.to_vec());
        return Ok(());
    }

    fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.lock().expect("memory pod lock poisoned");
        let mut out: Vec<String> = entries
            .keys()
            .filter(|k| super::direct_child(prefix, k).is_some())
            .cloned()
            .collect();
        out.sort();
        return Ok(out);
    }

    fn rm(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("memory pod lock poisoned");
        return entries.remove(key).map(|_| ()).ok_or_else(|| Error::not_found(key));
    }

    fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.lock().expect("memory pod lock poisoned");
        let mut out: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        out.sort();
        return Ok(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let pod = MemoryPod::new();
        pod.write("a/b", b"hello").unwrap();
        assert_eq!(pod.read("a/b").unwrap(), b"hello");
    }

    #[test]
    fn read_missing_is_not_found() {
        let pod = MemoryPod::new();
        assert!(pod.read("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn rm_missing_is_not_found() {
        let pod = MemoryPod::new();
        assert!(pod.rm("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn write_is_idempotent() {
        let pod = MemoryPod::new();
        pod.write("a", b"x").unwrap();
        pod.write("a", b"x").unwrap();
        assert_eq!(pod.read("a").unwrap(), b"x");
    }

    #[test]
    fn walk_is_recursive_ls_is_not() {
        let pod = MemoryPod::new();
        pod.write("col/a", b"1").unwrap();
        pod.write("col/sub/b", b"2").unwrap();
        let mut walked = pod.walk("col").unwrap();
        walked.sort();
        assert_eq!(walked, vec!["col/a".to_string(), "col/sub/b".to_string()]);

        let listed = pod.ls("col").unwrap();
        assert!(listed.contains(&"col/a".to_string()));
        assert!(!listed.contains(&"col/sub/b".to_string()));
    }
}
