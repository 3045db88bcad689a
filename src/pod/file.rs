//! Local filesystem pod. Writes go through a temp file plus rename so a
//! reader never observes a partial write.

use std::fs;
use std::path::{Path, PathBuf};

use super::Pod;
use crate::error::{Error, Result};

pub struct FilePod {
    root: PathBuf,
}

impl FilePod {
    pub fn new(root: impl Into<PathBuf>) -> FilePod {
        return FilePod { root: root.into() };
    }

    fn full_path(&self, key: &str) -> PathBuf {
        return self.root.join(key);
    }
}

fn list_recursive(dir: &Path, root: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    children.sort_by_key(|e| e.file_name());
    for entry in children {
        let path = entry.path();
        if path.is_dir() {
            list_recursive(&path, root, out)?;
        } else {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    return Ok(());
}

impl Pod for FilePod {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.full_path(key);
        return fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::not_found(key),
            _ => Error::Backend(e),
        });
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.full_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Idempotent no-op when the bytes already match: avoids a rename
        // churning the directory's mtime under concurrent identical writes.
        if let Ok(existing) = fs::read(&path) {
            if existing == bytes {
                return Ok(());
            }
        }
        let tmp_name = format!(".{}.tmp.{}", path.file_name().unwrap_or_default().to_string_lossy(), std::process::id());
        let tmp_path = path.with_file_name(tmp_name);
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;
        return Ok(());
    }

    fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.full_path(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut children: Vec<_> = fs::read_dir(&dir)?.collect::<std::io::Result<Vec<_>>>()?;
        children.sort_by_key(|e| e.file_name());
        for entry in children {
            if entry.path().is_file() {
                let rel = entry.path().strip_prefix(&self.root).unwrap().to_string_lossy().replace('\\', "/");
                out.push(rel);
            }
        }
        return Ok(out);
    }

    fn rm(&self, key: &str) -> Result<()> {
        let path = self.full_path(key);
        return fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::not_found(key),
            _ => Error::Backend(e),
        });
    }

    fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.full_path(prefix);
        let mut out = Vec::new();
        list_recursive(&dir, &self.root, &mut out)?;
        return Ok(out);
    }
}
