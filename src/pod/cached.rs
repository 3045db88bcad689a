//! A composition of an ordered list of pods `[local, ..., remote]`. Reads
//! warm the local pod on a remote hit; listings always go to the
//! authoritative (last) pod so upstream deletions stay visible.

use std::sync::Arc;

use super::Pod;
use crate::error::{Error, Result};

pub struct CachedPod {
    /// First = closest/fastest cache, last = authoritative source of truth.
    pods: Vec<Arc<dyn Pod>>,
}

impl CachedPod {
    pub fn new(pods: Vec<Arc<dyn Pod>>) -> CachedPod {
        assert!(!pods.is_empty(), "cached pod needs at least one pod");
        return CachedPod { pods };
    }

    fn authoritative(&self) -> &Arc<dyn Pod> {
        return self.pods.last().expect("cached pod is never empty");
    }
}

impl Pod for CachedPod {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        for (i, pod) in self.pods.iter().enumerate() {
            match pod.read(key) {
                Ok(bytes) => {
                    // Populate every pod closer to the front than the one
                    // that served this read, so the next read is faster.
                    for warm in &self.pods[..i] {
                        let _ = warm.write(key, &bytes);
                    }
                    return Ok(bytes);
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        return Err(Error::not_found(key));
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        // Only the local (first) pod is written; propagation upstream is
        // the caller's responsibility via push.
        return self.pods[0].write(key, bytes);
    }

    fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        return self.authoritative().ls(prefix);
    }

    fn rm(&self, key: &str) -> Result<()> {
        return self.pods[0].rm(key);
    }

    fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        return self.authoritative().walk(prefix);
    }
}
