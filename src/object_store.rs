//! A thin skin over a [`Pod`] under a fixed prefix. Content addressing
//! means `put` is idempotent and `get` self-checks the digest.

use std::sync::Arc;

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::pod::Pod;

/// `put`/`get` over a pod, scoped to one prefix (e.g. `"obj"` for segment
/// columns, a collection's changelog prefix for revisions).
pub struct ObjectStore {
    pod: Arc<dyn Pod>,
    prefix: String,
}

impl ObjectStore {
    pub fn new(pod: Arc<dyn Pod>, prefix: impl Into<String>) -> ObjectStore {
        return ObjectStore { pod, prefix: prefix.into() };
    }

    fn key_for(&self, digest: &Digest) -> String {
        let (head, tail) = digest.split();
        return format!("{}/{}/{}", self.prefix, head, tail);
    }

    /// Store `bytes`, returning its digest. A no-op if the digest already
    /// exists (content addressing makes `put` naturally idempotent).
    pub fn put(&self, bytes: &[u8]) -> Result<Digest> {
        let digest = Digest::of(bytes);
        let key = self.key_for(&digest);
        match self.pod.read(&key) {
            Ok(_) => {
                tracing::trace!(digest = %digest, "object already present, skipping write");
            }
            Err(e) if e.is_not_found() => {
                self.pod.write(&key, bytes)?;
                tracing::trace!(digest = %digest, bytes = bytes.len(), "object written");
            }
            Err(e) => return Err(e),
        }
        return Ok(digest);
    }

    /// Fetch the bytes for `digest`, verifying the payload actually hashes
    /// back to it. This is what turns a flipped byte on disk into an
    /// `IntegrityError` instead of a silently wrong read.
    pub fn get(&self, digest: &Digest) -> Result<Vec<u8>> {
        let key = self.key_for(digest);
        let bytes = self.pod.read(&key)?;
        let actual = Digest::of(&bytes);
        if actual != *digest {
            return Err(Error::integrity(
                *digest,
                format!("payload hashes to {actual}, not the requested digest"),
            ));
        }
        return Ok(bytes);
    }

    pub fn exists(&self, digest: &Digest) -> bool {
        return self.pod.read(&self.key_for(digest)).is_ok();
    }
}
