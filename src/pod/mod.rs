//! The pod: a uniform key→bytes store over a pluggable backend.

mod cached;
mod file;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use cached::CachedPod;
pub use file::FilePod;
pub use memory::MemoryPod;
#[cfg(feature = "s3")]
pub use s3::S3Pod;

use std::sync::Arc;

use crate::error::Result;

/// Uniform key→bytes surface. Backends (local filesystem, S3-like object
/// store, in-memory map) and compositions (the cached pod) all implement
/// this trait, so a `Repo` never knows which backend it is talking to.
pub trait Pod: Send + Sync {
    /// Read the bytes stored at `key`. `Err(Error::NotFound)` if absent.
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Write `bytes` at `key`. Idempotent: writing identical bytes again is
    /// a no-op observable only as a repeated atomic last-writer-wins write.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Non-recursive listing of keys directly under `prefix`.
    fn ls(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove the value at `key`. `Err(Error::NotFound)` if absent.
    fn rm(&self, key: &str) -> Result<()>;

    /// Recursive listing of every key under `prefix`.
    fn walk(&self, prefix: &str) -> Result<Vec<String>>;
}

impl<P: Pod + ?Sized> Pod for Arc<P> {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        return (**self).read(key);
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        return (**self).write(key, bytes);
    }

    fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        return (**self).ls(prefix);
    }

    fn rm(&self, key: &str) -> Result<()> {
        return (**self).rm(key);
    }

    fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        return (**self).walk(prefix);
    }
}

/// A parsed pod URI: `file:///path`, `s3://bucket[/prefix]`, or
/// `memory://`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodUri {
    File(std::path::PathBuf),
    S3 { bucket: String, prefix: String },
    Memory,
}

impl PodUri {
    pub fn parse(uri: &str) -> Result<PodUri> {
        let parsed = url::Url::parse(uri)
            .map_err(|e| Error::schema(format!("invalid pod uri {uri:?}: {e}")))?;
        match parsed.scheme() {
            "file" => {
                return Ok(PodUri::File(std::path::PathBuf::from(parsed.path())));
            }
            "s3" => {
                let bucket = parsed
                    .host_str()
                    .ok_or_else(|| Error::schema(format!("s3 uri missing bucket: {uri:?}")))?
                    .to_string();
                let prefix = parsed.path().trim_start_matches('/').to_string();
                return Ok(PodUri::S3 { bucket, prefix });
            }
            "memory" => {
                return Ok(PodUri::Memory);
            }
            scheme => {
                return Err(Error::schema(format!("unsupported pod uri scheme: {scheme}")));
            }
        }
    }

    /// Build the pod this URI names. `s3://` requires the `s3` feature.
    pub fn open(&self) -> Result<Arc<dyn Pod>> {
        match self {
            PodUri::File(path) => return Ok(Arc::new(FilePod::new(path.clone()))),
            PodUri::Memory => return Ok(Arc::new(MemoryPod::new())),
            #[cfg(feature = "s3")]
            PodUri::S3 { bucket, prefix } => {
                return Ok(Arc::new(S3Pod::new(bucket.clone(), prefix.clone())));
            }
            #[cfg(not(feature = "s3"))]
            PodUri::S3 { .. } => {
                return Err(Error::schema(
                    "s3:// pod uris require the `s3` feature".to_string(),
                ));
            }
        }
    }
}

/// Open a single URI, or compose an ordered list into a [`CachedPod`]
/// (first = cache, last = authoritative).
pub fn open(uris: &[&str]) -> Result<Arc<dyn Pod>> {
    if uris.is_empty() {
        return Err(Error::schema("no pod uri given".to_string()));
    }
    if uris.len() == 1 {
        return PodUri::parse(uris[0])?.open();
    }
    let mut pods = Vec::with_capacity(uris.len());
    for uri in uris {
        pods.push(PodUri::parse(uri)?.open()?);
    }
    return Ok(Arc::new(CachedPod::new(pods)));
}

use crate::error::Error;

/// Split `prefix/rest/of/key` into the part directly under `prefix` versus
/// anything nested deeper, used by `ls` to stay non-recursive while `walk`
/// stays recursive. Both operate over a flat key namespace with `/` as the
/// only structural separator.
pub(crate) fn direct_child(prefix: &str, key: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    return Some(key.to_string());
}
