//! Repo: the top-level handle over one pod. Owns the one object store
//! every collection shares and a registry
//! collection that tracks every other collection's name and schema digest.
//! The registry is deliberately just another collection, versioned by the
//! same changelog machinery as user data, rather than a separate mechanism.

use std::ops::Bound;
use std::sync::Arc;

use crate::collection::Collection;
use crate::config::Config;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::frame::{Array, Frame, Value};
use crate::object_store::ObjectStore;
use crate::pod::{self, Pod};
use crate::schema::{Column, Dtype, Schema};
use crate::sync::SyncReport;

const REGISTRY_COLLECTION: &str = "_registry";
const REGISTRY_SERIES: &str = "entries";
const OBJECT_PREFIX: &str = "obj";

fn registry_schema() -> Arc<Schema> {
    return Arc::new(
        Schema::new(vec![Column::new("name", Dtype::String, true), Column::new("schema_digest", Dtype::String, false)])
            .expect("registry schema is well-formed"),
    );
}

/// A repository: one pod, one shared content-addressed store, and a
/// registry of named collections.
pub struct Repo {
    pod: Arc<dyn Pod>,
    store: Arc<ObjectStore>,
    registry: Collection,
    config: Config,
}

impl Repo {
    /// Open (or initialize) a repo over the given pod URI(s). Multiple URIs
    /// compose into a cached read-through chain, first = cache, last =
    /// authoritative.
    pub fn open(uris: &[&str]) -> Result<Repo> {
        return Repo::open_with_config(uris, Config::default());
    }

    pub fn open_with_config(uris: &[&str], config: Config) -> Result<Repo> {
        let pod = pod::open(uris)?;
        return Ok(Repo::from_pod(pod, config));
    }

    fn from_pod(pod: Arc<dyn Pod>, config: Config) -> Repo {
        let store = Arc::new(ObjectStore::new(pod.clone(), OBJECT_PREFIX));
        let registry = Collection::from_parts(pod.clone(), store.clone(), REGISTRY_COLLECTION, registry_schema(), config);
        return Repo { pod, store, registry, config };
    }

    /// Register a new collection under `name` with `schema`. Returns the
    /// existing collection, unchanged, if `name` is already registered with
    /// an identical schema; errors if it's registered with a different one
    /// for `create_collection`.
    pub fn create_collection(&self, name: impl Into<String>, schema: Schema) -> Result<Collection> {
        let name = name.into();
        if let Some(existing) = self.collection(&name)? {
            if existing.schema().as_ref() != &schema {
                return Err(Error::schema(format!("collection {name:?} already exists with a different schema")));
            }
            return Ok(existing);
        }
        let schema = Arc::new(schema);
        let schema_digest = self.store.put(&schema.to_bytes())?;
        let row = Frame::new(vec![
            ("name".to_string(), Array::String(vec![name.clone()])),
            ("schema_digest".to_string(), Array::String(vec![schema_digest.to_hex()])),
        ]);
        self.registry.series(REGISTRY_SERIES).write(&row, "repo")?;
        tracing::info!(collection = %name, "collection registered");
        return Ok(Collection::from_parts(self.pod.clone(), self.store.clone(), name, schema, self.config));
    }

    /// Look up a previously registered collection by name, `None` if it was
    /// never created.
    pub fn collection(&self, name: &str) -> Result<Option<Collection>> {
        let key = vec![Value::Str(name.to_string())];
        let frame =
            match self.registry.series(REGISTRY_SERIES).read(Bound::Included(key.clone()), Bound::Included(key), None) {
                Ok(frame) => frame,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            };
        if frame.is_empty() {
            return Ok(None);
        }
        let last = frame.len() - 1;
        let schema_digest_hex = match frame.column("schema_digest").expect("registry has schema_digest").get(last) {
            Value::Str(s) => s,
            _ => unreachable!("schema_digest column is always a string"),
        };
        let digest = Digest::from_hex(&schema_digest_hex)
            .ok_or_else(|| Error::schema(format!("malformed schema digest for collection {name:?}")))?;
        let schema_bytes = match self.store.get(&digest) {
            Ok(bytes) => bytes,
            // Registered in the registry row but the schema object itself hasn't
            // landed here yet (e.g. mid-push, before the caller copies it): not
            // usable yet, not a hard failure.
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let schema = Arc::new(Schema::from_bytes(&schema_bytes)?);
        return Ok(Some(Collection::from_parts(self.pod.clone(), self.store.clone(), name, schema, self.config)));
    }

    /// The name of every registered collection.
    pub fn ls(&self) -> Result<Vec<String>> {
        let frame = match self.registry.series(REGISTRY_SERIES).read_all(None) {
            Ok(frame) => frame,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        return Ok(match frame.column("name") {
            Some(Array::String(v)) => v.clone(),
            _ => Vec::new(),
        });
    }

    /// Push the registry and every registered collection to `dest`.
    /// `self` is the source.
    pub fn push(&self, dest: &Repo) -> Result<SyncReport> {
        let mut report = self.registry.push(&dest.registry)?;
        for name in self.ls()? {
            let source_collection = self.collection(&name)?.expect("name came from this repo's own ls()");
            // The registry row just replicated above references the schema object
            // by digest, but `sync_collection` only follows digests reachable from
            // a revision's segments — a registry row's string column never counts
            // as one, so the schema bytes themselves never get copied that way.
            // Write them directly; content addressing makes this idempotent.
            dest.store.put(&source_collection.schema().to_bytes())?;
            let dest_collection = dest.create_collection(name.clone(), source_collection.schema().as_ref().clone())?;
            report.merge(source_collection.push(&dest_collection)?);
        }
        return Ok(report);
    }

    /// Pull every registered collection from `source`. `self` is
    /// the destination.
    pub fn pull(&self, source: &Repo) -> Result<SyncReport> {
        return source.push(self);
    }
}
