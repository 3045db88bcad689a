//! Collection: a namespace of series sharing one schema, backed by one
//! changelog. `Repo`'s own registry is just another collection under a
//! reserved name.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::changelog::{Changelog, Payload, SeriesEntry};
use crate::codec::{Codec, Identity};
use crate::config::Config;
use crate::error::Result;
use crate::interval::Range;
use crate::object_store::ObjectStore;
use crate::pod::Pod;
use crate::schema::Schema;
use crate::segment::Segment;
use crate::series::Series;
use crate::shadow::{self, Contribution, Kept};
use crate::sync::{self, SyncReport};

/// Result of `Collection::merge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// `false` when the collection already had a single head: nothing to do.
    pub merged: bool,
    /// Head count observed before merging.
    pub heads_before: usize,
}

/// A namespace of series that share one [`Schema`], one [`Changelog`], and
/// one content-addressed object store.
pub struct Collection {
    name: String,
    schema: Arc<Schema>,
    pod: Arc<dyn Pod>,
    store: Arc<ObjectStore>,
    changelog: Arc<Changelog>,
    codec: Arc<dyn Codec>,
    config: Config,
}

impl Collection {
    /// Build a collection over an already-open pod and shared object store.
    /// `Repo` is the usual caller: it owns the single `ObjectStore` every
    /// collection in a repo shares, so segment column objects live under
    /// one shared content-addressed prefix.
    pub fn from_parts(
        pod: Arc<dyn Pod>,
        store: Arc<ObjectStore>,
        name: impl Into<String>,
        schema: Arc<Schema>,
        config: Config,
    ) -> Collection {
        let name = name.into();
        let changelog = Arc::new(Changelog::new(pod.clone(), format!("chg/{name}")));
        return Collection { name, schema, pod, store, changelog, codec: Arc::new(Identity), config };
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    pub fn schema(&self) -> &Arc<Schema> {
        return &self.schema;
    }

    pub(crate) fn pod(&self) -> &Arc<dyn Pod> {
        return &self.pod;
    }

    pub(crate) fn store(&self) -> &Arc<ObjectStore> {
        return &self.store;
    }

    pub fn changelog(&self) -> &Changelog {
        return &self.changelog;
    }

    /// A handle to one named series within this collection, sharing the
    /// collection's changelog so writes to different series still land on
    /// the same DAG: the changelog is per-collection, not per-series.
    pub fn series(&self, name: impl Into<String>) -> Series {
        return Series::new(name, self.schema.clone(), self.changelog.clone(), self.store.clone(), self.codec.clone())
            .with_segment_rows(self.config.segment_rows);
    }

    /// Rewrite loose changelog entries into one packed object, honoring
    /// the configured grace period.
    pub fn pack(&self) -> Result<crate::changelog::PackReport> {
        return self.changelog.pack(self.config.pack_grace_millis);
    }

    /// Copy every revision reachable on this collection but missing from
    /// `dest`. `self` is the source.
    pub fn push(&self, dest: &Collection) -> Result<SyncReport> {
        return sync::sync_collection(self, dest);
    }

    /// Copy every revision reachable on `source` but missing here. `self`
    /// is the destination.
    pub fn pull(&self, source: &Collection) -> Result<SyncReport> {
        return sync::sync_collection(source, self);
    }

    /// Converge every head into one logical tip.
    ///
    /// Computes the lowest common ancestor of the current heads, unions
    /// each head's contribution since that ancestor per series (shadow
    /// resolution breaks overlap ties by epoch, same as a read), and commits
    /// one revision per head — all sharing a single `child_digest` and
    /// epoch, so the DAG shows *k* lines converging on one effective tip.
    pub fn merge(&self, author: impl Into<String>) -> Result<MergeOutcome> {
        let author = author.into();
        let heads = self.changelog.leafs()?;
        if heads.len() <= 1 {
            return Ok(MergeOutcome { merged: false, heads_before: heads.len() });
        }

        let ancestor = self.changelog.common_ancestor(&heads)?;
        let mut by_series: FxHashMap<String, Vec<Contribution>> = FxHashMap::default();
        for head in &heads {
            let delta = self.changelog.walk(ancestor.as_ref(), head)?;
            for revision in &delta {
                for entry in &revision.payload.entries {
                    by_series.entry(entry.series.clone()).or_default().push(Contribution {
                        epoch: entry.epoch,
                        tie_digest: entry.tie_digest(),
                        author: entry.author.clone(),
                        range: Range::inclusive(entry.start.clone(), entry.stop.clone()),
                        segments: entry.segments.clone(),
                    });
                }
            }
        }

        let mut entries = Vec::new();
        for (series, contributions) in by_series {
            for kept in shadow::fold(contributions) {
                if let Some(entry) = self.tighten(&series, kept)? {
                    entries.push(entry);
                }
            }
        }
        let payload = Payload { entries };

        // All k commits must land at the identical (epoch, child_digest)
        // pair for them to read as one converged tip: at rest after a merge,
        // every head shares the same payload digest. child_digest already
        // only depends on (payload, author), so commit
        // the same payload/author to every head; pin a shared epoch past
        // every head's so the merge is never itself shadowed by a head.
        let shared_epoch = heads.iter().map(|h| h.epoch).max().unwrap_or(0).saturating_add(1);
        for head in &heads {
            self.changelog.commit_at(Some(head), payload.clone(), author.clone(), Some(shared_epoch))?;
        }
        tracing::info!(collection = %self.name, heads = heads.len(), "collection merged");
        return Ok(MergeOutcome { merged: true, heads_before: heads.len() });
    }

    /// A `Kept` range's bounds may carry an `Excluded` edge after an
    /// interval split, which can't be stored directly as the inclusive
    /// `[start, stop]` pair a [`SeriesEntry`] records. Tighten it to the
    /// actual min/max key present among its segments, the same way a read
    /// would materialize-then-filter.
    fn tighten(&self, series: &str, kept: Kept) -> Result<Option<SeriesEntry>> {
        let mut start: Option<crate::frame::Key> = None;
        let mut stop: Option<crate::frame::Key> = None;
        for digest in &kept.segments {
            let bytes = self.store.get(digest)?;
            let mut pos = 0;
            let segment = Segment::from_bytes(&bytes, &mut pos)?;
            let frame = segment.read(&self.schema, &self.store)?;
            for key in frame.keys(&self.schema) {
                if !kept.range.contains(&key) {
                    continue;
                }
                if start.as_ref().is_none_or(|s| key < *s) {
                    start = Some(key.clone());
                }
                if stop.as_ref().is_none_or(|s| key > *s) {
                    stop = Some(key);
                }
            }
        }
        let (start, stop) = match (start, stop) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(None),
        };
        return Ok(Some(SeriesEntry {
            series: series.to_string(),
            start,
            stop,
            segments: kept.segments,
            epoch: kept.epoch,
            author: kept.author,
        }));
    }
}
