//! Series: the algorithmic core. Orchestrates writes — slicing a frame
//! into segments and appending a revision — and reads — walking the
//! changelog, shadow-resolving overlapping writes, and stitching the
//! surviving segments back into one frame.

use std::ops::Bound;
use std::sync::Arc;

use crate::changelog::{self, Changelog, Payload, Revision};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::frame::{Frame, Key};
use crate::interval::Range;
use crate::object_store::ObjectStore;
use crate::schema::Schema;
use crate::segment::{Segment, DEFAULT_SEGMENT_ROWS};
use crate::shadow::{self, Contribution};

/// Result of a write, surfaced instead of requiring the caller to poll
/// `changelog.leafs().len()` separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub revision_epoch: u64,
    pub forked: bool,
}

/// One named, schema-bound table within a collection.
pub struct Series {
    name: String,
    schema: Arc<Schema>,
    changelog: Arc<Changelog>,
    store: Arc<ObjectStore>,
    codec: Arc<dyn Codec>,
    segment_rows: usize,
}

impl Series {
    pub fn new(
        name: impl Into<String>,
        schema: Arc<Schema>,
        changelog: Arc<Changelog>,
        store: Arc<ObjectStore>,
        codec: Arc<dyn Codec>,
    ) -> Series {
        return Series { name: name.into(), schema, changelog, store, codec, segment_rows: DEFAULT_SEGMENT_ROWS };
    }

    pub fn with_segment_rows(mut self, rows: usize) -> Series {
        self.segment_rows = rows;
        return self;
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    /// Validate, slice, and persist `frame`, committing a new revision on
    /// top of the current head.
    pub fn write(&self, frame: &Frame, author: impl Into<String>) -> Result<WriteOutcome> {
        frame.validate(&self.schema)?;
        if frame.is_empty() {
            return Err(Error::schema("cannot write an empty frame".to_string()));
        }

        let mut segment_digests = Vec::new();
        for chunk in Segment::slice_frame(frame, self.segment_rows) {
            let segment = Segment::write(&chunk, &self.schema, &self.store, self.codec.as_ref())?;
            let descriptor_digest = self.store.put(&segment.to_bytes())?;
            segment_digests.push(descriptor_digest);
        }

        let start = frame.start_key(&self.schema).expect("non-empty frame has a start key");
        let stop = frame.stop_key(&self.schema).expect("non-empty frame has a stop key");

        let heads = self.changelog.leafs()?;
        let parent = changelog::pick_latest(&heads);
        let author = author.into();
        // Pin the epoch up front so the entry we embed in the payload
        // carries the exact epoch its enclosing revision will get: shadow
        // resolution keys off each entry's own epoch, not the revision it
        // happens to ride in.
        let epoch = changelog::next_epoch(parent);
        let payload = Payload::single(self.name.clone(), start, stop, segment_digests, epoch, author.clone());
        let revision = self.changelog.commit_at(parent, payload, author, Some(epoch))?;

        let forked = self.changelog.leafs()?.len() > 1;
        if forked {
            tracing::info!(series = %self.name, "write left the collection forked");
        }
        return Ok(WriteOutcome { revision_epoch: revision.epoch, forked });
    }

    /// Read `[lo, hi]` as of `at` (the latest head if `None`), stitching
    /// surviving segments into one frame.
    pub fn read(&self, lo: Bound<Key>, hi: Bound<Key>, at: Option<&Revision>) -> Result<Frame> {
        let query = Range { start: lo, stop: hi };
        let empty_columns = || -> Vec<(String, crate::frame::Array)> {
            return self.schema.columns.iter().map(|c| (c.name.clone(), crate::frame::Array::empty(c.dtype))).collect();
        };
        let target = match at {
            Some(r) => r.clone(),
            None => {
                let heads = self.changelog.leafs()?;
                match changelog::pick_latest(&heads) {
                    Some(r) => r.clone(),
                    // No history at all yet: treated as "no history" per the
                    // changelog NotFound policy, not a hard error.
                    None => return Ok(Frame::new(empty_columns())),
                }
            }
        };

        let chain = self.changelog.walk(None, &target)?;
        let contributions: Vec<Contribution> = chain
            .iter()
            .flat_map(|revision| revision.payload.entries_for(&self.name))
            .map(|entry| Contribution {
                epoch: entry.epoch,
                tie_digest: entry.tie_digest(),
                author: entry.author.clone(),
                range: Range::inclusive(entry.start.clone(), entry.stop.clone()),
                segments: entry.segments.clone(),
            })
            .collect();

        let kept = shadow::clip(shadow::fold(contributions), &query);

        let mut frames = Vec::new();
        for k in kept {
            for digest in &k.segments {
                let bytes = self.store.get(digest)?;
                let mut pos = 0;
                let segment = Segment::from_bytes(&bytes, &mut pos)?;
                let materialized = segment.read(&self.schema, &self.store)?;
                let keys = materialized.keys(&self.schema);
                let indices: Vec<usize> =
                    keys.iter().enumerate().filter(|(_, key)| k.range.contains(key)).map(|(i, _)| i).collect();
                if !indices.is_empty() {
                    frames.push((k.range.clone(), materialized.take(&indices)));
                }
            }
        }
        frames.sort_by(|(a, _), (b, _)| crate::interval::compare_start(a, b));

        let mut out = Frame::new(empty_columns());
        for (_, frame) in frames {
            out = out.concat(&frame);
        }
        return Ok(out);
    }

    /// `Series::read` over the whole key space at `at` (default latest).
    pub fn read_all(&self, at: Option<&Revision>) -> Result<Frame> {
        return self.read(Bound::Unbounded, Bound::Unbounded, at);
    }

    /// A `Series[lo:hi]` builder: Rust has no slice-syntax operator
    /// overload for a custom key type, so range-then-materialize becomes
    /// an explicit builder instead.
    pub fn slice<'a>(&'a self, lo: Bound<Key>, hi: Bound<Key>) -> SeriesRange<'a> {
        return SeriesRange { series: self, lo, hi, at: None };
    }
}

/// A pending range read, deferred until [`SeriesRange::df`] materializes it.
pub struct SeriesRange<'a> {
    series: &'a Series,
    lo: Bound<Key>,
    hi: Bound<Key>,
    at: Option<Revision>,
}

impl<'a> SeriesRange<'a> {
    pub fn at_revision(mut self, revision: Revision) -> SeriesRange<'a> {
        self.at = Some(revision);
        return self;
    }

    pub fn df(self) -> Result<Frame> {
        return self.series.read(self.lo, self.hi, self.at.as_ref());
    }
}
