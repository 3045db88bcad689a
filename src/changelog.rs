//! Changelog: the append-only, fork-capable log of revisions that underlies
//! every collection. Each revision is a tiny object whose filename encodes
//! both its parent and child identifiers, so parent discovery is a prefix
//! scan rather than a separate index.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::digest::{Digest, ZERO_DIGEST};
use crate::error::{Error, Result};
use crate::frame::Key;
use crate::pod::Pod;
use crate::wire::{read_key, read_string, read_u32, write_key, write_string};

/// Width of the epoch counter: a 44-bit millisecond counter rendered hex.
pub const EPOCH_BITS: u32 = 44;
const EPOCH_MASK: u64 = (1u64 << EPOCH_BITS) - 1;
/// `ceil(44 / 4)`: hex digits needed to render a zero-padded epoch.
const EPOCH_HEX_WIDTH: usize = 11;

/// One series' contribution to a revision: the segments it wrote and the
/// `[start, stop]` interval they cover.
///
/// `epoch`/`author` duplicate the enclosing [`Revision`]'s own fields for a
/// plain write. They matter once a `merge` copies entries from several
/// ancestor revisions into one payload: shadow resolution needs each
/// entry's *original* epoch to pick a winner, and that provenance would
/// otherwise be lost once several entries share one enclosing revision.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub series: String,
    pub start: Key,
    pub stop: Key,
    pub segments: Vec<Digest>,
    pub epoch: u64,
    pub author: String,
}

impl SeriesEntry {
    /// A content digest used as the tie-break when two entries share an
    /// epoch: ties are broken by larger child digest, then by author
    /// token. We hash the entry itself rather
    /// than reuse the enclosing revision's `child_digest` because a fresh
    /// write's entry is serialized *into* the bytes that digest is
    /// computed from — using it here would be circular (see DESIGN.md).
    pub fn tie_digest(&self) -> Digest {
        let mut bytes = Vec::new();
        write_string(&mut bytes, &self.series);
        write_key(&mut bytes, &self.start);
        write_key(&mut bytes, &self.stop);
        for digest in &self.segments {
            bytes.extend_from_slice(&digest.0);
        }
        return Digest::of(&bytes);
    }
}

/// The body a revision's payload digest names: one entry per series
/// touched by the write this revision records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub entries: Vec<SeriesEntry>,
}

impl Payload {
    pub fn single(
        series: impl Into<String>,
        start: Key,
        stop: Key,
        segments: Vec<Digest>,
        epoch: u64,
        author: impl Into<String>,
    ) -> Payload {
        return Payload {
            entries: vec![SeriesEntry { series: series.into(), start, stop, segments, epoch, author: author.into() }],
        };
    }

    /// Every entry recorded for `series` in this payload. A plain write's
    /// payload has at most one; a merge's payload may carry several
    /// disjoint kept ranges for the same series.
    pub fn entries_for<'a>(&'a self, series: &'a str) -> impl Iterator<Item = &'a SeriesEntry> {
        return self.entries.iter().filter(move |e| e.series == series);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            write_string(&mut out, &entry.series);
            write_key(&mut out, &entry.start);
            write_key(&mut out, &entry.stop);
            out.extend_from_slice(&(entry.segments.len() as u32).to_le_bytes());
            for digest in &entry.segments {
                out.extend_from_slice(&digest.0);
            }
            out.extend_from_slice(&entry.epoch.to_le_bytes());
            write_string(&mut out, &entry.author);
        }
        return out;
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Payload> {
        let mut pos = 0;
        let n_entries = read_u32(bytes, &mut pos)? as usize;
        let mut entries = Vec::with_capacity(n_entries);
        for _ in 0..n_entries {
            let series = read_string(bytes, &mut pos)?;
            let start = read_key(bytes, &mut pos)?;
            let stop = read_key(bytes, &mut pos)?;
            let n_segments = read_u32(bytes, &mut pos)? as usize;
            let mut segments = Vec::with_capacity(n_segments);
            for _ in 0..n_segments {
                let slice = bytes
                    .get(pos..pos + crate::digest::DIGEST_BYTES)
                    .ok_or_else(|| Error::schema("truncated segment digest".to_string()))?;
                let mut arr = [0u8; crate::digest::DIGEST_BYTES];
                arr.copy_from_slice(slice);
                pos += crate::digest::DIGEST_BYTES;
                segments.push(Digest(arr));
            }
            let epoch = crate::wire::read_u64(bytes, &mut pos)?;
            let author = read_string(bytes, &mut pos)?;
            entries.push(SeriesEntry { series, start, stop, segments, epoch, author });
        }
        return Ok(Payload { entries });
    }
}

/// One node in a collection's changelog DAG. A revision is named by
/// `parent.child`, where each half is an epoch-plus-digest pair; the
/// all-zero parent digest marks a root.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub epoch: u64,
    pub parent_epoch: u64,
    pub parent_digest: Digest,
    pub child_digest: Digest,
    pub author: String,
    pub payload: Payload,
}

impl Revision {
    pub fn is_root(&self) -> bool {
        return self.parent_digest.is_zero();
    }

    /// `(epoch, digest)` identifying this revision as somebody's parent.
    pub fn child_id(&self) -> (u64, Digest) {
        return (self.epoch, self.child_digest);
    }

    pub fn parent_id(&self) -> (u64, Digest) {
        return (self.parent_epoch, self.parent_digest);
    }

    /// The changelog object filename this revision is/would-be stored
    /// under: `"{parent_epoch}-{parent_digest}.{child_epoch}-{child_digest}"`.
    /// Exposed so sync can check whether this revision is already present
    /// at the destination by filename alone.
    pub fn filename(&self) -> String {
        return format!(
            "{:0w$x}-{}.{:0w$x}-{}",
            self.parent_epoch,
            self.parent_digest.to_hex(),
            self.epoch,
            self.child_digest.to_hex(),
            w = EPOCH_HEX_WIDTH,
        );
    }

    fn parse(name: &str, body: &[u8]) -> Result<Revision> {
        let (parent_part, child_part) = name
            .split_once('.')
            .ok_or_else(|| Error::integrity(ZERO_DIGEST, format!("malformed changelog filename {name:?}")))?;
        let (parent_epoch, parent_digest) = parse_half(parent_part)?;
        let (epoch, child_digest) = parse_half(child_part)?;
        let (author, payload_bytes) = decode_body(body)?;
        let recomputed = Digest::of_with_author(&payload_bytes, &author);
        if recomputed != child_digest {
            return Err(Error::integrity(
                child_digest,
                format!("revision {name:?} body hashes to {recomputed}, filename says {child_digest}"),
            ));
        }
        let payload = Payload::from_bytes(&payload_bytes)?;
        return Ok(Revision { epoch, parent_epoch, parent_digest, child_digest, author, payload });
    }
}

fn parse_half(part: &str) -> Result<(u64, Digest)> {
    let (epoch_hex, digest_hex) = part
        .split_once('-')
        .ok_or_else(|| Error::integrity(ZERO_DIGEST, format!("malformed changelog id {part:?}")))?;
    let epoch = u64::from_str_radix(epoch_hex, 16)
        .map_err(|_| Error::integrity(ZERO_DIGEST, format!("malformed epoch {epoch_hex:?}")))?;
    let digest = Digest::from_hex(digest_hex)
        .ok_or_else(|| Error::integrity(ZERO_DIGEST, format!("malformed digest {digest_hex:?}")))?;
    return Ok((epoch, digest));
}

fn encode_body(author: &str, payload_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_string(&mut out, author);
    out.extend_from_slice(payload_bytes);
    return out;
}

fn decode_body(bytes: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut pos = 0;
    let author = read_string(bytes, &mut pos)?;
    return Ok((author, bytes[pos..].to_vec()));
}

fn now_epoch() -> u64 {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
    return millis & EPOCH_MASK;
}

/// The epoch a new revision on top of `parent` would get: `max(now,
/// parent_epoch + 1)`. Exposed so a caller can stamp a
/// [`SeriesEntry`] with the same epoch its enclosing revision will carry,
/// without a circular dependency on the not-yet-built payload.
pub fn next_epoch(parent: Option<&Revision>) -> u64 {
    let parent_epoch = parent.map(|r| r.epoch).unwrap_or(0);
    return now_epoch().max(parent_epoch.saturating_add(1)) & EPOCH_MASK;
}

const LOOSE_DIR: &str = "loose";
const PACKED_DIR: &str = "packed";

/// Summary of a `pack()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackReport {
    pub revisions_packed: usize,
    pub revisions_skipped_young: usize,
}

/// A collection's append-only, fork-capable revision log. Backed by a
/// [`Pod`] under a fixed prefix; every operation is a listing plus a
/// handful of reads.
pub struct Changelog {
    pod: Arc<dyn Pod>,
    prefix: String,
}

impl Changelog {
    pub fn new(pod: Arc<dyn Pod>, prefix: impl Into<String>) -> Changelog {
        return Changelog { pod, prefix: prefix.into() };
    }

    fn loose_prefix(&self) -> String {
        return format!("{}/{}", self.prefix, LOOSE_DIR);
    }

    fn packed_prefix(&self) -> String {
        return format!("{}/{}", self.prefix, PACKED_DIR);
    }

    /// Append a new revision with the given `parent` (`None` for a root) and
    /// `payload`, authored by `author`.
    pub fn commit(&self, parent: Option<&Revision>, payload: Payload, author: impl Into<String>) -> Result<Revision> {
        return self.commit_at(parent, payload, author, None);
    }

    /// Like [`Changelog::commit`], but lets a caller pin the resulting
    /// epoch instead of deriving it from the wall clock. Used by
    /// `Collection::merge` so the *k* parent-distinct revisions it commits
    /// land at one shared epoch alongside their shared `child_digest`.
    pub fn commit_at(
        &self,
        parent: Option<&Revision>,
        payload: Payload,
        author: impl Into<String>,
        epoch: Option<u64>,
    ) -> Result<Revision> {
        let author = author.into();
        let parent_epoch = parent.map(|r| r.epoch).unwrap_or(0);
        let parent_digest = parent.map(|r| r.child_digest).unwrap_or(ZERO_DIGEST);
        let payload_bytes = payload.to_bytes();
        let child_digest = Digest::of_with_author(&payload_bytes, &author);
        // Monotonic within a writer: never regress behind the parent even if
        // the wall clock does.
        let epoch = epoch.unwrap_or_else(|| now_epoch().max(parent_epoch.saturating_add(1)) & EPOCH_MASK);
        let revision = Revision { epoch, parent_epoch, parent_digest, child_digest, author, payload };
        let body = encode_body(&revision.author, &payload_bytes);
        let path = format!("{}/{}", self.loose_prefix(), revision.filename());
        self.pod.write(&path, &body)?;
        tracing::debug!(
            prefix = %self.prefix,
            epoch = revision.epoch,
            child = %revision.child_digest,
            root = revision.is_root(),
            "changelog revision committed"
        );
        return Ok(revision);
    }

    /// Write an already-built `revision` verbatim, without recomputing its
    /// digest or epoch. Used by sync to copy a revision object from another
    /// repository's changelog once every segment and column it references
    /// is already present locally.
    pub fn import(&self, revision: &Revision) -> Result<()> {
        let payload_bytes = revision.payload.to_bytes();
        let body = encode_body(&revision.author, &payload_bytes);
        let path = format!("{}/{}", self.loose_prefix(), revision.filename());
        self.pod.write(&path, &body)?;
        return Ok(());
    }

    fn read_loose(&self) -> Result<Vec<Revision>> {
        let loose_prefix = self.loose_prefix();
        let keys = self.pod.walk(&loose_prefix)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let name = key
                .rsplit('/')
                .next()
                .ok_or_else(|| Error::integrity(ZERO_DIGEST, format!("empty changelog key {key:?}")))?;
            let body = self.pod.read(&key)?;
            out.push(Revision::parse(name, &body)?);
        }
        return Ok(out);
    }

    fn read_packed(&self) -> Result<Vec<Revision>> {
        let packed_prefix = self.packed_prefix();
        let keys = match self.pod.ls(&packed_prefix) {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = Vec::new();
        for key in keys {
            let bytes = self.pod.read(&key)?;
            out.extend(decode_packed(&bytes)?);
        }
        return Ok(out);
    }

    /// All revisions, loose and packed, topologically sorted (root-first)
    /// then by epoch.
    pub fn log(&self) -> Result<Vec<Revision>> {
        let mut all = self.read_packed()?;
        all.extend(self.read_loose()?);
        return Ok(topo_sort(all));
    }

    /// Revisions with no children.
    pub fn leafs(&self) -> Result<Vec<Revision>> {
        let all = self.log()?;
        let parents: FxHashSet<(u64, Digest)> = all.iter().filter(|r| !r.is_root()).map(|r| r.parent_id()).collect();
        return Ok(all.into_iter().filter(|r| !parents.contains(&r.child_id())).collect());
    }

    /// The ancestor chain from a root down to (and including) `to`,
    /// optionally cut off just after `from`.
    pub fn walk(&self, from: Option<&Revision>, to: &Revision) -> Result<Vec<Revision>> {
        let all = self.log()?;
        let by_child: FxHashMap<(u64, Digest), Revision> = all.into_iter().map(|r| (r.child_id(), r.clone())).collect();
        let stop_at = from.map(|r| r.child_id());
        let mut chain = vec![to.clone()];
        let mut current = to.clone();
        while !current.is_root() {
            if Some(current.parent_id()) == stop_at {
                break;
            }
            let parent = by_child
                .get(&current.parent_id())
                .ok_or_else(|| Error::integrity(current.parent_digest, "changelog parent missing".to_string()))?
                .clone();
            chain.push(parent.clone());
            current = parent;
        }
        chain.reverse();
        return Ok(chain);
    }

    /// The lowest common ancestor of `revisions`: the deepest revision
    /// reachable (via `walk` to a root) from every one of them.
    pub fn common_ancestor(&self, revisions: &[Revision]) -> Result<Option<Revision>> {
        if revisions.is_empty() {
            return Ok(None);
        }
        let mut chains = Vec::with_capacity(revisions.len());
        for r in revisions {
            chains.push(self.walk(None, r)?);
        }
        let mut common = None;
        'outer: for candidate in chains[0].iter() {
            for chain in &chains[1..] {
                if !chain.iter().any(|r| r.child_id() == candidate.child_id()) {
                    continue 'outer;
                }
            }
            // Chains are root-first; the last match scanning forward is the
            // deepest shared ancestor.
            common = Some(candidate.clone());
        }
        return Ok(common);
    }

    /// Rewrite the changelog into a single packed object, then delete the
    /// loose files it covers. Conservative: revisions committed within
    /// `grace_millis` of now are left loose, so a concurrent writer's
    /// in-flight commit (built from a head read just before packing ran)
    /// is never dropped out from under it.
    pub fn pack(&self, grace_millis: u64) -> Result<PackReport> {
        let now = now_epoch();
        let loose = self.read_loose()?;
        let (to_pack, young): (Vec<Revision>, Vec<Revision>) =
            loose.into_iter().partition(|r| now.saturating_sub(r.epoch) >= grace_millis);
        if to_pack.is_empty() {
            return Ok(PackReport { revisions_packed: 0, revisions_skipped_young: young.len() });
        }
        let sorted = topo_sort(to_pack.clone());
        let bytes = encode_packed(&sorted);
        let digest = Digest::of(&bytes);
        let packed_path = format!("{}/{}", self.packed_prefix(), digest.to_hex());
        self.pod.write(&packed_path, &bytes)?;
        for revision in &sorted {
            let path = format!("{}/{}", self.loose_prefix(), revision.filename());
            self.pod.rm(&path)?;
        }
        tracing::info!(prefix = %self.prefix, packed = sorted.len(), skipped = young.len(), "changelog packed");
        return Ok(PackReport { revisions_packed: sorted.len(), revisions_skipped_young: young.len() });
    }
}

/// Deterministic "latest" head among a possibly-forked set: highest epoch,
/// ties broken by larger child digest then by author token.
pub fn pick_latest(heads: &[Revision]) -> Option<&Revision> {
    return heads
        .iter()
        .max_by(|a, b| a.epoch.cmp(&b.epoch).then_with(|| a.child_digest.cmp(&b.child_digest)).then_with(|| a.author.cmp(&b.author)));
}

/// Root-first, then-by-epoch ordering: parents always precede children;
/// ties broken by larger child digest so ordering is deterministic across
/// readers.
fn topo_sort(revisions: Vec<Revision>) -> Vec<Revision> {
    let mut by_parent: FxHashMap<(u64, Digest), Vec<Revision>> = FxHashMap::default();
    let mut roots = Vec::new();
    for r in revisions {
        if r.is_root() {
            roots.push(r);
        } else {
            by_parent.entry(r.parent_id()).or_default().push(r);
        }
    }
    let sort_key = |r: &Revision| (r.epoch, r.child_digest);
    roots.sort_by_key(sort_key);
    for children in by_parent.values_mut() {
        children.sort_by_key(sort_key);
    }

    let mut out = Vec::new();
    let mut queue: std::collections::VecDeque<Revision> = roots.into_iter().collect();
    while let Some(r) = queue.pop_front() {
        let id = r.child_id();
        out.push(r);
        if let Some(children) = by_parent.remove(&id) {
            for child in children {
                queue.push_back(child);
            }
        }
    }
    return out;
}

fn encode_packed(revisions: &[Revision]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(revisions.len() as u32).to_le_bytes());
    for r in revisions {
        write_string(&mut out, &r.filename());
        let payload_bytes = r.payload.to_bytes();
        let body = encode_body(&r.author, &payload_bytes);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
    }
    return out;
}

fn decode_packed(bytes: &[u8]) -> Result<Vec<Revision>> {
    let mut pos = 0;
    let count = read_u32(bytes, &mut pos)? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_string(bytes, &mut pos)?;
        let len = read_u32(bytes, &mut pos)? as usize;
        let body = bytes
            .get(pos..pos + len)
            .ok_or_else(|| Error::integrity(ZERO_DIGEST, "truncated packed revision body".to_string()))?;
        pos += len;
        out.push(Revision::parse(&name, body)?);
    }
    return Ok(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Value;
    use crate::pod::MemoryPod;

    fn changelog() -> Changelog {
        return Changelog::new(Arc::new(MemoryPod::new()), "chg/series_a");
    }

    fn key(n: i64) -> Key {
        return vec![Value::Int64(n)];
    }

    fn payload(a: i64, b: i64) -> Payload {
        return Payload::single("s", key(a), key(b), vec![Digest::of(format!("{a}-{b}").as_bytes())], 0, "writer-a");
    }

    #[test]
    fn root_commit_has_zero_parent_digest() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn commit_advances_epoch_past_parent() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        let child = log.commit(Some(&root), payload(4, 6), "writer-a").unwrap();
        assert!(child.epoch > root.epoch);
        assert_eq!(child.parent_digest, root.child_digest);
    }

    #[test]
    fn log_returns_root_before_child() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        let child = log.commit(Some(&root), payload(4, 6), "writer-a").unwrap();
        let entries = log.log().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].child_digest, root.child_digest);
        assert_eq!(entries[1].child_digest, child.child_digest);
    }

    #[test]
    fn single_head_after_linear_commits() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        let child = log.commit(Some(&root), payload(4, 6), "writer-a").unwrap();
        let heads = log.leafs().unwrap();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].child_digest, child.child_digest);
    }

    #[test]
    fn concurrent_commits_against_same_parent_fork() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        log.commit(Some(&root), payload(4, 6), "writer-a").unwrap();
        log.commit(Some(&root), payload(10, 13), "writer-b").unwrap();
        assert_eq!(log.leafs().unwrap().len(), 2);
    }

    #[test]
    fn walk_from_root_includes_every_ancestor() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        let mid = log.commit(Some(&root), payload(4, 6), "writer-a").unwrap();
        let tip = log.commit(Some(&mid), payload(7, 9), "writer-a").unwrap();
        let chain = log.walk(None, &tip).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].child_digest, root.child_digest);
        assert_eq!(chain[2].child_digest, tip.child_digest);
    }

    #[test]
    fn common_ancestor_of_a_fork_is_the_shared_root() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        let a = log.commit(Some(&root), payload(4, 6), "writer-a").unwrap();
        let b = log.commit(Some(&root), payload(10, 13), "writer-b").unwrap();
        let ancestor = log.common_ancestor(&[a, b]).unwrap().unwrap();
        assert_eq!(ancestor.child_digest, root.child_digest);
    }

    #[test]
    fn pack_then_log_is_unchanged() {
        let log = changelog();
        let root = log.commit(None, payload(1, 3), "writer-a").unwrap();
        log.commit(Some(&root), payload(4, 6), "writer-a").unwrap();
        let before = log.log().unwrap();
        let report = log.pack(0).unwrap();
        assert_eq!(report.revisions_packed, 2);
        let after = log.log().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn pack_skips_young_revisions() {
        let log = changelog();
        log.commit(None, payload(1, 3), "writer-a").unwrap();
        let report = log.pack(u64::MAX).unwrap();
        assert_eq!(report.revisions_packed, 0);
        assert_eq!(report.revisions_skipped_young, 1);
        assert_eq!(log.log().unwrap().len(), 1);
    }

    #[test]
    fn malformed_filename_is_integrity_error() {
        let pod = Arc::new(MemoryPod::new());
        let log = Changelog::new(pod.clone(), "chg/series_a");
        pod.write("chg/series_a/loose/not-a-valid-name", b"garbage").unwrap();
        assert!(log.log().is_err());
    }

    #[test]
    fn payload_bytes_round_trip() {
        let p = payload(1, 9);
        let bytes = p.to_bytes();
        assert_eq!(Payload::from_bytes(&bytes).unwrap(), p);
    }
}
