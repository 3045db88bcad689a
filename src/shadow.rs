//! Shadow resolution: the interval-subtraction sweep shared by
//! [`crate::series::Series::read`] and [`crate::collection::Collection::merge`].

use crate::digest::Digest;
use crate::interval::{compare_start, Range};

/// One write's contribution to a series: the interval it claims and the
/// segments backing it, tagged with enough provenance to break ties when
/// two contributions claim the same start key.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub epoch: u64,
    pub tie_digest: Digest,
    pub author: String,
    pub range: Range,
    pub segments: Vec<Digest>,
}

/// A surviving (range, segments) pair after later contributions have
/// shadowed earlier ones. Carries the epoch/author of the contribution it
/// came from so a caller that needs to re-persist it (`merge`) doesn't
/// have to re-derive provenance.
#[derive(Debug, Clone)]
pub struct Kept {
    pub range: Range,
    pub segments: Vec<Digest>,
    pub epoch: u64,
    pub author: String,
}

/// Fold contributions in increasing "wins" order — oldest epoch first,
/// ties broken by smaller digest then smaller author so that the actual
/// winner (largest epoch, then largest digest, then largest author) is
/// always the last one applied and therefore shadows everything before it.
pub fn fold(mut contributions: Vec<Contribution>) -> Vec<Kept> {
    contributions.sort_by(|a, b| {
        a.epoch.cmp(&b.epoch).then_with(|| a.tie_digest.cmp(&b.tie_digest)).then_with(|| a.author.cmp(&b.author))
    });

    let mut kept: Vec<Kept> = Vec::new();
    for contribution in contributions {
        let mut next = Vec::with_capacity(kept.len());
        for k in kept {
            for remainder in k.range.subtract(&contribution.range) {
                next.push(Kept { range: remainder, segments: k.segments.clone(), epoch: k.epoch, author: k.author.clone() });
            }
        }
        next.push(Kept {
            range: contribution.range,
            segments: contribution.segments,
            epoch: contribution.epoch,
            author: contribution.author,
        });
        kept = next;
    }

    kept.sort_by(|a, b| compare_start(&a.range, &b.range));
    return kept;
}

/// Intersect every kept range with `query`, dropping any that fall
/// entirely outside it.
pub fn clip(kept: Vec<Kept>, query: &Range) -> Vec<Kept> {
    return kept
        .into_iter()
        .filter_map(|k| query.intersect(&k.range).map(|range| Kept { range, segments: k.segments, epoch: k.epoch, author: k.author }))
        .collect();
}
