//! Interval subtraction over the ordered key space — the workhorse behind
//! both shadowing and merge. A [`Range`] uses [`Bound`] rather than a pair
//! of inclusive keys so a partial trim can exclude exactly the overlapping
//! portion without needing a predecessor/successor key, which doesn't
//! exist in general for an arbitrary ordered dtype.

use std::cmp::Ordering;
use std::ops::Bound;

use crate::frame::Key;

/// A half-open-or-closed range over the key space. `Bound::Unbounded`
/// represents "from the very start" / "to the very end".
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub start: Bound<Key>,
    pub stop: Bound<Key>,
}

impl Range {
    pub fn inclusive(start: Key, stop: Key) -> Range {
        return Range { start: Bound::Included(start), stop: Bound::Included(stop) };
    }

    pub fn unbounded() -> Range {
        return Range { start: Bound::Unbounded, stop: Bound::Unbounded };
    }

    pub fn contains(&self, key: &Key) -> bool {
        let after_start = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(s) => key >= s,
            Bound::Excluded(s) => key > s,
        };
        let before_stop = match &self.stop {
            Bound::Unbounded => true,
            Bound::Included(s) => key <= s,
            Bound::Excluded(s) => key < s,
        };
        return after_start && before_stop;
    }

    pub fn is_empty(&self) -> bool {
        return match (&self.start, &self.stop) {
            (Bound::Included(a), Bound::Included(b)) => a > b,
            (Bound::Included(a), Bound::Excluded(b)) => a >= b,
            (Bound::Excluded(a), Bound::Included(b)) => a >= b,
            (Bound::Excluded(a), Bound::Excluded(b)) => a >= b,
            _ => false,
        };
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        return !self.intersect(other).map(|r| r.is_empty()).unwrap_or(true);
    }

    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let start = max_bound(&self.start, &other.start);
        let stop = min_bound(&self.stop, &other.stop);
        let range = Range { start, stop };
        if range.is_empty() {
            return None;
        }
        return Some(range);
    }

    /// `self \ other`: the portion(s) of `self` not covered by `other`.
    /// Returns 0, 1, or 2 ranges (2 when `other` punches a hole in the
    /// middle of `self`).
    pub fn subtract(&self, other: &Range) -> Vec<Range> {
        let overlap = match self.intersect(other) {
            None => return vec![self.clone()],
            Some(o) => o,
        };
        let mut out = Vec::new();

        let left = Range { start: self.start.clone(), stop: flip(&overlap.start) };
        if !left.is_empty() {
            out.push(left);
        }

        let right = Range { start: flip(&overlap.stop), stop: self.stop.clone() };
        if !right.is_empty() {
            out.push(right);
        }

        return out;
    }
}

/// Flip an `Included`/`Excluded` bound used as "the other side" of a split:
/// the start of the left remainder must exclude what the overlap included,
/// and vice versa.
fn flip(bound: &Bound<Key>) -> Bound<Key> {
    return match bound {
        Bound::Included(k) => Bound::Excluded(k.clone()),
        Bound::Excluded(k) => Bound::Included(k.clone()),
        Bound::Unbounded => Bound::Unbounded,
    };
}

fn max_bound(a: &Bound<Key>, b: &Bound<Key>) -> Bound<Key> {
    return match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x), Bound::Included(y)) => {
            if x >= y { a.clone() } else { b.clone() }
        }
        (Bound::Excluded(x), Bound::Excluded(y)) => {
            if x >= y { a.clone() } else { b.clone() }
        }
        (Bound::Included(x), Bound::Excluded(y)) => {
            if x > y { a.clone() } else { b.clone() }
        }
        (Bound::Excluded(x), Bound::Included(y)) => {
            if y > x { b.clone() } else { a.clone() }
        }
    };
}

fn min_bound(a: &Bound<Key>, b: &Bound<Key>) -> Bound<Key> {
    return match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x), Bound::Included(y)) => {
            if x <= y { a.clone() } else { b.clone() }
        }
        (Bound::Excluded(x), Bound::Excluded(y)) => {
            if x <= y { a.clone() } else { b.clone() }
        }
        (Bound::Included(x), Bound::Excluded(y)) => {
            if x < y { a.clone() } else { b.clone() }
        }
        (Bound::Excluded(x), Bound::Included(y)) => {
            if y < x { b.clone() } else { a.clone() }
        }
    };
}

/// Order two ranges by their start bound, unbounded-first, for callers that
/// need segments sorted before stitching: within one revision, segment
/// intervals are disjoint and sorted by start key.
pub fn compare_start(a: &Range, b: &Range) -> Ordering {
    return match (&a.start, &b.start) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(x), Bound::Included(y)) => x.cmp(y),
        (Bound::Excluded(x), Bound::Excluded(y)) => x.cmp(y),
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Greater),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Value;

    fn key(n: i64) -> Key {
        return vec![Value::Int64(n)];
    }

    fn range(a: i64, b: i64) -> Range {
        return Range::inclusive(key(a), key(b));
    }

    #[test]
    fn disjoint_subtraction_is_unchanged() {
        let a = range(1, 3);
        let b = range(10, 12);
        assert_eq!(a.subtract(&b), vec![a.clone()]);
    }

    #[test]
    fn full_cover_subtraction_is_empty() {
        let a = range(2, 4);
        let b = range(1, 5);
        assert!(a.subtract(&b).is_empty());
    }

    #[test]
    fn exact_match_subtraction_is_empty() {
        let a = range(1, 5);
        let b = range(1, 5);
        assert!(a.subtract(&b).is_empty());
    }

    #[test]
    fn middle_punch_splits_into_two() {
        let a = range(1, 10);
        let b = range(4, 6);
        let result = a.subtract(&b);
        assert_eq!(result.len(), 2);
        assert!(result[0].contains(&key(1)));
        assert!(result[0].contains(&key(3)));
        assert!(!result[0].contains(&key(4)));
        assert!(!result[1].contains(&key(6)));
        assert!(result[1].contains(&key(7)));
        assert!(result[1].contains(&key(10)));
    }

    #[test]
    fn left_overlap_keeps_right_remainder() {
        let a = range(1, 10);
        let b = range(1, 5);
        let result = a.subtract(&b);
        assert_eq!(result.len(), 1);
        assert!(!result[0].contains(&key(5)));
        assert!(result[0].contains(&key(6)));
        assert!(result[0].contains(&key(10)));
    }

    #[test]
    fn right_overlap_keeps_left_remainder() {
        let a = range(1, 10);
        let b = range(5, 12);
        let result = a.subtract(&b);
        assert_eq!(result.len(), 1);
        assert!(result[0].contains(&key(4)));
        assert!(!result[0].contains(&key(5)));
    }

    #[test]
    fn overlaps_detects_touching_ranges() {
        assert!(range(1, 5).overlaps(&range(5, 10)));
        assert!(!range(1, 4).overlaps(&range(5, 10)));
    }

    #[test]
    fn unbounded_contains_everything_within_one_side() {
        let r = Range { start: Bound::Unbounded, stop: Bound::Included(key(5)) };
        assert!(r.contains(&key(-1000)));
        assert!(r.contains(&key(5)));
        assert!(!r.contains(&key(6)));
    }

    proptest::proptest! {
        #[test]
        fn subtract_partitions_every_key_between_remainder_and_subtrahend(
            a0 in -20i64..20, a1 in -20i64..20,
            b0 in -20i64..20, b1 in -20i64..20,
        ) {
            let a = range(a0.min(a1), a0.max(a1));
            let b = range(b0.min(b1), b0.max(b1));
            let remainder = a.subtract(&b);
            for n in -25..=25i64 {
                let k = key(n);
                if a.contains(&k) {
                    let in_remainder = remainder.iter().any(|r| r.contains(&k));
                    let in_subtrahend = b.contains(&k);
                    prop_assert!(in_remainder != in_subtrahend);
                } else {
                    prop_assert!(remainder.iter().all(|r| !r.contains(&k)));
                }
            }
        }

        #[test]
        fn subtract_pieces_are_disjoint_and_within_the_original(
            a0 in -20i64..20, a1 in -20i64..20,
            b0 in -20i64..20, b1 in -20i64..20,
        ) {
            let a = range(a0.min(a1), a0.max(a1));
            let b = range(b0.min(b1), b0.max(b1));
            let remainder = a.subtract(&b);
            prop_assert!(remainder.len() <= 2);
            for n in -25..=25i64 {
                let count = remainder.iter().filter(|r| r.contains(&key(n))).count();
                prop_assert!(count <= 1);
            }
        }
    }
}
