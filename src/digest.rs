//! Content-addressed identity for everything the object store holds.
//!
//! A digest is a fixed-width hash of a byte payload. We truncate a blake3
//! hash to 20 bytes, which gives us a git-sized identity without pulling
//! in a second hash function.

use std::fmt;

/// Width in bytes of a [`Digest`]. 160 bits, git-sized.
pub const DIGEST_BYTES: usize = 20;

/// The all-zero digest used as the parent of root revisions.
pub const ZERO_DIGEST: Digest = Digest([0u8; DIGEST_BYTES]);

/// A fixed-width content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; DIGEST_BYTES]);

impl Digest {
    /// Hash a payload to produce its digest.
    pub fn of(payload: &[u8]) -> Digest {
        let hash = blake3::hash(payload);
        let mut bytes = [0u8; DIGEST_BYTES];
        bytes.copy_from_slice(&hash.as_bytes()[..DIGEST_BYTES]);
        return Digest(bytes);
    }

    /// Hash a payload together with an author token, as the changelog does
    /// for child digests.
    pub fn of_with_author(payload: &[u8], author: &str) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(payload);
        hasher.update(author.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; DIGEST_BYTES];
        bytes.copy_from_slice(&hash.as_bytes()[..DIGEST_BYTES]);
        return Digest(bytes);
    }

    pub fn is_zero(&self) -> bool {
        return self.0 == [0u8; DIGEST_BYTES];
    }

    pub fn to_hex(&self) -> String {
        return hex::encode(self.0);
    }

    pub fn from_hex(s: &str) -> Option<Digest> {
        let decoded = hex::decode(s).ok()?;
        if decoded.len() != DIGEST_BYTES {
            return None;
        }
        let mut bytes = [0u8; DIGEST_BYTES];
        bytes.copy_from_slice(&decoded);
        return Some(Digest(bytes));
    }

    /// The directory split used for physical layout: first byte as a head,
    /// remainder as the tail.
    pub fn split(&self) -> (String, String) {
        let hex = self.to_hex();
        return (hex[..2].to_string(), hex[2..].to_string());
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "Digest({})", self.to_hex());
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.to_hex());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(Digest::of(b"hello"), Digest::of(b"hello"));
    }

    #[test]
    fn digest_differs_for_different_input() {
        assert_ne!(Digest::of(b"hello"), Digest::of(b"hello!"));
    }

    #[test]
    fn hex_round_trips() {
        let d = Digest::of(b"round trip me");
        let hex = d.to_hex();
        assert_eq!(Digest::from_hex(&hex), Some(d));
    }

    #[test]
    fn from_hex_rejects_wrong_width() {
        assert_eq!(Digest::from_hex("abcd"), None);
    }

    #[test]
    fn zero_digest_is_zero() {
        assert!(ZERO_DIGEST.is_zero());
        assert!(!Digest::of(b"x").is_zero());
    }

    #[test]
    fn split_rejoins_to_full_hex() {
        let d = Digest::of(b"segment payload");
        let (head, tail) = d.split();
        assert_eq!(format!("{head}{tail}"), d.to_hex());
        assert_eq!(head.len(), 2);
    }

    #[test]
    fn author_changes_digest() {
        let a = Digest::of_with_author(b"payload", "writer-a");
        let b = Digest::of_with_author(b"payload", "writer-b");
        assert_ne!(a, b);
    }

    proptest::proptest! {
        #[test]
        fn hex_round_trip_holds_for_arbitrary_bytes(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let d = Digest::of(&bytes);
            prop_assert_eq!(Digest::from_hex(&d.to_hex()), Some(d));
        }

        #[test]
        fn split_always_rejoins_to_the_original_hex(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let d = Digest::of(&bytes);
            let (head, tail) = d.split();
            prop_assert_eq!(format!("{head}{tail}"), d.to_hex());
        }
    }
}
