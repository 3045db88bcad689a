//! Column compression is treated as an opaque byte→byte transform with a
//! declared identity. Real codecs live outside this crate; here we define
//! the trait and the `Identity` codec used by tests and as the contract's
//! reference implementation.

use crate::error::Result;

/// A reversible byte transform, identified by a short name that gets
/// stored alongside the segment's column digest so a reader knows how to
/// reverse it.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// No-op codec: encode and decode are both the identity function.
pub struct Identity;

impl Codec for Identity {
    fn name(&self) -> &'static str {
        return "identity";
    }

    fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        return Ok(bytes.to_vec());
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        return Ok(bytes.to_vec());
    }
}

/// Look up a codec by the name stored in a segment descriptor. Only
/// `"identity"` is known to this crate; real deployments register
/// additional codecs through their own lookup.
pub fn by_name(name: &str) -> Option<Box<dyn Codec>> {
    return match name {
        "identity" => Some(Box::new(Identity)),
        _ => None,
    };
}
