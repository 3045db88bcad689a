//! Segment: the persisted form of a frame slice. Immutable once written;
//! addressed per-column by digest, plus the inclusive `[start, stop]` key
//! range and row count that let a reader decide whether to bother loading
//! it at all.

use crate::codec::{self, Codec};
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::frame::{self, Frame, Key};
use crate::object_store::ObjectStore;
use crate::schema::Schema;
use crate::wire::{read_key, read_string, read_u32, read_u64, write_key, write_string};

/// Default target row count per segment.
pub const DEFAULT_SEGMENT_ROWS: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub digest: Digest,
    pub codec: String,
}

/// A segment descriptor: per-column digests plus the slice's key range and
/// row count. Segments are immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub columns: Vec<(String, ColumnRef)>,
    pub start: Key,
    pub stop: Key,
    pub count: usize,
}

impl Segment {
    /// Compress and store every column of `frame`, returning the resulting
    /// descriptor.
    pub fn write(frame: &Frame, schema: &Schema, store: &ObjectStore, codec: &dyn Codec) -> Result<Segment> {
        if frame.is_empty() {
            return Err(Error::schema("cannot write an empty segment".to_string()));
        }
        let mut columns = Vec::with_capacity(schema.columns.len());
        for col in &schema.columns {
            let array = frame
                .column(&col.name)
                .ok_or_else(|| Error::schema(format!("frame missing column {:?}", col.name)))?;
            let raw = frame::encode_array(array);
            let compressed = codec.encode(&raw)?;
            let digest = store.put(&compressed)?;
            columns.push((col.name.clone(), ColumnRef { digest, codec: codec.name().to_string() }));
        }
        let start = frame.start_key(schema).expect("non-empty frame has a start key");
        let stop = frame.stop_key(schema).expect("non-empty frame has a stop key");
        return Ok(Segment { columns, start, stop, count: frame.len() });
    }

    /// Load every column through the object store, reversing its codec, and
    /// reassemble the frame.
    pub fn read(&self, schema: &Schema, store: &ObjectStore) -> Result<Frame> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, col_ref) in &self.columns {
            let dtype = schema
                .column(name)
                .ok_or_else(|| Error::schema(format!("segment references unknown column {name:?}")))?
                .dtype;
            let codec = codec::by_name(&col_ref.codec)
                .ok_or_else(|| Error::integrity(col_ref.digest, format!("unknown codec {:?}", col_ref.codec)))?;
            let compressed = store.get(&col_ref.digest)?;
            let raw = codec.decode(&compressed)?;
            let array = frame::decode_array(dtype, &raw)?;
            if array.len() != self.count {
                return Err(Error::integrity(
                    col_ref.digest,
                    format!("column {name:?} has {} rows, segment declares {}", array.len(), self.count),
                ));
            }
            columns.push((name.clone(), array));
        }
        return Ok(Frame::new(columns));
    }

    /// Split `frame` into segments of at most `target_rows` rows each,
    /// preserving key order.
    pub fn slice_frame(frame: &Frame, target_rows: usize) -> Vec<Frame> {
        if frame.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut start = 0;
        while start < frame.len() {
            let stop = (start + target_rows).min(frame.len());
            out.push(frame.slice(start, stop));
            start = stop;
        }
        return out;
    }
}

impl Segment {
    /// Length-prefixed, fixed-endianness encoding of a segment descriptor,
    /// used inside a revision payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.columns.len() as u32).to_le_bytes());
        for (name, col_ref) in &self.columns {
            write_string(&mut out, name);
            out.extend_from_slice(&col_ref.digest.0);
            write_string(&mut out, &col_ref.codec);
        }
        write_key(&mut out, &self.start);
        write_key(&mut out, &self.stop);
        out.extend_from_slice(&(self.count as u64).to_le_bytes());
        return out;
    }

    pub fn from_bytes(bytes: &[u8], pos: &mut usize) -> Result<Segment> {
        let n_columns = read_u32(bytes, pos)? as usize;
        let mut columns = Vec::with_capacity(n_columns);
        for _ in 0..n_columns {
            let name = read_string(bytes, pos)?;
            let digest_bytes = bytes
                .get(*pos..*pos + crate::digest::DIGEST_BYTES)
                .ok_or_else(|| Error::schema("truncated digest".to_string()))?;
            let mut digest_arr = [0u8; crate::digest::DIGEST_BYTES];
            digest_arr.copy_from_slice(digest_bytes);
            *pos += crate::digest::DIGEST_BYTES;
            let codec_name = read_string(bytes, pos)?;
            columns.push((name, ColumnRef { digest: Digest(digest_arr), codec: codec_name }));
        }
        let start = read_key(bytes, pos)?;
        let stop = read_key(bytes, pos)?;
        let count = read_u64(bytes, pos)? as usize;
        return Ok(Segment { columns, start, stop, count });
    }
}
