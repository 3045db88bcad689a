//! Frame: an in-memory, column-aligned chunk. Rows are implicit — all
//! columns share one length, and the key columns are required to be
//! non-decreasing.

use crate::error::{Error, Result};
use crate::schema::{Dtype, Schema};

/// A single cell value, tagged by dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int64(i64),
    Float64(f64),
    Timestamp64(i64),
    Str(String),
}

impl Value {
    pub fn dtype(&self) -> Dtype {
        return match self {
            Value::Int64(_) => Dtype::Int64,
            Value::Float64(_) => Dtype::Float64,
            Value::Timestamp64(_) => Dtype::Timestamp64,
            Value::Str(_) => Dtype::String,
        };
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        return match (self, other) {
            (Int64(a), Int64(b)) => a.cmp(b),
            (Float64(a), Float64(b)) => a.total_cmp(b),
            (Timestamp64(a), Timestamp64(b)) => a.cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            _ => panic!("comparing values of different dtypes"),
        };
    }
}

/// A row's worth of key-column values, compared lexicographically.
pub type Key = Vec<Value>;

/// A dense, typed column array.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Timestamp64(Vec<i64>),
    String(Vec<String>),
}

impl Array {
    pub fn empty(dtype: Dtype) -> Array {
        return match dtype {
            Dtype::Int64 => Array::Int64(Vec::new()),
            Dtype::Float64 => Array::Float64(Vec::new()),
            Dtype::Timestamp64 => Array::Timestamp64(Vec::new()),
            Dtype::String => Array::String(Vec::new()),
        };
    }

    pub fn dtype(&self) -> Dtype {
        return match self {
            Array::Int64(_) => Dtype::Int64,
            Array::Float64(_) => Dtype::Float64,
            Array::Timestamp64(_) => Dtype::Timestamp64,
            Array::String(_) => Dtype::String,
        };
    }

    pub fn len(&self) -> usize {
        return match self {
            Array::Int64(v) => v.len(),
            Array::Float64(v) => v.len(),
            Array::Timestamp64(v) => v.len(),
            Array::String(v) => v.len(),
        };
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    pub fn get(&self, index: usize) -> Value {
        return match self {
            Array::Int64(v) => Value::Int64(v[index]),
            Array::Float64(v) => Value::Float64(v[index]),
            Array::Timestamp64(v) => Value::Timestamp64(v[index]),
            Array::String(v) => Value::Str(v[index].clone()),
        };
    }

    pub fn slice(&self, start: usize, stop: usize) -> Array {
        return match self {
            Array::Int64(v) => Array::Int64(v[start..stop].to_vec()),
            Array::Float64(v) => Array::Float64(v[start..stop].to_vec()),
            Array::Timestamp64(v) => Array::Timestamp64(v[start..stop].to_vec()),
            Array::String(v) => Array::String(v[start..stop].to_vec()),
        };
    }

    /// Keep only the rows at the given indices, in order.
    pub fn take(&self, indices: &[usize]) -> Array {
        return match self {
            Array::Int64(v) => Array::Int64(indices.iter().map(|&i| v[i]).collect()),
            Array::Float64(v) => Array::Float64(indices.iter().map(|&i| v[i]).collect()),
            Array::Timestamp64(v) => Array::Timestamp64(indices.iter().map(|&i| v[i]).collect()),
            Array::String(v) => Array::String(indices.iter().map(|&i| v[i].clone()).collect()),
        };
    }

    pub fn concat(&self, other: &Array) -> Array {
        return match (self, other) {
            (Array::Int64(a), Array::Int64(b)) => Array::Int64([a.as_slice(), b.as_slice()].concat()),
            (Array::Float64(a), Array::Float64(b)) => Array::Float64([a.as_slice(), b.as_slice()].concat()),
            (Array::Timestamp64(a), Array::Timestamp64(b)) => {
                Array::Timestamp64([a.as_slice(), b.as_slice()].concat())
            }
            (Array::String(a), Array::String(b)) => {
                Array::String(a.iter().chain(b.iter()).cloned().collect())
            }
            _ => panic!("concatenating arrays of different dtypes"),
        };
    }
}

/// A column-aligned chunk of rows. All arrays share the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<(String, Array)>,
}

impl Frame {
    pub fn new(columns: Vec<(String, Array)>) -> Frame {
        return Frame { columns };
    }

    pub fn len(&self) -> usize {
        return self.columns.first().map(|(_, a)| a.len()).unwrap_or(0);
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    pub fn column(&self, name: &str) -> Option<&Array> {
        return self.columns.iter().find(|(n, _)| n == name).map(|(_, a)| a);
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        return self.columns.iter().map(|(n, _)| n.as_str());
    }

    pub fn columns(&self) -> &[(String, Array)] {
        return &self.columns;
    }

    /// Validate against `schema`: every column present with matching
    /// dtype, key columns non-decreasing, no NaN in key columns. `Value`'s
    /// `Ord` impl uses `total_cmp` for floats, which orders NaN
    /// consistently but does not make it a legal key: a NaN key is
    /// rejected explicitly rather than silently sorting into some position.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for col in &schema.columns {
            let array = self
                .column(&col.name)
                .ok_or_else(|| Error::schema(format!("frame missing column {:?}", col.name)))?;
            if array.dtype() != col.dtype {
                return Err(Error::schema(format!(
                    "column {:?} has dtype {:?}, schema expects {:?}",
                    col.name,
                    array.dtype(),
                    col.dtype
                )));
            }
            if array.len() != self.len() {
                return Err(Error::schema(format!("column {:?} length mismatch", col.name)));
            }
            if col.is_key {
                if let Array::Float64(values) = array {
                    if values.iter().any(|v| v.is_nan()) {
                        return Err(Error::schema(format!("key column {:?} contains NaN", col.name)));
                    }
                }
            }
        }
        let keys = self.keys(schema);
        for pair in keys.windows(2) {
            if pair[0] > pair[1] {
                return Err(Error::schema("key columns are not non-decreasing".to_string()));
            }
        }
        return Ok(());
    }

    /// The key tuple for every row, in schema key-column order.
    pub fn keys(&self, schema: &Schema) -> Vec<Key> {
        let key_cols: Vec<&Array> = schema
            .key_names()
            .iter()
            .map(|name| self.column(name).expect("validated frame has all columns"))
            .collect();
        return (0..self.len())
            .map(|row| key_cols.iter().map(|a| a.get(row)).collect())
            .collect();
    }

    pub fn key_at(&self, schema: &Schema, row: usize) -> Key {
        return schema
            .key_names()
            .iter()
            .map(|name| self.column(name).expect("column present").get(row))
            .collect();
    }

    pub fn start_key(&self, schema: &Schema) -> Option<Key> {
        if self.is_empty() {
            return None;
        }
        return Some(self.key_at(schema, 0));
    }

    pub fn stop_key(&self, schema: &Schema) -> Option<Key> {
        if self.is_empty() {
            return None;
        }
        return Some(self.key_at(schema, self.len() - 1));
    }

    pub fn slice(&self, start: usize, stop: usize) -> Frame {
        let columns = self.columns.iter().map(|(n, a)| (n.clone(), a.slice(start, stop))).collect();
        return Frame::new(columns);
    }

    /// Keep only the given row indices, in order. Used by shadow resolution
    /// to filter a materialized segment down to its kept interval.
    pub fn take(&self, indices: &[usize]) -> Frame {
        let columns = self.columns.iter().map(|(n, a)| (n.clone(), a.take(indices))).collect();
        return Frame::new(columns);
    }

    /// Concatenate two frames with identical columns, in key order.
    pub fn concat(&self, other: &Frame) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|(n, a)| {
                let b = other.column(n).expect("concatenated frames share columns");
                return (n.clone(), a.concat(b));
            })
            .collect();
        return Frame::new(columns);
    }
}

/// Encode one column's worth of values into the length-prefixed,
/// fixed-endianness byte format used for stored objects.
pub fn encode_array(array: &Array) -> Vec<u8> {
    let mut out = Vec::new();
    match array {
        Array::Int64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        Array::Float64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        Array::Timestamp64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        Array::String(v) => {
            for s in v {
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }
    return out;
}

pub fn decode_array(dtype: Dtype, bytes: &[u8]) -> Result<Array> {
    return match dtype {
        Dtype::Int64 => Ok(Array::Int64(decode_fixed(bytes, i64::from_le_bytes)?)),
        Dtype::Float64 => Ok(Array::Float64(decode_fixed(bytes, f64::from_le_bytes)?)),
        Dtype::Timestamp64 => Ok(Array::Timestamp64(decode_fixed(bytes, i64::from_le_bytes)?)),
        Dtype::String => decode_strings(bytes),
    };
}

fn decode_fixed<T, F: Fn([u8; 8]) -> T>(bytes: &[u8], from_le: F) -> Result<Vec<T>> {
    if bytes.len() % 8 != 0 {
        return Err(Error::schema("column byte length not a multiple of 8".to_string()));
    }
    let mut out = Vec::with_capacity(bytes.len() / 8);
    for chunk in bytes.chunks_exact(8) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        out.push(from_le(buf));
    }
    return Ok(out);
}

fn decode_strings(bytes: &[u8]) -> Result<Array> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        if pos + 4 > bytes.len() {
            return Err(Error::schema("truncated string column".to_string()));
        }
        let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + len > bytes.len() {
            return Err(Error::schema("truncated string column".to_string()));
        }
        let s = String::from_utf8(bytes[pos..pos + len].to_vec())
            .map_err(|e| Error::schema(format!("invalid utf-8 in string column: {e}")))?;
        out.push(s);
        pos += len;
    }
    return Ok(Array::String(out));
}

/// Encode a key tuple, length-prefixed per value so mixed-width dtypes
/// (e.g. a string key column) stay self-delimiting.
pub fn encode_key(key: &Key) -> Vec<u8> {
    let mut out = Vec::new();
    for value in key {
        match value {
            Value::Int64(v) => {
                out.push(0);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Float64(v) => {
                out.push(1);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Timestamp64(v) => {
                out.push(2);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Str(s) => {
                out.push(3);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }
    return out;
}

pub fn decode_key(bytes: &[u8], len: usize) -> Result<Key> {
    let mut out = Vec::with_capacity(len);
    let mut pos = 0;
    for _ in 0..len {
        let tag = *bytes.get(pos).ok_or_else(|| Error::schema("truncated key".to_string()))?;
        pos += 1;
        match tag {
            0 | 1 | 2 => {
                let buf: [u8; 8] = bytes[pos..pos + 8]
                    .try_into()
                    .map_err(|_| Error::schema("truncated key".to_string()))?;
                pos += 8;
                out.push(match tag {
                    0 => Value::Int64(i64::from_le_bytes(buf)),
                    1 => Value::Float64(f64::from_le_bytes(buf)),
                    _ => Value::Timestamp64(i64::from_le_bytes(buf)),
                });
            }
            3 => {
                let len = u32::from_le_bytes(
                    bytes[pos..pos + 4].try_into().map_err(|_| Error::schema("truncated key".to_string()))?,
                ) as usize;
                pos += 4;
                let s = String::from_utf8(bytes[pos..pos + len].to_vec())
                    .map_err(|e| Error::schema(format!("invalid utf-8 in key: {e}")))?;
                pos += len;
                out.push(Value::Str(s));
            }
            other => return Err(Error::schema(format!("unknown key value tag {other}"))),
        }
    }
    return Ok(out);
}
