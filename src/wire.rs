//! Small length-prefixed, fixed-endianness primitives shared by every
//! on-disk record (segment descriptors, revision payloads). Kept in one
//! place so every record reads the same way.

use crate::error::{Error, Result};
use crate::frame::{self, Key};

pub(crate) fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

pub(crate) fn read_string(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let len = read_u32(bytes, pos)? as usize;
    let s = bytes
        .get(*pos..*pos + len)
        .ok_or_else(|| Error::schema("truncated string field".to_string()))?;
    *pos += len;
    return String::from_utf8(s.to_vec()).map_err(|e| Error::schema(format!("invalid utf-8: {e}")));
}

pub(crate) fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let buf: [u8; 4] = bytes
        .get(*pos..*pos + 4)
        .ok_or_else(|| Error::schema("truncated field".to_string()))?
        .try_into()
        .unwrap();
    *pos += 4;
    return Ok(u32::from_le_bytes(buf));
}

pub(crate) fn read_u64(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let buf: [u8; 8] = bytes
        .get(*pos..*pos + 8)
        .ok_or_else(|| Error::schema("truncated field".to_string()))?
        .try_into()
        .unwrap();
    *pos += 8;
    return Ok(u64::from_le_bytes(buf));
}

pub(crate) fn write_key(out: &mut Vec<u8>, key: &Key) {
    out.push(key.len() as u8);
    let encoded = frame::encode_key(key);
    out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
    out.extend_from_slice(&encoded);
}

pub(crate) fn read_key(bytes: &[u8], pos: &mut usize) -> Result<Key> {
    let key_len = *bytes.get(*pos).ok_or_else(|| Error::schema("truncated key length".to_string()))? as usize;
    *pos += 1;
    let byte_len = read_u32(bytes, pos)? as usize;
    let slice = bytes
        .get(*pos..*pos + byte_len)
        .ok_or_else(|| Error::schema("truncated key bytes".to_string()))?;
    *pos += byte_len;
    return frame::decode_key(slice, key_len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Value;

    #[test]
    fn string_round_trips() {
        let mut out = Vec::new();
        write_string(&mut out, "hello");
        let mut pos = 0;
        assert_eq!(read_string(&out, &mut pos).unwrap(), "hello");
        assert_eq!(pos, out.len());
    }

    #[test]
    fn key_round_trips() {
        let key: Key = vec![Value::Int64(7), Value::Str("x".to_string())];
        let mut out = Vec::new();
        write_key(&mut out, &key);
        let mut pos = 0;
        assert_eq!(read_key(&out, &mut pos).unwrap(), key);
        assert_eq!(pos, out.len());
    }
}
