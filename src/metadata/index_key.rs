use std::fmt;

/// Type tag stored as the first byte of an encoded key.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyType {
    Integer32 = 0,
    Integer64 = 1,
    Utf8 = 4,
    Timestamp = 5,
    Boolean = 6,
    Bytes = 7,
}

impl KeyType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(KeyType::Integer32),
            1 => Some(KeyType::Integer64),
            4 => Some(KeyType::Utf8),
            5 => Some(KeyType::Timestamp),
            6 => Some(KeyType::Boolean),
            7 => Some(KeyType::Bytes),
            _ => None,
        }
    }
}

/// A non-null value of the indexed column.
///
/// Keys order by type first (declaration order), then by value; this is the
/// order entries are laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Integer32(i32),
    Integer64(i64),
    Utf8(String),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl IndexKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            IndexKey::Integer32(_) => KeyType::Integer32,
            IndexKey::Integer64(_) => KeyType::Integer64,
            IndexKey::Utf8(_) => KeyType::Utf8,
            IndexKey::Timestamp(_) => KeyType::Timestamp,
            IndexKey::Boolean(_) => KeyType::Boolean,
            IndexKey::Bytes(_) => KeyType::Bytes,
        }
    }

    pub fn encoded_len(&self) -> usize {
        1 + match self {
            IndexKey::Integer32(_) => 4,
            IndexKey::Integer64(_) | IndexKey::Timestamp(_) => 8,
            IndexKey::Boolean(_) => 1,
            IndexKey::Utf8(s) => s.len(),
            IndexKey::Bytes(b) => b.len(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.key_type() as u8);
        match self {
            IndexKey::Integer32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            IndexKey::Integer64(v) | IndexKey::Timestamp(v) => {
                buf.extend_from_slice(&v.to_le_bytes())
            }
            IndexKey::Boolean(v) => buf.push(*v as u8),
            IndexKey::Utf8(s) => buf.extend_from_slice(s.as_bytes()),
            IndexKey::Bytes(b) => buf.extend_from_slice(b),
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, String> {
        let (&tag, payload) = buf.split_first().ok_or("empty key")?;
        let key_type = KeyType::from_u8(tag).ok_or_else(|| format!("unknown key type {tag}"))?;

        let fixed = |len: usize| {
            if payload.len() == len {
                Ok(payload)
            } else {
                Err(format!(
                    "{key_type:?} key has {} bytes, expected {len}",
                    payload.len()
                ))
            }
        };

        let key = match key_type {
            KeyType::Integer32 => {
                let b = fixed(4)?;
                IndexKey::Integer32(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            KeyType::Integer64 | KeyType::Timestamp => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(fixed(8)?);
                let v = i64::from_le_bytes(bytes);
                if key_type == KeyType::Integer64 {
                    IndexKey::Integer64(v)
                } else {
                    IndexKey::Timestamp(v)
                }
            }
            KeyType::Boolean => match fixed(1)?[0] {
                0 => IndexKey::Boolean(false),
                1 => IndexKey::Boolean(true),
                other => return Err(format!("invalid boolean byte {other}")),
            },
            KeyType::Utf8 => IndexKey::Utf8(
                std::str::from_utf8(payload)
                    .map_err(|_| "utf8 error")?
                    .to_string(),
            ),
            KeyType::Bytes => IndexKey::Bytes(payload.to_vec()),
        };
        Ok(key)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Integer32(v) => write!(f, "{v}"),
            IndexKey::Integer64(v) => write!(f, "{v}"),
            IndexKey::Utf8(s) => write!(f, "{s:?}"),
            IndexKey::Timestamp(v) => write!(f, "ts:{v}"),
            IndexKey::Boolean(v) => write!(f, "{v}"),
            IndexKey::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::Utf8(value.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(value: String) -> Self {
        IndexKey::Utf8(value)
    }
}

impl From<i32> for IndexKey {
    fn from(value: i32) -> Self {
        IndexKey::Integer32(value)
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Integer64(value)
    }
}

impl From<bool> for IndexKey {
    fn from(value: bool) -> Self {
        IndexKey::Boolean(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_inverts_encode() {
        let keys = [
            IndexKey::Integer32(-7),
            IndexKey::Integer64(1 << 40),
            IndexKey::from("pending"),
            IndexKey::Timestamp(1_700_000_000_000_000),
            IndexKey::Boolean(true),
            IndexKey::Bytes(vec![0, 255, 3]),
        ];
        for key in keys {
            let encoded = key.encode();
            assert_eq!(encoded.len(), key.encoded_len());
            assert_eq!(IndexKey::decode(&encoded).unwrap(), key);
        }
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(IndexKey::decode(&[]).is_err());
        assert!(IndexKey::decode(&[42, 1, 2]).is_err());
        assert!(IndexKey::decode(&[KeyType::Integer32 as u8, 1, 2]).is_err());
        assert!(IndexKey::decode(&[KeyType::Boolean as u8, 2]).is_err());
        assert!(IndexKey::decode(&[KeyType::Utf8 as u8, 0xff, 0xfe]).is_err());
    }

    #[test]
    fn ordering_is_type_then_value() {
        let mut keys = vec![
            IndexKey::from("b"),
            IndexKey::Integer64(5),
            IndexKey::from("a"),
            IndexKey::Integer32(9),
            IndexKey::Integer64(-1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                IndexKey::Integer32(9),
                IndexKey::Integer64(-1),
                IndexKey::Integer64(5),
                IndexKey::from("a"),
                IndexKey::from("b"),
            ]
        );
    }
}
