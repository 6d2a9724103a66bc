use crate::errors::Error;
use anyhow::{anyhow, bail, Result};
use std::cmp::Ordering;

/// Attribute and key types, with their on-disk codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Str,
    Float,
    Bool,
}

impl DataType {
    pub fn code(&self) -> i32 {
        match self {
            DataType::Int => 0,
            DataType::Str => 1,
            DataType::Float => 2,
            DataType::Bool => 3,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(DataType::Int),
            1 => Ok(DataType::Str),
            2 => Ok(DataType::Float),
            3 => Ok(DataType::Bool),
            _ => Err(anyhow!("unknown data type code {code}")),
        }
    }

    /// Bytes one attribute of this type occupies inside a record.
    /// `len` is the declared length and only matters for strings.
    pub fn size(&self, len: usize) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Float => 4,
            DataType::Bool => 1,
            DataType::Str => len,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Str => write!(f, "string"),
            DataType::Float => write!(f, "float"),
            DataType::Bool => write!(f, "bool"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn dtype(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::Bool(_) => DataType::Bool,
            Value::Str(_) => DataType::Str,
        }
    }

    /// Fixed-length little-endian encoding used inside record slots.
    /// Strings are NUL-padded (or truncated) to the declared length.
    pub fn to_bytes(&self, len: usize) -> Vec<u8> {
        match self {
            Value::Int(v) => v.to_le_bytes().to_vec(),
            Value::Float(v) => v.to_le_bytes().to_vec(),
            Value::Bool(v) => vec![*v as u8],
            Value::Str(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.resize(len, 0);
                bytes
            }
        }
    }

    pub fn from_bytes(dtype: DataType, bytes: &[u8]) -> Self {
        match dtype {
            DataType::Int => Value::Int(i32::from_le_bytes(bytes.try_into().unwrap())),
            DataType::Float => Value::Float(f32::from_le_bytes(bytes.try_into().unwrap())),
            DataType::Bool => Value::Bool(bytes[0] != 0),
            DataType::Str => {
                let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                Value::Str(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
        }
    }

    pub fn from_string(dtype: DataType, s: &str) -> Result<Self> {
        Ok(match dtype {
            DataType::Int => Value::Int(s.parse()?),
            DataType::Float => Value::Float(s.parse()?),
            DataType::Bool => Value::Bool(s.parse()?),
            DataType::Str => Value::Str(s.to_string()),
        })
    }

    /// Order-preserving serialised form: comparing two encodings byte-wise
    /// gives the same ordering as comparing the values themselves. The index
    /// compares keys through this encoding only.
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            Value::Int(v) => ((*v as u32) ^ (1 << 31)).to_be_bytes().to_vec(),
            Value::Float(v) => {
                // flip all bits of negatives, only the sign bit of positives
                let bits = v.to_bits() as i32;
                let ordered = if bits < 0 { !bits } else { bits ^ i32::MIN };
                (ordered as u32).to_be_bytes().to_vec()
            }
            Value::Bool(v) => vec![*v as u8],
            Value::Str(s) => s.as_bytes().to_vec(),
        }
    }

    /// Typed comparison for predicate evaluation. Both sides must carry the
    /// same type tag.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(a.total_cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => bail!(Error::TypeMismatch(
                self.dtype().to_string(),
                other.dtype().to_string()
            )),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_record_codec_round_trip() {
        let cases = [
            (Value::Int(-7), 4),
            (Value::Float(2.5), 4),
            (Value::Bool(true), 1),
            (Value::Str("abcd".into()), 6),
        ];

        for (value, len) in cases {
            let bytes = value.to_bytes(len);
            assert_eq!(bytes.len(), len);
            assert_eq!(Value::from_bytes(value.dtype(), &bytes), value);
        }
    }

    #[test]
    fn test_string_padding_is_stripped() {
        let bytes = Value::Str("ab".into()).to_bytes(5);
        assert_eq!(bytes, b"ab\0\0\0");
        assert_eq!(Value::from_bytes(DataType::Str, &bytes), Value::Str("ab".into()));
    }

    #[test]
    fn test_key_bytes_preserve_order() {
        let ints = [i32::MIN, -100, -1, 0, 1, 42, i32::MAX];
        for w in ints.windows(2) {
            assert!(Value::Int(w[0]).key_bytes() < Value::Int(w[1]).key_bytes());
        }

        let floats = [-1000.0_f32, -0.5, 0.0, 0.25, 3.5, 1e10];
        for w in floats.windows(2) {
            assert!(Value::Float(w[0]).key_bytes() < Value::Float(w[1]).key_bytes());
        }

        assert!(Value::Str("abc".into()).key_bytes() < Value::Str("abd".into()).key_bytes());
        assert!(Value::Bool(false).key_bytes() < Value::Bool(true).key_bytes());
    }

    #[test]
    fn test_compare_rejects_mixed_types() -> Result<()> {
        let err = Value::Int(1).compare(&Value::Str("1".into())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TypeMismatch(_, _))
        ));
        Ok(())
    }
}
