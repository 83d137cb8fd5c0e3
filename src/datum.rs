//! Database data types and values.
//!
//! This module defines the canonical type system and value representation
//! for the query engine. [`Type`] identifies one of the three supported
//! column types, and [`Value`] represents a single typed column value with
//! fixed-layout serialization support.
//!
//! Records are flat byte strings: every column occupies a fixed number of
//! bytes at a fixed offset, so a value always encodes to exactly the byte
//! width declared for its column. Integers and floats use little-endian
//! in-record encoding; strings are NUL-padded to their declared length.

use std::cmp::Ordering;
use std::fmt;

use bytes::BufMut;

/// Errors from value coercion, comparison, and serialization.
#[derive(Debug)]
pub enum DatumError {
    /// Two values (or a value and a column) have types that cannot be
    /// reconciled by numeric coercion.
    IncompatibleTypes {
        /// Type on the left-hand side.
        lhs: Type,
        /// Type on the right-hand side.
        rhs: Type,
    },
    /// A string value exceeds the declared column length.
    ValueTooLong {
        /// Actual byte length of the value.
        len: usize,
        /// Declared column capacity.
        max: usize,
    },
    /// Buffer too small for the operation.
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
}

impl fmt::Display for DatumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatumError::IncompatibleTypes { lhs, rhs } => {
                write!(f, "incompatible types: {} vs {}", lhs, rhs)
            }
            DatumError::ValueTooLong { len, max } => {
                write!(f, "string of {} bytes exceeds column capacity {}", len, max)
            }
            DatumError::BufferTooSmall {
                required,
                available,
            } => {
                write!(
                    f,
                    "buffer too small: need {} bytes, have {}",
                    required, available
                )
            }
        }
    }
}

impl std::error::Error for DatumError {}

/// Column data type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 4-byte signed integer.
    Int,
    /// 8-byte double-precision floating point.
    Float,
    /// Fixed-length string, NUL-padded to the declared column length.
    Char,
}

impl Type {
    /// Returns the SQL display name for this type.
    pub const fn display_name(self) -> &'static str {
        match self {
            Type::Int => "INT",
            Type::Float => "FLOAT",
            Type::Char => "CHAR",
        }
    }

    /// Returns the fixed byte size for numeric types, or `None` for `Char`,
    /// whose size is the declared column length.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Type::Int => Some(4),
            Type::Float => Some(8),
            Type::Char => None,
        }
    }

    /// Returns true if this type participates in int/float coercion.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit floating point.
    Float(f64),
    /// String, at most the declared column length when stored.
    Str(String),
}

impl Value {
    /// Returns the data type of this value.
    pub fn data_type(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Str(_) => Type::Char,
        }
    }

    /// Coerces this value to the given column type.
    ///
    /// Int and Float convert freely (float to int truncates toward zero).
    /// Any conversion involving a string fails.
    pub fn coerce_to(self, ty: Type) -> Result<Value, DatumError> {
        match (self, ty) {
            (v @ Value::Int(_), Type::Int) => Ok(v),
            (v @ Value::Float(_), Type::Float) => Ok(v),
            (v @ Value::Str(_), Type::Char) => Ok(v),
            (Value::Int(n), Type::Float) => Ok(Value::Float(n as f64)),
            (Value::Float(n), Type::Int) => Ok(Value::Int(n as i32)),
            (v, ty) => Err(DatumError::IncompatibleTypes {
                lhs: v.data_type(),
                rhs: ty,
            }),
        }
    }

    /// Serializes this value into a fixed-width column slot.
    ///
    /// The buffer is the column slot: 4 bytes for Int, 8 for Float, the
    /// declared length for Char. Strings shorter than the slot are
    /// NUL-padded on the right.
    ///
    /// # Errors
    ///
    /// Returns [`DatumError::ValueTooLong`] if a string does not fit, and
    /// [`DatumError::BufferTooSmall`] if the buffer is under the required
    /// width for a numeric type.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), DatumError> {
        match self {
            Value::Int(n) => {
                if buf.len() < 4 {
                    return Err(DatumError::BufferTooSmall {
                        required: 4,
                        available: buf.len(),
                    });
                }
                buf[0..4].copy_from_slice(&n.to_le_bytes());
            }
            Value::Float(n) => {
                if buf.len() < 8 {
                    return Err(DatumError::BufferTooSmall {
                        required: 8,
                        available: buf.len(),
                    });
                }
                buf[0..8].copy_from_slice(&n.to_le_bytes());
            }
            Value::Str(s) => {
                let data = s.as_bytes();
                if data.len() > buf.len() {
                    return Err(DatumError::ValueTooLong {
                        len: data.len(),
                        max: buf.len(),
                    });
                }
                buf[..data.len()].copy_from_slice(data);
                buf[data.len()..].fill(0);
            }
        }
        Ok(())
    }

    /// Deserializes a value from a fixed-width column slot.
    ///
    /// For `Char` the whole slice is the column; trailing NUL padding is
    /// trimmed. Non-UTF-8 bytes are replaced rather than rejected since
    /// records are only ever written through [`Value::serialize`].
    pub fn deserialize(ty: Type, buf: &[u8]) -> Result<Value, DatumError> {
        match ty {
            Type::Int => {
                if buf.len() < 4 {
                    return Err(DatumError::BufferTooSmall {
                        required: 4,
                        available: buf.len(),
                    });
                }
                Ok(Value::Int(i32::from_le_bytes([
                    buf[0], buf[1], buf[2], buf[3],
                ])))
            }
            Type::Float => {
                if buf.len() < 8 {
                    return Err(DatumError::BufferTooSmall {
                        required: 8,
                        available: buf.len(),
                    });
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[0..8]);
                Ok(Value::Float(f64::from_le_bytes(raw)))
            }
            Type::Char => {
                let trimmed = match buf.iter().position(|&b| b == 0) {
                    Some(end) => &buf[..end],
                    None => buf,
                };
                Ok(Value::Str(String::from_utf8_lossy(trimmed).into_owned()))
            }
        }
    }

    /// Compares two values with numeric coercion.
    ///
    /// Int and Float compare as doubles; strings compare byte-wise after
    /// padding is trimmed. String-vs-numeric comparison is an error.
    pub fn compare(&self, other: &Value) -> Result<Ordering, DatumError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            (Value::Float(a), Value::Float(b)) => Ok(a.total_cmp(b)),
            (Value::Int(a), Value::Float(b)) => Ok((*a as f64).total_cmp(b)),
            (Value::Float(a), Value::Int(b)) => Ok(a.total_cmp(&(*b as f64))),
            (a, b) => Err(DatumError::IncompatibleTypes {
                lhs: a.data_type(),
                rhs: b.data_type(),
            }),
        }
    }

    /// Appends the order-preserving index key encoding of this value.
    ///
    /// The encoding sorts byte-wise in the same order as [`Value::compare`]
    /// sorts values of the column's type, so an ordered byte map doubles as
    /// an ordered index:
    ///
    /// - Int: big-endian with the sign bit flipped.
    /// - Float: IEEE bits, negative values fully inverted, positive values
    ///   with the sign bit set.
    /// - Char: raw bytes NUL-padded to `len`.
    ///
    /// `len` is the declared column width and only matters for `Char`.
    pub fn encode_key(&self, len: usize, out: &mut Vec<u8>) {
        match self {
            Value::Int(n) => {
                out.put_u32((*n as u32) ^ 0x8000_0000);
            }
            Value::Float(n) => {
                let bits = n.to_bits();
                let ordered = if bits & 0x8000_0000_0000_0000 != 0 {
                    !bits
                } else {
                    bits | 0x8000_0000_0000_0000
                };
                out.put_u64(ordered);
            }
            Value::Str(s) => {
                let data = s.as_bytes();
                let take = data.len().min(len);
                out.put_slice(&data[..take]);
                out.put_bytes(0, len - take);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_fixed_size() {
        assert_eq!(Type::Int.fixed_size(), Some(4));
        assert_eq!(Type::Float.fixed_size(), Some(8));
        assert_eq!(Type::Char.fixed_size(), None);
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(
            Value::Int(3).coerce_to(Type::Float).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            Value::Float(3.9).coerce_to(Type::Int).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            Value::Float(-3.9).coerce_to(Type::Int).unwrap(),
            Value::Int(-3)
        );
        assert!(Value::Str("x".into()).coerce_to(Type::Int).is_err());
        assert!(Value::Int(1).coerce_to(Type::Char).is_err());
    }

    #[test]
    fn test_roundtrip_fixed_layout() {
        let mut buf = [0u8; 4];
        Value::Int(-42).serialize(&mut buf).unwrap();
        assert_eq!(Value::deserialize(Type::Int, &buf).unwrap(), Value::Int(-42));

        let mut buf = [0u8; 8];
        Value::Float(2.5).serialize(&mut buf).unwrap();
        assert_eq!(
            Value::deserialize(Type::Float, &buf).unwrap(),
            Value::Float(2.5)
        );

        let mut buf = [0u8; 8];
        Value::Str("abc".into()).serialize(&mut buf).unwrap();
        assert_eq!(&buf, b"abc\0\0\0\0\0");
        assert_eq!(
            Value::deserialize(Type::Char, &buf).unwrap(),
            Value::Str("abc".into())
        );
    }

    #[test]
    fn test_string_too_long() {
        let mut buf = [0u8; 2];
        assert!(matches!(
            Value::Str("abc".into()).serialize(&mut buf),
            Err(DatumError::ValueTooLong { len: 3, max: 2 })
        ));
    }

    #[test]
    fn test_compare_with_coercion() {
        assert_eq!(
            Value::Int(2).compare(&Value::Float(2.0)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            Value::Float(1.5).compare(&Value::Int(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::Str("ab".into())
                .compare(&Value::Str("b".into()))
                .unwrap(),
            Ordering::Less
        );
        assert!(Value::Int(1).compare(&Value::Str("1".into())).is_err());
    }

    #[test]
    fn test_key_encoding_orders_ints() {
        let values = [i32::MIN, -7, -1, 0, 1, 42, i32::MAX];
        let keys: Vec<Vec<u8>> = values
            .iter()
            .map(|&n| {
                let mut k = Vec::new();
                Value::Int(n).encode_key(4, &mut k);
                k
            })
            .collect();
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_key_encoding_orders_floats() {
        let values = [f64::NEG_INFINITY, -10.5, -0.0, 0.0, 0.25, 99.0];
        let keys: Vec<Vec<u8>> = values
            .iter()
            .map(|&n| {
                let mut k = Vec::new();
                Value::Float(n).encode_key(8, &mut k);
                k
            })
            .collect();
        for pair in keys.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_key_encoding_pads_strings() {
        let mut a = Vec::new();
        Value::Str("ab".into()).encode_key(4, &mut a);
        let mut b = Vec::new();
        Value::Str("b".into()).encode_key(4, &mut b);
        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 4);
        assert!(a < b);
    }
}
