/*
Serial Type Codes Of The Record Format
Serial Type	Content Size	Meaning
0	0	Value is a NULL.
1	1	Value is an 8-bit twos-complement integer.
2	2	Value is a big-endian 16-bit twos-complement integer.
3	3	Value is a big-endian 24-bit twos-complement integer.
4	4	Value is a big-endian 32-bit twos-complement integer.
5	6	Value is a big-endian 48-bit twos-complement integer.
6	8	Value is a big-endian 64-bit twos-complement integer.
7	8	Value is a big-endian IEEE 754-2008 64-bit floating point number.
8	0	Value is the integer 0.
9	0	Value is the integer 1.
10,11	variable	Reserved for internal use; never appears in a well-formed file.
N≥12 and even	(N-12)/2	Value is a BLOB that is (N-12)/2 bytes in length.
N≥13 and odd	(N-13)/2	Value is a TEXT string (N-13)/2 bytes in length.
*/
use thiserror::Error;

use crate::varint::read_uint_be;

#[derive(Debug, Error)]
pub enum SerialDataError {
    #[error("serial type {0} is reserved and never appears in a well-formed database")]
    UnknownSerialType(i64),
    #[error("record body ran out of bytes decoding a value")]
    OutOfBounds,
    #[error("TEXT value was not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialType {
    Null,
    I8,
    I16,
    I24,
    I32,
    I48,
    I64,
    F64,
    Zero,
    One,
    Blob(usize),
    Text(usize),
}

impl SerialType {
    pub fn from_code(code: i64) -> Result<Self, SerialDataError> {
        let serial_type = match code {
            0 => SerialType::Null,
            1 => SerialType::I8,
            2 => SerialType::I16,
            3 => SerialType::I24,
            4 => SerialType::I32,
            5 => SerialType::I48,
            6 => SerialType::I64,
            7 => SerialType::F64,
            8 => SerialType::Zero,
            9 => SerialType::One,
            10 | 11 => return Err(SerialDataError::UnknownSerialType(code)),
            n if n >= 12 && n % 2 == 0 => SerialType::Blob(((n - 12) / 2) as usize),
            n if n >= 13 && n % 2 == 1 => SerialType::Text(((n - 13) / 2) as usize),
            n => return Err(SerialDataError::UnknownSerialType(n)),
        };
        Ok(serial_type)
    }

    pub fn body_len(&self) -> usize {
        match self {
            SerialType::Null | SerialType::Zero | SerialType::One => 0,
            SerialType::I8 => 1,
            SerialType::I16 => 2,
            SerialType::I24 => 3,
            SerialType::I32 => 4,
            SerialType::I48 => 6,
            SerialType::I64 | SerialType::F64 => 8,
            SerialType::Blob(n) | SerialType::Text(n) => *n,
        }
    }

    /// Decodes this serial type's value from `body`, returning the value and
    /// the number of bytes consumed (equal to `body_len()`).
    pub fn decode(&self, body: &[u8]) -> Result<(SerialData, usize), SerialDataError> {
        let len = self.body_len();
        if body.len() < len {
            return Err(SerialDataError::OutOfBounds);
        }

        let value = match self {
            SerialType::Null => SerialData::Null,
            SerialType::Zero => SerialData::Integer(0),
            SerialType::One => SerialData::Integer(1),
            SerialType::I8 => SerialData::Integer(body[0] as i8 as i64),
            SerialType::I16 => SerialData::Integer(sign_extend(read_uint_be(body, 0, 2), 16)),
            SerialType::I24 => SerialData::Integer(sign_extend(read_uint_be(body, 0, 3), 24)),
            SerialType::I32 => SerialData::Integer(sign_extend(read_uint_be(body, 0, 4), 32)),
            SerialType::I48 => SerialData::Integer(sign_extend(read_uint_be(body, 0, 6), 48)),
            SerialType::I64 => SerialData::Integer(read_uint_be(body, 0, 8) as i64),
            SerialType::F64 => SerialData::Real(f64::from_be_bytes(
                body[..8].try_into().expect("length checked above"),
            )),
            SerialType::Blob(n) => SerialData::Blob(body[..*n].to_vec()),
            SerialType::Text(n) => {
                SerialData::Text(std::str::from_utf8(&body[..*n])?.to_string())
            }
        };

        Ok((value, len))
    }
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Orders two decoded values the way a WHERE predicate's comparator would:
/// numeric classes compare across Integer/Real, TEXT and BLOB compare
/// byte-exact within their own class, and NULL only equals NULL. Returns
/// `None` when the two values have no natural ordering relative to each
/// other (e.g. a BLOB against a TEXT), so `<`/`>`/`<=`/`>=` never falsely
/// match and `=`/`!=` fall back to exact equality.
pub fn compare_values(a: &SerialData, b: &SerialData) -> Option<std::cmp::Ordering> {
    use std::cmp::Ordering;
    use SerialData::*;

    match (a, b) {
        (Null, Null) => Some(Ordering::Equal),
        (Integer(x), Integer(y)) => Some(x.cmp(y)),
        (Real(x), Real(y)) => x.partial_cmp(y),
        (Integer(x), Real(y)) => (*x as f64).partial_cmp(y),
        (Real(x), Integer(y)) => x.partial_cmp(&(*y as f64)),
        (Text(x), Text(y)) => Some(x.cmp(y)),
        (Blob(x), Blob(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SerialData {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SerialData {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SerialData::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SerialData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SerialData::Null)
    }
}

impl std::fmt::Display for SerialData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerialData::Null => write!(f, ""),
            SerialData::Integer(n) => write!(f, "{n}"),
            SerialData::Real(n) => write!(f, "{n}"),
            SerialData::Text(s) => write!(f, "{s}"),
            SerialData::Blob(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_positive_and_negative_ints() {
        assert_eq!(
            SerialType::I8.decode(&[0xFF]).unwrap().0,
            SerialData::Integer(-1)
        );
        assert_eq!(
            SerialType::I16.decode(&[0x01, 0x00]).unwrap().0,
            SerialData::Integer(256)
        );
    }

    #[test]
    fn zero_and_one_consume_no_bytes() {
        assert_eq!(SerialType::Zero.decode(&[]).unwrap(), (SerialData::Integer(0), 0));
        assert_eq!(SerialType::One.decode(&[]).unwrap(), (SerialData::Integer(1), 0));
    }

    #[test]
    fn float_roundtrip() {
        let bytes = 3.5f64.to_be_bytes();
        assert_eq!(
            SerialType::F64.decode(&bytes).unwrap().0,
            SerialData::Real(3.5)
        );
    }

    #[test]
    fn text_and_blob_lengths() {
        assert_eq!(SerialType::from_code(13).unwrap(), SerialType::Text(0));
        assert_eq!(SerialType::from_code(23).unwrap(), SerialType::Text(5));
        assert_eq!(SerialType::from_code(12).unwrap(), SerialType::Blob(0));
        assert_eq!(SerialType::from_code(22).unwrap(), SerialType::Blob(5));
    }

    #[test]
    fn reserved_types_error() {
        assert!(SerialType::from_code(10).is_err());
        assert!(SerialType::from_code(11).is_err());
    }

    #[test]
    fn text_decodes_utf8() {
        let st = SerialType::Text(5);
        let (value, consumed) = st.decode(b"hello").unwrap();
        assert_eq!(value, SerialData::Text("hello".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn invalid_utf8_errors() {
        let st = SerialType::Text(1);
        assert!(st.decode(&[0xFF]).is_err());
    }

    #[test]
    fn compare_values_orders_numerics_across_int_and_real() {
        assert_eq!(
            compare_values(&SerialData::Integer(2), &SerialData::Real(2.0)),
            Some(std::cmp::Ordering::Equal)
        );
        assert_eq!(
            compare_values(&SerialData::Integer(1), &SerialData::Real(2.5)),
            Some(std::cmp::Ordering::Less)
        );
    }

    #[test]
    fn compare_values_mismatched_classes_have_no_order() {
        assert_eq!(
            compare_values(&SerialData::Text("5".to_string()), &SerialData::Integer(5)),
            None
        );
    }
}
