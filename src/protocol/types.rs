//! Response Values
//!
//! Every response body is one serialized [`Value`]: a tag byte followed by a
//! tag-specific payload, all integers little-endian.
//!
//! ```text
//! ┌─────┬───────────────────────────────────────────────┐
//! │ tag │ payload                                       │
//! ├─────┼───────────────────────────────────────────────┤
//! │  0  │ nil: nothing                                  │
//! │  1  │ err: u32 code, u32 len, message bytes         │
//! │  2  │ str: u32 len, bytes                           │
//! │  3  │ int: i64                                      │
//! │  4  │ dbl: f64                                      │
//! │  5  │ arr: u32 count, then that many nested values  │
//! └─────┴───────────────────────────────────────────────┘
//! ```
//!
//! Arrays nest arbitrarily, though the commands today only ever produce flat
//! ones (`keys` and `zquery`).

use bytes::{BufMut, Bytes, BytesMut};

use super::parser::ParseError;

/// Value tags on the wire.
pub mod tag {
    pub const NIL: u8 = 0;
    pub const ERR: u8 = 1;
    pub const STR: u8 = 2;
    pub const INT: u8 = 3;
    pub const DBL: u8 = 4;
    pub const ARR: u8 = 5;
}

/// Error codes carried in [`Value::Err`].
pub mod code {
    /// Command not recognized (or wrong argument count).
    pub const UNKNOWN: u32 = 1;
    /// Response exceeded the maximum message size.
    pub const TOO_BIG: u32 = 2;
    /// Command applied to a value of the wrong kind.
    pub const BAD_TYPE: u32 = 3;
    /// Argument failed to parse.
    pub const BAD_ARG: u32 = 4;
}

/// A single response value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    /// An error code plus a human-readable message.
    Err(u32, String),
    Str(Bytes),
    Int(i64),
    Dbl(f64),
    Arr(Vec<Value>),
}

impl Value {
    /// Shorthand for an error value.
    pub fn err(code: u32, msg: impl Into<String>) -> Self {
        Value::Err(code, msg.into())
    }

    /// Appends this value's wire encoding to `out`.
    pub fn serialize_into(&self, out: &mut BytesMut) {
        match self {
            Value::Nil => out.put_u8(tag::NIL),
            Value::Err(code, msg) => {
                out.put_u8(tag::ERR);
                out.put_u32_le(*code);
                out.put_u32_le(msg.len() as u32);
                out.put_slice(msg.as_bytes());
            }
            Value::Str(data) => {
                out.put_u8(tag::STR);
                out.put_u32_le(data.len() as u32);
                out.put_slice(data);
            }
            Value::Int(v) => {
                out.put_u8(tag::INT);
                out.put_i64_le(*v);
            }
            Value::Dbl(v) => {
                out.put_u8(tag::DBL);
                out.put_f64_le(*v);
            }
            Value::Arr(items) => {
                out.put_u8(tag::ARR);
                out.put_u32_le(items.len() as u32);
                for item in items {
                    item.serialize_into(out);
                }
            }
        }
    }

    /// Decodes one value from the front of `data`, returning it along with
    /// the number of bytes consumed. Used by tests and client tooling; the
    /// server only ever serializes.
    pub fn parse(data: &[u8]) -> Result<(Value, usize), ParseError> {
        let (&tag, rest) = data.split_first().ok_or(ParseError::Truncated)?;
        match tag {
            tag::NIL => Ok((Value::Nil, 1)),
            tag::ERR => {
                let code = read_u32(rest, 0)?;
                let len = read_u32(rest, 4)? as usize;
                let msg = rest.get(8..8 + len).ok_or(ParseError::Truncated)?;
                let msg = String::from_utf8_lossy(msg).into_owned();
                Ok((Value::Err(code, msg), 1 + 8 + len))
            }
            tag::STR => {
                let len = read_u32(rest, 0)? as usize;
                let data = rest.get(4..4 + len).ok_or(ParseError::Truncated)?;
                Ok((Value::Str(Bytes::copy_from_slice(data)), 1 + 4 + len))
            }
            tag::INT => {
                let raw = rest.get(..8).ok_or(ParseError::Truncated)?;
                let v = i64::from_le_bytes([
                    raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
                ]);
                Ok((Value::Int(v), 9))
            }
            tag::DBL => {
                let raw = rest.get(..8).ok_or(ParseError::Truncated)?;
                let v = f64::from_le_bytes([
                    raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
                ]);
                Ok((Value::Dbl(v), 9))
            }
            tag::ARR => {
                let count = read_u32(rest, 0)?;
                let mut consumed = 1 + 4;
                let mut items = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    let (item, n) =
                        Value::parse(data.get(consumed..).ok_or(ParseError::Truncated)?)?;
                    items.push(item);
                    consumed += n;
                }
                Ok((Value::Arr(items), consumed))
            }
            other => Err(ParseError::BadTag(other)),
        }
    }
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32, ParseError> {
    let raw = data.get(pos..pos + 4).ok_or(ParseError::Truncated)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &Value) -> Value {
        let mut buf = BytesMut::new();
        value.serialize_into(&mut buf);
        let (parsed, consumed) = Value::parse(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        parsed
    }

    #[test]
    fn test_nil_serialization() {
        let mut buf = BytesMut::new();
        Value::Nil.serialize_into(&mut buf);
        assert_eq!(&buf[..], &[tag::NIL]);
    }

    #[test]
    fn test_int_serialization() {
        let mut buf = BytesMut::new();
        Value::Int(-7).serialize_into(&mut buf);
        assert_eq!(buf[0], tag::INT);
        assert_eq!(&buf[1..], &(-7i64).to_le_bytes());
    }

    #[test]
    fn test_err_serialization() {
        let mut buf = BytesMut::new();
        Value::err(code::UNKNOWN, "unknown command.").serialize_into(&mut buf);
        assert_eq!(buf[0], tag::ERR);
        assert_eq!(&buf[1..5], &1u32.to_le_bytes());
        assert_eq!(&buf[5..9], &16u32.to_le_bytes());
        assert_eq!(&buf[9..], b"unknown command.");
    }

    #[test]
    fn test_roundtrip_all_variants() {
        let values = [
            Value::Nil,
            Value::err(code::BAD_ARG, "expect int64"),
            Value::Str(Bytes::from("hello")),
            Value::Int(i64::MIN),
            Value::Dbl(3.5),
            Value::Arr(vec![
                Value::Str(Bytes::from("alice")),
                Value::Dbl(1.25),
                Value::Arr(vec![Value::Nil]),
            ]),
        ];
        for value in &values {
            assert_eq!(&roundtrip(value), value);
        }
    }

    #[test]
    fn test_parse_rejects_bad_tag() {
        assert_eq!(Value::parse(&[9]), Err(ParseError::BadTag(9)));
    }

    #[test]
    fn test_parse_rejects_truncation() {
        let mut buf = BytesMut::new();
        Value::Str(Bytes::from("hello")).serialize_into(&mut buf);
        for n in 0..buf.len() {
            assert_eq!(Value::parse(&buf[..n]), Err(ParseError::Truncated));
        }
    }
}
