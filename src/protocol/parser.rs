//! Wire Framing and Request Parsing
//!
//! Both directions of the protocol are framed the same way: a little-endian
//! u32 byte length, then that many body bytes.
//!
//! ```text
//! request:   ┌────────┬───────┬─────────────────────────────┐
//!            │ u32 len│ u32 n │ n × (u32 len, bytes) args   │
//!            └────────┴───────┴─────────────────────────────┘
//! response:  ┌────────┬─────────────────────────────────────┐
//!            │ u32 len│ one tagged Value                    │
//!            └────────┴─────────────────────────────────────┘
//! ```
//!
//! A request body is a count-prefixed list of length-prefixed byte strings;
//! the first is the command name, the rest its arguments. The body must be
//! consumed exactly: trailing bytes are a protocol error, and the connection
//! that sent them is closed.
//!
//! [`write_frame`] handles the response side, including the substitution of
//! an oversized response with a small [`code::TOO_BIG`] error so the frame
//! always fits the message limit.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::types::{code, Value};

/// Maximum frame body size, both directions: 32 MiB.
pub const MAX_MSG_SIZE: usize = 32 << 20;

/// Maximum argument count in one request.
pub const MAX_ARGS: usize = 200_000;

/// Why a request body failed to parse. Any of these closes the connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("message is truncated")]
    Truncated,
    #[error("too many arguments: {0}")]
    TooManyArgs(u32),
    #[error("trailing bytes after request body")]
    TrailingBytes,
    #[error("unknown value tag: {0}")]
    BadTag(u8),
}

/// Parses a complete request body into its argument list.
pub fn parse_request(body: &[u8]) -> Result<Vec<Bytes>, ParseError> {
    let count = read_u32(body, 0).ok_or(ParseError::Truncated)?;
    if count as usize > MAX_ARGS {
        return Err(ParseError::TooManyArgs(count));
    }
    let mut args = Vec::new();
    let mut pos = 4;
    for _ in 0..count {
        let len = read_u32(body, pos).ok_or(ParseError::Truncated)? as usize;
        pos += 4;
        let arg = body.get(pos..pos + len).ok_or(ParseError::Truncated)?;
        args.push(Bytes::copy_from_slice(arg));
        pos += len;
    }
    if pos != body.len() {
        return Err(ParseError::TrailingBytes);
    }
    Ok(args)
}

/// Appends one framed response to `out`: length prefix, then the serialized
/// value. The prefix is reserved first and patched afterwards, because the
/// body length is only known once serialization is done. A body over
/// [`MAX_MSG_SIZE`] is thrown away and replaced with a bounded error value.
pub fn write_frame(out: &mut BytesMut, value: &Value) {
    let header = out.len();
    out.put_u32_le(0); // patched below
    value.serialize_into(out);
    let mut body_len = out.len() - header - 4;
    if body_len > MAX_MSG_SIZE {
        out.truncate(header + 4);
        Value::err(code::TOO_BIG, "response is too big.").serialize_into(out);
        body_len = out.len() - header - 4;
    }
    out[header..header + 4].copy_from_slice(&(body_len as u32).to_le_bytes());
}

/// Appends one framed request to `out`. The server never sends requests;
/// this is for tests, benchmarks and client tooling.
pub fn write_request(out: &mut BytesMut, args: &[&[u8]]) {
    let body_len = 4 + args
        .iter()
        .map(|arg| 4 + arg.len())
        .sum::<usize>();
    out.put_u32_le(body_len as u32);
    out.put_u32_le(args.len() as u32);
    for arg in args {
        out.put_u32_le(arg.len() as u32);
        out.put_slice(arg);
    }
}

fn read_u32(data: &[u8], pos: usize) -> Option<u32> {
    let raw = data.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_request() {
        let mut buf = BytesMut::new();
        write_request(&mut buf, &[b"set", b"key", b"value"]);
        // strip the frame header before parsing the body
        let args = parse_request(&buf[4..]).unwrap();
        assert_eq!(args, vec![Bytes::from("set"), Bytes::from("key"), Bytes::from("value")]);
    }

    #[test]
    fn test_parse_empty_argument() {
        let mut buf = BytesMut::new();
        write_request(&mut buf, &[b"get", b""]);
        let args = parse_request(&buf[4..]).unwrap();
        assert_eq!(args[1], Bytes::new());
    }

    #[test]
    fn test_parse_rejects_truncated_body() {
        let mut buf = BytesMut::new();
        write_request(&mut buf, &[b"get", b"key"]);
        let body = &buf[4..];
        for n in 0..body.len() {
            assert_eq!(parse_request(&body[..n]), Err(ParseError::Truncated));
        }
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        let mut buf = BytesMut::new();
        write_request(&mut buf, &[b"get", b"key"]);
        let mut body = buf[4..].to_vec();
        body.push(0);
        assert_eq!(parse_request(&body), Err(ParseError::TrailingBytes));
    }

    #[test]
    fn test_parse_rejects_too_many_args() {
        let count = (MAX_ARGS + 1) as u32;
        let body = count.to_le_bytes();
        assert_eq!(parse_request(&body), Err(ParseError::TooManyArgs(count)));
    }

    #[test]
    fn test_write_frame_prefixes_body_length() {
        let mut out = BytesMut::new();
        write_frame(&mut out, &Value::Int(42));
        let body_len = u32::from_le_bytes([out[0], out[1], out[2], out[3]]) as usize;
        assert_eq!(body_len, out.len() - 4);
        let (value, _) = Value::parse(&out[4..]).unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn test_write_frame_appends_without_clobbering() {
        let mut out = BytesMut::new();
        write_frame(&mut out, &Value::Int(1));
        let first = out.len();
        write_frame(&mut out, &Value::Int(2));
        let (value, _) = Value::parse(&out[4..first]).unwrap();
        assert_eq!(value, Value::Int(1));
        let (value, _) = Value::parse(&out[first + 4..]).unwrap();
        assert_eq!(value, Value::Int(2));
    }

    #[test]
    fn test_oversized_response_is_substituted() {
        let huge = Value::Str(Bytes::from(vec![0u8; MAX_MSG_SIZE + 1]));
        let mut out = BytesMut::new();
        write_frame(&mut out, &huge);
        let body_len = u32::from_le_bytes([out[0], out[1], out[2], out[3]]) as usize;
        assert!(body_len <= MAX_MSG_SIZE);
        let (value, _) = Value::parse(&out[4..]).unwrap();
        assert_eq!(value, Value::err(code::TOO_BIG, "response is too big."));
    }
}
