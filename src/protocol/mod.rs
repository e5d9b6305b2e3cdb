//! Wire Protocol
//!
//! A binary length-prefixed protocol, little-endian throughout. Clients send
//! framed requests (an argument list); the server answers each with exactly
//! one framed tagged value, in order.
//!
//! ## Modules
//!
//! - `types`: the [`Value`] enum, its tags and error codes, serialization
//! - `parser`: request parsing, response framing, size limits
//!
//! ## Example
//!
//! ```
//! use rapidkv::protocol::{parse_request, write_frame, Value};
//! use bytes::BytesMut;
//!
//! // what a client's "get name" body looks like
//! let body = [
//!     &2u32.to_le_bytes()[..],
//!     &3u32.to_le_bytes(), b"get",
//!     &4u32.to_le_bytes(), b"name",
//! ].concat();
//! let args = parse_request(&body).unwrap();
//! assert_eq!(&args[0][..], b"get");
//!
//! // and a framed response
//! let mut out = BytesMut::new();
//! write_frame(&mut out, &Value::Nil);
//! assert_eq!(&out[..], &[1, 0, 0, 0, 0]);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, write_frame, write_request, ParseError, MAX_ARGS, MAX_MSG_SIZE};
pub use types::{code, tag, Value};
