//! Command Execution
//!
//! Takes a parsed argument list, runs it against the storage engine, and
//! produces one response [`Value`]. Dispatch matches on the command name and
//! the exact argument count together; a known name with the wrong count is
//! the same "unknown command" error as an unknown name.
//!
//! Everything that can go wrong at this layer is a protocol-level error
//! value, never a Rust error: the connection stays healthy after a bad
//! argument or a type mismatch. Only framing violations (handled a layer
//! below) cost the client its connection.

use bytes::Bytes;
use tracing::trace;

use crate::protocol::types::{code, Value};
use crate::storage::{StorageEngine, TypeError};

/// Executes one command. `now_ms` is the caller's monotonic timestamp,
/// consulted by the TTL commands.
pub fn dispatch(engine: &mut StorageEngine, now_ms: u64, args: &[Bytes]) -> Value {
    let Some((name, rest)) = args.split_first() else {
        return Value::err(code::UNKNOWN, "unknown command.");
    };
    trace!(command = %String::from_utf8_lossy(name), argc = args.len(), "dispatch");
    match (&name[..], rest.len()) {
        (b"get", 1) => get(engine, &rest[0]),
        (b"set", 2) => set(engine, &rest[0], rest[1].clone()),
        (b"del", 1) => del(engine, &rest[0]),
        (b"pexpire", 2) => pexpire(engine, now_ms, &rest[0], &rest[1]),
        (b"pttl", 1) => pttl(engine, now_ms, &rest[0]),
        (b"keys", 0) => keys(engine),
        (b"zadd", 3) => zadd(engine, &rest[0], &rest[1], &rest[2]),
        (b"zrem", 2) => zrem(engine, &rest[0], &rest[1]),
        (b"zscore", 2) => zscore(engine, &rest[0], &rest[1]),
        (b"zquery", 5) => zquery(engine, &rest[0], &rest[1], &rest[2], &rest[3], &rest[4]),
        _ => Value::err(code::UNKNOWN, "unknown command."),
    }
}

fn type_error(err: TypeError) -> Value {
    Value::err(code::BAD_TYPE, err.to_string())
}

/// Strict i64 parse: the whole argument must be the number.
fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

/// Strict f64 parse; NaN is rejected because it has no place in a total
/// ordering.
fn parse_float(arg: &[u8]) -> Option<f64> {
    let v: f64 = std::str::from_utf8(arg).ok()?.parse().ok()?;
    (!v.is_nan()).then_some(v)
}

fn get(engine: &mut StorageEngine, key: &[u8]) -> Value {
    match engine.get(key) {
        Ok(Some(val)) => Value::Str(val),
        Ok(None) => Value::Nil,
        Err(err) => type_error(err),
    }
}

fn set(engine: &mut StorageEngine, key: &[u8], value: Bytes) -> Value {
    match engine.set(key, value) {
        Ok(()) => Value::Nil,
        Err(err) => type_error(err),
    }
}

fn del(engine: &mut StorageEngine, key: &[u8]) -> Value {
    Value::Int(engine.remove(key) as i64)
}

fn pexpire(engine: &mut StorageEngine, now_ms: u64, key: &[u8], ttl: &[u8]) -> Value {
    let Some(ttl_ms) = parse_int(ttl) else {
        return Value::err(code::BAD_ARG, "expect int64");
    };
    Value::Int(engine.set_ttl(key, ttl_ms, now_ms) as i64)
}

fn pttl(engine: &mut StorageEngine, now_ms: u64, key: &[u8]) -> Value {
    Value::Int(engine.ttl_remaining(key, now_ms))
}

fn keys(engine: &mut StorageEngine) -> Value {
    let mut items = Vec::with_capacity(engine.len());
    engine.for_each_key(|key| items.push(Value::Str(key.clone())));
    Value::Arr(items)
}

fn zadd(engine: &mut StorageEngine, key: &[u8], score: &[u8], name: &[u8]) -> Value {
    let Some(score) = parse_float(score) else {
        return Value::err(code::BAD_ARG, "expect float");
    };
    match engine.zadd(key, name, score) {
        Ok(added) => Value::Int(added as i64),
        Err(err) => type_error(err),
    }
}

fn zrem(engine: &mut StorageEngine, key: &[u8], name: &[u8]) -> Value {
    match engine.zrem(key, name) {
        Ok(removed) => Value::Int(removed as i64),
        Err(err) => type_error(err),
    }
}

fn zscore(engine: &mut StorageEngine, key: &[u8], name: &[u8]) -> Value {
    match engine.zscore(key, name) {
        Ok(Some(score)) => Value::Dbl(score),
        Ok(None) => Value::Nil,
        Err(err) => type_error(err),
    }
}

fn zquery(
    engine: &mut StorageEngine,
    key: &[u8],
    score: &[u8],
    name: &[u8],
    offset: &[u8],
    limit: &[u8],
) -> Value {
    let Some(score) = parse_float(score) else {
        return Value::err(code::BAD_ARG, "expect fp number");
    };
    let (Some(offset), Some(limit)) = (parse_int(offset), parse_int(limit)) else {
        return Value::err(code::BAD_ARG, "expect int");
    };
    match engine.zquery(key, score, name, offset, limit) {
        Ok(pairs) => {
            let mut items = Vec::with_capacity(pairs.len() * 2);
            for (member, member_score) in pairs {
                items.push(Value::Str(member));
                items.push(Value::Dbl(member_score));
            }
            Value::Arr(items)
        }
        Err(err) => type_error(err),
    }
}
