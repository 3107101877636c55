use std::collections::BTreeMap;
use std::io::{self, Write};

/// A bencode value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Keys are emitted in sorted order, as bencode requires.
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

/// Encode a value into a fresh buffer.
///
/// - Integers: `i<number>e`
/// - Byte strings: `<length>:<data>`
/// - Lists: `l<items>e`
/// - Dictionaries: `d<key><value>...e`
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    // writes into a Vec cannot fail
    let _ = encode_to(value, &mut buf);
    buf
}

pub fn encode_to<W: Write>(value: &Value, writer: &mut W) -> io::Result<()> {
    match value {
        Value::Integer(i) => write!(writer, "i{}e", i)?,
        Value::Bytes(b) => {
            write!(writer, "{}:", b.len())?;
            writer.write_all(b)?;
        }
        Value::List(l) => {
            writer.write_all(b"l")?;
            for item in l {
                encode_to(item, writer)?;
            }
            writer.write_all(b"e")?;
        }
        Value::Dict(d) => {
            writer.write_all(b"d")?;
            for (key, val) in d {
                write!(writer, "{}:", key.len())?;
                writer.write_all(key)?;
                encode_to(val, writer)?;
            }
            writer.write_all(b"e")?;
        }
    }
    Ok(())
}
