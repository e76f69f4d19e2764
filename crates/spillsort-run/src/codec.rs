//! Record codecs: how one record becomes bytes in a run file and back.
//!
//! Run files carry no framing of their own, so every codec must be
//! self-delimiting. `decode` distinguishes a clean end of stream (at a record
//! boundary) from a record cut short, which is always a decode error.

use std::io::{self, BufRead, Write};

use spillsort_core::schema::{DataType, Schema};
use spillsort_core::types::{Record, Scalar};

use crate::error::{Result, RunError};

/// Upper bound for a single length-prefixed value. Anything larger in a run
/// file is treated as corruption rather than allocated.
pub const MAX_VALUE_LEN: usize = 256 * 1024 * 1024;

pub trait RecordCodec: Send + Sync {
    type Record;

    /// Schema every encoded/decoded record conforms to.
    fn schema(&self) -> &Schema;

    /// Reject a record this codec cannot encode, before it is buffered or
    /// compared. Failures are `RunError::Encode`.
    fn validate(&self, _record: &Self::Record) -> Result<()> {
        Ok(())
    }

    fn encode(&self, record: &Self::Record, out: &mut dyn Write) -> Result<()>;

    /// `Ok(None)` only at a clean end of stream.
    fn decode(&self, input: &mut dyn BufRead) -> Result<Option<Self::Record>>;

    /// Bytes charged to the memory budget while the record sits in a batch.
    fn estimated_size(&self, _record: &Self::Record) -> usize {
        std::mem::size_of::<Self::Record>()
    }
}

/// Schema-driven binary layout.
///
/// Per value: one presence byte (`0` null, `1` value) then the payload in
/// little-endian. `Utf8`/`Binary` payloads are u32-length-prefixed.
#[derive(Debug, Clone)]
pub struct BinaryCodec {
    schema: Schema,
}

impl BinaryCodec {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl RecordCodec for BinaryCodec {
    type Record = Record;

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, record: &Record) -> Result<()> {
        conforms(record, &self.schema)
    }

    fn encode(&self, record: &Record, out: &mut dyn Write) -> Result<()> {
        conforms(record, &self.schema)?;

        let mut buf = Vec::with_capacity(record.len() * 9);
        for value in &record.values {
            match value {
                Scalar::Null => buf.push(0),
                Scalar::Bool(v) => buf.extend_from_slice(&[1, u8::from(*v)]),
                Scalar::I32(v) => {
                    buf.push(1);
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                Scalar::I64(v) => {
                    buf.push(1);
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                Scalar::F32(v) => {
                    buf.push(1);
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                Scalar::F64(v) => {
                    buf.push(1);
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                Scalar::Str(v) => {
                    buf.push(1);
                    put_len_prefixed(&mut buf, v.as_bytes())?;
                }
                Scalar::Bin(v) => {
                    buf.push(1);
                    put_len_prefixed(&mut buf, v)?;
                }
            }
        }
        out.write_all(&buf).map_err(RunError::io("encode"))
    }

    fn decode(&self, input: &mut dyn BufRead) -> Result<Option<Record>> {
        if at_end(input)? {
            return Ok(None);
        }
        let mut values = Vec::with_capacity(self.schema.len());
        for field in self.schema.fields() {
            let [presence] = read_array::<1>(input)?;
            let value = match presence {
                0 if field.nullable => Scalar::Null,
                0 => {
                    return Err(RunError::Decode(format!(
                        "null in non-nullable field '{}'",
                        field.name
                    )))
                }
                1 => match field.data_type {
                    DataType::Boolean => match read_array::<1>(input)? {
                        [0] => Scalar::Bool(false),
                        [1] => Scalar::Bool(true),
                        [b] => return Err(RunError::Decode(format!("bad boolean byte {b}"))),
                    },
                    DataType::Int32 => Scalar::I32(i32::from_le_bytes(read_array(input)?)),
                    DataType::Int64 => Scalar::I64(i64::from_le_bytes(read_array(input)?)),
                    DataType::Float32 => Scalar::F32(f32::from_le_bytes(read_array(input)?)),
                    DataType::Float64 => Scalar::F64(f64::from_le_bytes(read_array(input)?)),
                    DataType::Utf8 => {
                        let bytes = read_len_prefixed(input)?;
                        Scalar::Str(String::from_utf8(bytes).map_err(|e| {
                            RunError::Decode(format!("field '{}': {e}", field.name))
                        })?)
                    }
                    DataType::Binary => Scalar::Bin(read_len_prefixed(input)?),
                },
                tag => {
                    return Err(RunError::Decode(format!(
                        "bad presence tag {tag} for field '{}'",
                        field.name
                    )))
                }
            };
            values.push(value);
        }
        Ok(Some(Record::new(values)))
    }

    fn estimated_size(&self, record: &Record) -> usize {
        record.estimated_size()
    }
}

/// u32 length prefix followed by the record as a JSON array.
#[derive(Debug, Clone)]
pub struct JsonCodec {
    schema: Schema,
}

impl JsonCodec {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl RecordCodec for JsonCodec {
    type Record = Record;

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, record: &Record) -> Result<()> {
        conforms(record, &self.schema)
    }

    fn encode(&self, record: &Record, out: &mut dyn Write) -> Result<()> {
        conforms(record, &self.schema)?;
        let body =
            serde_json::to_vec(record).map_err(|e| RunError::Encode(format!("json: {e}")))?;
        let mut buf = Vec::with_capacity(body.len() + 4);
        put_len_prefixed(&mut buf, &body)?;
        out.write_all(&buf).map_err(RunError::io("encode"))
    }

    fn decode(&self, input: &mut dyn BufRead) -> Result<Option<Record>> {
        if at_end(input)? {
            return Ok(None);
        }
        let body = read_len_prefixed(input)?;
        let record: Record =
            serde_json::from_slice(&body).map_err(|e| RunError::Decode(format!("json: {e}")))?;
        record
            .conforms_to(&self.schema)
            .map_err(|e| RunError::Decode(e.to_string()))?;
        Ok(Some(record))
    }

    fn estimated_size(&self, record: &Record) -> usize {
        record.estimated_size()
    }
}

fn conforms(record: &Record, schema: &Schema) -> Result<()> {
    record
        .conforms_to(schema)
        .map_err(|e| RunError::Encode(e.to_string()))
}

fn at_end(input: &mut dyn BufRead) -> Result<bool> {
    loop {
        match input.fill_buf() {
            Ok(buf) => return Ok(buf.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RunError::Io { op: "decode", source: e }),
        }
    }
}

fn read_array<const N: usize>(input: &mut dyn BufRead) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    read_exact(input, &mut buf)?;
    Ok(buf)
}

fn read_exact(input: &mut dyn BufRead, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            RunError::Decode("record truncated mid-value".into())
        } else {
            RunError::Io { op: "decode", source: e }
        }
    })
}

fn read_len_prefixed(input: &mut dyn BufRead) -> Result<Vec<u8>> {
    let len = u32::from_le_bytes(read_array(input)?) as usize;
    if len > MAX_VALUE_LEN {
        return Err(RunError::Decode(format!(
            "value length {len} exceeds max {MAX_VALUE_LEN}"
        )));
    }
    let mut bytes = vec![0u8; len];
    read_exact(input, &mut bytes)?;
    Ok(bytes)
}

fn put_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    if bytes.len() > MAX_VALUE_LEN {
        return Err(RunError::Encode(format!(
            "value length {} exceeds max {MAX_VALUE_LEN}",
            bytes.len()
        )));
    }
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}
