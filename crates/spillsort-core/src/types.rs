//! Record values.
//!
//! A `Record` is one row (a "feature") laid out in schema order. The sort
//! never looks inside it; only comparators and codecs do.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, FieldId, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    /// `None` for `Null`, which carries no type of its own.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Parse a textual cell into a scalar of the given type.
    pub fn parse(text: &str, data_type: DataType) -> Result<Self> {
        let bad = |e: &dyn std::fmt::Display| {
            Error::Record(format!("cannot parse '{text}' as {data_type}: {e}"))
        };
        Ok(match data_type {
            DataType::Boolean => Scalar::Bool(text.trim().parse().map_err(|e| bad(&e))?),
            DataType::Int32 => Scalar::I32(text.trim().parse().map_err(|e| bad(&e))?),
            DataType::Int64 => Scalar::I64(text.trim().parse().map_err(|e| bad(&e))?),
            DataType::Float32 => Scalar::F32(text.trim().parse().map_err(|e| bad(&e))?),
            DataType::Float64 => Scalar::F64(text.trim().parse().map_err(|e| bad(&e))?),
            DataType::Utf8 => Scalar::Str(text.to_string()),
            DataType::Binary => Scalar::Bin(text.as_bytes().to_vec()),
        })
    }

    /// Render the scalar back to text. `Null` renders as the empty string.
    pub fn render(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(v) => v.to_string(),
            Scalar::I32(v) => v.to_string(),
            Scalar::I64(v) => v.to_string(),
            Scalar::F32(v) => v.to_string(),
            Scalar::F64(v) => v.to_string(),
            Scalar::Str(v) => v.clone(),
            Scalar::Bin(v) => String::from_utf8_lossy(v).into_owned(),
        }
    }

    fn heap_bytes(&self) -> usize {
        match self {
            Scalar::Str(s) => s.capacity(),
            Scalar::Bin(b) => b.capacity(),
            _ => 0,
        }
    }
}

/// One row of typed values in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub values: Vec<Scalar>,
}

impl Record {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `None` when the record is shorter than the field's position.
    pub fn get(&self, id: FieldId) -> Option<&Scalar> {
        self.values.get(id.index())
    }

    /// Approximate in-memory footprint, used for budget accounting.
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Record>()
            + self.values.capacity() * std::mem::size_of::<Scalar>()
            + self.values.iter().map(Scalar::heap_bytes).sum::<usize>()
    }

    /// Check arity, value types and nullability against `schema`.
    pub fn conforms_to(&self, schema: &Schema) -> Result<()> {
        if self.values.len() != schema.len() {
            return Err(Error::Record(format!(
                "expected {} values, found {}",
                schema.len(),
                self.values.len()
            )));
        }
        for (value, field) in self.values.iter().zip(schema.fields()) {
            match value.data_type() {
                None if !field.nullable => {
                    return Err(Error::Record(format!(
                        "null in non-nullable field '{}'",
                        field.name
                    )));
                }
                Some(dt) if dt != field.data_type => {
                    return Err(Error::Record(format!(
                        "field '{}' expects {}, found {}",
                        field.name, field.data_type, dt
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl From<Vec<Scalar>> for Record {
    fn from(values: Vec<Scalar>) -> Self {
        Record::new(values)
    }
}
