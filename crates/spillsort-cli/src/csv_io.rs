//! CSV in and out.
//!
//! Columns are nullable `Utf8` unless `--schema` says otherwise. An empty
//! cell in a nullable column is a null; nulls are written back as empty cells.

use std::collections::HashMap;
use std::io::{Read, Write};

use csv::StringRecord;
use spillsort_core::schema::{DataType, Field, Schema};
use spillsort_core::types::{Record, Scalar};

use crate::error::CliError;

/// Parse `name:type[?],...`. A trailing `?` marks the column nullable.
pub fn parse_column_types(spec: &str) -> Result<HashMap<String, Field>, CliError> {
    let mut out = HashMap::new();
    for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, ty) = item
            .split_once(':')
            .ok_or_else(|| CliError::Usage(format!("schema entry '{item}' is not name:type")))?;
        let (ty, nullable) = match ty.strip_suffix('?') {
            Some(t) => (t, true),
            None => (ty, false),
        };
        let field = Field::new(name.trim(), DataType::parse(ty)?, nullable);
        if out.insert(field.name.clone(), field).is_some() {
            return Err(CliError::Usage(format!("column '{name}' typed twice")));
        }
    }
    Ok(out)
}

/// Build the schema from the CSV header, applying any `--schema` types.
pub fn schema_for(headers: &StringRecord, spec: Option<&str>) -> Result<Schema, CliError> {
    let mut typed = match spec {
        Some(s) => parse_column_types(s)?,
        None => HashMap::new(),
    };
    let fields: Vec<Field> = headers
        .iter()
        .map(|name| {
            typed
                .remove(name)
                .unwrap_or_else(|| Field::new(name, DataType::Utf8, true))
        })
        .collect();
    if let Some(name) = typed.keys().next() {
        return Err(CliError::Usage(format!(
            "--schema names column '{name}' which is not in the header"
        )));
    }
    Ok(Schema::new(fields)?)
}

pub fn parse_row(row: &StringRecord, schema: &Schema) -> spillsort_core::Result<Record> {
    let values = schema
        .fields()
        .iter()
        .zip(row.iter())
        .map(|(field, cell)| {
            if cell.is_empty() && field.nullable {
                Ok(Scalar::Null)
            } else {
                Scalar::parse(cell, field.data_type)
            }
        })
        .collect::<spillsort_core::Result<Vec<_>>>()?;
    Ok(Record::new(values))
}

/// Typed records paired with their 1-based line in the source.
pub fn rows<R: Read>(
    reader: csv::Reader<R>,
    schema: Schema,
) -> impl Iterator<Item = Result<(u64, Record), CliError>> {
    reader.into_records().map(move |row| {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let record = parse_row(&row, &schema).map_err(|source| CliError::Row { line, source })?;
        Ok((line, record))
    })
}

pub fn write_record<W: Write>(out: &mut csv::Writer<W>, record: &Record) -> Result<(), CliError> {
    out.write_record(record.values.iter().map(Scalar::render))?;
    Ok(())
}
