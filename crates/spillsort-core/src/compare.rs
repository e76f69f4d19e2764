//! Record ordering: the caller-supplied comparator seam, plus a key-based
//! comparator for `Record`s.
//!
//! Every comparator used by the sort must be a consistent total order. The
//! run invariant (records non-decreasing within a run) is only ever
//! established by the comparator and never re-checked when runs are read.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{FieldId, Schema};
use crate::types::{Record, Scalar};

/// Pure ordering function over two records of the same schema.
pub trait Comparator<R>: Send + Sync {
    fn compare(&self, a: &R, b: &R) -> Ordering;
}

impl<R, F> Comparator<R> for F
where
    F: Fn(&R, &R) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &R, b: &R) -> Ordering {
        self(a, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Where nulls land, independent of `Direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullOrder {
    #[default]
    First,
    Last,
}

/// One "sort by" term, by field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nulls: NullOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
            nulls: NullOrder::First,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
            nulls: NullOrder::First,
        }
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullOrder::Last;
        self
    }
}

impl FromStr for SortKey {
    type Err = Error;

    /// Accepts `name`, `+name`, `-name`, `name:desc`, `name:asc:nulls_last`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (s, mut direction) = match s.strip_prefix('-') {
            Some(rest) => (rest, Direction::Desc),
            None => (s.strip_prefix('+').unwrap_or(s), Direction::Asc),
        };
        let mut parts = s.split(':');
        let field = parts.next().unwrap_or_default().trim();
        if field.is_empty() {
            return Err(Error::Key(format!("empty field name in sort key '{s}'")));
        }
        let mut nulls = NullOrder::First;
        for part in parts {
            match part.trim().to_ascii_lowercase().as_str() {
                "asc" => direction = Direction::Asc,
                "desc" => direction = Direction::Desc,
                "nulls_first" => nulls = NullOrder::First,
                "nulls_last" => nulls = NullOrder::Last,
                other => {
                    return Err(Error::Key(format!(
                        "unknown sort key modifier '{other}' in '{s}'"
                    )))
                }
            }
        }
        Ok(Self {
            field: field.to_string(),
            direction,
            nulls,
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        let nulls = match self.nulls {
            NullOrder::First => "nulls_first",
            NullOrder::Last => "nulls_last",
        };
        write!(f, "{}:{}:{}", self.field, dir, nulls)
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedKey {
    field: FieldId,
    direction: Direction,
    nulls: NullOrder,
}

/// Lexicographic comparator over a list of sort keys, resolved against a
/// schema once.
#[derive(Debug, Clone)]
pub struct KeyComparator {
    keys: Vec<ResolvedKey>,
}

impl KeyComparator {
    /// Fails if any key names a field the schema does not have.
    pub fn new(schema: &Schema, keys: &[SortKey]) -> Result<Self> {
        let keys = keys
            .iter()
            .map(|key| {
                let field = schema.field_id(&key.field).ok_or_else(|| {
                    Error::Key(format!("sort key '{}' not found in schema", key.field))
                })?;
                Ok(ResolvedKey {
                    field,
                    direction: key.direction,
                    nulls: key.nulls,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// Ascending over every field in schema order.
    pub fn natural(schema: &Schema) -> Self {
        let keys = schema
            .field_ids()
            .map(|field| ResolvedKey {
                field,
                direction: Direction::Asc,
                nulls: NullOrder::First,
            })
            .collect();
        Self { keys }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

/// Stand-in for a field a short record does not carry; orders like a null.
static MISSING: Scalar = Scalar::Null;

impl Comparator<Record> for KeyComparator {
    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let (x, y) = (
                a.get(key.field).unwrap_or(&MISSING),
                b.get(key.field).unwrap_or(&MISSING),
            );
            let ord = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => match key.nulls {
                    NullOrder::First => Ordering::Less,
                    NullOrder::Last => Ordering::Greater,
                },
                (false, true) => match key.nulls {
                    NullOrder::First => Ordering::Greater,
                    NullOrder::Last => Ordering::Less,
                },
                (false, false) => match key.direction {
                    Direction::Asc => compare_scalars(x, y),
                    Direction::Desc => compare_scalars(y, x),
                },
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Total order over scalars: `Null` first, floats by IEEE total order, and
/// values of different types by a fixed type rank.
pub fn compare_scalars(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Bool(x), Bool(y)) => x.cmp(y),
        (I32(x), I32(y)) => x.cmp(y),
        (I64(x), I64(y)) => x.cmp(y),
        (F32(x), F32(y)) => x.total_cmp(y),
        (F64(x), F64(y)) => x.total_cmp(y),
        (Str(x), Str(y)) => x.cmp(y),
        (Bin(x), Bin(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(s: &Scalar) -> u8 {
    match s {
        Scalar::Null => 0,
        Scalar::Bool(_) => 1,
        Scalar::I32(_) => 2,
        Scalar::I64(_) => 3,
        Scalar::F32(_) => 4,
        Scalar::F64(_) => 5,
        Scalar::Str(_) => 6,
        Scalar::Bin(_) => 7,
    }
}
