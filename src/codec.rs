//! Row codec: positional rows to named, type-checked records.
//!
//! A record type declares which column feeds each field and what kind of
//! value it expects. Decoding never coerces, except for the two conversions
//! the wire format forces on us: integers 0/1 into booleans and ISO-8601
//! text into dates and timestamps.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, StoreError};
use crate::types::{parse_iso_date, parse_iso_timestamp, Row, SqlValue};

/// The value kind a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    Bool,
    Blob,
    Date,
    Timestamp,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Real => "real",
            FieldKind::Text => "text",
            FieldKind::Bool => "bool",
            FieldKind::Blob => "blob",
            FieldKind::Date => "date",
            FieldKind::Timestamp => "timestamp",
        }
    }
}

/// Maps one result column onto a named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub column: usize,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, column: usize, kind: FieldKind) -> Self {
        Self {
            name,
            column,
            kind,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, column: usize, kind: FieldKind) -> Self {
        Self {
            name,
            column,
            kind,
            nullable: true,
        }
    }

    fn check(&self, row: usize, value: &SqlValue) -> Result<SqlValue> {
        let mismatch = || {
            StoreError::decode(
                self.name,
                row,
                format!("expected {}, got {}", self.kind.name(), value.kind_name()),
            )
        };

        if value.is_null() {
            return if self.nullable {
                Ok(SqlValue::Null)
            } else {
                Err(StoreError::decode(self.name, row, "unexpected null"))
            };
        }

        match (self.kind, value) {
            (FieldKind::Integer, SqlValue::Integer(_))
            | (FieldKind::Real, SqlValue::Real(_))
            | (FieldKind::Text, SqlValue::Text(_))
            | (FieldKind::Blob, SqlValue::Blob(_))
            | (FieldKind::Bool, SqlValue::Bool(_))
            | (FieldKind::Date, SqlValue::Date(_))
            | (FieldKind::Timestamp, SqlValue::Timestamp(_)) => Ok(value.clone()),
            (FieldKind::Bool, SqlValue::Integer(0)) => Ok(SqlValue::Bool(false)),
            (FieldKind::Bool, SqlValue::Integer(1)) => Ok(SqlValue::Bool(true)),
            (FieldKind::Bool, SqlValue::Integer(i)) => Err(StoreError::decode(
                self.name,
                row,
                format!("expected bool (0 or 1), got integer {}", i),
            )),
            (FieldKind::Date, SqlValue::Text(s)) => parse_iso_date(s)
                .map(SqlValue::Date)
                .ok_or_else(|| {
                    StoreError::decode(self.name, row, format!("`{}` is not an ISO-8601 date", s))
                }),
            (FieldKind::Timestamp, SqlValue::Text(s)) => parse_iso_timestamp(s)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| {
                    StoreError::decode(
                        self.name,
                        row,
                        format!("`{}` is not an ISO-8601 timestamp", s),
                    )
                }),
            _ => Err(mismatch()),
        }
    }
}

/// A decoded row: field values checked against their declared kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    row: usize,
    fields: Vec<(&'static str, SqlValue)>,
}

impl Record {
    /// Index of the source row within its result.
    pub fn row_index(&self) -> usize {
        self.row
    }

    pub fn value(&self, name: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Reads a field as `T`.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .value(name)
            .ok_or_else(|| StoreError::decode(name, self.row, "field is not declared"))?;
        T::from_value(value).map_err(|message| StoreError::decode(name, self.row, message))
    }
}

/// Decodes rows against a fixed list of field specs.
#[derive(Debug, Clone, Copy)]
pub struct RowCodec<'f> {
    fields: &'f [FieldSpec],
}

impl<'f> RowCodec<'f> {
    pub fn new(fields: &'f [FieldSpec]) -> Self {
        Self { fields }
    }

    pub fn decode(&self, row_index: usize, row: &Row) -> Result<Record> {
        let fields = self
            .fields
            .iter()
            .map(|spec| {
                let value = row.get(spec.column).ok_or_else(|| {
                    StoreError::decode(
                        spec.name,
                        row_index,
                        format!("row has no column {} (width {})", spec.column, row.len()),
                    )
                })?;
                Ok((spec.name, spec.check(row_index, value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Record {
            row: row_index,
            fields,
        })
    }

    pub fn decode_all(&self, rows: &[Row]) -> Result<Vec<Record>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| self.decode(i, row))
            .collect()
    }
}

/// Extraction of a Rust value from a checked field.
pub trait FromValue: Sized {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String>;
}

fn wrong_kind(expected: &str, value: &SqlValue) -> String {
    format!("cannot read {} as {}", value.kind_name(), expected)
}

impl FromValue for i64 {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Integer(i) => Ok(*i),
            other => Err(wrong_kind("i64", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Real(f) => Ok(*f),
            other => Err(wrong_kind("f64", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(wrong_kind("String", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Integer(0) => Ok(false),
            SqlValue::Integer(1) => Ok(true),
            other => Err(wrong_kind("bool", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Blob(b) => Ok(b.clone()),
            other => Err(wrong_kind("bytes", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Date(d) => Ok(*d),
            other => Err(wrong_kind("date", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Timestamp(ts) => Ok(*ts),
            other => Err(wrong_kind("timestamp", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &SqlValue) -> std::result::Result<Self, String> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A domain type that can be built from a decoded row.
pub trait FromRecord: Sized {
    /// Column-to-field mapping, in terms of the query's select list.
    const FIELDS: &'static [FieldSpec];

    fn from_record(record: &Record) -> Result<Self>;

    fn decode(row_index: usize, row: &Row) -> Result<Self> {
        let record = RowCodec::new(Self::FIELDS).decode(row_index, row)?;
        Self::from_record(&record)
    }
}
