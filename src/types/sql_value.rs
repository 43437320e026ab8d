use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Represents a SQL parameter value in a backend-agnostic way.
/// Dates, timestamps and booleans never reach a backend as-is; see [`SqlValue::to_wire`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// The subset of values every backend accepts on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Converts to the wire representation: booleans become 0/1, dates and
    /// timestamps become ISO-8601 text.
    pub fn to_wire(&self) -> WireValue {
        match self {
            SqlValue::Null => WireValue::Null,
            SqlValue::Integer(i) => WireValue::Integer(*i),
            SqlValue::Real(f) => WireValue::Real(*f),
            SqlValue::Text(s) => WireValue::Text(s.clone()),
            SqlValue::Bool(b) => WireValue::Integer(i64::from(*b)),
            SqlValue::Blob(b) => WireValue::Blob(b.clone()),
            SqlValue::Date(d) => WireValue::Text(format_iso_date(d)),
            SqlValue::Timestamp(ts) => WireValue::Text(format_iso_timestamp(ts)),
        }
    }

    /// The normalized form of this value. Idempotent.
    pub fn normalize(&self) -> SqlValue {
        self.to_wire().into()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short name of the value kind, used in decode errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "bool",
            SqlValue::Blob(_) => "blob",
            SqlValue::Date(_) => "date",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }
}

impl From<WireValue> for SqlValue {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => SqlValue::Null,
            WireValue::Integer(i) => SqlValue::Integer(i),
            WireValue::Real(f) => SqlValue::Real(f),
            WireValue::Text(s) => SqlValue::Text(s),
            WireValue::Blob(b) => SqlValue::Blob(b),
        }
    }
}

pub fn format_iso_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// `YYYY-MM-DDTHH:MM:SS`, with a fractional part only when non-zero.
pub fn format_iso_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

/// Accepts `T` or space separators (SQLite's `CURRENT_TIMESTAMP` uses a space)
/// and RFC 3339 strings with an offset, which are converted to UTC.
pub fn parse_iso_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, SQLITE_TIMESTAMP_FORMAT))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        SqlValue::Blob(value.to_vec())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value.naive_utc())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}
