// ABOUTME: Engine-neutral SQL values moved between store adapters
// ABOUTME: Carries rows from source queries into destination parameters

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::fmt;

/// A single column value, independent of the engine it was read from.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    /// Timestamp without time zone
    Timestamp(NaiveDateTime),
    /// Timestamp with time zone, normalized to UTC
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Bind-only list of text values, used for key exclusion on PostgreSQL
    TextArray(Vec<String>),
}

impl SqlValue {
    /// Integer view of counts and lengths; text is parsed since some
    /// drivers hand back aggregates as strings
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view of `SELECT EXISTS (...)` results (bool on PostgreSQL,
    /// 0/1 on MySQL and SQLite)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            other => other.as_i64().map(|i| i != 0),
        }
    }

    /// Text rendering used for row identifiers and key comparison.
    /// `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            other => Some(other.to_string()),
        }
    }

    /// Drop sub-second precision from time-bearing values so they match
    /// what a DATETIME/TIME column without fractional seconds stores
    pub fn truncate_subsecond(self) -> SqlValue {
        match self {
            SqlValue::Timestamp(ts) => SqlValue::Timestamp(ts.with_nanosecond(0).unwrap_or(ts)),
            SqlValue::TimestampTz(ts) => {
                SqlValue::TimestampTz(ts.with_nanosecond(0).unwrap_or(ts))
            }
            SqlValue::Time(t) => SqlValue::Time(t.with_nanosecond(0).unwrap_or(t)),
            other => other,
        }
    }
}

/// Formats a timestamp the way MySQL and SQLite accept it in a text literal
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

fn format_time(t: &NaiveTime) -> String {
    if t.nanosecond() == 0 {
        t.format("%H:%M:%S").to_string()
    } else {
        t.format("%H:%M:%S%.f").to_string()
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            SqlValue::Json(v) => write!(f, "{}", v),
            SqlValue::Timestamp(ts) => write!(f, "{}", format_timestamp(ts)),
            SqlValue::TimestampTz(ts) => write!(f, "{}", format_timestamp(&ts.naive_utc())),
            SqlValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqlValue::Time(t) => write!(f, "{}", format_time(t)),
            SqlValue::TextArray(items) => write!(f, "{{{}}}", items.join(",")),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row, values in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}
