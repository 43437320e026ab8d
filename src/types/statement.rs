use crate::types::{SqlValue, WireValue};

/// A SQL template with `?` placeholders and its bound parameters.
///
/// The placeholder count is not checked here; the backend rejects a
/// mismatch with a statement error.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params<I, V>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends one positional parameter.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Parameters as sent to a backend.
    pub fn wire_params(&self) -> Vec<WireValue> {
        self.params.iter().map(SqlValue::to_wire).collect()
    }

    /// Whether this is an INSERT or REPLACE, the only statements that may
    /// report a last inserted id.
    ///
    /// Only the first keyword is checked. An insert behind a leading `WITH`
    /// clause or a SQL comment reports no id even when it inserted a row.
    pub(crate) fn is_insert(&self) -> bool {
        let head = self
            .sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("");
        head.eq_ignore_ascii_case("insert") || head.eq_ignore_ascii_case("replace")
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}
