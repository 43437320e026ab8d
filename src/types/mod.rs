mod row;
mod sql_value;
mod statement;

pub use row::{MutationOutcome, Row, RowSet};
pub use sql_value::{
    format_iso_date, format_iso_timestamp, parse_iso_date, parse_iso_timestamp, SqlValue,
    WireValue,
};
pub use statement::Statement;
