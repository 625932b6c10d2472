//! Row helpers shared by the content record repositories.

use sqlx::postgres::PgRow;
use sqlx::Row;

use scribe_core::{RecordState, Result};

/// Columns every content record table carries for its lifecycle.
pub(crate) const STATE_COLUMNS: &str = "status, error_message, created_at, updated_at, completed_at";

pub(crate) fn parse_state(r: &PgRow) -> Result<RecordState> {
    let status: String = r.try_get("status")?;
    Ok(RecordState {
        status: status.parse()?,
        error_message: r.try_get("error_message")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
        completed_at: r.try_get("completed_at")?,
    })
}

/// Parse an optional text column into an enum.
pub(crate) fn parse_opt<T>(r: &PgRow, column: &str) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = scribe_core::Error>,
{
    let raw: Option<String> = r.try_get(column)?;
    raw.map(|s| s.parse()).transpose()
}
