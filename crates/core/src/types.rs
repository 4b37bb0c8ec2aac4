/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Seconds since the Unix epoch, as stored in `*_unix` columns.
pub type UnixTime = i64;

/// Current time as Unix seconds.
pub fn now_unix() -> UnixTime {
    chrono::Utc::now().timestamp()
}
