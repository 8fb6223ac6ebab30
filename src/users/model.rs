use serde::{Serialize, Serializer};
use sqlx::FromRow;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};
use uuid::Uuid;

/// `YYYY-MM-DDTHH:MM:SSZ`, always UTC.
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

fn serialize_timestamp<S: Serializer>(at: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
    let text = format_timestamp(*at).map_err(serde::ser::Error::custom)?;
    s.serialize_str(&text)
}

/// User record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never sent to clients
    pub first_name: String,
    pub last_name: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: OffsetDateTime,
}

/// Row as stored in SQLite; ids and timestamps are kept as text.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = String;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|e| format!("id {:?}: {e}", row.id))?;
        let created_at = parse_timestamp(&row.created_at)
            .map_err(|e| format!("created_at {:?}: {e}", row.created_at))?;
        Ok(User {
            id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at,
        })
    }
}

pub fn format_timestamp(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(time::UtcOffset::UTC).format(TIMESTAMP_FORMAT)
}

pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    time::PrimitiveDateTime::parse(s, TIMESTAMP_FORMAT).map(|dt| dt.assume_utc())
}
