use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Place record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Place {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub image: String, // storage key of the uploaded image
    pub creator: Uuid, // owning user, fixed at creation
    pub created_at: OffsetDateTime,
}

impl Place {
    pub fn new(title: String, description: String, address: String, image: String, creator: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            address,
            image,
            creator,
            created_at: now_micros(),
        }
    }
}

/// Current time at the microsecond precision `TIMESTAMPTZ` stores, so a
/// freshly built place compares equal to the row read back later.
fn now_micros() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond() % 1_000))
}
