use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{DuplicateEmail, NewUser, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, places, created_at";

/// Find a user by id.
pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find user by id")?;
    Ok(user)
}

/// Find a user by email.
pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(db)
    .await
    .context("find user by email")?;
    Ok(user)
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
    ))
    .fetch_all(db)
    .await
    .context("list users")?;
    Ok(users)
}

/// Create a new user with hashed password and no places.
/// A taken email surfaces as [`DuplicateEmail`].
pub async fn create(db: &PgPool, new: &NewUser) -> anyhow::Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.password_hash)
    .fetch_one(db)
    .await
    .map_err(|e| {
        // lost a race with a concurrent signup for the same email
        if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
            anyhow::Error::new(DuplicateEmail)
        } else {
            anyhow::Error::new(e).context("insert user")
        }
    })?;
    Ok(user)
}

/// Append a place id to the user's list within a transaction.
pub async fn push_place_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    place_id: Uuid,
) -> anyhow::Result<()> {
    let res = sqlx::query("UPDATE users SET places = array_append(places, $2) WHERE id = $1")
        .bind(user_id)
        .bind(place_id)
        .execute(&mut **tx)
        .await
        .context("append user place")?;
    anyhow::ensure!(res.rows_affected() == 1, "user {user_id} vanished");
    Ok(())
}

/// Remove a place id from the user's list within a transaction.
pub async fn pull_place_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    place_id: Uuid,
) -> anyhow::Result<()> {
    let res = sqlx::query("UPDATE users SET places = array_remove(places, $2) WHERE id = $1")
        .bind(user_id)
        .bind(place_id)
        .execute(&mut **tx)
        .await
        .context("remove user place")?;
    anyhow::ensure!(res.rows_affected() == 1, "user {user_id} vanished");
    Ok(())
}
