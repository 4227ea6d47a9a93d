use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::Place;

const PLACE_COLUMNS: &str = "id, title, description, address, image, creator, created_at";

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Place>> {
    let place = sqlx::query_as::<_, Place>(&format!(
        "SELECT {PLACE_COLUMNS} FROM places WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find place by id")?;
    Ok(place)
}

/// All places owned by `creator`, oldest first.
pub async fn list_by_creator(db: &PgPool, creator: Uuid) -> anyhow::Result<Vec<Place>> {
    let rows = sqlx::query_as::<_, Place>(&format!(
        r#"
        SELECT {PLACE_COLUMNS}
          FROM places
         WHERE creator = $1
         ORDER BY created_at ASC
        "#
    ))
    .bind(creator)
    .fetch_all(db)
    .await
    .context("list places by creator")?;
    Ok(rows)
}

/// Insert a new place within a transaction.
pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, place: &Place) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO places (id, title, description, address, image, creator, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(place.id)
    .bind(&place.title)
    .bind(&place.description)
    .bind(&place.address)
    .bind(&place.image)
    .bind(place.creator)
    .bind(place.created_at)
    .execute(&mut **tx)
    .await
    .context("insert place")?;
    Ok(())
}

/// Persist title and description. Other columns are immutable.
pub async fn update_text(db: &PgPool, place: &Place) -> anyhow::Result<Place> {
    let updated = sqlx::query_as::<_, Place>(&format!(
        r#"
        UPDATE places SET title = $2, description = $3
         WHERE id = $1
        RETURNING {PLACE_COLUMNS}
        "#
    ))
    .bind(place.id)
    .bind(&place.title)
    .bind(&place.description)
    .fetch_optional(db)
    .await
    .context("update place")?;
    updated.ok_or_else(|| anyhow::anyhow!("place {} vanished", place.id))
}

/// Delete a place within a transaction.
pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<()> {
    let res = sqlx::query("DELETE FROM places WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await
        .context("delete place")?;
    anyhow::ensure!(res.rows_affected() == 1, "place {id} vanished");
    Ok(())
}
