//! Record store for users and places.
//!
//! Handlers and services only see [`RecordStore`]. The composite writes
//! (`create_place`, `delete_place`) run both document mutations in one
//! transaction so a place never exists without its owner's reference, and
//! vice versa.

use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::places::{self, repo_types::Place};
use crate::users::{
    self,
    repo_types::{NewUser, User},
};

#[cfg(test)]
pub mod memory;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list_users(&self) -> anyhow::Result<Vec<User>>;
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User>;

    async fn find_place(&self, id: Uuid) -> anyhow::Result<Option<Place>>;
    async fn find_places_by_creator(&self, creator: Uuid) -> anyhow::Result<Vec<Place>>;
    /// Insert `place` and append its id to the creator's places, atomically.
    async fn create_place(&self, place: &Place) -> anyhow::Result<()>;
    async fn update_place(&self, place: &Place) -> anyhow::Result<Place>;
    /// Delete `place` and remove its id from the creator's places, atomically.
    async fn delete_place(&self, place: &Place) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        users::repo::find_by_id(&self.db, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        users::repo::find_by_email(&self.db, email).await
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        users::repo::list(&self.db).await
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        users::repo::create(&self.db, &new).await
    }

    async fn find_place(&self, id: Uuid) -> anyhow::Result<Option<Place>> {
        places::repo::find_by_id(&self.db, id).await
    }

    async fn find_places_by_creator(&self, creator: Uuid) -> anyhow::Result<Vec<Place>> {
        places::repo::list_by_creator(&self.db, creator).await
    }

    async fn create_place(&self, place: &Place) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        places::repo::insert_tx(&mut tx, place).await?;
        users::repo::push_place_tx(&mut tx, place.creator, place.id).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn update_place(&self, place: &Place) -> anyhow::Result<Place> {
        places::repo::update_text(&self.db, place).await
    }

    async fn delete_place(&self, place: &Place) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        places::repo::delete_tx(&mut tx, place.id).await?;
        users::repo::pull_place_tx(&mut tx, place.creator, place.id).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }
}
