use std::{collections::HashMap, sync::Mutex};

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::RecordStore;
use crate::places::repo_types::Place;
use crate::users::repo_types::{DuplicateEmail, NewUser, User};

/// Step at which the next write is made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Any read.
    Lookup,
    /// Inserting or deleting the place row.
    PlaceWrite,
    /// Saving the user's place list, after the place write succeeded.
    UserWrite,
    /// Everything applied, commit refused.
    Commit,
}

#[derive(Default, Clone)]
struct Tables {
    users: HashMap<Uuid, User>,
    places: HashMap<Uuid, Place>,
}

/// Transactional in-memory store: writes go to a copy of the tables that
/// replaces the live ones only when the whole unit succeeds.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail: Mutex<Option<FailPoint>>,
    stale_email_lookup: Mutex<bool>,
}

impl MemoryStore {
    pub fn fail_next(&self, point: FailPoint) {
        *self.fail.lock().unwrap() = Some(point);
    }

    /// The next email lookup misses even if the user exists, as if another
    /// request inserted it right after the read.
    pub fn miss_next_email_lookup(&self) {
        *self.stale_email_lookup.lock().unwrap() = true;
    }

    fn should_fail(&self, point: FailPoint) -> anyhow::Result<()> {
        let mut fail = self.fail.lock().unwrap();
        if *fail == Some(point) {
            *fail = None;
            anyhow::bail!("injected failure at {point:?}");
        }
        Ok(())
    }

    pub fn insert_user(&self, name: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: String::new(),
            places: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        user
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.tables.lock().unwrap().users.get(&id).cloned()
    }

    pub fn place(&self, id: Uuid) -> Option<Place> {
        self.tables.lock().unwrap().places.get(&id).cloned()
    }

    pub fn place_count(&self) -> usize {
        self.tables.lock().unwrap().places.len()
    }

    /// Runs `f` against a copy of the tables and publishes it on success.
    fn transaction<T>(
        &self,
        f: impl FnOnce(&Self, &mut Tables) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut live = self.tables.lock().unwrap();
        let mut working = live.clone();
        let out = f(self, &mut working)?;
        self.should_fail(FailPoint::Commit)?;
        *live = working;
        Ok(out)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.should_fail(FailPoint::Lookup)?;
        Ok(self.user(id))
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.should_fail(FailPoint::Lookup)?;
        if std::mem::take(&mut *self.stale_email_lookup.lock().unwrap()) {
            return Ok(None);
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        self.should_fail(FailPoint::Lookup)?;
        let mut users: Vec<User> = self.tables.lock().unwrap().users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        self.transaction(|_, t| {
            if t.users.values().any(|u| u.email == new.email) {
                return Err(DuplicateEmail.into());
            }
            let user = User {
                id: Uuid::new_v4(),
                name: new.name,
                email: new.email,
                password_hash: new.password_hash,
                places: Vec::new(),
                created_at: OffsetDateTime::now_utc(),
            };
            t.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    async fn find_place(&self, id: Uuid) -> anyhow::Result<Option<Place>> {
        self.should_fail(FailPoint::Lookup)?;
        Ok(self.place(id))
    }

    async fn find_places_by_creator(&self, creator: Uuid) -> anyhow::Result<Vec<Place>> {
        self.should_fail(FailPoint::Lookup)?;
        let tables = self.tables.lock().unwrap();
        let mut places: Vec<Place> = tables
            .places
            .values()
            .filter(|p| p.creator == creator)
            .cloned()
            .collect();
        places.sort_by_key(|p| p.created_at);
        Ok(places)
    }

    async fn create_place(&self, place: &Place) -> anyhow::Result<()> {
        self.transaction(|s, t| {
            s.should_fail(FailPoint::PlaceWrite)?;
            t.places.insert(place.id, place.clone());
            s.should_fail(FailPoint::UserWrite)?;
            let user = t
                .users
                .get_mut(&place.creator)
                .ok_or_else(|| anyhow::anyhow!("user {} vanished", place.creator))?;
            user.places.push(place.id);
            Ok(())
        })
    }

    async fn update_place(&self, place: &Place) -> anyhow::Result<Place> {
        self.transaction(|s, t| {
            s.should_fail(FailPoint::PlaceWrite)?;
            let stored = t
                .places
                .get_mut(&place.id)
                .ok_or_else(|| anyhow::anyhow!("place {} vanished", place.id))?;
            stored.title = place.title.clone();
            stored.description = place.description.clone();
            Ok(stored.clone())
        })
    }

    async fn delete_place(&self, place: &Place) -> anyhow::Result<()> {
        self.transaction(|s, t| {
            s.should_fail(FailPoint::PlaceWrite)?;
            t.places
                .remove(&place.id)
                .ok_or_else(|| anyhow::anyhow!("place {} vanished", place.id))?;
            s.should_fail(FailPoint::UserWrite)?;
            let user = t
                .users
                .get_mut(&place.creator)
                .ok_or_else(|| anyhow::anyhow!("user {} vanished", place.creator))?;
            user.places.retain(|id| *id != place.id);
            Ok(())
        })
    }
}
