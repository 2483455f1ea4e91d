use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use codecolors_core::UserState;
use parking_lot::RwLock;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

/// The per-user storage slot a host keeps between turns.
pub trait UserStateRepository: Send + Sync {
    async fn load_state(&self, user_id: &str) -> Result<Option<UserState>>;
    async fn save_state(&self, user_id: &str, state: &UserState) -> Result<()>;
    async fn clear_state(&self, user_id: &str) -> Result<bool>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    states: Arc<RwLock<HashMap<String, UserState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl UserStateRepository for MemoryStore {
    async fn load_state(&self, user_id: &str) -> Result<Option<UserState>> {
        Ok(self.states.read().get(user_id).cloned())
    }

    async fn save_state(&self, user_id: &str, state: &UserState) -> Result<()> {
        self.states
            .write()
            .insert(user_id.to_string(), state.clone());
        Ok(())
    }

    async fn clear_state(&self, user_id: &str) -> Result<bool> {
        Ok(self.states.write().remove(user_id).is_some())
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // Every connection to `sqlite::memory:` is its own database, so keep exactly one alive.
        let in_memory = database_url.contains(":memory:");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_state (
              user_id TEXT PRIMARY KEY,
              display_name TEXT,
              updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl UserStateRepository for SqliteStore {
    async fn load_state(&self, user_id: &str) -> Result<Option<UserState>> {
        let row = sqlx::query(
            r#"
            SELECT display_name
            FROM user_state
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserState {
            user_display_name: row.get("display_name"),
        }))
    }

    async fn save_state(&self, user_id: &str, state: &UserState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_state (user_id, display_name, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
              display_name=excluded.display_name,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&state.user_display_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_state(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_state WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl UserStateRepository for Store {
    async fn load_state(&self, user_id: &str) -> Result<Option<UserState>> {
        match self {
            Store::Memory(store) => store.load_state(user_id).await,
            Store::Sqlite(store) => store.load_state(user_id).await,
        }
    }

    async fn save_state(&self, user_id: &str, state: &UserState) -> Result<()> {
        match self {
            Store::Memory(store) => store.save_state(user_id, state).await,
            Store::Sqlite(store) => store.save_state(user_id, state).await,
        }
    }

    async fn clear_state(&self, user_id: &str) -> Result<bool> {
        match self {
            Store::Memory(store) => store.clear_state(user_id).await,
            Store::Sqlite(store) => store.clear_state(user_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &impl UserStateRepository) {
        assert_eq!(store.load_state("user-1").await.unwrap(), None);

        store
            .save_state("user-1", &UserState::with_display_name("Ada Lovelace"))
            .await
            .unwrap();
        store
            .save_state("user-1", &UserState::with_display_name("Ada King"))
            .await
            .unwrap();
        assert_eq!(
            store.load_state("user-1").await.unwrap(),
            Some(UserState::with_display_name("Ada King"))
        );
        assert_eq!(store.load_state("user-2").await.unwrap(), None);

        assert!(store.clear_state("user-1").await.unwrap());
        assert!(!store.clear_state("user-1").await.unwrap());
        assert_eq!(store.load_state("user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_keeps_one_slot_per_user() {
        let store = MemoryStore::new();
        exercise(&store).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sqlite_store_keeps_one_slot_per_user() {
        let store = Store::sqlite("sqlite::memory:").await.unwrap();
        assert_eq!(store.backend(), "sqlite");
        exercise(&store).await;
    }

    #[tokio::test]
    async fn empty_state_round_trips() {
        let store = Store::sqlite("sqlite::memory:").await.unwrap();
        store.save_state("user-3", &UserState::default()).await.unwrap();
        assert_eq!(
            store.load_state("user-3").await.unwrap(),
            Some(UserState::default())
        );
    }
}
