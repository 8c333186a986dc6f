use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::TokenStore;
use crate::error::WechatError;
use crate::types::AccessToken;

pub const DEFAULT_TABLE: &str = "_wechat_tokens";

/// Table and column names used by [`SqliteTokenStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    table: String,
    hash_column: String,
    token_column: String,
    expires_column: String,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            hash_column: "hash".to_string(),
            token_column: "token".to_string(),
            expires_column: "expires".to_string(),
        }
    }
}

impl TableLayout {
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = name.into();
        self
    }

    pub fn hash_column(mut self, name: impl Into<String>) -> Self {
        self.hash_column = name.into();
        self
    }

    pub fn token_column(mut self, name: impl Into<String>) -> Self {
        self.token_column = name.into();
        self
    }

    pub fn expires_column(mut self, name: impl Into<String>) -> Self {
        self.expires_column = name.into();
        self
    }

    fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY NOT NULL, {} TEXT NOT NULL, {} INTEGER NOT NULL)",
            quote(&self.table),
            quote(&self.hash_column),
            quote(&self.token_column),
            quote(&self.expires_column),
        )
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT {}, {} FROM {} WHERE {} = ?1",
            quote(&self.token_column),
            quote(&self.expires_column),
            quote(&self.table),
            quote(&self.hash_column),
        )
    }

    fn upsert_sql(&self) -> String {
        format!(
            "INSERT OR REPLACE INTO {} ({}, {}, {}) VALUES (?1, ?2, ?3)",
            quote(&self.table),
            quote(&self.hash_column),
            quote(&self.token_column),
            quote(&self.expires_column),
        )
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// SQLite-backed token storage.
///
/// One row per credential pair, keyed by the hex-encoded hash. Writes are
/// `INSERT OR REPLACE`, so the hash column must be unique; [`create_table`]
/// sets that up.
///
/// [`create_table`]: SqliteTokenStore::create_table
#[derive(Clone)]
pub struct SqliteTokenStore {
    conn: Arc<Mutex<Connection>>,
    layout: Arc<TableLayout>,
}

impl std::fmt::Debug for SqliteTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTokenStore")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl SqliteTokenStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>, layout: TableLayout) -> Result<Self, WechatError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            WechatError::Storage(format!("Failed to open SQLite {}: {e}", path.display()))
        })?;
        Ok(Self::from_connection(conn, layout))
    }

    pub fn from_connection(conn: Connection, layout: TableLayout) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            layout: Arc::new(layout),
        }
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Create the token table if it does not exist yet.
    pub async fn create_table(&self) -> Result<(), WechatError> {
        let sql = self.layout.create_sql();
        self.with_connection(move |conn| conn.execute(&sql, []).map(|_| ()))
            .await
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, WechatError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| WechatError::Storage("SQLite connection lock poisoned".to_string()))?;
            f(&conn).map_err(|e| WechatError::Storage(format!("SQLite error: {e}")))
        })
        .await
        .map_err(|e| WechatError::Storage(format!("spawn_blocking join error: {e}")))?
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn retrieve(&self, hash: &str) -> Option<AccessToken> {
        let sql = self.layout.select_sql();
        let hash = hash.to_string();
        let row = self
            .with_connection(move |conn| {
                conn.query_row(&sql, params![hash], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
                })
                .optional()
            })
            .await;

        match row {
            Ok(Some((value, expires))) => match DateTime::from_timestamp(expires, 0) {
                Some(expires_at) => Some(AccessToken::new(value, expires_at)),
                None => {
                    log::debug!("Ignoring token row with out-of-range expiry {expires}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Token lookup failed: {e}");
                None
            }
        }
    }

    async fn store(&self, hash: &str, token: &AccessToken) -> Result<(), WechatError> {
        let sql = self.layout.upsert_sql();
        let hash = hash.to_string();
        let value = token.as_str().to_string();
        let expires = token.expires_at().timestamp();
        self.with_connection(move |conn| {
            conn.execute(&sql, params![hash, value, expires]).map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str, expires: i64) -> AccessToken {
        AccessToken::new(value, DateTime::from_timestamp(expires, 0).unwrap())
    }

    async fn memory_store(layout: TableLayout) -> SqliteTokenStore {
        let store = SqliteTokenStore::from_connection(Connection::open_in_memory().unwrap(), layout);
        store.create_table().await.unwrap();
        store
    }

    #[test]
    fn test_default_layout_sql() {
        let layout = TableLayout::default();
        assert_eq!(
            layout.select_sql(),
            r#"SELECT "token", "expires" FROM "_wechat_tokens" WHERE "hash" = ?1"#
        );
        assert_eq!(
            layout.upsert_sql(),
            r#"INSERT OR REPLACE INTO "_wechat_tokens" ("hash", "token", "expires") VALUES (?1, ?2, ?3)"#
        );
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = memory_store(TableLayout::default()).await;
        store.store("h1", &token("abc123", 2_000_000_000)).await.unwrap();
        assert_eq!(store.retrieve("h1").await, Some(token("abc123", 2_000_000_000)));
    }

    #[tokio::test]
    async fn test_missing_row_is_absent() {
        let store = memory_store(TableLayout::default()).await;
        assert!(store.retrieve("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_row() {
        let store = memory_store(TableLayout::default()).await;
        store.store("h1", &token("first", 2_000_000_000)).await.unwrap();
        store.store("h1", &token("second", 2_000_000_500)).await.unwrap();

        assert_eq!(store.retrieve("h1").await, Some(token("second", 2_000_000_500)));

        let count: i64 = store
            .with_connection(|conn| {
                conn.query_row(r#"SELECT COUNT(*) FROM "_wechat_tokens""#, [], |r| r.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_custom_layout() {
        let layout = TableLayout::default()
            .table("tokens")
            .hash_column("cache_key")
            .token_column("value")
            .expires_column("expires_at");
        let store = memory_store(layout).await;

        store.store("h1", &token("abc", 2_000_000_000)).await.unwrap();
        assert_eq!(store.retrieve("h1").await.unwrap().as_str(), "abc");

        let value: String = store
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT value FROM tokens WHERE cache_key = 'h1'",
                    [],
                    |r| r.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(value, "abc");
    }

    #[tokio::test]
    async fn test_missing_table_is_absent_and_store_fails() {
        let store =
            SqliteTokenStore::from_connection(Connection::open_in_memory().unwrap(), TableLayout::default());
        assert!(store.retrieve("h1").await.is_none());

        let result = store.store("h1", &token("abc", 2_000_000_000)).await;
        assert!(matches!(result, Err(WechatError::Storage(_))));
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");

        let store = SqliteTokenStore::open(&path, TableLayout::default()).unwrap();
        store.create_table().await.unwrap();
        store.store("h1", &token("abc", 2_000_000_000)).await.unwrap();
        drop(store);

        let reopened = SqliteTokenStore::open(&path, TableLayout::default()).unwrap();
        assert_eq!(reopened.retrieve("h1").await.unwrap().as_str(), "abc");
    }
}
