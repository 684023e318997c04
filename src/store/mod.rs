mod credential;
mod tag;
mod txn;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::debug;

use crate::core::{NewTransaction, ParseError, Patch, Status, Tag, TagKind, Transaction};

#[derive(Debug, Error)]
pub enum Error {
    #[error("conflicting data already exists")]
    AlreadyExists,
    #[error("no transaction with id {0}")]
    NotFound(String),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Database(#[from] SqlxError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Date(#[from] chrono::ParseError),
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.to_string() == other.to_string()
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Narrows a transaction listing. Empty sets place no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub status: Option<Status>,
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub payments: Vec<String>,
    pub merchants: Vec<String>,
}

impl Criteria {
    #[cfg(test)]
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// All transactions, optionally with one status, in ingestion order.
    async fn list(&self, status: Option<Status>) -> Result<Vec<Transaction>>;
    async fn query(&self, criteria: &Criteria) -> Result<Vec<Transaction>>;
    async fn get(&self, id: &str) -> Result<Option<Transaction>>;
    async fn create(&self, tx: NewTransaction) -> Result<Transaction>;
    /// Fails with [`Error::NotFound`] when no record has `id`.
    async fn update(&self, id: &str, patch: &Patch) -> Result<()>;
    /// Like [`TransactionStore::update`], but a record whose status is no
    /// longer `current` counts as not found and is left untouched.
    async fn update_if(&self, id: &str, current: Status, patch: &Patch) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Registry entries in insertion order.
    async fn tags(&self, kind: TagKind) -> Result<Vec<Tag>>;
    async fn save_tag(&self, kind: TagKind, tag: &Tag) -> Result<()>;
}

/// Holds single opaque values such as the app-lock credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn credential(&self, name: &str) -> Result<Option<String>>;
    async fn set_credential(&self, name: &str, value: &str) -> Result<()>;
    async fn clear_credential(&self, name: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<sqlx::pool::Pool<sqlx::sqlite::Sqlite>>,
}

impl SqliteStore {
    pub async fn new(uri: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(uri)?.create_if_missing(true);
        // A single connection keeps `sqlite::memory:` databases alive and
        // writes serialized.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let mut conn = pool.acquire().await?;
        sqlx::migrate!("./migrations").run(&mut conn).await?;
        debug!("store ready at {}", uri);

        Ok(Self {
            conn: Arc::new(pool),
        })
    }

    pub fn txns(&self) -> txn::Store<'_> {
        txn::Store::new(self)
    }

    pub fn registry(&self) -> tag::Store<'_> {
        tag::Store::new(self)
    }

    pub fn credentials(&self) -> credential::Store<'_> {
        credential::Store::new(self)
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Transaction>> {
        let criteria = Criteria {
            status,
            ..Default::default()
        };
        self.txns().query(&criteria).await
    }

    async fn query(&self, criteria: &Criteria) -> Result<Vec<Transaction>> {
        self.txns().query(criteria).await
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>> {
        self.txns().by_id(id).await
    }

    async fn create(&self, tx: NewTransaction) -> Result<Transaction> {
        self.txns().save(tx).await
    }

    async fn update(&self, id: &str, patch: &Patch) -> Result<()> {
        self.txns().update(id, patch).await
    }

    async fn update_if(&self, id: &str, current: Status, patch: &Patch) -> Result<()> {
        self.txns().update_if(id, current, patch).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.txns().delete(id).await
    }
}

#[async_trait]
impl TagStore for SqliteStore {
    async fn tags(&self, kind: TagKind) -> Result<Vec<Tag>> {
        self.registry().list(kind).await
    }

    async fn save_tag(&self, kind: TagKind, tag: &Tag) -> Result<()> {
        self.registry().save(kind, tag).await
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn credential(&self, name: &str) -> Result<Option<String>> {
        self.credentials().get(name).await
    }

    async fn set_credential(&self, name: &str, value: &str) -> Result<()> {
        self.credentials().set(name, value).await
    }

    async fn clear_credential(&self, name: &str) -> Result<()> {
        self.credentials().clear(name).await
    }
}

fn db_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_db_date(date: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(date)?.with_timezone(&Utc))
}

/// Maps SQLite uniqueness violations onto [`Error::AlreadyExists`].
fn conflict(e: SqlxError) -> Error {
    match e {
        SqlxError::Database(e) => {
            // Primary key or unique index.
            let unique = matches!(e.code().as_deref(), Some("1555") | Some("2067"));
            if unique {
                return Error::AlreadyExists;
            }

            Error::from(SqlxError::Database(e))
        }
        _ => Error::from(e),
    }
}
