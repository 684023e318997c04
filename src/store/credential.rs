use sea_query::{Expr, Iden, OnConflict, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::Row;

use super::{Result, SqliteStore};

#[derive(Iden)]
enum Credentials {
    Table,
    Name,
    Value,
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>> {
        let (query, values) = Query::select()
            .column(Credentials::Value)
            .from(Credentials::Table)
            .and_where(Expr::col(Credentials::Name).eq(name))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&query, values)
            .fetch_optional(&mut self.0.conn.acquire().await?)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, name: &str, value: &str) -> Result<()> {
        let (query, values) = Query::insert()
            .into_table(Credentials::Table)
            .columns([Credentials::Name, Credentials::Value])
            .values_panic(vec![name.into(), value.into()])
            .on_conflict(
                OnConflict::column(Credentials::Name)
                    .update_column(Credentials::Value)
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;

        Ok(())
    }

    pub async fn clear(&self, name: &str) -> Result<()> {
        let (query, values) = Query::delete()
            .from_table(Credentials::Table)
            .and_where(Expr::col(Credentials::Name).eq(name))
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::tests::test_store;

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let store = test_store().await;
        assert_eq!(store.credentials().get("pin").await.unwrap(), None);

        store.credentials().set("pin", "first").await.unwrap();
        store.credentials().set("pin", "second").await.unwrap();
        assert_eq!(
            store.credentials().get("pin").await.unwrap().as_deref(),
            Some("second")
        );

        store.credentials().clear("pin").await.unwrap();
        assert_eq!(store.credentials().get("pin").await.unwrap(), None);
    }
}
