use sea_query::{Expr, Iden, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::{FromRow, Row};

use super::{conflict, Result, SqliteStore};
use crate::core::{Tag, TagKind};

#[derive(Iden)]
enum Tags {
    Table,
    Seq,
    Id,
    Kind,
    Name,
    Icon,
    Color,
}

impl<'r> FromRow<'r, sqlx::sqlite::SqliteRow> for Tag {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> ::std::result::Result<Self, sqlx::Error> {
        Ok(Tag {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            icon: row.try_get("icon")?,
            color: row.try_get("color")?,
        })
    }
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    pub async fn list(&self, kind: TagKind) -> Result<Vec<Tag>> {
        let (query, values) = Query::select()
            .columns([Tags::Id, Tags::Name, Tags::Icon, Tags::Color])
            .from(Tags::Table)
            .and_where(Expr::col(Tags::Kind).eq(kind.as_str()))
            .order_by(Tags::Seq, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&query, values)
            .fetch_all(&mut self.0.conn.acquire().await?)
            .await?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            tags.push(Tag::from_row(&row)?);
        }

        Ok(tags)
    }

    #[tracing::instrument(skip(self, tag), fields(name = %tag.name))]
    pub async fn save(&self, kind: TagKind, tag: &Tag) -> Result<()> {
        let (query, values) = Query::insert()
            .into_table(Tags::Table)
            .columns([Tags::Id, Tags::Kind, Tags::Name, Tags::Icon, Tags::Color])
            .values_panic(vec![
                tag.id.as_str().into(),
                kind.as_str().into(),
                tag.name.as_str().into(),
                tag.icon.as_str().into(),
                tag.color.as_str().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await
            .map_err(conflict)?;

        Ok(())
    }
}
