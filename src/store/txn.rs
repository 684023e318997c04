use chrono::SubsecRound;
use sea_query::{Cond, Expr, Iden, Order, Query, SimpleExpr, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::{conflict, db_date, parse_db_date, Criteria, Error, Result, SqliteStore};
use crate::core::{NewTransaction, Patch, Status, Transaction, DEFAULT_PAYMENT_METHOD};

#[derive(Iden)]
enum Transactions {
    Table,
    Seq,
    Id,
    Amount,
    Merchant,
    Category,
    PaymentMethod,
    Kind,
    Status,
    Date,
    Notes,
    Sender,
}

fn columns() -> [Transactions; 10] {
    [
        Transactions::Id,
        Transactions::Amount,
        Transactions::Merchant,
        Transactions::Category,
        Transactions::PaymentMethod,
        Transactions::Kind,
        Transactions::Status,
        Transactions::Date,
        Transactions::Notes,
        Transactions::Sender,
    ]
}

fn from_row(row: &SqliteRow) -> Result<Transaction> {
    Ok(Transaction {
        id: row.try_get("id")?,
        amount: row.try_get("amount")?,
        merchant: row.try_get("merchant")?,
        category: row.try_get("category")?,
        payment_method: row.try_get("payment_method")?,
        kind: row.try_get::<'_, String, _>("kind")?.parse()?,
        status: row.try_get::<'_, String, _>("status")?.parse()?,
        date: parse_db_date(row.try_get("date")?)?,
        notes: row.try_get("notes")?,
        sender: row.try_get("sender")?,
    })
}

/// Builds the WHERE clause for `criteria`, or nothing when it is unconstrained.
fn condition(criteria: &Criteria) -> Option<Cond> {
    let mut parts: Vec<SimpleExpr> = vec![];

    if let Some(status) = criteria.status {
        parts.push(Expr::col(Transactions::Status).eq(status.as_str()));
    }
    if let Some(since) = &criteria.since {
        parts.push(Expr::col(Transactions::Date).gte(db_date(since)));
    }
    if let Some(until) = &criteria.until {
        parts.push(Expr::col(Transactions::Date).lt(db_date(until)));
    }
    if !criteria.categories.is_empty() {
        parts.push(Expr::col(Transactions::Category).is_in(criteria.categories.clone()));
    }
    if !criteria.merchants.is_empty() {
        parts.push(Expr::col(Transactions::Merchant).is_in(criteria.merchants.clone()));
    }

    let mut cond = Cond::all();
    for part in parts.iter().cloned() {
        cond = cond.add(part);
    }

    let mut constrained = !parts.is_empty();
    if !criteria.payments.is_empty() {
        // Records without a payment method are shown as cash.
        let mut payments =
            Cond::any().add(Expr::col(Transactions::PaymentMethod).is_in(criteria.payments.clone()));
        if criteria
            .payments
            .iter()
            .any(|p| p.eq_ignore_ascii_case(DEFAULT_PAYMENT_METHOD))
        {
            payments = payments.add(Expr::col(Transactions::PaymentMethod).is_null());
        }
        cond = cond.add(payments);
        constrained = true;
    }

    constrained.then(|| cond)
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    pub async fn by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let (query, values) = Query::select()
            .columns(columns())
            .from(Transactions::Table)
            .and_where(Expr::col(Transactions::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&query, values)
            .fetch_optional(&mut self.0.conn.acquire().await?)
            .await?;

        row.as_ref().map(from_row).transpose()
    }

    #[tracing::instrument(skip(self))]
    pub async fn query(&self, criteria: &Criteria) -> Result<Vec<Transaction>> {
        let mut select = Query::select();
        select
            .columns(columns())
            .from(Transactions::Table)
            .order_by(Transactions::Seq, Order::Asc);
        if let Some(cond) = condition(criteria) {
            select.cond_where(cond);
        }
        let (query, values) = select.build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&query, values)
            .fetch_all(&mut self.0.conn.acquire().await?)
            .await?;
        debug!("{} transactions matched", rows.len());

        rows.iter().map(from_row).collect()
    }

    #[tracing::instrument(skip(self, tx), fields(merchant = %tx.merchant, status = %tx.status))]
    pub async fn save(&self, tx: NewTransaction) -> Result<Transaction> {
        let saved = Transaction {
            id: ulid::Ulid::new().to_string(),
            amount: tx.amount,
            merchant: tx.merchant,
            category: tx.category,
            payment_method: tx.payment_method,
            kind: tx.kind,
            status: tx.status,
            date: tx.date.trunc_subsecs(0),
            notes: tx.notes,
            sender: tx.sender,
        };

        let (query, values) = Query::insert()
            .into_table(Transactions::Table)
            .columns(columns())
            .values_panic(vec![
                saved.id.as_str().into(),
                saved.amount.as_str().into(),
                saved.merchant.as_str().into(),
                saved.category.as_deref().into(),
                saved.payment_method.as_deref().into(),
                saved.kind.as_str().into(),
                saved.status.as_str().into(),
                db_date(&saved.date).into(),
                saved.notes.as_deref().into(),
                saved.sender.as_deref().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await
            .map_err(conflict)?;

        Ok(saved)
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: &Patch) -> Result<()> {
        self.update_where(id, patch, None).await
    }

    /// Updates `id` only while it still has status `current`. Any other
    /// state reads as [`Error::NotFound`].
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_if(&self, id: &str, current: Status, patch: &Patch) -> Result<()> {
        self.update_where(id, patch, Some(current)).await
    }

    async fn update_where(&self, id: &str, patch: &Patch, current: Option<Status>) -> Result<()> {
        let mut changes = vec![];
        if let Some(amount) = &patch.amount {
            changes.push((Transactions::Amount, amount.as_str().into()));
        }
        if let Some(merchant) = &patch.merchant {
            changes.push((Transactions::Merchant, merchant.as_str().into()));
        }
        if let Some(category) = &patch.category {
            changes.push((Transactions::Category, category.as_str().into()));
        }
        if let Some(payment) = &patch.payment_method {
            changes.push((Transactions::PaymentMethod, payment.as_str().into()));
        }
        if let Some(kind) = patch.kind {
            changes.push((Transactions::Kind, kind.as_str().into()));
        }
        if let Some(status) = patch.status {
            changes.push((Transactions::Status, status.as_str().into()));
        }
        if let Some(date) = &patch.date {
            changes.push((Transactions::Date, db_date(date).into()));
        }
        if let Some(notes) = &patch.notes {
            // Blank notes clear the column.
            let notes = Some(notes.trim()).filter(|n| !n.is_empty());
            changes.push((Transactions::Notes, notes.into()));
        }

        if changes.is_empty() {
            return match self.by_id(id).await? {
                Some(tx) if current.map_or(true, |s| s == tx.status) => Ok(()),
                _ => Err(Error::NotFound(id.to_string())),
            };
        }

        let mut update = Query::update();
        update
            .table(Transactions::Table)
            .values(changes)
            .and_where(Expr::col(Transactions::Id).eq(id));
        if let Some(status) = current {
            update.and_where(Expr::col(Transactions::Status).eq(status.as_str()));
        }
        let (query, values) = update.build_sqlx(SqliteQueryBuilder);

        let result = sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let (query, values) = Query::delete()
            .from_table(Transactions::Table)
            .and_where(Expr::col(Transactions::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);

        let result = sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}
