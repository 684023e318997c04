use std::io::{prelude::*, BufReader, ErrorKind};

use anyhow::{anyhow, Context, Result};
use chrono::prelude::*;
use clap::ArgMatches;
use rusty_money::iso::Currency;
use tracing::{info, warn};

use crate::core::{truncate_merchant, Kind, NewTransaction, Patch, Status, Tag, TagKind};
use crate::display::{print_merchants, print_transactions};
use crate::filter::{FilterSelection, Period};
use crate::rank::{top_merchants, TOP_MERCHANTS};
use crate::settings::Settings;
use crate::store::{SqliteStore, TagStore, TransactionStore};

/// Accepts `YYYY-MM-DD` as local midnight or a full RFC 3339 timestamp.
pub(crate) fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Ok(date.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("{} is not a date, expected YYYY-MM-DD", s))?;
    let midnight = day.and_hms_opt(0, 0, 0).ok_or_else(|| anyhow!("invalid date {}", s))?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|d| d.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("{} does not exist in the local time zone", s))
}

/// Canonical registry name for `name`, matched case-insensitively.
pub(crate) async fn resolve_tag<S: TagStore>(store: &S, kind: TagKind, name: &str) -> Result<String> {
    let tags = store.tags(kind).await?;
    Tag::find(&tags, name)
        .map(|t| t.name.clone())
        .ok_or_else(|| anyhow!("no {} named {}", kind.as_str().replace('_', " "), name))
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Ingested {
    pub created: usize,
    pub skipped: usize,
}

/// Creates a pending transaction per JSON line. Lines that do not parse or
/// validate are logged and skipped.
#[tracing::instrument(skip(reader, store, currency))]
pub(crate) async fn ingest_from<R: BufRead, S: TransactionStore>(
    reader: R,
    store: &S,
    currency: &Currency,
) -> Result<Ingested> {
    let mut summary = Ingested::default();

    for (n, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            // The bytes of a non UTF-8 line are consumed, so reading goes on.
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("skipping line {}: {}", n + 1, e);
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<NewTransaction>(&line)
            .map_err(anyhow::Error::from)
            .and_then(|mut tx| {
                tx.status = Status::Pending;
                tx.date = tx.date.trunc_subsecs(0);
                Ok(tx.validate(currency)?)
            });
        match parsed {
            Ok(tx) => {
                let created = store.create(tx).await?;
                info!("ingested {} from {}", created.id, created.merchant);
                summary.created += 1;
            }
            Err(e) => {
                warn!("skipping line {}: {}", n + 1, e);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}

pub(crate) async fn ingest(matches: &ArgMatches, store: &SqliteStore, settings: &Settings) -> Result<()> {
    let currency = settings.currency()?;
    let summary = match matches.value_of("FILE") {
        Some(path) => {
            let fd = std::fs::File::open(path).with_context(|| format!("could not open {}", path))?;
            ingest_from(BufReader::new(fd), store, currency).await?
        }
        None => ingest_from(std::io::stdin().lock(), store, currency).await?,
    };

    println!(
        "{} transactions awaiting review, {} lines skipped",
        summary.created, summary.skipped
    );
    Ok(())
}

#[tracing::instrument(skip_all)]
pub(crate) async fn add(matches: &ArgMatches, store: &SqliteStore, settings: &Settings) -> Result<()> {
    let currency = settings.currency()?;
    let category = match matches.value_of("category") {
        Some(name) => Some(resolve_tag(store, TagKind::Category, name).await?),
        None => None,
    };
    let payment_method = match matches.value_of("payment") {
        Some(name) => Some(resolve_tag(store, TagKind::PaymentMethod, name).await?),
        None => None,
    };
    let date = match matches.value_of("date") {
        Some(d) => parse_date(d)?,
        None => Utc::now().trunc_subsecs(0),
    };

    let tx = NewTransaction {
        amount: matches.value_of("amount").unwrap_or_default().to_string(),
        merchant: matches.value_of("merchant").unwrap_or_default().to_string(),
        category,
        payment_method,
        kind: if matches.is_present("income") {
            Kind::Income
        } else {
            Kind::Expense
        },
        status: Status::Completed,
        date,
        notes: matches.value_of("notes").map(String::from),
        sender: None,
    }
    .validate(currency)?;

    let created = store.create(tx).await?;
    println!("Added {}", created.id);
    Ok(())
}

fn selection_from(matches: &ArgMatches) -> Result<FilterSelection> {
    let mut selection = FilterSelection::new();
    if let Some(period) = matches.value_of("period") {
        selection.toggle_period(Period::parse(period));
    }

    match (matches.value_of("from"), matches.value_of("until")) {
        (Some(from), Some(until)) => {
            let start = NaiveDate::parse_from_str(from, "%Y-%m-%d")?;
            let end = NaiveDate::parse_from_str(until, "%Y-%m-%d")?;
            selection.toggle_period(Period::CustomRange);
            selection.set_custom_range(start, end);
        }
        (None, None) => {}
        _ => return Err(anyhow!("--from and --until must be passed together")),
    }

    for name in matches.values_of("category").into_iter().flatten() {
        selection.toggle_category(name);
    }
    for name in matches.values_of("payment").into_iter().flatten() {
        selection.toggle_payment(name);
    }
    for name in matches.values_of("merchant").into_iter().flatten() {
        selection.toggle_merchant(&truncate_merchant(name));
    }

    Ok(selection)
}

#[tracing::instrument(skip_all)]
pub(crate) async fn list(matches: &ArgMatches, store: &SqliteStore, settings: &Settings) -> Result<()> {
    let currency = settings.currency()?;
    let status = match matches.value_of("status").unwrap_or("completed") {
        "all" => None,
        s => Some(s.parse::<Status>()?),
    };

    let descriptor = selection_from(matches)?.apply()?;
    let criteria = descriptor.criteria(&Local::now(), status);
    let txs = store.query(&criteria).await?;

    print_transactions(std::io::stdout(), &txs, currency)?;
    println!(
        "\n{} transactions, {}, {} filters active",
        txs.len(),
        descriptor.period,
        descriptor.count
    );
    Ok(())
}

#[tracing::instrument(skip_all)]
pub(crate) async fn edit(matches: &ArgMatches, store: &SqliteStore, settings: &Settings) -> Result<()> {
    let currency = settings.currency()?;
    let id = matches.value_of("ID").unwrap_or_default();
    let current = store
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("no transaction with id {}", id))?;

    let mut patch = Patch {
        amount: matches.value_of("amount").map(String::from),
        merchant: matches.value_of("merchant").map(String::from),
        notes: matches.value_of("notes").map(String::from),
        ..Default::default()
    };
    if let Some(name) = matches.value_of("category") {
        patch.category = Some(resolve_tag(store, TagKind::Category, name).await?);
    }
    if let Some(name) = matches.value_of("payment") {
        patch.payment_method = Some(resolve_tag(store, TagKind::PaymentMethod, name).await?);
    }
    if let Some(kind) = matches.value_of("kind") {
        patch.kind = Some(kind.parse()?);
    }
    if let Some(status) = matches.value_of("status") {
        patch.status = Some(status.parse()?);
    }
    if let Some(date) = matches.value_of("date") {
        patch.date = Some(parse_date(date)?);
    }

    if patch.is_empty() {
        return Err(anyhow!("nothing to change"));
    }
    let patch = patch.validate(&current, currency)?;
    store.update(id, &patch).await?;

    println!("Updated {}", id);
    Ok(())
}

#[tracing::instrument(skip_all)]
pub(crate) async fn delete(matches: &ArgMatches, store: &SqliteStore) -> Result<()> {
    let id = matches.value_of("ID").unwrap_or_default();
    store.delete(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

pub(crate) async fn merchants(store: &SqliteStore) -> Result<()> {
    let txs = store.list(None).await?;
    print_merchants(std::io::stdout(), &top_merchants(&txs, TOP_MERCHANTS))?;
    Ok(())
}
