use anyhow::{anyhow, Result};
use clap::ArgMatches;

use crate::core::{Tag, TagKind};
use crate::display::print_tags;
use crate::rank::sort_by_usage;
use crate::store::{self, SqliteStore, TagStore, TransactionStore};

const DEFAULT_ICON: &str = "pricetag";
const DEFAULT_COLOR: &str = "#B0B0B0";

/// Registry entries ordered by completed-transaction usage.
pub(crate) async fn by_usage<S: TagStore + TransactionStore>(store: &S, kind: TagKind) -> store::Result<Vec<Tag>> {
    let tags = store.tags(kind).await?;
    let txs = store.list(None).await?;
    Ok(sort_by_usage(&tags, kind, &txs))
}

#[tracing::instrument(skip(store))]
pub(crate) async fn add<S: TagStore>(store: &S, kind: TagKind, name: &str, icon: &str, color: &str) -> Result<Tag> {
    if name.trim().is_empty() {
        return Err(anyhow!("a name is required"));
    }

    let tag = Tag::new(name, icon, color);
    match store.save_tag(kind, &tag).await {
        Err(store::Error::AlreadyExists) => Err(anyhow!("{} already exists", tag.name)),
        result => Ok(result.map(|_| tag)?),
    }
}

pub(crate) async fn run(matches: &ArgMatches, store: &SqliteStore, kind: TagKind) -> Result<()> {
    match matches.subcommand() {
        Some(("add", add_matches)) => {
            let name = add_matches.value_of("NAME").unwrap_or_default();
            let icon = add_matches.value_of("icon").unwrap_or(DEFAULT_ICON);
            let color = add_matches.value_of("color").unwrap_or(DEFAULT_COLOR);
            let tag = add(store, kind, name, icon, color).await?;
            println!("Added {}", tag);
        }
        None => print_tags(std::io::stdout(), &by_usage(store, kind).await?)?,
        _ => unreachable!(),
    }

    Ok(())
}
