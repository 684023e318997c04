mod core;
mod display;
mod filter;
mod init;
mod lock;
mod queue;
mod rank;
mod review;
mod settings;
mod store;
mod swipe;
mod tags;
mod txn;

use std::path::Path;

use anyhow::{anyhow, Result};
use clap::{arg, ArgMatches, Command};
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::core::TagKind;
use crate::lock::AppLock;
use crate::settings::Settings;
use crate::store::SqliteStore;

static CLIENT_NAME: &str = "tally";

fn tag_command(name: &'static str, about: &'static str) -> Command<'static> {
    Command::new(name)
        .about(about)
        .subcommand(
            Command::new("add")
                .about("Adds a new entry.")
                .arg(arg!(NAME: <NAME> "Display name, unique within the list."))
                .arg(arg!(icon: --icon [ICON] "Icon identifier."))
                .arg(arg!(color: --color [COLOR] "Hex color, e.g. #FF9800.")),
        )
}

fn cli() -> Command<'static> {
    Command::new(CLIENT_NAME)
        .about("The tally utility tracks expenses, including transactions picked up \
         automatically that wait in a review queue until approved or rejected.")
        .version("0.1.0")
        .subcommand_required(true)
        .allow_external_subcommands(false)
        .arg(arg!(CONFIG: -c --config [FILE] "Sets a custom config file"))
        .arg(arg!(verbose: -v --verbose "Logs what the command is doing"))
        .arg(arg!(pin: --pin [PIN] "Unlocks the app when a PIN is set"))
        .subcommand(Command::new("init").about("Writes a starter configuration file."))
        .subcommand(Command::new("add")
            .about("Records a completed transaction.")
            .arg(arg!(amount: <AMOUNT> "Amount in the configured currency."))
            .arg(arg!(merchant: <MERCHANT> "Who was paid, at most 30 characters are kept."))
            .arg(arg!(category: --category <NAME> "Category from the category list."))
            .arg(arg!(payment: --payment <NAME> "Payment method from the payment list."))
            .arg(arg!(income: --income "Records money received instead of spent."))
            .arg(arg!(date: --date [DATE] "Day of the transaction, defaults to now."))
            .arg(arg!(notes: --notes [TEXT] "Free-form notes.")))
        .subcommand(Command::new("ingest")
            .about("Queues detected transactions for review, one JSON object per line.")
            .arg(arg!(FILE: [FILE] "Reads from stdin when omitted.")))
        .subcommand(Command::new("list")
            .about("Prints transactions matching the given filters.")
            .arg(arg!(period: -p --period [PERIOD] "Today, Yesterday, This Week, This Month, Last Month, This Year or All Time."))
            .arg(arg!(from: --from [DATE] "First day of a custom range, inclusive."))
            .arg(arg!(until: --until [DATE] "Last day of a custom range, inclusive."))
            .arg(arg!(category: --category [NAME] "Only this category, may repeat.").multiple_occurrences(true))
            .arg(arg!(payment: --payment [NAME] "Only this payment method, may repeat.").multiple_occurrences(true))
            .arg(arg!(merchant: --merchant [NAME] "Only this merchant, may repeat.").multiple_occurrences(true))
            .arg(arg!(status: --status [STATUS] "pending, completed, rejected or all, defaults to completed.")))
        .subcommand(Command::new("edit")
            .about("Changes fields of a transaction.")
            .arg(arg!(ID: <ID> "Transaction ID."))
            .arg(arg!(amount: --amount [AMOUNT] "New amount."))
            .arg(arg!(merchant: --merchant [MERCHANT] "New merchant."))
            .arg(arg!(category: --category [NAME] "New category."))
            .arg(arg!(payment: --payment [NAME] "New payment method."))
            .arg(arg!(kind: --kind [KIND] "income or expense."))
            .arg(arg!(status: --status [STATUS] "pending, completed or rejected."))
            .arg(arg!(date: --date [DATE] "New date."))
            .arg(arg!(notes: --notes [TEXT] "New notes.")))
        .subcommand(Command::new("delete")
            .about("Removes a transaction.")
            .arg(arg!(ID: <ID> "Transaction ID.")))
        .subcommand(Command::new("review")
            .about("Walks through pending transactions to approve or reject them."))
        .subcommand(tag_command("categories", "Prints categories, most used first."))
        .subcommand(tag_command("payments", "Prints payment methods, most used first."))
        .subcommand(Command::new("merchants").about("Prints the most frequent merchants."))
        .subcommand(Command::new("lock")
            .about("Manages the app PIN.")
            .subcommand_required(true)
            .subcommand(Command::new("set")
                .about("Sets or replaces the PIN, 4 to 6 digits.")
                .arg(arg!(NEW_PIN: <NEW_PIN> "The new PIN.")))
            .subcommand(Command::new("clear").about("Removes the PIN.")))
}

async fn open_store(settings: &Settings) -> Result<SqliteStore> {
    if !settings.db_file.starts_with("sqlite:") {
        if let Some(dir) = Path::new(&settings.db_file).parent() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(SqliteStore::new(&settings.db_uri()).await?)
}

async fn dispatch(matches: &ArgMatches) -> Result<()> {
    let config = matches.value_of("CONFIG");
    if let Some(("init", _)) = matches.subcommand() {
        return init::run(config).await;
    }

    let settings = Settings::new(config)?;
    let store = open_store(&settings).await?;
    AppLock::new(&store).unlock(matches.value_of("pin")).await?;

    match matches.subcommand() {
        Some(("add", m)) => txn::add(m, &store, &settings).await,
        Some(("ingest", m)) => txn::ingest(m, &store, &settings).await,
        Some(("list", m)) => txn::list(m, &store, &settings).await,
        Some(("edit", m)) => txn::edit(m, &store, &settings).await,
        Some(("delete", m)) => txn::delete(m, &store).await,
        Some(("merchants", _)) => txn::merchants(&store).await,
        Some(("review", _)) => review::run(&store, &settings).await,
        Some(("categories", m)) => tags::run(m, &store, TagKind::Category).await,
        Some(("payments", m)) => tags::run(m, &store, TagKind::PaymentMethod).await,
        Some(("lock", m)) => match m.subcommand() {
            Some(("set", set)) => {
                let lock = AppLock::new(&store);
                let replaced = lock.is_set().await?;
                lock.set(set.value_of("NEW_PIN").unwrap_or_default()).await?;
                println!("{}", if replaced { "PIN replaced" } else { "PIN set" });
                Ok(())
            }
            Some(("clear", _)) => {
                let lock = AppLock::new(&store);
                if !lock.is_set().await? {
                    println!("No PIN was set");
                    return Ok(());
                }
                lock.clear().await?;
                println!("PIN removed");
                Ok(())
            }
            _ => Err(anyhow!("unknown lock command")),
        },
        None => unreachable!("subcommand is required"),
        _ => unreachable!(),
    }
}

async fn run() -> Result<()> {
    let matches = cli().get_matches();

    if matches.is_present("verbose") {
        tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    dispatch(&matches).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        println!("{}", err);
        std::process::exit(1);
    }
}
