//! Line-oriented review of pending transactions.

use std::io::{BufRead, Write};

use anyhow::{anyhow, Result};
use rusty_money::iso::Currency;
use tracing::debug;

use crate::core::{DraftField, Status, Tag, TagKind};
use crate::display::print_card;
use crate::queue::{self, Opened, ReviewQueue, Step};
use crate::settings::Settings;
use crate::store::{SqliteStore, TransactionStore};
use crate::tags::by_usage;
use crate::txn::parse_date;

const HELP: &str = "\
a              approve (needs category and payment)
r              reject
c <name|n>     set category
p <name|n>     set payment method
m <text>       set merchant
$ <amount>     set amount
n <text>       set notes
d <date>       set date (YYYY-MM-DD)
<dx>           drag the card by dx columns, right approves and left rejects
q              quit";

#[derive(Debug, PartialEq)]
enum Command {
    Approve,
    Reject,
    Edit(DraftField),
    Drag(f64),
    Help,
    Quit,
}

/// Registries offered while tagging, most used first.
pub(crate) struct Choices {
    pub categories: Vec<Tag>,
    pub payments: Vec<Tag>,
}

impl Choices {
    /// Looks a tag up by its 1-based position or by name.
    fn pick(&self, kind: TagKind, wanted: &str) -> Result<String> {
        let tags = match kind {
            TagKind::Category => &self.categories,
            TagKind::PaymentMethod => &self.payments,
        };
        let found = match wanted.parse::<usize>() {
            Ok(n) if n >= 1 => tags.get(n - 1),
            _ => Tag::find(tags, wanted),
        };
        found
            .map(|t| t.name.clone())
            .ok_or_else(|| anyhow!("no {} matches {}", kind.as_str().replace('_', " "), wanted))
    }
}

fn parse_command(line: &str, choices: &Choices) -> Result<Command> {
    let line = line.trim();
    let (head, rest) = match line.split_once(' ') {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let command = match head {
        "a" | "approve" => Command::Approve,
        "r" | "reject" => Command::Reject,
        "q" | "quit" => Command::Quit,
        "?" | "h" | "help" => Command::Help,
        "c" => Command::Edit(DraftField::Category(choices.pick(TagKind::Category, rest)?)),
        "p" => Command::Edit(DraftField::PaymentMethod(
            choices.pick(TagKind::PaymentMethod, rest)?,
        )),
        "m" => Command::Edit(DraftField::Merchant(rest.to_string())),
        "$" => Command::Edit(DraftField::Amount(rest.to_string())),
        "n" => Command::Edit(DraftField::Notes(rest.to_string())),
        "d" => Command::Edit(DraftField::Date(parse_date(rest)?)),
        other => match other.parse::<f64>() {
            Ok(dx) if rest.is_empty() => Command::Drag(dx),
            _ => return Err(anyhow!("unknown command {}, ? for help", line)),
        },
    };
    Ok(command)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    pub approved: usize,
    pub rejected: usize,
    pub left: usize,
}

/// Drives `queue` from `input` until it is finished, the user quits, or the
/// input ends.
pub(crate) async fn session<S, R, W>(
    queue: &mut ReviewQueue<S>,
    choices: &Choices,
    currency: &Currency,
    input: R,
    mut out: W,
) -> Result<Summary>
where
    S: TransactionStore,
    R: BufRead,
    W: Write,
{
    if queue.open().await? == Opened::Empty {
        writeln!(out, "Nothing to review.")?;
        return Ok(Summary::default());
    }

    let mut lines = input.lines();
    while let (Some(tx), Some(draft)) = (queue.current(), queue.draft()) {
        writeln!(out)?;
        print_card(&mut out, (queue.cursor(), queue.len()), tx, draft, currency)?;
        if !queue.can_approve() {
            writeln!(out, "(tag a category and payment method to approve)")?;
        }
        write!(out, "> ")?;
        out.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let command = match parse_command(&line, choices) {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };
        debug!("review command {:?}", command);

        let decided = match command {
            Command::Quit => break,
            Command::Help => {
                writeln!(out, "{}", HELP)?;
                continue;
            }
            Command::Edit(field) => {
                queue.edit_draft(field)?;
                continue;
            }
            Command::Approve => queue.approve().await.map(Some),
            Command::Reject => queue.reject().await.map(Some),
            Command::Drag(dx) => queue.decide(dx).await,
        };

        match decided {
            Ok(Some(Step::Finished)) => break,
            Ok(Some(Step::Next)) => {}
            Ok(None) => writeln!(out, "(not far enough, card returned)")?,
            Err(queue::Error::Finished) => break,
            Err(e) => writeln!(out, "{}", e)?,
        }
    }

    let summary = Summary {
        approved: count(queue, Status::Completed),
        rejected: count(queue, Status::Rejected),
        left: queue.len().saturating_sub(queue.cursor()),
    };
    writeln!(
        out,
        "\n{} approved, {} rejected, {} still pending",
        summary.approved, summary.rejected, summary.left
    )?;
    Ok(summary)
}

fn count<S: TransactionStore>(queue: &ReviewQueue<S>, status: Status) -> usize {
    queue.decided().iter().filter(|t| t.status == status).count()
}

pub(crate) async fn run(store: &SqliteStore, settings: &Settings) -> Result<()> {
    let currency = settings.currency()?;
    let choices = Choices {
        categories: by_usage(store, TagKind::Category).await?,
        payments: by_usage(store, TagKind::PaymentMethod).await?,
    };

    let mut queue = ReviewQueue::new(store.clone(), currency, settings.swipe());
    let stdin = std::io::stdin();
    session(&mut queue, &choices, currency, stdin.lock(), std::io::stdout()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rusty_money::iso;

    use crate::core::{Kind, NewTransaction};
    use crate::store::tests::test_store;
    use crate::swipe::SwipeConfig;

    use super::*;

    fn pending(merchant: &str) -> NewTransaction {
        NewTransaction {
            amount: "20.00".into(),
            merchant: merchant.into(),
            category: None,
            payment_method: None,
            kind: Kind::Expense,
            status: Status::Pending,
            date: Utc::now(),
            notes: None,
            sender: None,
        }
    }

    async fn choices(store: &SqliteStore) -> Choices {
        Choices {
            categories: by_usage(store, TagKind::Category).await.unwrap(),
            payments: by_usage(store, TagKind::PaymentMethod).await.unwrap(),
        }
    }

    #[test]
    fn commands_parse() {
        let choices = Choices {
            categories: vec![Tag::new("Food", "i", "#000000"), Tag::new("Travel", "i", "#000000")],
            payments: vec![Tag::new("Cash", "i", "#000000")],
        };

        assert_eq!(parse_command("a", &choices).unwrap(), Command::Approve);
        assert_eq!(
            parse_command("c 2", &choices).unwrap(),
            Command::Edit(DraftField::Category("Travel".into()))
        );
        assert_eq!(
            parse_command("p cash", &choices).unwrap(),
            Command::Edit(DraftField::PaymentMethod("Cash".into()))
        );
        assert_eq!(parse_command("-30.5", &choices).unwrap(), Command::Drag(-30.5));
        assert!(parse_command("c Fuel", &choices).is_err());
        assert!(parse_command("zzz", &choices).is_err());
    }

    #[tokio::test]
    async fn session_decides_cards_from_input() {
        let store = test_store().await;
        let first = store.create(pending("Corner Cafe")).await.unwrap();
        let second = store.create(pending("Fuel Stop")).await.unwrap();
        let choices = choices(&store).await;

        let mut queue = ReviewQueue::new(store.clone(), iso::USD, SwipeConfig::default());
        // Approval is refused until both tags are set.
        let input = "a\nc food\np Card\nn lunch\na\n-40\n";
        let mut out = vec![];
        let summary = session(&mut queue, &choices, iso::USD, input.as_bytes(), &mut out)
            .await
            .unwrap();

        assert_eq!(summary, Summary { approved: 1, rejected: 1, left: 0 });

        let first = store.get(&first.id).await.unwrap().unwrap();
        assert_eq!(first.status, Status::Completed);
        assert_eq!(first.category.as_deref(), Some("Food"));
        assert_eq!(first.payment_method.as_deref(), Some("Card"));
        assert_eq!(first.notes.as_deref(), Some("lunch"));

        let second = store.get(&second.id).await.unwrap().unwrap();
        assert_eq!(second.status, Status::Rejected);

        let transcript = String::from_utf8(out).unwrap();
        assert!(transcript.contains("a category is required"));
    }

    #[tokio::test]
    async fn quitting_leaves_the_rest_pending() {
        let store = test_store().await;
        store.create(pending("A")).await.unwrap();
        store.create(pending("B")).await.unwrap();
        let choices = choices(&store).await;

        let mut queue = ReviewQueue::new(store.clone(), iso::USD, SwipeConfig::default());
        let summary = session(&mut queue, &choices, iso::USD, "r\n5\nq\n".as_bytes(), vec![])
            .await
            .unwrap();

        assert_eq!(summary, Summary { approved: 0, rejected: 1, left: 1 });
        assert_eq!(store.list(Some(Status::Pending)).await.unwrap().len(), 1);
    }
}
