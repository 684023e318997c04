use std::io::Write;

use anyhow::Result;
use chrono::Local;
use rusty_money::{iso::Currency, Money};
use tabwriter::TabWriter;

use crate::core::{Draft, Kind, Tag, Transaction};

/// Renders a stored amount in `currency`, signed by transaction type.
pub fn format_amount(amount: &str, kind: Kind, currency: &Currency) -> String {
    let shown = match Money::from_str(amount, currency) {
        Ok(money) => money.to_string(),
        Err(_) => amount.to_string(),
    };
    match kind {
        Kind::Income => format!("+{}", shown),
        Kind::Expense => format!("-{}", shown),
    }
}

pub fn print_transactions<T: Write>(wr: T, txs: &[Transaction], currency: &Currency) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Date\tID\tMerchant\tAmount\tCategory\tPayment\tStatus")?;

    for tx in txs {
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            tx.date.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            tx.id,
            tx.merchant,
            format_amount(&tx.amount, tx.kind, currency),
            tx.category.as_deref().unwrap_or("-"),
            tx.payment_method_or_default(),
            tx.status,
        )?;
    }

    tw.flush()?;
    Ok(())
}

pub fn print_tags<T: Write>(wr: T, tags: &[Tag]) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Name\tIcon\tColor")?;
    for tag in tags {
        writeln!(tw, "{}\t{}\t{}", tag.name, tag.icon, tag.color)?;
    }

    tw.flush()?;
    Ok(())
}

pub fn print_merchants<T: Write>(wr: T, merchants: &[(String, usize)]) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Merchant\tTransactions")?;
    for (merchant, count) in merchants {
        writeln!(tw, "{}\t{}", merchant, count)?;
    }

    tw.flush()?;
    Ok(())
}

/// The card under review, showing the draft rather than the stored values.
pub fn print_card<T: Write>(
    wr: T,
    position: (usize, usize),
    tx: &Transaction,
    draft: &Draft,
    currency: &Currency,
) -> Result<()> {
    let blank = |s: &str| if s.trim().is_empty() { "-".to_string() } else { s.to_string() };

    let mut tw = TabWriter::new(wr);
    writeln!(tw, "[{}/{}]\t{}", position.0 + 1, position.1, tx.id)?;
    writeln!(tw, "Merchant\t{}", draft.merchant)?;
    writeln!(tw, "Amount\t{}", format_amount(&draft.amount, tx.kind, currency))?;
    writeln!(tw, "Date\t{}", draft.date.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
    writeln!(tw, "Category\t{}", blank(&draft.category))?;
    writeln!(tw, "Payment\t{}", blank(&draft.payment_method))?;
    writeln!(tw, "Notes\t{}", blank(&draft.notes))?;
    if let Some(sender) = &tx.sender {
        writeln!(tw, "From\t{}", sender)?;
    }

    tw.flush()?;
    Ok(())
}
