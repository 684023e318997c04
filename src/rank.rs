use std::collections::HashMap;

use crate::core::{Status, Tag, TagKind, Transaction};

pub const TOP_MERCHANTS: usize = 5;

/// Most frequent merchants across `txs`, ties broken by first appearance.
pub fn top_merchants(txs: &[Transaction], limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = vec![];
    let mut index: HashMap<&str, usize> = HashMap::new();

    for tx in txs {
        match index.get(tx.merchant.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(tx.merchant.as_str(), counts.len());
                counts.push((tx.merchant.clone(), 1));
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

/// Orders registry entries by how often completed transactions use them.
/// Unused entries keep their registry order after the used ones.
pub fn sort_by_usage(tags: &[Tag], kind: TagKind, txs: &[Transaction]) -> Vec<Tag> {
    let mut usage: HashMap<&str, usize> = HashMap::new();
    for tx in txs.iter().filter(|t| t.status == Status::Completed) {
        let key = match kind {
            TagKind::Category => tx.category.as_deref(),
            TagKind::PaymentMethod => Some(tx.payment_method_or_default()),
        };
        if let Some(key) = key {
            *usage.entry(key).or_default() += 1;
        }
    }

    let mut sorted = tags.to_vec();
    sorted.sort_by_key(|t| std::cmp::Reverse(usage.get(t.name.as_str()).copied().unwrap_or(0)));
    sorted
}
