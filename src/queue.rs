//! Review of auto-ingested transactions, one card at a time.
//!
//! [`ReviewQueue`] snapshots the pending transactions when opened and walks
//! them with a cursor. Each decision is written to the store before the next
//! card's draft is seeded; a failed write leaves the cursor and draft where
//! they were so the user can retry.

use std::collections::HashSet;

use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::{Draft, DraftField, Invalid, Patch, Status, Transaction};
use crate::store::{self, TransactionStore};
use crate::swipe::{Swipe, SwipeConfig};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Invalid(#[from] Invalid),
    #[error("nothing left to review")]
    Finished,
    #[error("transaction {0} is no longer pending, the queue was reloaded")]
    Vanished(String),
    #[error("could not save the decision: {0}")]
    Store(#[from] store::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opened {
    /// No pending transactions; the review surface should close.
    Empty,
    Ready { pending: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Another card is up.
    Next,
    /// The last card was decided.
    Finished,
}

pub struct ReviewQueue<S> {
    store: S,
    currency: &'static Currency,
    swipe: SwipeConfig,
    queue: Vec<Transaction>,
    cursor: usize,
    draft: Option<Draft>,
}

impl<S: TransactionStore> ReviewQueue<S> {
    pub fn new(store: S, currency: &'static Currency, swipe: SwipeConfig) -> Self {
        Self {
            store,
            currency,
            swipe,
            queue: vec![],
            cursor: 0,
            draft: None,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn open(&mut self) -> Result<Opened, store::Error> {
        self.queue = self.store.list(Some(Status::Pending)).await?;
        self.cursor = 0;
        self.draft = self.queue.first().map(Draft::from);

        info!("review opened with {} pending", self.queue.len());
        if self.queue.is_empty() {
            return Ok(Opened::Empty);
        }
        Ok(Opened::Ready {
            pending: self.queue.len(),
        })
    }

    pub fn current(&self) -> Option<&Transaction> {
        self.queue.get(self.cursor)
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    /// Transactions decided so far in this session.
    pub fn decided(&self) -> &[Transaction] {
        &self.queue[..self.cursor.min(self.queue.len())]
    }

    /// Whether the approve control is enabled for the current draft.
    pub fn can_approve(&self) -> bool {
        self.draft
            .as_ref()
            .map_or(false, |d| d.approval(self.currency).is_ok())
    }

    /// Local edit; nothing reaches the store until the next approval.
    pub fn edit_draft(&mut self, field: DraftField) -> Result<(), Error> {
        let draft = self.draft.as_mut().ok_or(Error::Finished)?;
        draft.set(field);
        Ok(())
    }

    pub async fn approve(&mut self) -> Result<Step, Error> {
        let draft = self.draft.as_ref().ok_or(Error::Finished)?;
        let patch = draft.approval(self.currency)?;
        self.commit(patch).await
    }

    pub async fn reject(&mut self) -> Result<Step, Error> {
        self.commit(Patch::status(Status::Rejected)).await
    }

    /// Evaluates a finished drag. `Ok(None)` means the card returns to rest.
    pub async fn decide(&mut self, dx: f64) -> Result<Option<Step>, Error> {
        match self.swipe.classify(dx, self.can_approve()) {
            Swipe::Approve => self.approve().await.map(Some),
            Swipe::Reject => self.reject().await.map(Some),
            Swipe::None => Ok(None),
        }
    }

    /// Reloads pending transactions behind the decided prefix and clamps the
    /// cursor. The draft survives when the current card is unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<(), store::Error> {
        let fresh = self.store.list(Some(Status::Pending)).await?;
        let before = self.current().map(|t| t.id.clone());

        self.queue.truncate(self.cursor);
        let decided: HashSet<String> = self.queue.iter().map(|t| t.id.clone()).collect();
        self.queue
            .extend(fresh.into_iter().filter(|t| !decided.contains(&t.id)));
        self.cursor = self.cursor.min(self.queue.len());

        let after = self.current().map(|t| t.id.clone());
        if before != after {
            self.draft = self.current().map(Draft::from);
        }
        debug!("queue reloaded, {} of {} decided", self.cursor, self.queue.len());

        Ok(())
    }

    async fn commit(&mut self, patch: Patch) -> Result<Step, Error> {
        let id = match self.current() {
            Some(tx) => tx.id.clone(),
            None => return Err(Error::Finished),
        };

        // Another session may have decided or removed the card.
        match self.store.update_if(&id, Status::Pending, &patch).await {
            Ok(()) => {}
            Err(store::Error::NotFound(_)) => {
                warn!("transaction {} is no longer pending", id);
                self.refresh().await?;
                return Err(Error::Vanished(id));
            }
            Err(e) => {
                warn!("decision for {} failed: {}", id, e);
                return Err(e.into());
            }
        }

        if let Some(tx) = self.queue.get_mut(self.cursor) {
            patch.apply_to(tx);
        }
        info!("transaction {} marked {:?}", id, patch.status);
        Ok(self.advance())
    }

    fn advance(&mut self) -> Step {
        self.cursor += 1;
        self.draft = self.current().map(Draft::from);
        if self.is_finished() {
            Step::Finished
        } else {
            Step::Next
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rusty_money::iso;

    use crate::core::{Kind, NewTransaction};
    use crate::store::Criteria;

    use super::*;

    #[derive(Default)]
    struct Inner {
        txs: Vec<Transaction>,
        updates: Vec<(String, Patch)>,
        fail_updates: bool,
    }

    #[derive(Clone, Default)]
    struct FakeStore(Arc<Mutex<Inner>>);

    impl FakeStore {
        fn with_pending(merchants: &[&str]) -> Self {
            let store = FakeStore::default();
            {
                let mut inner = store.0.lock().unwrap();
                for (i, merchant) in merchants.iter().enumerate() {
                    inner.txs.push(Transaction {
                        id: format!("T{}", i + 1),
                        amount: "20.00".into(),
                        merchant: merchant.to_string(),
                        category: None,
                        payment_method: None,
                        kind: Kind::Expense,
                        status: Status::Pending,
                        date: Utc.with_ymd_and_hms(2022, 10, 1, 8, 0, 0).unwrap(),
                        notes: None,
                        sender: Some("alerts@bank.example".into()),
                    });
                }
            }
            store
        }

        fn updates(&self) -> Vec<(String, Patch)> {
            self.0.lock().unwrap().updates.clone()
        }

        fn fail_updates(&self, fail: bool) {
            self.0.lock().unwrap().fail_updates = fail;
        }

        fn remove(&self, id: &str) {
            self.0.lock().unwrap().txs.retain(|t| t.id != id);
        }

        fn set_status(&self, id: &str, status: Status) {
            let mut inner = self.0.lock().unwrap();
            if let Some(tx) = inner.txs.iter_mut().find(|t| t.id == id) {
                tx.status = status;
            }
        }

        fn set_notes(&self, id: &str, notes: &str) {
            let mut inner = self.0.lock().unwrap();
            if let Some(tx) = inner.txs.iter_mut().find(|t| t.id == id) {
                tx.notes = Some(notes.to_string());
            }
        }

        fn notes_of(&self, id: &str) -> Option<String> {
            let inner = self.0.lock().unwrap();
            inner.txs.iter().find(|t| t.id == id).and_then(|t| t.notes.clone())
        }

        fn write(&self, id: &str, current: Option<Status>, patch: &Patch) -> store::Result<()> {
            let mut inner = self.0.lock().unwrap();
            if inner.fail_updates {
                return Err(store::Error::Unknown(anyhow!("database is locked")));
            }
            let tx = inner
                .txs
                .iter_mut()
                .find(|t| t.id == id && current.map_or(true, |s| s == t.status))
                .ok_or_else(|| store::Error::NotFound(id.to_string()))?;
            patch.apply_to(tx);
            inner.updates.push((id.to_string(), patch.clone()));
            Ok(())
        }

        fn status_of(&self, id: &str) -> Option<Status> {
            let inner = self.0.lock().unwrap();
            inner.txs.iter().find(|t| t.id == id).map(|t| t.status)
        }
    }

    #[async_trait]
    impl TransactionStore for FakeStore {
        async fn list(&self, status: Option<Status>) -> store::Result<Vec<Transaction>> {
            let inner = self.0.lock().unwrap();
            Ok(inner
                .txs
                .iter()
                .filter(|t| status.map_or(true, |s| t.status == s))
                .cloned()
                .collect())
        }

        async fn query(&self, criteria: &Criteria) -> store::Result<Vec<Transaction>> {
            self.list(criteria.status).await
        }

        async fn get(&self, id: &str) -> store::Result<Option<Transaction>> {
            let inner = self.0.lock().unwrap();
            Ok(inner.txs.iter().find(|t| t.id == id).cloned())
        }

        async fn create(&self, tx: NewTransaction) -> store::Result<Transaction> {
            let mut inner = self.0.lock().unwrap();
            let created = Transaction {
                id: format!("T{}", inner.txs.len() + 1),
                amount: tx.amount,
                merchant: tx.merchant,
                category: tx.category,
                payment_method: tx.payment_method,
                kind: tx.kind,
                status: tx.status,
                date: tx.date,
                notes: tx.notes,
                sender: tx.sender,
            };
            inner.txs.push(created.clone());
            Ok(created)
        }

        async fn update(&self, id: &str, patch: &Patch) -> store::Result<()> {
            self.write(id, None, patch)
        }

        async fn update_if(&self, id: &str, current: Status, patch: &Patch) -> store::Result<()> {
            self.write(id, Some(current), patch)
        }

        async fn delete(&self, id: &str) -> store::Result<()> {
            let mut inner = self.0.lock().unwrap();
            let before = inner.txs.len();
            inner.txs.retain(|t| t.id != id);
            if inner.txs.len() == before {
                return Err(store::Error::NotFound(id.to_string()));
            }
            Ok(())
        }
    }

    fn review(store: &FakeStore) -> ReviewQueue<FakeStore> {
        let swipe = SwipeConfig {
            viewport_width: 400.0,
            threshold: 0.25,
        };
        ReviewQueue::new(store.clone(), iso::USD, swipe)
    }

    fn tag_draft(queue: &mut ReviewQueue<FakeStore>) {
        queue
            .edit_draft(DraftField::Category("Food".into()))
            .unwrap();
        queue
            .edit_draft(DraftField::PaymentMethod("Cash".into()))
            .unwrap();
    }

    #[tokio::test]
    async fn empty_store_has_nothing_to_review() {
        let store = FakeStore::default();
        let mut queue = review(&store);

        assert_eq!(queue.open().await.unwrap(), Opened::Empty);
        assert!(queue.is_finished());
        assert!(queue.draft().is_none());
        assert!(matches!(queue.reject().await, Err(Error::Finished)));
    }

    #[tokio::test]
    async fn approve_then_reject_ends_session() {
        let store = FakeStore::with_pending(&["Corner Cafe", "Fuel Stop"]);
        let mut queue = review(&store);
        assert_eq!(queue.open().await.unwrap(), Opened::Ready { pending: 2 });
        assert_eq!(queue.draft().unwrap().merchant, "Corner Cafe");

        tag_draft(&mut queue);
        assert_eq!(queue.approve().await.unwrap(), Step::Next);
        assert_eq!(queue.cursor(), 1);
        assert_eq!(queue.draft().unwrap().merchant, "Fuel Stop");

        assert_eq!(queue.reject().await.unwrap(), Step::Finished);
        assert_eq!(queue.cursor(), 2);
        assert!(queue.is_finished());

        let updates = store.updates();
        assert_eq!(updates.len(), 2);
        let (id, patch) = &updates[0];
        assert_eq!(id, "T1");
        assert_eq!(patch.status, Some(Status::Completed));
        assert_eq!(patch.category.as_deref(), Some("Food"));
        assert_eq!(patch.payment_method.as_deref(), Some("Cash"));
        assert_eq!(patch.merchant.as_deref(), Some("Corner Cafe"));
        assert_eq!(updates[1], ("T2".to_string(), Patch::status(Status::Rejected)));

        assert_eq!(store.status_of("T1"), Some(Status::Completed));
        assert_eq!(store.status_of("T2"), Some(Status::Rejected));
    }

    #[tokio::test]
    async fn approve_without_tags_is_a_no_op() {
        let store = FakeStore::with_pending(&["Corner Cafe"]);
        let mut queue = review(&store);
        queue.open().await.unwrap();
        assert!(!queue.can_approve());

        let result = queue.approve().await;
        assert!(matches!(result, Err(Error::Invalid(Invalid::MissingCategory))));

        queue
            .edit_draft(DraftField::Category("Food".into()))
            .unwrap();
        let result = queue.approve().await;
        assert!(matches!(
            result,
            Err(Error::Invalid(Invalid::MissingPaymentMethod))
        ));

        assert!(store.updates().is_empty());
        assert_eq!(queue.cursor(), 0);
        assert_eq!(queue.draft().unwrap().category, "Food");
    }

    #[tokio::test]
    async fn reject_needs_no_tags() {
        let store = FakeStore::with_pending(&["Corner Cafe"]);
        let mut queue = review(&store);
        queue.open().await.unwrap();

        assert_eq!(queue.reject().await.unwrap(), Step::Finished);
        assert_eq!(store.updates()[0].1, Patch::status(Status::Rejected));
    }

    #[tokio::test]
    async fn cursor_advances_once_per_decision() {
        let merchants = ["A", "B", "C", "D", "E"];
        let store = FakeStore::with_pending(&merchants);
        let mut queue = review(&store);
        queue.open().await.unwrap();

        for n in 0..merchants.len() {
            assert_eq!(queue.cursor(), n);
            assert!(!queue.is_finished());

            // A blocked approval in between never moves the cursor.
            let _ = queue.approve().await;
            assert_eq!(queue.cursor(), n);

            let step = if n % 2 == 0 {
                tag_draft(&mut queue);
                queue.approve().await.unwrap()
            } else {
                queue.reject().await.unwrap()
            };

            let expected = if n + 1 == merchants.len() {
                Step::Finished
            } else {
                Step::Next
            };
            assert_eq!(step, expected);
        }

        assert_eq!(queue.cursor(), merchants.len());
        assert!(queue.is_finished());
        assert_eq!(queue.decided().len(), merchants.len());
        assert_eq!(store.updates().len(), merchants.len());
    }

    #[tokio::test]
    async fn failed_write_keeps_card_and_draft() {
        let store = FakeStore::with_pending(&["Corner Cafe", "Fuel Stop"]);
        let mut queue = review(&store);
        queue.open().await.unwrap();
        tag_draft(&mut queue);
        queue
            .edit_draft(DraftField::Notes("team lunch".into()))
            .unwrap();

        store.fail_updates(true);
        assert!(matches!(queue.approve().await, Err(Error::Store(_))));
        assert_eq!(queue.cursor(), 0);
        assert_eq!(queue.draft().unwrap().notes, "team lunch");

        store.fail_updates(false);
        assert_eq!(queue.approve().await.unwrap(), Step::Next);
        assert_eq!(store.updates()[0].1.notes.as_deref(), Some("team lunch"));
    }

    #[tokio::test]
    async fn vanished_card_reloads_queue() {
        let store = FakeStore::with_pending(&["A", "B", "C"]);
        let mut queue = review(&store);
        queue.open().await.unwrap();
        queue.reject().await.unwrap();

        store.remove("T2");
        let result = queue.reject().await;
        assert!(matches!(result, Err(Error::Vanished(id)) if id == "T2"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.cursor(), 1);
        assert_eq!(queue.current().unwrap().id, "T3");
        assert_eq!(queue.draft().unwrap().merchant, "C");

        assert_eq!(queue.reject().await.unwrap(), Step::Finished);
    }

    #[tokio::test]
    async fn card_decided_elsewhere_is_not_overwritten() {
        let store = FakeStore::with_pending(&["A", "B"]);
        let mut queue = review(&store);
        queue.open().await.unwrap();
        store.set_status("T1", Status::Rejected);

        tag_draft(&mut queue);
        let result = queue.approve().await;
        assert!(matches!(result, Err(Error::Vanished(id)) if id == "T1"));

        assert_eq!(store.status_of("T1"), Some(Status::Rejected));
        assert!(store.updates().is_empty());
        assert_eq!(queue.cursor(), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.current().unwrap().id, "T2");
        assert_eq!(queue.draft().unwrap().merchant, "B");
    }

    #[tokio::test]
    async fn clearing_notes_reaches_the_store() {
        let store = FakeStore::with_pending(&["Corner Cafe"]);
        store.set_notes("T1", "parsed from sms");
        let mut queue = review(&store);
        queue.open().await.unwrap();
        assert_eq!(queue.draft().unwrap().notes, "parsed from sms");

        tag_draft(&mut queue);
        queue.edit_draft(DraftField::Notes(String::new())).unwrap();
        assert_eq!(queue.approve().await.unwrap(), Step::Finished);

        assert_eq!(store.notes_of("T1"), None);
        assert_eq!(queue.decided()[0].notes, None);
    }

    #[tokio::test]
    async fn refresh_picks_up_new_pending_items() {
        let store = FakeStore::with_pending(&["A"]);
        let mut queue = review(&store);
        queue.open().await.unwrap();
        queue
            .edit_draft(DraftField::Notes("kept".into()))
            .unwrap();

        store
            .create(NewTransaction {
                amount: "5.00".into(),
                merchant: "B".into(),
                category: None,
                payment_method: None,
                kind: Kind::Expense,
                status: Status::Pending,
                date: Utc::now(),
                notes: None,
                sender: None,
            })
            .await
            .unwrap();
        queue.refresh().await.unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.draft().unwrap().notes, "kept");
    }

    #[tokio::test]
    async fn drags_decide_past_threshold() {
        let store = FakeStore::with_pending(&["A", "B"]);
        let mut queue = review(&store);
        queue.open().await.unwrap();

        // Untagged cards cannot be dragged right.
        assert_eq!(queue.decide(300.0).await.unwrap(), None);
        assert_eq!(queue.decide(-50.0).await.unwrap(), None);
        assert!(store.updates().is_empty());

        tag_draft(&mut queue);
        assert_eq!(queue.decide(150.0).await.unwrap(), Some(Step::Next));
        assert_eq!(queue.decide(-150.0).await.unwrap(), Some(Step::Finished));

        let statuses: Vec<_> = store.updates().into_iter().map(|(_, p)| p.status).collect();
        assert_eq!(statuses, vec![Some(Status::Completed), Some(Status::Rejected)]);
    }
}
