use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusty_money::{iso::Currency, Money};
use serde::{Deserialize, Serialize};

use super::{Invalid, ParseError};

pub const MERCHANT_MAX_CHARS: usize = 30;
pub const DEFAULT_PAYMENT_METHOD: &str = "Cash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Completed,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "completed" => Ok(Status::Completed),
            "rejected" => Ok(Status::Rejected),
            _ => Err(ParseError::Status(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Income,
    Expense,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Income => "income",
            Kind::Expense => "expense",
        }
    }
}

impl Default for Kind {
    fn default() -> Self {
        Kind::Expense
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Kind::Income),
            "expense" => Ok(Kind::Expense),
            _ => Err(ParseError::Kind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub amount: String,
    pub merchant: String,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub kind: Kind,
    pub status: Status,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub sender: Option<String>,
}

impl Transaction {
    /// Payment method as shown to the user; unset reads as cash.
    pub fn payment_method_or_default(&self) -> &str {
        match self.payment_method.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => DEFAULT_PAYMENT_METHOD,
        }
    }
}

/// Fields for a record that does not exist yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTransaction {
    pub amount: String,
    pub merchant: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default = "pending")]
    pub status: Status,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
}

fn pending() -> Status {
    Status::Pending
}

impl NewTransaction {
    /// Checks the record against the persistence rules and normalizes the
    /// merchant. Completed records must carry a category and payment method.
    pub fn validate(mut self, currency: &Currency) -> Result<Self, Invalid> {
        self.merchant = require_merchant(&self.merchant)?;
        self.amount = parse_amount(&self.amount, currency)?;
        if self.status == Status::Completed {
            require_tags(self.category.as_deref(), self.payment_method.as_deref())?;
        }
        Ok(self)
    }
}

/// Partial update. `None` leaves the stored column untouched and blank
/// notes clear it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub amount: Option<String>,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub kind: Option<Kind>,
    pub status: Option<Status>,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Patch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Patch::default()
    }

    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(amount) = &self.amount {
            tx.amount = amount.clone();
        }
        if let Some(merchant) = &self.merchant {
            tx.merchant = merchant.clone();
        }
        if let Some(category) = &self.category {
            tx.category = Some(category.clone());
        }
        if let Some(payment) = &self.payment_method {
            tx.payment_method = Some(payment.clone());
        }
        if let Some(kind) = self.kind {
            tx.kind = kind;
        }
        if let Some(status) = self.status {
            tx.status = status;
        }
        if let Some(date) = self.date {
            tx.date = date;
        }
        if let Some(notes) = &self.notes {
            let notes = notes.trim();
            tx.notes = (!notes.is_empty()).then(|| notes.to_string());
        }
    }

    /// Validates the patch as applied on top of `current`.
    pub fn validate(mut self, current: &Transaction, currency: &Currency) -> Result<Self, Invalid> {
        if let Some(merchant) = &self.merchant {
            self.merchant = Some(require_merchant(merchant)?);
        }
        if let Some(amount) = &self.amount {
            self.amount = Some(parse_amount(amount, currency)?);
        }

        let status = self.status.unwrap_or(current.status);
        if status == Status::Completed {
            let category = self.category.as_deref().or(current.category.as_deref());
            let payment = self
                .payment_method
                .as_deref()
                .or(current.payment_method.as_deref());
            require_tags(category, payment)?;
        }
        Ok(self)
    }
}

/// Editable copy of a pending transaction's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub amount: String,
    pub merchant: String,
    pub notes: String,
    pub category: String,
    pub payment_method: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftField {
    Amount(String),
    Merchant(String),
    Notes(String),
    Category(String),
    PaymentMethod(String),
    Date(DateTime<Utc>),
}

impl Draft {
    pub fn set(&mut self, field: DraftField) {
        match field {
            DraftField::Amount(v) => self.amount = v,
            DraftField::Merchant(v) => self.merchant = truncate_merchant(&v),
            DraftField::Notes(v) => self.notes = v,
            DraftField::Category(v) => self.category = v,
            DraftField::PaymentMethod(v) => self.payment_method = v,
            DraftField::Date(v) => self.date = v,
        }
    }

    /// Builds the completing update, or the first rule the draft breaks.
    pub fn approval(&self, currency: &Currency) -> Result<Patch, Invalid> {
        require_tags(Some(&self.category), Some(&self.payment_method))?;
        let merchant = require_merchant(&self.merchant)?;
        let amount = parse_amount(&self.amount, currency)?;

        Ok(Patch {
            amount: Some(amount),
            merchant: Some(merchant),
            category: Some(self.category.trim().to_string()),
            payment_method: Some(self.payment_method.trim().to_string()),
            kind: None,
            status: Some(Status::Completed),
            date: Some(self.date),
            // Blank notes clear whatever the record had.
            notes: Some(self.notes.trim().to_string()),
        })
    }
}

impl From<&Transaction> for Draft {
    fn from(tx: &Transaction) -> Self {
        Self {
            amount: tx.amount.clone(),
            merchant: tx.merchant.clone(),
            notes: tx.notes.clone().unwrap_or_default(),
            category: tx.category.clone().unwrap_or_default(),
            payment_method: tx.payment_method.clone().unwrap_or_default(),
            date: tx.date,
        }
    }
}

pub fn truncate_merchant(merchant: &str) -> String {
    merchant.trim().chars().take(MERCHANT_MAX_CHARS).collect()
}

fn require_merchant(merchant: &str) -> Result<String, Invalid> {
    let merchant = truncate_merchant(merchant);
    if merchant.is_empty() {
        return Err(Invalid::MissingMerchant);
    }
    Ok(merchant)
}

fn require_tags(category: Option<&str>, payment: Option<&str>) -> Result<(), Invalid> {
    if category.map_or(true, |c| c.trim().is_empty()) {
        return Err(Invalid::MissingCategory);
    }
    if payment.map_or(true, |p| p.trim().is_empty()) {
        return Err(Invalid::MissingPaymentMethod);
    }
    Ok(())
}

/// Parses an amount in `currency` and returns its canonical decimal text.
pub fn parse_amount(amount: &str, currency: &Currency) -> Result<String, Invalid> {
    let amount = amount.trim();
    let money = Money::from_str(amount, currency)
        .map_err(|_| Invalid::Amount(amount.to_string()))?;
    if money.is_negative() {
        return Err(Invalid::NegativeAmount(amount.to_string()));
    }
    Ok(money.amount().to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rusty_money::iso;

    use super::*;

    fn pending_tx() -> Transaction {
        Transaction {
            id: "tx-1".into(),
            amount: "12.50".into(),
            merchant: "Corner Cafe".into(),
            category: None,
            payment_method: None,
            kind: Kind::Expense,
            status: Status::Pending,
            date: Utc.with_ymd_and_hms(2022, 10, 1, 9, 30, 0).unwrap(),
            notes: None,
            sender: Some("alerts@bank.example".into()),
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Completed".parse::<Status>().unwrap(), Status::Completed);
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn payment_method_defaults_to_cash_for_display() {
        let mut tx = pending_tx();
        assert_eq!(tx.payment_method_or_default(), "Cash");
        tx.payment_method = Some("Card".into());
        assert_eq!(tx.payment_method_or_default(), "Card");
    }

    #[test]
    fn merchant_is_limited_to_thirty_chars() {
        let mut draft = Draft::from(&pending_tx());
        draft.set(DraftField::Merchant("A".repeat(45)));
        assert_eq!(draft.merchant.chars().count(), MERCHANT_MAX_CHARS);
    }

    #[test]
    fn approval_requires_category_and_payment() {
        let mut draft = Draft::from(&pending_tx());
        assert_eq!(draft.approval(iso::USD), Err(Invalid::MissingCategory));

        draft.set(DraftField::Category("Food".into()));
        assert_eq!(draft.approval(iso::USD), Err(Invalid::MissingPaymentMethod));

        draft.set(DraftField::PaymentMethod("Cash".into()));
        let patch = draft.approval(iso::USD).unwrap();
        assert_eq!(patch.status, Some(Status::Completed));
        assert_eq!(patch.category.as_deref(), Some("Food"));
        assert_eq!(patch.notes.as_deref(), Some(""));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(matches!(
            parse_amount("-3.00", iso::USD),
            Err(Invalid::NegativeAmount(_))
        ));
        assert!(matches!(parse_amount("abc", iso::USD), Err(Invalid::Amount(_))));
        assert!(parse_amount("0", iso::USD).is_ok());
    }

    #[test]
    fn completed_patch_may_rely_on_stored_tags() {
        let mut tx = pending_tx();
        tx.category = Some("Food".into());
        tx.payment_method = Some("Card".into());

        let patch = Patch::status(Status::Completed);
        assert!(patch.validate(&tx, iso::USD).is_ok());

        let tx = pending_tx();
        let patch = Patch::status(Status::Completed);
        assert_eq!(patch.validate(&tx, iso::USD), Err(Invalid::MissingCategory));
    }
}
