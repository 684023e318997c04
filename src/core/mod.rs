mod tag;
mod txn;

use thiserror::Error;

pub use tag::{Tag, TagKind};
pub use txn::{
    parse_amount, truncate_merchant, Draft, DraftField, Kind, NewTransaction, Patch, Status,
    Transaction, DEFAULT_PAYMENT_METHOD, MERCHANT_MAX_CHARS,
};

/// A record or selection that breaks a rule checked before any store call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Invalid {
    #[error("a category is required")]
    MissingCategory,
    #[error("a payment method is required")]
    MissingPaymentMethod,
    #[error("a merchant is required")]
    MissingMerchant,
    #[error("\"{0}\" is not a valid amount")]
    Amount(String),
    #[error("amount must not be negative, got {0}")]
    NegativeAmount(String),
    #[error("a custom range needs a start and an end, with start before end")]
    CustomRange,
    #[error("PIN must be 4 to 6 digits")]
    Pin,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown transaction status \"{0}\"")]
    Status(String),
    #[error("unknown transaction type \"{0}\"")]
    Kind(String),
    #[error("unknown tag kind \"{0}\"")]
    TagKind(String),
}
