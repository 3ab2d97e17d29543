use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;
use crate::money::Amount;

#[derive(Error, Debug, PartialEq)]
pub enum TransactionError {
    #[error("unable to move transaction from {from:?} on {event:?}")]
    InvalidState { from: SyncState, event: SyncEvent },
}

/// Identifier assigned by the transaction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl FromStr for TransactionKind {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<TransactionKind, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            _ => Err(ValidationError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        })
    }
}

/// A transaction as the service knows it. The kind is fixed at creation;
/// edits only touch the category and the amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub user: UserId,
    pub category: String,
    pub amount: Amount,
    pub kind: TransactionKind,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }
    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }
    /// edited returns a copy carrying the new label and amount
    pub fn edited(&self, category: &str, amount: Amount) -> Transaction {
        Transaction {
            category: category.to_string(),
            amount,
            ..self.clone()
        }
    }
}

/// Raw form input for a new transaction, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub description: String,
    pub amount: String,
    pub kind: String,
}

impl TransactionDraft {
    pub fn new(description: &str, amount: &str, kind: &str) -> TransactionDraft {
        TransactionDraft {
            description: description.to_string(),
            amount: amount.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// A validated transaction waiting for the service to assign it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub description: String,
    pub amount: Amount,
    pub kind: TransactionKind,
}

impl TryFrom<TransactionDraft> for NewTransaction {
    type Error = ValidationError;
    fn try_from(
        TransactionDraft {
            description,
            amount,
            kind,
        }: TransactionDraft,
    ) -> Result<NewTransaction, ValidationError> {
        Ok(NewTransaction {
            description: validate_description(&description)?,
            amount: Amount::parse(&amount)?,
            kind: kind.parse()?,
        })
    }
}

/// validate_description trims the label and refuses blank ones
pub fn validate_description(description: &str) -> Result<String, ValidationError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    Ok(trimmed.to_string())
}

/// Where a transaction stands between the local view and the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Absent,
    PendingCreate,
    Present,
    PendingUpdate,
    PendingDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// a create request was sent
    Submit,
    /// an update request was sent
    Edit,
    /// a delete request was sent
    Delete,
    /// the service accepted the pending request
    Confirm,
    /// the service refused or could not be reached
    Rollback,
}

impl SyncState {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SyncState::PendingCreate | SyncState::PendingUpdate | SyncState::PendingDelete
        )
    }

    pub fn apply(self, event: SyncEvent) -> Result<SyncState, TransactionError> {
        match (self, event) {
            (SyncState::Absent, SyncEvent::Submit) => Ok(SyncState::PendingCreate),
            (SyncState::PendingCreate, SyncEvent::Confirm) => Ok(SyncState::Present),
            (SyncState::PendingCreate, SyncEvent::Rollback) => Ok(SyncState::Absent),
            (SyncState::Present, SyncEvent::Edit) => Ok(SyncState::PendingUpdate),
            (SyncState::PendingUpdate, SyncEvent::Confirm)
            | (SyncState::PendingUpdate, SyncEvent::Rollback) => Ok(SyncState::Present),
            (SyncState::Present, SyncEvent::Delete) => Ok(SyncState::PendingDelete),
            (SyncState::PendingDelete, SyncEvent::Confirm) => Ok(SyncState::Absent),
            (SyncState::PendingDelete, SyncEvent::Rollback) => Ok(SyncState::Present),
            (from, event) => Err(TransactionError::InvalidState { from, event }),
        }
    }
}
