use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::money::Amount;
use crate::transactions::{NewTransaction, Transaction, TransactionId, UserId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("service unreachable: {0}")]
    Unreachable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("transaction {0} does not exist")]
    NotFound(TransactionId),
    #[error("user {0} does not exist")]
    UnknownUser(UserId),
    #[error("invalid username or password")]
    Unauthorized,
    #[error("no response after {0:?}")]
    Timeout(Duration),
}

/// The remote authority for a user's transactions.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// list returns every transaction of `user`, newest first
    async fn list(&self, user: UserId) -> Result<Vec<Transaction>, ServiceError>;
    async fn create(
        &self,
        user: UserId,
        transaction: &NewTransaction,
    ) -> Result<TransactionId, ServiceError>;
    async fn update(
        &self,
        id: TransactionId,
        category: &str,
        amount: Amount,
    ) -> Result<(), ServiceError>;
    async fn delete(&self, id: TransactionId) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Registration {
    pub fn is_complete(&self) -> bool {
        [
            &self.username,
            &self.password,
            &self.first_name,
            &self.last_name,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Establishes who the session belongs to. Not involved in bookkeeping.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<UserId, ServiceError>;
    async fn register(&self, registration: &Registration) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct Data {
    users: Vec<(UserId, Registration)>,
    transactions: Vec<Transaction>,
    next_id: i64,
    faults: HashMap<Operation, ServiceError>,
    calls: HashMap<Operation, usize>,
}

impl Data {
    /// take_fault counts the call and hands back an injected failure, if any
    fn take_fault(&mut self, op: Operation) -> Result<(), ServiceError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.faults.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn knows(&self, user: UserId) -> bool {
        self.users.iter().any(|(id, _)| *id == user)
    }
}

/// In-process service holding everything in memory.
#[derive(Default)]
pub struct MemoryService {
    data: Mutex<Data>,
}

impl MemoryService {
    pub fn new() -> MemoryService {
        MemoryService::default()
    }

    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// with_user registers an account directly and returns its id
    pub fn with_user(&self, username: &str, password: &str) -> UserId {
        let mut data = self.data();
        let id = UserId(data.users.len() as i64 + 1);
        data.users.push((
            id,
            Registration {
                username: username.to_string(),
                password: password.to_string(),
                first_name: username.to_string(),
                last_name: username.to_string(),
            },
        ));
        id
    }

    /// fail_next makes the next call of `op` fail with `err`
    pub fn fail_next(&self, op: Operation, err: ServiceError) {
        self.data().faults.insert(op, err);
    }

    /// calls reports how many times `op` reached the service
    pub fn calls(&self, op: Operation) -> usize {
        self.data().calls.get(&op).copied().unwrap_or(0)
    }

    /// get reads a transaction straight from the backing data
    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.data()
            .transactions
            .iter()
            .find(|transaction| transaction.id == id)
            .cloned()
    }

    /// purge drops a transaction behind the client's back
    pub fn purge(&self, id: TransactionId) {
        self.data().transactions.retain(|transaction| transaction.id != id);
    }
}

#[async_trait]
impl TransactionService for MemoryService {
    async fn list(&self, user: UserId) -> Result<Vec<Transaction>, ServiceError> {
        let mut data = self.data();
        data.take_fault(Operation::List)?;
        if !data.knows(user) {
            return Err(ServiceError::UnknownUser(user));
        }
        Ok(data
            .transactions
            .iter()
            .rev()
            .filter(|transaction| transaction.user == user)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        user: UserId,
        transaction: &NewTransaction,
    ) -> Result<TransactionId, ServiceError> {
        let mut data = self.data();
        data.take_fault(Operation::Create)?;
        if !data.knows(user) {
            return Err(ServiceError::UnknownUser(user));
        }
        data.next_id += 1;
        let id = TransactionId(data.next_id);
        data.transactions.push(Transaction {
            id,
            user,
            category: transaction.description.clone(),
            amount: transaction.amount,
            kind: transaction.kind,
        });
        Ok(id)
    }

    async fn update(
        &self,
        id: TransactionId,
        category: &str,
        amount: Amount,
    ) -> Result<(), ServiceError> {
        let mut data = self.data();
        data.take_fault(Operation::Update)?;
        let transaction = data
            .transactions
            .iter_mut()
            .find(|transaction| transaction.id == id)
            .ok_or(ServiceError::NotFound(id))?;
        transaction.category = category.to_string();
        transaction.amount = amount;
        Ok(())
    }

    async fn delete(&self, id: TransactionId) -> Result<(), ServiceError> {
        let mut data = self.data();
        data.take_fault(Operation::Delete)?;
        let before = data.transactions.len();
        data.transactions.retain(|transaction| transaction.id != id);
        if data.transactions.len() == before {
            return Err(ServiceError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for MemoryService {
    async fn login(&self, username: &str, password: &str) -> Result<UserId, ServiceError> {
        self.data()
            .users
            .iter()
            .find(|(_, user)| user.username == username && user.password == password)
            .map(|(id, _)| *id)
            .ok_or(ServiceError::Unauthorized)
    }

    async fn register(&self, registration: &Registration) -> Result<(), ServiceError> {
        if !registration.is_complete() {
            return Err(ServiceError::Rejected("All fields are required".to_string()));
        }
        let mut data = self.data();
        if data
            .users
            .iter()
            .any(|(_, user)| user.username == registration.username)
        {
            return Err(ServiceError::Rejected("Username already exists".to_string()));
        }
        let id = UserId(data.users.len() as i64 + 1);
        data.users.push((id, registration.clone()));
        Ok(())
    }
}
