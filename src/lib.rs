pub mod config;
pub mod error;
pub mod http;
pub mod money;
pub mod service;
pub mod session;
pub mod statement;
pub mod storage;
pub mod store;
pub mod summary;
pub mod transactions;

pub use error::{StoreError, ValidationError};
pub use money::Amount;
pub use store::{StoreOptions, TransactionStore};
pub use summary::{BudgetAggregator, BudgetSummary};
