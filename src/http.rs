//! Client for the budget REST service.

use std::convert::TryFrom;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::money::Amount;
use crate::service::{AuthService, Registration, ServiceError, TransactionService};
use crate::transactions::{NewTransaction, Transaction, TransactionId, TransactionKind, UserId};

/// A listed row, checked only once it reaches [`TransactionRow::into_transaction`].
#[derive(Debug, Deserialize)]
struct TransactionRow {
    id: TransactionId,
    category: String,
    amount: Decimal,
    #[serde(rename = "type")]
    kind: String,
}

impl TransactionRow {
    fn into_transaction(self, user: UserId) -> Result<Transaction, ValidationError> {
        Ok(Transaction {
            id: self.id,
            user,
            category: self.category,
            amount: Amount::try_from(self.amount)?,
            kind: self.kind.parse()?,
        })
    }
}

/// transactions keeps the usable rows; a row the client cannot represent is skipped
fn transactions(user: UserId, rows: Vec<TransactionRow>) -> Vec<Transaction> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match row.into_transaction(user) {
                Ok(transaction) => Some(transaction),
                Err(err) => {
                    warn!(id = id.0, error = err.to_string(), "Skipping unusable transaction");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TransactionList {
    transactions: Vec<TransactionRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    user_id: UserId,
    description: &'a str,
    amount: Amount,
    #[serde(rename = "type")]
    kind: TransactionKind,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: TransactionId,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    category: &'a str,
    amount: Amount,
}

/// `{success, message?, transaction?}` as returned by the mutating routes
#[derive(Debug, Deserialize)]
struct Outcome<T> {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    transaction: Option<T>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUp<'a> {
    username: &'a str,
    password: &'a str,
    fname: &'a str,
    lname: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoggedIn {
    id: UserId,
}

/// Any JSON error body; the service uses both `message` and `error`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

pub struct HttpService {
    http: Client,
    base_url: Url,
}

impl HttpService {
    pub fn new(base_url: Url) -> Result<HttpService, ServiceError> {
        let http = Client::builder()
            .build()
            .map_err(|err| ServiceError::Unreachable(err.to_string()))?;
        Ok(HttpService { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|err| ServiceError::Rejected(format!("bad endpoint {path}: {err}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ServiceError> {
        request
            .send()
            .await
            .map_err(|err| ServiceError::Unreachable(err.to_string()))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    response
        .json()
        .await
        .map_err(|err| ServiceError::Rejected(format!("malformed response: {err}")))
}

/// error_message pulls the service's explanation out of a failed response
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body: ErrorBody = response.json().await.unwrap_or_default();
    body.message
        .or(body.error)
        .unwrap_or_else(|| status.to_string())
}

fn outcome<T>(outcome: Outcome<T>) -> Result<Option<T>, ServiceError> {
    if !outcome.success {
        return Err(ServiceError::Rejected(
            outcome
                .message
                .unwrap_or_else(|| "request was not successful".to_string()),
        ));
    }
    Ok(outcome.transaction)
}

#[async_trait]
impl TransactionService for HttpService {
    async fn list(&self, user: UserId) -> Result<Vec<Transaction>, ServiceError> {
        let url = self.endpoint(&format!("transactions/{}", user.0))?;
        let response = self.send(self.http.get(url)).await?;
        if !response.status().is_success() {
            return Err(ServiceError::Rejected(error_message(response).await));
        }
        let list: TransactionList = read_json(response).await?;
        debug!(user = user.0, count = list.transactions.len(), "Fetched transactions");
        Ok(transactions(user, list.transactions))
    }

    async fn create(
        &self,
        user: UserId,
        transaction: &NewTransaction,
    ) -> Result<TransactionId, ServiceError> {
        let url = self.endpoint("add-transaction")?;
        let body = CreateRequest {
            user_id: user,
            description: &transaction.description,
            amount: transaction.amount,
            kind: transaction.kind,
        };
        let response = self.send(self.http.post(url).json(&body)).await?;
        if response.status().is_server_error() {
            return Err(ServiceError::Rejected(error_message(response).await));
        }
        let created: Outcome<Created> = read_json(response).await?;
        outcome(created)?
            .map(|created| created.id)
            .ok_or_else(|| ServiceError::Rejected("no id in response".to_string()))
    }

    async fn update(
        &self,
        id: TransactionId,
        category: &str,
        amount: Amount,
    ) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("update-transaction/{}", id.0))?;
        let response = self
            .send(self.http.put(url).json(&UpdateRequest { category, amount }))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ServiceError::NotFound(id)),
            status if status.is_server_error() => {
                Err(ServiceError::Rejected(error_message(response).await))
            }
            _ => {
                let updated: Outcome<serde_json::Value> = read_json(response).await?;
                outcome(updated).map(|_| ())
            }
        }
    }

    async fn delete(&self, id: TransactionId) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("delete-transaction/{}", id.0))?;
        let response = self.send(self.http.delete(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ServiceError::NotFound(id)),
            status if status.is_success() => {
                let deleted: Outcome<serde_json::Value> = read_json(response).await?;
                outcome(deleted).map(|_| ())
            }
            _ => Err(ServiceError::Rejected(error_message(response).await)),
        }
    }
}

#[async_trait]
impl AuthService for HttpService {
    async fn login(&self, username: &str, password: &str) -> Result<UserId, ServiceError> {
        let url = self.endpoint("check-user")?;
        let response = self
            .send(self.http.post(url).json(&Credentials { username, password }))
            .await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ServiceError::Unauthorized),
            status if status.is_success() => {
                let logged_in: LoggedIn = read_json(response).await?;
                Ok(logged_in.id)
            }
            _ => Err(ServiceError::Rejected(error_message(response).await)),
        }
    }

    async fn register(&self, registration: &Registration) -> Result<(), ServiceError> {
        let url = self.endpoint("add-user")?;
        let body = SignUp {
            username: &registration.username,
            password: &registration.password,
            fname: &registration.first_name,
            lname: &registration.last_name,
        };
        let response = self.send(self.http.post(url).json(&body)).await?;
        if response.status().is_server_error() {
            return Err(ServiceError::Rejected(error_message(response).await));
        }
        let registered: Outcome<serde_json::Value> = read_json(response).await?;
        outcome(registered).map(|_| ())
    }
}
