use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::service::{AuthService, Registration};
use crate::storage::LocalStorage;
use crate::transactions::UserId;

/// The authenticated user a dashboard works for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    user: UserId,
}

impl Session {
    pub fn new(user: UserId) -> Session {
        Session { user }
    }
    pub fn user(&self) -> UserId {
        self.user
    }
}

/// login checks the credentials and remembers the user locally
pub async fn login(
    auth: &dyn AuthService,
    storage: &dyn LocalStorage,
    username: &str,
    password: &str,
) -> Result<Session> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(anyhow!("username and password required"));
    }
    let user = auth
        .login(username, password)
        .await
        .context("login failed")?;
    storage.set_session(Some(user))?;
    info!(user = user.0, "Logged in");
    Ok(Session::new(user))
}

pub async fn register(auth: &dyn AuthService, registration: &Registration) -> Result<()> {
    if !registration.is_complete() {
        return Err(anyhow!("all fields are required"));
    }
    auth.register(registration)
        .await
        .context("sign up failed")?;
    info!(username = registration.username.as_str(), "Registered user");
    Ok(())
}

/// resume restores the session left by a previous login, if any
pub fn resume(storage: &dyn LocalStorage) -> Result<Option<Session>> {
    let session = storage.session()?.map(Session::new);
    debug!(user = ?session.map(|s| s.user().0), "Resumed session");
    Ok(session)
}

/// logout forgets the user; their budget stays on disk
pub fn logout(storage: &dyn LocalStorage) -> Result<()> {
    storage.set_session(None)?;
    info!("Logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Amount;
    use crate::service::MemoryService;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_login_persists_session() -> Result<()> {
        let service = MemoryService::new();
        let user = service.with_user("ana", "secret");
        let storage = MemoryStorage::new();

        let session = login(&service, &storage, "ana", "secret").await?;
        assert_eq!(session.user(), user);
        assert_eq!(resume(&storage)?, Some(session));
        Ok(())
    }

    #[tokio::test]
    async fn test_login_with_bad_credentials() -> Result<()> {
        let service = MemoryService::new();
        service.with_user("ana", "secret");
        let storage = MemoryStorage::new();

        assert!(login(&service, &storage, "ana", "nope").await.is_err());
        assert!(login(&service, &storage, "", "secret").await.is_err());
        assert_eq!(resume(&storage)?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_then_login() -> Result<()> {
        let service = MemoryService::new();
        let storage = MemoryStorage::new();
        let registration = Registration {
            username: "ben".to_string(),
            password: "pw".to_string(),
            first_name: "Ben".to_string(),
            last_name: "Cruz".to_string(),
        };
        register(&service, &registration).await?;
        assert!(register(&service, &registration).await.is_err());
        login(&service, &storage, "ben", "pw").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_logout_keeps_budget() -> Result<()> {
        let service = MemoryService::new();
        let user = service.with_user("ana", "secret");
        let storage = MemoryStorage::new();
        login(&service, &storage, "ana", "secret").await?;
        storage.set_budget(user, Amount::parse("500")?)?;

        logout(&storage)?;
        assert_eq!(resume(&storage)?, None);
        assert_eq!(storage.budget(user)?, Some(Amount::parse("500")?));
        Ok(())
    }
}
