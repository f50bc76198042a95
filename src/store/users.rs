//! User lookup for login.

use async_trait::async_trait;

use super::StoreError;
use crate::config::UserConfig;

/// A stored account.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Lookup-by-name into the account store.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
}

/// Serves the single account seeded from configuration.
#[derive(Debug, Clone)]
pub struct StaticUserDirectory {
    user: UserRecord,
}

impl StaticUserDirectory {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: UserRecord {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    pub fn from_config(config: &UserConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok((self.user.username == username).then(|| self.user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_only_the_seeded_user() {
        let dir = StaticUserDirectory::new("admin", "hunter2");

        let found = dir.find_by_username("admin").await.unwrap().unwrap();
        assert_eq!(found.password, "hunter2");

        assert!(dir.find_by_username("Admin").await.unwrap().is_none());
        assert!(dir.find_by_username("").await.unwrap().is_none());
    }

    #[test]
    fn debug_hides_password() {
        let record = UserRecord {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{record:?}").contains("hunter2"));
    }
}
