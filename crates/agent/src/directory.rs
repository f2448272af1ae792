use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user `{0}` is unknown to the directory")]
    UnknownUser(String),
    #[error("directory lookup failed: {0}")]
    Transport(String),
}

/// Resolves chat user ids to the `first.last` style name recorded on a reservation.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<String, DirectoryError>;
}

/// Fixed name table. Users missing from it fall back to their id.
#[derive(Clone, Debug, Default)]
pub struct StaticUserDirectory {
    names: HashMap<String, String>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(user_id.into(), name.into());
        self
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn display_name(&self, user_id: &str) -> Result<String, DirectoryError> {
        Ok(self.names.get(user_id).cloned().unwrap_or_else(|| user_id.to_owned()))
    }
}
