use async_trait::async_trait;

use lagertool_agent::{DirectoryError, UserDirectory};
use lagertool_slack::web::{SlackWebClient, WebApiError};

/// Resolves requester names through `users.info`.
pub struct SlackDirectory {
    client: SlackWebClient,
}

impl SlackDirectory {
    pub fn new(client: SlackWebClient) -> Self {
        Self { client }
    }
}

fn directory_error(user_id: &str, error: WebApiError) -> DirectoryError {
    match error {
        WebApiError::Api { error, .. } if error == "user_not_found" => {
            DirectoryError::UnknownUser(user_id.to_owned())
        }
        other => DirectoryError::Transport(other.to_string()),
    }
}

#[async_trait]
impl UserDirectory for SlackDirectory {
    async fn display_name(&self, user_id: &str) -> Result<String, DirectoryError> {
        self.client
            .user_display_name(user_id)
            .await
            .map_err(|error| directory_error(user_id, error))
    }
}
