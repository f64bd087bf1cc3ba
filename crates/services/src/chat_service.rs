use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::client::GraphqlClient;
use crate::error::ApiError;

const SEND_MESSAGE: &str = "\
mutation SendMessage($body: String!) {
  sendMessage(body: $body) { id role body sentAt }
}";

const FETCH_MESSAGES: &str = "\
query FetchMessages {
  chatHistory { id role body sentAt }
}";

const CLEAR_HISTORY: &str = "\
mutation ClearChatHistory {
  clearChatHistory
}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// GraphQL wrapper for the study-helper chat.
#[derive(Clone)]
pub struct ChatService {
    client: Arc<GraphqlClient>,
}

impl ChatService {
    #[must_use]
    pub fn new(client: Arc<GraphqlClient>) -> Self {
        Self { client }
    }

    /// Send a message and receive the assistant's reply.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn send_message(&self, body: &str) -> Result<ChatMessage, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            send_message: ChatMessage,
        }
        let data: Data = self
            .client
            .execute(SEND_MESSAGE, &json!({ "body": body }))
            .await?;
        Ok(data.send_message)
    }

    /// Conversation so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn fetch_history(&self) -> Result<Vec<ChatMessage>, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            chat_history: Vec<ChatMessage>,
        }
        let data: Data = self.client.execute(FETCH_MESSAGES, &json!({})).await?;
        Ok(data.chat_history)
    }

    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn clear_history(&self) -> Result<(), ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            #[allow(dead_code)]
            clear_chat_history: bool,
        }
        let _: Data = self.client.execute(CLEAR_HISTORY, &json!({})).await?;
        Ok(())
    }
}
