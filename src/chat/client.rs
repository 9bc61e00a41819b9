//! Chat API client

use super::models::{ChatMessage, Room};
use crate::error::{Error, Result};
use crate::http::{HttpClient, Query};
use crate::pagination::{PageRequest, PageSource};
use crate::types::Direction;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Typed access to rooms, message pages and threads
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: HttpClient,
}

impl ChatClient {
    /// Wrap a configured HTTP client (base URL and bearer token already set)
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Rooms visible to the token's user
    pub async fn rooms(&self) -> Result<Vec<Room>> {
        let values: Vec<Value> = self.http.get_json("/rooms", &Query::new()).await?;
        values.into_iter().map(Room::from_value).collect()
    }

    /// Find a room by its URI
    pub async fn get_room(&self, uri: &str) -> Result<Room> {
        self.rooms()
            .await?
            .into_iter()
            .find(|room| room.uri.as_deref() == Some(uri))
            .ok_or_else(|| Error::not_found(format!("room {uri}")))
    }

    /// One page of messages anchored on `cursor` in `direction`
    pub async fn messages(
        &self,
        room_id: &str,
        direction: Direction,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        let request = PageRequest {
            resource_id: room_id.to_string(),
            direction,
            cursor: cursor.map(str::to_string),
            page_size: limit,
        };
        self.fetch_page(&request).await
    }

    /// Replies in a thread, oldest first
    pub async fn message_thread(&self, room_id: &str, parent_id: &str) -> Result<Vec<ChatMessage>> {
        let values: Vec<Value> = self
            .http
            .get_json(
                &format!("/rooms/{room_id}/chatMessages/{parent_id}/thread"),
                &Query::new(),
            )
            .await?;
        debug!("thread {parent_id} in {room_id}: {} replies", values.len());
        ChatMessage::from_page(values)
    }
}

#[async_trait]
impl PageSource for ChatClient {
    type Event = ChatMessage;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<ChatMessage>> {
        let query: Query = request
            .query_params()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let values: Vec<Value> = self
            .http
            .get_json(
                &format!("/rooms/{}/chatMessages", request.resource_id),
                &query,
            )
            .await?;
        ChatMessage::from_page(values)
    }

    async fn fetch_replies(
        &self,
        resource_id: &str,
        parent: &ChatMessage,
    ) -> Result<Vec<ChatMessage>> {
        self.message_thread(resource_id, &parent.id).await
    }
}
