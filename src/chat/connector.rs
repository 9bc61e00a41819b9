//! Chat source wired into the sync engine

use super::client::ChatClient;
use super::models::ChatMessage;
use crate::connector::Connector;
use crate::error::Result;
use crate::pagination::{PaginatedEventIterator, DEFAULT_PAGE_SIZE};
use crate::state::{ResumePoint, ResumePolicy};
use crate::types::Resource;

/// Syncs a room's messages with bidirectional resume
#[derive(Debug, Clone)]
pub struct ChatConnector {
    client: ChatClient,
    page_size: u32,
    expand_threads: bool,
}

impl ChatConnector {
    /// Connector with default paging and no thread expansion
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
            expand_threads: false,
        }
    }

    /// Messages requested per page
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Also fetch thread replies of every message that has them
    #[must_use]
    pub fn with_thread_expansion(mut self, expand: bool) -> Self {
        self.expand_threads = expand;
        self
    }

    /// Underlying API client
    pub fn client(&self) -> &ChatClient {
        &self.client
    }
}

impl Connector for ChatConnector {
    type Event = ChatMessage;
    type Source = PaginatedEventIterator<ChatClient>;

    fn name(&self) -> &str {
        "chat"
    }

    fn resume_policy(&self) -> ResumePolicy {
        ResumePolicy::Bidirectional
    }

    fn open(&self, resource: &Resource, point: &ResumePoint) -> Result<Self::Source> {
        Ok(PaginatedEventIterator::new(
            self.client.clone(),
            resource.id.clone(),
            point.direction,
            point.cursor(),
        )
        .with_page_size(self.page_size)
        .with_thread_expansion(self.expand_threads))
    }
}
