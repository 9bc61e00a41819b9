//! Warehouse source wired into the sync engine

use super::client::{EventQuery, WarehouseClient, WarehouseEventStream};
use super::models::GithubEvent;
use crate::connector::Connector;
use crate::error::Result;
use crate::state::{ResumePoint, ResumePolicy};
use crate::types::Resource;

/// Syncs a repository's activity, oldest first, from the watermark onward.
///
/// The resource ID is the upstream repository name; when the resource key
/// differs, events are stored under the key instead.
#[derive(Debug, Clone)]
pub struct WarehouseConnector {
    client: WarehouseClient,
}

impl WarehouseConnector {
    pub fn new(client: WarehouseClient) -> Self {
        Self { client }
    }
}

impl Connector for WarehouseConnector {
    type Event = GithubEvent;
    type Source = WarehouseEventStream;

    fn name(&self) -> &str {
        "warehouse"
    }

    fn resume_policy(&self) -> ResumePolicy {
        ResumePolicy::ForwardOnly
    }

    fn open(&self, resource: &Resource, point: &ResumePoint) -> Result<Self::Source> {
        let query = EventQuery::ascending().since(point.watermark.as_ref().map(|w| w.timestamp));
        let stream = self.client.query_events(&resource.id, &query);
        Ok(if resource.key == resource.id {
            stream
        } else {
            stream.renamed(resource.key.clone())
        })
    }
}
