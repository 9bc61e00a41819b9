//! Scripted page source shared by unit tests

use super::types::{PageRequest, PageSource};
use crate::error::{Error, Result};
use crate::types::SyncEvent;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Minimal event used across unit tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestEvent {
    pub id: String,
    pub at: DateTime<Utc>,
    pub replies: u32,
}

impl SyncEvent for TestEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }

    fn reply_count(&self) -> u32 {
        self.replies
    }
}

/// Event `id` sent `secs` seconds after the epoch
pub(crate) fn ev(id: &str, secs: i64) -> TestEvent {
    TestEvent {
        id: id.to_string(),
        at: Utc.timestamp_opt(secs, 0).unwrap(),
        replies: 0,
    }
}

#[derive(Default)]
struct Script {
    pages: VecDeque<Vec<TestEvent>>,
    replies: HashMap<String, Vec<TestEvent>>,
    requests: Vec<PageRequest>,
    fail_on_request: Option<usize>,
    latency: Option<Duration>,
}

/// Serves queued pages in order, then empty pages forever
#[derive(Clone, Default)]
pub(crate) struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn with_pages(pages: Vec<Vec<TestEvent>>) -> Self {
        let source = Self::default();
        source.script.lock().unwrap().pages = pages.into();
        source
    }

    /// Fail the n-th request (1-based) with an upstream 500
    pub fn fail_on_request(self, n: usize) -> Self {
        self.script.lock().unwrap().fail_on_request = Some(n);
        self
    }

    /// Sleep this long before answering each page request
    pub fn with_latency(self, latency: Duration) -> Self {
        self.script.lock().unwrap().latency = Some(latency);
        self
    }

    pub fn with_replies(self, parent: &str, replies: Vec<TestEvent>) -> Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .insert(parent.to_string(), replies);
        self
    }

    pub fn push_page(&self, page: Vec<TestEvent>) {
        self.script.lock().unwrap().pages.push_back(page);
    }

    /// Replace whatever pages are still queued
    pub fn set_pages(&self, pages: Vec<Vec<TestEvent>>) {
        self.script.lock().unwrap().pages = pages.into();
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.script.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    type Event = TestEvent;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<TestEvent>> {
        let latency = self.script.lock().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        if script.fail_on_request == Some(script.requests.len()) {
            return Err(Error::upstream(500, "scripted failure"));
        }
        Ok(script.pages.pop_front().unwrap_or_default())
    }

    async fn fetch_replies(
        &self,
        _resource_id: &str,
        parent: &TestEvent,
    ) -> Result<Vec<TestEvent>> {
        let script = self.script.lock().unwrap();
        Ok(script.replies.get(&parent.id).cloned().unwrap_or_default())
    }
}
