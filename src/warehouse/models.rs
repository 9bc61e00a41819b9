//! Repository activity records served by the events warehouse

use crate::error::{Error, Result};
use crate::types::SyncEvent;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Column layout of the `github_events` table, in server order
pub const COLUMNS: [&str; 54] = [
    "file_time",
    "event_type",
    "actor_login",
    "repo_name",
    "created_at",
    "updated_at",
    "action",
    "comment_id",
    "body",
    "path",
    "position",
    "line",
    "ref",
    "ref_type",
    "creator_user_login",
    "number",
    "title",
    "labels",
    "state",
    "locked",
    "assignee",
    "assignees",
    "comments",
    "author_association",
    "closed_at",
    "merged_at",
    "merge_commit_sha",
    "requested_reviewers",
    "requested_teams",
    "head_ref",
    "head_sha",
    "base_ref",
    "base_sha",
    "merged",
    "mergeable",
    "rebaseable",
    "mergeable_state",
    "merged_by",
    "review_comments",
    "maintainer_can_modify",
    "commits",
    "additions",
    "deletions",
    "changed_files",
    "diff_hunk",
    "original_position",
    "commit_id",
    "original_commit_id",
    "push_size",
    "push_distinct_size",
    "member_login",
    "release_tag_name",
    "release_name",
    "review_state",
];

const WAREHOUSE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One repository activity event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubEvent {
    /// Deterministic key derived from the event's identifying columns
    #[serde(skip_deserializing, default)]
    pub id: String,
    #[serde(deserialize_with = "warehouse_time")]
    pub file_time: DateTime<Utc>,
    pub event_type: String,
    pub actor_login: String,
    pub repo_name: String,
    #[serde(deserialize_with = "warehouse_time")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "warehouse_time")]
    pub updated_at: DateTime<Utc>,
    pub action: String,
    pub comment_id: u64,
    pub body: String,
    pub path: String,
    pub position: i32,
    pub line: i32,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub ref_type: String,
    pub creator_user_login: String,
    pub number: u32,
    pub title: String,
    pub labels: Vec<String>,
    pub state: String,
    pub locked: u8,
    pub assignee: String,
    pub assignees: Vec<String>,
    pub comments: u32,
    pub author_association: String,
    /// None when the warehouse reports the zero timestamp
    #[serde(deserialize_with = "optional_warehouse_time")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "optional_warehouse_time")]
    pub merged_at: Option<DateTime<Utc>>,
    pub merge_commit_sha: String,
    pub requested_reviewers: Vec<String>,
    pub requested_teams: Vec<String>,
    pub head_ref: String,
    pub head_sha: String,
    pub base_ref: String,
    pub base_sha: String,
    pub merged: u8,
    pub mergeable: u8,
    pub rebaseable: u8,
    pub mergeable_state: String,
    pub merged_by: String,
    pub review_comments: u32,
    pub maintainer_can_modify: u8,
    pub commits: u32,
    pub additions: u32,
    pub deletions: u32,
    pub changed_files: u32,
    pub diff_hunk: String,
    pub original_position: String,
    pub commit_id: String,
    pub original_commit_id: String,
    pub push_size: u32,
    pub push_distinct_size: u32,
    pub member_login: String,
    pub release_tag_name: String,
    pub release_name: String,
    pub review_state: String,
}

impl GithubEvent {
    /// Decode one row whose columns are named by `names`
    pub fn from_row(names: &[String], row: Vec<Value>) -> Result<Self> {
        if names.len() != row.len() {
            return Err(Error::malformed(format!(
                "row has {} values for {} columns",
                row.len(),
                names.len()
            )));
        }
        let record: Map<String, Value> = names.iter().cloned().zip(row).collect();
        let mut event: GithubEvent = serde_json::from_value(Value::Object(record))
            .map_err(|e| Error::malformed(format!("github event row: {e}")))?;
        event.id = event.derive_id();
        Ok(event)
    }

    /// Key built from the columns that identify an event within a repository
    fn derive_id(&self) -> String {
        [
            self.created_at.timestamp().to_string(),
            self.event_type.clone(),
            self.actor_login.clone(),
            self.action.clone(),
            self.number.to_string(),
            self.comment_id.to_string(),
            self.git_ref.clone(),
            self.head_sha.clone(),
            self.commit_id.clone(),
            self.review_state.clone(),
            self.member_login.clone(),
            self.release_tag_name.clone(),
        ]
        .join(":")
    }
}

impl SyncEvent for GithubEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Describe how `actual` departs from `expected`, or None when they match
pub fn schema_diff(expected: &[&str], actual: &[String]) -> Option<String> {
    if expected.len() == actual.len()
        && expected.iter().zip(actual).all(|(e, a)| *e == a.as_str())
    {
        return None;
    }

    let mut lines = Vec::new();
    for name in expected {
        if !actual.iter().any(|a| a.as_str() == *name) {
            lines.push(format!("- {name}"));
        }
    }
    for name in actual {
        if !expected.contains(&name.as_str()) {
            lines.push(format!("+ {name}"));
        }
    }
    if lines.is_empty() {
        if let Some((pos, (e, a))) = expected
            .iter()
            .zip(actual)
            .enumerate()
            .find(|(_, (e, a))| **e != a.as_str())
        {
            lines.push(format!("! column {pos}: expected {e}, got {a}"));
        }
    }
    Some(lines.join("\n"))
}

fn parse_warehouse_time(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(raw, WAREHOUSE_TIME_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))
}

fn warehouse_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_warehouse_time(&raw).map_err(serde::de::Error::custom)
}

fn optional_warehouse_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => {
            let at = parse_warehouse_time(&raw).map_err(serde::de::Error::custom)?;
            Ok((at.timestamp() != 0).then_some(at))
        }
    }
}
