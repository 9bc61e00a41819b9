//! Warehouse rows shared by unit tests

use super::models::{GithubEvent, COLUMNS};
use serde_json::{json, Value};

pub(crate) fn column_names() -> Vec<String> {
    COLUMNS.iter().map(|c| (*c).to_string()).collect()
}

pub(crate) fn row_json(created_at: &str, event_type: &str, number: u32) -> Vec<Value> {
    COLUMNS
        .iter()
        .map(|column| match *column {
            "file_time" => json!("2022-01-01 00:00:00"),
            "event_type" => json!(event_type),
            "actor_login" => json!("kapilt"),
            "repo_name" => json!("cloud-custodian/cloud-custodian"),
            "created_at" | "updated_at" => json!(created_at),
            "closed_at" | "merged_at" => json!("1970-01-01 00:00:00"),
            "labels" | "assignees" | "requested_reviewers" | "requested_teams" => json!([]),
            "number" => json!(number),
            "comment_id" | "position" | "line" | "locked" | "comments" | "merged" | "mergeable"
            | "rebaseable" | "review_comments" | "maintainer_can_modify" | "commits"
            | "additions" | "deletions" | "changed_files" | "push_size"
            | "push_distinct_size" => json!(0),
            _ => json!(""),
        })
        .collect()
}

pub(crate) fn event(created_at: &str, event_type: &str, number: u32) -> GithubEvent {
    GithubEvent::from_row(&column_names(), row_json(created_at, event_type, number)).unwrap()
}
