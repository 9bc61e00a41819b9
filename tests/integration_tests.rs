//! Integration tests using mock HTTP servers
//!
//! Tests the full end-to-end flow: upstream API → connector → sync engine →
//! DuckDB store, across repeated runs against the same database file.

use hubhud::chat::{ChatClient, ChatConnector, ChatMessage};
use hubhud::database::{DuckDbStore, EventStore, RoomStore};
use hubhud::engine::{SyncConfig, SyncEngine};
use hubhud::http::{HttpClient, HttpClientConfig};
use hubhud::warehouse::{GithubEvent, WarehouseClient, WarehouseConnector, COLUMNS};
use hubhud::{Direction, Error, Resource};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOM_ID: &str = "5a0f1c8ed73408ce4f7f4d2a";
const ROOM_URI: &str = "cloud-custodian/cloud-custodian";

// ============================================================================
// Chat fixtures
// ============================================================================

fn room_json() -> Value {
    json!({
        "id": ROOM_ID,
        "name": ROOM_URI,
        "topic": "Rules engine for cloud security",
        "uri": ROOM_URI,
        "url": format!("/{ROOM_URI}"),
        "oneToOne": false,
        "userCount": 1342,
        "unreadItems": 0,
        "mentions": 0,
        "lurk": false,
        "githubType": "REPO",
        "tags": [],
        "noindex": false,
        "roomMember": true,
        "public": true,
        "v": 1
    })
}

fn message_json(id: &str, second: u32) -> Value {
    json!({
        "id": id,
        "text": format!("message {id}"),
        "html": format!("message {id}"),
        "sent": format!("2021-03-04T10:00:{second:02}.000Z"),
        "fromUser": {
            "id": "53307734c3599d1de448e192",
            "username": "kapilt",
            "displayName": "Kapil Thangavelu",
            "url": "/kapilt"
        },
        "unread": false,
        "readBy": 0,
        "urls": [],
        "mentions": [],
        "issues": [],
        "meta": [],
        "v": 1
    })
}

async fn mount_rooms(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([room_json()])))
        .mount(server)
        .await;
}

/// Page served for one anchor; `None` is the newest page
async fn mount_page(server: &MockServer, anchor: Option<(&str, &str)>, messages: Value) {
    let mock = Mock::given(method("GET")).and(path(format!("/rooms/{ROOM_ID}/chatMessages")));
    let mock = match anchor {
        Some((param, cursor)) => mock.and(query_param(param, cursor)),
        None => mock
            .and(query_param_is_missing("beforeId"))
            .and(query_param_is_missing("afterId")),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(messages))
        .mount(server)
        .await;
}

fn chat_client(server: &MockServer) -> ChatClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .bearer("test-token")
        .no_pacing()
        .build();
    ChatClient::new(HttpClient::with_config(config).unwrap())
}

fn chat_engine(server: &MockServer, db: &Path) -> SyncEngine<ChatConnector, DuckDbStore> {
    let connector = ChatConnector::new(chat_client(server)).with_page_size(2);
    SyncEngine::new(connector, DuckDbStore::open(db).unwrap())
        .with_config(SyncConfig::new().with_batch_size(2))
}

fn message_ids(db: &Path) -> Vec<String> {
    let store = DuckDbStore::open(db).unwrap();
    EventStore::<ChatMessage>::event_ids(&store, ROOM_URI).unwrap()
}

// ============================================================================
// Chat Sync Tests
// ============================================================================

#[tokio::test]
async fn test_chat_backfill_then_catch_up() {
    let server = MockServer::start().await;
    mount_rooms(&server).await;
    mount_page(&server, None, json!([message_json("m3", 3), message_json("m4", 4)])).await;
    mount_page(
        &server,
        Some(("beforeId", "m3")),
        json!([message_json("m1", 1), message_json("m2", 2)]),
    )
    .await;
    mount_page(&server, Some(("beforeId", "m1")), json!([])).await;
    mount_page(&server, Some(("afterId", "m4")), json!([message_json("m5", 5)])).await;
    mount_page(&server, Some(("afterId", "m5")), json!([])).await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hud.duckdb");

    let room = chat_client(&server).get_room(ROOM_URI).await.unwrap();
    {
        let store = DuckDbStore::open(&db).unwrap();
        assert!(store.save_room(&room).unwrap());
    }
    let resource = Resource::new(room.id.clone(), room.key());

    // Fresh store: backfill newest to oldest.
    let mut engine = chat_engine(&server, &db);
    assert_eq!(engine.sync(&resource).await.unwrap(), 4);
    assert_eq!(engine.stats().direction, Some(Direction::Backward));
    assert_eq!(engine.stats().batches_committed, 2);
    drop(engine);
    assert_eq!(message_ids(&db), vec!["m1", "m2", "m3", "m4"]);

    // Reopened store: catch up from the newest stored message.
    let mut engine = chat_engine(&server, &db);
    assert_eq!(engine.sync(&resource).await.unwrap(), 1);
    assert_eq!(engine.stats().direction, Some(Direction::Forward));
    drop(engine);

    // Nothing new upstream.
    let mut engine = chat_engine(&server, &db);
    assert_eq!(engine.sync(&resource).await.unwrap(), 0);
    drop(engine);

    assert_eq!(message_ids(&db), vec!["m1", "m2", "m3", "m4", "m5"]);
    let store = DuckDbStore::open(&db).unwrap();
    assert_eq!(store.list_rooms().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chat_failure_keeps_committed_batches() {
    let server = MockServer::start().await;
    mount_page(&server, None, json!([message_json("m3", 3), message_json("m4", 4)])).await;
    Mock::given(method("GET"))
        .and(path(format!("/rooms/{ROOM_ID}/chatMessages")))
        .and(query_param("beforeId", "m3"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hud.duckdb");
    let resource = Resource::new(ROOM_ID, ROOM_URI);

    let mut engine = chat_engine(&server, &db);
    let err = engine.sync(&resource).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { status: 502, .. }));
    assert_eq!(engine.stats().events_persisted, 2);
    drop(engine);

    assert_eq!(message_ids(&db), vec!["m3", "m4"]);
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let server = MockServer::start().await;
    mount_rooms(&server).await;

    let err = chat_client(&server)
        .get_room("someone/else")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound { .. }));
}

// ============================================================================
// Warehouse Sync Tests
// ============================================================================

fn warehouse_row(created_at: &str, event_type: &str, number: u32) -> Value {
    let row: Vec<Value> = COLUMNS
        .iter()
        .map(|column| match *column {
            "file_time" => json!("2022-05-02 00:00:00"),
            "event_type" => json!(event_type),
            "actor_login" => json!("kapilt"),
            "repo_name" => json!(ROOM_URI),
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
        .collect();
    Value::Array(row)
}

fn warehouse_body(rows: &[Value]) -> String {
    let types = vec!["String"; COLUMNS.len()];
    let mut lines = vec![
        serde_json::to_string(&COLUMNS[..]).unwrap(),
        serde_json::to_string(&types).unwrap(),
    ];
    lines.extend(rows.iter().map(|row| serde_json::to_string(row).unwrap()));
    lines.join("\n") + "\n"
}

fn warehouse_engine(
    server: &MockServer,
    db: &Path,
) -> SyncEngine<WarehouseConnector, DuckDbStore> {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .basic("explorer", None)
        .no_pacing()
        .build();
    let client = WarehouseClient::new(HttpClient::with_config(config).unwrap());
    SyncEngine::new(WarehouseConnector::new(client), DuckDbStore::open(db).unwrap())
}

#[tokio::test]
async fn test_warehouse_sync_resumes_from_watermark() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("param_project", ROOM_URI))
        .and(query_param_is_missing("param_start"))
        .respond_with(ResponseTemplate::new(200).set_body_string(warehouse_body(&[
            warehouse_row("2022-05-01 12:00:00", "IssuesEvent", 1),
            warehouse_row("2022-05-01 13:00:00", "PushEvent", 0),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(query_param("param_project", ROOM_URI))
        .and(query_param("param_start", "2022-05-01 13:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_string(warehouse_body(&[
            warehouse_row("2022-05-01 13:00:00", "PushEvent", 0),
            warehouse_row("2022-05-01 14:00:00", "IssuesEvent", 2),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hud.duckdb");
    let resource = Resource::new(ROOM_URI, ROOM_URI);

    let mut engine = warehouse_engine(&server, &db);
    assert_eq!(engine.sync(&resource).await.unwrap(), 2);
    assert_eq!(engine.stats().direction, Some(Direction::Forward));
    drop(engine);

    // The tie on the watermark timestamp is re-fetched and dropped by ID.
    let mut engine = warehouse_engine(&server, &db);
    assert_eq!(engine.sync(&resource).await.unwrap(), 1);
    drop(engine);

    let store = DuckDbStore::open(&db).unwrap();
    assert_eq!(EventStore::<GithubEvent>::count(&store, ROOM_URI).unwrap(), 3);
}

#[tokio::test]
async fn test_warehouse_schema_drift_fails_without_writing() {
    let server = MockServer::start().await;
    let mut names: Vec<&str> = COLUMNS.to_vec();
    names.retain(|c| *c != "title");
    let body = format!(
        "{}\n{}\n",
        serde_json::to_string(&names).unwrap(),
        serde_json::to_string(&vec!["String"; names.len()]).unwrap()
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hud.duckdb");

    let mut engine = warehouse_engine(&server, &db);
    let err = engine
        .sync(&Resource::new(ROOM_URI, ROOM_URI))
        .await
        .unwrap_err();
    match err {
        Error::SchemaMismatch { diff } => assert_eq!(diff, "- title"),
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
    assert_eq!(engine.stats().events_persisted, 0);
}
