//! Wire payloads shared by unit tests

use super::models::{ChatMessage, Room};
use serde_json::{json, Value};

pub(crate) fn message_json(id: &str, sent: &str) -> Value {
    json!({
        "id": id,
        "text": format!("hello from {id}"),
        "html": format!("<p>hello from {id}</p>"),
        "sent": sent,
        "fromUser": {
            "id": "53307734c3599d1de448e192",
            "username": "kapilt",
            "displayName": "Kapil Thangavelu",
            "url": "/kapilt",
            "avatarUrlSmall": "https://avatars.example/kapilt?s=60",
            "avatarUrlMedium": "https://avatars.example/kapilt?s=128"
        },
        "unread": false,
        "readBy": 4,
        "urls": [],
        "mentions": [],
        "issues": [],
        "meta": [],
        "v": 1
    })
}

pub(crate) fn message(id: &str, sent: &str) -> ChatMessage {
    ChatMessage::from_value(message_json(id, sent)).unwrap()
}

pub(crate) fn room_json(id: &str, uri: &str, github_type: &str) -> Value {
    json!({
        "id": id,
        "name": uri,
        "topic": "",
        "avatarUrl": "https://avatars.example/room",
        "uri": uri,
        "url": format!("/{uri}"),
        "oneToOne": false,
        "userCount": 1342,
        "unreadItems": 0,
        "mentions": 0,
        "lurk": false,
        "githubType": github_type,
        "tags": [],
        "noindex": false,
        "roomMember": true,
        "public": true,
        "v": 1
    })
}

pub(crate) fn room(id: &str, uri: &str, github_type: &str) -> Room {
    Room::from_value(room_json(id, uri, github_type)).unwrap()
}
