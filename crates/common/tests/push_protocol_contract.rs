use std::collections::BTreeSet;

use tripline_common::protocol::push::{
    encode_message, PushMessage, CLIENT_EVENTS, CURRENT_PROTOCOL_VERSION, SERVER_EVENTS,
    SUPPORTED_PROTOCOL_VERSIONS,
};
use tripline_common::types::{CommentId, RoomId};

fn load_contract() -> serde_json::Value {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/push-protocol.json");
    let content = std::fs::read_to_string(path).expect("contract file should be readable");
    serde_json::from_str(&content).expect("contract file should be valid JSON")
}

fn contract_set<'a>(contract: &'a serde_json::Value, key: &str) -> BTreeSet<&'a str> {
    contract[key]
        .as_array()
        .unwrap_or_else(|| panic!("{key} should be an array"))
        .iter()
        .map(|v| v.as_str().expect("entry should be a string"))
        .collect()
}

#[test]
fn current_version_matches_contract() {
    let contract = load_contract();
    let expected =
        contract["current_version"].as_str().expect("current_version should be a string");
    assert_eq!(CURRENT_PROTOCOL_VERSION, expected);
}

#[test]
fn supported_versions_match_contract() {
    let contract = load_contract();
    let expected: Vec<&str> = contract["protocol_versions"]
        .as_array()
        .expect("protocol_versions should be an array")
        .iter()
        .map(|v| v.as_str().expect("version should be a string"))
        .collect();
    assert_eq!(SUPPORTED_PROTOCOL_VERSIONS, &expected[..]);
}

#[test]
fn event_names_match_contract() {
    let contract = load_contract();
    let client: BTreeSet<&str> = CLIENT_EVENTS.iter().copied().collect();
    let server: BTreeSet<&str> = SERVER_EVENTS.iter().copied().collect();
    assert_eq!(client, contract_set(&contract, "client_events"));
    assert_eq!(server, contract_set(&contract, "server_events"));
}

#[test]
fn serialized_event_tags_are_registered() {
    let room = RoomId::from("day-1");
    let frames = [
        PushMessage::JoinDay { day_id: room.clone() },
        PushMessage::AddComment { day_id: room.clone(), text: "hi".into() },
        PushMessage::RoomJoined { day_id: room.clone() },
        PushMessage::CommentRemoved { day_id: room, comment_id: CommentId::from("c1") },
        PushMessage::Error { message: "nope".into() },
    ];

    for frame in frames {
        let encoded = encode_message(&frame).expect("frame should encode");
        let value: serde_json::Value = serde_json::from_str(&encoded).expect("valid json");
        let tag = value["event"].as_str().expect("event tag should be a string");
        assert_eq!(tag, frame.event_name());
        assert!(
            CLIENT_EVENTS.contains(&tag) || SERVER_EVENTS.contains(&tag),
            "event `{tag}` is not part of the protocol"
        );
    }
}
