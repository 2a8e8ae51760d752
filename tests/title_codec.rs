//! Tests for the title codec and the annotation property schema.

use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use winstash::codec;
use winstash::schema;
use winstash::types::{StashableTab, Tab, Window, DEFAULT_COOKIE_STORE};

/// Unwrap a json! literal into the map form the codec works on.
fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn live_tab(id: u64) -> Tab {
    Tab {
        id,
        window_id: 1,
        index: 0,
        url: format!("https://example.com/{id}"),
        title: format!("tab {id}"),
        active: false,
        pinned: false,
        muted: false,
        selected: false,
        opener_tab_id: None,
        cookie_store: DEFAULT_COOKIE_STORE.to_string(),
    }
}

#[test]
fn test_stringify_appends_compact_json() {
    let title = codec::stringify("Docs", props(json!({"pinned": true})));
    assert_eq!(title, "Docs {\"pinned\":true}");
}

#[test]
fn test_stringify_empty_props_leaves_title_alone() {
    assert_eq!(codec::stringify("  Docs  ", Map::new()), "Docs");
}

#[test]
fn test_stringify_empty_base_yields_bare_annotation() {
    let note = props(json!({"pinned": true}));
    let title = codec::stringify("   ", note.clone());
    assert_eq!(title, "{\"pinned\":true}");

    let (text, decoded) = codec::parse(&title);
    assert_eq!(text, "");
    assert_eq!(decoded, Some(note));
}

#[test]
fn test_parse_plain_title() {
    let (text, note) = codec::parse("Docs");
    assert_eq!(text, "Docs");
    assert!(note.is_none());
}

#[test]
fn test_parse_round_trip() {
    let note = props(json!({"active": true, "container": "Work"}));
    let title = codec::stringify("release notes", note.clone());
    let (text, decoded) = codec::parse(&title);
    assert_eq!(text, "release notes");
    assert_eq!(decoded, Some(note));
}

#[test]
fn test_parse_ignores_literal_braces() {
    let (text, note) = codec::parse("notes {draft}");
    assert_eq!(text, "notes {draft}");
    assert!(note.is_none());

    let (text, note) = codec::parse("{hello} world {\"active\":true}");
    assert_eq!(text, "{hello} world");
    assert_eq!(note, Some(props(json!({"active": true}))));
}

#[test]
fn test_parse_handles_braces_inside_values() {
    let (text, note) = codec::parse("win {\"note\":\"{inner}\",\"active\":true}");
    assert_eq!(text, "win");
    assert_eq!(
        note,
        Some(props(json!({"note": "{inner}", "active": true})))
    );
}

#[test]
fn test_parse_claims_trailing_json_text() {
    // a title whose visible text ends in a JSON object cannot be told apart
    // from an annotated one; the codec reads it as annotated
    let (text, note) = codec::parse("log {\"x\":1}");
    assert_eq!(text, "log");
    assert_eq!(note, Some(props(json!({"x": 1}))));
}

#[test]
fn test_default_stash_name_is_utc_seconds() {
    let at = Utc.with_ymd_and_hms(2026, 8, 23, 10, 30, 5).unwrap();
    assert_eq!(codec::default_stash_name(at), "saved-2026-08-23T10:30:05Z");
}

#[test]
fn test_friendly_name_rewrites_generated_names_only() {
    assert_eq!(codec::friendly_name("Work"), "Work");
    assert_eq!(codec::friendly_name("saved-not-a-date"), "saved-not-a-date");

    let generated = codec::default_stash_name(Utc::now() - Duration::hours(2));
    let friendly = codec::friendly_name(&generated);
    assert!(friendly.starts_with("saved "), "got {friendly}");
    assert_ne!(friendly, generated);
}

#[test]
fn test_window_note_only_marks_private() {
    let window = Window {
        id: 1,
        focused: true,
        incognito: false,
        name: None,
        tabs: Vec::new(),
    };
    assert!(schema::window_note(&window).is_empty());

    let private = Window {
        incognito: true,
        ..window
    };
    let note = schema::window_note(&private);
    assert_eq!(Value::Object(note).to_string(), "{\"private\":true}");
}

#[test]
fn test_window_from_note_accepts_truthy_private() {
    assert!(schema::window_from_note(&props(json!({"private": true}))).incognito);
    assert!(schema::window_from_note(&props(json!({"private": 1}))).incognito);
    assert!(!schema::window_from_note(&props(json!({"private": false}))).incognito);
    assert!(!schema::window_from_note(&props(json!({}))).incognito);
}

#[test]
fn test_tab_note_records_truthy_state_and_surrogates() {
    let mut entry = StashableTab::new(live_tab(42));
    entry.tab.active = true;
    entry.tab.muted = true;
    entry.tab.pinned = true;
    entry.container = Some("Work".to_string());
    entry.is_parent = true;
    entry.opener_in_batch = Some(3);

    let note = schema::tab_note(&entry, &"fold".to_string());
    assert_eq!(
        Value::Object(note).to_string(),
        "{\"active\":true,\"muted\":true,\"pinned\":true,\"container\":\"Work\",\"id\":\"fold42\",\"parentId\":\"fold3\"}"
    );
}

#[test]
fn test_tab_note_empty_for_plain_tab() {
    let entry = StashableTab::new(live_tab(7));
    assert!(schema::tab_note(&entry, &"fold".to_string()).is_empty());
}

#[test]
fn test_proto_tab_reads_aliases_and_truthiness() {
    let note = props(json!({
        "cookieStore": "Work",
        "parent": "f3",
        "active": 1,
        "pinned": 0,
        "muted": ""
    }));
    let proto = schema::proto_tab("https://example.com/", "Docs", Some(&note));
    assert_eq!(proto.title.as_deref(), Some("Docs"));
    assert!(proto.active);
    assert!(!proto.pinned);
    assert!(!proto.muted);
    assert_eq!(proto.container.as_deref(), Some("Work"));
    assert_eq!(proto.parent_surrogate.as_deref(), Some("f3"));
    assert!(proto.surrogate_id.is_none());
}

#[test]
fn test_proto_tab_prefers_canonical_keys() {
    let note = props(json!({
        "container": "Personal",
        "cookieStore": "Work",
        "parentId": "f1",
        "parent": "f2"
    }));
    let proto = schema::proto_tab("https://example.com/", "", Some(&note));
    assert_eq!(proto.container.as_deref(), Some("Personal"));
    assert_eq!(proto.parent_surrogate.as_deref(), Some("f1"));
}

#[test]
fn test_proto_tab_ignores_wrong_typed_strings() {
    let note = props(json!({"id": 7, "container": 1}));
    let proto = schema::proto_tab("https://example.com/", "", Some(&note));
    assert!(proto.surrogate_id.is_none());
    assert!(proto.container.is_none());
    assert!(proto.title.is_none());
}

#[test]
fn test_surrogate_id_prefixes_folder() {
    assert_eq!(schema::surrogate_id(&"abc".to_string(), 9), "abc9");
}
