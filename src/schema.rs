//! Property schema for stash annotations. Writers keep annotations sparse
//! by emitting only truthy values; readers tolerate aliases and junk left
//! behind by older versions or hand edits.

use crate::types::{NodeId, ProtoTab, ProtoWindow, StashableTab, TabId, Window};
use serde_json::{Map, Value};

const KEY_PRIVATE: &str = "private";
const KEY_ACTIVE: &str = "active";
const KEY_MUTED: &str = "muted";
const KEY_PINNED: &str = "pinned";
const KEY_CONTAINER: &str = "container";
const KEY_CONTAINER_ALIAS: &str = "cookieStore";
const KEY_SELF_ID: &str = "id";
const KEY_PARENT: &str = "parentId";
const KEY_PARENT_ALIAS: &str = "parent";

/// Correlation key for a tab inside one stash folder. Prefixing with the
/// folder id keeps keys unique across folders even though tab ids repeat
/// between sessions.
pub fn surrogate_id(folder_id: &NodeId, tab_id: TabId) -> String {
    format!("{folder_id}{tab_id}")
}

/// Annotation for a stash folder representing `window`.
pub fn window_note(window: &Window) -> Map<String, Value> {
    let mut props = Map::new();
    if window.incognito {
        props.insert(KEY_PRIVATE.to_string(), Value::Bool(true));
    }
    props
}

/// Decode a stash folder annotation back into a window blueprint.
pub fn window_from_note(props: &Map<String, Value>) -> ProtoWindow {
    ProtoWindow {
        incognito: truthy(props.get(KEY_PRIVATE)),
        name: None,
    }
}

/// Annotation for a bookmark representing one staged tab. `folder_id` is
/// the stash folder the bookmark will live in; it prefixes the surrogate
/// ids used to record opener links.
pub fn tab_note(entry: &StashableTab, folder_id: &NodeId) -> Map<String, Value> {
    let mut props = Map::new();
    if entry.tab.active {
        props.insert(KEY_ACTIVE.to_string(), Value::Bool(true));
    }
    if entry.tab.muted {
        props.insert(KEY_MUTED.to_string(), Value::Bool(true));
    }
    if entry.tab.pinned {
        props.insert(KEY_PINNED.to_string(), Value::Bool(true));
    }
    if let Some(name) = entry.container.as_deref().filter(|name| !name.is_empty()) {
        props.insert(KEY_CONTAINER.to_string(), Value::String(name.to_string()));
    }
    if entry.is_parent {
        props.insert(
            KEY_SELF_ID.to_string(),
            Value::String(surrogate_id(folder_id, entry.tab.id)),
        );
    }
    if let Some(opener) = entry.opener_in_batch {
        props.insert(
            KEY_PARENT.to_string(),
            Value::String(surrogate_id(folder_id, opener)),
        );
    }
    props
}

/// Build a tab blueprint from a bookmark's url, its clean title, and the
/// decoded annotation, if any.
pub fn proto_tab(url: &str, title: &str, props: Option<&Map<String, Value>>) -> ProtoTab {
    let mut proto = ProtoTab::new(url);
    if !title.is_empty() {
        proto.title = Some(title.to_string());
    }
    let Some(props) = props else {
        return proto;
    };
    proto.active = truthy(props.get(KEY_ACTIVE));
    proto.muted = truthy(props.get(KEY_MUTED));
    proto.pinned = truthy(props.get(KEY_PINNED));
    proto.container = string_prop(props, &[KEY_CONTAINER, KEY_CONTAINER_ALIAS]);
    proto.surrogate_id = string_prop(props, &[KEY_SELF_ID]);
    proto.parent_surrogate = string_prop(props, &[KEY_PARENT, KEY_PARENT_ALIAS]);
    proto
}

/// JSON truthiness: absent, null, false, 0 and "" are false, everything
/// else is true.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map_or(true, |float| float != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

/// First non-empty string value under any of `keys`. Wrong-typed values
/// are ignored rather than coerced.
fn string_prop(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(text)) = props.get(*key) {
            if !text.is_empty() {
                return Some(text.clone());
            }
        }
    }
    None
}
