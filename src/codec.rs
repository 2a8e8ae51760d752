//! Title codec: folds window and tab properties into node titles as a
//! trailing compact-JSON object, and recovers them on the way back.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_humanize::HumanTime;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const SAVED_PREFIX: &str = "saved-";

/// Append `props` to `base_text` as a compact JSON object. An empty map
/// leaves the title unannotated; an empty base yields the object alone,
/// so the result never starts or ends with whitespace.
pub fn stringify(base_text: &str, props: Map<String, Value>) -> String {
    let text = base_text.trim();
    if props.is_empty() {
        return text.to_string();
    }
    if text.is_empty() {
        return Value::Object(props).to_string();
    }
    format!("{text} {}", Value::Object(props))
}

/// Split a title into its human-readable text and a decoded annotation.
///
/// The annotation, when present, is the shortest trailing substring that
/// parses as a JSON object. Candidate start points are scanned backwards
/// from the last `{` so literal braces earlier in the title survive. A
/// title whose visible text itself ends in a JSON object is indistinguishable
/// from an annotated one and parses as annotated.
pub fn parse(title: &str) -> (String, Option<Map<String, Value>>) {
    if !title.ends_with('}') {
        return (title.to_string(), None);
    }
    let mut end = title.len();
    while let Some(at) = title[..end].rfind('{') {
        if let Ok(Value::Object(props)) = serde_json::from_str::<Value>(&title[at..]) {
            return (title[..at].trim_end().to_string(), Some(props));
        }
        end = at;
    }
    (title.to_string(), None)
}

/// Name given to a stash folder when neither the request nor the window
/// supplies one.
pub fn default_stash_name(at: DateTime<Utc>) -> String {
    format!("{SAVED_PREFIX}{}", at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn saved_name_regex() -> &'static Regex {
    static SAVED_NAME: OnceLock<Regex> = OnceLock::new();
    SAVED_NAME.get_or_init(|| {
        Regex::new(
            r"^saved-(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2}))$",
        )
        .expect("invalid saved-name regex")
    })
}

/// Render machine-generated stash names as a relative phrase, e.g.
/// "saved 2 hours ago". Anything else passes through unchanged.
pub fn friendly_name(title: &str) -> String {
    let Some(caps) = saved_name_regex().captures(title) else {
        return title.to_string();
    };
    match DateTime::parse_from_rfc3339(&caps[1]) {
        Ok(at) => format!("saved {}", HumanTime::from(at.with_timezone(&Utc))),
        Err(_) => title.to_string(),
    }
}
